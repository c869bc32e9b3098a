//! Address index - pre-order position paths for every extracted node.
//!
//! An [`Address`] is the list of child positions from the component root
//! down to a node (`[]` is the root, `[1, 0]` the first child of the root's
//! second child). Addresses are logical: they count every front-end child,
//! including repeated nodes that contribute no markup. The markup position
//! of a node is tracked separately as its `dom_path`.

use std::fmt;

use smallvec::SmallVec;

use super::node::{ExtractedNode, NodeFlags, NodeKind};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(SmallVec<[usize; 8]>);

impl Address {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(&self, position: usize) -> Self {
        let mut path = self.0.clone();
        path.push(position);
        Self(path)
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// True if `self` is a strict descendant of `ancestor`.
    pub fn extends(&self, ancestor: &Address) -> bool {
        self.0.len() > ancestor.0.len() && self.0.starts_with(&ancestor.0)
    }

    /// True if `self` is `other` or one of its descendants.
    pub fn is_within(&self, other: &Address) -> bool {
        self.0.starts_with(&other.0)
    }
}

impl From<&[usize]> for Address {
    fn from(positions: &[usize]) -> Self {
        Self(SmallVec::from_slice(positions))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0.as_slice())
    }
}

/// One node of the addressed tree.
#[derive(Clone)]
pub struct AddressEntry<'a> {
    pub address: Address,
    /// Child path through the static markup. For a repeated node this is
    /// its container's path.
    pub dom_path: Vec<usize>,
    pub node: &'a ExtractedNode,
    /// Entry index of the parent node.
    pub parent: Option<usize>,
    pub flags: NodeFlags,
}

impl AddressEntry<'_> {
    /// Position among the parent's markup children.
    pub fn sibling_index(&self) -> Option<usize> {
        self.dom_path.last().copied()
    }
}

/// Every node of one component tree, in document pre-order.
pub struct AddressIndex<'a> {
    entries: Vec<AddressEntry<'a>>,
}

impl<'a> AddressIndex<'a> {
    pub fn build(root: &'a ExtractedNode) -> Self {
        let mut entries = Vec::new();
        visit(root, Address::root(), Vec::new(), None, &mut entries);
        Self { entries }
    }

    pub fn entries(&self) -> &[AddressEntry<'a>] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> &AddressEntry<'a> {
        &self.entries[index]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AddressEntry<'a>> {
        self.entries.iter()
    }

    /// Number of element children of an entry's parent. Text nodes do not
    /// count.
    pub fn sibling_count(&self, index: usize) -> usize {
        match self.entries[index].parent {
            Some(parent) => self.entries[parent]
                .node
                .children
                .iter()
                .filter(|child| matches!(child.kind, NodeKind::Element(_)))
                .count(),
            None => 1,
        }
    }

    /// Entry indices of the children of `parent`, in document order.
    pub fn children_of(&self, parent: usize) -> impl Iterator<Item = usize> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(move |(_, entry)| entry.parent == Some(parent))
            .map(|(index, _)| index)
    }
}

fn visit<'a>(
    node: &'a ExtractedNode,
    address: Address,
    dom_path: Vec<usize>,
    parent: Option<usize>,
    entries: &mut Vec<AddressEntry<'a>>,
) {
    let index = entries.len();
    entries.push(AddressEntry {
        address: address.clone(),
        dom_path: dom_path.clone(),
        node,
        parent,
        flags: node.flags(),
    });

    let mut markup_position = 0;
    for (position, child) in node.children.iter().enumerate() {
        let child_path = if child.is_repeated() {
            dom_path.clone()
        } else {
            let mut path = dom_path.clone();
            path.push(markup_position);
            markup_position += 1;
            path
        };
        visit(child, address.child(position), child_path, Some(index), entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::expr::Expr;
    use crate::compiler::node::ExtractedNode;
    use crate::compiler::compile;
    use std::rc::Rc;

    #[test]
    fn test_pre_order_addresses() {
        let tree = ExtractedNode::element("div")
            .child(ExtractedNode::element("p").child(ExtractedNode::text("a")))
            .child(ExtractedNode::element("span"));
        let index = AddressIndex::build(&tree);

        let addresses: Vec<Vec<usize>> = index
            .iter()
            .map(|e| e.address.as_slice().to_vec())
            .collect();
        assert_eq!(addresses, vec![vec![], vec![0], vec![0, 0], vec![1]]);
        assert_eq!(index.get(2).parent, Some(1));
    }

    #[test]
    fn test_extends_is_strict() {
        let zero = Address::from(&[0][..]);
        let zero_zero = Address::from(&[0, 0][..]);
        let one = Address::from(&[1][..]);

        assert!(zero_zero.extends(&zero));
        assert!(!zero.extends(&zero), "an address does not extend itself");
        assert!(!one.extends(&zero));
        assert!(zero.is_within(&zero));
        assert!(zero_zero.extends(&Address::root()));
    }

    #[test]
    fn test_repeated_node_skips_markup_position() {
        let row = Rc::new(compile("row", &ExtractedNode::element("li")).unwrap());
        let tree = ExtractedNode::element("ul")
            .child(ExtractedNode::element("li").repeat(&row, Expr::prop("rows")).allow_siblings())
            .child(ExtractedNode::element("footer"));
        let index = AddressIndex::build(&tree);

        assert_eq!(index.get(1).dom_path, Vec::<usize>::new(), "repeat resolves to its container");
        assert_eq!(index.get(2).address.as_slice(), &[1]);
        assert_eq!(index.get(2).dom_path, vec![0], "footer is the first markup child");
    }

    #[test]
    fn test_sibling_count_ignores_text() {
        let tree = ExtractedNode::element("div")
            .child(ExtractedNode::text("Label: "))
            .child(ExtractedNode::element("x-row"))
            .child(ExtractedNode::text("!"));
        let index = AddressIndex::build(&tree);

        assert_eq!(index.sibling_count(2), 1, "only element children count");
        assert_eq!(index.children_of(0).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(index.sibling_count(0), 1, "the root has no siblings");
    }
}

//! Node arena - Index allocation and tree operations for the host surface.
//!
//! Nodes are NOT objects. They are indices into parallel arrays:
//!
//! ```text
//! Index 0: Element "ul"  (parent=None, children=[1, 2])
//! Index 1: Element "li"  (parent=0,    children=[3])
//! Index 3: Text    "a"   (parent=1)
//! ```
//!
//! Freed indices go to a pool for O(1) reuse. Every structural operation
//! bumps a counter in [`DomStats`] so callers can assert on how much work a
//! patch did.

use std::cell::{Cell, RefCell};

use super::template::TemplateNode;

/// Handle to a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element(String),
    Text,
}

/// Counters for structural and content writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DomStats {
    pub inserts: usize,
    pub appends: usize,
    pub removes: usize,
    pub attribute_writes: usize,
    pub text_writes: usize,
}

impl DomStats {
    /// Inserts, appends and removes combined.
    pub fn structural(&self) -> usize {
        self.inserts + self.appends + self.removes
    }
}

// =============================================================================
// Arena State
// =============================================================================

thread_local! {
    /// Node kind per index. `None` marks a released slot.
    static KIND: RefCell<Vec<Option<NodeKind>>> = RefCell::new(Vec::new());

    /// Parent per index.
    static PARENT: RefCell<Vec<Option<NodeId>>> = RefCell::new(Vec::new());

    /// Ordered children per index.
    static CHILDREN: RefCell<Vec<Vec<NodeId>>> = RefCell::new(Vec::new());

    /// Attributes per index, in insertion order.
    static ATTRIBUTES: RefCell<Vec<Vec<(String, String)>>> = RefCell::new(Vec::new());

    /// Text content of text nodes.
    static TEXT: RefCell<Vec<String>> = RefCell::new(Vec::new());

    /// Pool of freed indices for reuse.
    static FREE_INDICES: RefCell<Vec<usize>> = RefCell::new(Vec::new());

    /// Operation counters.
    static STATS: Cell<DomStats> = Cell::new(DomStats::default());
}

fn bump(f: impl FnOnce(&mut DomStats)) {
    STATS.with(|stats| {
        let mut current = stats.get();
        f(&mut current);
        stats.set(current);
    });
}

// =============================================================================
// Allocation
// =============================================================================

fn allocate(kind: NodeKind, text: String) -> NodeId {
    let reused = FREE_INDICES.with(|free| free.borrow_mut().pop());
    match reused {
        Some(index) => {
            KIND.with(|k| k.borrow_mut()[index] = Some(kind));
            PARENT.with(|p| p.borrow_mut()[index] = None);
            CHILDREN.with(|c| c.borrow_mut()[index].clear());
            ATTRIBUTES.with(|a| a.borrow_mut()[index].clear());
            TEXT.with(|t| t.borrow_mut()[index] = text);
            NodeId(index)
        }
        None => {
            let index = KIND.with(|k| {
                let mut k = k.borrow_mut();
                k.push(Some(kind));
                k.len() - 1
            });
            PARENT.with(|p| p.borrow_mut().push(None));
            CHILDREN.with(|c| c.borrow_mut().push(Vec::new()));
            ATTRIBUTES.with(|a| a.borrow_mut().push(Vec::new()));
            TEXT.with(|t| t.borrow_mut().push(text));
            NodeId(index)
        }
    }
}

/// Create a detached element.
pub fn create_element(tag: &str) -> NodeId {
    allocate(NodeKind::Element(tag.to_string()), String::new())
}

/// Create a detached text node.
pub fn create_text(text: &str) -> NodeId {
    allocate(NodeKind::Text, text.to_string())
}

/// Build a fresh subtree from a template.
pub fn instantiate(template: &TemplateNode) -> NodeId {
    match template {
        TemplateNode::Text(text) => create_text(text),
        TemplateNode::Element {
            tag,
            attributes,
            children,
        } => {
            let node = create_element(tag);
            ATTRIBUTES.with(|a| a.borrow_mut()[node.0] = attributes.clone());
            let kids: Vec<NodeId> = children.iter().map(instantiate).collect();
            PARENT.with(|p| {
                let mut p = p.borrow_mut();
                for kid in &kids {
                    p[kid.0] = Some(node);
                }
            });
            CHILDREN.with(|c| c.borrow_mut()[node.0] = kids);
            node
        }
    }
}

/// Release a node and its whole subtree back to the pool.
///
/// The node is detached from its parent first. Released handles must not be
/// used again.
pub fn release(node: NodeId) {
    if !is_live(node) {
        return;
    }
    if let Some(parent) = parent(node) {
        unlink(parent, node);
    }
    release_subtree(node);
}

fn release_subtree(node: NodeId) {
    let kids = CHILDREN.with(|c| std::mem::take(&mut c.borrow_mut()[node.0]));
    for kid in kids {
        release_subtree(kid);
    }
    super::events::clear_listeners(node);
    KIND.with(|k| k.borrow_mut()[node.0] = None);
    PARENT.with(|p| p.borrow_mut()[node.0] = None);
    ATTRIBUTES.with(|a| a.borrow_mut()[node.0].clear());
    TEXT.with(|t| t.borrow_mut()[node.0].clear());
    FREE_INDICES.with(|free| free.borrow_mut().push(node.0));
}

// =============================================================================
// Queries
// =============================================================================

pub fn is_live(node: NodeId) -> bool {
    KIND.with(|k| matches!(k.borrow().get(node.0), Some(Some(_))))
}

pub fn kind(node: NodeId) -> Option<NodeKind> {
    KIND.with(|k| k.borrow().get(node.0).cloned().flatten())
}

/// Tag name of an element; `None` for text nodes.
pub fn tag(node: NodeId) -> Option<String> {
    match kind(node)? {
        NodeKind::Element(tag) => Some(tag),
        NodeKind::Text => None,
    }
}

pub fn parent(node: NodeId) -> Option<NodeId> {
    PARENT.with(|p| p.borrow().get(node.0).copied().flatten())
}

pub fn children(node: NodeId) -> Vec<NodeId> {
    CHILDREN.with(|c| c.borrow().get(node.0).cloned().unwrap_or_default())
}

pub fn child_count(node: NodeId) -> usize {
    CHILDREN.with(|c| c.borrow().get(node.0).map_or(0, Vec::len))
}

pub fn child_at(node: NodeId, index: usize) -> Option<NodeId> {
    CHILDREN.with(|c| c.borrow().get(node.0).and_then(|kids| kids.get(index).copied()))
}

/// Locate a descendant by ordinal child path.
pub fn descend(root: NodeId, path: &[usize]) -> Option<NodeId> {
    path.iter()
        .try_fold(root, |node, &index| child_at(node, index))
}

pub fn get_attribute(node: NodeId, name: &str) -> Option<String> {
    ATTRIBUTES.with(|a| {
        a.borrow()
            .get(node.0)?
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    })
}

pub fn has_attribute(node: NodeId, name: &str) -> bool {
    get_attribute(node, name).is_some()
}

/// Text content: the node's own text, or its descendants' text joined.
pub fn text_content(node: NodeId) -> String {
    match kind(node) {
        Some(NodeKind::Text) => TEXT.with(|t| t.borrow()[node.0].clone()),
        Some(NodeKind::Element(_)) => children(node).into_iter().map(text_content).collect(),
        None => String::new(),
    }
}

// =============================================================================
// Structure
// =============================================================================

fn unlink(parent: NodeId, node: NodeId) {
    CHILDREN.with(|c| {
        let mut c = c.borrow_mut();
        if let Some(kids) = c.get_mut(parent.0) {
            kids.retain(|kid| *kid != node);
        }
    });
    PARENT.with(|p| p.borrow_mut()[node.0] = None);
}

/// Insert `node` into `parent` before `reference`, appending when `reference`
/// is `None` or not a child of `parent`. A node that is already attached
/// somewhere is moved.
pub fn insert_before(parent: NodeId, node: NodeId, reference: Option<NodeId>) {
    if let Some(old_parent) = self::parent(node) {
        unlink(old_parent, node);
    }
    let appended = CHILDREN.with(|c| {
        let mut c = c.borrow_mut();
        let kids = &mut c[parent.0];
        match reference.and_then(|r| kids.iter().position(|kid| *kid == r)) {
            Some(position) => {
                kids.insert(position, node);
                false
            }
            None => {
                kids.push(node);
                true
            }
        }
    });
    PARENT.with(|p| p.borrow_mut()[node.0] = Some(parent));
    if appended && reference.is_none() {
        bump(|s| s.appends += 1);
    } else {
        bump(|s| s.inserts += 1);
    }
}

pub fn append_child(parent: NodeId, node: NodeId) {
    insert_before(parent, node, None);
}

/// Remove `node` from `parent`. No-op if it is not a child of `parent`.
pub fn remove_child(parent: NodeId, node: NodeId) {
    if self::parent(node) != Some(parent) {
        return;
    }
    unlink(parent, node);
    bump(|s| s.removes += 1);
}

/// Detach `node` from whatever parent it has.
pub fn detach(node: NodeId) {
    if let Some(parent) = parent(node) {
        remove_child(parent, node);
    }
}

/// Put `node` where `old` currently sits; `old` ends up detached.
pub fn replace(old: NodeId, node: NodeId) {
    let Some(parent) = parent(old) else { return };
    insert_before(parent, node, Some(old));
    remove_child(parent, old);
}

// =============================================================================
// Content
// =============================================================================

/// Set (`Some`) or remove (`None`) an attribute. Writes equal to the current
/// value are skipped.
pub fn set_attribute(node: NodeId, name: &str, value: Option<&str>) {
    let changed = ATTRIBUTES.with(|a| {
        let mut a = a.borrow_mut();
        let attributes = &mut a[node.0];
        let position = attributes.iter().position(|(k, _)| k == name);
        match (position, value) {
            (Some(i), Some(v)) if attributes[i].1 == v => false,
            (Some(i), Some(v)) => {
                attributes[i].1 = v.to_string();
                true
            }
            (None, Some(v)) => {
                attributes.push((name.to_string(), v.to_string()));
                true
            }
            (Some(i), None) => {
                attributes.remove(i);
                true
            }
            (None, None) => false,
        }
    });
    if changed {
        bump(|s| s.attribute_writes += 1);
    }
}

/// Set the text of a text node, or replace an element's children with a
/// single text node.
pub fn set_text(node: NodeId, text: &str) {
    match kind(node) {
        Some(NodeKind::Text) => TEXT.with(|t| t.borrow_mut()[node.0] = text.to_string()),
        Some(NodeKind::Element(_)) => {
            let kids = children(node);
            if let [only] = kids.as_slice() {
                if kind(*only) == Some(NodeKind::Text) {
                    TEXT.with(|t| t.borrow_mut()[only.0] = text.to_string());
                    bump(|s| s.text_writes += 1);
                    return;
                }
            }
            for kid in kids {
                release(kid);
            }
            let text_node = create_text(text);
            CHILDREN.with(|c| c.borrow_mut()[node.0].push(text_node));
            PARENT.with(|p| p.borrow_mut()[text_node.0] = Some(node));
        }
        None => return,
    }
    bump(|s| s.text_writes += 1);
}

/// Add or remove one class token.
pub fn set_class(node: NodeId, class: &str, on: bool) {
    let current = get_attribute(node, "class").unwrap_or_default();
    let mut tokens: Vec<&str> = current.split_whitespace().collect();
    let present = tokens.contains(&class);
    if present == on {
        return;
    }
    if on {
        tokens.push(class);
    } else {
        tokens.retain(|t| *t != class);
    }
    if tokens.is_empty() {
        set_attribute(node, "class", None);
    } else {
        set_attribute(node, "class", Some(&tokens.join(" ")));
    }
}

pub fn has_class(node: NodeId, class: &str) -> bool {
    get_attribute(node, "class")
        .is_some_and(|c| c.split_whitespace().any(|t| t == class))
}

/// Set (`Some`) or clear (`None`) one inline style property.
pub fn set_style(node: NodeId, property: &str, value: Option<&str>) {
    let current = get_attribute(node, "style").unwrap_or_default();
    let mut declarations: Vec<(String, String)> = current
        .split(';')
        .filter_map(|decl| {
            let (k, v) = decl.split_once(':')?;
            Some((k.trim().to_string(), v.trim().to_string()))
        })
        .filter(|(k, _)| k != property)
        .collect();
    if let Some(v) = value {
        declarations.push((property.to_string(), v.to_string()));
    }
    if declarations.is_empty() {
        set_attribute(node, "style", None);
    } else {
        let style = declarations
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("; ");
        set_attribute(node, "style", Some(&style));
    }
}

// =============================================================================
// Serialization
// =============================================================================

/// Serialize a subtree to HTML.
pub fn to_html(node: NodeId) -> String {
    let mut out = String::new();
    write_html(node, &mut out);
    out
}

fn write_html(node: NodeId, out: &mut String) {
    match kind(node) {
        Some(NodeKind::Text) => TEXT.with(|t| super::template::escape_into(&t.borrow()[node.0], out)),
        Some(NodeKind::Element(tag)) => {
            out.push('<');
            out.push_str(&tag);
            ATTRIBUTES.with(|a| {
                for (k, v) in &a.borrow()[node.0] {
                    super::template::write_attribute(k, v, out);
                }
            });
            out.push('>');
            for kid in children(node) {
                write_html(kid, out);
            }
            out.push_str("</");
            out.push_str(&tag);
            out.push('>');
        }
        None => {}
    }
}

// =============================================================================
// Stats and Reset
// =============================================================================

pub fn stats() -> DomStats {
    STATS.with(Cell::get)
}

pub fn reset_stats() {
    STATS.with(|s| s.set(DomStats::default()));
}

/// Number of live nodes.
pub fn live_count() -> usize {
    KIND.with(|k| k.borrow().iter().filter(|n| n.is_some()).count())
}

/// Reset all arena state (for testing).
pub fn reset_document() {
    KIND.with(|k| k.borrow_mut().clear());
    PARENT.with(|p| p.borrow_mut().clear());
    CHILDREN.with(|c| c.borrow_mut().clear());
    ATTRIBUTES.with(|a| a.borrow_mut().clear());
    TEXT.with(|t| t.borrow_mut().clear());
    FREE_INDICES.with(|free| free.borrow_mut().clear());
    super::events::reset_listeners();
    reset_stats();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_of(labels: &[&str]) -> (NodeId, Vec<NodeId>) {
        let list = create_element("ul");
        let items: Vec<NodeId> = labels
            .iter()
            .map(|label| {
                let li = create_element("li");
                set_text(li, label);
                append_child(list, li);
                li
            })
            .collect();
        (list, items)
    }

    #[test]
    fn test_insert_before_moves_attached_node() {
        reset_document();

        let (list, items) = list_of(&["a", "b", "c"]);
        insert_before(list, items[2], Some(items[0]));

        assert_eq!(children(list), vec![items[2], items[0], items[1]]);
        assert_eq!(text_content(list), "cab");
    }

    #[test]
    fn test_remove_child_ignores_foreign_nodes() {
        reset_document();

        let (list, items) = list_of(&["a"]);
        let stranger = create_element("li");
        reset_stats();

        remove_child(list, stranger);
        assert_eq!(stats().removes, 0, "non-child removal must be a no-op");

        remove_child(list, items[0]);
        assert_eq!(stats().removes, 1);
        assert_eq!(child_count(list), 0);
        assert_eq!(parent(items[0]), None);
    }

    #[test]
    fn test_descend_by_child_path() {
        reset_document();

        let template = TemplateNode::element("div")
            .child(TemplateNode::text("x"))
            .child(TemplateNode::element("p").child(TemplateNode::element("b")));
        let root = instantiate(&template);

        let bold = descend(root, &[1, 0]).expect("path [1, 0] should resolve");
        assert_eq!(tag(bold).as_deref(), Some("b"));
        assert_eq!(descend(root, &[3]), None);
        assert_eq!(descend(root, &[]), Some(root));
    }

    #[test]
    fn test_set_attribute_skips_equal_writes() {
        reset_document();

        let node = create_element("input");
        set_attribute(node, "value", Some("a"));
        set_attribute(node, "value", Some("a"));
        assert_eq!(stats().attribute_writes, 1);

        set_attribute(node, "value", None);
        assert_eq!(get_attribute(node, "value"), None);
        assert_eq!(stats().attribute_writes, 2);
    }

    #[test]
    fn test_class_and_style_tokens() {
        reset_document();

        let node = create_element("div");
        set_class(node, "a", true);
        set_class(node, "b", true);
        set_class(node, "a", false);
        assert_eq!(get_attribute(node, "class").as_deref(), Some("b"));

        set_style(node, "color", Some("red"));
        set_style(node, "width", Some("4px"));
        set_style(node, "color", None);
        assert_eq!(get_attribute(node, "style").as_deref(), Some("width: 4px"));
    }

    #[test]
    fn test_release_and_reuse() {
        reset_document();

        let (list, _) = list_of(&["a", "b"]);
        let before = live_count();
        release(list);
        assert_eq!(live_count(), before - 5, "ul + 2 li + 2 text nodes released");

        let reused = create_element("p");
        assert!(is_live(reused));
        assert_eq!(reused, list, "most recently freed index is reused first");
    }

    #[test]
    fn test_to_html_escapes_text() {
        reset_document();

        let node = create_element("p");
        set_attribute(node, "title", Some("a\"b"));
        set_text(node, "1 < 2");
        assert_eq!(to_html(node), "<p title=\"a&quot;b\">1 &lt; 2</p>");
    }
}

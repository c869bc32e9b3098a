//! Detacher - positional attach/detach for conditionally rendered nodes.
//!
//! A detach-mode node is removed from its parent when hidden, so its DOM
//! index shifts with every detached sibling before it. Each parent owns one
//! [`OffsetTracker`] recording which of its markup children are currently
//! detached (`-1`) or attached (`0`). The insertion index of a node is its
//! markup position plus the sum of the offsets before it.

use std::collections::BTreeMap;

use crate::dom::{self, NodeId};

/// Per-parent attach state, keyed by markup sibling position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetTracker {
    /// Only detached positions are stored; missing positions are attached.
    offsets: BTreeMap<usize, i32>,
}

impl OffsetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker whose `positions` start detached.
    pub fn with_detached(positions: impl IntoIterator<Item = usize>) -> Self {
        Self {
            offsets: positions.into_iter().map(|p| (p, -1)).collect(),
        }
    }

    pub fn offset(&self, position: usize) -> i32 {
        self.offsets.get(&position).copied().unwrap_or(0)
    }

    pub fn is_attached(&self, position: usize) -> bool {
        self.offset(position) == 0
    }

    /// Sum of the offsets of every position before `position`.
    pub fn offset_before(&self, position: usize) -> i32 {
        self.offsets.range(..position).map(|(_, o)| *o).sum()
    }

    fn set(&mut self, position: usize, attached: bool) {
        if attached {
            self.offsets.remove(&position);
        } else {
            self.offsets.insert(position, -1);
        }
    }
}

/// Attach/detach helper for one node under one parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detacher {
    pub sibling_index: usize,
    pub parent: NodeId,
}

impl Detacher {
    pub fn new(sibling_index: usize, parent: NodeId) -> Self {
        Self {
            sibling_index,
            parent,
        }
    }

    /// Bring `target` into the requested state. Returns true if the DOM
    /// changed.
    pub fn apply(&self, tracker: &mut OffsetTracker, target: NodeId, visible: bool) -> bool {
        if tracker.is_attached(self.sibling_index) == visible {
            return false;
        }
        if visible {
            let index = self.sibling_index as i32 + tracker.offset_before(self.sibling_index);
            let reference = dom::child_at(self.parent, index.max(0) as usize);
            dom::insert_before(self.parent, target, reference);
        } else {
            dom::remove_child(self.parent, target);
        }
        tracker.set(self.sibling_index, visible);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{append_child, children, create_element, reset_document};

    fn setup(count: usize) -> (NodeId, Vec<NodeId>) {
        reset_document();
        let parent = create_element("div");
        let kids: Vec<NodeId> = (0..count).map(|_| create_element("p")).collect();
        for kid in &kids {
            append_child(parent, *kid);
        }
        (parent, kids)
    }

    #[test]
    fn test_reattach_lands_at_logical_position() {
        let (parent, kids) = setup(3);
        let mut tracker = OffsetTracker::new();
        let detachers: Vec<Detacher> = (0..3).map(|i| Detacher::new(i, parent)).collect();

        assert!(detachers[0].apply(&mut tracker, kids[0], false));
        assert!(detachers[1].apply(&mut tracker, kids[1], false));
        assert_eq!(children(parent), vec![kids[2]]);

        detachers[1].apply(&mut tracker, kids[1], true);
        assert_eq!(children(parent), vec![kids[1], kids[2]]);

        detachers[0].apply(&mut tracker, kids[0], true);
        assert_eq!(children(parent), kids, "order restored");
    }

    #[test]
    fn test_apply_is_noop_when_state_matches() {
        let (parent, kids) = setup(2);
        let mut tracker = OffsetTracker::new();
        let detacher = Detacher::new(1, parent);

        assert!(!detacher.apply(&mut tracker, kids[1], true), "already attached");
        assert_eq!(dom::stats().structural(), 2, "only the setup appends");
    }

    #[test]
    fn test_starts_detached() {
        reset_document();
        let parent = create_element("div");
        let first = create_element("p");
        append_child(parent, first);
        let nested_root = create_element("section");

        let mut tracker = OffsetTracker::with_detached([0]);
        let detacher = Detacher::new(0, parent);
        assert!(!tracker.is_attached(0));

        assert!(detacher.apply(&mut tracker, nested_root, true));
        assert_eq!(children(parent), vec![nested_root, first]);
    }
}

//! Extracted nodes - the tree the front-end hands to the compiler.
//!
//! Each node carries its static markup fragment (tag, attributes, text) plus
//! the directives attached to it: watches, listeners, a visibility toggle,
//! a ref, a nested or repeated child component, a stub, binds, toggles and a
//! part name. Nodes are built with chained methods:
//!
//! ```ignore
//! let node = ExtractedNode::element("li")
//!     .attr("class", "todo")
//!     .watch(Expr::prop("done"), effects::class("done"))
//!     .child(ExtractedNode::text("…"));
//! ```

use std::rc::Rc;

use crate::compiler::expr::Expr;
use crate::runtime::{ComponentDefinition, Effect, Handler};
use crate::types::Path;

bitflags::bitflags! {
    /// What a node carries, as far as consolidation is concerned.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u16 {
        const WATCH = 1 << 0;
        const LISTENER = 1 << 1;
        const REFERENCE = 1 << 2;
        const NESTED = 1 << 3;
        const REPEAT = 1 << 4;
        const STUB = 1 << 5;
        const BIND = 1 << 6;
        const TOGGLE = 1 << 7;
        const SHIELD = 1 << 8;
        const DETACHABLE_CHILDREN = 1 << 9;
        const PART = 1 << 10;

        /// Any of these requires an element slot.
        const SLOTTED = Self::WATCH.bits()
            | Self::LISTENER.bits()
            | Self::REFERENCE.bits()
            | Self::NESTED.bits()
            | Self::REPEAT.bits()
            | Self::STUB.bits()
            | Self::BIND.bits()
            | Self::TOGGLE.bits()
            | Self::SHIELD.bits()
            | Self::DETACHABLE_CHILDREN.bits();
    }
}

impl NodeFlags {
    pub fn needs_slot(self) -> bool {
        self.intersects(Self::SLOTTED)
    }
}

// =============================================================================
// Directive Specs
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element(String),
    Text(String),
}

/// A value watch: run `effect` whenever `expr` changes.
#[derive(Clone)]
pub struct WatchSpec {
    pub expr: Expr,
    pub effect: Effect,
}

#[derive(Clone)]
pub struct ListenerSpec {
    pub event: String,
    pub handler: Handler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityMode {
    /// Toggle the hide attribute; the node stays in the DOM.
    Hide,
    /// Remove the node from its parent and reinsert it at its logical position.
    Detach,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visibility {
    pub query: Expr,
    /// Visible when the query is falsy instead of truthy.
    pub reverse: bool,
    pub mode: VisibilityMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatSpec {
    pub items: Expr,
    /// Item path used as key; `None` selects the sequential repeater.
    pub key: Option<Path>,
    /// Overrides the compiler's default pool-sharing mode.
    pub share_pool: Option<bool>,
}

#[derive(Clone)]
pub struct NestedSpec {
    pub definition: Rc<ComponentDefinition>,
    /// Props for a single nested child. Ignored when repeated.
    pub props: Expr,
    pub repeat: Option<RepeatSpec>,
    pub allow_siblings: bool,
}

/// A named extension point, resolved through the method table at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubSpec {
    pub name: String,
    pub props: Expr,
}

/// Two-way binding between an attribute and a state path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindSpec {
    pub attribute: String,
    pub path: Path,
    pub event: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleTrigger {
    pub name: String,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleTarget {
    pub name: String,
    pub classes: Vec<String>,
}

// =============================================================================
// Extracted Node
// =============================================================================

#[derive(Clone)]
pub struct ExtractedNode {
    pub kind: NodeKind,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<ExtractedNode>,
    pub watches: Vec<WatchSpec>,
    pub listeners: Vec<ListenerSpec>,
    pub visibility: Option<Visibility>,
    pub reference: Option<String>,
    pub nested: Option<NestedSpec>,
    pub stub: Option<StubSpec>,
    pub binds: Vec<BindSpec>,
    pub toggle_triggers: Vec<ToggleTrigger>,
    pub toggle_targets: Vec<ToggleTarget>,
    pub part: Option<String>,
}

impl ExtractedNode {
    fn with_kind(kind: NodeKind) -> Self {
        Self {
            kind,
            attributes: Vec::new(),
            children: Vec::new(),
            watches: Vec::new(),
            listeners: Vec::new(),
            visibility: None,
            reference: None,
            nested: None,
            stub: None,
            binds: Vec::new(),
            toggle_triggers: Vec::new(),
            toggle_targets: Vec::new(),
            part: None,
        }
    }

    pub fn element(tag: &str) -> Self {
        Self::with_kind(NodeKind::Element(tag.to_string()))
    }

    pub fn text(text: &str) -> Self {
        Self::with_kind(NodeKind::Text(text.to_string()))
    }

    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Element(tag) => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    pub fn child(mut self, child: ExtractedNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = ExtractedNode>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn watch(mut self, expr: Expr, effect: Effect) -> Self {
        self.watches.push(WatchSpec { expr, effect });
        self
    }

    pub fn on(mut self, event: &str, handler: Handler) -> Self {
        self.listeners.push(ListenerSpec {
            event: event.to_string(),
            handler,
        });
        self
    }

    fn visibility(mut self, query: Expr, reverse: bool, mode: VisibilityMode) -> Self {
        self.visibility = Some(Visibility {
            query,
            reverse,
            mode,
        });
        self
    }

    /// Hide-mode toggle: visible while `query` is truthy.
    pub fn shown_when(self, query: Expr) -> Self {
        self.visibility(query, false, VisibilityMode::Hide)
    }

    /// Hide-mode toggle: hidden while `query` is truthy.
    pub fn hidden_when(self, query: Expr) -> Self {
        self.visibility(query, true, VisibilityMode::Hide)
    }

    /// Detach-mode toggle: attached while `query` is truthy.
    pub fn attached_when(self, query: Expr) -> Self {
        self.visibility(query, false, VisibilityMode::Detach)
    }

    /// Detach-mode toggle: detached while `query` is truthy.
    pub fn detached_when(self, query: Expr) -> Self {
        self.visibility(query, true, VisibilityMode::Detach)
    }

    pub fn reference(mut self, name: &str) -> Self {
        self.reference = Some(name.to_string());
        self
    }

    /// Render a single child component here.
    pub fn nested(mut self, definition: &Rc<ComponentDefinition>, props: Expr) -> Self {
        self.nested = Some(NestedSpec {
            definition: definition.clone(),
            props,
            repeat: None,
            allow_siblings: false,
        });
        self
    }

    /// Render one child component per item, reusing instances by position.
    pub fn repeat(self, definition: &Rc<ComponentDefinition>, items: Expr) -> Self {
        self.repeat_with(definition, RepeatSpec {
            items,
            key: None,
            share_pool: None,
        })
    }

    /// Render one child component per item, reusing instances by key.
    pub fn repeat_keyed(self, definition: &Rc<ComponentDefinition>, items: Expr, key: &str) -> Self {
        self.repeat_with(definition, RepeatSpec {
            items,
            key: Some(Path::parse(key)),
            share_pool: None,
        })
    }

    pub fn repeat_with(mut self, definition: &Rc<ComponentDefinition>, spec: RepeatSpec) -> Self {
        self.nested = Some(NestedSpec {
            definition: definition.clone(),
            props: Expr::props(),
            repeat: Some(spec),
            allow_siblings: false,
        });
        self
    }

    /// Permit siblings next to a nested or repeated node.
    pub fn allow_siblings(mut self) -> Self {
        if let Some(nested) = &mut self.nested {
            nested.allow_siblings = true;
        }
        self
    }

    pub fn stub(mut self, name: &str, props: Expr) -> Self {
        self.stub = Some(StubSpec {
            name: name.to_string(),
            props,
        });
        self
    }

    pub fn bind(mut self, attribute: &str, path: &str, event: &str) -> Self {
        self.binds.push(BindSpec {
            attribute: attribute.to_string(),
            path: Path::parse(path),
            event: event.to_string(),
        });
        self
    }

    pub fn toggle(mut self, name: &str, expr: Expr) -> Self {
        self.toggle_triggers.push(ToggleTrigger {
            name: name.to_string(),
            expr,
        });
        self
    }

    pub fn toggle_target(mut self, name: &str, classes: &str) -> Self {
        self.toggle_targets.push(ToggleTarget {
            name: name.to_string(),
            classes: classes.split_whitespace().map(str::to_string).collect(),
        });
        self
    }

    pub fn part(mut self, name: &str) -> Self {
        self.part = Some(name.to_string());
        self
    }

    pub fn is_repeated(&self) -> bool {
        self.nested.as_ref().is_some_and(|n| n.repeat.is_some())
    }

    pub fn is_detachable(&self) -> bool {
        self.visibility
            .as_ref()
            .is_some_and(|v| v.mode == VisibilityMode::Detach)
    }

    pub fn flags(&self) -> NodeFlags {
        let mut flags = NodeFlags::empty();
        flags.set(NodeFlags::WATCH, !self.watches.is_empty());
        flags.set(NodeFlags::LISTENER, !self.listeners.is_empty());
        flags.set(NodeFlags::REFERENCE, self.reference.is_some());
        flags.set(NodeFlags::NESTED, self.nested.is_some() && !self.is_repeated());
        flags.set(NodeFlags::REPEAT, self.is_repeated());
        flags.set(NodeFlags::STUB, self.stub.is_some());
        flags.set(NodeFlags::BIND, !self.binds.is_empty());
        flags.set(
            NodeFlags::TOGGLE,
            !self.toggle_triggers.is_empty() || !self.toggle_targets.is_empty(),
        );
        flags.set(NodeFlags::SHIELD, self.visibility.is_some());
        flags.set(
            NodeFlags::DETACHABLE_CHILDREN,
            self.children.iter().any(ExtractedNode::is_detachable),
        );
        flags.set(NodeFlags::PART, self.part.is_some());
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_node_needs_no_slot() {
        let node = ExtractedNode::element("div").attr("class", "x").part("body");
        assert!(!node.flags().needs_slot(), "static attributes and parts need no slot");
    }

    #[test]
    fn test_detachable_child_marks_parent() {
        let node = ExtractedNode::element("div")
            .child(ExtractedNode::element("p").attached_when(Expr::prop("open")));
        let flags = node.flags();
        assert!(flags.contains(NodeFlags::DETACHABLE_CHILDREN));
        assert!(flags.needs_slot());

        let hidden = ExtractedNode::element("div")
            .child(ExtractedNode::element("p").shown_when(Expr::prop("open")));
        assert!(
            !hidden.flags().contains(NodeFlags::DETACHABLE_CHILDREN),
            "hide-mode children do not need an offset tracker"
        );
    }

    #[test]
    fn test_toggle_target_parses_class_list() {
        let node = ExtractedNode::element("div").toggle_target("alert", "red  bold");
        assert_eq!(node.toggle_targets[0].classes, vec!["red", "bold"]);
        assert!(node.flags().contains(NodeFlags::TOGGLE));
    }
}

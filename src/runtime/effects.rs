//! Effects - what a watch does to its element when a lookup changes.
//!
//! An [`Effect`] receives an [`EffectContext`] holding the element, the new
//! value and the instance scope. The built-ins cover text, attributes,
//! classes and styles; the `dispatch_*` effects drive nested and repeated
//! child components and are registered under the `Always` key by the
//! compiler.
//!
//! ```ignore
//! ExtractedNode::element("span")
//!     .watch(Expr::prop("label"), effects::text())
//!     .watch(Expr::prop("active"), effects::class("active"));
//! ```

use std::rc::Rc;

use super::definition::RepeatAnchor;
use super::error::RuntimeError;
use super::instance::ComponentInstance;
use super::scope::{Controller, Scope};
use super::stash::{Stash, StashKey};
use crate::compiler::{LookupKey, LookupMemo, LookupTable};
use crate::dom::{self, Event, NodeId};
use crate::types::{Path, Value};

/// Effect body. Errors abort the current pass.
pub type Effect = Rc<dyn Fn(&mut EffectContext<'_>) -> Result<(), RuntimeError>>;

/// Event handler bound to an instance element.
pub type Handler = Rc<dyn Fn(&Event, &mut ComponentInstance) -> Result<(), RuntimeError>>;

pub struct EffectContext<'a> {
    element: NodeId,
    elements: &'a [NodeId],
    value: &'a Value,
    scope: Scope<'a>,
    stash: &'a mut Stash,
    lookups: &'a LookupTable,
    memo: &'a mut LookupMemo,
}

impl<'a> EffectContext<'a> {
    pub(crate) fn new(
        element: NodeId,
        elements: &'a [NodeId],
        value: &'a Value,
        scope: Scope<'a>,
        stash: &'a mut Stash,
        lookups: &'a LookupTable,
        memo: &'a mut LookupMemo,
    ) -> Self {
        Self {
            element,
            elements,
            value,
            scope,
            stash,
            lookups,
            memo,
        }
    }

    pub fn element(&self) -> NodeId {
        self.element
    }

    /// The watched value. Null for `Always` callbacks.
    pub fn value(&self) -> &'a Value {
        self.value
    }

    pub fn scope(&self) -> Scope<'a> {
        self.scope
    }

    pub fn props(&self) -> &'a Value {
        self.scope.props()
    }

    pub fn state(&self) -> &'a Value {
        self.scope.state()
    }

    pub fn controller(&self) -> Option<&'a Controller> {
        self.scope.controller()
    }

    /// Evaluate another lookup of this component, through the pass memo.
    pub fn evaluate(&mut self, key: LookupKey) -> Value {
        self.memo.evaluate(self.lookups, key, &self.scope)
    }

    pub(crate) fn stash_mut(&mut self) -> &mut Stash {
        self.stash
    }

    /// First anchor currently under `container`.
    fn resolve_anchor(&self, container: NodeId, anchors: &[RepeatAnchor]) -> Option<NodeId> {
        anchors.iter().find_map(|anchor| match *anchor {
            RepeatAnchor::Node(slot) => {
                let node = self.elements.get(slot).copied()?;
                (dom::parent(node) == Some(container)).then_some(node)
            }
            RepeatAnchor::Repeat(key) => self.stash.repeat_head(key),
        })
    }
}

/// Wrap a closure as an [`Effect`].
pub fn effect(f: impl Fn(&mut EffectContext<'_>) -> Result<(), RuntimeError> + 'static) -> Effect {
    Rc::new(f)
}

/// Wrap a closure as a [`Handler`].
pub fn handler(
    f: impl Fn(&Event, &mut ComponentInstance) -> Result<(), RuntimeError> + 'static,
) -> Handler {
    Rc::new(f)
}

// =============================================================================
// DOM Effects
// =============================================================================

pub fn text() -> Effect {
    effect(|ctx| {
        dom::set_text(ctx.element(), &ctx.value().to_text());
        Ok(())
    })
}

/// Null and `false` remove the attribute, `true` sets it bare.
pub fn attribute(name: &str) -> Effect {
    let name = name.to_string();
    effect(move |ctx| {
        let rendered = match ctx.value() {
            Value::Null | Value::Bool(false) => None,
            Value::Bool(true) => Some(String::new()),
            other => Some(other.to_text()),
        };
        dom::set_attribute(ctx.element(), &name, rendered.as_deref());
        Ok(())
    })
}

pub fn class(name: &str) -> Effect {
    let name = name.to_string();
    effect(move |ctx| {
        dom::set_class(ctx.element(), &name, ctx.value().is_truthy());
        Ok(())
    })
}

/// Switch a group of classes together.
pub fn toggle_classes(classes: Vec<String>) -> Effect {
    effect(move |ctx| {
        let on = ctx.value().is_truthy();
        for class in &classes {
            dom::set_class(ctx.element(), class, on);
        }
        Ok(())
    })
}

pub fn style(property: &str) -> Effect {
    let property = property.to_string();
    effect(move |ctx| {
        let rendered = match ctx.value() {
            Value::Null => None,
            other => Some(other.to_text()),
        };
        dom::set_style(ctx.element(), &property, rendered.as_deref());
        Ok(())
    })
}

// =============================================================================
// Child Dispatch
// =============================================================================

/// Render the nested child held in `stash` with the value of `props`.
pub(crate) fn dispatch_nested(stash: StashKey, props: LookupKey) -> Effect {
    effect(move |ctx| {
        let props = ctx.evaluate(props);
        let controller = ctx.controller().cloned();
        let child = ctx.stash_mut().child(stash)?.clone();
        child.borrow_mut().render(props, controller)?;
        Ok(())
    })
}

pub(crate) fn dispatch_sequential(stash: StashKey, items: LookupKey) -> Effect {
    effect(move |ctx| {
        let items = ctx.evaluate(items);
        let items = repeat_items(&items)?;
        let container = ctx.element();
        let controller = ctx.controller();
        let anchors = ctx.stash_mut().sequential_mut(stash)?.anchors().to_vec();
        let anchor = ctx.resolve_anchor(container, &anchors);
        ctx.stash_mut()
            .sequential_mut(stash)?
            .patch_before(container, anchor, items, controller)
    })
}

pub(crate) fn dispatch_keyed(stash: StashKey, items: LookupKey) -> Effect {
    effect(move |ctx| {
        let items = ctx.evaluate(items);
        let items = repeat_items(&items)?;
        let container = ctx.element();
        let controller = ctx.controller();
        let anchors = ctx.stash_mut().keyed_mut(stash)?.anchors().to_vec();
        let anchor = ctx.resolve_anchor(container, &anchors);
        ctx.stash_mut()
            .keyed_mut(stash)?
            .patch_before(container, anchor, items, controller)
    })
}

/// Null renders as an empty list.
fn repeat_items(items: &Value) -> Result<&[Value], RuntimeError> {
    match items {
        Value::Null => Ok(&[]),
        Value::List(list) => Ok(list.as_slice()),
        other => Err(RuntimeError::NotAList {
            found: other.type_name(),
        }),
    }
}

/// Write the event value into state at `path`, then update.
pub(crate) fn bind_handler(path: Path) -> Handler {
    handler(move |event, instance| {
        instance.set_state_at(&path, event.value.clone());
        instance.update()?;
        Ok(())
    })
}

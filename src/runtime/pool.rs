//! Pools of spare, dismounted instances.
//!
//! Each [`ComponentDefinition`] owns one pool. Repeaters with pool sharing
//! return dropped instances here and pop from it before constructing.

use std::cell::RefCell;
use std::rc::Rc;

use super::definition::ComponentDefinition;
use super::error::RuntimeError;
use super::instance::{Component, ComponentInstance};
use super::scope::Controller;
use crate::dom;
use crate::types::Value;

#[derive(Default)]
pub struct Pool {
    spare: RefCell<Vec<Component>>,
}

impl Pool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.spare.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.spare.borrow().is_empty()
    }

    pub(crate) fn pop(&self) -> Option<Component> {
        self.spare.borrow_mut().pop()
    }

    /// Detach `component`, dismount it (returning its own descendants to
    /// their pools) and keep it for reuse.
    pub fn release(&self, component: Component) {
        {
            let mut instance = component.borrow_mut();
            dom::detach(instance.root());
            instance.dismount();
        }
        self.spare.borrow_mut().push(component);
    }

    /// Destroy every spare instance.
    pub fn clear(&self) {
        let spare = std::mem::take(&mut *self.spare.borrow_mut());
        for component in spare {
            component.borrow_mut().destroy();
        }
    }
}

/// Get a rendered instance of `definition`, reusing a pooled one when
/// `share` is set.
pub fn acquire(
    definition: &Rc<ComponentDefinition>,
    props: Value,
    controller: Option<Controller>,
    share: bool,
) -> Result<Component, RuntimeError> {
    if share {
        if let Some(component) = definition.pool().pop() {
            log::debug!("{}: reusing pooled instance", definition.name());
            component.borrow_mut().render(props, controller)?;
            return Ok(component);
        }
    }
    log::debug!("{}: constructing instance", definition.name());
    ComponentInstance::construct(definition, props, controller)
}

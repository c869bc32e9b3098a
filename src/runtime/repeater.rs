//! Repeaters - reconcile a container's children against a list of items.
//!
//! Both repeaters render one child component instance per item and keep the
//! container's children in item order:
//!
//! - [`SequentialRepeater`] maps item `i` to instance `i`. Items re-render in
//!   place; the DOM only changes when the length does.
//! - [`KeyedRepeater`] maps items to instances by a key read from each item.
//!   Reordered items move their existing instance; a key that survives a
//!   patch keeps its instance.
//!
//! New items are inserted before an anchor node when one is given, so a
//! repeat declared ahead of static siblings stays ahead of them.
//!
//! With pool sharing, dropped instances are dismounted and returned to the
//! child definition's pool, where any call site may pick them up again.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use super::definition::{ComponentDefinition, RepeatAnchor};
use super::error::RuntimeError;
use super::instance::Component;
use super::pool::acquire;
use super::scope::Controller;
use crate::dom::{self, NodeId};
use crate::types::{ItemKey, Path, Value};

fn drop_instance(definition: &ComponentDefinition, share: bool, component: Component) {
    if share {
        definition.pool().release(component);
    } else {
        component.borrow_mut().destroy();
    }
}

// =============================================================================
// Sequential
// =============================================================================

pub struct SequentialRepeater {
    definition: Rc<ComponentDefinition>,
    share: bool,
    instances: Vec<Component>,
    /// How many of `instances` are children of the container.
    attached: usize,
    anchors: Vec<RepeatAnchor>,
}

impl SequentialRepeater {
    pub fn new(definition: Rc<ComponentDefinition>, share: bool) -> Self {
        Self {
            definition,
            share,
            instances: Vec::new(),
            attached: 0,
            anchors: Vec::new(),
        }
    }

    pub(crate) fn with_anchors(mut self, anchors: Vec<RepeatAnchor>) -> Self {
        self.anchors = anchors;
        self
    }

    pub(crate) fn anchors(&self) -> &[RepeatAnchor] {
        &self.anchors
    }

    /// Root of the first attached instance.
    pub fn head(&self) -> Option<NodeId> {
        if self.attached == 0 {
            return None;
        }
        self.instances.first().map(|component| component.borrow().root())
    }

    /// Patch, appending new items to the container.
    pub fn patch(
        &mut self,
        container: NodeId,
        items: &[Value],
        controller: Option<&Controller>,
    ) -> Result<(), RuntimeError> {
        self.patch_before(container, None, items, controller)
    }

    /// Patch, inserting new items before `anchor`.
    pub fn patch_before(
        &mut self,
        container: NodeId,
        anchor: Option<NodeId>,
        items: &[Value],
        controller: Option<&Controller>,
    ) -> Result<(), RuntimeError> {
        for (i, item) in items.iter().enumerate() {
            if i < self.instances.len() {
                self.instances[i]
                    .borrow_mut()
                    .render(item.clone(), controller.cloned())?;
            } else {
                let component = acquire(&self.definition, item.clone(), controller.cloned(), self.share)?;
                self.instances.push(component);
            }
            if i >= self.attached {
                dom::insert_before(container, self.instances[i].borrow().root(), anchor);
                self.attached = i + 1;
            }
        }

        for surplus in self.instances.iter().take(self.attached).skip(items.len()) {
            dom::remove_child(container, surplus.borrow().root());
        }
        self.attached = self.attached.min(items.len());
        if self.share && self.instances.len() > items.len() {
            for component in self.instances.drain(items.len()..) {
                self.definition.pool().release(component);
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.attached
    }

    pub fn is_empty(&self) -> bool {
        self.attached == 0
    }

    /// Every instance the repeater holds, attached or spare.
    pub fn instances(&self) -> &[Component] {
        &self.instances
    }

    /// Dismount for pool return: shared instances go back to the pool,
    /// private ones are dismounted in place.
    pub(crate) fn dismount(&mut self) {
        if self.share {
            self.clear();
        } else {
            for component in &self.instances {
                component.borrow_mut().dismount();
            }
        }
    }

    /// Drop every instance.
    pub(crate) fn clear(&mut self) {
        for component in self.instances.drain(..) {
            dom::detach(component.borrow().root());
            drop_instance(&self.definition, self.share, component);
        }
        self.attached = 0;
    }
}

// =============================================================================
// Keyed
// =============================================================================

pub struct KeyedRepeater {
    definition: Rc<ComponentDefinition>,
    key: Path,
    share: bool,
    instances: HashMap<ItemKey, Component>,
    /// Keys in current DOM order.
    order: Vec<ItemKey>,
    anchors: Vec<RepeatAnchor>,
}

impl KeyedRepeater {
    pub fn new(definition: Rc<ComponentDefinition>, key: Path, share: bool) -> Self {
        Self {
            definition,
            key,
            share,
            instances: HashMap::new(),
            order: Vec::new(),
            anchors: Vec::new(),
        }
    }

    pub(crate) fn with_anchors(mut self, anchors: Vec<RepeatAnchor>) -> Self {
        self.anchors = anchors;
        self
    }

    pub(crate) fn anchors(&self) -> &[RepeatAnchor] {
        &self.anchors
    }

    /// Root of the first instance in DOM order.
    pub fn head(&self) -> Option<NodeId> {
        let key = self.order.first()?;
        self.instances.get(key).map(|component| component.borrow().root())
    }

    fn key_of(&self, item: &Value) -> Result<ItemKey, RuntimeError> {
        let value = item.get_path(&self.key);
        ItemKey::from_value(&value).ok_or_else(|| RuntimeError::InvalidKey {
            path: self.key.to_string(),
            found: value.type_name(),
        })
    }

    /// Patch, appending new items to the container.
    pub fn patch(
        &mut self,
        container: NodeId,
        items: &[Value],
        controller: Option<&Controller>,
    ) -> Result<(), RuntimeError> {
        self.patch_before(container, None, items, controller)
    }

    /// Patch, inserting items past the tracked order before `anchor`.
    pub fn patch_before(
        &mut self,
        container: NodeId,
        anchor: Option<NodeId>,
        items: &[Value],
        controller: Option<&Controller>,
    ) -> Result<(), RuntimeError> {
        let mut seen = HashSet::with_capacity(items.len());
        let mut position = 0;

        for item in items {
            let key = self.key_of(item)?;
            if !seen.insert(key.clone()) {
                log::warn!(
                    "{}: duplicate repeat key `{key}`, item skipped",
                    self.definition.name()
                );
                continue;
            }

            let component = match self.instances.get(&key) {
                Some(existing) => {
                    existing
                        .borrow_mut()
                        .render(item.clone(), controller.cloned())?;
                    existing.clone()
                }
                None => {
                    let created = acquire(&self.definition, item.clone(), controller.cloned(), self.share)?;
                    self.instances.insert(key.clone(), created.clone());
                    created
                }
            };
            let root = component.borrow().root();

            if position >= self.order.len() {
                dom::insert_before(container, root, anchor);
                self.order.push(key);
            } else if self.order[position] != key {
                let occupant = self.instances[&self.order[position]].borrow().root();
                dom::insert_before(container, root, Some(occupant));
                // Pull the key forward; entries before `position` are settled.
                if let Some(old) = self.order[position..].iter().position(|k| *k == key) {
                    self.order.remove(position + old);
                }
                self.order.insert(position, key);
            }
            position += 1;
        }

        for key in self.order.drain(position..) {
            if let Some(component) = self.instances.remove(&key) {
                dom::remove_child(container, component.borrow().root());
                drop_instance(&self.definition, self.share, component);
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn keys(&self) -> &[ItemKey] {
        &self.order
    }

    pub fn instance(&self, key: &ItemKey) -> Option<&Component> {
        self.instances.get(key)
    }

    pub(crate) fn dismount(&mut self) {
        if self.share {
            self.clear();
        } else {
            for component in self.instances.values() {
                component.borrow_mut().dismount();
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        for key in self.order.drain(..) {
            if let Some(component) = self.instances.remove(&key) {
                dom::detach(component.borrow().root());
                drop_instance(&self.definition, self.share, component);
            }
        }
    }
}

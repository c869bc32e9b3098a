//! Consolidation - turn an extracted node tree into a compiled template.
//!
//! Nodes are visited in document pre-order. Every node that carries a
//! directive gets an element slot and one [`WatchDescriptor`] aggregating all
//! of its effects, keyed by deduplicated lookups. Child dispatch (nested,
//! repeated and stub components) is registered under [`CallbackKey::Always`].
//!
//! After the walk, each shield gets its skip count (the number of following
//! watches inside its subtree), each part its watch range, and each repeat
//! the siblings declared after it as insertion anchors.

use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::rc::Rc;

use super::address::{Address, AddressIndex};
use super::error::CompileError;
use super::expr::Expr;
use super::lookup::LookupTable;
use super::node::{ExtractedNode, NodeKind, VisibilityMode};
use super::options::CompileOptions;
use crate::dom::TemplateNode;
use crate::runtime::effects;
use crate::runtime::{
    CallbackKey, CompiledTemplate, ComponentDefinition, DetacherSpec, ElementBindingPlan,
    ListenerBinding, NestedChild, NestedSource, RepeatAnchor, ShieldInfo, StashInit, StashKey,
    WatchDescriptor,
};

#[derive(Debug, Clone, Default)]
pub struct TemplateCompiler {
    options: CompileOptions,
}

impl TemplateCompiler {
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn compile(&self, name: &str, root: &ExtractedNode) -> Result<ComponentDefinition, CompileError> {
        let template = self.consolidate(name, root)?;
        Ok(ComponentDefinition::new(name, Rc::new(template)))
    }

    pub fn consolidate(&self, name: &str, root: &ExtractedNode) -> Result<CompiledTemplate, CompileError> {
        validate_root(name, root)?;
        let index = AddressIndex::build(root);
        validate(name, &index)?;

        let mut builder = Builder::new(name, &self.options, &index);
        for entry in 0..index.len() {
            builder.visit(entry);
        }
        Ok(builder.finish(root))
    }
}

/// Compile with default options.
pub fn compile(name: &str, root: &ExtractedNode) -> Result<ComponentDefinition, CompileError> {
    TemplateCompiler::default().compile(name, root)
}

// =============================================================================
// Validation
// =============================================================================

fn validate_root(component: &str, root: &ExtractedNode) -> Result<(), CompileError> {
    if root.visibility.is_some() {
        return Err(CompileError::ConditionalRoot {
            component: component.to_string(),
        });
    }
    let found = match &root.kind {
        NodeKind::Text(_) => Some("a text node"),
        NodeKind::Element(_) if root.is_repeated() => Some("a repeated component"),
        NodeKind::Element(_) if root.nested.is_some() => Some("a nested component"),
        NodeKind::Element(_) if root.stub.is_some() => Some("a stub"),
        NodeKind::Element(_) => None,
    };
    match found {
        Some(found) => Err(CompileError::InvalidRoot {
            component: component.to_string(),
            found,
        }),
        None => Ok(()),
    }
}

fn validate(component: &str, index: &AddressIndex<'_>) -> Result<(), CompileError> {
    let mut refs = HashSet::new();
    let mut parts = HashSet::new();

    for (i, entry) in index.iter().enumerate() {
        let node = entry.node;
        let address = || entry.address.clone();

        if let Some(name) = &node.reference {
            if !refs.insert(name.as_str()) {
                return Err(CompileError::DuplicateRef {
                    component: component.to_string(),
                    name: name.clone(),
                    address: address(),
                });
            }
        }
        if let Some(name) = &node.part {
            if !parts.insert(name.as_str()) {
                return Err(CompileError::DuplicatePart {
                    component: component.to_string(),
                    name: name.clone(),
                    address: address(),
                });
            }
        }
        for target in &node.toggle_targets {
            if !node.toggle_triggers.iter().any(|t| t.name == target.name) {
                return Err(CompileError::ToggleTargetWithoutTrigger {
                    component: component.to_string(),
                    name: target.name.clone(),
                    address: address(),
                });
            }
        }

        if let Some(nested) = &node.nested {
            if !nested.allow_siblings && index.sibling_count(i) > 1 {
                return Err(CompileError::NestedSiblings {
                    component: component.to_string(),
                    address: address(),
                });
            }
            if nested.repeat.is_some() && node.visibility.is_some() {
                return Err(CompileError::ConditionalRepeat {
                    component: component.to_string(),
                    address: address(),
                });
            }
        }
        if node.nested.is_some() || node.stub.is_some() {
            if !node.attributes.is_empty() {
                return Err(CompileError::NestedAttributes {
                    component: component.to_string(),
                    address: address(),
                });
            }
            if !node.children.is_empty() {
                return Err(CompileError::NestedChildren {
                    component: component.to_string(),
                    address: address(),
                });
            }
        }
    }
    Ok(())
}

// =============================================================================
// Builder
// =============================================================================

struct Builder<'a, 'n> {
    component: &'a str,
    options: &'a CompileOptions,
    index: &'a AddressIndex<'n>,
    lookups: LookupTable,
    watches: Vec<WatchDescriptor>,
    slots: Vec<Vec<usize>>,
    slot_of: Vec<Option<usize>>,
    /// Offset tracker of each parent entry with detachable children.
    trackers: HashMap<usize, StashKey>,
    /// Repeater of each repeated entry.
    repeats: HashMap<usize, StashKey>,
    stash: Vec<StashInit>,
    listeners: Vec<ListenerBinding>,
    refs: Vec<(String, usize)>,
}

impl<'a, 'n> Builder<'a, 'n> {
    fn new(component: &'a str, options: &'a CompileOptions, index: &'a AddressIndex<'n>) -> Self {
        Self {
            component,
            options,
            index,
            lookups: LookupTable::new(),
            watches: Vec::new(),
            slots: Vec::new(),
            slot_of: vec![None; index.len()],
            trackers: HashMap::new(),
            repeats: HashMap::new(),
            stash: Vec::new(),
            listeners: Vec::new(),
            refs: Vec::new(),
        }
    }

    fn slot(&mut self, entry: usize) -> usize {
        if let Some(slot) = self.slot_of[entry] {
            return slot;
        }
        let slot = self.slots.len();
        self.slots.push(self.index.get(entry).dom_path.clone());
        self.slot_of[entry] = Some(slot);
        slot
    }

    fn push_stash(&mut self, init: StashInit) -> StashKey {
        self.stash.push(init);
        StashKey(self.stash.len() - 1)
    }

    fn tracker(&mut self, parent: usize) -> StashKey {
        if let Some(key) = self.trackers.get(&parent) {
            return *key;
        }
        let key = self.push_stash(StashInit::OffsetTracker {
            detached: Vec::new(),
        });
        self.trackers.insert(parent, key);
        key
    }

    fn visit(&mut self, entry_index: usize) {
        let index = self.index;
        let entry = index.get(entry_index);
        let node = entry.node;
        if !entry.flags.needs_slot() {
            return;
        }

        let element_index = match (node.is_repeated(), entry.parent) {
            (true, Some(parent)) => self.slot(parent),
            _ => self.slot(entry_index),
        };

        if let Some(name) = &node.reference {
            self.refs.push((name.clone(), element_index));
        }
        for listener in &node.listeners {
            self.listeners.push(ListenerBinding {
                element_index,
                event: listener.event.clone(),
                handler: listener.handler.clone(),
            });
        }

        let mut watch = WatchDescriptor {
            element_index,
            address: entry.address.clone(),
            callbacks: Vec::new(),
            shield: None,
        };

        if let Some(visibility) = &node.visibility {
            let query = self.lookups.intern(&visibility.query);
            let detacher = match (visibility.mode, entry.parent, entry.sibling_index()) {
                (VisibilityMode::Detach, Some(parent), Some(sibling_index)) => {
                    let tracker = self.tracker(parent);
                    let parent_element = self.slot(parent);
                    if node.nested.is_some() || node.stub.is_some() {
                        if let StashInit::OffsetTracker { detached } = &mut self.stash[tracker.0] {
                            detached.push(sibling_index);
                        }
                    }
                    Some(DetacherSpec {
                        sibling_index,
                        tracker,
                        parent_element,
                    })
                }
                _ => None,
            };
            watch.shield = Some(ShieldInfo {
                query,
                reverse: visibility.reverse,
                skip_count: 0,
                detacher,
            });
        }

        for spec in &node.watches {
            let key = self.lookups.intern(&spec.expr);
            watch.add(CallbackKey::Lookup(key), spec.effect.clone());
        }

        for bind in &node.binds {
            let key = self.lookups.intern(&Expr::State(bind.path.clone()));
            watch.add(CallbackKey::Lookup(key), effects::attribute(&bind.attribute));
            self.listeners.push(ListenerBinding {
                element_index,
                event: bind.event.clone(),
                handler: effects::bind_handler(bind.path.clone()),
            });
        }

        for trigger in &node.toggle_triggers {
            let classes = node
                .toggle_targets
                .iter()
                .find(|target| target.name == trigger.name)
                .map(|target| target.classes.clone())
                .unwrap_or_else(|| vec![trigger.name.clone()]);
            let key = self.lookups.intern(&trigger.expr);
            watch.add(CallbackKey::Lookup(key), effects::toggle_classes(classes));
        }

        if let Some(nested) = &node.nested {
            match &nested.repeat {
                None => {
                    let props = self.lookups.intern(&nested.props);
                    let stash = self.push_stash(StashInit::Nested(NestedSource {
                        element_index,
                        child: NestedChild::Definition(nested.definition.clone()),
                        starts_detached: node.is_detachable(),
                    }));
                    watch.add(CallbackKey::Always, effects::dispatch_nested(stash, props));
                }
                Some(repeat) => {
                    let items = self.lookups.intern(&repeat.items);
                    let share = repeat.share_pool.unwrap_or(self.options.share_pools);
                    let definition = nested.definition.clone();
                    let anchors = Vec::new();
                    let effect = match &repeat.key {
                        None => {
                            let stash = self.push_stash(StashInit::Sequential {
                                definition,
                                share,
                                anchors,
                            });
                            self.repeats.insert(entry_index, stash);
                            effects::dispatch_sequential(stash, items)
                        }
                        Some(key) => {
                            let stash = self.push_stash(StashInit::Keyed {
                                definition,
                                key: key.clone(),
                                share,
                                anchors,
                            });
                            self.repeats.insert(entry_index, stash);
                            effects::dispatch_keyed(stash, items)
                        }
                    };
                    watch.add(CallbackKey::Always, effect);
                }
            }
        } else if let Some(stub) = &node.stub {
            let props = self.lookups.intern(&stub.props);
            let stash = self.push_stash(StashInit::Nested(NestedSource {
                element_index,
                child: NestedChild::Stub(stub.name.clone()),
                starts_detached: node.is_detachable(),
            }));
            watch.add(CallbackKey::Always, effects::dispatch_nested(stash, props));
        }

        if !watch.callbacks.is_empty() || watch.shield.is_some() {
            self.watches.push(watch);
        }
    }

    /// Siblings declared after a repeated entry, as insertion anchors.
    fn anchors_after(&mut self, entry: usize) -> Vec<RepeatAnchor> {
        let index = self.index;
        let Some(parent) = index.get(entry).parent else {
            return Vec::new();
        };
        let following: Vec<usize> = index.children_of(parent).filter(|&s| s > entry).collect();
        following
            .into_iter()
            .filter_map(|sibling| {
                if index.get(sibling).node.is_repeated() {
                    self.repeats.get(&sibling).map(|key| RepeatAnchor::Repeat(*key))
                } else {
                    Some(RepeatAnchor::Node(self.slot(sibling)))
                }
            })
            .collect()
    }

    fn finish(mut self, root: &ExtractedNode) -> CompiledTemplate {
        let mut repeats: Vec<(usize, StashKey)> = self.repeats.iter().map(|(e, k)| (*e, *k)).collect();
        repeats.sort_unstable();
        for (entry, key) in repeats {
            let found = self.anchors_after(entry);
            match &mut self.stash[key.0] {
                StashInit::Sequential { anchors, .. } | StashInit::Keyed { anchors, .. } => {
                    *anchors = found;
                }
                _ => {}
            }
        }

        let addresses: Vec<Address> = self.watches.iter().map(|w| w.address.clone()).collect();
        for (i, watch) in self.watches.iter_mut().enumerate() {
            if let Some(shield) = &mut watch.shield {
                shield.skip_count = addresses[i + 1..]
                    .iter()
                    .take_while(|address| address.extends(&addresses[i]))
                    .count();
            }
        }

        let parts = self
            .index
            .iter()
            .filter_map(|entry| {
                let name = entry.node.part.as_ref()?;
                Some((name.clone(), part_range(&addresses, &entry.address)))
            })
            .collect::<Vec<_>>();

        let markup = build_markup(root);
        let html = markup.to_markup();

        log::debug!(
            "compiled {}: {} watches, {} lookups, {} slots, {} stash slots",
            self.component,
            self.watches.len(),
            self.lookups.len(),
            self.slots.len(),
            self.stash.len()
        );

        CompiledTemplate {
            markup,
            html,
            watches: self.watches,
            lookups: self.lookups,
            bindings: ElementBindingPlan { slots: self.slots },
            stash: self.stash,
            listeners: self.listeners,
            refs: self.refs,
            parts,
            hide_attribute: self.options.hide_attribute.clone(),
        }
    }
}

/// Contiguous watch range of `address` and its descendants.
fn part_range(addresses: &[Address], address: &Address) -> Range<usize> {
    match addresses.iter().position(|a| a.is_within(address)) {
        Some(start) => {
            let len = addresses[start..]
                .iter()
                .take_while(|a| a.is_within(address))
                .count();
            start..start + len
        }
        None => 0..0,
    }
}

/// Static markup. Repeated nodes are left out; nested and stub nodes become
/// bare placeholders.
fn build_markup(node: &ExtractedNode) -> TemplateNode {
    match &node.kind {
        NodeKind::Text(text) => TemplateNode::text(text),
        NodeKind::Element(tag) => {
            let mut element = TemplateNode::element(tag);
            if node.nested.is_some() || node.stub.is_some() {
                return element;
            }
            for (name, value) in &node.attributes {
                element = element.attr(name, value);
            }
            for child in node.children.iter().filter(|c| !c.is_repeated()) {
                element = element.child(build_markup(child));
            }
            element
        }
    }
}

//! Component definitions - the compiled, immutable side of a component.
//!
//! A [`CompiledTemplate`] is what consolidation produces: static markup,
//! the ordered watch list, the lookup table, the element-binding plan, the
//! stash plan, listener bindings, refs and parts. A [`ComponentDefinition`]
//! wraps a template with a name, methods, stubs, initial state and the pool
//! of spare instances. Definitions derived with [`ComponentDefinition::extend`]
//! share their base's template.

use std::cell::OnceCell;
use std::fmt;
use std::ops::Range;
use std::rc::Rc;

use super::effects::{Effect, Handler};
use super::error::RuntimeError;
use super::pool::Pool;
use super::scope::{Method, MethodTable, Scope};
use super::stash::StashKey;
use crate::compiler::{Address, LookupKey, LookupTable};
use crate::dom::{self, NodeId, TemplateNode};
use crate::types::{Path, Value};

// =============================================================================
// Watch List
// =============================================================================

/// Cache key of a callback. `Always` bypasses the value cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackKey {
    Always,
    Lookup(LookupKey),
}

/// Every effect a watch runs for one key.
#[derive(Clone)]
pub struct Callback {
    pub key: CallbackKey,
    pub effects: Vec<Effect>,
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("key", &self.key)
            .field("effects", &self.effects.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetacherSpec {
    /// Markup position among the parent's children.
    pub sibling_index: usize,
    pub tracker: StashKey,
    pub parent_element: usize,
}

/// A node the items of a repeat are inserted before. The first candidate
/// currently under the container wins; with none, items are appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatAnchor {
    /// Element slot of a static sibling declared after the repeat.
    Node(usize),
    /// Another repeat in the same container, declared after this one.
    Repeat(StashKey),
}

/// Visibility gate of a watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShieldInfo {
    pub query: LookupKey,
    pub reverse: bool,
    /// Watches directly after this one that belong to the gated subtree.
    pub skip_count: usize,
    pub detacher: Option<DetacherSpec>,
}

#[derive(Debug, Clone)]
pub struct WatchDescriptor {
    pub element_index: usize,
    pub address: Address,
    pub callbacks: Vec<Callback>,
    pub shield: Option<ShieldInfo>,
}

impl WatchDescriptor {
    pub(crate) fn add(&mut self, key: CallbackKey, effect: Effect) {
        match self.callbacks.iter_mut().find(|c| c.key == key) {
            Some(callback) => callback.effects.push(effect),
            None => self.callbacks.push(Callback {
                key,
                effects: vec![effect],
            }),
        }
    }
}

// =============================================================================
// Instance Plans
// =============================================================================

/// Markup child paths of every element slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementBindingPlan {
    pub slots: Vec<Vec<usize>>,
}

impl ElementBindingPlan {
    /// Locate every slot under a freshly instantiated `root`.
    pub fn bind(&self, root: NodeId, component: &str) -> Result<Vec<NodeId>, RuntimeError> {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, path)| {
                dom::descend(root, path).ok_or_else(|| RuntimeError::MissingElement {
                    component: component.to_string(),
                    index,
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[derive(Clone)]
pub enum NestedChild {
    Definition(Rc<ComponentDefinition>),
    /// Resolved through the method table at construction.
    Stub(String),
}

#[derive(Clone)]
pub struct NestedSource {
    /// Slot holding the placeholder, rebound to the child root.
    pub element_index: usize,
    pub child: NestedChild,
    pub starts_detached: bool,
}

/// How each stash slot is populated at construction.
#[derive(Clone)]
pub enum StashInit {
    OffsetTracker { detached: Vec<usize> },
    Nested(NestedSource),
    Sequential {
        definition: Rc<ComponentDefinition>,
        share: bool,
        anchors: Vec<RepeatAnchor>,
    },
    Keyed {
        definition: Rc<ComponentDefinition>,
        key: Path,
        share: bool,
        anchors: Vec<RepeatAnchor>,
    },
}

impl fmt::Debug for StashInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StashInit::OffsetTracker { detached } => {
                f.debug_struct("OffsetTracker").field("detached", detached).finish()
            }
            StashInit::Nested(source) => f
                .debug_struct("Nested")
                .field("element_index", &source.element_index)
                .field("starts_detached", &source.starts_detached)
                .finish(),
            StashInit::Sequential {
                definition,
                share,
                anchors,
            } => f
                .debug_struct("Sequential")
                .field("definition", &definition.name())
                .field("share", share)
                .field("anchors", anchors)
                .finish(),
            StashInit::Keyed {
                definition,
                key,
                share,
                anchors,
            } => f
                .debug_struct("Keyed")
                .field("definition", &definition.name())
                .field("key", &key.to_string())
                .field("share", share)
                .field("anchors", anchors)
                .finish(),
        }
    }
}

#[derive(Clone)]
pub struct ListenerBinding {
    pub element_index: usize,
    pub event: String,
    pub handler: Handler,
}

// =============================================================================
// Compiled Template
// =============================================================================

pub struct CompiledTemplate {
    pub(crate) markup: TemplateNode,
    pub(crate) html: String,
    pub(crate) watches: Vec<WatchDescriptor>,
    pub(crate) lookups: LookupTable,
    pub(crate) bindings: ElementBindingPlan,
    pub(crate) stash: Vec<StashInit>,
    pub(crate) listeners: Vec<ListenerBinding>,
    pub(crate) refs: Vec<(String, usize)>,
    pub(crate) parts: Vec<(String, Range<usize>)>,
    pub(crate) hide_attribute: String,
}

impl CompiledTemplate {
    pub fn markup(&self) -> &TemplateNode {
        &self.markup
    }

    /// Serialized static markup.
    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn watches(&self) -> &[WatchDescriptor] {
        &self.watches
    }

    pub fn lookups(&self) -> &LookupTable {
        &self.lookups
    }

    pub fn bindings(&self) -> &ElementBindingPlan {
        &self.bindings
    }

    pub fn stash_plan(&self) -> &[StashInit] {
        &self.stash
    }

    pub fn listeners(&self) -> &[ListenerBinding] {
        &self.listeners
    }

    pub fn ref_slot(&self, name: &str) -> Option<usize> {
        self.refs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, slot)| *slot)
    }

    /// Watch range of a named part.
    pub fn part(&self, name: &str) -> Option<Range<usize>> {
        self.parts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, range)| range.clone())
    }

    pub fn hide_attribute(&self) -> &str {
        &self.hide_attribute
    }
}

impl fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("html", &self.html)
            .field("watches", &self.watches)
            .field("lookups", &self.lookups)
            .field("bindings", &self.bindings)
            .field("stash", &self.stash)
            .field("refs", &self.refs)
            .field("parts", &self.parts)
            .finish()
    }
}

// =============================================================================
// Component Definition
// =============================================================================

pub struct ComponentDefinition {
    name: String,
    template: Rc<CompiledTemplate>,
    base: Option<Rc<ComponentDefinition>>,
    methods: Vec<(String, Method)>,
    stubs: Vec<(String, Rc<ComponentDefinition>)>,
    initial_state: Value,
    table: OnceCell<Rc<MethodTable>>,
    pool: Pool,
}

impl ComponentDefinition {
    pub(crate) fn new(name: &str, template: Rc<CompiledTemplate>) -> Self {
        Self {
            name: name.to_string(),
            template,
            base: None,
            methods: Vec::new(),
            stubs: Vec::new(),
            initial_state: Value::Null,
            table: OnceCell::new(),
            pool: Pool::new(),
        }
    }

    /// Derive a definition that shares `base`'s template and inherits its
    /// methods, stubs and initial state.
    pub fn extend(base: &Rc<ComponentDefinition>, name: &str) -> Self {
        let mut derived = Self::new(name, base.template.clone());
        derived.initial_state = base.initial_state.clone();
        derived.base = Some(base.clone());
        derived
    }

    pub fn with_method(
        mut self,
        name: &str,
        method: impl Fn(&Scope<'_>, &[Value]) -> Value + 'static,
    ) -> Self {
        self.methods.push((name.to_string(), Rc::new(method)));
        self
    }

    pub fn with_stub(mut self, name: &str, definition: &Rc<ComponentDefinition>) -> Self {
        self.stubs.push((name.to_string(), definition.clone()));
        self
    }

    pub fn with_state(mut self, state: Value) -> Self {
        self.initial_state = state;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> &Rc<CompiledTemplate> {
        &self.template
    }

    pub fn base(&self) -> Option<&Rc<ComponentDefinition>> {
        self.base.as_ref()
    }

    pub fn initial_state(&self) -> &Value {
        &self.initial_state
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Methods and stubs of the whole base chain, base first. Built once.
    pub fn method_table(&self) -> Rc<MethodTable> {
        self.table
            .get_or_init(|| {
                let mut table = self
                    .base
                    .as_ref()
                    .map(|base| (*base.method_table()).clone())
                    .unwrap_or_default();
                for (name, method) in &self.methods {
                    table.insert_shared(name, method.clone());
                }
                for (name, stub) in &self.stubs {
                    table.insert_stub(name, stub.clone());
                }
                Rc::new(table)
            })
            .clone()
    }
}

impl fmt::Debug for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("name", &self.name)
            .field("base", &self.base.as_ref().map(|b| b.name()))
            .field("watches", &self.template.watches.len())
            .field("pool", &self.pool.len())
            .finish()
    }
}

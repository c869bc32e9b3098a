//! Runtime - instances and the patch engine.
//!
//! - [`definition`] - Compiled templates, watch descriptors, definitions
//! - [`instance`] - Live instances: construct, render, update, dismount
//! - [`patcher`] - The watch-list executor
//! - [`detacher`] - Positional attach/detach with per-parent offset trackers
//! - [`repeater`] - Sequential and keyed list reconciliation
//! - [`pool`] - Spare instances owned by each definition
//! - [`effects`] - Built-in effects and child dispatch

mod definition;
mod detacher;
pub mod effects;
mod error;
mod instance;
mod patcher;
mod pool;
mod repeater;
mod scope;
mod stash;

pub use definition::{
    Callback, CallbackKey, CompiledTemplate, ComponentDefinition, DetacherSpec,
    ElementBindingPlan, ListenerBinding, NestedChild, NestedSource, RepeatAnchor, ShieldInfo,
    StashInit, WatchDescriptor,
};
pub use detacher::{Detacher, OffsetTracker};
pub use effects::{Effect, EffectContext, Handler};
pub use error::RuntimeError;
pub use instance::{Component, ComponentInstance};
pub use patcher::{patch, PatchStats};
pub use pool::{acquire, Pool};
pub use repeater::{KeyedRepeater, SequentialRepeater};
pub use scope::{Controller, Method, MethodTable, Scope};
pub use stash::{Stash, StashEntry, StashKey};

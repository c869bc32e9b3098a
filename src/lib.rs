//! # spark-view
//!
//! Compiled reactive view templates.
//!
//! A component is compiled once into static markup plus a flat watch list
//! indexed by node address. Instances clone the markup and run the watch
//! list on every update, touching only what changed. There is no tree
//! diffing: hidden subtrees are skipped in one step, detached nodes are
//! reinserted by offset arithmetic, and lists reconcile against pooled
//! child instances.
//!
//! ## Pipeline
//!
//! ```text
//! ExtractedNode tree → AddressIndex → TemplateCompiler → ComponentDefinition
//!                                                            ↓
//!                       dom  ←  RuntimePatcher ← ComponentInstance::update()
//!                                 ↳ Detacher, Sequential/Keyed repeater
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Core types (Value, Path, ItemKey)
//! - [`compiler`] - Extracted nodes, addresses, lookups, consolidation
//! - [`runtime`] - Definitions, instances, patcher, detacher, repeaters, pools
//! - [`dom`] - Node arena the runtime renders into
//! - [`reactive`] - Observables and mounted components (spark-signals)

pub mod compiler;
pub mod dom;
pub mod reactive;
pub mod runtime;
pub mod types;

// Re-export commonly used items
pub use types::*;

pub use compiler::{
    compile, Address, AddressIndex, CompileError, CompileOptions, Expr, ExtractedNode,
    LookupKey, LookupTable, TemplateCompiler,
};

pub use runtime::{
    effects, Component, ComponentDefinition, ComponentInstance, Controller, Detacher,
    KeyedRepeater, OffsetTracker, PatchStats, Pool, RuntimeError, Scope, SequentialRepeater,
};

pub use dom::{reset_document, NodeId};

pub use reactive::{mount, MountHandle, Observable};

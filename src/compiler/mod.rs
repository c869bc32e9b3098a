//! Compiler - consolidation of extracted node trees.
//!
//! - [`node`] - The extracted node tree handed over by the front-end
//! - [`expr`] - Watch expressions
//! - [`address`] - Pre-order addresses and markup paths
//! - [`lookup`] - Deduplicated lookup table and per-pass memo
//! - [`consolidate`] - The template compiler itself

pub mod address;
mod consolidate;
mod error;
pub mod expr;
pub mod lookup;
pub mod node;
mod options;

pub use address::{Address, AddressEntry, AddressIndex};
pub use consolidate::{compile, TemplateCompiler};
pub use error::CompileError;
pub use expr::{Expr, Literal};
pub use lookup::{LookupFn, LookupKey, LookupMemo, LookupTable};
pub use node::{
    BindSpec, ExtractedNode, ListenerSpec, NestedSpec, NodeFlags, NodeKind, RepeatSpec, StubSpec,
    ToggleTarget, ToggleTrigger, Visibility, VisibilityMode, WatchSpec,
};
pub use options::CompileOptions;

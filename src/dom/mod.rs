//! Host rendering surface.
//!
//! The patch engine drives this surface and nothing else:
//! - [`document`] - Node arena: clone templates, locate by child path,
//!   insert/remove/append, attributes, text, classes, styles
//! - [`template`] - Immutable static markup that instances are cloned from
//! - [`events`] - Listener registration and dispatch
//!
//! # Architecture
//!
//! Like the rest of the engine, state lives in thread-local parallel arrays
//! and nodes are plain indices ([`NodeId`]). All operations are synchronous;
//! [`reset_document`] clears everything between tests.

mod document;
pub mod events;
mod template;

pub use document::*;
pub use events::{dispatch, listen, Event, Listener};
pub use template::TemplateNode;

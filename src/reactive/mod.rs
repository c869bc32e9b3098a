//! Reactive bridge - observables and mounted components.
//!
//! - [`observable`] - Explicit change-notifying wrapper around values
//! - [`mount`] - Render effect tying a component to a tracked observable

pub mod mount;
pub mod observable;

pub use mount::{mount, MountHandle};
pub use observable::Observable;

use thiserror::Error;

/// Errors raised while constructing or patching an instance.
///
/// A failing effect aborts the rest of the pass; the watches already visited
/// stay applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("{component}: stash slot {key} does not hold {expected}")]
    StashMismatch {
        component: String,
        key: usize,
        expected: &'static str,
    },

    #[error("{component}: element slot {index} is missing from the instantiated markup")]
    MissingElement { component: String, index: usize },

    #[error("repeat items must be a list, found {found}")]
    NotAList { found: &'static str },

    #[error("repeat key `{path}` must be a bool, int or string, found {found}")]
    InvalidKey { path: String, found: &'static str },

    #[error("{component}: no stub named `{name}` in the method table")]
    UnknownStub { component: String, name: String },

    #[error("{component}: no part named `{name}`")]
    UnknownPart { component: String, name: String },

    #[error("effect failed: {0}")]
    Effect(String),
}

impl RuntimeError {
    /// Wrap a user effect failure.
    pub fn effect(message: impl Into<String>) -> Self {
        Self::Effect(message.into())
    }
}

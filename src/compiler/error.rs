use thiserror::Error;

use super::address::Address;

/// Fatal consolidation errors. Any of these halts compilation of the
/// component.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("{component}: ref `{name}` is declared more than once (again at {address})")]
    DuplicateRef {
        component: String,
        name: String,
        address: Address,
    },

    #[error("{component}: toggle target `{name}` at {address} has no matching trigger")]
    ToggleTargetWithoutTrigger {
        component: String,
        name: String,
        address: Address,
    },

    #[error("{component}: the component root cannot be conditionally rendered")]
    ConditionalRoot { component: String },

    #[error("{component}: the root must be a plain element, found {found}")]
    InvalidRoot { component: String, found: &'static str },

    #[error("{component}: nested node at {address} has siblings; call allow_siblings() to permit them")]
    NestedSiblings { component: String, address: Address },

    #[error("{component}: nested node at {address} cannot carry plain attributes")]
    NestedAttributes { component: String, address: Address },

    #[error("{component}: nested node at {address} cannot have child nodes")]
    NestedChildren { component: String, address: Address },

    #[error("{component}: repeated node at {address} cannot be conditionally rendered; toggle its container")]
    ConditionalRepeat { component: String, address: Address },

    #[error("{component}: part `{name}` is declared more than once (again at {address})")]
    DuplicatePart {
        component: String,
        name: String,
        address: Address,
    },
}

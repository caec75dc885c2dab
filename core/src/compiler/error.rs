//! Translation errors.

use thiserror::Error;

use crate::vm::InvalidCode;

/// Errors that can occur while translating a program.
///
/// A checked program never produces these except for the slot and argument
/// limits; anything else means the checker and the translator disagree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("program has no `main` function")]
    MissingMain,

    #[error("call to unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error("unbound name '{name}' in function '{function}'")]
    UnboundName { name: String, function: String },

    #[error("'{name}' takes {expected} argument(s), called with {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("duplicate parameter '{name}' in function '{function}'")]
    DuplicateParameter { name: String, function: String },

    /// More simultaneous locals than a slot index can address.
    #[error("too many local variables in function '{function}' (limit: {})", u16::MAX)]
    TooManySlots { function: String },

    #[error("too many arguments in call to '{name}' (limit: {})", u16::MAX)]
    TooManyArguments { name: String },

    #[error("array literal with too many elements in function '{function}' (limit: {})", u16::MAX)]
    TooManyElements { function: String },

    /// A jump or call site whose label was never placed.
    #[error("unresolved jump at offset {offset} (to {key})")]
    UnresolvedPatch { offset: usize, key: String },

    #[error(transparent)]
    InvalidCode(#[from] InvalidCode),
}

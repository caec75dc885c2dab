//! Translator from the checked syntax tree to VM instructions.
//!
//! ## Design
//!
//! - `main` is laid out first; the other functions follow in declaration order
//! - Forward jumps and calls are emitted with placeholder targets and recorded
//!   in a patch worklist, resolved once every label and function entry is known
//! - Slots are allocated per lexical scope and reused once the scope closes
//! - Every instruction is mapped to the source position of its statement

mod error;
mod translator;

#[cfg(test)]
mod translator_test;

pub use error::TranslateError;
pub use translator::{Translator, translate};

//! Textual assembly form of [`Code`](crate::vm::Code).
//!
//! # Syntax
//!
//! ```text
//! .entry 0
//! .function main entry=0 end=9 arity=0 slots=1
//! .local main x 0 5..9
//!     ENTER 1                  ; 1:1
//!     PUSH "hello, world"      ; 2:5
//!     CALL 12 2                ; 3:5   # comment
//! ```
//!
//! - One instruction per line: `MNEMONIC operands`, optionally followed by
//!   `; line:column` (the source map entry)
//! - Jump and call targets are absolute instruction offsets
//! - `PUSH` takes an integer, `true`/`false`, a double-quoted string or `()`
//! - Directives start with `.`
//! - `#` starts a comment; blank lines are ignored

mod error;
mod reader;
mod writer;


pub use error::{AsmError, AsmErrorKind};
pub use reader::parse_asm;
pub use writer::{Listing, to_asm};

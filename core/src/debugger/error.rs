use thiserror::Error;

use crate::vm::VmError;

/// Misuse of the debugger. None of these change the machine state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DebugError {
    #[error("no code at line {line}")]
    NoCodeAtLine { line: u32 },

    #[error("no variable '{name}' in scope")]
    UnknownVariable { name: String },

    #[error("the program is not running")]
    Terminated,

    #[error("unknown command '{0}' (try 'help')")]
    UnknownCommand(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    /// Inconsistent code or machine state.
    #[error(transparent)]
    Internal(#[from] VmError),
}

//! Public error types for the SOFL API.
//!
//! Internal errors of each stage are converted to these types at the API
//! boundary.

use core::fmt;

use thiserror::Error;

use crate::analyzer::CheckError;
use crate::asm::AsmError;
use crate::compiler::TranslateError;
use crate::parser::{ParseError, Span};
use crate::vm::VmError;

/// Public error type for all SOFL operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Compilation errors (parse errors, checker errors).
    ///
    /// Contains one or more diagnostics with source locations.
    #[error("compilation failed with {} error(s)", .diagnostics.len())]
    Compilation { diagnostics: Vec<Diagnostic> },

    /// Malformed assembly listing.
    #[error(transparent)]
    Assembly(#[from] AsmError),

    /// Bug in the translator or an inconsistent instruction sequence.
    #[error("internal error: {0}")]
    Internal(String),

    /// Runtime error raised by the virtual machine.
    #[error(transparent)]
    Execution(#[from] VmError),
}

impl From<TranslateError> for Error {
    fn from(e: TranslateError) -> Self {
        Error::Internal(e.to_string())
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::Compilation {
            diagnostics: vec![e.to_diagnostic()],
        }
    }
}

impl From<Vec<CheckError>> for Error {
    fn from(errors: Vec<CheckError>) -> Self {
        Error::Compilation {
            diagnostics: errors.iter().map(CheckError::to_diagnostic).collect(),
        }
    }
}

/// A diagnostic message (error, warning, or info) with source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity level (error, warning, info).
    pub severity: Severity,

    /// Primary diagnostic message.
    pub message: String,

    /// Source location of the primary issue.
    pub span: Span,

    /// Optional help text suggesting how to fix the issue.
    pub help: Option<String>,

    /// Optional error code (e.g., "C001") for documentation lookup.
    pub code: Option<String>,
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Error - compilation cannot succeed.
    Error,
    /// Warning - suspicious code that might be wrong.
    Warning,
    /// Info - informational message.
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)?;
        if let Some(ref code) = self.code {
            write!(f, " [{}]", code)?;
        }
        if let Some(ref help) = self.help {
            write!(f, "\nhelp: {}", help)?;
        }
        Ok(())
    }
}

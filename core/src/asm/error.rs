use thiserror::Error;

/// Error in an assembly listing, with the 1-based line it was found on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {kind}")]
pub struct AsmError {
    pub line: usize,
    pub kind: AsmErrorKind,
}

impl AsmError {
    pub fn new(line: usize, kind: AsmErrorKind) -> Self {
        Self { line, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AsmErrorKind {
    #[error("unknown instruction '{0}'")]
    UnknownMnemonic(String),

    #[error("unknown directive '{0}'")]
    UnknownDirective(String),

    #[error("{name} expects {expected} operand(s), found {found}")]
    OperandCount {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("invalid {expected} '{token}'")]
    InvalidOperand {
        token: String,
        expected: &'static str,
    },

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("source position without an instruction")]
    DanglingPosition,

    #[error("duplicate .entry directive")]
    DuplicateEntry,

    #[error("missing .entry directive")]
    MissingEntry,

    #[error(".local refers to undeclared function '{0}'")]
    UnknownFunction(String),

    #[error("{0}")]
    Invalid(String),
}

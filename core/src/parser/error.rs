use thiserror::Error;

use crate::api::{Diagnostic, Severity};
use crate::parser::{Pos, Rule, Span};

/// Parser error with its location in the program source.
#[derive(Debug, Clone, Error)]
#[error("{kind} at {pos}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
    pub pos: Pos,
}

/// Specific kinds of parse errors
#[derive(Debug, Clone, Error)]
pub enum ParseErrorKind {
    /// Grammar mismatch reported by pest
    #[error("{message}")]
    Syntax { message: String },
    /// Invalid number literal
    #[error("invalid number literal '{text}'")]
    InvalidNumber { text: String },
    /// Empty input
    #[error("empty program")]
    Empty,
    /// Other parse errors
    #[error("{message}")]
    Other { message: String },
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, source: &str, span: Span) -> Self {
        let pos = pos_of(source, span.0.start);
        Self { kind, span, pos }
    }

    pub(crate) fn from_pest(err: pest::error::Error<Rule>, source: &str) -> Self {
        let span = match err.location {
            pest::error::InputLocation::Pos(p) => Span::new(p, p),
            pest::error::InputLocation::Span((start, end)) => Span::new(start, end),
        };
        let message = err.variant.message().to_string();
        Self::new(ParseErrorKind::Syntax { message }, source, span)
    }

    /// Convert to a Diagnostic for API boundary
    pub fn to_diagnostic(&self) -> Diagnostic {
        let (code, help) = match &self.kind {
            ParseErrorKind::Syntax { .. } => ("P001", None),
            ParseErrorKind::InvalidNumber { .. } => (
                "P002",
                Some("integer literals must fit in a signed 64-bit integer"),
            ),
            ParseErrorKind::Empty => ("P003", Some("a program needs at least `fn main() {}`")),
            ParseErrorKind::Other { .. } => ("P999", None),
        };
        Diagnostic {
            severity: Severity::Error,
            message: self.kind.to_string(),
            span: self.span.clone(),
            help: help.map(str::to_string),
            code: Some(code.to_string()),
        }
    }
}

/// Line/column (1-based) of a byte offset.
pub fn pos_of(source: &str, offset: usize) -> Pos {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before.rfind('\n').map_or(offset, |nl| offset - nl - 1) + 1;
    Pos::new(line as u32, column as u32)
}

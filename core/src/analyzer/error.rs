use crate::api::{Diagnostic, Severity};
use crate::parser::{Pos, Span};

/// Static checking error with the location of the offending code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckError {
    pub kind: CheckErrorKind,
    pub pos: Pos,
}

impl core::fmt::Display for CheckError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let diagnostic = self.to_diagnostic();
        write!(f, "{}: {} at {}", diagnostic.severity, diagnostic.message, self.pos)?;

        if let Some(ref code) = diagnostic.code {
            write!(f, " [{}]", code)?;
        }

        Ok(())
    }
}

impl std::error::Error for CheckError {}

/// Specific kinds of checking errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckErrorKind {
    /// Variable used or assigned before any `let` in scope
    UndeclaredVariable { name: String, span: Span },
    /// Call to a function that is not declared
    UnknownFunction { name: String, span: Span },
    /// Call with the wrong number of arguments
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
        span: Span,
    },
    /// Two functions with the same name
    DuplicateFunction { name: String, span: Span },
    /// Two parameters of one function with the same name
    DuplicateParameter { name: String, span: Span },
    /// No `main` function
    MissingMain,
    /// `main` declared with parameters
    MainWithParameters { span: Span },
}

impl CheckErrorKind {
    /// Get the span of the error
    pub fn span(&self) -> Span {
        match self {
            CheckErrorKind::UndeclaredVariable { span, .. } => span.clone(),
            CheckErrorKind::UnknownFunction { span, .. } => span.clone(),
            CheckErrorKind::ArityMismatch { span, .. } => span.clone(),
            CheckErrorKind::DuplicateFunction { span, .. } => span.clone(),
            CheckErrorKind::DuplicateParameter { span, .. } => span.clone(),
            CheckErrorKind::MissingMain => Span::new(0, 0),
            CheckErrorKind::MainWithParameters { span } => span.clone(),
        }
    }
}

impl CheckError {
    pub fn new(kind: CheckErrorKind, pos: Pos) -> Self {
        Self { kind, pos }
    }

    /// Convert to a Diagnostic for API boundary
    pub fn to_diagnostic(&self) -> Diagnostic {
        let (message, code, help) = match &self.kind {
            CheckErrorKind::UndeclaredVariable { name, .. } => (
                format!("Undeclared variable '{}'", name),
                "C001",
                Some("Declare the variable with `let` before using it"),
            ),
            CheckErrorKind::UnknownFunction { name, .. } => {
                (format!("Unknown function '{}'", name), "C002", None)
            }
            CheckErrorKind::ArityMismatch {
                name,
                expected,
                found,
                ..
            } => (
                format!(
                    "Function '{}' takes {} argument(s), found {}",
                    name, expected, found
                ),
                "C003",
                Some("Check the number of arguments in the function call"),
            ),
            CheckErrorKind::DuplicateFunction { name, .. } => (
                format!("Function '{}' is declared more than once", name),
                "C004",
                None,
            ),
            CheckErrorKind::DuplicateParameter { name, .. } => (
                format!("Duplicate parameter name '{}'", name),
                "C005",
                Some("Each parameter must have a unique name"),
            ),
            CheckErrorKind::MissingMain => (
                "Program has no `main` function".to_string(),
                "C006",
                Some("Add `fn main() { ... }`"),
            ),
            CheckErrorKind::MainWithParameters { .. } => (
                "`main` must not take parameters".to_string(),
                "C007",
                None,
            ),
        };

        Diagnostic {
            severity: Severity::Error,
            message,
            span: self.kind.span(),
            help: help.map(|s| s.to_string()),
            code: Some(code.to_string()),
        }
    }
}

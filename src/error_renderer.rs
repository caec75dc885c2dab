//! Error rendering using ariadne
//!
//! This module renders SOFL errors with source code snippets: compilation
//! diagnostics at their spans, runtime faults at the source line of the
//! faulting instruction, and assembly errors at the offending listing line.

use core::ops::Range;
use std::io::Write;

use crate::{Diagnostic, Error, Severity};
use ariadne::{ColorGenerator, IndexType, Label, Report, ReportKind, Source};
use sofl_core::parser::Span;
use sofl_core::vm::{Code, Fault, VmError};

/// A source text and the name it is reported under.
#[derive(Debug, Clone, Copy)]
pub struct SourceFile<'a> {
    pub name: &'a str,
    pub text: &'a str,
}

impl<'a> SourceFile<'a> {
    pub fn new(name: &'a str, text: &'a str) -> Self {
        Self { name, text }
    }
}

/// Render an error with formatting to stderr
///
/// `code` is used to map runtime faults back to source lines.
///
/// # Example
/// ```no_run
/// use sofl::{SourceFile, render_error};
///
/// let source = "fn main() { print x; }";
/// if let Err(e) = sofl::compile(source) {
///     render_error(&e, SourceFile::new("example.sofl", source), None);
/// }
/// ```
pub fn render_error(error: &Error, file: SourceFile<'_>, code: Option<&Code>) {
    render_error_to_writer(error, file, code, &mut std::io::stderr(), true).ok();
}

/// Render an error to a specific writer
pub fn render_error_to(
    error: &Error,
    file: SourceFile<'_>,
    code: Option<&Code>,
    writer: &mut dyn Write,
) -> std::io::Result<()> {
    render_error_to_writer(error, file, code, writer, true)
}

/// Render an error to a String (useful for tests, web UIs, etc.)
pub fn render_error_to_string(error: &Error, file: SourceFile<'_>, code: Option<&Code>) -> String {
    let mut buf = Vec::new();
    render_error_to_writer(error, file, code, &mut buf, true).ok();
    String::from_utf8_lossy(&buf).to_string()
}

/// Render an error to a String without color codes (useful for tests)
pub fn render_error_to_string_no_color(
    error: &Error,
    file: SourceFile<'_>,
    code: Option<&Code>,
) -> String {
    let mut buf = Vec::new();
    render_error_to_writer(error, file, code, &mut buf, false).ok();
    String::from_utf8_lossy(&buf).to_string()
}

/// Diagnostic pointing at the source line of the instruction that faulted.
pub fn fault_diagnostic(fault: &Fault, code: &Code, source: &str) -> Option<Diagnostic> {
    let pos = code.position(fault.offset)?;
    let span = line_span(source, pos.line, pos.column)?;
    Some(Diagnostic {
        severity: Severity::Error,
        message: format!("{}: {}", fault.kind, fault.message),
        span: Span(span),
        help: None,
        code: None,
    })
}

fn render_error_to_writer(
    error: &Error,
    file: SourceFile<'_>,
    code: Option<&Code>,
    writer: &mut dyn Write,
    use_color: bool,
) -> std::io::Result<()> {
    match error {
        Error::Compilation { diagnostics } => render_diagnostics(file, diagnostics, writer, use_color),
        Error::Execution(VmError::Fault(fault)) => {
            match code.and_then(|code| fault_diagnostic(fault, code, file.text)) {
                Some(diagnostic) => render_diagnostics(file, &[diagnostic], writer, use_color),
                None => writeln!(writer, "runtime error: {}", fault),
            }
        }
        Error::Assembly(e) => match line_span(file.text, e.line as u32, 1) {
            Some(span) => {
                let diagnostic = Diagnostic {
                    severity: Severity::Error,
                    message: e.kind.to_string(),
                    span: Span(span),
                    help: None,
                    code: None,
                };
                render_diagnostics(file, &[diagnostic], writer, use_color)
            }
            None => writeln!(writer, "assembly error: {}", e),
        },
        Error::Execution(e) => writeln!(writer, "internal error: {}", e),
        Error::Internal(msg) => writeln!(writer, "internal error: {}", msg),
    }
}

fn render_diagnostics(
    file: SourceFile<'_>,
    diagnostics: &[Diagnostic],
    writer: &mut dyn Write,
    use_color: bool,
) -> std::io::Result<()> {
    for diag in diagnostics {
        let mut colors = ColorGenerator::new();
        colors.next(); // Skip the first color.

        let kind = match diag.severity {
            Severity::Error => ReportKind::Error,
            Severity::Warning => ReportKind::Warning,
            Severity::Info => ReportKind::Advice,
        };

        let mut report = Report::build(kind, (file.name, diag.span.0.clone()))
            .with_message(&diag.message)
            .with_config(
                ariadne::Config::default()
                    .with_color(use_color)
                    .with_index_type(IndexType::Byte),
            );

        if let Some(code) = &diag.code {
            report = report.with_code(code);
        }

        let color = colors.next();
        report = report.with_label(
            Label::new((file.name, diag.span.0.clone()))
                .with_message(&diag.message)
                .with_color(color),
        );

        if let Some(help) = &diag.help {
            report = report.with_help(help);
        }

        // Render to the writer (need to reborrow to avoid moving)
        report
            .finish()
            .write((file.name, Source::from(file.text)), &mut *writer)?;
    }

    Ok(())
}

/// Byte range from `column` (1-based, in chars) to the end of `line`.
fn line_span(source: &str, line: u32, column: u32) -> Option<Range<usize>> {
    let mut start = 0;
    for (index, text) in source.split_inclusive('\n').enumerate() {
        if index + 1 == line as usize {
            let body = text.trim_end_matches(['\n', '\r']);
            let offset = body
                .char_indices()
                .nth(column.saturating_sub(1) as usize)
                .map_or(0, |(i, _)| i);
            return Some(start + offset..start + body.len());
        }
        start += text.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sofl_core::api::ExecutionOptions;
    use sofl_core::vm::VM;

    fn file(text: &str) -> SourceFile<'_> {
        SourceFile::new("test.sofl", text)
    }

    #[test]
    fn test_render_parse_error() {
        let source = "fn main() { print 1 + ; }";
        let e = crate::compile(source).unwrap_err();
        let output = render_error_to_string_no_color(&e, file(source), None);

        assert!(output.contains("Error"), "{}", output);
        assert!(output.contains("P001"), "{}", output);
        assert!(output.contains("fn main() { print 1 + ; }"), "{}", output);
    }

    #[test]
    fn test_render_check_errors() {
        let source = indoc! {"
            fn main() {
                print missing;
                helper(1);
            }
        "};
        let e = crate::compile(source).unwrap_err();
        let output = render_error_to_string_no_color(&e, file(source), None);

        assert!(output.contains("C001"), "{}", output);
        assert!(output.contains("C002"), "{}", output);
        assert!(output.contains("test.sofl"), "{}", output);
        assert!(output.contains("print missing;"), "{}", output);
    }

    #[test]
    fn test_render_fault_at_source_line() {
        let source = indoc! {"
            fn main() {
                let zero = 0;
                print 1 / zero;
            }
        "};
        let code = crate::compile(source).unwrap();
        let mut vm = VM::new(&code, ExecutionOptions::default(), std::io::sink());
        let e = Error::from(vm.run().unwrap_err());

        let output = render_error_to_string_no_color(&e, file(source), Some(&code));
        assert!(output.contains("division by zero: 1 / 0"), "{}", output);
        assert!(output.contains("print 1 / zero;"), "{}", output);

        // Without the code there is no source line to show.
        let output = render_error_to_string_no_color(&e, file(source), None);
        assert!(output.starts_with("runtime error: division by zero"), "{}", output);
    }

    #[test]
    fn test_render_assembly_error() {
        let text = ".entry 0\n    FROB\n";
        let e = Error::from(sofl_core::asm::parse_asm(text).unwrap_err());
        let output = render_error_to_string_no_color(&e, SourceFile::new("test.sasm", text), None);
        assert!(output.contains("unknown instruction 'FROB'"), "{}", output);
        assert!(output.contains("test.sasm"), "{}", output);
    }

    #[test]
    fn test_line_span() {
        let source = "ab\n  cd\r\nef";
        assert_eq!(line_span(source, 1, 1), Some(0..2));
        assert_eq!(line_span(source, 2, 3), Some(5..7));
        assert_eq!(line_span(source, 3, 1), Some(9..11));
        assert_eq!(line_span(source, 4, 1), None);
    }

    #[test]
    fn test_render_to_string_captures_output() {
        let source = "fn main() {";
        let e = crate::compile(source).unwrap_err();
        let output = render_error_to_string(&e, file(source), None);
        assert!(!output.is_empty());
        assert!(output.lines().count() > 1);
    }
}

//! Public API of the SOFL toolchain.
//!
//! The pipeline is source text -> [`parser`](crate::parser) ->
//! [`analyzer`](crate::analyzer) -> [`compiler`](crate::compiler) -> [`Code`],
//! which the [`VM`](crate::vm::VM) runs or the
//! [`Debugger`](crate::debugger::Debugger) drives.
//!
//! # Example
//!
//! ```
//! use sofl_core::api::{self, ExecutionOptions};
//! use sofl_core::vm::VM;
//!
//! let code = api::compile("fn main() { print 6 * 7; }").unwrap();
//! let mut vm = VM::new(&code, ExecutionOptions::default(), Vec::new());
//! vm.run().unwrap();
//! assert_eq!(vm.output().as_slice(), b"42\n");
//! ```

pub mod error;
pub mod options;

pub use error::{Diagnostic, Error, Severity};
pub use options::{DebuggerOptions, ExecutionOptions};

use tracing::debug;

use crate::parser::Program;
use crate::vm::Code;
use crate::{analyzer, compiler, parser};

/// Parse and check `source` without translating it.
///
/// Every checker error is reported, not just the first.
pub fn check(source: &str) -> Result<Program, Error> {
    let program = parser::parse(source)?;
    analyzer::check(&program)?;
    Ok(program)
}

/// Compile `source` into executable [`Code`].
pub fn compile(source: &str) -> Result<Code, Error> {
    let program = check(source)?;
    let code = compiler::translate(&program)?;
    debug!(
        functions = code.functions.len(),
        instructions = code.len(),
        "Compiled program"
    );
    Ok(code)
}

/// Run compiled code to completion, writing program output to `out`.
pub fn run<W: std::io::Write>(
    code: &Code,
    options: ExecutionOptions,
    out: W,
) -> Result<crate::vm::Value, Error> {
    let mut vm = crate::vm::VM::new(code, options, out);
    Ok(vm.run()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_compile_and_run() {
        let code = compile("fn main() { print \"hi\"; }").unwrap();
        let mut out = Vec::new();
        run(&code, ExecutionOptions::default(), &mut out).unwrap();
        assert_eq!(out, b"hi\n");
    }

    #[test]
    fn test_compile_reports_all_check_errors() {
        let Err(Error::Compilation { diagnostics }) = compile("fn main() { print a; print b; }")
        else {
            panic!("expected compilation error");
        };
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].code.as_deref(), Some("C001"));
        assert_eq!(diagnostics[0].severity, Severity::Error);
    }

    #[test]
    fn test_compile_reports_parse_error() {
        let Err(Error::Compilation { diagnostics }) = compile("fn main( {") else {
            panic!("expected compilation error");
        };
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code.as_deref(), Some("P001"));
    }

    #[test]
    fn test_run_fault() {
        let code = compile("fn main() { print 1 / 0; }").unwrap();
        let result = run(&code, ExecutionOptions::default(), std::io::sink());
        assert!(matches!(
            result,
            Err(Error::Execution(crate::vm::VmError::Fault(_)))
        ));
    }
}

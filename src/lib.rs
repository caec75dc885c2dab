//! SOFL - a small imperative language with a source-level debugger
//!
//! # Overview
//!
//! SOFL programs are sets of functions with integer, boolean and string
//! values, `if`/`while` control flow and recursion. Programs are compiled to
//! a compact instruction set and executed by a virtual machine that can be
//! driven one instruction at a time, which is what the debugger builds on.
//!
//! # Quick Start
//!
//! ```
//! use sofl::{ExecutionOptions, vm::VM};
//!
//! let code = sofl::compile("fn main() { print 40 + 2; }").unwrap();
//! let mut vm = VM::new(&code, ExecutionOptions::default(), Vec::new());
//! vm.run().unwrap();
//! assert_eq!(vm.output().as_slice(), b"42\n");
//! ```
//!
//! # Debugging
//!
//! ```
//! use sofl::DebuggerOptions;
//! use sofl::debugger::{Debugger, StopReason};
//!
//! let source = "fn main() {\n    let x = 6 * 7;\n    print x;\n}\n";
//! let code = sofl::compile(source).unwrap();
//! let mut debugger = Debugger::new(&code, source, DebuggerOptions::default(), Vec::new());
//! debugger.set_breakpoint(3).unwrap();
//! assert_eq!(debugger.continue_execution(), Ok(StopReason::Breakpoint { line: 3 }));
//! assert_eq!(debugger.inspect("x").unwrap().to_string(), "42");
//! ```

mod error_renderer;

// Re-export public API from sofl_core
pub use sofl_core::api::{
    DebuggerOptions, Diagnostic, Error, ExecutionOptions, Severity, check, compile, run,
};
pub use sofl_core::{asm, debugger, vm};

pub use error_renderer::{
    SourceFile, fault_diagnostic, render_error, render_error_to, render_error_to_string,
    render_error_to_string_no_color,
};

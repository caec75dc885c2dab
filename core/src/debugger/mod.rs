//! Source-level debugging of compiled programs.
//!
//! [`Debugger`] is the programmatic controller: breakpoints, continue,
//! step-over, step-into and inspection, all expressed in source lines through
//! the code's source map and local variable tables. [`Session`] puts a text
//! command surface on top of it.

mod command;
mod controller;
mod error;
mod report;
mod session;


pub use command::{COMMAND_NAMES, Command, HELP};
pub use controller::{BacktraceEntry, Debugger, StopReason};
pub use error::DebugError;
pub use report::Report;
pub use session::{Flow, Session};

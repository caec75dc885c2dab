//! SOFL: a small imperative language with a bytecode VM and a source-level
//! debugger.
//!
//! Source text goes through [`parser`], [`analyzer`] and [`compiler`] to
//! become [`vm::Code`], which the [`vm::VM`] executes and the
//! [`debugger::Debugger`] steps through. [`asm`] reads and writes `Code` in
//! a textual assembly form.

pub mod analyzer;
pub mod api;
pub mod asm;
pub mod compiler;
pub mod debugger;
pub mod parser;
pub mod vm;

pub use api::{check, compile};

/// Test utilities for enabling logging in tests
#[cfg(test)]
pub mod test_utils {
    /// Initialize tracing subscriber for tests with DEBUG level
    /// Call this at the start of tests where you want to see logging output
    ///
    /// # Example
    /// ```ignore
    /// #[test]
    /// fn test_breakpoints() {
    ///     test_utils::init_test_logging();
    ///     // ... your test code
    /// }
    /// ```
    pub fn init_test_logging() {
        use tracing_subscriber::{EnvFilter, fmt};

        // Try to initialize, ignore error if already initialized
        let _ = fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .with_test_writer()
            .try_init();
    }
}

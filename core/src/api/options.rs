//! Configuration options for execution and debugging.

/// Configuration options for program execution.
///
/// These options control resource limits of the virtual machine.
///
/// # Example
///
/// ```
/// use sofl_core::api::ExecutionOptions;
///
/// let options = ExecutionOptions {
///     max_depth: 500,
///     max_steps: Some(10_000),
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Maximum number of live call frames (for recursion protection).
    ///
    /// Default: 1000
    pub max_depth: usize,

    /// Maximum number of executed instructions (if Some).
    ///
    /// Set to `None` for unlimited execution (be careful with untrusted code!).
    ///
    /// Default: None
    pub max_steps: Option<u64>,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            max_depth: 1000,
            max_steps: None,
        }
    }
}

/// Configuration options for the debugger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebuggerOptions {
    /// Execution limits of the debugged machine.
    pub execution: ExecutionOptions,

    /// Source lines shown above and below the current line by `list`.
    ///
    /// Default: 2
    pub context_lines: usize,
}

impl Default for DebuggerOptions {
    fn default() -> Self {
        Self {
            execution: ExecutionOptions::default(),
            context_lines: 2,
        }
    }
}

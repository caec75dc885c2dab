use core::fmt;

use thiserror::Error;

/// Kinds of runtime faults raised by executing a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    TypeMismatch,
    DivisionByZero,
    ArithmeticOverflow,
    StackOverflow,
    StackUnderflow,
    /// Array index outside `0..len`, or an array size outside
    /// `0..=MAX_ARRAY_LEN`.
    IndexOutOfBounds,
    StepLimitExceeded,
    /// Raised by the program itself (`error` statement).
    Trap,
    /// Writing to the program output failed.
    Output,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FaultKind::TypeMismatch => "type mismatch",
            FaultKind::DivisionByZero => "division by zero",
            FaultKind::ArithmeticOverflow => "arithmetic overflow",
            FaultKind::StackOverflow => "stack overflow",
            FaultKind::StackUnderflow => "stack underflow",
            FaultKind::IndexOutOfBounds => "index out of bounds",
            FaultKind::StepLimitExceeded => "step limit exceeded",
            FaultKind::Trap => "error",
            FaultKind::Output => "output error",
        })
    }
}

/// A runtime fault: the machine stops at `offset` and becomes faulted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at offset {offset}: {message}")]
pub struct Fault {
    pub kind: FaultKind,
    /// Offset of the faulting instruction.
    pub offset: usize,
    pub message: String,
}

impl Fault {
    pub fn new(kind: FaultKind, offset: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            offset,
            message: message.into(),
        }
    }
}

/// Errors returned by the VM.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    /// The program faulted.
    #[error(transparent)]
    Fault(#[from] Fault),

    /// Inconsistent instruction sequence (bad slot, pc out of range, ...).
    #[error("internal error at offset {offset}: {message}")]
    Internal { offset: usize, message: String },

    /// `step()` called on a halted or faulted machine.
    #[error("machine has terminated")]
    Terminated,
}

impl VmError {
    pub fn internal(offset: usize, message: impl Into<String>) -> Self {
        VmError::Internal {
            offset,
            message: message.into(),
        }
    }
}

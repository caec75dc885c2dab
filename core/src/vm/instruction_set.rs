//! SOFL VM Instructions
//!
//! This module defines the instruction set of SOFL's stack-based virtual
//! machine.
//!
//! # Design Principles
//!
//! - **Stack-based**: operations consume operands from the operand stack and
//!   push their results
//! - **Absolute targets**: jumps and calls carry the absolute offset of the
//!   target instruction
//! - **Resolved slots**: locals are addressed by slot index; names only live
//!   in the debug tables of [`Code`](super::Code)
//!
//! # Stack Discipline
//!
//! Stack effect notation: `[..., operand1, operand2] -> [..., result]`

use core::fmt;

use crate::vm::Value;

/// A single VM instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    // ========================================================================
    // Stack & Locals
    // ========================================================================
    /// Push a literal value
    /// Stack: [...] -> [..., value]
    Push(Value),

    /// Pop top value
    /// Stack: [..., a] -> [...]
    Pop,

    /// Load local slot
    /// Operand: slot index | Stack: [...] -> [..., value]
    Load(u16),

    /// Store to local slot
    /// Operand: slot index | Stack: [..., value] -> [...]
    Store(u16),

    /// Load an element of the array in a local slot
    /// Operand: slot index | Stack: [..., index] -> [..., slot[index]]
    LoadIndexed(u16),

    /// Store into an element of the array in a local slot
    /// Operand: slot index | Stack: [..., index, value] -> [...]
    StoreIndexed(u16),

    // ========================================================================
    // Arrays
    // ========================================================================
    /// Collect the top `n` values into an array, first pushed first
    /// Operand: element count | Stack: [..., v1, ..., vN] -> [..., array]
    Array(u16),

    /// Allocate an array of `size` copies of `fill`
    /// Stack: [..., fill, size] -> [..., array]
    Alloc,

    // ========================================================================
    // Arithmetic
    // ========================================================================
    /// Integer addition, or concatenation of two strings
    /// Stack: [..., a, b] -> [..., a + b]
    Add,

    /// Stack: [..., a, b] -> [..., a - b]
    Sub,

    /// Stack: [..., a, b] -> [..., a * b]
    Mul,

    /// Integer division (truncating). Faults on a zero divisor.
    /// Stack: [..., a, b] -> [..., a / b]
    Div,

    /// Integer remainder. Faults on a zero divisor.
    /// Stack: [..., a, b] -> [..., a % b]
    Mod,

    /// Stack: [..., a] -> [..., -a]
    Neg,

    // ========================================================================
    // Logic & Comparison
    // ========================================================================
    /// Stack: [..., a] -> [..., !a]
    Not,

    /// Stack: [..., a, b] -> [..., a && b]
    And,

    /// Stack: [..., a, b] -> [..., a || b]
    Or,

    /// Equality of two values of the same kind
    /// Stack: [..., a, b] -> [..., a == b]
    Eq,

    /// Stack: [..., a, b] -> [..., a != b]
    Ne,

    /// Ordering of two ints or two strings
    /// Stack: [..., a, b] -> [..., a < b]
    Lt,

    /// Stack: [..., a, b] -> [..., a <= b]
    Le,

    /// Stack: [..., a, b] -> [..., a > b]
    Gt,

    /// Stack: [..., a, b] -> [..., a >= b]
    Ge,

    // ========================================================================
    // Control Flow
    // ========================================================================
    /// Unconditional jump
    /// Operand: absolute target | Stack: [...] -> [...]
    Jump(usize),

    /// Pop condition and jump if it is false
    /// Operand: absolute target | Stack: [..., cond] -> [...]
    JumpIfFalse(usize),

    /// Function prologue: size the current frame's slot table
    /// Operand: slot count | Stack: [...] -> [...]
    Enter(u16),

    /// Call the function starting at `target` with `argc` arguments
    /// Stack: [..., arg1, ..., argN] -> [...]  (arguments move to the new frame)
    Call { target: usize, argc: u16 },

    /// Return from the current frame
    /// Stack: [..., value] -> caller's [..., value]
    Return,

    // ========================================================================
    // Effects
    // ========================================================================
    /// Write the value and a newline to the program output
    /// Stack: [..., value] -> [...]
    Print,

    /// Raise a user fault with the value as its message
    /// Stack: [..., value] -> (faulted)
    Trap,

    /// Halt execution
    Halt,
}

impl Instruction {
    /// Assembly mnemonic.
    pub const fn mnemonic(&self) -> &'static str {
        match self {
            Self::Push(_) => "PUSH",
            Self::Pop => "POP",
            Self::Load(_) => "LOAD",
            Self::Store(_) => "STORE",
            Self::LoadIndexed(_) => "LOADI",
            Self::StoreIndexed(_) => "STOREI",
            Self::Array(_) => "ARRAY",
            Self::Alloc => "ALLOC",
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Mul => "MUL",
            Self::Div => "DIV",
            Self::Mod => "MOD",
            Self::Neg => "NEG",
            Self::Not => "NOT",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Eq => "EQ",
            Self::Ne => "NE",
            Self::Lt => "LT",
            Self::Le => "LE",
            Self::Gt => "GT",
            Self::Ge => "GE",
            Self::Jump(_) => "JUMP",
            Self::JumpIfFalse(_) => "JUMPF",
            Self::Enter(_) => "ENTER",
            Self::Call { .. } => "CALL",
            Self::Return => "RET",
            Self::Print => "PRINT",
            Self::Trap => "TRAP",
            Self::Halt => "HALT",
        }
    }

    /// Instruction with no operands for the given mnemonic.
    pub fn nullary(mnemonic: &str) -> Option<Self> {
        Some(match mnemonic {
            "POP" => Self::Pop,
            "ALLOC" => Self::Alloc,
            "ADD" => Self::Add,
            "SUB" => Self::Sub,
            "MUL" => Self::Mul,
            "DIV" => Self::Div,
            "MOD" => Self::Mod,
            "NEG" => Self::Neg,
            "NOT" => Self::Not,
            "AND" => Self::And,
            "OR" => Self::Or,
            "EQ" => Self::Eq,
            "NE" => Self::Ne,
            "LT" => Self::Lt,
            "LE" => Self::Le,
            "GT" => Self::Gt,
            "GE" => Self::Ge,
            "RET" => Self::Return,
            "PRINT" => Self::Print,
            "TRAP" => Self::Trap,
            "HALT" => Self::Halt,
            _ => return None,
        })
    }

    /// Absolute target of a jump or call.
    pub fn target(&self) -> Option<usize> {
        match self {
            Self::Jump(t) | Self::JumpIfFalse(t) | Self::Call { target: t, .. } => Some(*t),
            _ => None,
        }
    }

    /// Rewrite the target of a jump or call placeholder.
    pub fn set_target(&mut self, new_target: usize) {
        match self {
            Self::Jump(t) | Self::JumpIfFalse(t) | Self::Call { target: t, .. } => {
                *t = new_target
            }
            other => debug_assert!(false, "{} has no target", other.mnemonic()),
        }
    }

    /// Check if this instruction can produce a runtime fault
    pub const fn can_fault(&self) -> bool {
        !matches!(
            self,
            Self::Push(_) | Self::Jump(_) | Self::Enter(_) | Self::Halt | Self::Load(_)
        )
    }

    /// Check if this is a control flow instruction
    pub const fn is_control_flow(&self) -> bool {
        matches!(
            self,
            Self::Jump(_) | Self::JumpIfFalse(_) | Self::Call { .. } | Self::Return | Self::Halt
        )
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Push(value) => write!(f, "PUSH {}", value.literal()),
            Self::Load(n)
            | Self::Store(n)
            | Self::LoadIndexed(n)
            | Self::StoreIndexed(n)
            | Self::Array(n)
            | Self::Enter(n) => {
                write!(f, "{} {}", self.mnemonic(), n)
            }
            Self::Jump(target) | Self::JumpIfFalse(target) => {
                write!(f, "{} {}", self.mnemonic(), target)
            }
            Self::Call { target, argc } => write!(f, "CALL {} {}", target, argc),
            _ => f.write_str(self.mnemonic()),
        }
    }
}

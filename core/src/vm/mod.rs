mod code;
mod error;
mod frame;
mod instruction_set;
mod runtime;
mod stack;
mod value;

pub use code::{Code, FunctionInfo, InvalidCode, LocalVar};
pub use error::{Fault, FaultKind, VmError};
pub use frame::Frame;
pub use instruction_set::Instruction;
pub use runtime::{Snapshot, Status, VM};
pub use value::{Literal, MAX_ARRAY_LEN, Value};

pub(crate) use stack::Stack;

#[cfg(test)]
mod runtime_test;

use core::fmt;

use crate::vm::{Fault, Instruction, Status, Value};

/// Textual status of a debugged machine.
///
/// ```text
/// stopped at line 2 in fib
///     2 | if n < 2 { return n; }
///     n = 5
///        14  ENTER 1
///   ->   15  LOAD 0
///        16  PUSH 2
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub status: Status,
    pub line: Option<u32>,
    pub function: Option<String>,
    /// Trimmed text of `line`.
    pub source: Option<String>,
    pub variables: Vec<(String, Value)>,
    pub fault: Option<Fault>,
    /// Value returned by `main`, once halted.
    pub result: Option<Value>,
    /// Offset of the next instruction, or of the faulting one.
    pub offset: Option<usize>,
    /// Instructions around `offset`.
    pub window: Vec<(usize, Instruction)>,
    /// Top of the innermost frame's operand stack, top last.
    pub operands: Vec<Value>,
}

impl Report {
    fn write_location(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(line) = self.line else {
            return writeln!(f, "no source position");
        };
        match &self.function {
            Some(function) => writeln!(f, "line {} in {}", line, function)?,
            None => writeln!(f, "line {}", line)?,
        }
        if let Some(source) = &self.source {
            writeln!(f, "{:>5} | {}", line, source)?;
        }
        Ok(())
    }

    fn write_instructions(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (offset, instr) in &self.window {
            let marker = if Some(*offset) == self.offset { "->" } else { "  " };
            writeln!(f, "  {} {:>4}  {}", marker, offset, instr)?;
        }
        if !self.operands.is_empty() {
            let values: Vec<String> = self.operands.iter().map(|v| v.literal().to_string()).collect();
            writeln!(f, "  stack: {}", values.join(", "))?;
        }
        Ok(())
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Status::Halted => match &self.result {
                Some(value) if *value != Value::Unit => {
                    writeln!(f, "program halted with {}", value.literal())
                }
                _ => writeln!(f, "program halted"),
            },
            Status::Faulted => {
                match &self.fault {
                    Some(fault) => writeln!(f, "fault: {}", fault)?,
                    None => writeln!(f, "fault")?,
                }
                write!(f, "  at ")?;
                self.write_location(f)?;
                self.write_instructions(f)
            }
            Status::Ready | Status::Running => {
                let word = if self.status == Status::Ready { "ready at" } else { "stopped at" };
                write!(f, "{} ", word)?;
                self.write_location(f)?;
                for (name, value) in &self.variables {
                    writeln!(f, "    {} = {}", name, value.literal())?;
                }
                self.write_instructions(f)
            }
        }
    }
}

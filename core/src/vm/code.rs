use core::ops::Range;

use hashbrown::{HashMap, HashSet};
use thiserror::Error;

use crate::parser::Pos;
use crate::vm::{Instruction, Value};

/// A translated program: the instruction sequence plus its debug tables.
///
/// Produced once by the translator (or the assembly reader) and read-only
/// afterwards.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Code {
    pub instructions: Vec<Instruction>,
    /// Offset where execution starts (the entry of `main`).
    pub entry: usize,
    /// Source position of each instruction, indexed by offset.
    pub source_map: Vec<Option<Pos>>,
    /// Function table, in layout order.
    pub functions: Vec<FunctionInfo>,
}

/// Debug information for one function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInfo {
    pub name: String,
    /// Offset of the function's `ENTER`.
    pub entry: usize,
    /// One past the function's last instruction.
    pub end: usize,
    pub arity: u16,
    /// Slot table size (the `ENTER` operand).
    pub slots: u16,
    pub locals: Vec<LocalVar>,
}

/// A named slot and the offsets where the name is in scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVar {
    pub name: String,
    pub slot: u16,
    pub live: Range<usize>,
}

impl FunctionInfo {
    pub fn contains(&self, offset: usize) -> bool {
        (self.entry..self.end).contains(&offset)
    }

    /// Binding of `name` at `offset`. Later (inner) bindings shadow earlier ones.
    pub fn local_at(&self, name: &str, offset: usize) -> Option<&LocalVar> {
        self.locals
            .iter()
            .rev()
            .find(|local| local.name == name && local.live.contains(&offset))
    }

    /// All bindings in scope at `offset`, one per name, ordered by slot.
    pub fn locals_at(&self, offset: usize) -> Vec<&LocalVar> {
        let mut seen = HashSet::new();
        let mut visible: Vec<&LocalVar> = self
            .locals
            .iter()
            .rev()
            .filter(|local| local.live.contains(&offset))
            .filter(|local| seen.insert(local.name.as_str()))
            .collect();
        visible.sort_by_key(|local| local.slot);
        visible
    }
}

/// Structural problem in a `Code` value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid code at offset {offset}: {message}")]
pub struct InvalidCode {
    pub offset: usize,
    pub message: String,
}

impl Code {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Source position of the instruction at `offset`.
    pub fn position(&self, offset: usize) -> Option<Pos> {
        self.source_map.get(offset).copied().flatten()
    }

    pub fn line(&self, offset: usize) -> Option<u32> {
        self.position(offset).map(|pos| pos.line)
    }

    /// Whether at least one instruction maps to `line`.
    pub fn has_line(&self, line: u32) -> bool {
        self.source_map.iter().flatten().any(|pos| pos.line == line)
    }

    /// Function whose body contains `offset`.
    pub fn function_at(&self, offset: usize) -> Option<&FunctionInfo> {
        self.functions.iter().find(|f| f.contains(offset))
    }

    pub fn function(&self, name: &str) -> Option<&FunctionInfo> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Check that every target, the entry point and the debug tables are
    /// consistent with the instruction sequence.
    pub fn validate(&self) -> Result<(), InvalidCode> {
        let len = self.instructions.len();
        let invalid = |offset: usize, message: String| Err(InvalidCode { offset, message });

        if self.entry >= len {
            return invalid(self.entry, format!("entry {} out of range", self.entry));
        }
        if self.source_map.len() != len {
            return invalid(
                0,
                format!(
                    "source map has {} entries for {} instructions",
                    self.source_map.len(),
                    len
                ),
            );
        }
        for (offset, instr) in self.instructions.iter().enumerate() {
            if let Instruction::Push(Value::Array(_)) = instr {
                return invalid(offset, "arrays cannot be pushed as constants".to_string());
            }
            if let Some(target) = instr.target() {
                if target >= len {
                    return invalid(offset, format!("target {} out of range", target));
                }
            }
        }
        for function in &self.functions {
            if function.entry > function.end || function.end > len {
                return invalid(
                    function.entry,
                    format!(
                        "function {} spans {}..{}",
                        function.name, function.entry, function.end
                    ),
                );
            }
            if let Some(local) = function.locals.iter().find(|l| l.slot >= function.slots) {
                return invalid(
                    function.entry,
                    format!(
                        "local {} uses slot {} of {} in {}",
                        local.name, local.slot, function.slots, function.name
                    ),
                );
            }
        }
        Ok(())
    }
}

impl core::fmt::Debug for Code {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "Code {{")?;
        writeln!(f, "  entry: {}", self.entry)?;

        // Jump targets get labels (sorted for deterministic output). Call
        // targets are function entries and are printed by name instead.
        let mut jump_targets: Vec<usize> = self
            .instructions
            .iter()
            .filter(|instr| !matches!(instr, Instruction::Call { .. }))
            .filter_map(Instruction::target)
            .collect();
        jump_targets.sort_unstable();
        jump_targets.dedup();
        let label_map: HashMap<usize, usize> = jump_targets
            .into_iter()
            .enumerate()
            .map(|(i, addr)| (addr, i))
            .collect();

        writeln!(f, "  instructions:")?;
        for (addr, instr) in self.instructions.iter().enumerate() {
            if let Some(function) = self.functions.iter().find(|func| func.entry == addr) {
                writeln!(
                    f,
                    "  fn {} (arity {}, slots {})",
                    function.name, function.arity, function.slots
                )?;
            }

            let label_prefix = label_map
                .get(&addr)
                .map(|l| format!("L{}:", l))
                .unwrap_or_default();
            let text = match instr {
                Instruction::Call { target, .. } => match self.function_at(*target) {
                    Some(callee) => format!("{} ({})", instr, callee.name),
                    None => instr.to_string(),
                },
                _ => match instr.target().and_then(|t| label_map.get(&t)) {
                    Some(label) => format!("{} (to L{})", instr, label),
                    None => instr.to_string(),
                },
            };
            match self.position(addr) {
                Some(pos) => writeln!(f, "    {:4} {:>4}  {:<24} ; {}", addr, label_prefix, text, pos)?,
                None => writeln!(f, "    {:4} {:>4}  {}", addr, label_prefix, text)?,
            }
        }

        write!(f, "}}")
    }
}

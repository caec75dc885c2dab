use std::collections::BTreeSet;
use std::io::Write;

use tracing::debug;

use crate::api::DebuggerOptions;
use crate::debugger::{DebugError, Report};
use crate::vm::{Code, Fault, Frame, Instruction, Status, VM, Value, VmError};

/// Operand stack values shown in a [`Report`].
const OPERAND_WINDOW: usize = 8;

/// Why a debugger command returned control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The next instruction starts a breakpoint line.
    Breakpoint { line: u32 },
    /// A step command finished.
    Step,
    Halted,
    Faulted(Fault),
}

/// One line of a call stack listing, innermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BacktraceEntry {
    pub function: String,
    /// Offset being executed in this frame: the pc for the innermost frame,
    /// the pending `CALL` for the others.
    pub offset: usize,
    pub line: Option<u32>,
}

/// Source-level debugger driving a [`VM`] one instruction at a time.
///
/// Breakpoints are source lines. Execution stops at a breakpoint when the
/// next instruction is at a *line boundary*: its line differs from the line
/// of the last instruction executed in the same frame, or its frame has not
/// executed anything yet.
pub struct Debugger<'a, W> {
    vm: VM<'a, W>,
    source: &'a str,
    breakpoints: BTreeSet<u32>,
    context_lines: usize,
    /// Line of the last instruction executed in each live frame.
    frame_lines: Vec<Option<u32>>,
}

impl<'a, W: Write> Debugger<'a, W> {
    pub fn new(code: &'a Code, source: &'a str, options: DebuggerOptions, out: W) -> Self {
        Debugger {
            vm: VM::new(code, options.execution, out),
            source,
            breakpoints: BTreeSet::new(),
            context_lines: options.context_lines,
            frame_lines: vec![None],
        }
    }

    pub fn vm(&self) -> &VM<'a, W> {
        &self.vm
    }

    pub fn code(&self) -> &'a Code {
        self.vm.code()
    }

    pub fn into_output(self) -> W {
        self.vm.into_output()
    }

    pub fn breakpoints(&self) -> impl Iterator<Item = u32> + '_ {
        self.breakpoints.iter().copied()
    }

    /// Mark `line` as a breakpoint. Returns `false` if it already was one.
    pub fn set_breakpoint(&mut self, line: u32) -> Result<bool, DebugError> {
        if !self.code().has_line(line) {
            return Err(DebugError::NoCodeAtLine { line });
        }
        debug!(line, "Set breakpoint");
        Ok(self.breakpoints.insert(line))
    }

    /// Returns `false` if there was no breakpoint on `line`.
    pub fn clear_breakpoint(&mut self, line: u32) -> bool {
        self.breakpoints.remove(&line)
    }

    /// Run until the program terminates or reaches a breakpoint.
    pub fn continue_execution(&mut self) -> Result<StopReason, DebugError> {
        self.ensure_running()?;
        loop {
            if self.step_once()?.is_terminal() {
                return self.terminal_reason();
            }
            if let Some(line) = self.breakpoint_hit() {
                return Ok(StopReason::Breakpoint { line });
            }
        }
    }

    /// Run to the next line of the current function, treating calls as a
    /// single step. Returning from the function stops in the caller.
    pub fn step_over(&mut self) -> Result<StopReason, DebugError> {
        self.ensure_running()?;
        let start_depth = self.vm.depth();
        let start_line = self.current_line();
        loop {
            if self.step_once()?.is_terminal() {
                return self.terminal_reason();
            }
            let depth = self.vm.depth();
            if depth < start_depth {
                return Ok(StopReason::Step);
            }
            if let Some(line) = self.breakpoint_hit() {
                return Ok(StopReason::Breakpoint { line });
            }
            if depth == start_depth && (start_line.is_none() || self.current_line() != start_line) {
                return Ok(StopReason::Step);
            }
        }
    }

    /// Execute exactly one instruction.
    pub fn step_into(&mut self) -> Result<StopReason, DebugError> {
        self.ensure_running()?;
        if self.step_once()?.is_terminal() {
            return self.terminal_reason();
        }
        Ok(StopReason::Step)
    }

    /// Value of the variable `name` in the innermost frame.
    pub fn inspect(&self, name: &str) -> Result<Value, DebugError> {
        let frame = self.top_frame()?;
        let pc = self.vm.pc();
        let local = self
            .code()
            .function_at(pc)
            .and_then(|function| function.local_at(name, pc))
            .ok_or_else(|| DebugError::UnknownVariable {
                name: name.to_string(),
            })?;
        // Declared but not yet allocated by `ENTER`.
        frame
            .slots
            .get(local.slot as usize)
            .cloned()
            .ok_or_else(|| DebugError::UnknownVariable {
                name: name.to_string(),
            })
    }

    /// Every variable in scope in the innermost frame, ordered by slot.
    pub fn variables(&self) -> Result<Vec<(String, Value)>, DebugError> {
        let frame = self.top_frame()?;
        let pc = self.vm.pc();
        let Some(function) = self.code().function_at(pc) else {
            return Ok(Vec::new());
        };
        Ok(function
            .locals_at(pc)
            .into_iter()
            .filter_map(|local| {
                let value = frame.slots.get(local.slot as usize)?;
                Some((local.name.clone(), value.clone()))
            })
            .collect())
    }

    /// Line of the next instruction, or of the faulting one.
    pub fn current_line(&self) -> Option<u32> {
        match self.vm.status() {
            Status::Halted => None,
            _ => self.code().line(self.vm.pc()),
        }
    }

    /// Text of source line `line` (1-based).
    pub fn source_line(&self, line: u32) -> Option<&'a str> {
        let index = (line as usize).checked_sub(1)?;
        self.source.lines().nth(index)
    }

    /// Source lines around `line`, numbered.
    pub fn source_context(&self, line: u32) -> Vec<(u32, &'a str)> {
        let context = self.context_lines as u32;
        let first = line.saturating_sub(context).max(1);
        (first..=line.saturating_add(context))
            .map_while(|n| self.source_line(n).map(|text| (n, text)))
            .collect()
    }

    /// Call stack from the innermost frame out to the root, following each
    /// frame's link to its caller.
    pub fn backtrace(&self) -> Result<Vec<BacktraceEntry>, DebugError> {
        let mut frame = self.top_frame()?;
        let code = self.code();
        let frames = self.vm.frames();
        let mut offset = self.vm.pc();
        let mut entries = Vec::with_capacity(frames.len());
        loop {
            let function = match code.function_at(frame.entry) {
                Some(function) => function.name.clone(),
                None => format!("<{}>", frame.entry),
            };
            entries.push(BacktraceEntry {
                function,
                offset,
                line: code.line(offset),
            });
            if frame.is_root() {
                break;
            }
            let caller = frame.parent.and_then(|index| frames.get(index));
            match (caller, frame.return_address) {
                (Some(caller), Some(address)) => {
                    // The caller is suspended on its `CALL`.
                    offset = address.saturating_sub(1);
                    frame = caller;
                }
                _ => {
                    return Err(VmError::internal(offset, "frame without a caller").into());
                }
            }
        }
        Ok(entries)
    }

    /// Status, location and variables of the machine.
    pub fn report(&self) -> Report {
        let line = self.current_line();
        let function = match self.vm.status() {
            Status::Halted => None,
            _ => self.code().function_at(self.vm.pc()).map(|f| f.name.clone()),
        };
        let offset = match self.vm.status() {
            Status::Halted => None,
            _ => Some(self.vm.pc()),
        };
        Report {
            status: self.vm.status(),
            line,
            function,
            source: line.and_then(|l| self.source_line(l)).map(|s| s.trim().to_string()),
            variables: self.variables().unwrap_or_default(),
            fault: self.vm.fault().cloned(),
            result: self.vm.result().cloned(),
            offset,
            window: offset.map(|pc| self.window(pc)).unwrap_or_default(),
            operands: self.top_operands(),
        }
    }

    /// The instructions before, at and after `pc`.
    fn window(&self, pc: usize) -> Vec<(usize, Instruction)> {
        let code = self.code();
        (pc.saturating_sub(1)..=pc + 1)
            .filter_map(|offset| Some((offset, code.instructions.get(offset)?.clone())))
            .collect()
    }

    /// Up to [`OPERAND_WINDOW`] values from the top of the innermost frame's
    /// operand stack.
    fn top_operands(&self) -> Vec<Value> {
        let Ok(frame) = self.top_frame() else {
            return Vec::new();
        };
        let operands = self.vm.operands().get(frame.base..).unwrap_or_default();
        operands[operands.len().saturating_sub(OPERAND_WINDOW)..].to_vec()
    }

    fn ensure_running(&self) -> Result<(), DebugError> {
        if self.vm.status().is_terminal() {
            return Err(DebugError::Terminated);
        }
        Ok(())
    }

    fn top_frame(&self) -> Result<&Frame, DebugError> {
        if self.vm.status() == Status::Halted {
            return Err(DebugError::Terminated);
        }
        self.vm.frames().last().ok_or(DebugError::Terminated)
    }

    /// Step the machine and keep the per-frame line table in sync.
    fn step_once(&mut self) -> Result<Status, DebugError> {
        let offset = self.vm.pc();
        let depth = self.vm.depth();
        let status = self.vm.step()?;
        let line = self.code().line(offset);

        if let Some(last) = self.frame_lines.last_mut() {
            *last = line;
        }
        let new_depth = self.vm.depth();
        if new_depth > depth {
            self.frame_lines.push(None);
        } else {
            self.frame_lines.truncate(new_depth);
        }
        Ok(status)
    }

    fn at_boundary(&self) -> bool {
        let line = self.code().line(self.vm.pc());
        line.is_some() && self.frame_lines.last().copied().flatten() != line
    }

    fn breakpoint_hit(&self) -> Option<u32> {
        if !self.at_boundary() {
            return None;
        }
        let line = self.code().line(self.vm.pc())?;
        if !self.breakpoints.contains(&line) {
            return None;
        }
        debug!(line, offset = self.vm.pc(), depth = self.vm.depth(), "Breakpoint hit");
        Some(line)
    }

    fn terminal_reason(&self) -> Result<StopReason, DebugError> {
        match self.vm.status() {
            Status::Faulted => {
                let fault = self
                    .vm
                    .fault()
                    .cloned()
                    .ok_or_else(|| VmError::internal(self.vm.pc(), "faulted without a fault"))?;
                Ok(StopReason::Faulted(fault))
            }
            _ => Ok(StopReason::Halted),
        }
    }
}

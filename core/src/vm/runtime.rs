use std::io::Write;

use tracing::{debug, trace};

use crate::api::ExecutionOptions;
use ecow::EcoVec;

use crate::vm::{Code, Fault, FaultKind, Frame, Instruction, MAX_ARRAY_LEN, Stack, Value, VmError};

/// Lifecycle of a machine. `Halted` and `Faulted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ready,
    Running,
    Halted,
    Faulted,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Halted | Status::Faulted)
    }
}

/// Copy of the observable machine state, for comparing two executions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub pc: usize,
    pub status: Status,
    pub frames: Vec<Frame>,
    pub stack: Vec<Value>,
}

/// The SOFL virtual machine.
///
/// Executes `code` one instruction at a time with [`VM::step`]; [`VM::run`]
/// is a loop around it. Program output is written to `out`.
pub struct VM<'c, W> {
    code: &'c Code,
    options: ExecutionOptions,
    out: W,
    pc: usize,
    frames: Stack<Frame>,
    stack: Stack<Value>,
    status: Status,
    steps: u64,
    max_depth_reached: usize,
    fault: Option<Fault>,
    result: Option<Value>,
}

impl<'c, W: Write> VM<'c, W> {
    pub fn new(code: &'c Code, options: ExecutionOptions, out: W) -> Self {
        let mut frames = Stack::with_limit(options.max_depth.max(1));
        // A fresh stack with a non-zero limit always has room.
        let _ = frames.push(Frame::root(code.entry));
        VM {
            code,
            options,
            out,
            pc: code.entry,
            frames,
            stack: Stack::new(),
            status: Status::Ready,
            steps: 0,
            max_depth_reached: 1,
            fault: None,
            result: None,
        }
    }

    pub fn code(&self) -> &'c Code {
        self.code
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Offset of the next instruction to execute (or of the faulting one).
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Number of live frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn max_depth_reached(&self) -> usize {
        self.max_depth_reached
    }

    /// Number of instructions executed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn frames(&self) -> &[Frame] {
        self.frames.as_slice()
    }

    pub fn operands(&self) -> &[Value] {
        self.stack.as_slice()
    }

    pub fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    /// Value returned from the root frame, once halted.
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            pc: self.pc,
            status: self.status,
            frames: self.frames.as_slice().to_vec(),
            stack: self.stack.as_slice().to_vec(),
        }
    }

    /// Run until the machine halts or faults.
    ///
    /// Returns the value returned by the root frame (`Unit` after `HALT`).
    pub fn run(&mut self) -> Result<Value, VmError> {
        loop {
            match self.step()? {
                Status::Halted => return Ok(self.result.clone().unwrap_or_default()),
                Status::Faulted => {
                    let fault = self
                        .fault
                        .clone()
                        .ok_or_else(|| VmError::internal(self.pc, "faulted without a fault"))?;
                    return Err(VmError::Fault(fault));
                }
                Status::Ready | Status::Running => {}
            }
        }
    }

    /// Execute exactly one instruction and return the new status.
    ///
    /// A program fault is not an error here: the machine moves to
    /// `Faulted` and the fault is available from [`VM::fault`]. Errors are
    /// reserved for internal inconsistencies and stepping a terminated
    /// machine.
    pub fn step(&mut self) -> Result<Status, VmError> {
        if self.status.is_terminal() {
            return Err(VmError::Terminated);
        }
        self.status = Status::Running;

        if let Some(max_steps) = self.options.max_steps {
            if self.steps >= max_steps {
                let fault = Fault::new(
                    FaultKind::StepLimitExceeded,
                    self.pc,
                    format!("exceeded {} steps", max_steps),
                );
                return Ok(self.raise(fault));
            }
        }

        match self.dispatch() {
            Ok(()) => {
                self.steps += 1;
                Ok(self.status)
            }
            Err(VmError::Fault(fault)) => {
                self.steps += 1;
                Ok(self.raise(fault))
            }
            Err(err) => {
                self.status = Status::Faulted;
                Err(err)
            }
        }
    }

    fn raise(&mut self, fault: Fault) -> Status {
        debug!(kind = ?fault.kind, offset = fault.offset, message = %fault.message, "Fault");
        self.fault = Some(fault);
        self.status = Status::Faulted;
        self.status
    }

    fn fault_at(&self, kind: FaultKind, message: impl Into<String>) -> VmError {
        VmError::Fault(Fault::new(kind, self.pc, message))
    }

    fn frame(&self) -> Result<&Frame, VmError> {
        self.frames
            .peek()
            .ok_or_else(|| VmError::internal(self.pc, "no active frame"))
    }

    fn frame_mut(&mut self) -> Result<&mut Frame, VmError> {
        let pc = self.pc;
        self.frames
            .peek_mut()
            .ok_or_else(|| VmError::internal(pc, "no active frame"))
    }

    fn push(&mut self, value: Value) {
        // The operand stack has no limit.
        let _ = self.stack.push(value);
    }

    /// Pop one operand of the current frame.
    fn pop(&mut self) -> Result<Value, VmError> {
        let base = self.frame()?.base;
        if self.stack.len() <= base {
            return Err(self.fault_at(FaultKind::StackUnderflow, "operand stack is empty"));
        }
        self.stack
            .pop()
            .ok_or_else(|| self.fault_at(FaultKind::StackUnderflow, "operand stack is empty"))
    }

    fn pop_pair(&mut self) -> Result<(Value, Value), VmError> {
        let b = self.pop()?;
        let a = self.pop()?;
        Ok((a, b))
    }

    fn type_mismatch(&self, instr: &Instruction, operands: &[&Value]) -> VmError {
        let kinds: Vec<_> = operands.iter().map(|v| v.kind_name()).collect();
        self.fault_at(
            FaultKind::TypeMismatch,
            format!("{} cannot be applied to {}", instr.mnemonic(), kinds.join(" and ")),
        )
    }

    fn truth(&self, instr: &Instruction, value: &Value) -> Result<bool, VmError> {
        value
            .truth()
            .ok_or_else(|| self.type_mismatch(instr, &[value]))
    }

    fn dispatch(&mut self) -> Result<(), VmError> {
        let code = self.code;
        let instr = code.instructions.get(self.pc).ok_or_else(|| {
            VmError::internal(self.pc, format!("pc out of range (len {})", code.len()))
        })?;
        trace!(pc = self.pc, instruction = %instr, depth = self.frames.len(), "Dispatch");

        let mut next = self.pc + 1;
        match instr {
            Instruction::Push(value) => self.push(value.clone()),
            Instruction::Pop => {
                self.pop()?;
            }
            Instruction::Load(slot) => {
                let value = self
                    .frame()?
                    .slots
                    .get(*slot as usize)
                    .cloned()
                    .ok_or_else(|| VmError::internal(self.pc, format!("bad slot {}", slot)))?;
                self.push(value);
            }
            Instruction::Store(slot) => {
                let value = self.pop()?;
                let pc = self.pc;
                let target = self
                    .frame_mut()?
                    .slots
                    .get_mut(*slot as usize)
                    .ok_or_else(|| VmError::internal(pc, format!("bad slot {}", slot)))?;
                *target = value;
            }
            Instruction::LoadIndexed(slot) => {
                let index = self.pop()?;
                let array = self.slot(*slot)?;
                let Value::Array(items) = array else {
                    return Err(self.type_mismatch(instr, &[array]));
                };
                let i = self.element(instr, items.len(), &index)?;
                let value = items[i].clone();
                self.push(value);
            }
            Instruction::StoreIndexed(slot) => {
                let value = self.pop()?;
                let index = self.pop()?;
                let array = self.slot(*slot)?;
                let Value::Array(items) = array else {
                    return Err(self.type_mismatch(instr, &[array]));
                };
                let i = self.element(instr, items.len(), &index)?;
                let pc = self.pc;
                if let Some(Value::Array(items)) = self.frame_mut()?.slots.get_mut(*slot as usize) {
                    items.make_mut()[i] = value;
                } else {
                    return Err(VmError::internal(pc, format!("bad slot {}", slot)));
                }
            }

            Instruction::Array(n) => {
                let n = *n as usize;
                let base = self.frame()?.base;
                if self.stack.len() < base + n {
                    return Err(self.fault_at(FaultKind::StackUnderflow, "missing array elements"));
                }
                let items = self
                    .stack
                    .pop_n(n)
                    .ok_or_else(|| self.fault_at(FaultKind::StackUnderflow, "missing array elements"))?;
                self.push(Value::Array(items.into_iter().collect()));
            }
            Instruction::Alloc => {
                let (fill, size) = self.pop_pair()?;
                let Value::Int(n) = size else {
                    return Err(self.type_mismatch(instr, &[&fill, &size]));
                };
                let len = usize::try_from(n)
                    .ok()
                    .filter(|len| *len <= MAX_ARRAY_LEN)
                    .ok_or_else(|| {
                        self.fault_at(
                            FaultKind::IndexOutOfBounds,
                            format!("array size {} outside 0..={}", n, MAX_ARRAY_LEN),
                        )
                    })?;
                let items: EcoVec<Value> = core::iter::repeat_n(fill, len).collect();
                self.push(Value::Array(items));
            }

            Instruction::Add => {
                let (a, b) = self.pop_pair()?;
                let result = match (&a, &b) {
                    (Value::Int(x), Value::Int(y)) => Value::Int(self.checked(x.checked_add(*y))?),
                    (Value::Str(x), Value::Str(y)) => {
                        let mut s = x.clone();
                        s.push_str(y);
                        Value::Str(s)
                    }
                    _ => return Err(self.type_mismatch(instr, &[&a, &b])),
                };
                self.push(result);
            }
            Instruction::Sub | Instruction::Mul | Instruction::Div | Instruction::Mod => {
                let (a, b) = self.pop_pair()?;
                let (Value::Int(x), Value::Int(y)) = (&a, &b) else {
                    return Err(self.type_mismatch(instr, &[&a, &b]));
                };
                let (x, y) = (*x, *y);
                if y == 0 && matches!(instr, Instruction::Div | Instruction::Mod) {
                    return Err(self.fault_at(
                        FaultKind::DivisionByZero,
                        format!("{} {} 0", x, if *instr == Instruction::Div { "/" } else { "%" }),
                    ));
                }
                let result = match instr {
                    Instruction::Sub => x.checked_sub(y),
                    Instruction::Mul => x.checked_mul(y),
                    Instruction::Div => x.checked_div(y),
                    _ => x.checked_rem(y),
                };
                let result = self.checked(result)?;
                self.push(Value::Int(result));
            }
            Instruction::Neg => {
                let a = self.pop()?;
                let Value::Int(x) = a else {
                    return Err(self.type_mismatch(instr, &[&a]));
                };
                let result = self.checked(x.checked_neg())?;
                self.push(Value::Int(result));
            }

            Instruction::Not => {
                let a = self.pop()?;
                let truth = self.truth(instr, &a)?;
                self.push(Value::Bool(!truth));
            }
            Instruction::And | Instruction::Or => {
                let (a, b) = self.pop_pair()?;
                let (x, y) = (self.truth(instr, &a)?, self.truth(instr, &b)?);
                let result = if *instr == Instruction::And { x && y } else { x || y };
                self.push(Value::Bool(result));
            }
            Instruction::Eq | Instruction::Ne => {
                let (a, b) = self.pop_pair()?;
                if !a.same_kind(&b) {
                    return Err(self.type_mismatch(instr, &[&a, &b]));
                }
                let equal = a == b;
                self.push(Value::Bool(if *instr == Instruction::Eq { equal } else { !equal }));
            }
            Instruction::Lt | Instruction::Le | Instruction::Gt | Instruction::Ge => {
                let (a, b) = self.pop_pair()?;
                let ordering = match (&a, &b) {
                    (Value::Int(x), Value::Int(y)) => x.cmp(y),
                    (Value::Str(x), Value::Str(y)) => x.cmp(y),
                    _ => return Err(self.type_mismatch(instr, &[&a, &b])),
                };
                let result = match instr {
                    Instruction::Lt => ordering.is_lt(),
                    Instruction::Le => ordering.is_le(),
                    Instruction::Gt => ordering.is_gt(),
                    _ => ordering.is_ge(),
                };
                self.push(Value::Bool(result));
            }

            Instruction::Jump(target) => next = *target,
            Instruction::JumpIfFalse(target) => {
                let cond = self.pop()?;
                if !self.truth(instr, &cond)? {
                    next = *target;
                }
            }
            Instruction::Enter(slots) => {
                let frame = self.frame_mut()?;
                let size = (*slots as usize).max(frame.slots.len());
                frame.slots.resize(size, Value::Unit);
            }
            Instruction::Call { target, argc } => {
                if self.frames.is_full() {
                    return Err(self.fault_at(
                        FaultKind::StackOverflow,
                        format!("call depth exceeds {}", self.frames.limit()),
                    ));
                }
                let base = self.frame()?.base;
                let argc = *argc as usize;
                if self.stack.len() < base + argc {
                    return Err(self.fault_at(FaultKind::StackUnderflow, "missing call arguments"));
                }
                let slots = self
                    .stack
                    .pop_n(argc)
                    .ok_or_else(|| self.fault_at(FaultKind::StackUnderflow, "missing call arguments"))?;
                let frame = Frame {
                    return_address: Some(self.pc + 1),
                    slots,
                    base: self.stack.len(),
                    entry: *target,
                    parent: Some(self.frames.len() - 1),
                };
                if self.frames.push(frame).is_err() {
                    return Err(VmError::internal(self.pc, "frame stack is full"));
                }
                self.max_depth_reached = self.max_depth_reached.max(self.frames.len());
                debug!(entry = *target, depth = self.frames.len(), "Push frame");
                next = *target;
            }
            Instruction::Return => {
                let value = self.pop()?;
                let frame = self
                    .frames
                    .pop()
                    .ok_or_else(|| VmError::internal(self.pc, "no active frame"))?;
                self.stack.truncate(frame.base);
                debug!(entry = frame.entry, depth = self.frames.len(), "Pop frame");
                match frame.return_address {
                    Some(address) => {
                        self.push(value);
                        next = address;
                    }
                    None => {
                        self.result = Some(value);
                        self.status = Status::Halted;
                        return Ok(());
                    }
                }
            }

            Instruction::Print => {
                let value = self.pop()?;
                if let Err(err) = writeln!(self.out, "{}", value) {
                    return Err(self.fault_at(FaultKind::Output, err.to_string()));
                }
            }
            Instruction::Trap => {
                let value = self.pop()?;
                return Err(self.fault_at(FaultKind::Trap, value.to_string()));
            }
            Instruction::Halt => {
                self.result = Some(Value::Unit);
                self.status = Status::Halted;
                return Ok(());
            }
        }

        self.pc = next;
        Ok(())
    }

    fn slot(&self, slot: u16) -> Result<&Value, VmError> {
        self.frame()?
            .slots
            .get(slot as usize)
            .ok_or_else(|| VmError::internal(self.pc, format!("bad slot {}", slot)))
    }

    /// Bounds-checked element position for `index` in an array of `len`.
    fn element(&self, instr: &Instruction, len: usize, index: &Value) -> Result<usize, VmError> {
        let Value::Int(i) = index else {
            return Err(self.type_mismatch(instr, &[index]));
        };
        usize::try_from(*i)
            .ok()
            .filter(|i| *i < len)
            .ok_or_else(|| {
                self.fault_at(
                    FaultKind::IndexOutOfBounds,
                    format!("index {} outside array of length {}", i, len),
                )
            })
    }

    fn checked(&self, result: Option<i64>) -> Result<i64, VmError> {
        result.ok_or_else(|| self.fault_at(FaultKind::ArithmeticOverflow, "integer overflow"))
    }
}

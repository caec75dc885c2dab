use std::io;

use super::*;
use crate::api::ExecutionOptions;
use pretty_assertions::assert_eq;

use Instruction::*;

fn code(instructions: Vec<Instruction>) -> Code {
    let len = instructions.len();
    Code {
        instructions,
        entry: 0,
        source_map: vec![None; len],
        functions: Vec::new(),
    }
}

fn int(i: i64) -> Instruction {
    Push(Value::Int(i))
}

fn run(code: &Code) -> (Result<Value, VmError>, String) {
    run_with(code, ExecutionOptions::default())
}

fn run_with(code: &Code, options: ExecutionOptions) -> (Result<Value, VmError>, String) {
    let mut vm = VM::new(code, options, Vec::new());
    let result = vm.run();
    let output = String::from_utf8(vm.into_output()).unwrap();
    (result, output)
}

fn fault_of(result: Result<Value, VmError>) -> Fault {
    match result {
        Err(VmError::Fault(fault)) => fault,
        other => panic!("expected a fault, got {:?}", other),
    }
}

#[test]
fn test_arithmetic() {
    let (result, _) = run(&code(vec![int(6), int(7), Mul, int(2), Sub, int(5), Div, int(3), Mod, Return]));
    assert_eq!(result, Ok(Value::Int(2)));

    let (result, _) = run(&code(vec![int(-7), int(2), Div, int(-7), int(2), Mod, Add, Neg, Return]));
    // -7 / 2 == -3 and -7 % 2 == -1 (truncating)
    assert_eq!(result, Ok(Value::Int(4)));
}

#[test]
fn test_print_and_concat() {
    let (result, output) = run(&code(vec![
        Push(Value::str("ab")),
        Push(Value::str("cd")),
        Add,
        Print,
        int(1),
        Print,
        Push(Value::Bool(false)),
        Print,
        Push(Value::Unit),
        Print,
        Halt,
    ]));
    assert_eq!(result, Ok(Value::Unit));
    assert_eq!(output, "abcd\n1\nfalse\n()\n");
}

#[test]
fn test_division_by_zero() {
    let code = code(vec![int(1), int(0), Div, Return]);
    let mut vm = VM::new(&code, ExecutionOptions::default(), io::sink());
    let fault = fault_of(vm.run());
    assert_eq!(fault.kind, FaultKind::DivisionByZero);
    assert_eq!(fault.offset, 2);
    assert_eq!(vm.status(), Status::Faulted);
    assert_eq!(vm.pc(), 2);
    assert_eq!(vm.step(), Err(VmError::Terminated));
    assert_eq!(vm.fault(), Some(&fault));

    let (result, _) = run(&code_mod_zero());
    assert_eq!(fault_of(result).kind, FaultKind::DivisionByZero);
}

fn code_mod_zero() -> Code {
    code(vec![int(1), int(0), Mod, Return])
}

#[test]
fn test_overflow() {
    let (result, _) = run(&code(vec![int(i64::MAX), int(1), Add, Return]));
    assert_eq!(fault_of(result).kind, FaultKind::ArithmeticOverflow);

    let (result, _) = run(&code(vec![int(i64::MIN), Neg, Return]));
    assert_eq!(fault_of(result).kind, FaultKind::ArithmeticOverflow);

    let (result, _) = run(&code(vec![int(i64::MIN), int(-1), Div, Return]));
    assert_eq!(fault_of(result).kind, FaultKind::ArithmeticOverflow);
}

#[test]
fn test_type_mismatch() {
    let cases = [
        vec![int(1), Push(Value::Bool(true)), Add, Return],
        vec![Push(Value::str("a")), int(1), Add, Return],
        vec![Push(Value::str("a")), Push(Value::str("b")), Sub, Return],
        vec![int(1), Push(Value::Bool(true)), Eq, Return],
        vec![Push(Value::Bool(true)), Push(Value::Bool(false)), Lt, Return],
        vec![Push(Value::str("x")), Not, Return],
        vec![Push(Value::Unit), JumpIfFalse(0)],
    ];
    for instructions in cases {
        let listing = format!("{:?}", instructions);
        let (result, _) = run(&code(instructions));
        assert_eq!(fault_of(result).kind, FaultKind::TypeMismatch, "{}", listing);
    }
}

#[test]
fn test_comparisons_and_logic() {
    let (result, output) = run(&code(vec![
        Push(Value::str("abc")),
        Push(Value::str("abd")),
        Lt,
        Print,
        int(3),
        int(3),
        Ge,
        Print,
        Push(Value::Unit),
        Push(Value::Unit),
        Eq,
        Print,
        int(2),
        int(0),
        And,
        Print,
        int(2),
        Push(Value::Bool(false)),
        Or,
        Print,
        int(0),
        Not,
        Print,
        Halt,
    ]));
    assert_eq!(result, Ok(Value::Unit));
    assert_eq!(output, "true\ntrue\ntrue\nfalse\ntrue\ntrue\n");
}

#[test]
fn test_jumps() {
    // Count down from 3, printing each value.
    let code = code(vec![
        Enter(1),  // 0
        int(3),    // 1
        Store(0),  // 2
        Load(0),   // 3
        JumpIfFalse(13), // 4: int truth value
        Load(0),   // 5
        Print,     // 6
        Load(0),   // 7
        int(1),    // 8
        Sub,       // 9
        Store(0),  // 10
        Jump(3),   // 11
        Halt,      // 12
        Push(Value::Unit), // 13
        Return,    // 14
    ]);
    let (result, output) = run(&code);
    assert_eq!(result, Ok(Value::Unit));
    assert_eq!(output, "3\n2\n1\n");
}

fn call_program() -> Code {
    code(vec![
        Enter(0),                  // 0: main
        int(2),                    // 1
        int(3),                    // 2
        Call { target: 7, argc: 2 }, // 3
        Print,                     // 4
        Push(Value::Unit),         // 5
        Return,                    // 6
        Enter(3),                  // 7: sub(a, b)
        Load(0),                   // 8
        Load(1),                   // 9
        Sub,                       // 10
        Return,                    // 11
    ])
}

#[test]
fn test_call_and_return() {
    let code = call_program();
    let mut vm = VM::new(&code, ExecutionOptions::default(), Vec::new());
    for _ in 0..4 {
        vm.step().unwrap();
    }
    assert_eq!(vm.pc(), 7);
    assert_eq!(vm.depth(), 2);
    let frame = &vm.frames()[1];
    assert_eq!(frame.return_address, Some(4));
    assert_eq!(frame.slots, vec![Value::Int(2), Value::Int(3)]);
    assert_eq!(frame.base, 0);
    assert_eq!(frame.parent, Some(0));

    // ENTER grows the slot table with Unit.
    vm.step().unwrap();
    assert_eq!(vm.frames()[1].slots.len(), 3);
    assert_eq!(vm.frames()[1].slots[2], Value::Unit);

    assert_eq!(vm.run(), Ok(Value::Unit));
    assert_eq!(vm.depth(), 0);
    assert_eq!(vm.max_depth_reached(), 2);
    assert_eq!(vm.output().as_slice(), b"-1\n");
}

#[test]
fn test_stack_overflow() {
    let code = code(vec![Enter(0), Call { target: 0, argc: 0 }]);
    let options = ExecutionOptions {
        max_depth: 5,
        ..Default::default()
    };
    let mut vm = VM::new(&code, options, io::sink());
    let fault = fault_of(vm.run());
    assert_eq!(fault.kind, FaultKind::StackOverflow);
    assert_eq!(fault.offset, 1);
    assert_eq!(vm.max_depth_reached(), 5);
    assert_eq!(vm.depth(), 5);
}

#[test]
fn test_stack_underflow() {
    let (result, _) = run(&code(vec![Pop]));
    assert_eq!(fault_of(result).kind, FaultKind::StackUnderflow);

    // A callee cannot pop its caller's operands.
    let (result, _) = run(&code(vec![int(1), Call { target: 2, argc: 0 }, Pop]));
    let fault = fault_of(result);
    assert_eq!(fault.kind, FaultKind::StackUnderflow);
    assert_eq!(fault.offset, 2);
}

#[test]
fn test_step_limit() {
    let options = ExecutionOptions {
        max_steps: Some(10),
        ..Default::default()
    };
    let code = code(vec![Jump(0)]);
    let mut vm = VM::new(&code, options, io::sink());
    let fault = fault_of(vm.run());
    assert_eq!(fault.kind, FaultKind::StepLimitExceeded);
    assert_eq!(vm.steps(), 10);
}

#[test]
fn test_trap() {
    let (result, _) = run(&code(vec![Push(Value::str("boom")), Trap]));
    let fault = fault_of(result);
    assert_eq!(fault.kind, FaultKind::Trap);
    assert_eq!(fault.message, "boom");
    assert_eq!(fault.offset, 1);
}

struct BrokenPipe;

impl io::Write for BrokenPipe {
    fn write(&mut self, _: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_output_failure() {
    let code = code(vec![int(1), Print, Halt]);
    let mut vm = VM::new(&code, ExecutionOptions::default(), BrokenPipe);
    assert_eq!(fault_of(vm.run()).kind, FaultKind::Output);
}

#[test]
fn test_internal_errors() {
    let bad_slot = code(vec![Load(3)]);
    let mut vm = VM::new(&bad_slot, ExecutionOptions::default(), io::sink());
    assert!(matches!(vm.step(), Err(VmError::Internal { offset: 0, .. })));
    assert_eq!(vm.step(), Err(VmError::Terminated));

    let falls_off = code(vec![int(1)]);
    let mut vm = VM::new(&falls_off, ExecutionOptions::default(), io::sink());
    assert_eq!(vm.step(), Ok(Status::Running));
    assert!(matches!(vm.step(), Err(VmError::Internal { offset: 1, .. })));
}

#[test]
fn test_status_transitions() {
    let code = code(vec![int(1), Pop, Halt]);
    let mut vm = VM::new(&code, ExecutionOptions::default(), io::sink());
    assert_eq!(vm.status(), Status::Ready);
    assert_eq!(vm.step(), Ok(Status::Running));
    assert_eq!(vm.step(), Ok(Status::Running));
    assert_eq!(vm.step(), Ok(Status::Halted));
    assert_eq!(vm.step(), Err(VmError::Terminated));
    assert_eq!(vm.status(), Status::Halted);
    assert_eq!(vm.steps(), 3);
}

#[test]
fn test_snapshots_are_deterministic() {
    let code = call_program();
    let mut a = VM::new(&code, ExecutionOptions::default(), io::sink());
    let mut b = VM::new(&code, ExecutionOptions::default(), io::sink());
    for _ in 0..6 {
        a.step().unwrap();
        b.step().unwrap();
        assert_eq!(a.snapshot(), b.snapshot());
    }
    assert_eq!(a.snapshot().frames.len(), 2);
    assert_eq!(a.snapshot().stack, vec![Value::Int(2)]);
}

#[test]
fn test_arrays() {
    let (result, output) = run(&code(vec![
        Enter(1),
        int(1),
        int(2),
        int(3),
        Array(3),
        Store(0),
        // a[1] = a[2] * 10
        int(1),
        int(2),
        LoadIndexed(0),
        int(10),
        Mul,
        StoreIndexed(0),
        Load(0),
        Print,
        int(1),
        LoadIndexed(0),
        Print,
        Push(Value::str("x")),
        int(2),
        Alloc,
        Print,
        Halt,
    ]));
    assert_eq!(result, Ok(Value::Unit));
    assert_eq!(output, "[1, 30, 3]\n30\n[\"x\", \"x\"]\n");
}

#[test]
fn test_array_copies_are_independent() {
    let (_, output) = run(&code(vec![
        Enter(2),
        int(1),
        int(2),
        Array(2),
        Store(0),
        Load(0),
        Store(1),
        int(0),
        int(9),
        StoreIndexed(1),
        Load(0),
        Print,
        Load(1),
        Print,
        Halt,
    ]));
    assert_eq!(output, "[1, 2]\n[9, 2]\n");
}

#[test]
fn test_index_out_of_bounds() {
    let array = || vec![Enter(1), int(7), Array(1), Store(0)];

    let mut load = array();
    load.extend([int(1), LoadIndexed(0), Return]);
    let (result, _) = run(&code(load));
    let fault = fault_of(result);
    assert_eq!(fault.kind, FaultKind::IndexOutOfBounds);
    assert_eq!(fault.message, "index 1 outside array of length 1");
    assert_eq!(fault.offset, 5);

    let mut negative = array();
    negative.extend([int(-1), LoadIndexed(0), Return]);
    let (result, _) = run(&code(negative));
    assert_eq!(fault_of(result).kind, FaultKind::IndexOutOfBounds);

    let mut store = array();
    store.extend([int(3), int(0), StoreIndexed(0), Halt]);
    let (result, _) = run(&code(store));
    let fault = fault_of(result);
    assert_eq!(fault.kind, FaultKind::IndexOutOfBounds);
    assert_eq!(fault.offset, 6);

    for size in [-1, MAX_ARRAY_LEN as i64 + 1] {
        let (result, _) = run(&code(vec![int(0), int(size), Alloc, Return]));
        assert_eq!(fault_of(result).kind, FaultKind::IndexOutOfBounds, "size {}", size);
    }

    let (result, _) = run(&code(vec![int(0), int(0), Alloc, Return]));
    assert_eq!(result, Ok(Value::Array(Default::default())));
}

#[test]
fn test_array_type_mismatch() {
    let cases = [
        // Indexing a non-array slot.
        vec![Enter(1), int(5), Store(0), int(0), LoadIndexed(0), Return],
        vec![Enter(1), int(0), int(1), StoreIndexed(0), Halt],
        // Non-integer index.
        vec![Enter(1), int(5), Array(1), Store(0), Push(Value::Bool(true)), LoadIndexed(0), Return],
        // Non-integer size.
        vec![int(0), Push(Value::str("3")), Alloc, Return],
    ];
    for instructions in cases {
        let listing = format!("{:?}", instructions);
        let (result, _) = run(&code(instructions));
        assert_eq!(fault_of(result).kind, FaultKind::TypeMismatch, "{}", listing);
    }

    let (result, _) = run(&code(vec![int(1), Array(2), Return]));
    assert_eq!(fault_of(result).kind, FaultKind::StackUnderflow);
}

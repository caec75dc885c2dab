//! Tests for the translator.

use crate::{
    api::ExecutionOptions,
    compiler::{TranslateError, translate},
    parser::{self, Pos},
    vm::{Code, Instruction, LocalVar, VM, Value},
};
use indoc::indoc;
use pretty_assertions::assert_eq;

use Instruction::*;

fn translate_source(source: &str) -> Result<Code, TranslateError> {
    let program = parser::parse(source).unwrap_or_else(|e| panic!("parse failed: {}", e));
    translate(&program)
}

fn compile(source: &str) -> Code {
    translate_source(source).unwrap_or_else(|e| panic!("translation failed: {}", e))
}

/// Helper function to compile and run a program, returning its output.
fn compile_and_run(source: &str) -> (Code, String) {
    let code = compile(source);
    let mut vm = VM::new(&code, ExecutionOptions::default(), Vec::new());
    if let Err(e) = vm.run() {
        panic!("execution failed: {}\n{:?}", e, code);
    }
    let output = String::from_utf8(vm.into_output()).unwrap();
    (code, output)
}

fn int(i: i64) -> Instruction {
    Push(Value::Int(i))
}

fn lines(code: &Code) -> Vec<u32> {
    (0..code.len()).map(|i| code.line(i).unwrap_or(0)).collect()
}

#[test]
fn test_translate_let_and_print() {
    let (code, output) = compile_and_run(indoc! {"
        fn main() {
            let x = 1 + 2;
            print x;
        }
    "});
    assert_eq!(
        code.instructions,
        vec![Enter(1), int(1), int(2), Add, Store(0), Load(0), Print, Push(Value::Unit), Return]
    );
    assert_eq!(lines(&code), vec![1, 2, 2, 2, 2, 3, 3, 4, 4]);
    assert_eq!(code.position(1), Some(Pos::new(2, 5)));
    assert_eq!(code.entry, 0);
    assert_eq!(output, "3\n");

    let main = &code.functions[0];
    assert_eq!((main.entry, main.end, main.arity, main.slots), (0, 9, 0, 1));
    assert_eq!(
        main.locals,
        vec![LocalVar {
            name: "x".to_string(),
            slot: 0,
            live: 5..9,
        }]
    );
}

#[test]
fn test_translate_if_else() {
    let (code, output) = compile_and_run(indoc! {"
        fn main() {
            if false {
                print 1;
            } else {
                print 2;
            }
        }
    "});
    assert_eq!(
        code.instructions,
        vec![
            Enter(0),
            Push(Value::Bool(false)),
            JumpIfFalse(6),
            int(1),
            Print,
            Jump(8),
            int(2),
            Print,
            Push(Value::Unit),
            Return,
        ]
    );
    // The jump over the else branch stays on the last line of the then branch.
    assert_eq!(lines(&code), vec![1, 2, 2, 3, 3, 3, 5, 5, 7, 7]);
    assert_eq!(output, "2\n");
}

#[test]
fn test_translate_if_without_else() {
    let code = compile("fn main() { if true { print 1; } print 2; }");
    assert_eq!(
        code.instructions,
        vec![
            Enter(0),
            Push(Value::Bool(true)),
            JumpIfFalse(5),
            int(1),
            Print,
            int(2),
            Print,
            Push(Value::Unit),
            Return,
        ]
    );
}

#[test]
fn test_translate_while() {
    let (code, output) = compile_and_run(indoc! {"
        fn main() {
            let i = 0;
            while i < 3 {
                i = i + 1;
                print i;
            }
        }
    "});
    assert_eq!(
        code.instructions,
        vec![
            Enter(1),
            int(0),
            Store(0),
            Load(0),
            int(3),
            Lt,
            JumpIfFalse(14),
            Load(0),
            int(1),
            Add,
            Store(0),
            Load(0),
            Print,
            Jump(3),
            Push(Value::Unit),
            Return,
        ]
    );
    // Condition and back edge map to the `while` line.
    assert_eq!(lines(&code), vec![1, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 3, 7, 7]);
    assert_eq!(output, "1\n2\n3\n");
}

#[test]
fn test_translate_calls() {
    let (code, output) = compile_and_run(indoc! {"
        fn sub(a, b) {
            return a - b;
        }

        fn main() {
            print sub(1, 2);
        }
    "});
    // `main` is laid out first; the call is patched to `sub`'s entry.
    assert_eq!(
        code.instructions,
        vec![
            Enter(0),
            int(1),
            int(2),
            Call { target: 7, argc: 2 },
            Print,
            Push(Value::Unit),
            Return,
            Enter(2),
            Load(0),
            Load(1),
            Sub,
            Return,
            Push(Value::Unit),
            Return,
        ]
    );
    assert_eq!(output, "-1\n");

    let names: Vec<_> = code.functions.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["main", "sub"]);
    let sub = code.function("sub").unwrap();
    assert_eq!((sub.entry, sub.end, sub.arity, sub.slots), (7, 14, 2, 2));
    assert_eq!(sub.locals[1].live, 7..14);
    assert_eq!(code.function_at(10).map(|f| f.name.as_str()), Some("sub"));
    assert_eq!(code.line(7), Some(1));
    assert_eq!(code.line(12), Some(3));
}

#[test]
fn test_expression_statements_pop() {
    let code = compile("fn f() { return 1; } fn main() { f(); 1 + 2; }");
    assert_eq!(
        &code.instructions[..7],
        &[
            Enter(0),
            Call { target: 9, argc: 0 },
            Pop,
            int(1),
            int(2),
            Add,
            Pop,
        ]
    );
}

#[test]
fn test_slot_reuse() {
    let code = compile(indoc! {"
        fn main() {
            if true { let a = 1; print a; }
            if true { let b = 2; print b; }
            let c = 3;
        }
    "});
    let main = &code.functions[0];
    assert_eq!(main.slots, 1);
    assert_eq!(code.instructions[0], Enter(1));
    let slots: Vec<_> = main.locals.iter().map(|l| (l.name.as_str(), l.slot)).collect();
    assert_eq!(slots, [("a", 0), ("b", 0), ("c", 0)]);
    assert!(main.locals[0].live.end <= main.locals[1].live.start);
}

#[test]
fn test_shadowing() {
    let (code, output) = compile_and_run(indoc! {"
        fn main() {
            let x = 1;
            if true {
                let x = 2;
                print x;
            }
            print x;
        }
    "});
    assert_eq!(output, "2\n1\n");
    let main = &code.functions[0];
    assert_eq!(main.slots, 2);

    // Inside the block the inner binding wins.
    let inner_print = code
        .instructions
        .iter()
        .position(|i| *i == Load(1))
        .unwrap();
    assert_eq!(main.local_at("x", inner_print).map(|l| l.slot), Some(1));
    let outer_print = code.instructions.iter().rposition(|i| *i == Load(0)).unwrap();
    assert_eq!(main.local_at("x", outer_print).map(|l| l.slot), Some(0));
    assert_eq!(main.locals_at(inner_print).len(), 1);
}

#[test]
fn test_error_and_exit() {
    let code = compile("fn main() { error; error \"bad\"; exit; }");
    assert_eq!(
        &code.instructions[1..6],
        &[
            Push(Value::str("error")),
            Trap,
            Push(Value::str("bad")),
            Trap,
            Halt,
        ]
    );
}

#[test]
fn test_every_instruction_is_mapped() {
    let code = compile(indoc! {"
        fn fib(n) {
            if n < 2 { return n; }
            return fib(n - 1) + fib(n - 2);
        }

        fn main() {
            let i = 0;
            while i <= 10 {
                print fib(i);
                i = i + 1;
            }
        }
    "});
    assert_eq!(code.source_map.len(), code.len());
    assert!(code.source_map.iter().all(Option::is_some));
    assert_eq!(code.validate(), Ok(()));
    assert_eq!(code.entry, code.function("main").unwrap().entry);
}

#[test]
fn test_translate_errors() {
    assert_eq!(
        translate_source("fn helper() {}"),
        Err(TranslateError::MissingMain)
    );
    assert_eq!(
        translate_source("fn main() { g(); }"),
        Err(TranslateError::UnknownFunction {
            name: "g".to_string()
        })
    );
    assert_eq!(
        translate_source("fn main() { print y; }"),
        Err(TranslateError::UnboundName {
            name: "y".to_string(),
            function: "main".to_string()
        })
    );
    assert!(matches!(
        translate_source("fn f(a) {} fn main() { f(); }"),
        Err(TranslateError::ArityMismatch { expected: 1, found: 0, .. })
    ));
}

#[test]
fn test_translated_code_runs_recursion() {
    let (_, output) = compile_and_run(indoc! {"
        fn fact(n) {
            if n <= 1 { return 1; }
            return n * fact(n - 1);
        }
        fn main() { print fact(10); }
    "});
    assert_eq!(output, "3628800\n");
}

#[test]
fn test_debug_listing() {
    let code = compile("fn main() { while false { } }");
    let listing = format!("{:?}", code);
    assert!(listing.contains("fn main (arity 0, slots 0)"), "{}", listing);
    assert!(listing.contains("JUMPF 4 (to L1)"), "{}", listing);
    assert!(listing.contains("L0:"), "{}", listing);
}

#[test]
fn test_translate_arrays() {
    let (code, output) = compile_and_run(indoc! {"
        fn main() {
            let a = [1, 2];
            a[0] = a[1] * 3;
            print [a[0]; 2];
        }
    "});
    assert_eq!(
        code.instructions,
        vec![
            Enter(1),
            int(1),
            int(2),
            Array(2),
            Store(0),
            int(0),
            int(1),
            LoadIndexed(0),
            int(3),
            Mul,
            StoreIndexed(0),
            int(0),
            LoadIndexed(0),
            int(2),
            Alloc,
            Print,
            Push(Value::Unit),
            Return,
        ]
    );
    assert_eq!(lines(&code), vec![1, 2, 2, 2, 2, 3, 3, 3, 3, 3, 3, 4, 4, 4, 4, 4, 5, 5]);
    assert_eq!(output, "[6, 6]\n");
}

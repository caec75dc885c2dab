use super::parser::{ProgramParser, Rule};
use super::*;
use indoc::indoc;
use pest::Parser;
use pretty_assertions::assert_eq;

fn parse_ok(source: &str) -> Program {
    match parse(source) {
        Ok(program) => program,
        Err(e) => panic!("failed to parse {:?}: {}", source, e),
    }
}

/// Parse `fn main() { <stmt> }` and return the single statement.
fn single_stmt(stmt: &str) -> Stmt {
    let source = format!("fn main() {{ {} }}", stmt);
    let mut program = parse_ok(&source);
    let mut main = program.functions.remove(0);
    assert_eq!(main.body.stmts.len(), 1, "expected one statement in {:?}", stmt);
    main.body.stmts.remove(0)
}

fn expr_of(stmt: &str) -> Expr {
    match single_stmt(stmt).kind {
        StmtKind::Expr(e) | StmtKind::Print(e) => e,
        other => panic!("not an expression statement: {:?}", other),
    }
}

/// Render an expression as a fully parenthesized string to check precedence.
fn show(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Literal(Literal::Int(i)) => i.to_string(),
        ExprKind::Literal(Literal::Bool(b)) => b.to_string(),
        ExprKind::Literal(Literal::Str(s)) => format!("{:?}", s),
        ExprKind::Ident(name) => name.clone(),
        ExprKind::Call { name, args } => {
            let args: Vec<_> = args.iter().map(show).collect();
            format!("{}({})", name, args.join(", "))
        }
        ExprKind::Array(items) => {
            let items: Vec<_> = items.iter().map(show).collect();
            format!("[{}]", items.join(", "))
        }
        ExprKind::ArrayRepeat { fill, size } => format!("[{}; {}]", show(fill), show(size)),
        ExprKind::Index { name, index } => format!("{}[{}]", name, show(index)),
        ExprKind::Unary { op, expr } => match op {
            UnaryOp::Neg => format!("(-{})", show(expr)),
            UnaryOp::Not => format!("(not {})", show(expr)),
        },
        ExprKind::Binary { op, left, right } => {
            format!("({} {} {})", show(left), op, show(right))
        }
        ExprKind::Comparison { op, left, right } => {
            format!("({} {} {})", show(left), op, show(right))
        }
        ExprKind::Boolean { op, left, right } => {
            let op = match op {
                BoolOp::And => "and",
                BoolOp::Or => "or",
            };
            format!("({} {} {})", show(left), op, show(right))
        }
    }
}

#[test]
fn test_valid_programs() -> Result<(), pest::error::Error<Rule>> {
    let examples = [
        "",
        "fn main() {}",
        "fn main() { print 1; }",
        "fn f(a, b,) { return a + b; } fn main() { f(1, 2); }",
        "fn main() { let x = 1; x = x + 1; }",
        "fn main() { if x { } else if y { } else { } }",
        "fn main() { while i < 10 { i = i + 1; } }",
        "fn main() { return; }",
        "fn main() { error \"boom\"; error; exit; }",
        "// comment\nfn main() { # another\n }",
        "fn main() { letter = 1; iffy = 2; }",
        "fn main() { let a = [1, 2]; a[0] = a[1]; print [0; 3]; }",
    ];
    for example in examples {
        ProgramParser::parse(Rule::program, example)?;
    }
    Ok(())
}

#[test]
fn test_invalid_programs() {
    let examples = [
        "fn main( { }",
        "fn main() { let = 1; }",
        "fn main() { print 1 }",
        "fn let() {}",
        "fn main() { x == ; }",
        "main() {}",
        "fn main() { \"unterminated; }",
        "fn main() { a[0][1] = 2; }",
        "fn main() { f()[0] = 1; }",
        "fn main() { print [1, 2; }",
    ];
    for example in examples {
        assert!(parse(example).is_err(), "{:?} should not parse", example);
    }
}

#[test]
fn test_function_shape() {
    let program = parse_ok(indoc! {"
        fn add(a, b) {
            return a + b;
        }

        fn main() {
            print add(1, 2);
        }
    "});
    assert_eq!(program.functions.len(), 2);

    let add = &program.functions[0];
    assert_eq!(add.name, "add");
    let params: Vec<_> = add.params.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(params, ["a", "b"]);
    assert_eq!(add.loc.pos, Pos::new(1, 1));
    assert_eq!(add.body.stmts[0].loc.pos, Pos::new(2, 5));
    assert_eq!(add.body.end.pos, Pos::new(3, 1));

    let main = program.function("main").unwrap();
    assert!(main.params.is_empty());
    assert_eq!(main.loc.pos.line, 5);
}

#[test]
fn test_keyword_prefixed_identifiers() {
    match single_stmt("letter = 5;").kind {
        StmtKind::Assign { name, .. } => assert_eq!(name, "letter"),
        other => panic!("expected assignment, got {:?}", other),
    }
    match single_stmt("let notable = 5;").kind {
        StmtKind::Let { name, .. } => assert_eq!(name, "notable"),
        other => panic!("expected let, got {:?}", other),
    }
}

#[test]
fn test_precedence() {
    let cases = [
        ("1 + 2 * 3;", "(1 + (2 * 3))"),
        ("(1 + 2) * 3;", "((1 + 2) * 3)"),
        ("1 - 2 - 3;", "((1 - 2) - 3)"),
        ("10 / 2 % 3;", "((10 / 2) % 3)"),
        ("-a + b;", "((-a) + b)"),
        ("a < b == c < d;", "((a < b) == (c < d))"),
        ("a or b and c;", "(a or (b and c))"),
        ("a || b && c;", "(a or (b and c))"),
        ("not a and b;", "((not a) and b)"),
        ("!a != b;", "((not a) != b)"),
        ("a + 1 >= f(b, c * 2);", "((a + 1) >= f(b, (c * 2)))"),
        ("1_000 + 2;", "(1000 + 2)"),
    ];
    for (source, expected) in cases {
        assert_eq!(show(&expr_of(source)), expected, "source: {}", source);
    }
}

#[test]
fn test_literals() {
    assert_eq!(show(&expr_of("true;")), "true");
    assert_eq!(show(&expr_of("false;")), "false");
    assert_eq!(
        show(&expr_of(r#"print "a\"b\\c\n";"#)),
        format!("{:?}", "a\"b\\c\n")
    );
}

#[test]
fn test_integer_overflow_is_an_error() {
    let err = parse("fn main() { print 99999999999999999999; }").unwrap_err();
    assert!(matches!(err.kind, ParseErrorKind::InvalidNumber { .. }));
    assert_eq!(err.pos, Pos::new(1, 19));
}

#[test]
fn test_else_if_chain() {
    let stmt = single_stmt("if a { print 1; } else if b { print 2; } else { print 3; }");
    let StmtKind::If { else_block, .. } = stmt.kind else {
        panic!("expected if");
    };
    let else_block = else_block.expect("else branch");
    assert_eq!(else_block.stmts.len(), 1);
    let StmtKind::If { else_block: inner_else, .. } = &else_block.stmts[0].kind else {
        panic!("expected nested if");
    };
    assert!(inner_else.is_some());
}

#[test]
fn test_error_position() {
    let err = parse("fn main() {\n    print 1\n}").unwrap_err();
    assert!(matches!(err.kind, ParseErrorKind::Syntax { .. }));
    assert!(err.pos.line >= 2, "error reported at {}", err.pos);
}

#[test]
fn test_pos_of() {
    let source = "ab\ncd\n\nef";
    assert_eq!(pos_of(source, 0), Pos::new(1, 1));
    assert_eq!(pos_of(source, 1), Pos::new(1, 2));
    assert_eq!(pos_of(source, 3), Pos::new(2, 1));
    assert_eq!(pos_of(source, 7), Pos::new(4, 1));
}

#[test]
fn test_array_expressions() {
    assert_eq!(show(&expr_of("print [1, x + 1, \"s\"];")), "[1, (x + 1), \"s\"]");
    assert_eq!(show(&expr_of("print [];")), "[]");
    assert_eq!(show(&expr_of("print [0; n * 2];")), "[0; (n * 2)]");
    assert_eq!(show(&expr_of("print -a[i + 1] * 2;")), "((-a[(i + 1)]) * 2)");
    assert_eq!(show(&expr_of("print a[b[0]] == c;")), "(a[b[0]] == c)");
}

#[test]
fn test_index_assignment() {
    let stmt = single_stmt("a[i] = a[i] + 1;");
    let StmtKind::AssignIndex { name, index, value } = stmt.kind else {
        panic!("expected an indexed assignment, got {:?}", stmt.kind);
    };
    assert_eq!(name, "a");
    assert_eq!(show(&index), "i");
    assert_eq!(show(&value), "(a[i] + 1)");

    // `==` after an index is a comparison, not an assignment.
    assert!(matches!(single_stmt("a[0] == 1;").kind, StmtKind::Expr(_)));
}

//! Static checks run between parsing and translation.
//!
//! The checker resolves every name against the lexical scopes of its
//! function and every call against the function table. Values are not
//! type-checked: kind mismatches are runtime faults.

use hashbrown::{HashMap, HashSet};
use tracing::debug;

use crate::analyzer::{CheckError, CheckErrorKind};
use crate::parser::{Block, Expr, ExprKind, Function, Loc, Program, Stmt, StmtKind};

/// Check a whole program, collecting every error instead of stopping at the
/// first one.
pub fn check(program: &Program) -> Result<(), Vec<CheckError>> {
    let mut checker = Checker {
        arities: HashMap::new(),
        scopes: Vec::new(),
        errors: Vec::new(),
    };

    for function in &program.functions {
        if checker.arities.contains_key(function.name.as_str()) {
            checker.error(
                CheckErrorKind::DuplicateFunction {
                    name: function.name.clone(),
                    span: function.loc.span.clone(),
                },
                &function.loc,
            );
        } else {
            checker
                .arities
                .insert(function.name.as_str(), function.params.len());
        }
    }

    match program.function("main") {
        None => checker.errors.push(CheckError::new(
            CheckErrorKind::MissingMain,
            Default::default(),
        )),
        Some(main) if !main.params.is_empty() => checker.error(
            CheckErrorKind::MainWithParameters {
                span: main.loc.span.clone(),
            },
            &main.loc,
        ),
        Some(_) => {}
    }

    for function in &program.functions {
        checker.check_function(function);
    }

    if checker.errors.is_empty() {
        Ok(())
    } else {
        debug!(errors = checker.errors.len(), "Check failed");
        Err(checker.errors)
    }
}

struct Checker<'a> {
    arities: HashMap<&'a str, usize>,
    scopes: Vec<HashSet<&'a str>>,
    errors: Vec<CheckError>,
}

impl<'a> Checker<'a> {
    fn error(&mut self, kind: CheckErrorKind, loc: &Loc) {
        self.errors.push(CheckError::new(kind, loc.pos));
    }

    fn is_declared(&self, name: &str) -> bool {
        self.scopes.iter().rev().any(|scope| scope.contains(name))
    }

    fn declare(&mut self, name: &'a str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name);
        }
    }

    fn check_function(&mut self, function: &'a Function) {
        let mut params = HashSet::new();
        for param in &function.params {
            if !params.insert(param.name.as_str()) {
                self.error(
                    CheckErrorKind::DuplicateParameter {
                        name: param.name.clone(),
                        span: param.loc.span.clone(),
                    },
                    &param.loc,
                );
            }
        }
        self.scopes.push(params);
        self.check_block(&function.body);
        self.scopes.pop();
    }

    fn check_block(&mut self, block: &'a Block) {
        self.scopes.push(HashSet::new());
        for stmt in &block.stmts {
            self.check_stmt(stmt);
        }
        self.scopes.pop();
    }

    fn check_stmt(&mut self, stmt: &'a Stmt) {
        match &stmt.kind {
            StmtKind::Let { name, value } => {
                // The initializer cannot see the name being bound.
                self.check_expr(value);
                self.declare(name);
            }
            StmtKind::Assign { name, value } => {
                self.check_expr(value);
                if !self.is_declared(name) {
                    self.error(
                        CheckErrorKind::UndeclaredVariable {
                            name: name.clone(),
                            span: stmt.loc.span.clone(),
                        },
                        &stmt.loc,
                    );
                }
            }
            StmtKind::AssignIndex { name, index, value } => {
                self.check_expr(index);
                self.check_expr(value);
                if !self.is_declared(name) {
                    self.error(
                        CheckErrorKind::UndeclaredVariable {
                            name: name.clone(),
                            span: stmt.loc.span.clone(),
                        },
                        &stmt.loc,
                    );
                }
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                self.check_expr(cond);
                self.check_block(then_block);
                if let Some(else_block) = else_block {
                    self.check_block(else_block);
                }
            }
            StmtKind::While { cond, body } => {
                self.check_expr(cond);
                self.check_block(body);
            }
            StmtKind::Return(value) | StmtKind::Error(value) => {
                if let Some(value) = value {
                    self.check_expr(value);
                }
            }
            StmtKind::Print(value) | StmtKind::Expr(value) => self.check_expr(value),
            StmtKind::Exit => {}
        }
    }

    fn check_expr(&mut self, expr: &'a Expr) {
        match &expr.kind {
            ExprKind::Literal(_) => {}
            ExprKind::Ident(name) | ExprKind::Index { name, .. } => {
                if let ExprKind::Index { index, .. } = &expr.kind {
                    self.check_expr(index);
                }
                if !self.is_declared(name) {
                    self.error(
                        CheckErrorKind::UndeclaredVariable {
                            name: name.clone(),
                            span: expr.loc.span.clone(),
                        },
                        &expr.loc,
                    );
                }
            }
            ExprKind::Call { name, args } => {
                for arg in args {
                    self.check_expr(arg);
                }
                match self.arities.get(name.as_str()).copied() {
                    None => self.error(
                        CheckErrorKind::UnknownFunction {
                            name: name.clone(),
                            span: expr.loc.span.clone(),
                        },
                        &expr.loc,
                    ),
                    Some(expected) if expected != args.len() => self.error(
                        CheckErrorKind::ArityMismatch {
                            name: name.clone(),
                            expected,
                            found: args.len(),
                            span: expr.loc.span.clone(),
                        },
                        &expr.loc,
                    ),
                    Some(_) => {}
                }
            }
            ExprKind::Array(items) => {
                for item in items {
                    self.check_expr(item);
                }
            }
            ExprKind::ArrayRepeat { fill, size } => {
                self.check_expr(fill);
                self.check_expr(size);
            }
            ExprKind::Unary { expr: inner, .. } => self.check_expr(inner),
            ExprKind::Binary { left, right, .. }
            | ExprKind::Comparison { left, right, .. }
            | ExprKind::Boolean { left, right, .. } => {
                self.check_expr(left);
                self.check_expr(right);
            }
        }
    }
}

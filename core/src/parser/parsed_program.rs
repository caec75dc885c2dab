//! Syntax tree produced by the parser.
//!
//! Every function, statement and expression carries a [`Loc`] so the
//! translator can build the source map and the checker can point at the
//! offending code.

use crate::parser::{BinaryOp, BoolOp, ComparisonOp, Loc, UnaryOp};

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub functions: Vec<Function>,
}

impl Program {
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Block,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub loc: Loc,
}

/// A braced statement list. `end` is the location of the closing brace.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub end: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Let {
        name: String,
        value: Expr,
    },
    Assign {
        name: String,
        value: Expr,
    },
    /// `name[index] = value;`
    AssignIndex {
        name: String,
        index: Expr,
        value: Expr,
    },
    If {
        cond: Expr,
        then_block: Block,
        else_block: Option<Block>,
    },
    While {
        cond: Expr,
        body: Block,
    },
    Return(Option<Expr>),
    Print(Expr),
    Error(Option<Expr>),
    Exit,
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Ident(String),
    Call {
        name: String,
        args: Vec<Expr>,
    },
    /// `[a, b, c]`
    Array(Vec<Expr>),
    /// `[fill; size]`
    ArrayRepeat {
        fill: Box<Expr>,
        size: Box<Expr>,
    },
    /// `name[index]`
    Index {
        name: String,
        index: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Comparison {
        op: ComparisonOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Boolean {
        op: BoolOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Bool(bool),
    Str(String),
}

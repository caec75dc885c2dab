mod parsed_program;
pub mod parser;
mod syntax;
pub mod error;

// Re-export the parser and rule enum for external use
pub use parser::ProgramParser;
pub use parser::Rule;
pub use parser::parse;

pub use parsed_program::{
    Block, Expr, ExprKind, Function, Literal, Param, Program, Stmt, StmtKind,
};
pub use syntax::{BinaryOp, BoolOp, ComparisonOp, Loc, Pos, Span, UnaryOp};
pub use error::{ParseError, ParseErrorKind, pos_of};

#[cfg(test)]
mod parse_test;

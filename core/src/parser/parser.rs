use lazy_static::lazy_static;
use pest::Parser;
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest_derive::Parser;

use crate::parser::{
    BinaryOp, Block, BoolOp, ComparisonOp, Expr, ExprKind, Function, Literal, Loc, Param,
    ParseError, ParseErrorKind, Program, Span, Stmt, StmtKind, UnaryOp,
};

lazy_static! {
    // Note: precedence is defined lowest to highest.
    static ref PRATT_PARSER: PrattParser<Rule> = PrattParser::new()
        // (lowest precedence)
        .op(Op::infix(Rule::or, Assoc::Left))            // `or`, `||`
        .op(Op::infix(Rule::and, Assoc::Left))           // `and`, `&&`
        .op(
            Op::infix(Rule::eq, Assoc::Left) |
            Op::infix(Rule::neq, Assoc::Left)
        )                                               // `==`, `!=`
        .op(
            Op::infix(Rule::lt, Assoc::Left) |
            Op::infix(Rule::le, Assoc::Left) |
            Op::infix(Rule::gt, Assoc::Left) |
            Op::infix(Rule::ge, Assoc::Left)
        )                                               // `<`, `<=`, `>`, `>=`
        .op(
            Op::infix(Rule::add, Assoc::Left) |
            Op::infix(Rule::sub, Assoc::Left)
        )                                               // `+`, `-`
        .op(
            Op::infix(Rule::mul, Assoc::Left) |
            Op::infix(Rule::div, Assoc::Left) |
            Op::infix(Rule::modulo, Assoc::Left)
        )                                               // `*`, `/`, `%`
        .op(Op::prefix(Rule::neg) | Op::prefix(Rule::not)) // `-`, `not`, `!`
        // (highest precedence)
        ;
}

#[derive(Parser)]
#[grammar = "parser/sofl.pest"]
pub struct ProgramParser;

/// Parse a whole program.
pub fn parse(source: &str) -> Result<Program, ParseError> {
    let mut pairs = ProgramParser::parse(Rule::program, source)
        .map_err(|e| ParseError::from_pest(e, source))?;
    let program = pairs
        .next()
        .ok_or_else(|| ParseError::new(ParseErrorKind::Empty, source, Span::new(0, 0)))?;

    let mut functions = Vec::new();
    for pair in program.into_inner() {
        if pair.as_rule() == Rule::function {
            functions.push(parse_function(pair, source)?);
        }
    }
    Ok(Program { functions })
}

fn parse_function(pair: Pair<Rule>, source: &str) -> Result<Function, ParseError> {
    let loc = Loc::from(pair.as_span());
    let mut name = String::new();
    let mut params = Vec::new();
    let mut body = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::params => {
                params = inner
                    .into_inner()
                    .map(|p| Param {
                        name: p.as_str().to_string(),
                        loc: Loc::from(p.as_span()),
                    })
                    .collect();
            }
            Rule::block => body = Some(parse_block(inner, source)?),
            _ => {}
        }
    }

    let body = body.ok_or_else(|| missing("function body", &loc, source))?;
    Ok(Function {
        name,
        params,
        body,
        loc,
    })
}

fn parse_block(pair: Pair<Rule>, source: &str) -> Result<Block, ParseError> {
    let mut stmts = Vec::new();
    let mut end = Loc::from(pair.as_span());
    for inner in pair.into_inner() {
        if inner.as_rule() == Rule::block_end {
            end = Loc::from(inner.as_span());
        } else {
            stmts.push(parse_stmt(inner, source)?);
        }
    }
    Ok(Block { stmts, end })
}

/// Pairs of a statement with the keyword tokens filtered out.
fn significant(pairs: Pairs<Rule>) -> impl Iterator<Item = Pair<Rule>> {
    pairs.filter(|p| {
        !matches!(
            p.as_rule(),
            Rule::kw_let
                | Rule::kw_if
                | Rule::kw_else
                | Rule::kw_while
                | Rule::kw_return
                | Rule::kw_print
                | Rule::kw_error
                | Rule::kw_exit
        )
    })
}

fn parse_stmt(pair: Pair<Rule>, source: &str) -> Result<Stmt, ParseError> {
    let loc = Loc::from(pair.as_span());
    let rule = pair.as_rule();
    let mut inner = significant(pair.into_inner());

    let kind = match rule {
        Rule::let_stmt | Rule::assign_stmt => {
            let name = inner
                .next()
                .ok_or_else(|| missing("variable name", &loc, source))?
                .as_str()
                .to_string();
            let value = parse_expr(
                inner.next().ok_or_else(|| missing("expression", &loc, source))?,
                source,
            )?;
            if rule == Rule::let_stmt {
                StmtKind::Let { name, value }
            } else {
                StmtKind::Assign { name, value }
            }
        }
        Rule::index_assign_stmt => {
            let name = inner
                .next()
                .ok_or_else(|| missing("variable name", &loc, source))?
                .as_str()
                .to_string();
            let index = parse_expr(
                inner.next().ok_or_else(|| missing("index", &loc, source))?,
                source,
            )?;
            let value = parse_expr(
                inner.next().ok_or_else(|| missing("expression", &loc, source))?,
                source,
            )?;
            StmtKind::AssignIndex { name, index, value }
        }
        Rule::if_stmt => {
            let cond = parse_expr(
                inner.next().ok_or_else(|| missing("condition", &loc, source))?,
                source,
            )?;
            let then_block = parse_block(
                inner.next().ok_or_else(|| missing("block", &loc, source))?,
                source,
            )?;
            let else_block = match inner.next() {
                Some(else_clause) => Some(parse_else(else_clause, source)?),
                None => None,
            };
            StmtKind::If {
                cond,
                then_block,
                else_block,
            }
        }
        Rule::while_stmt => {
            let cond = parse_expr(
                inner.next().ok_or_else(|| missing("condition", &loc, source))?,
                source,
            )?;
            let body = parse_block(
                inner.next().ok_or_else(|| missing("block", &loc, source))?,
                source,
            )?;
            StmtKind::While { cond, body }
        }
        Rule::return_stmt => StmtKind::Return(parse_optional_expr(inner.next(), source)?),
        Rule::error_stmt => StmtKind::Error(parse_optional_expr(inner.next(), source)?),
        Rule::print_stmt => StmtKind::Print(parse_expr(
            inner.next().ok_or_else(|| missing("expression", &loc, source))?,
            source,
        )?),
        Rule::exit_stmt => StmtKind::Exit,
        Rule::expr_stmt => StmtKind::Expr(parse_expr(
            inner.next().ok_or_else(|| missing("expression", &loc, source))?,
            source,
        )?),
        other => {
            return Err(ParseError::new(
                ParseErrorKind::Other {
                    message: format!("unhandled statement rule: {:?}", other),
                },
                source,
                loc.span,
            ));
        }
    };

    Ok(Stmt { kind, loc })
}

/// `else { ... }` becomes a block; `else if ...` becomes a block holding the
/// nested `if` statement, closed where the nested statement ends.
fn parse_else(pair: Pair<Rule>, source: &str) -> Result<Block, ParseError> {
    let loc = Loc::from(pair.as_span());
    let body = significant(pair.into_inner())
        .next()
        .ok_or_else(|| missing("else body", &loc, source))?;
    match body.as_rule() {
        Rule::block => parse_block(body, source),
        _ => {
            let nested = parse_stmt(body, source)?;
            let end = match &nested.kind {
                StmtKind::If {
                    then_block,
                    else_block,
                    ..
                } => else_block.as_ref().unwrap_or(then_block).end.clone(),
                _ => nested.loc.clone(),
            };
            Ok(Block {
                stmts: vec![nested],
                end,
            })
        }
    }
}

fn parse_optional_expr(pair: Option<Pair<Rule>>, source: &str) -> Result<Option<Expr>, ParseError> {
    pair.map(|p| parse_expr(p, source)).transpose()
}

pub fn parse_expr(pair: Pair<Rule>, source: &str) -> Result<Expr, ParseError> {
    let loc = Loc::from(pair.as_span());
    match pair.as_rule() {
        Rule::expression => PRATT_PARSER
            .map_primary(|primary| parse_expr(primary, source))
            .map_prefix(|op, rhs| {
                let rhs = rhs?;
                let op_loc = Loc::from(op.as_span());
                let op = match op.as_rule() {
                    Rule::neg => UnaryOp::Neg,
                    Rule::not => UnaryOp::Not,
                    _ => unreachable!("Unknown prefix operator: {:?}", op.as_rule()),
                };
                let loc = Loc::new(Span::combine(&op_loc.span, &rhs.loc.span), op_loc.pos);
                Ok(Expr {
                    kind: ExprKind::Unary {
                        op,
                        expr: Box::new(rhs),
                    },
                    loc,
                })
            })
            .map_infix(|lhs, op, rhs| {
                let (lhs, rhs) = (lhs?, rhs?);
                let loc = Loc::new(Span::combine(&lhs.loc.span, &rhs.loc.span), lhs.loc.pos);
                let (left, right) = (Box::new(lhs), Box::new(rhs));
                let kind = match op.as_rule() {
                    Rule::add => binary(BinaryOp::Add, left, right),
                    Rule::sub => binary(BinaryOp::Sub, left, right),
                    Rule::mul => binary(BinaryOp::Mul, left, right),
                    Rule::div => binary(BinaryOp::Div, left, right),
                    Rule::modulo => binary(BinaryOp::Mod, left, right),
                    Rule::eq => comparison(ComparisonOp::Eq, left, right),
                    Rule::neq => comparison(ComparisonOp::Neq, left, right),
                    Rule::lt => comparison(ComparisonOp::Lt, left, right),
                    Rule::le => comparison(ComparisonOp::Le, left, right),
                    Rule::gt => comparison(ComparisonOp::Gt, left, right),
                    Rule::ge => comparison(ComparisonOp::Ge, left, right),
                    Rule::and => ExprKind::Boolean {
                        op: BoolOp::And,
                        left,
                        right,
                    },
                    Rule::or => ExprKind::Boolean {
                        op: BoolOp::Or,
                        left,
                        right,
                    },
                    _ => unreachable!("Unknown binary operator: {:?}", op.as_rule()),
                };
                Ok(Expr { kind, loc })
            })
            .parse(pair.into_inner()),

        Rule::grouped => match pair.into_inner().next() {
            Some(inner) => parse_expr(inner, source),
            None => Err(missing("expression", &loc, source)),
        },

        Rule::integer => {
            let text = pair.as_str().replace('_', "");
            let value = text.parse().map_err(|_| {
                ParseError::new(
                    ParseErrorKind::InvalidNumber {
                        text: pair.as_str().to_string(),
                    },
                    source,
                    loc.span.clone(),
                )
            })?;
            Ok(Expr {
                kind: ExprKind::Literal(Literal::Int(value)),
                loc,
            })
        }

        Rule::boolean => Ok(Expr {
            kind: ExprKind::Literal(Literal::Bool(pair.as_str() == "true")),
            loc,
        }),

        Rule::string => {
            let s = pair.as_str();
            let value = unescape(&s[1..s.len() - 1]).map_err(|message| {
                ParseError::new(ParseErrorKind::Other { message }, source, loc.span.clone())
            })?;
            Ok(Expr {
                kind: ExprKind::Literal(Literal::Str(value)),
                loc,
            })
        }

        Rule::ident => Ok(Expr {
            kind: ExprKind::Ident(pair.as_str().to_string()),
            loc,
        }),

        Rule::call => {
            let mut inner = pair.into_inner();
            let name = inner
                .next()
                .ok_or_else(|| missing("function name", &loc, source))?
                .as_str()
                .to_string();
            let args = inner
                .map(|arg| parse_expr(arg, source))
                .collect::<Result<_, _>>()?;
            Ok(Expr {
                kind: ExprKind::Call { name, args },
                loc,
            })
        }

        Rule::array => {
            let items = pair
                .into_inner()
                .map(|item| parse_expr(item, source))
                .collect::<Result<_, _>>()?;
            Ok(Expr {
                kind: ExprKind::Array(items),
                loc,
            })
        }

        Rule::array_repeat => {
            let mut inner = pair.into_inner();
            let fill = parse_expr(
                inner.next().ok_or_else(|| missing("array element", &loc, source))?,
                source,
            )?;
            let size = parse_expr(
                inner.next().ok_or_else(|| missing("array size", &loc, source))?,
                source,
            )?;
            Ok(Expr {
                kind: ExprKind::ArrayRepeat {
                    fill: Box::new(fill),
                    size: Box::new(size),
                },
                loc,
            })
        }

        Rule::index => {
            let mut inner = pair.into_inner();
            let name = inner
                .next()
                .ok_or_else(|| missing("array name", &loc, source))?
                .as_str()
                .to_string();
            let index = parse_expr(
                inner.next().ok_or_else(|| missing("index", &loc, source))?,
                source,
            )?;
            Ok(Expr {
                kind: ExprKind::Index {
                    name,
                    index: Box::new(index),
                },
                loc,
            })
        }

        other => Err(ParseError::new(
            ParseErrorKind::Other {
                message: format!("Unhandled rule: {:?}", other),
            },
            source,
            loc.span,
        )),
    }
}

fn binary(op: BinaryOp, left: Box<Expr>, right: Box<Expr>) -> ExprKind {
    ExprKind::Binary { op, left, right }
}

fn comparison(op: ComparisonOp, left: Box<Expr>, right: Box<Expr>) -> ExprKind {
    ExprKind::Comparison { op, left, right }
}

fn missing(what: &str, loc: &Loc, source: &str) -> ParseError {
    ParseError::new(
        ParseErrorKind::Other {
            message: format!("missing {}", what),
        },
        source,
        loc.span.clone(),
    )
}

pub(crate) fn unescape(raw: &str) -> Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => return Err(format!("unknown escape sequence '\\{}'", other)),
            None => return Err("dangling '\\' at end of string".to_string()),
        }
    }
    Ok(out)
}

use core::ops::Range;

use tracing::debug;

use crate::asm::{AsmError, AsmErrorKind};
use crate::parser::Pos;
use crate::parser::parser::unescape;
use crate::vm::{Code, FunctionInfo, Instruction, LocalVar, Value};

const COMMENT_CHAR: char = '#';
const POSITION_CHAR: char = ';';
const DIRECTIVE_PREFIX: char = '.';

/// Parse an assembly listing back into [`Code`].
///
/// Mnemonics, operand counts and operand kinds are checked per line, and the
/// whole result is validated: every jump and call target and the entry point
/// must lie inside the instruction sequence.
pub fn parse_asm(text: &str) -> Result<Code, AsmError> {
    let mut reader = Reader::default();
    for (index, line) in text.lines().enumerate() {
        reader.line(index + 1, line)?;
    }
    reader.finish()
}

#[derive(Default)]
struct Reader {
    code: Code,
    /// Line of each instruction, indexed by offset.
    instruction_lines: Vec<usize>,
    /// Line of the `.entry` directive.
    entry_line: Option<usize>,
    /// Line of each `.function` directive, parallel to `code.functions`.
    function_lines: Vec<usize>,
}

/// A whitespace-separated token. String literals keep their quotes.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Token<'a> {
    text: &'a str,
}

impl Reader {
    fn line(&mut self, line_no: usize, line: &str) -> Result<(), AsmError> {
        let err = |kind| AsmError::new(line_no, kind);

        let (body, position) = split_line(line).map_err(err)?;
        let tokens = tokenize(body).map_err(err)?;
        let position = position.map(parse_position).transpose().map_err(err)?;

        let Some((head, operands)) = tokens.split_first() else {
            return match position {
                Some(_) => Err(err(AsmErrorKind::DanglingPosition)),
                None => Ok(()),
            };
        };

        if head.text.starts_with(DIRECTIVE_PREFIX) {
            if position.is_some() {
                return Err(err(AsmErrorKind::DanglingPosition));
            }
            return self.directive(line_no, head.text, operands).map_err(err);
        }

        let instruction = parse_instruction(head.text, operands).map_err(err)?;
        self.code.instructions.push(instruction);
        self.code.source_map.push(position);
        self.instruction_lines.push(line_no);
        Ok(())
    }

    fn directive(&mut self, line_no: usize, name: &str, operands: &[Token]) -> Result<(), AsmErrorKind> {
        match name {
            ".entry" => {
                expect_operands(name, operands, 1)?;
                if self.entry_line.is_some() {
                    return Err(AsmErrorKind::DuplicateEntry);
                }
                self.code.entry = parse_number(operands[0].text, "offset")?;
                self.entry_line = Some(line_no);
            }
            ".function" => {
                expect_operands(name, operands, 5)?;
                let mut function = FunctionInfo {
                    name: parse_name(operands[0].text)?,
                    entry: 0,
                    end: 0,
                    arity: 0,
                    slots: 0,
                    locals: Vec::new(),
                };
                let mut seen = [false; 4];
                for token in &operands[1..] {
                    let (key, value) = token.text.split_once('=').ok_or_else(|| {
                        AsmErrorKind::InvalidOperand {
                            token: token.text.to_string(),
                            expected: "key=value pair",
                        }
                    })?;
                    let index = match key {
                        "entry" => {
                            function.entry = parse_number(value, "offset")?;
                            0
                        }
                        "end" => {
                            function.end = parse_number(value, "offset")?;
                            1
                        }
                        "arity" => {
                            function.arity = parse_number(value, "arity")?;
                            2
                        }
                        "slots" => {
                            function.slots = parse_number(value, "slot count")?;
                            3
                        }
                        _ => {
                            return Err(AsmErrorKind::InvalidOperand {
                                token: token.text.to_string(),
                                expected: "function attribute",
                            });
                        }
                    };
                    if core::mem::replace(&mut seen[index], true) {
                        return Err(AsmErrorKind::InvalidOperand {
                            token: token.text.to_string(),
                            expected: "function attribute (duplicate)",
                        });
                    }
                }
                self.code.functions.push(function);
                self.function_lines.push(line_no);
            }
            ".local" => {
                expect_operands(name, operands, 4)?;
                let function_name = operands[0].text;
                let local = LocalVar {
                    name: parse_name(operands[1].text)?,
                    slot: parse_number(operands[2].text, "slot")?,
                    live: parse_range(operands[3].text)?,
                };
                let function = self
                    .code
                    .functions
                    .iter_mut()
                    .rev()
                    .find(|f| f.name == function_name)
                    .ok_or_else(|| AsmErrorKind::UnknownFunction(function_name.to_string()))?;
                function.locals.push(local);
            }
            _ => return Err(AsmErrorKind::UnknownDirective(name.to_string())),
        }
        Ok(())
    }

    fn finish(self) -> Result<Code, AsmError> {
        let last_line = self.instruction_lines.last().copied().unwrap_or(1);
        let Some(entry_line) = self.entry_line else {
            return Err(AsmError::new(last_line, AsmErrorKind::MissingEntry));
        };

        if let Err(invalid) = self.code.validate() {
            // Point at the offending instruction when there is one.
            let line = if invalid.offset == self.code.entry && invalid.message.starts_with("entry") {
                entry_line
            } else if invalid.message.starts_with("function") || invalid.message.starts_with("local") {
                self.code
                    .functions
                    .iter()
                    .position(|f| f.entry == invalid.offset)
                    .and_then(|i| self.function_lines.get(i).copied())
                    .unwrap_or(last_line)
            } else {
                self.instruction_lines
                    .get(invalid.offset)
                    .copied()
                    .unwrap_or(last_line)
            };
            return Err(AsmError::new(line, AsmErrorKind::Invalid(invalid.to_string())));
        }

        debug!(
            instructions = self.code.len(),
            functions = self.code.functions.len(),
            "Read assembly"
        );
        Ok(self.code)
    }
}

/// Split a line into its instruction part and its source position part,
/// dropping any comment. `#` and `;` inside string literals are kept.
fn split_line(line: &str) -> Result<(&str, Option<&str>), AsmErrorKind> {
    let mut in_str = false;
    let mut escaped = false;
    let mut body_end = None;
    let mut end = line.len();

    for (i, c) in line.char_indices() {
        if in_str {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_str = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' if body_end.is_none() => in_str = true,
            COMMENT_CHAR => {
                end = i;
                break;
            }
            POSITION_CHAR if body_end.is_none() => body_end = Some(i),
            _ => {}
        }
    }
    if in_str {
        return Err(AsmErrorKind::UnterminatedString);
    }

    Ok(match body_end {
        Some(split) => (&line[..split], Some(line[split + 1..end].trim())),
        None => (&line[..end], None),
    })
}

/// Split on whitespace, keeping string literals (with their quotes) whole.
fn tokenize(body: &str) -> Result<Vec<Token<'_>>, AsmErrorKind> {
    let mut out = Vec::with_capacity(4);
    let mut start: Option<usize> = None;
    let mut in_str = false;
    let mut escaped = false;

    for (i, c) in body.char_indices() {
        if in_str {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_str = false,
                _ => {}
            }
            continue;
        }
        match c {
            c if c.is_whitespace() => {
                if let Some(s) = start.take() {
                    out.push(Token { text: &body[s..i] });
                }
            }
            '"' => {
                start.get_or_insert(i);
                in_str = true;
            }
            _ => {
                start.get_or_insert(i);
            }
        }
    }

    if in_str {
        return Err(AsmErrorKind::UnterminatedString);
    }
    if let Some(s) = start {
        out.push(Token { text: &body[s..] });
    }
    Ok(out)
}

fn expect_operands(name: &str, operands: &[Token], expected: usize) -> Result<(), AsmErrorKind> {
    if operands.len() != expected {
        return Err(AsmErrorKind::OperandCount {
            name: name.to_string(),
            expected,
            found: operands.len(),
        });
    }
    Ok(())
}

fn parse_instruction(mnemonic: &str, operands: &[Token]) -> Result<Instruction, AsmErrorKind> {
    if let Some(instruction) = Instruction::nullary(mnemonic) {
        expect_operands(mnemonic, operands, 0)?;
        return Ok(instruction);
    }

    let instruction = match mnemonic {
        "PUSH" => {
            expect_operands(mnemonic, operands, 1)?;
            Instruction::Push(parse_value(operands[0].text)?)
        }
        "LOAD" | "STORE" | "LOADI" | "STOREI" | "ENTER" => {
            expect_operands(mnemonic, operands, 1)?;
            let n = parse_number(operands[0].text, "slot")?;
            match mnemonic {
                "LOAD" => Instruction::Load(n),
                "STORE" => Instruction::Store(n),
                "LOADI" => Instruction::LoadIndexed(n),
                "STOREI" => Instruction::StoreIndexed(n),
                _ => Instruction::Enter(n),
            }
        }
        "ARRAY" => {
            expect_operands(mnemonic, operands, 1)?;
            Instruction::Array(parse_number(operands[0].text, "element count")?)
        }
        "JUMP" | "JUMPF" => {
            expect_operands(mnemonic, operands, 1)?;
            let target = parse_number(operands[0].text, "offset")?;
            if mnemonic == "JUMP" {
                Instruction::Jump(target)
            } else {
                Instruction::JumpIfFalse(target)
            }
        }
        "CALL" => {
            expect_operands(mnemonic, operands, 2)?;
            Instruction::Call {
                target: parse_number(operands[0].text, "offset")?,
                argc: parse_number(operands[1].text, "argument count")?,
            }
        }
        _ => return Err(AsmErrorKind::UnknownMnemonic(mnemonic.to_string())),
    };
    Ok(instruction)
}

fn parse_number<T: core::str::FromStr>(token: &str, expected: &'static str) -> Result<T, AsmErrorKind> {
    token.parse().map_err(|_| AsmErrorKind::InvalidOperand {
        token: token.to_string(),
        expected,
    })
}

fn parse_name(token: &str) -> Result<String, AsmErrorKind> {
    let mut chars = token.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(AsmErrorKind::InvalidOperand {
            token: token.to_string(),
            expected: "name",
        });
    }
    Ok(token.to_string())
}

fn parse_value(token: &str) -> Result<Value, AsmErrorKind> {
    match token {
        "()" => Ok(Value::Unit),
        "true" => Ok(Value::Bool(true)),
        "false" => Ok(Value::Bool(false)),
        _ if token.starts_with('"') => {
            let inner = token
                .strip_prefix('"')
                .and_then(|t| t.strip_suffix('"'))
                .filter(|_| token.len() >= 2)
                .ok_or(AsmErrorKind::UnterminatedString)?;
            let s = unescape(inner).map_err(|_| AsmErrorKind::InvalidOperand {
                token: token.to_string(),
                expected: "string literal",
            })?;
            Ok(Value::str(s))
        }
        _ => parse_number(token, "value").map(Value::Int),
    }
}

fn parse_position(text: &str) -> Result<Pos, AsmErrorKind> {
    let invalid = || AsmErrorKind::InvalidOperand {
        token: text.to_string(),
        expected: "source position",
    };
    let (line, column) = text.split_once(':').ok_or_else(invalid)?;
    let line = line.trim().parse().map_err(|_| invalid())?;
    let column = column.trim().parse().map_err(|_| invalid())?;
    Ok(Pos::new(line, column))
}

fn parse_range(text: &str) -> Result<Range<usize>, AsmErrorKind> {
    let invalid = || AsmErrorKind::InvalidOperand {
        token: text.to_string(),
        expected: "offset range",
    };
    let (start, end) = text.split_once("..").ok_or_else(invalid)?;
    let start: usize = start.parse().map_err(|_| invalid())?;
    let end: usize = end.parse().map_err(|_| invalid())?;
    if start > end {
        return Err(invalid());
    }
    Ok(start..end)
}

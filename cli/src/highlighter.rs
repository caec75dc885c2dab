use logos::Logos;
use nu_ansi_term::{Color, Style};
use reedline::StyledText;

use crate::lexer::{Token, is_command};

const DEFAULT: Color = Color::White;
const COMMAND: Color = Color::Magenta;
const NUMBER: Color = Color::Cyan;
const NAME: Color = Color::Red;
const UNKNOWN: Color = Color::DarkGray;

/// Colors debugger command lines: the command word, line numbers and
/// variable names.
pub struct Highlighter;

impl reedline::Highlighter for Highlighter {
    fn highlight(&self, line: &str, _: usize) -> StyledText {
        let mut output = StyledText::new();
        let mut curr_end = 0;
        let mut first = true;

        for (token, span) in Token::lexer(line).spanned() {
            if span.start > curr_end {
                output.push((Style::new().fg(DEFAULT), line[curr_end..span.start].to_string()));
            }
            let text = &line[span.clone()];
            let fg = match token {
                Ok(Token::Word) | Ok(Token::Question) if first => {
                    if is_command(text) { COMMAND } else { UNKNOWN }
                }
                Ok(Token::Number) => NUMBER,
                Ok(Token::Word) => NAME,
                Ok(Token::Question) => DEFAULT,
                Err(_) => {
                    output.push((Style::new().fg(DEFAULT), line[span.start..].to_string()));
                    return output;
                }
            };
            output.push((Style::new().fg(fg), text.to_string()));
            curr_end = span.end;
            first = false;
        }

        if curr_end < line.len() {
            output.push((Style::new().fg(DEFAULT), line[curr_end..].to_string()));
        }
        output
    }
}

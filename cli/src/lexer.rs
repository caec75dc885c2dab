use logos::Logos;

/// Tokens of a debugger command line.
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\n\f]+")]
pub enum Token {
    #[regex(r"[0-9]+")]
    Number,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Word,

    #[token("?")]
    Question,
}

/// Whether `word` is the first word of a known debugger command.
pub fn is_command(word: &str) -> bool {
    sofl_core::debugger::COMMAND_NAMES.contains(&word)
}

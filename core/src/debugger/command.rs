use crate::debugger::DebugError;

/// A parsed debugger session command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Break(u32),
    Clear(u32),
    Continue,
    /// Step into: one instruction.
    Step,
    /// Step over: one source line.
    Next,
    Print(String),
    Locals,
    Backtrace,
    /// Source around a line, or around the current line.
    List(Option<u32>),
    Help,
    Quit,
}

/// Every command name and alias.
pub const COMMAND_NAMES: &[&str] = &[
    "break", "b", "clear", "continue", "c", "step", "s", "next", "n", "print", "p", "locals",
    "backtrace", "bt", "list", "l", "help", "h", "?", "quit", "q", "exit",
];

pub const HELP: &str = "\
commands:
  break <line>, b <line>   set a breakpoint
  clear <line>             remove a breakpoint
  continue, c              run to the next breakpoint
  step, s                  execute one instruction
  next, n                  run to the next line, stepping over calls
  print <name>, p <name>   show a variable
  locals                   show all variables in scope
  backtrace, bt            show the call stack
  list [line], l [line]    show source around a line
  help                     show this help
  quit, q                  leave the debugger
";

impl Command {
    /// Parse one input line. Blank lines parse to `None`.
    pub fn parse(input: &str) -> Result<Option<Command>, DebugError> {
        let mut words = input.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(None);
        };
        let argument = words.next();
        if words.next().is_some() {
            return Err(DebugError::Usage("one argument at most"));
        }

        let command = match (name, argument) {
            ("break" | "b", Some(arg)) => Command::Break(line_number(arg, "break <line>")?),
            ("break" | "b", None) => return Err(DebugError::Usage("break <line>")),
            ("clear", Some(arg)) => Command::Clear(line_number(arg, "clear <line>")?),
            ("clear", None) => return Err(DebugError::Usage("clear <line>")),
            ("print" | "p", Some(arg)) => Command::Print(arg.to_string()),
            ("print" | "p", None) => return Err(DebugError::Usage("print <name>")),
            ("list" | "l", arg) => Command::List(
                arg.map(|a| line_number(a, "list [line]")).transpose()?,
            ),
            (_, Some(_)) if is_known(name) => {
                return Err(DebugError::Usage("this command takes no argument"));
            }
            ("continue" | "c", None) => Command::Continue,
            ("step" | "s", None) => Command::Step,
            ("next" | "n", None) => Command::Next,
            ("locals", None) => Command::Locals,
            ("backtrace" | "bt", None) => Command::Backtrace,
            ("help" | "h" | "?", None) => Command::Help,
            ("quit" | "q" | "exit", None) => Command::Quit,
            _ => return Err(DebugError::UnknownCommand(name.to_string())),
        };
        Ok(Some(command))
    }
}

fn is_known(name: &str) -> bool {
    matches!(
        name,
        "continue" | "c" | "step" | "s" | "next" | "n" | "locals" | "backtrace" | "bt" | "help"
            | "h" | "?" | "quit" | "q" | "exit"
    )
}

fn line_number(arg: &str, usage: &'static str) -> Result<u32, DebugError> {
    match arg.parse() {
        Ok(line) if line > 0 => Ok(line),
        _ => Err(DebugError::Usage(usage)),
    }
}

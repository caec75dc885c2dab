use std::io::{self, BufRead, Write};

use crate::debugger::{Command, DebugError, Debugger, HELP, StopReason};

/// Whether the session wants more input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Text command surface over a [`Debugger`].
///
/// Reports go to `out`; the program's own output goes to the debugger's
/// sink. Usage errors are written as `error: ...` and the session goes on.
/// The report is written again after every command.
pub struct Session<'a, P, W> {
    debugger: Debugger<'a, P>,
    out: W,
}

impl<'a, P: Write, W: Write> Session<'a, P, W> {
    pub fn new(debugger: Debugger<'a, P>, out: W) -> Self {
        Session { debugger, out }
    }

    pub fn debugger(&self) -> &Debugger<'a, P> {
        &self.debugger
    }

    pub fn into_parts(self) -> (Debugger<'a, P>, W) {
        (self.debugger, self.out)
    }

    /// Write the initial position of the program.
    pub fn start(&mut self) -> io::Result<()> {
        write!(self.out, "{}", self.debugger.report())
    }

    /// Read commands line by line until `quit` or end of input.
    pub fn run<R: BufRead>(&mut self, input: R) -> io::Result<()> {
        self.start()?;
        for line in input.lines() {
            if self.execute(&line?)? == Flow::Quit {
                break;
            }
        }
        Ok(())
    }

    /// Execute one command line. Every command, rejected or not, is
    /// followed by the current report.
    pub fn execute(&mut self, input: &str) -> io::Result<Flow> {
        match Command::parse(input) {
            Ok(None) => return Ok(Flow::Continue),
            Ok(Some(Command::Quit)) => return Ok(Flow::Quit),
            Ok(Some(command)) => {
                if let Err(e) = self.dispatch(command)? {
                    writeln!(self.out, "error: {}", e)?;
                }
            }
            Err(e) => writeln!(self.out, "error: {}", e)?,
        }
        write!(self.out, "{}", self.debugger.report())?;
        Ok(Flow::Continue)
    }

    /// Outer error: writing the report failed. Inner error: the command was
    /// rejected.
    fn dispatch(&mut self, command: Command) -> io::Result<Result<(), DebugError>> {
        let debugger = &mut self.debugger;
        let out = &mut self.out;
        match command {
            Command::Break(line) => match debugger.set_breakpoint(line) {
                Ok(true) => writeln!(out, "breakpoint set at line {}", line)?,
                Ok(false) => writeln!(out, "breakpoint already set at line {}", line)?,
                Err(e) => return Ok(Err(e)),
            },
            Command::Clear(line) => {
                if debugger.clear_breakpoint(line) {
                    writeln!(out, "breakpoint cleared at line {}", line)?;
                } else {
                    writeln!(out, "error: no breakpoint at line {}", line)?;
                }
            }
            Command::Continue | Command::Step | Command::Next => {
                let reason = match &command {
                    Command::Continue => debugger.continue_execution(),
                    Command::Step => debugger.step_into(),
                    _ => debugger.step_over(),
                };
                let reason = match reason {
                    Ok(reason) => reason,
                    Err(e) => return Ok(Err(e)),
                };
                if let StopReason::Breakpoint { line } = reason {
                    writeln!(out, "breakpoint at line {}", line)?;
                }
            }
            Command::Print(name) => match debugger.inspect(&name) {
                Ok(value) => writeln!(out, "{} = {}", name, value.literal())?,
                Err(e) => return Ok(Err(e)),
            },
            Command::Locals => {
                let variables = match debugger.variables() {
                    Ok(variables) => variables,
                    Err(e) => return Ok(Err(e)),
                };
                if variables.is_empty() {
                    writeln!(out, "no variables in scope")?;
                }
                for (name, value) in variables {
                    writeln!(out, "{} = {}", name, value.literal())?;
                }
            }
            Command::Backtrace => {
                let entries = match debugger.backtrace() {
                    Ok(entries) => entries,
                    Err(e) => return Ok(Err(e)),
                };
                for (depth, entry) in entries.iter().enumerate() {
                    match entry.line {
                        Some(line) => writeln!(
                            out,
                            "#{} {} at line {} (offset {})",
                            depth, entry.function, line, entry.offset
                        )?,
                        None => writeln!(out, "#{} {} (offset {})", depth, entry.function, entry.offset)?,
                    }
                }
            }
            Command::List(line) => {
                let current = debugger.current_line();
                let Some(center) = line.or(current) else {
                    return Ok(Err(DebugError::Terminated));
                };
                let breakpoints: Vec<u32> = debugger.breakpoints().collect();
                for (n, text) in debugger.source_context(center) {
                    let marker = if Some(n) == current { '>' } else { ' ' };
                    let mark = if breakpoints.contains(&n) { '*' } else { ' ' };
                    let row = format!("{}{} {:>4} | {}", marker, mark, n, text);
                    writeln!(out, "{}", row.trim_end())?;
                }
            }
            Command::Help => write!(out, "{}", HELP)?,
            Command::Quit => {}
        }
        Ok(Ok(()))
    }
}

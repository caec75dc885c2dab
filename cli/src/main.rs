mod highlighter;
mod lexer;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::Result;
use reedline::{
    DefaultCompleter, DefaultPrompt, DefaultPromptSegment, DescriptionMode, EditCommand, Emacs,
    FileBackedHistory, IdeMenu, KeyCode, KeyModifiers, Keybindings, MenuBuilder, Reedline,
    ReedlineEvent, ReedlineMenu, Signal, default_emacs_keybindings,
};
use sofl::{DebuggerOptions, Error, ExecutionOptions, SourceFile, render_error};
use sofl_core::asm::{parse_asm, to_asm};
use sofl_core::debugger::{COMMAND_NAMES, Debugger, Flow, Session};
use sofl_core::vm::Code;
use tracing::debug;

use crate::highlighter::Highlighter;

/// SOFL - compile, run and debug small imperative programs
#[derive(Parser, Debug)]
#[command(name = "sofl")]
#[command(about = "Compile, run and debug SOFL programs", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Compile and run a source file
    Run {
        file: PathBuf,
        #[command(flatten)]
        limits: Limits,
    },
    /// Parse and check a source file without running it
    Check { file: PathBuf },
    /// Compile a source file to its assembly listing
    Asm {
        file: PathBuf,
        /// Write the listing here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run an assembly listing
    Exec {
        file: PathBuf,
        #[command(flatten)]
        limits: Limits,
    },
    /// Debug a source file interactively
    Debug {
        file: PathBuf,
        #[command(flatten)]
        limits: Limits,
    },
}

#[derive(clap::Args, Debug)]
struct Limits {
    /// Maximum number of simultaneous call frames
    #[arg(long, default_value_t = 1000)]
    max_depth: usize,

    /// Stop with a fault after this many instructions
    #[arg(long)]
    max_steps: Option<u64>,
}

impl Limits {
    fn execution(&self) -> ExecutionOptions {
        ExecutionOptions {
            max_depth: self.max_depth,
            max_steps: self.max_steps,
        }
    }

    fn debugger(&self) -> DebuggerOptions {
        DebuggerOptions {
            execution: self.execution(),
            ..Default::default()
        }
    }
}

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
enum CliError {
    #[error("cannot read {path}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot write {path}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("{0}")]
    Failed(String),
}

fn read_file(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.display().to_string(),
        source,
    })
}

fn stdio_error(source: io::Error) -> CliError {
    CliError::Write {
        path: "<stdio>".to_string(),
        source,
    }
}

/// Render `error` against `text` and turn it into the process failure.
fn report(error: Error, path: &Path, text: &str, code: Option<&Code>) -> CliError {
    let name = path.display().to_string();
    render_error(&error, SourceFile::new(&name, text), code);
    CliError::Failed(format!("{} failed", name))
}

fn compile_file(path: &Path) -> Result<(String, Code), CliError> {
    let text = read_file(path)?;
    debug!(path = %path.display(), "Compiling");
    match sofl::compile(&text) {
        Ok(code) => Ok((text, code)),
        Err(e) => Err(report(e, path, &text, None)),
    }
}

fn execute(path: &Path, text: &str, code: &Code, options: ExecutionOptions) -> Result<(), CliError> {
    let stdout = io::stdout();
    match sofl::run(code, options, stdout.lock()) {
        Ok(_) => Ok(()),
        Err(e) => Err(report(e, path, text, Some(code))),
    }
}

fn add_menu_keybindings(keybindings: &mut Keybindings) {
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Tab,
        ReedlineEvent::UntilFound(vec![
            ReedlineEvent::Menu("completion_menu".to_string()),
            ReedlineEvent::MenuNext,
        ]),
    );
    keybindings.add_binding(
        KeyModifiers::ALT,
        KeyCode::Enter,
        ReedlineEvent::Edit(vec![EditCommand::InsertNewline]),
    );
}

fn setup_reedline() -> (Reedline, DefaultPrompt) {
    let commands: Vec<String> = COMMAND_NAMES.iter().map(|name| name.to_string()).collect();

    let completer = Box::new({
        let mut completions = DefaultCompleter::with_inclusions(&['-', '_']);
        completions.insert(commands);
        completions
    });

    let ide_menu = IdeMenu::default()
        .with_name("completion_menu")
        .with_min_completion_width(0)
        .with_max_completion_width(50)
        .with_max_completion_height(u16::MAX)
        .with_padding(0)
        .with_cursor_offset(0)
        .with_description_mode(DescriptionMode::PreferRight)
        .with_min_description_width(0)
        .with_max_description_width(50)
        .with_description_offset(1)
        .with_correct_cursor_pos(false);

    let completion_menu = Box::new(ide_menu);

    let mut keybindings = default_emacs_keybindings();
    add_menu_keybindings(&mut keybindings);

    let edit_mode = Box::new(Emacs::new(keybindings));

    let mut line_editor = Reedline::create()
        .with_highlighter(Box::new(Highlighter))
        .with_completer(completer)
        .with_menu(ReedlineMenu::EngineCompleter(completion_menu))
        .with_edit_mode(edit_mode);

    if let Some(path) = dirs::home_dir().map(|home| home.join(".sofl_history")) {
        if let Ok(history) = FileBackedHistory::with_file(1000, path) {
            line_editor = line_editor.with_history(Box::new(history));
        }
    }

    let prompt = DefaultPrompt::new(
        DefaultPromptSegment::Basic("sofl".to_string()),
        DefaultPromptSegment::Empty,
    );

    (line_editor, prompt)
}

fn debug(path: &Path, limits: &Limits) -> Result<(), CliError> {
    let (text, code) = compile_file(path)?;
    let debugger = Debugger::new(&code, &text, limits.debugger(), io::stdout());
    let mut session = Session::new(debugger, io::stderr());

    if !atty::is(atty::Stream::Stdin) {
        let stdin = io::stdin();
        return session.run(stdin.lock()).map_err(stdio_error);
    }

    let (mut line_editor, prompt) = setup_reedline();
    eprintln!("SOFL debugger - type 'help' for commands (Ctrl+D or Ctrl+C to exit)");
    session.start().map_err(stdio_error)?;

    loop {
        let sig = match line_editor.read_line(&prompt) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Reedline error: {e}");
                return Ok(());
            }
        };

        match sig {
            Signal::Success(buffer) => {
                let flow = session.execute(&buffer).map_err(stdio_error)?;
                io::stdout().flush().map_err(stdio_error)?;
                if flow == Flow::Quit {
                    return Ok(());
                }
            }
            Signal::CtrlD | Signal::CtrlC => {
                eprintln!("\nGoodbye!");
                return Ok(());
            }
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    use tracing_subscriber::{EnvFilter, fmt};

    // SOFL_LOG wins over RUST_LOG; default to WARN.
    let filter = EnvFilter::try_from_env("SOFL_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    match args.command {
        Cmd::Run { file, limits } => {
            let (text, code) = compile_file(&file)?;
            execute(&file, &text, &code, limits.execution())?;
        }
        Cmd::Check { file } => {
            let text = read_file(&file)?;
            if let Err(e) = sofl::check(&text) {
                return Err(report(e, &file, &text, None).into());
            }
            println!("{}: ok", file.display());
        }
        Cmd::Asm { file, output } => {
            let (_, code) = compile_file(&file)?;
            let listing = to_asm(&code);
            match output {
                Some(out) => std::fs::write(&out, listing).map_err(|source| CliError::Write {
                    path: out.display().to_string(),
                    source,
                })?,
                None => print!("{}", listing),
            }
        }
        Cmd::Exec { file, limits } => {
            let text = read_file(&file)?;
            let code = match parse_asm(&text) {
                Ok(code) => code,
                Err(e) => return Err(report(e.into(), &file, &text, None).into()),
            };
            // Listings carry no source text, so faults render without a snippet.
            execute(&file, "", &code, limits.execution())?;
        }
        Cmd::Debug { file, limits } => debug(&file, &limits)?,
    }

    Ok(())
}

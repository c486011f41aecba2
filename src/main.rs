use cmm::error::Diagnostics;
use cmm::session::{Event, Session};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use crossterm::style::Stylize;
use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

mod terminal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StopAfter {
    Lex,
    Parse,
    Run,
}

/// Lex, parse and run a CMM program.
#[derive(Parser, Debug)]
#[command(name = "cmm", version)]
struct Args {
    /// CMM source file
    source: PathBuf,

    /// Last pipeline stage to run
    #[arg(long, value_enum, default_value_t = StopAfter::Run)]
    stage: StopAfter,

    /// Print the tokens handed to the parser
    #[arg(long)]
    tokens: bool,

    /// Print every token, including whitespace, comments and errors
    #[arg(long)]
    display_tokens: bool,

    /// Print the syntax tree
    #[arg(long)]
    tree: bool,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every stage that ran was error free.
fn run(args: &Args) -> Result<bool> {
    let level = match args.verbose {
        0 => log::Level::Warn,
        1 => log::Level::Info,
        2 => log::Level::Debug,
        _ => log::Level::Trace,
    };
    simple_logger::init_with_level(level).context("failed to initialise logging")?;

    let source = fs::read_to_string(&args.source)
        .with_context(|| format!("failed to read {}", args.source.display()))?;
    log::info!("loaded {} ({} bytes)", args.source.display(), source.len());

    let lexed = cmm::lex(&source);
    if args.display_tokens {
        lexed.display_tokens.iter().for_each(|token| println!("{token}"));
    }
    if args.tokens {
        lexed.tokens.iter().for_each(|token| println!("{token}"));
    }
    report(&lexed.diagnostics);
    if args.stage == StopAfter::Lex {
        return Ok(lexed.diagnostics.is_empty());
    }

    let parsed = cmm::parse(&lexed.tokens);
    if args.tree {
        print!("{}", parsed.tree);
    }
    report(&parsed.diagnostics);
    let clean = lexed.diagnostics.is_empty() && parsed.diagnostics.is_empty();
    if args.stage == StopAfter::Parse || !clean {
        return Ok(clean);
    }

    let session = Session::spawn(parsed.tree)?;
    let mut stdout = io::stdout();
    while let Some(event) = session.next_event() {
        match event {
            Event::Output(line) => println!("{line}"),
            Event::InputRequested { target } => {
                print!("{} ", format!("{target} =").cyan());
                stdout.flush()?;
                let line = terminal::read_line()?.unwrap_or_default();
                session.answer(line);
            }
            Event::InputRejected(message) => {
                eprintln!("{} {message}", "input rejected:".yellow().bold());
            }
        }
    }
    let semantic = session.join()?;
    report(&semantic);
    Ok(semantic.is_empty())
}

fn report(diagnostics: &Diagnostics) {
    if diagnostics.is_empty() {
        return;
    }
    let header = format!("{} error(s) during {}", diagnostics.count(), diagnostics.stage());
    eprintln!("{}", header.red().bold());
    eprint!("{}", diagnostics.text());
}

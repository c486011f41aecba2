//! Front end and tree-walking interpreter for CMM, a small imperative
//! teaching language with four scalar types, one-dimensional arrays,
//! `if`/`while`/`for` and line-based `read`/`write`.
//!
//! The pipeline is `lex` → `parse` → `analyze_and_run`. Each stage always
//! completes and hands back its own error log; running is gated on the first
//! two logs being empty.

pub mod ast;
pub mod console;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod session;
pub mod symbol_table;
pub mod token;

use ast::{ParseOutput, Parser, SyntaxNode};
use console::Console;
use error::Diagnostics;
use interpreter::Interpreter;
use lexer::LexOutput;
use token::Token;

pub fn lex(source: &str) -> LexOutput {
    lexer::scan(source)
}

pub fn parse(tokens: &[Token]) -> ParseOutput {
    Parser::parse_program(tokens)
}

/// Checks and runs `tree`, sending `write` output to and taking `read` input
/// from `console`. Returns the semantic error log.
pub fn analyze_and_run<C: Console>(tree: &SyntaxNode, console: C) -> Diagnostics {
    Interpreter::new(console).evaluate_program(tree)
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Lexical or syntax errors kept the program from running.
    Rejected {
        lexical: Diagnostics,
        syntax: Diagnostics,
    },
    Completed {
        semantic: Diagnostics,
    },
}

/// Runs the whole pipeline synchronously on the calling thread.
pub fn run_source<C: Console>(source: &str, console: C) -> RunOutcome {
    let lexed = lex(source);
    let parsed = parse(&lexed.tokens);
    if !lexed.diagnostics.is_empty() || !parsed.diagnostics.is_empty() {
        log::debug!(
            "not running: {} lexical and {} syntax errors",
            lexed.diagnostics.count(),
            parsed.diagnostics.count()
        );
        return RunOutcome::Rejected {
            lexical: lexed.diagnostics,
            syntax: parsed.diagnostics,
        };
    }
    RunOutcome::Completed {
        semantic: analyze_and_run(&parsed.tree, console),
    }
}

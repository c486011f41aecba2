// Line input for `read` prompts.

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use std::io::{self, BufRead, IsTerminal, Write};
use std::time::Duration;

/// Reads one line from stdin. `None` means input has ended.
pub fn read_line() -> Result<Option<String>> {
    if io::stdin().is_terminal() {
        read_line_raw()
    } else {
        read_line_buffered()
    }
}

fn read_line_buffered() -> Result<Option<String>> {
    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

fn read_line_raw() -> Result<Option<String>> {
    terminal::enable_raw_mode().context("failed to enable raw mode")?;
    let result = edit_line();
    // Leave raw mode even when editing failed.
    terminal::disable_raw_mode().context("failed to disable raw mode")?;
    result
}

fn edit_line() -> Result<Option<String>> {
    let mut stdout = io::stdout();
    let mut line = String::new();
    loop {
        if !event::poll(Duration::from_millis(10))? {
            continue;
        }
        let Event::Key(key_event) = event::read()? else {
            continue;
        };
        if key_event.kind != KeyEventKind::Press {
            continue;
        }
        match key_event.code {
            KeyCode::Char('c' | 'd') if key_event.modifiers.contains(KeyModifiers::CONTROL) => {
                write!(stdout, "\r\n")?;
                stdout.flush()?;
                return Ok(None);
            }
            KeyCode::Char(c) => {
                line.push(c);
                write!(stdout, "{c}")?;
            }
            KeyCode::Backspace => {
                if line.pop().is_some() {
                    write!(stdout, "\u{8} \u{8}")?;
                }
            }
            KeyCode::Enter => {
                write!(stdout, "\r\n")?;
                stdout.flush()?;
                return Ok(Some(line));
            }
            _ => {}
        }
        stdout.flush()?;
    }
}

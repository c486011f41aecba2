use crate::analyze_and_run;
use crate::ast::SyntaxNode;
use crate::console::Console;
use crate::error::Diagnostics;

use anyhow::{Context, Result, anyhow};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

/// What a running program tells the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Output(String),
    /// The program is blocked in `read` until `Session::answer` is called.
    InputRequested { target: String },
    InputRejected(String),
}

/// Single-slot handoff for `read`. A second post before the slot is taken
/// replaces the first.
#[derive(Debug, Clone, Default)]
pub struct Mailbox {
    slot: Arc<(Mutex<Option<String>>, Condvar)>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&self, input: String) {
        let (lock, ready) = &*self.slot;
        let mut slot = lock.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(input);
        ready.notify_one();
    }

    /// Blocks until something is posted. There is no timeout.
    pub fn take(&self) -> String {
        let (lock, ready) = &*self.slot;
        let mut slot = lock.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(input) = slot.take() {
                return input;
            }
            slot = ready.wait(slot).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

struct ChannelConsole {
    events: Sender<Event>,
    mailbox: Mailbox,
}

impl ChannelConsole {
    fn send(&self, event: Event) -> bool {
        let delivered = self.events.send(event).is_ok();
        if !delivered {
            log::warn!("session boundary is gone, dropping event");
        }
        delivered
    }
}

impl Console for ChannelConsole {
    fn write_line(&mut self, line: String) {
        self.send(Event::Output(line));
    }

    fn read_line(&mut self, target: &str) -> String {
        let requested = self.send(Event::InputRequested {
            target: target.to_string(),
        });
        if !requested {
            return String::new();
        }
        self.mailbox.take()
    }

    fn reject_input(&mut self, message: String) {
        self.send(Event::InputRejected(message));
    }
}

/// A program running on its own thread.
pub struct Session {
    events: Receiver<Event>,
    mailbox: Mailbox,
    worker: JoinHandle<Diagnostics>,
}

impl Session {
    pub fn spawn(tree: SyntaxNode) -> Result<Self> {
        let (sender, events) = mpsc::channel();
        let mailbox = Mailbox::new();
        let console = ChannelConsole {
            events: sender,
            mailbox: mailbox.clone(),
        };
        let worker = thread::Builder::new()
            .name("cmm-interpreter".to_string())
            .spawn(move || analyze_and_run(&tree, console))
            .context("failed to start the interpreter thread")?;
        log::debug!("interpreter session started");
        Ok(Self {
            events,
            mailbox,
            worker,
        })
    }

    /// Next event, or `None` once the program has finished.
    pub fn next_event(&self) -> Option<Event> {
        self.events.recv().ok()
    }

    /// Supplies the line a pending `read` is waiting for.
    pub fn answer(&self, input: impl Into<String>) {
        self.mailbox.post(input.into());
    }

    pub fn join(self) -> Result<Diagnostics> {
        self.worker
            .join()
            .map_err(|_| anyhow!("the interpreter thread panicked"))
    }
}

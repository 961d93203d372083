//! Terminal input: one command per line, read on a helper thread

use crossbeam_channel::{unbounded, Receiver};
use std::io::{self, BufRead};
use std::thread;
use std::time::Instant;
use tapflow_core::Tap;
use tracing::{debug, warn};

/// What a line of input asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Register a beat
    Tap,
    /// Change the rolling window size
    WindowSize(u32),
    /// Change the reference tempo (0 clears it)
    ReferenceTempo(u32),
    /// Print the tempo history
    History,
    /// Print usage
    Help,
    /// Leave the program
    Quit,
    /// Unrecognized line
    Invalid(String),
}

/// A command together with the moment its line arrived
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    /// Parsed command
    pub command: Command,
    /// Milliseconds since the reader started
    pub at: Tap,
}

/// Usage text
pub const HELP: &str = "\
Commands:
  <Enter> or <Space><Enter>  tap
  w <2-16>                   set rolling average window
  r <0-300>                  set reference tempo (0 = none)
  h                          show tempo history
  q                          quit";

/// Parse one input line
pub fn parse_line(line: &str) -> Command {
    let trimmed = line.trim();
    let mut parts = trimmed.split_whitespace();
    let Some(word) = parts.next() else {
        return Command::Tap;
    };
    let argument = parts.next();
    if parts.next().is_some() {
        return Command::Invalid(trimmed.to_string());
    }

    match (word.to_ascii_lowercase().as_str(), argument) {
        ("t" | "tap", None) => Command::Tap,
        ("w" | "window", Some(n)) => match n.parse() {
            Ok(n) => Command::WindowSize(n),
            Err(_) => Command::Invalid(trimmed.to_string()),
        },
        ("r" | "ref" | "reference", Some(n)) => match n.parse() {
            Ok(n) => Command::ReferenceTempo(n),
            Err(_) => Command::Invalid(trimmed.to_string()),
        },
        ("h" | "history", None) => Command::History,
        ("?" | "help", None) => Command::Help,
        ("q" | "quit" | "exit", None) => Command::Quit,
        _ => Command::Invalid(trimmed.to_string()),
    }
}

/// Read stdin on a helper thread.
///
/// Each line is stamped on arrival so taps keep their timing even if the
/// event loop is busy. The channel closes at end of input.
pub fn spawn_reader() -> Receiver<Input> {
    let (sender, receiver) = unbounded();
    let started = Instant::now();

    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("Failed to read input: {}", e);
                    break;
                }
            };
            let at = Tap::try_from(started.elapsed().as_millis()).unwrap_or(Tap::MAX);
            let input = Input {
                command: parse_line(&line),
                at,
            };
            if sender.send(input).is_err() {
                break;
            }
        }
        debug!("Input reader finished");
    });

    receiver
}

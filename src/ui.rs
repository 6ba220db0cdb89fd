//! Console output and prompts
//!
//! This module handles:
//! - Serialized console output
//! - Colored terminal text
//! - The proceed/cancel question for dirty builds

use lazy_static::lazy_static;
use std::io::{BufRead, Write};
use std::sync::{Mutex, PoisonError};

lazy_static! {
    static ref CONSOLE: Mutex<()> = Mutex::new(());
}

/// Execute a function with exclusive access to console output
fn with_console<F>(f: F)
where
    F: FnOnce(),
{
    let _guard = CONSOLE.lock().unwrap_or_else(PoisonError::into_inner);
    f();
}

/// Print colored bold text to stderr, with fallback to plain text
fn eprint_color(s: &str, fg: term::color::Color) {
    if !really_print_color(s, fg) {
        eprint!("{}", s);
    }

    fn really_print_color(s: &str, fg: term::color::Color) -> bool {
        let Some(mut t) = term::stderr() else {
            return false;
        };
        if t.fg(fg).is_err() {
            return false;
        }
        let _ = t.attr(term::Attr::Bold);
        if write!(t, "{}", s).is_err() {
            return false;
        }
        let _ = t.reset();
        true
    }
}

/// Print a status message with "gitstamp: " prefix
pub fn status(s: &str) {
    with_console(|| println!("gitstamp: {}", s));
}

pub fn print_warning(msg: &str) {
    with_console(|| {
        eprint_color("warning", term::color::BRIGHT_YELLOW);
        eprintln!(": {}", msg);
    });
}

/// Print an error message with colored "error" prefix
pub fn print_error(msg: &str) {
    with_console(|| {
        eprintln!();
        eprint_color("error", term::color::BRIGHT_RED);
        eprintln!(": {}", msg);
        eprintln!();
    });
}

/// Ask whether to build with uncommitted changes. Anything but yes cancels.
pub fn confirm_dirty_build(pending_changes: usize) -> bool {
    print_warning(&format!("there are {} uncommitted change(s) in the working tree", pending_changes));
    let stdin = std::io::stdin();
    ask_yes_no("Build anyway? [y/N] ", &mut stdin.lock())
}

fn ask_yes_no(question: &str, input: &mut impl BufRead) -> bool {
    with_console(|| {
        eprint!("{}", question);
        let _ = std::io::stderr().flush();
    });

    let mut answer = String::new();
    match input.read_line(&mut answer) {
        Ok(_) => is_yes(&answer),
        Err(_) => false,
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

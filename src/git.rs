//! Git repository probing
//!
//! This module handles:
//! - Getting the short hash of the current commit
//! - Counting modified, new or untracked paths in the working tree
//!
//! Both probes fail open: if git cannot be run, the revision is `unknown`
//! and the working tree is treated as clean.

use crate::shell::CommandExec;
use log::{debug, warn};

/// Prints the short hash of HEAD
pub const REVISION_COMMAND: &str = "git rev-parse --short HEAD";

/// One line per changed or untracked path
pub const STATUS_COMMAND: &str = "git status --porcelain";

/// Shown in place of a revision that could not be read
pub const UNKNOWN_REVISION: &str = "unknown";

/// Outcome of a revision lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionResult {
    pub short_hash: String,
    pub found: bool,
}

impl RevisionResult {
    pub fn found(short_hash: impl Into<String>) -> Self {
        RevisionResult { short_hash: short_hash.into(), found: true }
    }

    pub fn unknown() -> Self {
        RevisionResult { short_hash: UNKNOWN_REVISION.to_string(), found: false }
    }

    /// The string to stamp: the hash, or `unknown`
    pub fn display(&self) -> &str {
        &self.short_hash
    }
}

/// Everything before the first `\n`, or the whole string if there is none.
/// A trailing `\r` is dropped so `cmd` output reads the same.
pub fn first_line(output: &str) -> &str {
    let line = match output.find('\n') {
        Some(i) => &output[..i],
        None => output,
    };
    line.strip_suffix('\r').unwrap_or(line)
}

/// Number of lines in `output`; a final line without a newline still counts
pub fn count_lines(output: &str) -> usize {
    if output.is_empty() {
        return 0;
    }
    let separators = output.matches('\n').count();
    if output.ends_with('\n') { separators } else { separators + 1 }
}

/// Asks git about the working tree through a command runner
pub struct RevisionProbe<'a> {
    runner: &'a dyn CommandExec,
}

impl<'a> RevisionProbe<'a> {
    pub fn new(runner: &'a dyn CommandExec) -> Self {
        RevisionProbe { runner }
    }

    /// Short hash of the checked-out commit
    pub fn current_short_revision(&self) -> RevisionResult {
        match self.runner.run(REVISION_COMMAND) {
            Ok(output) => {
                let hash = first_line(&output);
                if hash.is_empty() {
                    warn!("No git hash found (is this a git repository?)");
                    RevisionResult::unknown()
                } else {
                    debug!("git hash is '{}'", hash);
                    RevisionResult::found(hash)
                }
            }
            Err(e) => {
                warn!("No git hash found: {}", e);
                RevisionResult::unknown()
            }
        }
    }

    /// Count modified, new or untracked files in the working tree
    pub fn pending_change_count(&self) -> usize {
        match self.runner.run(STATUS_COMMAND) {
            Ok(output) => {
                let count = count_lines(&output);
                debug!("{} pending change(s) in working tree", count);
                count
            }
            Err(e) => {
                warn!("Could not query git status, assuming clean tree: {}", e);
                0
            }
        }
    }
}

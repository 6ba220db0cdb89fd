//! Pre-build gate
//!
//! Runs before a build: counts pending changes, asks for confirmation when the
//! working tree is dirty and the warning is enabled, then stamps the revision.
//!
//! State flow:
//! `Idle -> Probing -> {Clean, DirtyConfirmPending} -> {Proceeding, Aborted}`

use crate::git::{RevisionProbe, RevisionResult};
use crate::settings::{SettingsError, SettingsStore};
use crate::stamp::{self, DIRTY_SUFFIX};
use log::{debug, info};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Probing,
    Clean,
    DirtyConfirmPending,
    Proceeding,
    Aborted,
}

/// Why the build must not continue
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("build cancelled: {pending_changes} uncommitted change(s) in the working tree")]
    Cancelled { pending_changes: usize },

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("failed to write git hash to {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl GateError {
    /// The user chose not to build, as opposed to something breaking
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GateError::Cancelled { .. })
    }
}

/// What was written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamp {
    pub revision: RevisionResult,
    pub suffix: &'static str,
    pub path: PathBuf,
    pub pending_changes: usize,
}

impl Stamp {
    /// Exact file content
    pub fn content(&self) -> String {
        format!("{}{}", self.revision.display(), self.suffix)
    }
}

pub struct BuildGate<'a> {
    probe: RevisionProbe<'a>,
    settings: &'a SettingsStore,
    state: GateState,
}

impl<'a> BuildGate<'a> {
    pub fn new(probe: RevisionProbe<'a>, settings: &'a SettingsStore) -> Self {
        BuildGate { probe, settings, state: GateState::Idle }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// The pre-build hook.
    ///
    /// `confirm` is only called when the tree is dirty and the warning is on;
    /// it receives the number of pending changes and returns `true` to build anyway.
    pub fn run_prebuild<F>(&mut self, confirm: F) -> Result<Stamp, GateError>
    where
        F: FnOnce(usize) -> bool,
    {
        self.enter(GateState::Probing);
        let record = match self.settings.get_or_create() {
            Ok(record) => record,
            Err(e) => {
                self.enter(GateState::Aborted);
                return Err(e.into());
            }
        };
        let pending = self.probe.pending_change_count();

        if pending == 0 || !record.show_warning {
            self.enter(GateState::Clean);
        } else {
            self.enter(GateState::DirtyConfirmPending);
            if confirm(pending) {
                self.enter(GateState::Proceeding);
            } else {
                self.enter(GateState::Aborted);
                info!("Build cancelled with {} uncommitted change(s)", pending);
                return Err(GateError::Cancelled { pending_changes: pending });
            }
        }

        // Dirty is dirty, whether or not anyone was asked
        let suffix = if pending > 0 { DIRTY_SUFFIX } else { "" };
        let path = self.settings.resolve_output_path(&record);
        self.stamp(suffix, path, pending).inspect_err(|_| self.state = GateState::Aborted)
    }

    /// Stamp the current revision right now, outside of any build.
    ///
    /// No dirty check and no suffix. `output` overrides the configured path for
    /// this write only.
    pub fn save_now(&mut self, output: Option<&Path>) -> Result<Stamp, GateError> {
        let path = match output {
            Some(path) => path.to_path_buf(),
            None => {
                let record = self.settings.get_or_create()?;
                self.settings.resolve_output_path(&record)
            }
        };
        self.stamp("", path, 0)
    }

    fn stamp(&mut self, suffix: &'static str, path: PathBuf, pending_changes: usize) -> Result<Stamp, GateError> {
        let revision = self.probe.current_short_revision();
        stamp::write_stamp(revision.display(), suffix, &path)
            .map_err(|source| GateError::Write { path: path.clone(), source })?;
        Ok(Stamp { revision, suffix, path, pending_changes })
    }

    fn enter(&mut self, next: GateState) {
        debug!("gate: {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

#[cfg(test)]
#[path = "gate_test.rs"]
mod gate_test;

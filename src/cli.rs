use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "gitstamp")]
#[command(about = "Stamp the current git revision into a file before building")]
#[command(version)]
pub struct CliArgs {
    /// Project directory: git runs here and relative paths resolve against it
    #[arg(long, short = 'C', value_name = "DIR", default_value = ".", global = true)]
    pub project_dir: PathBuf,

    /// Seconds to wait for each git command
    #[arg(long, value_name = "SECS", default_value = "5", global = true,
          value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout: u64,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CliCommand {
    /// Pre-build hook: check for uncommitted changes, then stamp the hash
    ///
    /// Exit code 0 means the build may continue, 2 means it was cancelled
    /// because of uncommitted changes, 1 means the stamp could not be written.
    Prebuild {
        /// Build anyway if there are uncommitted changes, without asking
        #[arg(long, short = 'y', conflicts_with = "no")]
        yes: bool,

        /// Cancel if there are uncommitted changes, without asking
        #[arg(long, short = 'n')]
        no: bool,
    },

    /// Stamp the current hash now, without the uncommitted-changes check
    Save {
        /// Write here instead of the configured path (settings stay unchanged)
        #[arg(long, short = 'o', value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Show or change the settings
    Settings {
        /// Where the hash is written (relative to the project directory)
        #[arg(long, value_name = "PATH")]
        output_path: Option<String>,

        /// Ask before building with uncommitted changes
        #[arg(long, value_name = "BOOL", action = ArgAction::Set)]
        show_warning: Option<bool>,
    },

    /// Show the current revision, pending changes and stamp
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// How a dirty build question gets answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmMode {
    Ask,
    AlwaysProceed,
    AlwaysCancel,
}

impl ConfirmMode {
    pub fn from_flags(yes: bool, no: bool) -> Self {
        match (yes, no) {
            (true, _) => ConfirmMode::AlwaysProceed,
            (false, true) => ConfirmMode::AlwaysCancel,
            (false, false) => ConfirmMode::Ask,
        }
    }
}

impl CliArgs {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Validate argument combinations
    pub fn validate(&self) -> Result<(), String> {
        if !self.project_dir.is_dir() {
            return Err(format!("Project directory {} does not exist", self.project_dir.display()));
        }

        if let CliCommand::Settings { output_path: Some(path), .. } = &self.command {
            if path.trim().is_empty() {
                return Err("--output-path must not be empty".to_string());
            }
        }

        Ok(())
    }
}

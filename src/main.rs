mod cli;
mod gate;
mod git;
mod settings;
mod shell;
mod stamp;
mod status;
mod ui;

use clap::Parser;
use cli::{CliArgs, CliCommand, ConfirmMode};
use gate::{BuildGate, GateError};
use git::RevisionProbe;
use log::debug;
use settings::SettingsStore;
use shell::ShellRunner;
use status::StatusReport;

/// Exit code when the stamp or settings could not be written
const EXIT_FAILURE: i32 = 1;

/// Exit code when the user cancelled a build from a dirty tree
const EXIT_CANCELLED: i32 = 2;

fn main() {
    env_logger::init();

    let args = CliArgs::parse();

    if let Err(e) = args.validate() {
        ui::print_error(&e);
        std::process::exit(EXIT_FAILURE);
    }

    let runner = ShellRunner::new(&args.project_dir).with_timeout(args.command_timeout());
    debug!("Running git in {:?} with a {:?} timeout", runner.working_dir(), runner.timeout());
    let store = SettingsStore::for_project(&args.project_dir);
    let probe = RevisionProbe::new(&runner);

    let exit_code = match args.command {
        CliCommand::Prebuild { yes, no } => prebuild(BuildGate::new(probe, &store), ConfirmMode::from_flags(yes, no)),
        CliCommand::Save { output } => {
            let output = output.map(|p| args.project_dir.join(p));
            match BuildGate::new(probe, &store).save_now(output.as_deref()) {
                Ok(stamp) => {
                    ui::status(&format!("wrote '{}' to {}", stamp.content(), stamp.path.display()));
                    0
                }
                Err(e) => report_gate_error(&e),
            }
        }
        CliCommand::Settings { output_path, show_warning } => {
            let result = if output_path.is_none() && show_warning.is_none() {
                store.get_or_create()
            } else {
                store.update(output_path.as_deref(), show_warning)
            };
            match result {
                Ok(record) => {
                    println!("{}", store.path().display());
                    println!("  GitHashTextAssetPath = {}", record.hash_file_path);
                    println!("  ShowWarning          = {}", record.show_warning);
                    0
                }
                Err(e) => {
                    ui::print_error(&e.to_string());
                    EXIT_FAILURE
                }
            }
        }
        CliCommand::Status { json } => match StatusReport::collect(&probe, &store) {
            Ok(report) if json => match serde_json::to_string_pretty(&report) {
                Ok(text) => {
                    println!("{}", text);
                    0
                }
                Err(e) => {
                    ui::print_error(&format!("Failed to serialize status: {}", e));
                    EXIT_FAILURE
                }
            },
            Ok(report) => {
                println!("{}", report.to_text());
                0
            }
            Err(e) => {
                ui::print_error(&e.to_string());
                EXIT_FAILURE
            }
        },
    };

    std::process::exit(exit_code);
}

/// Run the pre-build gate and turn its outcome into an exit code
fn prebuild(mut gate: BuildGate<'_>, mode: ConfirmMode) -> i32 {
    let confirm = |pending: usize| match mode {
        ConfirmMode::Ask => ui::confirm_dirty_build(pending),
        ConfirmMode::AlwaysProceed => {
            ui::print_warning(&format!("building with {} uncommitted change(s)", pending));
            true
        }
        ConfirmMode::AlwaysCancel => false,
    };

    let outcome = gate.run_prebuild(confirm);
    debug!("Pre-build gate finished in state {:?}", gate.state());

    match outcome {
        Ok(stamp) => {
            if stamp.pending_changes > 0 {
                ui::status(&format!(
                    "wrote '{}' to {} ({} uncommitted change(s))",
                    stamp.content(),
                    stamp.path.display(),
                    stamp.pending_changes
                ));
            } else {
                ui::status(&format!("wrote '{}' to {}", stamp.content(), stamp.path.display()));
            }
            0
        }
        Err(e) => report_gate_error(&e),
    }
}

fn report_gate_error(e: &GateError) -> i32 {
    if e.is_cancelled() {
        // A decision, not a fault: no error banner
        ui::status(&e.to_string());
        EXIT_CANCELLED
    } else {
        ui::print_error(&e.to_string());
        EXIT_FAILURE
    }
}

//! Release installer library
//!
//! Resolves the latest release of a repository, downloads one named asset
//! and materializes it into the install directory. The [`Orchestrator`]
//! owns the install state machine; [`runners`] is the terminal front end
//! used by the binary.

mod cli;
pub mod core;
mod detection;
pub mod download;
mod error;
mod launcher;
mod orchestration;
pub mod runners;
mod state;
mod uninstall;
mod wizard;

pub use cli::{Cli, Cmd};
pub use detection::detect_state;
pub use error::InstallerError;
pub use launcher::{Launcher, ProcessLauncher};
pub use orchestration::{
    EVENT_CHANNEL_CAPACITY, EVENT_POLL_INTERVAL, InstallJob, JobObserver, JobOutcome,
    Orchestrator, Step, UninstallTicket,
};
pub use runners::RunStatus;
pub use state::{Command, InstallState, Workflow, decide_workflow};
pub use uninstall::{Confirmation, ScriptedConfirmation, UninstallOutcome, run_uninstall};

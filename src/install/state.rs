//! Install state machine vocabulary and the pure workflow decision function
//!
//! The decision is independent of how a command was obtained (menu keypress,
//! CLI subcommand, GUI button). Front ends translate their input into a
//! [`Command`] and ask [`decide_workflow`] what to run.

use std::fmt;

/// State of a single orchestrator run. Never persisted; derived from the
/// install directory at start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallState {
    NotInstalled,
    Installed,
    Installing,
    Reinstalling,
    Uninstalling,
    Launching,
    Failed,
    Cancelled,
}

impl InstallState {
    /// A workflow is in flight; every new command is rejected
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            Self::Installing | Self::Reinstalling | Self::Uninstalling | Self::Launching
        )
    }
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NotInstalled => "not installed",
            Self::Installed => "installed",
            Self::Installing => "installing",
            Self::Reinstalling => "reinstalling",
            Self::Uninstalling => "uninstalling",
            Self::Launching => "launching",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(text)
    }
}

/// User request issued by a front end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Install,
    Reinstall,
    Uninstall,
    Launch,
    Exit,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Install => "install",
            Self::Reinstall => "reinstall",
            Self::Uninstall => "uninstall",
            Self::Launch => "launch",
            Self::Exit => "exit",
        };
        f.write_str(text)
    }
}

/// Workflow selected for a (state, command) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workflow {
    FreshInstall,
    Reinstall,
    Uninstall,
    Launch,
    Exit,
    Reject,
}

impl Workflow {
    /// State entered while the workflow runs
    pub fn running_state(self) -> Option<InstallState> {
        match self {
            Self::FreshInstall => Some(InstallState::Installing),
            Self::Reinstall => Some(InstallState::Reinstalling),
            Self::Uninstall => Some(InstallState::Uninstalling),
            Self::Launch => Some(InstallState::Launching),
            Self::Exit | Self::Reject => None,
        }
    }
}

/// Decide which workflow a command triggers in the given state
pub fn decide_workflow(state: InstallState, command: Command) -> Workflow {
    use InstallState as S;

    if state.is_busy() {
        return Workflow::Reject;
    }

    match (state, command) {
        (_, Command::Exit) => Workflow::Exit,
        (S::NotInstalled | S::Failed | S::Cancelled, Command::Install) => Workflow::FreshInstall,
        (S::Installed | S::Failed | S::Cancelled, Command::Reinstall) => Workflow::Reinstall,
        (S::Installed, Command::Uninstall) => Workflow::Uninstall,
        (S::Installed, Command::Launch) => Workflow::Launch,
        _ => Workflow::Reject,
    }
}

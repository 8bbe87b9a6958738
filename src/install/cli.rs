//! CLI argument parsing for release-installer

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use super::state::Command;

/// Command-line arguments for release-installer
#[derive(Parser, Debug, Clone)]
#[command(name = "release-installer")]
#[command(version, about = "Install the latest release of an application from its release page")]
pub struct Cli {
    /// Path to installer_configs.json or a .toml config
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Install directory (overrides the config file)
    #[arg(long)]
    pub install_dir: Option<PathBuf>,

    /// Release registry base URL (overrides the config file)
    #[arg(long)]
    pub api_base: Option<String>,

    /// Answer the next confirmation with yes; repeat for uninstall (-yy)
    #[arg(long, short = 'y', action = ArgAction::Count)]
    pub yes: u8,

    /// Launch the application after a successful install
    #[arg(long)]
    pub launch: bool,

    /// Debug logging
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Action to run; interactive menu when omitted
    #[command(subcommand)]
    pub command: Option<Cmd>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmd {
    /// Download and install the latest release
    Install,
    /// Replace the current installation with the latest release
    Reinstall,
    /// Delete the install directory (asks twice)
    Uninstall,
    /// Start the installed application
    Launch,
    /// Show installation state without network access
    Status,
}

impl Cmd {
    /// Orchestrator command, `None` for read-only subcommands
    pub fn command(self) -> Option<Command> {
        match self {
            Self::Install => Some(Command::Install),
            Self::Reinstall => Some(Command::Reinstall),
            Self::Uninstall => Some(Command::Uninstall),
            Self::Launch => Some(Command::Launch),
            Self::Status => None,
        }
    }
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_yes_is_counted() {
        let cli = Cli::try_parse_from(["release-installer", "-yy", "uninstall"]).unwrap();
        assert_eq!(cli.yes, 2);
        assert_eq!(cli.command, Some(Cmd::Uninstall));

        let cli = Cli::try_parse_from(["release-installer", "--yes", "--yes", "uninstall"]).unwrap();
        assert_eq!(cli.yes, 2);
    }

    #[test]
    fn test_no_subcommand_means_menu() {
        let cli = Cli::try_parse_from(["release-installer", "--config", "x.json"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config, Some(PathBuf::from("x.json")));
    }

    #[test]
    fn test_status_has_no_orchestrator_command() {
        assert_eq!(Cmd::Status.command(), None);
        assert_eq!(Cmd::Reinstall.command(), Some(Command::Reinstall));
    }
}

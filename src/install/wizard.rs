//! Interactive prompts for release-installer

use std::io::{IsTerminal, Write};

use anyhow::Result;
use inquire::{Confirm, Select};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use super::state::Command;
use super::uninstall::Confirmation;
use crate::config::InstallerConfig;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Whether prompts can be shown
pub fn is_interactive() -> bool {
    std::io::stdin().is_terminal()
}

/// Confirmations answered by `--yes` first, then by prompting on a terminal.
/// Without a terminal, unanswered confirmations are declined.
pub struct PromptConfirmation {
    preset_yes: u8,
    interactive: bool,
}

impl PromptConfirmation {
    pub fn new(preset_yes: u8) -> Self {
        Self {
            preset_yes,
            interactive: is_interactive(),
        }
    }
}

impl Confirmation for PromptConfirmation {
    fn confirm(&mut self, prompt: &str) -> bool {
        if self.preset_yes > 0 {
            self.preset_yes -= 1;
            println!("{prompt} yes (--yes)");
            return true;
        }
        if !self.interactive {
            return false;
        }
        Confirm::new(prompt)
            .with_default(false)
            .prompt()
            .unwrap_or(false)
    }
}

/// Display welcome banner
pub fn show_welcome(config: &InstallerConfig) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);

    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)));
    let _ = writeln!(stdout, "\n{RULE}");
    let _ = stdout.reset();

    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true));
    let title = format!("{} INSTALLER", config.app_name().to_uppercase());
    let _ = writeln!(stdout, "\n{title:^60}");
    let _ = stdout.reset();

    if let Some(version) = &config.installer_version {
        let _ = writeln!(stdout, "{:^60}", format!("v{version}"));
    }

    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)));
    let _ = writeln!(stdout, "\n{RULE}\n");
    let _ = stdout.reset();

    let _ = writeln!(stdout, "  Application: {}", config.app_name());
    let _ = writeln!(stdout, "  Repository:  {}", config.application_repo);
    let _ = writeln!(stdout, "  Package:     {}", config.installation_file);
    let _ = writeln!(stdout, "  Location:    {}\n", config.install_dir().display());
}

/// Ask before a fresh install (defaults to yes)
pub fn confirm_install(config: &InstallerConfig, confirm: &mut PromptConfirmation) -> bool {
    if confirm.preset_yes > 0 {
        confirm.preset_yes -= 1;
        return true;
    }
    if !confirm.interactive {
        return true;
    }

    println!("Installation will:");
    println!("  • Download: {}", config.installation_file);
    println!("  • Extract to: {}\n", config.install_dir().display());

    Confirm::new("Proceed with installation?")
        .with_default(true)
        .prompt()
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy)]
enum MenuChoice {
    Reinstall,
    Uninstall,
    Launch,
    Exit,
}

impl std::fmt::Display for MenuChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Reinstall => "Reinstall (download the latest release again)",
            Self::Uninstall => "Uninstall (delete the install directory)",
            Self::Launch => "Launch the application",
            Self::Exit => "Exit",
        };
        f.write_str(label)
    }
}

/// Menu shown when the application is already installed
pub fn select_installed_action() -> Result<Command> {
    let choices = vec![
        MenuChoice::Launch,
        MenuChoice::Reinstall,
        MenuChoice::Uninstall,
        MenuChoice::Exit,
    ];
    let choice = Select::new("Application is already installed. What next?", choices)
        .prompt()
        .map_err(|e| anyhow::anyhow!("Prompt cancelled: {}", e))?;

    Ok(match choice {
        MenuChoice::Reinstall => Command::Reinstall,
        MenuChoice::Uninstall => Command::Uninstall,
        MenuChoice::Launch => Command::Launch,
        MenuChoice::Exit => Command::Exit,
    })
}

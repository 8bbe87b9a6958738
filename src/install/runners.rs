//! Terminal front end: turns CLI input into orchestrator commands and renders
//! the job's event stream

use std::io::Write;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use tokio_util::sync::CancellationToken;

use super::cli::{Cli, Cmd};
use super::core::{Phase, ProgressEvent};
use super::error::InstallerError;
use super::launcher::ProcessLauncher;
use super::orchestration::{InstallJob, JobObserver, JobOutcome, Orchestrator, Step};
use super::state::{Command, InstallState};
use super::uninstall::{Confirmation, UninstallOutcome};
use super::wizard::{self, PromptConfirmation};
use crate::config::InstallerConfig;

/// How a run ended, mapped to the process exit code by `main`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Failed,
    /// Cancelled by the user, declined, or not allowed in the current state
    Cancelled,
}

impl RunStatus {
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failed => 1,
            Self::Cancelled => 2,
        }
    }
}

fn print_colored(color: Color, bold: bool, text: &str) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(bold));
    let _ = writeln!(stdout, "{text}");
    let _ = stdout.reset();
}

fn print_error(text: &str) {
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    let _ = stderr.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
    let _ = writeln!(stderr, "{text}");
    let _ = stderr.reset();
}

/// Routes Ctrl-C to the job in flight.
///
/// A single listener serves the whole run. With a job registered, Ctrl-C
/// cancels it; otherwise the process exits with the cancelled status.
#[derive(Clone, Default)]
struct InterruptRelay {
    current: Arc<Mutex<Option<CancellationToken>>>,
}

impl InterruptRelay {
    fn install() -> Self {
        let relay = Self::default();
        let listener = relay.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if !listener.interrupt() {
                    eprintln!();
                    std::process::exit(RunStatus::Cancelled.exit_code().into());
                }
            }
        });
        relay
    }

    /// Cancel the registered job; `false` when none is running
    fn interrupt(&self) -> bool {
        match self.slot().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn register(&self, token: CancellationToken) {
        *self.slot() = Some(token);
    }

    fn clear(&self) {
        *self.slot() = None;
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Load the configuration with CLI overrides applied
pub fn load_config(cli: &Cli) -> Result<InstallerConfig> {
    let path = InstallerConfig::discover(cli.config.as_deref())?;
    let mut config = InstallerConfig::load(&path)?;

    if let Some(dir) = &cli.install_dir {
        let dir = if dir.is_absolute() {
            dir.clone()
        } else {
            std::env::current_dir()
                .context("Could not determine working directory")?
                .join(dir)
        };
        config = config.with_install_dir(dir);
    }
    if let Some(api_base) = &cli.api_base {
        config = config.with_api_base(api_base.clone());
    }
    config.validate()?;
    Ok(config)
}

/// Entry point behind the binary
pub async fn run(cli: &Cli) -> Result<RunStatus> {
    let config = load_config(cli)?;
    let launcher = ProcessLauncher::new(config.launch_command.clone(), config.app_name());
    let mut orchestrator = Orchestrator::new(&config, Box::new(launcher))
        .context("Failed to initialise installer")?;
    let mut confirm = PromptConfirmation::new(cli.yes);
    let launch_after = cli.launch || config.launch_after_install;
    let relay = InterruptRelay::install();

    wizard::show_welcome(&config);

    match cli.command {
        Some(Cmd::Status) => {
            print_status(&orchestrator);
            Ok(RunStatus::Success)
        }
        Some(cmd) => match cmd.command() {
            Some(command) => {
                execute(&mut orchestrator, &relay, command, &mut confirm, launch_after).await
            }
            None => Ok(RunStatus::Success),
        },
        None => run_menu(&mut orchestrator, &relay, &config, &mut confirm, launch_after).await,
    }
}

fn print_status(orchestrator: &Orchestrator) {
    let state = orchestrator.state();
    let color = if state == InstallState::Installed {
        Color::Green
    } else {
        Color::Yellow
    };
    print_colored(color, true, &format!("Status: {state}"));
    println!("  Repository: {}", orchestrator.repository());
    println!("  Directory:  {}", orchestrator.install_dir().display());
}

/// Interactive loop: install prompt when nothing is installed, action menu
/// otherwise
async fn run_menu(
    orchestrator: &mut Orchestrator,
    relay: &InterruptRelay,
    config: &InstallerConfig,
    confirm: &mut PromptConfirmation,
    launch_after: bool,
) -> Result<RunStatus> {
    // Outcome of the last reinstall/uninstall that returned to the menu
    let mut carried = RunStatus::Success;
    loop {
        let state = orchestrator.refresh();
        let command = match state {
            InstallState::Installed if wizard::is_interactive() => wizard::select_installed_action()?,
            InstallState::Installed => {
                print_status(orchestrator);
                Command::Exit
            }
            _ => {
                if wizard::confirm_install(config, confirm) {
                    Command::Install
                } else {
                    print_colored(Color::Yellow, false, "✗ Installation cancelled by user.");
                    return Ok(RunStatus::Cancelled);
                }
            }
        };

        let status = execute(orchestrator, relay, command, confirm, launch_after).await?;
        match command {
            // Back to the menu after a reinstall or a declined uninstall
            Command::Reinstall => carried = status,
            Command::Uninstall if orchestrator.state() == InstallState::Installed => {
                carried = status
            }
            _ => return Ok(menu_exit_status(carried, command, status)),
        }
    }
}

/// Leaving the menu via Exit reports what the last revisited action did
fn menu_exit_status(carried: RunStatus, command: Command, status: RunStatus) -> RunStatus {
    match command {
        Command::Exit => carried,
        _ => status,
    }
}

/// Run one command to completion
async fn execute(
    orchestrator: &mut Orchestrator,
    relay: &InterruptRelay,
    command: Command,
    confirm: &mut dyn Confirmation,
    launch_after: bool,
) -> Result<RunStatus> {
    let step = match orchestrator.begin(command) {
        Ok(step) => step,
        Err(e @ InstallerError::Rejected { .. }) => {
            print_error(&format!("✗ {e}"));
            return Ok(RunStatus::Cancelled);
        }
        Err(e) => return Err(e.into()),
    };

    match step {
        Step::Job(job) => {
            let outcome = drive_with_progress(orchestrator, relay, job).await?;
            match outcome {
                JobOutcome::Installed(release) => {
                    print_colored(
                        Color::Green,
                        true,
                        &format!("\n✓ INSTALLATION COMPLETED ({})", release.tag),
                    );
                    println!(
                        "  Application installed to: {}",
                        orchestrator.install_dir().display()
                    );
                    if launch_after {
                        return launch(orchestrator);
                    }
                    Ok(RunStatus::Success)
                }
                JobOutcome::Failed(e) => {
                    print_error(&format!("\n✗ {e}"));
                    Ok(RunStatus::Failed)
                }
                JobOutcome::Cancelled => {
                    print_colored(Color::Yellow, false, "\n✗ Installation cancelled by user.");
                    Ok(RunStatus::Cancelled)
                }
            }
        }
        Step::Uninstall(ticket) => match orchestrator.uninstall(ticket, confirm) {
            Ok(UninstallOutcome::Removed) => {
                print_colored(
                    Color::Green,
                    true,
                    &format!("✓ Removed {}", orchestrator.install_dir().display()),
                );
                Ok(RunStatus::Success)
            }
            Ok(UninstallOutcome::Aborted) => {
                print_colored(Color::Yellow, false, "Uninstall aborted, nothing was deleted.");
                Ok(RunStatus::Cancelled)
            }
            Err(e) => {
                print_error(&format!("✗ {e}"));
                Ok(RunStatus::Failed)
            }
        },
        Step::Launched(started) => Ok(report_launch(orchestrator, started)),
        Step::Exit => Ok(RunStatus::Success),
    }
}

fn launch(orchestrator: &mut Orchestrator) -> Result<RunStatus> {
    match orchestrator.begin(Command::Launch)? {
        Step::Launched(started) => Ok(report_launch(orchestrator, started)),
        _ => Ok(RunStatus::Failed),
    }
}

fn report_launch(orchestrator: &Orchestrator, started: bool) -> RunStatus {
    if started {
        print_colored(Color::Green, false, "✓ Application started");
        RunStatus::Success
    } else {
        print_error(&format!(
            "✗ Could not start the application in {}",
            orchestrator.install_dir().display()
        ));
        RunStatus::Failed
    }
}

/// Render a job with progress bars; Ctrl-C cancels it
async fn drive_with_progress(
    orchestrator: &mut Orchestrator,
    relay: &InterruptRelay,
    job: InstallJob,
) -> Result<JobOutcome> {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:50.cyan/blue}] {pos:>3}%  {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("█▓░"),
    );

    relay.register(job.cancel_token());
    let view = ProgressView {
        bar: bar.clone(),
        phase: None,
    };
    let outcome = orchestrator.drive(job, view).await;
    relay.clear();
    bar.finish_and_clear();
    Ok(outcome)
}

struct ProgressView {
    bar: ProgressBar,
    phase: Option<Phase>,
}

impl JobObserver for ProgressView {
    fn on_event(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::StatusChanged(text) => self.bar.println(text),
            ProgressEvent::ReleaseInfo { tag, name } => {
                self.bar.println(format!("✓ Found release: {tag}"));
                self.bar.println(format!("  Name: {name}"));
            }
            ProgressEvent::ProgressChanged { phase, percent } => {
                if self.phase != Some(*phase) {
                    self.phase = Some(*phase);
                    self.bar.reset();
                    self.bar.set_message(match phase {
                        Phase::Download => "Downloading",
                        Phase::Extract => "Extracting",
                    });
                }
                self.bar.set_position(*percent as u64);
            }
            ProgressEvent::Failed(message) => debug!("Job failed: {message}"),
            ProgressEvent::Cancelled => self.bar.println("Cancelling..."),
            ProgressEvent::Completed => self.bar.set_position(100),
        }
    }

    fn on_idle(&mut self) {
        self.bar.tick();
    }
}

/// Exit code for a run outcome; configuration problems count as failures
pub fn exit_code(result: &Result<RunStatus>) -> u8 {
    match result {
        Ok(status) => status.exit_code(),
        Err(_) => RunStatus::Failed.exit_code(),
    }
}

//! Install orchestrator
//!
//! Owns the [`InstallState`] of one run and sequences the release resolver,
//! the transfer engine and the archive materializer. Install and reinstall
//! run on a single spawned worker task which is the only writer of
//! [`ProgressEvent`]s and the only code touching the download and install
//! paths while the job is in flight. The control side observes the event
//! channel and holds the job's cancellation token.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::core::{EventSink, Phase, ProgressEvent};
use super::detection::detect_state;
use super::download::{
    MaterializeOutcome, ReleaseClient, ReleaseDescriptor, RepositoryId, TransferJob,
    TransferOutcome, http_client, materialize_with, transfer,
};
use super::error::InstallerError;
use super::launcher::Launcher;
use super::state::{Command, InstallState, Workflow, decide_workflow};
use super::uninstall::{Confirmation, UninstallOutcome, run_uninstall};
use crate::config::InstallerConfig;

/// Buffer of the worker → control event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Upper bound on how long the control loop waits for the next event
pub const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Everything the worker needs, shared read-only with the task
#[derive(Debug)]
struct JobContext {
    repository: RepositoryId,
    asset_name: String,
    install_dir: PathBuf,
    download_dir: PathBuf,
    releases: ReleaseClient,
    http: reqwest::Client,
}

/// Terminal result of an install or reinstall job
#[derive(Debug)]
pub enum JobOutcome {
    Installed(ReleaseDescriptor),
    Failed(InstallerError),
    Cancelled,
}

/// Receives what a running job reports
pub trait JobObserver {
    fn on_event(&mut self, event: &ProgressEvent);

    /// Called when no event arrived within [`EVENT_POLL_INTERVAL`]
    fn on_idle(&mut self) {}
}

impl<F> JobObserver for F
where
    F: FnMut(&ProgressEvent),
{
    fn on_event(&mut self, event: &ProgressEvent) {
        self(event)
    }
}

/// Held by the handle of an in-flight workflow; the orchestrator keeps the
/// weak side to notice a handle dropped without being finished.
type Lease = Arc<()>;

/// A running install/reinstall worker. Hand it back to
/// [`Orchestrator::drive`] to observe it and settle the state.
///
/// Dropping it undriven cancels the worker; [`Orchestrator::refresh`]
/// re-derives the state once the worker has stopped.
#[must_use = "the orchestrator stays busy until the job is driven"]
pub struct InstallJob {
    workflow: Workflow,
    events: mpsc::Receiver<ProgressEvent>,
    cancel: CancellationToken,
    _lease: Lease,
}

impl InstallJob {
    pub fn workflow(&self) -> Workflow {
        self.workflow
    }

    /// Token the control side can trigger from anywhere (e.g. Ctrl-C)
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for InstallJob {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Proof that an uninstall was accepted by [`Orchestrator::begin`].
/// Dropping it unused lets [`Orchestrator::refresh`] leave `Uninstalling`.
#[must_use = "the orchestrator stays in Uninstalling until the ticket is used"]
#[derive(Debug)]
pub struct UninstallTicket {
    _lease: Lease,
}

/// What [`Orchestrator::begin`] started
#[must_use]
pub enum Step {
    Job(InstallJob),
    Uninstall(UninstallTicket),
    /// Launch attempted; `true` if a process was started
    Launched(bool),
    Exit,
}

pub struct Orchestrator {
    ctx: Arc<JobContext>,
    launcher: Box<dyn Launcher>,
    state: InstallState,
    exited: bool,
    /// Weak side of the lease handed out with the in-flight job or ticket
    lease: Option<Weak<()>>,
    /// Worker of the in-flight install/reinstall
    worker: Option<JoinHandle<JobOutcome>>,
}

impl Orchestrator {
    /// Build an orchestrator; the initial state comes from the install
    /// directory's contents
    pub fn new(config: &InstallerConfig, launcher: Box<dyn Launcher>) -> Result<Self, InstallerError> {
        config.validate()?;
        let http = http_client()?;
        let releases = ReleaseClient::new(http.clone(), &config.api_base)?;

        let ctx = JobContext {
            repository: config.repository()?,
            asset_name: config.installation_file.clone(),
            install_dir: config.install_dir(),
            download_dir: config.download_dir(),
            releases,
            http,
        };
        let state = detect_state(&ctx.install_dir);
        info!(
            "{} at {}: {state}",
            ctx.repository,
            ctx.install_dir.display()
        );

        Ok(Self {
            ctx: Arc::new(ctx),
            launcher,
            state,
            exited: false,
            lease: None,
            worker: None,
        })
    }

    pub fn state(&self) -> InstallState {
        self.state
    }

    pub fn install_dir(&self) -> &Path {
        &self.ctx.install_dir
    }

    pub fn repository(&self) -> &RepositoryId {
        &self.ctx.repository
    }

    /// Re-derive the state from disk, e.g. after `Failed` or `Cancelled`.
    /// No-op while a workflow is in flight, unless its job or ticket was
    /// dropped unfinished and its worker has stopped.
    pub fn refresh(&mut self) -> InstallState {
        self.reclaim_abandoned();
        if !self.state.is_busy() {
            self.state = detect_state(&self.ctx.install_dir);
        }
        self.state
    }

    fn reclaim_abandoned(&mut self) {
        if !self.state.is_busy() {
            return;
        }
        let Some(lease) = &self.lease else { return };
        if lease.strong_count() > 0 {
            return;
        }
        if self.worker.as_ref().is_some_and(|w| !w.is_finished()) {
            debug!("Abandoned {} worker still stopping", self.state);
            return;
        }

        warn!("{} was abandoned before completion", self.state);
        self.lease = None;
        self.worker = None;
        self.state = detect_state(&self.ctx.install_dir);
    }

    fn issue_lease(&mut self) -> Lease {
        let lease = Arc::new(());
        self.lease = Some(Arc::downgrade(&lease));
        lease
    }

    /// Start the workflow `command` maps to in the current state.
    ///
    /// Install and reinstall spawn the worker and must be called from within
    /// a Tokio runtime. Launch runs synchronously and always returns to
    /// `Installed`.
    pub fn begin(&mut self, command: Command) -> Result<Step, InstallerError> {
        self.reclaim_abandoned();
        let state = self.state;
        let rejected = move || InstallerError::Rejected { command, state };
        if self.exited {
            return Err(rejected());
        }

        let workflow = decide_workflow(self.state, command);
        debug!("{command} in state {state} -> {workflow:?}");

        match workflow {
            Workflow::Reject => Err(rejected()),
            Workflow::Exit => {
                self.exited = true;
                Ok(Step::Exit)
            }
            Workflow::FreshInstall | Workflow::Reinstall => Ok(Step::Job(self.spawn_job(workflow))),
            Workflow::Uninstall => {
                self.state = InstallState::Uninstalling;
                Ok(Step::Uninstall(UninstallTicket {
                    _lease: self.issue_lease(),
                }))
            }
            Workflow::Launch => {
                self.state = InstallState::Launching;
                let started = self.launcher.attempt_launch(&self.ctx.install_dir);
                if !started {
                    warn!("Could not launch from {}", self.ctx.install_dir.display());
                }
                self.state = InstallState::Installed;
                Ok(Step::Launched(started))
            }
        }
    }

    fn spawn_job(&mut self, workflow: Workflow) -> InstallJob {
        if let Some(running) = workflow.running_state() {
            self.state = running;
        }

        let (tx, events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        self.worker = Some(tokio::spawn(run_install_job(
            Arc::clone(&self.ctx),
            cancel.clone(),
            EventSink::new(tx),
        )));

        InstallJob {
            workflow,
            events,
            cancel,
            _lease: self.issue_lease(),
        }
    }

    /// Forward the job's events to `observer` until the worker finishes, then
    /// settle the state from its outcome.
    pub async fn drive<O>(&mut self, mut job: InstallJob, mut observer: O) -> JobOutcome
    where
        O: JobObserver,
    {
        loop {
            match timeout(EVENT_POLL_INTERVAL, job.events.recv()).await {
                Ok(Some(event)) => observer.on_event(&event),
                Ok(None) => break,
                Err(_) => observer.on_idle(),
            }
        }

        let outcome = match self.worker.take() {
            Some(worker) => worker
                .await
                .unwrap_or_else(|e| JobOutcome::Failed(InstallerError::Worker(e.to_string()))),
            None => JobOutcome::Failed(InstallerError::Worker(
                "job has no running worker".to_string(),
            )),
        };
        self.lease = None;
        self.settle(&outcome);
        outcome
    }

    fn settle(&mut self, outcome: &JobOutcome) {
        self.state = match outcome {
            JobOutcome::Installed(release) => {
                info!("Installed {} into {}", release.tag, self.ctx.install_dir.display());
                InstallState::Installed
            }
            JobOutcome::Failed(e) => {
                warn!("Installation failed: {e}");
                InstallState::Failed
            }
            JobOutcome::Cancelled => {
                info!("Installation cancelled");
                InstallState::Cancelled
            }
        };
    }

    /// Finish an accepted uninstall. Both confirmations must be affirmative;
    /// otherwise nothing is deleted and the state returns to `Installed`.
    pub fn uninstall(
        &mut self,
        _ticket: UninstallTicket,
        confirm: &mut dyn Confirmation,
    ) -> Result<UninstallOutcome, InstallerError> {
        self.lease = None;
        match run_uninstall(&self.ctx.install_dir, confirm) {
            Ok(UninstallOutcome::Removed) => {
                self.state = InstallState::NotInstalled;
                Ok(UninstallOutcome::Removed)
            }
            Ok(UninstallOutcome::Aborted) => {
                self.state = InstallState::Installed;
                Ok(UninstallOutcome::Aborted)
            }
            Err(e) => {
                self.state = InstallState::Installed;
                Err(e)
            }
        }
    }
}

/// Worker body: resolve, download, materialize, clean up, then emit exactly
/// one terminal event.
async fn run_install_job(
    ctx: Arc<JobContext>,
    cancel: CancellationToken,
    sink: EventSink,
) -> JobOutcome {
    let outcome = match install_latest(&ctx, &cancel, &sink).await {
        Ok(Some(release)) => JobOutcome::Installed(release),
        Ok(None) => JobOutcome::Cancelled,
        Err(e) => JobOutcome::Failed(e),
    };

    let terminal = match &outcome {
        JobOutcome::Installed(_) => ProgressEvent::Completed,
        JobOutcome::Cancelled => ProgressEvent::Cancelled,
        JobOutcome::Failed(e) => ProgressEvent::Failed(e.to_string()),
    };
    sink.emit(terminal).await;
    outcome
}

/// `Ok(None)` means cancelled
async fn install_latest(
    ctx: &JobContext,
    cancel: &CancellationToken,
    sink: &EventSink,
) -> Result<Option<ReleaseDescriptor>, InstallerError> {
    sink.emit(ProgressEvent::status(format!(
        "Fetching latest release information for {}...",
        ctx.repository
    )))
    .await;

    let (release, asset) = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(None),
        resolved = ctx.releases.resolve_asset(&ctx.repository, &ctx.asset_name) => resolved?,
    };

    info!("Found release {} ({})", release.tag, release.display_name());
    sink.emit(ProgressEvent::ReleaseInfo {
        tag: release.tag.clone(),
        name: release.display_name().to_string(),
    })
    .await;
    if let Some(published) = release.published_at {
        sink.emit(ProgressEvent::status(format!(
            "Published: {}",
            published.format("%Y-%m-%d %H:%M UTC")
        )))
        .await;
    }
    sink.emit(ProgressEvent::status(format!(
        "Downloading {} ({:.2} MB)",
        asset.name,
        asset.size_bytes as f64 / 1_048_576.0
    )))
    .await;

    let archive_path = ctx.download_dir.join(&asset.name);
    let job = TransferJob::new(&asset.download_url, &archive_path, cancel.clone());
    let progress = sink.clone();
    match transfer(&ctx.http, &job, |percent| progress.progress(Phase::Download, percent)).await? {
        TransferOutcome::Cancelled => return Ok(None),
        TransferOutcome::Completed { bytes } => debug!("Transfer complete: {bytes} bytes"),
    }
    sink.complete_phase(Phase::Download).await;

    sink.emit(ProgressEvent::status(format!(
        "Extracting to {}",
        ctx.install_dir.display()
    )))
    .await;

    let extracted = {
        let archive = archive_path.clone();
        let target = ctx.install_dir.clone();
        let cancel = cancel.clone();
        let progress = sink.clone();
        tokio::task::spawn_blocking(move || {
            materialize_with(&archive, &target, &cancel, |percent| {
                progress.progress(Phase::Extract, percent)
            })
        })
        .await
    };

    sink.emit(ProgressEvent::status("Cleaning up...")).await;
    remove_archive(&archive_path);

    let extracted =
        extracted.map_err(|e| InstallerError::Worker(format!("extraction task failed: {e}")))??;
    match extracted {
        MaterializeOutcome::Cancelled => Ok(None),
        MaterializeOutcome::Done(done) => {
            debug!("Materialized entries: {:?}", done.entries);
            sink.complete_phase(Phase::Extract).await;
            sink.emit(ProgressEvent::status(format!(
                "Installed {} entries into {}",
                done.entries.len(),
                ctx.install_dir.display()
            )))
            .await;
            Ok(Some(release))
        }
    }
}

/// Best effort
fn remove_archive(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove archive {}: {e}", path.display()),
    }
}

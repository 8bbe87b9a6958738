//! Progress/status events flowing from the worker to the front end

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Job phase a progress value belongs to. Percentages restart at 0 when the
/// phase changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Download,
    Extract,
}

/// Event emitted by the worker while a job runs
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Human-readable status line
    StatusChanged(String),
    /// Completion percentage (0.0 to 100.0) of the current phase
    ProgressChanged { phase: Phase, percent: f32 },
    /// Release picked for this job
    ReleaseInfo { tag: String, name: String },
    /// Terminal: job failed
    Failed(String),
    /// Terminal: job cancelled by the user
    Cancelled,
    /// Terminal: job finished successfully
    Completed,
}

impl ProgressEvent {
    pub fn status(text: impl Into<String>) -> Self {
        Self::StatusChanged(text.into())
    }

    pub fn progress(phase: Phase, percent: f32) -> Self {
        Self::ProgressChanged {
            phase,
            percent: percent.clamp(0.0, 100.0),
        }
    }

    /// Whether this event ends the job's stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Cancelled | Self::Completed)
    }
}

/// `done / total` as a percentage clamped to 0..=100
pub fn percent_of(done: u64, total: u64) -> f32 {
    if total == 0 {
        return 0.0;
    }
    ((done as f64 / total as f64) * 100.0).clamp(0.0, 100.0) as f32
}

/// Sending half of the job's event channel.
///
/// Status, terminal and phase-completion events are delivered reliably;
/// intermediate progress updates are best-effort and get dropped when the
/// buffer is full.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<ProgressEvent>,
    progress_disabled: Arc<AtomicBool>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self {
            tx,
            progress_disabled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Deliver an event, waiting for buffer space
    pub async fn emit(&self, event: ProgressEvent) {
        if self.tx.send(event).await.is_err() {
            debug!("Event receiver dropped, continuing without updates");
        }
    }

    /// Best-effort progress update. A final `100` is left to
    /// [`complete_phase`](Self::complete_phase).
    pub fn progress(&self, phase: Phase, percent: f32) {
        if percent >= 100.0 || self.progress_disabled.load(Ordering::Relaxed) {
            return;
        }
        if let Err(TrySendError::Closed(_)) = self.tx.try_send(ProgressEvent::progress(phase, percent)) {
            warn!("Progress channel closed, continuing without updates");
            self.progress_disabled.store(true, Ordering::Relaxed);
        }
    }

    /// Report `phase` at 100%, waiting for buffer space
    pub async fn complete_phase(&self, phase: Phase) {
        self.emit(ProgressEvent::progress(phase, 100.0)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(0, 1_000), 0.0);
        assert_eq!(percent_of(500, 1_000), 50.0);
        assert_eq!(percent_of(1_000, 1_000), 100.0);
        assert_eq!(percent_of(2_000, 1_000), 100.0);
        assert_eq!(percent_of(10, 0), 0.0);
    }

    #[test]
    fn test_progress_is_clamped() {
        assert_eq!(
            ProgressEvent::progress(Phase::Download, 140.0),
            ProgressEvent::ProgressChanged {
                phase: Phase::Download,
                percent: 100.0
            }
        );
    }

    #[tokio::test]
    async fn test_progress_dropped_when_full_but_status_delivered() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = EventSink::new(tx);

        sink.progress(Phase::Download, 10.0);
        sink.progress(Phase::Download, 20.0);

        assert_eq!(
            rx.recv().await,
            Some(ProgressEvent::progress(Phase::Download, 10.0))
        );

        sink.emit(ProgressEvent::Completed).await;
        assert_eq!(rx.recv().await, Some(ProgressEvent::Completed));
    }

    #[tokio::test]
    async fn test_phase_completion_waits_for_space() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = EventSink::new(tx);

        sink.progress(Phase::Extract, 40.0);
        // Full buffer: a best-effort 100 would be lost here
        sink.progress(Phase::Extract, 100.0);

        let completer = sink.clone();
        let done = tokio::spawn(async move { completer.complete_phase(Phase::Extract).await });

        assert_eq!(
            rx.recv().await,
            Some(ProgressEvent::progress(Phase::Extract, 40.0))
        );
        assert_eq!(
            rx.recv().await,
            Some(ProgressEvent::progress(Phase::Extract, 100.0))
        );
        done.await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_terminal_events() {
        assert!(ProgressEvent::Completed.is_terminal());
        assert!(ProgressEvent::Cancelled.is_terminal());
        assert!(ProgressEvent::Failed("x".into()).is_terminal());
        assert!(!ProgressEvent::status("x").is_terminal());
    }
}

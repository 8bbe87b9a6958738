//! Transfer engine: streams a release asset to disk with progress and
//! cooperative cancellation

use std::path::PathBuf;

use futures::StreamExt;
use log::{debug, warn};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::install::core::percent_of;
use crate::install::error::InstallerError;

/// One download attempt
#[derive(Debug, Clone)]
pub struct TransferJob {
    pub source_url: String,
    pub destination: PathBuf,
    pub cancel: CancellationToken,
}

impl TransferJob {
    pub fn new(
        source_url: impl Into<String>,
        destination: impl Into<PathBuf>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source_url: source_url.into(),
            destination: destination.into(),
            cancel,
        }
    }
}

/// Non-error end of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Completed { bytes: u64 },
    Cancelled,
}

/// Removes the destination file on drop unless the transfer completed.
///
/// Covers early returns, cancellation and the surrounding task being aborted.
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn arm(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed partial download {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            // Best effort
            Err(e) => warn!(
                "Could not remove partial download {}: {e}",
                self.path.display()
            ),
        }
    }
}

/// Stream `job.source_url` into `job.destination`.
///
/// `on_progress` receives non-decreasing percentages when the response
/// declares its length, and always a final `100.0` on success. Cancellation
/// is checked before the request and at every chunk boundary. On any outcome
/// other than `Completed` no file is left at the destination.
pub async fn transfer<F>(
    client: &reqwest::Client,
    job: &TransferJob,
    mut on_progress: F,
) -> Result<TransferOutcome, InstallerError>
where
    F: FnMut(f32),
{
    if job.cancel.is_cancelled() {
        return Ok(TransferOutcome::Cancelled);
    }

    let url = job.source_url.as_str();
    let response = tokio::select! {
        biased;
        _ = job.cancel.cancelled() => return Ok(TransferOutcome::Cancelled),
        sent = client.get(url).send() => sent
            .map_err(|e| InstallerError::Transfer(format!("request to {url} failed: {e}")))?,
    };

    if !response.status().is_success() {
        return Err(InstallerError::Transfer(format!(
            "{url} returned HTTP {}",
            response.status()
        )));
    }

    let total_bytes = response.content_length().filter(|&n| n > 0);

    if let Some(parent) = job.destination.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            InstallerError::Transfer(format!("cannot create {}: {e}", parent.display()))
        })?;
    }

    // Declared before `file` so the handle is closed before the guard runs
    let guard = PartialFile::arm(job.destination.clone());
    let mut file = tokio::fs::File::create(&job.destination)
        .await
        .map_err(|e| {
            InstallerError::Transfer(format!("cannot create {}: {e}", job.destination.display()))
        })?;

    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;
    let mut last_whole_percent: i32 = -1;

    loop {
        let next = tokio::select! {
            biased;
            _ = job.cancel.cancelled() => {
                // Let any in-flight write settle before the guard deletes the file
                let _ = file.flush().await;
                debug!("Transfer of {url} cancelled after {downloaded} bytes");
                return Ok(TransferOutcome::Cancelled);
            }
            next = stream.next() => next,
        };

        let Some(chunk) = next else { break };
        let chunk = chunk.map_err(|e| {
            InstallerError::Transfer(format!("stream from {url} interrupted: {e}"))
        })?;

        file.write_all(&chunk).await.map_err(|e| {
            InstallerError::Transfer(format!("write to {} failed: {e}", job.destination.display()))
        })?;
        downloaded += chunk.len() as u64;

        if let Some(total) = total_bytes {
            let percent = percent_of(downloaded, total);
            let whole = percent as i32;
            if whole > last_whole_percent {
                last_whole_percent = whole;
                on_progress(percent);
            }
        }
    }

    file.flush().await.map_err(|e| {
        InstallerError::Transfer(format!("write to {} failed: {e}", job.destination.display()))
    })?;
    file.sync_all().await.map_err(|e| {
        InstallerError::Transfer(format!("sync of {} failed: {e}", job.destination.display()))
    })?;
    drop(file);

    if last_whole_percent < 100 {
        on_progress(100.0);
    }

    guard.keep();
    debug!("Downloaded {downloaded} bytes to {}", job.destination.display());
    Ok(TransferOutcome::Completed { bytes: downloaded })
}

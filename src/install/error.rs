//! Installer error taxonomy
//!
//! Every failure the orchestrator can surface maps onto one variant here. None
//! of them are retried automatically; the front end re-runs the workflow.

use thiserror::Error;

use super::state::{Command, InstallState};

/// Errors produced by the release resolver, transfer engine, archive
/// materializer and the install state machine.
#[derive(Debug, Error)]
pub enum InstallerError {
    /// Release registry unreachable or answered with a non-2xx status
    #[error("network error: {0}")]
    Network(String),

    /// Latest release has no asset with the configured file name
    #[error("{asset} not found in assets of release {tag}")]
    AssetNotFound { asset: String, tag: String },

    /// Streaming the asset to disk failed
    #[error("download failed: {0}")]
    Transfer(String),

    /// Archive is corrupt, unreadable or of an unsupported format
    #[error("extraction failed: {0}")]
    Extract(String),

    /// Moving extracted entries into the install directory failed.
    /// Entries moved before the failure stay in place.
    #[error("{0}: installation may be incomplete; retry reinstall")]
    Move(String),

    /// The installed application could not be started (non-fatal)
    #[error("launch failed: {0}")]
    LaunchFailure(String),

    /// Removing the install directory failed
    #[error("uninstall failed: {0}")]
    Uninstall(String),

    /// Configuration file missing, unreadable or incomplete
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Command is not valid in the current state
    #[error("cannot {command} while {state}")]
    Rejected {
        command: Command,
        state: InstallState,
    },

    /// The worker task panicked or was aborted
    #[error("installer worker stopped unexpectedly: {0}")]
    Worker(String),
}

impl InstallerError {
    /// Map a `reqwest` failure from the registry query
    pub(crate) fn network(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

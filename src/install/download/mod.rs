//! Release discovery, asset download and archive extraction
//!
//! ## Module Organization
//!
//! - `github` - release registry queries and asset selection
//! - `core` - streaming transfer with progress and cancellation
//! - `extract` - archive extraction and merge into the install directory

mod core;
mod extract;
mod github;

use std::time::Duration;

use crate::install::error::InstallerError;

pub use self::core::{TransferJob, TransferOutcome, transfer};
pub use extract::{ArchiveFormat, MaterializeOutcome, Materialized, materialize, materialize_with};
pub use github::{
    AssetDescriptor, DEFAULT_API_BASE, ReleaseClient, ReleaseDescriptor, RepositoryId,
    select_asset,
};

/// Initial connection timeout. Reads have no deadline; a stalled download
/// waits until cancelled.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("release-installer/", env!("CARGO_PKG_VERSION"));

/// HTTP client shared by the registry query and the asset download
pub fn http_client() -> Result<reqwest::Client, InstallerError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(InstallerError::network)
}

//! Installation state detection
//!
//! The install directory is the only persistent artifact. It counts as an
//! installation when it exists and has at least one entry.

use std::path::Path;

use super::state::InstallState;

/// Derive the initial state from the install directory
pub fn detect_state(install_dir: &Path) -> InstallState {
    if is_populated(install_dir) {
        InstallState::Installed
    } else {
        InstallState::NotInstalled
    }
}

fn is_populated(dir: &Path) -> bool {
    dir.is_dir()
        && dir
            .read_dir()
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
}

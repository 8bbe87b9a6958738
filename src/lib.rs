//! release-installer
//!
//! Installs, reinstalls, launches and uninstalls an application published as
//! a release asset on a GitHub-style registry.

pub mod config;
pub mod install;

pub use config::InstallerConfig;
pub use install::{Command, InstallState, InstallerError, Orchestrator};

//! Starting the installed application

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::{info, warn};

use super::error::InstallerError;

/// Capability to start the installed application
pub trait Launcher: Send + Sync {
    /// Try to start the application in `install_dir`; `true` if a process was
    /// started.
    fn attempt_launch(&self, install_dir: &Path) -> bool;
}

/// Launches by executable/script naming convention, or an explicitly
/// configured command relative to the install directory
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    command: Option<PathBuf>,
    app_name: String,
}

impl ProcessLauncher {
    pub fn new(command: Option<PathBuf>, app_name: impl Into<String>) -> Self {
        Self {
            command,
            app_name: app_name.into(),
        }
    }

    /// Find the entry point inside `install_dir`
    pub fn resolve(&self, install_dir: &Path) -> Result<PathBuf, InstallerError> {
        if let Some(command) = &self.command {
            let path = install_dir.join(command);
            return if path.is_file() {
                Ok(path)
            } else {
                Err(InstallerError::LaunchFailure(format!(
                    "configured launch command {} not found",
                    path.display()
                )))
            };
        }

        self.candidates()
            .into_iter()
            .map(|name| install_dir.join(name))
            .find(|path| path.is_file())
            .or_else(|| fallback_executable(install_dir))
            .ok_or_else(|| {
                InstallerError::LaunchFailure(format!(
                    "no launchable entry point found in {}",
                    install_dir.display()
                ))
            })
    }

    fn candidates(&self) -> Vec<String> {
        cfg_if::cfg_if! {
            if #[cfg(windows)] {
                vec![
                    format!("{}.exe", self.app_name),
                    "launch.bat".to_string(),
                    "run.bat".to_string(),
                    "start.bat".to_string(),
                ]
            } else {
                vec![
                    "launch.sh".to_string(),
                    "run.sh".to_string(),
                    "start.sh".to_string(),
                    self.app_name.clone(),
                    self.app_name.to_lowercase(),
                ]
            }
        }
    }

    fn spawn(&self, install_dir: &Path) -> Result<u32, InstallerError> {
        let entry = self.resolve(install_dir)?;
        let extension = entry
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let mut command = match extension.as_str() {
            "sh" => {
                let mut c = Command::new("sh");
                c.arg(&entry);
                c
            }
            "bat" | "cmd" => {
                let mut c = Command::new("cmd");
                c.arg("/C").arg(&entry);
                c
            }
            _ => Command::new(&entry),
        };

        let child = command
            .current_dir(install_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                InstallerError::LaunchFailure(format!("cannot start {}: {e}", entry.display()))
            })?;

        Ok(child.id())
    }
}

impl Launcher for ProcessLauncher {
    fn attempt_launch(&self, install_dir: &Path) -> bool {
        match self.spawn(install_dir) {
            Ok(pid) => {
                info!("Started {} (pid {pid})", self.app_name);
                true
            }
            Err(e) => {
                warn!("{e}");
                false
            }
        }
    }
}

#[cfg(windows)]
fn fallback_executable(install_dir: &Path) -> Option<PathBuf> {
    let mut exes: Vec<PathBuf> = std::fs::read_dir(install_dir)
        .ok()?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .is_some_and(|e| e.eq_ignore_ascii_case("exe"))
        })
        .collect();
    exes.sort();
    exes.into_iter().next()
}

#[cfg(not(windows))]
fn fallback_executable(_install_dir: &Path) -> Option<PathBuf> {
    None
}

//! Installer configuration
//!
//! Read from `installer_configs.json` (JSON) or any `*.toml` file. Relative
//! paths are resolved against the directory holding the config file.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::install::InstallerError;
use crate::install::download::{DEFAULT_API_BASE, RepositoryId};

/// File name looked up next to the executable and in the working directory
pub const CONFIG_FILE_NAME: &str = "installer_configs.json";

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallerConfig {
    /// `owner/repo` or repository URL
    pub application_repo: String,
    /// Exact name of the release asset to install
    pub installation_file: String,
    /// Shown in banners only
    #[serde(default)]
    pub installer_version: Option<String>,
    #[serde(default)]
    pub install_dir: Option<PathBuf>,
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Entry point relative to the install directory
    #[serde(default)]
    pub launch_command: Option<PathBuf>,
    #[serde(default)]
    pub launch_after_install: bool,

    #[serde(skip)]
    base_dir: PathBuf,
}

impl InstallerConfig {
    pub fn new(application_repo: impl Into<String>, installation_file: impl Into<String>) -> Self {
        Self {
            application_repo: application_repo.into(),
            installation_file: installation_file.into(),
            installer_version: None,
            install_dir: None,
            download_dir: None,
            api_base: default_api_base(),
            launch_command: None,
            launch_after_install: false,
            base_dir: PathBuf::from("."),
        }
    }

    pub fn with_install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.install_dir = Some(dir.into());
        self
    }

    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = Some(dir.into());
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Load and validate a config file; format chosen by extension
    pub fn load(path: &Path) -> Result<Self, InstallerError> {
        let text = fs::read_to_string(path).map_err(|e| {
            InstallerError::Config(format!("cannot read {}: {e}", path.display()))
        })?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let mut config: Self = if is_toml {
            toml::from_str(&text).map_err(|e| {
                InstallerError::Config(format!("cannot parse {}: {e}", path.display()))
            })?
        } else {
            serde_json::from_str(&text).map_err(|e| {
                InstallerError::Config(format!("cannot parse {}: {e}", path.display()))
            })?
        };

        config.base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        config.validate()?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Locate the config file: explicit path, then next to the executable,
    /// then the working directory, then the user config directory.
    pub fn discover(explicit: Option<&Path>) -> Result<PathBuf, InstallerError> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }

        let mut search_paths = Vec::new();
        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            search_paths.push(exe_dir.join(CONFIG_FILE_NAME));
        }
        if let Ok(cwd) = std::env::current_dir() {
            search_paths.push(cwd.join(CONFIG_FILE_NAME));
        }
        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("release-installer").join("installer.toml"));
        }

        for candidate in &search_paths {
            debug!("Looking for configuration at {}", candidate.display());
            if candidate.is_file() {
                return Ok(candidate.clone());
            }
        }

        Err(InstallerError::Config(format!(
            "no configuration found (searched {})",
            search_paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }

    pub fn validate(&self) -> Result<(), InstallerError> {
        if self.application_repo.trim().is_empty() {
            return Err(InstallerError::Config("application_repo is empty".to_string()));
        }
        if self.installation_file.trim().is_empty() {
            return Err(InstallerError::Config("installation_file is empty".to_string()));
        }
        self.repository()?;
        Ok(())
    }

    pub fn repository(&self) -> Result<RepositoryId, InstallerError> {
        self.application_repo.parse()
    }

    /// Application name used for the default install directory and banners
    pub fn app_name(&self) -> String {
        self.repository()
            .map(|r| r.repo)
            .unwrap_or_else(|_| self.application_repo.clone())
    }

    /// Install directory; defaults to `<config dir>/<repo name>`
    pub fn install_dir(&self) -> PathBuf {
        match &self.install_dir {
            Some(dir) => self.resolve(dir),
            None => self.base_dir.join(self.app_name()),
        }
    }

    /// Where the archive is downloaded; defaults to the install directory's
    /// parent
    pub fn download_dir(&self) -> PathBuf {
        match &self.download_dir {
            Some(dir) => self.resolve(dir),
            None => self
                .install_dir()
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.base_dir.clone()),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

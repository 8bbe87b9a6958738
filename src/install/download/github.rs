//! Release registry interaction (GitHub-style `releases/latest` API)

use std::str::FromStr;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::install::error::InstallerError;

/// Default release registry
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// `owner/repo` pair identifying a repository on the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryId {
    pub owner: String,
    pub repo: String,
}

impl FromStr for RepositoryId {
    type Err = InstallerError;

    /// Accepts `owner/repo` or a repository URL such as
    /// `https://github.com/owner/repo` (trailing `/` and `.git` tolerated).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let path = if trimmed.contains("://") {
            Url::parse(trimmed)
                .map_err(|e| InstallerError::Config(format!("invalid repository URL {trimmed}: {e}")))?
                .path()
                .to_string()
        } else {
            trimmed.to_string()
        };

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let [.., owner, repo] = segments.as_slice() else {
            return Err(InstallerError::Config(format!(
                "repository must look like owner/repo, got {trimmed:?}"
            )));
        };
        let repo = repo.trim_end_matches(".git");
        if repo.is_empty() {
            return Err(InstallerError::Config(format!(
                "repository must look like owner/repo, got {trimmed:?}"
            )));
        }

        Ok(Self {
            owner: (*owner).to_string(),
            repo: repo.to_string(),
        })
    }
}

impl std::fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Release metadata from the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseDescriptor {
    #[serde(rename = "tag_name")]
    pub tag: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assets: Vec<AssetDescriptor>,
}

impl ReleaseDescriptor {
    /// Release title, falling back to the tag for untitled releases
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.tag,
        }
    }
}

/// Release asset metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    pub name: String,
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
    #[serde(default, rename = "size")]
    pub size_bytes: u64,
}

/// Pick the asset whose name equals `asset_name` exactly (case-sensitive)
pub fn select_asset<'a>(
    release: &'a ReleaseDescriptor,
    asset_name: &str,
) -> Result<&'a AssetDescriptor, InstallerError> {
    release
        .assets
        .iter()
        .find(|a| a.name == asset_name)
        .ok_or_else(|| InstallerError::AssetNotFound {
            asset: asset_name.to_string(),
            tag: release.tag.clone(),
        })
}

/// Client for the `releases/latest` endpoint
#[derive(Debug, Clone)]
pub struct ReleaseClient {
    http: reqwest::Client,
    api_base: String,
}

impl ReleaseClient {
    pub fn new(http: reqwest::Client, api_base: &str) -> Result<Self, InstallerError> {
        Url::parse(api_base)
            .map_err(|e| InstallerError::Config(format!("invalid api_base {api_base}: {e}")))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the latest published release. Single attempt, no retries.
    pub async fn latest_release(
        &self,
        repo: &RepositoryId,
    ) -> Result<ReleaseDescriptor, InstallerError> {
        let url = format!(
            "{}/repos/{}/{}/releases/latest",
            self.api_base, repo.owner, repo.repo
        );
        debug!("Fetching {url}");

        let response = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(InstallerError::network)?;

        if !response.status().is_success() {
            return Err(InstallerError::Network(format!(
                "release registry error for {repo}: HTTP {}",
                response.status()
            )));
        }

        response
            .json::<ReleaseDescriptor>()
            .await
            .map_err(|e| InstallerError::Network(format!("invalid release metadata for {repo}: {e}")))
    }

    /// Fetch the latest release and locate `asset_name` in it
    pub async fn resolve_asset(
        &self,
        repo: &RepositoryId,
        asset_name: &str,
    ) -> Result<(ReleaseDescriptor, AssetDescriptor), InstallerError> {
        let release = self.latest_release(repo).await?;
        let asset = select_asset(&release, asset_name)?.clone();
        Ok((release, asset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(names: &[&str]) -> ReleaseDescriptor {
        ReleaseDescriptor {
            tag: "v1.2.0".to_string(),
            name: Some("Spring release".to_string()),
            published_at: None,
            assets: names
                .iter()
                .map(|n| AssetDescriptor {
                    name: n.to_string(),
                    download_url: format!("https://example.invalid/{n}"),
                    size_bytes: 10,
                })
                .collect(),
        }
    }

    #[test]
    fn test_select_asset_exact_match() {
        let r = release(&["README.md", "App-Setup.zip"]);
        let asset = select_asset(&r, "App-Setup.zip").unwrap();
        assert_eq!(asset.name, "App-Setup.zip");
        assert_eq!(asset.download_url, "https://example.invalid/App-Setup.zip");
    }

    #[test]
    fn test_select_asset_missing() {
        let r = release(&["App-Setup.exe"]);
        let err = select_asset(&r, "App-Setup.zip").unwrap_err();
        assert!(matches!(
            err,
            InstallerError::AssetNotFound { ref asset, ref tag }
                if asset == "App-Setup.zip" && tag == "v1.2.0"
        ));
    }

    #[test]
    fn test_select_asset_is_case_sensitive_without_globbing() {
        let r = release(&["app-setup.zip", "App-Setup.zip.sha256"]);
        assert!(select_asset(&r, "App-Setup.zip").is_err());
        assert!(select_asset(&r, "App-*.zip").is_err());
    }

    #[test]
    fn test_repository_id_forms() {
        let expected = RepositoryId {
            owner: "mudrikam".to_string(),
            repo: "Image-Tea-nano".to_string(),
        };
        for input in [
            "mudrikam/Image-Tea-nano",
            "https://github.com/mudrikam/Image-Tea-nano",
            "https://github.com/mudrikam/Image-Tea-nano/",
            "https://github.com/mudrikam/Image-Tea-nano.git",
        ] {
            assert_eq!(input.parse::<RepositoryId>().unwrap(), expected, "{input}");
        }
    }

    #[test]
    fn test_repository_id_rejects_single_segment() {
        assert!("Image-Tea-nano".parse::<RepositoryId>().is_err());
        assert!("".parse::<RepositoryId>().is_err());
        assert!("owner/.git".parse::<RepositoryId>().is_err());
    }

    #[test]
    fn test_release_json_decoding() {
        let json = r#"{
            "tag_name": "v2.0.1",
            "name": null,
            "published_at": "2024-05-01T10:00:00Z",
            "assets": [
                {"name": "App-Setup.zip", "browser_download_url": "https://x/App-Setup.zip", "size": 1048576}
            ]
        }"#;
        let r: ReleaseDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(r.tag, "v2.0.1");
        assert_eq!(r.display_name(), "v2.0.1");
        assert!(r.published_at.is_some());
        assert_eq!(r.assets[0].size_bytes, 1_048_576);
    }
}

//! Shared fixtures: a local release registry and archive builders.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use zip::write::SimpleFileOptions;

pub const OWNER: &str = "acme";
pub const REPO: &str = "widget";

/// Local HTTP server on a random port, shut down on drop
pub struct TestServer {
    base_url: String,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn new(router: Router) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let server = axum::serve(listener, router).with_graceful_shutdown(async {
            shutdown_rx.await.ok();
        });

        tokio::spawn(async move {
            server.await.unwrap();
        });

        tokio::time::sleep(Duration::from_millis(50)).await;

        Self {
            base_url: format!("http://{addr}"),
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
    }
}

/// `releases/latest` path for the fixture repository
pub fn latest_path() -> String {
    format!("/repos/{OWNER}/{REPO}/releases/latest")
}

/// Release JSON in the registry's wire format
pub fn release_json(tag: &str, assets: &[(&str, &str, u64)]) -> serde_json::Value {
    serde_json::json!({
        "tag_name": tag,
        "name": format!("Widget {tag}"),
        "published_at": "2024-05-01T12:00:00Z",
        "assets": assets
            .iter()
            .map(|(name, url, size)| serde_json::json!({
                "name": name,
                "browser_download_url": url,
                "size": size,
            }))
            .collect::<Vec<_>>(),
    })
}

/// Zip with the given files; names ending in `/` become directories
pub fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, content) in files {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

/// Gzipped tarball with the given files
pub fn tar_gz_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *content).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Names directly inside `dir`, sorted
pub fn list_dir(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

//! Release resolution against a local registry

mod common;

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use common::{TestServer, latest_path, release_json};
use release_installer::InstallerError;
use release_installer::install::download::{ReleaseClient, RepositoryId, http_client};

fn repository() -> RepositoryId {
    format!("{}/{}", common::OWNER, common::REPO).parse().unwrap()
}

async fn registry(assets: &'static [(&'static str, &'static str, u64)]) -> TestServer {
    let router = Router::new().route(
        &latest_path(),
        get(move || async move { Json(release_json("v2.1.0", assets)) }),
    );
    TestServer::new(router).await
}

#[tokio::test]
async fn test_resolves_named_asset_from_latest_release() {
    let server = registry(&[
        ("README.md", "http://example.invalid/README.md", 10),
        ("App-Setup.zip", "http://example.invalid/App-Setup.zip", 2048),
    ])
    .await;
    let client = ReleaseClient::new(http_client().unwrap(), server.base_url()).unwrap();

    let (release, asset) = client
        .resolve_asset(&repository(), "App-Setup.zip")
        .await
        .unwrap();

    assert_eq!(release.tag, "v2.1.0");
    assert_eq!(release.display_name(), "Widget v2.1.0");
    assert!(release.published_at.is_some());
    assert_eq!(asset.name, "App-Setup.zip");
    assert_eq!(asset.download_url, "http://example.invalid/App-Setup.zip");
    assert_eq!(asset.size_bytes, 2048);
}

#[tokio::test]
async fn test_missing_asset_names_asset_and_tag() {
    let server = registry(&[("App-Setup.exe", "http://example.invalid/App-Setup.exe", 1)]).await;
    let client = ReleaseClient::new(http_client().unwrap(), server.base_url()).unwrap();

    let err = client
        .resolve_asset(&repository(), "App-Setup.zip")
        .await
        .unwrap_err();

    match err {
        InstallerError::AssetNotFound { asset, tag } => {
            assert_eq!(asset, "App-Setup.zip");
            assert_eq!(tag, "v2.1.0");
        }
        other => panic!("expected AssetNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_registry_error_is_network_error() {
    let router = Router::new().route(
        &latest_path(),
        get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let server = TestServer::new(router).await;
    let client = ReleaseClient::new(http_client().unwrap(), server.base_url()).unwrap();

    let err = client.latest_release(&repository()).await.unwrap_err();
    assert!(matches!(err, InstallerError::Network(_)), "got {err:?}");
}

#[tokio::test]
async fn test_malformed_metadata_is_network_error() {
    let router = Router::new().route(&latest_path(), get(|| async { "{\"assets\": 3}" }));
    let server = TestServer::new(router).await;
    let client = ReleaseClient::new(http_client().unwrap(), server.base_url()).unwrap();

    let err = client.latest_release(&repository()).await.unwrap_err();
    assert!(matches!(err, InstallerError::Network(_)), "got {err:?}");
}

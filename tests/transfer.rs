//! Transfer engine against a local HTTP server

mod common;

use std::time::Duration;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::StatusCode;
use axum::routing::get;
use common::TestServer;
use futures::stream::{self, StreamExt};
use release_installer::InstallerError;
use release_installer::install::download::{TransferJob, TransferOutcome, http_client, transfer};
use tokio_util::sync::CancellationToken;

const BODY_LEN: usize = 1_000_000;

fn router() -> Router {
    Router::new()
        .route("/asset.zip", get(|| async { vec![7u8; BODY_LEN] }))
        .route(
            "/chunked.zip",
            get(|| async {
                let chunks = (0..4).map(|_| Ok::<_, std::io::Error>(Bytes::from(vec![1u8; 4096])));
                Body::from_stream(stream::iter(chunks))
            }),
        )
        .route(
            "/stalled.zip",
            get(|| async {
                let first = stream::iter([Ok::<_, std::io::Error>(Bytes::from(vec![1u8; 64 * 1024]))]);
                Body::from_stream(first.chain(stream::pending()))
            }),
        )
        .route("/missing.zip", get(|| async { StatusCode::NOT_FOUND }))
}

#[tokio::test]
async fn test_download_reports_monotonic_progress_to_100() {
    let server = TestServer::new(router()).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("asset.zip");
    let job = TransferJob::new(server.url("/asset.zip"), &dest, CancellationToken::new());

    let mut seen = Vec::new();
    let outcome = transfer(&http_client().unwrap(), &job, |p| seen.push(p))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        TransferOutcome::Completed {
            bytes: BODY_LEN as u64
        }
    );
    assert_eq!(std::fs::metadata(&dest).unwrap().len(), BODY_LEN as u64);
    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "not monotonic: {seen:?}");
    assert_eq!(seen.last().copied(), Some(100.0));
}

#[tokio::test]
async fn test_unknown_length_reports_only_completion() {
    let server = TestServer::new(router()).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("nested/chunked.zip");
    let job = TransferJob::new(server.url("/chunked.zip"), &dest, CancellationToken::new());

    let mut seen = Vec::new();
    let outcome = transfer(&http_client().unwrap(), &job, |p| seen.push(p))
        .await
        .unwrap();

    assert_eq!(outcome, TransferOutcome::Completed { bytes: 4 * 4096 });
    assert_eq!(seen, vec![100.0]);
}

#[tokio::test]
async fn test_cancel_mid_stream_removes_partial_file() {
    let server = TestServer::new(router()).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("stalled.zip");
    let cancel = CancellationToken::new();
    let job = TransferJob::new(server.url("/stalled.zip"), &dest, cancel.clone());

    let trigger = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
    });

    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        transfer(&http_client().unwrap(), &job, |_| {}),
    )
    .await
    .expect("cancellation must end the transfer")
    .unwrap();
    trigger.await.unwrap();

    assert_eq!(outcome, TransferOutcome::Cancelled);
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_cancelled_before_start_makes_no_request() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("never.zip");
    let cancel = CancellationToken::new();
    cancel.cancel();
    // Nothing listens here; a request would fail rather than cancel
    let job = TransferJob::new("http://127.0.0.1:9/never.zip", &dest, cancel);

    let outcome = transfer(&http_client().unwrap(), &job, |_| {}).await.unwrap();

    assert_eq!(outcome, TransferOutcome::Cancelled);
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_http_error_is_transfer_error_without_file() {
    let server = TestServer::new(router()).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("missing.zip");
    let job = TransferJob::new(server.url("/missing.zip"), &dest, CancellationToken::new());

    let err = transfer(&http_client().unwrap(), &job, |_| {})
        .await
        .unwrap_err();

    assert!(matches!(err, InstallerError::Transfer(_)), "got {err:?}");
    assert!(!dest.exists());
}

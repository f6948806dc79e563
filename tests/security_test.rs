#![cfg(unix)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use doc_convert::config::ServiceConfig;
use doc_convert::services::converter::ConverterService;
use doc_convert::services::staging::StagingArea;
use doc_convert::services::worker_pool::BlockingPool;
use doc_convert::{AppState, create_app};
use http_body_util::BodyExt;
use serde_json::Value;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "---------------------------123456789012345678901234567";

fn setup(staging_root: &Path, bin: &Path, max_upload_size: usize) -> Router {
    let _ = tracing_subscriber::fmt::try_init();

    // prints the staged path, then the staged contents
    let stub = bin.join("catdoc");
    std::fs::write(&stub, "#!/bin/sh\nprintf '%s\\n' \"$1\"\ncat \"$1\"\n").unwrap();
    std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755)).unwrap();

    let config = ServiceConfig {
        converter_program: stub.to_string_lossy().into_owned(),
        staging_dir: Some(staging_root.to_path_buf()),
        max_upload_size,
        max_workers: 2,
        ..ServiceConfig::default()
    };
    let pool = Arc::new(BlockingPool::new(config.max_workers));
    create_app(AppState {
        staging: Arc::new(StagingArea::new(config.staging_root())),
        converter: Arc::new(ConverterService::from_config(&config, pool.clone())),
        pool,
        config,
    })
}

fn upload_request(filename: &str, content: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: application/msword\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/convert-doc/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&body).into_owned())
}

#[tokio::test]
async fn test_traversal_filename_cannot_escape_staging_dir() {
    let sandbox = tempfile::tempdir().unwrap();
    let staging_root = sandbox.path().join("staging").join("uploads");
    std::fs::create_dir_all(&staging_root).unwrap();
    let bin = tempfile::tempdir().unwrap();
    let app = setup(&staging_root, bin.path(), 1024 * 1024);

    let (status, body) = send(&app, upload_request("../../escape.doc", b"owned")).await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (staged_path, content) = body.split_once('\n').unwrap();
    let staged_path = Path::new(staged_path);
    assert_eq!(content, "owned");
    assert_eq!(staged_path.parent().unwrap().parent().unwrap(), staging_root);
    assert_eq!(staged_path.file_name().unwrap(), "document.doc");

    assert!(!sandbox.path().join("escape.doc").exists());
    assert!(!sandbox.path().join("staging").join("escape.doc").exists());
    assert_eq!(std::fs::read_dir(&staging_root).unwrap().count(), 0);
}

#[tokio::test]
async fn test_windows_style_path_uses_basename_for_extension() {
    let staging = tempfile::tempdir().unwrap();
    let bin = tempfile::tempdir().unwrap();
    let app = setup(staging.path(), bin.path(), 1024 * 1024);

    let (status, _) = send(&app, upload_request("..\\..\\evil.doc", b"x")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, upload_request("evil.doc\\payload.exe", b"x")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let staging = tempfile::tempdir().unwrap();
    let bin = tempfile::tempdir().unwrap();
    let app = setup(staging.path(), bin.path(), 1024);

    let (status, body) = send(&app, upload_request("big.doc", &vec![b'a'; 8 * 1024])).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE, "{}", body);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["error"], "payload_too_large");
    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_malformed_multipart_is_bad_request() {
    let staging = tempfile::tempdir().unwrap();
    let bin = tempfile::tempdir().unwrap();
    let app = setup(staging.path(), bin.path(), 1024 * 1024);

    let request = Request::builder()
        .method("POST")
        .uri("/convert-doc/")
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=abc")
        .body(Body::from("this is not multipart"))
        .unwrap();
    let (status, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
}

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use filedrop::{
    config::Config,
    create_app,
    records::init_records,
    state::AppState,
    storage::init_storage,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "----filedropboundary7MA4YWxkTrZu0gW";

async fn setup() -> (Router, TempDir) {
    setup_with(|_| {}).await
}

async fn setup_with(adjust: impl FnOnce(&mut Config)) -> (Router, TempDir) {
    let dir = TempDir::new().unwrap();
    let mut config = Config::local(dir.path());
    adjust(&mut config);
    let records = init_records(&config, None).await.unwrap();
    let storage = init_storage(&config).await.unwrap();

    let state = AppState { records, storage, config };
    (create_app(state), dir)
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

fn multipart(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
                );
            }
            Part::File(filename, mime, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
                         Content-Type: {mime}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn upload(app: &Router, parts: &[Part<'_>]) -> (StatusCode, Value) {
    upload_raw(app, multipart(parts)).await
}

async fn upload_raw(app: &Router, body: Vec<u8>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/upload")
        .header("Content-Type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn post(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::builder().method("POST").uri(uri).body(Body::empty()).unwrap()).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_upload_then_fetch_and_download() {
    let (app, _dir) = setup().await;

    let (status, json) = upload(
        &app,
        &[
            Part::Text("uploaderName", "  Ann  "),
            Part::Text("secretCode", "OpenSesame"),
            Part::File("notes.txt", "text/plain", b"hello world"),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(json["folder"].is_null());
    let file = &json["files"][0];
    let id = file["id"].as_str().unwrap().to_string();
    assert!(id.starts_with("file_"));
    assert_eq!(file["uploaderName"], "Ann");
    assert_eq!(file["size"], 11);
    assert_eq!(file["downloadCount"], 0);
    assert_eq!(file["shareUrl"], format!("/file/{id}"));

    let (status, json) = get(&app, &format!("/files/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["originalName"], "notes.txt");

    for expected in 1..=3 {
        let (status, json) = post(&app, &format!("/files/{id}/download")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["downloadCount"], expected);
    }

    let (_, json) = get(&app, &format!("/files/{id}")).await;
    assert_eq!(json["downloadCount"], 3);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/blobs/files/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/plain");
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"hello world");
}

#[tokio::test]
async fn test_missing_uploader_name_is_rejected() {
    let (app, dir) = setup().await;

    let (status, json) = upload(&app, &[Part::File("a.txt", "text/plain", b"abc")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Please enter your name");

    // Nothing reached the blob store
    let mut blobs = tokio::fs::read_dir(dir.path().join("uploads/files")).await.unwrap();
    assert!(blobs.next_entry().await.unwrap().is_none());
}

#[tokio::test]
async fn test_upload_without_file_is_rejected() {
    let (app, _dir) = setup().await;
    let (status, _) = upload(&app, &[Part::Text("uploaderName", "Ann")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_file_is_not_found() {
    let (app, _dir) = setup().await;

    let (status, json) = get(&app, "/files/file_0_missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "File not found");

    let (status, _) = post(&app, "/files/file_0_missing/download").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_multiple_files_are_grouped_into_a_folder() {
    let (app, _dir) = setup().await;

    let (status, json) = upload(
        &app,
        &[
            Part::Text("uploaderName", "Ann"),
            Part::Text("folderName", "Holiday"),
            Part::File("one.jpg", "image/jpeg", b"first"),
            Part::File("two.jpg", "image/jpeg", b"second"),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let folder_id = json["folder"]["id"].as_str().unwrap().to_string();
    assert_eq!(json["folder"]["name"], "Holiday");
    assert_eq!(json["files"][0]["folderId"], folder_id.as_str());
    assert_eq!(json["files"][1]["folderId"], folder_id.as_str());

    let (status, json) = get(&app, &format!("/folders/{folder_id}")).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = json["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["originalName"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["one.jpg", "two.jpg"]);

    let (status, json) = get(&app, "/folders/folder_0_missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Folder not found");
}

#[tokio::test]
async fn test_search_by_secret_code() {
    let (app, _dir) = setup().await;
    upload(
        &app,
        &[
            Part::Text("uploaderName", "Ann"),
            Part::Text("secretCode", "blue-parrot"),
            Part::File("a.txt", "text/plain", b"a"),
        ],
    )
    .await;

    let (status, json) = get(&app, "/search/secret?code=blue-parrot").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["originalName"], "a.txt");

    let (status, json) = get(&app, "/search/secret?code=Blue-Parrot").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "No file found with this secret code");

    let (status, _) = get(&app, "/search/secret?code=").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_local_uploader_search_ignores_case() {
    let (app, _dir) = setup().await;
    upload(
        &app,
        &[Part::Text("uploaderName", "Ann"), Part::File("a.txt", "text/plain", b"a")],
    )
    .await;
    upload(
        &app,
        &[Part::Text("uploaderName", "Bob"), Part::File("b.txt", "text/plain", b"b")],
    )
    .await;

    let (status, json) = get(&app, "/search/uploader?name=ANN").await;
    assert_eq!(status, StatusCode::OK);
    let files = json.as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["originalName"], "a.txt");
}

#[tokio::test]
async fn test_health() {
    let (app, _dir) = setup().await;
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_several_full_size_files_fit_the_body_limit() {
    let (app, _dir) = setup_with(|c| {
        c.max_file_size = 100_000;
        c.max_files_per_upload = 2;
    })
    .await;
    let data = vec![b'x'; 90_000];

    let (status, json) = upload(
        &app,
        &[
            Part::Text("uploaderName", "Ann"),
            Part::File("one.bin", "application/octet-stream", &data),
            Part::File("two.bin", "application/octet-stream", &data),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["files"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_oversized_request_is_payload_too_large() {
    let (app, _dir) = setup_with(|c| {
        c.max_file_size = 100_000;
        c.max_files_per_upload = 2;
    })
    .await;
    let data = vec![b'x'; 95_000];

    let (status, _) = upload(
        &app,
        &[
            Part::Text("uploaderName", "Ann"),
            Part::File("one.bin", "application/octet-stream", &data),
            Part::File("two.bin", "application/octet-stream", &data),
            Part::File("three.bin", "application/octet-stream", &data),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_storage_failure_creates_no_record() {
    let (app, dir) = setup().await;

    // A plain file where the blob directory should be makes every write fail
    let blobs = dir.path().join("uploads/files");
    tokio::fs::remove_dir_all(&blobs).await.unwrap();
    tokio::fs::write(&blobs, b"").await.unwrap();

    let (status, json) = upload(
        &app,
        &[
            Part::Text("uploaderName", "Ann"),
            Part::File("one.txt", "text/plain", b"first"),
            Part::File("two.txt", "text/plain", b"second"),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"], "Failed to upload file");

    let data = dir.path().join("data");
    assert!(!data.join("files.json").exists());
    assert!(!data.join("folders.json").exists());
}

#[tokio::test]
async fn test_truncated_text_field_reports_multipart_error() {
    let (app, _dir) = setup().await;
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"uploaderName\"\r\n\r\nAnn"
    );

    let (status, json) = upload_raw(&app, body.into_bytes()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_ne!(json["error"], "Please enter your name");
}

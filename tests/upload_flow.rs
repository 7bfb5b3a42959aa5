//! End-to-end upload runs against an in-process mock Bot API

use axum::{
    extract::{Multipart, Path, State},
    routing::{get, post},
    Form, Json, Router,
};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tg_batch_uploader::config::{BatchSettings, RetrySettings};
use tg_batch_uploader::{App, Settings, SourceTarget};

#[derive(Debug, Clone)]
struct Call {
    token: String,
    method: &'static str,
    text: Option<String>,
    media: Option<Value>,
    file_fields: Vec<String>,
}

#[derive(Default)]
struct MockState {
    /// Tokens rejected by getMe
    dead_tokens: HashSet<String>,
    /// Tokens that pass getMe but have every send rejected
    muted_tokens: HashSet<String>,
    calls: Vec<Call>,
}

type Shared = Arc<Mutex<MockState>>;

fn token_of(segment: &str) -> String {
    segment.trim_start_matches("bot").to_string()
}

fn ok_response() -> Json<Value> {
    Json(json!({ "ok": true, "result": {} }))
}

fn rejected() -> Json<Value> {
    Json(json!({ "ok": false, "error_code": 403, "description": "Forbidden: bot was kicked" }))
}

async fn get_me(State(state): State<Shared>, Path(segment): Path<String>) -> Json<Value> {
    let token = token_of(&segment);
    let mut state = state.lock().unwrap();
    state.calls.push(Call {
        token: token.clone(),
        method: "getMe",
        text: None,
        media: None,
        file_fields: Vec::new(),
    });
    if state.dead_tokens.contains(&token) {
        Json(json!({ "ok": false, "error_code": 401, "description": "Unauthorized" }))
    } else {
        Json(json!({ "ok": true, "result": { "id": 1, "is_bot": true } }))
    }
}

async fn send_message(
    State(state): State<Shared>,
    Path(segment): Path<String>,
    Form(form): Form<HashMap<String, String>>,
) -> Json<Value> {
    let token = token_of(&segment);
    let mut state = state.lock().unwrap();
    state.calls.push(Call {
        token: token.clone(),
        method: "sendMessage",
        text: form.get("text").cloned(),
        media: None,
        file_fields: Vec::new(),
    });
    if state.muted_tokens.contains(&token) {
        rejected()
    } else {
        ok_response()
    }
}

async fn send_media_group(
    State(state): State<Shared>,
    Path(segment): Path<String>,
    mut multipart: Multipart,
) -> Json<Value> {
    let token = token_of(&segment);
    let mut media = None;
    let mut file_fields = Vec::new();

    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        if name == "media" {
            let text = field.text().await.unwrap();
            media = Some(serde_json::from_str(&text).unwrap());
        } else if name.starts_with("file") {
            field.bytes().await.unwrap();
            file_fields.push(name);
        }
    }

    let mut state = state.lock().unwrap();
    state.calls.push(Call {
        token: token.clone(),
        method: "sendMediaGroup",
        text: None,
        media,
        file_fields,
    });
    if state.muted_tokens.contains(&token) {
        rejected()
    } else {
        ok_response()
    }
}

async fn spawn_mock(state: MockState) -> (String, Shared) {
    let shared: Shared = Arc::new(Mutex::new(state));
    let router = Router::new()
        .route("/:bot/getMe", get(get_me))
        .route("/:bot/sendMessage", post(send_message))
        .route("/:bot/sendMediaGroup", post(send_media_group))
        .with_state(Arc::clone(&shared));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://{}", addr), shared)
}

fn image_dir(count: usize) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for i in 1..=count {
        std::fs::write(dir.path().join(format!("img{:02}.jpg", i)), [0xFF, 0xD8, i as u8]).unwrap();
    }
    std::fs::write(dir.path().join("notes.txt"), b"not an image").unwrap();
    dir
}

fn settings(api_url: &str, tokens: &[&str]) -> Settings {
    Settings {
        api_urls: vec![api_url.to_string()],
        tokens: tokens.iter().map(|t| t.to_string()).collect(),
        chat_id: "@uploads".to_string(),
        batch: BatchSettings {
            group_size: 4,
            cooldown_seconds: 0,
            ..BatchSettings::default()
        },
        retry: RetrySettings {
            max_retries: 3,
            delay_seconds: 0,
            rate_limit_cooldown_seconds: 0,
        },
        ..Settings::default()
    }
}

fn calls(shared: &Shared, method: &str) -> Vec<Call> {
    shared
        .lock()
        .unwrap()
        .calls
        .iter()
        .filter(|c| c.method == method)
        .cloned()
        .collect()
}

fn directory(dir: &TempDir) -> SourceTarget {
    SourceTarget::Directory(PathBuf::from(dir.path()))
}

#[tokio::test]
async fn test_directory_upload_sends_groups_in_order() {
    let (url, shared) = spawn_mock(MockState::default()).await;
    let dir = image_dir(9);

    let app = App::new(settings(&url, &["111:aaa"])).await.unwrap();
    let reports = app.run_until_complete(&[directory(&dir)]).await.unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].total_items, 9);
    assert_eq!(reports[0].items_sent, 9);
    assert_eq!(reports[0].batches_sent, 3);

    let groups = calls(&shared, "sendMediaGroup");
    let sizes: Vec<usize> = groups.iter().map(|c| c.file_fields.len()).collect();
    assert_eq!(sizes, vec![4, 4, 1]);
    assert_eq!(groups[0].file_fields, vec!["file0", "file1", "file2", "file3"]);
    assert_eq!(
        groups[0].media,
        Some(json!([
            { "type": "photo", "media": "attach://file0" },
            { "type": "photo", "media": "attach://file1" },
            { "type": "photo", "media": "attach://file2" },
            { "type": "photo", "media": "attach://file3" },
        ]))
    );

    let texts: Vec<String> = calls(&shared, "sendMessage")
        .into_iter()
        .filter_map(|c| c.text)
        .collect();
    assert_eq!(texts.len(), 2);
    assert!(texts[0].starts_with("Starting upload"));
    assert!(texts[0].contains("9 images total"));
    assert!(texts[1].starts_with("Finished upload"));
    assert!(texts[1].contains("9 images in 3 batches"));
}

#[tokio::test]
async fn test_window_limits_uploaded_batches() {
    let (url, shared) = spawn_mock(MockState::default()).await;
    let dir = image_dir(9);

    let mut settings = settings(&url, &["111:aaa"]);
    settings.batch.start_index = 1;
    settings.batch.end_index = 1;

    let app = App::new(settings).await.unwrap();
    let reports = app.run_until_complete(&[directory(&dir)]).await.unwrap();

    // Window covers item indices 4..=4
    assert_eq!(reports[0].window_items, 1);
    assert_eq!(calls(&shared, "sendMediaGroup").len(), 1);
}

#[tokio::test]
async fn test_dead_token_is_dropped_at_startup() {
    let mut state = MockState::default();
    state.dead_tokens.insert("222:bad".to_string());
    let (url, shared) = spawn_mock(state).await;
    let dir = image_dir(4);

    let app = App::new(settings(&url, &["111:aaa", "222:bad"]))
        .await
        .unwrap();
    assert_eq!(app.state().credentials.len(), 1);
    assert!(!app.state().credentials.contains("222:bad"));

    app.run_until_complete(&[directory(&dir)]).await.unwrap();

    let used_bad = shared
        .lock()
        .unwrap()
        .calls
        .iter()
        .any(|c| c.token == "222:bad" && c.method != "getMe");
    assert!(!used_bad);
}

#[tokio::test]
async fn test_startup_fails_when_every_token_is_dead() {
    let mut state = MockState::default();
    state.dead_tokens.insert("111:aaa".to_string());
    let (url, _shared) = spawn_mock(state).await;

    assert!(App::new(settings(&url, &["111:aaa"])).await.is_err());
}

#[tokio::test]
async fn test_failing_token_is_removed_and_run_continues() {
    let mut state = MockState::default();
    state.muted_tokens.insert("222:muted".to_string());
    let (url, shared) = spawn_mock(state).await;
    let dir = image_dir(9);

    let app = App::new(settings(&url, &["111:aaa", "222:muted"]))
        .await
        .unwrap();
    let reports = app.run_until_complete(&[directory(&dir)]).await.unwrap();

    assert_eq!(reports[0].batches_sent, 3);
    assert!(!app.state().credentials.contains("222:muted"));
    assert_eq!(app.state().credentials.len(), 1);

    let muted_sends = shared
        .lock()
        .unwrap()
        .calls
        .iter()
        .filter(|c| c.token == "222:muted" && c.method != "getMe")
        .count();
    assert_eq!(muted_sends, 1);
}

#[tokio::test]
async fn test_run_fails_once_every_token_is_removed() {
    let mut state = MockState::default();
    state.muted_tokens.insert("111:aaa".to_string());
    let (url, shared) = spawn_mock(state).await;
    let dir = image_dir(4);

    let app = App::new(settings(&url, &["111:aaa"])).await.unwrap();
    let results = app.run(&[directory(&dir)]).await;

    let err = results.into_iter().next().unwrap().unwrap_err();
    assert!(err.is_pool_exhausted());
    assert!(app.state().credentials.is_empty());
    assert!(calls(&shared, "sendMediaGroup").is_empty());
}

#[tokio::test]
async fn test_archive_and_directory_run_together() {
    let (url, shared) = spawn_mock(MockState::default()).await;
    let dir = image_dir(3);

    let archive_dir = tempfile::tempdir().unwrap();
    let archive_path = archive_dir.path().join("photos.zip");
    {
        let file = std::fs::File::create(&archive_path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default();
        for name in ["a.png", "b.png", "readme.md"] {
            zip.start_file(name, options).unwrap();
            std::io::Write::write_all(&mut zip, b"data").unwrap();
        }
        zip.finish().unwrap();
    }

    let app = App::new(settings(&url, &["111:aaa"])).await.unwrap();
    let reports = app
        .run_until_complete(&[SourceTarget::Archive(archive_path), directory(&dir)])
        .await
        .unwrap();

    assert_eq!(reports[0].items_sent, 2);
    assert_eq!(reports[1].items_sent, 3);
    assert_eq!(calls(&shared, "sendMediaGroup").len(), 2);
    assert_eq!(calls(&shared, "sendMessage").len(), 4);
}

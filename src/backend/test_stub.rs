// 测试用的本地后端桩（axum）

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// 上传该文件名时后端返回 `{"status":"error"}`
pub const REJECT_FILE_NAME: &str = "reject.mp4";
/// 上传该文件名时后端返回 500 + HTML
pub const MALFORMED_FILE_NAME: &str = "malformed.mp4";
/// 不存在的视频ID
pub const MISSING_ID: &str = "missing";
/// 下载接口返回的字节数
pub const DOWNLOAD_SIZE: usize = 300_000;

/// 后端收到的一个分片
#[derive(Debug, Clone, Default)]
pub struct ReceivedChunk {
    pub fields: HashMap<String, String>,
    pub chunk_file_name: Option<String>,
    pub chunk_len: usize,
    pub csrf_header: Option<String>,
    pub cookie: Option<String>,
}

impl ReceivedChunk {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

#[derive(Clone, Default)]
struct StubState {
    base_url: Arc<Mutex<String>>,
    received: Arc<Mutex<Vec<ReceivedChunk>>>,
    deleted: Arc<Mutex<Vec<String>>>,
}

/// 运行中的后端桩
pub struct StubBackend {
    pub base_url: String,
    state: StubState,
}

impl StubBackend {
    pub fn received(&self) -> Vec<ReceivedChunk> {
        self.state.received.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.deleted.lock().unwrap().clone()
    }
}

/// 下载接口返回的内容
pub fn download_body() -> Vec<u8> {
    (0..DOWNLOAD_SIZE).map(|i| (i % 251) as u8).collect()
}

/// 在随机端口启动后端桩
pub async fn spawn() -> StubBackend {
    let state = StubState::default();

    let app = Router::new()
        .route("/api/upload-chunk/", post(upload_chunk))
        .route("/api/file-uploads/", get(file_uploads))
        .route("/api/recent-uploads/", get(recent_uploads))
        .route("/api/videos/:id/stream/", get(stream))
        .route("/api/videos/:id/download/", get(download))
        .route("/api/delete-video/:id/", get(delete_video))
        .route("/media/:file", get(media))
        .layer(DefaultBodyLimit::max(16 * 1024 * 1024))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    *state.base_url.lock().unwrap() = base_url.clone();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    StubBackend { base_url, state }
}

async fn upload_chunk(
    State(state): State<StubState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let mut received = ReceivedChunk {
        csrf_header: header_value(&headers, "x-csrftoken"),
        cookie: header_value(&headers, "cookie"),
        ..ReceivedChunk::default()
    };

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        if name == "chunk" {
            received.chunk_file_name = field.file_name().map(str::to_string);
            received.chunk_len = field.bytes().await.map(|b| b.len()).unwrap_or(0);
        } else {
            let value = field.text().await.unwrap_or_default();
            received.fields.insert(name, value);
        }
    }

    let file_name = received.field("fileName").unwrap_or_default().to_string();
    let file_id = received.field("fileId").unwrap_or_default().to_string();
    let index: usize = received
        .field("chunkIndex")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let total: usize = received
        .field("totalChunks")
        .and_then(|v| v.parse().ok())
        .unwrap_or(1);
    state.received.lock().unwrap().push(received);

    if file_name == REJECT_FILE_NAME {
        return Json(json!({ "status": "error" })).into_response();
    }
    if file_name == MALFORMED_FILE_NAME {
        return (StatusCode::INTERNAL_SERVER_ERROR, "<html>Server Error</html>").into_response();
    }

    let progress = ((index + 1) * 100 / total.max(1)) as f64;
    if index + 1 == total {
        let base_url = state.base_url.lock().unwrap().clone();
        Json(json!({
            "status": "success",
            "progress": progress,
            "file_url": format!("{}/media/{}.mp4", base_url, file_id),
            "unique_id": file_id,
        }))
        .into_response()
    } else {
        Json(json!({ "status": "success", "progress": progress })).into_response()
    }
}

async fn file_uploads() -> Response {
    Json(json!([
        {"file_id": "a1", "file_name": "first.mp4", "status": "Completed", "file_size": 5242880},
        {"file_id": "b2", "file_name": "second.mp4", "status": "Pending", "file_size": 1048576},
        {"file_id": "c3", "file_name": "third.mp4", "status": "Completed", "file_size": 2097152}
    ]))
    .into_response()
}

async fn recent_uploads() -> Response {
    Json(json!([
        {"id": 5, "file_id": "a1", "file_name": "first.mp4", "status": "Completed",
         "file_size": 524288, "uploadDate": "2024-04-29T08:00:00Z"},
        {"id": 6, "file_id": "b2", "file_name": "second.mp4", "status": "Pending",
         "file_size": 1048576, "uploadDate": "2024-04-30T09:00:00Z"},
        {"id": 7, "file_id": "c3", "file_name": "third.mp4", "status": "Completed",
         "file_size": 2097152, "uploadDate": "2024-05-01T10:00:00Z"}
    ]))
    .into_response()
}

async fn stream(Path(id): Path<String>) -> Response {
    if id == MISSING_ID {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    }
    Redirect::temporary(&format!("/media/{}.mp4", id)).into_response()
}

async fn download(Path(id): Path<String>) -> Response {
    if id == MISSING_ID {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    }
    download_body().into_response()
}

async fn delete_video(State(state): State<StubState>, Path(id): Path<String>) -> Response {
    if id == MISSING_ID {
        return (StatusCode::INTERNAL_SERVER_ERROR, "delete failed").into_response();
    }
    state.deleted.lock().unwrap().push(id);
    Json(json!({ "status": "success" })).into_response()
}

async fn media(Path(file): Path<String>) -> Response {
    format!("media:{}", file).into_response()
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

// HTTP API for submitting downloads and polling their progress
// Also serves settings, the download history and "open in file browser" actions

use std::path::{Path as FsPath, PathBuf};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::downloader::{utils, Downloader, Job, OutputMode};
use crate::history;
use crate::settings::{SettingsError, SettingsUpdate};

/// API error type
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<SettingsError> for ApiError {
    fn from(e: SettingsError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

#[derive(Clone)]
pub struct AppState {
    pub downloader: Downloader,
}

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    pub url: Option<String>,
    pub format: Option<String>,
    pub quality: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InfoRequest {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OpenFileRequest {
    pub path: Option<String>,
}

fn required(value: Option<&str>, message: &str) -> Result<String, ApiError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ApiError::BadRequest(message.to_string())),
    }
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let ytdlp = state.downloader.external_available().await;
    Json(json!({ "status": "ok", "privacy": "no-tracking", "ytdlp": ytdlp }))
}

/// POST /api/download - Start a background download
pub async fn start_download(
    State(state): State<AppState>,
    Json(req): Json<DownloadRequest>,
) -> Result<Json<Value>, ApiError> {
    let url = required(req.url.as_deref(), "URL is required")?;

    // Missing fields fall back to the saved preferences
    let defaults = state.downloader.settings().load().await;
    let format = req.format.unwrap_or(defaults.default_format);
    let quality = req.quality.unwrap_or(defaults.default_quality);
    let mode = OutputMode::from_request(Some(&format), Some(&quality));

    let id = state
        .downloader
        .submit(&url, mode)
        .await
        .map_err(|e| ApiError::BadRequest(e.message()))?;

    Ok(Json(json!({
        "success": true,
        "message": "Download started",
        "downloadId": id,
    })))
}

/// GET /api/download/:id/progress
pub async fn download_progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    state
        .downloader
        .status(&id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Download not found".to_string()))
}

/// POST /api/info - Metadata without downloading
pub async fn media_info(
    State(state): State<AppState>,
    Json(req): Json<InfoRequest>,
) -> Result<Json<Value>, ApiError> {
    let url = required(req.url.as_deref(), "URL is required")?;

    let info = state.downloader.info(&url).await.map_err(|e| {
        tracing::error!("[api] info error for {}: {}", url, e);
        ApiError::Internal(format!("Failed to get info: {}", e.message()))
    })?;

    Ok(Json(json!({ "success": true, "info": info })))
}

/// GET /api/downloads
pub async fn list_downloads(State(state): State<AppState>) -> Json<Value> {
    let dir = state.downloader.settings().download_dir().await;
    let downloads = history::list_downloads(&dir).await;
    Json(json!({ "success": true, "downloads": downloads }))
}

/// GET /api/settings
pub async fn get_settings(State(state): State<AppState>) -> Json<Value> {
    let settings = state.downloader.settings().load().await;
    Json(json!({ "success": true, "settings": settings }))
}

/// POST /api/settings - Partial update
pub async fn update_settings(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<Value>, ApiError> {
    let settings = state.downloader.settings().save(update).await?;
    Ok(Json(json!({ "success": true, "settings": settings })))
}

/// POST /api/open-folder
pub async fn open_folder(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let dir = state.downloader.settings().download_dir().await;
    let dir = utils::ensure_dir(&dir)
        .await
        .map_err(|e| ApiError::Internal(e.message()))?;

    open_with_system(dir).await?;
    Ok(Json(json!({ "success": true })))
}

/// POST /api/open-file
pub async fn open_file(Json(req): Json<OpenFileRequest>) -> Result<Json<Value>, ApiError> {
    let path = PathBuf::from(required(req.path.as_deref(), "File path is required")?);
    if !path.exists() {
        return Err(ApiError::NotFound(format!("File not found: {}", path.display())));
    }

    open_with_system(path).await?;
    Ok(Json(json!({ "success": true })))
}

async fn open_with_system(path: PathBuf) -> Result<(), ApiError> {
    tracing::info!("[api] opening {}", path.display());
    tokio::task::spawn_blocking(move || open::that(&path))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// All routes, plus the UI directory when one is configured
pub fn router(state: AppState, static_dir: Option<&FsPath>) -> Router {
    let app = Router::new()
        .route("/api/health", get(health))
        .route("/api/download", post(start_download))
        .route("/api/download/:id/progress", get(download_progress))
        .route("/api/info", post(media_info))
        .route("/api/downloads", get(list_downloads))
        .route("/api/settings", get(get_settings).post(update_settings))
        .route("/api/open-folder", post(open_folder))
        .route("/api/open-file", post(open_file))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    match static_dir {
        Some(dir) => app.fallback_service(ServeDir::new(dir)),
        None => app,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::downloader::backends::{PlayerClient, YouTubeStreamBackend, YtDlpBackend};
    use crate::downloader::{JobTable, ToolManager};
    use crate::settings::SettingsStore;

    struct TestApp {
        state: AppState,
        dir: tempfile::TempDir,
    }

    impl TestApp {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let settings = SettingsStore::new(
                dir.path().join("settings.json"),
                &dir.path().join("downloads"),
            );
            let tools = ToolManager::new("missing-yt-dlp-for-tests", "missing-python-for-tests");
            let player = PlayerClient::new("http://127.0.0.1:9").unwrap();
            let downloader = Downloader::new(
                Arc::new(YtDlpBackend::new(tools)),
                Arc::new(YouTubeStreamBackend::new(player)),
                JobTable::new(Duration::from_secs(60)),
                settings,
            );
            Self {
                state: AppState { downloader },
                dir,
            }
        }

        async fn call(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
            let request = Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json");
            let request = match body {
                Some(body) => request.body(Body::from(body.to_string())).unwrap(),
                None => request.body(Body::empty()).unwrap(),
            };

            let response = router(self.state.clone(), None)
                .oneshot(request)
                .await
                .unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, json)
        }
    }

    #[tokio::test]
    async fn health_reports_privacy() {
        let app = TestApp::new();
        let (status, body) = app.call("GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["privacy"], "no-tracking");
        assert_eq!(body["ytdlp"], false);
    }

    #[tokio::test]
    async fn download_requires_url() {
        let app = TestApp::new();
        let (status, body) = app.call("POST", "/api/download", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "URL is required");

        let (status, _) = app
            .call("POST", "/api/download", Some(json!({ "url": "file:///etc/passwd" })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn accepted_download_can_be_polled() {
        let app = TestApp::new();
        let (status, body) = app
            .call(
                "POST",
                "/api/download",
                Some(json!({ "url": "https://vimeo.com/12345", "format": "best" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Download started");

        let id = body["downloadId"].as_str().unwrap().to_string();
        let uri = format!("/api/download/{}/progress", id);

        let mut last = Value::Null;
        for _ in 0..200 {
            let (status, job) = app.call("GET", &uri, None).await;
            assert_eq!(status, StatusCode::OK);
            if job["status"] != "downloading" {
                last = job;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(last["status"], "error");
        assert!(last["error"].as_str().unwrap().contains("yt-dlp not found"));
    }

    #[tokio::test]
    async fn unknown_progress_is_404() {
        let app = TestApp::new();
        let (status, body) = app.call("GET", "/api/download/nope/progress", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Download not found");
    }

    #[tokio::test]
    async fn info_failure_is_prefixed() {
        let app = TestApp::new();
        let (status, body) = app
            .call("POST", "/api/info", Some(json!({ "url": "https://vimeo.com/1" })))
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Failed to get info: yt-dlp not found"));

        let (status, _) = app.call("POST", "/api/info", Some(json!({ "url": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn settings_round_trip() {
        let app = TestApp::new();
        let (status, body) = app
            .call("POST", "/api/settings", Some(json!({ "defaultFormat": "audio" })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["settings"]["defaultFormat"], "audio");

        let (_, body) = app.call("GET", "/api/settings", None).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["settings"]["defaultFormat"], "audio");
        assert_eq!(body["settings"]["autoOpenFolder"], false);
    }

    #[tokio::test]
    async fn downloads_lists_media_files() {
        let app = TestApp::new();
        let downloads = app.dir.path().join("downloads");
        std::fs::create_dir_all(&downloads).unwrap();
        std::fs::write(downloads.join("clip.mp4"), b"data").unwrap();
        std::fs::write(downloads.join("readme.txt"), b"skip").unwrap();

        let (status, body) = app.call("GET", "/api/downloads", None).await;
        assert_eq!(status, StatusCode::OK);
        let list = body["downloads"].as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["name"], "clip.mp4");
        assert_eq!(list[0]["sizeFormatted"], "4 B");
    }

    #[tokio::test]
    async fn open_file_requires_path() {
        let app = TestApp::new();
        let (status, body) = app.call("POST", "/api/open-file", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "File path is required");

        let missing = app.dir.path().join("gone.mp4");
        let (status, _) = app
            .call(
                "POST",
                "/api/open-file",
                Some(json!({ "path": missing.to_string_lossy() })),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

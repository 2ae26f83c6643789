// In-process YouTube backend - player endpoint + direct byte streaming
//
// Talks to the innertube player endpoint with the Android client, which hands
// out direct (unciphered) stream URLs. Formats that only come with a
// signature cipher are skipped.

use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use regex::Regex;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;

use crate::downloader::errors::DownloadError;
use crate::downloader::format_selector::{FormatSelector, StreamFormat};
use crate::downloader::models::{DownloadResult, MediaFormat, MediaInfo, OutputMode};
use crate::downloader::traits::{MediaBackend, ProgressReporter};
use crate::downloader::utils;

pub const DEFAULT_API_BASE: &str = "https://www.youtube.com";

const ANDROID_CLIENT_VERSION: &str = "19.09.37";
const ANDROID_USER_AGENT: &str = "com.google.android.youtube/19.09.37 (Linux; U; Android 11) gzip";

lazy_static::lazy_static! {
    static ref WATCH_RE: Regex = Regex::new(
        r"^https?://(?:www\.|m\.|music\.|gaming\.)?youtube\.com/(?:watch\?(?:.*&)?v=|shorts/|embed/|v/|live/)([A-Za-z0-9_-]{11})(?:[?&#/].*)?$"
    ).unwrap();
    static ref SHORT_RE: Regex = Regex::new(
        r"^https?://youtu\.be/([A-Za-z0-9_-]{11})(?:[?&#/].*)?$"
    ).unwrap();
    static ref SHORT_LINK_RE: Regex = Regex::new(r"youtu\.be/([^?&#]+)").unwrap();
}

/// Video id of a YouTube URL, None if the URL is not one we accept
pub fn parse_video_id(url: &str) -> Option<String> {
    let url = url.trim();
    WATCH_RE
        .captures(url)
        .or_else(|| SHORT_RE.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn validate_url(url: &str) -> bool {
    parse_video_id(url).is_some()
}

/// `youtu.be/<id>` short links become `https://www.youtube.com/watch?v=<id>`
pub fn normalize_url(url: &str) -> String {
    if !url.contains("youtu.be/") {
        return url.to_string();
    }

    SHORT_LINK_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|id| format!("https://www.youtube.com/watch?v={}", id.as_str()))
        .unwrap_or_else(|| url.to_string())
}

/// Metadata and streams of one video
#[derive(Debug, Clone)]
pub struct VideoDetails {
    pub video_id: String,
    pub title: String,
    pub length_seconds: Option<u64>,
    pub view_count: Option<u64>,
    pub thumbnail: Option<String>,
    pub upload_date: Option<String>,
    pub formats: Vec<StreamFormat>,
}

/// HTTP client for the player endpoint and media hosts
#[derive(Clone)]
pub struct PlayerClient {
    http: reqwest::Client,
    api_base: String,
}

impl PlayerClient {
    pub fn new(api_base: impl Into<String>) -> Result<Self, DownloadError> {
        let http = reqwest::Client::builder()
            .user_agent(ANDROID_USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn video_details(&self, video_id: &str) -> Result<VideoDetails, DownloadError> {
        let body = json!({
            "context": {
                "client": {
                    "clientName": "ANDROID",
                    "clientVersion": ANDROID_CLIENT_VERSION,
                    "androidSdkVersion": 30,
                    "hl": "en",
                    "gl": "US"
                }
            },
            "videoId": video_id,
            "contentCheckOk": true,
            "racyCheckOk": true
        });

        let endpoint = format!("{}/youtubei/v1/player?prettyPrint=false", self.api_base);
        tracing::debug!("[youtube] player request for {}", video_id);

        let response = self
            .http
            .post(&endpoint)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let player: Value = response.json().await?;

        parse_player_response(video_id, &player)
    }

    /// Open a byte stream for one format
    pub async fn open_stream(&self, format: &StreamFormat) -> Result<reqwest::Response, DownloadError> {
        let response = self.http.get(&format.url).send().await?.error_for_status()?;
        Ok(response)
    }
}

fn parse_player_response(video_id: &str, player: &Value) -> Result<VideoDetails, DownloadError> {
    let status = player["playabilityStatus"]["status"].as_str().unwrap_or("UNKNOWN");
    if status != "OK" {
        let reason = player["playabilityStatus"]["reason"]
            .as_str()
            .unwrap_or("Video unavailable");
        return Err(DownloadError::Network(format!("{} ({})", reason, status)));
    }

    let details = &player["videoDetails"];
    let as_number = |v: &Value| {
        v.as_str()
            .and_then(|s| s.parse::<u64>().ok())
            .or_else(|| v.as_u64())
    };

    let streaming = &player["streamingData"];
    let formats = ["formats", "adaptiveFormats"]
        .iter()
        .filter_map(|key| streaming[*key].as_array())
        .flatten()
        .filter_map(parse_stream_format)
        .collect();

    let upload_date = player["microformat"]["playerMicroformatRenderer"]["uploadDate"]
        .as_str()
        .map(|d| d.split('T').next().unwrap_or(d).to_string());

    Ok(VideoDetails {
        video_id: video_id.to_string(),
        title: details["title"].as_str().unwrap_or("Unknown").to_string(),
        length_seconds: as_number(&details["lengthSeconds"]),
        view_count: as_number(&details["viewCount"]),
        thumbnail: details["thumbnail"]["thumbnails"][0]["url"]
            .as_str()
            .map(str::to_string),
        upload_date,
        formats,
    })
}

fn parse_stream_format(f: &Value) -> Option<StreamFormat> {
    // cipher-only formats are not streamable without a signature decipherer
    let url = f["url"].as_str()?.to_string();
    let mime_type = f["mimeType"].as_str().unwrap_or("").to_string();

    let has_video = mime_type.starts_with("video/");
    let has_audio = mime_type.starts_with("audio/") || f.get("audioQuality").is_some();

    Some(StreamFormat {
        itag: f["itag"].as_u64().unwrap_or(0),
        url,
        mime_type,
        bitrate: f["bitrate"].as_u64().unwrap_or(0),
        quality_label: f["qualityLabel"].as_str().map(str::to_string),
        content_length: f["contentLength"]
            .as_str()
            .and_then(|s| s.parse().ok()),
        has_video,
        has_audio,
    })
}

/// In-process streaming backend for YouTube
pub struct YouTubeStreamBackend {
    client: PlayerClient,
}

impl YouTubeStreamBackend {
    pub fn new(client: PlayerClient) -> Self {
        Self { client }
    }

    async fn details_for(&self, url: &str) -> Result<VideoDetails, DownloadError> {
        let video_id =
            parse_video_id(url).ok_or_else(|| DownloadError::InvalidUrl("Invalid YouTube URL".to_string()))?;
        self.client.video_details(&video_id).await
    }

    fn info_from(details: &VideoDetails) -> MediaInfo {
        let formats = details
            .formats
            .iter()
            .map(|f| MediaFormat {
                quality: f
                    .quality_label
                    .clone()
                    .or_else(|| (f.bitrate > 0).then(|| format!("{}kbps", f.bitrate / 1000))),
                container: f.container(),
                has_video: f.has_video,
                has_audio: f.has_audio,
            })
            .collect();

        let labels = details
            .formats
            .iter()
            .filter(|f| f.has_video)
            .filter_map(|f| f.quality_label.clone());

        MediaInfo {
            title: details.title.clone(),
            duration: details.length_seconds,
            thumbnail: details.thumbnail.clone(),
            view_count: details.view_count,
            upload_date: details.upload_date.clone(),
            formats,
            available_qualities: FormatSelector::available_qualities(labels),
        }
    }

    /// Pipe the stream into `path`, reporting bytes after each chunk
    async fn stream_to_file(
        &self,
        format: &StreamFormat,
        path: &Path,
        progress: &ProgressReporter,
    ) -> Result<u64, DownloadError> {
        let response = self.client.open_stream(format).await?;
        let total = response.content_length().or(format.content_length);

        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| DownloadError::Io(format!("File write error: {}", e)))?;

        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| DownloadError::Network(format!("Download stream error: {}", e)))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::Io(format!("File write error: {}", e)))?;
            downloaded += chunk.len() as u64;
            progress.emit_bytes(downloaded, total).await;
        }

        file.flush()
            .await
            .map_err(|e| DownloadError::Io(format!("File write error: {}", e)))?;
        Ok(downloaded)
    }
}

#[async_trait]
impl MediaBackend for YouTubeStreamBackend {
    fn name(&self) -> &'static str {
        "youtube-stream"
    }

    fn supports(&self, url: &str) -> bool {
        validate_url(url)
    }

    fn normalize_url(&self, url: &str) -> String {
        normalize_url(url)
    }

    async fn fetch_info(&self, url: &str) -> Result<MediaInfo, DownloadError> {
        let details = self.details_for(url).await?;
        Ok(Self::info_from(&details))
    }

    async fn fetch_media(
        &self,
        url: &str,
        mode: &OutputMode,
        dest_dir: &Path,
        progress: &ProgressReporter,
    ) -> Result<DownloadResult, DownloadError> {
        let details = self.details_for(url).await?;
        let format = FormatSelector::choose_stream(&details.formats, mode).ok_or(DownloadError::NoSuitableFormat)?;

        let dest_dir = utils::ensure_dir(dest_dir).await?;
        let extension = if *mode == OutputMode::Audio { "m4a" } else { "mp4" };
        let filename = format!("{}.{}", utils::sanitize_filename(&details.title), extension);
        let path = dest_dir.join(&filename);

        tracing::info!(
            "[youtube] job {}: itag {} ({}) -> {}",
            progress.job_id(),
            format.itag,
            format.mime_type,
            path.display()
        );
        progress.emit(0, None, None).await;

        self.stream_to_file(format, &path, progress).await?;

        let size = tokio::fs::metadata(&path).await?.len();
        Ok(DownloadResult {
            filename,
            path: path.to_string_lossy().to_string(),
            size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::jobs::JobTable;
    use crate::downloader::models::Job;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VIDEO_ID: &str = "dQw4w9WgXcQ";

    #[test]
    fn validates_youtube_urls() {
        assert!(validate_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(validate_url("https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ"));
        assert!(validate_url("https://m.youtube.com/shorts/dQw4w9WgXcQ"));
        assert!(validate_url("https://youtu.be/dQw4w9WgXcQ?t=10"));
        assert!(!validate_url("https://www.youtube.com/watch?v=short"));
        assert!(!validate_url("https://www.youtube.com/channel/UC123"));
        assert!(!validate_url("https://vimeo.com/dQw4w9WgXcQ"));
    }

    #[test]
    fn normalizes_short_links() {
        assert_eq!(
            normalize_url("https://youtu.be/dQw4w9WgXcQ?si=abc"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(
            normalize_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }

    fn player_json(media_base: &str) -> Value {
        json!({
            "playabilityStatus": {"status": "OK"},
            "videoDetails": {
                "title": "Never: Gonna Give",
                "lengthSeconds": "212",
                "viewCount": "1000",
                "thumbnail": {"thumbnails": [{"url": "https://i.ytimg.com/vi/x/default.jpg"}]}
            },
            "microformat": {"playerMicroformatRenderer": {"uploadDate": "2009-10-24T23:57:33-07:00"}},
            "streamingData": {
                "formats": [
                    {"itag": 18, "url": format!("{}/media/18", media_base), "mimeType": "video/mp4; codecs=\"avc1.42001E, mp4a.40.2\"",
                     "bitrate": 500000, "qualityLabel": "360p", "audioQuality": "AUDIO_QUALITY_LOW", "contentLength": "10"}
                ],
                "adaptiveFormats": [
                    {"itag": 137, "url": format!("{}/media/137", media_base), "mimeType": "video/mp4; codecs=\"avc1.640028\"",
                     "bitrate": 4000000, "qualityLabel": "1080p", "contentLength": "40"},
                    {"itag": 136, "signatureCipher": "s=abc", "mimeType": "video/mp4; codecs=\"avc1.4d401f\"",
                     "bitrate": 2000000, "qualityLabel": "720p"},
                    {"itag": 140, "url": format!("{}/media/140", media_base), "mimeType": "audio/mp4; codecs=\"mp4a.40.2\"",
                     "bitrate": 130000, "audioQuality": "AUDIO_QUALITY_MEDIUM", "contentLength": "8"}
                ]
            }
        })
    }

    async fn backend_with_player(server: &MockServer) -> YouTubeStreamBackend {
        Mock::given(method("POST"))
            .and(path("/youtubei/v1/player"))
            .respond_with(ResponseTemplate::new(200).set_body_json(player_json(&server.uri())))
            .mount(server)
            .await;
        YouTubeStreamBackend::new(PlayerClient::new(server.uri()).unwrap())
    }

    #[tokio::test]
    async fn info_from_player_response() {
        let server = MockServer::start().await;
        let backend = backend_with_player(&server).await;

        let info = backend
            .fetch_info(&format!("https://youtu.be/{}", VIDEO_ID))
            .await
            .unwrap();
        assert_eq!(info.title, "Never: Gonna Give");
        assert_eq!(info.duration, Some(212));
        assert_eq!(info.view_count, Some(1000));
        assert_eq!(info.upload_date.as_deref(), Some("2009-10-24"));
        // the cipher-only 720p stream is skipped
        assert_eq!(info.available_qualities, vec!["1080p", "360p"]);
        assert_eq!(info.formats.len(), 3);
        assert_eq!(info.formats[2].quality.as_deref(), Some("130kbps"));
    }

    #[tokio::test]
    async fn streams_audio_to_file_with_progress() {
        let server = MockServer::start().await;
        let backend = backend_with_player(&server).await;
        Mock::given(method("GET"))
            .and(path("/media/140"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"AUDIODAT".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let table = JobTable::default();
        let job = Job::started("j1", "u", &OutputMode::Audio);
        table.insert(job.clone()).await;
        let reporter = ProgressReporter::new(table.clone(), job);

        let result = backend
            .fetch_media(
                &format!("https://www.youtube.com/watch?v={}", VIDEO_ID),
                &OutputMode::Audio,
                dir.path(),
                &reporter,
            )
            .await
            .unwrap();

        assert_eq!(result.filename, "Never_Gonna_Give.m4a");
        assert_eq!(result.size, 8);
        assert_eq!(std::fs::read(dir.path().join("Never_Gonna_Give.m4a")).unwrap(), b"AUDIODAT");

        let current = table.get("j1").await.unwrap();
        assert_eq!(current.progress, 100);
        assert_eq!(current.downloaded, Some(8));
        assert_eq!(current.total, Some(8));
    }

    #[tokio::test]
    async fn missing_quality_is_no_suitable_format() {
        let server = MockServer::start().await;
        let backend = backend_with_player(&server).await;
        let dir = tempfile::tempdir().unwrap();
        let table = JobTable::default();
        let reporter = ProgressReporter::new(table, Job::started("j", "u", &OutputMode::Best));

        let err = backend
            .fetch_media(
                &format!("https://www.youtube.com/watch?v={}", VIDEO_ID),
                &OutputMode::Quality("480p".to_string()),
                dir.path(),
                &reporter,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::NoSuitableFormat));
    }

    #[tokio::test]
    async fn unplayable_video_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/youtubei/v1/player"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "playabilityStatus": {"status": "ERROR", "reason": "Video unavailable"}
            })))
            .mount(&server)
            .await;
        let backend = YouTubeStreamBackend::new(PlayerClient::new(server.uri()).unwrap());

        let err = backend
            .fetch_info(&format!("https://www.youtube.com/watch?v={}", VIDEO_ID))
            .await
            .unwrap_err();
        assert!(err.message().contains("Video unavailable"));
    }

    #[tokio::test]
    async fn invalid_url_rejected_before_network() {
        let backend = YouTubeStreamBackend::new(PlayerClient::new("http://127.0.0.1:9").unwrap());
        let err = backend.fetch_info("https://www.youtube.com/feed").await.unwrap_err();
        assert!(matches!(err, DownloadError::InvalidUrl(_)));
        assert_eq!(err.message(), "Invalid YouTube URL");
    }
}

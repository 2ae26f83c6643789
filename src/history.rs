// Listing of finished downloads on disk

use std::path::Path;
use std::time::SystemTime;

use serde::Serialize;

use crate::downloader::utils::{format_file_size, format_timestamp};

const MEDIA_EXTENSIONS: &[&str] = &["mp4", "webm", "m4a", "mp3", "mkv", "avi", "mov"];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadedFile {
    pub name: String,
    pub size: u64,
    pub size_formatted: String,
    pub date: String,
    pub path: String,
    #[serde(skip)]
    modified: SystemTime,
}

fn is_media_file(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| MEDIA_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Media files in `dir`, newest first. Scan failures yield an empty list.
pub async fn list_downloads(dir: &Path) -> Vec<DownloadedFile> {
    match scan(dir).await {
        Ok(files) => files,
        Err(e) => {
            tracing::error!("[history] error listing {}: {}", dir.display(), e);
            Vec::new()
        }
    }
}

async fn scan(dir: &Path) -> std::io::Result<Vec<DownloadedFile>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if !is_media_file(&name) {
            continue;
        }
        let meta = entry.metadata().await?;
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        files.push(DownloadedFile {
            name,
            size: meta.len(),
            size_formatted: format_file_size(meta.len()),
            date: format_timestamp(modified),
            path: entry.path().to_string_lossy().to_string(),
            modified,
        });
    }

    files.sort_by(|a, b| b.modified.cmp(&a.modified));
    Ok(files)
}

// Helper functions for backend implementations

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::errors::DownloadError;

/// Create the destination directory if needed and return it
pub async fn ensure_dir(path: &Path) -> Result<PathBuf, DownloadError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| DownloadError::Io(format!("Cannot create {}: {}", path.display(), e)))?;
    Ok(path.to_path_buf())
}

/// Strip reserved filename characters, collapse whitespace to `_`, cap length
pub fn sanitize_filename(name: &str) -> String {
    lazy_static::lazy_static! {
        static ref RESERVED_RE: regex::Regex = regex::Regex::new(r#"[<>:"/\\|?*]"#).unwrap();
        static ref SPACE_RE: regex::Regex = regex::Regex::new(r"\s+").unwrap();
    }

    let stripped = RESERVED_RE.replace_all(name, "");
    let collapsed = SPACE_RE.replace_all(&stripped, "_");
    collapsed.chars().take(200).collect()
}

/// Human-readable size, base 1024 ("1.5 KB", "0 B")
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut exponent = 0;
    while value >= 1024.0 && exponent < UNITS.len() - 1 {
        value /= 1024.0;
        exponent += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;

    // trim trailing zeros the way a float-to-string conversion would
    let mut text = format!("{:.2}", rounded);
    while text.contains('.') && (text.ends_with('0') || text.ends_with('.')) {
        text.pop();
    }
    format!("{} {}", text, UNITS[exponent])
}

/// RFC 3339 rendering of a file timestamp
pub fn format_timestamp(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_default()
}

/// yt-dlp reports `YYYYMMDD`; render as `YYYY-MM-DD`, pass other shapes through
pub fn normalize_upload_date(raw: &str) -> String {
    let compact = time::format_description::parse("[year][month][day]");
    let iso = time::format_description::parse("[year]-[month]-[day]");

    match (compact, iso) {
        (Ok(compact), Ok(iso)) => time::Date::parse(raw, &compact)
            .ok()
            .and_then(|date| date.format(&iso).ok())
            .unwrap_or_else(|| raw.to_string()),
        _ => raw.to_string(),
    }
}

/// Regular file in `dir` with the most recent modification time
pub async fn newest_file_in(dir: &Path) -> Result<Option<(PathBuf, std::fs::Metadata)>, DownloadError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| DownloadError::Io(format!("Cannot read {}: {}", dir.display(), e)))?;

    let mut newest: Option<(PathBuf, std::fs::Metadata, SystemTime)> = None;
    while let Some(entry) = entries.next_entry().await? {
        let meta = match entry.metadata().await {
            Ok(m) if m.is_file() => m,
            _ => continue,
        };
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let is_newer = newest
            .as_ref()
            .map_or(true, |(_, _, best)| modified > *best);
        if is_newer {
            newest = Some((entry.path(), meta, modified));
        }
    }

    Ok(newest.map(|(path, meta, _)| (path, meta)))
}

/// Last path component of a path string reported by a tool
pub fn file_name_of(path: &str) -> String {
    path.rsplit(['/', '\\'])
        .next()
        .unwrap_or(path)
        .trim()
        .to_string()
}

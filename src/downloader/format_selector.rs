// FormatSelector - format selection rules for both backends
//
// - yt-dlp format expressions from the requested output mode
// - available quality labels (deduplicated, highest first)
// - stream choice for the in-process YouTube backend

use super::models::{parse_leading_number, OutputMode};

/// Quality at or above which the in-process backend just takes the best video
pub const HIGH_QUALITY_THRESHOLD: u32 = 1080;

/// Cap applied to the external extractor when no quality was asked for
pub const DEFAULT_MAX_HEIGHT: u32 = 1080;

/// One downloadable stream as reported by the YouTube player endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct StreamFormat {
    pub itag: u64,
    pub url: String,
    pub mime_type: String,
    pub bitrate: u64,
    pub quality_label: Option<String>,
    pub content_length: Option<u64>,
    pub has_video: bool,
    pub has_audio: bool,
}

impl StreamFormat {
    /// Container from the mime type ("video/mp4; codecs=..." -> "mp4")
    pub fn container(&self) -> Option<String> {
        self.mime_type
            .split(';')
            .next()
            .and_then(|essence| essence.split('/').nth(1))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn is_audio_only(&self) -> bool {
        self.has_audio && !self.has_video
    }
}

/// Format selector with declarative quality rules
pub struct FormatSelector;

impl FormatSelector {
    /// Get format spec for yt-dlp based on output mode
    pub fn get_format_spec(mode: &OutputMode) -> String {
        match mode {
            OutputMode::Audio => "bestaudio[ext=m4a]/bestaudio".to_string(),
            OutputMode::Quality(label) => {
                let height = label.trim().trim_end_matches('p');
                format!("best[height<={}]/best", height)
            }
            OutputMode::Best => format!("best[height<={}]/best", DEFAULT_MAX_HEIGHT),
        }
    }

    /// Deduplicate labels keeping first occurrence, then order by numeric
    /// value descending. Labels without a leading number sort last.
    pub fn available_qualities<I>(labels: I) -> Vec<String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut distinct: Vec<String> = Vec::new();
        for label in labels {
            if !label.is_empty() && !distinct.contains(&label) {
                distinct.push(label);
            }
        }

        distinct.sort_by(|a, b| {
            let a_num = parse_leading_number(a).unwrap_or(0);
            let b_num = parse_leading_number(b).unwrap_or(0);
            b_num.cmp(&a_num)
        });
        distinct
    }

    /// Pick the stream for the in-process backend
    pub fn choose_stream<'a>(formats: &'a [StreamFormat], mode: &OutputMode) -> Option<&'a StreamFormat> {
        match mode {
            OutputMode::Audio => Self::highest_audio(formats),
            OutputMode::Quality(label) => match mode.height() {
                Some(h) if h >= HIGH_QUALITY_THRESHOLD => Self::highest_video(formats),
                _ => formats
                    .iter()
                    .filter(|f| f.has_video && f.quality_label.as_deref() == Some(label.as_str()))
                    .max_by_key(|f| f.bitrate),
            },
            OutputMode::Best => Self::highest_video(formats),
        }
    }

    fn highest_video(formats: &[StreamFormat]) -> Option<&StreamFormat> {
        formats
            .iter()
            .filter(|f| f.has_video)
            .max_by_key(|f| f.bitrate)
    }

    fn highest_audio(formats: &[StreamFormat]) -> Option<&StreamFormat> {
        formats
            .iter()
            .filter(|f| f.is_audio_only())
            .max_by_key(|f| f.bitrate)
            .or_else(|| formats.iter().filter(|f| f.has_audio).max_by_key(|f| f.bitrate))
    }
}

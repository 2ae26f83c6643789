// Platform detection by URL substring

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    YouTube,
    Instagram,
    TikTok,
    Twitter,
    Generic,
}

/// Ordered signatures, first match wins. Matching is case-sensitive.
const SIGNATURES: &[(&[&str], Platform)] = &[
    (&["youtube.com", "youtu.be"], Platform::YouTube),
    (&["instagram.com"], Platform::Instagram),
    (&["tiktok.com"], Platform::TikTok),
    (&["twitter.com", "x.com"], Platform::Twitter),
];

impl Platform {
    pub fn detect(url: &str) -> Self {
        SIGNATURES
            .iter()
            .find(|(needles, _)| needles.iter().any(|n| url.contains(n)))
            .map(|(_, platform)| *platform)
            .unwrap_or(Platform::Generic)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::YouTube => "youtube",
            Self::Instagram => "instagram",
            Self::TikTok => "tiktok",
            Self::Twitter => "twitter",
            Self::Generic => "generic",
        }
    }

    /// Platform the in-process streaming backend understands
    pub fn is_youtube(&self) -> bool {
        matches!(self, Self::YouTube)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

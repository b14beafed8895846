use std::fmt;

use serde::Serialize;
use serde_json::Value;

pub type JobId = u64;

/// HTML of one fetched page. Scoped to a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    pub url: String,
    pub final_url: String,
    pub html: String,
    pub encoding_label: String,
}

impl RawPage {
    /// Page built from HTML already in memory, e.g. a saved copy.
    pub fn from_html(url: impl Into<String>, html: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            final_url: url.clone(),
            url,
            html: html.into(),
            encoding_label: "UTF-8".to_string(),
        }
    }
}

/// How a candidate payload was discovered. Declaration order is priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    LegacyEmbeddedJson,
    StreamedChunkJson,
    GenericScriptJson,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::LegacyEmbeddedJson => write!(f, "legacy-embedded-json"),
            Strategy::StreamedChunkJson => write!(f, "streamed-chunk-json"),
            Strategy::GenericScriptJson => write!(f, "generic-script-json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CandidatePayload {
    pub strategy: Strategy,
    /// Discovery order; 0 is the highest priority.
    pub priority: usize,
    pub value: Value,
}

/// One string pushed through the streaming hydration format, already unescaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamedChunk {
    /// Row id before the first `:`, when the chunk starts a row.
    pub row_id: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SongRecord {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub lyrics: Option<String>,
    pub styles: Option<String>,
    pub audio_url: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
}

impl SongRecord {
    pub fn get(&self, field: Field) -> Option<&str> {
        match field {
            Field::Title => self.title.as_deref(),
            Field::Artist => self.artist.as_deref(),
            Field::Lyrics => self.lyrics.as_deref(),
            Field::Styles => self.styles.as_deref(),
            Field::AudioUrl => self.audio_url.as_deref(),
            Field::ImageUrl => self.image_url.as_deref(),
            Field::VideoUrl => self.video_url.as_deref(),
        }
    }

    pub(crate) fn slot_mut(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Title => &mut self.title,
            Field::Artist => &mut self.artist,
            Field::Lyrics => &mut self.lyrics,
            Field::Styles => &mut self.styles,
            Field::AudioUrl => &mut self.audio_url,
            Field::ImageUrl => &mut self.image_url,
            Field::VideoUrl => &mut self.video_url,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Title,
    Artist,
    Lyrics,
    Styles,
    AudioUrl,
    ImageUrl,
    VideoUrl,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Title,
        Field::Artist,
        Field::Lyrics,
        Field::Styles,
        Field::AudioUrl,
        Field::ImageUrl,
        Field::VideoUrl,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// Structured payloads first, then markup scans.
    #[default]
    Lenient,
    /// Structured payloads only; no candidates means not found.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Completed {
        job_id: JobId,
        url: String,
        result: Result<crate::ExtractionOutcome, FetchError>,
    },
}

/// The single request-level failure: the page could not be fetched or decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    Decode,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FailureKind::Decode => write!(f, "undecodable body"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

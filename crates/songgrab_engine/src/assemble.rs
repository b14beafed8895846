use serde::Serialize;

use crate::locate::LocatedData;
use crate::resolve::{FieldOrigin, Resolution};
use crate::{ExtractionMode, Field, RawPage, SongRecord, Strategy};

pub const MAX_HTML_SNIPPET_CHARS: usize = 2_000;
pub const MAX_CANDIDATE_SNIPPET_CHARS: usize = 500;

/// Output record for one extracted page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SongExtraction {
    pub url: String,
    #[serde(flatten)]
    pub record: SongRecord,
    pub raw_html_snippet: String,
    pub candidate_snippet: Option<String>,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub mode: ExtractionMode,
    pub final_url: String,
    pub encoding: String,
    pub html_length: usize,
    pub script_count: usize,
    pub streamed_chunk_count: usize,
    /// Strategies that produced a candidate, in priority order.
    pub strategies: Vec<Strategy>,
    pub fields: Vec<FieldReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldReport {
    pub field: Field,
    pub populated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<FieldOrigin>,
}

impl Diagnostics {
    pub fn origin(&self, field: Field) -> Option<&FieldOrigin> {
        self.fields
            .iter()
            .find(|report| report.field == field)
            .and_then(|report| report.origin.as_ref())
    }
}

/// Package a resolution into the output record.
pub fn assemble(
    page: &RawPage,
    located: &LocatedData,
    resolution: Resolution,
    mode: ExtractionMode,
) -> SongExtraction {
    let candidate_snippet = located
        .candidates
        .first()
        .and_then(|candidate| serde_json::to_string(&candidate.value).ok())
        .map(|json| truncate_chars(&json, MAX_CANDIDATE_SNIPPET_CHARS).to_string());

    let fields = resolution
        .origins
        .into_iter()
        .map(|(field, origin)| FieldReport {
            field,
            populated: resolution.record.get(field).is_some(),
            origin,
        })
        .collect();

    SongExtraction {
        url: page.url.clone(),
        record: resolution.record,
        raw_html_snippet: truncate_chars(&page.html, MAX_HTML_SNIPPET_CHARS).to_string(),
        candidate_snippet,
        diagnostics: Diagnostics {
            mode,
            final_url: page.final_url.clone(),
            encoding: page.encoding_label.clone(),
            html_length: page.html.len(),
            script_count: located.script_count,
            streamed_chunk_count: located.chunks.len(),
            strategies: located.strategies(),
            fields,
        },
    }
}

/// The first `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

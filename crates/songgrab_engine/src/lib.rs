//! Songgrab engine: song metadata extraction from song-sharing pages.
//!
//! `fetch` turns a URL into a [`RawPage`]; `locate` finds embedded payloads;
//! `resolve` picks each field through ordered fallbacks; `assemble` builds
//! the output record with diagnostics.
mod assemble;
mod clean;
mod decode;
mod engine;
mod fetch;
mod filename;
mod locate;
mod payload;
mod persist;
mod pipeline;
mod resolve;
mod site;
mod text;
mod types;

pub use assemble::{
    assemble, truncate_chars, Diagnostics, FieldReport, SongExtraction,
    MAX_CANDIDATE_SNIPPET_CHARS, MAX_HTML_SNIPPET_CHARS,
};
pub use clean::clean;
pub use decode::{decode_html, DecodedHtml};
pub use engine::EngineHandle;
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher};
pub use filename::deterministic_filename;
pub use locate::{find_clip, locate, stream_chunks, LocatedData, MAX_VISITED_NODES};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use pipeline::{extract_page, extract_page_lenient, ExtractionOutcome, Pipeline};
pub use resolve::{
    first_non_empty, plausible_lyrics, reference_id, resolve, resolve_reference, sources_for,
    FieldOrigin, FieldSource, Found, Resolution, ResolveContext, MIN_LYRICS_LEN,
};
pub use site::{SiteProfile, SongUrlError};
pub use types::{
    CandidatePayload, EngineEvent, ExtractionMode, FailureKind, FetchError, Field, JobId, RawPage,
    SongRecord, StreamedChunk, Strategy,
};

//! Field resolver.
//!
//! Each output field has an ordered table of sources. [`first_non_empty`]
//! walks a table and keeps the first cleaned, non-empty value, so a field is
//! set by exactly one source and never overwritten. Candidate sources visit
//! candidates in priority order. Strict mode only consults structured sources.

use std::cell::OnceCell;
use std::sync::LazyLock;

use engine_logging::engine_debug;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use serde_json::Value;

use crate::clean::{clean, clean_opt};
use crate::payload;
use crate::site::SiteProfile;
use crate::text::{element_text, visible_text};
use crate::{CandidatePayload, ExtractionMode, Field, SongRecord, StreamedChunk, Strategy};

/// Scanned lyrics must be longer than this many characters.
pub const MIN_LYRICS_LEN: usize = 20;
/// Text behind an indirection marker must be longer than this.
pub const MIN_REFERENCED_TEXT_LEN: usize = 20;
/// Longest string treated as an indirection marker.
pub const MAX_REFERENCE_LEN: usize = 16;

/// Genre keywords recognized by the last-resort style scan.
pub const GENRE_VOCABULARY: &[&str] = &[
    "pop", "rock", "hip hop", "hip-hop", "rap", "trap", "r&b", "soul", "funk", "jazz", "blues",
    "country", "folk", "metal", "punk", "grunge", "emo", "indie", "edm", "house", "techno",
    "trance", "dubstep", "drum and bass", "synthwave", "lo-fi", "lofi", "ambient", "classical",
    "orchestral", "acoustic", "reggae", "disco", "gospel", "latin", "k-pop", "afrobeat",
];

const SECTION_NAMES: &str = r"verse|chorus|pre-chorus|bridge|intro|outro|hook";

static REFERENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$[@G-Zg-z]?([0-9a-fA-F]+)$").expect("valid regex"));
static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\[(?:{SECTION_NAMES})(?:[ \t][^\]\n]{{0,30}})?\]")).expect("valid regex")
});
static PARAGRAPH_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{2,}").expect("valid regex"));
static PROMPT_FIELD_RE: LazyLock<Regex> = LazyLock::new(|| json_string_field(r"prompt"));
static LYRICS_FIELD_RE: LazyLock<Regex> = LazyLock::new(|| json_string_field(r"lyrics"));
static STYLE_FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| json_string_field(r"display_tags|tags|styles?|genres?"));
static BY_ARTIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bby\s+([^|.,(\n]+?)\s*(?:\(|\||\.|,|\s[-–·]\s|\s+on\s|$)").expect("valid regex")
});
static GENRE_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives = GENRE_VOCABULARY
        .iter()
        .map(|word| regex::escape(word))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)(?:^|[^\w-])({alternatives})(?:$|[^\w-])")).expect("valid regex")
});

fn json_string_field(names: &str) -> Regex {
    Regex::new(&format!(r#""(?:{names})"\s*:\s*"((?:[^"\\]|\\.)*)""#)).expect("valid regex")
}

/// Everything a source may look at. Built once per request.
pub struct ResolveContext<'a> {
    pub candidates: &'a [CandidatePayload],
    pub chunks: &'a [StreamedChunk],
    pub document: &'a Html,
    pub html: &'a str,
    pub site: &'a SiteProfile,
    visible: OnceCell<String>,
}

impl<'a> ResolveContext<'a> {
    pub fn new(
        candidates: &'a [CandidatePayload],
        chunks: &'a [StreamedChunk],
        document: &'a Html,
        html: &'a str,
        site: &'a SiteProfile,
    ) -> Self {
        Self {
            candidates,
            chunks,
            document,
            html,
            site,
            visible: OnceCell::new(),
        }
    }

    fn visible_text(&self) -> &str {
        self.visible.get_or_init(|| visible_text(self.document))
    }

    /// Raw HTML followed by every unescaped streamed chunk.
    fn scan_targets<'s>(&'s self) -> impl Iterator<Item = &'s str> + 's {
        let html: &'s str = self.html;
        let chunks: &'s [StreamedChunk] = self.chunks;
        std::iter::once(html).chain(chunks.iter().map(|c| c.text.as_str()))
    }
}

/// A value produced by one source, before it lands in the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found {
    pub value: String,
    pub strategy: Option<Strategy>,
}

impl Found {
    fn markup(value: String) -> Self {
        Self {
            value,
            strategy: None,
        }
    }
}

/// Where a field's value came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldOrigin {
    pub source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
}

#[derive(Clone, Copy)]
pub struct FieldSource {
    pub name: &'static str,
    /// Reads parsed payloads only; the only kind allowed in strict mode.
    pub structured: bool,
    resolve: fn(&ResolveContext<'_>) -> Option<Found>,
}

impl FieldSource {
    const fn structured(name: &'static str, resolve: fn(&ResolveContext<'_>) -> Option<Found>) -> Self {
        Self {
            name,
            structured: true,
            resolve,
        }
    }

    const fn markup(name: &'static str, resolve: fn(&ResolveContext<'_>) -> Option<Found>) -> Self {
        Self {
            name,
            structured: false,
            resolve,
        }
    }
}

impl std::fmt::Debug for FieldSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldSource")
            .field("name", &self.name)
            .field("structured", &self.structured)
            .finish()
    }
}

pub const TITLE_SOURCES: &[FieldSource] = &[
    FieldSource::structured("candidate.title", candidate_title),
    FieldSource::markup("meta.og:title", meta_og_title),
    FieldSource::markup("meta.twitter:title", meta_twitter_title),
    FieldSource::markup("html.title", html_title),
];

pub const ARTIST_SOURCES: &[FieldSource] = &[
    FieldSource::structured("candidate.display_name", candidate_artist),
    FieldSource::markup("meta.description.by", description_by_artist),
];

pub const LYRICS_SOURCES: &[FieldSource] = &[
    FieldSource::structured("candidate.prompt", candidate_prompt),
    FieldSource::markup("scan.json-prompt", scan_json_prompt),
    FieldSource::markup("scan.json-lyrics", scan_json_lyrics),
    FieldSource::markup("scan.lyrics-class", scan_lyrics_class),
    FieldSource::markup("scan.data-lyrics", scan_data_lyrics),
    FieldSource::markup("scan.section-markers", scan_section_markers),
];

pub const STYLES_SOURCES: &[FieldSource] = &[
    FieldSource::structured("candidate.tags", candidate_tags),
    FieldSource::structured("candidate.negative_tags", candidate_negative_tags),
    FieldSource::markup("scan.json-tags", scan_json_tags),
    FieldSource::markup("scan.genre-class", scan_genre_class),
    FieldSource::markup("scan.genre-vocabulary", scan_genre_vocabulary),
];

pub const AUDIO_URL_SOURCES: &[FieldSource] =
    &[FieldSource::structured("candidate.audio_url", candidate_audio_url)];

pub const IMAGE_URL_SOURCES: &[FieldSource] = &[
    FieldSource::structured("candidate.image_url", candidate_image_url),
    FieldSource::markup("meta.og:image", meta_og_image),
];

pub const VIDEO_URL_SOURCES: &[FieldSource] = &[
    FieldSource::structured("candidate.video_url", candidate_video_url),
    FieldSource::markup("meta.og:video", meta_og_video),
];

/// Source table for `field`, highest priority first.
pub fn sources_for(field: Field) -> &'static [FieldSource] {
    match field {
        Field::Title => TITLE_SOURCES,
        Field::Artist => ARTIST_SOURCES,
        Field::Lyrics => LYRICS_SOURCES,
        Field::Styles => STYLES_SOURCES,
        Field::AudioUrl => AUDIO_URL_SOURCES,
        Field::ImageUrl => IMAGE_URL_SOURCES,
        Field::VideoUrl => VIDEO_URL_SOURCES,
    }
}

/// Evaluate `sources` in order and keep the first value that survives cleaning.
pub fn first_non_empty(
    sources: &[FieldSource],
    ctx: &ResolveContext<'_>,
    mode: ExtractionMode,
) -> Option<(String, FieldOrigin)> {
    sources
        .iter()
        .filter(|source| mode == ExtractionMode::Lenient || source.structured)
        .find_map(|source| {
            let found = (source.resolve)(ctx)?;
            let value = clean(&found.value)?;
            Some((
                value,
                FieldOrigin {
                    source: source.name,
                    strategy: found.strategy,
                },
            ))
        })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub record: SongRecord,
    /// One entry per field, in [`Field::ALL`] order.
    pub origins: Vec<(Field, Option<FieldOrigin>)>,
}

/// Resolve every field of the record.
pub fn resolve(ctx: &ResolveContext<'_>, mode: ExtractionMode) -> Resolution {
    let mut resolution = Resolution::default();
    for field in Field::ALL {
        let slot = resolution.record.slot_mut(field);
        let origin = match first_non_empty(sources_for(field), ctx, mode) {
            Some((value, origin)) if slot.is_none() => {
                engine_debug!("resolver: {:?} from {}", field, origin.source);
                *slot = Some(value);
                Some(origin)
            }
            _ => None,
        };
        resolution.origins.push((field, origin));
    }
    resolution
}

fn from_candidates(
    ctx: &ResolveContext<'_>,
    accessor: impl Fn(&Value) -> Option<String>,
) -> Option<Found> {
    ctx.candidates.iter().find_map(|candidate| {
        let value = accessor(&candidate.value).and_then(|v| clean(&v))?;
        Some(Found {
            value,
            strategy: Some(candidate.strategy),
        })
    })
}

fn candidate_title(ctx: &ResolveContext<'_>) -> Option<Found> {
    from_candidates(ctx, |song| payload::title(song).map(str::to_string))
}

fn candidate_artist(ctx: &ResolveContext<'_>) -> Option<Found> {
    from_candidates(ctx, |song| payload::artist(song).map(str::to_string))
}

fn candidate_prompt(ctx: &ResolveContext<'_>) -> Option<Found> {
    from_candidates(ctx, |song| {
        let prompt = payload::prompt(song)?;
        match reference_id(prompt) {
            Some(id) => {
                let resolved = resolve_reference(ctx.chunks, id);
                if resolved.is_none() {
                    engine_debug!("resolver: lyrics reference {} did not resolve", prompt);
                }
                resolved
            }
            None => Some(prompt.to_string()),
        }
    })
}

fn candidate_tags(ctx: &ResolveContext<'_>) -> Option<Found> {
    from_candidates(ctx, |song| payload::tags(song).map(str::to_string))
}

fn candidate_negative_tags(ctx: &ResolveContext<'_>) -> Option<Found> {
    from_candidates(ctx, |song| {
        let negative = clean(payload::negative_tags(song)?)?;
        Some(format!("NOT: {negative}"))
    })
}

fn candidate_audio_url(ctx: &ResolveContext<'_>) -> Option<Found> {
    from_candidates(ctx, |song| payload::audio_url(song).map(str::to_string))
}

fn candidate_image_url(ctx: &ResolveContext<'_>) -> Option<Found> {
    from_candidates(ctx, |song| payload::image_url(song).map(str::to_string))
}

fn candidate_video_url(ctx: &ResolveContext<'_>) -> Option<Found> {
    from_candidates(ctx, |song| payload::video_url(song).map(str::to_string))
}

/// Row id referenced by an indirection marker such as `$1a`.
///
/// A single non-hex letter after `$` is a type tag (`$L1a`); hex letters always
/// belong to the id.
pub fn reference_id(value: &str) -> Option<&str> {
    let value = value.trim();
    if value.len() > MAX_REFERENCE_LEN {
        return None;
    }
    REFERENCE_RE
        .captures(value)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Find the text of streamed row `id`.
///
/// Chunks containing a nested `"clip"` object are skipped: they carry other
/// clips' lyrics under the same row ids. A text row (`<id>:T<hexlen>,`) whose
/// body was pushed separately is read from the following chunk.
pub fn resolve_reference(chunks: &[StreamedChunk], id: &str) -> Option<String> {
    let row_start = Regex::new(&format!(r"(?m)^{}:", regex::escape(id))).ok()?;
    chunks.iter().enumerate().find_map(|(index, chunk)| {
        if chunk.text.contains("\"clip\"") {
            return None;
        }
        let start = row_start.find(&chunk.text)?.end();
        let body = &chunk.text[start..];
        let text = row_text(body).or_else(|| {
            // Header-only text row: the body follows in the next push.
            is_text_header(body)
                .then(|| chunks.get(index + 1))
                .flatten()
                .map(|next| next.text.clone())
        })?;
        let cleaned = clean(&text)?;
        (cleaned.chars().count() > MIN_REFERENCED_TEXT_LEN).then_some(text)
    })
}

static TEXT_ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^T([0-9a-fA-F]+),").expect("valid regex"));

fn is_text_header(body: &str) -> bool {
    TEXT_ROW_RE
        .find(body)
        .is_some_and(|header| body[header.end()..].trim().is_empty())
}

fn row_text(body: &str) -> Option<String> {
    if let Some(caps) = TEXT_ROW_RE.captures(body) {
        let header_end = caps.get(0)?.end();
        let rest = &body[header_end..];
        let declared = usize::from_str_radix(&caps[1], 16).ok()?;
        let text = rest.get(..declared).unwrap_or(rest);
        return (!text.trim().is_empty()).then(|| text.to_string());
    }
    if body.starts_with('"') {
        let mut values = serde_json::Deserializer::from_str(body).into_iter::<Value>();
        return match values.next() {
            Some(Ok(Value::String(text))) => Some(text),
            _ => None,
        };
    }
    let line = body.lines().next()?.trim();
    (!line.is_empty()).then(|| line.to_string())
}

fn select_attr(document: &Html, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr(attr))
        .find_map(clean)
}

fn meta_content(ctx: &ResolveContext<'_>, key: &str) -> Option<String> {
    select_attr(
        ctx.document,
        &format!(r#"meta[property="{key}"], meta[name="{key}"]"#),
        "content",
    )
}

fn meta_og_title(ctx: &ResolveContext<'_>) -> Option<Found> {
    meta_content(ctx, "og:title").map(Found::markup)
}

fn meta_twitter_title(ctx: &ResolveContext<'_>) -> Option<Found> {
    meta_content(ctx, "twitter:title").map(Found::markup)
}

fn meta_og_image(ctx: &ResolveContext<'_>) -> Option<Found> {
    meta_content(ctx, "og:image").map(Found::markup)
}

fn meta_og_video(ctx: &ResolveContext<'_>) -> Option<Found> {
    meta_content(ctx, "og:video")
        .or_else(|| meta_content(ctx, "og:video:url"))
        .map(Found::markup)
}

fn html_title(ctx: &ResolveContext<'_>) -> Option<Found> {
    let selector = Selector::parse("title").ok()?;
    let title: String = ctx.document.select(&selector).next()?.text().collect();
    clean_opt(Some(ctx.site.strip_title_suffix(&title))).map(Found::markup)
}

fn description(ctx: &ResolveContext<'_>) -> Option<String> {
    meta_content(ctx, "description").or_else(|| meta_content(ctx, "og:description"))
}

fn description_by_artist(ctx: &ResolveContext<'_>) -> Option<Found> {
    let description = description(ctx)?;
    let caps = BY_ARTIST_RE.captures(&description)?;
    clean(&caps[1]).map(Found::markup)
}

/// Decode a captured JSON string body; undecodable captures are dropped.
fn decode_json_string(raw: &str) -> Option<String> {
    serde_json::from_str::<String>(&format!("\"{raw}\"")).ok()
}

/// Gate for scanned lyrics: long enough, and shaped like song text.
pub fn plausible_lyrics(text: &str) -> bool {
    let Some(cleaned) = clean(text) else {
        return false;
    };
    cleaned.chars().count() > MIN_LYRICS_LEN
        && (SECTION_RE.is_match(&cleaned) || cleaned.contains('\n'))
}

fn scan_json_field(ctx: &ResolveContext<'_>, re: &Regex) -> Option<Found> {
    ctx.scan_targets()
        .flat_map(move |target| re.captures_iter(target))
        .filter_map(|caps| decode_json_string(caps.get(1)?.as_str()))
        .find(|text| plausible_lyrics(text))
        .map(Found::markup)
}

fn scan_json_prompt(ctx: &ResolveContext<'_>) -> Option<Found> {
    scan_json_field(ctx, &PROMPT_FIELD_RE)
}

fn scan_json_lyrics(ctx: &ResolveContext<'_>) -> Option<Found> {
    scan_json_field(ctx, &LYRICS_FIELD_RE)
}

fn scan_lyrics_class(ctx: &ResolveContext<'_>) -> Option<Found> {
    let selector = Selector::parse(r#"[class*="lyric"], [class*="Lyric"]"#).ok()?;
    ctx.document
        .select(&selector)
        .map(element_text)
        .find(|text| plausible_lyrics(text))
        .map(Found::markup)
}

fn scan_data_lyrics(ctx: &ResolveContext<'_>) -> Option<Found> {
    let selector = Selector::parse("[data-lyrics], [data-prompt]").ok()?;
    ctx.document
        .select(&selector)
        .filter_map(|el| {
            el.value()
                .attr("data-lyrics")
                .or_else(|| el.value().attr("data-prompt"))
        })
        .find(|text| plausible_lyrics(text))
        .map(|text| Found::markup(text.to_string()))
}

/// Visible text from the first section marker to the paragraph holding the last one.
fn scan_section_markers(ctx: &ResolveContext<'_>) -> Option<Found> {
    let text = ctx.visible_text();
    let paragraphs: Vec<&str> = PARAGRAPH_SPLIT_RE.split(text).collect();
    let first = paragraphs.iter().position(|p| SECTION_RE.is_match(p))?;
    let last = paragraphs.iter().rposition(|p| SECTION_RE.is_match(p))?;

    let opening = paragraphs[first];
    let marker = SECTION_RE.find(opening)?;
    let mut block = vec![&opening[marker.start()..]];
    block.extend_from_slice(&paragraphs[first + 1..=last]);
    let block = block.join("\n\n");

    plausible_lyrics(&block).then(|| Found::markup(block))
}

fn scan_json_tags(ctx: &ResolveContext<'_>) -> Option<Found> {
    ctx.scan_targets()
        .flat_map(|target| STYLE_FIELD_RE.captures_iter(target))
        .filter_map(|caps| decode_json_string(caps.get(1)?.as_str()))
        .find_map(|text| clean(&text))
        .map(Found::markup)
}

fn scan_genre_class(ctx: &ResolveContext<'_>) -> Option<Found> {
    let selector =
        Selector::parse(r#"[class*="genre"], [class*="styles"], [class*="song-tags"]"#).ok()?;
    ctx.document
        .select(&selector)
        .map(element_text)
        .find_map(|text| clean(&text))
        .map(Found::markup)
}

/// Known genre words, description meta first, visible text otherwise.
fn scan_genre_vocabulary(ctx: &ResolveContext<'_>) -> Option<Found> {
    description(ctx)
        .and_then(|d| genre_words(&d))
        .or_else(|| genre_words(ctx.visible_text()))
        .map(Found::markup)
}

fn genre_words(text: &str) -> Option<String> {
    let mut words: Vec<String> = Vec::new();
    // Matches consume their trailing separator, so rescan from each match end.
    let mut offset = 0;
    while let Some(caps) = GENRE_RE.captures_at(text, offset) {
        let Some(word) = caps.get(1) else { break };
        let lower = word.as_str().to_lowercase();
        if !words.contains(&lower) {
            words.push(lower);
        }
        offset = word.end();
    }
    (!words.is_empty()).then(|| words.join(", "))
}

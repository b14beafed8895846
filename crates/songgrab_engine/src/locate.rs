//! Embedded-data locator.
//!
//! Scans the `<script>` tags of a page for song payloads. Three strategies run
//! in a fixed order and each one is attempted regardless of how the previous
//! ones fared; a payload that fails to parse only disqualifies itself.

use std::sync::LazyLock;

use engine_logging::engine_debug;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::payload::{at_path, has_keys};
use crate::{CandidatePayload, StreamedChunk, Strategy};

/// Id of the script tag carrying the legacy single-document payload.
pub const LEGACY_SCRIPT_ID: &str = "__NEXT_DATA__";
/// Call prefix of the streaming hydration format.
pub const STREAM_PUSH_PREFIX: &str = "self.__next_f.push(";
/// Upper bound on nodes visited while searching one chunk for a clip object.
pub const MAX_VISITED_NODES: usize = 50_000;

/// Key chains tried, in order, inside the legacy payload.
const LEGACY_SONG_PATHS: [&[&str]; 2] = [&["props", "pageProps", "song"], &["props", "pageProps", "data"]];

static ROW_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9a-fA-F]+):").expect("valid regex"));

/// Everything the locator learned about one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocatedData {
    /// Candidates in priority order.
    pub candidates: Vec<CandidatePayload>,
    /// Every streamed chunk, in push order, whether or not it held a candidate.
    pub chunks: Vec<StreamedChunk>,
    pub script_count: usize,
}

impl LocatedData {
    pub fn strategies(&self) -> Vec<Strategy> {
        self.candidates.iter().map(|c| c.strategy).collect()
    }
}

/// Run every strategy over a parsed document.
pub fn locate(document: &Html) -> LocatedData {
    let scripts = script_bodies(document);
    let chunks = scripts
        .iter()
        .flat_map(|script| stream_chunks(&script.body))
        .collect::<Vec<_>>();

    let attempts = [
        (Strategy::LegacyEmbeddedJson, legacy_embedded_json(&scripts)),
        (Strategy::StreamedChunkJson, streamed_chunk_json(&chunks)),
        (Strategy::GenericScriptJson, generic_script_json(&scripts)),
    ];

    let mut candidates = Vec::new();
    for (strategy, found) in attempts {
        match found {
            Some(value) => {
                engine_debug!("locator: {} produced a candidate", strategy);
                candidates.push(CandidatePayload {
                    strategy,
                    priority: candidates.len(),
                    value,
                });
            }
            None => engine_debug!("locator: {} found nothing", strategy),
        }
    }

    LocatedData {
        candidates,
        chunks,
        script_count: scripts.len(),
    }
}

struct ScriptBody {
    id: Option<String>,
    body: String,
}

fn script_bodies(document: &Html) -> Vec<ScriptBody> {
    let Ok(selector) = Selector::parse("script") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .map(|script| ScriptBody {
            id: script.value().attr("id").map(str::to_string),
            body: script.text().collect(),
        })
        .collect()
}

fn legacy_embedded_json(scripts: &[ScriptBody]) -> Option<Value> {
    let script = scripts
        .iter()
        .find(|s| s.id.as_deref() == Some(LEGACY_SCRIPT_ID))?;
    let parsed: Value = match serde_json::from_str(script.body.trim()) {
        Ok(value) => value,
        Err(err) => {
            engine_debug!("locator: legacy payload is not valid JSON: {}", err);
            return None;
        }
    };
    let song = LEGACY_SONG_PATHS
        .iter()
        .find_map(|path| at_path(&parsed, path).filter(|v| v.is_object()).cloned());
    Some(song.unwrap_or(parsed))
}

/// Split a script body into the strings it pushes through the streaming format.
pub fn stream_chunks(script: &str) -> Vec<StreamedChunk> {
    let mut chunks = Vec::new();
    let mut rest = script;
    while let Some(pos) = rest.find(STREAM_PUSH_PREFIX) {
        rest = &rest[pos + STREAM_PUSH_PREFIX.len()..];
        // The push argument is a JSON array literal; parse just that value.
        let mut values = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
        let Some(Ok(Value::Array(items))) = values.next() else {
            continue;
        };
        for item in items {
            if let Value::String(text) = item {
                let row_id = ROW_PREFIX_RE
                    .captures(&text)
                    .map(|caps| caps[1].to_string());
                chunks.push(StreamedChunk { row_id, text });
            }
        }
    }
    chunks
}

/// Cheap textual check before paying for a parse.
fn looks_like_complete_clip(text: &str) -> bool {
    text.contains("\"title\"")
        && text.contains("\"metadata\"")
        && (text.contains("\"status\":\"complete\"") || text.contains("\"audio_url\""))
}

fn streamed_chunk_json(chunks: &[StreamedChunk]) -> Option<Value> {
    chunks
        .iter()
        .filter(|chunk| looks_like_complete_clip(&chunk.text))
        .find_map(|chunk| {
            // A chunk may hold several `id:payload` rows.
            chunk.text.lines().find_map(|row| {
                if !looks_like_complete_clip(row) {
                    return None;
                }
                let payload = ROW_PREFIX_RE
                    .find(row)
                    .map_or(row, |prefix| &row[prefix.end()..]);
                let mut values = serde_json::Deserializer::from_str(payload).into_iter::<Value>();
                match values.next() {
                    Some(Ok(tree)) => find_clip(&tree).cloned(),
                    Some(Err(err)) => {
                        engine_debug!("locator: streamed row is not valid JSON: {}", err);
                        None
                    }
                    None => None,
                }
            })
        })
}

/// Depth-first search for the first clip-shaped object.
///
/// Matches either a node whose `clip` child has `title` and `metadata` (the
/// child is returned) or a node that itself has `title`, `metadata` and one of
/// `id`/`audio_url`. Gives up after [`MAX_VISITED_NODES`] nodes.
pub fn find_clip(root: &Value) -> Option<&Value> {
    let mut stack = vec![root];
    let mut visited = 0usize;
    while let Some(node) = stack.pop() {
        visited += 1;
        if visited > MAX_VISITED_NODES {
            engine_debug!("locator: clip search stopped after {} nodes", MAX_VISITED_NODES);
            return None;
        }
        match node {
            Value::Object(map) => {
                if let Some(clip) = map.get("clip") {
                    if has_keys(clip, &["title", "metadata"]) {
                        return Some(clip);
                    }
                }
                if has_keys(node, &["title", "metadata"])
                    && (map.contains_key("id") || map.contains_key("audio_url"))
                {
                    return Some(node);
                }
                // Keys keep document order (`preserve_order`); reverse so the first child pops first.
                let children: Vec<&Value> = map.values().collect();
                stack.extend(children.into_iter().rev());
            }
            Value::Array(items) => stack.extend(items.iter().rev()),
            _ => {}
        }
    }
    None
}

fn generic_script_json(scripts: &[ScriptBody]) -> Option<Value> {
    scripts
        .iter()
        .map(|s| s.body.trim())
        .filter(|body| body.starts_with('{'))
        .find_map(|body| {
            let value: Value = serde_json::from_str(body).ok()?;
            let map = value.as_object()?;
            (map.contains_key("title") || map.contains_key("display_name") || map.contains_key("metadata"))
                .then_some(value)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn locate_html(html: &str) -> LocatedData {
        locate(&Html::parse_document(html))
    }

    fn push_script(chunk: &str) -> String {
        let literal = serde_json::to_string(chunk).unwrap();
        format!("<script>self.__next_f.push([1,{literal}])</script>")
    }

    #[test]
    fn legacy_payload_descends_to_song() {
        let html = r#"<html><body><script id="__NEXT_DATA__" type="application/json">{"props":{"pageProps":{"song":{"title":"T"}}}}</script></body></html>"#;
        let located = locate_html(html);
        assert_eq!(located.candidates.len(), 1);
        assert_eq!(located.candidates[0].strategy, Strategy::LegacyEmbeddedJson);
        assert_eq!(located.candidates[0].value, json!({"title": "T"}));
    }

    #[test]
    fn legacy_payload_falls_back_to_data_then_whole_object() {
        let data = r#"<script id="__NEXT_DATA__">{"props":{"pageProps":{"data":{"title":"D"}}}}</script>"#;
        assert_eq!(locate_html(data).candidates[0].value, json!({"title": "D"}));

        let whole = r#"<script id="__NEXT_DATA__">{"page":"/song"}</script>"#;
        assert_eq!(locate_html(whole).candidates[0].value, json!({"page": "/song"}));
    }

    #[test]
    fn malformed_legacy_payload_does_not_stop_other_strategies() {
        let html = r#"<script id="__NEXT_DATA__">{"props": oops</script><script>{"title":"Generic"}</script>"#;
        let located = locate_html(html);
        assert_eq!(located.strategies(), vec![Strategy::GenericScriptJson]);
        assert_eq!(located.candidates[0].priority, 0);
    }

    #[test]
    fn streamed_chunk_returns_nested_clip() {
        let chunk = r#"5:["$","div",null,{"clip":{"id":"abc","title":"Streamed","metadata":{"tags":"pop"},"status":"complete"}}]"#;
        let located = locate_html(&push_script(chunk));
        assert_eq!(located.chunks.len(), 1);
        assert_eq!(located.chunks[0].row_id.as_deref(), Some("5"));
        let candidate = &located.candidates[0];
        assert_eq!(candidate.strategy, Strategy::StreamedChunkJson);
        assert_eq!(candidate.value["title"], json!("Streamed"));
    }

    #[test]
    fn streamed_chunk_without_completion_marker_is_ignored() {
        let chunk = r#"5:{"title":"Draft","metadata":{},"id":"x","status":"queued"}"#;
        assert!(locate_html(&push_script(chunk)).candidates.is_empty());
    }

    #[test]
    fn direct_clip_node_needs_id_or_audio_url() {
        let tree = json!([{"title": "No id", "metadata": {}}, {"title": "Yes", "metadata": {}, "audio_url": "u"}]);
        assert_eq!(find_clip(&tree).unwrap()["title"], json!("Yes"));
    }

    #[test]
    fn clip_search_is_depth_first_in_document_order() {
        let tree = json!({
            "b": {"deep": {"title": "First", "metadata": {}, "id": "1"}},
            "a": {"title": "Second", "metadata": {}, "id": "2"}
        });
        assert_eq!(find_clip(&tree).unwrap()["title"], json!("First"));
    }

    #[test]
    fn song_node_beats_later_sibling_that_sorts_first() {
        let row = r#"{"song":{"title":"Main","metadata":{},"id":"1"},"alternates":[{"title":"Other","metadata":{},"id":"2"}]}"#;
        let tree: Value = serde_json::from_str(row).unwrap();
        assert_eq!(find_clip(&tree).unwrap()["title"], json!("Main"));
    }

    #[test]
    fn clip_search_is_bounded() {
        let wide: Vec<Value> = (0..MAX_VISITED_NODES + 10).map(|i| json!(i)).collect();
        let tree = json!([wide, {"title": "Late", "metadata": {}, "id": "z"}]);
        assert_eq!(find_clip(&tree), None);
    }

    #[test]
    fn generic_script_requires_song_keys() {
        let html = r#"<script>{"config":true}</script><script> {"display_name":"Artist"} </script>"#;
        let located = locate_html(html);
        assert_eq!(located.script_count, 2);
        assert_eq!(located.candidates[0].value, json!({"display_name": "Artist"}));
    }

    #[test]
    fn several_pushes_in_one_script_are_all_collected() {
        let html = r#"<script>self.__next_f.push([0]);self.__next_f.push([1,"1:\"x\"\n"]);self.__next_f.push([1,"2:T5,hello"])</script>"#;
        let located = locate_html(html);
        let ids: Vec<_> = located.chunks.iter().map(|c| c.row_id.as_deref()).collect();
        assert_eq!(ids, vec![Some("1"), Some("2")]);
        assert_eq!(located.chunks[1].text, "2:T5,hello");
    }
}

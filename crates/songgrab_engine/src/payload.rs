//! Key-path accessors into loosely-typed song payloads.
//!
//! Every accessor names the exact path it tries and returns `None` on any miss:
//! a missing key, a `null`, a non-string leaf, or an empty string. Absence is
//! the normal case for these payloads.

use serde_json::Value;

/// Follow `path` through nested objects.
pub fn at_path<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |node, key| node.as_object()?.get(*key))
}

/// Non-empty string at `path`.
pub fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    at_path(value, path)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// `true` when `value` is an object carrying every key in `keys`.
pub fn has_keys(value: &Value, keys: &[&str]) -> bool {
    value
        .as_object()
        .is_some_and(|map| keys.iter().all(|key| map.contains_key(*key)))
}

/// `title`
pub fn title(song: &Value) -> Option<&str> {
    str_at(song, &["title"])
}

/// `display_name`, then `user.display_name`.
pub fn artist(song: &Value) -> Option<&str> {
    str_at(song, &["display_name"]).or_else(|| str_at(song, &["user", "display_name"]))
}

/// `metadata.prompt`, then `gpt_description_prompt`, then
/// `metadata.gpt_description_prompt`.
pub fn prompt(song: &Value) -> Option<&str> {
    str_at(song, &["metadata", "prompt"])
        .or_else(|| str_at(song, &["gpt_description_prompt"]))
        .or_else(|| str_at(song, &["metadata", "gpt_description_prompt"]))
}

/// `display_tags`, then `metadata.tags`.
pub fn tags(song: &Value) -> Option<&str> {
    str_at(song, &["display_tags"]).or_else(|| str_at(song, &["metadata", "tags"]))
}

/// `metadata.negative_tags`
pub fn negative_tags(song: &Value) -> Option<&str> {
    str_at(song, &["metadata", "negative_tags"])
}

/// `audio_url`
pub fn audio_url(song: &Value) -> Option<&str> {
    str_at(song, &["audio_url"])
}

/// `image_large_url`, then `image_url`.
pub fn image_url(song: &Value) -> Option<&str> {
    str_at(song, &["image_large_url"]).or_else(|| str_at(song, &["image_url"]))
}

/// `video_url`
pub fn video_url(song: &Value) -> Option<&str> {
    str_at(song, &["video_url"])
}

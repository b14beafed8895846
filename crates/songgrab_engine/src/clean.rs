use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^<>]*>").expect("valid regex"));
static HSPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\S\n]+").expect("valid regex"));
static NEWLINE_EDGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" ?\n ?").expect("valid regex"));
static BLANK_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Normalize an extracted fragment.
///
/// Strips tags, turns non-breaking spaces into spaces, collapses horizontal
/// whitespace, keeps at most one blank line between paragraphs and trims.
/// Returns `None` when nothing is left. `clean` is idempotent.
pub fn clean(input: &str) -> Option<String> {
    let mut text = Cow::Borrowed(input);

    // Removing one tag can expose another (`<<b>i>`), so strip to a fixpoint.
    loop {
        let stripped = TAG_RE.replace_all(&text, "");
        if let Cow::Borrowed(_) = stripped {
            break;
        }
        text = Cow::Owned(stripped.into_owned());
    }

    let text = text.replace("&nbsp;", " ").replace('\u{a0}', " ");
    let text = HSPACE_RE.replace_all(&text, " ");
    let text = NEWLINE_EDGE_RE.replace_all(&text, "\n");
    let text = BLANK_RUN_RE.replace_all(&text, "\n\n");
    let text = text.trim();

    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// [`clean`] over an optional value.
pub(crate) fn clean_opt(input: Option<&str>) -> Option<String> {
    input.and_then(clean)
}

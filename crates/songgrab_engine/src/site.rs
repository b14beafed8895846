use serde::Deserialize;
use url::Url;

/// What the pipeline knows about the song-sharing site it scrapes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    /// Bare host name, without `www.`.
    pub host: String,
    /// Path segment that precedes the song id.
    pub song_path: String,
    /// Suffixes stripped from `<title>` text, tried in order.
    pub title_suffixes: Vec<String>,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            host: "suno.com".to_string(),
            song_path: "song".to_string(),
            title_suffixes: vec![" | Suno".to_string(), " - Suno".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SongUrlError {
    #[error("not an absolute url: {0}")]
    Malformed(String),
    #[error("unsupported scheme `{0}`")]
    Scheme(String),
    #[error("host `{found}` is not {expected}")]
    Host { found: String, expected: String },
    #[error("path `{0}` is not a song page")]
    Path(String),
}

impl SiteProfile {
    /// Check `raw` against `http(s)://(www.)<host>/<song_path>/<id>`.
    ///
    /// Returns the song id on success.
    pub fn song_id(&self, raw: &str) -> Result<String, SongUrlError> {
        let url = Url::parse(raw.trim()).map_err(|err| SongUrlError::Malformed(err.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SongUrlError::Scheme(url.scheme().to_string()));
        }

        let host = url.host_str().unwrap_or_default();
        let bare = host.strip_prefix("www.").unwrap_or(host);
        if !bare.eq_ignore_ascii_case(&self.host) {
            return Err(SongUrlError::Host {
                found: host.to_string(),
                expected: self.host.clone(),
            });
        }

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();
        match segments.as_slice() {
            [prefix, id] if *prefix == self.song_path && is_opaque_id(id) => Ok(id.to_string()),
            _ => Err(SongUrlError::Path(url.path().to_string())),
        }
    }

    /// `<title>` text with the first matching site suffix removed.
    pub fn strip_title_suffix<'a>(&self, title: &'a str) -> &'a str {
        let trimmed = title.trim();
        self.title_suffixes
            .iter()
            .find_map(|suffix| trimmed.strip_suffix(suffix.as_str()))
            .map(str::trim_end)
            .unwrap_or(trimmed)
    }
}

fn is_opaque_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

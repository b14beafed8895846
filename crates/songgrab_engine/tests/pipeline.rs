use pretty_assertions::assert_eq;
use songgrab_engine::{
    extract_page, extract_page_lenient, ExtractionMode, ExtractionOutcome, Field, RawPage,
    SiteProfile, SongRecord, Strategy,
};

const URL: &str = "https://suno.com/song/0b1c2d3e";

fn page(html: &str) -> RawPage {
    RawPage::from_html(URL, html)
}

fn push_script(chunk: &str) -> String {
    let literal = serde_json::to_string(chunk).unwrap();
    format!("<script>self.__next_f.push([1,{literal}])</script>")
}

#[test]
fn legacy_payload_resolves_every_field() {
    engine_logging::initialize_for_tests();
    let html = r#"<html><head><title>Ignored | Suno</title></head><body>
        <script id="__NEXT_DATA__" type="application/json">{"props":{"pageProps":{"song":{"title":"T","display_name":"A","metadata":{"prompt":"P","tags":"pop"}}}}}</script>
        </body></html>"#;

    let extraction = extract_page_lenient(&page(html), &SiteProfile::default());

    assert_eq!(
        extraction.record,
        SongRecord {
            title: Some("T".into()),
            artist: Some("A".into()),
            lyrics: Some("P".into()),
            styles: Some("pop".into()),
            ..SongRecord::default()
        }
    );
    assert_eq!(extraction.url, URL);
    assert_eq!(extraction.diagnostics.strategies, vec![Strategy::LegacyEmbeddedJson]);
    let snippet: serde_json::Value =
        serde_json::from_str(extraction.candidate_snippet.as_deref().unwrap()).unwrap();
    assert_eq!(
        snippet,
        serde_json::json!({"title": "T", "display_name": "A", "metadata": {"prompt": "P", "tags": "pop"}})
    );
}

#[test]
fn meta_title_and_bracketed_lyrics_without_scripts() {
    let html = r#"<html><head><meta property="og:title" content="Meta Song"></head><body>
        <h1>Meta Song</h1>
        <p>[Verse]<br>Walking down the empty road<br>Counting every light<br><br>[Chorus]<br>We keep on driving through the night</p>
        <footer>Made with care</footer>
        </body></html>"#;

    let extraction = extract_page_lenient(&page(html), &SiteProfile::default());

    assert_eq!(extraction.record.title.as_deref(), Some("Meta Song"));
    assert_eq!(
        extraction.record.lyrics.as_deref(),
        Some("[Verse]\nWalking down the empty road\nCounting every light\n\n[Chorus]\nWe keep on driving through the night")
    );
    assert_eq!(extraction.record.styles, None);
    assert!(extraction.diagnostics.strategies.is_empty());
    assert_eq!(
        extraction.diagnostics.origin(Field::Lyrics).map(|o| o.source),
        Some("scan.section-markers")
    );
    assert_eq!(extraction.candidate_snippet, None);
}

#[test]
fn strict_mode_reports_not_found_without_payloads() {
    let html = r#"<html><head><meta property="og:title" content="Meta Song"></head>
        <body><script>{"broken": </script><p>[Verse]<br>words words words words words</p></body></html>"#;

    let outcome = extract_page(&page(html), &SiteProfile::default(), ExtractionMode::Strict);

    assert_eq!(outcome, ExtractionOutcome::NotFound { url: URL.to_string() });
}

#[test]
fn strict_mode_keeps_structured_fields_only() {
    let html = r#"<html><head><meta property="og:title" content="Meta Song"><meta property="og:image" content="https://cdn/i.png"></head>
        <body><script>{"display_name":"Generic Artist","audio_url":"https://cdn/a.mp3"}</script></body></html>"#;

    let outcome = extract_page(&page(html), &SiteProfile::default(), ExtractionMode::Strict);
    let extraction = outcome.extraction().expect("structured payload present");

    assert_eq!(extraction.record.title, None);
    assert_eq!(extraction.record.image_url, None);
    assert_eq!(extraction.record.artist.as_deref(), Some("Generic Artist"));
    assert_eq!(extraction.record.audio_url.as_deref(), Some("https://cdn/a.mp3"));
    assert_eq!(extraction.diagnostics.mode, ExtractionMode::Strict);
}

#[test]
fn legacy_title_wins_over_conflicting_sources() {
    let streamed = push_script(
        r#"7:{"clip":{"id":"c1","title":"Streamed title","metadata":{"tags":"rock"},"status":"complete"}}"#,
    );
    let html = format!(
        r#"<html><head><meta property="og:title" content="Meta title"><meta name="twitter:title" content="Twitter title"><title>Tag title | Suno</title></head><body>
        <script id="__NEXT_DATA__">{{"props":{{"pageProps":{{"song":{{"title":"Legacy title","metadata":{{}}}}}}}}}}</script>
        {streamed}
        <script>{{"title":"Generic title"}}</script>
        </body></html>"#
    );

    let extraction = extract_page_lenient(&page(&html), &SiteProfile::default());

    assert_eq!(extraction.record.title.as_deref(), Some("Legacy title"));
    let origin = extraction.diagnostics.origin(Field::Title).unwrap();
    assert_eq!(origin.source, "candidate.title");
    assert_eq!(origin.strategy, Some(Strategy::LegacyEmbeddedJson));
    // Styles are missing from the legacy payload, so the streamed clip supplies them.
    assert_eq!(extraction.record.styles.as_deref(), Some("rock"));
    assert_eq!(
        extraction.diagnostics.strategies,
        vec![
            Strategy::LegacyEmbeddedJson,
            Strategy::StreamedChunkJson,
            Strategy::GenericScriptJson
        ]
    );
}

#[test]
fn streamed_clip_with_lyrics_reference() {
    let clip = push_script(
        r#"9:["$","div",null,{"clip":{"id":"c9","title":"Reference Song","display_name":"Streamer","audio_url":"https://cdn/9.mp3","metadata":{"prompt":"$2b","negative_tags":"trap, lo-fi"},"status":"complete"}}]"#,
    );
    let persona = push_script("2b:T30,[Verse]\nthese are persona lyrics \"clip\" {}");
    let lyrics = push_script("2b:T30,[Verse]\nneon rivers in the rain\n[Chorus]\nhold on");
    let html = format!("<html><body>{clip}{persona}{lyrics}</body></html>");

    let extraction = extract_page_lenient(&page(&html), &SiteProfile::default());

    assert_eq!(extraction.record.title.as_deref(), Some("Reference Song"));
    assert_eq!(extraction.record.artist.as_deref(), Some("Streamer"));
    assert_eq!(
        extraction.record.lyrics.as_deref(),
        Some("[Verse]\nneon rivers in the rain\n[Chorus]\nhold on")
    );
    assert_eq!(extraction.record.styles.as_deref(), Some("NOT: trap, lo-fi"));
    assert_eq!(extraction.record.audio_url.as_deref(), Some("https://cdn/9.mp3"));
    assert_eq!(extraction.diagnostics.streamed_chunk_count, 3);
}

#[test]
fn arbitrary_markup_never_fails() {
    let inputs = [
        "",
        "not html at all {{{",
        "<script id=\"__NEXT_DATA__\"></script>",
        "<script>self.__next_f.push([1,\"unterminated</script>",
        "<script>self.__next_f.push(</script><script>{</script>",
        "<meta property=\"og:title\">",
    ];
    for html in inputs {
        let extraction = extract_page_lenient(&page(html), &SiteProfile::default());
        assert_eq!(extraction.url, URL);
        assert!(extraction.raw_html_snippet.len() <= html.len());
    }
}

#[test]
fn snippets_are_truncated() {
    let long_title = "x".repeat(700);
    let html = format!(
        r#"<html><body><script id="__NEXT_DATA__">{{"props":{{"pageProps":{{"song":{{"title":"{long_title}"}}}}}}}}</script>{}</body></html>"#,
        "<p>filler</p>".repeat(300)
    );

    let extraction = extract_page_lenient(&page(&html), &SiteProfile::default());

    assert_eq!(extraction.raw_html_snippet.chars().count(), 2_000);
    assert_eq!(extraction.candidate_snippet.unwrap().chars().count(), 500);
    assert_eq!(extraction.diagnostics.html_length, html.len());
    assert_eq!(extraction.diagnostics.script_count, 1);
}

#[test]
fn record_serializes_to_camel_case_json() {
    let html = r#"<script id="__NEXT_DATA__">{"props":{"pageProps":{"song":{"title":"T","audio_url":"https://cdn/a.mp3"}}}}</script>"#;
    let extraction = extract_page_lenient(&page(html), &SiteProfile::default());

    let json = serde_json::to_value(&extraction).unwrap();

    assert_eq!(json["title"], "T");
    assert_eq!(json["audioUrl"], "https://cdn/a.mp3");
    assert!(json["lyrics"].is_null());
    assert!(json["rawHtmlSnippet"].is_string());
    assert_eq!(json["diagnostics"]["strategies"][0], "legacy-embedded-json");
    assert_eq!(json["diagnostics"]["fields"][0]["field"], "title");
    assert_eq!(json["diagnostics"]["fields"][0]["populated"], true);
    assert_eq!(json["diagnostics"]["fields"][0]["origin"]["source"], "candidate.title");
}

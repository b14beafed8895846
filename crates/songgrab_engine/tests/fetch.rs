use std::sync::Arc;
use std::time::Duration;

use songgrab_engine::{
    EngineEvent, EngineHandle, ExtractionMode, ExtractionOutcome, FailureKind, FetchError,
    FetchSettings, Fetcher, Pipeline, RawPage, ReqwestFetcher, SiteProfile,
};
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SONG_HTML: &str = r#"<html><head><meta property="og:title" content="Served Song"></head><body>
<script id="__NEXT_DATA__">{"props":{"pageProps":{"song":{"display_name":"Served Artist","audio_url":"https://cdn/s.mp3"}}}}</script>
</body></html>"#;

async fn serve(server: &MockServer, route: &str, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(template)
        .mount(server)
        .await;
}

#[tokio::test]
async fn fetcher_returns_decoded_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/song/abc"))
        .and(header_exists("user-agent"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html>ok</html>", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let url = format!("{}/song/abc", server.uri());

    let page = fetcher.fetch(&url).await.expect("fetch ok");
    assert_eq!(page.url, url);
    assert_eq!(page.final_url, url);
    assert_eq!(page.html, "<html>ok</html>");
    assert_eq!(page.encoding_label, "UTF-8");
}

#[tokio::test]
async fn fetcher_fails_on_http_status() {
    let server = MockServer::start().await;
    serve(&server, "/song/missing", ResponseTemplate::new(404)).await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let url = format!("{}/song/missing", server.uri());

    let err = fetcher.fetch(&url).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(404));
}

#[tokio::test]
async fn fetcher_times_out_on_slow_response() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/song/slow",
        ResponseTemplate::new(200)
            .set_delay(Duration::from_millis(250))
            .set_body_raw("<html></html>", "text/html"),
    )
    .await;

    let settings = FetchSettings {
        request_timeout: Duration::from_millis(50),
        ..FetchSettings::default()
    };
    let fetcher = ReqwestFetcher::new(settings);
    let url = format!("{}/song/slow", server.uri());

    let err = fetcher.fetch(&url).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn fetcher_rejects_too_large_response() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/song/large",
        ResponseTemplate::new(200).set_body_raw("01234567890", "text/html"),
    )
    .await;

    let settings = FetchSettings {
        max_bytes: 10,
        ..FetchSettings::default()
    };
    let fetcher = ReqwestFetcher::new(settings);
    let url = format!("{}/song/large", server.uri());

    let err = fetcher.fetch(&url).await.unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::TooLarge {
            max_bytes: 10,
            actual: Some(11)
        }
    );
}

#[tokio::test]
async fn fetcher_rejects_non_html_content() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/song/json",
        ResponseTemplate::new(200).set_body_raw("{}", "application/json"),
    )
    .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let err = fetcher
        .fetch(&format!("{}/song/json", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err.kind, FailureKind::UnsupportedContentType { .. }));
}

async fn serve_redirect_chain(server: &MockServer) {
    for (from, to) in [("/song/hop1", "/song/hop2"), ("/song/hop2", "/song/landed")] {
        serve(
            server,
            from,
            ResponseTemplate::new(302).insert_header("location", format!("{}{to}", server.uri())),
        )
        .await;
    }
    serve(
        server,
        "/song/landed",
        ResponseTemplate::new(200).set_body_raw("<html>landed</html>", "text/html"),
    )
    .await;
}

#[tokio::test]
async fn fetcher_follows_redirects_up_to_the_limit() {
    let server = MockServer::start().await;
    serve_redirect_chain(&server).await;
    let url = format!("{}/song/hop1", server.uri());

    let settings = FetchSettings {
        redirect_limit: 2,
        ..FetchSettings::default()
    };
    let page = ReqwestFetcher::new(settings).fetch(&url).await.expect("two redirects allowed");
    assert_eq!(page.url, url);
    assert_eq!(page.final_url, format!("{}/song/landed", server.uri()));
    assert_eq!(page.html, "<html>landed</html>");

    let settings = FetchSettings {
        redirect_limit: 1,
        ..FetchSettings::default()
    };
    let err = ReqwestFetcher::new(settings).fetch(&url).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::RedirectLimitExceeded);
}

#[tokio::test]
async fn fetcher_rejects_invalid_url() {
    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let err = fetcher.fetch("not a url").await.unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);
}

#[tokio::test]
async fn pipeline_extracts_served_page() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/song/served",
        ResponseTemplate::new(200).set_body_raw(SONG_HTML, "text/html"),
    )
    .await;

    let pipeline = Pipeline::with_settings(FetchSettings::default(), SiteProfile::default());
    let url = format!("{}/song/served", server.uri());

    let extraction = pipeline.extract(&url).await.expect("extraction");
    assert_eq!(extraction.record.title.as_deref(), Some("Served Song"));
    assert_eq!(extraction.record.artist.as_deref(), Some("Served Artist"));
    assert_eq!(extraction.record.audio_url.as_deref(), Some("https://cdn/s.mp3"));

    let strict = pipeline.extract_strict(&url).await.expect("strict extraction");
    let strict = strict.expect("payload present");
    assert_eq!(strict.record.title, None);
    assert_eq!(strict.record.artist.as_deref(), Some("Served Artist"));
}

#[tokio::test]
async fn pipeline_surfaces_transport_failure() {
    let server = MockServer::start().await;
    serve(&server, "/song/down", ResponseTemplate::new(503)).await;

    let pipeline = Pipeline::with_settings(FetchSettings::default(), SiteProfile::default());
    let err = pipeline
        .extract(&format!("{}/song/down", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(503));
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn strict_pipeline_reports_missing_payload() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/song/bare",
        ResponseTemplate::new(200).set_body_raw("<html><title>Bare | Suno</title></html>", "text/html"),
    )
    .await;

    let pipeline = Pipeline::with_settings(FetchSettings::default(), SiteProfile::default());
    let url = format!("{}/song/bare", server.uri());
    assert_eq!(pipeline.extract_strict(&url).await.unwrap(), None);
    assert_eq!(
        pipeline.extract(&url).await.unwrap().record.title.as_deref(),
        Some("Bare")
    );
}

/// Serves one fixed page for every URL.
struct SavedPage(&'static str);

#[async_trait::async_trait]
impl Fetcher for SavedPage {
    async fn fetch(&self, url: &str) -> Result<RawPage, FetchError> {
        Ok(RawPage::from_html(url, self.0))
    }
}

#[tokio::test]
async fn pipeline_accepts_any_fetcher() {
    let pipeline = Pipeline::new(Arc::new(SavedPage(SONG_HTML)), SiteProfile::default());
    let outcome = pipeline
        .run("https://suno.com/song/saved", ExtractionMode::Strict)
        .await
        .unwrap();
    let extraction = outcome.extraction().expect("legacy payload");
    assert_eq!(extraction.record.artist.as_deref(), Some("Served Artist"));
    assert_eq!(extraction.diagnostics.final_url, "https://suno.com/song/saved");

    let bare = Pipeline::new(Arc::new(SavedPage("<p>nothing here</p>")), SiteProfile::default());
    assert_eq!(
        bare.run("https://suno.com/song/bare", ExtractionMode::Strict).await.unwrap(),
        ExtractionOutcome::NotFound {
            url: "https://suno.com/song/bare".to_string()
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn engine_reports_each_job() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/song/one",
        ResponseTemplate::new(200).set_body_raw(SONG_HTML, "text/html"),
    )
    .await;
    serve(&server, "/song/two", ResponseTemplate::new(500)).await;

    let pipeline = Pipeline::with_settings(FetchSettings::default(), SiteProfile::default());
    let engine = EngineHandle::new(pipeline).expect("runtime");
    engine.enqueue(1, format!("{}/song/one", server.uri()), ExtractionMode::Lenient);
    engine.enqueue(2, format!("{}/song/two", server.uri()), ExtractionMode::Lenient);

    let events = tokio::task::spawn_blocking(move || {
        let events: Vec<EngineEvent> = (0..2).filter_map(|_| engine.recv()).collect();
        events
    })
    .await
    .unwrap();

    assert_eq!(events.len(), 2);
    for event in events {
        let EngineEvent::Completed { job_id, result, .. } = event;
        match job_id {
            1 => assert!(matches!(result, Ok(ExtractionOutcome::Found(_)))),
            2 => assert_eq!(result.unwrap_err().kind, FailureKind::HttpStatus(500)),
            other => panic!("unexpected job {other}"),
        }
    }
}

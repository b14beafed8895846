use std::sync::Arc;

use engine_logging::{engine_debug, engine_info};
use scraper::Html;

use crate::assemble::{assemble, SongExtraction};
use crate::fetch::{FetchSettings, Fetcher, ReqwestFetcher};
use crate::locate::{locate, LocatedData};
use crate::resolve::{resolve, ResolveContext};
use crate::site::SiteProfile;
use crate::{ExtractionMode, FetchError, RawPage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Found(Box<SongExtraction>),
    /// Strict mode found no parsable structured payload.
    NotFound { url: String },
}

impl ExtractionOutcome {
    pub fn extraction(&self) -> Option<&SongExtraction> {
        match self {
            ExtractionOutcome::Found(extraction) => Some(extraction.as_ref()),
            ExtractionOutcome::NotFound { .. } => None,
        }
    }
}

/// Run locator, resolver and assembler over an already fetched page.
///
/// Never fails: unrecognized markup only leaves fields empty. In strict mode a
/// page without any structured payload is reported as not found.
pub fn extract_page(page: &RawPage, site: &SiteProfile, mode: ExtractionMode) -> ExtractionOutcome {
    let document = Html::parse_document(&page.html);
    let located = locate(&document);

    if mode == ExtractionMode::Strict && located.candidates.is_empty() {
        engine_debug!("pipeline: no structured payload in {}", page.url);
        return ExtractionOutcome::NotFound {
            url: page.url.clone(),
        };
    }
    ExtractionOutcome::Found(Box::new(build(page, site, &document, &located, mode)))
}

/// Lenient extraction of an already fetched page.
pub fn extract_page_lenient(page: &RawPage, site: &SiteProfile) -> SongExtraction {
    let document = Html::parse_document(&page.html);
    let located = locate(&document);
    build(page, site, &document, &located, ExtractionMode::Lenient)
}

fn build(
    page: &RawPage,
    site: &SiteProfile,
    document: &Html,
    located: &LocatedData,
    mode: ExtractionMode,
) -> SongExtraction {
    let ctx = ResolveContext::new(&located.candidates, &located.chunks, document, &page.html, site);
    let resolution = resolve(&ctx, mode);
    let extraction = assemble(page, located, resolution, mode);

    let populated = extraction
        .diagnostics
        .fields
        .iter()
        .filter(|report| report.populated)
        .count();
    engine_info!(
        "pipeline: {} done, {} fields populated, strategies {:?}",
        page.url,
        populated,
        extraction.diagnostics.strategies
    );
    extraction
}

/// Fetch → locate → resolve → assemble for one URL at a time.
#[derive(Clone)]
pub struct Pipeline {
    fetcher: Arc<dyn Fetcher>,
    site: SiteProfile,
}

impl Pipeline {
    pub fn new(fetcher: Arc<dyn Fetcher>, site: SiteProfile) -> Self {
        Self { fetcher, site }
    }

    pub fn with_settings(settings: FetchSettings, site: SiteProfile) -> Self {
        Self::new(Arc::new(ReqwestFetcher::new(settings)), site)
    }

    /// Lenient extraction; only transport failures are errors.
    pub async fn extract(&self, url: &str) -> Result<SongExtraction, FetchError> {
        engine_info!("pipeline: extracting {}", url);
        let page = self.fetcher.fetch(url).await?;
        Ok(extract_page_lenient(&page, &self.site))
    }

    /// Strict extraction; `None` when the page has no structured payload.
    pub async fn extract_strict(&self, url: &str) -> Result<Option<SongExtraction>, FetchError> {
        Ok(match self.run(url, ExtractionMode::Strict).await? {
            ExtractionOutcome::Found(extraction) => Some(*extraction),
            ExtractionOutcome::NotFound { .. } => None,
        })
    }

    pub async fn run(&self, url: &str, mode: ExtractionMode) -> Result<ExtractionOutcome, FetchError> {
        engine_info!("pipeline: extracting {} ({:?})", url, mode);
        let page = self.fetcher.fetch(url).await?;
        Ok(extract_page(&page, &self.site, mode))
    }
}

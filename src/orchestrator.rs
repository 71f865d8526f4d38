//! Extraction entry point: detect, wait, extract, report.

use crate::config::ScoutConfig;
use crate::detect::detect_url;
use crate::error::{Result, ScoutError};
use crate::models::{marketplace_name, FetchProgress, Listing, Marketplace};
use crate::page::PageContext;
use crate::readiness::{wait_until_ready, Readiness};
use crate::scrapers::{ExtractOptions, ExtractorRegistry, SearchOptions};
use chrono::Utc;
use scraper::Html;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

/// Where the most recent operation is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractionState {
    #[default]
    Idle,
    Detecting,
    Waiting,
    Extracting,
    Succeeded,
    Cancelled,
    Failed,
}

/// Terminal result of an operation that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    Completed(Vec<Listing>),
    /// Stopped by a cancel; whatever was gathered first
    Cancelled(Vec<Listing>),
}

impl ExtractionOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    pub fn listings(&self) -> &[Listing] {
        match self {
            Self::Completed(listings) | Self::Cancelled(listings) => listings,
        }
    }

    pub fn into_listings(self) -> Vec<Listing> {
        match self {
            Self::Completed(listings) | Self::Cancelled(listings) => listings,
        }
    }
}

/// Receives progress reports while an operation runs
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: FetchProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(FetchProgress) + Send + Sync,
{
    fn report(&self, progress: FetchProgress) {
        self(progress)
    }
}

/// Discards progress
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _progress: FetchProgress) {}
}

/// Handle on the operation started by [`OperationSession::begin`]
#[derive(Debug, Clone)]
pub struct OperationTicket {
    pub generation: u64,
    pub token: CancellationToken,
}

/// Holds the single in-flight operation's cancellation token.
///
/// Beginning an operation cancels whatever was running before it.
#[derive(Debug, Default)]
pub struct OperationSession {
    current: Mutex<Option<OperationTicket>>,
    generations: AtomicU64,
}

impl OperationSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<OperationTicket>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Supersede the active operation and start a new one
    pub fn begin(&self) -> OperationTicket {
        let ticket = OperationTicket {
            generation: self.generations.fetch_add(1, Ordering::SeqCst) + 1,
            token: CancellationToken::new(),
        };
        if let Some(previous) = self.lock().replace(ticket.clone()) {
            debug!("Superseding operation {}", previous.generation);
            previous.token.cancel();
        }
        ticket
    }

    /// Cancel the active operation, if any. Returns whether one was running.
    pub fn cancel(&self) -> bool {
        match self.lock().take() {
            Some(active) => {
                info!("Cancelling operation {}", active.generation);
                active.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Clear the slot if `generation` still owns it
    pub fn finish(&self, generation: u64) {
        let mut current = self.lock();
        if current.as_ref().is_some_and(|t| t.generation == generation) {
            *current = None;
        }
    }

    pub fn is_active(&self) -> bool {
        self.lock().is_some()
    }

    /// Whether no operation has begun since `generation`
    pub fn is_latest(&self, generation: u64) -> bool {
        self.generations.load(Ordering::SeqCst) == generation
    }
}

/// Parse a snapshot and run the matching extractor, with one generic retry.
///
/// The retry only happens when a site extractor ran, found nothing, and
/// the operation was not cancelled.
pub fn extract_snapshot(
    registry: &ExtractorRegistry,
    html: &str,
    options: &ExtractOptions,
) -> Result<Vec<Listing>> {
    let document = Html::parse_document(html);
    let name = marketplace_name(options.marketplace);
    let fail = |e: anyhow::Error| {
        error!("Extraction failed for {}: {:#}", name, e);
        ScoutError::extraction(name, format!("{e:#}"))
    };

    if let Some(site) = registry.site(options.marketplace) {
        let listings = site.extract(&document, options).map_err(fail)?;
        if !listings.is_empty() || options.cancel.is_cancelled() {
            return Ok(listings);
        }
        info!(
            "{} extractor found no listings, retrying with generic extraction",
            site.name()
        );
    }

    registry.generic().extract(&document, options).map_err(fail)
}

/// Runs extractions against one page
pub struct ExtractionOrchestrator {
    page: Arc<dyn PageContext>,
    registry: Arc<ExtractorRegistry>,
    config: ScoutConfig,
    session: Arc<OperationSession>,
    state: Mutex<ExtractionState>,
}

impl ExtractionOrchestrator {
    pub fn new(page: Arc<dyn PageContext>, config: ScoutConfig) -> Self {
        Self::with_registry(page, Arc::new(ExtractorRegistry::default()), config)
    }

    pub fn with_registry(
        page: Arc<dyn PageContext>,
        registry: Arc<ExtractorRegistry>,
        config: ScoutConfig,
    ) -> Self {
        Self {
            page,
            registry,
            config,
            session: Arc::new(OperationSession::new()),
            state: Mutex::new(ExtractionState::Idle),
        }
    }

    pub fn page(&self) -> &Arc<dyn PageContext> {
        &self.page
    }

    pub fn config(&self) -> &ScoutConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<OperationSession> {
        &self.session
    }

    pub fn state(&self) -> ExtractionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `state` for operation `generation`. A superseded operation
    /// no longer owns the slot and its writes are dropped.
    fn set_state(&self, generation: u64, state: ExtractionState) {
        let mut slot = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.session.is_latest(generation) {
            debug!("Operation {} superseded, not recording {:?}", generation, state);
            return;
        }
        debug!("Extraction state -> {:?}", state);
        *slot = state;
    }

    /// Abort whatever extraction or search is in flight
    pub fn cancel(&self) -> bool {
        self.session.cancel()
    }

    /// Display name of the page's marketplace, `None` when unrecognized
    pub async fn current_marketplace(&self) -> Result<Option<String>> {
        let (_, marketplace) = self.locate().await?;
        Ok(marketplace.map(|m| m.display_name().to_string()))
    }

    pub(crate) async fn locate(&self) -> Result<(Url, Option<Marketplace>)> {
        let raw = self.page.url().await?;
        let url = Url::parse(&raw)
            .map_err(|e| ScoutError::transport(format!("Page reported an invalid URL {raw:?}: {e}")))?;
        let marketplace = detect_url(&url);
        Ok((url, marketplace))
    }

    /// Extract listings from the page as it is now, superseding any
    /// operation already in flight.
    pub async fn extract_listings(&self, progress: &dyn ProgressSink) -> Result<ExtractionOutcome> {
        let ticket = self.session.begin();
        let result = self.run_extraction(&ticket, None, progress).await;
        self.session.finish(ticket.generation);
        result
    }

    /// The extraction pipeline under an already-issued ticket. `filter` is
    /// applied to the batch before progress is reported.
    pub(crate) async fn run_extraction(
        &self,
        ticket: &OperationTicket,
        filter: Option<&SearchOptions>,
        progress: &dyn ProgressSink,
    ) -> Result<ExtractionOutcome> {
        let token = &ticket.token;
        let set_state = |state| self.set_state(ticket.generation, state);
        set_state(ExtractionState::Detecting);
        let (url, marketplace) = match self.locate().await {
            Ok(located) => located,
            Err(e) => {
                set_state(ExtractionState::Failed);
                return Err(e);
            }
        };
        info!("Extracting from {} ({})", url, marketplace_name(marketplace));

        set_state(ExtractionState::Waiting);
        let extractor = self.registry.for_marketplace(marketplace);
        let probe = |document: &Html| extractor.is_ready(document);
        let readiness = wait_until_ready(
            self.page.as_ref(),
            &probe,
            token,
            self.config.ready_timeout(),
            self.config.ready_poll_interval(),
        )
        .await;
        match readiness {
            Readiness::Ready => {}
            Readiness::TimedOut => warn!(
                "No {} results appeared within {}ms, extracting anyway",
                extractor.name(),
                self.config.ready_timeout_ms
            ),
            Readiness::Cancelled => {
                set_state(ExtractionState::Cancelled);
                return Ok(ExtractionOutcome::Cancelled(Vec::new()));
            }
        }

        set_state(ExtractionState::Extracting);
        let html = match self.page.html().await {
            Ok(html) => html,
            Err(e) => {
                set_state(ExtractionState::Failed);
                return Err(e);
            }
        };

        let options = ExtractOptions {
            page_url: url,
            marketplace,
            now: Utc::now(),
            cancel: token.clone(),
            max_ancestor_steps: self.config.max_ancestor_steps,
            max_candidates: self.config.generic_max_candidates,
        };
        let listings = match extract_snapshot(&self.registry, &html, &options) {
            Ok(listings) => match filter {
                Some(filter) => filter.apply(listings),
                None => listings,
            },
            Err(e) => {
                set_state(ExtractionState::Failed);
                return Err(e);
            }
        };

        if token.is_cancelled() {
            info!("Extraction cancelled with {} listings gathered", listings.len());
            set_state(ExtractionState::Cancelled);
            return Ok(ExtractionOutcome::Cancelled(listings));
        }

        progress.report(FetchProgress::completed(listings.len()));
        info!("Extracted {} listings", listings.len());
        set_state(ExtractionState::Succeeded);
        Ok(ExtractionOutcome::Completed(listings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UNKNOWN_MARKETPLACE;

    fn options(url: &str, marketplace: Option<Marketplace>) -> ExtractOptions {
        ExtractOptions::new(Url::parse(url).unwrap(), marketplace)
    }

    const CARD_PAGE: &str = r#"<html><body>
        <div class="product-card">
            <a href="/p/1"><img src="/p/1.jpg"></a>
            <h3>Vintage leather armchair</h3>
            <span>$120</span>
        </div>
    </body></html>"#;

    #[test]
    fn test_site_miss_falls_back_to_generic() {
        let registry = ExtractorRegistry::default();
        let listings = extract_snapshot(
            &registry,
            CARD_PAGE,
            &options("https://www.ebay.com/sch/i.html?_nkw=chair", Some(Marketplace::Ebay)),
        )
        .unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].marketplace, "eBay");
    }

    #[test]
    fn test_unknown_page_goes_generic() {
        let registry = ExtractorRegistry::default();
        let listings =
            extract_snapshot(&registry, CARD_PAGE, &options("https://shop.example.com/", None)).unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].marketplace, UNKNOWN_MARKETPLACE);
    }

    #[test]
    fn test_no_fallback_once_cancelled() {
        let registry = ExtractorRegistry::default();
        let opts = options("https://www.ebay.com/", Some(Marketplace::Ebay));
        opts.cancel.cancel();
        assert!(extract_snapshot(&registry, CARD_PAGE, &opts).unwrap().is_empty());
    }

    #[test]
    fn test_session_supersedes_previous() {
        let session = OperationSession::new();
        let first = session.begin();
        let second = session.begin();

        assert!(first.token.is_cancelled());
        assert!(!second.token.is_cancelled());
        assert!(second.generation > first.generation);

        // A stale finish must not clear the newer operation
        session.finish(first.generation);
        assert!(session.is_active());

        assert!(!session.is_latest(first.generation));
        assert!(session.is_latest(second.generation));

        assert!(session.cancel());
        assert!(second.token.is_cancelled());
        assert!(!session.cancel());
        // A plain cancel does not start a newer operation
        assert!(session.is_latest(second.generation));
    }
}

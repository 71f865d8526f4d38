use crate::models::{Listing, Marketplace};
use anyhow::Result;
use chrono::{DateTime, Utc};
use scraper::Html;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Per-call inputs shared by every extractor
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Location of the document; relative links resolve against it
    pub page_url: Url,
    /// Marketplace detected for the page, if any
    pub marketplace: Option<Marketplace>,
    /// Reference time for relative dates
    pub now: DateTime<Utc>,
    pub cancel: CancellationToken,
    pub max_ancestor_steps: usize,
    pub max_candidates: usize,
}

impl ExtractOptions {
    pub fn new(page_url: Url, marketplace: Option<Marketplace>) -> Self {
        Self {
            page_url,
            marketplace,
            now: Utc::now(),
            cancel: CancellationToken::new(),
            max_ancestor_steps: 10,
            max_candidates: 50,
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Stamp shared by every id in one batch
    pub(crate) fn batch_stamp(&self) -> i64 {
        self.now.timestamp_millis()
    }
}

/// Common trait for all listing extractors.
/// Adding a marketplace means implementing this and registering it.
pub trait ListingExtractor: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Whether the document already shows results this extractor understands
    fn is_ready(&self, document: &Html) -> bool;

    /// Map every listing-shaped element in `document` to a [`Listing`].
    ///
    /// Candidates that fail validation are skipped. On cancellation the
    /// listings gathered so far are returned. An `Err` means the extractor
    /// itself is broken, not that the page was empty.
    fn extract(&self, document: &Html, options: &ExtractOptions) -> Result<Vec<Listing>>;
}

//! Marketplace listing extraction: finds listing-shaped elements on
//! Facebook Marketplace, Craigslist, eBay, and unknown pages, and
//! normalizes them into [`Listing`] records.

pub mod config;
pub mod detect;
pub mod error;
pub mod heuristics;
pub mod messaging;
pub mod models;
pub mod orchestrator;
pub mod page;
pub mod readiness;
pub mod scrapers;
pub mod search;
pub mod storage;

pub use config::ScoutConfig;
pub use detect::detect;
pub use error::{Result, ScoutError};
pub use models::{FetchProgress, Listing, Marketplace};
pub use orchestrator::{
    ExtractionOrchestrator, ExtractionOutcome, ExtractionState, NoProgress, OperationSession,
    ProgressSink,
};
pub use page::{BrowserPage, HttpPage, PageContext, SearchPlan, StaticPage};
pub use scrapers::{ExtractorRegistry, SearchOptions, SortKey};
pub use search::SearchOrchestrator;
pub use storage::{JsonFileStorage, MemoryStorage, StorageRepo};

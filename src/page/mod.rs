//! Page contexts: the live document the core reads and interacts with.

pub mod browser;
pub mod http;

pub use browser::BrowserPage;
pub use http::HttpPage;

use crate::error::{Result, ScoutError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

/// How to drive a page's own search box
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SearchPlan {
    pub query: String,
    /// Locates the input on the live page
    pub input_selector: String,
    pub input_name: Option<String>,
    /// Absolute action URL of the enclosing form, if any
    pub form_action: Option<String>,
    pub form_method: String,
    /// Submit control inside the enclosing form, if any
    pub submit_selector: Option<String>,
}

/// The document's execution context
#[async_trait]
pub trait PageContext: Send + Sync {
    /// Current location of the page
    async fn url(&self) -> Result<String>;

    /// Serialized snapshot of the current document
    async fn html(&self) -> Result<String>;

    /// Fill and submit the page's search box. `Ok(false)` means the page
    /// could not act on the plan.
    async fn perform_search(&self, plan: &SearchPlan) -> Result<bool>;
}

#[derive(Debug)]
struct StaticState {
    url: String,
    html: String,
    search_results: Option<String>,
    searches: Vec<SearchPlan>,
    closed: bool,
}

/// A fixed document, optionally replaced when a search is performed.
/// Backs file input and tests.
#[derive(Debug)]
pub struct StaticPage {
    state: Mutex<StaticState>,
}

impl StaticPage {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(StaticState {
                url: url.into(),
                html: html.into(),
                search_results: None,
                searches: Vec::new(),
                closed: false,
            }),
        }
    }

    /// Document shown once a search has been submitted
    pub fn with_search_results(self, html: impl Into<String>) -> Self {
        self.lock().search_results = Some(html.into());
        self
    }

    pub fn set_html(&self, html: impl Into<String>) {
        self.lock().html = html.into();
    }

    /// Simulate the page going away (navigation, tab closed)
    pub fn close(&self) {
        self.lock().closed = true;
    }

    /// Search plans performed so far
    pub fn searches(&self) -> Vec<SearchPlan> {
        self.lock().searches.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StaticState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open_state(&self) -> Result<std::sync::MutexGuard<'_, StaticState>> {
        let state = self.lock();
        if state.closed {
            return Err(ScoutError::transport("The page is no longer available"));
        }
        Ok(state)
    }
}

#[async_trait]
impl PageContext for StaticPage {
    async fn url(&self) -> Result<String> {
        Ok(self.open_state()?.url.clone())
    }

    async fn html(&self) -> Result<String> {
        Ok(self.open_state()?.html.clone())
    }

    async fn perform_search(&self, plan: &SearchPlan) -> Result<bool> {
        let mut state = self.open_state()?;
        state.searches.push(plan.clone());
        if let Some(results) = state.search_results.take() {
            state.html = results;
        }
        Ok(true)
    }
}

//! Drives a marketplace's own search box, then hands off to extraction.

use crate::error::{Result, ScoutError};
use crate::orchestrator::{ExtractionOrchestrator, ExtractionOutcome, OperationTicket, ProgressSink};
use crate::page::SearchPlan;
use crate::readiness::{wait_until_ready, Readiness};
use crate::scrapers::SearchOptions;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

static INPUTS: Lazy<Selector> = Lazy::new(|| Selector::parse("input").unwrap());

// Broad "results are on screen" signal used after submitting
static RESULTS_LIKE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"[class*="result"], [class*="item"], [class*="listing"]"#).unwrap()
});

const SEARCH_NAMES: &[&str] = &["q", "query", "_nkw", "keywords"];

const NON_TEXT_TYPES: &[&str] = &[
    "hidden", "submit", "button", "checkbox", "radio", "image", "reset", "file", "password",
];

fn css_quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn attr_lower(el: ElementRef, name: &str) -> Option<String> {
    el.value().attr(name).map(str::to_lowercase)
}

/// Lower is better; `None` means "not a search box"
fn search_rank(input: ElementRef) -> Option<u8> {
    let kind = attr_lower(input, "type").unwrap_or_default();
    if NON_TEXT_TYPES.contains(&kind.as_str()) {
        return None;
    }
    if kind == "search" {
        return Some(0);
    }
    if let Some(name) = attr_lower(input, "name") {
        if name.contains("search") || SEARCH_NAMES.contains(&name.as_str()) {
            return Some(1);
        }
    }
    if attr_lower(input, "placeholder").is_some_and(|p| p.contains("search")) {
        return Some(2);
    }
    if attr_lower(input, "aria-label").is_some_and(|a| a.contains("search")) {
        return Some(3);
    }
    None
}

/// A selector that finds `el` again on the live page
fn element_selector(el: ElementRef, tag: &str) -> Option<String> {
    ["id", "name", "placeholder", "aria-label"]
        .iter()
        .find_map(|attr| {
            el.value()
                .attr(attr)
                .filter(|v| !v.is_empty())
                .map(|v| format!("{tag}[{attr}={}]", css_quote(v)))
        })
}

fn enclosing_form(el: ElementRef) -> Option<ElementRef> {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "form")
}

fn submit_selector(form: ElementRef) -> Option<String> {
    let submit = form.descendants().filter_map(ElementRef::wrap).find(|el| {
        let kind = attr_lower(*el, "type");
        match el.value().name() {
            "button" => kind.as_deref().map_or(true, |k| k == "submit"),
            "input" => matches!(kind.as_deref(), Some("submit") | Some("image")),
            _ => false,
        }
    })?;

    let tag = submit.value().name();
    if let Some(id) = submit.value().attr("id").filter(|v| !v.is_empty()) {
        return Some(format!("{tag}[id={}]", css_quote(id)));
    }

    let scope = ["id", "action", "name"]
        .iter()
        .find_map(|attr| {
            form.value()
                .attr(attr)
                .filter(|v| !v.is_empty())
                .map(|v| format!("form[{attr}={}]", css_quote(v)))
        })
        .unwrap_or_else(|| "form".to_string());
    let kind = match submit.value().attr("type") {
        Some(t) => format!("{tag}[type={}]", css_quote(t)),
        None => tag.to_string(),
    };
    Some(format!("{scope} {kind}"))
}

/// Best-guess search box on the page, with how to submit it
pub fn locate_search_input(document: &Html, page_url: &Url, query: &str) -> Option<SearchPlan> {
    let (_, input) = document
        .select(&INPUTS)
        .filter_map(|input| search_rank(input).map(|rank| (rank, input)))
        .min_by_key(|(rank, _)| *rank)?;

    let input_selector = element_selector(input, "input").unwrap_or_else(|| "input[type=\"search\"]".to_string());
    let form = enclosing_form(input);

    Some(SearchPlan {
        query: query.to_string(),
        input_selector,
        input_name: input.value().attr("name").map(str::to_string),
        form_action: form
            .and_then(|f| f.value().attr("action"))
            .and_then(|action| page_url.join(action).ok())
            .map(|u| u.to_string()),
        form_method: form
            .and_then(|f| f.value().attr("method"))
            .unwrap_or("get")
            .to_lowercase(),
        submit_selector: form.and_then(submit_selector),
    })
}

fn plan_from_snapshot(html: &str, page_url: &Url, query: &str) -> Option<SearchPlan> {
    locate_search_input(&Html::parse_document(html), page_url, query)
}

fn results_like(document: &Html) -> bool {
    document.select(&RESULTS_LIKE).next().is_some()
}

/// Searches the current page's marketplace for a query
pub struct SearchOrchestrator {
    extraction: Arc<ExtractionOrchestrator>,
}

impl SearchOrchestrator {
    pub fn new(extraction: Arc<ExtractionOrchestrator>) -> Self {
        Self { extraction }
    }

    /// Fill and submit the page's search box, wait for results, extract,
    /// and filter the batch by `options`. Any operation already in flight
    /// is superseded first.
    ///
    /// Fails with [`ScoutError::UnrecognizedSource`] before interacting with
    /// a page that is not a known marketplace.
    pub async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
        progress: &dyn ProgressSink,
    ) -> Result<ExtractionOutcome> {
        let session = Arc::clone(self.extraction.session());
        let ticket = session.begin();
        let result = self.run_search(query, options, &ticket, progress).await;
        session.finish(ticket.generation);
        result
    }

    async fn run_search(
        &self,
        query: &str,
        options: &SearchOptions,
        ticket: &OperationTicket,
        progress: &dyn ProgressSink,
    ) -> Result<ExtractionOutcome> {
        let token = &ticket.token;
        let (url, marketplace) = self.extraction.locate().await?;
        let Some(marketplace) = marketplace else {
            warn!("Refusing to search unrecognized page {}", url);
            return Err(ScoutError::UnrecognizedSource { url: url.to_string() });
        };
        info!("Searching {} for {:?}", marketplace, query);

        let page = self.extraction.page();
        let html = page.html().await?;

        match plan_from_snapshot(&html, &url, query) {
            Some(plan) => {
                debug!("Using search input {}", plan.input_selector);
                // Submitting may block on navigation; a cancel must not wait for it
                let accepted = tokio::select! {
                    _ = token.cancelled() => {
                        info!("Search cancelled while submitting");
                        return Ok(ExtractionOutcome::Cancelled(Vec::new()));
                    }
                    accepted = page.perform_search(&plan) => accepted?,
                };
                if !accepted {
                    warn!("Page did not accept the search; extracting what is shown");
                }
            }
            None => warn!("No search input found on {}; extracting what is shown", url),
        }

        if token.is_cancelled() {
            return Ok(ExtractionOutcome::Cancelled(Vec::new()));
        }

        let config = self.extraction.config();
        let readiness = wait_until_ready(
            page.as_ref(),
            &results_like,
            token,
            config.search_timeout(),
            config.search_poll_interval(),
        )
        .await;
        if readiness == Readiness::Cancelled {
            return Ok(ExtractionOutcome::Cancelled(Vec::new()));
        }

        self.extraction
            .run_extraction(ticket, Some(options), progress)
            .await
    }
}

use async_trait::async_trait;
use marketplace_scout::{
    ExtractionOrchestrator, ExtractionOutcome, FetchProgress, NoProgress, PageContext,
    ScoutConfig, SearchOptions, SearchOrchestrator, SearchPlan, SortKey, StaticPage,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn fast_config() -> ScoutConfig {
    ScoutConfig {
        ready_timeout_ms: 200,
        ready_poll_interval_ms: 10,
        search_timeout_ms: 200,
        search_poll_interval_ms: 10,
        ..Default::default()
    }
}

const EBAY_HOME: &str = r#"<html><body>
    <header>
        <form id="gh-f" action="https://www.ebay.com/sch/i.html" method="get">
            <input type="hidden" name="_from" value="R40">
            <input id="gh-ac" type="text" name="_nkw" placeholder="Search for anything">
            <input id="gh-btn" type="submit" value="Search">
        </form>
    </header>
    <main><p>Daily deals</p></main>
</body></html>"#;

fn ebay_item(id: u32, title: &str, price: &str) -> String {
    format!(
        r#"<li class="s-item"><div class="s-item__wrapper">
            <div class="s-item__image-section"><img src="https://i.ebayimg.com/images/g/{id}/s-l225.jpg"></div>
            <div class="s-item__info">
                <a class="s-item__link" href="https://www.ebay.com/itm/{id}"><div class="s-item__title"><span>{title}</span></div></a>
                <span class="s-item__price">{price}</span>
            </div>
        </div></li>"#
    )
}

fn ebay_results() -> String {
    format!(
        r#"<html><body><ul class="srp-results">{}{}{}</ul></body></html>"#,
        ebay_item(1, "Brass desk lamp, working", "$25.00"),
        ebay_item(2, "Banker's lamp with green shade", "$40.00"),
        ebay_item(3, "Art deco floor lamp", "$120.00"),
    )
}

fn search_setup(url: &str, html: &str, results: Option<String>) -> (Arc<StaticPage>, SearchOrchestrator) {
    let mut page = StaticPage::new(url, html);
    if let Some(results) = results {
        page = page.with_search_results(results);
    }
    let page = Arc::new(page);
    let extraction = Arc::new(ExtractionOrchestrator::new(page.clone(), fast_config()));
    (page, SearchOrchestrator::new(extraction))
}

#[tokio::test]
async fn test_search_fills_form_then_extracts_filtered() {
    let (page, search) = search_setup("https://www.ebay.com/", EBAY_HOME, Some(ebay_results()));
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let events = Arc::clone(&events);
        move |progress: FetchProgress| events.lock().unwrap().push(progress)
    };
    let options = SearchOptions {
        max_price: Some(50.0),
        sort_by: Some(SortKey::Price),
        ..Default::default()
    };

    let outcome = search.search("desk lamp", &options, &sink).await.unwrap();

    let searches = page.searches();
    assert_eq!(searches.len(), 1);
    assert_eq!(searches[0].query, "desk lamp");
    assert_eq!(searches[0].input_selector, r#"input[id="gh-ac"]"#);
    assert_eq!(searches[0].input_name.as_deref(), Some("_nkw"));
    assert_eq!(searches[0].submit_selector.as_deref(), Some(r#"input[id="gh-btn"]"#));

    let titles: Vec<_> = outcome.listings().iter().map(|l| l.title.as_str()).collect();
    assert_eq!(titles, vec!["Brass desk lamp, working", "Banker's lamp with green shade"]);
    assert!(!outcome.is_cancelled());
    assert_eq!(*events.lock().unwrap(), vec![FetchProgress::completed(2)]);
}

#[tokio::test]
async fn test_unknown_page_fails_before_touching_it() {
    let (page, search) = search_setup("https://shop.example.com/", EBAY_HOME, None);

    let err = search
        .search("lamp", &SearchOptions::default(), &NoProgress)
        .await
        .unwrap_err();

    assert!(err.is_unrecognized_source());
    assert!(page.searches().is_empty());
}

#[tokio::test]
async fn test_missing_search_box_still_extracts() {
    let html = r#"<html><body><ol>
        <li class="cl-static-search-result" title="Standing desk frame">
            <a href="https://seattle.craigslist.org/est/fuo/d/standing-desk/7711111111.html">
                <div class="title">Standing desk frame</div>
                <div class="details"><div class="price">$80</div><div class="location">Bellevue</div></div>
            </a>
        </li>
    </ol></body></html>"#;
    let (page, search) = search_setup("https://seattle.craigslist.org/search/sss", html, None);

    let outcome = search
        .search("desk", &SearchOptions::default(), &NoProgress)
        .await
        .unwrap();

    assert!(page.searches().is_empty());
    match outcome {
        ExtractionOutcome::Completed(listings) => {
            assert_eq!(listings.len(), 1);
            assert_eq!(listings[0].marketplace, "Craigslist");
        }
        other => panic!("expected completion, got {other:?}"),
    }
}

#[tokio::test]
async fn test_search_supersedes_running_extraction() {
    let page = Arc::new(StaticPage::new(
        "https://www.ebay.com/",
        "<html><body>Loading…</body></html>",
    ));
    let config = ScoutConfig {
        ready_timeout_ms: 5_000,
        ..fast_config()
    };
    let extraction = Arc::new(ExtractionOrchestrator::new(page, config));
    let search = SearchOrchestrator::new(Arc::clone(&extraction));

    let running = {
        let extraction = Arc::clone(&extraction);
        tokio::spawn(async move { extraction.extract_listings(&NoProgress).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    // Shares the extraction's session, so starting it cancels the extraction
    let search_task = tokio::spawn(async move {
        search.search("lamp", &SearchOptions::default(), &NoProgress).await
    });

    assert!(running.await.unwrap().unwrap().is_cancelled());
    extraction.cancel();
    assert!(search_task.await.unwrap().unwrap().is_cancelled());
}

/// A page whose search submit never finishes, and whose URL lookups can
/// be made to hang
struct StuckPage {
    inner: StaticPage,
    url_stuck: AtomicBool,
}

impl StuckPage {
    fn new(url: &str, html: &str) -> Self {
        Self {
            inner: StaticPage::new(url, html),
            url_stuck: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl PageContext for StuckPage {
    async fn url(&self) -> marketplace_scout::Result<String> {
        if self.url_stuck.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.inner.url().await
    }

    async fn html(&self) -> marketplace_scout::Result<String> {
        self.inner.html().await
    }

    async fn perform_search(&self, _plan: &SearchPlan) -> marketplace_scout::Result<bool> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn test_cancel_during_submit_settles_promptly() {
    let page = Arc::new(StuckPage::new("https://www.ebay.com/", EBAY_HOME));
    let extraction = Arc::new(ExtractionOrchestrator::new(page, fast_config()));
    let search = SearchOrchestrator::new(Arc::clone(&extraction));

    let canceller = Arc::clone(&extraction);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let outcome = tokio::time::timeout(
        Duration::from_secs(2),
        search.search("desk lamp", &SearchOptions::default(), &NoProgress),
    )
    .await
    .expect("cancelled search must not wait on the submit")
    .unwrap();

    assert_eq!(outcome, ExtractionOutcome::Cancelled(Vec::new()));
    assert!(!extraction.session().is_active());
}

#[tokio::test]
async fn test_search_supersedes_before_reading_the_page() {
    let page = Arc::new(StuckPage::new(
        "https://www.ebay.com/",
        "<html><body>Loading…</body></html>",
    ));
    let config = ScoutConfig {
        ready_timeout_ms: 10_000,
        ..fast_config()
    };
    let extraction = Arc::new(ExtractionOrchestrator::new(page.clone(), config));
    let search = SearchOrchestrator::new(Arc::clone(&extraction));

    let running = {
        let extraction = Arc::clone(&extraction);
        tokio::spawn(async move { extraction.extract_listings(&NoProgress).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The search gets stuck on its first page access
    page.url_stuck.store(true, Ordering::SeqCst);
    let search_task = tokio::spawn(async move {
        search.search("lamp", &SearchOptions::default(), &NoProgress).await
    });

    let outcome = tokio::time::timeout(Duration::from_secs(2), running)
        .await
        .expect("starting a search must cancel the running extraction")
        .unwrap()
        .unwrap();
    assert!(outcome.is_cancelled());
    assert!(extraction.session().is_active());

    search_task.abort();
}

#[tokio::test]
async fn test_unknown_page_releases_the_session() {
    let page = Arc::new(StaticPage::new("https://shop.example.com/", EBAY_HOME));
    let extraction = Arc::new(ExtractionOrchestrator::new(page, fast_config()));
    let search = SearchOrchestrator::new(Arc::clone(&extraction));

    let err = search
        .search("lamp", &SearchOptions::default(), &NoProgress)
        .await
        .unwrap_err();
    assert!(err.is_unrecognized_source());
    assert!(!extraction.session().is_active());
}

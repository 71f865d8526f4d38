use async_trait::async_trait;
use marketplace_scout::messaging::{
    duplex, Connector, Frame, LocalConnector, MarketplaceClient, PageAgent, Port, Request,
};
use marketplace_scout::{
    ExtractionOrchestrator, ExtractionOutcome, FetchProgress, MemoryStorage, ScoutConfig,
    SearchOptions, StaticPage, StorageRepo,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const FB_URL: &str = "https://www.facebook.com/marketplace/nyc/search?query=chair";

fn fb_page(count: u32) -> String {
    let cards: String = (0..count)
        .map(|id| {
            format!(
                r#"<div data-testid="marketplace-search-result"><a href="/marketplace/item/{id}/">
                    <img src="https://scontent.xx.fbcdn.net/{id}.jpg">
                    <span>$60</span><span>Eames style lounge chair {id}</span>
                </a></div>"#
            )
        })
        .collect();
    format!("<html><body>{cards}</body></html>")
}

fn config(ready_timeout_ms: u64) -> ScoutConfig {
    ScoutConfig {
        ready_timeout_ms,
        ready_poll_interval_ms: 10,
        search_timeout_ms: 100,
        search_poll_interval_ms: 10,
        ..Default::default()
    }
}

fn agent_for(url: &str, html: String, config: ScoutConfig) -> Arc<PageAgent> {
    let page = Arc::new(StaticPage::new(url, html));
    let orchestrator = Arc::new(ExtractionOrchestrator::new(page, config));
    Arc::new(PageAgent::new(orchestrator))
}

fn client_for(agent: Arc<PageAgent>) -> MarketplaceClient {
    MarketplaceClient::new(Arc::new(LocalConnector::new(agent)), Duration::from_secs(5))
}

#[tokio::test]
async fn test_extract_round_trip_with_progress() {
    let client = client_for(agent_for(FB_URL, fb_page(3), config(200)));
    let events = Arc::new(Mutex::new(Vec::new()));
    {
        let events = Arc::clone(&events);
        client.on_progress(move |progress| events.lock().unwrap().push(progress));
    }

    let outcome = client.extract_listings().await.unwrap();

    let listings = match outcome {
        ExtractionOutcome::Completed(listings) => listings,
        other => panic!("expected completion, got {other:?}"),
    };
    assert_eq!(listings.len(), 3);
    assert_eq!(listings[0].title, "Eames style lounge chair 0");
    // Progress is sent before the terminal response on the same channel
    assert_eq!(*events.lock().unwrap(), vec![FetchProgress::completed(3)]);
}

#[tokio::test]
async fn test_current_marketplace_over_the_channel() {
    let fb = client_for(agent_for(FB_URL, String::new(), config(50)));
    assert_eq!(
        fb.current_marketplace().await.unwrap().as_deref(),
        Some("Facebook Marketplace")
    );

    let unknown = client_for(agent_for("https://example.org/", String::new(), config(50)));
    assert_eq!(unknown.current_marketplace().await.unwrap(), None);
}

#[tokio::test]
async fn test_search_error_keeps_its_kind() {
    let client = client_for(agent_for("https://example.org/", String::new(), config(50)));
    let err = client
        .search_listings("chair", SearchOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_unrecognized_source());
}

#[tokio::test]
async fn test_cancel_search_settles_as_cancelled() {
    let client = Arc::new(client_for(agent_for(
        FB_URL,
        "<html><body>Loading…</body></html>".to_string(),
        config(10_000),
    )));

    let running = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.extract_listings().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.cancel_search().await.unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(2), running)
        .await
        .expect("cancelled request must settle")
        .unwrap()
        .unwrap();
    assert_eq!(outcome, ExtractionOutcome::Cancelled(Vec::new()));
}

#[tokio::test]
async fn test_superseded_request_is_reported() {
    let client = Arc::new(client_for(agent_for(
        FB_URL,
        "<html><body>Loading…</body></html>".to_string(),
        config(300),
    )));

    let first = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.extract_listings().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = client.extract_listings().await.unwrap();

    assert!(first.await.unwrap().unwrap_err().is_superseded());
    assert_eq!(second, ExtractionOutcome::Completed(Vec::new()));
}

#[tokio::test]
async fn test_save_listing_reaches_storage() {
    let storage = Arc::new(MemoryStorage::new());
    let page = Arc::new(StaticPage::new(FB_URL, fb_page(2)));
    let orchestrator = Arc::new(ExtractionOrchestrator::new(page, config(200)));
    let agent = Arc::new(PageAgent::new(orchestrator).with_storage(storage.clone()));
    let client = client_for(agent);

    let listings = client.extract_listings().await.unwrap().into_listings();
    client.save_listing(listings[1].clone()).await.unwrap();
    client.open_listing(&listings[1].url).await.unwrap();

    let saved = storage.read_saved_listings().await.unwrap();
    assert_eq!(saved, vec![listings[1].clone()]);
}

#[tokio::test]
async fn test_save_without_storage_fails() {
    let client = client_for(agent_for(FB_URL, fb_page(1), config(200)));
    let listing = client.extract_listings().await.unwrap().into_listings().remove(0);
    let err = client.save_listing(listing).await.unwrap_err();
    assert!(err.to_string().contains("No storage"));
}

/// Page side that reads requests and never answers
struct SilentConnector {
    held: Mutex<Vec<Port>>,
}

#[async_trait]
impl Connector for SilentConnector {
    async fn connect(&self) -> marketplace_scout::Result<Port> {
        let (client, page) = duplex();
        self.held.lock().unwrap().push(page);
        Ok(client)
    }
}

#[tokio::test]
async fn test_unresponsive_page_times_out() {
    let connector = Arc::new(SilentConnector {
        held: Mutex::new(Vec::new()),
    });
    let client = MarketplaceClient::new(connector, Duration::from_millis(100));

    let err = client.extract_listings().await.unwrap_err();
    assert!(err.is_timeout());
    assert!(!err.is_transport());
}

/// Page side that hangs up after reading one request
struct HangUpConnector;

#[async_trait]
impl Connector for HangUpConnector {
    async fn connect(&self) -> marketplace_scout::Result<Port> {
        let (client, mut page) = duplex();
        tokio::spawn(async move {
            let raw = page.rx.recv().await;
            assert!(raw.is_some());
            drop(page);
        });
        Ok(client)
    }
}

#[tokio::test]
async fn test_disconnect_mid_request_is_transport_failure() {
    let client = MarketplaceClient::new(Arc::new(HangUpConnector), Duration::from_secs(5));

    let err = client.extract_listings().await.unwrap_err();
    assert!(err.is_transport());
    assert!(err.to_string().contains("refresh the page"));
}

/// First connection is already dead; later ones reach a real agent
struct FlakyConnector {
    agent: Arc<PageAgent>,
    attempts: AtomicUsize,
}

#[async_trait]
impl Connector for FlakyConnector {
    async fn connect(&self) -> marketplace_scout::Result<Port> {
        let (client, page) = duplex();
        if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
            drop(page);
        } else {
            tokio::spawn(Arc::clone(&self.agent).serve(page));
        }
        Ok(client)
    }
}

#[tokio::test]
async fn test_reconnects_once_when_channel_is_gone() {
    let connector = Arc::new(FlakyConnector {
        agent: agent_for(FB_URL, fb_page(2), config(200)),
        attempts: AtomicUsize::new(0),
    });
    let client = MarketplaceClient::new(connector.clone(), Duration::from_secs(5));

    let outcome = client.extract_listings().await.unwrap();
    assert_eq!(outcome.listings().len(), 2);
    assert_eq!(connector.attempts.load(Ordering::SeqCst), 2);
}

/// Every connection is dead on arrival
struct DeadConnector;

#[async_trait]
impl Connector for DeadConnector {
    async fn connect(&self) -> marketplace_scout::Result<Port> {
        let (client, _page) = duplex();
        Ok(client)
    }
}

#[tokio::test]
async fn test_gives_up_after_one_reconnect() {
    let client = MarketplaceClient::new(Arc::new(DeadConnector), Duration::from_secs(5));
    let err = client.extract_listings().await.unwrap_err();
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_agent_ignores_garbage_and_keeps_serving() {
    let agent = agent_for(FB_URL, String::new(), config(50));
    let (mut control, page) = duplex();
    tokio::spawn(agent.serve(page));

    control.tx.send("not json".to_string()).unwrap();
    let request = Frame {
        request_id: Some(9),
        body: Request::GetMarketplace,
    };
    control.tx.send(serde_json::to_string(&request).unwrap()).unwrap();

    let raw = control.rx.recv().await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["action"], "GET_MARKETPLACE_RESPONSE");
    assert_eq!(value["requestId"], 9);
    assert_eq!(value["data"], "Facebook Marketplace");
}

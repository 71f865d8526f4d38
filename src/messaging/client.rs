use super::agent::PageAgent;
use super::protocol::{Frame, Message, Reply, Request};
use super::{duplex, Port};
use crate::error::{Result, ScoutError};
use crate::models::{FetchProgress, Listing};
use crate::orchestrator::ExtractionOutcome;
use crate::scrapers::SearchOptions;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Opens a channel to a page context
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Port>;
}

/// Connects to an in-process [`PageAgent`], one serve loop per connection
pub struct LocalConnector {
    agent: Arc<PageAgent>,
}

impl LocalConnector {
    pub fn new(agent: Arc<PageAgent>) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl Connector for LocalConnector {
    async fn connect(&self) -> Result<Port> {
        let (client, page) = duplex();
        tokio::spawn(Arc::clone(&self.agent).serve(page));
        Ok(client)
    }
}

type ProgressListener = Arc<dyn Fn(FetchProgress) + Send + Sync>;
type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Message>>>>;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Connection {
    tx: UnboundedSender<String>,
    pending: Pending,
}

/// Routes progress to the listener and responses to their waiting request
async fn read_responses(
    mut rx: UnboundedReceiver<String>,
    pending: Pending,
    listener: Arc<Mutex<Option<ProgressListener>>>,
) {
    while let Some(raw) = rx.recv().await {
        let Frame { request_id, body } = match serde_json::from_str::<Frame<Message>>(&raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Ignoring malformed response: {}", e);
                continue;
            }
        };

        match body {
            Message::ExtractProgress { progress } | Message::SearchProgress { progress } => {
                let current = lock(&listener).clone();
                if let Some(listener) = current {
                    listener(progress);
                }
            }
            message => {
                let waiter = request_id.and_then(|id| lock(&pending).remove(&id));
                match waiter {
                    Some(waiter) => {
                        let _ = waiter.send(message);
                    }
                    None => debug!("No request waiting for response {:?}", request_id),
                }
            }
        }
    }

    debug!("Page channel closed");
    // Dropping the senders fails every request still waiting
    lock(&pending).clear();
}

/// Control-side handle on a page context
pub struct MarketplaceClient {
    connector: Arc<dyn Connector>,
    timeout: Duration,
    connection: tokio::sync::Mutex<Option<Connection>>,
    listener: Arc<Mutex<Option<ProgressListener>>>,
    next_id: AtomicU64,
    latest_operation: AtomicU64,
}

impl MarketplaceClient {
    pub fn new(connector: Arc<dyn Connector>, timeout: Duration) -> Self {
        Self {
            connector,
            timeout,
            connection: tokio::sync::Mutex::new(None),
            listener: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(0),
            latest_operation: AtomicU64::new(0),
        }
    }

    /// Receive progress for whichever operation is running
    pub fn on_progress(&self, listener: impl Fn(FetchProgress) + Send + Sync + 'static) {
        *lock(&self.listener) = Some(Arc::new(listener));
    }

    async fn open(&self) -> Result<Connection> {
        let Port { tx, rx } = self.connector.connect().await?;
        let pending = Pending::default();
        tokio::spawn(read_responses(rx, Arc::clone(&pending), Arc::clone(&self.listener)));
        Ok(Connection { tx, pending })
    }

    async fn live_connection(&self, reconnect: bool) -> Result<(UnboundedSender<String>, Pending)> {
        let mut slot = self.connection.lock().await;
        if reconnect || slot.is_none() {
            if reconnect {
                info!("Reconnecting to page");
            }
            *slot = Some(self.open().await?);
        }
        match slot.as_ref() {
            Some(conn) => Ok((conn.tx.clone(), Arc::clone(&conn.pending))),
            None => Err(ScoutError::transport("Unable to connect to page")),
        }
    }

    /// Put a frame on the wire, reconnecting once if the channel is gone
    async fn dispatch(
        &self,
        request_id: Option<u64>,
        json: String,
    ) -> Result<Option<(oneshot::Receiver<Message>, Pending)>> {
        for attempt in 0..2 {
            let (tx, pending) = self.live_connection(attempt > 0).await?;
            let waiter = request_id.map(|id| {
                let (reply_tx, reply_rx) = oneshot::channel();
                lock(&pending).insert(id, reply_tx);
                reply_rx
            });

            if tx.send(json.clone()).is_ok() {
                return Ok(waiter.map(|rx| (rx, pending)));
            }

            if let Some(id) = request_id {
                lock(&pending).remove(&id);
            }
            warn!("Page channel is closed");
        }
        Err(ScoutError::transport("Unable to connect to page"))
    }

    async fn request(&self, request_id: u64, operation: &str, request: Request) -> Result<Message> {
        let json = serde_json::to_string(&Frame {
            request_id: Some(request_id),
            body: request,
        })?;

        let Some((reply, pending)) = self.dispatch(Some(request_id), json).await? else {
            return Err(ScoutError::transport("Unable to connect to page"));
        };

        match tokio::time::timeout(self.timeout, reply).await {
            Ok(Ok(message)) => Ok(message),
            Ok(Err(_)) => Err(ScoutError::transport("Connection to page lost")),
            Err(_) => {
                lock(&pending).remove(&request_id);
                warn!("{} timed out after {:?}", operation, self.timeout);
                Err(ScoutError::timeout(operation, self.timeout.as_millis() as u64))
            }
        }
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Ids of extract/search requests; only the newest one may settle
    fn begin_operation(&self) -> u64 {
        let id = self.next_request_id();
        self.latest_operation.store(id, Ordering::SeqCst);
        id
    }

    fn settle(&self, id: u64, operation: &str, reply: Reply<Vec<Listing>>) -> Result<ExtractionOutcome> {
        if self.latest_operation.load(Ordering::SeqCst) != id {
            return Err(ScoutError::Superseded {
                operation: operation.to_string(),
            });
        }
        reply.into_outcome()
    }

    pub async fn extract_listings(&self) -> Result<ExtractionOutcome> {
        const OPERATION: &str = "Extract listings";
        let id = self.begin_operation();
        match self.request(id, OPERATION, Request::ExtractListings).await? {
            Message::ExtractListingsResponse(reply) => self.settle(id, OPERATION, reply),
            other => Err(unexpected(OPERATION, &other)),
        }
    }

    pub async fn search_listings(&self, query: &str, options: SearchOptions) -> Result<ExtractionOutcome> {
        const OPERATION: &str = "Search listings";
        let id = self.begin_operation();
        let request = Request::SearchListings {
            query: query.to_string(),
            options,
        };
        match self.request(id, OPERATION, request).await? {
            Message::SearchListingsResponse(reply) => self.settle(id, OPERATION, reply),
            other => Err(unexpected(OPERATION, &other)),
        }
    }

    /// Ask the page to abort its in-flight operation. Nothing comes back.
    pub async fn cancel_search(&self) -> Result<()> {
        let json = serde_json::to_string(&Frame {
            request_id: None,
            body: Request::CancelSearch,
        })?;
        self.dispatch(None, json).await?;
        Ok(())
    }

    /// Display name of the page's marketplace, `None` when unrecognized
    pub async fn current_marketplace(&self) -> Result<Option<String>> {
        const OPERATION: &str = "Get marketplace";
        let id = self.next_request_id();
        match self.request(id, OPERATION, Request::GetMarketplace).await? {
            Message::GetMarketplaceResponse(reply) => reply.into_data(),
            other => Err(unexpected(OPERATION, &other)),
        }
    }

    pub async fn open_listing(&self, url: &str) -> Result<()> {
        const OPERATION: &str = "Open listing";
        let id = self.next_request_id();
        let request = Request::OpenListing { url: url.to_string() };
        match self.request(id, OPERATION, request).await? {
            Message::OpenListingResponse(reply) => reply.into_data().map(|_| ()),
            other => Err(unexpected(OPERATION, &other)),
        }
    }

    pub async fn save_listing(&self, listing: Listing) -> Result<()> {
        const OPERATION: &str = "Save listing";
        let id = self.next_request_id();
        match self.request(id, OPERATION, Request::SaveListing { listing }).await? {
            Message::SaveListingResponse(reply) => reply.into_data().map(|_| ()),
            other => Err(unexpected(OPERATION, &other)),
        }
    }
}

fn unexpected(operation: &str, message: &Message) -> ScoutError {
    ScoutError::transport(format!("Unexpected reply to {operation}: {message:?}"))
}

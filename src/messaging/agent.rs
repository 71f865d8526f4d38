use super::protocol::{Frame, Message, Reply, Request};
use super::Port;
use crate::error::ScoutError;
use crate::models::FetchProgress;
use crate::orchestrator::ExtractionOrchestrator;
use crate::search::SearchOrchestrator;
use crate::storage::StorageRepo;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

fn send(tx: &UnboundedSender<String>, request_id: Option<u64>, body: Message) {
    match serde_json::to_string(&Frame { request_id, body }) {
        Ok(json) => {
            if tx.send(json).is_err() {
                debug!("Control side went away before request {:?} was answered", request_id);
            }
        }
        Err(e) => error!("Failed to encode response: {}", e),
    }
}

/// Serves requests for one page context
pub struct PageAgent {
    extraction: Arc<ExtractionOrchestrator>,
    search: SearchOrchestrator,
    storage: Option<Arc<dyn StorageRepo>>,
}

impl PageAgent {
    pub fn new(extraction: Arc<ExtractionOrchestrator>) -> Self {
        Self {
            search: SearchOrchestrator::new(Arc::clone(&extraction)),
            extraction,
            storage: None,
        }
    }

    /// Where `SAVE_LISTING` requests go
    pub fn with_storage(mut self, storage: Arc<dyn StorageRepo>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Answer requests arriving on `port` until the control side hangs up.
    ///
    /// Long operations run on their own tasks so a cancel can reach them.
    pub async fn serve(self: Arc<Self>, port: Port) {
        let Port { tx, mut rx } = port;
        info!("Page agent connected");

        while let Some(raw) = rx.recv().await {
            let Frame { request_id, body } = match serde_json::from_str::<Frame<Request>>(&raw) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Ignoring malformed request: {}", e);
                    continue;
                }
            };

            if body == Request::CancelSearch {
                self.extraction.cancel();
                continue;
            }

            let agent = Arc::clone(&self);
            let tx = tx.clone();
            tokio::spawn(async move {
                agent.handle(request_id, body, tx).await;
            });
        }

        info!("Page agent disconnected");
        self.extraction.cancel();
    }

    async fn handle(&self, request_id: Option<u64>, request: Request, tx: UnboundedSender<String>) {
        let response = match request {
            Request::ExtractListings => {
                let progress_tx = tx.clone();
                let progress = move |progress: FetchProgress| {
                    send(&progress_tx, request_id, Message::ExtractProgress { progress })
                };
                let result = self.extraction.extract_listings(&progress).await;
                Message::ExtractListingsResponse(Reply::from_outcome(result))
            }
            Request::SearchListings { query, options } => {
                let progress_tx = tx.clone();
                let progress = move |progress: FetchProgress| {
                    send(&progress_tx, request_id, Message::SearchProgress { progress })
                };
                let result = self.search.search(&query, &options, &progress).await;
                Message::SearchListingsResponse(Reply::from_outcome(result))
            }
            Request::GetMarketplace => {
                let reply = match self.extraction.current_marketplace().await {
                    Ok(name) => Reply::ok_opt(name),
                    Err(e) => Reply::failed(&e),
                };
                Message::GetMarketplaceResponse(reply)
            }
            Request::OpenListing { url } => {
                // Headless contexts have no tab to open; acknowledge only
                info!("Open listing requested: {}", url);
                Message::OpenListingResponse(Reply::ok(url))
            }
            Request::SaveListing { listing } => {
                let reply = match &self.storage {
                    Some(storage) => {
                        let id = listing.id.clone();
                        match storage.save_listing(listing).await {
                            Ok(()) => Reply::ok(id),
                            Err(e) => Reply::failed(&e),
                        }
                    }
                    None => Reply::failed(&ScoutError::Storage(
                        "No storage is attached to this page".to_string(),
                    )),
                };
                Message::SaveListingResponse(reply)
            }
            Request::CancelSearch => {
                self.extraction.cancel();
                return;
            }
        };

        send(&tx, request_id, response);
    }
}

//! Saved listings and search history.

use crate::error::{Result, ScoutError};
use crate::models::Listing;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Most recent queries kept in the history
pub const MAX_SEARCH_HISTORY: usize = 50;

/// Whole-collection key-value store for user data
#[async_trait]
pub trait StorageRepo: Send + Sync {
    async fn store_saved_listings(&self, listings: Vec<Listing>) -> Result<()>;
    async fn read_saved_listings(&self) -> Result<Vec<Listing>>;

    async fn delete_saved_listings(&self, ids: &[String]) -> Result<()> {
        let remaining: Vec<Listing> = self
            .read_saved_listings()
            .await?
            .into_iter()
            .filter(|l| !ids.contains(&l.id))
            .collect();
        self.store_saved_listings(remaining).await
    }

    /// Append one listing to the saved set
    async fn save_listing(&self, listing: Listing) -> Result<()> {
        let mut saved = self.read_saved_listings().await?;
        saved.push(listing);
        self.store_saved_listings(saved).await
    }

    /// Replace the history; only the last [`MAX_SEARCH_HISTORY`] are kept
    async fn store_search_history(&self, queries: Vec<String>) -> Result<()>;
    async fn read_search_history(&self) -> Result<Vec<String>>;
}

fn most_recent(mut queries: Vec<String>) -> Vec<String> {
    if queries.len() > MAX_SEARCH_HISTORY {
        queries.drain(..queries.len() - MAX_SEARCH_HISTORY);
    }
    queries
}

/// On-disk layout, also the in-memory state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredData {
    #[serde(default)]
    saved_listings: Vec<Listing>,
    #[serde(default)]
    search_history: Vec<String>,
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: Mutex<StoredData>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageRepo for MemoryStorage {
    async fn store_saved_listings(&self, listings: Vec<Listing>) -> Result<()> {
        self.data.lock().await.saved_listings = listings;
        Ok(())
    }

    async fn read_saved_listings(&self) -> Result<Vec<Listing>> {
        Ok(self.data.lock().await.saved_listings.clone())
    }

    async fn store_search_history(&self, queries: Vec<String>) -> Result<()> {
        self.data.lock().await.search_history = most_recent(queries);
        Ok(())
    }

    async fn read_search_history(&self) -> Result<Vec<String>> {
        Ok(self.data.lock().await.search_history.clone())
    }
}

/// Everything in one pretty-printed JSON file
pub struct JsonFileStorage {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<StoredData> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => Ok(StoredData::default()),
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                ScoutError::Storage(format!("{} is not valid storage JSON: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No storage file at {}, starting empty", self.path.display());
                Ok(StoredData::default())
            }
            Err(e) => Err(ScoutError::Storage(format!(
                "Failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn save(&self, data: &StoredData) -> Result<()> {
        let json = serde_json::to_string_pretty(data)
            .map_err(|e| ScoutError::Storage(format!("Failed to serialize storage: {e}")))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ScoutError::Storage(format!("Failed to create {}: {e}", parent.display())))?;
        }
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| ScoutError::Storage(format!("Failed to write {}: {e}", self.path.display())))?;
        debug!("Wrote storage to {}", self.path.display());
        Ok(())
    }

    async fn update(&self, change: impl FnOnce(&mut StoredData) + Send) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut data = self.load().await?;
        change(&mut data);
        self.save(&data).await
    }
}

#[async_trait]
impl StorageRepo for JsonFileStorage {
    async fn store_saved_listings(&self, listings: Vec<Listing>) -> Result<()> {
        info!("Storing {} saved listings", listings.len());
        self.update(move |data| data.saved_listings = listings).await
    }

    async fn read_saved_listings(&self) -> Result<Vec<Listing>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.saved_listings)
    }

    async fn store_search_history(&self, queries: Vec<String>) -> Result<()> {
        self.update(move |data| data.search_history = most_recent(queries))
            .await
    }

    async fn read_search_history(&self) -> Result<Vec<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.search_history)
    }
}

use crate::error::{Result, ScoutError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings for extraction, search, and the page channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoutConfig {
    /// Upper bound on waiting for listing content to appear
    pub ready_timeout_ms: u64,
    pub ready_poll_interval_ms: u64,
    /// Upper bound on waiting for results after submitting a search
    pub search_timeout_ms: u64,
    pub search_poll_interval_ms: u64,
    /// Control-side bound on a whole request/response cycle
    pub request_timeout_ms: u64,
    /// How far a candidate may climb looking for its listing container
    pub max_ancestor_steps: usize,
    /// Candidate cap for the generic extractor
    pub generic_max_candidates: usize,
    pub storage_path: PathBuf,
    pub headless: bool,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            ready_timeout_ms: 10_000,
            ready_poll_interval_ms: 250,
            search_timeout_ms: 5_000,
            search_poll_interval_ms: 200,
            request_timeout_ms: 30_000,
            max_ancestor_steps: 10,
            generic_max_candidates: 50,
            storage_path: PathBuf::from("marketplace_scout.json"),
            headless: true,
        }
    }
}

impl ScoutConfig {
    /// Defaults overlaid with `SCOUT_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        let number = |key: &str, target: &mut u64| -> Result<()> {
            if let Some(raw) = lookup(key) {
                *target = raw
                    .trim()
                    .parse()
                    .map_err(|_| ScoutError::Config(format!("{key} must be a number, got {raw:?}")))?;
            }
            Ok(())
        };

        number("SCOUT_READY_TIMEOUT_MS", &mut config.ready_timeout_ms)?;
        number("SCOUT_READY_POLL_MS", &mut config.ready_poll_interval_ms)?;
        number("SCOUT_SEARCH_TIMEOUT_MS", &mut config.search_timeout_ms)?;
        number("SCOUT_SEARCH_POLL_MS", &mut config.search_poll_interval_ms)?;
        number("SCOUT_REQUEST_TIMEOUT_MS", &mut config.request_timeout_ms)?;

        let mut steps = config.max_ancestor_steps as u64;
        number("SCOUT_MAX_ANCESTOR_STEPS", &mut steps)?;
        config.max_ancestor_steps = steps as usize;

        let mut cap = config.generic_max_candidates as u64;
        number("SCOUT_GENERIC_MAX_CANDIDATES", &mut cap)?;
        config.generic_max_candidates = cap as usize;

        if let Some(path) = lookup("SCOUT_STORAGE_PATH") {
            config.storage_path = PathBuf::from(path);
        }
        if let Some(raw) = lookup("SCOUT_HEADLESS") {
            config.headless = !matches!(raw.trim().to_lowercase().as_str(), "0" | "false" | "no");
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ready_poll_interval_ms == 0 || self.search_poll_interval_ms == 0 {
            return Err(ScoutError::Config("poll intervals must be positive".to_string()));
        }
        if self.generic_max_candidates == 0 {
            return Err(ScoutError::Config(
                "generic candidate cap must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ready_poll_interval_ms)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }

    pub fn search_poll_interval(&self) -> Duration {
        Duration::from_millis(self.search_poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

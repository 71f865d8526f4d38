use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by extraction, search, and the page channel.
///
/// Serializable so the page side can hand the exact kind back to the caller.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum ScoutError {
    /// The page is not a known marketplace; only search treats this as fatal
    #[error("Not on a supported marketplace page: {url}")]
    UnrecognizedSource { url: String },

    /// The page context or channel is missing, closed, or gone
    #[error("{message}. Please refresh the page and try again.")]
    Transport { message: String },

    /// A request outlived its bound
    #[error("{operation} timed out after {timeout_ms}ms. Make sure you're on a supported marketplace page; it may also be slow to load.")]
    Timeout { operation: String, timeout_ms: u64 },

    /// An extractor failed as a whole (not a single bad candidate)
    #[error("Failed to extract listings from {marketplace}: {message}")]
    Extraction { marketplace: String, message: String },

    /// A newer request replaced this one before it finished
    #[error("{operation} was superseded by a newer request")]
    Superseded { operation: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ScoutError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn extraction(marketplace: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            marketplace: marketplace.into(),
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    pub fn is_unrecognized_source(&self) -> bool {
        matches!(self, Self::UnrecognizedSource { .. })
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded { .. })
    }
}

impl From<serde_json::Error> for ScoutError {
    fn from(err: serde_json::Error) -> Self {
        Self::transport(format!("Malformed message: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, ScoutError>;

use crate::error::{Result, ScoutError};
use crate::models::{FetchProgress, Listing};
use crate::orchestrator::ExtractionOutcome;
use crate::scrapers::SearchOptions;
use serde::{Deserialize, Serialize};

/// A message plus the id that ties a response to its request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame<T> {
    #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<u64>,
    #[serde(flatten)]
    pub body: T,
}

/// Control side to page side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    SearchListings {
        query: String,
        #[serde(default)]
        options: SearchOptions,
    },
    ExtractListings,
    /// Fire and forget; no response
    CancelSearch,
    GetMarketplace,
    OpenListing {
        url: String,
    },
    SaveListing {
        listing: Listing,
    },
}

/// Page side to control side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    SearchListingsResponse(Reply<Vec<Listing>>),
    ExtractListingsResponse(Reply<Vec<Listing>>),
    /// `data` is the display name, absent when unrecognized
    GetMarketplaceResponse(Reply<String>),
    OpenListingResponse(Reply<String>),
    SaveListingResponse(Reply<String>),
    SearchProgress { progress: FetchProgress },
    ExtractProgress { progress: FetchProgress },
}

/// Terminal response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<ScoutError>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
}

impl<T> Reply<T> {
    pub fn ok(data: T) -> Self {
        Self::ok_opt(Some(data))
    }

    pub fn ok_opt(data: Option<T>) -> Self {
        Self {
            success: true,
            data,
            error: None,
            error_detail: None,
            cancelled: false,
        }
    }

    pub fn failed(err: &ScoutError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.to_string()),
            error_detail: Some(err.clone()),
            cancelled: false,
        }
    }

    fn into_error(self) -> ScoutError {
        self.error_detail.unwrap_or_else(|| {
            ScoutError::transport(self.error.unwrap_or_else(|| "Unknown error".to_string()))
        })
    }

    /// Payload of a successful reply, or the error it carried
    pub fn into_data(self) -> Result<Option<T>> {
        if self.success {
            Ok(self.data)
        } else {
            Err(self.into_error())
        }
    }
}

impl Reply<Vec<Listing>> {
    pub fn from_outcome(result: Result<ExtractionOutcome>) -> Self {
        match result {
            Ok(ExtractionOutcome::Completed(listings)) => Self::ok(listings),
            Ok(ExtractionOutcome::Cancelled(listings)) => Self {
                cancelled: true,
                ..Self::ok(listings)
            },
            Err(e) => Self::failed(&e),
        }
    }

    pub fn into_outcome(self) -> Result<ExtractionOutcome> {
        if !self.success {
            return Err(self.into_error());
        }
        let listings = self.data.unwrap_or_default();
        Ok(if self.cancelled {
            ExtractionOutcome::Cancelled(listings)
        } else {
            ExtractionOutcome::Completed(listings)
        })
    }
}

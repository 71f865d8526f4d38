use crate::heuristics::price_amount;
use crate::models::Listing;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Sort order requested for a result batch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Price,
    Date,
    #[default]
    Relevance,
}

/// Filtering and sorting hints for a search.
///
/// Applied as a pure post-filter over the normalized batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    /// Marketplace display names to keep
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketplaces: Option<Vec<String>>,
    /// Minimum price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    /// Maximum price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortKey>,
}

impl SearchOptions {
    fn keeps(&self, listing: &Listing) -> bool {
        if let Some(allowed) = &self.marketplaces {
            if !allowed.is_empty()
                && !allowed
                    .iter()
                    .any(|m| m.eq_ignore_ascii_case(&listing.marketplace))
            {
                return false;
            }
        }

        if self.min_price.is_some() || self.max_price.is_some() {
            let Some(amount) = price_amount(&listing.price) else {
                return false;
            };
            if self.min_price.is_some_and(|min| amount < min) {
                return false;
            }
            if self.max_price.is_some_and(|max| amount > max) {
                return false;
            }
        }

        if let Some(wanted) = self.location.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
            let wanted = wanted.to_lowercase();
            if !listing
                .location
                .as_deref()
                .is_some_and(|l| l.to_lowercase().contains(&wanted))
            {
                return false;
            }
        }

        true
    }

    /// Filter, sort, and cap a batch without touching the listings themselves
    pub fn apply(&self, listings: Vec<Listing>) -> Vec<Listing> {
        let mut kept: Vec<Listing> = listings.into_iter().filter(|l| self.keeps(l)).collect();

        match self.sort_by.unwrap_or_default() {
            SortKey::Price => kept.sort_by(|a, b| {
                match (price_amount(&a.price), price_amount(&b.price)) {
                    (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                }
            }),
            // Newest first, undated last
            SortKey::Date => kept.sort_by(|a, b| match (a.date_posted, b.date_posted) {
                (Some(x), Some(y)) => y.cmp(&x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }),
            SortKey::Relevance => {}
        }

        if let Some(cap) = self.max_results {
            kept.truncate(cap);
        }
        kept
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Title used when no title could be resolved for a candidate
pub const NO_TITLE: &str = "No title";

/// Price used when no price could be resolved for a candidate
pub const PRICE_NOT_AVAILABLE: &str = "Price not available";

/// Display name for listings from an unrecognized page
pub const UNKNOWN_MARKETPLACE: &str = "Unknown";

/// Marketplaces recognized from the page URL
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Marketplace {
    Facebook,
    Craigslist,
    Ebay,
    Etsy,
    Gumtree,
    Olx,
}

impl Marketplace {
    /// Human-readable name carried on every listing
    pub fn display_name(self) -> &'static str {
        match self {
            Marketplace::Facebook => "Facebook Marketplace",
            Marketplace::Craigslist => "Craigslist",
            Marketplace::Ebay => "eBay",
            Marketplace::Etsy => "Etsy",
            Marketplace::Gumtree => "Gumtree",
            Marketplace::Olx => "OLX",
        }
    }

    /// Short prefix used when generating listing ids
    pub fn id_prefix(self) -> &'static str {
        match self {
            Marketplace::Facebook => "fb",
            Marketplace::Craigslist => "cl",
            Marketplace::Ebay => "ebay",
            Marketplace::Etsy => "etsy",
            Marketplace::Gumtree => "gumtree",
            Marketplace::Olx => "olx",
        }
    }
}

impl fmt::Display for Marketplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Display name for a possibly unrecognized marketplace
pub fn marketplace_name(marketplace: Option<Marketplace>) -> &'static str {
    marketplace.map_or(UNKNOWN_MARKETPLACE, Marketplace::display_name)
}

/// One normalized marketplace item found on a page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub price: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub marketplace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_posted: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Listing {
    /// A listing belongs in a batch only with a real title and a url
    pub fn is_valid(&self) -> bool {
        let title = self.title.trim();
        !title.is_empty() && title != NO_TITLE && !self.url.trim().is_empty()
    }
}

/// Progress report emitted while an extraction runs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FetchProgress {
    pub current_page: u32,
    pub total_pages: u32,
    pub processed_count: usize,
    pub total_count: usize,
    pub percentage: u8,
}

impl FetchProgress {
    /// The terminal report for a single-page extraction
    pub fn completed(count: usize) -> Self {
        Self {
            current_page: 1,
            total_pages: 1,
            processed_count: count,
            total_count: count,
            percentage: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn listing(title: &str) -> Listing {
        Listing {
            id: "fb_0_1".to_string(),
            title: title.to_string(),
            price: PRICE_NOT_AVAILABLE.to_string(),
            url: "https://www.facebook.com/marketplace/item/1/".to_string(),
            image_url: None,
            location: None,
            marketplace: Marketplace::Facebook.display_name().to_string(),
            date_posted: None,
            description: None,
        }
    }

    #[test]
    fn test_validity_rejects_sentinel_and_blank_titles() {
        assert!(listing("Mountain bike, barely used").is_valid());
        assert!(!listing(NO_TITLE).is_valid());
        assert!(!listing("   ").is_valid());
    }

    #[test]
    fn test_listing_serializes_camel_case_with_iso_dates() {
        let mut item = listing("Mountain bike, barely used");
        item.image_url = Some("https://example.com/a.jpg".to_string());
        item.date_posted = Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["imageUrl"], "https://example.com/a.jpg");
        assert_eq!(json["datePosted"], "2024-03-01T12:00:00Z");
        assert!(json.get("location").is_none());

        let back: Listing = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_unknown_marketplace_name() {
        assert_eq!(marketplace_name(None), "Unknown");
        assert_eq!(marketplace_name(Some(Marketplace::Ebay)), "eBay");
    }
}

use super::container::{keep_title, CompiledProfile, SiteProfile};
use super::traits::{ExtractOptions, ListingExtractor};
use crate::models::Listing;
use anyhow::Result;
use scraper::Html;
use tracing::info;

// Newer static results first, then the classic result rows
static PROFILE: SiteProfile = SiteProfile {
    id_prefix: "cl",
    candidates: &[
        "li.cl-static-search-result",
        ".cl-search-result",
        ".result-row",
        ".result-info",
    ],
    item_link: None,
    dedupe_links: false,
    climb: false,
    capped: false,
    title: &[
        ".result-title",
        ".titlestring",
        ".posting-title .label",
        ".title",
    ],
    price: &[".result-price", ".priceinfo", ".price"],
    location: &[".result-hood", ".location", ".nearby"],
    loose_location: false,
    title_denylist: &[],
    clean_title: keep_title,
};

/// Craigslist search result pages
pub struct CraigslistExtractor;

impl ListingExtractor for CraigslistExtractor {
    fn name(&self) -> &'static str {
        "craigslist"
    }

    fn is_ready(&self, document: &Html) -> bool {
        CompiledProfile::new(&PROFILE)
            .map(|profile| profile.any_candidate(document))
            .unwrap_or(false)
    }

    fn extract(&self, document: &Html, options: &ExtractOptions) -> Result<Vec<Listing>> {
        let profile = CompiledProfile::new(&PROFILE)?;
        let candidates = profile.candidates(document);
        let listings = profile.run(candidates, options);
        info!("Extracted {} Craigslist listings", listings.len());
        Ok(listings)
    }
}

use super::container::{compile, keep_title, CompiledProfile, SiteProfile};
use super::traits::{ExtractOptions, ListingExtractor};
use crate::heuristics::{element_text, has_image};
use crate::models::Listing;
use anyhow::Result;
use scraper::{ElementRef, Html};
use tracing::{debug, info};

const MIN_ANCHOR_TEXT_CHARS: usize = 10;

// Structural strategies in order; the first one with any match is used
// on its own, results are never merged across strategies.
static PROFILE: SiteProfile = SiteProfile {
    id_prefix: "generic",
    candidates: &[
        r#"article, [class*="item"], [class*="listing"], [class*="product"], [class*="card"]"#,
        r#"a[href*="/item"], a[href*="/product"], a[href*="/listing"]"#,
        r#"[class*="grid"] > *, [class*="Grid"] > *"#,
    ],
    item_link: None,
    dedupe_links: false,
    climb: false,
    capped: true,
    title: &[],
    price: &[],
    location: &[],
    loose_location: true,
    title_denylist: &[
        "sign in",
        "log in",
        "create account",
        "my account",
        "accept cookies",
        "cookie settings",
        "cookie policy",
        "privacy policy",
        "privacy settings",
        "privacy and cookie",
        "terms of service",
        "terms of use",
        "help center",
        "subscribe to our newsletter",
        "skip to",
    ],
    clean_title: keep_title,
};

/// Last strategy: any anchor wrapping both an image and some text
fn image_text_anchors(document: &Html) -> Result<Vec<ElementRef<'_>>> {
    let anchors = compile("a")?;
    Ok(document
        .select(&anchors)
        .filter(|a| has_image(*a) && element_text(*a).chars().count() > MIN_ANCHOR_TEXT_CHARS)
        .collect())
}

/// Marketplace-agnostic fallback used for unknown pages and empty site results
pub struct GenericExtractor;

impl GenericExtractor {
    fn candidates<'a>(&self, profile: &CompiledProfile, document: &'a Html) -> Result<Vec<ElementRef<'a>>> {
        let structural = profile.candidates(document);
        if !structural.is_empty() {
            return Ok(structural);
        }
        let anchors = image_text_anchors(document)?;
        debug!("Generic anchor strategy found {} candidates", anchors.len());
        Ok(anchors)
    }
}

impl ListingExtractor for GenericExtractor {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn is_ready(&self, document: &Html) -> bool {
        let Ok(profile) = CompiledProfile::new(&PROFILE) else {
            return false;
        };
        profile.any_candidate(document)
            || image_text_anchors(document).is_ok_and(|anchors| !anchors.is_empty())
    }

    fn extract(&self, document: &Html, options: &ExtractOptions) -> Result<Vec<Listing>> {
        let profile = CompiledProfile::new(&PROFILE)?;
        let candidates = self.candidates(&profile, document)?;
        let listings = profile.run(candidates, options);
        info!("Generic extraction returned {} listings", listings.len());
        Ok(listings)
    }
}

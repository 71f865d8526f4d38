use super::container::{keep_title, CompiledProfile, SiteProfile};
use super::traits::{ExtractOptions, ListingExtractor};
use crate::models::Listing;
use anyhow::Result;
use scraper::Html;
use tracing::info;

// Only the item anchors are stable across Marketplace redesigns; the same
// item often appears in several wrappers, so candidates are deduplicated.
static PROFILE: SiteProfile = SiteProfile {
    id_prefix: "fb",
    candidates: &[
        r#"[data-testid="marketplace-search-result"]"#,
        r#"a[href*="/marketplace/item/"]"#,
        r#"[role="article"] a[href*="/marketplace"]"#,
    ],
    item_link: Some(r#"a[href*="/marketplace/item/"]"#),
    dedupe_links: true,
    climb: true,
    capped: false,
    title: &[],
    price: &[],
    location: &[],
    loose_location: false,
    title_denylist: &[],
    clean_title: keep_title,
};

/// Facebook Marketplace search and category pages
pub struct FacebookExtractor;

impl ListingExtractor for FacebookExtractor {
    fn name(&self) -> &'static str {
        "facebook"
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
        info!("Extracted {} Facebook listings", listings.len());
        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Marketplace;
    use url::Url;

    fn options() -> ExtractOptions {
        ExtractOptions::new(
            Url::parse("https://www.facebook.com/marketplace/seattle/search?query=bike").unwrap(),
            Some(Marketplace::Facebook),
        )
    }

    fn card(id: u32, title: &str, price: &str) -> String {
        format!(
            r#"<div class="x9f619"><div><a href="/marketplace/item/{id}/?ref=search&amp;tracking=abc">
                <div><img src="https://scontent.xx.fbcdn.net/{id}.jpg" alt=""></div>
                <div><span dir="auto">{price}</span></div>
                <div><span dir="auto">{title}</span></div>
                <div><span dir="auto">Seattle, WA</span></div>
            </a></div></div>"#
        )
    }

    #[test]
    fn test_extracts_every_card() {
        let body: String = (1..=3)
            .map(|i| card(i, &format!("Trek road bike number {i}"), "$450"))
            .collect();
        let html = Html::parse_document(&format!("<html><body><div>{body}</div></body></html>"));

        let listings = FacebookExtractor.extract(&html, &options()).unwrap();
        assert_eq!(listings.len(), 3);

        let first = &listings[0];
        assert_eq!(first.title, "Trek road bike number 1");
        assert_eq!(first.price, "$450");
        assert_eq!(first.location.as_deref(), Some("Seattle, WA"));
        assert_eq!(first.marketplace, "Facebook Marketplace");
        assert!(first
            .url
            .starts_with("https://www.facebook.com/marketplace/item/1/"));
        assert_eq!(
            first.image_url.as_deref(),
            Some("https://scontent.xx.fbcdn.net/1.jpg")
        );
        assert!(listings.iter().all(Listing::is_valid));
    }

    #[test]
    fn test_same_item_in_two_wrappers_yields_one_listing() {
        let html = Html::parse_document(&format!(
            r#"<html><body>
                <div class="feed">{}</div>
                <div class="carousel"><a href="https://www.facebook.com/marketplace/item/7/#photos">
                    <img src="/7b.jpg"><span>Walnut dresser, six drawers</span></a></div>
            </body></html>"#,
            card(7, "Walnut dresser, six drawers", "$200")
        ));

        let listings = FacebookExtractor.extract(&html, &options()).unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].title, "Walnut dresser, six drawers");
    }

    #[test]
    fn test_no_listings_is_empty_not_error() {
        let html = Html::parse_document("<html><body><p>Nothing for sale</p></body></html>");
        assert!(FacebookExtractor.extract(&html, &options()).unwrap().is_empty());
        assert!(!FacebookExtractor.is_ready(&html));
    }
}

use super::container::{CompiledProfile, SiteProfile};
use super::traits::{ExtractOptions, ListingExtractor};
use crate::models::Listing;
use anyhow::Result;
use scraper::Html;
use tracing::info;

const NEW_LISTING_PREFIX: &str = "new listing";
const NEW_WINDOW_SUFFIX: &str = "opens in a new window or tab";

static PROFILE: SiteProfile = SiteProfile {
    id_prefix: "ebay",
    candidates: &[".srp-results .s-item", ".s-item", "li.s-card"],
    item_link: Some(r#"a.s-item__link, a[href*="/itm/"]"#),
    dedupe_links: false,
    climb: false,
    capped: false,
    title: &[".s-item__title", ".s-card__title"],
    price: &[".s-item__price", ".s-card__price"],
    location: &[".s-item__location", ".s-item__itemLocation", ".s-card__location"],
    loose_location: false,
    // eBay pads result grids with a placeholder card
    title_denylist: &["shop on ebay"],
    clean_title: clean_ebay_title,
};

/// Strips the "New listing" badge and the screen-reader suffix eBay
/// renders inside the title element.
fn clean_ebay_title(raw: &str) -> String {
    let mut title = raw.trim();
    if title
        .get(..NEW_LISTING_PREFIX.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(NEW_LISTING_PREFIX))
    {
        title = title[NEW_LISTING_PREFIX.len()..].trim_start();
    }
    let lower = title.to_lowercase();
    if lower.ends_with(NEW_WINDOW_SUFFIX) && lower.len() == title.len() {
        title = title[..title.len() - NEW_WINDOW_SUFFIX.len()].trim_end();
    }
    title.to_string()
}

/// eBay search result pages (.com, .co.uk, .ca)
pub struct EbayExtractor;

impl ListingExtractor for EbayExtractor {
    fn name(&self) -> &'static str {
        "ebay"
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
        info!("Extracted {} eBay listings", listings.len());
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
            Url::parse("https://www.ebay.com/sch/i.html?_nkw=lamp").unwrap(),
            Some(Marketplace::Ebay),
        )
    }

    fn item(id: u32, title_html: &str, price: &str) -> String {
        format!(
            r#"<li class="s-item"><div class="s-item__wrapper">
                <div class="s-item__image-section"><a href="https://www.ebay.com/itm/{id}?hash=item1"><img src="https://i.ebayimg.com/images/g/{id}/s-l225.jpg"></a></div>
                <div class="s-item__info">
                    <a class="s-item__link" href="https://www.ebay.com/itm/{id}?hash=item1"><div class="s-item__title">{title_html}</div></a>
                    <div class="s-item__details"><span class="s-item__price">{price}</span><span class="s-item__location s-item__itemLocation">from United Kingdom</span></div>
                </div>
            </div></li>"#
        )
    }

    #[test]
    fn test_results_skip_placeholder_and_strip_badge() {
        let html = Html::parse_document(&format!(
            r#"<html><body><ul class="srp-results">{}{}{}</ul></body></html>"#,
            item(0, "<span>Shop on eBay</span>", "$20.00"),
            item(
                101,
                r#"<span role="heading"><span class="LIGHT_HIGHLIGHT">New listing</span>Vintage brass desk lamp</span>"#,
                "$25.00"
            ),
            item(102, "<span>Tiffany style lamp</span>", "$40.00 to $55.00"),
        ));

        let listings = EbayExtractor.extract(&html, &options()).unwrap();
        assert_eq!(listings.len(), 2);

        assert_eq!(listings[0].title, "Vintage brass desk lamp");
        assert_eq!(listings[0].price, "$25.00");
        assert_eq!(listings[0].url, "https://www.ebay.com/itm/101?hash=item1");
        assert_eq!(
            listings[0].image_url.as_deref(),
            Some("https://i.ebayimg.com/images/g/101/s-l225.jpg")
        );
        assert_eq!(listings[0].location.as_deref(), Some("from United Kingdom"));
        assert_eq!(listings[1].price, "$40.00 to $55.00");
        assert!(listings.iter().all(|l| l.marketplace == "eBay"));
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_ebay_title("New Listing Retro radio"), "Retro radio");
        assert_eq!(
            clean_ebay_title("Retro radio Opens in a new window or tab"),
            "Retro radio"
        );
        assert_eq!(clean_ebay_title("Newer model radio"), "Newer model radio");
    }
}

//! Marketplace detection from URL structure alone.

use crate::models::Marketplace;
use url::Url;

/// True when `host` is `domain` or one of its subdomains
fn host_is(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Ordered rules; the first match wins. Facebook needs both the host
/// and the `/marketplace` path, so it is checked before anything looser.
fn classify(host: &str, path: &str) -> Option<Marketplace> {
    if host_is(host, "facebook.com") && path.contains("/marketplace") {
        return Some(Marketplace::Facebook);
    }
    if host_is(host, "craigslist.org") {
        return Some(Marketplace::Craigslist);
    }
    if ["ebay.com", "ebay.co.uk", "ebay.ca"]
        .iter()
        .any(|domain| host_is(host, domain))
    {
        return Some(Marketplace::Ebay);
    }
    if host_is(host, "etsy.com") {
        return Some(Marketplace::Etsy);
    }
    if host_is(host, "gumtree.com") {
        return Some(Marketplace::Gumtree);
    }
    // olx.pl, www.olx.com.br, m.olx.ua ...
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() > 1 && labels[..labels.len() - 1].contains(&"olx") {
        return Some(Marketplace::Olx);
    }
    None
}

/// Classify a page URL. Unparseable or unmatched URLs are `None`, never an error.
pub fn detect(url: &str) -> Option<Marketplace> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    classify(&host, parsed.path())
}

/// Like [`detect`] for an already parsed URL
pub fn detect_url(url: &Url) -> Option<Marketplace> {
    let host = url.host_str()?.to_lowercase();
    classify(&host, url.path())
}

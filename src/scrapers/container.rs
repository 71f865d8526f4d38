//! Candidate pipeline shared by the extractors: strategy selection,
//! container resolution, link/image resolution, and record assembly.

use super::traits::ExtractOptions;
use crate::heuristics::{
    element_text, first_text, has_image, select_date, select_location, select_price, select_title,
    self_and_descendants,
};
use crate::models::{marketplace_name, Listing, NO_TITLE, PRICE_NOT_AVAILABLE};
use anyhow::{anyhow, Result};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

/// Structural attributes that mark an element as one listing on its own
const LISTING_MARKERS: &[&str] = &["listing", "result", "item", "card", "product"];

/// Below this many characters a subtree is not "non-trivial" text
const MIN_CARD_TEXT_CHARS: usize = 10;

pub(crate) fn compile(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector {css:?}: {e:?}"))
}

pub(crate) fn compile_all(list: &[&str]) -> Result<Vec<Selector>> {
    list.iter().map(|css| compile(css)).collect()
}

/// How one site's markup maps onto listing fields
pub(crate) struct SiteProfile {
    pub id_prefix: &'static str,
    /// Candidate patterns, tried in order until one matches
    pub candidates: &'static [&'static str],
    /// Anchor pattern identifying a single item's detail link
    pub item_link: Option<&'static str>,
    /// Collapse candidates that point at the same item
    pub dedupe_links: bool,
    /// Climb from the candidate towards its listing container
    pub climb: bool,
    /// Stop after `max_candidates` candidates
    pub capped: bool,
    pub title: &'static [&'static str],
    pub price: &'static [&'static str],
    pub location: &'static [&'static str],
    /// Accept loosely place-like text as a location
    pub loose_location: bool,
    /// Lowercase phrases that disqualify a title starting with them
    pub title_denylist: &'static [&'static str],
    pub clean_title: fn(&str) -> String,
}

pub(crate) fn keep_title(title: &str) -> String {
    title.trim().to_string()
}

/// A [`SiteProfile`] with its selectors parsed
pub(crate) struct CompiledProfile<'p> {
    profile: &'p SiteProfile,
    candidates: Vec<Selector>,
    item_link: Option<Selector>,
    title: Vec<Selector>,
    price: Vec<Selector>,
    location: Vec<Selector>,
}

impl<'p> CompiledProfile<'p> {
    pub fn new(profile: &'p SiteProfile) -> Result<Self> {
        Ok(Self {
            profile,
            candidates: compile_all(profile.candidates)?,
            item_link: profile.item_link.map(compile).transpose()?,
            title: compile_all(profile.title)?,
            price: compile_all(profile.price)?,
            location: compile_all(profile.location)?,
        })
    }

    /// Whether any candidate pattern matches yet
    pub fn any_candidate(&self, document: &Html) -> bool {
        self.candidates
            .iter()
            .any(|selector| document.select(selector).next().is_some())
    }

    /// Elements from the first candidate pattern with at least one match
    pub fn candidates<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        for (selector, css) in self.candidates.iter().zip(self.profile.candidates) {
            let found: Vec<_> = document.select(selector).collect();
            if !found.is_empty() {
                debug!("Found {} candidates with selector: {}", found.len(), css);
                return found;
            }
        }
        debug!("No candidates matched any {} selector", self.profile.id_prefix);
        Vec::new()
    }

    /// Turn candidates into listings, honoring cancellation and the cap
    pub fn run<'a>(
        &self,
        candidates: impl IntoIterator<Item = ElementRef<'a>>,
        options: &ExtractOptions,
    ) -> Vec<Listing> {
        let mut seen = HashSet::new();
        let mut listings = Vec::new();

        for (index, candidate) in candidates.into_iter().enumerate() {
            if options.cancel.is_cancelled() {
                debug!(
                    "Cancelled after {} of the candidates, keeping {} listings",
                    index,
                    listings.len()
                );
                break;
            }
            if self.profile.capped && index >= options.max_candidates {
                debug!("Candidate cap of {} reached", options.max_candidates);
                break;
            }

            if self.profile.dedupe_links {
                let link = candidate_link(candidate, self.item_link.as_ref(), &options.page_url);
                if let Some(key) = link.as_deref().and_then(dedupe_key) {
                    if !seen.insert(key) {
                        debug!("Skipping duplicate candidate {}", index);
                        continue;
                    }
                }
            }

            let container = if self.profile.climb {
                resolve_container(candidate, options.max_ancestor_steps, self.item_link.as_ref())
            } else {
                candidate
            };

            match self.build(candidate, container, index, options) {
                Some(listing) => listings.push(listing),
                None => debug!("Skipped candidate {}: no usable title", index),
            }
        }

        listings
    }

    fn build(
        &self,
        candidate: ElementRef,
        container: ElementRef,
        index: usize,
        options: &ExtractOptions,
    ) -> Option<Listing> {
        let clean = self.profile.clean_title;
        let title = first_text(container, &self.title)
            .map(|t| clean(&t))
            .filter(|t| !t.is_empty())
            .or_else(|| select_title(container).map(|t| clean(&t)))
            .unwrap_or_else(|| NO_TITLE.to_string());

        let lowered = title.to_lowercase();
        if let Some(denied) = self
            .profile
            .title_denylist
            .iter()
            .find(|phrase| starts_with_phrase(&lowered, phrase))
        {
            debug!("Dropping {:?}: matches denylist entry {:?}", title, denied);
            return None;
        }

        let price = first_text(container, &self.price)
            .or_else(|| select_price(container))
            .unwrap_or_else(|| PRICE_NOT_AVAILABLE.to_string());

        let url = resolve_link(candidate, container, self.item_link.as_ref(), &options.page_url)
            .unwrap_or_else(|| options.page_url.to_string());

        let location = first_text(container, &self.location)
            .or_else(|| select_location(container, &title, self.profile.loose_location))
            .map(|l| l.trim_matches(|c: char| c == '(' || c == ')' || c.is_whitespace()).to_string())
            .filter(|l| !l.is_empty());

        let listing = Listing {
            id: format!("{}_{}_{}", self.profile.id_prefix, index, options.batch_stamp()),
            title,
            price,
            url,
            image_url: resolve_image(container, &options.page_url),
            location,
            marketplace: marketplace_name(options.marketplace).to_string(),
            date_posted: select_date(container, options.now),
            description: None,
        };

        listing.is_valid().then_some(listing)
    }
}

/// `title` is `phrase` or begins with it as whole words
pub(crate) fn starts_with_phrase(title: &str, phrase: &str) -> bool {
    title
        .strip_prefix(phrase)
        .is_some_and(|rest| rest.chars().next().map_or(true, |c| !c.is_alphanumeric()))
}

/// Whether an element carries a structural listing marker
fn has_marker(el: ElementRef) -> bool {
    let value = el.value();
    if value.attr("role") == Some("article") {
        return true;
    }
    if value
        .attr("itemtype")
        .is_some_and(|t| t.contains("Product") || t.contains("Offer"))
    {
        return true;
    }
    value.attr("data-testid").is_some_and(|id| {
        let id = id.to_lowercase();
        LISTING_MARKERS.iter().any(|m| id.contains(m))
    })
}

/// Has an image and some real text, or is explicitly marked up as a listing
pub(crate) fn looks_like_listing(el: ElementRef) -> bool {
    has_marker(el) || (has_image(el) && element_text(el).chars().count() > MIN_CARD_TEXT_CHARS)
}

fn distinct_links(el: ElementRef, item_link: &Selector) -> usize {
    self_and_descendants(el)
        .filter(|e| item_link.matches(e))
        .filter_map(|e| e.value().attr("href"))
        .collect::<HashSet<_>>()
        .len()
}

/// Smallest ancestor within `max_steps` that looks like a listing.
///
/// Climbing stops at `body`, and at any ancestor holding more than one
/// distinct item link, since that is a list of listings rather than one.
/// Falls back to the candidate itself.
pub(crate) fn resolve_container<'a>(
    candidate: ElementRef<'a>,
    max_steps: usize,
    item_link: Option<&Selector>,
) -> ElementRef<'a> {
    if looks_like_listing(candidate) {
        return candidate;
    }

    let mut current = candidate;
    for _ in 0..max_steps {
        let Some(parent) = current.parent().and_then(ElementRef::wrap) else {
            break;
        };
        if matches!(parent.value().name(), "body" | "html") {
            break;
        }
        if item_link.is_some_and(|sel| distinct_links(parent, sel) > 1) {
            break;
        }
        if looks_like_listing(parent) {
            return parent;
        }
        current = parent;
    }
    candidate
}

/// Resolve `raw` against the page, ignoring script and fragment links
pub(crate) fn absolutize(base: &Url, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty()
        || raw.starts_with('#')
        || raw.starts_with("javascript:")
        || raw.starts_with("mailto:")
    {
        return None;
    }
    base.join(raw).ok().map(String::from)
}

/// Identity of an item link: absolute, without query or fragment
pub(crate) fn dedupe_key(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    parsed.set_fragment(None);
    parsed.set_query(None);
    Some(parsed.to_string())
}

fn href_of(el: ElementRef, base: &Url) -> Option<String> {
    if el.value().name() != "a" {
        return None;
    }
    el.value().attr("href").and_then(|href| absolutize(base, href))
}

/// The link a candidate itself points at: itself, or its nearest enclosing anchor
fn candidate_link(candidate: ElementRef, item_link: Option<&Selector>, base: &Url) -> Option<String> {
    href_of(candidate, base)
        .or_else(|| {
            candidate
                .ancestors()
                .filter_map(ElementRef::wrap)
                .find_map(|a| href_of(a, base))
        })
        .or_else(|| {
            let sel = item_link?;
            self_and_descendants(candidate)
                .filter(|e| sel.matches(e))
                .find_map(|e| href_of(e, base))
        })
}

/// Detail-page link for a listing
pub(crate) fn resolve_link(
    candidate: ElementRef,
    container: ElementRef,
    item_link: Option<&Selector>,
    base: &Url,
) -> Option<String> {
    candidate_link(candidate, item_link, base)
        .or_else(|| {
            let sel = item_link?;
            self_and_descendants(container)
                .filter(|e| sel.matches(e))
                .find_map(|e| href_of(e, base))
        })
        .or_else(|| self_and_descendants(container).find_map(|e| href_of(e, base)))
}

/// First real image source in the container. Lazy-loading placeholders
/// (`data:` URIs) give way to `data-src` / `srcset`.
pub(crate) fn resolve_image(container: ElementRef, base: &Url) -> Option<String> {
    self_and_descendants(container)
        .filter(|e| e.value().name() == "img")
        .find_map(|img| {
            let value = img.value();
            let srcset_first = value
                .attr("srcset")
                .and_then(|s| s.split(',').next())
                .and_then(|s| s.split_whitespace().next());

            [value.attr("src"), value.attr("data-src"), value.attr("data-lazy-src"), srcset_first]
                .into_iter()
                .flatten()
                .map(str::trim)
                .find(|src| !src.is_empty() && !src.starts_with("data:"))
                .and_then(|src| absolutize(base, src))
        })
}

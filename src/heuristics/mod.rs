//! Field heuristics shared by every extractor.
//!
//! Each classifier is a pure function over a subtree of a parsed document.
//! None of them error: a missing signal is `None`.

pub mod date;
pub mod location;
pub mod price;
pub mod title;

pub use date::{is_relative_date, parse_datetime_attr, parse_relative_date, select_date};
pub use location::{location_like_place, location_near_separator, select_location};
pub use price::{find_price, price_amount, select_price};
pub use title::{is_qualifying_title, select_title};

use scraper::{ElementRef, Selector};

/// Collapse runs of whitespace into single spaces
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The element and everything below it, in document order
pub fn self_and_descendants<'a>(el: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    el.descendants().filter_map(ElementRef::wrap)
}

/// Text of the whole subtree, whitespace-normalized
pub fn element_text(el: ElementRef) -> String {
    normalize_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

/// Individual non-empty text nodes of the subtree
pub fn text_nodes(el: ElementRef) -> Vec<String> {
    el.text()
        .map(normalize_whitespace)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Case-insensitive substring test on the `class` attribute
pub fn class_contains(el: ElementRef, needles: &[&str]) -> bool {
    el.value().attr("class").is_some_and(|class| {
        let class = class.to_lowercase();
        needles.iter().any(|needle| class.contains(needle))
    })
}

/// First element (self included) matching `selector`
pub fn first_match<'a>(el: ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    self_and_descendants(el).find(|candidate| selector.matches(candidate))
}

/// Text of the first matching element (self included) that has any
pub fn first_text(el: ElementRef, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        self_and_descendants(el)
            .filter(|candidate| selector.matches(candidate))
            .map(element_text)
            .find(|text| !text.is_empty())
    })
}

pub fn has_image(el: ElementRef) -> bool {
    self_and_descendants(el).any(|e| e.value().name() == "img")
}

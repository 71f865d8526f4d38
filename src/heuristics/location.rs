use super::{is_relative_date, price::find_price, text_nodes};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;

const SEPARATORS: &[char] = &['·', '•', '|', '—', '–'];

// "Seattle, WA", "St. Paul, MN"
static CITY_STATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z][A-Za-z.'\-]*(?:\s[A-Z][A-Za-z.'\-]*){0,3},\s?[A-Z]{2}$").unwrap()
});

// One to four capitalized words
static CAPITALIZED_PHRASE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z][A-Za-z.'\-]+(?:\s[A-Z][A-Za-z.'\-]+){0,3}$").unwrap()
});

// "Capitol Hill, Seattle", "Leeds, West Yorkshire", "(Capitol Hill)"
static PLACE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\(?[A-Z][A-Za-z.'\-]+(?:\s[A-Z][A-Za-z.'\-]+){0,3}(?:,\s?[A-Z][A-Za-z]+(?:\s[A-Z][A-Za-z]+)?)?\)?$",
    )
    .unwrap()
});

pub(crate) fn is_city_state(text: &str) -> bool {
    CITY_STATE_RE.is_match(text)
}

fn plausible(part: &str) -> bool {
    let len = part.chars().count();
    (2..=40).contains(&len) && !is_relative_date(part) && find_price(part).is_none()
}

/// A short capitalized phrase next to a separator glyph ("2 days ago · Tacoma"),
/// or a standalone "City, ST" text node.
pub fn location_near_separator(el: ElementRef) -> Option<String> {
    for text in text_nodes(el) {
        if is_city_state(&text) {
            return Some(text);
        }
        if !text.contains(SEPARATORS) {
            continue;
        }
        let found = text
            .split(SEPARATORS)
            .map(str::trim)
            .find(|part| {
                plausible(part) && (is_city_state(part) || CAPITALIZED_PHRASE_RE.is_match(part))
            });
        if let Some(part) = found {
            return Some(part.to_string());
        }
    }
    None
}

/// Anything in the subtree that merely looks like a place name.
/// Noisy; only the generic path uses it.
pub fn location_like_place(el: ElementRef, exclude: &str) -> Option<String> {
    text_nodes(el)
        .into_iter()
        .filter(|text| text.as_str() != exclude && plausible(text))
        .find(|text| (text.contains(',') || text.starts_with('(')) && PLACE_RE.is_match(text))
        .map(|text| text.trim_matches(|c: char| c == '(' || c == ')').to_string())
}

/// Best-effort location; `generic` widens the search to place-like text.
pub fn select_location(el: ElementRef, title: &str, generic: bool) -> Option<String> {
    location_near_separator(el).or_else(|| {
        if generic {
            location_like_place(el, title)
        } else {
            None
        }
    })
}

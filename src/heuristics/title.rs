use super::location::is_city_state;
use super::{class_contains, element_text, is_relative_date, normalize_whitespace, self_and_descendants, text_nodes};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;

// Exclusive bounds on title length, in characters
const MIN_TITLE_CHARS: usize = 5;
const MAX_TITLE_CHARS: usize = 200;

/// Interface strings that show up inside listing cards but never name an item
const UI_CHROME: &[&str] = &[
    "sign in",
    "log in",
    "share",
    "sold",
    "save",
    "saved",
    "message",
    "send message",
    "see more",
    "see all",
    "hide",
    "report",
    "follow",
    "sponsored",
    "free shipping",
    "buy it now",
    "or best offer",
    "new listing",
    "watch",
    "more like this",
    "see details",
    "just listed",
];

static CURRENCY_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[A-Z]{1,3}\s?)?[$€£¥₹]").unwrap());

static SOCIAL_COUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^[\d.,]+[km]?\+?\s+(?:likes?|comments?|shares?|views?|watchers?|watching|sold|bids?|reviews?|followers?|saves?|people)\b",
    )
    .unwrap()
});

/// Whether `text` could plausibly be a listing title
pub fn is_qualifying_title(text: &str) -> bool {
    let len = text.chars().count();
    if len <= MIN_TITLE_CHARS || len >= MAX_TITLE_CHARS {
        return false;
    }
    let lower = text.to_lowercase();
    !CURRENCY_PREFIX_RE.is_match(text)
        && !UI_CHROME.contains(&lower.as_str())
        && !SOCIAL_COUNT_RE.is_match(text)
        && !is_relative_date(text)
        && !is_city_state(text)
}

fn accessible_names(el: ElementRef) -> Vec<String> {
    self_and_descendants(el)
        .filter(|e| e.id() == el.id() || e.value().name() == "a")
        .flat_map(|e| {
            ["aria-label", "title"]
                .into_iter()
                .filter_map(move |attr| e.value().attr(attr))
        })
        .map(normalize_whitespace)
        .collect()
}

fn headings(el: ElementRef) -> Vec<String> {
    self_and_descendants(el)
        .filter(|e| {
            matches!(e.value().name(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
                || e.value().attr("role") == Some("heading")
        })
        .map(element_text)
        .collect()
}

fn classed_names(el: ElementRef) -> Vec<String> {
    self_and_descendants(el)
        .filter(|e| class_contains(*e, &["title", "name"]))
        .map(element_text)
        .collect()
}

fn free_text(el: ElementRef) -> Vec<String> {
    text_nodes(el)
}

/// Longest qualifying candidate; the earliest wins a tie
fn longest_qualifying(candidates: Vec<String>) -> Option<String> {
    candidates
        .into_iter()
        .filter(|c| is_qualifying_title(c))
        .fold(None, |best: Option<String>, c| match best {
            Some(b) if b.chars().count() >= c.chars().count() => Some(b),
            _ => Some(c),
        })
}

/// Title for a listing subtree.
///
/// Strategies run in order: accessible names, headings, `*title*`/`*name*`
/// classes, then loose text nodes. The first strategy producing a
/// qualifying string wins.
pub fn select_title(el: ElementRef) -> Option<String> {
    let strategies: [fn(ElementRef) -> Vec<String>; 4] =
        [accessible_names, headings, classed_names, free_text];

    strategies
        .iter()
        .find_map(|strategy| longest_qualifying(strategy(el)))
}

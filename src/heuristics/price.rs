use super::{class_contains, element_text, self_and_descendants};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;

// Currency symbol, then an amount with optional thousands groups and decimals
static PRICE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[$€£¥₹]\s?\d+(?:[,.]\d{3})*(?:[.,]\d{1,2})?").unwrap()
});

static AMOUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d(?:[\d.,\s]*\d)?").unwrap());

/// The first currency amount in `text`, verbatim (symbol included)
pub fn find_price(text: &str) -> Option<String> {
    PRICE_RE.find(text).map(|m| m.as_str().to_string())
}

/// Price for a listing subtree: a currency match anywhere in its text,
/// else the text of a `*price*` / `*cost*` classed element.
pub fn select_price(el: ElementRef) -> Option<String> {
    if let Some(price) = find_price(&element_text(el)) {
        return Some(price);
    }

    self_and_descendants(el)
        .filter(|e| class_contains(*e, &["price", "cost"]))
        .map(element_text)
        .find(|text| !text.is_empty())
}

/// Numeric amount of a display price, for filtering and sorting only.
///
/// A trailing separator followed by one or two digits is the decimal point;
/// every other separator is a thousands separator.
pub fn price_amount(price: &str) -> Option<f64> {
    let raw: String = AMOUNT_RE
        .find(price)?
        .as_str()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let (whole, fraction) = match raw.rfind(|c: char| c == ',' || c == '.') {
        Some(idx) if raw.len() - idx - 1 <= 2 => (&raw[..idx], &raw[idx + 1..]),
        _ => (raw.as_str(), ""),
    };

    let digits: String = whole.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    if fraction.is_empty() {
        digits.parse().ok()
    } else {
        format!("{digits}.{fraction}").parse().ok()
    }
}

use super::{self_and_descendants, text_nodes};
use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;

static RELATIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d+|an?)\s+(hour|day|week|month)s?\s+ago\b").unwrap()
});

// Attributes that carry a machine-readable timestamp
const DATE_ATTRS: &[&str] = &["datetime", "data-date", "data-datetime", "data-timestamp"];

pub fn is_relative_date(text: &str) -> bool {
    RELATIVE_RE.is_match(text)
}

/// "3 days ago" relative to `now`. Months step the calendar, not 30-day blocks.
pub fn parse_relative_date(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let caps = RELATIVE_RE.captures(text)?;
    let count: u32 = match &caps[1] {
        n if n.eq_ignore_ascii_case("a") || n.eq_ignore_ascii_case("an") => 1,
        n => n.parse().ok()?,
    };

    match caps[2].to_lowercase().as_str() {
        "hour" => now.checked_sub_signed(Duration::hours(i64::from(count))),
        "day" => now.checked_sub_signed(Duration::days(i64::from(count))),
        "week" => now.checked_sub_signed(Duration::days(i64::from(count) * 7)),
        "month" => now.checked_sub_months(Months::new(count)),
        _ => None,
    }
}

/// Parse a timestamp attribute value (RFC 3339, plain dates, epoch millis)
pub fn parse_datetime_attr(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }

    // Epoch seconds or millis
    if value.len() >= 9 && value.chars().all(|c| c.is_ascii_digit()) {
        let raw: i64 = value.parse().ok()?;
        return if value.len() > 11 {
            Utc.timestamp_millis_opt(raw).single()
        } else {
            Utc.timestamp_opt(raw, 0).single()
        };
    }

    None
}

/// Posting date for a listing subtree: a machine-readable attribute when
/// present, otherwise the first relative-date phrase in its text.
pub fn select_date(el: ElementRef, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let from_attr = self_and_descendants(el).find_map(|e| {
        DATE_ATTRS
            .iter()
            .filter_map(|attr| e.value().attr(attr))
            .find_map(parse_datetime_attr)
    });
    if from_attr.is_some() {
        return from_attr;
    }

    text_nodes(el)
        .iter()
        .find_map(|text| parse_relative_date(text, now))
}

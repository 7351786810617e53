// src/extract/period.rs
//! Reporting-period detection: "Q2 2025", "H1 2025", "FY 2025".

use once_cell::sync::Lazy;
use regex::Regex;

use crate::extract::floor_char_boundary;

/// Only the leading slice of body text is searched; period tokens deep in a
/// document usually refer to comparatives, not the reporting period.
const BODY_HEAD: usize = 1_000;

/// Ordered by priority: an explicit quarter always beats a full-year token,
/// regardless of position.
static PERIOD_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b(?P<q>Q[1-4])\s*(?P<year>20\d{2})\b",
        r"\b(?P<q>H[12])\s*(?P<year>20\d{2})\b",
        r"\b(?P<q>first|second|third|fourth)\s+quarter\s+(?:of\s+)?(?P<year>20\d{2})\b",
        r"\b(?P<q>full[-\s]?year|FY)\s*(?P<year>20\d{2})\b",
    ]
    .into_iter()
    .map(|pat| Regex::new(&format!("(?i){pat}")).unwrap())
    .collect()
});

/// Title hint first, then the head of the body; first pattern to match in
/// the first source wins. `None` means "period unknown", not failure.
pub fn detect_period(title_hint: Option<&str>, text: &str) -> Option<String> {
    let head = &text[..floor_char_boundary(text, BODY_HEAD)];
    let sources = title_hint.into_iter().chain(std::iter::once(head));
    for blob in sources {
        for pattern in PERIOD_PATTERNS.iter() {
            if let Some(caps) = pattern.captures(blob) {
                if let (Some(q), Some(year)) = (caps.name("q"), caps.name("year")) {
                    return Some(format!("{} {}", normalize_quarter(q.as_str()), year.as_str()));
                }
            }
        }
    }
    None
}

fn normalize_quarter(raw: &str) -> String {
    let lower = raw.to_ascii_lowercase();
    if lower.starts_with("first") {
        "Q1".to_string()
    } else if lower.starts_with("second") {
        "Q2".to_string()
    } else if lower.starts_with("third") {
        "Q3".to_string()
    } else if lower.starts_with("fourth") {
        "Q4".to_string()
    } else if lower.starts_with("full") || lower == "fy" {
        "FY".to_string()
    } else {
        raw.to_ascii_uppercase()
    }
}

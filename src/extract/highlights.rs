// src/extract/highlights.rs
//! Bullet-point selection from the article body. Trusted wire/IR pages get
//! their list items harvested; everything else falls back to paragraphs,
//! where list markup is unreliable or promotional.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::extract::kpi::{KPI_KEYWORD_RE, MONEY_RE, PCT_RE};
use crate::normalize::NormalizedDoc;

#[derive(Debug, Clone, Copy)]
pub struct HighlightLimits {
    pub min_len: usize,
    pub max_len: usize,
    pub cap: usize,
}

static BANNED_PROMO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)subscribe|sign\s+up|newsletter|click\s+here|read\s+more|learn\s+more|follow\s+us|download\s+(?:the|our)\s+app|contact\s+us|cookie|privacy\s+policy|terms\s+(?:and|&)\s+conditions|forward-looking\s+statements?|about\s+(?:us|the\s+company)",
    )
    .unwrap()
});

pub fn compose_highlights(
    doc: &NormalizedDoc,
    trusted: bool,
    limits: &HighlightLimits,
) -> Vec<String> {
    let pool: &[String] = if trusted && !doc.list_items.is_empty() {
        &doc.list_items
    } else {
        &doc.paragraphs
    };

    let mut seen: HashSet<String> = HashSet::new();
    let mut out: Vec<String> = Vec::new();
    for raw in pool {
        if out.len() >= limits.cap {
            break;
        }
        let candidate = raw.trim();
        let chars = candidate.chars().count();
        if chars < limits.min_len || chars > limits.max_len {
            continue;
        }
        if BANNED_PROMO.is_match(candidate) {
            continue;
        }
        if !MONEY_RE.is_match(candidate)
            && !PCT_RE.is_match(candidate)
            && !KPI_KEYWORD_RE.is_match(candidate)
        {
            continue;
        }
        if seen.insert(candidate.to_lowercase()) {
            out.push(candidate.to_string());
        }
    }
    out
}

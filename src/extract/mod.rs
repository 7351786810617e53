// src/extract/mod.rs
//! The three analyses over normalized text (KPIs, reporting period,
//! highlights) and the assembler that merges them into one payload.

pub mod highlights;
pub mod kpi;
pub mod period;

use crate::config::Config;
use crate::normalize::NormalizedDoc;
use crate::payload::{Candidate, MetricSet, SummaryPayload};

pub use highlights::HighlightLimits;

/// Note attached when no KPI matched anywhere in the document.
const NO_KPI_NOTE: &str = "Could not confidently extract KPIs; included link and summary context.";

const GUIDANCE_MAX_ITEMS: usize = 2;

pub(crate) fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut i = index.min(s.len());
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

pub(crate) fn ceil_char_boundary(s: &str, index: usize) -> usize {
    let mut i = index.min(s.len());
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

/// Run every analyzer and assemble the notifier payload. `trusted` is the
/// canonical host's trust tier, decided by the caller's domain policy.
pub fn summarize_document(
    candidate: &Candidate,
    doc: &NormalizedDoc,
    trusted: bool,
    limits: &HighlightLimits,
) -> SummaryPayload {
    let title_hint = Some(candidate.title.as_str())
        .filter(|t| !t.trim().is_empty());

    // Headline: watcher title first, then <title>, then the URL itself.
    let headline = title_hint
        .map(str::to_string)
        .or_else(|| doc.title.clone())
        .unwrap_or_else(|| doc.final_url.clone());

    let metrics = kpi::extract_metrics(&doc.text);
    let period = period::detect_period(title_hint, &doc.text);

    let (short_summary, mut bullets) = compose_summary(&headline, period.as_deref(), &metrics);
    bullets.extend(kpi::guidance_snippets(&doc.text, GUIDANCE_MAX_ITEMS));
    bullets.extend(highlights::compose_highlights(doc, trusted, limits));
    let key_highlights = dedup_case_insensitive(bullets, limits.cap);

    let (geo_breakdown, product_breakdown) = kpi::breakdown_lines(&doc.text);
    let controversial_points = kpi::controversy_flags(&doc.text);
    let final_thoughts = (!metrics.any_found()).then(|| NO_KPI_NOTE.to_string());

    SummaryPayload {
        headline,
        final_url: doc.final_url.clone(),
        short_summary,
        key_highlights,
        metrics,
        geo_breakdown,
        product_breakdown,
        controversial_points,
        period,
        final_thoughts,
    }
}

pub fn limits_from_config(cfg: &Config) -> HighlightLimits {
    HighlightLimits {
        min_len: cfg.highlight_min_len,
        max_len: cfg.highlight_max_len,
        cap: cfg.max_highlights,
    }
}

/// Short summary plus the metric bullets it was built from:
/// `"Q2 2025 results: Revenue $120.5 million (up 12%) ..."`.
fn compose_summary(
    headline: &str,
    period: Option<&str>,
    metrics: &MetricSet,
) -> (String, Vec<String>) {
    let mut parts: Vec<String> = Vec::new();
    let mut bullets: Vec<String> = Vec::new();

    if let Some(p) = period {
        parts.push(format!("{p} results:"));
    }
    for (label, metric) in metrics.labeled() {
        if metric.is_empty() {
            continue;
        }
        let mut value = String::new();
        if let Some(current) = &metric.current {
            value.push_str(current);
        }
        if let Some(yoy) = &metric.yoy {
            if !value.is_empty() {
                value.push(' ');
            }
            value.push('(');
            value.push_str(yoy);
            value.push(')');
        }
        parts.push(format!("{label} {value}"));
        bullets.push(format!("{label}: {value}"));
    }

    let short = if parts.is_empty() {
        headline.to_string()
    } else {
        parts.join(" ")
    };
    (short, bullets)
}

fn dedup_case_insensitive(items: Vec<String>, cap: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for item in items {
        let trimmed = item.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_lowercase()) {
            out.push(trimmed.to_string());
        }
        if out.len() >= cap {
            break;
        }
    }
    out
}

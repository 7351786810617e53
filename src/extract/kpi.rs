// src/extract/kpi.rs
//! Regex-heuristic KPI extraction: headline metrics with nearby YoY deltas,
//! controversy flags, guidance sentences, and geo/product breakdown lines.
//!
//! These patterns are deliberately heuristic and every one of them is pinned
//! by a fixture test below. Tighten a pattern only together with its test.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::extract::{ceil_char_boundary, floor_char_boundary};
use crate::normalize::squash_spaces;
use crate::payload::{Metric, MetricSet};

/* ---------------------------- pattern atoms ---------------------------- */

const CURRENCY: &str = r"[$£€]";
const NUM: &str = r"\d{1,3}(?:[,\s]\d{3})*(?:\.\d+)?";
const UNIT: &str = r"(?:billion|bn|millions?|mn|m|thousand|k)\b";
const PCT: &str = r"-?\d{1,3}(?:\.\d+)?\s?%";

/// Metrics are only searched in the leading slice of the document; tail
/// boilerplate (safe-harbor text, footnotes) produces false matches.
const METRIC_SCAN_CAP: usize = 20_000;

/// How far around a KPI match a YoY expression may sit, in bytes.
const YOY_PROXIMITY: usize = 200;

const FLAG_MAX_CHARS: usize = 160;
const CONTROVERSY_CAP: usize = 5;

const BREAKDOWN_MAX_LINE: usize = 200;
const BREAKDOWN_CAP: usize = 3;

fn metric_pattern(label: &str, window: usize, value: &str) -> Regex {
    // The value window is lazy so the value nearest the label wins, and it
    // never crosses a line break.
    Regex::new(&format!(
        r"(?i)\b{label}\b[^\n\r]{{0,{window}}}?(?P<value>{value})"
    ))
    .unwrap()
}

/// Currency-prefixed or bare grouped number, optional magnitude suffix.
/// The boundaries on both ends reject digit runs glued to words ("Q2") and
/// ungrouped four-digit runs such as years.
fn money_value() -> String {
    format!(r"(?:{CURRENCY}\s*)?-?\b{NUM}(?:\s*{UNIT})?\b")
}

static REVENUE_PAT: Lazy<Regex> =
    Lazy::new(|| metric_pattern(r"(?:total\s+|net\s+)?revenues?", 160, &money_value()));
static EBITDA_PAT: Lazy<Regex> =
    Lazy::new(|| metric_pattern(r"(?:adjusted\s+|adj\.?\s*)?ebitda", 160, &money_value()));
static NET_INCOME_PAT: Lazy<Regex> =
    Lazy::new(|| metric_pattern(r"net\s+(?:income|loss|earnings)", 160, &money_value()));
static EPS_PAT: Lazy<Regex> = Lazy::new(|| {
    metric_pattern(
        r"(?:adjusted\s+)?(?:diluted\s+|basic\s+)?(?:eps|earnings\s+per\s+share)",
        120,
        &format!(r"(?:{CURRENCY}\s*)?-?\b{NUM}\b"),
    )
});

/// Explicit YoY phrase, with the percentage after the marker. The optional
/// verb is captured only when it sits directly before the percentage.
static YOY_EXPLICIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:yoy|year[-\s]?over[-\s]?year|vs\.?\s*prior\s*year|prior\s*year)[^\n\r]{{0,40}}?(?:(?P<verb>up|down|increase[sd]?|decrease[sd]?|grew|rose|fell)\s+)?(?P<pct>{PCT})"
    ))
    .unwrap()
});

static YOY_DIRECTIONAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?P<verb>up|down|increase[sd]?|decrease[sd]?|grew|rose|fell)\s+(?P<pct>{PCT})"
    ))
    .unwrap()
});

static GUIDANCE_PAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?P<kw>guidance|outlook|reaffirm\w*|raise[sd]?|lower[sd]?)\b[^\n\r]{0,200}")
        .unwrap()
});

/* ----------------------- shared line qualifiers ------------------------ */

/// Monetary amount: currency symbol before a digit, or number plus a
/// magnitude word. Bare `m`/`k` suffixes are too noisy to count here.
pub(crate) static MONEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i){CURRENCY}\s*\d|\b{NUM}\s*(?:billion|bn|millions?|mn|thousand)\b"
    ))
    .unwrap()
});

pub(crate) static PCT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(PCT).unwrap());

pub(crate) static KPI_KEYWORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:revenue|ebitda|eps|earnings|net\s+(?:income|loss)|margin|profit|cash\s+flow|guidance|outlook|dividend|growth)\b")
        .unwrap()
});

/* ------------------------------- metrics ------------------------------- */

pub fn extract_metrics(text: &str) -> MetricSet {
    let scan = &text[..floor_char_boundary(text, METRIC_SCAN_CAP)];
    MetricSet {
        revenue: find_metric(scan, &REVENUE_PAT),
        ebitda: find_metric(scan, &EBITDA_PAT),
        net_income: find_metric(scan, &NET_INCOME_PAT),
        eps: find_metric(scan, &EPS_PAT),
    }
}

fn find_metric(text: &str, pattern: &Regex) -> Metric {
    let mut metric = Metric::default();
    let Some(caps) = pattern.captures(text) else {
        return metric;
    };
    if let (Some(whole), Some(value)) = (caps.get(0), caps.name("value")) {
        metric.current = Some(squash_spaces(value.as_str()));
        metric.yoy = find_yoy(yoy_window(text, whole.start(), whole.end()));
    }
    metric
}

/// Proximity window around a KPI hit. Clamped to the hit's own line so a
/// neighboring metric's change figure cannot bleed in.
fn yoy_window(text: &str, hit_start: usize, hit_end: usize) -> &str {
    let line_start = text[..hit_start].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line_end = text[hit_end..]
        .find('\n')
        .map(|i| hit_end + i)
        .unwrap_or(text.len());
    let start = line_start.max(floor_char_boundary(
        text,
        hit_start.saturating_sub(YOY_PROXIMITY),
    ));
    let end = line_end.min(ceil_char_boundary(text, hit_end + YOY_PROXIMITY));
    &text[start..end]
}

fn find_yoy(window: &str) -> Option<String> {
    if let Some(caps) = YOY_EXPLICIT.captures(window) {
        let pct = caps.name("pct")?.as_str();
        let yoy = match caps.name("verb") {
            Some(verb) => format!("{} {}", verb.as_str(), pct),
            None => pct.to_string(),
        };
        return Some(squash_spaces(&yoy));
    }
    let caps = YOY_DIRECTIONAL.captures(window)?;
    let verb = caps.name("verb")?;
    let pct = caps.name("pct")?;
    Some(squash_spaces(&format!(
        "{} {}",
        verb.as_str(),
        pct.as_str()
    )))
}

/* ------------------------------ guidance ------------------------------- */

/// Guidance/outlook mentions, expanded to the sentence around the keyword.
pub fn guidance_snippets(text: &str, max_items: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for caps in GUIDANCE_PAT.captures_iter(text) {
        let Some(kw) = caps.name("kw") else {
            continue;
        };
        let snippet = squash_spaces(sentence_around(text, kw.start(), kw.end()));
        if !snippet.is_empty() && !out.iter().any(|s| s == &snippet) {
            out.push(snippet);
        }
        if out.len() >= max_items {
            break;
        }
    }
    out
}

fn sentence_around(text: &str, hit_start: usize, hit_end: usize) -> &str {
    let start = text[..hit_start].rfind('.').map(|i| i + 1).unwrap_or(0);
    let end = text[hit_end..]
        .find('.')
        .map(|i| hit_end + i + 1)
        .unwrap_or_else(|| ceil_char_boundary(text, hit_end + 160));
    &text[start..end]
}

/* ----------------------------- controversy ----------------------------- */

static CONTROVERSY_STEMS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("investigation", r"\binvestigat\w*"),
        ("fine", r"\bfine[sd]?\b"),
        ("penalty", r"\bpenalt\w*"),
        ("sanction", r"\bsanction\w*"),
        ("lawsuit", r"\blawsuit\w*"),
        ("litigation", r"\blitigation\b"),
        ("restatement", r"\brestat\w*"),
        ("governance", r"\bgovernance\b"),
        ("probe", r"\bprobe[sd]?\b"),
        ("fraud", r"\bfraud\w*"),
        ("subpoena", r"\bsubpoena\w*"),
        ("settlement", r"\bsettlement\w*"),
    ]
    .into_iter()
    .map(|(stem, pat)| (stem, Regex::new(&format!("(?i){pat}")).unwrap()))
    .collect()
});

/// One flag line per matched stem, carrying the line the stem appeared on.
pub fn controversy_flags(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for (_, pattern) in CONTROVERSY_STEMS.iter() {
        if out.len() >= CONTROVERSY_CAP {
            break;
        }
        let Some(hit) = pattern.find(text) else {
            continue;
        };
        let flag = clamp_chars(&squash_spaces(containing_line(text, hit.start())), FLAG_MAX_CHARS);
        if flag.is_empty() {
            continue;
        }
        if !out.iter().any(|seen| seen.eq_ignore_ascii_case(&flag)) {
            out.push(flag);
        }
    }
    out
}

fn containing_line(text: &str, pos: usize) -> &str {
    let start = text[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let end = text[pos..].find('\n').map(|i| pos + i).unwrap_or(text.len());
    &text[start..end]
}

fn clamp_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/* ------------------------------ breakdowns ----------------------------- */

static GEO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:north|latin|south)\s+america\b|\bamericas\b|\bunited\s+states\b|\bu\.s\.|\beurope(?:an)?\b|\bemea\b|\bapac\b|\basia(?:[-\s]pacific)?\b|\bunited\s+kingdom\b|\buk\b|\bgermany\b|\bcanada\b|\baustralia\b|\bnordics?\b|\binternational\b|\bdomestic\b|\brest\s+of\s+(?:the\s+)?world\b",
    )
    .unwrap()
});

static PRODUCT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:online|igaming|sportsbook|sports\s+betting|casino|gaming|poker|bingo|lottery|retail|b2b|b2c|subscription|advertising|media|software|hardware|services|cloud|platform|licensing|e-?commerce)\b",
    )
    .unwrap()
});

static BUYBACK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:buy-?backs?|share\s+repurchases?|repurchases?\s+of\s+shares|repurchase\s+program)\b")
        .unwrap()
});

/// Geography and product breakdown lines, in document order. A line must be
/// short, name a known region or vertical, and carry a figure; buyback lines
/// are dropped outright.
pub fn breakdown_lines(text: &str) -> (Vec<String>, Vec<String>) {
    let mut geo: Vec<String> = Vec::new();
    let mut product: Vec<String> = Vec::new();
    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.chars().count() > BREAKDOWN_MAX_LINE {
            continue;
        }
        if BUYBACK_RE.is_match(line) {
            continue;
        }
        if !MONEY_RE.is_match(line) && !PCT_RE.is_match(line) {
            continue;
        }
        if geo.len() < BREAKDOWN_CAP && GEO_RE.is_match(line) {
            geo.push(squash_spaces(line));
        }
        if product.len() < BREAKDOWN_CAP && PRODUCT_RE.is_match(line) {
            product.push(squash_spaces(line));
        }
        if geo.len() >= BREAKDOWN_CAP && product.len() >= BREAKDOWN_CAP {
            break;
        }
    }
    (geo, product)
}

/* -------------------------------- tests -------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revenue_takes_the_value_nearest_the_label() {
        let m = find_metric("Revenue of $120.5 million, up 12% YoY", &REVENUE_PAT);
        assert_eq!(m.current.as_deref(), Some("$120.5 million"));
        assert_eq!(m.yoy.as_deref(), Some("up 12%"));
    }

    #[test]
    fn label_window_skips_years_and_glued_digits() {
        let m = find_metric(
            "Revenue for Q2 2025 grew to $88.1 million in the period",
            &REVENUE_PAT,
        );
        assert_eq!(m.current.as_deref(), Some("$88.1 million"));
    }

    #[test]
    fn absent_kpi_stays_absent() {
        let metrics = extract_metrics("No quantitative disclosures in this update.");
        assert!(!metrics.any_found());
        assert_eq!(metrics.revenue.current, None);
        assert_eq!(metrics.revenue.yoy, None);
    }

    #[test]
    fn ebitda_accepts_adjusted_and_abbreviated_labels() {
        let m = find_metric("Adjusted EBITDA of $30.2 million", &EBITDA_PAT);
        assert_eq!(m.current.as_deref(), Some("$30.2 million"));
        let m = find_metric("Adj. EBITDA rose to £12.4m", &EBITDA_PAT);
        assert_eq!(m.current.as_deref(), Some("£12.4m"));
    }

    #[test]
    fn net_loss_counts_as_net_income_label() {
        let m = find_metric("Net loss of $4.2 million for the quarter", &NET_INCOME_PAT);
        assert_eq!(m.current.as_deref(), Some("$4.2 million"));
    }

    #[test]
    fn eps_reads_plain_decimals() {
        let m = find_metric("Diluted EPS of $0.45 compared with $0.38", &EPS_PAT);
        assert_eq!(m.current.as_deref(), Some("$0.45"));
        let m = find_metric("Earnings per share were 0.12", &EPS_PAT);
        assert_eq!(m.current.as_deref(), Some("0.12"));
    }

    #[test]
    fn yoy_does_not_cross_lines_to_a_neighboring_metric() {
        let text = "Revenue of $120.5 million, up 12% YoY\nAdjusted EBITDA of $30.2 million";
        let revenue = find_metric(text, &REVENUE_PAT);
        let ebitda = find_metric(text, &EBITDA_PAT);
        assert_eq!(revenue.yoy.as_deref(), Some("up 12%"));
        assert_eq!(ebitda.current.as_deref(), Some("$30.2 million"));
        assert_eq!(ebitda.yoy, None);
    }

    #[test]
    fn yoy_beyond_the_proximity_window_is_ignored() {
        let padding = "x".repeat(260);
        let text = format!("Revenue of $5.0 million {padding} later it was up 9%");
        let m = find_metric(&text, &REVENUE_PAT);
        assert_eq!(m.current.as_deref(), Some("$5.0 million"));
        assert_eq!(m.yoy, None);
    }

    #[test]
    fn explicit_yoy_phrase_beats_a_directional_verb() {
        let text = "Revenue of $10.0 million rose 5% though vs. prior year up 9.5%";
        let m = find_metric(text, &REVENUE_PAT);
        assert_eq!(m.yoy.as_deref(), Some("up 9.5%"));
    }

    #[test]
    fn window_clamp_survives_multibyte_neighbors() {
        // The raw window edge lands inside a three-byte character and has to
        // be pulled back to a boundary before slicing.
        let pad = "€".repeat(100);
        let text = format!("{pad}Revenue of $7.1 million grew 4%{pad}");
        let m = find_metric(&text, &REVENUE_PAT);
        assert_eq!(m.current.as_deref(), Some("$7.1 million"));
        assert_eq!(m.yoy.as_deref(), Some("grew 4%"));
    }

    #[test]
    fn extraction_is_deterministic() {
        let text = "Revenue of $3.3 million, down 2% YoY\nNet income of $1.0 million";
        assert_eq!(extract_metrics(text), extract_metrics(text));
    }

    #[test]
    fn guidance_expands_to_sentence_boundaries_and_caps() {
        let text = "Intro line.\n\
                    The company raised its full-year guidance to $500 million.\n\
                    Management reaffirmed the outlook for margins.\n\
                    Guidance was also discussed at length.\n\
                    Closing.";
        let out = guidance_snippets(text, 2);
        assert_eq!(out.len(), 2);
        assert_eq!(
            out[0],
            "The company raised its full-year guidance to $500 million."
        );
        assert_eq!(out[1], "Management reaffirmed the outlook for margins.");
    }

    #[test]
    fn one_controversy_flag_per_stem_with_its_line() {
        let text = "The regulator opened an investigation into billing.\n\
                    A fine of $2 million was paid.\n\
                    Another investigation was rumored.";
        let flags = controversy_flags(text);
        assert_eq!(flags.len(), 2);
        assert!(flags[0].contains("investigation into billing"));
        assert!(flags[1].contains("fine of $2 million"));
    }

    #[test]
    fn controversy_flags_share_a_line_without_duplicating_it() {
        let text = "The settlement resolves the lawsuit over licensing.";
        let flags = controversy_flags(text);
        assert_eq!(flags.len(), 1);
    }

    #[test]
    fn breakdown_lines_need_a_token_and_a_figure() {
        let text = "Europe revenue grew 18% to $40.0 million\n\
                    Online casino revenue was $25.1 million\n\
                    Europe remains a focus area\n\
                    The $50 million share buyback program in Europe continued\n\
                    United States revenue of $30.0 million\n";
        let (geo, product) = breakdown_lines(text);
        assert_eq!(geo.len(), 2);
        assert!(geo[0].starts_with("Europe revenue grew"));
        assert!(geo[1].starts_with("United States revenue"));
        assert_eq!(product.len(), 1);
        assert!(product[0].starts_with("Online casino"));
    }

    #[test]
    fn a_line_can_feed_both_breakdown_lists() {
        let text = "Online revenue in Germany rose 21%";
        let (geo, product) = breakdown_lines(text);
        assert_eq!(geo.len(), 1);
        assert_eq!(product.len(), 1);
    }

    #[test]
    fn overlong_breakdown_lines_are_dropped() {
        let filler = "very ".repeat(50);
        let text = format!("Europe revenue grew 18% {filler}to $40.0 million");
        let (geo, _) = breakdown_lines(&text);
        assert!(geo.is_empty());
    }
}

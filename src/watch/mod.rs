// src/watch/mod.rs
//! Discovery watchers: each source implements one capability trait and the
//! orchestrator drives a flat list of them. Watcher failures are per-source
//! and never abort a batch.

pub mod edgar;
pub mod page;
pub mod rss;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use time::format_description::well_known::Rfc2822;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::config::Config;
use crate::payload::Candidate;
use crate::policy::DomainPolicy;
use crate::watchlist::Watchlist;

#[async_trait]
pub trait Watcher: Send + Sync {
    async fn poll(&self) -> Result<Vec<Candidate>>;
    fn name(&self) -> &str;
    /// Filing-index sources carry their own policy-bypass knobs downstream.
    fn is_filing_source(&self) -> bool {
        false
    }
}

/// A candidate plus which kind of source produced it.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub candidate: Candidate,
    pub from_filing_index: bool,
}

/// Words that mark an anchor/feed title as a results announcement.
const RESULT_WORDS: &[&str] = &[
    "results",
    "earnings",
    "quarter",
    "q1",
    "q2",
    "q3",
    "q4",
    "trading update",
    "interim",
    "half-year",
    "half year",
    "full year",
    "annual",
    "preliminary",
    "trading statement",
];

static HREF_SIGNALS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)news-details|press-releases|event-details|events|financials|quarterly-results|static-files|/q[1-4]\b|/earnings|/results|fy\d{2,4}",
    )
    .unwrap()
});

static TITLE_YEAR_QUARTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:q[1-4]\s+\d{4}|fy\d{2,4}|full\s+year\s+\d{4})\b").unwrap());

/// Does the link text or the href itself suggest a results announcement?
pub(crate) fn looks_like_results(text: &str, href: &str) -> bool {
    let lower = text.to_lowercase();
    if RESULT_WORDS.iter().any(|w| lower.contains(w)) {
        return true;
    }
    if TITLE_YEAR_QUARTER.is_match(&lower) {
        return true;
    }
    HREF_SIGNALS.is_match(href)
}

/// RFC 2822 feed timestamps to UTC; anything unparseable is simply unknown.
pub(crate) fn parse_rfc2822_utc(ts: &str) -> Option<DateTime<Utc>> {
    OffsetDateTime::parse(ts, &Rfc2822)
        .ok()
        .and_then(|dt| DateTime::<Utc>::from_timestamp(dt.unix_timestamp(), 0))
}

/// One RSS watcher per feed, one page watcher per IR page, and a single
/// filing-index watcher when any issuer carries a CIK.
pub fn build_watchers(cfg: &Config, watchlist: &Watchlist) -> Result<Vec<Box<dyn Watcher>>> {
    let policy = DomainPolicy::from_config(cfg);
    let client = browser_client(cfg)?;

    let mut out: Vec<Box<dyn Watcher>> = Vec::new();
    for issuer in &watchlist.issuers {
        for feed in &issuer.rss_feeds {
            out.push(Box::new(rss::RssWatcher::new(
                issuer.name.clone(),
                feed.clone(),
                client.clone(),
                policy.clone(),
                cfg.lookback_days,
            )));
        }
        for page in &issuer.ir_pages {
            out.push(Box::new(page::PageWatcher::new(
                issuer.name.clone(),
                page.clone(),
                client.clone(),
                policy.clone(),
            )));
        }
    }
    if watchlist.issuers.iter().any(|i| i.cik_padded().is_some()) {
        out.push(Box::new(edgar::EdgarWatcher::new(
            cfg,
            watchlist.issuers.clone(),
        )?));
    }
    Ok(out)
}

fn browser_client(cfg: &Config) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(&cfg.user_agent)
        .connect_timeout(cfg.connect_timeout)
        .timeout(cfg.read_timeout)
        .build()?)
}

/// Poll every watcher in turn, tolerating per-source failures.
pub async fn poll_all(watchers: &[Box<dyn Watcher>]) -> Vec<Discovery> {
    let mut out = Vec::new();
    for watcher in watchers {
        match watcher.poll().await {
            Ok(candidates) => {
                debug!(watcher = watcher.name(), count = candidates.len(), "poll complete");
                out.extend(candidates.into_iter().map(|candidate| Discovery {
                    candidate,
                    from_filing_index: watcher.is_filing_source(),
                }));
            }
            Err(error) => {
                warn!(watcher = watcher.name(), %error, "poll failed");
            }
        }
    }
    out
}

// src/watch/page.rs
//! Investor-relations page watcher: scrapes anchors that look like results
//! announcements and resolves them against the page URL.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

use crate::normalize::squash_spaces;
use crate::payload::Candidate;
use crate::policy::DomainPolicy;
use crate::watch::{looks_like_results, Watcher};

static ANCHOR_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static TIME_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("time[datetime]").unwrap());

pub struct PageWatcher {
    source: String,
    page_url: String,
    client: reqwest::Client,
    policy: DomainPolicy,
    label: String,
}

impl PageWatcher {
    pub fn new(
        source: String,
        page_url: String,
        client: reqwest::Client,
        policy: DomainPolicy,
    ) -> Self {
        let label = format!("page:{source}");
        Self {
            source,
            page_url,
            client,
            policy,
            label,
        }
    }
}

#[async_trait]
impl Watcher for PageWatcher {
    async fn poll(&self) -> Result<Vec<Candidate>> {
        let resp = self
            .client
            .get(&self.page_url)
            .header(reqwest::header::REFERER, &self.page_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("fetching ir page {}", self.page_url))?;
        let body = resp.text().await.context("reading ir page body")?;
        candidates_from_page(&self.source, &self.page_url, &body, &self.policy)
    }

    fn name(&self) -> &str {
        &self.label
    }
}

/// Anchor harvesting, separated from HTTP so fixtures can drive it. The
/// page-level `<time datetime>` value, when present, stamps every candidate.
pub fn candidates_from_page(
    source: &str,
    page_url: &str,
    html: &str,
    policy: &DomainPolicy,
) -> Result<Vec<Candidate>> {
    let base = Url::parse(page_url).with_context(|| format!("ir page url {page_url}"))?;
    let doc = Html::parse_document(html);

    let page_ts = doc
        .select(&TIME_SEL)
        .filter_map(|el| el.value().attr("datetime"))
        .find_map(parse_page_timestamp);

    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for anchor in doc.select(&ANCHOR_SEL) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Ok(resolved) = base.join(href) else {
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }
        let url = resolved.to_string();
        let title = squash_spaces(&anchor.text().collect::<String>());
        if !looks_like_results(&title, href) {
            continue;
        }
        if policy.is_blocked(&url) {
            continue;
        }
        if !seen.insert(url.clone()) {
            continue;
        }
        let display_title = if title.is_empty() {
            href.to_string()
        } else {
            title
        };
        let mut candidate = Candidate::new(source, display_title, url);
        candidate.published_ts = page_ts;
        out.push(candidate);
    }
    Ok(out)
}

fn parse_page_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    Some(day.and_hms_opt(0, 0, 0)?.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use chrono::TimeZone;

    const PAGE: &str = r#"<html><body>
      <time datetime="2025-08-05T08:00:00Z">5 August 2025</time>
      <nav><a href="/about">About us</a></nav>
      <ul>
        <li><a href="/news/q2-2025-results">Q2 2025 Results</a></li>
        <li><a href="/news/q2-2025-results">Q2 2025 Results (duplicate)</a></li>
        <li><a href="https://mirror.example/acme/q2">Acme Q2 2025 earnings mirror</a></li>
        <li><a href="/static-files/deck.pdf">Download</a></li>
        <li><a href="mailto:ir@acme.example">Email IR about results</a></li>
      </ul>
    </body></html>"#;

    fn policy_blocking(domains: &[&str]) -> DomainPolicy {
        let mut cfg = Config::default();
        cfg.block_domains = domains.iter().map(|d| d.to_string()).collect();
        DomainPolicy::from_config(&cfg)
    }

    #[test]
    fn resolves_relative_urls_and_dedups_per_poll() {
        let policy = policy_blocking(&["mirror.example"]);
        let out = candidates_from_page(
            "Acme Gaming",
            "https://ir.acme.example/press-releases",
            PAGE,
            &policy,
        )
        .unwrap();

        let urls: Vec<&str> = out.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://ir.acme.example/news/q2-2025-results",
                "https://ir.acme.example/static-files/deck.pdf",
            ]
        );
        assert_eq!(out[0].title, "Q2 2025 Results");
    }

    #[test]
    fn page_time_element_stamps_candidates() {
        let policy = policy_blocking(&[]);
        let out = candidates_from_page(
            "Acme Gaming",
            "https://ir.acme.example/press-releases",
            PAGE,
            &policy,
        )
        .unwrap();
        let expected = Utc.with_ymd_and_hms(2025, 8, 5, 8, 0, 0).unwrap();
        assert!(out.iter().all(|c| c.published_ts == Some(expected)));
    }

    #[test]
    fn unblocked_offsite_anchors_survive() {
        let policy = policy_blocking(&[]);
        let out = candidates_from_page(
            "Acme Gaming",
            "https://ir.acme.example/press-releases",
            PAGE,
            &policy,
        )
        .unwrap();
        assert!(out.iter().any(|c| c.url.starts_with("https://mirror.example/")));
    }

    #[test]
    fn bad_page_url_is_an_error() {
        let policy = policy_blocking(&[]);
        assert!(candidates_from_page("x", "not a url", "<html></html>", &policy).is_err());
    }
}

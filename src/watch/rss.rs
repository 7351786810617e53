// src/watch/rss.rs
//! RSS 2.0 feed watcher: one feed per issuer, screened down to items that
//! read like results announcements inside the lookback window.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use tracing::debug;

use crate::payload::Candidate;
use crate::policy::DomainPolicy;
use crate::watch::{looks_like_results, parse_rfc2822_utc, Watcher};

/// Feeds occasionally dump whole archives; cap what one poll considers.
const MAX_FEED_ITEMS: usize = 50;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

pub struct RssWatcher {
    source: String,
    feed_url: String,
    client: reqwest::Client,
    policy: DomainPolicy,
    lookback_days: i64,
    label: String,
}

impl RssWatcher {
    pub fn new(
        source: String,
        feed_url: String,
        client: reqwest::Client,
        policy: DomainPolicy,
        lookback_days: i64,
    ) -> Self {
        let label = format!("rss:{source}");
        Self {
            source,
            feed_url,
            client,
            policy,
            lookback_days,
            label,
        }
    }
}

#[async_trait]
impl Watcher for RssWatcher {
    async fn poll(&self) -> Result<Vec<Candidate>> {
        let resp = self
            .client
            .get(&self.feed_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("fetching feed {}", self.feed_url))?;
        let body = resp.text().await.context("reading feed body")?;
        let cutoff = Utc::now() - Duration::days(self.lookback_days);
        candidates_from_feed(&self.source, &body, &self.policy, cutoff)
    }

    fn name(&self) -> &str {
        &self.label
    }
}

/// Feed XML to screened candidates. Kept free of HTTP so fixtures can drive
/// it directly.
pub fn candidates_from_feed(
    source: &str,
    xml: &str,
    policy: &DomainPolicy,
    cutoff: DateTime<Utc>,
) -> Result<Vec<Candidate>> {
    let rss: Rss = from_str(xml).context("parsing rss xml")?;
    let mut out = Vec::new();
    for item in rss.channel.items.into_iter().take(MAX_FEED_ITEMS) {
        let title = item.title.as_deref().unwrap_or("").trim().to_string();
        let link = item.link.as_deref().unwrap_or("").trim().to_string();
        if title.is_empty() || link.is_empty() {
            continue;
        }
        if !looks_like_results(&title, &link) {
            debug!(%title, "feed item does not read like results");
            continue;
        }
        if policy.is_blocked(&link) {
            debug!(%link, "feed item host is blocked");
            continue;
        }
        let published = item.pub_date.as_deref().and_then(parse_rfc2822_utc);
        // Items without a parseable date are kept; age is unknowable.
        if let Some(ts) = published {
            if ts < cutoff {
                continue;
            }
        }
        let mut candidate = Candidate::new(source, title, link);
        candidate.published_ts = published;
        out.push(candidate);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use chrono::TimeZone;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Acme Gaming press releases</title>
    <item>
      <title>Acme Gaming Reports Second Quarter 2025 Results</title>
      <link>https://ir.acme.example/news/q2-2025</link>
      <pubDate>Tue, 05 Aug 2025 11:30:00 GMT</pubDate>
    </item>
    <item>
      <title>Acme Gaming appoints new Chief People Officer</title>
      <link>https://ir.acme.example/news/cpo</link>
      <pubDate>Mon, 04 Aug 2025 09:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Acme Gaming Full Year 2023 Results</title>
      <link>https://ir.acme.example/news/fy-2023</link>
      <pubDate>Thu, 15 Feb 2024 07:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Acme Gaming Q1 2025 Results roundup</title>
      <link>https://spam.example/acme-q1</link>
      <pubDate>Tue, 05 Aug 2025 10:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Results coverage without a link</title>
    </item>
  </channel>
</rss>"#;

    fn policy_blocking(domains: &[&str]) -> DomainPolicy {
        let mut cfg = Config::default();
        cfg.block_domains = domains.iter().map(|d| d.to_string()).collect();
        DomainPolicy::from_config(&cfg)
    }

    fn cutoff_2025_07() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn keeps_recent_results_items_only() {
        let policy = policy_blocking(&["spam.example"]);
        let out = candidates_from_feed("Acme Gaming", FEED, &policy, cutoff_2025_07()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source, "Acme Gaming");
        assert_eq!(out[0].url, "https://ir.acme.example/news/q2-2025");
        let ts = out[0].published_ts.expect("pub date");
        assert_eq!(ts.to_rfc3339(), "2025-08-05T11:30:00+00:00");
    }

    #[test]
    fn blocked_hosts_are_dropped_at_the_source() {
        let open = policy_blocking(&[]);
        let out = candidates_from_feed("Acme Gaming", FEED, &open, cutoff_2025_07()).unwrap();
        assert!(out.iter().any(|c| c.url.contains("spam.example")));

        let closed = policy_blocking(&["spam.example"]);
        let out = candidates_from_feed("Acme Gaming", FEED, &closed, cutoff_2025_07()).unwrap();
        assert!(!out.iter().any(|c| c.url.contains("spam.example")));
    }

    #[test]
    fn malformed_xml_is_an_error() {
        let policy = policy_blocking(&[]);
        assert!(candidates_from_feed("x", "<rss><channel>", &policy, cutoff_2025_07()).is_err());
    }

    #[test]
    fn empty_channel_yields_no_candidates() {
        let policy = policy_blocking(&[]);
        let xml = r#"<rss version="2.0"><channel><title>t</title></channel></rss>"#;
        let out = candidates_from_feed("x", xml, &policy, cutoff_2025_07()).unwrap();
        assert!(out.is_empty());
    }
}

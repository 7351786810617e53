// src/watch/edgar.rs
//! SEC EDGAR filing-index watcher over the submissions API. Emits one
//! candidate per recent filing whose form type is on the configured list.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::payload::Candidate;
use crate::watch::Watcher;
use crate::watchlist::Issuer;

const SUBMISSIONS_BASE: &str = "https://data.sec.gov/submissions";
const ARCHIVES_BASE: &str = "https://www.sec.gov/Archives/edgar/data";

#[derive(Debug, Deserialize)]
pub struct Submissions {
    filings: Filings,
}

#[derive(Debug, Deserialize)]
struct Filings {
    recent: RecentFilings,
}

/// Parallel arrays, exactly as the API ships them.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecentFilings {
    #[serde(default)]
    form: Vec<String>,
    #[serde(default)]
    filing_date: Vec<String>,
    #[serde(default)]
    accession_number: Vec<String>,
    #[serde(default)]
    primary_document: Vec<String>,
}

pub struct EdgarWatcher {
    client: reqwest::Client,
    issuers: Vec<Issuer>,
    forms: Vec<String>,
    lookback_days: i64,
}

impl EdgarWatcher {
    /// The dedicated client identifies the operator: SEC's data APIs reject
    /// anonymous browser strings.
    pub fn new(cfg: &Config, issuers: Vec<Issuer>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&cfg.edgar_user_agent)
            .connect_timeout(cfg.connect_timeout)
            .timeout(cfg.read_timeout)
            .build()
            .context("building edgar http client")?;
        Ok(Self {
            client,
            issuers,
            forms: cfg.edgar_forms.clone(),
            lookback_days: cfg.lookback_days,
        })
    }

    async fn fetch_submissions(&self, url: &str) -> Result<Submissions> {
        let resp = self.client.get(url).send().await?.error_for_status()?;
        Ok(resp.json::<Submissions>().await?)
    }
}

#[async_trait]
impl Watcher for EdgarWatcher {
    async fn poll(&self) -> Result<Vec<Candidate>> {
        let cutoff = Utc::now() - Duration::days(self.lookback_days);
        let mut out = Vec::new();
        for issuer in &self.issuers {
            let Some(cik) = issuer.cik_padded() else {
                continue;
            };
            let url = format!("{SUBMISSIONS_BASE}/CIK{cik}.json");
            match self.fetch_submissions(&url).await {
                Ok(subs) => {
                    out.extend(recent_filings(issuer, &cik, &subs, &self.forms, cutoff));
                }
                Err(error) => {
                    warn!(issuer = %issuer.name, %error, "submissions query failed");
                }
            }
        }
        Ok(out)
    }

    fn name(&self) -> &str {
        "sec-edgar"
    }

    fn is_filing_source(&self) -> bool {
        true
    }
}

/// Zip the parallel submission arrays into screened candidates with archive
/// URLs for the primary document.
pub fn recent_filings(
    issuer: &Issuer,
    cik_padded: &str,
    subs: &Submissions,
    forms: &[String],
    cutoff: DateTime<Utc>,
) -> Vec<Candidate> {
    let cik_short = cik_padded.trim_start_matches('0');
    if cik_short.is_empty() {
        return Vec::new();
    }
    let recent = &subs.filings.recent;
    let rows = recent
        .form
        .iter()
        .zip(recent.filing_date.iter())
        .zip(recent.accession_number.iter())
        .zip(recent.primary_document.iter());

    let mut out = Vec::new();
    for (((form, date), accession), primary) in rows {
        if !forms.iter().any(|f| f == form) {
            continue;
        }
        let Some(filed) = parse_filing_date(date) else {
            debug!(%date, "unparseable filing date");
            continue;
        };
        if filed < cutoff {
            continue;
        }
        let folder = accession.replace('-', "");
        let url = format!("{ARCHIVES_BASE}/{cik_short}/{folder}/{primary}");
        let title = format!("{} {} filing ({})", issuer.name, form, date);
        out.push(Candidate::new("sec-edgar", title, url).with_published(filed));
    }
    out
}

fn parse_filing_date(date: &str) -> Option<DateTime<Utc>> {
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    Some(day.and_hms_opt(0, 0, 0)?.and_utc())
}

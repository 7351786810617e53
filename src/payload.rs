// src/payload.rs
//! Data shapes for one pipeline pass: the candidate coming in from a watcher
//! and the summary payload going out to the notifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A disclosure reference proposed by a discovery watcher. Created and
/// consumed within one batch; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub source: String,
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_ts: Option<DateTime<Utc>>,
}

impl Candidate {
    pub fn new(
        source: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            title: title.into(),
            url: url.into(),
            published_ts: None,
        }
    }

    pub fn with_published(mut self, ts: DateTime<Utc>) -> Self {
        self.published_ts = Some(ts);
        self
    }

    /// Stable identity used by the dedup store: hash of `source|url|title`.
    /// Title is part of the key, so an edited headline re-notifies.
    pub fn seen_id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.source.as_bytes());
        hasher.update(b"|");
        hasher.update(self.url.as_bytes());
        hasher.update(b"|");
        hasher.update(self.title.as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

/// One extracted KPI. An absent field means "not found in the document",
/// never a guessed or zero value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yoy: Option<String>,
}

impl Metric {
    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.yoy.is_none()
    }
}

/// The fixed set of tracked KPIs. All four slots are always present in the
/// payload so "not found" stays visible downstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    #[serde(default)]
    pub revenue: Metric,
    #[serde(default)]
    pub ebitda: Metric,
    #[serde(default)]
    pub net_income: Metric,
    #[serde(default)]
    pub eps: Metric,
}

impl MetricSet {
    /// Display order and labels used by the summary line and the email body.
    pub fn labeled(&self) -> [(&'static str, &Metric); 4] {
        [
            ("Revenue", &self.revenue),
            ("Adj. EBITDA", &self.ebitda),
            ("Net income", &self.net_income),
            ("EPS", &self.eps),
        ]
    }

    pub fn any_found(&self) -> bool {
        self.labeled().iter().any(|(_, m)| m.current.is_some())
    }
}

/// Everything the notifier needs for one disclosure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryPayload {
    pub headline: String,
    /// Always populated; falls back to the candidate URL when canonical
    /// resolution fails.
    pub final_url: String,
    pub short_summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_highlights: Vec<String>,
    #[serde(default)]
    pub metrics: MetricSet,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub geo_breakdown: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub product_breakdown: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub controversial_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_thoughts: Option<String>,
}

impl SummaryPayload {
    /// Degraded payload for documents we fetched but could not parse: the
    /// title hint and resolved URL still go out.
    pub fn minimal(headline: impl Into<String>, final_url: impl Into<String>) -> Self {
        let headline = headline.into();
        Self {
            short_summary: headline.clone(),
            headline,
            final_url: final_url.into(),
            ..Self::default()
        }
    }
}

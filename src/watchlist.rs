// src/watchlist.rs
//! Issuer watchlist loaded from a TOML file. Each issuer contributes feed
//! URLs, IR pages, and optionally a CIK for the filing-index watcher.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Watchlist {
    #[serde(default)]
    pub issuers: Vec<Issuer>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Issuer {
    pub name: String,
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub cik: Option<String>,
    #[serde(default)]
    pub rss_feeds: Vec<String>,
    #[serde(default)]
    pub ir_pages: Vec<String>,
}

impl Issuer {
    /// CIK zero-padded to the 10 digits the submissions API expects.
    /// Non-digit characters are ignored; an empty or absent CIK yields None.
    pub fn cik_padded(&self) -> Option<String> {
        let digits: String = self
            .cik
            .as_deref()?
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        if digits.is_empty() || digits.len() > 10 {
            return None;
        }
        Some(format!("{digits:0>10}"))
    }
}

impl Watchlist {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut list: Watchlist = toml::from_str(raw).context("parsing watchlist toml")?;
        list.issuers.retain(|i| {
            let keep = !i.name.trim().is_empty();
            if !keep {
                warn!("watchlist entry without a name dropped");
            }
            keep
        });
        Ok(list)
    }

    /// Load from disk. A missing file is an empty watchlist, not an error;
    /// a malformed file is.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "watchlist file not found, watching nothing");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading watchlist from {}", path.display()))?;
        Self::from_toml_str(&raw)
    }

    pub fn is_empty(&self) -> bool {
        self.issuers.is_empty()
    }
}

// src/policy.rs
//! Domain policy. Checks run against the canonical URL after redirect
//! resolution, never against the URL a watcher originally proposed.

use url::Url;

use crate::config::Config;

/// Lowercased registrable host, `www.` stripped.
pub fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// True when `host` equals a listed domain or sits under it.
pub fn host_in_list(host: &str, domains: &[String]) -> bool {
    domains.iter().any(|d| {
        let d = d.to_ascii_lowercase();
        host == d || host.ends_with(&format!(".{d}"))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    Allow,
    BlockedDomain,
    NotFirstParty,
}

#[derive(Debug, Clone)]
pub struct DomainPolicy {
    block_domains: Vec<String>,
    trusted_domains: Vec<String>,
    first_party_only: bool,
    filings_bypass_block_list: bool,
    filings_bypass_first_party: bool,
}

impl DomainPolicy {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            block_domains: cfg.block_domains.clone(),
            trusted_domains: cfg.trusted_domains.clone(),
            first_party_only: cfg.first_party_only,
            filings_bypass_block_list: cfg.filings_bypass_block_list,
            filings_bypass_first_party: cfg.filings_bypass_first_party,
        }
    }

    /// Watcher-side gate: drop references to blocked hosts at the source.
    pub fn is_blocked(&self, url: &str) -> bool {
        host_of(url)
            .map(|h| host_in_list(&h, &self.block_domains))
            .unwrap_or(false)
    }

    /// Highlight trust tier: recognized press-wire or regulatory host.
    pub fn is_trusted(&self, url: &str) -> bool {
        host_of(url)
            .map(|h| host_in_list(&h, &self.trusted_domains))
            .unwrap_or(false)
    }

    /// Full check on the canonical URL. `origin_url` is where the watcher
    /// found the reference; a canonical host under the same domain counts as
    /// first-party. `is_filing` marks filing-index candidates, which the two
    /// bypass knobs apply to independently.
    pub fn check(&self, final_url: &str, origin_url: &str, is_filing: bool) -> PolicyDecision {
        let Some(host) = host_of(final_url) else {
            return PolicyDecision::Allow;
        };

        let block_applies = !(is_filing && self.filings_bypass_block_list);
        if block_applies && host_in_list(&host, &self.block_domains) {
            return PolicyDecision::BlockedDomain;
        }

        let first_party_applies =
            self.first_party_only && !(is_filing && self.filings_bypass_first_party);
        if first_party_applies {
            let same_origin = host_of(origin_url)
                .map(|o| host == o || host.ends_with(&format!(".{o}")))
                .unwrap_or(false);
            if !same_origin && !host_in_list(&host, &self.trusted_domains) {
                return PolicyDecision::NotFirstParty;
            }
        }

        PolicyDecision::Allow
    }
}

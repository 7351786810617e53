// src/config.rs
//! One immutable `Config` built from the process environment at startup and
//! passed explicitly into every component constructor. Every knob has a safe
//! default; a missing `.env` is fine.

use std::path::PathBuf;
use std::time::Duration;

use crate::normalize::{DEFAULT_ARTICLE_SELECTORS, DEFAULT_JUNK_SELECTORS};

/// Browser-realistic identity for document fetches. Matches what the fetch
/// layer sends alongside Accept/Accept-Language.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Press-wire and regulatory hosts trusted for list-item highlight harvesting.
const DEFAULT_TRUSTED_DOMAINS: &[&str] = &[
    "businesswire.com",
    "globenewswire.com",
    "prnewswire.com",
    "accesswire.com",
    "newsfilecorp.com",
    "sec.gov",
];

const DEFAULT_EDGAR_FORMS: &[&str] = &["10-Q", "10-K", "8-K", "6-K", "20-F", "40-F"];

#[derive(Debug, Clone, PartialEq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub mail_from: String,
    pub mail_to: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    // Persistence
    pub state_file: PathBuf,
    pub watchlist_path: PathBuf,

    // HTTP
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub max_retries: u32,
    pub polite_delay: Duration,
    pub item_deadline: Duration,

    // Fetch fallbacks
    pub reader_fallback: bool,
    pub reader_base: String,
    pub reader_api_key: Option<String>,
    pub render_proxy_url: Option<String>,
    pub render_proxy_key: Option<String>,

    // Domain policy
    pub block_domains: Vec<String>,
    pub trusted_domains: Vec<String>,
    pub first_party_only: bool,
    /// Filing-index candidates ignore the block list when set.
    pub filings_bypass_block_list: bool,
    /// Filing-index candidates ignore the first-party-only gate when set.
    pub filings_bypass_first_party: bool,

    // Normalization / highlights
    pub junk_selectors: Vec<String>,
    pub article_selectors: Vec<String>,
    pub max_highlights: usize,
    pub highlight_min_len: usize,
    pub highlight_max_len: usize,

    // Watchers
    pub lookback_days: i64,
    pub edgar_forms: Vec<String>,
    pub edgar_user_agent: String,

    // Notification
    pub smtp: Option<SmtpConfig>,
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from("state/seen.json"),
            watchlist_path: PathBuf::from("config/watchlist.toml"),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout: Duration::from_secs(12),
            read_timeout: Duration::from_secs(30),
            max_retries: 4,
            polite_delay: Duration::from_millis(200),
            item_deadline: Duration::from_secs(90),
            reader_fallback: true,
            reader_base: "https://r.jina.ai/".to_string(),
            reader_api_key: None,
            render_proxy_url: None,
            render_proxy_key: None,
            block_domains: Vec::new(),
            trusted_domains: to_owned_list(DEFAULT_TRUSTED_DOMAINS),
            first_party_only: false,
            filings_bypass_block_list: false,
            filings_bypass_first_party: true,
            junk_selectors: to_owned_list(DEFAULT_JUNK_SELECTORS),
            article_selectors: to_owned_list(DEFAULT_ARTICLE_SELECTORS),
            max_highlights: 6,
            highlight_min_len: 30,
            highlight_max_len: 220,
            lookback_days: 7,
            edgar_forms: to_owned_list(DEFAULT_EDGAR_FORMS),
            edgar_user_agent: "disclosure-watch/0.1 (ir-monitoring contact unset)".to_string(),
            smtp: None,
            dry_run: false,
        }
    }
}

impl Config {
    /// Build from environment variables, falling back to `Default` per knob.
    /// The caller is expected to have loaded `.env` (dotenvy) already.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(v) = env_string("STATE_FILE") {
            cfg.state_file = PathBuf::from(v);
        }
        if let Some(v) = env_string("WATCHLIST_PATH") {
            cfg.watchlist_path = PathBuf::from(v);
        }

        if let Some(v) = env_string("HTTP_USER_AGENT") {
            cfg.user_agent = v;
        }
        if let Some(v) = env_parse::<u64>("HTTP_CONNECT_TIMEOUT_SECS") {
            cfg.connect_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_parse::<u64>("HTTP_READ_TIMEOUT_SECS") {
            cfg.read_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_parse::<u32>("HTTP_MAX_RETRIES") {
            cfg.max_retries = v;
        }
        if let Some(v) = env_parse::<u64>("POLITE_DELAY_MS") {
            cfg.polite_delay = Duration::from_millis(v);
        }
        if let Some(v) = env_parse::<u64>("ITEM_DEADLINE_SECS") {
            cfg.item_deadline = Duration::from_secs(v.max(1));
        }

        if let Some(v) = env_flag("READER_FALLBACK") {
            cfg.reader_fallback = v;
        }
        if let Some(v) = env_string("READER_BASE_URL") {
            cfg.reader_base = v;
        }
        cfg.reader_api_key = env_string("READER_API_KEY");
        cfg.render_proxy_url = env_string("RENDER_PROXY_URL");
        cfg.render_proxy_key = env_string("RENDER_PROXY_KEY");

        if let Some(v) = env_list("BLOCK_DOMAINS") {
            cfg.block_domains = v;
        }
        if let Some(v) = env_list("TRUSTED_DOMAINS") {
            cfg.trusted_domains = v;
        }
        if let Some(v) = env_flag("FIRST_PARTY_ONLY") {
            cfg.first_party_only = v;
        }
        if let Some(v) = env_flag("FILINGS_BYPASS_BLOCK_LIST") {
            cfg.filings_bypass_block_list = v;
        }
        if let Some(v) = env_flag("FILINGS_BYPASS_FIRST_PARTY") {
            cfg.filings_bypass_first_party = v;
        }

        if let Some(v) = env_list("JUNK_SELECTORS") {
            cfg.junk_selectors = v;
        }
        if let Some(v) = env_list("ARTICLE_SELECTORS") {
            cfg.article_selectors = v;
        }
        if let Some(v) = env_parse::<usize>("MAX_HIGHLIGHTS") {
            cfg.max_highlights = v;
        }
        if let Some(v) = env_parse::<usize>("HIGHLIGHT_MIN_LEN") {
            cfg.highlight_min_len = v;
        }
        if let Some(v) = env_parse::<usize>("HIGHLIGHT_MAX_LEN") {
            cfg.highlight_max_len = v;
        }

        if let Some(v) = env_parse::<i64>("LOOKBACK_DAYS") {
            cfg.lookback_days = v.max(0);
        }
        if let Some(v) = env_list("EDGAR_FORMS") {
            cfg.edgar_forms = v;
        }
        if let Some(v) = env_string("EDGAR_USER_AGENT") {
            cfg.edgar_user_agent = v;
        }

        cfg.smtp = smtp_from_env();
        if let Some(v) = env_flag("DRY_RUN") {
            cfg.dry_run = v;
        }

        cfg
    }
}

fn smtp_from_env() -> Option<SmtpConfig> {
    let host = env_string("SMTP_HOST")?;
    let mail_from = env_string("MAIL_FROM")?;
    let mail_to = env_list("MAIL_TO").filter(|v| !v.is_empty())?;
    Some(SmtpConfig {
        host,
        port: env_parse::<u16>("SMTP_PORT").unwrap_or(587),
        username: env_string("SMTP_USER").unwrap_or_default(),
        password: env_string("SMTP_PASS").unwrap_or_default(),
        mail_from,
        mail_to,
    })
}

fn to_owned_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/* ---------- env helpers ---------- */

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key)?.parse::<T>().ok()
}

fn env_flag(key: &str) -> Option<bool> {
    let v = env_string(key)?.to_ascii_lowercase();
    Some(matches!(v.as_str(), "1" | "true" | "yes" | "on"))
}

/// Comma-separated list: trimmed, empties dropped, deduped preserving
/// first-seen order.
fn env_list(key: &str) -> Option<Vec<String>> {
    let raw = env_string(key)?;
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for part in raw.split(',') {
        let p = part.trim();
        if !p.is_empty() && seen.insert(p.to_ascii_lowercase()) {
            out.push(p.to_string());
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clear(keys: &[&str]) {
        for k in keys {
            env::remove_var(k);
        }
    }

    #[test]
    #[serial]
    fn defaults_apply_without_env() {
        clear(&["HTTP_MAX_RETRIES", "MAX_HIGHLIGHTS", "FIRST_PARTY_ONLY", "BLOCK_DOMAINS"]);
        let cfg = Config::from_env();
        assert_eq!(cfg.max_retries, 4);
        assert_eq!(cfg.max_highlights, 6);
        assert!(!cfg.first_party_only);
        assert!(cfg.block_domains.is_empty());
        assert!(cfg.trusted_domains.iter().any(|d| d == "businesswire.com"));
    }

    #[test]
    #[serial]
    fn list_vars_are_trimmed_and_deduped_in_order() {
        env::set_var("BLOCK_DOMAINS", " spam.example ,, news.example ,spam.example ");
        let cfg = Config::from_env();
        assert_eq!(cfg.block_domains, vec!["spam.example", "news.example"]);
        env::remove_var("BLOCK_DOMAINS");
    }

    #[test]
    #[serial]
    fn flags_accept_common_truthy_spellings() {
        for v in ["1", "true", "YES", "on"] {
            env::set_var("DRY_RUN", v);
            assert!(Config::from_env().dry_run, "value {v:?} should enable");
        }
        env::set_var("DRY_RUN", "0");
        assert!(!Config::from_env().dry_run);
        env::remove_var("DRY_RUN");
    }

    #[test]
    #[serial]
    fn smtp_requires_host_from_and_recipients() {
        clear(&["SMTP_HOST", "MAIL_FROM", "MAIL_TO", "SMTP_PORT"]);
        assert!(Config::from_env().smtp.is_none());

        env::set_var("SMTP_HOST", "smtp.example.com");
        env::set_var("MAIL_FROM", "watch@example.com");
        assert!(Config::from_env().smtp.is_none());

        env::set_var("MAIL_TO", "desk@example.com, ir@example.com");
        let smtp = Config::from_env().smtp.expect("smtp config");
        assert_eq!(smtp.port, 587);
        assert_eq!(smtp.mail_to.len(), 2);
        clear(&["SMTP_HOST", "MAIL_FROM", "MAIL_TO"]);
    }
}

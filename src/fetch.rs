// src/fetch.rs
//! Document fetching with bounded retry/backoff and a fallback chain for
//! hosts that answer with challenge pages instead of content.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;

const BACKOFF_BASE: Duration = Duration::from_millis(500);
const BACKOFF_CAP: Duration = Duration::from_secs(8);
const RETRY_AFTER_CAP: Duration = Duration::from_secs(30);
const BOTWALL_MIN_LEN: usize = 800;

/// Response header some render proxies use to announce the post-redirect URL.
const PROXY_FINAL_URL_HEADER: &str = "x-final-url";

static BOTWALL_SIGNS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)captcha|verify you are human|access denied|forbidden|cloudflare|akamai|perimeterx|datadome|incapsula|attention required",
    )
    .unwrap()
});

/// Challenge-page heuristic: empty body, a short body carrying a challenge
/// phrase, or a challenge phrase anywhere (full-size interstitials routinely
/// exceed the length threshold).
pub fn looks_like_botwall(body: &str) -> bool {
    if body.is_empty() {
        return true;
    }
    if body.len() < BOTWALL_MIN_LEN && BOTWALL_SIGNS.is_match(body) {
        return true;
    }
    BOTWALL_SIGNS.is_match(body)
}

/// PDF sniffing used both here (bytes vs text) and by the normalizer.
pub fn is_pdf_like(content_type: &str, url: &str) -> bool {
    if content_type.to_ascii_lowercase().contains("application/pdf") {
        return true;
    }
    match Url::parse(url) {
        Ok(u) => u.path().to_ascii_lowercase().ends_with(".pdf"),
        Err(_) => url.to_ascii_lowercase().ends_with(".pdf"),
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} answered {status} after {attempts} attempt(s)")]
    Status {
        url: String,
        status: StatusCode,
        attempts: u32,
    },
    #[error("bad proxy url: {0}")]
    Proxy(#[from] url::ParseError),
    #[error("direct fetch and all fallbacks exhausted for {url}")]
    Exhausted { url: String },
}

#[derive(Debug, Clone)]
pub enum DocBody {
    Text(String),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct FetchedDoc {
    pub final_url: String,
    pub content_type: String,
    pub body: DocBody,
    /// Post-render resolved URL announced by the proxy, when that path served us.
    pub proxy_final_url: Option<String>,
    /// True when the reader fallback produced the body (plain text, no markup).
    pub via_reader: bool,
}

impl FetchedDoc {
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            DocBody::Text(t) => Some(t),
            DocBody::Bytes(_) => None,
        }
    }
}

pub struct Fetcher {
    client: Client,
    max_retries: u32,
    polite_delay: Duration,
    reader_fallback: bool,
    reader_base: String,
    reader_api_key: Option<String>,
    render_proxy_url: Option<String>,
    render_proxy_key: Option<String>,
}

impl Fetcher {
    pub fn new(cfg: &Config) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,application/pdf;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        let client = Client::builder()
            .user_agent(&cfg.user_agent)
            .default_headers(headers)
            .connect_timeout(cfg.connect_timeout)
            .timeout(cfg.read_timeout)
            .build()?;
        Ok(Self {
            client,
            max_retries: cfg.max_retries.max(1),
            polite_delay: cfg.polite_delay,
            reader_fallback: cfg.reader_fallback,
            reader_base: cfg.reader_base.clone(),
            reader_api_key: cfg.reader_api_key.clone(),
            render_proxy_url: cfg.render_proxy_url.clone(),
            render_proxy_key: cfg.render_proxy_key.clone(),
        })
    }

    /// Resolve a URL to content. Direct fetch first; when that fails or
    /// serves a challenge page, the reader service, then the render proxy.
    /// Exhaustion is an error the caller treats as "skip this candidate".
    pub async fn fetch(&self, url: &str) -> Result<FetchedDoc, FetchError> {
        match self.fetch_direct(url).await {
            Ok(doc) => {
                let walled = matches!(doc.text(), Some(t) if looks_like_botwall(t));
                if !walled {
                    return Ok(doc);
                }
                debug!(url, "challenge page served, trying fallbacks");
            }
            Err(e) => {
                warn!(url, error = %e, "direct fetch failed, trying fallbacks");
            }
        }
        self.fetch_fallback(url).await
    }

    async fn fetch_direct(&self, url: &str) -> Result<FetchedDoc, FetchError> {
        let resp = self.request_with_retries(url).await?;
        let final_url = resp.url().to_string();
        let content_type = header_str(resp.headers(), &CONTENT_TYPE);
        if is_pdf_like(&content_type, &final_url) {
            let bytes = resp.bytes().await?;
            return Ok(FetchedDoc {
                final_url,
                content_type,
                body: DocBody::Bytes(bytes.to_vec()),
                proxy_final_url: None,
                via_reader: false,
            });
        }
        let text = resp.text().await?;
        Ok(FetchedDoc {
            final_url,
            content_type,
            body: DocBody::Text(text),
            proxy_final_url: None,
            via_reader: false,
        })
    }

    /// One GET with bounded retries on 403/429/5xx. `max_retries` counts
    /// total attempts. Backoff doubles from 500 ms up to 8 s; a parseable
    /// Retry-After header takes precedence, capped at 30 s. The polite delay
    /// runs after every successful request.
    async fn request_with_retries(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let mut backoff = BACKOFF_BASE;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let resp = self.client.get(url).send().await?;
            let status = resp.status();
            if status.is_success() {
                tokio::time::sleep(self.polite_delay).await;
                return Ok(resp);
            }
            let retryable = status == StatusCode::FORBIDDEN
                || status == StatusCode::TOO_MANY_REQUESTS
                || status.is_server_error();
            if !retryable || attempt >= self.max_retries {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status,
                    attempts: attempt,
                });
            }
            let wait = retry_after_hint(resp.headers()).unwrap_or(backoff);
            debug!(url, status = %status, wait_ms = wait.as_millis() as u64, "backing off");
            tokio::time::sleep(wait).await;
            backoff = (backoff * 2).min(BACKOFF_CAP);
        }
    }

    async fn fetch_fallback(&self, url: &str) -> Result<FetchedDoc, FetchError> {
        if self.reader_fallback {
            match self.fetch_via_reader(url).await {
                Ok(doc) => {
                    if !matches!(doc.text(), Some(t) if looks_like_botwall(t)) {
                        return Ok(doc);
                    }
                    debug!(url, "reader fallback also served a challenge page");
                }
                Err(e) => debug!(url, error = %e, "reader fallback failed"),
            }
        }
        if self.render_proxy_url.is_some() {
            match self.fetch_via_proxy(url).await {
                Ok(doc) => {
                    if !matches!(doc.text(), Some(t) if looks_like_botwall(t)) {
                        return Ok(doc);
                    }
                    debug!(url, "render proxy also served a challenge page");
                }
                Err(e) => debug!(url, error = %e, "render proxy failed"),
            }
        }
        Err(FetchError::Exhausted {
            url: url.to_string(),
        })
    }

    /// Reader service: prefix-style URL, clean text out. The original URL
    /// stays `final_url` since the reader hides redirect resolution.
    async fn fetch_via_reader(&self, url: &str) -> Result<FetchedDoc, FetchError> {
        let reader_url = format!("{}{}", self.reader_base, url);
        let mut req = self.client.get(&reader_url);
        if let Some(key) = &self.reader_api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: reader_url,
                status,
                attempts: 1,
            });
        }
        let text = resp.text().await?;
        Ok(FetchedDoc {
            final_url: url.to_string(),
            content_type: "text/plain".to_string(),
            body: DocBody::Text(text),
            proxy_final_url: None,
            via_reader: true,
        })
    }

    async fn fetch_via_proxy(&self, url: &str) -> Result<FetchedDoc, FetchError> {
        let base = match &self.render_proxy_url {
            Some(b) => b,
            None => {
                return Err(FetchError::Exhausted {
                    url: url.to_string(),
                })
            }
        };
        let mut params: Vec<(&str, &str)> = Vec::new();
        if let Some(key) = &self.render_proxy_key {
            params.push(("api_key", key));
        }
        params.push(("url", url));
        let proxy_url = Url::parse_with_params(base, &params)?;

        let resp = self.client.get(proxy_url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: base.clone(),
                status,
                attempts: 1,
            });
        }
        let proxy_final_url = resp
            .headers()
            .get(PROXY_FINAL_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let mut content_type = header_str(resp.headers(), &CONTENT_TYPE);
        if content_type.is_empty() {
            content_type = "text/html".to_string();
        }
        let text = resp.text().await?;
        Ok(FetchedDoc {
            final_url: url.to_string(),
            content_type,
            body: DocBody::Text(text),
            proxy_final_url,
            via_reader: false,
        })
    }
}

fn header_str(headers: &HeaderMap, name: &reqwest::header::HeaderName) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn retry_after_hint(headers: &HeaderMap) -> Option<Duration> {
    let secs: f64 = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    if secs.is_finite() && secs >= 0.0 {
        Some(Duration::from_secs_f64(secs).min(RETRY_AFTER_CAP))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_is_a_wall() {
        assert!(looks_like_botwall(""));
    }

    #[test]
    fn challenge_phrases_trip_regardless_of_length() {
        assert!(looks_like_botwall("Access Denied"));
        assert!(looks_like_botwall("Please complete the CAPTCHA to continue"));
        let long_interstitial = format!(
            "{} Attention Required! | Cloudflare {}",
            "x".repeat(600),
            "y".repeat(600)
        );
        assert!(looks_like_botwall(&long_interstitial));
    }

    #[test]
    fn ordinary_content_is_not_a_wall() {
        let body = "Acme Gaming reports record quarterly revenue of $120.5 million. ".repeat(20);
        assert!(!looks_like_botwall(&body));
        assert!(!looks_like_botwall("Short press note without trigger words."));
    }

    #[test]
    fn pdf_sniffing_checks_type_then_path() {
        assert!(is_pdf_like("application/pdf", "https://x.example/a"));
        assert!(is_pdf_like("application/pdf; charset=binary", "https://x.example/a"));
        assert!(is_pdf_like("", "https://x.example/reports/Q2.PDF"));
        assert!(is_pdf_like("text/html", "https://x.example/q2.pdf?dl=1"));
        assert!(!is_pdf_like("text/html", "https://x.example/q2-pdf-notes"));
    }

    #[test]
    fn retry_after_parses_and_caps() {
        let mut h = HeaderMap::new();
        h.insert(RETRY_AFTER, HeaderValue::from_static("3"));
        assert_eq!(retry_after_hint(&h), Some(Duration::from_secs(3)));

        h.insert(RETRY_AFTER, HeaderValue::from_static("900"));
        assert_eq!(retry_after_hint(&h), Some(RETRY_AFTER_CAP));

        h.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2026 07:28:00 GMT"));
        assert_eq!(retry_after_hint(&h), None);

        h.insert(RETRY_AFTER, HeaderValue::from_static("-5"));
        assert_eq!(retry_after_hint(&h), None);
    }
}

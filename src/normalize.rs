// src/normalize.rs
//! Turns fetched content into what the analyzers consume: normalized text
//! with line structure, the document title, list-item and paragraph texts
//! from the article root, and the canonical URL.

use std::collections::HashSet;
use std::process::Command;

use once_cell::sync::Lazy;
use regex::Regex;
use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::config::Config;
use crate::fetch::{DocBody, FetchedDoc};

/// Boilerplate nodes stripped before any text is read.
pub const DEFAULT_JUNK_SELECTORS: &[&str] = &[
    "nav",
    "footer",
    "header",
    "aside",
    "script",
    "style",
    "form",
    ".ad",
    ".advert",
    "[class*='ad-']",
    ".promo",
    ".newsletter",
    ".subscribe",
    ".related",
    ".social",
    ".share",
    ".breadcrumbs",
    ".tags",
    ".paywall",
    ".cookie",
    ".disclaimer",
    "#comments",
];

/// Tried in order for the article root; the full body is the fallback.
pub const DEFAULT_ARTICLE_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role='main']",
    "#main-content",
    "#content",
    ".article-body",
    ".post-content",
    ".press-release",
    ".content",
];

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "tr", "table", "thead",
    "tbody", "section", "article", "blockquote", "br",
];

static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static TITLE_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static BODY_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());
static CANONICAL_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("link[rel='canonical']").unwrap());
static OG_URL_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("meta[property='og:url']").unwrap());
static LI_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("li").unwrap());
static P_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());

pub(crate) fn squash_spaces(s: &str) -> String {
    WS_RE.replace_all(s.trim(), " ").to_string()
}

/// Normalized view of one fetched document.
#[derive(Debug, Clone, Default)]
pub struct NormalizedDoc {
    /// Canonical URL (see `resolve_canonical`); never empty.
    pub final_url: String,
    pub title: Option<String>,
    /// Whitespace-normalized text, one line per block element.
    pub text: String,
    /// List-item texts within the article root.
    pub list_items: Vec<String>,
    /// Paragraph texts within the article root.
    pub paragraphs: Vec<String>,
}

pub struct Normalizer {
    junk: Vec<Selector>,
    article: Vec<Selector>,
}

impl Normalizer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            junk: compile_selectors(&cfg.junk_selectors),
            article: compile_selectors(&cfg.article_selectors),
        }
    }

    pub fn normalize(&self, doc: &FetchedDoc) -> NormalizedDoc {
        match &doc.body {
            DocBody::Bytes(data) => self.normalize_pdf(doc, data),
            DocBody::Text(raw) => {
                if !doc.via_reader && looks_like_html(raw, &doc.content_type) {
                    self.normalize_html(doc, raw)
                } else {
                    self.normalize_plain(doc, raw)
                }
            }
        }
    }

    fn normalize_pdf(&self, doc: &FetchedDoc, data: &[u8]) -> NormalizedDoc {
        let raw = match pdf_to_text(data) {
            Ok(t) => t,
            Err(e) => {
                warn!(url = %doc.final_url, "pdf text extraction failed: {e}");
                String::new()
            }
        };
        let text = tidy_lines(&raw);
        let paragraphs = nonempty_lines(&text);
        NormalizedDoc {
            final_url: doc.final_url.clone(),
            title: None,
            text,
            list_items: Vec::new(),
            paragraphs,
        }
    }

    /// Reader-service output and other plain text. Markdown-style bullet
    /// lines double as list items so trusted-tier highlights still work.
    fn normalize_plain(&self, doc: &FetchedDoc, raw: &str) -> NormalizedDoc {
        let decoded = html_escape::decode_html_entities(raw);
        let text = tidy_lines(&decoded);
        let lines = nonempty_lines(&text);
        let list_items = lines
            .iter()
            .filter_map(|l| bullet_text(l))
            .map(str::to_string)
            .collect();
        NormalizedDoc {
            final_url: doc.final_url.clone(),
            title: None,
            text,
            list_items,
            paragraphs: lines,
        }
    }

    fn normalize_html(&self, doc: &FetchedDoc, raw: &str) -> NormalizedDoc {
        let html = Html::parse_document(raw);

        let title = html
            .select(&TITLE_SEL)
            .next()
            .map(|el| squash_spaces(&el.text().collect::<String>()))
            .filter(|t| !t.is_empty());

        let final_url = resolve_canonical(&html, doc);
        let junk = self.collect_junk_ids(&html);
        let root = self.article_root(&html);

        let mut raw_text = String::new();
        collect_text(root, &junk, &mut raw_text);
        let text = tidy_lines(&raw_text);

        NormalizedDoc {
            final_url,
            title,
            list_items: element_texts(root, &LI_SEL, &junk),
            paragraphs: element_texts(root, &P_SEL, &junk),
            text,
        }
    }

    fn collect_junk_ids(&self, html: &Html) -> HashSet<NodeId> {
        let mut ids = HashSet::new();
        for sel in &self.junk {
            for el in html.select(sel) {
                ids.insert(el.id());
            }
        }
        ids
    }

    fn article_root<'a>(&self, html: &'a Html) -> ElementRef<'a> {
        for sel in &self.article {
            if let Some(el) = html.select(sel).next() {
                return el;
            }
        }
        html.select(&BODY_SEL)
            .next()
            .unwrap_or_else(|| html.root_element())
    }
}

fn compile_selectors(patterns: &[String]) -> Vec<Selector> {
    patterns
        .iter()
        .filter_map(|p| match Selector::parse(p) {
            Ok(sel) => Some(sel),
            Err(e) => {
                warn!(selector = %p, "skipping unparseable selector: {e}");
                None
            }
        })
        .collect()
}

/// Depth-first text harvest that skips junk subtrees and marks block
/// boundaries with newlines so downstream line heuristics have structure.
fn collect_text(el: ElementRef<'_>, junk: &HashSet<NodeId>, out: &mut String) {
    if junk.contains(&el.id()) {
        return;
    }
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        } else if let Some(child_el) = ElementRef::wrap(child) {
            collect_text(child_el, junk, out);
            if BLOCK_TAGS.contains(&child_el.value().name()) {
                out.push('\n');
            }
        }
    }
}

fn element_texts(root: ElementRef<'_>, sel: &Selector, junk: &HashSet<NodeId>) -> Vec<String> {
    let mut out = Vec::new();
    for el in root.select(sel) {
        if under_junk(el, junk) {
            continue;
        }
        let mut raw = String::new();
        collect_text(el, junk, &mut raw);
        let text = squash_spaces(&raw);
        if !text.is_empty() {
            out.push(text);
        }
    }
    out
}

fn under_junk(el: ElementRef<'_>, junk: &HashSet<NodeId>) -> bool {
    el.ancestors().any(|a| junk.contains(&a.id()))
}

/// Canonical URL chain: `<link rel=canonical>`, then `og:url`, then the
/// render proxy's header hint, then the response's own resolved URL.
fn resolve_canonical(html: &Html, doc: &FetchedDoc) -> String {
    if let Some(href) = html
        .select(&CANONICAL_SEL)
        .next()
        .and_then(|el| el.value().attr("href"))
    {
        if let Some(abs) = absolutize(href, &doc.final_url) {
            return abs;
        }
    }
    if let Some(content) = html
        .select(&OG_URL_SEL)
        .next()
        .and_then(|el| el.value().attr("content"))
    {
        if let Some(abs) = absolutize(content, &doc.final_url) {
            return abs;
        }
    }
    if let Some(hint) = &doc.proxy_final_url {
        if let Some(abs) = absolutize(hint, &doc.final_url) {
            return abs;
        }
    }
    doc.final_url.clone()
}

fn absolutize(href: &str, base: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    if let Ok(u) = Url::parse(href) {
        return matches!(u.scheme(), "http" | "https").then(|| u.to_string());
    }
    let joined = Url::parse(base).ok()?.join(href).ok()?;
    matches!(joined.scheme(), "http" | "https").then(|| joined.to_string())
}

fn looks_like_html(text: &str, content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    if ct.contains("html") {
        return true;
    }
    if ct.starts_with("text/plain") {
        return false;
    }
    text.trim_start().starts_with('<')
}

fn tidy_lines(raw: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for line in raw.lines() {
        let squashed = squash_spaces(line);
        if !squashed.is_empty() {
            lines.push(squashed);
        }
    }
    lines.join("\n")
}

fn nonempty_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

fn bullet_text(line: &str) -> Option<&str> {
    let rest = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("• "))?;
    let rest = rest.trim();
    (!rest.is_empty()).then_some(rest)
}

/* ---------- PDF branch ---------- */

#[derive(Debug, Error)]
pub enum PdfTextError {
    #[error("pdftotext is not installed")]
    ToolNotFound,
    #[error("pdftotext failed: {0}")]
    Failed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Linear text from a PDF via the system `pdftotext`. A missing tool is a
/// typed error so callers can degrade instead of aborting the item.
fn pdf_to_text(data: &[u8]) -> Result<String, PdfTextError> {
    let dir = tempfile::tempdir()?;
    let pdf_path = dir.path().join("document.pdf");
    std::fs::write(&pdf_path, data)?;

    let result = Command::new("pdftotext")
        .arg("-layout")
        .arg("-q")
        .arg(&pdf_path)
        .arg("-")
        .output();
    match result {
        Ok(output) if output.status.success() => {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        }
        Ok(output) => Err(PdfTextError::Failed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        )),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(PdfTextError::ToolNotFound),
        Err(e) => Err(PdfTextError::Io(e)),
    }
}

// src/notify/mod.rs
//! Rendering and delivery of disclosure notifications. Rendering is pure;
//! delivery is SMTP or, in dry-run mode, a log line.

pub mod email;

use anyhow::Result;
use tracing::{debug, info};

use crate::config::Config;
use crate::payload::SummaryPayload;

pub fn render_subject(payload: &SummaryPayload) -> String {
    let headline = non_empty(&payload.headline).unwrap_or("Update");
    match payload.period.as_deref() {
        Some(period) => format!("[Earnings Watch] {headline} ({period})"),
        None => format!("[Earnings Watch] {headline}"),
    }
}

/// Plain-text body. Every tracked metric is listed, found or not, so an
/// empty extraction is visible rather than silent.
pub fn render_body(payload: &SummaryPayload) -> String {
    let mut lines: Vec<String> = Vec::new();

    if let Some(headline) = non_empty(&payload.headline) {
        lines.push(format!("Headline: {headline}"));
    }
    if let Some(url) = non_empty(&payload.final_url) {
        lines.push(format!("URL: {url}"));
    }
    if let Some(period) = payload.period.as_deref() {
        lines.push(format!("Period: {period}"));
    }

    if let Some(short) = non_empty(&payload.short_summary) {
        lines.push(String::new());
        lines.push(format!("Summary: {short}"));
    }

    push_section(&mut lines, "Key Highlights:", &payload.key_highlights);

    lines.push(String::new());
    lines.push("Metrics:".to_string());
    for (label, metric) in payload.metrics.labeled() {
        let value = match (&metric.current, &metric.yoy) {
            (Some(current), Some(yoy)) => format!("{current} ({yoy})"),
            (Some(current), None) => current.clone(),
            (None, Some(yoy)) => format!("({yoy})"),
            (None, None) => "not found".to_string(),
        };
        lines.push(format!(" - {label}: {value}"));
    }

    push_section(&mut lines, "Geography:", &payload.geo_breakdown);
    push_section(&mut lines, "Products:", &payload.product_breakdown);
    push_section(&mut lines, "Watch items:", &payload.controversial_points);

    if let Some(notes) = payload.final_thoughts.as_deref() {
        lines.push(String::new());
        lines.push(format!("Notes: {notes}"));
    }

    lines.join("\n") + "\n"
}

fn push_section(lines: &mut Vec<String>, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    lines.push(String::new());
    lines.push(heading.to_string());
    lines.extend(items.iter().map(|item| format!(" - {item}")));
}

fn non_empty(s: &str) -> Option<&str> {
    let t = s.trim();
    (!t.is_empty()).then_some(t)
}

/// Delivery front end. Without complete SMTP settings, or in dry-run mode,
/// rendered messages are logged and still count as delivered.
pub struct Notifier {
    mailer: Option<email::Mailer>,
}

impl Notifier {
    pub fn new(cfg: &Config) -> Result<Self> {
        let mailer = match (&cfg.smtp, cfg.dry_run) {
            (Some(smtp), false) => Some(email::Mailer::new(smtp)?),
            (Some(_), true) => {
                info!("dry run enabled, notifications will be logged only");
                None
            }
            (None, _) => {
                info!("smtp not configured, notifications will be logged only");
                None
            }
        };
        Ok(Self { mailer })
    }

    pub async fn deliver(&self, payload: &SummaryPayload) -> Result<()> {
        let subject = render_subject(payload);
        let body = render_body(payload);
        match &self.mailer {
            Some(mailer) => {
                mailer.send(&subject, &body).await?;
                info!(%subject, "notification sent");
            }
            None => {
                info!(%subject, "notification rendered (not sent)");
                debug!(%body, "rendered notification body");
            }
        }
        Ok(())
    }
}

// tests/policy_gate.rs
// Domain policy decisions over a normalized fixture document. The gate judges
// the canonical URL, not the link a watcher proposed.

use disclosure_watch::config::Config;
use disclosure_watch::extract::limits_from_config;
use disclosure_watch::fetch::{DocBody, FetchedDoc};
use disclosure_watch::normalize::Normalizer;
use disclosure_watch::payload::Candidate;
use disclosure_watch::pipeline::{gate_and_summarize, SkipReason};
use disclosure_watch::policy::DomainPolicy;
use std::fs;

const CANONICAL: &str =
    "https://www.businesswire.com/news/home/20250805120345/en/Acme-Gaming-Reports-Second-Quarter-2025-Results";

fn fetched_release() -> FetchedDoc {
    let html = fs::read_to_string("tests/fixtures/acme_q2_release.html").expect("fixture");
    FetchedDoc {
        final_url: "https://www.businesswire.com/news/home/20250805120345/en/".to_string(),
        content_type: "text/html; charset=utf-8".to_string(),
        body: DocBody::Text(html),
        proxy_final_url: None,
        via_reader: false,
    }
}

fn candidate() -> Candidate {
    Candidate::new(
        "Acme Gaming",
        "Acme Gaming Reports Second Quarter 2025 Results",
        "https://ir.acme.example/news/q2-2025",
    )
}

fn run_gate(cfg: &Config, is_filing: bool) -> Result<String, SkipReason> {
    let doc = Normalizer::new(cfg).normalize(&fetched_release());
    let policy = DomainPolicy::from_config(cfg);
    gate_and_summarize(&policy, &candidate(), &doc, is_filing, &limits_from_config(cfg))
        .map(|payload| payload.final_url)
}

#[test]
fn default_policy_allows_and_reports_the_canonical_url() {
    let cfg = Config::default();
    assert_eq!(run_gate(&cfg, false).as_deref(), Ok(CANONICAL));
}

#[test]
fn blocked_canonical_host_is_skipped_regardless_of_content() {
    let cfg = Config {
        block_domains: vec!["businesswire.com".to_string()],
        ..Config::default()
    };
    assert_eq!(run_gate(&cfg, false), Err(SkipReason::BlockedDomain));
}

#[test]
fn blocking_the_origin_host_does_not_reach_the_canonical() {
    // The watcher found the link on ir.acme.example, but the document's
    // canonical host is the wire. Only the canonical host is judged here.
    let cfg = Config {
        block_domains: vec!["ir.acme.example".to_string()],
        ..Config::default()
    };
    assert!(run_gate(&cfg, false).is_ok());
}

#[test]
fn first_party_gate_refuses_an_offsite_canonical() {
    let cfg = Config {
        first_party_only: true,
        trusted_domains: Vec::new(),
        ..Config::default()
    };
    assert_eq!(run_gate(&cfg, false), Err(SkipReason::NotFirstParty));
}

#[test]
fn trusted_wire_counts_as_first_party() {
    // Same gate, but the default trust list carries the wire host.
    let cfg = Config {
        first_party_only: true,
        ..Config::default()
    };
    assert!(run_gate(&cfg, false).is_ok());
}

#[test]
fn filings_bypass_the_first_party_gate_by_default() {
    let cfg = Config {
        first_party_only: true,
        trusted_domains: Vec::new(),
        ..Config::default()
    };
    assert_eq!(run_gate(&cfg, true).as_deref(), Ok(CANONICAL));
}

#[test]
fn filings_do_not_bypass_the_block_list_by_default() {
    let cfg = Config {
        block_domains: vec!["businesswire.com".to_string()],
        ..Config::default()
    };
    assert_eq!(run_gate(&cfg, true), Err(SkipReason::BlockedDomain));
}

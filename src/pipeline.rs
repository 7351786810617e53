// src/pipeline.rs
//! Per-candidate pass and the batch runner around it. One candidate is fully
//! fetched, extracted, and recorded before the next begins; skips are values
//! the caller can count, not errors.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::extract::{self, HighlightLimits};
use crate::fetch::Fetcher;
use crate::normalize::{NormalizedDoc, Normalizer};
use crate::notify::Notifier;
use crate::payload::{Candidate, SummaryPayload};
use crate::policy::{DomainPolicy, PolicyDecision};
use crate::state::SeenStore;
use crate::watch::Discovery;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadySeen,
    DuplicateInBatch,
    BlockedDomain,
    NotFirstParty,
}

/// Result of one pipeline pass. `Delivered` means the notification was
/// handed off (dry-run included) and the id recorded.
pub enum Outcome {
    Delivered(SummaryPayload),
    Skipped(SkipReason),
    Failed(anyhow::Error),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
    pub delivered: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Policy gate plus extraction over an already-normalized document. The
/// check runs against the canonical URL, not the watcher's link. Separated
/// from the fetch so fixture documents can drive it.
pub fn gate_and_summarize(
    policy: &DomainPolicy,
    candidate: &Candidate,
    doc: &NormalizedDoc,
    is_filing: bool,
    limits: &HighlightLimits,
) -> Result<SummaryPayload, SkipReason> {
    match policy.check(&doc.final_url, &candidate.url, is_filing) {
        PolicyDecision::Allow => {}
        PolicyDecision::BlockedDomain => return Err(SkipReason::BlockedDomain),
        PolicyDecision::NotFirstParty => return Err(SkipReason::NotFirstParty),
    }
    let trusted = policy.is_trusted(&doc.final_url);
    Ok(extract::summarize_document(candidate, doc, trusted, limits))
}

pub struct Pipeline {
    fetcher: Fetcher,
    normalizer: Normalizer,
    policy: DomainPolicy,
    notifier: Notifier,
    limits: HighlightLimits,
    item_deadline: Duration,
    polite_delay: Duration,
}

impl Pipeline {
    pub fn new(cfg: &Config) -> Result<Self> {
        Ok(Self {
            fetcher: Fetcher::new(cfg)?,
            normalizer: Normalizer::new(cfg),
            policy: DomainPolicy::from_config(cfg),
            notifier: Notifier::new(cfg)?,
            limits: extract::limits_from_config(cfg),
            item_deadline: cfg.item_deadline,
            polite_delay: cfg.polite_delay,
        })
    }

    /// Fetch, normalize, gate, extract. No delivery or recording here; the
    /// deadline wrapper and the dedup bookkeeping live in `handle`.
    async fn produce(&self, candidate: &Candidate, is_filing: bool) -> Outcome {
        let fetched = match self.fetcher.fetch(&candidate.url).await {
            Ok(doc) => doc,
            Err(error) => return Outcome::Failed(error.into()),
        };
        let doc = self.normalizer.normalize(&fetched);
        match gate_and_summarize(&self.policy, candidate, &doc, is_filing, &self.limits) {
            Ok(payload) => Outcome::Delivered(payload),
            Err(reason) => Outcome::Skipped(reason),
        }
    }

    /// One candidate end to end. The id is recorded only after delivery
    /// succeeds, so a failed item is retried on a later poll.
    pub async fn handle(
        &self,
        discovery: &Discovery,
        store: &mut SeenStore,
        batch_guard: &mut HashSet<String>,
    ) -> Outcome {
        let candidate = &discovery.candidate;
        let id = candidate.seen_id();

        if batch_guard.contains(&id) || batch_guard.contains(candidate.url.as_str()) {
            debug!(source = %candidate.source, url = %candidate.url, "duplicate within batch");
            return Outcome::Skipped(SkipReason::DuplicateInBatch);
        }
        batch_guard.insert(id.clone());
        batch_guard.insert(candidate.url.clone());

        if store.has(&id) {
            debug!(source = %candidate.source, url = %candidate.url, "already notified");
            return Outcome::Skipped(SkipReason::AlreadySeen);
        }

        info!(
            source = %candidate.source,
            title = %candidate.title,
            url = %candidate.url,
            "processing candidate"
        );

        let produced = match timeout(
            self.item_deadline,
            self.produce(candidate, discovery.from_filing_index),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Outcome::Failed(anyhow!(
                "deadline of {:?} exceeded",
                self.item_deadline
            )),
        };

        match produced {
            Outcome::Delivered(payload) => {
                if let Err(error) = self.notifier.deliver(&payload).await {
                    warn!(url = %candidate.url, %error, "notification failed, leaving unrecorded");
                    return Outcome::Failed(error);
                }
                store.add(id);
                Outcome::Delivered(payload)
            }
            Outcome::Skipped(reason) => {
                info!(url = %candidate.url, ?reason, "candidate skipped");
                Outcome::Skipped(reason)
            }
            Outcome::Failed(error) => {
                warn!(url = %candidate.url, %error, "candidate failed");
                Outcome::Failed(error)
            }
        }
    }

    /// Process a whole poll's discoveries sequentially, with the politeness
    /// delay after every item that touched the network.
    pub async fn run_batch(
        &self,
        discoveries: &[Discovery],
        store: &mut SeenStore,
    ) -> BatchStats {
        let mut stats = BatchStats::default();
        let mut batch_guard: HashSet<String> = HashSet::new();

        for discovery in discoveries {
            let outcome = self.handle(discovery, store, &mut batch_guard).await;
            let deduped = matches!(
                outcome,
                Outcome::Skipped(SkipReason::AlreadySeen | SkipReason::DuplicateInBatch)
            );
            match outcome {
                Outcome::Delivered(_) => stats.delivered += 1,
                Outcome::Skipped(_) => stats.skipped += 1,
                Outcome::Failed(_) => stats.failed += 1,
            }
            if !deduped {
                tokio::time::sleep(self.polite_delay).await;
            }
        }

        info!(
            delivered = stats.delivered,
            skipped = stats.skipped,
            failed = stats.failed,
            "batch finished"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watch::Discovery;

    /// No reader/proxy fallbacks and no SMTP, so nothing reaches the network
    /// unless a test hands over a resolvable URL.
    fn offline_config() -> Config {
        Config {
            reader_fallback: false,
            render_proxy_url: None,
            polite_delay: Duration::from_millis(0),
            item_deadline: Duration::from_secs(5),
            dry_run: true,
            ..Config::default()
        }
    }

    fn empty_store(dir: &tempfile::TempDir) -> SeenStore {
        SeenStore::load(dir.path().join("seen.json")).unwrap()
    }

    fn discovery(source: &str, title: &str, url: &str) -> Discovery {
        Discovery {
            candidate: Candidate::new(source, title, url),
            from_filing_index: false,
        }
    }

    #[tokio::test]
    async fn seen_candidates_short_circuit_before_any_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(&offline_config()).unwrap();
        let mut store = empty_store(&dir);
        let mut guard = HashSet::new();

        // URL is unreachable; a fetch attempt would fail, not skip.
        let d = discovery("acme-rss", "Q2 results", "this is not a url");
        store.add(d.candidate.seen_id());

        let outcome = pipeline.handle(&d, &mut store, &mut guard).await;
        assert!(matches!(
            outcome,
            Outcome::Skipped(SkipReason::AlreadySeen)
        ));
    }

    #[tokio::test]
    async fn failed_fetch_leaves_the_id_unrecorded() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(&offline_config()).unwrap();
        let mut store = empty_store(&dir);
        let mut guard = HashSet::new();

        let d = discovery("acme-rss", "Q2 results", "this is not a url");
        let outcome = pipeline.handle(&d, &mut store, &mut guard).await;
        assert!(matches!(outcome, Outcome::Failed(_)));
        assert!(!store.has(&d.candidate.seen_id()));

        // Rediscovered in the same batch: guarded, not re-fetched.
        let outcome = pipeline.handle(&d, &mut store, &mut guard).await;
        assert!(matches!(
            outcome,
            Outcome::Skipped(SkipReason::DuplicateInBatch)
        ));
    }

    #[tokio::test]
    async fn same_url_under_two_sources_processes_once_per_batch() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(&offline_config()).unwrap();
        let mut store = empty_store(&dir);

        let a = discovery("acme-rss", "Q2 results", "bad://url");
        let b = discovery("page:acme-ir", "Acme Q2 earnings", "bad://url");
        let stats = pipeline.run_batch(&[a, b], &mut store).await;
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.delivered, 0);
    }
}

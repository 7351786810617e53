// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod config;
pub mod extract;
pub mod fetch;
pub mod normalize;
pub mod notify;
pub mod payload;
pub mod pipeline;
pub mod policy;
pub mod state;
pub mod watch;
pub mod watchlist;

// ---- Re-exports for stable public API ----
pub use crate::config::Config;
pub use crate::payload::{Candidate, Metric, MetricSet, SummaryPayload};
pub use crate::pipeline::{BatchStats, Outcome, Pipeline, SkipReason};
pub use crate::state::SeenStore;
pub use crate::watchlist::Watchlist;

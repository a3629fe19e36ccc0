//! Metron collector library
//!
//! This library measures per-test CPU and memory usage, extracts functional
//! metrics from structured test reports, and maintains append-only CSV
//! history tables for each (test, metric group) pair in a remote artifact
//! store.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod history;
pub mod metrics;
pub mod pipeline;
pub mod remote;
pub mod report;
pub mod sampler;
pub mod system_info;
pub mod testbin;

// Re-export commonly used types
pub use config::{CollectorConfig, Credentials, RunOptions};
pub use descriptor::{MetricGroup, TestDescriptor};
pub use error::{CollectorError, Result};
pub use history::{HistoricalTable, SeriesStore};
pub use metrics::{CollectedMetrics, MetricValue};
pub use pipeline::{CollectorService, RunSummary};
pub use remote::{ArtifactStore, FetchOutcome};

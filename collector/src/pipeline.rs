//! End-to-end collection pipeline
//!
//! One run: stamp templates, load descriptors, sample every test, optionally
//! extract functional metrics from a batched run, append to the historical
//! tables, publish. Everything is sequential and fail-fast; nothing is
//! published if any upstream step fails.

use std::fs;

use tracing::{info, warn};

use crate::config::CollectorConfig;
use crate::descriptor;
use crate::error::Result;
use crate::history::SeriesStore;
use crate::metrics::CollectedMetrics;
use crate::remote::ArtifactStore;
use crate::report;
use crate::sampler::ResourceSampler;
use crate::system_info::{self, HostInfo};

/// What one completed run did.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub tests_measured: usize,
    pub artifacts: Vec<String>,
    pub published: bool,
}

/// Drives one full collection run.
pub struct CollectorService {
    config: CollectorConfig,
}

impl CollectorService {
    pub fn new(config: CollectorConfig) -> Self {
        Self { config }
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let config = &self.config;
        fs::create_dir_all(&config.output_dir)?;

        let host = HostInfo::detect();
        info!(
            cpu = %host.cpu_model,
            cores = host.cpu_count,
            ram_gb = host.total_ram_gb,
            "collecting on this host"
        );

        let placeholders = system_info::placeholder_map(&host, config.store_host.as_deref());
        system_info::stamp_file(&config.descriptor_file, &placeholders)?;
        if let Some(dashboard) = &config.dashboard_file {
            system_info::stamp_file(dashboard, &placeholders)?;
        }

        let descriptors = descriptor::load_descriptors(&config.descriptor_file)?;
        info!(count = descriptors.len(), "loaded test descriptors");

        let mut collected = CollectedMetrics::default();

        ResourceSampler::new(config)
            .measure_all(&descriptors, &mut collected)
            .await?;

        if config.functional_metrics {
            let test_report = report::run_batched(config, &descriptors).await?;
            report::extract_metrics(&test_report, &descriptors, &mut collected);
        }

        info!("collected metrics:\n{}", collected.summary_json());

        let store = ArtifactStore::new(&config.store_url, config.upload.clone())?;
        let series = SeriesStore::new(&store, &config.version_token);
        let artifacts = series
            .append_all(&descriptors, &collected, &config.output_dir)
            .await?;

        let published = if store.can_publish() {
            for name in &artifacts {
                store.publish(name, &config.output_dir.join(name)).await?;
            }
            true
        } else {
            warn!(
                count = artifacts.len(),
                "uploads disabled, built tables kept locally"
            );
            false
        };

        Ok(RunSummary {
            tests_measured: descriptors.len(),
            artifacts,
            published,
        })
    }
}

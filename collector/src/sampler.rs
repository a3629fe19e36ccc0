//! Resource sampling for test executions
//!
//! For each descriptor the sampler launches the test binary once with the
//! descriptor's repeat count, attaches the external monitor to the running
//! process, and reduces the monitor's recording to aggregate CPU/memory
//! statistics. Descriptors run strictly one at a time: parallel executions
//! would contend for the CPU and memory budget being measured.

use std::fs::File;
use std::io;
use std::process::Stdio;

use regex::Regex;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::CollectorConfig;
use crate::descriptor::TestDescriptor;
use crate::error::{CollectorError, Result, SamplerError};
use crate::metrics::{CollectedMetrics, PERFORMANCE_GROUP};
use crate::testbin::{self, ReportFormat};

/// One observation of the test process at a sampling tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub cpu_percent: f64,
    pub memory_mb: f64,
}

/// Aggregate statistics over one recording.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleStats {
    pub max_cpu: f64,
    pub max_mem: f64,
    pub avg_cpu: f64,
    pub avg_mem: f64,
}

impl SampleStats {
    /// Reduce a series to max and arithmetic mean. `None` for an empty
    /// series, which callers must treat as a failure rather than zeros.
    pub fn from_series(series: &[Sample]) -> Option<Self> {
        if series.is_empty() {
            return None;
        }

        let count = series.len() as f64;
        let mut max_cpu = f64::MIN;
        let mut max_mem = f64::MIN;
        let mut cpu_sum = 0.0;
        let mut mem_sum = 0.0;

        for sample in series {
            max_cpu = max_cpu.max(sample.cpu_percent);
            max_mem = max_mem.max(sample.memory_mb);
            cpu_sum += sample.cpu_percent;
            mem_sum += sample.memory_mb;
        }

        Some(Self {
            max_cpu,
            max_mem,
            avg_cpu: cpu_sum / count,
            avg_mem: mem_sum / count,
        })
    }
}

/// Parse the monitor's textual recording into a sample series.
///
/// A data line carries exactly four decimal numbers: elapsed time, CPU
/// percentage, resident memory in MB, and virtual memory in MB. Lines with
/// any other count (headers, footers, truncated writes) are discarded.
pub fn parse_recording(text: &str) -> Vec<Sample> {
    let number = Regex::new(r"[0-9]+\.[0-9]+").expect("hard-coded pattern");

    let mut series = Vec::new();
    for line in text.lines() {
        let values: Vec<f64> = number
            .find_iter(line)
            .filter_map(|m| m.as_str().parse().ok())
            .collect();

        if values.len() != 4 {
            continue;
        }

        series.push(Sample {
            cpu_percent: values[1],
            memory_mb: values[2],
        });
    }

    series
}

/// Drives one measured test invocation per descriptor.
pub struct ResourceSampler<'a> {
    config: &'a CollectorConfig,
}

impl<'a> ResourceSampler<'a> {
    pub fn new(config: &'a CollectorConfig) -> Self {
        Self { config }
    }

    /// Measure every descriptor in order, recording the statistics into the
    /// reserved "Performance" group.
    pub async fn measure_all(
        &self,
        descriptors: &[TestDescriptor],
        collected: &mut CollectedMetrics,
    ) -> Result<()> {
        for descriptor in descriptors {
            let stats = self.measure_one(descriptor).await?;

            collected.insert(&descriptor.name, PERFORMANCE_GROUP, "max_cpu", stats.max_cpu);
            collected.insert(&descriptor.name, PERFORMANCE_GROUP, "max_mem", stats.max_mem);
            collected.insert(&descriptor.name, PERFORMANCE_GROUP, "avg_cpu", stats.avg_cpu);
            collected.insert(&descriptor.name, PERFORMANCE_GROUP, "avg_mem", stats.avg_mem);

            info!(
                test = %descriptor.name,
                max_cpu = stats.max_cpu,
                avg_cpu = stats.avg_cpu,
                max_mem = stats.max_mem,
                avg_mem = stats.avg_mem,
                "resource usage measured"
            );
        }

        Ok(())
    }

    async fn measure_one(&self, descriptor: &TestDescriptor) -> Result<SampleStats> {
        info!(test = %descriptor.name, "measuring resource usage");

        let report_dir = self.config.output_dir.join("reports");
        std::fs::create_dir_all(&report_dir)?;

        // Overwritten for every test; not part of the published artifacts.
        let log_path = self.config.output_dir.join("log.txt");
        let recording_path = self.config.output_dir.join("recording.txt");

        let log_file = File::create(&log_path)?;
        let mut command = testbin::run_command(
            &self.config.test_executable,
            &descriptor.name,
            descriptor.repeat,
            ReportFormat::Xml,
            &report_dir.join("output.xml"),
        );
        command
            .stdout(Stdio::from(log_file.try_clone()?))
            .stderr(Stdio::from(log_file));

        let mut child = command.spawn()?;
        let pid = child.id().ok_or_else(|| SamplerError::MonitorAttach {
            reason: "test process exited before the monitor could attach".to_string(),
        })?;
        debug!(pid, "test process started");

        // The monitor watches the pid (and descendants) until it exits, so
        // waiting on the monitor doubles as waiting for the test itself.
        let monitor_status = Command::new(&self.config.monitor_program)
            .arg(pid.to_string())
            .arg("--interval")
            .arg(self.config.sample_interval_secs.to_string())
            .arg("--log")
            .arg(&recording_path)
            .arg("--include-children")
            .status()
            .await
            .map_err(|e| SamplerError::MonitorSpawn {
                program: self.config.monitor_program.clone(),
                reason: e.to_string(),
            })?;
        if !monitor_status.success() {
            warn!(status = %monitor_status, "monitor exited abnormally");
        }

        let status = child.wait().await?;
        if !status.success() {
            let code = status.code().unwrap_or(1);
            return Err(CollectorError::TestsFailed { code });
        }

        let recording = match std::fs::read_to_string(&recording_path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let series = parse_recording(&recording);
        debug!(samples = series.len(), "recording parsed");

        SampleStats::from_series(&series)
            .ok_or_else(|| {
                SamplerError::EmptySeries {
                    test: descriptor.name.clone(),
                }
                .into()
            })
    }
}

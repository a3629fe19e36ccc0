//! Structured test report parsing and metric extraction
//!
//! One batched run of every descriptor's test produces a JSON report. The
//! extractor walks it with typed accessors (suite by name, case by name,
//! attribute by name) and records the declared fields. Attributes that are
//! absent or null are skipped silently: many metrics only exist for specific
//! test types, and their absence is not an error.
//!
//! Not part of the default pipeline path; enabled by a CLI flag.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::CollectorConfig;
use crate::descriptor::TestDescriptor;
use crate::error::{CollectorError, ReportError, Result};
use crate::metrics::{normalize_field_name, CollectedMetrics, MetricValue};
use crate::testbin::{self, ReportFormat};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Root of the machine-readable report: a list of named suites.
#[derive(Debug, Clone, Deserialize)]
pub struct TestReport {
    #[serde(default)]
    pub testsuites: Vec<SuiteReport>,
}

/// One named suite with its executed cases.
#[derive(Debug, Clone, Deserialize)]
pub struct SuiteReport {
    pub name: String,
    #[serde(default, rename = "testsuite")]
    pub cases: Vec<CaseReport>,
}

/// One executed case; everything beyond the name is an attribute bag.
#[derive(Debug, Clone, Deserialize)]
pub struct CaseReport {
    pub name: String,
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, Value>,
}

impl TestReport {
    /// Parse a report from a file on disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ReportError::NotFound {
                    path: path.display().to_string(),
                }
                .into())
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_str(&raw)
    }

    /// Parse a report from raw JSON text.
    pub fn from_str(raw: &str) -> Result<Self> {
        let report = serde_json::from_str(raw).map_err(|e| ReportError::Malformed {
            reason: e.to_string(),
        })?;
        Ok(report)
    }

    pub fn suite(&self, name: &str) -> Option<&SuiteReport> {
        self.testsuites.iter().find(|suite| suite.name == name)
    }

    /// Look one attribute up by suite name, case name, and attribute name.
    pub fn attribute(&self, suite: &str, case: &str, attribute: &str) -> Option<&Value> {
        self.suite(suite)?.case(case)?.attribute(attribute)
    }
}

impl SuiteReport {
    pub fn case(&self, name: &str) -> Option<&CaseReport> {
        self.cases.iter().find(|case| case.name == name)
    }
}

impl CaseReport {
    /// Named attribute, with JSON null treated as absent.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name).filter(|value| !value.is_null())
    }
}

/// Run every descriptor's test once in a single batched invocation and parse
/// the emitted report.
///
/// A non-zero exit from the test binary is fatal for the whole run and its
/// code is propagated as the process exit status.
pub async fn run_batched(
    config: &CollectorConfig,
    descriptors: &[TestDescriptor],
) -> Result<TestReport> {
    let filter = testbin::joined_filter(descriptors);
    let report_path = config.output_dir.join("test_detail_perf.json");

    info!(%filter, "running batched functional-metrics pass");

    let status = testbin::run_command(
        &config.test_executable,
        &filter,
        1,
        ReportFormat::Json,
        &report_path,
    )
    .status()
    .await?;

    if !status.success() {
        let code = status.code().unwrap_or(1);
        return Err(CollectorError::TestsFailed { code });
    }

    // The report stays in the output directory next to the built tables.
    TestReport::from_file(&report_path)
}

/// Pull every declared field out of the report into the collected metrics.
///
/// Deterministic over the same report and descriptors: re-running yields
/// identical content.
pub fn extract_metrics(
    report: &TestReport,
    descriptors: &[TestDescriptor],
    collected: &mut CollectedMetrics,
) {
    for descriptor in descriptors {
        let suite = descriptor.suite_name();
        let case = descriptor.case_name();

        for group in &descriptor.metric_groups {
            for field in &group.fields {
                let Some(value) = report.attribute(suite, case, field) else {
                    debug!(test = %descriptor.name, %field, "attribute absent, skipping");
                    continue;
                };
                let Some(metric) = convert_value(field, value) else {
                    debug!(test = %descriptor.name, %field, "attribute not numeric, skipping");
                    continue;
                };

                collected.insert(
                    &descriptor.name,
                    &group.name,
                    &normalize_field_name(field),
                    metric,
                );
            }
        }
    }
}

/// Convert one raw attribute into a stored value.
///
/// Byte-counted fields become megabytes formatted to three decimals; other
/// fields keep the report's representation.
fn convert_value(field: &str, value: &Value) -> Option<MetricValue> {
    if field.contains("bytes") {
        let bytes = match value {
            Value::Number(number) => number.as_f64()?,
            Value::String(text) => text.parse().ok()?,
            _ => return None,
        };
        return Some(MetricValue::Text(format!("{:.3}", bytes / BYTES_PER_MB)));
    }

    match value {
        Value::Number(number) => number.as_f64().map(MetricValue::Number),
        Value::String(text) => Some(MetricValue::Text(text.clone())),
        _ => None,
    }
}

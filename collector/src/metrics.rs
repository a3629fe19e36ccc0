//! Aggregated metric values collected during one run
//!
//! A single [`CollectedMetrics`] instance is owned by the pipeline and
//! populated sequentially: the resource sampler writes the reserved
//! "Performance" group, the report extractor writes everything else. The
//! historical series store only ever reads it.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Reserved group name holding the sampler-derived CPU/memory statistics.
pub const PERFORMANCE_GROUP: &str = "Performance";

/// A collected value: either a raw number or an already formatted string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Number(value) => write!(f, "{}", value),
            MetricValue::Text(value) => write!(f, "{}", value),
        }
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Number(value)
    }
}

impl From<String> for MetricValue {
    fn from(value: String) -> Self {
        MetricValue::Text(value)
    }
}

/// Field values recorded for one metric group of one test.
pub type GroupValues = BTreeMap<String, MetricValue>;

/// test name -> group name -> field name -> value
#[derive(Debug, Default, Clone, Serialize)]
#[serde(transparent)]
pub struct CollectedMetrics {
    tests: BTreeMap<String, BTreeMap<String, GroupValues>>,
}

impl CollectedMetrics {
    /// Record one value, replacing any previous value for the same key.
    pub fn insert(
        &mut self,
        test: &str,
        group: &str,
        field: &str,
        value: impl Into<MetricValue>,
    ) {
        self.tests
            .entry(test.to_string())
            .or_default()
            .entry(group.to_string())
            .or_default()
            .insert(field.to_string(), value.into());
    }

    /// All values of one group for one test.
    pub fn group(&self, test: &str, group: &str) -> Option<&GroupValues> {
        self.tests.get(test).and_then(|groups| groups.get(group))
    }

    /// One specific value.
    pub fn get(&self, test: &str, group: &str, field: &str) -> Option<&MetricValue> {
        self.group(test, group).and_then(|values| values.get(field))
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Pretty-printed dump of everything collected, for the run summary log.
    pub fn summary_json(&self) -> String {
        serde_json::to_string_pretty(&self.tests).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Rename a byte-counted field to its megabyte counterpart.
///
/// Applied to both table headers and lookup keys so that a descriptor can
/// keep declaring the raw field name the report uses.
pub fn normalize_field_name(field: &str) -> String {
    if field.contains("bytes") {
        field.replace("bytes", "mb")
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let mut collected = CollectedMetrics::default();
        collected.insert("Suite.Case", PERFORMANCE_GROUP, "max_cpu", 30.0);
        collected.insert("Suite.Case", "IO", "peak_mb", "2.000".to_string());

        assert_eq!(
            collected.get("Suite.Case", PERFORMANCE_GROUP, "max_cpu"),
            Some(&MetricValue::Number(30.0))
        );
        assert_eq!(
            collected.get("Suite.Case", "IO", "peak_mb"),
            Some(&MetricValue::Text("2.000".to_string()))
        );
        assert!(collected.get("Suite.Case", "IO", "missing").is_none());
        assert!(collected.group("Other.Case", "IO").is_none());
    }

    #[test]
    fn test_whole_numbers_render_without_fraction() {
        assert_eq!(MetricValue::Number(30.0).to_string(), "30");
        assert_eq!(MetricValue::Number(12.5).to_string(), "12.5");
        assert_eq!(MetricValue::Text("2.000".to_string()).to_string(), "2.000");
    }

    #[test]
    fn test_normalize_field_name() {
        assert_eq!(normalize_field_name("peak_bytes"), "peak_mb");
        assert_eq!(normalize_field_name("bytes_transferred"), "mb_transferred");
        assert_eq!(normalize_field_name("max_cpu"), "max_cpu");
    }

    #[test]
    fn test_summary_json_round_trips() {
        let mut collected = CollectedMetrics::default();
        collected.insert("Suite.Case", PERFORMANCE_GROUP, "avg_cpu", 20.0);

        let summary = collected.summary_json();
        let parsed: serde_json::Value = serde_json::from_str(&summary).unwrap();
        assert_eq!(
            parsed["Suite.Case"]["Performance"]["avg_cpu"],
            serde_json::json!(20.0)
        );
    }
}

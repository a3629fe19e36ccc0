//! Append-only historical series tables
//!
//! Every (test, metric group) pair owns one remotely stored CSV table whose
//! first column is the run's version token. Each run fetches the previous
//! revision (or starts a fresh table), appends exactly one row, and writes
//! the whole file back for the publisher. Previous rows are never parsed,
//! validated, or rewritten: a fetched table is an opaque append target.
//!
//! The remote store gives no concurrency control. At most one writer per
//! artifact name is assumed; concurrent runs against the same name can race
//! and silently overwrite each other's appended history.

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::descriptor::{MetricGroup, TestDescriptor};
use crate::error::Result;
use crate::metrics::{normalize_field_name, CollectedMetrics, GroupValues};
use crate::remote::{ArtifactStore, FetchOutcome};

/// Replace characters that cannot appear in an artifact file name.
///
/// Parameterized test cases carry a `/` in their name, which the remote
/// store would interpret as a path component.
pub fn sanitize_component(raw: &str) -> String {
    raw.replace(['/', '\\'], "_")
}

/// Deterministic artifact name for one (test, metric group) pair.
pub fn artifact_name(descriptor: &TestDescriptor, group: &MetricGroup) -> String {
    format!(
        "performance_results_{}_{}.csv",
        sanitize_component(descriptor.case_name()),
        sanitize_component(&group.name)
    )
}

/// One table, either freshly initialized or adopted from the remote store.
#[derive(Debug, Clone)]
pub struct HistoricalTable {
    name: String,
    content: String,
}

impl HistoricalTable {
    /// Start a new table: a `version` column followed by the group's fields
    /// with byte-counted names renamed, newline-terminated.
    pub fn fresh(name: String, group: &MetricGroup) -> Self {
        let mut content = String::from("version");
        for field in &group.fields {
            content.push(',');
            content.push_str(&normalize_field_name(field));
        }
        content.push('\n');

        Self { name, content }
    }

    /// Adopt a previous revision verbatim. No parsing, no header validation:
    /// whatever the store returned is the base this run appends to.
    pub fn adopted(name: String, bytes: &[u8]) -> Self {
        Self {
            name,
            content: String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    /// Append this run's row: the version token, then one value per group
    /// field in declaration order. A missing value is recorded as a literal
    /// `0` with a diagnostic, so the row never comes up short of the header.
    pub fn append_row(&mut self, version: &str, group: &MetricGroup, values: Option<&GroupValues>) {
        if !self.content.is_empty() && !self.content.ends_with('\n') {
            self.content.push('\n');
        }

        self.content.push_str(version);
        for field in &group.fields {
            let key = normalize_field_name(field);
            match values.and_then(|values| values.get(&key)) {
                Some(value) => {
                    self.content.push(',');
                    self.content.push_str(&value.to_string());
                }
                None => {
                    warn!(field = %field, table = %self.name, "value absent, recording 0");
                    self.content.push_str(",0");
                }
            }
        }
        self.content.push('\n');
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Builds the run's tables against the remote store.
pub struct SeriesStore<'a> {
    store: &'a ArtifactStore,
    version_token: &'a str,
}

impl<'a> SeriesStore<'a> {
    pub fn new(store: &'a ArtifactStore, version_token: &'a str) -> Self {
        Self {
            store,
            version_token,
        }
    }

    /// Fetch-or-initialize and append one row for every (test, group) pair,
    /// writing each built table into `output_dir`.
    ///
    /// Returns the touched artifact names in descriptor order. Only an
    /// explicit not-found from the store starts a fresh table; any other
    /// fetch failure aborts that artifact and unwinds.
    pub async fn append_all(
        &self,
        descriptors: &[TestDescriptor],
        collected: &CollectedMetrics,
        output_dir: &Path,
    ) -> Result<Vec<String>> {
        let mut touched = Vec::new();

        for descriptor in descriptors {
            for group in &descriptor.metric_groups {
                let name = artifact_name(descriptor, group);

                let mut table = match self.store.fetch(&name).await? {
                    FetchOutcome::Found(bytes) => {
                        debug!(artifact = %name, bytes = bytes.len(), "adopting previous revision");
                        HistoricalTable::adopted(name.clone(), &bytes)
                    }
                    FetchOutcome::Absent => {
                        info!(artifact = %name, "no previous revision, starting a new table");
                        HistoricalTable::fresh(name.clone(), group)
                    }
                };

                table.append_row(
                    self.version_token,
                    group,
                    collected.group(&descriptor.name, &group.name),
                );

                fs::write(output_dir.join(table.name()), table.content())?;
                touched.push(name);
            }
        }

        Ok(touched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MetricValue, PERFORMANCE_GROUP};

    fn performance_group() -> MetricGroup {
        MetricGroup {
            name: PERFORMANCE_GROUP.to_string(),
            fields: vec![
                "max_cpu".to_string(),
                "avg_cpu".to_string(),
                "max_mem".to_string(),
                "avg_mem".to_string(),
            ],
        }
    }

    fn descriptor() -> TestDescriptor {
        TestDescriptor {
            name: "MemoryTest.ReadNPartitionsFromVersionedLayer/15m_test".to_string(),
            repeat: 1,
            metric_groups: vec![performance_group()],
        }
    }

    #[test]
    fn test_artifact_name_sanitizes_case_name() {
        let name = artifact_name(&descriptor(), &performance_group());
        assert_eq!(
            name,
            "performance_results_ReadNPartitionsFromVersionedLayer_15m_test_Performance.csv"
        );
    }

    #[test]
    fn test_fresh_table_header_order() {
        let group = MetricGroup {
            name: "IO".to_string(),
            fields: vec!["partitions_loaded".to_string(), "peak_bytes".to_string()],
        };
        let table = HistoricalTable::fresh("io.csv".to_string(), &group);
        assert_eq!(table.content(), "version,partitions_loaded,peak_mb\n");
    }

    #[test]
    fn test_append_row_from_collected_values() {
        let mut collected = CollectedMetrics::default();
        let descriptor = descriptor();
        collected.insert(&descriptor.name, PERFORMANCE_GROUP, "max_cpu", 30.0);
        collected.insert(&descriptor.name, PERFORMANCE_GROUP, "avg_cpu", 20.0);
        collected.insert(&descriptor.name, PERFORMANCE_GROUP, "max_mem", 150.0);
        collected.insert(&descriptor.name, PERFORMANCE_GROUP, "avg_mem", 100.0);

        let group = performance_group();
        let mut table = HistoricalTable::fresh("perf.csv".to_string(), &group);
        table.append_row(
            "job-123",
            &group,
            collected.group(&descriptor.name, PERFORMANCE_GROUP),
        );

        assert_eq!(
            table.content(),
            "version,max_cpu,avg_cpu,max_mem,avg_mem\njob-123,30,20,150,100\n"
        );
    }

    #[test]
    fn test_adopted_table_rows_are_preserved() {
        let previous = "version,max_cpu,avg_cpu,max_mem,avg_mem\njob-1,10,5,80,60\njob-2,12,6,85,61";
        let group = performance_group();
        let mut table = HistoricalTable::adopted("perf.csv".to_string(), previous.as_bytes());

        let mut values = GroupValues::new();
        values.insert("max_cpu".to_string(), MetricValue::Number(30.0));
        values.insert("avg_cpu".to_string(), MetricValue::Number(20.0));
        values.insert("max_mem".to_string(), MetricValue::Number(150.0));
        values.insert("avg_mem".to_string(), MetricValue::Number(100.0));
        table.append_row("job-3", &group, Some(&values));

        let lines: Vec<&str> = table.content().lines().collect();
        assert_eq!(
            lines,
            vec![
                "version,max_cpu,avg_cpu,max_mem,avg_mem",
                "job-1,10,5,80,60",
                "job-2,12,6,85,61",
                "job-3,30,20,150,100",
            ]
        );
    }

    #[test]
    fn test_missing_values_become_zero() {
        let group = MetricGroup {
            name: "IO".to_string(),
            fields: vec!["reads".to_string(), "writes".to_string()],
        };
        let mut table = HistoricalTable::fresh("io.csv".to_string(), &group);

        let mut values = GroupValues::new();
        values.insert("reads".to_string(), MetricValue::Number(7.0));
        table.append_row("job-9", &group, Some(&values));

        assert_eq!(table.content(), "version,reads,writes\njob-9,7,0\n");

        // A group with no collected values at all still yields a full row.
        let mut empty = HistoricalTable::fresh("io.csv".to_string(), &group);
        empty.append_row("job-9", &group, None);
        assert_eq!(empty.content(), "version,reads,writes\njob-9,0,0\n");
    }

    #[test]
    fn test_row_length_always_matches_header() {
        let group = performance_group();
        let mut table = HistoricalTable::fresh("perf.csv".to_string(), &group);
        table.append_row("job-1", &group, None);

        let mut rows = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(table.content().as_bytes())
            .into_records();
        let header = rows.next().unwrap().unwrap();
        let row = rows.next().unwrap().unwrap();
        assert_eq!(header.len(), row.len());
    }
}

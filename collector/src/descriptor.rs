//! Test descriptor model
//!
//! Descriptors name one test case each, how often it is repeated during
//! measurement, and which metric groups are recorded for it. They are loaded
//! from a JSON file once and never mutated afterwards.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DescriptorError, Result};

/// A named bundle of related metric fields, e.g. "Performance" or "IO".
///
/// Field order is significant: it fixes the column order of the historical
/// table built for this group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricGroup {
    pub name: String,
    pub fields: Vec<String>,
}

/// One test case to measure: its fully qualified "Suite.Case" name, the
/// repeat count for the sampling run, and the metric groups to record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestDescriptor {
    pub name: String,
    pub repeat: u32,
    pub metric_groups: Vec<MetricGroup>,
}

impl TestDescriptor {
    /// Suite part of the fully qualified name.
    pub fn suite_name(&self) -> &str {
        self.name
            .split_once('.')
            .map(|(suite, _)| suite)
            .unwrap_or(&self.name)
    }

    /// Case part of the fully qualified name.
    ///
    /// Parameterized cases keep their parameter suffix, so this can contain
    /// characters that are not path-safe.
    pub fn case_name(&self) -> &str {
        self.name
            .split_once('.')
            .map(|(_, case)| case)
            .unwrap_or(&self.name)
    }
}

/// Load and validate descriptors from a JSON file.
pub fn load_descriptors(path: &Path) -> Result<Vec<TestDescriptor>> {
    let raw = fs::read_to_string(path)?;
    let descriptors: Vec<TestDescriptor> =
        serde_json::from_str(&raw).map_err(|e| DescriptorError::Parse {
            reason: e.to_string(),
        })?;

    for descriptor in &descriptors {
        validate_descriptor(descriptor)?;
    }

    Ok(descriptors)
}

fn validate_descriptor(descriptor: &TestDescriptor) -> std::result::Result<(), DescriptorError> {
    if descriptor.name.is_empty() {
        return Err(DescriptorError::EmptyName);
    }

    if descriptor.repeat == 0 {
        return Err(DescriptorError::ZeroRepeat {
            name: descriptor.name.clone(),
        });
    }

    for group in &descriptor.metric_groups {
        let mut seen = HashSet::new();
        for field in &group.fields {
            if !seen.insert(field.as_str()) {
                return Err(DescriptorError::DuplicateField {
                    name: descriptor.name.clone(),
                    group: group.name.clone(),
                    field: field.clone(),
                });
            }
        }
    }

    Ok(())
}

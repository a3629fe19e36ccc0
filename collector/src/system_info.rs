//! Host inspection and placeholder stamping
//!
//! The descriptor file and the HTML dashboard carry placeholder tokens for
//! the machine they ran on. Before a run they are rendered with the actual
//! CPU model, clock speed, core count, total RAM, and the store host, so
//! published reports identify their hardware.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use sysinfo::System;
use tracing::debug;

use crate::error::Result;

const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

/// Hardware summary of the machine running the tests.
#[derive(Debug, Clone)]
pub struct HostInfo {
    pub cpu_model: String,
    pub cpu_mhz: u64,
    pub cpu_count: usize,
    pub total_ram_gb: u64,
}

impl HostInfo {
    /// Read the host's CPU and memory characteristics.
    pub fn detect() -> Self {
        let system = System::new_all();

        let cpu_model = system
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let cpu_mhz = system.cpus().first().map(|cpu| cpu.frequency()).unwrap_or(0);
        let cpu_count = system.cpus().len();

        // Rounded up so "15.9 GB" machines report their nominal 16 GB.
        let total_ram_gb = (system.total_memory() + BYTES_PER_GB - 1) / BYTES_PER_GB;

        Self {
            cpu_model,
            cpu_mhz,
            cpu_count,
            total_ram_gb,
        }
    }
}

/// Placeholder tokens and their rendered values.
pub fn placeholder_map(host: &HostInfo, store_host: Option<&str>) -> BTreeMap<String, String> {
    let mut placeholders = BTreeMap::new();
    placeholders.insert("sed_cpu_model".to_string(), host.cpu_model.clone());
    placeholders.insert("sed_mhz".to_string(), format!("{} MHz", host.cpu_mhz));
    placeholders.insert("sed_n_core".to_string(), host.cpu_count.to_string());
    placeholders.insert(
        "sed_memory_total".to_string(),
        format!("{} GB", host.total_ram_gb),
    );
    if let Some(host) = store_host {
        placeholders.insert("sed_artifactory_host".to_string(), host.to_string());
    }
    placeholders
}

/// Replace every placeholder occurrence in the given text.
pub fn render_template(text: &str, placeholders: &BTreeMap<String, String>) -> String {
    let mut rendered = text.to_string();
    for (token, value) in placeholders {
        rendered = rendered.replace(token, value);
    }
    rendered
}

/// Render a template file in place.
pub fn stamp_file(path: &Path, placeholders: &BTreeMap<String, String>) -> Result<()> {
    let text = fs::read_to_string(path)?;
    let rendered = render_template(&text, placeholders);

    if rendered == text {
        debug!(file = %path.display(), "no placeholders to stamp");
        return Ok(());
    }

    fs::write(path, rendered)?;
    debug!(file = %path.display(), "stamped host information");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn host() -> HostInfo {
        HostInfo {
            cpu_model: "Example CPU @ 3.2GHz".to_string(),
            cpu_mhz: 3200,
            cpu_count: 8,
            total_ram_gb: 16,
        }
    }

    #[test]
    fn test_render_template_replaces_all_occurrences() {
        let placeholders = placeholder_map(&host(), Some("repo.example.com"));
        let rendered = render_template(
            "cpu: sed_cpu_model (sed_n_core cores at sed_mhz)\nram: sed_memory_total\nhost: sed_artifactory_host, again sed_artifactory_host",
            &placeholders,
        );

        assert_eq!(
            rendered,
            "cpu: Example CPU @ 3.2GHz (8 cores at 3200 MHz)\nram: 16 GB\nhost: repo.example.com, again repo.example.com"
        );
    }

    #[test]
    fn test_store_host_placeholder_kept_without_value() {
        let placeholders = placeholder_map(&host(), None);
        let rendered = render_template("host: sed_artifactory_host", &placeholders);
        assert_eq!(rendered, "host: sed_artifactory_host");
    }

    #[test]
    fn test_stamp_file_in_place() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"running on sed_n_core cores").unwrap();

        stamp_file(file.path(), &placeholder_map(&host(), None)).unwrap();

        let stamped = fs::read_to_string(file.path()).unwrap();
        assert_eq!(stamped, "running on 8 cores");
    }

    #[test]
    fn test_detect_reports_something() {
        let detected = HostInfo::detect();
        assert!(detected.cpu_count > 0);
        assert!(detected.total_ram_gb > 0);
    }
}

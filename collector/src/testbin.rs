//! Invocation of the external test binary
//!
//! The binary speaks the GTest command line dialect: a case filter, a repeat
//! count, and a report format/path pair. Exit code 0 means every selected
//! case passed.

use std::path::Path;

use tokio::process::Command;

use crate::descriptor::TestDescriptor;

/// Machine-readable report formats the binary can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Xml,
    Json,
}

impl ReportFormat {
    fn as_str(self) -> &'static str {
        match self {
            ReportFormat::Xml => "xml",
            ReportFormat::Json => "json",
        }
    }
}

/// Build the command for one invocation of the test binary.
pub fn run_command(
    executable: &Path,
    filter: &str,
    repeat: u32,
    format: ReportFormat,
    report_path: &Path,
) -> Command {
    let mut command = Command::new(executable);
    command
        .arg(format!("--gtest_filter={filter}"))
        .arg(format!("--gtest_repeat={repeat}"))
        .arg(format!(
            "--gtest_output={}:{}",
            format.as_str(),
            report_path.display()
        ));
    command
}

/// Filter selecting every descriptor's test in a single batched run.
pub fn joined_filter(descriptors: &[TestDescriptor]) -> String {
    descriptors
        .iter()
        .map(|descriptor| descriptor.name.as_str())
        .collect::<Vec<_>>()
        .join(":")
}

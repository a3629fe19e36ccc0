//! Error handling for the Metron collector
//!
//! This module provides error types for all collector operations, including
//! descriptor loading, resource sampling, report extraction, and the remote
//! artifact store protocol.

use std::io;

use thiserror::Error;

/// The main error type for the collector
#[derive(Error, Debug)]
pub enum CollectorError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Test descriptor errors
    #[error("Descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),

    /// Resource sampling errors
    #[error("Sampler error: {0}")]
    Sampler(#[from] SamplerError),

    /// Test report errors
    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    /// Remote artifact store errors
    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),

    /// The test binary itself failed; its exit code is propagated verbatim
    #[error("Test binary exited with code {code}")]
    TestsFailed { code: i32 },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {name}")]
    MissingEnv { name: &'static str },

    #[error("Test executable not found: {path}")]
    ExecutableNotFound { path: String },

    #[error("Invalid configuration value: {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Test descriptor errors
#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("Descriptor file is not valid JSON: {reason}")]
    Parse { reason: String },

    #[error("Descriptor has an empty test name")]
    EmptyName,

    #[error("Descriptor {name} has a repeat count of zero")]
    ZeroRepeat { name: String },

    #[error("Metric group {group} of {name} declares field {field} more than once")]
    DuplicateField {
        name: String,
        group: String,
        field: String,
    },
}

/// Resource sampling errors
#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("Failed to attach monitor to test process: {reason}")]
    MonitorAttach { reason: String },

    #[error("Failed to run monitor program {program}: {reason}")]
    MonitorSpawn { program: String, reason: String },

    #[error("Monitor produced no samples for {test}")]
    EmptySeries { test: String },
}

/// Test report errors
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Report file not found: {path}")]
    NotFound { path: String },

    #[error("Report is not a valid test report document: {reason}")]
    Malformed { reason: String },
}

/// Remote artifact store errors
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Invalid artifact store URL: {url}")]
    InvalidUrl { url: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store returned status {status} for artifact {artifact}")]
    UnexpectedStatus { artifact: String, status: u16 },

    #[error("Upload requested but no credentials are configured")]
    CredentialsRequired,

    #[error("Failed to read {path} for upload: {reason}")]
    UnreadableArtifact { path: String, reason: String },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, CollectorError>;

/// A specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// A specialized result type for remote store operations
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

impl CollectorError {
    /// Exit code the process should terminate with for this error.
    ///
    /// A functional test failure propagates the test binary's own exit code;
    /// everything else maps onto a stable per-category code.
    pub fn exit_code(&self) -> i32 {
        match self {
            CollectorError::TestsFailed { code } if *code > 0 => *code,
            CollectorError::TestsFailed { .. } => 1,
            CollectorError::Config(_) => 1,
            CollectorError::Io(_) => 2,
            CollectorError::Descriptor(_) | CollectorError::Serialization(_) => 3,
            CollectorError::Sampler(_) => 4,
            CollectorError::Report(_) => 5,
            CollectorError::Remote(_) => 6,
        }
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            CollectorError::Config(_) => "config",
            CollectorError::Descriptor(_) => "descriptor",
            CollectorError::Sampler(_) => "sampler",
            CollectorError::Report(_) => "report",
            CollectorError::Remote(_) => "remote",
            CollectorError::TestsFailed { .. } => "tests",
            CollectorError::Io(_) => "io",
            CollectorError::Serialization(_) => "serialization",
        }
    }
}

/// Format an error for user-friendly display
pub fn format_error(error: &CollectorError) -> String {
    match error {
        CollectorError::Config(e) => {
            format!("Configuration error: {}\n\nCheck the command line arguments and the CI environment variables.", e)
        }
        CollectorError::Remote(RemoteError::UnexpectedStatus { artifact, status }) => {
            format!(
                "Remote store error: artifact {} could not be processed (HTTP {}).\n\nOnly a 404 is treated as an absent table; anything else needs operator attention.",
                artifact, status
            )
        }
        CollectorError::TestsFailed { code } => {
            format!("Tests failed with exit code {}. No metrics were published for this run.", code)
        }
        _ => error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_mapping() {
        let config = CollectorError::Config(ConfigError::MissingEnv { name: "CI_JOB_ID" });
        assert_eq!(config.exit_code(), 1);
        assert_eq!(config.category(), "config");

        let sampler = CollectorError::Sampler(SamplerError::EmptySeries {
            test: "Suite.Case".to_string(),
        });
        assert_eq!(sampler.exit_code(), 4);

        let remote = CollectorError::Remote(RemoteError::UnexpectedStatus {
            artifact: "a.csv".to_string(),
            status: 503,
        });
        assert_eq!(remote.exit_code(), 6);
    }

    #[test]
    fn test_tests_failed_propagates_code() {
        let failed = CollectorError::TestsFailed { code: 2 };
        assert_eq!(failed.exit_code(), 2);

        // Signal-terminated children have no code to propagate.
        let killed = CollectorError::TestsFailed { code: 0 };
        assert_eq!(killed.exit_code(), 1);
    }

    #[test]
    fn test_format_error_mentions_artifact() {
        let remote = CollectorError::Remote(RemoteError::UnexpectedStatus {
            artifact: "performance_results_case_IO.csv".to_string(),
            status: 500,
        });
        let message = format_error(&remote);
        assert!(message.contains("performance_results_case_IO.csv"));
        assert!(message.contains("500"));
    }
}

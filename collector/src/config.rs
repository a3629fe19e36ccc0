//! Runtime configuration for the collector
//!
//! Configuration is assembled from command line arguments plus the CI
//! environment (store host, run identifier, upload credentials) and is
//! validated before any subprocess is spawned.

use std::fmt;
use std::path::PathBuf;

use crate::error::{ConfigError, ConfigResult};

/// Host of the remote artifact store
pub const ENV_STORE_HOST: &str = "ARTIFACTORY_HOST";
/// Run identifier recorded in the `version` column of every table
pub const ENV_VERSION_TOKEN: &str = "CI_JOB_ID";
/// Upload user
pub const ENV_STORE_USER: &str = "ARTIF_BOT";
/// Upload password
pub const ENV_STORE_PASSWORD: &str = "ARTIF_BOT_PWD";

/// Credentials for publishing artifacts to the remote store
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Main configuration structure for a collector run
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// JSON file describing tests and their metric groups
    pub descriptor_file: PathBuf,

    /// Optional HTML dashboard stamped with host information
    pub dashboard_file: Option<PathBuf>,

    /// The test executable driven by the sampler
    pub test_executable: PathBuf,

    /// Directory for logs, recordings, reports and built tables
    pub output_dir: PathBuf,

    /// Base URL of the remote artifact store
    pub store_url: String,

    /// Host component of the store URL, used for template stamping
    pub store_host: Option<String>,

    /// Opaque run identifier; uniqueness is guaranteed by the caller
    pub version_token: String,

    /// Monitor program attached to the running test process
    pub monitor_program: String,

    /// Monitor sampling interval in seconds
    pub sample_interval_secs: f64,

    /// Run the batched functional-metrics pass after sampling
    pub functional_metrics: bool,

    /// Credentials for uploading; `None` disables publishing entirely
    pub upload: Option<Credentials>,
}

/// Command-line level inputs from which a [`CollectorConfig`] is resolved
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub descriptor_file: PathBuf,
    pub dashboard_file: Option<PathBuf>,
    pub test_executable: PathBuf,
    pub output_dir: PathBuf,
    pub store_url: Option<String>,
    pub version_token: Option<String>,
    pub monitor_program: String,
    pub sample_interval_secs: f64,
    pub functional_metrics: bool,
    pub no_upload: bool,
}

/// Default store URL under a given host
pub fn default_store_url(host: &str) -> String {
    format!("https://{host}/artifactory/metron/test-data/")
}

impl CollectorConfig {
    /// Resolve a configuration from CLI options and the process environment.
    pub fn resolve_from_env(options: RunOptions) -> ConfigResult<Self> {
        Self::resolve(options, |name| std::env::var(name).ok())
    }

    /// Resolve a configuration with an explicit environment lookup.
    pub fn resolve(
        options: RunOptions,
        env: impl Fn(&str) -> Option<String>,
    ) -> ConfigResult<Self> {
        let store_host = env(ENV_STORE_HOST).filter(|host| !host.is_empty());

        let store_url = match options.store_url {
            Some(url) => url,
            None => {
                let host = store_host.as_deref().ok_or(ConfigError::MissingEnv {
                    name: ENV_STORE_HOST,
                })?;
                default_store_url(host)
            }
        };

        // The dashboard template wants the host even when the full URL was
        // passed explicitly, so fall back to parsing it out.
        let store_host = store_host.or_else(|| {
            reqwest::Url::parse(&store_url)
                .ok()
                .and_then(|url| url.host_str().map(str::to_string))
        });

        let version_token = options
            .version_token
            .filter(|token| !token.is_empty())
            .or_else(|| env(ENV_VERSION_TOKEN).filter(|token| !token.is_empty()))
            .ok_or(ConfigError::MissingEnv {
                name: ENV_VERSION_TOKEN,
            })?;

        let upload = if options.no_upload {
            None
        } else {
            let username = env(ENV_STORE_USER).ok_or(ConfigError::MissingEnv {
                name: ENV_STORE_USER,
            })?;
            let password = env(ENV_STORE_PASSWORD).ok_or(ConfigError::MissingEnv {
                name: ENV_STORE_PASSWORD,
            })?;
            Some(Credentials { username, password })
        };

        Ok(Self {
            descriptor_file: options.descriptor_file,
            dashboard_file: options.dashboard_file,
            test_executable: options.test_executable,
            output_dir: options.output_dir,
            store_url,
            store_host,
            version_token,
            monitor_program: options.monitor_program,
            sample_interval_secs: options.sample_interval_secs,
            functional_metrics: options.functional_metrics,
            upload,
        })
    }

    /// Validate the configuration before the pipeline starts.
    ///
    /// The executable check runs here so a bad path fails the run before any
    /// process is spawned.
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.test_executable.is_file() {
            return Err(ConfigError::ExecutableNotFound {
                path: self.test_executable.display().to_string(),
            });
        }

        if !(self.sample_interval_secs > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "sample_interval_secs",
                reason: format!("must be positive, got {}", self.sample_interval_secs),
            });
        }

        if self.monitor_program.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "monitor_program",
                reason: "must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

//! Sync configuration module
//!
//! Provides the tunables of the sync core: retry policy, dead-letter
//! threshold, provisioning filter, photo bucket and probe interval.
//! Values can be built in code or loaded from a TOML file.

use crate::offline::retry::RetryPolicy;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Unknown-kind encounters before an item is moved to dead letters
pub const DEFAULT_DEAD_LETTER_AFTER: u32 = 5;

/// Storage bucket for uploaded job photos
pub const DEFAULT_PHOTO_BUCKET: &str = "job-photos";

/// Interval between reachability probes
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(30);

/// Job statuses considered "open" when provisioning a technician's device
pub const DEFAULT_OPEN_JOB_STATUSES: &[&str] = &["pending", "assigned", "in_progress"];

/// Sync configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Backoff applied to items whose remote call failed
    pub retry_policy: RetryPolicy,
    /// Unknown-kind encounters tolerated before dead-lettering
    pub dead_letter_after: u32,
    /// Statuses fetched by `download_jobs_for_offline`
    pub open_job_statuses: Vec<String>,
    /// Bucket receiving `UPLOAD_PHOTO` blobs
    pub photo_bucket: String,
    /// Reachability probe interval
    pub probe_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::default(),
            dead_letter_after: DEFAULT_DEAD_LETTER_AFTER,
            open_job_statuses: DEFAULT_OPEN_JOB_STATUSES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            photo_bucket: DEFAULT_PHOTO_BUCKET.to_string(),
            probe_interval: DEFAULT_PROBE_INTERVAL,
        }
    }
}

impl SyncConfig {
    /// Create a new SyncConfigBuilder
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dead_letter_after == 0 {
            return Err(ConfigError::InvalidValue {
                field: "dead_letter_after",
                message: "must be at least 1".to_string(),
            });
        }
        if self.open_job_statuses.is_empty() {
            return Err(ConfigError::MissingValue("open_job_statuses"));
        }
        if self.photo_bucket.trim().is_empty() {
            return Err(ConfigError::MissingValue("photo_bucket"));
        }
        if self.probe_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "probe_interval",
                message: "must be non-zero".to_string(),
            });
        }
        self.retry_policy.validate()
    }

    /// Parse a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let file: SyncConfigFile = toml::from_str(source)?;
        file.into_builder().build()
    }

    /// Load a TOML file from disk
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;
        Self::from_toml_str(&source)
    }
}

/// Builder for SyncConfig
#[derive(Debug, Default)]
pub struct SyncConfigBuilder {
    retry_policy: Option<RetryPolicy>,
    dead_letter_after: Option<u32>,
    open_job_statuses: Option<Vec<String>>,
    photo_bucket: Option<String>,
    probe_interval: Option<Duration>,
}

impl SyncConfigBuilder {
    /// Set the retry policy
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Set the dead-letter threshold for unknown mutation kinds
    pub fn dead_letter_after(mut self, hits: u32) -> Self {
        self.dead_letter_after = Some(hits);
        self
    }

    /// Set the statuses considered open during provisioning
    pub fn open_job_statuses<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.open_job_statuses = Some(statuses.into_iter().map(Into::into).collect());
        self
    }

    /// Set the photo bucket
    pub fn photo_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.photo_bucket = Some(bucket.into());
        self
    }

    /// Set the reachability probe interval
    pub fn probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = Some(interval);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<SyncConfig, ConfigError> {
        let defaults = SyncConfig::default();
        let config = SyncConfig {
            retry_policy: self.retry_policy.unwrap_or(defaults.retry_policy),
            dead_letter_after: self.dead_letter_after.unwrap_or(defaults.dead_letter_after),
            open_job_statuses: self.open_job_statuses.unwrap_or(defaults.open_job_statuses),
            photo_bucket: self.photo_bucket.unwrap_or(defaults.photo_bucket),
            probe_interval: self.probe_interval.unwrap_or(defaults.probe_interval),
        };
        config.validate()?;
        Ok(config)
    }
}

/// On-disk representation; durations are plain integers
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SyncConfigFile {
    dead_letter_after: Option<u32>,
    open_job_statuses: Option<Vec<String>>,
    photo_bucket: Option<String>,
    probe_interval_secs: Option<u64>,
    retry: Option<RetryFile>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case", deny_unknown_fields)]
enum RetryFile {
    Immediate,
    Exponential {
        base_ms: u64,
        max_delay_ms: u64,
        max_attempts: u32,
        #[serde(default)]
        jitter: f64,
    },
}

impl SyncConfigFile {
    fn into_builder(self) -> SyncConfigBuilder {
        let mut builder = SyncConfig::builder();
        if let Some(hits) = self.dead_letter_after {
            builder = builder.dead_letter_after(hits);
        }
        if let Some(statuses) = self.open_job_statuses {
            builder = builder.open_job_statuses(statuses);
        }
        if let Some(bucket) = self.photo_bucket {
            builder = builder.photo_bucket(bucket);
        }
        if let Some(secs) = self.probe_interval_secs {
            builder = builder.probe_interval(Duration::from_secs(secs));
        }
        if let Some(retry) = self.retry {
            builder = builder.retry_policy(match retry {
                RetryFile::Immediate => RetryPolicy::Immediate,
                RetryFile::Exponential {
                    base_ms,
                    max_delay_ms,
                    max_attempts,
                    jitter,
                } => RetryPolicy::Exponential {
                    base: Duration::from_millis(base_ms),
                    max_delay: Duration::from_millis(max_delay_ms),
                    max_attempts,
                    jitter,
                },
            });
        }
        builder
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Configuration for the reporter.
//!
//! [`ReporterConfig`] can be deserialized (all fields optional, durations in
//! milliseconds) or assembled with the builder-style setters:
//!
//! ```rust
//! use libdd_profiling_reporter::config::{BuildIdMode, ReporterConfig};
//! use std::time::Duration;
//!
//! let config = ReporterConfig::new("http://localhost:4318")
//!     .report_interval(Duration::from_secs(10))
//!     .build_id_mode(BuildIdMode::Hash)
//!     .upload_symbols(true);
//! assert!(config.validate().is_ok());
//! ```

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CACHE_ENTRIES: u32 = 65536;
/// Sized after the number of host metadata keys the agent can discover.
pub const DEFAULT_HOST_METADATA_ENTRIES: u32 = 115;
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_SAMPLES_PER_SECOND: u32 = 20;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_UPLOAD_RETRY_COOLDOWN: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CACHE_DIRECTORY: &str = "/var/cache/libdd-profiling-reporter";
/// The report interval is moved by up to this fraction after every tick.
pub const REPORT_INTERVAL_JITTER: f64 = 0.2;

/// Which value is sent as the build ID of native mappings.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildIdMode {
    /// The build ID embedded by the linker, as reported with the executable
    /// metadata.
    #[default]
    Linker,
    /// The FileID, a hash of the file contents.
    Hash,
}

impl FromStr for BuildIdMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linker" => Ok(Self::Linker),
            "hash" => Ok(Self::Hash),
            other => Err(ConfigError::UnknownBuildIdMode(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    /// Base URL of the OTLP/HTTP profiles receiver.
    pub collector_endpoint: String,
    /// Base URL of the debug-info service. Falls back to the collector.
    pub debuginfo_endpoint: Option<String>,
    pub cache_entries: u32,
    pub host_metadata_entries: u32,
    #[serde(with = "duration_ms")]
    pub report_interval: Duration,
    pub samples_per_second: u32,
    pub build_id_mode: BuildIdMode,
    pub upload_symbols: bool,
    /// Upload the original binary instead of extracting its debug info.
    pub keep_full_binary: bool,
    pub cache_directory: PathBuf,
    pub agent_name: String,
    pub agent_version: String,
    pub agent_revision: String,
    #[serde(with = "duration_ms")]
    pub request_timeout: Duration,
    #[serde(with = "duration_ms")]
    pub upload_retry_cooldown: Duration,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            collector_endpoint: "http://localhost:4318".to_string(),
            debuginfo_endpoint: None,
            cache_entries: DEFAULT_CACHE_ENTRIES,
            host_metadata_entries: DEFAULT_HOST_METADATA_ENTRIES,
            report_interval: DEFAULT_REPORT_INTERVAL,
            samples_per_second: DEFAULT_SAMPLES_PER_SECOND,
            build_id_mode: BuildIdMode::default(),
            upload_symbols: false,
            keep_full_binary: false,
            cache_directory: PathBuf::from(DEFAULT_CACHE_DIRECTORY),
            agent_name: env!("CARGO_PKG_NAME").to_string(),
            agent_version: env!("CARGO_PKG_VERSION").to_string(),
            agent_revision: "unknown".to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            upload_retry_cooldown: DEFAULT_UPLOAD_RETRY_COOLDOWN,
        }
    }
}

impl ReporterConfig {
    pub fn new(collector_endpoint: impl Into<String>) -> Self {
        Self {
            collector_endpoint: collector_endpoint.into(),
            ..Default::default()
        }
    }

    pub fn debuginfo_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.debuginfo_endpoint = Some(endpoint.into());
        self
    }

    pub fn cache_entries(mut self, entries: u32) -> Self {
        self.cache_entries = entries;
        self
    }

    pub fn report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    pub fn samples_per_second(mut self, samples: u32) -> Self {
        self.samples_per_second = samples;
        self
    }

    pub fn build_id_mode(mut self, mode: BuildIdMode) -> Self {
        self.build_id_mode = mode;
        self
    }

    pub fn upload_symbols(mut self, enabled: bool) -> Self {
        self.upload_symbols = enabled;
        self
    }

    pub fn keep_full_binary(mut self, enabled: bool) -> Self {
        self.keep_full_binary = enabled;
        self
    }

    pub fn cache_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.cache_directory = directory.into();
        self
    }

    pub fn agent(
        mut self,
        name: impl Into<String>,
        version: impl Into<String>,
        revision: impl Into<String>,
    ) -> Self {
        self.agent_name = name.into();
        self.agent_version = version.into();
        self.agent_revision = revision.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn upload_retry_cooldown(mut self, cooldown: Duration) -> Self {
        self.upload_retry_cooldown = cooldown;
        self
    }

    /// The debug-info service base URL.
    pub fn resolved_debuginfo_endpoint(&self) -> &str {
        self.debuginfo_endpoint
            .as_deref()
            .unwrap_or(&self.collector_endpoint)
    }

    /// Directory holding extracted debug info, below the cache root.
    pub fn symbol_cache_directory(&self) -> PathBuf {
        self.cache_directory.join("symuploader")
    }

    /// The pprof sampling period in nanoseconds.
    pub fn period_nanos(&self) -> i64 {
        1_000_000_000 / i64::from(self.samples_per_second.max(1))
    }

    /// Scope version in the `version@revision` form.
    pub fn scope_version(&self) -> String {
        format!("{}@{}", self.agent_version, self.agent_revision)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_entries == 0 {
            return Err(ConfigError::ZeroCapacity("cache_entries"));
        }
        if self.host_metadata_entries == 0 {
            return Err(ConfigError::ZeroCapacity("host_metadata_entries"));
        }
        if self.report_interval.is_zero() {
            return Err(ConfigError::ZeroReportInterval);
        }
        if self.samples_per_second == 0 {
            return Err(ConfigError::ZeroSamplingRate);
        }
        if self.collector_endpoint.is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        Ok(())
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

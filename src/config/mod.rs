//! # Configuration Management
//!
//! Configuration for the secretspin daemon. Everything is loadable from
//! `SECRETSPIN_*` environment variables with sensible defaults; pointing
//! `SECRETSPIN_CONFIG` at a YAML file loads the same surface from disk
//! (environment variables are ignored in that case, except `RUST_LOG`).
//! Durations are expressed in milliseconds, matching the knobs the rotation
//! pipeline is tuned with in practice.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cluster::docker::DockerConfig;
use crate::detector::WatcherConfig;
use crate::errors::{Error, Result};
use crate::rotation::RotationConfig;

fn default_update_interval_ms() -> u64 {
    60_000
}
fn default_detection_interval_ms() -> u64 {
    5_000
}
fn default_secret_wait_ms() -> u64 {
    5_000
}
fn default_service_wait_ms() -> u64 {
    10_000
}
fn default_max_versions() -> u64 {
    10
}
fn default_watch_events() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

/// Docker Engine API settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DockerSettings {
    #[serde(default = "DockerSettings::default_endpoint")]
    pub endpoint: String,
    #[serde(default = "DockerSettings::default_timeout_ms")]
    pub timeout_ms: u64,
}

impl DockerSettings {
    fn default_endpoint() -> String {
        "http://localhost:2375".to_string()
    }
    fn default_timeout_ms() -> u64 {
        30_000
    }
}

impl Default for DockerSettings {
    fn default() -> Self {
        Self { endpoint: Self::default_endpoint(), timeout_ms: Self::default_timeout_ms() }
    }
}

/// Main daemon configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Watched directory per namespace
    pub namespaces: BTreeMap<String, PathBuf>,

    /// Dwell time from first detection before a batch is rotated (ms)
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,

    /// Detector poll / orchestrator tick period (ms)
    #[serde(default = "default_detection_interval_ms")]
    pub update_detection_interval_ms: u64,

    /// Convergence delay after secret creation (ms)
    #[serde(default = "default_secret_wait_ms")]
    pub secret_wait_time_ms: u64,

    /// Convergence delay after service patching (ms)
    #[serde(default = "default_service_wait_ms")]
    pub service_wait_time_ms: u64,

    /// Version suffix ceiling
    #[serde(default = "default_max_versions")]
    pub max_versions: u64,

    /// Layer OS file-event detection on top of polling
    #[serde(default = "default_watch_events")]
    pub watch_events: bool,

    #[serde(default)]
    pub docker: DockerSettings,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// `text` or `json`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Config {
    /// Load configuration: from the YAML file named by `SECRETSPIN_CONFIG`
    /// when set, from environment variables otherwise.
    pub fn load() -> Result<Self> {
        let config = match std::env::var("SECRETSPIN_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        serde_yaml::from_str(&raw)
            .map_err(|e| Error::config(format!("Invalid config file {}: {}", path.display(), e)))
    }

    /// Create configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            namespaces: parse_namespaces(
                &std::env::var("SECRETSPIN_NAMESPACES").unwrap_or_default(),
            )?,
            update_interval_ms: env_u64("SECRETSPIN_UPDATE_INTERVAL_MS", default_update_interval_ms())?,
            update_detection_interval_ms: env_u64(
                "SECRETSPIN_UPDATE_DETECTION_INTERVAL_MS",
                default_detection_interval_ms(),
            )?,
            secret_wait_time_ms: env_u64("SECRETSPIN_SECRET_WAIT_TIME_MS", default_secret_wait_ms())?,
            service_wait_time_ms: env_u64(
                "SECRETSPIN_SERVICE_WAIT_TIME_MS",
                default_service_wait_ms(),
            )?,
            max_versions: env_u64("SECRETSPIN_MAX_VERSIONS", default_max_versions())?,
            watch_events: env_bool("SECRETSPIN_WATCH_EVENTS", default_watch_events())?,
            docker: DockerSettings {
                endpoint: std::env::var("SECRETSPIN_DOCKER_ENDPOINT")
                    .unwrap_or_else(|_| DockerSettings::default_endpoint()),
                timeout_ms: env_u64(
                    "SECRETSPIN_DOCKER_TIMEOUT_MS",
                    DockerSettings::default_timeout_ms(),
                )?,
            },
            log_level: std::env::var("SECRETSPIN_LOG_LEVEL")
                .unwrap_or_else(|_| default_log_level()),
            log_format: std::env::var("SECRETSPIN_LOG_FORMAT")
                .unwrap_or_else(|_| default_log_format()),
        })
    }

    /// Validate the configuration; startup fails on the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.namespaces.is_empty() {
            return Err(Error::config(
                "At least one namespace must be configured (SECRETSPIN_NAMESPACES=ns=/path,...)",
            ));
        }
        if self.max_versions < 2 {
            return Err(Error::config("max_versions must be at least 2"));
        }
        for (name, value) in [
            ("update_interval_ms", self.update_interval_ms),
            ("update_detection_interval_ms", self.update_detection_interval_ms),
        ] {
            if value == 0 {
                return Err(Error::config(format!("{} must be positive", name)));
            }
        }
        if self.log_format != "text" && self.log_format != "json" {
            return Err(Error::config("log_format must be 'text' or 'json'"));
        }
        Ok(())
    }

    pub fn rotation_config(&self) -> RotationConfig {
        RotationConfig {
            update_interval: Duration::from_millis(self.update_interval_ms),
            update_detection_interval: Duration::from_millis(self.update_detection_interval_ms),
            secret_wait_time: Duration::from_millis(self.secret_wait_time_ms),
            service_wait_time: Duration::from_millis(self.service_wait_time_ms),
            max_versions: self.max_versions,
        }
    }

    pub fn watcher_config(&self) -> WatcherConfig {
        WatcherConfig {
            poll_interval: Duration::from_millis(self.update_detection_interval_ms),
            watch_events: self.watch_events,
        }
    }

    pub fn docker_config(&self) -> DockerConfig {
        DockerConfig {
            endpoint: self.docker.endpoint.clone(),
            timeout: Duration::from_millis(self.docker.timeout_ms),
        }
    }
}

fn env_u64(key: &str, default: u64) -> Result<u64> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|e| Error::config(format!("Invalid {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}

fn env_bool(key: &str, default: bool) -> Result<bool> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|e| Error::config(format!("Invalid {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}

/// Parse the `ns1=/path/a,ns2=/path/b` namespace list form.
fn parse_namespaces(raw: &str) -> Result<BTreeMap<String, PathBuf>> {
    let mut namespaces = BTreeMap::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (namespace, path) = entry.split_once('=').ok_or_else(|| {
            Error::config(format!("Invalid namespace entry '{}', expected ns=/path", entry))
        })?;
        namespaces.insert(namespace.trim().to_string(), PathBuf::from(path.trim()));
    }
    Ok(namespaces)
}

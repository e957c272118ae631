//! Pivot configuration stored in `/etc/pivot/pivot.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::tuning::KargMatch;
use crate::io::retry::RetryPolicy;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/pivot/pivot.toml";

/// Pivot configuration (TOML).
///
/// Every field is optional in the file; the defaults match the well-known
/// locations used by the machine-config tooling that drives pivot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PivotConfig {
    pub paths: PathsConfig,
    pub network: NetworkConfig,
    pub kargs: KargsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    /// Holds the image pullspec used when none is given on the command line.
    pub spool_file: PathBuf,
    /// If this file exists and the host changed, pivot reboots.
    pub reboot_marker: PathBuf,
    /// Registry pull secret. Written by the machine-config-operator.
    pub auth_file: PathBuf,
    /// Kernel argument directives.
    pub tuning_file: PathBuf,
    /// Live kernel command line.
    pub cmdline_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            spool_file: PathBuf::from("/etc/pivot/image-pullspec"),
            reboot_marker: PathBuf::from("/run/pivot/reboot-needed"),
            auth_file: PathBuf::from("/var/lib/kubelet/config.json"),
            tuning_file: PathBuf::from("/etc/pivot/kernel-args"),
            cmdline_file: PathBuf::from("/proc/cmdline"),
        }
    }
}

/// Retry behaviour for commands that pull data from the network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
    pub backoff_factor: f64,
    /// Per-attempt limit in seconds. `0` disables the limit.
    pub timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_delay_secs: 10,
            backoff_factor: 1.2,
            timeout_secs: 0,
        }
    }
}

impl NetworkConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_secs(self.retry_delay_secs),
            self.backoff_factor,
        )
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct KargsConfig {
    /// How tuning directives are matched against the live command line.
    #[serde(rename = "match")]
    pub match_mode: KargMatch,
}

impl PivotConfig {
    pub fn validate(&self) -> Result<()> {
        if self.network.max_attempts == 0 {
            return Err(anyhow!("network.max_attempts must be > 0"));
        }
        if !self.network.backoff_factor.is_finite() || self.network.backoff_factor < 1.0 {
            return Err(anyhow!("network.backoff_factor must be a finite number >= 1.0"));
        }
        let paths = [
            ("paths.spool_file", &self.paths.spool_file),
            ("paths.reboot_marker", &self.paths.reboot_marker),
            ("paths.auth_file", &self.paths.auth_file),
            ("paths.tuning_file", &self.paths.tuning_file),
            ("paths.cmdline_file", &self.paths.cmdline_file),
        ];
        for (name, path) in paths {
            if path.as_os_str().is_empty() {
                return Err(anyhow!("{name} must not be empty"));
            }
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PivotConfig::default()`.
pub fn load_config(path: &Path) -> Result<PivotConfig> {
    if !path.exists() {
        let cfg = PivotConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PivotConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

//! Application configuration.
//!
//! One JSON file holding the device list, the named presets, and the
//! connection tunables. Unknown fields are preserved-by-ignore so older
//! builds can read configs written by newer ones.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use lgctl_ssap::TvClientOptions;

use crate::error::{Error, Result};
use crate::preset::Preset;

fn default_power_on_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_request_timeout_secs() -> u64 {
    15
}

/// One TV on the network.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    pub name: String,
    pub ip: String,
    /// MAC address for Wake-on-LAN; without it a powered-off TV cannot be
    /// woken before applying a preset.
    #[serde(default)]
    pub mac: Option<String>,
}

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,

    #[serde(default)]
    pub presets: Vec<Preset>,

    /// Attempts for the whole connect+handshake sequence after a wake.
    #[serde(default = "default_power_on_retries")]
    pub power_on_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Config {
    /// Load from `path`; a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the file exists but cannot be read and
    /// [`Error::Config`] when it cannot be parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("no config at {}, using defaults", path.display());
            return Ok(Self::with_defaults());
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "{} (at line {}, column {})",
                e,
                e.line(),
                e.column()
            ))
        })
    }

    /// Save to `path`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default config file location.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when no home directory can be determined.
    pub fn default_path() -> Result<PathBuf> {
        directories::ProjectDirs::from("", "", "lgctl")
            .map(|dirs| dirs.config_dir().join("config.json"))
            .ok_or_else(|| Error::Config("no home directory".to_string()))
    }

    /// The defaults serde would apply when parsing `{}`; `Default` alone
    /// would zero the numeric fields.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            devices: Vec::new(),
            presets: Vec::new(),
            power_on_retries: default_power_on_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    /// Project the connection tunables into client options.
    #[must_use]
    pub fn client_options(&self) -> TvClientOptions {
        TvClientOptions {
            connect_attempts: self.power_on_retries.max(1),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..TvClientOptions::default()
        }
    }

    /// Look up a preset by name, case-insensitively.
    #[must_use]
    pub fn preset(&self, name: &str) -> Option<&Preset> {
        self.presets
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Resolve a device reference: a configured device name, a configured
    /// IP, or (as a convenience) a bare IP that is not in the list.
    #[must_use]
    pub fn device(&self, reference: &str) -> Option<DeviceConfig> {
        self.devices
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(reference) || d.ip == reference)
            .cloned()
            .or_else(|| {
                reference.parse::<std::net::IpAddr>().ok().map(|_| DeviceConfig {
                    name: reference.to_string(),
                    ip: reference.to_string(),
                    mac: None,
                })
            })
    }
}

//! Per-device persistence of the pairing client key.
//!
//! Each TV gets one JSON file under the data directory holding the client
//! key the TV handed out at pairing time and a fingerprint of the
//! registration template the key was obtained under. The fingerprint guards
//! against silently reusing a key after the permission manifest changed:
//! the TV would accept the key but the client would be missing permissions.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Error, Result};

/// Stored pairing state for one device.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyRecord {
    #[serde(default)]
    client_key: Option<String>,
    /// SHA-256 hex digest of the registration template at pairing time.
    #[serde(default)]
    handshake_digest: Option<String>,
}

/// File-backed store for one device's client key.
pub struct KeyStore {
    path: PathBuf,
    record: KeyRecord,
}

impl KeyStore {
    /// Open the store for `device_ip` under the default data directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] when the file exists but cannot be read,
    /// and [`Error::Json`] when it cannot be parsed. A missing file is not
    /// an error; it just means the device was never paired.
    pub fn for_device(device_ip: &str) -> Result<Self> {
        Self::open_in(&default_data_dir()?, device_ip)
    }

    /// Open the store for `device_ip` under an explicit directory.
    ///
    /// # Errors
    ///
    /// Same as [`KeyStore::for_device`].
    pub fn open_in(dir: &Path, device_ip: &str) -> Result<Self> {
        let path = dir.join("keys").join(format!("{device_ip}.json"));
        let record = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            debug!("no stored pairing for {device_ip}");
            KeyRecord::default()
        };
        Ok(Self { path, record })
    }

    /// The stored client key, if one exists and is not degenerate. TVs have
    /// been seen handing out all-NUL keys; those are treated as absent.
    #[must_use]
    pub fn client_key(&self) -> Option<&str> {
        self.record
            .client_key
            .as_deref()
            .filter(|key| !key.is_empty() && !key.chars().all(|c| c == '\0'))
    }

    /// True only when a handshake was stored and its fingerprint matches
    /// `template` exactly.
    #[must_use]
    pub fn has_valid_handshake(&self, template: &str) -> bool {
        self.record.handshake_digest.as_deref() == Some(fingerprint(template).as_str())
    }

    /// Persist a (possibly refreshed) client key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the write fails; the caller must not
    /// treat the pairing as successful in that case.
    pub fn save_client_key(&mut self, key: &str) -> Result<()> {
        self.record.client_key = Some(key.to_string());
        self.persist()
    }

    /// Persist the fingerprint of the template the current key was paired
    /// under.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the write fails.
    pub fn save_handshake(&mut self, template: &str) -> Result<()> {
        self.record.handshake_digest = Some(fingerprint(template));
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.record)?;
        fs::write(&self.path, content)?;
        debug!("saved pairing state to {}", self.path.display());
        Ok(())
    }
}

/// SHA-256 hex digest of a registration template.
#[must_use]
pub fn fingerprint(template: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(template.as_bytes());
    hex::encode(hasher.finalize())
}

pub(crate) fn default_data_dir() -> Result<PathBuf> {
    directories::ProjectDirs::from("", "", "lgctl")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| {
            Error::Storage(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no home directory for data storage",
            ))
        })
}

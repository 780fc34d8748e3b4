use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Preset not found: {0}")]
    PresetNotFound(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Invalid preset step: {0}")]
    InvalidStep(String),

    #[error("Invalid MAC address: {0}")]
    InvalidMac(String),

    #[error(transparent)]
    Tv(#[from] lgctl_ssap::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

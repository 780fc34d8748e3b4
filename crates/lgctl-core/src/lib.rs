//! Preset engine and configuration for lgctl.
//!
//! Sits on top of [`lgctl_ssap`]: holds the device list and named presets,
//! resolves preset steps to TV commands by name, and applies them
//! best-effort. One failing step is logged and the rest still run, because
//! a TV mid-wake answers some services before others.

pub mod config;
pub mod engine;
pub mod preset;
pub mod wol;

mod error;

pub use config::{Config, DeviceConfig};
pub use engine::{ApplySummary, ExternalServiceHandler, PresetEngine};
pub use error::{Error, Result};
pub use preset::{Preset, Step};

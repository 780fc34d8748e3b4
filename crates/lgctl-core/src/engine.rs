//! The preset engine.
//!
//! Resolves step strings to TV commands by name and applies them
//! best-effort: a failing step is logged and counted, never a reason to
//! abandon the rest of the preset. Steps the engine does not recognize are
//! offered to an optional external-service handler first (the hook the
//! surrounding application uses to chain GPU presets into TV presets), and
//! `key(value)` steps fall through to the picture settings service.
//!
//! Engines are plain values: construct one per configuration, drop it when
//! done. Nothing here is process-global.

use tracing::{debug, warn};

use lgctl_ssap::TvClient;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::preset::{Preset, Step};
use crate::wol;

/// Hook for steps addressed to services outside the TV (GPU presets and the
/// like). Return `true` when the call was recognized and handled.
pub trait ExternalServiceHandler: Send + Sync {
    fn handle(&self, service: &str, args: &[String]) -> bool;
}

/// Outcome of applying a preset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub applied: usize,
    pub failed: usize,
}

impl ApplySummary {
    #[must_use]
    pub fn all_applied(&self) -> bool {
        self.failed == 0
    }
}

/// Applies named presets from a [`Config`].
pub struct PresetEngine {
    config: Config,
    external: Option<Box<dyn ExternalServiceHandler>>,
}

impl PresetEngine {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            external: None,
        }
    }

    /// Attach a handler for steps addressed to non-TV services.
    #[must_use]
    pub fn with_external_handler(mut self, handler: Box<dyn ExternalServiceHandler>) -> Self {
        self.external = Some(handler);
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Apply a named preset: wake the device if a MAC is configured,
    /// connect with the configured retry bounds, run every step, close.
    ///
    /// # Errors
    ///
    /// Errors only when the preset cannot run at all: unknown preset or
    /// device, or the TV unreachable/unpaired after all attempts. Failing
    /// steps are reported in the summary instead.
    pub async fn apply(&self, preset_name: &str) -> Result<ApplySummary> {
        let preset = self
            .config
            .preset(preset_name)
            .ok_or_else(|| Error::PresetNotFound(preset_name.to_string()))?
            .clone();
        let device = self
            .config
            .device(&preset.device)
            .ok_or_else(|| Error::DeviceNotFound(preset.device.clone()))?;

        if let Some(mac) = &device.mac
            && let Err(e) = wol::wake(mac).await
        {
            // Best effort: the TV may already be awake.
            warn!("wake-on-lan for {} failed: {e}", device.name);
        }

        let tv = TvClient::connect_with(&device.ip, self.config.client_options()).await?;
        let summary = self.apply_to_client(&tv, &preset).await;
        tv.close().await;
        Ok(summary)
    }

    /// Run every step of `preset` against an already-connected client.
    pub async fn apply_to_client(&self, tv: &TvClient, preset: &Preset) -> ApplySummary {
        let mut summary = ApplySummary::default();
        for raw in &preset.steps {
            match self.apply_step(tv, raw).await {
                Ok(()) => {
                    debug!("step '{raw}' applied");
                    summary.applied += 1;
                }
                Err(e) => {
                    warn!("step '{raw}' failed: {e}");
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    async fn apply_step(&self, tv: &TvClient, raw: &str) -> Result<()> {
        let step = Step::parse(raw)?;
        match step.name.to_ascii_lowercase().as_str() {
            "volume" => tv.set_volume(step.int_arg(0)?).await?,
            "mute" => tv.set_mute(step.bool_arg(0)?).await?,
            "input" => tv.set_input(step.str_arg(0)?).await?,
            "channel" => tv.set_channel(step.str_arg(0)?).await?,
            "app" => {
                tv.launch_app(step.str_arg(0)?).await?;
            }
            "toast" => tv.show_toast(step.str_arg(0)?).await?,
            "screenon" => tv.screen_on().await?,
            "screenoff" => tv.screen_off().await?,
            "turnoff" => tv.turn_off().await?,
            "3d" => tv.set_3d(step.bool_arg(0)?).await?,
            // Bare input names are a common shorthand in hand-written
            // presets.
            name if name.starts_with("hdmi_") && step.args.is_empty() => {
                tv.set_input(&step.name).await?;
            }
            _ => {
                if let Some(handler) = &self.external
                    && handler.handle(&step.name, &step.args)
                {
                    return Ok(());
                }
                if step.args.is_empty() {
                    return Err(Error::InvalidStep(raw.to_string()));
                }
                // Anything of the form key(value) left over is a picture
                // setting (`backlight(80)`, `pictureMode(game)`, ...).
                tv.set_system_setting(&step.name, step.json_arg(0)?, "picture")
                    .await?;
            }
        }
        Ok(())
    }
}

//! lgctl command line interface.
//!
//! Thin wrapper over the preset engine and the TV client: pair with a TV,
//! apply named presets, and issue individual commands.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use lgctl_core::{Config, PresetEngine, wol};
use lgctl_ssap::TvClient;

/// Control LG webOS TVs: pairing, presets, and one-off commands
#[derive(Parser, Debug)]
#[command(name = "lgctl")]
#[command(version, about, long_about = None)]
struct Args {
    /// Custom config file (defaults to the user config directory)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pair with a TV; first pairing shows a prompt on the TV screen
    Pair {
        /// Device name from the config, or an IP address
        device: String,
    },
    /// Apply a named preset (wakes the TV first when a MAC is configured)
    Apply {
        /// Preset name
        preset: String,
    },
    /// List configured devices and presets
    List,
    /// Get or set the volume
    Volume {
        device: String,
        /// New volume (0-100); prints the current volume when omitted
        value: Option<i32>,
    },
    /// Toggle mute
    Mute { device: String },
    /// Turn the TV off
    Off { device: String },
    /// Turn just the panel on or off, leaving webOS running
    Screen {
        device: String,
        state: OnOff,
    },
    /// List external inputs, or switch to one
    Input {
        device: String,
        /// Input id such as HDMI_1; lists inputs when omitted
        id: Option<String>,
    },
    /// List installed apps
    Apps {
        device: String,
        /// Bypass the on-disk cache
        #[arg(long)]
        refresh: bool,
    },
    /// Launch an app by id
    App { device: String, id: String },
    /// Show a toast notification on the TV
    Toast { device: String, message: String },
    /// Write one system setting, e.g. `set tv backlight 80`
    Set {
        device: String,
        key: String,
        value: String,
        #[arg(long, default_value = "picture")]
        category: String,
    },
    /// Print the current power state
    State { device: String },
    /// Send a Wake-on-LAN packet to a configured device
    Wake { device: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OnOff {
    On,
    Off,
}

/// Set up logging. In debug builds, logs to a timestamped file in the temp
/// directory; in release builds, to stderr.
fn setup_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let default_level = if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lgctl={default_level}")));

    if cfg!(debug_assertions) {
        let temp_dir = std::env::temp_dir();
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let log_filename = format!("lgctl-{timestamp}.log");

        let file_appender = tracing_appender::rolling::never(&temp_dir, &log_filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
            .init();
        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
        None
    }
}

async fn client_for(config: &Config, reference: &str) -> Result<TvClient> {
    let device = config
        .device(reference)
        .with_context(|| format!("unknown device '{reference}' (not configured, not an IP)"))?;
    debug!("connecting to {} ({})", device.name, device.ip);
    TvClient::connect_with(&device.ip, config.client_options())
        .await
        .with_context(|| format!("could not reach the TV at {}", device.ip))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _guard = setup_logging();

    let config_path = match args.config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let config = Config::load(&config_path)?;

    match args.command {
        Command::Pair { device } => {
            let tv = client_for(&config, &device).await?;
            println!("paired with {}", tv.ip());
            tv.close().await;
        }
        Command::Apply { preset } => {
            let engine = PresetEngine::new(config);
            let summary = engine.apply(&preset).await?;
            if summary.all_applied() {
                println!("applied '{preset}' ({} steps)", summary.applied);
            } else {
                println!(
                    "applied '{preset}' with failures: {} ok, {} failed (see log)",
                    summary.applied, summary.failed
                );
            }
        }
        Command::List => {
            println!("devices:");
            for device in &config.devices {
                match &device.mac {
                    Some(mac) => println!("  {} ({}, {mac})", device.name, device.ip),
                    None => println!("  {} ({})", device.name, device.ip),
                }
            }
            println!("presets:");
            for preset in &config.presets {
                println!(
                    "  {} -> {} ({} steps)",
                    preset.name,
                    preset.device,
                    preset.steps.len()
                );
            }
        }
        Command::Volume { device, value } => {
            let tv = client_for(&config, &device).await?;
            match value {
                Some(volume) => tv.set_volume(volume).await?,
                None => {
                    let volume = tv.get_volume().await?;
                    if volume < 0 {
                        println!("muted");
                    } else {
                        println!("{volume}");
                    }
                }
            }
            tv.close().await;
        }
        Command::Mute { device } => {
            let tv = client_for(&config, &device).await?;
            tv.toggle_mute().await?;
            tv.close().await;
        }
        Command::Off { device } => {
            let tv = client_for(&config, &device).await?;
            tv.turn_off().await?;
            tv.close().await;
        }
        Command::Screen { device, state } => {
            let tv = client_for(&config, &device).await?;
            match state {
                OnOff::On => tv.screen_on().await?,
                OnOff::Off => tv.screen_off().await?,
            }
            tv.close().await;
        }
        Command::Input { device, id } => {
            let tv = client_for(&config, &device).await?;
            match id {
                Some(id) => tv.set_input(&id).await?,
                None => {
                    for input in tv.inputs().await? {
                        println!("{}  {}", input.id, input.label);
                    }
                }
            }
            tv.close().await;
        }
        Command::Apps { device, refresh } => {
            let tv = client_for(&config, &device).await?;
            for app in tv.apps(refresh).await? {
                println!("{}  {}", app.id, app.title);
            }
            tv.close().await;
        }
        Command::App { device, id } => {
            let tv = client_for(&config, &device).await?;
            tv.launch_app(&id).await?;
            tv.close().await;
        }
        Command::Toast { device, message } => {
            let tv = client_for(&config, &device).await?;
            tv.show_toast(&message).await?;
            tv.close().await;
        }
        Command::Set {
            device,
            key,
            value,
            category,
        } => {
            let tv = client_for(&config, &device).await?;
            // Numbers and booleans must go over the wire typed; everything
            // else is a string value like a picture mode name.
            let value = match value.parse::<i64>() {
                Ok(n) => serde_json::Value::from(n),
                Err(_) => match value.as_str() {
                    "true" => serde_json::Value::Bool(true),
                    "false" => serde_json::Value::Bool(false),
                    _ => serde_json::Value::from(value),
                },
            };
            tv.set_system_setting(&key, value, &category).await?;
            tv.close().await;
        }
        Command::State { device } => {
            let tv = client_for(&config, &device).await?;
            let state = tv.power_state().await?;
            println!("{}", state.state.as_deref().unwrap_or("unknown"));
            tv.close().await;
        }
        Command::Wake { device } => {
            let device = config
                .device(&device)
                .with_context(|| format!("unknown device '{device}'"))?;
            let Some(mac) = &device.mac else {
                bail!("device '{}' has no MAC address configured", device.name);
            };
            wol::wake(mac).await?;
            println!("wake packet sent to {mac}");
        }
    }

    Ok(())
}

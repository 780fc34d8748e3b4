//! Async SSAP client for LG webOS TVs.
//!
//! This crate implements the WebSocket control link that webOS TVs expose on
//! port 3000: the one-time pairing handshake that yields a reusable client
//! key, request/response correlation over a single multiplexed socket, and
//! long-lived subscriptions (volume, power state, picture settings).
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`protocol`]: SSAP wire frame types and the registration manifest
//! - [`link`]: the transport link: one WebSocket connection, a background
//!   receive task, and the pending-request/subscription table
//! - [`keystore`]: per-device persistence of the pairing client key
//! - [`handshake`]: the pairing state machine (fast path / full pairing)
//! - [`responses`]: typed response payloads per webOS service namespace
//! - [`api`]: [`TvClient`], one async method per TV capability
//! - [`pointer`]: the pointer/mouse input socket (a separate sub-link)
//! - [`error`]: the shared error type
//!
//! # Example
//!
//! ```no_run
//! use lgctl_ssap::TvClient;
//!
//! # async fn example() -> lgctl_ssap::Result<()> {
//! // Connects, pairs (the TV shows a prompt on first use) and returns a
//! // ready client. Retries a few times because a TV that was just woken
//! // up may not accept connections immediately.
//! let tv = TvClient::connect("192.168.1.31").await?;
//!
//! let volume = tv.get_volume().await?;
//! println!("volume: {volume}");
//!
//! tv.set_system_setting("backlight", 80.into(), "picture").await?;
//! tv.close().await;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod error;
pub mod handshake;
pub mod keystore;
pub mod link;
pub mod pointer;
pub mod protocol;
pub mod responses;

#[cfg(test)]
mod tests;

pub use api::{TvClient, TvClientOptions, TypedSubscription};
pub use error::{Error, Result};
pub use keystore::KeyStore;
pub use link::{Link, Subscription};
pub use pointer::{PointerButton, PointerLink};
pub use protocol::{CONTROL_PORT, RequestId};
pub use responses::{
    AppEntry, ChannelInfo, ExternalInput, LaunchPoint, PowerState, SystemSettings, VolumeStatus,
};

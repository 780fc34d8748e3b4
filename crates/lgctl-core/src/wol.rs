//! Wake-on-LAN.
//!
//! TVs with "LG Connect Apps" enabled listen for magic packets while in
//! standby. The engine fires one before the connect retry loop; the TV's
//! socket server takes a few seconds to come up afterwards, which is what
//! the bounded retries are for.

use tokio::net::UdpSocket;
use tracing::debug;

use crate::error::{Error, Result};

const WOL_PORT: u16 = 9;

/// Parse a MAC address with `:` or `-` separators.
///
/// # Errors
///
/// Returns [`Error::InvalidMac`] for anything that is not six hex octets.
pub fn parse_mac(mac: &str) -> Result<[u8; 6]> {
    let octets: Vec<&str> = mac.split([':', '-']).collect();
    if octets.len() != 6 {
        return Err(Error::InvalidMac(mac.to_string()));
    }
    let mut out = [0u8; 6];
    for (slot, octet) in out.iter_mut().zip(octets) {
        *slot = u8::from_str_radix(octet, 16).map_err(|_| Error::InvalidMac(mac.to_string()))?;
    }
    Ok(out)
}

/// Six `0xFF` bytes followed by the MAC sixteen times.
#[must_use]
pub fn magic_packet(mac: [u8; 6]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(6 + 16 * 6);
    packet.extend_from_slice(&[0xFF; 6]);
    for _ in 0..16 {
        packet.extend_from_slice(&mac);
    }
    packet
}

/// Broadcast a magic packet for `mac`.
///
/// # Errors
///
/// Returns [`Error::InvalidMac`] for a malformed address or [`Error::Io`]
/// when the broadcast send fails.
pub async fn wake(mac: &str) -> Result<()> {
    let packet = magic_packet(parse_mac(mac)?);
    let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
    socket.set_broadcast(true)?;
    socket
        .send_to(&packet, ("255.255.255.255", WOL_PORT))
        .await?;
    debug!("sent wake-on-lan packet for {mac}");
    Ok(())
}

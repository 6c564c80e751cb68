//! Packetized transport abstraction for hiding underlying device I/O
//!
//! A [`Transport`] moves fixed 64-byte packets to and from one opened
//! device. Framing, sequencing and message semantics live above this
//! seam in [`crate::framing`] and [`crate::DeviceHandle`].

use async_trait::async_trait;

use crate::Error;

#[cfg(feature = "transport_hid")]
mod hid;
#[cfg(feature = "transport_hid")]
pub use hid::{HidDiscover, HidTransport};

pub mod mock;

/// Fixed packet size exchanged with the device
pub const PACKET_SIZE: usize = 64;

/// Fixed-size packet transport to one opened device
///
/// Reads block until the device produces a packet; wall-clock timeout
/// policy belongs to the caller (eg. [`tokio::time::timeout`]) or is
/// realized by dropping the transport.
#[async_trait]
pub trait Transport {
    /// Write one full packet to the device
    async fn write_packet(&mut self, packet: &[u8; PACKET_SIZE]) -> Result<(), Error>;

    /// Read the next packet from the device, up to [`PACKET_SIZE`] bytes
    async fn read_packet(&mut self) -> Result<Vec<u8>, Error>;
}

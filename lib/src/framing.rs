//! Frame codec, mapping logical messages onto fixed-size packets
//!
//! A logical message is a (kind, payload) pair. On the wire it becomes a
//! header of two `##` magic bytes, a big-endian u16 kind and a big-endian
//! u32 payload length, followed by the payload, the whole split into
//! 63-byte chunks each prefixed with a `?` marker byte to fill one
//! 64-byte packet.
//!
//! Reassembly discards packets with a bad leading marker (or, for the
//! first packet, a bad magic) and resynchronizes on the next read, up to
//! [`MAX_INVALID_CHUNKS`] consecutive discards. This bounds how long a
//! desynchronized stream can stall a read while tolerating transport
//! noise; it is not a wall-clock timeout.

use log::trace;

use crate::{
    transport::{Transport, PACKET_SIZE},
    Error,
};

/// Leading marker byte of every packet
pub const PACKET_MARKER: u8 = b'?';

/// Frame header magic byte, doubled at the start of the logical header
pub const FRAME_MAGIC: u8 = b'#';

/// Logical header length (magic x2, kind u16, length u32)
pub const HEADER_LEN: usize = 8;

/// Packet body capacity after the marker byte
pub const PACKET_BODY: usize = PACKET_SIZE - 1;

/// Consecutive invalid packets tolerated before a read fails
pub const MAX_INVALID_CHUNKS: usize = 6;

/// Build the packet sequence for one logical message
///
/// Emits exactly `ceil((payload_len + 8) / 63)` packets, the final one
/// zero-padded to packet size.
pub fn encode_packets(kind: u16, payload: &[u8]) -> Vec<[u8; PACKET_SIZE]> {
    let mut data = Vec::with_capacity(HEADER_LEN + payload.len());
    data.extend_from_slice(&[FRAME_MAGIC, FRAME_MAGIC]);
    data.extend_from_slice(&kind.to_be_bytes());
    data.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    data.extend_from_slice(payload);

    let mut packets = Vec::with_capacity((data.len() + PACKET_BODY - 1) / PACKET_BODY);
    for chunk in data.chunks(PACKET_BODY) {
        let mut p = [0u8; PACKET_SIZE];
        p[0] = PACKET_MARKER;
        p[1..][..chunk.len()].copy_from_slice(chunk);
        packets.push(p);
    }

    packets
}

/// Send one logical message over the provided transport
///
/// Every packet write must succeed; a failed write aborts the send with
/// no partial-message recovery.
pub(crate) async fn send<T: Transport + Send + ?Sized>(
    t: &mut T,
    kind: u16,
    payload: &[u8],
) -> Result<(), Error> {
    trace!("send kind {:#06x} payload {}", kind, hex::encode(payload));

    for p in encode_packets(kind, payload) {
        t.write_packet(&p).await?;
    }

    Ok(())
}

/// Receive one logical message from the provided transport
///
/// Blocks until a full frame has been reassembled, discarding invalid
/// packets up to the [`MAX_INVALID_CHUNKS`] ceiling (applied
/// independently to the leading packet and to continuations). The
/// returned payload is truncated to exactly the declared length.
pub(crate) async fn receive<T: Transport + Send + ?Sized>(t: &mut T) -> Result<(u16, Vec<u8>), Error> {
    // Leading packet must carry the marker and both magic bytes
    let mut invalid = 0;
    let (kind, msg_len, mut data) = loop {
        let b = t.read_packet().await?;

        if b.len() < HEADER_LEN + 1
            || b[0] != PACKET_MARKER
            || b[1] != FRAME_MAGIC
            || b[2] != FRAME_MAGIC
        {
            invalid += 1;
            if invalid > MAX_INVALID_CHUNKS {
                return Err(Error::Framing);
            }
            continue;
        }

        let kind = u16::from_be_bytes([b[3], b[4]]);
        let len = u32::from_be_bytes([b[5], b[6], b[7], b[8]]) as usize;

        break (kind, len, b[HEADER_LEN + 1..].to_vec());
    };

    // Continuation packets need only the marker
    let mut invalid = 0;
    while data.len() < msg_len {
        let b = t.read_packet().await?;

        if b.is_empty() || b[0] != PACKET_MARKER {
            invalid += 1;
            if invalid > MAX_INVALID_CHUNKS {
                return Err(Error::Framing);
            }
            continue;
        }

        data.extend_from_slice(&b[1..]);
    }

    // Packet bodies over-allocate to packet granularity
    data.truncate(msg_len);

    trace!("received kind {:#06x} payload {}", kind, hex::encode(&data));

    Ok((kind, data))
}

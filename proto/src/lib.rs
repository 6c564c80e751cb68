//! Protocol / message definitions for KeepKey device communication
//!
//! This crate provides the message contract catalog used by the host
//! library: a 16-bit [`MessageKind`] identifier per message, and
//! request / response structures with [`encdec`] encodings.
//!
//! Messages use a primitive binary encoding to simplify implementation on
//! constrained platforms and in other languages. Multi-byte fields are
//! little-endian; strings are length-prefixed. The message *kind* travels
//! outside the payload, in the big-endian frame header written by the
//! host library's framing layer.

#![no_std]

use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum::Display;

pub mod button;
pub mod features;
pub mod pin;
pub mod ping;
pub mod prelude;
pub mod public_key;
pub mod result;

mod helpers;

/// Default ECDSA curve name for key export requests
pub const SECP256K1: &str = "secp256k1";

/// Message kind identifiers
///
/// Values match the wire identifiers used by the device protocol,
/// transmitted big-endian in the frame header.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, TryFromPrimitive, IntoPrimitive)]
#[repr(u16)]
pub enum MessageKind {
    Initialize = 0,
    Ping = 1,
    Success = 2,
    Failure = 3,
    GetPublicKey = 11,
    PublicKey = 12,
    Features = 17,
    PinMatrixRequest = 18,
    PinMatrixAck = 19,
    ButtonRequest = 26,
    ButtonAck = 27,
}

/// Static message kind binding for request / response objects
pub trait MessageStatic {
    /// Wire identifier for this message type
    const KIND: MessageKind;

    /// Fetch the wire identifier (object-safe helper)
    fn kind(&self) -> MessageKind {
        Self::KIND
    }
}

/// Message encode / decode error type
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProtoError {
    /// Buffer or field length invalid for the encoding
    InvalidLength,
    /// Malformed field encoding
    InvalidEncoding,
    /// Invalid UTF-8 in a string field
    Utf8,
}

impl From<encdec::Error> for ProtoError {
    fn from(e: encdec::Error) -> Self {
        match e {
            encdec::Error::Length => ProtoError::InvalidLength,
            _ => ProtoError::InvalidEncoding,
        }
    }
}

impl core::fmt::Display for ProtoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ProtoError::InvalidLength => write!(f, "invalid length"),
            ProtoError::InvalidEncoding => write!(f, "invalid encoding"),
            ProtoError::Utf8 => write!(f, "invalid utf-8"),
        }
    }
}

/// Helper macro for messages with no payload
#[macro_export]
macro_rules! encdec_empty {
    ($t:ty) => {
        impl encdec::Encode for $t {
            type Error = $crate::ProtoError;

            fn encode_len(&self) -> Result<usize, Self::Error> {
                Ok(0)
            }

            fn encode(&self, _buff: &mut [u8]) -> Result<usize, Self::Error> {
                Ok(0)
            }
        }

        impl encdec::DecodeOwned for $t {
            type Output = $t;
            type Error = $crate::ProtoError;

            fn decode_owned(_buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
                Ok((<$t>::default(), 0))
            }
        }
    };
}

#[cfg(test)]
pub(crate) mod test {
    use core::fmt::Debug;

    use encdec::EncDec;

    use super::*;

    /// Helper for message encode / decode tests
    pub fn encode_decode_message<'a, M: EncDec<'a, ProtoError> + PartialEq + Debug>(
        buff: &'a mut [u8],
        msg: &M,
    ) -> usize {
        // Encode message
        let n = msg.encode(buff).expect("encode failed");

        // Check encoded length matches expected length
        let expected_n = msg.encode_len().expect("get length failed");
        assert_eq!(n, expected_n, "encode length mismatch");

        // Decode message
        let (decoded, decoded_n) = M::decode(&buff[..n]).expect("decode failed");

        // Check decoded object and length match
        assert_eq!(msg, &decoded);
        assert_eq!(expected_n, decoded_n);

        n
    }
}

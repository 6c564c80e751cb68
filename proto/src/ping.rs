//! Ping message, the device echo / liveness diagnostic

use encdec::{Decode, Encode};

use crate::{
    helpers::{get_str, put_str, str_len},
    MessageKind, MessageStatic, ProtoError,
};

const FLAG_BUTTON: u8 = 1 << 0;
const FLAG_PIN: u8 = 1 << 1;
const FLAG_PASSPHRASE: u8 = 1 << 2;

/// Ping request
///
/// The device echoes the message back in a `Success` response, optionally
/// gating the echo on the protection steps flagged here. Messages longer
/// than the device screen allows are truncated on display.
///
/// ## Encoding
///
/// ```text
///  0                   1
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     FLAGS     |    MSG_LEN    |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// /           MESSAGE...          /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct Ping<'a> {
    /// Message to echo
    pub message: &'a str,

    /// Require a physical button press before responding
    pub button_protection: bool,

    /// Require PIN entry before responding
    pub pin_protection: bool,

    /// Require passphrase entry before responding
    pub passphrase_protection: bool,
}

impl MessageStatic for Ping<'_> {
    const KIND: MessageKind = MessageKind::Ping;
}

impl<'a> Encode for Ping<'a> {
    type Error = ProtoError;

    fn encode_len(&self) -> Result<usize, ProtoError> {
        Ok(1 + str_len(self.message))
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, ProtoError> {
        if buff.is_empty() {
            return Err(ProtoError::InvalidLength);
        }

        let mut flags = 0;
        if self.button_protection {
            flags |= FLAG_BUTTON;
        }
        if self.pin_protection {
            flags |= FLAG_PIN;
        }
        if self.passphrase_protection {
            flags |= FLAG_PASSPHRASE;
        }
        buff[0] = flags;

        let n = put_str(&mut buff[1..], self.message)?;

        Ok(1 + n)
    }
}

impl<'a> Decode<'a> for Ping<'a> {
    type Output = Self;
    type Error = ProtoError;

    fn decode(buff: &'a [u8]) -> Result<(Self, usize), ProtoError> {
        if buff.is_empty() {
            return Err(ProtoError::InvalidLength);
        }

        let flags = buff[0];
        let (message, n) = get_str(&buff[1..])?;

        Ok((
            Self {
                message,
                button_protection: flags & FLAG_BUTTON != 0,
                pin_protection: flags & FLAG_PIN != 0,
                passphrase_protection: flags & FLAG_PASSPHRASE != 0,
            },
            1 + n,
        ))
    }
}

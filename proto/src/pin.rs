//! PIN matrix challenge messages
//!
//! The device displays a scrambled digit layout on its own screen; the
//! host prompts the user for the *positions* of their PIN digits and
//! returns those in the acknowledgement, so the PIN never crosses the
//! wire in the clear.

use encdec::{Decode, DecodeOwned, Encode};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum::Display;

use crate::{
    helpers::{get_str, put_str, str_len},
    MessageKind, MessageStatic, ProtoError,
};

/// PIN matrix challenge kind
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum PinMatrixKind {
    /// Request the device's current PIN
    Current = 1,
    /// Request a new PIN (first entry)
    NewFirst = 2,
    /// Request a new PIN (confirmation entry)
    NewSecond = 3,
}

/// PIN matrix challenge, sent by the device mid-exchange
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct PinMatrixRequest {
    /// Which PIN is being requested
    pub kind: PinMatrixKind,
}

impl MessageStatic for PinMatrixRequest {
    const KIND: MessageKind = MessageKind::PinMatrixRequest;
}

impl Encode for PinMatrixRequest {
    type Error = ProtoError;

    fn encode_len(&self) -> Result<usize, ProtoError> {
        Ok(1)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, ProtoError> {
        if buff.is_empty() {
            return Err(ProtoError::InvalidLength);
        }

        buff[0] = self.kind as u8;

        Ok(1)
    }
}

impl DecodeOwned for PinMatrixRequest {
    type Output = Self;
    type Error = ProtoError;

    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), ProtoError> {
        if buff.is_empty() {
            return Err(ProtoError::InvalidLength);
        }

        let kind = PinMatrixKind::try_from(buff[0]).map_err(|_| ProtoError::InvalidEncoding)?;

        Ok((Self { kind }, 1))
    }
}

/// PIN matrix acknowledgement, carrying the user's scrambled digits
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct PinMatrixAck<'a> {
    /// Matrix positions of the PIN digits as entered by the user
    pub pin: &'a str,
}

impl MessageStatic for PinMatrixAck<'_> {
    const KIND: MessageKind = MessageKind::PinMatrixAck;
}

impl<'a> Encode for PinMatrixAck<'a> {
    type Error = ProtoError;

    fn encode_len(&self) -> Result<usize, ProtoError> {
        Ok(str_len(self.pin))
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, ProtoError> {
        put_str(buff, self.pin)
    }
}

impl<'a> Decode<'a> for PinMatrixAck<'a> {
    type Output = Self;
    type Error = ProtoError;

    fn decode(buff: &'a [u8]) -> Result<(Self, usize), ProtoError> {
        let (pin, n) = get_str(buff)?;

        Ok((Self { pin }, n))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::encode_decode_message;

    #[test]
    fn pin_matrix_request_msg() {
        let msg = PinMatrixRequest {
            kind: PinMatrixKind::Current,
        };

        let mut buff = [0u8; 16];
        encode_decode_message(&mut buff, &msg);
    }

    #[test]
    fn pin_matrix_request_invalid_kind() {
        assert_eq!(
            PinMatrixRequest::decode_owned(&[0x7f]),
            Err(ProtoError::InvalidEncoding)
        );
    }

    #[test]
    fn pin_matrix_ack_msg() {
        let msg = PinMatrixAck { pin: "1234" };

        let mut buff = [0u8; 16];
        encode_decode_message(&mut buff, &msg);
    }
}

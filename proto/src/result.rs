//! Terminal result messages, returned by the device to complete an exchange

use encdec::{Decode, Encode};

use crate::{
    helpers::{get_str, get_u32, put_str, put_u32, str_len},
    MessageKind, MessageStatic, ProtoError,
};

/// Success response
///
/// Carries a human-readable confirmation message, eg. the echoed `Ping`
/// text.
///
/// ## Encoding
///
/// ```text
/// [ MSG_LEN u8 | MESSAGE... ]
/// ```
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct Success<'a> {
    /// Confirmation message
    pub message: &'a str,
}

impl MessageStatic for Success<'_> {
    const KIND: MessageKind = MessageKind::Success;
}

impl<'a> Encode for Success<'a> {
    type Error = ProtoError;

    fn encode_len(&self) -> Result<usize, ProtoError> {
        Ok(str_len(self.message))
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, ProtoError> {
        put_str(buff, self.message)
    }
}

impl<'a> Decode<'a> for Success<'a> {
    type Output = Self;
    type Error = ProtoError;

    fn decode(buff: &'a [u8]) -> Result<(Self, usize), ProtoError> {
        let (message, n) = get_str(buff)?;

        Ok((Self { message }, n))
    }
}

/// Failure response
///
/// A device-reported failure, distinct from host-side transport or
/// protocol errors: an optional numeric code plus a human-readable
/// message, both carried verbatim to the caller.
///
/// ## Encoding
///
/// ```text
/// [ HAS_CODE u8 | CODE u32 (if present) | MSG_LEN u8 | MESSAGE... ]
/// ```
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct Failure<'a> {
    /// Optional failure code
    pub code: Option<u32>,

    /// Failure description
    pub message: &'a str,
}

impl MessageStatic for Failure<'_> {
    const KIND: MessageKind = MessageKind::Failure;
}

impl<'a> Encode for Failure<'a> {
    type Error = ProtoError;

    fn encode_len(&self) -> Result<usize, ProtoError> {
        let mut n = 1 + str_len(self.message);
        if self.code.is_some() {
            n += 4;
        }
        Ok(n)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, ProtoError> {
        if buff.is_empty() {
            return Err(ProtoError::InvalidLength);
        }

        let mut index = 1;

        match self.code {
            Some(code) => {
                buff[0] = 1;
                index += put_u32(&mut buff[index..], code)?;
            }
            None => buff[0] = 0,
        }

        index += put_str(&mut buff[index..], self.message)?;

        Ok(index)
    }
}

impl<'a> Decode<'a> for Failure<'a> {
    type Output = Self;
    type Error = ProtoError;

    fn decode(buff: &'a [u8]) -> Result<(Self, usize), ProtoError> {
        if buff.is_empty() {
            return Err(ProtoError::InvalidLength);
        }

        let mut index = 1;

        let code = match buff[0] {
            0 => None,
            _ => {
                let (code, n) = get_u32(&buff[index..])?;
                index += n;
                Some(code)
            }
        };

        let (message, n) = get_str(&buff[index..])?;
        index += n;

        Ok((Self { code, message }, index))
    }
}

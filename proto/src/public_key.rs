//! Extended public key export messages

use encdec::{Decode, Encode};
use heapless::Vec;

use crate::{
    helpers::{get_str, get_u32, put_str, put_u32, str_len},
    MessageKind, MessageStatic, ProtoError,
};

/// Maximum derivation path depth in a [`GetPublicKey`] request
pub const MAX_PATH_DEPTH: usize = 10;

/// Extended public key export request
///
/// Requests the extended public key for the node at the given BIP-32
/// derivation path (raw u32 indices, hardened bit included).
///
/// ## Encoding
///
/// ```text
/// [ N u8 | ADDRESS_N u32 x N | CURVE str8 | SHOW_DISPLAY u8 ]
/// ```
#[derive(Clone, PartialEq, Debug)]
pub struct GetPublicKey<'a> {
    /// Derivation path indices
    pub address_n: Vec<u32, MAX_PATH_DEPTH>,

    /// ECDSA curve name, typically [`crate::SECP256K1`]
    pub curve_name: &'a str,

    /// Show the derived key on the device display
    pub show_display: bool,
}

impl<'a> GetPublicKey<'a> {
    /// Create a new [`GetPublicKey`] request, failing if the path exceeds
    /// [`MAX_PATH_DEPTH`]
    pub fn new(path: &[u32], curve_name: &'a str, show_display: bool) -> Result<Self, ProtoError> {
        let address_n = Vec::from_slice(path).map_err(|_| ProtoError::InvalidLength)?;

        Ok(Self {
            address_n,
            curve_name,
            show_display,
        })
    }
}

impl MessageStatic for GetPublicKey<'_> {
    const KIND: MessageKind = MessageKind::GetPublicKey;
}

impl<'a> Encode for GetPublicKey<'a> {
    type Error = ProtoError;

    fn encode_len(&self) -> Result<usize, ProtoError> {
        Ok(1 + 4 * self.address_n.len() + str_len(self.curve_name) + 1)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, ProtoError> {
        if buff.len() < self.encode_len()? {
            return Err(ProtoError::InvalidLength);
        }

        let mut index = 0;

        buff[index] = self.address_n.len() as u8;
        index += 1;

        for v in &self.address_n {
            index += put_u32(&mut buff[index..], *v)?;
        }

        index += put_str(&mut buff[index..], self.curve_name)?;

        buff[index] = self.show_display as u8;
        index += 1;

        Ok(index)
    }
}

impl<'a> Decode<'a> for GetPublicKey<'a> {
    type Output = Self;
    type Error = ProtoError;

    fn decode(buff: &'a [u8]) -> Result<(Self, usize), ProtoError> {
        if buff.is_empty() {
            return Err(ProtoError::InvalidLength);
        }

        let mut index = 0;

        let depth = buff[index] as usize;
        index += 1;

        let mut address_n = Vec::new();
        for _ in 0..depth {
            let (v, n) = get_u32(&buff[index..])?;
            index += n;

            address_n.push(v).map_err(|_| ProtoError::InvalidEncoding)?;
        }

        let (curve_name, n) = get_str(&buff[index..])?;
        index += n;

        if buff.len() <= index {
            return Err(ProtoError::InvalidLength);
        }
        let show_display = buff[index] != 0;
        index += 1;

        Ok((
            Self {
                address_n,
                curve_name,
                show_display,
            },
            index,
        ))
    }
}

/// Extended public key response
///
/// ## Encoding
///
/// ```text
/// [ XPUB_LEN u8 | XPUB... ]
/// ```
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct PublicKey<'a> {
    /// Serialized extended public key (Base58, `xpub...`)
    pub xpub: &'a str,
}

impl MessageStatic for PublicKey<'_> {
    const KIND: MessageKind = MessageKind::PublicKey;
}

impl<'a> Encode for PublicKey<'a> {
    type Error = ProtoError;

    fn encode_len(&self) -> Result<usize, ProtoError> {
        Ok(str_len(self.xpub))
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, ProtoError> {
        put_str(buff, self.xpub)
    }
}

impl<'a> Decode<'a> for PublicKey<'a> {
    type Output = Self;
    type Error = ProtoError;

    fn decode(buff: &'a [u8]) -> Result<(Self, usize), ProtoError> {
        let (xpub, n) = get_str(buff)?;

        Ok((Self { xpub }, n))
    }
}

//! Device initialization and feature descriptor messages

use encdec::{Decode, Encode};
use heapless::Vec;

use crate::{
    helpers::{get_str, get_u32, put_str, put_u32, str_len},
    MessageKind, MessageStatic, ProtoError,
};

/// Initialize request
///
/// Resets the protocol exchange and solicits a [`Features`] response,
/// superseding any previously reported descriptor.
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct Initialize {}

impl MessageStatic for Initialize {
    const KIND: MessageKind = MessageKind::Initialize;
}

crate::encdec_empty!(Initialize);

bitflags::bitflags! {
    /// Protection and cache state flags reported in [`Features`]
    pub struct FeatureFlags: u16 {
        /// Device requires a PIN for protected operations
        const PIN_PROTECTION = 1 << 0;

        /// Device requires a passphrase for protected operations
        const PASSPHRASE_PROTECTION = 1 << 1;

        /// A PIN has been entered and is cached for this session
        const PIN_CACHED = 1 << 2;

        /// A passphrase has been entered and is cached for this session
        const PASSPHRASE_CACHED = 1 << 3;

        /// Device holds a seed and is ready for use
        const INITIALIZED = 1 << 4;

        /// Device is running in bootloader mode
        const BOOTLOADER_MODE = 1 << 5;
    }
}

/// Maximum coin table entries in a decoded [`Features`]
pub const MAX_COINS: usize = 8;

/// Maximum policy table entries in a decoded [`Features`]
pub const MAX_POLICIES: usize = 4;

/// Coin table entry in a [`Features`] descriptor
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct CoinInfo<'a> {
    /// Coin name, eg. `Bitcoin`
    pub name: &'a str,
    /// Coin ticker shortcut, eg. `BTC`
    pub shortcut: &'a str,
}

/// Policy table entry in a [`Features`] descriptor
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct PolicyInfo<'a> {
    /// Policy name
    pub name: &'a str,
    /// Whether the policy is enabled
    pub enabled: bool,
}

/// Features response, the device-reported descriptor
///
/// ## Encoding
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |            FLAGS              |  HAS_VERSION  |               .
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+               .
/// .             MAJOR / MINOR / PATCH (3x u32, if present)        .
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// /               VENDOR / DEVICE_ID / LABEL (str8 each)          /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |    N_COINS    |     N_COINS x [ NAME str8 | SHORTCUT str8 ]   /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  N_POLICIES   |     N_POLICIES x [ ENABLED u8 | NAME str8 ]   /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Clone, PartialEq, Debug)]
pub struct Features<'a> {
    /// Protection / cache state flags
    pub flags: FeatureFlags,

    /// Firmware version triple, absent on some bootloader responses
    pub version: Option<(u32, u32, u32)>,

    /// Vendor string
    pub vendor: &'a str,

    /// Unique device identifier
    pub device_id: &'a str,

    /// User-assigned device label
    pub label: &'a str,

    /// Supported coin table
    pub coins: Vec<CoinInfo<'a>, MAX_COINS>,

    /// Policy table
    pub policies: Vec<PolicyInfo<'a>, MAX_POLICIES>,
}

impl MessageStatic for Features<'_> {
    const KIND: MessageKind = MessageKind::Features;
}

impl<'a> Encode for Features<'a> {
    type Error = ProtoError;

    fn encode_len(&self) -> Result<usize, ProtoError> {
        // Flags and version presence byte
        let mut n = 2 + 1;

        if self.version.is_some() {
            n += 12;
        }

        n += str_len(self.vendor) + str_len(self.device_id) + str_len(self.label);

        n += 1;
        for c in &self.coins {
            n += str_len(c.name) + str_len(c.shortcut);
        }

        n += 1;
        for p in &self.policies {
            n += 1 + str_len(p.name);
        }

        Ok(n)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, ProtoError> {
        if buff.len() < self.encode_len()? {
            return Err(ProtoError::InvalidLength);
        }

        let mut index = 0;

        // Write flags
        buff[..2].copy_from_slice(&self.flags.bits().to_le_bytes());
        index += 2;

        // Write version triple if present
        match self.version {
            Some((major, minor, patch)) => {
                buff[index] = 1;
                index += 1;
                index += put_u32(&mut buff[index..], major)?;
                index += put_u32(&mut buff[index..], minor)?;
                index += put_u32(&mut buff[index..], patch)?;
            }
            None => {
                buff[index] = 0;
                index += 1;
            }
        }

        // Write identity strings
        index += put_str(&mut buff[index..], self.vendor)?;
        index += put_str(&mut buff[index..], self.device_id)?;
        index += put_str(&mut buff[index..], self.label)?;

        // Write coin table
        buff[index] = self.coins.len() as u8;
        index += 1;
        for c in &self.coins {
            index += put_str(&mut buff[index..], c.name)?;
            index += put_str(&mut buff[index..], c.shortcut)?;
        }

        // Write policy table
        buff[index] = self.policies.len() as u8;
        index += 1;
        for p in &self.policies {
            buff[index] = p.enabled as u8;
            index += 1;
            index += put_str(&mut buff[index..], p.name)?;
        }

        Ok(index)
    }
}

impl<'a> Decode<'a> for Features<'a> {
    type Output = Self;
    type Error = ProtoError;

    fn decode(buff: &'a [u8]) -> Result<(Self, usize), ProtoError> {
        if buff.len() < 3 {
            return Err(ProtoError::InvalidLength);
        }

        let mut index = 0;

        // Fetch flags
        let flags = FeatureFlags::from_bits_truncate(u16::from_le_bytes([buff[0], buff[1]]));
        index += 2;

        // Fetch version triple if present
        let has_version = buff[index] != 0;
        index += 1;

        let version = match has_version {
            true => {
                let (major, n) = get_u32(&buff[index..])?;
                index += n;
                let (minor, n) = get_u32(&buff[index..])?;
                index += n;
                let (patch, n) = get_u32(&buff[index..])?;
                index += n;
                Some((major, minor, patch))
            }
            false => None,
        };

        // Fetch identity strings
        let (vendor, n) = get_str(&buff[index..])?;
        index += n;
        let (device_id, n) = get_str(&buff[index..])?;
        index += n;
        let (label, n) = get_str(&buff[index..])?;
        index += n;

        // Fetch coin table
        if buff.len() <= index {
            return Err(ProtoError::InvalidLength);
        }
        let n_coins = buff[index] as usize;
        index += 1;

        let mut coins = Vec::new();
        for _ in 0..n_coins {
            let (name, n) = get_str(&buff[index..])?;
            index += n;
            let (shortcut, n) = get_str(&buff[index..])?;
            index += n;

            coins
                .push(CoinInfo { name, shortcut })
                .map_err(|_| ProtoError::InvalidEncoding)?;
        }

        // Fetch policy table
        if buff.len() <= index {
            return Err(ProtoError::InvalidLength);
        }
        let n_policies = buff[index] as usize;
        index += 1;

        let mut policies = Vec::new();
        for _ in 0..n_policies {
            if buff.len() <= index {
                return Err(ProtoError::InvalidLength);
            }
            let enabled = buff[index] != 0;
            index += 1;

            let (name, n) = get_str(&buff[index..])?;
            index += n;

            policies
                .push(PolicyInfo { name, enabled })
                .map_err(|_| ProtoError::InvalidEncoding)?;
        }

        Ok((
            Self {
                flags,
                version,
                vendor,
                device_id,
                label,
                coins,
                policies,
            },
            index,
        ))
    }
}

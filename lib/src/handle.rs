//! Handle for connected KeepKey devices
//!
//! This provides the request / response operations of the device
//! session and is generic over [`Transport`] implementations.

use std::sync::Arc;

use encdec::{Decode, DecodeOwned, Encode};
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use keepkey_proto::{
    button::ButtonAck,
    features::{FeatureFlags, Features, Initialize},
    pin::{PinMatrixAck, PinMatrixKind, PinMatrixRequest},
    ping::Ping,
    public_key::{GetPublicKey, PublicKey},
    result::{Failure, Success},
    MessageKind, MessageStatic, ProtoError, SECP256K1,
};

use crate::{framing, transport::Transport, Error};

/// Handle for one open device connection.
///
/// Created bound to a transport (the session's open transition); calls
/// after [`DeviceHandle::close`] fail with [`Error::InvalidState`].
/// Operations on one handle are strictly sequential: the framing
/// protocol has no request identifiers, so the transport binding is held
/// under a mutex for the full duration of each exchange and concurrent
/// callers queue behind it.
pub struct DeviceHandle<T: Transport> {
    t: Arc<Mutex<Option<T>>>,
}

impl<T: Transport> Clone for DeviceHandle<T> {
    fn clone(&self) -> Self {
        Self { t: self.t.clone() }
    }
}

/// Create a [`DeviceHandle`] bound to a transport
impl<T: Transport> From<T> for DeviceHandle<T> {
    fn from(t: T) -> Self {
        Self {
            t: Arc::new(Mutex::new(Some(t))),
        }
    }
}

/// Owned snapshot of the device-reported [`Features`] descriptor
///
/// Produced once per [`DeviceHandle::initialize`] call and superseded
/// (not merged) by each subsequent call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceFeatures {
    /// Vendor string
    pub vendor: String,
    /// Unique device identifier
    pub device_id: String,
    /// User-assigned label
    pub label: String,

    /// Firmware major version
    pub major_version: Option<u32>,
    /// Firmware minor version
    pub minor_version: Option<u32>,
    /// Firmware patch version
    pub patch_version: Option<u32>,

    /// Device requires a PIN
    pub pin_protection: bool,
    /// Device requires a passphrase
    pub passphrase_protection: bool,
    /// A PIN is cached for this session
    pub pin_cached: bool,
    /// A passphrase is cached for this session
    pub passphrase_cached: bool,
    /// Device holds a seed
    pub initialized: bool,
    /// Device is in bootloader mode
    pub bootloader_mode: bool,

    /// Supported coins
    pub coins: Vec<CoinType>,
    /// Policies
    pub policies: Vec<PolicyType>,
}

/// Supported coin entry in [`DeviceFeatures`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoinType {
    pub name: String,
    pub shortcut: String,
}

/// Policy entry in [`DeviceFeatures`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyType {
    pub name: String,
    pub enabled: bool,
}

impl DeviceFeatures {
    /// Firmware version string; absent components format as 0
    pub fn version(&self) -> String {
        format!(
            "{}.{}.{}",
            self.major_version.unwrap_or(0),
            self.minor_version.unwrap_or(0),
            self.patch_version.unwrap_or(0)
        )
    }
}

impl From<&Features<'_>> for DeviceFeatures {
    fn from(f: &Features<'_>) -> Self {
        Self {
            vendor: f.vendor.to_string(),
            device_id: f.device_id.to_string(),
            label: f.label.to_string(),
            major_version: f.version.map(|v| v.0),
            minor_version: f.version.map(|v| v.1),
            patch_version: f.version.map(|v| v.2),
            pin_protection: f.flags.contains(FeatureFlags::PIN_PROTECTION),
            passphrase_protection: f.flags.contains(FeatureFlags::PASSPHRASE_PROTECTION),
            pin_cached: f.flags.contains(FeatureFlags::PIN_CACHED),
            passphrase_cached: f.flags.contains(FeatureFlags::PASSPHRASE_CACHED),
            initialized: f.flags.contains(FeatureFlags::INITIALIZED),
            bootloader_mode: f.flags.contains(FeatureFlags::BOOTLOADER_MODE),
            coins: f
                .coins
                .iter()
                .map(|c| CoinType {
                    name: c.name.to_string(),
                    shortcut: c.shortcut.to_string(),
                })
                .collect(),
            policies: f
                .policies
                .iter()
                .map(|p| PolicyType {
                    name: p.name.to_string(),
                    enabled: p.enabled,
                })
                .collect(),
        }
    }
}

/// Owned extended public key returned by key export operations
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PublicKeyInfo {
    /// Serialized extended public key (Base58, `xpub...`)
    pub xpub: String,
}

impl<T: Transport + Send> DeviceHandle<T> {
    /// Encode and send one message over the bound transport
    async fn send_message<M>(t: &mut T, msg: &M) -> Result<(), Error>
    where
        M: MessageStatic + Encode<Error = ProtoError> + Sync,
    {
        let n = msg.encode_len()?;
        let mut buff = vec![0u8; n];
        msg.encode(&mut buff)?;

        framing::send(t, M::KIND as u16, &buff).await
    }

    /// Query the device for its feature descriptor.
    ///
    /// While not essential, do this before other operations; each call
    /// produces a fresh snapshot.
    pub async fn initialize(&self) -> Result<DeviceFeatures, Error> {
        let mut guard = self.t.lock().await;
        let t = guard.as_mut().ok_or(Error::InvalidState)?;

        debug!("Requesting device features");

        Self::send_message(t, &Initialize {}).await?;

        let (kind, payload) = framing::receive(t).await?;

        match MessageKind::try_from(kind) {
            Ok(MessageKind::Features) => {
                let (f, _) = Features::decode(&payload)?;
                Ok(DeviceFeatures::from(&f))
            }
            _ => Err(Error::UnexpectedMessage(kind)),
        }
    }

    /// Display a message on the device screen and await the echo.
    ///
    /// With `button_protection` the device blocks until the user holds
    /// the button, so this call may stall indefinitely from the host's
    /// view; wrap it in [`tokio::time::timeout`] and drop the handle to
    /// abandon a stalled device.
    ///
    /// A device-reported failure is returned as descriptive text, not an
    /// error: this is a diagnostic operation and callers inspect the
    /// string. A failure with code 99 and message "denied" reads
    /// `"99 - denied"`.
    pub async fn ping(&self, message: &str, button_protection: bool) -> Result<String, Error> {
        let mut guard = self.t.lock().await;
        let t = guard.as_mut().ok_or(Error::InvalidState)?;

        debug!("Pinging device (button protection: {})", button_protection);

        let req = Ping {
            message,
            button_protection,
            pin_protection: false,
            passphrase_protection: false,
        };
        Self::send_message(t, &req).await?;

        let (mut kind, mut payload) = framing::receive(t).await?;

        // One button round may precede the terminal response; a second
        // is unexpected (avoids looping on a misbehaving device)
        let mut button_acked = false;
        loop {
            match MessageKind::try_from(kind) {
                Ok(MessageKind::Success) => {
                    let (s, _) = Success::decode(&payload)?;
                    return Ok(s.message.to_string());
                }
                Ok(MessageKind::Failure) => {
                    let (f, _) = Failure::decode(&payload)?;
                    return Ok(match f.code {
                        Some(code) => format!("{} - {}", code, f.message),
                        None => f.message.to_string(),
                    });
                }
                Ok(MessageKind::ButtonRequest) if !button_acked => {
                    debug!("Button request, acknowledging");

                    button_acked = true;
                    Self::send_message(t, &ButtonAck {}).await?;

                    let r = framing::receive(t).await?;
                    kind = r.0;
                    payload = r.1;
                }
                _ => return Err(Error::UnexpectedMessage(kind)),
            }
        }
    }

    /// Fetch the extended public key for a BIP-32 derivation path.
    ///
    /// Non-interactive variant: a PIN matrix challenge from the device
    /// is unexpected here, use [`DeviceHandle::get_public_key_with_pin`]
    /// for PIN-protected devices.
    ///
    /// Unlike [`DeviceHandle::ping`], a device-reported failure raises
    /// [`Error::Device`]: a missing key is a hard failure for callers
    /// deriving addresses from the result.
    pub async fn get_public_key(&self, path: &[u32]) -> Result<PublicKeyInfo, Error> {
        self.get_public_key_inner(path, None).await
    }

    /// Fetch the extended public key for a BIP-32 derivation path,
    /// answering a PIN matrix challenge through the provided callback.
    ///
    /// The callback is invoked synchronously from within this call's
    /// blocking flow with the challenge kind, and returns the scrambled
    /// digit positions the user entered.
    pub async fn get_public_key_with_pin<F>(
        &self,
        path: &[u32],
        mut pin: F,
    ) -> Result<PublicKeyInfo, Error>
    where
        F: FnMut(PinMatrixKind) -> String + Send,
    {
        self.get_public_key_inner(path, Some(&mut pin)).await
    }

    async fn get_public_key_inner(
        &self,
        path: &[u32],
        mut pin: Option<&mut (dyn FnMut(PinMatrixKind) -> String + Send)>,
    ) -> Result<PublicKeyInfo, Error> {
        let mut guard = self.t.lock().await;
        let t = guard.as_mut().ok_or(Error::InvalidState)?;

        debug!("Requesting public key for path {:?}", path);

        let req = GetPublicKey::new(path, SECP256K1, false)?;
        Self::send_message(t, &req).await?;

        let (mut kind, mut payload) = framing::receive(t).await?;

        // One PIN round may precede the terminal response
        let mut pin_acked = false;
        loop {
            match MessageKind::try_from(kind) {
                Ok(MessageKind::PublicKey) => {
                    let (pk, _) = PublicKey::decode(&payload)?;
                    return Ok(PublicKeyInfo {
                        xpub: pk.xpub.to_string(),
                    });
                }
                Ok(MessageKind::Failure) => {
                    let (f, _) = Failure::decode(&payload)?;
                    return Err(Error::Device {
                        code: f.code,
                        message: f.message.to_string(),
                    });
                }
                Ok(MessageKind::PinMatrixRequest) if !pin_acked => {
                    let cb = match pin.as_mut() {
                        Some(cb) => cb,
                        None => return Err(Error::UnexpectedMessage(kind)),
                    };

                    let (req, _) = PinMatrixRequest::decode_owned(&payload)?;
                    debug!("PIN matrix challenge: {}", req.kind);

                    let digits = cb(req.kind);

                    pin_acked = true;
                    Self::send_message(t, &PinMatrixAck { pin: &digits }).await?;

                    let r = framing::receive(t).await?;
                    kind = r.0;
                    payload = r.1;
                }
                _ => return Err(Error::UnexpectedMessage(kind)),
            }
        }
    }

    /// Whether the session still holds its transport binding
    pub async fn is_open(&self) -> bool {
        self.t.lock().await.is_some()
    }

    /// Release the transport binding.
    ///
    /// Safe to call multiple times and from cleanup paths; subsequent
    /// operations fail with [`Error::InvalidState`].
    pub async fn close(&self) {
        let mut guard = self.t.lock().await;
        if guard.take().is_some() {
            debug!("Device connection closed");
        }
    }
}

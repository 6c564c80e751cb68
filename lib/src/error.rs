//! Error types for the KeepKey host library

use keepkey_proto::ProtoError;

/// KeepKey host API error type
///
/// Device-reported failures ([`Error::Device`]) are distinct from
/// host-side transport and protocol errors: they carry the device's
/// optional numeric code and message verbatim.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Underlying packet write / read failed. Fatal to the in-flight
    /// call; not retried by the library.
    #[error("transport error: {0}")]
    Transport(anyhow::Error),

    /// Too many consecutive invalid packets during frame reassembly.
    /// Fatal to the in-flight call; the session remains usable.
    #[error("framing error: too many invalid chunks")]
    Framing,

    /// Received a message kind not anticipated by the current
    /// operation's state machine
    #[error("unexpected message kind {0:#06x}")]
    UnexpectedMessage(u16),

    /// Well-formed failure reported by the device
    #[error("device failure: {message}")]
    Device {
        /// Optional device failure code
        code: Option<u32>,
        /// Device failure description
        message: String,
    },

    /// Operation invoked on a closed (or never opened) session
    #[error("invalid session state: session is not open")]
    InvalidState,

    /// Message encode / decode failed
    #[error("message codec error: {0}")]
    Proto(ProtoError),

    /// HID layer error
    #[cfg(feature = "transport_hid")]
    #[error("HID error: {0}")]
    Hid(#[from] hidapi::HidError),
}

impl From<ProtoError> for Error {
    fn from(e: ProtoError) -> Self {
        Error::Proto(e)
    }
}

//! Prelude to simplify downstream use of message objects
//!

pub use crate::{
    button::{ButtonAck, ButtonRequest},
    features::{CoinInfo, FeatureFlags, Features, Initialize, PolicyInfo},
    pin::{PinMatrixAck, PinMatrixKind, PinMatrixRequest},
    ping::Ping,
    public_key::{GetPublicKey, PublicKey},
    result::{Failure, Success},
    MessageKind, MessageStatic, ProtoError, SECP256K1,
};

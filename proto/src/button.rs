//! Button confirmation messages
//!
//! `ButtonRequest` is an intermediate device response indicating the
//! device is waiting on a physical button press; the host acknowledges
//! with `ButtonAck` and reads again for the terminal response.

use crate::{MessageKind, MessageStatic};

/// Button press request, sent by the device mid-exchange
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct ButtonRequest {}

impl MessageStatic for ButtonRequest {
    const KIND: MessageKind = MessageKind::ButtonRequest;
}

crate::encdec_empty!(ButtonRequest);

/// Button request acknowledgement, sent by the host
///
/// After this the device blocks until the user confirms or rejects, so
/// the following read may stall indefinitely from the host's view.
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct ButtonAck {}

impl MessageStatic for ButtonAck {
    const KIND: MessageKind = MessageKind::ButtonAck;
}

crate::encdec_empty!(ButtonAck);

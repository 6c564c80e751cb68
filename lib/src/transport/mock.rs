//! Scripted in-process transport emulating the device end of the
//! framing protocol, for tests and protocol experiments
//!
//! A [`MockTransport`] reassembles frames written by the host side and
//! hands each complete (kind, payload) message to a responder closure;
//! the messages the responder returns are framed into the read queue.
//! Raw packets (including deliberately invalid ones) can also be queued
//! directly.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{Transport, PACKET_SIZE};
use crate::{framing, Error};

type Responder = Box<dyn FnMut(u16, Vec<u8>) -> Vec<(u16, Vec<u8>)> + Send>;

/// Scripted packet transport
pub struct MockTransport {
    responder: Responder,
    reads: VecDeque<Vec<u8>>,
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
    rx: Vec<u8>,
    rx_header: Option<(u16, usize)>,
}

impl MockTransport {
    /// Create a mock transport with the provided message responder
    pub fn new<F>(responder: F) -> Self
    where
        F: FnMut(u16, Vec<u8>) -> Vec<(u16, Vec<u8>)> + Send + 'static,
    {
        Self {
            responder: Box::new(responder),
            reads: VecDeque::new(),
            writes: Arc::new(Mutex::new(Vec::new())),
            rx: Vec::new(),
            rx_header: None,
        }
    }

    /// Queue a raw packet for the host to read, valid or not
    pub fn push_raw(&mut self, packet: Vec<u8>) {
        self.reads.push_back(packet);
    }

    /// Frame a logical message into the read queue
    pub fn queue_message(&mut self, kind: u16, payload: &[u8]) {
        for p in framing::encode_packets(kind, payload) {
            self.reads.push_back(p.to_vec());
        }
    }

    /// Shared log of raw packets written by the host, cloneable before
    /// the transport moves into a handle
    pub fn write_log(&self) -> Arc<Mutex<Vec<Vec<u8>>>> {
        self.writes.clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn write_packet(&mut self, packet: &[u8; PACKET_SIZE]) -> Result<(), Error> {
        self.writes.lock().unwrap().push(packet.to_vec());

        if packet[0] != framing::PACKET_MARKER {
            return Err(Error::Transport(anyhow::anyhow!(
                "mock: packet missing marker byte"
            )));
        }
        let body = &packet[1..];

        match self.rx_header {
            None => {
                if body[0] != framing::FRAME_MAGIC || body[1] != framing::FRAME_MAGIC {
                    return Err(Error::Transport(anyhow::anyhow!(
                        "mock: bad frame header magic"
                    )));
                }

                let kind = u16::from_be_bytes([body[2], body[3]]);
                let len = u32::from_be_bytes([body[4], body[5], body[6], body[7]]) as usize;

                self.rx_header = Some((kind, len));
                self.rx.extend_from_slice(&body[framing::HEADER_LEN..]);
            }
            Some(_) => self.rx.extend_from_slice(body),
        }

        if let Some((kind, len)) = self.rx_header {
            if self.rx.len() >= len {
                let mut payload = std::mem::take(&mut self.rx);
                payload.truncate(len);
                self.rx_header = None;

                for (k, p) in (self.responder)(kind, payload) {
                    self.queue_message(k, &p);
                }
            }
        }

        Ok(())
    }

    async fn read_packet(&mut self) -> Result<Vec<u8>, Error> {
        match self.reads.pop_front() {
            Some(p) => Ok(p),
            None => Err(Error::Transport(anyhow::anyhow!(
                "mock: read on empty queue"
            ))),
        }
    }
}

//! USB HID implementation of the packet transport and discovery seams

use std::sync::Mutex;

use async_trait::async_trait;
use hidapi::{HidApi, HidDevice};
use log::debug;

use super::{Transport, PACKET_SIZE};
use crate::{Discover, Error, KEEPKEY_PID, KEEPKEY_VID};

/// Packet transport over an opened HID device
pub struct HidTransport {
    device: HidDevice,
}

impl HidTransport {
    pub(crate) fn new(device: HidDevice) -> Self {
        Self { device }
    }
}

#[async_trait]
impl Transport for HidTransport {
    async fn write_packet(&mut self, packet: &[u8; PACKET_SIZE]) -> Result<(), Error> {
        // HID writes carry a leading report identifier byte
        let mut report = [0u8; PACKET_SIZE + 1];
        report[1..].copy_from_slice(packet);

        let n = self.device.write(&report)?;
        if n < PACKET_SIZE {
            return Err(Error::Transport(anyhow::anyhow!("short HID write: {}", n)));
        }

        Ok(())
    }

    async fn read_packet(&mut self) -> Result<Vec<u8>, Error> {
        let mut buff = [0u8; PACKET_SIZE];
        let n = self.device.read(&mut buff)?;

        Ok(buff[..n].to_vec())
    }
}

/// HID device discovery by vendor / product identity
///
/// NOTE: only one HID context may exist at a time (workaround for global
/// HID context errors on macos/m1), so construct a single discoverer and
/// share the provider it backs.
pub struct HidDiscover {
    api: Mutex<HidApi>,
    vid: u16,
    pid: u16,
}

impl HidDiscover {
    /// Create a discoverer for the KeepKey vendor / product identity
    pub fn new() -> Result<Self, Error> {
        Self::with_ids(KEEPKEY_VID, KEEPKEY_PID)
    }

    /// Create a discoverer for a specific vendor / product identity
    pub fn with_ids(vid: u16, pid: u16) -> Result<Self, Error> {
        Ok(Self {
            api: Mutex::new(HidApi::new()?),
            vid,
            pid,
        })
    }

    fn api(&self) -> Result<std::sync::MutexGuard<'_, HidApi>, Error> {
        self.api
            .lock()
            .map_err(|_| Error::Transport(anyhow::anyhow!("HID context lock poisoned")))
    }
}

impl Discover for HidDiscover {
    type Transport = HidTransport;

    fn probe(&self) -> Result<bool, Error> {
        let mut api = self.api()?;
        api.refresh_devices()?;

        let found = api
            .device_list()
            .any(|d| d.vendor_id() == self.vid && d.product_id() == self.pid);

        Ok(found)
    }

    fn open(&self) -> Result<Option<HidTransport>, Error> {
        let mut api = self.api()?;
        api.refresh_devices()?;

        let info = match api
            .device_list()
            .find(|d| d.vendor_id() == self.vid && d.product_id() == self.pid)
        {
            Some(info) => info.clone(),
            None => return Ok(None),
        };

        debug!(
            "Opening device {:04x}:{:04x} ({})",
            info.vendor_id(),
            info.product_id(),
            info.serial_number().unwrap_or("UNKNOWN"),
        );

        let device = info.open_device(&api)?;

        Ok(Some(HidTransport::new(device)))
    }
}

//! KeepKey host interface library (and CLI)
//!
//! Provides device discovery and connection lifecycle management
//! ([`KeepKeyProvider`]), a session handle exposing the device's
//! request / response operations ([`DeviceHandle`]), and the packet
//! framing codec ([`framing`]) used between them.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use log::debug;
use tokio::sync::broadcast;

/// Re-export transports for consumer use
pub mod transport;
use transport::Transport;

/// Re-export `keepkey-proto` for consumers
pub use keepkey_proto::{self as proto};
pub use keepkey_proto::pin::PinMatrixKind;

pub mod framing;

mod handle;
pub use handle::{CoinType, DeviceFeatures, DeviceHandle, PolicyType, PublicKeyInfo};

mod error;
pub use error::Error;

/// KeepKey USB vendor identifier
pub const KEEPKEY_VID: u16 = 0x2b24;

/// KeepKey USB product identifier
pub const KEEPKEY_PID: u16 = 0x0001;

/// Default poll interval for wait / monitor loops
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Connection lifecycle notifications, no payload: consumers re-query
/// the device themselves on reconnect
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::Display)]
pub enum DeviceEvent {
    /// A device appeared and was bound
    Connected,
    /// The bound device went away
    Disconnected,
}

/// Device discovery seam for [`KeepKeyProvider`], abstract over
/// enumeration backends
pub trait Discover {
    type Transport: Transport + Send;

    /// Check whether a matching device is currently attached
    fn probe(&self) -> Result<bool, Error>;

    /// Open the first matching device, if any, with no side effects on
    /// absence
    fn open(&self) -> Result<Option<Self::Transport>, Error>;
}

struct ProviderInner<D> {
    discover: D,
    events: broadcast::Sender<DeviceEvent>,
    shutdown: AtomicBool,
    attached: AtomicBool,
    poll_interval: Duration,
}

/// KeepKey provider manages device discovery, connection lifecycle and
/// attach / detach notifications
pub struct KeepKeyProvider<D: Discover> {
    inner: Arc<ProviderInner<D>>,
}

impl<D: Discover> Clone for KeepKeyProvider<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

#[cfg(feature = "transport_hid")]
impl KeepKeyProvider<transport::HidDiscover> {
    /// Create a provider backed by HID discovery of KeepKey devices
    pub fn hid() -> Result<Self, Error> {
        Ok(Self::new(transport::HidDiscover::new()?))
    }
}

impl<D: Discover> KeepKeyProvider<D> {
    /// Create a provider over the given discovery backend
    pub fn new(discover: D) -> Self {
        let (events, _) = broadcast::channel(16);

        Self {
            inner: Arc::new(ProviderInner {
                discover,
                events,
                shutdown: AtomicBool::new(false),
                attached: AtomicBool::new(false),
                poll_interval: POLL_INTERVAL,
            }),
        }
    }

    /// Set the poll interval used by wait / monitor loops
    pub fn poll_interval(self, poll_interval: Duration) -> Self {
        let inner = match Arc::try_unwrap(self.inner) {
            Ok(mut i) => {
                i.poll_interval = poll_interval;
                i
            }
            Err(_) => panic!("poll_interval must be set before the provider is shared"),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Subscribe to connection lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.inner.events.subscribe()
    }

    /// Tear the provider down: any in-flight [`Self::wait_for_connection`]
    /// and [`Self::run_monitor`] observe this and return
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Relaxed);
    }

    fn emit(&self, event: DeviceEvent) {
        debug!("Device event: {}", event);

        // Delivery is best-effort, no receivers is fine
        let _ = self.inner.events.send(event);
    }

    fn bind(&self, t: D::Transport) -> DeviceHandle<D::Transport> {
        self.inner.attached.store(true, Ordering::Relaxed);
        self.emit(DeviceEvent::Connected);

        DeviceHandle::from(t)
    }

    /// Attempt a one-shot device open.
    ///
    /// Binds a session and emits [`DeviceEvent::Connected`] on success;
    /// performs no side effects when no device is present.
    pub fn try_open(&self) -> Result<Option<DeviceHandle<D::Transport>>, Error> {
        match self.inner.discover.open()? {
            Some(t) => Ok(Some(self.bind(t))),
            None => Ok(None),
        }
    }

    /// Poll until a device appears, then open and bind it as
    /// [`Self::try_open`] does.
    ///
    /// Returns `Ok(None)` if the provider is shut down while waiting.
    pub async fn wait_for_connection(&self) -> Result<Option<DeviceHandle<D::Transport>>, Error> {
        debug!("Waiting for device connection");

        loop {
            if self.inner.shutdown.load(Ordering::Relaxed) {
                return Ok(None);
            }

            if let Some(t) = self.inner.discover.open()? {
                return Ok(Some(self.bind(t)));
            }

            tokio::time::sleep(self.inner.poll_interval).await;
        }
    }

    /// Drive presence monitoring until shutdown, emitting
    /// [`DeviceEvent::Connected`] / [`DeviceEvent::Disconnected`]
    /// exactly once per attach / detach transition.
    ///
    /// Run this on one task only; delivery is serialized through it.
    pub async fn run_monitor(&self) {
        debug!("Starting device presence monitor");

        while !self.inner.shutdown.load(Ordering::Relaxed) {
            match self.inner.discover.probe() {
                Ok(present) => {
                    let attached = self.inner.attached.load(Ordering::Relaxed);
                    match (attached, present) {
                        (false, true) => {
                            self.inner.attached.store(true, Ordering::Relaxed);
                            self.emit(DeviceEvent::Connected);
                        }
                        (true, false) => {
                            self.inner.attached.store(false, Ordering::Relaxed);
                            self.emit(DeviceEvent::Disconnected);
                        }
                        _ => (),
                    }
                }
                // Transient probe failure, keep the last known state
                Err(e) => debug!("Device probe failed: {}", e),
            }

            tokio::time::sleep(self.inner.poll_interval).await;
        }

        debug!("Device presence monitor stopped");
    }
}

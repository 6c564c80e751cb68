//! Provider lifecycle tests over a scripted discovery backend

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{sync::broadcast::error::TryRecvError, time::timeout};

use keepkey_host::{transport::mock::MockTransport, DeviceEvent, Discover, Error, KeepKeyProvider};

/// Discovery backend over a shared presence flag
#[derive(Clone)]
struct MockDiscover {
    present: Arc<AtomicBool>,
}

impl MockDiscover {
    fn new(present: bool) -> Self {
        Self {
            present: Arc::new(AtomicBool::new(present)),
        }
    }

    fn set_present(&self, present: bool) {
        self.present.store(present, Ordering::Relaxed);
    }
}

impl Discover for MockDiscover {
    type Transport = MockTransport;

    fn probe(&self) -> Result<bool, Error> {
        Ok(self.present.load(Ordering::Relaxed))
    }

    fn open(&self) -> Result<Option<MockTransport>, Error> {
        match self.present.load(Ordering::Relaxed) {
            true => Ok(Some(MockTransport::new(|_, _| vec![]))),
            false => Ok(None),
        }
    }
}

const EVENT_TIMEOUT: Duration = Duration::from_secs(1);

#[tokio::test]
async fn try_open_without_device() {
    let p = KeepKeyProvider::new(MockDiscover::new(false));
    let mut events = p.subscribe();

    assert!(p.try_open().unwrap().is_none());

    // No device, no events
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn try_open_with_device() {
    let p = KeepKeyProvider::new(MockDiscover::new(true));
    let mut events = p.subscribe();

    let d = p.try_open().unwrap().expect("device should be present");
    assert!(d.is_open().await);

    assert_eq!(events.try_recv().unwrap(), DeviceEvent::Connected);
}

#[tokio::test]
async fn wait_for_connection_picks_up_late_device() {
    let discover = MockDiscover::new(false);
    let p = KeepKeyProvider::new(discover.clone()).poll_interval(Duration::from_millis(5));
    let mut events = p.subscribe();

    // Attach the device while the provider is polling
    let flip = {
        let discover = discover.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(25)).await;
            discover.set_present(true);
        })
    };

    let d = timeout(EVENT_TIMEOUT, p.wait_for_connection())
        .await
        .expect("wait should complete")
        .unwrap()
        .expect("device should be bound");

    assert!(d.is_open().await);
    assert_eq!(events.try_recv().unwrap(), DeviceEvent::Connected);

    flip.await.unwrap();
}

#[tokio::test]
async fn shutdown_cancels_wait() {
    let p = KeepKeyProvider::new(MockDiscover::new(false)).poll_interval(Duration::from_millis(5));

    let waiter = {
        let p = p.clone();
        tokio::spawn(async move { p.wait_for_connection().await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    p.shutdown();

    let r = timeout(EVENT_TIMEOUT, waiter)
        .await
        .expect("wait should observe shutdown")
        .unwrap();

    assert!(matches!(r, Ok(None)));
}

#[tokio::test]
async fn monitor_reports_each_transition_once() {
    let discover = MockDiscover::new(false);
    let p = KeepKeyProvider::new(discover.clone()).poll_interval(Duration::from_millis(5));
    let mut events = p.subscribe();

    let monitor = {
        let p = p.clone();
        tokio::spawn(async move { p.run_monitor().await })
    };

    discover.set_present(true);
    let ev = timeout(EVENT_TIMEOUT, events.recv()).await.unwrap().unwrap();
    assert_eq!(ev, DeviceEvent::Connected);

    // Steady presence over several polls emits nothing further
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));

    discover.set_present(false);
    let ev = timeout(EVENT_TIMEOUT, events.recv()).await.unwrap().unwrap();
    assert_eq!(ev, DeviceEvent::Disconnected);

    discover.set_present(true);
    let ev = timeout(EVENT_TIMEOUT, events.recv()).await.unwrap().unwrap();
    assert_eq!(ev, DeviceEvent::Connected);

    p.shutdown();
    timeout(EVENT_TIMEOUT, monitor)
        .await
        .expect("monitor should observe shutdown")
        .unwrap();
}

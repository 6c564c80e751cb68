//! Session protocol tests against the scripted mock transport

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use encdec::Encode;

use keepkey_host::{
    proto::features::MAX_COINS, proto::prelude::*, transport::mock::MockTransport, DeviceHandle,
    Error,
};

/// Encode a message payload for scripted responses
fn encode<M: Encode<Error = ProtoError>>(m: &M) -> Vec<u8> {
    let mut buff = vec![0u8; m.encode_len().unwrap()];
    let n = m.encode(&mut buff).unwrap();
    buff.truncate(n);
    buff
}

fn kind<M: MessageStatic>(_m: &M) -> u16 {
    M::KIND as u16
}

/// Features fixture with the provided label and major version
fn features(label: &str, major: u32) -> (u16, Vec<u8>) {
    let mut coins = heapless::Vec::<_, MAX_COINS>::new();
    coins
        .push(CoinInfo {
            name: "Bitcoin",
            shortcut: "BTC",
        })
        .unwrap();

    let f = Features {
        flags: FeatureFlags::INITIALIZED,
        version: Some((major, 1, 4)),
        vendor: "keepkey.com",
        device_id: "A1B2C3",
        label,
        coins,
        policies: heapless::Vec::new(),
    };

    (kind(&f), encode(&f))
}

#[tokio::test]
async fn initialize_returns_features() {
    let t = MockTransport::new(|k, _| {
        assert_eq!(k, MessageKind::Initialize as u16);
        vec![features("X", 6)]
    });

    let d = DeviceHandle::from(t);
    let f = d.initialize().await.unwrap();

    assert_eq!(f.label, "X");
    assert_eq!(f.major_version, Some(6));
    assert_eq!(f.version(), "6.1.4");
    assert_eq!(f.coins[0].shortcut, "BTC");
    assert!(f.initialized);
}

#[tokio::test]
async fn ping_plain() {
    let t = MockTransport::new(|k, payload| {
        assert_eq!(k, MessageKind::Ping as u16);

        let (ping, _) = <Ping as encdec::Decode>::decode(&payload).unwrap();
        assert!(!ping.button_protection);
        assert!(!ping.pin_protection);

        let s = Success {
            message: ping.message,
        };
        vec![(kind(&s), encode(&s))]
    });

    let d = DeviceHandle::from(t);
    let r = d.ping("hello", false).await.unwrap();

    assert_eq!(r, "hello");
}

#[tokio::test]
async fn ping_with_button() {
    // ButtonRequest first, Success only after the host acks
    let acked = Arc::new(AtomicUsize::new(0));
    let t = {
        let acked = acked.clone();
        MockTransport::new(move |k, _| {
            if k == MessageKind::Ping as u16 {
                let b = ButtonRequest::default();
                vec![(kind(&b), encode(&b))]
            } else {
                assert_eq!(k, MessageKind::ButtonAck as u16);
                acked.fetch_add(1, Ordering::Relaxed);

                let s = Success { message: "hi" };
                vec![(kind(&s), encode(&s))]
            }
        })
    };

    let d = DeviceHandle::from(t);
    let r = d.ping("hi", true).await.unwrap();

    assert_eq!(r, "hi");
    assert_eq!(acked.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn ping_failure_as_text() {
    let t = MockTransport::new(|_, _| {
        let f = Failure {
            code: Some(99),
            message: "denied",
        };
        vec![(kind(&f), encode(&f))]
    });

    let d = DeviceHandle::from(t);
    assert_eq!(d.ping("hi", false).await.unwrap(), "99 - denied");
}

#[tokio::test]
async fn ping_failure_without_code() {
    let t = MockTransport::new(|_, _| {
        let f = Failure {
            code: None,
            message: "cancelled",
        };
        vec![(kind(&f), encode(&f))]
    });

    let d = DeviceHandle::from(t);
    assert_eq!(d.ping("hi", false).await.unwrap(), "cancelled");
}

#[tokio::test]
async fn ping_repeated_button_request_is_unexpected() {
    // A second button round would loop forever on a misbehaving device
    let t = MockTransport::new(move |_, _| {
        let b = ButtonRequest::default();
        vec![(kind(&b), encode(&b))]
    });

    let d = DeviceHandle::from(t);
    let r = d.ping("hi", true).await;

    assert!(matches!(
        r,
        Err(Error::UnexpectedMessage(k)) if k == MessageKind::ButtonRequest as u16
    ));
}

#[tokio::test]
async fn get_public_key_ok() {
    let t = MockTransport::new(|k, payload| {
        assert_eq!(k, MessageKind::GetPublicKey as u16);

        let (req, _) = <GetPublicKey as encdec::Decode>::decode(&payload).unwrap();
        assert_eq!(req.curve_name, SECP256K1);
        assert!(!req.show_display);
        assert_eq!(req.address_n.as_slice(), &[0x8000002c, 0x80000000]);

        let pk = PublicKey { xpub: "xpub6BosfCn" };
        vec![(kind(&pk), encode(&pk))]
    });

    let d = DeviceHandle::from(t);
    let r = d.get_public_key(&[0x8000002c, 0x80000000]).await.unwrap();

    assert_eq!(r.xpub, "xpub6BosfCn");
}

#[tokio::test]
async fn get_public_key_failure_is_error() {
    let t = MockTransport::new(|_, _| {
        let f = Failure {
            code: Some(13),
            message: "firmware error",
        };
        vec![(kind(&f), encode(&f))]
    });

    let d = DeviceHandle::from(t);
    let r = d.get_public_key(&[0]).await;

    match r {
        Err(Error::Device { code, message }) => {
            assert_eq!(code, Some(13));
            assert_eq!(message, "firmware error");
        }
        _ => panic!("expected device failure, got {:?}", r.map(|v| v.xpub)),
    }
}

#[tokio::test]
async fn get_public_key_with_pin() {
    let pins = Arc::new(Mutex::new(Vec::new()));
    let t = {
        let pins = pins.clone();
        MockTransport::new(move |k, payload| {
            if k == MessageKind::GetPublicKey as u16 {
                let p = PinMatrixRequest {
                    kind: PinMatrixKind::Current,
                };
                vec![(kind(&p), encode(&p))]
            } else {
                assert_eq!(k, MessageKind::PinMatrixAck as u16);

                let (ack, _) = <PinMatrixAck as encdec::Decode>::decode(&payload).unwrap();
                pins.lock().unwrap().push(ack.pin.to_string());

                let pk = PublicKey { xpub: "xpub6BosfCn" };
                vec![(kind(&pk), encode(&pk))]
            }
        })
    };

    let d = DeviceHandle::from(t);
    let r = d
        .get_public_key_with_pin(&[0], |challenge| {
            assert_eq!(challenge, PinMatrixKind::Current);
            "1234".to_string()
        })
        .await
        .unwrap();

    assert_eq!(r.xpub, "xpub6BosfCn");
    assert_eq!(pins.lock().unwrap().as_slice(), &["1234".to_string()]);
}

#[tokio::test]
async fn get_public_key_pin_challenge_without_callback() {
    let t = MockTransport::new(|_, _| {
        let p = PinMatrixRequest {
            kind: PinMatrixKind::Current,
        };
        vec![(kind(&p), encode(&p))]
    });

    let d = DeviceHandle::from(t);
    let r = d.get_public_key(&[0]).await;

    assert!(matches!(
        r,
        Err(Error::UnexpectedMessage(k)) if k == MessageKind::PinMatrixRequest as u16
    ));
}

#[tokio::test]
async fn unexpected_message_keeps_session_usable() {
    // First initialize gets an unrelated reply, second a proper Features
    let calls = Arc::new(AtomicUsize::new(0));
    let t = {
        let calls = calls.clone();
        MockTransport::new(move |_, _| {
            match calls.fetch_add(1, Ordering::Relaxed) {
                0 => {
                    let s = Success { message: "?" };
                    vec![(kind(&s), encode(&s))]
                }
                _ => vec![features("Y", 7)],
            }
        })
    };

    let d = DeviceHandle::from(t);

    let r = d.initialize().await;
    assert!(matches!(
        r,
        Err(Error::UnexpectedMessage(k)) if k == MessageKind::Success as u16
    ));

    assert!(d.is_open().await);

    let f = d.initialize().await.unwrap();
    assert_eq!(f.label, "Y");
}

#[tokio::test]
async fn close_is_idempotent_and_terminal() {
    let t = MockTransport::new(|_, _| vec![]);
    let d = DeviceHandle::from(t);

    assert!(d.is_open().await);

    d.close().await;
    d.close().await;

    assert!(!d.is_open().await);
    assert!(matches!(d.ping("hi", false).await, Err(Error::InvalidState)));
    assert!(matches!(d.initialize().await, Err(Error::InvalidState)));
    assert!(matches!(
        d.get_public_key(&[0]).await,
        Err(Error::InvalidState)
    ));
}

#[tokio::test]
async fn concurrent_calls_do_not_interleave() {
    // Multi-packet requests from two tasks on one handle; the mock
    // rejects a frame whose packets interleave with another frame's, so
    // two correct echoes prove exclusivity
    let long_a = "a".repeat(200);
    let long_b = "b".repeat(200);

    let t = MockTransport::new(|k, payload| {
        assert_eq!(k, MessageKind::Ping as u16);

        let (ping, _) = <Ping as encdec::Decode>::decode(&payload).unwrap();
        let s = Success {
            message: ping.message,
        };
        vec![(kind(&s), encode(&s))]
    });

    let d = DeviceHandle::from(t);

    let (ra, rb) = tokio::join!(d.ping(&long_a, false), d.ping(&long_b, false));

    assert_eq!(ra.unwrap(), long_a);
    assert_eq!(rb.unwrap(), long_b);
}

//! End-to-end tests for ucnet-client.
//!
//! Each test drives a full engine over an in-memory duplex stream, with
//! the test body playing the console side: reading the client's frames
//! off the peer end and answering with hand-built protocol frames.

use std::collections::VecDeque;
use std::io::Write;
use std::time::Duration;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tokio::time::timeout;

use ucnet_client::codec::parameter::{decode_float_value, decode_string_value};
use ucnet_client::protocol::{build_frame, Frame, FrameBuffer, FrameType, HELLO_PAYLOAD};
use ucnet_client::{Engine, EngineConfig, EngineEvent, ParamValue, SessionPhase, UcNetError};

const ASSIGNED_TOKEN: [u8; 4] = [0x65, 0x00, 0x6A, 0x00];

/// The console side of a test connection.
struct Console {
    stream: DuplexStream,
    buffer: FrameBuffer,
    queued: VecDeque<Frame>,
}

impl Console {
    fn new(stream: DuplexStream) -> Self {
        Self {
            stream,
            buffer: FrameBuffer::new(),
            queued: VecDeque::new(),
        }
    }

    /// Read until one complete frame is available from the client.
    async fn next_frame(&mut self) -> Frame {
        loop {
            if let Some(frame) = self.queued.pop_front() {
                return frame;
            }
            let mut buf = [0u8; 4096];
            let n = self.stream.read(&mut buf).await.expect("console read");
            assert_ne!(n, 0, "client closed before expected frame");
            self.queued.extend(self.buffer.push(&buf[..n]));
        }
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.expect("console write");
        self.stream.flush().await.expect("console flush");
    }

    async fn send_frame(&mut self, frame_type: FrameType, payload: &[u8]) {
        let bytes = build_frame(frame_type, payload);
        self.send_raw(&bytes).await;
    }

    /// Consume the client's Hello and Subscribe, asserting their shape,
    /// and return the token the Subscribe carried.
    async fn expect_handshake(&mut self) -> [u8; 4] {
        let hello = self.next_frame().await;
        assert_eq!(hello.frame_type, FrameType::Hello);
        assert_eq!(hello.payload(), &HELLO_PAYLOAD);

        let subscribe = self.next_frame().await;
        assert_eq!(subscribe.frame_type, FrameType::Json);
        let payload = subscribe.payload();
        let token: [u8; 4] = payload[..4].try_into().unwrap();
        let body: serde_json::Value = serde_json::from_slice(&payload[8..]).unwrap();
        assert_eq!(body["id"], "Subscribe");
        token
    }

    /// Answer the subscription with the given JSON body and token prefix.
    async fn send_reply(&mut self, token: [u8; 4], json: &str) {
        let mut payload = Vec::new();
        payload.extend_from_slice(&token);
        payload.extend_from_slice(&(json.len() as u32).to_le_bytes());
        payload.extend_from_slice(json.as_bytes());
        self.send_frame(FrameType::Json, &payload).await;
    }

    async fn accept(&mut self) {
        self.send_reply(ASSIGNED_TOKEN, r#"{"id":"SubscriptionReply"}"#)
            .await;
    }
}

async fn recv_event(events: &mut mpsc::Receiver<EngineEvent>) -> EngineEvent {
    timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

async fn connect() -> (Engine, mpsc::Receiver<EngineEvent>, Console) {
    let (client_side, console_side) = tokio::io::duplex(64 * 1024);
    let (engine, events) = Engine::connect(client_side, EngineConfig::default())
        .await
        .unwrap();
    (engine, events, Console::new(console_side))
}

#[tokio::test]
async fn test_handshake_acceptance_adopts_peer_token() {
    let (engine, mut events, mut console) = connect().await;

    let subscribe_token = console.expect_handshake().await;
    assert_eq!(subscribe_token, [0x72, 0x00, 0x65, 0x00]);

    console.accept().await;
    assert_eq!(
        recv_event(&mut events).await,
        EngineEvent::PhaseChanged(SessionPhase::Subscribed)
    );

    // Every write after acceptance must echo the assigned token.
    engine.set_float("line/ch1/volume", 0.75).await.unwrap();

    let frame = console.next_frame().await;
    assert_eq!(frame.frame_type, FrameType::ParamFloat);
    assert_eq!(&frame.payload()[..4], &ASSIGNED_TOKEN);
    let (path, value) = decode_float_value(frame.payload()).unwrap();
    assert_eq!(path, "line/ch1/volume");
    assert!((value - 0.75).abs() < 1e-6);
}

#[tokio::test]
async fn test_rejection_blocks_writes() {
    let (engine, mut events, mut console) = connect().await;

    console.expect_handshake().await;
    console
        .send_reply([0, 0, 0, 0], r#"{"id":"SubscriptionLimitReached"}"#)
        .await;

    let err = engine.wait_until_subscribed(&mut events).await.unwrap_err();
    match err {
        UcNetError::HandshakeRejected(id) => assert_eq!(id, "SubscriptionLimitReached"),
        other => panic!("unexpected error: {other}"),
    }

    assert!(matches!(
        engine.set_float("main/ch1/volume", 0.5).await,
        Err(UcNetError::SessionNotReady(SessionPhase::Rejected))
    ));

    // The failed write must not have produced a frame.
    let quiet = timeout(Duration::from_millis(100), console.next_frame()).await;
    assert!(quiet.is_err(), "unexpected frame after rejected write");
}

#[tokio::test]
async fn test_write_before_acceptance_fails() {
    let (engine, _events, mut console) = connect().await;
    console.expect_handshake().await;

    assert!(matches!(
        engine.set_float("main/ch1/volume", 0.5).await,
        Err(UcNetError::SessionNotReady(SessionPhase::SubscribePending))
    ));
}

#[tokio::test]
async fn test_parameter_updates_flow_through_garbage() {
    let (engine, mut events, mut console) = connect().await;
    console.expect_handshake().await;

    // Garbage before and between frames must be resynchronized away.
    console.send_raw(&[0xDE, 0xAD, 0xBE, 0xEF, 0x55]).await;
    console.accept().await;
    assert_eq!(
        recv_event(&mut events).await,
        EngineEvent::PhaseChanged(SessionPhase::Subscribed)
    );

    console.send_raw(&[0x00, 0x55, 0x43]).await;
    let mut payload = Vec::new();
    payload.extend_from_slice(&ASSIGNED_TOKEN);
    payload.extend_from_slice(b"main/ch2/pan\x00\x00\x00");
    payload.extend_from_slice(&0.25f32.to_le_bytes());
    console.send_frame(FrameType::ParamFloat, &payload).await;

    match recv_event(&mut events).await {
        EngineEvent::ParameterUpdated(update) => {
            assert_eq!(update.path, "main/ch2/pan");
            assert_eq!(update.value, ParamValue::Float(0.25));
            assert!(!update.provisional);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    assert_eq!(
        engine.value("main/ch2/pan").await,
        Some(ParamValue::Float(0.25))
    );
}

#[tokio::test]
async fn test_string_parameter_update() {
    let (engine, mut events, mut console) = connect().await;
    console.expect_handshake().await;
    console.accept().await;
    recv_event(&mut events).await;

    let mut payload = Vec::new();
    payload.extend_from_slice(&ASSIGNED_TOKEN);
    payload.extend_from_slice(b"line/ch3/username\x00\x00\x00Lead Vox\x00");
    console.send_frame(FrameType::ParamString, &payload).await;

    match recv_event(&mut events).await {
        EngineEvent::ParameterUpdated(update) => {
            assert_eq!(update.path, "line/ch3/username");
            assert_eq!(update.value, ParamValue::Text("Lead Vox".to_string()));
        }
        other => panic!("unexpected event: {other:?}"),
    }

    // Engine-side echo: set a string and check the wire shape.
    engine.set_string("line/ch3/username", "Bass").await.unwrap();
    let frame = console.next_frame().await;
    assert_eq!(frame.frame_type, FrameType::ParamString);
    let (path, value) = decode_string_value(frame.payload()).unwrap();
    assert_eq!(path, "line/ch3/username");
    assert_eq!(value, "Bass");
}

#[tokio::test]
async fn test_bulk_block_yields_provisional_updates() {
    let (engine, mut events, mut console) = connect().await;
    console.expect_handshake().await;
    console.accept().await;
    recv_event(&mut events).await;

    let mut body = Vec::new();
    body.extend_from_slice(b"main/ch1/pan\x00");
    body.extend_from_slice(&0.25f32.to_le_bytes());

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&body).unwrap();
    let compressed = encoder.finish().unwrap();

    let mut payload = Vec::new();
    payload.extend_from_slice(&ASSIGNED_TOKEN);
    payload.extend_from_slice(&(body.len() as u32).to_le_bytes());
    payload.extend_from_slice(&compressed);
    console.send_frame(FrameType::BulkZm, &payload).await;

    match recv_event(&mut events).await {
        EngineEvent::ParameterUpdated(update) => {
            assert_eq!(update.path, "main/ch1/pan");
            assert_eq!(update.value, ParamValue::Float(0.25));
            assert!(update.provisional);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    assert_eq!(
        engine.value("main/ch1/pan").await,
        Some(ParamValue::Float(0.25))
    );
}

#[tokio::test]
async fn test_keepalive_round_trip() {
    let (engine, mut events, mut console) = connect().await;
    console.expect_handshake().await;
    console.accept().await;
    recv_event(&mut events).await;

    engine.send_keep_alive().await.unwrap();

    let frame = console.next_frame().await;
    assert_eq!(frame.frame_type, FrameType::KeepAlive);
    assert_eq!(frame.payload_len(), 0);

    // Inbound keepalives are consumed silently.
    console.send_frame(FrameType::KeepAlive, &[]).await;
    let quiet = timeout(Duration::from_millis(100), events.recv()).await;
    assert!(quiet.is_err(), "keepalive must not surface as an event");
}

#[tokio::test]
async fn test_eof_closes_session_and_fails_writes() {
    let (engine, mut events, mut console) = connect().await;
    console.expect_handshake().await;
    console.accept().await;
    recv_event(&mut events).await;

    drop(console);

    assert_eq!(
        recv_event(&mut events).await,
        EngineEvent::PhaseChanged(SessionPhase::Closed)
    );
    assert_eq!(engine.phase().await, SessionPhase::Closed);

    assert!(matches!(
        engine.set_float("main/ch1/volume", 0.5).await,
        Err(UcNetError::TransportClosed)
    ));
}

#[tokio::test]
async fn test_local_close_fails_writes() {
    let (engine, mut events, mut console) = connect().await;
    console.expect_handshake().await;
    console.accept().await;
    recv_event(&mut events).await;

    engine.close().await;

    assert_eq!(engine.phase().await, SessionPhase::Closed);
    assert!(matches!(
        engine.set_float("main/ch1/volume", 0.5).await,
        Err(UcNetError::TransportClosed)
    ));
}

#[tokio::test]
async fn test_malformed_frames_do_not_stop_the_stream() {
    let (_engine, mut events, mut console) = connect().await;
    console.expect_handshake().await;
    console.accept().await;
    recv_event(&mut events).await;

    // Parameter frame with no path terminator: dropped with a warning.
    console
        .send_frame(FrameType::ParamFloat, b"\x72\x00\x65\x00nopath")
        .await;
    // Bulk frame with no zlib stream: dropped.
    console
        .send_frame(FrameType::BulkZm, &[0, 0, 0, 0, 1, 2, 3, 4, 5])
        .await;

    // A good frame afterwards still gets through.
    let mut payload = Vec::new();
    payload.extend_from_slice(&ASSIGNED_TOKEN);
    payload.extend_from_slice(b"aux/ch1/level\x00\x00\x00");
    payload.extend_from_slice(&0.5f32.to_le_bytes());
    console.send_frame(FrameType::ParamFloat, &payload).await;

    match recv_event(&mut events).await {
        EngineEvent::ParameterUpdated(update) => assert_eq!(update.path, "aux/ch1/level"),
        other => panic!("unexpected event: {other:?}"),
    }
}

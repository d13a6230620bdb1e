//! Protocol engine: connection lifecycle and frame dispatch.
//!
//! [`Engine::connect`] takes an established transport and runs the whole
//! client side of the protocol: it performs the Hello/Subscribe handshake,
//! spawns one receive task and one writer task, and returns the engine
//! handle plus an event channel:
//!
//! ```text
//!            ┌────────────► mpsc::Receiver<EngineEvent> (application)
//!            │
//! transport ─┤ receive task ──► FrameBuffer ──► dispatch
//!            │
//!            └─◄ writer task ◄── mpsc ◄── set_float / set_string / keepalive
//! ```
//!
//! Frames are processed strictly in arrival order and events are emitted
//! in that same order. All session state (phase, correlation token,
//! activity timestamp) lives behind a single async mutex that is held only
//! for state reads and transitions, never across transport I/O.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;

use crate::codec::bulk::BulkStateDecoder;
use crate::codec::handshake::{decode_reply, encode_subscribe, ClientDescriptor};
use crate::codec::parameter::{
    decode_float_value, decode_string_value, encode_bool_set, encode_float_set,
    encode_string_set, ParamValue, ParameterUpdate,
};
use crate::error::{Result, UcNetError};
use crate::protocol::{
    build_frame, build_hello_frame, build_keepalive_frame, Frame, FrameBuffer, FrameType,
};
use crate::session::{CorrelationRegistry, CorrelationToken, ReplyOutcome, Session, SessionPhase};
use crate::transport::Transport;
use crate::writer::{spawn_writer_task, WriterHandle, DEFAULT_CHANNEL_CAPACITY};

/// Default capacity of the event channel handed to the application.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Read buffer size for the receive task.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Configuration for [`Engine::connect`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Client descriptor sent in the Subscribe request.
    pub descriptor: ClientDescriptor,
    /// Client-chosen correlation token used until the peer assigns one.
    pub client_token: CorrelationToken,
    /// Outbound frame queue capacity.
    pub channel_capacity: usize,
    /// Event channel capacity. When the application stops draining events
    /// the receive task blocks, which backpressures the socket.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            descriptor: ClientDescriptor::default(),
            client_token: crate::session::DEFAULT_CLIENT_TOKEN,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Events delivered to the application, in frame arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The session handshake phase changed.
    PhaseChanged(SessionPhase),
    /// A parameter value arrived, individually or from a bulk block.
    ParameterUpdated(ParameterUpdate),
}

/// Shared engine internals: session state and the latest-value table.
struct Shared {
    session: Mutex<Session>,
    state: Mutex<HashMap<String, ParamValue>>,
    shutdown: Notify,
}

/// Handle to a running protocol session.
///
/// Cheap to clone; all clones drive the same session. Dropping every
/// clone closes the outbound channel and lets the writer task exit.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<Shared>,
    writer: WriterHandle,
}

impl Engine {
    /// Run the protocol over an established transport.
    ///
    /// Writes the Hello and Subscribe frames, spawns the writer and
    /// receive tasks, and returns immediately; subscription acceptance or
    /// rejection arrives later as a [`EngineEvent::PhaseChanged`] event.
    pub async fn connect<T>(
        stream: T,
        config: EngineConfig,
    ) -> Result<(Engine, mpsc::Receiver<EngineEvent>)>
    where
        T: Transport + 'static,
    {
        let (reader, write_half) = tokio::io::split(stream);
        let (writer, writer_task) = spawn_writer_task(write_half, config.channel_capacity);

        // The session is not shared yet, so the handshake transitions can
        // run without the lock. Queue order fixes wire order: Hello, then
        // Subscribe, before any parameter write can be accepted.
        let mut session =
            Session::new(CorrelationRegistry::with_client_token(config.client_token));
        writer.send(build_hello_frame()).await?;
        session.mark_hello_sent()?;

        let subscribe = encode_subscribe(&config.descriptor, session.current_token())?;
        writer.send(build_frame(FrameType::Json, &subscribe)).await?;
        session.mark_subscribe_sent()?;

        let shared = Arc::new(Shared {
            session: Mutex::new(session),
            state: Mutex::new(HashMap::new()),
            shutdown: Notify::new(),
        });

        let (event_tx, event_rx) = mpsc::channel(config.event_capacity);
        let _receive_task = spawn_receive_task(reader, shared.clone(), event_tx, writer_task);

        Ok((Engine { shared, writer }, event_rx))
    }

    /// Set a float parameter, e.g. a fader level.
    pub async fn set_float(&self, path: &str, value: f32) -> Result<()> {
        let token = self.token_for_write().await?;
        let payload = encode_float_set(path, value, token);
        self.writer
            .send(build_frame(FrameType::ParamFloat, &payload))
            .await
    }

    /// Set a boolean parameter, e.g. mute or solo.
    pub async fn set_bool(&self, path: &str, value: bool) -> Result<()> {
        let token = self.token_for_write().await?;
        let payload = encode_bool_set(path, value, token);
        self.writer
            .send(build_frame(FrameType::ParamFloat, &payload))
            .await
    }

    /// Set a string parameter, e.g. a channel name.
    pub async fn set_string(&self, path: &str, value: &str) -> Result<()> {
        let token = self.token_for_write().await?;
        let payload = encode_string_set(path, value, token);
        self.writer
            .send(build_frame(FrameType::ParamString, &payload))
            .await
    }

    /// Send a keepalive frame.
    ///
    /// Permitted in any live phase; consoles drop clients that go silent
    /// for a few seconds, including during a slow bulk dump.
    pub async fn send_keep_alive(&self) -> Result<()> {
        {
            let mut session = self.shared.session.lock().await;
            match session.phase() {
                SessionPhase::Closed => return Err(UcNetError::TransportClosed),
                SessionPhase::Rejected => {
                    return Err(UcNetError::SessionNotReady(SessionPhase::Rejected))
                }
                _ => session.touch(),
            }
        }
        self.writer.send(build_keepalive_frame()).await
    }

    /// Drain events until the handshake resolves.
    ///
    /// Returns once `Subscribed` is reached; fails with
    /// [`UcNetError::HandshakeRejected`] carrying the peer's rejection id,
    /// or [`UcNetError::TransportClosed`] when the connection dies first.
    /// Only phase events can precede resolution, so nothing is lost.
    pub async fn wait_until_subscribed(
        &self,
        events: &mut mpsc::Receiver<EngineEvent>,
    ) -> Result<()> {
        while let Some(event) = events.recv().await {
            match event {
                EngineEvent::PhaseChanged(SessionPhase::Subscribed) => return Ok(()),
                EngineEvent::PhaseChanged(SessionPhase::Rejected) => {
                    let reason = self
                        .shared
                        .session
                        .lock()
                        .await
                        .rejection_reason()
                        .unwrap_or("subscription refused")
                        .to_string();
                    return Err(UcNetError::HandshakeRejected(reason));
                }
                EngineEvent::PhaseChanged(SessionPhase::Closed) => {
                    return Err(UcNetError::TransportClosed)
                }
                _ => {}
            }
        }
        Err(UcNetError::TransportClosed)
    }

    /// Current handshake phase.
    pub async fn phase(&self) -> SessionPhase {
        self.shared.session.lock().await.phase()
    }

    /// Latest known value for a parameter path, if any has been seen.
    pub async fn value(&self, path: &str) -> Option<ParamValue> {
        self.shared.state.lock().await.get(path).cloned()
    }

    /// Snapshot of every parameter path seen so far with its latest value.
    pub async fn state_snapshot(&self) -> HashMap<String, ParamValue> {
        self.shared.state.lock().await.clone()
    }

    /// Close the session: stops the receive and writer tasks. In-flight
    /// and subsequent writes fail with [`UcNetError::TransportClosed`].
    pub async fn close(&self) {
        self.shared.session.lock().await.close();
        self.shared.shutdown.notify_one();
    }

    /// Read the write token, holding the session lock so the phase check
    /// and the token read are one consistent observation.
    async fn token_for_write(&self) -> Result<CorrelationToken> {
        let mut session = self.shared.session.lock().await;
        let token = session.token_for_write()?;
        session.touch();
        Ok(token)
    }
}

/// Spawn the receive task. When it exits (EOF, read error, or unframeable
/// stream end) the session is closed and a final phase event is emitted.
fn spawn_receive_task<R>(
    reader: R,
    shared: Arc<Shared>,
    events: mpsc::Sender<EngineEvent>,
    writer_task: JoinHandle<Result<()>>,
) -> JoinHandle<()>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        if let Err(err) = receive_loop(reader, &shared, &events).await {
            tracing::warn!(%err, "receive loop terminated");
        }

        writer_task.abort();

        let already_closed = {
            let mut session = shared.session.lock().await;
            let closed = session.phase() == SessionPhase::Closed;
            session.close();
            closed
        };
        if !already_closed {
            let _ = events
                .send(EngineEvent::PhaseChanged(SessionPhase::Closed))
                .await;
        }
    })
}

/// Read transport bytes, extract frames, and dispatch them in order.
async fn receive_loop<R>(
    mut reader: R,
    shared: &Shared,
    events: &mpsc::Sender<EngineEvent>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut frame_buffer = FrameBuffer::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let read = tokio::select! {
            _ = shared.shutdown.notified() => {
                tracing::debug!("session closed locally");
                return Ok(());
            }
            read = reader.read(&mut buf) => read,
        };
        let n = match read {
            Ok(0) => {
                tracing::debug!("transport reached EOF");
                return Ok(());
            }
            Ok(n) => n,
            Err(e) => return Err(UcNetError::Io(e)),
        };

        let frames = frame_buffer.push(&buf[..n]);
        if !frames.is_empty() {
            shared.session.lock().await.touch();
        }

        for frame in frames {
            // Malformed frames are logged and dropped; the stream goes on.
            if let Err(err) = dispatch_frame(&frame, shared, events).await {
                tracing::warn!(frame_type = ?frame.frame_type, %err, "dropping frame");
            }
        }
    }
}

/// Decode one frame and apply its effect: session transitions for
/// handshake replies, state + event emission for parameter traffic.
async fn dispatch_frame(
    frame: &Frame,
    shared: &Shared,
    events: &mpsc::Sender<EngineEvent>,
) -> Result<()> {
    match frame.frame_type {
        FrameType::Json => {
            let reply = decode_reply(frame.payload())?;
            let outcome = shared.session.lock().await.observe_reply(&reply)?;

            match outcome {
                ReplyOutcome::Subscribed => {
                    tracing::debug!(token = ?reply.token, "subscription accepted");
                    let _ = events
                        .send(EngineEvent::PhaseChanged(SessionPhase::Subscribed))
                        .await;
                }
                ReplyOutcome::Rejected(id) => {
                    tracing::warn!(id = %id, "subscription rejected");
                    let _ = events
                        .send(EngineEvent::PhaseChanged(SessionPhase::Rejected))
                        .await;
                }
                ReplyOutcome::Ignored => {}
            }
        }
        FrameType::ParamFloat => {
            let (path, value) = decode_float_value(frame.payload())?;
            let update = ParameterUpdate::confirmed(path, ParamValue::Float(value));
            record_update(shared, events, update).await;
        }
        FrameType::ParamString => {
            let (path, value) = decode_string_value(frame.payload())?;
            let update = ParameterUpdate::confirmed(path, ParamValue::Text(value));
            record_update(shared, events, update).await;
        }
        FrameType::BulkZb | FrameType::BulkZm => {
            let updates = BulkStateDecoder::decode(frame.payload())?;
            for update in updates {
                record_update(shared, events, update).await;
            }
        }
        FrameType::KeepAlive | FrameType::Hello => {
            tracing::trace!(frame_type = ?frame.frame_type, "liveness frame");
        }
        FrameType::ParamList | FrameType::MeterStatus | FrameType::Unknown(_) => {
            tracing::trace!(
                frame_type = ?frame.frame_type,
                len = frame.payload_len(),
                "ignoring frame"
            );
        }
    }
    Ok(())
}

/// Store the latest value for a path and emit the update event.
async fn record_update(
    shared: &Shared,
    events: &mpsc::Sender<EngineEvent>,
    update: ParameterUpdate,
) {
    shared
        .state
        .lock()
        .await
        .insert(update.path.clone(), update.value.clone());
    let _ = events.send(EngineEvent::ParameterUpdated(update)).await;
}

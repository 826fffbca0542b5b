//! Connection manager for the chat client.
//!
//! Owns the socket (through a [`NetClient`]), the [`RoomSessionState`]
//! projection, and the [`SessionStore`], providing the shared dispatch logic:
//!
//! - Processing inbound [`NetEvent`]s in delivery order and updating state.
//! - Forwarding outbound intents (create / join / chat) to the server.
//! - Consulting the session cache on open and replaying a `rejoin` handshake.
//!
//! Frontends only need to:
//! 1. Call [`ClientController::connect`] to establish a connection.
//! 2. Call [`ClientController::recv`] or [`ClientController::try_recv`] to
//!    process server events.
//! 3. Call the intent methods to transmit user actions.
//!
//! The raw transport is never exposed; no retry or reconnect happens behind
//! the embedder's back — a dropped connection stays dropped until `connect`
//! is called again, at which point the cached session (if still valid)
//! triggers a fresh rejoin.

use thiserror::Error;

use banter_core::protocol::{ClientFrame, ServerFrame, normalize_room_id};
use banter_core::transport::Transport;
use banter_core::ws_transport::WsTransport;

use crate::net_client::{NetClient, NetEvent};
use crate::room_state::{JoinPhase, RoomSessionState, StateChanged};
use crate::session::{SessionStore, now_ms};

/// Connection lifecycle. The socket exists only in `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Open,
    Closed,
}

/// Outcome of processing a single network event.
#[derive(Debug)]
pub enum PollResult {
    /// A server event was applied; the returned [`StateChanged`] flags
    /// describe what was modified.
    Updated(StateChanged),
    /// The connection is gone (server close, I/O error, or never opened).
    Disconnected,
    /// No event was available (channel empty).
    Empty,
}

/// Errors surfaced to the embedder. Everything else degrades to state.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The transport-level connect failed (bad URL, server down, ...).
    #[error("failed to connect: {0}")]
    Connect(String),
}

/// Owns the network client, session cache, and room state.
pub struct ClientController<S: SessionStore> {
    conn: ConnectionState,
    net: Option<NetClient>,
    pub state: RoomSessionState,
    store: S,
}

impl<S: SessionStore> ClientController<S> {
    /// A controller with no connection yet.
    pub fn new(store: S) -> Self {
        Self {
            conn: ConnectionState::Disconnected,
            net: None,
            state: RoomSessionState::new(),
            store,
        }
    }

    /// Open the WebSocket connection.
    ///
    /// On success the message thread resets and, if the session cache holds a
    /// valid record, a `rejoin` frame is sent before any user-initiated
    /// frame — at most once per open.
    pub async fn connect(&mut self, url: &str) -> Result<(), ClientError> {
        self.conn = ConnectionState::Connecting;
        let transport = match WsTransport::connect(url).await {
            Ok(t) => t,
            Err(e) => {
                self.conn = ConnectionState::Disconnected;
                return Err(ClientError::Connect(e.to_string()));
            }
        };
        self.attach_transport(transport);
        Ok(())
    }

    /// Attach an already-established transport (the seam tests use to feed
    /// frames deterministically).
    pub fn attach_transport<T: Transport>(&mut self, transport: T) {
        self.net = Some(NetClient::from_transport(transport));
        self.on_open();
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.conn
    }

    /// Borrow the session store (e.g. to clear it from a `--fresh` flag).
    pub fn session_store(&self) -> &S {
        &self.store
    }

    /// Explicit teardown. Dropping the net client ends both I/O tasks and
    /// with them the underlying stream.
    pub fn close(&mut self) {
        self.net = None;
        self.conn = ConnectionState::Closed;
        self.state.connected = false;
    }

    // ------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------

    /// Await the next network event and apply it. Useful in
    /// `tokio::select!` loops.
    pub async fn recv(&mut self) -> PollResult {
        let Some(net) = self.net.as_mut() else {
            return PollResult::Disconnected;
        };
        match net.incoming.recv().await {
            Some(event) => self.dispatch(event),
            None => self.on_disconnect(),
        }
    }

    /// Try to receive and apply one network event (non-blocking).
    pub fn try_recv(&mut self) -> PollResult {
        let Some(net) = self.net.as_mut() else {
            return PollResult::Disconnected;
        };
        match net.incoming.try_recv() {
            Ok(event) => self.dispatch(event),
            Err(tokio::sync::mpsc::error::TryRecvError::Empty) => PollResult::Empty,
            Err(tokio::sync::mpsc::error::TryRecvError::Disconnected) => self.on_disconnect(),
        }
    }

    // ------------------------------------------------------------------
    // Outbound intents
    // ------------------------------------------------------------------
    //
    // All intents are silently dropped — not queued — when the connection
    // is not open.

    /// Request a new room. The server assigns the ID and answers with a
    /// `connection` frame; nothing is assumed locally beyond the username.
    pub fn create_room(&mut self, username: &str) {
        if !self.is_open() {
            tracing::debug!("dropping createRoom intent: connection not open");
            return;
        }
        let username = username.trim().to_string();
        self.state.username = username.clone();
        self.send_frame(ClientFrame::CreateRoom { username });
    }

    /// Join an existing room.
    ///
    /// Optimistic: username/room are adopted and the session persisted before
    /// the server answers, so the UI can proceed assuming success; a later
    /// `error` frame rolls both back.
    pub fn join_room(&mut self, username: &str, room_id: &str) {
        if !self.is_open() {
            tracing::debug!("dropping join intent: connection not open");
            return;
        }
        let username = username.trim().to_string();
        let room_id = normalize_room_id(room_id);

        self.state.username = username.clone();
        self.state.room_id = room_id.clone();
        self.state.phase = JoinPhase::Pending;
        self.store.save(&username, &room_id);

        self.send_frame(ClientFrame::Join { username, room_id });
    }

    /// Send a chat message to the current room.
    ///
    /// Requires a room (at least optimistically) — the frontend is
    /// responsible for rejecting empty input.
    pub fn send_chat(&mut self, text: &str) {
        if !self.is_open() {
            tracing::debug!("dropping chat intent: connection not open");
            return;
        }
        if self.state.room_id.is_empty() {
            tracing::debug!("dropping chat intent: no room");
            return;
        }
        self.send_frame(ClientFrame::Chat {
            username: self.state.username.clone(),
            room_id: self.state.room_id.clone(),
            message: text.to_string(),
            timestamp: Some(now_ms()),
        });
    }

    // -- private -----------------------------------------------------------

    fn is_open(&self) -> bool {
        self.conn == ConnectionState::Open && self.net.is_some()
    }

    fn send_frame(&self, frame: ClientFrame) {
        if let Some(net) = &self.net
            && net.send(frame).is_err()
        {
            tracing::debug!("writer task gone; frame dropped");
        }
    }

    /// Transport-level open: reset the thread, then replay the cached
    /// session as a `rejoin` handshake if it is still valid.
    fn on_open(&mut self) {
        self.conn = ConnectionState::Open;
        self.state.reset();
        self.state.connected = true;

        if let Some(record) = self.store.load() {
            tracing::info!(room = %record.room_id, "resuming cached session");
            self.state.username = record.username.clone();
            self.state.room_id = record.room_id.clone();
            self.state.phase = JoinPhase::Pending;
            self.send_frame(ClientFrame::Rejoin {
                username: record.username,
                room_id: record.room_id,
            });
        }
    }

    fn on_disconnect(&mut self) -> PollResult {
        // A close is not a rejection: the session cache survives so a
        // fresh connect can rejoin.
        self.net = None;
        self.conn = ConnectionState::Disconnected;
        self.state.connected = false;
        PollResult::Disconnected
    }

    /// The single dispatcher: every inbound event funnels through here, in
    /// transport delivery order.
    fn dispatch(&mut self, event: NetEvent) -> PollResult {
        match event {
            NetEvent::Frame(frame) => {
                // Session-cache side effects precede the in-memory update.
                match &frame {
                    ServerFrame::Connection { room_id, username } => {
                        self.store.save(username, room_id);
                    }
                    ServerFrame::Error { message } => {
                        // The room may be gone or the rejection permanent;
                        // either way the cached session is invalid.
                        tracing::warn!(%message, "server reported an error");
                        self.store.clear();
                    }
                    _ => {}
                }
                PollResult::Updated(self.state.apply_server_frame(&frame, now_ms()))
            }
            NetEvent::Malformed(raw) => {
                tracing::warn!(raw = %raw, "discarding unparseable frame");
                self.state.last_error = Some("Received an unreadable message".to_string());
                PollResult::Updated(StateChanged {
                    error: true,
                    ..StateChanged::default()
                })
            }
            NetEvent::Error(e) => {
                tracing::warn!("connection error: {}", e);
                self.on_disconnect()
            }
            NetEvent::Disconnected => self.on_disconnect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{MemorySessionStore, SESSION_TTL_MS, SessionRecord};
    use banter_core::transport::{TransportError, TransportReader, TransportWriter};
    use tokio::sync::mpsc;

    // ------------------------------------------------------------------
    // Channel-backed fake transport
    // ------------------------------------------------------------------

    struct FakeReader {
        rx: mpsc::UnboundedReceiver<String>,
    }

    impl TransportReader for FakeReader {
        async fn recv(&mut self) -> Result<Option<String>, TransportError> {
            Ok(self.rx.recv().await)
        }
    }

    struct FakeWriter {
        tx: mpsc::UnboundedSender<String>,
    }

    impl TransportWriter for FakeWriter {
        async fn send(&mut self, text: &str) -> Result<(), TransportError> {
            self.tx
                .send(text.to_string())
                .map_err(|_| TransportError::ConnectionClosed)
        }
    }

    struct FakeTransport {
        reader: FakeReader,
        writer: FakeWriter,
    }

    impl Transport for FakeTransport {
        type Reader = FakeReader;
        type Writer = FakeWriter;

        fn split(self) -> (Self::Reader, Self::Writer) {
            (self.reader, self.writer)
        }
    }

    /// Returns (transport, inject-inbound, captured-outbound).
    fn fake_transport() -> (
        FakeTransport,
        mpsc::UnboundedSender<String>,
        mpsc::UnboundedReceiver<String>,
    ) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        (
            FakeTransport {
                reader: FakeReader { rx: in_rx },
                writer: FakeWriter { tx: out_tx },
            },
            in_tx,
            out_rx,
        )
    }

    fn server_json(frame: &ServerFrame) -> String {
        serde_json::to_string(frame).unwrap()
    }

    async fn next_outbound(out_rx: &mut mpsc::UnboundedReceiver<String>) -> ClientFrame {
        let raw = tokio::time::timeout(std::time::Duration::from_secs(1), out_rx.recv())
            .await
            .expect("timed out waiting for an outbound frame")
            .expect("writer channel closed");
        serde_json::from_str(&raw).unwrap()
    }

    fn valid_record(username: &str, room_id: &str) -> SessionRecord {
        SessionRecord::new(username, room_id, now_ms())
    }

    // ------------------------------------------------------------------
    // Rejoin handshake
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn rejoin_is_sent_first_and_exactly_once() {
        let store = MemorySessionStore::with_record(valid_record("bob", "XY99"));
        let mut ctrl = ClientController::new(store);
        let (transport, _in_tx, mut out_rx) = fake_transport();

        ctrl.attach_transport(transport);
        // A user intent right after open must come out *after* the rejoin.
        ctrl.send_chat("hi");

        assert_eq!(
            next_outbound(&mut out_rx).await,
            ClientFrame::Rejoin {
                username: "bob".to_string(),
                room_id: "XY99".to_string(),
            }
        );
        match next_outbound(&mut out_rx).await {
            ClientFrame::Chat {
                message, room_id, ..
            } => {
                assert_eq!(message, "hi");
                assert_eq!(room_id, "XY99");
            }
            other => panic!("expected chat frame, got {:?}", other),
        }

        // Nothing else was sent — in particular, no second rejoin.
        assert!(out_rx.try_recv().is_err());
        assert_eq!(ctrl.state.phase, JoinPhase::Pending);
        assert_eq!(ctrl.state.username, "bob");
    }

    #[tokio::test]
    async fn no_rejoin_without_a_valid_cached_session() {
        let store = MemorySessionStore::with_record(SessionRecord {
            username: "bob".to_string(),
            room_id: "XY99".to_string(),
            expires_at: now_ms() - 1,
        });
        let mut ctrl = ClientController::new(store);
        let (transport, _in_tx, mut out_rx) = fake_transport();

        ctrl.attach_transport(transport);
        ctrl.create_room("carol");

        // The first (and only) outbound frame is the user's, not a rejoin.
        assert_eq!(
            next_outbound(&mut out_rx).await,
            ClientFrame::CreateRoom {
                username: "carol".to_string(),
            }
        );
        // The expired record was purged at open.
        assert!(ctrl.session_store().load().is_none());
    }

    // ------------------------------------------------------------------
    // Inbound dispatch
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn connection_frame_persists_the_session() {
        let mut ctrl = ClientController::new(MemorySessionStore::new());
        let (transport, in_tx, _out_rx) = fake_transport();
        ctrl.attach_transport(transport);

        let before = now_ms();
        in_tx
            .send(server_json(&ServerFrame::Connection {
                room_id: "AB12".to_string(),
                username: "alice".to_string(),
            }))
            .unwrap();

        match ctrl.recv().await {
            PollResult::Updated(changed) => assert!(changed.membership),
            other => panic!("expected update, got {:?}", other),
        }

        assert!(ctrl.state.joined());
        assert_eq!(ctrl.state.room_id, "AB12");
        assert_eq!(ctrl.state.username, "alice");

        let record = ctrl.session_store().load().expect("session persisted");
        assert_eq!(record.username, "alice");
        assert_eq!(record.room_id, "AB12");
        let ttl = record.expires_at - before;
        assert!(ttl >= SESSION_TTL_MS && ttl < SESSION_TTL_MS + 10_000);
    }

    #[tokio::test]
    async fn error_frame_rolls_back_and_clears_the_cache() {
        let mut ctrl = ClientController::new(MemorySessionStore::new());
        let (transport, in_tx, mut out_rx) = fake_transport();
        ctrl.attach_transport(transport);

        ctrl.join_room("bob", "xy99");
        // Optimistic: session persisted before the server answers.
        assert!(ctrl.session_store().load().is_some());
        assert_eq!(
            next_outbound(&mut out_rx).await,
            ClientFrame::Join {
                username: "bob".to_string(),
                room_id: "XY99".to_string(),
            }
        );

        in_tx
            .send(server_json(&ServerFrame::Error {
                message: "Room does not exist".to_string(),
            }))
            .unwrap();
        ctrl.recv().await;

        assert_eq!(ctrl.state.phase, JoinPhase::NotJoined);
        assert_eq!(
            ctrl.state.last_error.as_deref(),
            Some("Room does not exist")
        );
        assert!(ctrl.session_store().load().is_none());
    }

    #[tokio::test]
    async fn frames_are_dispatched_in_delivery_order() {
        let mut ctrl = ClientController::new(MemorySessionStore::new());
        let (transport, in_tx, _out_rx) = fake_transport();
        ctrl.attach_transport(transport);

        for (msg, ts) in [("m1", 3_000), ("m2", 1_000), ("m3", 2_000)] {
            in_tx
                .send(server_json(&ServerFrame::Chat {
                    username: None,
                    room_id: None,
                    message: msg.to_string(),
                    timestamp: Some(ts),
                }))
                .unwrap();
        }
        for _ in 0..3 {
            ctrl.recv().await;
        }

        let contents: Vec<&str> = ctrl
            .state
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, ["m1", "m2", "m3"]);
    }

    #[tokio::test]
    async fn malformed_frame_sets_error_without_touching_the_room() {
        let store = MemorySessionStore::with_record(valid_record("bob", "XY99"));
        let mut ctrl = ClientController::new(store);
        let (transport, in_tx, _out_rx) = fake_transport();
        ctrl.attach_transport(transport);

        in_tx.send("this is not a frame".to_string()).unwrap();
        match ctrl.recv().await {
            PollResult::Updated(changed) => {
                assert!(changed.error);
                assert!(!changed.membership);
                assert!(!changed.messages);
            }
            other => panic!("expected update, got {:?}", other),
        }

        assert!(ctrl.state.last_error.is_some());
        assert_eq!(ctrl.state.username, "bob");
        assert_eq!(ctrl.state.room_id, "XY99");
        assert!(ctrl.state.messages.is_empty());
        // Connection stays open; parse errors are not disconnects.
        assert_eq!(ctrl.connection_state(), ConnectionState::Open);
    }

    #[tokio::test]
    async fn server_close_keeps_the_session_cache() {
        let store = MemorySessionStore::with_record(valid_record("bob", "XY99"));
        let mut ctrl = ClientController::new(store);
        let (transport, in_tx, _out_rx) = fake_transport();
        ctrl.attach_transport(transport);

        drop(in_tx); // server closes
        match ctrl.recv().await {
            PollResult::Disconnected => {}
            other => panic!("expected disconnect, got {:?}", other),
        }

        assert!(!ctrl.state.connected);
        assert_eq!(ctrl.connection_state(), ConnectionState::Disconnected);
        // A close is not a rejection — the cache survives for the next open.
        assert!(ctrl.session_store().load().is_some());
    }

    // ------------------------------------------------------------------
    // Outbound gating
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn intents_before_open_are_dropped_not_queued() {
        let mut ctrl = ClientController::new(MemorySessionStore::new());

        // No connection at all: nothing to send, nothing panics.
        ctrl.send_chat("hi");
        ctrl.create_room("alice");
        ctrl.join_room("alice", "AB12");
        assert!(matches!(ctrl.try_recv(), PollResult::Disconnected));

        // Now open — the earlier intents must NOT have been queued.
        let (transport, _in_tx, mut out_rx) = fake_transport();
        ctrl.attach_transport(transport);
        ctrl.create_room("alice");
        assert_eq!(
            next_outbound(&mut out_rx).await,
            ClientFrame::CreateRoom {
                username: "alice".to_string(),
            }
        );
        assert!(out_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn intents_after_close_are_dropped() {
        let mut ctrl = ClientController::new(MemorySessionStore::new());
        let (transport, _in_tx, mut out_rx) = fake_transport();
        ctrl.attach_transport(transport);

        ctrl.close();
        assert_eq!(ctrl.connection_state(), ConnectionState::Closed);
        ctrl.send_chat("hi");
        ctrl.create_room("alice");

        // The writer side is gone entirely.
        assert!(out_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn chat_without_a_room_is_dropped() {
        let mut ctrl = ClientController::new(MemorySessionStore::new());
        let (transport, _in_tx, mut out_rx) = fake_transport();
        ctrl.attach_transport(transport);

        ctrl.send_chat("hello?");
        ctrl.create_room("alice"); // probe: proves the channel still works

        assert_eq!(
            next_outbound(&mut out_rx).await,
            ClientFrame::CreateRoom {
                username: "alice".to_string(),
            }
        );
    }
}

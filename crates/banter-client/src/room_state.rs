//! In-memory projection of the room session.
//!
//! Everything the frontend renders lives here, derived purely from inbound
//! server frames. [`RoomSessionState::apply_server_frame`] is the single
//! dispatcher: feeding it frames synchronously reproduces exactly what the
//! live connection would do, which is what keeps the client deterministic
//! under test.

use banter_core::protocol::ServerFrame;

/// One message in the thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub content: String,
    /// Unix epoch milliseconds. Server-stamped when provided, otherwise the
    /// local receipt time (display only, not authoritative).
    pub timestamp: i64,
}

/// Room membership as a two-phase state.
///
/// `Pending` is the optimistic window between sending `join`/`rejoin` and the
/// server's verdict; an `error` frame rolls it back to `NotJoined`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinPhase {
    #[default]
    NotJoined,
    Pending,
    Confirmed,
}

/// Describes what changed after applying a server frame, so the frontend can
/// decide what to re-render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateChanged {
    /// Username, room ID, or join phase changed.
    pub membership: bool,
    /// The message thread grew.
    pub messages: bool,
    /// `last_error` was set.
    pub error: bool,
}

impl StateChanged {
    /// Returns `true` if any flag is set.
    pub fn any(self) -> bool {
        self.membership || self.messages || self.error
    }
}

/// Client-side view of the current session.
#[derive(Debug, Clone, Default)]
pub struct RoomSessionState {
    pub username: String,
    pub room_id: String,
    pub phase: JoinPhase,
    /// Append-only for the lifetime of one connection, in receipt order.
    pub messages: Vec<ChatEntry>,
    pub last_error: Option<String>,
    pub connected: bool,
}

impl RoomSessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether we are confirmed inside a room.
    pub fn joined(&self) -> bool {
        self.phase == JoinPhase::Confirmed
    }

    /// Reset for a fresh connection: thread and errors are wiped, identity
    /// stays (a rejoin may immediately reclaim it).
    pub fn reset(&mut self) {
        self.messages.clear();
        self.last_error = None;
        self.phase = JoinPhase::NotJoined;
    }

    /// Apply one inbound frame. `received_at` is the local receipt time in
    /// epoch milliseconds, used to stamp chat messages the server left
    /// unstamped.
    pub fn apply_server_frame(&mut self, frame: &ServerFrame, received_at: i64) -> StateChanged {
        let mut changed = StateChanged::default();

        match frame {
            ServerFrame::Connection { room_id, username } => {
                // Server-assigned values are authoritative.
                self.room_id = room_id.clone();
                self.username = username.clone();
                self.phase = JoinPhase::Confirmed;
                self.last_error = None;
                changed.membership = true;
            }
            ServerFrame::Joined { room_id } => {
                self.room_id = room_id.clone();
                self.phase = JoinPhase::Confirmed;
                changed.membership = true;
            }
            ServerFrame::Chat {
                message, timestamp, ..
            } => {
                self.messages.push(ChatEntry {
                    content: message.clone(),
                    timestamp: timestamp.unwrap_or(received_at),
                });
                changed.messages = true;
            }
            ServerFrame::Error { message } => {
                self.last_error = Some(message.clone());
                self.phase = JoinPhase::NotJoined;
                changed.membership = true;
                changed.error = true;
            }
        }

        changed
    }
}

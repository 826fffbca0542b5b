use serde::{Deserialize, Serialize};

/// Messages sent from client to server.
///
/// Every frame is one JSON object of the form
/// `{"messageType": "...", "payload": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "messageType", content = "payload", rename_all = "camelCase")]
pub enum ClientFrame {
    /// Request a new room. The server assigns the room ID and delivers it
    /// later via [`ServerFrame::Connection`].
    #[serde(rename_all = "camelCase")]
    CreateRoom { username: String },

    /// Request to join an existing room.
    #[serde(rename_all = "camelCase")]
    Join { username: String, room_id: String },

    /// Silent resume after reconnect, using a locally cached session.
    #[serde(rename_all = "camelCase")]
    Rejoin { username: String, room_id: String },

    /// Send a chat message to the current room.
    #[serde(rename_all = "camelCase")]
    Chat {
        username: String,
        room_id: String,
        message: String,
        /// Unix epoch milliseconds. Omitted when the sender didn't stamp it.
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "messageType", content = "payload", rename_all = "camelCase")]
pub enum ServerFrame {
    /// Room created/assigned acknowledgment. The carried values are
    /// authoritative — the client adopts both.
    #[serde(rename_all = "camelCase")]
    Connection { room_id: String, username: String },

    /// Join acknowledgment.
    #[serde(rename_all = "camelCase")]
    Joined { room_id: String },

    /// A chat message broadcast to the room.
    #[serde(rename_all = "camelCase")]
    Chat {
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        room_id: Option<String>,
        message: String,
        /// Unix epoch milliseconds; the client stamps receipt time if absent.
        #[serde(default)]
        timestamp: Option<i64>,
    },

    /// Failure notice (e.g. "room not found").
    #[serde(rename_all = "camelCase")]
    Error { message: String },
}

// ---------------------------------------------------------------------------
// Room ID handling
// ---------------------------------------------------------------------------

/// Normalize a room ID for storage and the wire: trimmed, ASCII-uppercased.
///
/// Room codes are short and case-insensitive on the server, so the client
/// keeps one canonical form everywhere.
pub fn normalize_room_id(id: &str) -> String {
    id.trim().to_ascii_uppercase()
}

/// Validate a (normalized) room ID.
///
/// Room IDs must be non-empty, alphanumeric, and fewer than 20 characters.
pub fn validate_room_id(id: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err("Room ID cannot be empty".to_string());
    }
    if id.len() >= 20 {
        return Err("Room ID must be fewer than 20 characters".to_string());
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err("Room ID must be alphanumeric".to_string());
    }
    Ok(())
}

/// Validate a username: non-empty after trimming.
pub fn validate_username(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Username cannot be empty".to_string());
    }
    Ok(())
}

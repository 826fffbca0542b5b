//! Local session persistence.
//!
//! The client caches its last successful `{username, room}` association so a
//! restart within the TTL can silently rejoin the room instead of showing the
//! join form again. The cache is a single JSON record; an expired or
//! unreadable record is indistinguishable from no record at all and is purged
//! on sight.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use banter_core::protocol::normalize_room_id;

/// How long a saved session stays resumable: 1 hour from the last save.
pub const SESSION_TTL_MS: i64 = 60 * 60 * 1000;

/// Current time as Unix epoch milliseconds.
pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// The locally cached association between a username and the room it last
/// joined. Serialized as `{"username", "roomId", "expiresAt"}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub username: String,
    pub room_id: String,
    /// Expiry as Unix epoch milliseconds.
    pub expires_at: i64,
}

impl SessionRecord {
    /// Build a record expiring [`SESSION_TTL_MS`] after `now_ms`.
    ///
    /// The room ID is stored uppercase-normalized.
    pub fn new(username: &str, room_id: &str, now_ms: i64) -> Self {
        Self {
            username: username.to_string(),
            room_id: normalize_room_id(room_id),
            expires_at: now_ms + SESSION_TTL_MS,
        }
    }

    /// A record is valid only while its expiry is strictly in the future.
    pub fn is_valid(&self, now_ms: i64) -> bool {
        self.expires_at > now_ms
    }
}

// ---------------------------------------------------------------------------
// SessionStore trait
// ---------------------------------------------------------------------------

/// Abstraction over session storage so the connection manager stays
/// platform-agnostic.
///
/// All three operations are infallible from the caller's point of view:
/// storage failures degrade to "no session" and are logged, never raised.
pub trait SessionStore {
    /// Persist a session, overwriting any prior record. Expiry is refreshed
    /// to [`SESSION_TTL_MS`] from now on every save.
    fn save(&self, username: &str, room_id: &str);

    /// Load the saved session, if one exists and has not expired.
    ///
    /// An expired or malformed record is purged and reported as absent.
    fn load(&self) -> Option<SessionRecord>;

    /// Remove the saved session. Idempotent.
    fn clear(&self);
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

/// One JSON file under the platform data directory.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Store at the default location,
    /// `<platform data dir>/banter/session.json`.
    pub fn new() -> Self {
        let base = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
        Self {
            path: base.join("banter").join("session.json"),
        }
    }

    /// Store at an explicit path.
    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    fn write_record(&self, record: &SessionRecord) {
        if let Some(parent) = self.path.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            tracing::warn!("failed to create session dir: {}", e);
            return;
        }
        match serde_json::to_string(record) {
            Ok(json) => {
                if let Err(e) = fs::write(&self.path, json) {
                    tracing::warn!("failed to write session file: {}", e);
                }
            }
            Err(e) => tracing::warn!("failed to encode session record: {}", e),
        }
    }
}

impl Default for FileSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for FileSessionStore {
    fn save(&self, username: &str, room_id: &str) {
        self.write_record(&SessionRecord::new(username, room_id, now_ms()));
    }

    fn load(&self) -> Option<SessionRecord> {
        let raw = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str::<SessionRecord>(&raw) {
            Ok(record) if record.is_valid(now_ms()) => Some(record),
            Ok(_) => {
                // Expired — purge eagerly so later loads don't reparse it.
                self.clear();
                None
            }
            Err(e) => {
                tracing::warn!("purging malformed session file: {}", e);
                self.clear();
                None
            }
        }
    }

    fn clear(&self) {
        if let Err(e) = fs::remove_file(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!("failed to remove session file: {}", e);
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Volatile store for tests and embedders that don't want disk persistence.
#[derive(Default)]
pub struct MemorySessionStore {
    record: Mutex<Option<SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a pre-seeded record (expiry included, unvalidated).
    pub fn with_record(record: SessionRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, username: &str, room_id: &str) {
        *self.record.lock().unwrap() = Some(SessionRecord::new(username, room_id, now_ms()));
    }

    fn load(&self) -> Option<SessionRecord> {
        let mut guard = self.record.lock().unwrap();
        match guard.as_ref() {
            Some(record) if record.is_valid(now_ms()) => Some(record.clone()),
            Some(_) => {
                *guard = None;
                None
            }
            None => None,
        }
    }

    fn clear(&self) {
        *self.record.lock().unwrap() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, FileSessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::at(dir.path().join("session.json"));
        (dir, store)
    }

    #[test]
    fn save_then_load_round_trips() {
        let (_dir, store) = temp_store();
        store.save("alice", "ab12");

        let record = store.load().expect("record should be present");
        assert_eq!(record.username, "alice");
        assert_eq!(record.room_id, "AB12"); // normalized on save
        assert!(record.is_valid(now_ms()));
    }

    #[test]
    fn expiry_is_one_hour_from_save() {
        let (_dir, store) = temp_store();
        let before = now_ms();
        store.save("alice", "AB12");
        let record = store.load().unwrap();

        let delta = record.expires_at - before;
        assert!(delta >= SESSION_TTL_MS);
        assert!(delta < SESSION_TTL_MS + 10_000);
    }

    #[test]
    fn repeated_save_keeps_one_record_with_fresh_expiry() {
        let (_dir, store) = temp_store();
        store.save("alice", "AB12");
        let first = store.load().unwrap();
        store.save("alice", "AB12");
        let second = store.load().unwrap();

        assert_eq!(first.username, second.username);
        assert_eq!(first.room_id, second.room_id);
        assert!(second.expires_at >= first.expires_at);
    }

    #[test]
    fn expired_record_is_purged_on_load() {
        let (_dir, store) = temp_store();
        store.save("bob", "XY99");

        // Rewrite the file with an expiry in the past.
        let expired = SessionRecord {
            username: "bob".to_string(),
            room_id: "XY99".to_string(),
            expires_at: now_ms() - 1,
        };
        fs::write(
            store.path.clone(),
            serde_json::to_string(&expired).unwrap(),
        )
        .unwrap();

        assert!(store.load().is_none());
        // Purged: the file itself is gone, not just reported absent.
        assert!(!store.path.exists());
    }

    #[test]
    fn malformed_file_is_purged_on_load() {
        let (_dir, store) = temp_store();
        fs::create_dir_all(store.path.parent().unwrap()).unwrap();
        fs::write(store.path.clone(), "{not json").unwrap();

        assert!(store.load().is_none());
        assert!(!store.path.exists());
    }

    #[test]
    fn clear_is_idempotent() {
        let (_dir, store) = temp_store();
        store.clear();
        store.save("alice", "AB12");
        store.clear();
        store.clear();
        assert!(store.load().is_none());
    }

    #[test]
    fn record_uses_camel_case_on_disk() {
        let record = SessionRecord::new("alice", "AB12", 1_000);
        let json: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(json["username"], "alice");
        assert_eq!(json["roomId"], "AB12");
        assert_eq!(json["expiresAt"], 1_000 + SESSION_TTL_MS);
    }

    #[test]
    fn memory_store_expires_too() {
        let store = MemorySessionStore::with_record(SessionRecord {
            username: "bob".to_string(),
            room_id: "XY99".to_string(),
            expires_at: now_ms() - 1,
        });
        assert!(store.load().is_none());

        store.save("bob", "XY99");
        assert!(store.load().is_some());
        store.clear();
        assert!(store.load().is_none());
    }
}

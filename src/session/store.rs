use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::model::{Session, SessionStats};
use super::storage::StorageBackend;
use crate::captions::CaptionData;
use crate::error::{Result, YtSubError};
use crate::subtitles::{Cue, CueList, CuePatch, Nudge, TimeField};

/// Sessions older than this are removed by cleanup
pub const SESSION_MAX_AGE_MS: i64 = 7 * 24 * 60 * 60 * 1000;

const PERSIST_VERSION: u32 = 0;
const EVENT_CAPACITY: usize = 64;

/// Change notifications published by [`SessionStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    SessionAdded(String),
    SessionRemoved(String),
    CuesChanged { session_id: String, cue_id: String },
    SessionsExpired(Vec<String>),
}

#[derive(Deserialize)]
struct PersistedStore {
    #[serde(default)]
    state: PersistedState,
    #[serde(default)]
    version: u32,
}

#[derive(Default, Deserialize)]
struct PersistedState {
    #[serde(default)]
    sessions: HashMap<String, Session>,
}

#[derive(Serialize)]
struct PersistedStoreRef<'a> {
    state: PersistedStateRef<'a>,
    version: u32,
}

#[derive(Serialize)]
struct PersistedStateRef<'a> {
    sessions: BTreeMap<&'a str, &'a Session>,
}

/// Keyed collection of editing sessions.
///
/// Cue edits go through the session-addressed methods below. A session or
/// cue id that does not resolve is logged and the call is a no-op.
#[derive(Debug)]
pub struct SessionStore {
    sessions: HashMap<String, Session>,
    max_age_ms: i64,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_max_age_ms(SESSION_MAX_AGE_MS)
    }

    pub fn with_max_age_ms(max_age_ms: i64) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            sessions: HashMap::new(),
            max_age_ms,
            events,
        }
    }

    /// Receive change notifications from now on
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Create a session from freshly fetched captions, stamped with the current time
    pub fn add_session(&mut self, id: impl Into<String>, data: CaptionData, url: impl Into<String>) -> &Session {
        let created_at = Utc::now().timestamp_millis();
        self.add_session_at(id, data, url, created_at)
    }

    /// Create a session with an explicit creation time
    pub fn add_session_at(
        &mut self,
        id: impl Into<String>,
        mut data: CaptionData,
        url: impl Into<String>,
        created_at: i64,
    ) -> &Session {
        data.subtitles.assign_missing_ids();
        data.subtitles.renumber();

        let session = Session::new(id, data, url, created_at);
        info!(
            "🆕 Created session {} for {} ({} cues)",
            session.id,
            session.video_id(),
            session.subtitles().len()
        );
        self.insert_session(session)
    }

    /// Insert a fully formed session, replacing any with the same id
    pub fn insert_session(&mut self, session: Session) -> &Session {
        let id = session.id.clone();
        if self.sessions.insert(id.clone(), session).is_some() {
            debug!("Replaced existing session {}", id);
        }
        self.emit(StoreEvent::SessionAdded(id.clone()));
        &self.sessions[&id]
    }

    pub fn get_session(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn remove_session(&mut self, id: &str) -> Option<Session> {
        let removed = self.sessions.remove(id);
        match &removed {
            Some(_) => {
                info!("🗑️ Removed session {}", id);
                self.emit(StoreEvent::SessionRemoved(id.to_string()));
            }
            None => warn!(session_id = id, "remove_session: session not found"),
        }
        removed
    }

    /// Remove every session older than the maximum age relative to `now_ms`.
    /// Returns how many were removed.
    pub fn cleanup_old_sessions(&mut self, now_ms: i64) -> usize {
        let max_age_ms = self.max_age_ms;
        let mut expired: Vec<String> = self
            .sessions
            .values()
            .filter(|session| session.is_expired(now_ms, max_age_ms))
            .map(|session| session.id.clone())
            .collect();

        if expired.is_empty() {
            return 0;
        }

        expired.sort();
        for id in &expired {
            self.sessions.remove(id);
        }

        info!("🧹 Cleaned up {} expired sessions", expired.len());
        let removed = expired.len();
        self.emit(StoreEvent::SessionsExpired(expired));
        removed
    }

    /// [`SessionStore::cleanup_old_sessions`] against the current time
    pub fn cleanup_expired(&mut self) -> usize {
        self.cleanup_old_sessions(Utc::now().timestamp_millis())
    }

    /// Sessions ordered newest first
    pub fn list_sessions(&self) -> Vec<&Session> {
        let mut sessions: Vec<&Session> = self.sessions.values().collect();
        sessions.sort_by(|a, b| {
            b.metadata
                .created_at
                .cmp(&a.metadata.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn stats(&self, now_ms: i64) -> SessionStats {
        SessionStats {
            total_sessions: self.sessions.len(),
            total_cues: self.sessions.values().map(|s| s.subtitles().len()).sum(),
            expired_sessions: self
                .sessions
                .values()
                .filter(|s| s.is_expired(now_ms, self.max_age_ms))
                .count(),
        }
    }

    /// Run a cue list edit inside one session, announcing the touched cue on success
    fn edit_cues<T>(
        &mut self,
        session_id: &str,
        operation: &str,
        edit: impl FnOnce(&mut CueList) -> Option<(T, String)>,
    ) -> Option<T> {
        let Some(session) = self.sessions.get_mut(session_id) else {
            warn!(session_id, "{}: session not found", operation);
            return None;
        };

        let (result, cue_id) = edit(session.subtitles_mut())?;
        self.emit(StoreEvent::CuesChanged {
            session_id: session_id.to_string(),
            cue_id,
        });
        Some(result)
    }

    pub fn update_cue(&mut self, session_id: &str, cue_id: &str, patch: CuePatch) -> bool {
        self.edit_cues(session_id, "update_cue", |cues| {
            cues.update_cue(cue_id, patch).then(|| ((), cue_id.to_string()))
        })
        .is_some()
    }

    /// Returns the id of the new cue
    pub fn insert_before(&mut self, session_id: &str, cue_id: &str) -> Option<String> {
        self.edit_cues(session_id, "insert_before", |cues| {
            cues.insert_before(cue_id).map(|id| (id.clone(), id))
        })
    }

    /// Returns the id of the new cue
    pub fn insert_after(&mut self, session_id: &str, cue_id: &str) -> Option<String> {
        self.edit_cues(session_id, "insert_after", |cues| {
            cues.insert_after(cue_id).map(|id| (id.clone(), id))
        })
    }

    /// Returns the id of the clone
    pub fn duplicate_line(&mut self, session_id: &str, cue_id: &str) -> Option<String> {
        self.edit_cues(session_id, "duplicate_line", |cues| {
            cues.duplicate_line(cue_id).map(|id| (id.clone(), id))
        })
    }

    pub fn delete_line(&mut self, session_id: &str, cue_id: &str) -> Option<Cue> {
        self.edit_cues(session_id, "delete_line", |cues| {
            cues.delete_line(cue_id).map(|cue| {
                let id = cue.id.clone();
                (cue, id)
            })
        })
    }

    /// Returns the new value of the nudged field
    pub fn nudge(
        &mut self,
        session_id: &str,
        cue_id: &str,
        field: TimeField,
        direction: Nudge,
        step_ms: u64,
    ) -> Option<u64> {
        self.edit_cues(session_id, "nudge", |cues| {
            cues.nudge(cue_id, field, direction, step_ms)
                .map(|value| (value, cue_id.to_string()))
        })
    }

    /// Replace a session's cues wholesale, e.g. after an import
    pub fn replace_subtitles(&mut self, session_id: &str, mut cues: CueList) -> bool {
        cues.assign_missing_ids();
        cues.renumber();
        let Some(session) = self.sessions.get_mut(session_id) else {
            warn!(session_id, "replace_subtitles: session not found");
            return false;
        };
        *session.subtitles_mut() = cues;
        self.emit(StoreEvent::CuesChanged {
            session_id: session_id.to_string(),
            cue_id: String::new(),
        });
        true
    }

    /// Serialize the whole store as one blob
    pub fn to_json(&self) -> Result<String> {
        let blob = PersistedStoreRef {
            state: PersistedStateRef {
                sessions: self.sessions.iter().map(|(id, s)| (id.as_str(), s)).collect(),
            },
            version: PERSIST_VERSION,
        };
        Ok(serde_json::to_string(&blob)?)
    }

    /// Rebuild a store from a serialized blob, migrating cues that predate ids
    pub fn from_json(json: &str, max_age_ms: i64) -> Result<Self> {
        let blob: PersistedStore = serde_json::from_str(json)
            .map_err(|e| YtSubError::Storage(format!("Corrupt session store: {}", e)))?;

        if blob.version != PERSIST_VERSION {
            warn!("Unexpected session store version {}, loading anyway", blob.version);
        }

        let mut store = Self::with_max_age_ms(max_age_ms);
        let mut migrated = 0;
        for (id, mut session) in blob.state.sessions {
            migrated += session.subtitles_mut().assign_missing_ids();
            session.subtitles_mut().renumber();
            // The map key is authoritative
            session.id = id.clone();
            store.sessions.insert(id, session);
        }

        if migrated > 0 {
            info!("🔄 Migrated {} legacy cues without ids", migrated);
        }
        Ok(store)
    }

    /// Load the store saved under `key`; a missing blob yields an empty store
    pub async fn load_from(backend: &dyn StorageBackend, key: &str, max_age_ms: i64) -> Result<Self> {
        match backend.get(key).await? {
            Some(json) => {
                let store = Self::from_json(&json, max_age_ms)?;
                info!("📊 Loaded {} sessions from storage", store.len());
                Ok(store)
            }
            None => {
                debug!("No stored sessions under {}", key);
                Ok(Self::with_max_age_ms(max_age_ms))
            }
        }
    }

    pub async fn save_to(&self, backend: &dyn StorageBackend, key: &str) -> Result<()> {
        let json = self.to_json()?;
        backend.set(key, &json).await?;
        debug!("💾 Saved {} sessions under {}", self.len(), key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::storage::MemoryStorage;

    const DAY_MS: i64 = 24 * 60 * 60 * 1000;

    fn caption_data(cues: Vec<Cue>) -> CaptionData {
        CaptionData {
            video_id: "dQw4w9WgXcQ".to_string(),
            title: "Never Gonna Give You Up".to_string(),
            duration: 212.0,
            thumbnail: "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg".to_string(),
            subtitles: CueList::from_cues(cues),
        }
    }

    fn store_with_session() -> (SessionStore, String) {
        let mut store = SessionStore::new();
        store.add_session(
            "s1",
            caption_data(vec![Cue::new(0, 1000, 3000, "hi"), Cue::new(1, 5000, 7000, "there")]),
            "https://youtu.be/dQw4w9WgXcQ",
        );
        let first_cue = store.get_session("s1").unwrap().subtitles()[0].id.clone();
        (store, first_cue)
    }

    #[test]
    fn test_add_and_get_session() {
        let (store, _) = store_with_session();
        let session = store.get_session("s1").unwrap();
        assert_eq!(session.metadata.url, "https://youtu.be/dQw4w9WgXcQ");
        assert_eq!(session.subtitles().len(), 2);
        assert!(store.get_session("missing").is_none());
    }

    #[test]
    fn test_add_session_assigns_ids_to_legacy_cues() {
        let data = CaptionData {
            subtitles: serde_json::from_value(serde_json::json!([
                {"index": 3, "startTime": 0, "endTime": 1000, "text": "old"}
            ]))
            .unwrap(),
            ..caption_data(vec![])
        };

        let mut store = SessionStore::new();
        let session = store.add_session("s1", data, "u");
        let cue = &session.subtitles()[0];
        assert!(!cue.id.is_empty());
        assert_eq!(cue.index, 0);
    }

    #[test]
    fn test_cleanup_old_sessions() {
        let now = 100 * DAY_MS;
        let mut store = SessionStore::new();
        store.add_session_at("old", caption_data(vec![]), "u", now - 8 * DAY_MS);
        store.add_session_at("recent", caption_data(vec![]), "u", now - DAY_MS);

        assert_eq!(store.cleanup_old_sessions(now), 1);
        assert!(store.get_session("old").is_none());
        assert!(store.get_session("recent").is_some());
        assert_eq!(store.cleanup_old_sessions(now), 0);
    }

    #[test]
    fn test_list_sessions_newest_first() {
        let mut store = SessionStore::new();
        store.add_session_at("a", caption_data(vec![]), "u", 1);
        store.add_session_at("b", caption_data(vec![]), "u", 3);
        store.add_session_at("c", caption_data(vec![]), "u", 2);

        let ids: Vec<&str> = store.list_sessions().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_session_addressed_edits() {
        let (mut store, first) = store_with_session();

        let inserted = store.insert_after("s1", &first).unwrap();
        let session = store.get_session("s1").unwrap();
        let cue = session.subtitles().find(&inserted).unwrap();
        assert_eq!((cue.start_time, cue.end_time), (3000, 5000));
        assert!(session.subtitles().is_contiguous());

        assert!(store.update_cue("s1", &inserted, CuePatch::text("middle")));
        assert_eq!(store.get_session("s1").unwrap().subtitles()[1].text, "middle");

        let clone = store.duplicate_line("s1", &first).unwrap();
        assert_eq!(store.get_session("s1").unwrap().subtitles().position_of(&clone), Some(1));

        let removed = store.delete_line("s1", &clone).unwrap();
        assert_eq!(removed.text, "hi");
        assert_eq!(store.get_session("s1").unwrap().subtitles().len(), 3);

        assert_eq!(store.nudge("s1", &first, TimeField::Start, Nudge::Down, 100), Some(900));
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let (mut store, first) = store_with_session();
        let before = store.get_session("s1").unwrap().clone();

        assert!(!store.update_cue("missing", &first, CuePatch::text("x")));
        assert!(!store.update_cue("s1", "missing", CuePatch::text("x")));
        assert!(store.insert_before("missing", &first).is_none());
        assert!(store.delete_line("s1", "missing").is_none());
        assert!(store.remove_session("missing").is_none());

        assert_eq!(store.get_session("s1").unwrap(), &before);
    }

    #[test]
    fn test_events() {
        let (mut store, first) = store_with_session();
        let mut events = store.subscribe();

        store.update_cue("s1", &first, CuePatch::text("edited"));
        store.update_cue("s1", "missing", CuePatch::text("ignored"));
        store.remove_session("s1");

        assert_eq!(
            events.try_recv().unwrap(),
            StoreEvent::CuesChanged {
                session_id: "s1".to_string(),
                cue_id: first
            }
        );
        assert_eq!(events.try_recv().unwrap(), StoreEvent::SessionRemoved("s1".to_string()));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_round_trip_through_storage() {
        let (store, _) = store_with_session();
        let backend = MemoryStorage::new();
        store.save_to(&backend, "ytsub.subtitle").await.unwrap();

        let raw = backend.get("ytsub.subtitle").await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["version"], 0);
        assert!(value["state"]["sessions"]["s1"].is_object());

        let loaded = SessionStore::load_from(&backend, "ytsub.subtitle", SESSION_MAX_AGE_MS)
            .await
            .unwrap();
        assert_eq!(loaded.get_session("s1"), store.get_session("s1"));
    }

    #[tokio::test]
    async fn test_missing_blob_yields_empty_store() {
        let backend = MemoryStorage::new();
        let store = SessionStore::load_from(&backend, "ytsub.subtitle", SESSION_MAX_AGE_MS)
            .await
            .unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_corrupt_blob_is_storage_error() {
        let result = SessionStore::from_json("{not json", SESSION_MAX_AGE_MS);
        assert!(matches!(result, Err(YtSubError::Storage(_))));
    }
}

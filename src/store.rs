//! Session state store
//!
//! Holds every live session behind its own mutex so that writes to one
//! session are serialized while distinct sessions are processed in parallel.
//! The map lock is only held to look up, insert or remove a session handle.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ClassifierError;
use crate::session::Session;

/// Shared handle to a single session
pub type SessionHandle = Arc<Mutex<Session>>;

/// Injectable store of live sessions
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty session
    ///
    /// Fails with `DuplicateSession` rather than overwriting an existing id.
    pub fn create_session(&self, id: &str) -> Result<Session, ClassifierError> {
        let session = Session::new(id);
        self.insert_session(session.clone())?;
        Ok(session)
    }

    /// Insert a fully built session under its own id
    ///
    /// Fails with `DuplicateSession` rather than overwriting an existing id.
    pub fn insert_session(&self, session: Session) -> Result<SessionHandle, ClassifierError> {
        if session.id().trim().is_empty() {
            return Err(ClassifierError::InvalidEvent(
                "session id must not be empty".to_string(),
            ));
        }

        let mut sessions = self.sessions.write();
        if sessions.contains_key(session.id()) {
            return Err(ClassifierError::DuplicateSession(session.id().to_string()));
        }

        let id = session.id().to_string();
        let handle = Arc::new(Mutex::new(session));
        sessions.insert(id, Arc::clone(&handle));
        Ok(handle)
    }

    /// Consistent snapshot of a session
    pub fn get_session(&self, id: &str) -> Result<Session, ClassifierError> {
        let handle = self.handle(id)?;
        let session = handle.lock();
        Ok(session.clone())
    }

    /// Handle to a session for in-place mutation
    pub fn handle(&self, id: &str) -> Result<SessionHandle, ClassifierError> {
        self.sessions
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ClassifierError::SessionNotFound(id.to_string()))
    }

    /// Handle to a session, creating it on first sight
    pub fn get_or_create(&self, id: &str) -> SessionHandle {
        if let Some(handle) = self.sessions.read().get(id) {
            return Arc::clone(handle);
        }

        let mut sessions = self.sessions.write();
        Arc::clone(
            sessions
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(Session::new(id)))),
        )
    }

    /// Run `f` with exclusive access to a session
    pub fn with_session<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Result<R, ClassifierError> {
        let handle = self.handle(id)?;
        let mut session = handle.lock();
        Ok(f(&mut session))
    }

    pub fn append_page_visit(&self, id: &str, path: &str, arrived_at_ms: f64) -> Result<(), ClassifierError> {
        self.with_session(id, |s| s.push_page_visit(path, arrived_at_ms))?
    }

    /// Stamp departure on the latest visit; `Ok(false)` when there is none
    pub fn record_departure(&self, id: &str, departed_at_ms: f64) -> Result<bool, ClassifierError> {
        self.with_session(id, |s| s.mark_departure(departed_at_ms))?
    }

    pub fn append_pointer_sample(&self, id: &str, x: f64, y: f64, timestamp_ms: f64) -> Result<(), ClassifierError> {
        self.with_session(id, |s| s.push_pointer_sample(x, y, timestamp_ms))?
    }

    pub fn append_scroll_sample(
        &self,
        id: &str,
        offset_y: f64,
        viewport_height: f64,
        document_height: f64,
        timestamp_ms: f64,
    ) -> Result<(), ClassifierError> {
        self.with_session(id, |s| {
            s.push_scroll_sample(offset_y, viewport_height, document_height, timestamp_ms)
        })?
    }

    pub fn append_outbound_call(
        &self,
        id: &str,
        target: &str,
        method: &str,
        timestamp_ms: f64,
    ) -> Result<(), ClassifierError> {
        self.with_session(id, |s| s.push_outbound_call(target, method, timestamp_ms))?
    }

    pub fn append_interaction(
        &self,
        id: &str,
        kind: &str,
        payload: serde_json::Value,
        timestamp_ms: f64,
    ) -> Result<(), ClassifierError> {
        self.with_session(id, |s| s.push_interaction(kind, payload, timestamp_ms))?
    }

    /// Drop a session, returning its final state
    pub fn remove_session(&self, id: &str) -> Result<Session, ClassifierError> {
        let handle = self
            .sessions
            .write()
            .remove(id)
            .ok_or_else(|| ClassifierError::SessionNotFound(id.to_string()))?;
        let session = handle.lock().clone();
        Ok(session)
    }

    /// Ids of all live sessions, sorted
    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Drop every session
    pub fn clear(&self) {
        self.sessions.write().clear();
    }

    /// Snapshot every session, sorted by id
    pub fn snapshot(&self) -> Vec<Session> {
        let handles: Vec<SessionHandle> = self.sessions.read().values().cloned().collect();
        let mut sessions: Vec<Session> = handles.iter().map(|h| h.lock().clone()).collect();
        sessions.sort_by(|a, b| a.id().cmp(b.id()));
        sessions
    }

    /// Serialize all sessions to JSON
    pub fn to_json(&self) -> Result<String, ClassifierError> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    /// Build a store from a JSON snapshot
    ///
    /// Every recorded sample is replayed through the session's own append
    /// checks, so intervals are recomputed and out-of-order or malformed
    /// records are rejected. Restored sessions carry no verdict until they
    /// are evaluated again.
    pub fn from_json(json: &str) -> Result<Self, ClassifierError> {
        let snapshots: Vec<Session> = serde_json::from_str(json)?;
        let store = Self::new();
        for snapshot in snapshots {
            store.insert_session(Session::restore(snapshot)?)?;
        }
        Ok(store)
    }
}

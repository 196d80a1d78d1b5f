//! Live event-stream sessions keyed by server-generated identifiers
//!
//! Each session owns the writable half of a client's event stream. A failed
//! write means the client is gone, so the session is evicted on the spot.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use axum::response::sse::Event;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("event stream is closed")]
    StreamClosed,
    #[error("unknown session: {0}")]
    NotFound(String),
}

/// One server-sent event: an event name and its already-serialized payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    pub event: &'static str,
    pub data: String,
}

impl StreamEvent {
    pub fn connected(session_id: &str) -> Self {
        Self {
            event: "connected",
            data: json!({ "connectionId": session_id }).to_string(),
        }
    }

    pub fn endpoint(message_path: &str, session_id: &str) -> Self {
        Self {
            event: "endpoint",
            data: format!("{message_path}?sessionId={session_id}"),
        }
    }

    pub fn notification(method: &str, params: Value) -> Self {
        Self {
            event: "notification",
            data: json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
            })
            .to_string(),
        }
    }
}

impl From<StreamEvent> for Event {
    fn from(event: StreamEvent) -> Self {
        Event::default().event(event.event).data(event.data)
    }
}

/// Writable end of a client's event stream.
pub trait EventSink: Send + Sync {
    fn send(&self, event: StreamEvent) -> Result<(), SessionError>;
}

impl EventSink for UnboundedSender<StreamEvent> {
    fn send(&self, event: StreamEvent) -> Result<(), SessionError> {
        UnboundedSender::send(self, event).map_err(|_| SessionError::StreamClosed)
    }
}

#[derive(Clone)]
pub struct Session {
    pub id: String,
    pub sink: Arc<dyn EventSink>,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave the map half-updated, so a
    // poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create(&self, sink: Arc<dyn EventSink>) -> String {
        let mut sessions = self.lock();
        let mut id = Uuid::new_v4().to_string();
        while sessions.contains_key(&id) {
            id = Uuid::new_v4().to_string();
        }

        sessions.insert(
            id.clone(),
            Session {
                id: id.clone(),
                sink,
                created_at: Utc::now(),
            },
        );
        info!(session_id = %id, live_sessions = sessions.len(), "session created");
        id
    }

    pub fn get(&self, session_id: &str) -> Option<Session> {
        self.lock().get(session_id).cloned()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.lock().contains_key(session_id)
    }

    /// Removes the session if it is still live. Returns whether anything was removed.
    pub fn remove(&self, session_id: &str) -> bool {
        let mut sessions = self.lock();
        let removed = sessions.remove(session_id).is_some();
        if removed {
            info!(session_id, live_sessions = sessions.len(), "session removed");
        }
        removed
    }

    /// Delivers to a single session, evicting it if the write fails.
    pub fn send(&self, session_id: &str, event: StreamEvent) -> Result<(), SessionError> {
        let mut sessions = self.lock();
        let session = sessions
            .get(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        if let Err(err) = session.sink.send(event) {
            sessions.remove(session_id);
            warn!(session_id, error = %err, "session evicted after failed write");
            return Err(err);
        }
        Ok(())
    }

    /// Sends a JSON-RPC notification to every live session. Sessions whose
    /// stream rejects the write are evicted; the rest still receive it.
    /// Returns the number of sessions the notification reached.
    pub fn broadcast(&self, method: &str, params: Value) -> usize {
        let event = StreamEvent::notification(method, params);
        let mut sessions = self.lock();

        sessions.retain(|id, session| match session.sink.send(event.clone()) {
            Ok(()) => true,
            Err(err) => {
                warn!(session_id = %id, error = %err, "session evicted after failed broadcast");
                false
            }
        });
        sessions.len()
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }
}

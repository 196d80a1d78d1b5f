//! Accepts event-stream connections and ties each one to a session
//!
//! Opening a stream mints the session id, announces it to the client and hands
//! back a guard. Dropping the guard (which happens when the HTTP response body
//! is dropped on disconnect) removes the session.

use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use tokio::sync::mpsc;
use tokio_stream::{wrappers::UnboundedReceiverStream, Stream};
use tracing::info;

use crate::session::{EventSink, SessionError, SessionManager, StreamEvent};

pub const MESSAGE_PATH: &str = "/message";

pub struct StreamGateway {
    sessions: Arc<SessionManager>,
    message_path: String,
}

impl StreamGateway {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self::with_message_path(sessions, MESSAGE_PATH)
    }

    pub fn with_message_path(sessions: Arc<SessionManager>, message_path: impl Into<String>) -> Self {
        Self {
            sessions,
            message_path: message_path.into(),
        }
    }

    /// Registers a session for `sink` and sends the `connected` and `endpoint`
    /// announcements. If the announcement cannot be written the session is
    /// already gone and the error is returned.
    pub fn open(&self, sink: Arc<dyn EventSink>) -> Result<SessionGuard, SessionError> {
        let id = self.sessions.create(sink);
        let guard = SessionGuard {
            id,
            sessions: Arc::clone(&self.sessions),
        };

        self.sessions
            .send(&guard.id, StreamEvent::connected(&guard.id))?;
        self.sessions.send(
            &guard.id,
            StreamEvent::endpoint(&self.message_path, &guard.id),
        )?;

        info!(session_id = %guard.id, "event stream opened");
        Ok(guard)
    }

    /// Opens a session backed by an in-process channel and returns the stream
    /// of events to forward to the client.
    pub fn open_stream(&self) -> Result<SessionStream, SessionError> {
        let (sender, receiver) = mpsc::unbounded_channel::<StreamEvent>();
        let guard = self.open(Arc::new(sender))?;

        Ok(SessionStream {
            events: UnboundedReceiverStream::new(receiver),
            guard,
        })
    }
}

/// Keeps a session registered for as long as it is alive.
#[derive(Debug)]
pub struct SessionGuard {
    id: String,
    sessions: Arc<SessionManager>,
}

impl SessionGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.sessions.remove(&self.id) {
            info!(session_id = %self.id, "event stream closed");
        }
    }
}

/// Events destined for one client. The session ends when this is dropped.
pub struct SessionStream {
    events: UnboundedReceiverStream<StreamEvent>,
    guard: SessionGuard,
}

impl SessionStream {
    pub fn session_id(&self) -> &str {
        self.guard.id()
    }
}

impl Stream for SessionStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}

//! Independent chat sessions and their stream lifecycle.
//!
//! `SessionManager` is the only thing that mutates a session's messages or
//! streaming state. Operations on an id that no longer exists are no-ops, so a
//! stream that outlives its session cannot corrupt another one.

use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::core::error::GatewayError;
use crate::core::message::Message;
use crate::core::protocol::BackendConfig;

pub type SessionId = u64;

#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    selection: Option<BackendConfig>,
    messages: Vec<Message>,
    streaming: bool,
    cancel_token: Option<CancellationToken>,
}

impl Session {
    fn new(id: SessionId, selection: Option<BackendConfig>) -> Self {
        Self {
            id,
            selection,
            messages: Vec::new(),
            streaming: false,
            cancel_token: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn selection(&self) -> Option<&BackendConfig> {
        self.selection.as_ref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn cancel_stream(&self) {
        if let Some(token) = &self.cancel_token {
            token.cancel();
        }
    }
}

#[derive(Debug)]
pub struct SessionManager {
    sessions: Vec<Session>,
    next_id: SessionId,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SessionManager {
    /// Starts with one session; there is never fewer than one.
    pub fn new(selection: Option<BackendConfig>) -> Self {
        Self {
            sessions: vec![Session::new(1, selection)],
            next_id: 2,
        }
    }

    pub fn create_session(&mut self, selection: Option<BackendConfig>) -> SessionId {
        let id = self.next_id;
        self.next_id += 1;
        self.sessions.push(Session::new(id, selection));
        id
    }

    /// Removes a session, cancelling its stream first. Refuses to remove the last one.
    pub fn remove_session(&mut self, id: SessionId) -> bool {
        if self.sessions.len() <= 1 {
            return false;
        }
        let Some(index) = self.index_of(id) else {
            return false;
        };
        let removed = self.sessions.remove(index);
        removed.cancel_stream();
        true
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(Session::id).collect()
    }

    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.sessions.iter().find(|session| session.id == id)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter()
    }

    pub fn set_selection(&mut self, id: SessionId, selection: Option<BackendConfig>) -> bool {
        self.with_session(id, |session| session.selection = selection)
    }

    pub fn append_message(&mut self, id: SessionId, message: Message) -> bool {
        self.with_session(id, |session| session.messages.push(message))
    }

    /// Replaces the last message's content, but only while it is an assistant message.
    pub fn replace_last_content(&mut self, id: SessionId, content: impl Into<String>) -> bool {
        let Some(session) = self.session_mut(id) else {
            return false;
        };
        match session.messages.last_mut() {
            Some(last) if last.is_assistant() => {
                last.content = content.into();
                true
            }
            _ => false,
        }
    }

    /// Drops a turn that was cancelled before any reply text arrived: the empty
    /// assistant placeholder, then the user message it answered.
    ///
    /// A reply with content is kept as it stands.
    pub fn discard_unanswered_turn(&mut self, id: SessionId) -> bool {
        let Some(session) = self.session_mut(id) else {
            return false;
        };
        let messages = &mut session.messages;
        if messages
            .last()
            .is_some_and(|last| last.is_assistant() && last.content.is_empty())
        {
            messages.pop();
        }
        if messages.last().is_some_and(Message::is_user) {
            messages.pop();
            return true;
        }
        false
    }

    /// Sets the streaming flag, allocating or releasing the cancellation handle with it.
    ///
    /// Returns the live handle when streaming is on.
    pub fn set_streaming(&mut self, id: SessionId, streaming: bool) -> Option<CancellationToken> {
        let session = self.session_mut(id)?;
        session.streaming = streaming;
        if streaming {
            Some(
                session
                    .cancel_token
                    .get_or_insert_with(CancellationToken::new)
                    .clone(),
            )
        } else {
            session.cancel_token = None;
            None
        }
    }

    /// Marks the session streaming, rejecting it if a stream is already active.
    pub fn begin_stream(&mut self, id: SessionId) -> Result<CancellationToken, GatewayError> {
        match self.session(id) {
            None => Err(GatewayError::UnknownSession(id)),
            Some(session) if session.streaming => Err(GatewayError::SessionBusy(id)),
            Some(_) => self
                .set_streaming(id, true)
                .ok_or(GatewayError::UnknownSession(id)),
        }
    }

    pub fn end_stream(&mut self, id: SessionId) {
        self.set_streaming(id, false);
    }

    /// Signals the active stream to stop; the stream clears `streaming` itself as it unwinds.
    pub fn cancel(&mut self, id: SessionId) -> bool {
        match self.session(id) {
            Some(session) if session.cancel_token.is_some() => {
                session.cancel_stream();
                true
            }
            _ => false,
        }
    }

    pub fn clear_messages(&mut self, id: SessionId) -> bool {
        self.with_session(id, |session| {
            session.cancel_stream();
            session.messages.clear();
        })
    }

    pub fn clear_all(&mut self) {
        for session in &mut self.sessions {
            session.cancel_stream();
            session.messages.clear();
        }
    }

    fn index_of(&self, id: SessionId) -> Option<usize> {
        self.sessions.iter().position(|session| session.id == id)
    }

    fn session_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|session| session.id == id)
    }

    fn with_session(&mut self, id: SessionId, f: impl FnOnce(&mut Session)) -> bool {
        match self.session_mut(id) {
            Some(session) => {
                f(session);
                true
            }
            None => false,
        }
    }
}

/// Cloneable access to one `SessionManager` shared by concurrent turns.
///
/// The lock is only ever taken inside [`SessionHandle::with`], so it is never
/// held across an await point.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    inner: Arc<Mutex<SessionManager>>,
}

impl SessionHandle {
    pub fn new(manager: SessionManager) -> Self {
        Self {
            inner: Arc::new(Mutex::new(manager)),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut SessionManager) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn messages(&self, id: SessionId) -> Option<Vec<Message>> {
        self.with(|manager| manager.session(id).map(|session| session.messages().to_vec()))
    }

    pub fn is_streaming(&self, id: SessionId) -> bool {
        self.with(|manager| {
            manager
                .session(id)
                .is_some_and(|session| session.is_streaming())
        })
    }
}

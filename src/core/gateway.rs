//! The façade a front end drives: one call per user turn.

use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::chat_stream::{stream_completion, StreamMessage, StreamOutcome, StreamParams};
use crate::core::error::GatewayError;
use crate::core::message::Message;
use crate::core::protocol::BackendConfig;
use crate::core::search::{SearchLimits, SearchProvider};
use crate::core::session::{SessionHandle, SessionId, SessionManager};
use crate::core::tools::ToolOrchestrator;

/// Per-turn switches.
#[derive(Debug, Clone, Default)]
pub struct TurnOptions {
    /// Run the web-search negotiation before streaming, if a search backend is configured.
    pub search: bool,
    /// Used for this turn only, ahead of the session's own selection.
    pub backend_override: Option<BackendConfig>,
}

pub struct ChatGateway {
    client: reqwest::Client,
    sessions: SessionHandle,
    search: Option<SearchProvider>,
    search_limits: SearchLimits,
    idle_timeout: Option<Duration>,
    tx: mpsc::UnboundedSender<(StreamMessage, SessionId)>,
}

impl ChatGateway {
    pub fn new(
        client: reqwest::Client,
        sessions: SessionManager,
    ) -> (Self, mpsc::UnboundedReceiver<(StreamMessage, SessionId)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let gateway = Self {
            client,
            sessions: SessionHandle::new(sessions),
            search: None,
            search_limits: SearchLimits::default(),
            idle_timeout: None,
            tx,
        };
        (gateway, rx)
    }

    pub fn with_search(mut self, provider: SearchProvider, limits: SearchLimits) -> Self {
        self.search = Some(provider);
        self.search_limits = limits;
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn sessions(&self) -> &SessionHandle {
        &self.sessions
    }

    pub fn search_provider(&self) -> Option<&SearchProvider> {
        self.search.as_ref()
    }

    /// Stops the session's in-flight turn; it finishes with `End`.
    pub fn cancel(&self, id: SessionId) -> bool {
        self.sessions.with(|manager| manager.cancel(id))
    }

    /// Runs one turn on one session.
    ///
    /// Every turn that is not rejected as busy emits exactly one `End` or
    /// `Error` after its chunks. A busy rejection is only returned, since the
    /// session's running turn still owns its slot on the channel.
    pub async fn send_turn(
        &self,
        id: SessionId,
        text: &str,
        options: TurnOptions,
    ) -> Result<StreamOutcome, GatewayError> {
        let result = self.run_turn(id, text, options).await;
        match &result {
            Ok(_) => self.emit(id, StreamMessage::End),
            Err(GatewayError::SessionBusy(_)) => {
                debug!(session = id, "Rejected turn on a streaming session");
            }
            Err(err) => self.emit(id, StreamMessage::Error(err.transcript_text())),
        }
        result
    }

    /// Runs the same prompt on several sessions concurrently.
    pub async fn send_to_sessions(
        &self,
        ids: &[SessionId],
        text: &str,
        options: &TurnOptions,
    ) -> Vec<(SessionId, Result<StreamOutcome, GatewayError>)> {
        let turns = ids.iter().map(|&id| {
            let options = options.clone();
            async move { (id, self.send_turn(id, text, options).await) }
        });
        join_all(turns).await
    }

    async fn run_turn(
        &self,
        id: SessionId,
        text: &str,
        options: TurnOptions,
    ) -> Result<StreamOutcome, GatewayError> {
        let backend = self.resolve_backend(id, options.backend_override)?;
        let cancel_token = self.sessions.with(|manager| manager.begin_stream(id))?;

        let result = self
            .stream_turn(id, text, &backend, &cancel_token, options.search)
            .await;

        self.sessions.with(|manager| {
            match &result {
                Err(err) => {
                    manager.replace_last_content(id, err.transcript_text());
                }
                Ok(StreamOutcome::Cancelled) => {
                    manager.discard_unanswered_turn(id);
                }
                Ok(StreamOutcome::Completed) => {}
            }
            manager.end_stream(id);
        });
        match &result {
            Ok(StreamOutcome::Cancelled) => debug!(session = id, "Turn cancelled"),
            Ok(StreamOutcome::Completed) => debug!(session = id, "Turn completed"),
            Err(err) => warn!(session = id, error = %err, "Turn failed"),
        }
        result
    }

    fn resolve_backend(
        &self,
        id: SessionId,
        backend_override: Option<BackendConfig>,
    ) -> Result<BackendConfig, GatewayError> {
        self.sessions.with(|manager| {
            let session = manager
                .session(id)
                .ok_or(GatewayError::UnknownSession(id))?;
            backend_override
                .or_else(|| session.selection().cloned())
                .ok_or(GatewayError::NoBackend)
        })
    }

    async fn stream_turn(
        &self,
        id: SessionId,
        text: &str,
        backend: &BackendConfig,
        cancel_token: &CancellationToken,
        search: bool,
    ) -> Result<StreamOutcome, GatewayError> {
        let history = self
            .sessions
            .with(|manager| {
                manager.append_message(id, Message::user(text));
                manager.session(id).map(|session| session.messages().to_vec())
            })
            .ok_or(GatewayError::UnknownSession(id))?;

        let context = match self.search.as_ref().filter(|_| search) {
            Some(provider) => {
                let orchestrator =
                    ToolOrchestrator::new(&self.client, provider, self.search_limits);
                tokio::select! {
                    biased;
                    _ = cancel_token.cancelled() => return Ok(StreamOutcome::Cancelled),
                    context = orchestrator.search_context(backend, &history, text) => context,
                }
            }
            None => String::new(),
        };

        let mut request_messages = Vec::with_capacity(history.len() + 1);
        if !context.is_empty() {
            request_messages.push(Message::system(context));
        }
        request_messages.extend(history);

        self.sessions
            .with(|manager| manager.append_message(id, Message::assistant("")));

        let mut accumulated = String::new();
        stream_completion(
            StreamParams {
                client: &self.client,
                backend,
                messages: &request_messages,
                cancel_token,
                idle_timeout: self.idle_timeout,
            },
            |delta| {
                accumulated.push_str(delta);
                self.sessions
                    .with(|manager| manager.replace_last_content(id, accumulated.as_str()));
                self.emit(id, StreamMessage::Chunk(delta.to_string()));
            },
        )
        .await
    }

    fn emit(&self, id: SessionId, message: StreamMessage) {
        // a dropped receiver only means nobody is listening
        let _ = self.tx.send((message, id));
    }
}

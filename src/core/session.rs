//! Per-session chat state.
//!
//! A [`ChatSession`] owns everything that lives for one interactive
//! session: the conversation history sent to the backend, the running token
//! metrics, the visible transcript and the reply currently streaming in.

use std::fmt;

use crate::api::models::ModelCatalog;
use crate::api::ChatRequest;
use crate::core::chat_stream::{ChatError, ChunkEvent};
use crate::core::message::{ConversationMessage, TranscriptEntry, TranscriptKind};
use crate::core::usage::SessionMetrics;
use crate::utils::logging::new_request_id;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    EmptyMessage,
    RequestInFlight,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::EmptyMessage => write!(f, "Message is required"),
            SessionError::RequestInFlight => {
                write!(f, "A response is still streaming; wait for it to finish")
            }
        }
    }
}

impl std::error::Error for SessionError {}

/// Optional sampling parameters chosen by the user.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SamplingParams {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
}

impl SamplingParams {
    /// Drop every parameter the model is not known to support.
    pub fn restricted_to(self, catalog: &ModelCatalog, model: &str) -> Self {
        Self {
            temperature: self
                .temperature
                .filter(|_| catalog.supports(model, "temperature")),
            top_p: self.top_p.filter(|_| catalog.supports(model, "top_p")),
        }
    }
}

/// Everything needed to start streaming one turn.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub request: ChatRequest,
    pub stream_id: u64,
    pub request_id: String,
}

/// What applying a stream event changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventEffect {
    /// The event belonged to a stream that is no longer active.
    Ignored,
    ContentUpdated,
    MetricsUpdated,
    /// The turn completed; `committed` is false when the reply was empty.
    Completed { committed: bool },
    Failed(ChatError),
}

#[derive(Debug)]
struct LiveReply {
    stream_id: u64,
    buffer: String,
}

#[derive(Debug)]
pub struct ChatSession {
    history: Vec<ConversationMessage>,
    metrics: SessionMetrics,
    transcript: Vec<TranscriptEntry>,
    model: String,
    live: Option<LiveReply>,
    next_stream_id: u64,
}

impl ChatSession {
    pub fn new(system_prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            history: vec![ConversationMessage::system(system_prompt)],
            metrics: SessionMetrics::default(),
            transcript: Vec::new(),
            model: model.into(),
            live: None,
            next_stream_id: 1,
        }
    }

    pub fn history(&self) -> &[ConversationMessage] {
        &self.history
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    pub fn system_prompt(&self) -> &str {
        self.history
            .first()
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }

    /// Replace the system message at the head of the history.
    pub fn set_system_prompt(&mut self, content: impl Into<String>) {
        let system = ConversationMessage::system(content);
        match self.history.first_mut() {
            Some(first) => *first = system,
            None => self.history.push(system),
        }
    }

    pub fn in_flight(&self) -> bool {
        self.live.is_some()
    }

    /// Markdown of the reply currently streaming in, if any.
    pub fn live_reply(&self) -> Option<&str> {
        self.live.as_ref().map(|live| live.buffer.as_str())
    }

    pub fn push_notice(&mut self, kind: TranscriptKind, content: impl Into<String>) {
        self.transcript.push(TranscriptEntry::new(kind, content));
    }

    /// Record the user's message and build the request for this turn.
    pub fn begin_turn(
        &mut self,
        text: &str,
        sampling: SamplingParams,
    ) -> Result<ChatTurn, SessionError> {
        if self.in_flight() {
            return Err(SessionError::RequestInFlight);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        self.history.push(ConversationMessage::user(text));
        self.transcript
            .push(TranscriptEntry::new(TranscriptKind::User, text));

        let stream_id = self.next_stream_id;
        self.next_stream_id += 1;
        self.live = Some(LiveReply {
            stream_id,
            buffer: String::new(),
        });

        Ok(ChatTurn {
            request: ChatRequest {
                messages: self.history.clone(),
                model: self.model.clone(),
                temperature: sampling.temperature,
                top_p: sampling.top_p,
            },
            stream_id,
            request_id: new_request_id(),
        })
    }

    pub fn apply_event(&mut self, stream_id: u64, event: ChunkEvent) -> EventEffect {
        let Some(live) = self.live.as_mut().filter(|live| live.stream_id == stream_id) else {
            return EventEffect::Ignored;
        };

        match event {
            ChunkEvent::Content(chunk) => {
                live.buffer.push_str(&chunk);
                EventEffect::ContentUpdated
            }
            ChunkEvent::Metadata(usage) => {
                self.metrics.accumulate(&usage);
                EventEffect::MetricsUpdated
            }
            ChunkEvent::End(text) => {
                self.live = None;
                if text.is_empty() {
                    return EventEffect::Completed { committed: false };
                }
                self.transcript
                    .push(TranscriptEntry::new(TranscriptKind::Assistant, text.clone()));
                self.history.push(ConversationMessage::assistant(text));
                EventEffect::Completed { committed: true }
            }
            ChunkEvent::Error(err) => {
                let partial = std::mem::take(&mut live.buffer);
                self.live = None;
                if !partial.is_empty() {
                    self.transcript
                        .push(TranscriptEntry::new(TranscriptKind::PartialAssistant, partial));
                }
                self.transcript
                    .push(TranscriptEntry::new(TranscriptKind::Error, err.to_string()));
                EventEffect::Failed(err)
            }
        }
    }

    /// Start the conversation over, keeping the current system prompt.
    pub fn clear(&mut self) -> Result<(), SessionError> {
        if self.in_flight() {
            return Err(SessionError::RequestInFlight);
        }
        self.history.truncate(1);
        self.metrics.reset();
        self.transcript.clear();
        Ok(())
    }

    /// Forget the in-flight reply without recording anything.
    pub fn abandon(&mut self) {
        self.live = None;
    }
}

use std::fmt;

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::api::ChatRequest;
use crate::core::frame::{decode_chunk, Frame, Utf8ChunkDecoder};
use crate::core::usage::UsageMetadata;
use crate::utils::url::construct_api_url;

/// Why a chat turn did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// The backend answered the request with a non-success status.
    Status { status: u16, message: String },
    /// The request failed before any chunk arrived.
    Transport(String),
    /// The stream broke after at least one chunk arrived.
    Interrupted(String),
}

impl ChatError {
    /// Whether the failure happened after part of the reply was shown.
    pub fn is_mid_stream(&self) -> bool {
        matches!(self, ChatError::Interrupted(_))
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::Status { status, message } => write!(f, "HTTP {status}: {message}"),
            ChatError::Transport(reason) => write!(f, "Request failed: {reason}"),
            ChatError::Interrupted(reason) => write!(f, "Stream interrupted: {reason}"),
        }
    }
}

impl std::error::Error for ChatError {}

/// One step of a chat response as seen by the UI loop.
#[derive(Clone, Debug, PartialEq)]
pub enum ChunkEvent {
    Content(String),
    Metadata(UsageMetadata),
    /// The stream completed; carries the full accumulated reply.
    End(String),
    Error(ChatError),
}

/// Callbacks fired while a response streams in.
///
/// `on_finish` is called exactly once per request, after every content and
/// metadata callback for that request.
pub trait StreamObserver {
    fn on_content(&mut self, chunk: &str, buffer: &str);
    fn on_metadata(&mut self, usage: &UsageMetadata);
    fn on_finish(&mut self, outcome: Result<&str, &ChatError>);
}

fn apply_chunk<O>(text: &str, buffer: &mut String, observer: &mut O)
where
    O: StreamObserver + ?Sized,
{
    if text.is_empty() {
        return;
    }

    match decode_chunk(text) {
        Ok(Frame::Content(content)) => {
            buffer.push_str(content);
            observer.on_content(content, buffer);
        }
        Ok(Frame::Metadata(usage)) => {
            tracing::debug!(?usage, "metadata frame");
            observer.on_metadata(&usage);
        }
        Err(err) => {
            tracing::warn!(error = %err, "dropping malformed metadata frame");
        }
    }
}

/// Drain a chunked response body, splitting metadata frames from content.
///
/// Each item of `stream` is one transport chunk. Content is appended to the
/// returned buffer in arrival order.
pub async fn consume_chunks<S, B, E, O>(stream: S, observer: &mut O) -> Result<String, ChatError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: fmt::Display,
    O: StreamObserver + ?Sized,
{
    futures_util::pin_mut!(stream);
    let mut decoder = Utf8ChunkDecoder::new();
    let mut buffer = String::new();
    let mut received_any = false;

    while let Some(item) = stream.next().await {
        match item {
            Ok(bytes) => {
                received_any = true;
                for text in decoder.decode(bytes.as_ref()) {
                    apply_chunk(&text, &mut buffer, observer);
                }
            }
            Err(err) => {
                let failure = if received_any {
                    ChatError::Interrupted(err.to_string())
                } else {
                    ChatError::Transport(err.to_string())
                };
                tracing::warn!(error = %failure, partial_len = buffer.len(), "chat stream failed");
                observer.on_finish(Err(&failure));
                return Err(failure);
            }
        }
    }

    let tail = decoder.finish();
    apply_chunk(&tail, &mut buffer, observer);

    tracing::debug!(content_len = buffer.len(), "chat stream completed");
    observer.on_finish(Ok(&buffer));
    Ok(buffer)
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .or_else(|| value.get("error").and_then(|v| v.as_str()))
        .or_else(|| value.get("message").and_then(|v| v.as_str()))?;

    let collapsed = summary.split_whitespace().collect::<Vec<_>>().join(" ");
    Some(collapsed)
}

/// Turn an error response body into a short human readable reason.
pub fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "<empty response body>".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(summary) = extract_error_summary(&json_value).filter(|s| !s.is_empty()) {
            return summary;
        }
    }

    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Issues chat requests against the backend and consumes the reply stream.
#[derive(Clone)]
pub struct StreamingChatClient {
    client: reqwest::Client,
    server_url: String,
}

impl StreamingChatClient {
    pub fn new(client: reqwest::Client, server_url: impl Into<String>) -> Self {
        Self {
            client,
            server_url: server_url.into(),
        }
    }

    pub fn chat_url(&self) -> String {
        construct_api_url(&self.server_url, "api/chat")
    }

    /// Send one chat turn. The reply text is returned on success; failures
    /// are returned and also reported through `observer.on_finish`.
    pub async fn send_chat<O>(
        &self,
        request: &ChatRequest,
        observer: &mut O,
    ) -> Result<String, ChatError>
    where
        O: StreamObserver + Send + ?Sized,
    {
        tracing::info!(
            model = %request.model,
            messages = request.messages.len(),
            temperature = ?request.temperature,
            top_p = ?request.top_p,
            "sending chat request"
        );

        let response = match self
            .client
            .post(self.chat_url())
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let failure = ChatError::Transport(err.to_string());
                tracing::error!(error = %failure, "chat request failed");
                observer.on_finish(Err(&failure));
                return Err(failure);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            let failure = ChatError::Status {
                status: status.as_u16(),
                message: format_api_error(&error_text),
            };
            tracing::error!(error = %failure, "chat request rejected");
            observer.on_finish(Err(&failure));
            return Err(failure);
        }

        consume_chunks(response.bytes_stream(), observer).await
    }
}

pub struct StreamParams {
    pub client: reqwest::Client,
    pub server_url: String,
    pub request: ChatRequest,
    pub request_id: String,
    pub cancel_token: tokio_util::sync::CancellationToken,
    pub stream_id: u64,
}

struct ChannelObserver {
    tx: mpsc::UnboundedSender<(ChunkEvent, u64)>,
    stream_id: u64,
}

impl StreamObserver for ChannelObserver {
    fn on_content(&mut self, chunk: &str, _buffer: &str) {
        let _ = self
            .tx
            .send((ChunkEvent::Content(chunk.to_string()), self.stream_id));
    }

    fn on_metadata(&mut self, usage: &UsageMetadata) {
        let _ = self
            .tx
            .send((ChunkEvent::Metadata(usage.clone()), self.stream_id));
    }

    fn on_finish(&mut self, outcome: Result<&str, &ChatError>) {
        let event = match outcome {
            Ok(text) => ChunkEvent::End(text.to_string()),
            Err(err) => ChunkEvent::Error(err.clone()),
        };
        let _ = self.tx.send((event, self.stream_id));
    }
}

/// Runs chat requests on background tasks and forwards their events,
/// tagged with a stream id, to a single receiver.
#[derive(Clone)]
pub struct ChatStreamService {
    tx: mpsc::UnboundedSender<(ChunkEvent, u64)>,
}

impl ChatStreamService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(ChunkEvent, u64)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn spawn_stream(&self, params: StreamParams) {
        let StreamParams {
            client,
            server_url,
            request,
            request_id,
            cancel_token,
            stream_id,
        } = params;

        let mut observer = ChannelObserver {
            tx: self.tx.clone(),
            stream_id,
        };
        let span = tracing::info_span!("chat", request_id = %request_id, stream_id);

        tokio::spawn(
            async move {
                let chat_client = StreamingChatClient::new(client, server_url);
                tokio::select! {
                    _ = chat_client.send_chat(&request, &mut observer) => {}
                    _ = cancel_token.cancelled() => {
                        tracing::debug!("chat stream abandoned");
                    }
                }
            }
            .instrument(span),
        );
    }

    #[cfg(test)]
    pub fn send_for_test(&self, event: ChunkEvent, stream_id: u64) {
        let _ = self.tx.send((event, stream_id));
    }
}

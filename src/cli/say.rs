//! TUI-less "say" command

use std::error::Error;
use std::io::{self, Write};

use tracing::Instrument;

use crate::api::models::{fetch_models, ModelCatalog};
use crate::core::chat_stream::{ChatError, StreamObserver, StreamingChatClient};
use crate::core::config::Config;
use crate::core::constants::DEFAULT_SYSTEM_PROMPT;
use crate::core::prompts::prompt_source_for;
use crate::core::session::{ChatSession, SamplingParams};
use crate::core::usage::{SessionMetrics, UsageMetadata};
use crate::ui::chat_loop::ChatOptions;

/// Writes reply text as it arrives and totals the reported usage.
pub struct PlainOutput<W: Write> {
    out: W,
    pub metrics: SessionMetrics,
    write_error: Option<io::Error>,
}

impl<W: Write> PlainOutput<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            metrics: SessionMetrics::default(),
            write_error: None,
        }
    }

    fn write(&mut self, text: &str) {
        if self.write_error.is_some() {
            return;
        }
        let result = self
            .out
            .write_all(text.as_bytes())
            .and_then(|_| self.out.flush());
        if let Err(err) = result {
            self.write_error = Some(err);
        }
    }

    pub fn into_inner(self) -> Result<W, io::Error> {
        match self.write_error {
            Some(err) => Err(err),
            None => Ok(self.out),
        }
    }
}

impl<W: Write> StreamObserver for PlainOutput<W> {
    fn on_content(&mut self, chunk: &str, _buffer: &str) {
        self.write(chunk);
    }

    fn on_metadata(&mut self, usage: &UsageMetadata) {
        self.metrics.accumulate(usage);
    }

    fn on_finish(&mut self, outcome: Result<&str, &ChatError>) {
        match outcome {
            Ok(text) if !text.is_empty() && !text.ends_with('\n') => self.write("\n"),
            Ok(_) => {}
            // Keep the error on its own line after a partial reply.
            Err(err) if err.is_mid_stream() => self.write("\n"),
            Err(_) => {}
        }
    }
}

/// Optional parameters survive only when the model directory says the model
/// accepts them; without a directory they are dropped.
async fn supported_sampling(
    client: &reqwest::Client,
    options: &ChatOptions,
    sampling: SamplingParams,
) -> SamplingParams {
    if sampling == SamplingParams::default() {
        return sampling;
    }
    match fetch_models(client, &options.server_url).await {
        Ok(models) => sampling.restricted_to(&ModelCatalog::new(models), &options.model),
        Err(err) => {
            tracing::warn!(error = %err, "model directory unavailable; sending defaults");
            SamplingParams::default()
        }
    }
}

pub async fn run_say(
    text: &str,
    options: &ChatOptions,
    config: &Config,
) -> Result<SessionMetrics, Box<dyn Error>> {
    let client = reqwest::Client::new();
    let mut session = ChatSession::new(DEFAULT_SYSTEM_PROMPT, options.model.clone());

    if let Some(id) = &options.prompt {
        let source = prompt_source_for(config, client.clone(), &options.server_url);
        match source.content(id).await? {
            Some(content) => session.set_system_prompt(content),
            None => return Err(format!("Prompt not found: {id}").into()),
        }
    }

    let sampling = supported_sampling(&client, options, config.sampling()).await;
    let turn = session.begin_turn(text, sampling)?;

    let chat_client = StreamingChatClient::new(client, options.server_url.clone());
    let mut output = PlainOutput::new(io::stdout());
    let span = tracing::info_span!("say", request_id = %turn.request_id);
    let result = chat_client
        .send_chat(&turn.request, &mut output)
        .instrument(span)
        .await;

    let metrics = output.metrics.clone();
    output.into_inner()?;
    result?;

    if !metrics.is_empty() {
        eprintln!("{}", metrics.summary());
    }
    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::{spawn_chunked_server, ChunkedReply};

    fn options(server_url: &str) -> ChatOptions {
        ChatOptions {
            server_url: server_url.to_string(),
            model: "test/model".to_string(),
            prompt: None,
        }
    }

    #[test]
    fn plain_output_writes_chunks_and_totals_usage() {
        let mut output = PlainOutput::new(Vec::new());
        output.on_content("Hello ", "Hello ");
        output.on_metadata(&UsageMetadata {
            prompt_tokens: Some(3),
            completion_tokens: Some(2),
            total_tokens: Some(5),
            ..UsageMetadata::default()
        });
        output.on_content("world", "Hello world");
        output.on_finish(Ok("Hello world"));

        assert_eq!(output.metrics.total_tokens, 5);
        let bytes = output.into_inner().expect("no write error");
        assert_eq!(String::from_utf8(bytes).expect("utf8"), "Hello world\n");
    }

    #[test]
    fn plain_output_ends_partial_reply_line_on_interruption() {
        let mut output = PlainOutput::new(Vec::new());
        output.on_content("Part", "Part");
        output.on_finish(Err(&ChatError::Interrupted("reset".into())));
        let bytes = output.into_inner().expect("no write error");
        assert_eq!(bytes, b"Part\n");
    }

    #[tokio::test]
    async fn say_reports_status_errors() {
        let server = spawn_chunked_server(ChunkedReply::Status {
            status: 400,
            body: r#"{"error": "Message is required"}"#.into(),
        })
        .await;
        let err = run_say("hi", &options(&server.url), &Config::default())
            .await
            .expect_err("status error");
        assert_eq!(err.to_string(), "HTTP 400: Message is required");
    }

    #[tokio::test]
    async fn say_rejects_empty_text_before_sending() {
        let err = run_say("   ", &options("http://127.0.0.1:9"), &Config::default())
            .await
            .expect_err("empty message");
        assert_eq!(err.to_string(), "Message is required");
    }

    #[tokio::test]
    async fn say_without_model_directory_drops_sampling() {
        let server = spawn_chunked_server(ChunkedReply::Status {
            status: 503,
            body: "down".into(),
        })
        .await;
        let sampling = SamplingParams {
            temperature: Some(0.5),
            top_p: None,
        };
        let kept = supported_sampling(&reqwest::Client::new(), &options(&server.url), sampling)
            .await;
        assert_eq!(kept, SamplingParams::default());
    }
}

//! Shared constants used across the application

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";

pub const DEFAULT_MODEL: &str = "openai/gpt-3.5-turbo";

/// System message used when no prompt is selected or the selected prompt
/// cannot be loaded.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Environment variable that overrides the configured server URL.
pub const SERVER_URL_ENV: &str = "CHATSTREAM_SERVER";

pub const DEFAULT_LOG_FILE: &str = "chatstream.log";

//! Token usage reported by the backend and the running session totals.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Usage statistics carried by a metadata frame.
///
/// Every field is optional; the backend only reports what the upstream
/// provider returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

impl UsageMetadata {
    /// Read the known fields of a metadata object. A field with the wrong
    /// type is treated as absent; the other fields still count.
    pub fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            model: field(object, "model", |v| v.as_str().map(str::to_string)),
            prompt_tokens: field(object, "prompt_tokens", Value::as_u64),
            completion_tokens: field(object, "completion_tokens", Value::as_u64),
            total_tokens: field(object, "total_tokens", Value::as_u64),
        }
    }
}

fn field<T>(
    object: &Map<String, Value>,
    key: &str,
    read: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    let value = object.get(key).filter(|v| !v.is_null())?;
    let parsed = read(value);
    if parsed.is_none() {
        tracing::debug!(field = key, value = %value, "ignoring metadata field of unexpected type");
    }
    parsed
}

/// Cumulative token counters for the lifetime of a chat session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionMetrics {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    /// Number of metadata frames folded into the totals.
    pub requests: u64,
    pub last_model: Option<String>,
}

impl SessionMetrics {
    pub fn accumulate(&mut self, usage: &UsageMetadata) {
        self.prompt_tokens = self
            .prompt_tokens
            .saturating_add(usage.prompt_tokens.unwrap_or(0));
        self.completion_tokens = self
            .completion_tokens
            .saturating_add(usage.completion_tokens.unwrap_or(0));
        self.total_tokens = self
            .total_tokens
            .saturating_add(usage.total_tokens.unwrap_or(0));
        self.requests += 1;
        if let Some(model) = usage.model.as_ref().filter(|m| !m.is_empty()) {
            self.last_model = Some(model.clone());
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.requests == 0
    }

    pub fn summary(&self) -> String {
        format!(
            "tokens: {} prompt / {} completion / {} total",
            self.prompt_tokens, self.completion_tokens, self.total_tokens
        )
    }
}

use serde::{Deserialize, Serialize};

use crate::core::message::ConversationMessage;

pub mod models;
pub mod prompts;

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ConversationMessage>,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub completion: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelArchitecture {
    #[serde(default)]
    pub input_modalities: Vec<String>,
    #[serde(default)]
    pub output_modalities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub context_length: Option<u64>,
    #[serde(default)]
    pub pricing: Option<ModelPricing>,
    #[serde(default)]
    pub architecture: Option<ModelArchitecture>,
    #[serde(default)]
    pub supported_parameters: Option<Vec<String>>,
}

/// The model directory answers either with a bare list or an
/// OpenAI-style `{"data": [...]}` envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ModelsResponse {
    List(Vec<ModelInfo>),
    Envelope { data: Vec<ModelInfo> },
}

impl ModelsResponse {
    pub fn into_models(self) -> Vec<ModelInfo> {
        match self {
            ModelsResponse::List(models) => models,
            ModelsResponse::Envelope { data } => data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSummary {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl PromptSummary {
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptContent {
    pub content: String,
}

//! System prompt library.
//!
//! Prompts come either from the backend's prompt directory or from a local
//! directory of markdown files. A local prompt file may start with a
//! frontmatter block:
//!
//! ```text
//! ---
//! title: Concise
//! description: "Short, direct answers"
//! ---
//! You answer in as few words as possible.
//! ```
//!
//! The prompt id is the file name without its `.md` extension.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use crate::api::prompts::{fetch_prompt_content, fetch_prompts};
use crate::api::PromptSummary;
use crate::core::config::data::path_display;
use crate::core::config::Config;

#[derive(Debug)]
pub enum PromptError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Remote(String),
    InvalidId(String),
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptError::Io { path, source } => {
                write!(f, "Failed to read prompt at {}: {}", path_display(path), source)
            }
            PromptError::Remote(reason) => write!(f, "Prompt directory error: {reason}"),
            PromptError::InvalidId(id) => write!(f, "Invalid prompt id '{id}'"),
        }
    }
}

impl std::error::Error for PromptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PromptError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[async_trait::async_trait]
pub trait PromptSource: Send + Sync {
    /// All prompts, sorted by title.
    async fn list(&self) -> Result<Vec<PromptSummary>, PromptError>;

    /// Body of one prompt, or `None` when no prompt has that id.
    async fn content(&self, id: &str) -> Result<Option<String>, PromptError>;

    /// Where prompts come from, for status messages.
    fn location(&self) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub id: String,
    pub title: String,
    pub description: String,
    pub content: String,
}

impl Prompt {
    pub fn summary(&self) -> PromptSummary {
        PromptSummary {
            id: self.id.clone(),
            title: Some(self.title.clone()),
            description: Some(self.description.clone()).filter(|d| !d.is_empty()),
        }
    }
}

/// Split a leading `---` delimited block of `key: value` lines from the body.
///
/// Content without a complete frontmatter block is returned whole, trimmed.
pub fn parse_frontmatter(content: &str) -> (HashMap<String, String>, &str) {
    let mut lines = content.split_inclusive('\n');
    let opens_block = lines
        .next()
        .is_some_and(|first| first.ends_with('\n') && first.trim_end() == "---");
    if !opens_block {
        return (HashMap::new(), content.trim());
    }

    let mut offset = content.find('\n').map_or(content.len(), |i| i + 1);
    let mut metadata = HashMap::new();
    for line in lines {
        offset += line.len();
        if line.trim_end() == "---" {
            return (metadata, content[offset..].trim());
        }
        if let Some((key, value)) = line.trim().split_once(':') {
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            metadata.insert(key.trim().to_string(), value.to_string());
        }
    }

    (HashMap::new(), content.trim())
}

fn valid_prompt_id(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ' '))
}

struct CachedPrompt {
    modified: SystemTime,
    prompt: Prompt,
}

/// Prompts read from `*.md` files in a directory, cached by modification time.
pub struct LocalPromptLibrary {
    dir: PathBuf,
    cache: Mutex<HashMap<String, CachedPrompt>>,
}

impl LocalPromptLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_prompt(path: &Path, id: &str) -> Result<Prompt, PromptError> {
        let raw = fs::read_to_string(path).map_err(|source| PromptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let (mut metadata, body) = parse_frontmatter(&raw);
        let title = metadata
            .remove("title")
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| id.to_string());

        Ok(Prompt {
            id: id.to_string(),
            title,
            description: metadata.remove("description").unwrap_or_default(),
            content: body.to_string(),
        })
    }

    fn load_cached(&self, path: &Path, id: &str) -> Result<Prompt, PromptError> {
        let modified = fs::metadata(path)
            .and_then(|meta| meta.modified())
            .map_err(|source| PromptError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = cache.get(id).filter(|c| c.modified == modified) {
            return Ok(cached.prompt.clone());
        }

        let prompt = Self::read_prompt(path, id)?;
        cache.insert(
            id.to_string(),
            CachedPrompt {
                modified,
                prompt: prompt.clone(),
            },
        );
        Ok(prompt)
    }

    pub fn load_all(&self) -> Result<Vec<Prompt>, PromptError> {
        if !self.dir.exists() {
            tracing::warn!(dir = %path_display(&self.dir), "prompts directory does not exist");
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.dir).map_err(|source| PromptError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut prompts = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("md") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match self.load_cached(&path, id) {
                Ok(prompt) => prompts.push(prompt),
                Err(err) => tracing::error!(error = %err, "skipping prompt file"),
            }
        }

        prompts.sort_by_key(|p| p.title.to_lowercase());
        tracing::debug!(count = prompts.len(), dir = %path_display(&self.dir), "loaded prompts");
        Ok(prompts)
    }

    pub fn load(&self, id: &str) -> Result<Option<Prompt>, PromptError> {
        if !valid_prompt_id(id) {
            return Err(PromptError::InvalidId(id.to_string()));
        }
        let path = self.dir.join(format!("{id}.md"));
        if !path.exists() {
            tracing::warn!(prompt = id, "prompt not found");
            return Ok(None);
        }
        self.load_cached(&path, id).map(Some)
    }
}

#[async_trait::async_trait]
impl PromptSource for LocalPromptLibrary {
    async fn list(&self) -> Result<Vec<PromptSummary>, PromptError> {
        Ok(self.load_all()?.iter().map(Prompt::summary).collect())
    }

    async fn content(&self, id: &str) -> Result<Option<String>, PromptError> {
        Ok(self.load(id)?.map(|prompt| prompt.content))
    }

    fn location(&self) -> String {
        path_display(&self.dir)
    }
}

/// Prompts served by the chat backend.
pub struct RemotePromptDirectory {
    client: reqwest::Client,
    server_url: String,
}

impl RemotePromptDirectory {
    pub fn new(client: reqwest::Client, server_url: impl Into<String>) -> Self {
        Self {
            client,
            server_url: server_url.into(),
        }
    }
}

#[async_trait::async_trait]
impl PromptSource for RemotePromptDirectory {
    async fn list(&self) -> Result<Vec<PromptSummary>, PromptError> {
        let mut prompts = fetch_prompts(&self.client, &self.server_url)
            .await
            .map_err(|err| PromptError::Remote(err.to_string()))?;
        prompts.sort_by_key(|p| p.display_title().to_lowercase());
        Ok(prompts)
    }

    async fn content(&self, id: &str) -> Result<Option<String>, PromptError> {
        if !valid_prompt_id(id) {
            return Err(PromptError::InvalidId(id.to_string()));
        }
        fetch_prompt_content(&self.client, &self.server_url, id)
            .await
            .map_err(|err| PromptError::Remote(err.to_string()))
    }

    fn location(&self) -> String {
        self.server_url.clone()
    }
}

/// Local prompt files when a directory is configured, the backend otherwise.
pub fn prompt_source_for(
    config: &Config,
    client: reqwest::Client,
    server_url: &str,
) -> Arc<dyn PromptSource> {
    match &config.prompts_dir {
        Some(dir) => Arc::new(LocalPromptLibrary::new(dir.clone())),
        None => Arc::new(RemotePromptDirectory::new(client, server_url)),
    }
}

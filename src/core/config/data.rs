use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::config::rag::RagConfig;
use crate::core::constants::{DEFAULT_MODEL, DEFAULT_SERVER_URL};
use crate::core::session::SamplingParams;

/// Which tab of the settings view was last open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingsTab {
    #[default]
    Models,
    Prompts,
    Rag,
}

impl SettingsTab {
    pub const ALL: [SettingsTab; 3] = [SettingsTab::Models, SettingsTab::Prompts, SettingsTab::Rag];

    pub fn next(self) -> Self {
        match self {
            SettingsTab::Models => SettingsTab::Prompts,
            SettingsTab::Prompts => SettingsTab::Rag,
            SettingsTab::Rag => SettingsTab::Models,
        }
    }

    pub fn previous(self) -> Self {
        match self {
            SettingsTab::Models => SettingsTab::Rag,
            SettingsTab::Prompts => SettingsTab::Models,
            SettingsTab::Rag => SettingsTab::Prompts,
        }
    }

    pub fn index(self) -> usize {
        match self {
            SettingsTab::Models => 0,
            SettingsTab::Prompts => 1,
            SettingsTab::Rag => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SettingsTab::Models => "models",
            SettingsTab::Prompts => "prompts",
            SettingsTab::Rag => "rag",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tab| tab.as_str() == value)
    }
}

impl fmt::Display for SettingsTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Filter directive for this crate's own events (e.g. "debug").
    pub level_app: Option<String>,
    /// Filter directive for every other crate (e.g. "info").
    pub level_deps: Option<String>,
    pub to_file: Option<bool>,
    pub file_path: Option<PathBuf>,
    /// Also log to stderr; ignored while the full-screen UI is running.
    pub to_stderr: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Base URL of the chat backend
    pub server_url: Option<String>,
    pub selected_model: Option<String>,
    pub selected_prompt: Option<String>,
    /// Only list models whose prompt and completion prices are zero
    #[serde(default)]
    pub free_only: bool,
    #[serde(default)]
    pub active_tab: SettingsTab,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    /// Directory of markdown prompt files; the backend prompt directory is
    /// used when unset
    pub prompts_dir: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub rag: RagConfig,
}

impl Config {
    pub fn server_url(&self) -> &str {
        self.server_url.as_deref().unwrap_or(DEFAULT_SERVER_URL)
    }

    pub fn model(&self) -> &str {
        self.selected_model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn sampling(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature,
            top_p: self.top_p,
        }
    }
}

pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

use crate::core::config::data::{path_display, Config, SettingsTab};
use crate::core::config::rag::{RagConfig, RagConfigError, RagMode};
use directories::ProjectDirs;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Errors that can occur when loading or editing configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse the configuration file as valid TOML.
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// No platform configuration directory could be determined.
    NoConfigDir,

    UnknownKey(String),

    InvalidValue { key: String, reason: String },

    /// The edit would leave the selected retrieval mode incomplete.
    Rag(RagConfigError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "Failed to read config at {}: {}", path_display(path), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "Failed to parse config at {}: {}", path_display(path), source)
            }
            ConfigError::NoConfigDir => write!(f, "Failed to determine config directory"),
            ConfigError::UnknownKey(key) => write!(
                f,
                "Unknown setting '{key}'. Known settings: {}",
                SETTABLE_KEYS.join(", ")
            ),
            ConfigError::InvalidValue { key, reason } => {
                write!(f, "Invalid value for '{key}': {reason}")
            }
            ConfigError::Rag(err) => write!(f, "{err}"),
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Rag(err) => Some(err),
            _ => None,
        }
    }
}

pub const SETTABLE_KEYS: &[&str] = &[
    "server-url",
    "model",
    "prompt",
    "free-only",
    "active-tab",
    "temperature",
    "top-p",
    "prompts-dir",
    "log-level",
    "log-level-deps",
    "log-to-file",
    "log-file",
    "log-to-stderr",
    "rag-mode",
    "rag-local-path",
    "rag-server-host",
    "rag-server-port",
    "rag-cloud-tenant",
    "rag-cloud-database",
];

fn project_dirs() -> Result<ProjectDirs, ConfigError> {
    ProjectDirs::from("org", "chatstream", "chatstream").ok_or(ConfigError::NoConfigDir)
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("expected true or false, got '{value}'"),
        }),
    }
}

fn parse_unit_float(key: &str, value: &str, max: f32) -> Result<f32, ConfigError> {
    let parsed = value
        .trim()
        .parse::<f32>()
        .map_err(|err| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: err.to_string(),
        })?;
    if !(0.0..=max).contains(&parsed) {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("must be between 0 and {max}"),
        });
    }
    Ok(parsed)
}

impl Config {
    pub fn load_from_path(config_path: &Path) -> Result<Config, ConfigError> {
        if !config_path.exists() {
            return Ok(Config::default());
        }
        let contents = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        })
    }

    pub fn save_to_path(&self, config_path: &Path) -> Result<(), Box<dyn StdError>> {
        let parent = config_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty());

        if let Some(dir) = parent {
            fs::create_dir_all(dir)?;
        }

        let contents = toml::to_string_pretty(self)?;
        let mut temp_file = match parent {
            Some(dir) => NamedTempFile::new_in(dir)?,
            None => NamedTempFile::new()?,
        };

        temp_file.write_all(contents.as_bytes())?;
        temp_file.as_file_mut().sync_all()?;
        temp_file
            .persist(config_path)
            .map_err(|err| -> Box<dyn StdError> { Box::new(err) })?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    pub fn data_dir() -> Result<PathBuf, ConfigError> {
        Ok(project_dirs()?.data_dir().to_path_buf())
    }

    /// Apply a `set <key> <value>` edit.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: key.to_string(),
                reason: "value must not be empty".to_string(),
            });
        }
        match key {
            "server-url" => self.server_url = Some(trimmed.to_string()),
            "model" => self.selected_model = Some(trimmed.to_string()),
            "prompt" => self.selected_prompt = Some(trimmed.to_string()),
            "free-only" => self.free_only = parse_bool(key, trimmed)?,
            "active-tab" => {
                self.active_tab =
                    SettingsTab::parse(trimmed).ok_or_else(|| ConfigError::InvalidValue {
                        key: key.to_string(),
                        reason: "expected 'models', 'prompts' or 'rag'".to_string(),
                    })?
            }
            "temperature" => self.temperature = Some(parse_unit_float(key, trimmed, 2.0)?),
            "top-p" => self.top_p = Some(parse_unit_float(key, trimmed, 1.0)?),
            "prompts-dir" => self.prompts_dir = Some(PathBuf::from(trimmed)),
            "log-level" => self.logging.level_app = Some(trimmed.to_string()),
            "log-level-deps" => self.logging.level_deps = Some(trimmed.to_string()),
            "log-to-file" => self.logging.to_file = Some(parse_bool(key, trimmed)?),
            "log-file" => self.logging.file_path = Some(PathBuf::from(trimmed)),
            "log-to-stderr" => self.logging.to_stderr = Some(parse_bool(key, trimmed)?),
            key if key.starts_with("rag-") => self.edit_rag(key, Some(trimmed))?,
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    /// Apply an `unset <key>` edit, restoring the default.
    pub fn unset_value(&mut self, key: &str) -> Result<(), ConfigError> {
        match key {
            "server-url" => self.server_url = None,
            "model" => self.selected_model = None,
            "prompt" => self.selected_prompt = None,
            "free-only" => self.free_only = false,
            "active-tab" => self.active_tab = SettingsTab::default(),
            "temperature" => self.temperature = None,
            "top-p" => self.top_p = None,
            "prompts-dir" => self.prompts_dir = None,
            "log-level" => self.logging.level_app = None,
            "log-level-deps" => self.logging.level_deps = None,
            "log-to-file" => self.logging.to_file = None,
            "log-file" => self.logging.file_path = None,
            "log-to-stderr" => self.logging.to_stderr = None,
            key if key.starts_with("rag-") => self.edit_rag(key, None)?,
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    /// Edits one field of the `[rag]` table. Changing the mode, or a field of
    /// the selected mode, must leave that mode complete; otherwise the table
    /// is left as it was.
    fn edit_rag(&mut self, key: &str, value: Option<&str>) -> Result<(), ConfigError> {
        let defaults = RagConfig::default();
        let mut rag = self.rag.clone();
        match (key, value) {
            ("rag-mode", Some(value)) => {
                rag.mode = RagMode::parse(value).ok_or_else(|| ConfigError::InvalidValue {
                    key: key.to_string(),
                    reason: "expected 'local', 'server' or 'cloud'".to_string(),
                })?
            }
            ("rag-mode", None) => rag.mode = defaults.mode,
            ("rag-local-path", value) => rag.local_path = value.map(PathBuf::from),
            ("rag-server-host", value) => {
                rag.server_host = value.map_or(defaults.server_host, str::to_string)
            }
            ("rag-server-port", Some(value)) => {
                rag.server_port = value.parse().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    reason: format!("expected a port number, got '{value}'"),
                })?
            }
            ("rag-server-port", None) => rag.server_port = defaults.server_port,
            ("rag-cloud-tenant", value) => rag.cloud_tenant = value.map(str::to_string),
            ("rag-cloud-database", value) => rag.cloud_database = value.map(str::to_string),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }

        let affects_mode = match rag_field_mode(key) {
            Some(mode) => mode == rag.mode,
            None => true,
        };
        if affects_mode {
            rag.validate().map_err(ConfigError::Rag)?;
        }
        self.rag = rag;
        Ok(())
    }

    /// Effective values for display, one `(key, value)` pair per setting.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let or_unset = |value: Option<String>| value.unwrap_or_else(|| "(unset)".to_string());
        vec![
            ("server-url", self.server_url().to_string()),
            ("model", self.model().to_string()),
            ("prompt", or_unset(self.selected_prompt.clone())),
            ("free-only", self.free_only.to_string()),
            ("active-tab", self.active_tab.to_string()),
            ("temperature", or_unset(self.temperature.map(|t| t.to_string()))),
            ("top-p", or_unset(self.top_p.map(|t| t.to_string()))),
            ("prompts-dir", or_unset(self.prompts_dir.as_ref().map(path_display))),
            ("log-level", or_unset(self.logging.level_app.clone())),
            ("log-level-deps", or_unset(self.logging.level_deps.clone())),
            ("log-to-file", or_unset(self.logging.to_file.map(|b| b.to_string()))),
            ("log-file", or_unset(self.logging.file_path.as_ref().map(path_display))),
            ("log-to-stderr", or_unset(self.logging.to_stderr.map(|b| b.to_string()))),
            ("rag-mode", self.rag.mode.to_string()),
            ("rag-local-path", or_unset(self.rag.local_path.as_ref().map(path_display))),
            ("rag-server-host", self.rag.server_host.clone()),
            ("rag-server-port", self.rag.server_port.to_string()),
            ("rag-cloud-tenant", or_unset(self.rag.cloud_tenant.clone())),
            ("rag-cloud-database", or_unset(self.rag.cloud_database.clone())),
        ]
    }
}

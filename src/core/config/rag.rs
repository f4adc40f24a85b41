//! Retrieval store settings: where the vector database lives and how to
//! reach it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::config::data::path_display;

pub const CHROMADB_API_KEY_ENV: &str = "CHROMADB_API_KEY";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RagMode {
    /// Embedded store in a local directory
    #[default]
    Local,
    /// Self-hosted server reached over HTTP
    Server,
    /// Hosted tenant authenticated with an API key
    Cloud,
}

impl RagMode {
    pub const ALL: [RagMode; 3] = [RagMode::Local, RagMode::Server, RagMode::Cloud];

    pub fn as_str(self) -> &'static str {
        match self {
            RagMode::Local => "local",
            RagMode::Server => "server",
            RagMode::Cloud => "cloud",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.as_str() == value)
    }
}

impl fmt::Display for RagMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `[rag]` table. Missing keys fall back to the defaults, so a partial
/// table on disk is merged over them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub mode: RagMode,
    pub local_path: Option<PathBuf>,
    pub server_host: String,
    pub server_port: u16,
    pub cloud_tenant: Option<String>,
    pub cloud_database: Option<String>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            mode: RagMode::Local,
            local_path: None,
            server_host: "localhost".to_string(),
            server_port: 8000,
            cloud_tenant: None,
            cloud_database: None,
        }
    }
}

/// A required field of the selected mode is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RagConfigError {
    LocalPathRequired,
    HostRequired,
    PortRequired,
    TenantRequired,
    DatabaseRequired,
}

impl fmt::Display for RagConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            RagConfigError::LocalPathRequired => "Local path is required for local mode",
            RagConfigError::HostRequired => "Host is required for server mode",
            RagConfigError::PortRequired => "Port is required for server mode",
            RagConfigError::TenantRequired => "Tenant ID is required for cloud mode",
            RagConfigError::DatabaseRequired => "Database name is required for cloud mode",
        };
        f.write_str(message)
    }
}

impl std::error::Error for RagConfigError {}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

impl RagConfig {
    /// Checks the fields the selected mode needs. Fields of other modes are
    /// not looked at.
    pub fn validate(&self) -> Result<(), RagConfigError> {
        match self.mode {
            RagMode::Local => {
                let path = self.local_path.as_ref().and_then(|p| p.to_str());
                if is_blank(path) {
                    return Err(RagConfigError::LocalPathRequired);
                }
            }
            RagMode::Server => {
                if self.server_host.trim().is_empty() {
                    return Err(RagConfigError::HostRequired);
                }
                if self.server_port == 0 {
                    return Err(RagConfigError::PortRequired);
                }
            }
            RagMode::Cloud => {
                if is_blank(self.cloud_tenant.as_deref()) {
                    return Err(RagConfigError::TenantRequired);
                }
                if is_blank(self.cloud_database.as_deref()) {
                    return Err(RagConfigError::DatabaseRequired);
                }
            }
        }
        Ok(())
    }

    /// One-line description of where the selected mode points.
    pub fn target(&self) -> String {
        match self.mode {
            RagMode::Local => self
                .local_path
                .as_ref()
                .map(path_display)
                .unwrap_or_else(|| "(no path)".to_string()),
            RagMode::Server => format!("{}:{}", self.server_host, self.server_port),
            RagMode::Cloud => format!(
                "{} / {}",
                self.cloud_tenant.as_deref().unwrap_or("(no tenant)"),
                self.cloud_database.as_deref().unwrap_or("(no database)")
            ),
        }
    }
}

/// Outcome of checking a local store directory before it is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalPathStatus {
    Missing,
    WillCreate,
    NoParent,
    NotADirectory,
    NotWritable,
    Ready,
}

impl LocalPathStatus {
    pub fn is_valid(self) -> bool {
        matches!(self, LocalPathStatus::WillCreate | LocalPathStatus::Ready)
    }

    pub fn message(self) -> &'static str {
        match self {
            LocalPathStatus::Missing => "Path is required",
            LocalPathStatus::WillCreate => "Directory will be created",
            LocalPathStatus::NoParent => "Parent directory does not exist",
            LocalPathStatus::NotADirectory => "Path is not a directory",
            LocalPathStatus::NotWritable => "Directory is not writable",
            LocalPathStatus::Ready => "Valid directory",
        }
    }
}

pub fn check_local_path(path: &Path) -> LocalPathStatus {
    if path.as_os_str().is_empty() {
        return LocalPathStatus::Missing;
    }
    if !path.exists() {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        return if parent.is_dir() {
            LocalPathStatus::WillCreate
        } else {
            LocalPathStatus::NoParent
        };
    }
    if !path.is_dir() {
        return LocalPathStatus::NotADirectory;
    }
    // The scratch file is removed when the handle drops.
    match tempfile::Builder::new()
        .prefix(".chatstream-write-test")
        .tempfile_in(path)
    {
        Ok(_) => LocalPathStatus::Ready,
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "local store is not writable");
            LocalPathStatus::NotWritable
        }
    }
}

/// Whether a hosted-store API key is available, without revealing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyStatus {
    pub configured: bool,
    pub masked: Option<String>,
}

impl ApiKeyStatus {
    pub fn from_env() -> Self {
        Self::from_key(std::env::var(CHROMADB_API_KEY_ENV).ok().as_deref())
    }

    pub fn from_key(key: Option<&str>) -> Self {
        match key.filter(|k| !k.is_empty()) {
            Some(key) => Self {
                configured: true,
                masked: Some(mask_api_key(key)),
            },
            None => Self {
                configured: false,
                masked: None,
            },
        }
    }
}

impl fmt::Display for ApiKeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.masked {
            Some(masked) => f.write_str(masked),
            None => write!(f, "not configured (set {CHROMADB_API_KEY_ENV})"),
        }
    }
}

/// Keeps the first and last four characters of keys longer than eight.
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "****".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_point_at_a_local_store() {
        let rag = RagConfig::default();
        assert_eq!(rag.mode, RagMode::Local);
        assert_eq!(rag.server_host, "localhost");
        assert_eq!(rag.server_port, 8000);
        assert_eq!(rag.local_path, None);
    }

    #[test]
    fn partial_table_is_merged_over_defaults() {
        let rag: RagConfig = toml::from_str("mode = \"server\"\nserver_port = 9000\n")
            .expect("parse rag table");
        assert_eq!(rag.mode, RagMode::Server);
        assert_eq!(rag.server_host, "localhost");
        assert_eq!(rag.server_port, 9000);
    }

    #[test]
    fn each_mode_requires_its_own_fields() {
        let local = RagConfig::default();
        assert_eq!(
            local.validate().unwrap_err().to_string(),
            "Local path is required for local mode"
        );

        let server = RagConfig {
            mode: RagMode::Server,
            server_host: "  ".into(),
            ..RagConfig::default()
        };
        assert_eq!(
            server.validate().unwrap_err().to_string(),
            "Host is required for server mode"
        );
        let server = RagConfig {
            server_host: "chroma.internal".into(),
            server_port: 0,
            ..server
        };
        assert_eq!(
            server.validate().unwrap_err().to_string(),
            "Port is required for server mode"
        );

        let cloud = RagConfig {
            mode: RagMode::Cloud,
            ..RagConfig::default()
        };
        assert_eq!(
            cloud.validate().unwrap_err().to_string(),
            "Tenant ID is required for cloud mode"
        );
        let cloud = RagConfig {
            cloud_tenant: Some("acme".into()),
            ..cloud
        };
        assert_eq!(
            cloud.validate().unwrap_err().to_string(),
            "Database name is required for cloud mode"
        );
    }

    #[test]
    fn default_server_settings_are_complete() {
        let server = RagConfig {
            mode: RagMode::Server,
            ..RagConfig::default()
        };
        assert_eq!(server.validate(), Ok(()));
        assert_eq!(server.target(), "localhost:8000");
    }

    #[test]
    fn local_path_checks() {
        let dir = TempDir::new().expect("tempdir");
        assert_eq!(check_local_path(Path::new("")), LocalPathStatus::Missing);
        assert_eq!(check_local_path(dir.path()), LocalPathStatus::Ready);
        assert_eq!(
            check_local_path(&dir.path().join("store")),
            LocalPathStatus::WillCreate
        );
        assert_eq!(
            check_local_path(&dir.path().join("missing/store")),
            LocalPathStatus::NoParent
        );

        let file = dir.path().join("notes.txt");
        std::fs::write(&file, "x").expect("write file");
        let status = check_local_path(&file);
        assert_eq!(status, LocalPathStatus::NotADirectory);
        assert!(!status.is_valid());
        assert_eq!(status.message(), "Path is not a directory");

        let leftovers = std::fs::read_dir(dir.path()).expect("read dir").count();
        assert_eq!(leftovers, 1, "write check must not leave files behind");
    }

    #[test]
    fn api_keys_are_masked() {
        assert_eq!(mask_api_key("ck-1234567890abcd"), "ck-1...abcd");
        assert_eq!(mask_api_key("short"), "****");
        assert_eq!(mask_api_key("12345678"), "****");

        let status = ApiKeyStatus::from_key(Some("ck-1234567890abcd"));
        assert!(status.configured);
        assert_eq!(status.to_string(), "ck-1...abcd");

        let status = ApiKeyStatus::from_key(Some(""));
        assert!(!status.configured);
        assert_eq!(status.to_string(), "not configured (set CHROMADB_API_KEY)");
    }
}

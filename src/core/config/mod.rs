pub mod data;
pub mod io;
pub mod orchestrator;
pub mod rag;


pub use data::{Config, LoggingConfig, SettingsTab};
pub use io::ConfigError;
pub use orchestrator::SettingsStore;
pub use rag::{RagConfig, RagConfigError, RagMode};

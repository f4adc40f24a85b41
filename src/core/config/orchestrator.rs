use crate::core::config::data::Config;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

#[derive(Default)]
struct ConfigCacheState {
    config: Option<Config>,
    modified: Option<SystemTime>,
}

/// Owns the settings file: reads are cached until the file's modification
/// time changes, and edits are written back atomically.
pub struct SettingsStore {
    path: PathBuf,
    state: Mutex<ConfigCacheState>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            state: Mutex::new(ConfigCacheState::default()),
        }
    }

    /// Store backed by the platform config file.
    pub fn open_default() -> Result<Self, Box<dyn Error>> {
        Ok(Self::new(Config::config_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Config, Box<dyn Error>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let disk_modified = Self::modified_time(&self.path);
        if state.config.is_none() || state.modified != disk_modified {
            let config = Config::load_from_path(&self.path)?;
            state.modified = disk_modified;
            state.config = Some(config);
        }
        Ok(state.config.clone().unwrap_or_default())
    }

    pub fn mutate<F, T>(&self, mutator: F) -> Result<T, Box<dyn Error>>
    where
        F: FnOnce(&mut Config) -> Result<T, Box<dyn Error>>,
    {
        let mut working = self.load()?;
        let result = mutator(&mut working)?;
        working.save_to_path(&self.path)?;

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.modified = Self::modified_time(&self.path);
        state.config = Some(working);
        Ok(result)
    }

    fn modified_time(path: &Path) -> Option<SystemTime> {
        fs::metadata(path).ok()?.modified().ok()
    }
}

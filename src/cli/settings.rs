//! `set`, `unset` and `config` subcommands.

use std::error::Error;
use std::io::{self, Write};

use crate::core::config::data::path_display;
use crate::core::config::rag::{check_local_path, ApiKeyStatus, CHROMADB_API_KEY_ENV};
use crate::core::config::{Config, RagMode, SettingsStore};

pub fn set_setting(store: &SettingsStore, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
    let shown = store.mutate(|config| {
        config.set_value(key, value)?;
        Ok(lookup(config, key))
    })?;
    println!("✅ Set {key} to: {shown}");
    Ok(())
}

pub fn unset_setting(store: &SettingsStore, key: &str) -> Result<(), Box<dyn Error>> {
    let shown = store.mutate(|config| {
        config.unset_value(key)?;
        Ok(lookup(config, key))
    })?;
    println!("✅ Unset {key} (now: {shown})");
    Ok(())
}

pub fn print_settings(store: &SettingsStore) -> Result<(), Box<dyn Error>> {
    let config = store.load()?;
    let mut stdout = io::stdout().lock();
    let api_key = ApiKeyStatus::from_env();
    write_settings(&mut stdout, &config, &path_display(store.path()), &api_key)?;
    Ok(())
}

fn lookup(config: &Config, key: &str) -> String {
    config
        .entries()
        .into_iter()
        .find(|(name, _)| *name == key)
        .map(|(_, value)| value)
        .unwrap_or_default()
}

pub fn write_settings<W: Write>(
    out: &mut W,
    config: &Config,
    location: &str,
    api_key: &ApiKeyStatus,
) -> io::Result<()> {
    writeln!(out, "⚙️  Settings ({location})")?;
    writeln!(out)?;
    let entries = config.entries();
    let width = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    for (key, value) in entries {
        writeln!(out, "  {key:<width$}  {value}")?;
    }

    writeln!(out)?;
    let rag = &config.rag;
    match rag.validate() {
        Ok(()) => writeln!(out, "  RAG store: {} ({})", rag.mode, rag.target())?,
        Err(err) => writeln!(out, "  RAG store: {} ({err})", rag.mode)?,
    }
    if let (RagMode::Local, Some(path)) = (rag.mode, rag.local_path.as_ref()) {
        writeln!(out, "  Local path: {}", check_local_path(path).message())?;
    }
    writeln!(out, "  {CHROMADB_API_KEY_ENV}: {api_key}")?;
    Ok(())
}

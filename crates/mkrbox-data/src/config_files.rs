//! Loading engine configuration and level catalogs from disk.
//!
//! A config directory holds `engine.{ron,toml,json}` and, optionally,
//! `levels.{ron,toml,json}`. A levels file replaces whatever catalog the
//! engine file declared.

use std::path::Path;

use mkrbox_core::config::EngineConfig;
use mkrbox_core::level::{Level, LevelCatalog};
use tracing::debug;

use crate::loader::{DataLoadError, deserialize_file, deserialize_list, find_data_file};

/// Base name of the engine config file.
pub const ENGINE_FILE: &str = "engine";
/// Base name of the optional level catalog file.
pub const LEVELS_FILE: &str = "levels";

fn validated(config: EngineConfig, path: &Path) -> Result<EngineConfig, DataLoadError> {
    config
        .validate()
        .map_err(|source| DataLoadError::Invalid {
            file: path.to_path_buf(),
            source,
        })?;
    Ok(config)
}

/// Load and validate a single engine config file.
pub fn load_engine_config(path: &Path) -> Result<EngineConfig, DataLoadError> {
    let config: EngineConfig = deserialize_file(path)?;
    debug!(file = %path.display(), "engine config loaded");
    validated(config, path)
}

/// Load a level catalog. TOML files keep the list under a `levels` key.
pub fn load_levels(path: &Path) -> Result<LevelCatalog, DataLoadError> {
    let levels: Vec<Level> = deserialize_list(path, LEVELS_FILE)?;
    debug!(file = %path.display(), count = levels.len(), "level catalog loaded");
    Ok(LevelCatalog::new(levels))
}

/// Load a config directory. A missing engine file means the stock config.
pub fn load_config_dir(dir: &Path) -> Result<EngineConfig, DataLoadError> {
    let engine_path = find_data_file(dir, ENGINE_FILE)?;
    let mut config = match &engine_path {
        Some(path) => deserialize_file(path)?,
        None => EngineConfig::default(),
    };

    if let Some(levels_path) = find_data_file(dir, LEVELS_FILE)? {
        config.levels = load_levels(&levels_path)?;
        return validated(config, &levels_path);
    }

    validated(config, engine_path.as_deref().unwrap_or(dir))
}

// ===========================================================================
// Tests
// ===========================================================================

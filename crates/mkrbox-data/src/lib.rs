//! File-backed configuration for the MKRBOX engine.
//!
//! Reads an [`EngineConfig`](mkrbox_core::config::EngineConfig) and an
//! optional level catalog from RON, TOML, or JSON files.

pub mod config_files;
pub mod loader;

pub use config_files::{load_config_dir, load_engine_config, load_levels};
pub use loader::{DataLoadError, Format};

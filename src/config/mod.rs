//! Configuration module for the voice-trigger daemon.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each subsystem,
//! `AppPaths` for cross-platform data directories, and TOML persistence via
//! `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::{AppPaths, CONFIG_ENV_VAR};
pub use settings::{
    ActionRule, AppConfig, AudioConfig, BusConfig, CommandsConfig, ConfigError,
    SegmentationConfig, SttConfig, WakeConfig,
};

//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings + command catalog):
//!   Windows: %APPDATA%\voice-trigger\
//!   macOS:   ~/Library/Application Support/voice-trigger/
//!   Linux:   ~/.config/voice-trigger/
//!
//! Data dir (models):
//!   Windows: %LOCALAPPDATA%\voice-trigger\
//!   macOS:   ~/Library/Application Support/voice-trigger/
//!   Linux:   ~/.local/share/voice-trigger/

use std::path::PathBuf;

/// Environment variable that overrides the location of `settings.toml`.
pub const CONFIG_ENV_VAR: &str = "VOICE_TRIGGER_CONFIG";

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml` and `commands.csv`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml` (or the `VOICE_TRIGGER_CONFIG` override).
    pub settings_file: PathBuf,
    /// Default location of the command catalog.
    pub commands_file: PathBuf,
    /// Directory for downloaded GGML model files.
    pub models_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "voice-trigger";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = std::env::var_os(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| config_dir.join("settings.toml"));
        let commands_file = config_dir.join("commands.csv");
        let models_dir = data_dir.join("models");

        Self {
            config_dir,
            settings_file,
            commands_file,
            models_dir,
        }
    }

    /// On-disk location of the GGML file for model `name`.
    pub fn model_file(&self, name: &str) -> PathBuf {
        self.models_dir.join(format!("ggml-{name}.bin"))
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_non_empty() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths.models_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths
            .commands_file
            .file_name()
            .is_some_and(|n| n == "commands.csv"));
    }

    #[test]
    fn model_file_uses_ggml_prefix() {
        let paths = AppPaths::new();
        let file = paths.model_file("tiny.en");
        assert!(file
            .file_name()
            .is_some_and(|n| n == "ggml-tiny.en.bin"));
        assert!(file.starts_with(&paths.models_dir));
    }
}

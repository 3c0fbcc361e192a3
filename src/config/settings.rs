//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Missing sections or fields fall back to their defaults.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AppPaths;
use crate::stt::MAX_TRANSCRIBE_SECS;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// A configuration value that the pipeline cannot run with.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("max_command_secs ({max}) must be greater than min_command_secs ({min})")]
    CommandBounds { min: f32, max: f32 },

    #[error("sample_rate must be > 0")]
    ZeroSampleRate,

    #[error("chunk_secs must be > 0 (got {0})")]
    ChunkDuration(f32),

    #[error("wake phrase must not be empty")]
    EmptyWakePhrase,

    #[error("match cutoff must be within 0..=100 (got {0})")]
    Cutoff(f64),

    #[error("queue_capacity must be > 0")]
    ZeroQueueCapacity,

    #[error("max_in_flight must be > 0")]
    ZeroInFlight,

    #[error("rolling_secs ({rolling}) must cover {field} ({value})")]
    RollingTooShort {
        rolling: f32,
        field: &'static str,
        value: f32,
    },

    #[error("{field} ({value} s) exceeds the {limit} s transcription limit")]
    ExceedsTranscriptionLimit {
        field: &'static str,
        value: f32,
        limit: f32,
    },
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for audio capture, frame hand-off and speech classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Pipeline sample rate in Hz (Whisper expects 16 000).
    pub sample_rate: u32,
    /// Duration of one frame in seconds.
    pub chunk_secs: f32,
    /// Input device name; `None` means the system default.
    pub input_device: Option<String>,
    /// Mean absolute amplitude above which a frame counts as speech.
    pub vad_threshold: f32,
    /// Number of frames the capture → worker queue holds before the oldest
    /// frame is dropped.
    pub queue_capacity: usize,
    /// Play an acknowledgment tone when the trigger phrase is detected.
    pub acknowledge: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            chunk_secs: 0.5,
            input_device: None,
            vad_threshold: 0.01,
            queue_capacity: 64,
            acknowledge: true,
        }
    }
}

impl AudioConfig {
    /// Samples per frame (`chunk_secs × sample_rate`, at least 1).
    pub fn frame_samples(&self) -> usize {
        secs_to_samples(self.chunk_secs, self.sample_rate).max(1)
    }
}

// ---------------------------------------------------------------------------
// WakeConfig
// ---------------------------------------------------------------------------

/// Trigger-phrase detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeConfig {
    /// Trigger phrase, matched case-insensitively as a substring.
    pub phrase: String,
    /// Armed window after a detection during which end-of-speech is not
    /// evaluated.
    pub delay_secs: f32,
    /// Minimum time between two accepted detections.
    pub debounce_secs: f32,
    /// Capacity of the rolling pre-buffer in seconds.
    pub rolling_secs: f32,
    /// Pre-buffer fill level required before a detection is attempted.
    pub min_fill_secs: f32,
    /// Seconds of pre-wake audio carried into a new utterance.
    pub seed_secs: f32,
    /// Maximum number of concurrent detection attempts.
    pub max_in_flight: usize,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            phrase: "garmin".into(),
            delay_secs: 1.2,
            debounce_secs: 2.0,
            rolling_secs: 3.0,
            min_fill_secs: 0.5,
            seed_secs: 1.0,
            max_in_flight: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// SegmentationConfig
// ---------------------------------------------------------------------------

/// End-of-speech and utterance length settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Continuous non-speech required to end an utterance.
    pub pause_threshold_secs: f32,
    /// Shorter utterances are discarded as noise when the pause fires.
    pub min_command_secs: f32,
    /// Hard cap; the utterance is finalized unconditionally at this length.
    pub max_command_secs: f32,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            pause_threshold_secs: 1.0,
            min_command_secs: 1.0,
            max_command_secs: 15.0,
        }
    }
}

// ---------------------------------------------------------------------------
// SttConfig
// ---------------------------------------------------------------------------

/// Settings for the Whisper STT engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// GGML model name (file `ggml-<model>.bin` in the models directory).
    pub model: String,
    /// Explicit model file, overriding `model`.
    pub model_path: Option<PathBuf>,
    /// Speech language as an ISO-639-1 code.
    pub language: String,
    /// Attempt GPU-accelerated inference when available.
    pub use_gpu: bool,
    /// Beam size for trigger detection (1 = greedy).
    pub wake_beam_size: i32,
    /// Beam size for command transcription (1 = greedy).
    pub command_beam_size: i32,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: "tiny.en".into(),
            model_path: None,
            language: "en".into(),
            use_gpu: false,
            wake_beam_size: 1,
            command_beam_size: 3,
        }
    }
}

impl SttConfig {
    /// Resolve the model file, falling back to the platform models directory.
    pub fn resolve_model_path(&self, paths: &AppPaths) -> PathBuf {
        self.model_path
            .clone()
            .unwrap_or_else(|| paths.model_file(&self.model))
    }
}

// ---------------------------------------------------------------------------
// CommandsConfig
// ---------------------------------------------------------------------------

/// Command catalog and matching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// CSV catalog; `None` means `commands.csv` in the config directory.
    pub catalog_path: Option<PathBuf>,
    /// Minimum similarity score (0–100) for a match to be accepted.
    pub cutoff: f64,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            catalog_path: None,
            cutoff: 70.0,
        }
    }
}

impl CommandsConfig {
    pub fn resolve_catalog_path(&self, paths: &AppPaths) -> PathBuf {
        self.catalog_path
            .clone()
            .unwrap_or_else(|| paths.commands_file.clone())
    }
}

// ---------------------------------------------------------------------------
// BusConfig
// ---------------------------------------------------------------------------

/// MQTT control bus connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// When `false`, publishes are only logged.
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub client_id: String,
    /// Topic prefix; a publish for device `led` goes to `<prefix>/led`.
    pub topic_prefix: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "192.168.1.139".into(),
            port: 1883,
            client_id: "voice-trigger".into(),
            topic_prefix: "gpio".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ActionRule
// ---------------------------------------------------------------------------

/// One allow-listed local handler: when `device state` is dispatched,
/// `program` is spawned with `args` (no shell involved).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRule {
    pub device: String,
    pub state: String,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use voice_trigger::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Capture / frame settings.
    pub audio: AudioConfig,
    /// Trigger phrase detection.
    pub wake: WakeConfig,
    /// End-of-speech detection and utterance bounds.
    pub segmentation: SegmentationConfig,
    /// STT engine settings.
    pub stt: SttConfig,
    /// Command catalog and fuzzy matching.
    pub commands: CommandsConfig,
    /// Control bus connection.
    pub bus: BusConfig,
    /// Allow-listed local handlers.
    pub actions: Vec<ActionRule>,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check the cross-field invariants the pipeline relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let seg = &self.segmentation;
        if seg.max_command_secs <= seg.min_command_secs {
            return Err(ConfigError::CommandBounds {
                min: seg.min_command_secs,
                max: seg.max_command_secs,
            });
        }
        if self.audio.sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        if !(self.audio.chunk_secs > 0.0) {
            return Err(ConfigError::ChunkDuration(self.audio.chunk_secs));
        }
        if self.audio.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.wake.phrase.trim().is_empty() {
            return Err(ConfigError::EmptyWakePhrase);
        }
        if self.wake.max_in_flight == 0 {
            return Err(ConfigError::ZeroInFlight);
        }
        if !(0.0..=100.0).contains(&self.commands.cutoff) {
            return Err(ConfigError::Cutoff(self.commands.cutoff));
        }
        for (field, value) in [
            ("min_fill_secs", self.wake.min_fill_secs),
            ("seed_secs", self.wake.seed_secs),
        ] {
            if self.wake.rolling_secs < value {
                return Err(ConfigError::RollingTooShort {
                    rolling: self.wake.rolling_secs,
                    field,
                    value,
                });
            }
        }
        // A capped utterance can overshoot the cap by up to one frame.
        for (field, value) in [
            ("max_command_secs + chunk_secs", seg.max_command_secs + self.audio.chunk_secs),
            ("rolling_secs", self.wake.rolling_secs),
        ] {
            if value > MAX_TRANSCRIBE_SECS {
                return Err(ConfigError::ExceedsTranscriptionLimit {
                    field,
                    value,
                    limit: MAX_TRANSCRIBE_SECS,
                });
            }
        }
        Ok(())
    }
}

/// Convert seconds to a sample count at `sample_rate`.
pub(crate) fn secs_to_samples(secs: f32, sample_rate: u32) -> usize {
    (secs.max(0.0) as f64 * sample_rate as f64).round() as usize
}

/// Convert non-negative seconds to a [`Duration`].
pub(crate) fn secs(value: f32) -> Duration {
    Duration::from_secs_f32(value.max(0.0))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

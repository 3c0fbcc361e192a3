//! Transcription parameter types, result types and transcript normalization.
//!
//! [`TranscribeParams`] carries all settings that control a single Whisper
//! inference run.  The wake check and the command transcription use separate
//! parameter sets: greedy decoding for the former, beam search for the latter.

// ---------------------------------------------------------------------------
// SamplingStrategy
// ---------------------------------------------------------------------------

/// Mirrors `whisper_rs::SamplingStrategy` but is owned and `Clone`.
#[derive(Debug, Clone, PartialEq)]
pub enum SamplingStrategy {
    /// Greedy (single-pass) decoding.
    Greedy {
        /// Number of candidate tokens evaluated per step.  1 is fastest.
        best_of: i32,
    },
    /// Beam-search decoding.
    BeamSearch {
        /// Number of beams to maintain in parallel.
        beam_size: i32,
        /// Beam-search patience factor; whisper.cpp treats `-1.0` as unset.
        patience: f32,
    },
}

impl Default for SamplingStrategy {
    fn default() -> Self {
        Self::Greedy { best_of: 1 }
    }
}

impl SamplingStrategy {
    /// Greedy for `beam_size <= 1`, beam search otherwise.
    pub fn from_beam_size(beam_size: i32) -> Self {
        if beam_size <= 1 {
            Self::Greedy { best_of: 1 }
        } else {
            Self::BeamSearch {
                beam_size,
                patience: -1.0,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TranscribeParams
// ---------------------------------------------------------------------------

/// All parameters for a single Whisper transcription run.
///
/// ```
/// use voice_trigger::stt::{SamplingStrategy, TranscribeParams};
///
/// let params = TranscribeParams::with_beam("en", 3);
/// assert_eq!(params.strategy, SamplingStrategy::BeamSearch { beam_size: 3, patience: -1.0 });
/// ```
#[derive(Debug, Clone)]
pub struct TranscribeParams {
    /// ISO-639-1 language code (e.g. `"en"`), or `"auto"`.
    pub language: String,

    pub strategy: SamplingStrategy,

    /// Number of CPU threads handed to Whisper.  Defaults to
    /// [`optimal_threads()`], capped at 8.
    pub n_threads: i32,

    /// Suppress Whisper's progress output to stderr.
    pub suppress_progress: bool,
}

impl Default for TranscribeParams {
    fn default() -> Self {
        Self {
            language: "en".into(),
            strategy: SamplingStrategy::default(),
            n_threads: optimal_threads(),
            suppress_progress: true,
        }
    }
}

impl TranscribeParams {
    pub fn with_beam(language: impl Into<String>, beam_size: i32) -> Self {
        Self {
            language: language.into(),
            strategy: SamplingStrategy::from_beam_size(beam_size),
            ..Self::default()
        }
    }
}

/// Returns the number of CPU threads to use for inference, capped at 8 to
/// avoid diminishing returns on Whisper.
pub(crate) fn optimal_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8) as i32)
        .unwrap_or(4)
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// The output of a successful transcription.
#[derive(Debug, Clone)]
pub struct TranscriptionResult {
    /// Time-aligned segments in decode order.
    pub segments: Vec<Segment>,

    /// Wall-clock time the inference took, in milliseconds.
    pub duration_ms: u128,
}

impl TranscriptionResult {
    pub fn texts(&self) -> Vec<String> {
        self.segments.iter().map(|s| s.text.clone()).collect()
    }
}

/// A single time-aligned text chunk produced by Whisper.
#[derive(Debug, Clone)]
pub struct Segment {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

fn joined_lowercase(segments: &[String]) -> String {
    segments.join(" ").to_lowercase()
}

/// `true` when the lowercased, space-joined segments contain `trigger`.
///
/// ```
/// use voice_trigger::stt::contains_trigger;
///
/// let segs = vec![" Hey".to_string(), " Garmin.".to_string()];
/// assert!(contains_trigger(&segs, "garmin"));
/// ```
pub fn contains_trigger(segments: &[String], trigger: &str) -> bool {
    let trigger = trigger.trim().to_lowercase();
    !trigger.is_empty() && joined_lowercase(segments).contains(&trigger)
}

/// Build the command transcript from raw segments: join in order, lowercase,
/// strip every occurrence of the trigger phrase and collapse whitespace.
///
/// An empty result means the utterance held nothing but the trigger.
///
/// ```
/// use voice_trigger::stt::normalize_transcript;
///
/// let segs = vec![" Garmin,".to_string(), " turn on  the light".to_string()];
/// assert_eq!(normalize_transcript(&segs, "garmin"), ", turn on the light");
/// ```
pub fn normalize_transcript(segments: &[String], trigger: &str) -> String {
    let mut text = joined_lowercase(segments);
    let trigger = trigger.trim().to_lowercase();
    if !trigger.is_empty() {
        text = text.replace(&trigger, "");
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Core transcription trait and the Whisper implementation.
//!
//! [`Transcriber`] is the interface used by the pipeline.  It is object-safe
//! and `Send + Sync` so it can be held behind an `Arc<dyn Transcriber>` and
//! called concurrently from blocking-pool threads.
//!
//! [`WhisperEngine`] wraps a shared `whisper_rs::WhisperContext`; a fresh
//! `WhisperState` is created per call so no locking is needed.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use whisper_rs::{FullParams, WhisperContext, WhisperContextParameters};

use crate::audio::resample_linear;
use crate::stt::transcribe::{SamplingStrategy, Segment, TranscribeParams, TranscriptionResult};

// ---------------------------------------------------------------------------
// SttError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum SttError {
    /// The GGML model file was not found at the given path.
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// `whisper_rs` failed to initialise a `WhisperContext` or `WhisperState`.
    #[error("Whisper context initialisation failed: {0}")]
    ContextInit(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Audio too short: {0} samples, minimum 0.1 s (1 600 samples at 16 kHz)")]
    AudioTooShort(usize),

    #[error("Audio too long: {0} samples, maximum 60 s (960 000 samples at 16 kHz)")]
    AudioTooLong(usize),
}

// ---------------------------------------------------------------------------
// Transcriber trait
// ---------------------------------------------------------------------------

/// Speech-to-text collaborator.
///
/// `audio` is mono f32 PCM at `sample_rate` Hz.  Returns the decoded text
/// segments in order; an empty vector means nothing intelligible was heard.
pub trait Transcriber: Send + Sync {
    fn transcribe(&self, audio: &[f32], sample_rate: u32) -> Result<Vec<String>, SttError>;
}

// Compile-time assertion: Box<dyn Transcriber> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Transcriber>) {}
};

// ---------------------------------------------------------------------------
// Audio length constants (16 kHz mono f32)
// ---------------------------------------------------------------------------

pub const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// Longest clip, in seconds, that [`WhisperEngine`] accepts.
pub const MAX_TRANSCRIBE_SECS: f32 = 60.0;

/// 0.1 s × 16 000 Hz.
const MIN_AUDIO_SAMPLES: usize = 1_600;
/// 60 s × 16 000 Hz.
const MAX_AUDIO_SAMPLES: usize = 960_000;
/// whisper.cpp refuses input under one second; shorter clips are zero-padded.
const PAD_TO_SAMPLES: usize = 16_800;

// ---------------------------------------------------------------------------
// WhisperEngine
// ---------------------------------------------------------------------------

pub struct WhisperEngine {
    ctx: Arc<WhisperContext>,
    params: TranscribeParams,
}

impl std::fmt::Debug for WhisperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperEngine")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

// `WhisperContext` holds a raw pointer internally; the model weights are
// read-only after loading and every call creates its own `WhisperState`.
// SAFETY: WhisperContext is Send+Sync as declared by whisper-rs.
unsafe impl Send for WhisperEngine {}
unsafe impl Sync for WhisperEngine {}

impl WhisperEngine {
    /// Load a GGML model from `model_path`.
    ///
    /// # Errors
    ///
    /// - [`SttError::ModelNotFound`]: `model_path` does not exist.
    /// - [`SttError::ContextInit`]: whisper-rs failed to load the file.
    pub fn load(
        model_path: impl AsRef<Path>,
        use_gpu: bool,
        params: TranscribeParams,
    ) -> Result<Self, SttError> {
        let path = model_path.as_ref();

        if !path.exists() {
            return Err(SttError::ModelNotFound(path.display().to_string()));
        }

        let path_str = path.to_str().ok_or_else(|| {
            SttError::ModelNotFound(format!(
                "model path contains non-UTF-8 characters: {}",
                path.display()
            ))
        })?;

        let mut ctx_params = WhisperContextParameters::default();
        ctx_params.use_gpu(use_gpu);
        let ctx = WhisperContext::new_with_params(path_str, ctx_params)
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        log::info!("stt: loaded model {}", path.display());
        Ok(Self {
            ctx: Arc::new(ctx),
            params,
        })
    }

    /// A second engine over the same loaded model with different decoding
    /// parameters.
    pub fn with_params(&self, params: TranscribeParams) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
            params,
        }
    }

    pub fn params(&self) -> &TranscribeParams {
        &self.params
    }

    /// Transcribe 16 kHz mono `audio` into time-aligned segments.
    pub fn transcribe_full(&self, audio: &[f32]) -> Result<TranscriptionResult, SttError> {
        check_length(audio.len())?;

        let mut padded;
        let audio = if audio.len() < PAD_TO_SAMPLES {
            padded = audio.to_vec();
            padded.resize(PAD_TO_SAMPLES, 0.0);
            padded.as_slice()
        } else {
            audio
        };

        use whisper_rs::SamplingStrategy as WS;
        let ws = match self.params.strategy {
            SamplingStrategy::Greedy { best_of } => WS::Greedy { best_of },
            SamplingStrategy::BeamSearch { beam_size, patience } => {
                WS::BeamSearch { beam_size, patience }
            }
        };

        let mut fp = FullParams::new(ws);

        let lang: Option<&str> = if self.params.language == "auto" {
            None
        } else {
            Some(self.params.language.as_str())
        };
        fp.set_language(lang);
        fp.set_n_threads(self.params.n_threads);

        if self.params.suppress_progress {
            fp.set_print_progress(false);
            fp.set_print_realtime(false);
            fp.set_print_special(false);
            fp.set_print_timestamps(false);
        }

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        let wall_start = std::time::Instant::now();

        state
            .full(fp, audio)
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let n_segments = state
            .full_n_segments()
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let mut segments: Vec<Segment> = Vec::with_capacity(n_segments.max(0) as usize);
        for i in 0..n_segments {
            let text = state
                .full_get_segment_text(i)
                .map_err(|e| SttError::Transcription(format!("segment {i}: {e}")))?;

            // Timestamps are in centiseconds.
            let t0 = state.full_get_segment_t0(i).unwrap_or(0).max(0) as u64 * 10;
            let t1 = state.full_get_segment_t1(i).unwrap_or(0).max(0) as u64 * 10;

            segments.push(Segment {
                text,
                start_ms: t0,
                end_ms: t1,
            });
        }

        let duration_ms = wall_start.elapsed().as_millis();
        log::debug!(
            "stt: {} segment(s) from {:.2} s of audio in {duration_ms} ms",
            segments.len(),
            audio.len() as f32 / WHISPER_SAMPLE_RATE as f32
        );
        Ok(TranscriptionResult {
            segments,
            duration_ms,
        })
    }
}

impl Transcriber for WhisperEngine {
    fn transcribe(&self, audio: &[f32], sample_rate: u32) -> Result<Vec<String>, SttError> {
        let result = if sample_rate == WHISPER_SAMPLE_RATE {
            self.transcribe_full(audio)?
        } else {
            self.transcribe_full(&resample_linear(audio, sample_rate, WHISPER_SAMPLE_RATE))?
        };
        Ok(result.texts())
    }
}

fn check_length(len: usize) -> Result<(), SttError> {
    if len < MIN_AUDIO_SAMPLES {
        return Err(SttError::AudioTooShort(len));
    }
    if len > MAX_AUDIO_SAMPLES {
        return Err(SttError::AudioTooLong(len));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ScriptedTranscriber  (test-only)
// ---------------------------------------------------------------------------

/// A test double that replays queued responses in order.  Once the script is
/// exhausted every call returns an empty transcript.
#[cfg(test)]
#[derive(Default)]
pub struct ScriptedTranscriber {
    script: std::sync::Mutex<std::collections::VecDeque<Result<Vec<String>, SttError>>>,
    calls: std::sync::Mutex<Vec<usize>>,
}

#[cfg(test)]
impl ScriptedTranscriber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response made of `segments`.
    pub fn then_ok(self, segments: &[&str]) -> Self {
        self.push(Ok(segments.iter().map(|s| s.to_string()).collect()));
        self
    }

    pub fn then_err(self, error: SttError) -> Self {
        self.push(Err(error));
        self
    }

    fn push(&self, response: Result<Vec<String>, SttError>) {
        self.script.lock().unwrap().push_back(response);
    }

    /// Number of `transcribe` calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Sample count passed to each call, in order.
    pub fn call_lengths(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Transcriber for ScriptedTranscriber {
    fn transcribe(&self, audio: &[f32], _sample_rate: u32) -> Result<Vec<String>, SttError> {
        self.calls.lock().unwrap().push(audio.len());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

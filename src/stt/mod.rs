//! Speech-to-text: the [`Transcriber`] collaborator and transcript helpers.
//!
//! ```text
//!   WhisperEngine::load(model) ──▶ wake engine    (greedy, beam 1)
//!                      │
//!                      └ with_params ──▶ command engine (beam search)
//!
//!   segments ──▶ contains_trigger       (wake check)
//!            └─▶ normalize_transcript   (command text)
//! ```
//!
//! ```rust,no_run
//! use voice_trigger::stt::{TranscribeParams, Transcriber, WhisperEngine};
//!
//! let engine = WhisperEngine::load("models/ggml-tiny.en.bin", false, TranscribeParams::default())
//!     .expect("model not found");
//! let segments = engine.transcribe(&vec![0.0; 16_000], 16_000).unwrap();
//! println!("{segments:?}");
//! ```

pub mod engine;
pub mod transcribe;

pub use engine::{
    SttError, Transcriber, WhisperEngine, MAX_TRANSCRIBE_SECS, WHISPER_SAMPLE_RATE,
};
pub use transcribe::{
    contains_trigger, normalize_transcript, SamplingStrategy, Segment, TranscribeParams,
    TranscriptionResult,
};

#[cfg(test)]
pub use engine::ScriptedTranscriber;

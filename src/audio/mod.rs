//! Audio front end: capture → frames → queue, plus the buffers the pipeline
//! keeps over them.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → raw chunks (mpsc) → downmix_to_mono
//!           → LinearResampler → FrameAssembler → FrameQueue (drop-oldest)
//!                                                     │
//!                                     worker ◀────────┘
//!                                       ├─ RollingPreBuffer (always)
//!                                       └─ VadDetector (per frame)
//! ```

pub mod buffer;
pub mod capture;
pub mod frame;
pub mod queue;
pub mod resample;
pub mod tone;
pub mod vad;

pub use buffer::{RingBuffer, RollingPreBuffer};
pub use capture::{AudioCapture, CaptureError, StreamHandle};
pub use frame::{AudioFrame, FrameAssembler};
pub use queue::{FrameQueue, QueueItem};
pub use resample::{downmix_to_mono, resample_linear, LinearResampler};
pub use tone::{Acknowledge, BeepTone, Silent, ToneError};
pub use vad::{mean_abs_amplitude, VadDetector};

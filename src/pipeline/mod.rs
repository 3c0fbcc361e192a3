//! The voice-trigger pipeline: wake detection, segmentation and command
//! processing around a single worker.
//!
//! # Architecture
//!
//! ```text
//! FrameQueue ──▶ PipelineRunner::run()  (single owner of the state machine)
//!                  │
//!                  ├─ RollingPreBuffer::push            every frame
//!                  ├─ WakeDetector::launch ──────────▶  spawn → spawn_blocking(transcribe)
//!                  │        ▲                                     │
//!                  │        └──────── WakeOutcome ◀───────────────┘
//!                  ├─ SegmentationStateMachine::on_frame
//!                  │        │ Finalize(utterance)
//!                  │        ▼
//!                  └─ CommandProcessor::process ─────▶  transcribe → match → dispatch
//!                           ▲                                     │
//!                           └──────── CommandOutcome ◀────────────┘
//! ```

pub mod finalize;
pub mod runner;
pub mod state;
pub mod wake;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use finalize::{CommandOutcome, CommandProcessor};
pub use runner::{PipelineEvent, PipelineRunner};
pub use state::{
    FinalizeReason, FrameOutcome, SegmentationParams, SegmentationStateMachine, Utterance,
    WakeDecision, WakeState,
};
pub use wake::{WakeDetector, WakeOutcome};

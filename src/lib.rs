//! Voice-trigger daemon: listens for a trigger phrase, captures the spoken
//! command that follows, transcribes it, fuzzy-matches it against a command
//! catalog and dispatches the matched action.
//!
//! ```text
//! audio ──▶ pipeline ──▶ stt ──▶ commands
//!   │          │
//!   └──────────┴── config
//! ```

pub mod audio;
pub mod commands;
pub mod config;
pub mod pipeline;
pub mod stt;

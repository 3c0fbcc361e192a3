//! Fixed-duration mono audio frames and the assembler that cuts them.
//!
//! Every [`AudioFrame`] carries the instant it was assembled.  The pipeline
//! worker uses that timestamp, not the time it happens to dequeue the frame,
//! for all of its timing decisions, so a backlog in the queue never stretches
//! or shrinks a pause.

use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// AudioFrame
// ---------------------------------------------------------------------------

/// A fixed-length block of mono `f32` samples.  Immutable once produced.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    samples: Vec<f32>,
    sample_rate: u32,
    captured_at: Instant,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate: u32, captured_at: Instant) -> Self {
        Self {
            samples,
            sample_rate,
            captured_at,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// When the capture context finished assembling this frame.
    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

// ---------------------------------------------------------------------------
// FrameAssembler
// ---------------------------------------------------------------------------

/// Re-chunks an arbitrary stream of mono samples into frames of exactly
/// `frame_samples` samples.
///
/// ```rust
/// use voice_trigger::audio::FrameAssembler;
///
/// let mut asm = FrameAssembler::new(4, 16_000);
/// let frames = asm.push(&[0.1; 10]);
/// assert_eq!(frames.len(), 2);
/// assert_eq!(asm.pending(), 2);
/// ```
pub struct FrameAssembler {
    frame_samples: usize,
    sample_rate: u32,
    pending: Vec<f32>,
}

impl FrameAssembler {
    /// # Panics
    ///
    /// Panics if `frame_samples == 0`.
    pub fn new(frame_samples: usize, sample_rate: u32) -> Self {
        assert!(frame_samples > 0, "frame_samples must be > 0");
        Self {
            frame_samples,
            sample_rate,
            pending: Vec::with_capacity(frame_samples),
        }
    }

    /// Append `samples` and return every frame that is now complete, stamped
    /// with the current instant.
    pub fn push(&mut self, samples: &[f32]) -> Vec<AudioFrame> {
        self.push_at(samples, Instant::now())
    }

    pub fn push_at(&mut self, samples: &[f32], now: Instant) -> Vec<AudioFrame> {
        let mut frames = Vec::new();
        let mut rest = samples;
        while !rest.is_empty() {
            let take = (self.frame_samples - self.pending.len()).min(rest.len());
            self.pending.extend_from_slice(&rest[..take]);
            rest = &rest[take..];

            if self.pending.len() == self.frame_samples {
                let full = std::mem::replace(
                    &mut self.pending,
                    Vec::with_capacity(self.frame_samples),
                );
                frames.push(AudioFrame::new(full, self.sample_rate, now));
            }
        }
        frames
    }

    /// Samples buffered towards the next frame.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_duration() {
        let frame = AudioFrame::new(vec![0.0; 8_000], 16_000, Instant::now());
        assert_eq!(frame.duration(), Duration::from_millis(500));
        assert_eq!(frame.len(), 8_000);
    }

    #[test]
    fn assembler_emits_exact_frames_in_order() {
        let mut asm = FrameAssembler::new(3, 16_000);
        let input: Vec<f32> = (0..7).map(|i| i as f32).collect();
        let frames = asm.push(&input);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].samples(), &[0.0, 1.0, 2.0]);
        assert_eq!(frames[1].samples(), &[3.0, 4.0, 5.0]);
        assert_eq!(asm.pending(), 1);

        let frames = asm.push(&[7.0, 8.0]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].samples(), &[6.0, 7.0, 8.0]);
        assert_eq!(asm.pending(), 0);
    }

    #[test]
    fn assembler_stamps_frames() {
        let now = Instant::now();
        let mut asm = FrameAssembler::new(2, 16_000);
        let frames = asm.push_at(&[0.1, 0.2], now);
        assert_eq!(frames[0].captured_at(), now);
        assert_eq!(frames[0].sample_rate(), 16_000);
    }

    #[test]
    #[should_panic(expected = "frame_samples must be > 0")]
    fn zero_frame_size_panics() {
        let _ = FrameAssembler::new(0, 16_000);
    }
}

//! Energy-based speech classification for single frames.
//!
//! A frame counts as speech when its mean absolute amplitude exceeds a fixed
//! threshold.  The segmentation state machine uses this per frame to track
//! the last moment speech was heard.

/// Mean absolute amplitude of `frame` (`0.0` for an empty slice).
pub fn mean_abs_amplitude(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    frame.iter().map(|s| s.abs()).sum::<f32>() / frame.len() as f32
}

/// Frame classifier with a configurable amplitude threshold.
///
/// ```rust
/// use voice_trigger::audio::VadDetector;
///
/// let vad = VadDetector::new(0.01);
/// assert!(vad.is_speech(&[0.2, -0.2, 0.2]));
/// assert!(!vad.is_speech(&[0.0; 480]));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct VadDetector {
    threshold: f32,
}

impl VadDetector {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn is_speech(&self, frame: &[f32]) -> bool {
        mean_abs_amplitude(frame) > self.threshold
    }
}

impl Default for VadDetector {
    fn default() -> Self {
        Self::new(0.01)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_samples_count_by_magnitude() {
        assert!((mean_abs_amplitude(&[-0.5, 0.5]) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn empty_frame_is_silence() {
        assert_eq!(mean_abs_amplitude(&[]), 0.0);
        assert!(!VadDetector::default().is_speech(&[]));
    }

    #[test]
    fn threshold_is_exclusive() {
        let vad = VadDetector::new(0.25);
        assert!(!vad.is_speech(&[0.25; 16]));
        assert!(vad.is_speech(&[0.5; 16]));
    }

    #[test]
    fn sparse_spike_below_mean_is_silence() {
        let mut frame = vec![0.0_f32; 1_000];
        frame[0] = 1.0; // mean = 0.001
        assert!(!VadDetector::new(0.01).is_speech(&frame));
    }
}

//! Channel downmix and sample-rate conversion for captured audio.
//!
//! Capture devices deliver interleaved audio at their native rate; the
//! pipeline runs on mono audio at the configured rate (16 kHz for Whisper).
//! [`resample_linear`] converts a whole clip at once; [`LinearResampler`]
//! converts a stream delivered in arbitrary buffers.

// ---------------------------------------------------------------------------
// downmix_to_mono
// ---------------------------------------------------------------------------

/// Average interleaved multi-channel audio down to mono.
///
/// The output length is `samples.len() / channels`; a trailing partial frame
/// is ignored.  `channels == 0` yields an empty vector.
///
/// ```rust
/// use voice_trigger::audio::downmix_to_mono;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, 0.4]; // L R L R
/// let mono = downmix_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// resample_linear
// ---------------------------------------------------------------------------

/// Convert `samples` from `source_rate` to `target_rate` Hz by linear
/// interpolation.
///
/// Equal rates return a copy.  The output length is
/// `ceil(samples.len() × target_rate / source_rate)`.
///
/// ```rust
/// use voice_trigger::audio::resample_linear;
///
/// let hi = vec![0.5_f32; 480];
/// assert_eq!(resample_linear(&hi, 48_000, 16_000).len(), 160);
/// ```
pub fn resample_linear(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate || source_rate == 0 || target_rate == 0 {
        return samples.to_vec();
    }
    if samples.is_empty() {
        return Vec::new();
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let output_len = (samples.len() as f64 * ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let src_pos = i as f64 / ratio;
            let idx = src_pos as usize;
            let frac = (src_pos - idx as f64) as f32;
            match (samples.get(idx), samples.get(idx + 1)) {
                (Some(&a), Some(&b)) => a * (1.0 - frac) + b * frac,
                (Some(&a), None) => a,
                _ => 0.0,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// LinearResampler
// ---------------------------------------------------------------------------

/// Streaming linear-interpolation resampler.
///
/// Keeps the fractional read position and the last input sample between
/// calls, so a stream split into buffers of any size resamples the same as
/// the concatenated stream.
///
/// ```rust
/// use voice_trigger::audio::LinearResampler;
///
/// let mut rs = LinearResampler::new(48_000, 16_000);
/// let mut out = rs.process(&[0.25_f32; 100]);
/// out.extend(rs.process(&[0.25_f32; 200]));
/// assert_eq!(out.len(), 100);
/// ```
#[derive(Debug, Clone)]
pub struct LinearResampler {
    source_rate: u32,
    target_rate: u32,
    /// Input samples advanced per output sample.
    step: f64,
    /// Next read position; index 0 is `prev` when it is set.
    pos: f64,
    prev: Option<f32>,
}

impl LinearResampler {
    pub fn new(source_rate: u32, target_rate: u32) -> Self {
        let step = if source_rate == 0 || target_rate == 0 {
            1.0
        } else {
            source_rate as f64 / target_rate as f64
        };
        Self {
            source_rate,
            target_rate,
            step,
            pos: 0.0,
            prev: None,
        }
    }

    fn is_passthrough(&self) -> bool {
        self.source_rate == self.target_rate || self.source_rate == 0 || self.target_rate == 0
    }

    /// Resample the next buffer of the stream.
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if self.is_passthrough() {
            return input.to_vec();
        }
        let Some(&last) = input.last() else {
            return Vec::new();
        };

        let prev = self.prev;
        let offset = usize::from(prev.is_some());
        let len = input.len() + offset;
        let at = |i: usize| match (i, prev) {
            (0, Some(p)) => p,
            _ => input[i - offset],
        };

        let mut out = Vec::with_capacity((input.len() as f64 / self.step).ceil() as usize + 1);
        while (self.pos as usize) + 1 < len {
            let idx = self.pos as usize;
            let frac = (self.pos - idx as f64) as f32;
            out.push(at(idx) * (1.0 - frac) + at(idx + 1) * frac);
            self.pos += self.step;
        }

        // Re-base so index 0 of the next call is this buffer's last sample.
        self.pos -= (len - 1) as f64;
        self.prev = Some(last);
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_mono_is_copy() {
        let input = vec![0.1_f32, 0.2, 0.3];
        assert_eq!(downmix_to_mono(&input, 1), input);
    }

    #[test]
    fn downmix_four_channels() {
        let out = downmix_to_mono(&[0.4_f32; 8], 4);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn downmix_zero_channels() {
        assert!(downmix_to_mono(&[1.0_f32, 2.0], 0).is_empty());
    }

    #[test]
    fn same_rate_is_noop() {
        let input: Vec<f32> = (0..160).map(|i| i as f32 / 160.0).collect();
        assert_eq!(resample_linear(&input, 16_000, 16_000), input);
    }

    #[test]
    fn empty_input() {
        assert!(resample_linear(&[], 48_000, 16_000).is_empty());
    }

    #[test]
    fn downsample_44100_length() {
        let out = resample_linear(&vec![0.0_f32; 44_100], 44_100, 16_000);
        assert!(out.len().abs_diff(16_000) <= 1, "got {}", out.len());
    }

    #[test]
    fn upsample_doubles_length() {
        let out = resample_linear(&vec![0.0_f32; 80], 8_000, 16_000);
        assert_eq!(out.len(), 160);
    }

    #[test]
    fn constant_signal_preserves_amplitude() {
        let out = resample_linear(&vec![0.5_f32; 480], 48_000, 16_000);
        assert!(out.iter().all(|s| (s - 0.5).abs() < 1e-5));
    }

    #[test]
    fn streaming_matches_whole_buffer_across_boundaries() {
        let ramp: Vec<f32> = (0..4_800).map(|i| i as f32).collect();

        let mut whole = LinearResampler::new(48_000, 32_000);
        let expected = whole.process(&ramp);

        let mut chunked = LinearResampler::new(48_000, 32_000);
        let mut out = Vec::new();
        for chunk in ramp.chunks(7) {
            out.extend(chunked.process(chunk));
        }

        assert_eq!(out.len(), expected.len());
        for (k, s) in out.iter().enumerate() {
            assert!((s - 1.5 * k as f32).abs() < 1e-3, "sample {k}: {s}");
        }
    }

    #[test]
    fn streaming_44100_does_not_drift() {
        let mut rs = LinearResampler::new(44_100, 16_000);
        let total: usize = vec![0.0_f32; 44_100]
            .chunks(512)
            .map(|chunk| rs.process(chunk).len())
            .sum();
        assert!(total.abs_diff(16_000) <= 1, "got {total}");
    }

    #[test]
    fn streaming_same_rate_is_passthrough() {
        let mut rs = LinearResampler::new(16_000, 16_000);
        assert_eq!(rs.process(&[0.1, 0.2]), vec![0.1, 0.2]);
        assert!(rs.process(&[]).is_empty());
    }

    #[test]
    fn interpolates_between_samples() {
        // 2 samples at 1 Hz → 4 at 2 Hz: 0.0, 0.5, 1.0, 1.0 (last held)
        let out = resample_linear(&[0.0, 1.0], 1, 2);
        assert_eq!(out.len(), 4);
        assert!((out[1] - 0.5).abs() < 1e-6);
        assert!((out[3] - 1.0).abs() < 1e-6);
    }
}

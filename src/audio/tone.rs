//! Acknowledgment tone played when the trigger phrase is accepted.
//!
//! Playback is best-effort: [`Acknowledge::acknowledge`] returns immediately
//! and any output-device failure is logged on the playback thread.

use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToneError {
    #[error("no output device available")]
    NoDevice,

    #[error("failed to query default output config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

/// Side effect fired on a successful wake transition.
pub trait Acknowledge: Send + Sync {
    /// Must not block the caller.
    fn acknowledge(&self);
}

/// No-op acknowledgment.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl Acknowledge for Silent {
    fn acknowledge(&self) {}
}

/// A short sine beep on the default output device.
#[derive(Debug, Clone, Copy)]
pub struct BeepTone {
    pub frequency_hz: f32,
    pub duration: Duration,
    pub amplitude: f32,
}

impl Default for BeepTone {
    fn default() -> Self {
        Self {
            frequency_hz: 1_000.0,
            duration: Duration::from_millis(200),
            amplitude: 0.3,
        }
    }
}

impl BeepTone {
    /// Mono samples of the tone at `sample_rate`.
    pub fn samples(&self, sample_rate: u32) -> Vec<f32> {
        let n = (self.duration.as_secs_f64() * sample_rate as f64) as usize;
        let step = 2.0 * std::f32::consts::PI * self.frequency_hz / sample_rate as f32;
        (0..n)
            .map(|i| self.amplitude * (step * i as f32).sin())
            .collect()
    }

    /// Play the tone and block until it has finished.
    pub fn play_blocking(&self) -> Result<(), ToneError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(ToneError::NoDevice)?;
        let supported = device.default_output_config()?;
        let channels = supported.channels() as usize;
        let rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        let mut tone = self.samples(rate).into_iter();
        let stream = device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels.max(1)) {
                    let value = tone.next().unwrap_or(0.0);
                    frame.iter_mut().for_each(|s| *s = value);
                }
            },
            |err: cpal::StreamError| log::warn!("tone: output stream error: {err}"),
            None,
        )?;
        stream.play()?;
        std::thread::sleep(self.duration + Duration::from_millis(50));
        Ok(())
    }
}

impl Acknowledge for BeepTone {
    fn acknowledge(&self) {
        let tone = *self;
        let spawned = std::thread::Builder::new()
            .name("wake-tone".into())
            .spawn(move || {
                if let Err(e) = tone.play_blocking() {
                    log::warn!("tone: playback failed: {e}");
                }
            });
        if let Err(e) = spawned {
            log::warn!("tone: could not spawn playback thread: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tone_matches_reference_beep() {
        let tone = BeepTone::default();
        let samples = tone.samples(16_000);
        assert_eq!(samples.len(), 3_200);
        let peak = samples.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
        assert!(peak <= 0.3 + 1e-6 && peak > 0.29, "peak {peak}");
        assert_eq!(samples[0], 0.0);
    }

    #[test]
    fn silent_is_object_safe() {
        let ack: Box<dyn Acknowledge> = Box::new(Silent);
        ack.acknowledge();
    }
}

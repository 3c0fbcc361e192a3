//! Microphone capture via `cpal`, feeding the [`FrameQueue`].
//!
//! The stream is opened in the device's native sample format (`f32`, `i16`
//! or `u16`).  The cpal callback runs on the real-time audio thread and only
//! converts the raw buffer to `f32` and copies it onto a channel.  A dedicated `audio-frames` thread downmixes,
//! resamples and re-chunks that stream into fixed-size [`AudioFrame`]s and
//! pushes them into the queue (drop-oldest, never blocking).  A stream error
//! closes the queue so the worker shuts down instead of starving.

use std::sync::{mpsc, Arc};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use thiserror::Error;

use super::{downmix_to_mono, FrameAssembler, FrameQueue, LinearResampler};

// ---------------------------------------------------------------------------
// StreamHandle
// ---------------------------------------------------------------------------

/// RAII guard that keeps the cpal stream alive.  Dropping it stops capture;
/// the `audio-frames` thread exits once the callback's sender is gone.
pub struct StreamHandle {
    _stream: cpal::Stream,
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("input device {0:?} not found")]
    DeviceNotFound(String),

    #[error("failed to enumerate input devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("unsupported input sample format {0:?}")]
    UnsupportedFormat(SampleFormat),

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("failed to spawn frame thread: {0}")]
    Thread(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// AudioCapture
// ---------------------------------------------------------------------------

/// Input device wrapper.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use voice_trigger::audio::{AudioCapture, FrameQueue};
///
/// let queue = Arc::new(FrameQueue::new(64));
/// let capture = AudioCapture::new(None).unwrap();
/// let _handle = capture.start(Arc::clone(&queue), 16_000, 8_000).unwrap();
/// ```
pub struct AudioCapture {
    device: cpal::Device,
    config: cpal::StreamConfig,
    sample_format: SampleFormat,
    /// Native sample rate reported by the device (Hz).
    sample_rate: u32,
    /// Number of interleaved channels reported by the device.
    channels: u16,
}

impl AudioCapture {
    /// Open the input device named `device_name`, or the system default.
    pub fn new(device_name: Option<&str>) -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = match device_name {
            None => host.default_input_device().ok_or(CaptureError::NoDevice)?,
            Some(name) => host
                .input_devices()?
                .find(|d| d.name().is_ok_and(|n| n == name))
                .ok_or_else(|| CaptureError::DeviceNotFound(name.to_string()))?,
        };

        let supported = device.default_input_config()?;
        let sample_format = supported.sample_format();
        if !matches!(
            sample_format,
            SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16
        ) {
            return Err(CaptureError::UnsupportedFormat(sample_format));
        }
        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        Ok(Self {
            device,
            config,
            sample_format,
            sample_rate,
            channels,
        })
    }

    /// Start capturing.  Frames of `frame_samples` mono samples at
    /// `target_rate` Hz are pushed into `queue`.
    pub fn start(
        &self,
        queue: Arc<FrameQueue>,
        target_rate: u32,
        frame_samples: usize,
    ) -> Result<StreamHandle, CaptureError> {
        let native_rate = self.sample_rate;
        let channels = self.channels;
        let (raw_tx, raw_rx) = mpsc::channel::<Vec<f32>>();

        let frame_queue = Arc::clone(&queue);
        std::thread::Builder::new()
            .name("audio-frames".into())
            .spawn(move || {
                let mut assembler = FrameAssembler::new(frame_samples, target_rate);
                let mut resampler = LinearResampler::new(native_rate, target_rate);
                while let Ok(raw) = raw_rx.recv() {
                    let mono = downmix_to_mono(&raw, channels);
                    let resampled = resampler.process(&mono);
                    for frame in assembler.push(&resampled) {
                        frame_queue.push(frame);
                    }
                }
                log::debug!("capture: frame thread exiting");
            })?;

        let stream = match self.sample_format {
            SampleFormat::F32 => build_stream::<f32>(&self.device, &self.config, raw_tx, queue)?,
            SampleFormat::I16 => build_stream::<i16>(&self.device, &self.config, raw_tx, queue)?,
            SampleFormat::U16 => build_stream::<u16>(&self.device, &self.config, raw_tx, queue)?,
            other => return Err(CaptureError::UnsupportedFormat(other)),
        };

        stream.play()?;
        log::info!(
            "capture: started ({native_rate} Hz {:?}, {channels} ch → {target_rate} Hz mono, {frame_samples} samples/frame)",
            self.sample_format
        );
        Ok(StreamHandle { _stream: stream })
    }

    /// Native sample rate of the capture stream in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_format(&self) -> SampleFormat {
        self.sample_format
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    raw_tx: mpsc::Sender<Vec<f32>>,
    error_queue: Arc<FrameQueue>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            // Receiver gone means we are shutting down.
            let _ = raw_tx.send(samples_to_f32(data));
        },
        move |err: cpal::StreamError| {
            log::error!("capture: stream error: {err}; stopping pipeline");
            error_queue.close();
        },
        None,
    )
}

/// Convert native samples to `f32` in `[-1.0, 1.0]`.
fn samples_to_f32<T>(data: &[T]) -> Vec<f32>
where
    T: Sample,
    f32: FromSample<T>,
{
    data.iter().map(|s| s.to_sample::<f32>()).collect()
}

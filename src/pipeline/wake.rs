//! Asynchronous wake-phrase detection over pre-buffer snapshots.
//!
//! Each attempt copies the rolling pre-buffer, runs the transcriber on the
//! blocking pool and reports back to the worker over a channel.  A semaphore
//! bounds how many attempts run at once; when no permit is free the attempt
//! is simply skipped and the next frame tries again.  Attempts never touch
//! the state machine: the worker applies a positive result only if the
//! generation it was launched under is still current.

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};

use crate::audio::RollingPreBuffer;
use crate::stt::{contains_trigger, Transcriber};

/// Result of one detection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeOutcome {
    /// State-machine generation when the attempt was launched.
    pub generation: u64,
    pub detected: bool,
}

pub struct WakeDetector {
    transcriber: Arc<dyn Transcriber>,
    prebuffer: Arc<RollingPreBuffer>,
    phrase: String,
    permits: Arc<Semaphore>,
    max_in_flight: usize,
    outcomes: mpsc::UnboundedSender<WakeOutcome>,
}

impl WakeDetector {
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        prebuffer: Arc<RollingPreBuffer>,
        phrase: impl Into<String>,
        max_in_flight: usize,
        outcomes: mpsc::UnboundedSender<WakeOutcome>,
    ) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            transcriber,
            prebuffer,
            phrase: phrase.into(),
            permits: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
            outcomes,
        }
    }

    /// Number of attempts currently running.
    pub fn in_flight(&self) -> usize {
        self.max_in_flight - self.permits.available_permits()
    }

    /// Start an attempt tagged with `generation`.  Returns `false` when the
    /// pool is saturated and nothing was started.
    pub fn launch(&self, generation: u64) -> bool {
        let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
            return false;
        };

        let snapshot = self.prebuffer.snapshot();
        let rate = self.prebuffer.sample_rate();
        let transcriber = Arc::clone(&self.transcriber);
        let phrase = self.phrase.clone();
        let outcomes = self.outcomes.clone();

        log::debug!(
            "wake: checking {:.2} s of audio (generation {generation})",
            snapshot.len() as f32 / rate as f32
        );

        tokio::spawn(async move {
            let _permit = permit;
            let joined =
                tokio::task::spawn_blocking(move || transcriber.transcribe(&snapshot, rate)).await;

            let detected = match joined {
                Ok(Ok(segments)) => {
                    let hit = contains_trigger(&segments, &phrase);
                    if !hit {
                        log::debug!("wake: heard {:?}, no trigger", segments.join(" ").trim());
                    }
                    hit
                }
                Ok(Err(e)) => {
                    log::warn!("wake: transcription failed: {e}");
                    false
                }
                Err(e) => {
                    log::warn!("wake: detection task failed: {e}");
                    false
                }
            };

            // Receiver gone means the worker has stopped.
            let _ = outcomes.send(WakeOutcome {
                generation,
                detected,
            });
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::{ScriptedTranscriber, SttError};

    fn detector(
        transcriber: Arc<ScriptedTranscriber>,
        max_in_flight: usize,
    ) -> (WakeDetector, mpsc::UnboundedReceiver<WakeOutcome>) {
        let prebuffer = Arc::new(RollingPreBuffer::new(3.0, 16_000));
        prebuffer.push(&[0.1; 8_000]);
        let (tx, rx) = mpsc::unbounded_channel();
        (WakeDetector::new(transcriber, prebuffer, "garmin", max_in_flight, tx), rx)
    }

    #[tokio::test]
    async fn reports_detection_with_launch_generation() {
        let stt = Arc::new(ScriptedTranscriber::new().then_ok(&[" Hey", " Garmin!"]));
        let (d, mut rx) = detector(Arc::clone(&stt), 1);

        assert!(d.launch(7));
        let outcome = rx.recv().await.unwrap();
        assert_eq!(outcome, WakeOutcome { generation: 7, detected: true });
        assert_eq!(stt.call_lengths(), vec![8_000]);
    }

    #[tokio::test]
    async fn other_speech_and_errors_are_negative() {
        let stt = Arc::new(
            ScriptedTranscriber::new()
                .then_ok(&["turn on the light"])
                .then_err(SttError::Transcription("decoder".into())),
        );
        let (d, mut rx) = detector(stt, 1);

        assert!(d.launch(0));
        assert!(!rx.recv().await.unwrap().detected);
        assert!(d.launch(0));
        assert!(!rx.recv().await.unwrap().detected);
    }

    #[tokio::test]
    async fn saturated_pool_skips_launch() {
        let stt = Arc::new(ScriptedTranscriber::new());
        let (d, mut rx) = detector(stt, 1);

        assert!(d.launch(0));
        // The first attempt holds the only permit until its task finishes.
        assert!(!d.launch(0));
        assert_eq!(d.in_flight(), 1);

        rx.recv().await.unwrap();
        // The permit is released when the task ends, just after sending.
        tokio::task::yield_now().await;
        for _ in 0..100 {
            if d.in_flight() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(d.launch(0));
    }
}

//! Pipeline worker: the single owner of the segmentation state machine.
//!
//! [`PipelineRunner::run`] multiplexes three inputs with a biased
//! `tokio::select!`:
//!
//! ```text
//! wake outcomes    (WakeDetector tasks)     ──▶ apply_wake      Idle → Armed
//! command outcomes (CommandProcessor tasks) ──▶ apply_command   Finalizing → Idle
//! FrameQueue::pop  (capture thread)         ──▶ handle_frame    pre-buffer, detection, on_frame
//! ```
//!
//! Only the worker mutates the state machine; background tasks report back
//! through channels.  Transcription never runs on the worker itself, so
//! frame ingestion does not stall while a command is being processed.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::audio::{Acknowledge, AudioFrame, FrameQueue, QueueItem, RollingPreBuffer, Silent};
use crate::config::AppConfig;
use crate::stt::Transcriber;

use super::finalize::{CommandOutcome, CommandProcessor};
use super::state::{FinalizeReason, FrameOutcome, SegmentationStateMachine, WakeDecision, WakeState};
use super::wake::{WakeDetector, WakeOutcome};

// ---------------------------------------------------------------------------
// PipelineEvent
// ---------------------------------------------------------------------------

/// Observable pipeline milestones, for callers that want more than logs.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    WakeDetected,
    Discarded { spoken_secs: f32 },
    Finalized { reason: FinalizeReason, duration_secs: f32 },
    Command(CommandOutcome),
    Stopped,
}

// ---------------------------------------------------------------------------
// PipelineRunner
// ---------------------------------------------------------------------------

/// ```rust,no_run
/// # use std::sync::Arc;
/// # use voice_trigger::audio::FrameQueue;
/// # use voice_trigger::config::AppConfig;
/// # use voice_trigger::pipeline::{CommandProcessor, PipelineRunner};
/// # use voice_trigger::stt::Transcriber;
/// # fn wake_stt() -> Arc<dyn Transcriber> { unimplemented!() }
/// # fn processor() -> CommandProcessor { unimplemented!() }
/// # async fn example() {
/// let config = AppConfig::default();
/// let queue = Arc::new(FrameQueue::new(config.audio.queue_capacity));
/// let (events_tx, mut events) = tokio::sync::mpsc::channel(32);
///
/// let runner = PipelineRunner::new(&config, Arc::clone(&queue), wake_stt(), processor())
///     .with_events(events_tx);
/// tokio::spawn(runner.run());
///
/// while let Some(event) = events.recv().await {
///     println!("{event:?}");
/// }
/// # }
/// ```
pub struct PipelineRunner {
    machine: SegmentationStateMachine,
    queue: Arc<FrameQueue>,
    prebuffer: Arc<RollingPreBuffer>,
    detector: WakeDetector,
    wake_rx: mpsc::UnboundedReceiver<WakeOutcome>,
    processor: Arc<CommandProcessor>,
    command_tx: mpsc::UnboundedSender<CommandOutcome>,
    command_rx: mpsc::UnboundedReceiver<CommandOutcome>,
    acknowledge: Arc<dyn Acknowledge>,
    events: Option<mpsc::Sender<PipelineEvent>>,
    phrase: String,
    /// Capture time of the most recent frame; the worker's notion of "now".
    last_frame_at: Option<Instant>,
}

impl PipelineRunner {
    pub fn new(
        config: &AppConfig,
        queue: Arc<FrameQueue>,
        wake_transcriber: Arc<dyn Transcriber>,
        processor: CommandProcessor,
    ) -> Self {
        let prebuffer = Arc::new(RollingPreBuffer::new(
            config.wake.rolling_secs,
            config.audio.sample_rate,
        ));
        let (wake_tx, wake_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let detector = WakeDetector::new(
            wake_transcriber,
            Arc::clone(&prebuffer),
            config.wake.phrase.clone(),
            config.wake.max_in_flight,
            wake_tx,
        );

        Self {
            machine: SegmentationStateMachine::from_config(config),
            queue,
            prebuffer,
            detector,
            wake_rx,
            processor: Arc::new(processor),
            command_tx,
            command_rx,
            acknowledge: Arc::new(Silent),
            events: None,
            phrase: config.wake.phrase.clone(),
            last_frame_at: None,
        }
    }

    pub fn with_acknowledge(mut self, acknowledge: Arc<dyn Acknowledge>) -> Self {
        self.acknowledge = acknowledge;
        self
    }

    pub fn with_events(mut self, events: mpsc::Sender<PipelineEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> WakeState {
        self.machine.state()
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Process frames until the queue delivers its stop sentinel.
    pub async fn run(mut self) {
        log::info!("pipeline: say {:?} to issue a command", self.phrase);

        loop {
            tokio::select! {
                biased;

                Some(outcome) = self.wake_rx.recv() => self.apply_wake(outcome),
                Some(outcome) = self.command_rx.recv() => self.apply_command(outcome),
                item = self.queue.pop() => match item {
                    QueueItem::Frame(frame) => self.handle_frame(frame),
                    QueueItem::Stop => break,
                },
            }
        }

        log::info!(
            "pipeline: stop received in state {}, worker exiting ({} frame(s) dropped on overrun)",
            self.machine.state().label(),
            self.queue.overruns()
        );
        self.emit(PipelineEvent::Stopped);
    }

    // -----------------------------------------------------------------------
    // Handlers
    // -----------------------------------------------------------------------

    fn handle_frame(&mut self, frame: AudioFrame) {
        let now = frame.captured_at();
        self.last_frame_at = Some(now);
        self.prebuffer.push(frame.samples());

        if self.machine.can_launch_detection(now, self.prebuffer.len()) {
            self.detector.launch(self.machine.generation());
        }

        match self.machine.on_frame(&frame) {
            FrameOutcome::Ignored | FrameOutcome::Accumulating => {}
            FrameOutcome::Discarded { spoken_secs } => {
                log::info!("pipeline: discarded {spoken_secs:.2} s utterance (too short)");
                self.emit(PipelineEvent::Discarded { spoken_secs });
            }
            FrameOutcome::Finalize(utterance, reason) => {
                let duration_secs = utterance.duration_secs();
                log::info!(
                    "pipeline: finalizing {duration_secs:.2} s utterance ({})",
                    match reason {
                        FinalizeReason::Silence => "pause",
                        FinalizeReason::Cap => "length cap",
                    }
                );
                self.emit(PipelineEvent::Finalized {
                    reason,
                    duration_secs,
                });

                let processor = Arc::clone(&self.processor);
                let results = self.command_tx.clone();
                let task = tokio::spawn(async move { processor.process(utterance).await });
                // The machine leaves Finalizing only when an outcome arrives.
                tokio::spawn(async move {
                    let outcome = task.await.unwrap_or_else(|e| {
                        log::error!("pipeline: command task failed: {e}");
                        CommandOutcome::TranscriptionFailed(format!("command task failed: {e}"))
                    });
                    let _ = results.send(outcome);
                });
            }
        }
    }

    fn apply_wake(&mut self, outcome: WakeOutcome) {
        if !outcome.detected {
            return;
        }

        let now = self.last_frame_at.unwrap_or_else(Instant::now);
        let seed = self.prebuffer.tail(self.machine.params().seed_samples);
        match self.machine.try_wake(outcome.generation, now, seed) {
            WakeDecision::Accepted => {
                self.prebuffer.clear();
                let dropped = self.queue.clear_frames();
                log::info!("wake: trigger {:?} detected", self.phrase);
                if dropped > 0 {
                    log::debug!("wake: dropped {dropped} stale queued frame(s)");
                }
                self.acknowledge.acknowledge();
                self.emit(PipelineEvent::WakeDetected);
            }
            WakeDecision::Stale => {
                log::debug!(
                    "wake: ignoring stale detection (generation {} != {}, state {})",
                    outcome.generation,
                    self.machine.generation(),
                    self.machine.state().label()
                );
            }
            WakeDecision::Debounced => {
                log::debug!("wake: ignoring detection inside debounce window");
            }
        }
    }

    fn apply_command(&mut self, outcome: CommandOutcome) {
        self.machine.finish();
        if let CommandOutcome::TranscriptionFailed(reason) = &outcome {
            log::warn!("pipeline: command dropped: {reason}");
        }
        self.emit(PipelineEvent::Command(outcome));
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(events) = &self.events {
            if let Err(e) = events.try_send(event) {
                log::debug!("pipeline: event not delivered: {e}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

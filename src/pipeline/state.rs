//! Segmentation state machine: turns the frame stream into bounded
//! utterances.
//!
//! ```text
//! Idle ──wake accepted──▶ Armed ──now ≥ armed_until──▶ Listening
//!                           │                             │
//!                           │        pause, spoken ≥ min  ├──▶ Finalizing ──finish()──▶ Idle
//!                           │        pause, spoken < min  ├──▶ Idle (discard)
//!                           └──── length ≥ max ───────────┴──▶ Finalizing
//! ```
//!
//! The machine is owned by the pipeline worker alone.  Every transition bumps
//! a generation counter; a wake-detection result launched under an older
//! generation is rejected as stale.  All timing uses the capture timestamp of
//! the frame being processed.

use std::time::{Duration, Instant};

use crate::audio::{AudioFrame, VadDetector};
use crate::config::settings::{secs, secs_to_samples};
use crate::config::AppConfig;

// ---------------------------------------------------------------------------
// WakeState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WakeState {
    /// Only the rolling pre-buffer is fed; wake detection may run.
    #[default]
    Idle,
    /// Accumulating; end of speech is not evaluated until `armed_until`.
    Armed,
    /// Accumulating; every frame is checked for end of speech and the cap.
    Listening,
    /// The utterance is being transcribed and dispatched in the background.
    Finalizing,
}

impl WakeState {
    pub fn label(&self) -> &'static str {
        match self {
            WakeState::Idle => "Idle",
            WakeState::Armed => "Armed",
            WakeState::Listening => "Listening",
            WakeState::Finalizing => "Finalizing",
        }
    }

    /// `true` while frames are appended to the utterance.
    ///
    /// ```
    /// use voice_trigger::pipeline::WakeState;
    ///
    /// assert!(!WakeState::Idle.is_capturing());
    /// assert!(WakeState::Armed.is_capturing());
    /// assert!(WakeState::Listening.is_capturing());
    /// assert!(!WakeState::Finalizing.is_capturing());
    /// ```
    pub fn is_capturing(&self) -> bool {
        matches!(self, WakeState::Armed | WakeState::Listening)
    }
}

// ---------------------------------------------------------------------------
// SegmentationParams
// ---------------------------------------------------------------------------

/// Timing and size limits, with durations already converted to samples where
/// the comparison is on utterance length.
#[derive(Debug, Clone)]
pub struct SegmentationParams {
    pub sample_rate: u32,
    pub vad: VadDetector,
    pub wake_delay: Duration,
    pub debounce: Duration,
    pub pause: Duration,
    pub min_fill_samples: usize,
    pub seed_samples: usize,
    pub min_command_samples: usize,
    pub max_command_samples: usize,
}

impl SegmentationParams {
    pub fn from_config(config: &AppConfig) -> Self {
        let rate = config.audio.sample_rate;
        Self {
            sample_rate: rate,
            vad: VadDetector::new(config.audio.vad_threshold),
            wake_delay: secs(config.wake.delay_secs),
            debounce: secs(config.wake.debounce_secs),
            pause: secs(config.segmentation.pause_threshold_secs),
            min_fill_samples: secs_to_samples(config.wake.min_fill_secs, rate),
            seed_samples: secs_to_samples(config.wake.seed_secs, rate),
            min_command_samples: secs_to_samples(config.segmentation.min_command_secs, rate),
            max_command_samples: secs_to_samples(config.segmentation.max_command_secs, rate),
        }
    }
}

// ---------------------------------------------------------------------------
// Utterance
// ---------------------------------------------------------------------------

/// Audio collected since a wake event.
#[derive(Debug, Clone)]
pub struct Utterance {
    samples: Vec<f32>,
    /// Length up to and including the last frame counted as speech.
    spoken_len: usize,
    started_at: Instant,
    sample_rate: u32,
}

impl Utterance {
    pub(crate) fn new(seed: Vec<f32>, started_at: Instant, sample_rate: u32) -> Self {
        Self {
            spoken_len: seed.len(),
            samples: seed,
            started_at,
            sample_rate,
        }
    }

    fn push(&mut self, samples: &[f32], spoken: bool) {
        self.samples.extend_from_slice(samples);
        if spoken {
            self.spoken_len = self.samples.len();
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn spoken_len(&self) -> usize {
        self.spoken_len
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    pub fn spoken_secs(&self) -> f32 {
        self.spoken_len as f32 / self.sample_rate as f32
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeReason {
    /// Pause after enough speech.
    Silence,
    /// Maximum command length reached.
    Cap,
}

#[derive(Debug)]
pub enum FrameOutcome {
    /// Not capturing; only the pre-buffer saw this frame.
    Ignored,
    Accumulating,
    /// The utterance is complete; the machine is now `Finalizing`.
    Finalize(Utterance, FinalizeReason),
    /// Pause before the minimum length; the machine is back to `Idle`.
    Discarded { spoken_secs: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeDecision {
    Accepted,
    /// The machine left `Idle` or moved on since the attempt was launched.
    Stale,
    /// Within the debounce window of the previous accepted wake.
    Debounced,
}

// ---------------------------------------------------------------------------
// SegmentationStateMachine
// ---------------------------------------------------------------------------

pub struct SegmentationStateMachine {
    params: SegmentationParams,
    state: WakeState,
    generation: u64,
    utterance: Option<Utterance>,
    armed_until: Option<Instant>,
    last_speech: Option<Instant>,
    last_trigger: Option<Instant>,
}

impl SegmentationStateMachine {
    pub fn new(params: SegmentationParams) -> Self {
        Self {
            params,
            state: WakeState::Idle,
            generation: 0,
            utterance: None,
            armed_until: None,
            last_speech: None,
            last_trigger: None,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(SegmentationParams::from_config(config))
    }

    pub fn state(&self) -> WakeState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn params(&self) -> &SegmentationParams {
        &self.params
    }

    pub fn utterance(&self) -> Option<&Utterance> {
        self.utterance.as_ref()
    }

    fn enter(&mut self, next: WakeState) {
        log::debug!(
            "pipeline: {} -> {} (generation {})",
            self.state.label(),
            next.label(),
            self.generation + 1
        );
        self.state = next;
        self.generation += 1;
    }

    fn debounce_elapsed(&self, now: Instant) -> bool {
        self.last_trigger
            .map_or(true, |t| now.saturating_duration_since(t) >= self.params.debounce)
    }

    /// Whether a wake-detection attempt may start: `Idle`, enough audio in
    /// the pre-buffer and outside the debounce window.
    pub fn can_launch_detection(&self, now: Instant, prebuffer_fill: usize) -> bool {
        self.state == WakeState::Idle
            && prebuffer_fill >= self.params.min_fill_samples
            && self.debounce_elapsed(now)
    }

    /// Apply a positive detection launched under `generation`.  On acceptance
    /// the utterance starts with `seed` and the machine is `Armed` until
    /// `now + wake_delay`.
    pub fn try_wake(&mut self, generation: u64, now: Instant, seed: Vec<f32>) -> WakeDecision {
        if self.state != WakeState::Idle || generation != self.generation {
            return WakeDecision::Stale;
        }
        if !self.debounce_elapsed(now) {
            return WakeDecision::Debounced;
        }

        self.utterance = Some(Utterance::new(seed, now, self.params.sample_rate));
        self.armed_until = Some(now + self.params.wake_delay);
        self.last_speech = Some(now);
        self.last_trigger = Some(now);
        self.enter(WakeState::Armed);
        WakeDecision::Accepted
    }

    /// Feed one frame.  Frames outside `Armed`/`Listening` are ignored.
    pub fn on_frame(&mut self, frame: &AudioFrame) -> FrameOutcome {
        let now = frame.captured_at();
        let in_grace = match self.state {
            WakeState::Idle | WakeState::Finalizing => return FrameOutcome::Ignored,
            WakeState::Armed => self.armed_until.map_or(false, |until| now < until),
            WakeState::Listening => false,
        };
        if self.state == WakeState::Armed && !in_grace {
            self.enter(WakeState::Listening);
        }

        let speech = in_grace || self.params.vad.is_speech(frame.samples());
        let (len, spoken_len) = match self.utterance.as_mut() {
            Some(utterance) => {
                utterance.push(frame.samples(), speech);
                (utterance.len(), utterance.spoken_len())
            }
            None => {
                log::warn!("pipeline: capturing without an utterance; resetting");
                self.reset();
                return FrameOutcome::Ignored;
            }
        };

        if speech {
            self.last_speech = Some(now);
        } else {
            let silent_for = self
                .last_speech
                .map_or(Duration::ZERO, |t| now.saturating_duration_since(t));
            if silent_for > self.params.pause {
                if spoken_len >= self.params.min_command_samples {
                    return self.finalize(FinalizeReason::Silence);
                }
                let spoken_secs = spoken_len as f32 / self.params.sample_rate as f32;
                self.reset();
                return FrameOutcome::Discarded { spoken_secs };
            }
        }

        if len >= self.params.max_command_samples {
            return self.finalize(FinalizeReason::Cap);
        }
        FrameOutcome::Accumulating
    }

    fn finalize(&mut self, reason: FinalizeReason) -> FrameOutcome {
        let utterance = self.utterance.take();
        self.armed_until = None;
        self.enter(WakeState::Finalizing);
        match utterance {
            Some(utterance) => FrameOutcome::Finalize(utterance, reason),
            None => {
                self.reset();
                FrameOutcome::Ignored
            }
        }
    }

    /// The background finalize step completed; return to `Idle`.
    pub fn finish(&mut self) {
        if self.state == WakeState::Finalizing {
            self.enter(WakeState::Idle);
        }
    }

    /// Drop any utterance and return to `Idle`.  The debounce timestamp is
    /// kept.
    pub fn reset(&mut self) {
        self.utterance = None;
        self.armed_until = None;
        self.last_speech = None;
        if self.state != WakeState::Idle {
            self.enter(WakeState::Idle);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 16_000;
    /// 0.1 s frames.
    const FRAME: usize = 1_600;

    fn params() -> SegmentationParams {
        SegmentationParams {
            sample_rate: RATE,
            vad: VadDetector::new(0.01),
            wake_delay: Duration::from_millis(300),
            debounce: Duration::from_secs(2),
            pause: Duration::from_secs(1),
            min_fill_samples: 8_000,
            seed_samples: 0,
            min_command_samples: 16_000,
            max_command_samples: 48_000,
        }
    }

    fn at(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    fn speech(t: Instant) -> AudioFrame {
        AudioFrame::new(vec![0.1; FRAME], RATE, t)
    }

    fn silence(t: Instant) -> AudioFrame {
        AudioFrame::new(vec![0.0; FRAME], RATE, t)
    }

    fn woken(base: Instant) -> SegmentationStateMachine {
        let mut m = SegmentationStateMachine::new(params());
        assert_eq!(m.try_wake(0, base, Vec::new()), WakeDecision::Accepted);
        m
    }

    #[test]
    fn idle_ignores_frames_forever() {
        let base = Instant::now();
        let mut m = SegmentationStateMachine::new(params());
        for i in 0..200 {
            let frame = if i % 3 == 0 { speech(at(base, i * 100)) } else { silence(at(base, i * 100)) };
            assert!(matches!(m.on_frame(&frame), FrameOutcome::Ignored));
        }
        assert_eq!(m.state(), WakeState::Idle);
        assert_eq!(m.generation(), 0);
    }

    #[test]
    fn detection_requires_fill_and_idle() {
        let base = Instant::now();
        let m = SegmentationStateMachine::new(params());
        assert!(!m.can_launch_detection(base, 7_999));
        assert!(m.can_launch_detection(base, 8_000));

        let m = woken(base);
        assert!(!m.can_launch_detection(at(base, 5_000), 48_000));
    }

    #[test]
    fn wake_arms_then_listens_after_delay() {
        let base = Instant::now();
        let mut m = woken(base);
        assert_eq!(m.state(), WakeState::Armed);

        // Inside the grace window silence still counts as spoken.
        assert!(matches!(m.on_frame(&silence(at(base, 100))), FrameOutcome::Accumulating));
        assert_eq!(m.state(), WakeState::Armed);
        assert_eq!(m.utterance().unwrap().spoken_len(), FRAME);

        assert!(matches!(m.on_frame(&speech(at(base, 300))), FrameOutcome::Accumulating));
        assert_eq!(m.state(), WakeState::Listening);
    }

    #[test]
    fn stale_generation_is_rejected() {
        let base = Instant::now();
        let mut m = SegmentationStateMachine::new(params());
        let launched_under = m.generation();
        assert_eq!(m.try_wake(launched_under, base, Vec::new()), WakeDecision::Accepted);

        // A second attempt from the same launch generation arrives late.
        assert_eq!(m.try_wake(launched_under, at(base, 10), Vec::new()), WakeDecision::Stale);

        m.reset();
        assert_eq!(m.state(), WakeState::Idle);
        // Back in Idle, but the generation moved on.
        assert_eq!(
            m.try_wake(launched_under, at(base, 5_000), Vec::new()),
            WakeDecision::Stale
        );
    }

    #[test]
    fn second_wake_inside_debounce_is_refused() {
        let base = Instant::now();
        let mut m = woken(base);
        m.reset();

        let generation = m.generation();
        assert!(!m.can_launch_detection(at(base, 1_999), 8_000));
        assert_eq!(
            m.try_wake(generation, at(base, 1_999), Vec::new()),
            WakeDecision::Debounced
        );
        assert_eq!(m.state(), WakeState::Idle);

        assert!(m.can_launch_detection(at(base, 2_000), 8_000));
        assert_eq!(m.try_wake(generation, at(base, 2_000), Vec::new()), WakeDecision::Accepted);
    }

    #[test]
    fn short_utterance_is_discarded_on_pause() {
        let base = Instant::now();
        let mut p = params();
        p.wake_delay = Duration::ZERO;
        let mut m = SegmentationStateMachine::new(p);
        m.try_wake(0, base, Vec::new());

        // 0.6 s of speech, then silence.
        for i in 1..=6 {
            assert!(matches!(m.on_frame(&speech(at(base, i * 100))), FrameOutcome::Accumulating));
        }
        for i in 7..=16 {
            assert!(matches!(m.on_frame(&silence(at(base, i * 100))), FrameOutcome::Accumulating));
        }
        match m.on_frame(&silence(at(base, 1_700))) {
            FrameOutcome::Discarded { spoken_secs } => assert!((spoken_secs - 0.6).abs() < 1e-6),
            other => panic!("expected discard, got {other:?}"),
        }
        assert_eq!(m.state(), WakeState::Idle);
        assert!(m.utterance().is_none());
    }

    #[test]
    fn long_enough_utterance_finalizes_on_pause() {
        let base = Instant::now();
        let mut m = woken(base);

        let mut t = 0;
        for _ in 0..12 {
            t += 100;
            m.on_frame(&speech(at(base, t)));
        }
        let last_speech = t;
        loop {
            t += 100;
            match m.on_frame(&silence(at(base, t))) {
                FrameOutcome::Accumulating => continue,
                FrameOutcome::Finalize(u, reason) => {
                    assert_eq!(reason, FinalizeReason::Silence);
                    assert_eq!(u.spoken_len(), 12 * FRAME);
                    assert!(t - last_speech > 1_000);
                    break;
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(m.state(), WakeState::Finalizing);

        // Finalizing accumulates nothing and blocks detection.
        assert!(matches!(m.on_frame(&speech(at(base, t + 100))), FrameOutcome::Ignored));
        assert!(!m.can_launch_detection(at(base, t + 5_000), 48_000));

        m.finish();
        assert_eq!(m.state(), WakeState::Idle);
    }

    #[test]
    fn cap_finalizes_continuous_speech() {
        let base = Instant::now();
        let mut m = woken(base);
        let mut outcome = FrameOutcome::Accumulating;
        let mut frames = 0;
        while matches!(outcome, FrameOutcome::Accumulating) {
            frames += 1;
            outcome = m.on_frame(&speech(at(base, frames * 100)));
        }
        match outcome {
            FrameOutcome::Finalize(u, FinalizeReason::Cap) => assert_eq!(u.len(), 48_000),
            other => panic!("expected cap finalize, got {other:?}"),
        }
        assert_eq!(frames, 30);
    }

    #[test]
    fn cap_applies_while_armed() {
        let base = Instant::now();
        let mut p = params();
        p.wake_delay = Duration::from_secs(60);
        let mut m = SegmentationStateMachine::new(p);
        m.try_wake(0, base, vec![0.0; 46_400]);
        assert!(matches!(m.on_frame(&silence(at(base, 100))), FrameOutcome::Finalize(_, FinalizeReason::Cap)));
    }

    #[test]
    fn every_transition_bumps_generation() {
        let base = Instant::now();
        let mut m = SegmentationStateMachine::new(params());
        assert_eq!(m.generation(), 0);
        m.try_wake(0, base, Vec::new()); // Idle -> Armed
        assert_eq!(m.generation(), 1);
        m.on_frame(&speech(at(base, 400))); // Armed -> Listening
        assert_eq!(m.generation(), 2);
        m.reset(); // Listening -> Idle
        assert_eq!(m.generation(), 3);
        m.reset(); // already Idle
        assert_eq!(m.generation(), 3);
    }

    #[test]
    fn seed_counts_as_spoken() {
        let base = Instant::now();
        let mut m = SegmentationStateMachine::new(params());
        m.try_wake(0, base, vec![0.2; 16_000]);
        let u = m.utterance().unwrap();
        assert_eq!(u.len(), 16_000);
        assert_eq!(u.spoken_len(), 16_000);
        assert!((u.duration_secs() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn labels() {
        assert_eq!(WakeState::default(), WakeState::Idle);
        assert_eq!(WakeState::Finalizing.label(), "Finalizing");
    }

    #[test]
    fn params_from_default_config() {
        let p = SegmentationParams::from_config(&AppConfig::default());
        assert_eq!(p.min_fill_samples, 8_000);
        assert_eq!(p.seed_samples, 16_000);
        assert_eq!(p.max_command_samples, 240_000);
        assert_eq!(p.pause, Duration::from_secs(1));
    }
}

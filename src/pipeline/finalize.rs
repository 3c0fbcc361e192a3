//! Background processing of a finished utterance:
//! transcribe → normalize → match → dispatch.

use std::sync::Arc;

use crate::commands::{ActionDispatcher, CommandMatcher, DispatchError, DispatchReport, MatchResult};
use crate::stt::{normalize_transcript, Transcriber};

use super::state::Utterance;

/// What became of one finalized utterance.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// Nothing but the trigger phrase (or nothing at all) was said.
    Empty,
    NoMatch {
        transcript: String,
    },
    Dispatched {
        transcript: String,
        matched: MatchResult,
        report: DispatchReport,
    },
    DispatchFailed {
        transcript: String,
        matched: MatchResult,
        error: DispatchError,
    },
    TranscriptionFailed(String),
}

pub struct CommandProcessor {
    transcriber: Arc<dyn Transcriber>,
    matcher: CommandMatcher,
    dispatcher: ActionDispatcher,
    phrase: String,
}

impl CommandProcessor {
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        matcher: CommandMatcher,
        dispatcher: ActionDispatcher,
        phrase: impl Into<String>,
    ) -> Self {
        Self {
            transcriber,
            matcher,
            dispatcher,
            phrase: phrase.into(),
        }
    }

    pub async fn process(&self, utterance: Utterance) -> CommandOutcome {
        let rate = utterance.sample_rate();
        let samples = utterance.into_samples();
        let transcriber = Arc::clone(&self.transcriber);

        let joined = tokio::task::spawn_blocking(move || transcriber.transcribe(&samples, rate)).await;
        let segments = match joined {
            Ok(Ok(segments)) => segments,
            Ok(Err(e)) => {
                log::warn!("pipeline: command transcription failed: {e}");
                return CommandOutcome::TranscriptionFailed(e.to_string());
            }
            Err(e) => {
                log::warn!("pipeline: command transcription task failed: {e}");
                return CommandOutcome::TranscriptionFailed(e.to_string());
            }
        };

        let transcript = normalize_transcript(&segments, &self.phrase);
        if transcript.is_empty() {
            log::info!("pipeline: empty command");
            return CommandOutcome::Empty;
        }
        log::info!("pipeline: command {transcript:?}");

        let Some(matched) = self.matcher.best_match(&transcript) else {
            log::info!(
                "pipeline: no command matches {transcript:?} (cutoff {:.0})",
                self.matcher.cutoff()
            );
            return CommandOutcome::NoMatch { transcript };
        };
        log::info!(
            "pipeline: matched {:?} via {:?} -> {:?} (score {:.1})",
            matched.key,
            matched.variant,
            matched.action,
            matched.score
        );

        match self.dispatcher.dispatch(&matched.action).await {
            Ok(report) => CommandOutcome::Dispatched {
                transcript,
                matched,
                report,
            },
            Err(error) => {
                log::warn!("pipeline: {error}");
                CommandOutcome::DispatchFailed {
                    transcript,
                    matched,
                    error,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::commands::dispatch::testing::{RecordingBus, RecordingRunner};
    use crate::commands::{ActionTable, CommandCatalog, Launch};
    use crate::stt::{ScriptedTranscriber, SttError};

    const CATALOG: &str = "\
key,variants,action
Light On,light on|turn on light|led ON,led ON
Broken,reboot the box,reboot
";

    fn processor(stt: ScriptedTranscriber) -> (CommandProcessor, Arc<RecordingBus>) {
        let catalog = Arc::new(CommandCatalog::from_reader(CATALOG.as_bytes()).unwrap());
        let bus = Arc::new(RecordingBus::default());
        let dispatcher = ActionDispatcher::new(
            Arc::clone(&bus) as Arc<dyn crate::commands::ControlBus>,
            Arc::new(RecordingRunner::default()),
            ActionTable::default(),
            "gpio",
        );
        let p = CommandProcessor::new(
            Arc::new(stt),
            CommandMatcher::new(catalog, 70.0),
            dispatcher,
            "garmin",
        );
        (p, bus)
    }

    fn utterance() -> Utterance {
        Utterance::new(vec![0.1; 16_000], Instant::now(), 16_000)
    }

    #[tokio::test]
    async fn matched_command_is_dispatched() {
        let (p, bus) =
            processor(ScriptedTranscriber::new().then_ok(&[" Garmin,", " turn on the light."]));
        match p.process(utterance()).await {
            CommandOutcome::Dispatched { transcript, matched, report } => {
                assert_eq!(transcript, ", turn on the light.");
                assert_eq!(matched.action, "led ON");
                assert!(report.published);
                assert_eq!(report.launch, Launch::NotAllowed);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(bus.messages(), vec![("gpio/led".to_string(), "ON".to_string())]);
    }

    #[tokio::test]
    async fn trigger_only_is_empty() {
        let (p, bus) = processor(ScriptedTranscriber::new().then_ok(&["  GARMIN ", ""]));
        assert_eq!(p.process(utterance()).await, CommandOutcome::Empty);
        assert!(bus.messages().is_empty());

        let (p, _) = processor(ScriptedTranscriber::new());
        assert_eq!(p.process(utterance()).await, CommandOutcome::Empty);
    }

    #[tokio::test]
    async fn unmatched_text_is_reported() {
        let (p, bus) = processor(ScriptedTranscriber::new().then_ok(&["play some music"]));
        assert_eq!(
            p.process(utterance()).await,
            CommandOutcome::NoMatch { transcript: "play some music".into() }
        );
        assert!(bus.messages().is_empty());
    }

    #[tokio::test]
    async fn transcription_error_is_recoverable() {
        let (p, _) = processor(
            ScriptedTranscriber::new().then_err(SttError::Transcription("decoder".into())),
        );
        assert!(matches!(
            p.process(utterance()).await,
            CommandOutcome::TranscriptionFailed(_)
        ));
    }

    #[tokio::test]
    async fn malformed_action_fails_dispatch() {
        let (p, bus) = processor(ScriptedTranscriber::new().then_ok(&["reboot the box"]));
        match p.process(utterance()).await {
            CommandOutcome::DispatchFailed { matched, error, .. } => {
                assert_eq!(matched.action, "reboot");
                assert_eq!(error, DispatchError::Malformed("reboot".into()));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(bus.messages().is_empty());
    }
}

//! Action parsing and dispatch.
//!
//! A matched action is `"<device> <state>"`.  Dispatch performs two
//! independent side effects:
//!
//! 1. publish `state` on `<prefix>/<device>` through the [`ControlBus`];
//! 2. launch the local program registered for the (device, state) pair in the
//!    [`ActionTable`], if any.  Programs are spawned directly, never through
//!    a shell, and are not awaited.
//!
//! Neither failure is propagated; both are recorded in the [`DispatchReport`].

use std::collections::HashMap;
use std::fmt;
use std::process::Stdio;
use std::sync::Arc;

use thiserror::Error;

use super::bus::ControlBus;
use crate::config::ActionRule;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("malformed action {0:?}: expected \"<device> <state>\"")]
    Malformed(String),
}

// ---------------------------------------------------------------------------
// ParsedAction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAction {
    pub device: String,
    pub state: String,
}

impl fmt::Display for ParsedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.device, self.state)
    }
}

/// Split `action` on its first whitespace run.  Exactly two tokens are
/// required.
///
/// ```
/// use voice_trigger::commands::parse_action;
///
/// let parsed = parse_action("motor FORWARD").unwrap();
/// assert_eq!((parsed.device.as_str(), parsed.state.as_str()), ("motor", "FORWARD"));
/// assert!(parse_action("motor").is_err());
/// assert!(parse_action("motor go fast").is_err());
/// ```
pub fn parse_action(action: &str) -> Result<ParsedAction, DispatchError> {
    let malformed = || DispatchError::Malformed(action.to_string());
    let (device, state) = action.trim().split_once(char::is_whitespace).ok_or_else(malformed)?;
    let state = state.trim_start();
    if device.is_empty() || state.is_empty() || state.contains(char::is_whitespace) {
        return Err(malformed());
    }
    Ok(ParsedAction {
        device: device.to_string(),
        state: state.to_string(),
    })
}

// ---------------------------------------------------------------------------
// ActionTable
// ---------------------------------------------------------------------------

/// A program launch registered for one (device, state) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionCommand {
    pub program: String,
    pub args: Vec<String>,
}

/// Allow-list of local programs keyed by (device, state), compared ASCII
/// case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct ActionTable {
    commands: HashMap<(String, String), ActionCommand>,
}

impl ActionTable {
    pub fn from_rules(rules: &[ActionRule]) -> Self {
        let mut commands = HashMap::new();
        for rule in rules {
            let key = (rule.device.to_ascii_lowercase(), rule.state.to_ascii_lowercase());
            commands.insert(
                key,
                ActionCommand {
                    program: rule.program.clone(),
                    args: rule.args.clone(),
                },
            );
        }
        Self { commands }
    }

    pub fn lookup(&self, action: &ParsedAction) -> Option<&ActionCommand> {
        self.commands.get(&(
            action.device.to_ascii_lowercase(),
            action.state.to_ascii_lowercase(),
        ))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ActionRunner
// ---------------------------------------------------------------------------

/// Starts a registered program without waiting for it.
pub trait ActionRunner: Send + Sync {
    fn launch(&self, command: &ActionCommand) -> std::io::Result<()>;
}

/// Spawns the program with `tokio::process` and reaps it on a background
/// task.  Must be called from within a tokio runtime.
#[derive(Debug, Default)]
pub struct ProcessRunner;

impl ActionRunner for ProcessRunner {
    fn launch(&self, command: &ActionCommand) -> std::io::Result<()> {
        let mut child = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .spawn()?;

        let program = command.program.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => log::debug!("dispatch: {program} exited"),
                Ok(status) => log::warn!("dispatch: {program} exited with {status}"),
                Err(e) => log::warn!("dispatch: waiting for {program} failed: {e}"),
            }
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ActionDispatcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Launch {
    Started,
    /// No program registered for this (device, state) pair.
    NotAllowed,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    pub action: ParsedAction,
    pub topic: String,
    pub published: bool,
    pub launch: Launch,
}

pub struct ActionDispatcher {
    bus: Arc<dyn ControlBus>,
    runner: Arc<dyn ActionRunner>,
    table: ActionTable,
    topic_prefix: String,
}

impl ActionDispatcher {
    pub fn new(
        bus: Arc<dyn ControlBus>,
        runner: Arc<dyn ActionRunner>,
        table: ActionTable,
        topic_prefix: impl Into<String>,
    ) -> Self {
        Self {
            bus,
            runner,
            table,
            topic_prefix: topic_prefix.into(),
        }
    }

    pub fn topic_for(&self, device: &str) -> String {
        format!("{}/{device}", self.topic_prefix)
    }

    pub async fn dispatch(&self, action: &str) -> Result<DispatchReport, DispatchError> {
        let parsed = parse_action(action)?;
        let topic = self.topic_for(&parsed.device);

        let published = match self.bus.publish(&topic, &parsed.state).await {
            Ok(()) => {
                log::info!("dispatch: published {topic} <- {}", parsed.state);
                true
            }
            Err(e) => {
                log::warn!("dispatch: {e}");
                false
            }
        };

        let launch = match self.table.lookup(&parsed) {
            None => {
                log::debug!("dispatch: no local program registered for {parsed}");
                Launch::NotAllowed
            }
            Some(command) => match self.runner.launch(command) {
                Ok(()) => {
                    log::info!("dispatch: started {} for {parsed}", command.program);
                    Launch::Started
                }
                Err(e) => {
                    log::warn!("dispatch: failed to start {}: {e}", command.program);
                    Launch::Failed(e.to_string())
                }
            },
        };

        Ok(DispatchReport {
            action: parsed,
            topic,
            published,
            launch,
        })
    }
}

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

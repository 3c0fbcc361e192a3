//! Command resolution: catalog → fuzzy match → dispatch.
//!
//! ```text
//! transcript ──▶ CommandMatcher::best_match ──▶ MatchResult { action = "led ON" }
//!                         │                               │
//!                  CommandCatalog                ActionDispatcher::dispatch
//!                 (commands.csv)                   ├─ ControlBus: gpio/led <- ON
//!                                                  └─ ActionTable → ProcessRunner
//! ```

pub mod bus;
pub mod catalog;
pub mod dispatch;
pub mod matcher;

pub use bus::{BusError, ControlBus, LoggingBus, MqttBus};
pub use catalog::{CatalogError, CommandCatalog, CommandEntry, VariantTarget};
pub use dispatch::{
    parse_action, ActionCommand, ActionDispatcher, ActionRunner, ActionTable, DispatchError,
    DispatchReport, Launch, ParsedAction, ProcessRunner,
};
pub use matcher::{
    best_match_in, ratio, similarity, token_set_ratio, token_sort_ratio, CommandMatcher,
    MatchResult,
};

#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use,
    clippy::single_match_else,
    clippy::uninlined_format_args
)]

pub mod catalog;
pub mod config;
pub mod observability;
pub mod providers;
pub mod selection;
pub mod stores;
pub mod util;

pub use catalog::{EphemeralToolFlags, Role, ToolId};
pub use config::Config;
pub use selection::{SelectionOutcome, SelectionPipeline, TurnRequest, UnfilteredReason};

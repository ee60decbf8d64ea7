#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::return_self_not_must_use
)]

//! `nudge` decides, per behavioral event, whether an online store should
//! reach out to the shopper, drafts the message with a language model and
//! quality-checks it with another model pass before anything is queued
//! for delivery. Every processed event ends in exactly one [`Outcome`].

pub mod cli;
pub mod completion;
pub mod config;
pub mod error;
pub mod event;
pub mod growth;
pub mod outcome;
pub mod pipeline;
pub mod prompt;
pub mod store;

pub use config::Config;
pub use error::{NudgeError, Result};
pub use outcome::{Outcome, OutcomeStatus};
pub use pipeline::Pipeline;

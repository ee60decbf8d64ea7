//! The per-event decision, drafting and review loop.

mod decision;
mod generation;
mod orchestrator;
mod parse;
mod quality;
mod throttle;

pub use orchestrator::Pipeline;

pub(crate) use parse::{encode_json, extract_json, reply_snippet};

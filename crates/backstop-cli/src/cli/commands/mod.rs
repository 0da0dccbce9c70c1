//! CLI command handlers, one file per command.

mod classify;
mod config;
mod fetch;

pub use classify::{run_classify, ClassifyArgs};
#[cfg(test)]
pub(crate) use classify::{parse_label, parse_payload};
pub use config::run_config;
pub use fetch::{run_fetch, FetchArgs};

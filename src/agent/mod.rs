//! Chat runner with tool execution

mod runner;

pub use runner::{ChatRunner, RunSummary, DEFAULT_MAX_STEPS};

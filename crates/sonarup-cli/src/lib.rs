mod args;
mod commands;
mod handlers;
pub mod logging;
pub mod presentation;

pub use args::{Cli, LogLevel, UsageError};
pub use commands::{exit_code, run};

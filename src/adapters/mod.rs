//! Front-end adapters.
//!
//! The library itself ships no binaries; this module provides the
//! deterministic surfaces thin CLI/GUI wrappers call into.

mod cli;

pub use cli::{exit_code, help_text, parse_command, CliCommand, CliOutcome, CliSession};

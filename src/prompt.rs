//! Operator input seam.
//!
//! Manual CAPTCHA solving and required-field fallbacks need a line of text
//! from the operator. The trait keeps stdin out of the agents so tests can
//! script answers.

use crate::error::{Error, Result};
use std::io::{BufRead, Write};

/// Source of one-line operator answers.
pub trait OperatorPrompt: Send + Sync {
    /// Show `message` and return the operator's trimmed answer
    /// (empty string means "skip").
    fn prompt_line(&self, message: &str) -> Result<String>;
}

/// Stdin-backed prompt for interactive runs.
#[derive(Debug, Default)]
pub struct StdinPrompt;

impl OperatorPrompt for StdinPrompt {
    fn prompt_line(&self, message: &str) -> Result<String> {
        let mut stdout = std::io::stdout();
        write!(stdout, "{} ", message)
            .and_then(|_| stdout.flush())
            .map_err(|e| Error::Internal(format!("prompt write failed: {}", e)))?;

        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| Error::Internal(format!("prompt read failed: {}", e)))?;
        Ok(line.trim().to_string())
    }
}

/// Prompt that always answers with nothing, declining every request.
#[derive(Debug, Default)]
pub struct NullPrompt;

impl OperatorPrompt for NullPrompt {
    fn prompt_line(&self, _message: &str) -> Result<String> {
        Ok(String::new())
    }
}

//! Operator confirmation before destructive operations
//!
//! The gate logs the message, waits out a cancellable think-time, then reads a
//! single line and compares it to the expected token. Anything else, or end of
//! input, is a user abort. `UNSAFE_NO_CONFIRM=true` or `--yes` skips all of it.

use std::io::{self, BufRead, Write};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::utils::{CancelSignal, Result, ToolError};

/// Environment marker that bypasses confirmation for unattended runs
pub const NO_CONFIRM_ENV: &str = "UNSAFE_NO_CONFIRM";

/// Default token for low-stakes confirmations
pub const DEFAULT_TOKEN: &str = "y";

/// True when the environment marker is set to exactly `true`
pub fn no_confirm_from_env() -> bool {
    std::env::var(NO_CONFIRM_ENV).map_or(false, |v| v == "true")
}

/// Prompt shown for a token. Only the exact token confirms.
pub fn prompt_for(token: &str) -> String {
    format!("Type {} to confirm: ", token)
}

pub struct ConfirmGate {
    input: Box<dyn BufRead>,
    prompt: Box<dyn Write>,
    bypass: bool,
}

impl ConfirmGate {
    pub fn new(input: Box<dyn BufRead>, prompt: Box<dyn Write>, bypass: bool) -> Self {
        Self {
            input,
            prompt,
            bypass,
        }
    }

    /// Read the answer from stdin, prompt on stderr
    pub fn stdio(bypass: bool) -> Self {
        Self::new(Box::new(io::stdin().lock()), Box::new(io::stderr()), bypass)
    }

    /// Block until the operator types `token`.
    ///
    /// An empty token means [`DEFAULT_TOKEN`]. Returns `Aborted` on a mismatch
    /// or end of input and `Cancelled` if `cancel` fires during the think-time.
    pub fn confirm(
        &mut self,
        message: &str,
        token: &str,
        think_time: Duration,
        cancel: &CancelSignal,
    ) -> Result<()> {
        if self.bypass {
            debug!("Confirmation bypassed");
            return Ok(());
        }

        for line in message.lines() {
            warn!("{}", line);
        }

        if !think_time.is_zero() {
            info!(
                "Waiting {} before asking for confirmation",
                humantime::format_duration(think_time)
            );
            cancel.sleep(think_time)?;
        }

        let token = if token.is_empty() { DEFAULT_TOKEN } else { token };
        self.prompt.write_all(prompt_for(token).as_bytes())?;
        self.prompt.flush()?;

        let mut answer = String::new();
        if self.input.read_line(&mut answer)? == 0 {
            debug!("End of input while waiting for confirmation");
            return Err(ToolError::Aborted);
        }

        if answer.trim_end_matches(['\r', '\n']) == token {
            Ok(())
        } else {
            Err(ToolError::Aborted)
        }
    }
}

//! Console HUD: prints the rendered text on every publish.

use std::io::Write;

use safensound_common::StateReceiver;

use crate::next_state;
use crate::render::render_text;

/// Print each new state to `out` until the publisher goes away.
pub async fn run_console_to<W: Write>(mut receiver: StateReceiver, mut out: W) {
    while let Some(state) = next_state(&mut receiver).await {
        if let Err(e) = writeln!(out, "{}", render_text(&state)).and_then(|_| out.flush()) {
            tracing::warn!("Failed to write HUD to console: {}", e);
        }
    }
    tracing::debug!("Console sink stopped");
}

pub async fn run_console(receiver: StateReceiver) {
    run_console_to(receiver, std::io::stdout()).await
}

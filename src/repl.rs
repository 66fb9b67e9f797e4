//! Interactive prompt loop
//!
//! Reads one line at a time, hands it to the engine and keeps going until
//! the user quits, input runs out, or the model disappears.

use crate::agent::ConversationEngine;
use crate::console::Console;
use crate::resolver::model_help;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{error, info, warn};

pub const PROMPT: &str = " > ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Quit,
    EndOfInput,
    /// The resolved model stopped being servable mid-session
    ModelUnavailable,
}

fn is_quit(line: &str) -> bool {
    line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit")
}

/// Run the session until it ends.
///
/// Ctrl-C while a turn is running abandons that turn; Ctrl-C at the prompt
/// ends the session like end of input.
pub async fn run_session<R>(
    engine: &mut ConversationEngine,
    input: R,
    console: &dyn Console,
) -> SessionEnd
where
    R: AsyncBufRead + Unpin,
{
    let session_id = engine.session_id();
    let mut lines = input.lines();

    loop {
        console.prompt(PROMPT);

        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => {
                console.print("");
                return SessionEnd::EndOfInput;
            }
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => return SessionEnd::EndOfInput,
            Err(e) => {
                warn!(%session_id, error = %e, "Failed to read input");
                return SessionEnd::EndOfInput;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if is_quit(line) {
            info!(%session_id, "Session ended by user");
            return SessionEnd::Quit;
        }

        let result = tokio::select! {
            result = engine.handle_turn(line, console) => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        };

        match result {
            None => {
                warn!(%session_id, "Turn interrupted");
                console.print("\n[Interrupted by user]");
            }
            Some(Ok(outcome)) => {
                info!(%session_id, ?outcome, "Turn complete");
            }
            Some(Err(e)) if e.is_model_missing() => {
                error!(%session_id, model = %engine.model(), error = %e, "Model no longer available");
                console.print(&model_help(engine.model().as_str()));
                return SessionEnd::ModelUnavailable;
            }
            Some(Err(e)) => {
                error!(%session_id, error = %e, "Turn failed");
                console.print(&format!("[ERROR] {}", e));
            }
        }
    }
}

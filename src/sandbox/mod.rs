//! Sandboxed code execution
//!
//! Snippets run inside one long-lived interpreter process per [`Sandbox`],
//! so variables, loaded datasets and open figures survive between calls.
//! The process is started on first use and seeds `pd` and `plt` when those
//! libraries are importable.
//!
//! Requests and replies travel as JSON lines over a private pipe; snippet
//! output is captured in memory on the interpreter side and never shares the
//! channel. Each request carries an id so replies left over from an
//! abandoned call are skipped.

use crate::error::{render_error_trace, AgentError};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub mod sanitize;
pub use sanitize::{prepare_snippet, sanitize_literals, PreparedSnippet, SanitizeError, SanitizeTier};

/// Interpreter-side loop. Reads one request per line from a private duplicate
/// of stdin, executes it in a shared namespace with stdout redirected to a
/// buffer, and answers on a duplicate of the original stdout. fd 0 is pointed
/// at the null device and fd 1 at stderr, so snippets can neither read the
/// request pipe nor write into the reply channel. A terminal interrupt stops
/// the running snippet but leaves the namespace alive.
const DRIVER: &str = r#"
import contextlib, io, json, os, sys, traceback

_requests = os.fdopen(os.dup(0), "r", encoding="utf-8")
_null = os.open(os.devnull, os.O_RDONLY)
os.dup2(_null, 0)
os.close(_null)
sys.stdin = open(os.devnull, "r")

_channel = os.fdopen(os.dup(1), "w", encoding="utf-8")
os.dup2(2, 1)

_env = {"__name__": "__sandbox__"}
try:
    import pandas as pd
    _env["pd"] = pd
except Exception:
    pass
try:
    import matplotlib.pyplot as plt
    _env["plt"] = plt
except Exception:
    pass

while True:
    try:
        line = _requests.readline()
    except KeyboardInterrupt:
        continue
    if not line:
        break
    line = line.strip()
    if not line:
        continue
    try:
        request = json.loads(line)
    except Exception:
        continue
    buffer = io.StringIO()
    failed = False
    try:
        with contextlib.redirect_stdout(buffer):
            exec(compile(request["code"], "<sandbox>", "exec"), _env, _env)
    except (Exception, SystemExit, KeyboardInterrupt) as exc:
        failed = True
        print(f"Error: {exc}", file=buffer)
        print(traceback.format_exc(), file=buffer)
    output = buffer.getvalue().encode("utf-8", "backslashreplace").decode("utf-8")
    _channel.write(json.dumps({"id": request.get("id"), "output": output, "failed": failed}) + "\n")
    _channel.flush()
"#;

#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Interpreter executable
    pub python: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ExecRequest<'a> {
    id: u64,
    code: &'a str,
}

#[derive(Debug, Deserialize)]
struct ExecReply {
    id: Option<u64>,
    #[serde(default)]
    output: String,
    #[serde(default)]
    failed: bool,
}

/// Captured result of one snippet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// Everything the snippet printed, followed by error text if it raised
    pub output: String,
    pub failed: bool,
    pub sanitize: SanitizeTier,
}

struct Interpreter {
    child: Child,
    stdin: ChildStdin,
    replies: Lines<BufReader<ChildStdout>>,
}

impl Interpreter {
    fn spawn(config: &SandboxConfig) -> Result<Self> {
        let mut child = Command::new(&config.python)
            .arg("-u")
            .arg("-c")
            .arg(DRIVER)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AgentError::SandboxError(format!(
                    "failed to start interpreter '{}': {}",
                    config.python, e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AgentError::SandboxError("interpreter stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::SandboxError("interpreter stdout unavailable".to_string()))?;

        info!(pid = ?child.id(), python = %config.python, "Sandbox interpreter started");

        Ok(Self {
            child,
            stdin,
            replies: BufReader::new(stdout).lines(),
        })
    }

    async fn run(&mut self, id: u64, code: &str) -> Result<ExecReply> {
        let mut line = serde_json::to_string(&ExecRequest { id, code })?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        loop {
            let raw = self.replies.next_line().await?.ok_or_else(|| {
                AgentError::SandboxError("interpreter exited before replying".to_string())
            })?;

            let reply: ExecReply = serde_json::from_str(&raw).map_err(|e| {
                AgentError::SandboxError(format!("unreadable reply from interpreter: {}", e))
            })?;
            if reply.id == Some(id) {
                return Ok(reply);
            }
            debug!(expected = id, got = ?reply.id, "Discarding stale sandbox reply");
        }
    }
}

/// Persistent execution environment shared by every code call of a session.
pub struct Sandbox {
    config: SandboxConfig,
    interpreter: Mutex<Option<Interpreter>>,
    next_id: AtomicU64,
}

impl Sandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            interpreter: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// True once the interpreter has been started.
    pub async fn is_started(&self) -> bool {
        self.interpreter.lock().await.is_some()
    }

    /// Run a snippet. Never fails: any error is rendered into the output.
    pub async fn execute(&self, code: &str) -> Execution {
        let prepared = prepare_snippet(code);
        if let SanitizeTier::Fallback(ref e) = prepared.tier {
            debug!(error = %e, "Sanitizer failed; running snippet unmodified");
        }

        match self.run(&prepared.source).await {
            Ok(reply) => Execution {
                output: reply.output,
                failed: reply.failed,
                sanitize: prepared.tier,
            },
            Err(e) => Execution {
                output: render_error_trace("executing snippet", &e),
                failed: true,
                sanitize: prepared.tier,
            },
        }
    }

    async fn run(&self, source: &str) -> Result<ExecReply> {
        let mut slot = self.interpreter.lock().await;

        if slot.is_none() {
            *slot = Some(Interpreter::spawn(&self.config)?);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let result = match slot.as_mut() {
            Some(interpreter) => interpreter.run(id, source).await,
            None => Err(AgentError::SandboxError("interpreter not running".to_string())),
        };

        if result.is_err() {
            // A broken pipe or dead child cannot be reused; the next call
            // starts over with an empty environment.
            if let Some(mut dead) = slot.take() {
                let _ = dead.child.start_kill();
            }
            warn!("Sandbox interpreter lost; state will be reset on next call");
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn python3_available() -> bool {
        std::process::Command::new("python3")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn sandbox() -> Sandbox {
        Sandbox::new(SandboxConfig::default())
    }

    #[tokio::test]
    async fn test_lazy_start() {
        let sandbox = sandbox();
        assert!(!sandbox.is_started().await);
    }

    #[tokio::test]
    async fn test_state_persists_between_calls() {
        if !python3_available() {
            return;
        }
        let sandbox = sandbox();

        let first = sandbox.execute("x = 1").await;
        assert!(!first.failed, "{}", first.output);
        assert!(sandbox.is_started().await);

        let second = sandbox.execute("print(x)").await;
        assert_eq!(second.output, "1\n");
    }

    #[tokio::test]
    async fn test_fresh_sandbox_starts_empty() {
        if !python3_available() {
            return;
        }
        let first = sandbox();
        first.execute("y = 41").await;

        let other = sandbox();
        let result = other.execute("print(y)").await;
        assert!(result.failed);
        assert!(result.output.contains("Error: name 'y' is not defined"));
        assert!(result.output.contains("Traceback"));
    }

    #[tokio::test]
    async fn test_errors_are_captured_after_output() {
        if !python3_available() {
            return;
        }
        let sandbox = sandbox();
        let result = sandbox.execute("print('before')\nraise ValueError('boom')").await;

        assert!(result.failed);
        assert!(result.output.starts_with("before\n"));
        assert!(result.output.contains("Error: boom"));
        assert!(result.output.contains("ValueError"));

        // The interpreter survives a failing snippet.
        let after = sandbox.execute("print(2 + 2)").await;
        assert_eq!(after.output, "4\n");
    }

    #[tokio::test]
    async fn test_windows_path_literal_runs() {
        if !python3_available() {
            return;
        }
        let sandbox = sandbox();
        let result = sandbox.execute(r#"p = "C:\Users\new\data.csv"; print(p.count(chr(92)))"#).await;

        assert_eq!(result.sanitize, SanitizeTier::Rewritten);
        assert!(!result.failed, "{}", result.output);
        assert_eq!(result.output, "3\n");
    }

    #[tokio::test]
    async fn test_raw_literal_runs_unchanged() {
        if !python3_available() {
            return;
        }
        let sandbox = sandbox();
        let result = sandbox.execute(r#"print(r"C:\Users\x")"#).await;

        assert_eq!(result.sanitize, SanitizeTier::Untouched);
        assert_eq!(result.output, "C:\\Users\\x\n");
    }

    #[tokio::test]
    async fn test_system_exit_does_not_kill_interpreter() {
        if !python3_available() {
            return;
        }
        let sandbox = sandbox();
        sandbox.execute("z = 'kept'").await;
        let exited = sandbox.execute("import sys; sys.exit(3)").await;
        assert!(exited.failed);

        let after = sandbox.execute("print(z)").await;
        assert_eq!(after.output, "kept\n");
    }

    #[tokio::test]
    async fn test_surrogate_output_is_escaped() {
        if !python3_available() {
            return;
        }
        let sandbox = sandbox();
        let result = timeout(Duration::from_secs(10), sandbox.execute("print(chr(0xdc80))"))
            .await
            .expect("execute returned");

        assert!(!result.failed, "{}", result.output);
        assert_eq!(result.output, "\\udc80\n");
    }

    #[tokio::test]
    async fn test_snippet_cannot_read_request_pipe() {
        if !python3_available() {
            return;
        }
        let sandbox = sandbox();
        sandbox.execute("w = 7").await;

        let result = timeout(Duration::from_secs(10), sandbox.execute("x = input()"))
            .await
            .expect("execute returned");
        assert!(result.failed);
        assert!(result.output.contains("EOFError"));

        let after = sandbox.execute("print(w)").await;
        assert_eq!(after.output, "7\n");
    }

    #[tokio::test]
    async fn test_abandoned_call_reply_is_discarded() {
        if !python3_available() {
            return;
        }
        let sandbox = sandbox();
        sandbox.execute("kept = 'new kept'").await;

        let abandoned = timeout(
            Duration::from_millis(300),
            sandbox.execute("import time; time.sleep(1); print('old')"),
        )
        .await;
        assert!(abandoned.is_err());

        // The late 'old' reply is skipped and the namespace survives.
        let next = sandbox.execute("print(kept)").await;
        assert!(!next.failed, "{}", next.output);
        assert_eq!(next.output, "new kept\n");
    }

    #[tokio::test]
    async fn test_missing_interpreter_renders_error() {
        let sandbox = Sandbox::new(SandboxConfig {
            python: "definitely-not-a-python-binary".to_string(),
        });
        let result = sandbox.execute("print(1)").await;

        assert!(result.failed);
        assert!(result.output.contains("failed to start interpreter"));
        assert!(!sandbox.is_started().await);
    }
}

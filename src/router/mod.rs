//! Tool router
//!
//! Runs a model's batch of tool calls strictly in order. Bad calls are
//! skipped, failing tools turn into error text, and every executed call
//! lands in the conversation log as a tool message before the batch ends.

use crate::console::Console;
use crate::error::{render_error_trace, AgentError};
use crate::memory::ConversationLog;
use crate::models::{Message, ToolCallRequest, ToolClass, ToolResult};
use crate::tools::ToolRegistry;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, warn};

/// Placeholder shown when a code call printed nothing
pub const EMPTY_OUTPUT: &str = "(no output)";

/// Why a call in the batch was not executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Malformed(String),
    UnknownTool(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedCall {
    /// Position of the call in the batch
    pub index: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Executed calls, in request order
    pub results: Vec<ToolResult>,
    pub skipped: Vec<SkippedCall>,
    /// True when some output was already printed to the user
    pub shown_to_user: bool,
}

impl BatchReport {
    pub fn of_class(&self, class: ToolClass) -> impl Iterator<Item = &ToolResult> {
        self.results.iter().filter(move |r| r.class == class)
    }
}

pub struct ToolRouter {
    registry: ToolRegistry,
}

impl ToolRouter {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute a batch of raw tool calls.
    ///
    /// Code-class output is printed as soon as its call finishes; search-class
    /// output is left for the caller to summarize.
    pub async fn execute_batch(
        &self,
        raw_calls: &[Value],
        log: &mut ConversationLog,
        console: &dyn Console,
    ) -> BatchReport {
        let mut report = BatchReport::default();

        for (index, raw) in raw_calls.iter().enumerate() {
            let call = match ToolCallRequest::from_raw(raw) {
                Ok(call) => call,
                Err(e) => {
                    warn!(index, error = %e, "Skipping malformed tool call");
                    console.print(&format!("[!] malformed tool call: {}", raw));
                    report.skipped.push(SkippedCall {
                        index,
                        reason: SkipReason::Malformed(e.to_string()),
                    });
                    continue;
                }
            };

            let Some(tool) = self.registry.get(&call.name) else {
                warn!(index, tool_name = %call.name, "Skipping unknown tool");
                console.print(&format!("[!] tool not found: {}", call.name));
                report.skipped.push(SkippedCall {
                    index,
                    reason: SkipReason::UnknownTool(call.name.clone()),
                });
                continue;
            };

            console.print(&format!(
                " [·] running tool: {} args={}",
                call.name,
                Value::Object(call.arguments.clone())
            ));

            let start = Instant::now();
            let (output, failed) = match tool.invoke(&call.arguments).await {
                Ok(output) => (output, false),
                Err(e) => {
                    warn!(tool_name = %call.name, error = %e, "Tool execution failed");
                    (tool_failure(&call.name, &e), true)
                }
            };
            debug!(
                tool_name = %call.name,
                elapsed_ms = start.elapsed().as_millis() as u64,
                failed,
                "Tool call finished"
            );

            log.push(Message::tool(call.name.clone(), output.clone()));

            if tool.class == ToolClass::Code {
                console.print("\n[ Execution output ]\n");
                console.print(display_output(&output));
                report.shown_to_user = true;
            }

            report.results.push(ToolResult {
                tool_name: call.name,
                class: tool.class,
                output,
                failed,
            });
        }

        report
    }
}

fn tool_failure(name: &str, err: &AgentError) -> String {
    render_error_trace(&format!("running {}", name), err)
}

fn display_output(output: &str) -> &str {
    if output.trim().is_empty() {
        EMPTY_OUTPUT
    } else {
        output
    }
}

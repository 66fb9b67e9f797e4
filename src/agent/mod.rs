//! Conversation engine - one user turn at a time
//!
//! IDLE → DISPATCH → (PLAIN ANSWER | TOOL BATCH → SUMMARIZE) → IDLE

use crate::console::Console;
use crate::llm::{ChatRequest, ModelBackend};
use crate::memory::ConversationLog;
use crate::models::{Message, ModelHandle, ToolClass};
use crate::router::{BatchReport, ToolRouter};
use crate::Result;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

pub const SYSTEM_PROMPT: &str = "You are an expert assistant with tools to look up current information and run Python code.\n\
Decide carefully WHEN to use a tool. If no tool is needed, answer directly.\n\
If the user gives a CSV path in the form 'path = <path>' then:\n\
\x20 1) Run EXACTLY: df = pd.read_csv(path); print(df.head())\n\
\x20 2) If you produce plots, ALWAYS add 'plt.show()' at the end of the code.\n";

/// Standing reminder prepended to every turn once data mode is on.
pub const DATA_MODE_MEMO: &str =
    "Reminder: the main DataFrame is called 'df'. Add 'plt.show()' at the end of every plot.";

/// Substring that switches data mode on
pub const DATA_PATH_MARKER: &str = "path =";

pub const NO_RESPONSE: &str = "(no response from model)";

/// How a turn ended
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Plain content was printed and logged
    Answered,
    /// A tool batch ran and something reached the user
    ToolBatch { report: BatchReport, summaries: usize },
    /// Nothing to show
    NoResponse,
}

pub struct ConversationEngine {
    backend: Arc<dyn ModelBackend>,
    model: ModelHandle,
    router: ToolRouter,
    catalog: Vec<Value>,
    log: ConversationLog,
    data_mode: bool,
    num_ctx: u32,
}

impl ConversationEngine {
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        model: ModelHandle,
        router: ToolRouter,
        num_ctx: u32,
    ) -> Self {
        let catalog = router.registry().catalog();
        Self {
            backend,
            model,
            router,
            catalog,
            log: ConversationLog::new(SYSTEM_PROMPT),
            data_mode: false,
            num_ctx,
        }
    }

    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    pub fn session_id(&self) -> Uuid {
        self.log.session_id
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn data_mode(&self) -> bool {
        self.data_mode
    }

    /// Process one user turn.
    ///
    /// Messages appended before an error (or an interrupt that drops this
    /// future) stay in the log.
    pub async fn handle_turn(&mut self, input: &str, console: &dyn Console) -> Result<TurnOutcome> {
        let start = Instant::now();

        // === IDLE ===
        if input.contains(DATA_PATH_MARKER) && !self.data_mode {
            info!(session_id = %self.log.session_id, "Data mode enabled");
            self.data_mode = true;
        }
        let content = if self.data_mode {
            format!("{}\n{}", DATA_MODE_MEMO, input)
        } else {
            input.to_string()
        };
        self.log.push(Message::user(content));

        // === DISPATCH ===
        let reply = self
            .backend
            .chat(ChatRequest {
                model: self.model.as_str(),
                messages: self.log.messages(),
                tools: &self.catalog,
                num_ctx: self.num_ctx,
            })
            .await?;

        debug!(
            session_id = %self.log.session_id,
            tool_calls = reply.tool_calls.len(),
            content_len = reply.content.len(),
            log_len = self.log.len(),
            "Model replied"
        );

        // === TOOL BATCH ===
        if !reply.tool_calls.is_empty() {
            let report = self
                .router
                .execute_batch(&reply.tool_calls, &mut self.log, console)
                .await;

            let summaries = self.summarize_search_results(input, &report).await?;
            let summary_count = summaries.len();
            if !summaries.is_empty() {
                let joined = summaries.join("\n\n");
                console.print("\n[ Results summary ]\n");
                console.print(&joined);
                self.log.push(Message::assistant(joined));
            }

            info!(
                session_id = %self.log.session_id,
                executed = report.results.len(),
                skipped = report.skipped.len(),
                summaries = summary_count,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Tool batch handled"
            );

            if report.shown_to_user || summary_count > 0 {
                return Ok(TurnOutcome::ToolBatch {
                    report,
                    summaries: summary_count,
                });
            }
            // Every call was skipped: fall back to whatever text came along.
        }

        // === PLAIN ANSWER ===
        if reply.content.is_empty() {
            console.print(NO_RESPONSE);
            return Ok(TurnOutcome::NoResponse);
        }

        console.print(&format!("\n{}\n", reply.content));
        self.log.push(Message::assistant(reply.content));
        Ok(TurnOutcome::Answered)
    }

    /// One secondary generation per search-class result, in batch order.
    async fn summarize_search_results(
        &self,
        question: &str,
        report: &BatchReport,
    ) -> Result<Vec<String>> {
        let mut summaries = Vec::new();
        for result in report.of_class(ToolClass::Search) {
            debug!(tool_name = %result.tool_name, "Summarizing search output");
            let prompt = summary_prompt(question, &result.output);
            summaries.push(self.backend.generate(self.model.as_str(), &prompt).await?);
        }
        Ok(summaries)
    }
}

fn summary_prompt(question: &str, tool_output: &str) -> String {
    format!(
        "User question: {}\n\n\
         Objectively summarize what is relevant in the following text to answer the question. \
         Be concise (at most 6-8 lines) and include 1-2 sources if the text has them.\n\n\
         === TEXT ===\n{}",
        question, tool_output
    )
}

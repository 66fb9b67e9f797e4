//! Code-class tool backed by the persistent sandbox

use super::{require_str, Tool};
use crate::models::{ParamSpec, ToolSpec};
use crate::sandbox::Sandbox;
use crate::Result;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// `code_exec`: run a snippet in the shared sandbox and return its output.
pub struct CodeExecTool {
    sandbox: Arc<Sandbox>,
}

impl CodeExecTool {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait::async_trait]
impl Tool for CodeExecTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "code_exec",
            description: "Run Python code and return its console output.",
            parameters: vec![ParamSpec {
                name: "code",
                description: "Python code to run",
            }],
        }
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<String> {
        let code = require_str(args, "code")?;
        let execution = self.sandbox.execute(code).await;

        debug!(
            failed = execution.failed,
            sanitize = ?execution.sanitize,
            bytes = execution.output.len(),
            "Snippet finished"
        );

        // Snippet errors are already part of the output.
        Ok(execution.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::SandboxConfig;
    use serde_json::json;

    #[tokio::test]
    async fn test_missing_interpreter_is_output_not_error() {
        let sandbox = Arc::new(Sandbox::new(SandboxConfig {
            python: "no-such-python-here".to_string(),
        }));
        let tool = CodeExecTool::new(sandbox);
        let args = json!({"code": "print(1)"}).as_object().cloned().unwrap();

        let out = tokio_test::assert_ok!(tool.execute(&args).await);
        assert!(out.contains("failed to start interpreter"));
    }

    #[tokio::test]
    async fn test_missing_code_argument() {
        let tool = CodeExecTool::new(Arc::new(Sandbox::new(SandboxConfig::default())));
        let args = Map::new();
        tokio_test::assert_err!(tool.execute(&args).await);
    }
}

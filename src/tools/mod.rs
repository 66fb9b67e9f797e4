//! Tool trait and registry
//!
//! The registry is closed: tools are registered once at startup together
//! with their display class and looked up by the name the model asks for.

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::models::{ToolClass, ToolSpec};
use crate::sandbox::{Sandbox, SandboxConfig};
use crate::Result;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub mod code;
pub mod search;

pub use code::CodeExecTool;
pub use search::{DuckDuckGoSearch, SearchHit, SearchProvider, SearchTool};

/// Trait for a single callable tool
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> ToolSpec;
    async fn execute(&self, args: &Map<String, Value>) -> Result<String>;
}

/// A tool tagged with its display class.
#[derive(Clone)]
pub struct RegisteredTool {
    pub class: ToolClass,
    pub spec: ToolSpec,
    tool: Arc<dyn Tool>,
}

impl RegisteredTool {
    /// Check the arguments against the declared parameters, then run the tool.
    pub async fn invoke(&self, args: &Map<String, Value>) -> Result<String> {
        check_arguments(&self.spec, args)?;
        self.tool.execute(args).await
    }
}

/// Tool registry for looking up and executing tools
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn register(&mut self, class: ToolClass, tool: Arc<dyn Tool>) {
        let spec = tool.spec();
        let name = spec.name.to_string();
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, RegisteredTool { class, spec, tool });
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    /// Tool names in registration order
    pub fn list(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    /// Catalog advertised to the model, in registration order.
    pub fn catalog(&self) -> Vec<Value> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| t.spec.to_catalog_entry())
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Every declared parameter must be present as a string, and nothing else
/// may be passed.
fn check_arguments(spec: &ToolSpec, args: &Map<String, Value>) -> Result<()> {
    for param in &spec.parameters {
        match args.get(param.name) {
            Some(Value::String(_)) => {}
            Some(other) => {
                return Err(AgentError::InvalidToolInput(format!(
                    "{}() argument '{}' must be a string, got {}",
                    spec.name, param.name, other
                )))
            }
            None => {
                return Err(AgentError::InvalidToolInput(format!(
                    "{}() missing required argument '{}'",
                    spec.name, param.name
                )))
            }
        }
    }

    if let Some(unexpected) = args
        .keys()
        .find(|k| !spec.parameters.iter().any(|p| p.name == k.as_str()))
    {
        return Err(AgentError::InvalidToolInput(format!(
            "{}() got an unexpected argument '{}'",
            spec.name, unexpected
        )));
    }

    Ok(())
}

/// Fetch a required string argument.
pub(crate) fn require_str<'a>(args: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    args.get(key).and_then(Value::as_str).ok_or_else(|| {
        AgentError::InvalidToolInput(format!("expected string argument '{}'", key))
    })
}

/// Create the default registry: web search, finance news search, code execution.
pub fn create_default_registry(config: &AgentConfig) -> Result<ToolRegistry> {
    let provider: Arc<dyn SearchProvider> = Arc::new(DuckDuckGoSearch::new()?);
    let sandbox = Arc::new(Sandbox::new(SandboxConfig {
        python: config.python.clone(),
    }));

    Ok(create_registry(provider, sandbox, config.search_max_results))
}

/// Build the registry from explicit collaborators.
pub fn create_registry(
    provider: Arc<dyn SearchProvider>,
    sandbox: Arc<Sandbox>,
    max_results: usize,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(
        ToolClass::Search,
        Arc::new(SearchTool::web(provider.clone(), max_results)),
    );
    registry.register(
        ToolClass::Search,
        Arc::new(SearchTool::finance(provider, max_results)),
    );
    registry.register(ToolClass::Code, Arc::new(CodeExecTool::new(sandbox)));

    registry
}

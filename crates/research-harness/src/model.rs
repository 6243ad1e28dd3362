use std::fmt;
use std::time::Duration;

use crate::errors::ResearchError;

/// Model used when the caller does not pick one.
pub const DEFAULT_MODEL: &str = "o4-mini-deep-research";
/// Tool-call budget used when the caller does not set one.
pub const DEFAULT_MAX_TOOL_CALLS: u32 = 100;

/// Kind of tool invocation performed by a remote research run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ToolKind {
    WebSearch,
    CodeExec,
    McpTool,
    FileSearch,
}

impl ToolKind {
    /// All kinds in display order.
    pub const ALL: [ToolKind; 4] = [
        ToolKind::WebSearch,
        ToolKind::CodeExec,
        ToolKind::McpTool,
        ToolKind::FileSearch,
    ];

    /// Counter label shown in the progress panel.
    pub fn label(self) -> &'static str {
        match self {
            ToolKind::WebSearch => "Web Searches",
            ToolKind::CodeExec => "Code Calls",
            ToolKind::McpTool => "MCP Calls",
            ToolKind::FileSearch => "File Searches",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Container settings for the code interpreter tool.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContainerSpec {
    Auto,
}

/// Tool enabled for a research run.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolSpec {
    /// Hosted web search.
    WebSearchPreview,
    /// Hosted code interpreter.
    CodeInterpreter { container: ContainerSpec },
}

impl ToolSpec {
    /// Code interpreter with an automatically provisioned container.
    pub fn code_interpreter() -> Self {
        Self::CodeInterpreter {
            container: ContainerSpec::Auto,
        }
    }
}

/// Request sent to the research service.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ResearchRequest {
    /// Model identifier (for example `o3-deep-research`).
    pub model: String,
    /// Research query text.
    pub input: String,
    /// Run the request in the background. Streaming runs always set this.
    pub background: bool,
    /// Tools the run may use.
    pub tools: Vec<ToolSpec>,
    /// Maximum number of tool invocations the run may make.
    pub max_tool_calls: u32,
}

impl ResearchRequest {
    /// Creates a background request with web search enabled and the default
    /// tool-call budget.
    pub fn new(model: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            input: input.into(),
            background: true,
            tools: vec![ToolSpec::WebSearchPreview],
            max_tool_calls: DEFAULT_MAX_TOOL_CALLS,
        }
    }

    pub fn background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }

    pub fn tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }

    pub fn max_tool_calls(mut self, max_tool_calls: u32) -> Self {
        self.max_tool_calls = max_tool_calls;
        self
    }

    /// Rejects requests the service would refuse anyway.
    pub fn validate(&self) -> Result<(), ResearchError> {
        if self.model.trim().is_empty() {
            return Err(ResearchError::Validation("model must not be empty".into()));
        }
        if self.input.trim().is_empty() {
            return Err(ResearchError::Validation("query must not be empty".into()));
        }
        if self.tools.is_empty() {
            return Err(ResearchError::Validation(
                "at least one tool must be enabled".into(),
            ));
        }
        Ok(())
    }
}

/// Driver behavior options for a streaming run.
#[derive(Clone, Debug)]
pub struct RunOptions {
    /// How often the progress panel is repainted while no events arrive.
    pub refresh_interval: Duration,
    /// Upper bound on the cancel request issued after an interrupt.
    pub cancel_timeout: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(1),
            cancel_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_options_default_refresh_is_one_second() {
        assert_eq!(RunOptions::default().refresh_interval, Duration::from_secs(1));
    }

    #[test]
    fn tools_serialize_with_type_tags() {
        let value = serde_json::to_value(vec![
            ToolSpec::WebSearchPreview,
            ToolSpec::code_interpreter(),
        ])
        .expect("serialize");
        assert_eq!(
            value,
            serde_json::json!([
                {"type": "web_search_preview"},
                {"type": "code_interpreter", "container": {"type": "auto"}}
            ])
        );
    }

    #[test]
    fn validate_rejects_missing_tools_and_blank_query() {
        let no_tools = ResearchRequest::new(DEFAULT_MODEL, "cats").tools(Vec::new());
        assert!(
            matches!(no_tools.validate(), Err(ResearchError::Validation(msg)) if msg.contains("tool"))
        );
        let blank = ResearchRequest::new(DEFAULT_MODEL, "   ");
        assert!(
            matches!(blank.validate(), Err(ResearchError::Validation(msg)) if msg.contains("query"))
        );
        assert!(ResearchRequest::new(DEFAULT_MODEL, "cats").validate().is_ok());
    }
}

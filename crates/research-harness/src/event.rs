//! Typed view of the events and responses produced by the research service.
//!
//! Every enum here carries a catch-all arm so that new event kinds, item
//! types and statuses deserialize instead of failing the stream.

use std::fmt;

use tracing::debug;

use crate::model::ToolKind;

/// Status of a remote research run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Queued,
    InProgress,
    Completed,
    Cancelled,
    Failed,
    Incomplete,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ResponseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::Incomplete => "incomplete",
            Self::Unknown => "unknown",
        }
    }

    /// The service is still working on the run.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Queued | Self::InProgress)
    }

    /// The run will not change status anymore.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Cancelled | Self::Failed | Self::Incomplete
        )
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response object returned by the service, either embedded in stream events
/// or fetched by id.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RemoteResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: ResponseStatus,
    #[serde(default)]
    pub output: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_text: Option<String>,
}

/// Tool usage counted from the `output` items of a final response.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ToolUsage {
    pub web_searches: usize,
    pub code_interpreter_calls: usize,
}

impl RemoteResponse {
    /// Concatenated text of all message items, falling back to `output_text`.
    pub fn text(&self) -> Option<String> {
        let mut parts = Vec::new();
        for item in &self.output {
            if item.get("type").and_then(|v| v.as_str()) != Some("message") {
                continue;
            }
            if let Some(content) = item.get("content").and_then(|v| v.as_array()) {
                for c in content {
                    if let Some(text) = c.get("text").and_then(|v| v.as_str()) {
                        parts.push(text.to_string());
                    }
                }
            }
        }
        if !parts.is_empty() {
            return Some(parts.join(""));
        }
        self.output_text.clone()
    }

    pub fn tool_usage(&self) -> ToolUsage {
        let count = |kind: &str| {
            self.output
                .iter()
                .filter(|item| item.get("type").and_then(|v| v.as_str()) == Some(kind))
                .count()
        };
        ToolUsage {
            web_searches: count("web_search_call"),
            code_interpreter_calls: count("code_interpreter_call"),
        }
    }
}

/// Action performed by a web search call.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WebSearchAction {
    Search {
        #[serde(default)]
        query: Option<String>,
    },
    OpenPage {
        #[serde(default)]
        url: Option<String>,
    },
    #[serde(alias = "find")]
    FindInPage {
        #[serde(default, alias = "pattern")]
        query: Option<String>,
    },
    #[serde(other)]
    Other,
}

/// Output item announced by `response.output_item.added`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    WebSearchCall {
        #[serde(default)]
        action: Option<WebSearchAction>,
    },
    CodeInterpreterCall,
    #[serde(alias = "mcp_call")]
    McpToolCall,
    FileSearchCall,
    #[serde(other)]
    Other,
}

impl OutputItem {
    /// Tool kind for items that count against the tool-call budget.
    pub fn tool_kind(&self) -> Option<ToolKind> {
        match self {
            Self::WebSearchCall { .. } => Some(ToolKind::WebSearch),
            Self::CodeInterpreterCall => Some(ToolKind::CodeExec),
            Self::McpToolCall => Some(ToolKind::McpTool),
            Self::FileSearchCall => Some(ToolKind::FileSearch),
            Self::Other => None,
        }
    }
}

/// Stream event kinds the reducer reacts to.
#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
#[serde(tag = "type")]
pub enum RemoteEvent {
    #[serde(rename = "response.created")]
    Created {
        #[serde(default)]
        response: Option<RemoteResponse>,
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded { item: OutputItem },
    #[serde(
        rename = "response.done",
        alias = "response.completed",
        alias = "response.failed",
        alias = "response.incomplete",
        alias = "response.cancelled"
    )]
    Done { response: RemoteResponse },
    #[serde(other)]
    Other,
}

/// One received event: the typed view plus the untouched payload.
#[derive(Clone, Debug, PartialEq)]
pub struct EventRecord {
    pub kind: String,
    pub event: RemoteEvent,
    pub raw: serde_json::Value,
}

impl EventRecord {
    /// Classifies a raw event payload. Payloads that do not fit their declared
    /// kind are kept in the log but classified as [`RemoteEvent::Other`].
    pub fn from_json(raw: serde_json::Value) -> Self {
        let kind = raw
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        let event = match serde_json::from_value::<RemoteEvent>(raw.clone()) {
            Ok(event) => event,
            Err(err) => {
                debug!(kind = %kind, error = %err, "unrecognized event payload");
                RemoteEvent::Other
            }
        };
        Self { kind, event, raw }
    }
}

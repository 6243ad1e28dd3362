//! Folds stream events into progress state and the run's terminal result.
//!
//! The reducer is synchronous and owns the [`ProgressTracker`]; the async
//! driver in [`crate::run`] feeds it events and reports interruptions.

use tracing::info;

use crate::event::{EventRecord, OutputItem, RemoteEvent, RemoteResponse, WebSearchAction};
use crate::model::ToolKind;
use crate::progress::{ActionTag, ProgressSnapshot, ProgressTracker};

/// Display width for queries and URLs in the action log, in characters.
const ACTION_TEXT_WIDTH: usize = 50;
const RUN_ID_PREFIX: &str = "resp_";

/// Lifecycle of a streamed run. Terminal states are absorbing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReducerState {
    Idle,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl ReducerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

pub struct StreamReducer {
    tracker: ProgressTracker,
    state: ReducerState,
    run_id: Option<String>,
    terminal: Option<RemoteResponse>,
    events: Vec<EventRecord>,
}

impl StreamReducer {
    pub fn new(tracker: ProgressTracker) -> Self {
        Self {
            tracker,
            state: ReducerState::Idle,
            run_id: None,
            terminal: None,
            events: Vec::new(),
        }
    }

    /// `Idle → Streaming`. No effect in any other state.
    pub fn begin(&mut self) {
        if self.state == ReducerState::Idle {
            self.state = ReducerState::Streaming;
        }
    }

    /// Processes one event and returns the resulting state. Events arriving
    /// outside `Streaming` are dropped.
    pub fn apply(&mut self, record: EventRecord) -> ReducerState {
        if self.state != ReducerState::Streaming {
            return self.state;
        }
        match &record.event {
            RemoteEvent::Created { response, id } => {
                if self.run_id.is_none() {
                    self.run_id = capture_run_id(response.as_ref(), id.as_deref());
                    if let Some(run_id) = &self.run_id {
                        info!(run_id = %run_id, "captured response id");
                    }
                }
                self.tracker.record_action(ActionTag::System, "Research started");
            }
            RemoteEvent::OutputItemAdded { item } => self.record_item(item),
            RemoteEvent::Done { response } => {
                if self.run_id.is_none() && !response.id.is_empty() {
                    self.run_id = Some(response.id.clone());
                }
                self.terminal = Some(response.clone());
                self.tracker
                    .record_action(ActionTag::System, "Research complete!");
                self.state = ReducerState::Completed;
                info!(status = %response.status, "received final response from stream");
            }
            RemoteEvent::Other => {}
        }
        self.events.push(record);
        self.state
    }

    fn record_item(&mut self, item: &OutputItem) {
        let Some(kind) = item.tool_kind() else {
            return;
        };
        self.tracker.record_tool_call(kind);
        let action = match (kind, item) {
            (ToolKind::WebSearch, OutputItem::WebSearchCall { action }) => match action {
                Some(WebSearchAction::Search { query }) => {
                    Some((ActionTag::Web, format!("Searching: {}", clip(query))))
                }
                Some(WebSearchAction::OpenPage { url }) => {
                    Some((ActionTag::Web, format!("Opening: {}", clip(url))))
                }
                Some(WebSearchAction::FindInPage { query }) => {
                    Some((ActionTag::Web, format!("Finding: {}", clip(query))))
                }
                Some(WebSearchAction::Other) | None => None,
            },
            (ToolKind::CodeExec, _) => Some((ActionTag::Code, "Executing code".to_string())),
            (ToolKind::McpTool, _) => Some((ActionTag::Mcp, "MCP tool call".to_string())),
            (ToolKind::FileSearch, _) => Some((ActionTag::File, "Searching files".to_string())),
            _ => None,
        };
        if let Some((tag, text)) = action {
            self.tracker.record_action(tag, text);
        }
    }

    /// The event source ran dry without a terminal event.
    pub fn stream_ended(&mut self) -> ReducerState {
        if self.state == ReducerState::Streaming {
            self.state = ReducerState::Failed;
        }
        self.state
    }

    /// An interrupt was handled; `ack` is the service's cancel response if any.
    pub fn mark_cancelled(&mut self, ack: Option<RemoteResponse>) -> ReducerState {
        if self.state == ReducerState::Streaming {
            self.terminal = ack;
            self.tracker.record_action(ActionTag::System, "Research cancelled");
            self.state = ReducerState::Cancelled;
        }
        self.state
    }

    pub fn mark_failed(&mut self) -> ReducerState {
        self.stream_ended()
    }

    pub fn state(&self) -> ReducerState {
        self.state
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    pub fn terminal(&self) -> Option<&RemoteResponse> {
        self.terminal.as_ref()
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.tracker.snapshot()
    }

    pub(crate) fn into_parts(self) -> ReducerParts {
        ReducerParts {
            progress: self.tracker.snapshot(),
            state: self.state,
            run_id: self.run_id,
            terminal: self.terminal,
            events: self.events,
        }
    }
}

pub(crate) struct ReducerParts {
    pub state: ReducerState,
    pub run_id: Option<String>,
    pub terminal: Option<RemoteResponse>,
    pub events: Vec<EventRecord>,
    pub progress: ProgressSnapshot,
}

fn capture_run_id(response: Option<&RemoteResponse>, event_id: Option<&str>) -> Option<String> {
    response
        .map(|r| r.id.as_str())
        .filter(|id| !id.is_empty())
        .or_else(|| event_id.filter(|id| id.starts_with(RUN_ID_PREFIX)))
        .map(ToOwned::to_owned)
}

fn clip(text: &Option<String>) -> String {
    text.as_deref()
        .unwrap_or_default()
        .chars()
        .take(ACTION_TEXT_WIDTH)
        .collect()
}

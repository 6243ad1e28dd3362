//! Common imports for typical usage.
pub use crate::{
    AbortHandle, DEFAULT_MODEL, RemoteResponse, ResearchBackend, ResearchError, ResearchOutcome,
    ResearchRequest, ResearchRunBuilder, ResearchStream, ResponseStatus, TerminalSink, ToolSpec,
};

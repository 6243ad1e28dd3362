//! Streaming client for long-running deep research runs.
//!
//! A run is started against a [`ResearchBackend`], its event stream is folded
//! into progress state by a [`StreamReducer`], and a text panel is repainted
//! on every event and on a fixed refresh tick. Interruptions cancel the remote
//! run; streams that end early fall back to retrieving the response by id.
//!
//! # Streaming a run (OpenAI)
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use research_harness::prelude::*;
//! use research_harness::vendors::openai::OpenAiBackend;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ResearchError> {
//! let backend = Arc::new(OpenAiBackend::from_env()?);
//! let request = ResearchRequest::new(DEFAULT_MODEL, "Economic impact of semaglutide");
//!
//! let outcome = ResearchRunBuilder::new(backend, request)
//!     .sink(TerminalSink::stdout())
//!     .run()
//!     .await?;
//!
//! let response = outcome.into_result()?;
//! println!("{}", response.text().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

/// Service contract used by the run driver and resolver.
pub mod backend;
/// Wall-clock sources, real and manual.
pub mod clock;
/// Public error types.
pub mod errors;
/// Remote response, status and stream event types.
pub mod event;
/// Request, tool and run option types.
pub mod model;
/// Common imports for typical usage.
pub mod prelude;
/// Tool-call counting, action log and ETA estimation.
pub mod progress;
/// Event reducer and run state machine.
pub mod reducer;
/// Progress panel rendering and display sinks.
pub mod render;
/// Response retrieval and polling.
pub mod resolver;
/// Run builder, driver task and cancellation handle.
pub mod run;
/// Vendor-specific backends.
pub mod vendors;

pub use backend::{EventStream, ResearchBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{ProviderError, ResearchError};
pub use event::{EventRecord, RemoteEvent, RemoteResponse, ResponseStatus, ToolUsage};
pub use model::{
    DEFAULT_MAX_TOOL_CALLS, DEFAULT_MODEL, ResearchRequest, RunOptions, ToolKind, ToolSpec,
};
pub use progress::{Eta, ProgressSnapshot, ProgressTracker};
pub use reducer::{ReducerState, StreamReducer};
pub use render::{MemorySink, NullSink, RenderSink, Renderer, TerminalSink, render_panel};
pub use resolver::{DEFAULT_POLL_INTERVAL, ResultResolver};
pub use run::{AbortHandle, ResearchOutcome, ResearchRunBuilder, ResearchStream};

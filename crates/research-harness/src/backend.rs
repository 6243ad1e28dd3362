use std::pin::Pin;

use crate::errors::ProviderError;
use crate::event::{EventRecord, RemoteResponse};
use crate::model::ResearchRequest;

/// Ordered stream of events for one run. Ends when the service closes it.
pub type EventStream =
    Pin<Box<dyn futures::Stream<Item = Result<EventRecord, ProviderError>> + Send + 'static>>;

/// Contract for a hosted research service.
///
/// Implementations are vendor specific (see `vendors::openai`); tests use
/// scripted fakes.
#[async_trait::async_trait]
pub trait ResearchBackend: Send + Sync {
    /// Starts a streaming run and returns its event stream.
    async fn start_stream(&self, request: &ResearchRequest) -> Result<EventStream, ProviderError>;

    /// Creates a run without streaming. Background requests return while the
    /// run is still queued.
    async fn create(&self, request: &ResearchRequest) -> Result<RemoteResponse, ProviderError>;

    /// Fetches the current state of a run.
    async fn retrieve(&self, run_id: &str) -> Result<RemoteResponse, ProviderError>;

    /// Requests cancellation of a background run.
    async fn cancel(&self, run_id: &str) -> Result<RemoteResponse, ProviderError>;
}

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::backend::ResearchBackend;
use crate::errors::ProviderError;
use crate::event::RemoteResponse;

/// Interval between status checks when polling a background run.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Fetches run results directly when the stream cannot provide them.
#[derive(Clone)]
pub struct ResultResolver {
    backend: Arc<dyn ResearchBackend>,
}

impl ResultResolver {
    pub fn new(backend: Arc<dyn ResearchBackend>) -> Self {
        Self { backend }
    }

    /// Retrieves the run once. The returned status may still be pending; the
    /// caller decides how to treat it.
    pub async fn resolve(&self, run_id: &str) -> Result<RemoteResponse, ProviderError> {
        info!(run_id, "retrieving final response");
        let response = self.backend.retrieve(run_id).await?;
        info!(run_id, status = %response.status, "retrieved response");
        Ok(response)
    }

    /// Re-retrieves the run every `interval` while it is queued or in progress.
    pub async fn poll_until_terminal(
        &self,
        initial: RemoteResponse,
        interval: Duration,
    ) -> Result<RemoteResponse, ProviderError> {
        self.poll_until_terminal_with(initial, interval, |_| {}).await
    }

    /// Like [`Self::poll_until_terminal`], calling `on_pending` with every
    /// response that is still queued or in progress.
    pub async fn poll_until_terminal_with(
        &self,
        initial: RemoteResponse,
        interval: Duration,
        mut on_pending: impl FnMut(&RemoteResponse) + Send,
    ) -> Result<RemoteResponse, ProviderError> {
        let mut response = initial;
        while response.status.is_pending() {
            info!(run_id = %response.id, status = %response.status, "research still running");
            on_pending(&response);
            tokio::time::sleep(interval).await;
            response = self.backend.retrieve(&response.id).await?;
        }
        info!(run_id = %response.id, status = %response.status, "research finished");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::backend::EventStream;
    use crate::event::ResponseStatus;
    use crate::model::ResearchRequest;

    struct ScriptedRetrieve {
        statuses: Mutex<Vec<ResponseStatus>>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl ResearchBackend for ScriptedRetrieve {
        async fn start_stream(&self, _: &ResearchRequest) -> Result<EventStream, ProviderError> {
            unreachable!("not used in this test")
        }

        async fn create(&self, _: &ResearchRequest) -> Result<RemoteResponse, ProviderError> {
            unreachable!("not used in this test")
        }

        async fn retrieve(&self, run_id: &str) -> Result<RemoteResponse, ProviderError> {
            self.calls.lock().unwrap().push(run_id.to_string());
            let mut statuses = self.statuses.lock().unwrap();
            if statuses.is_empty() {
                return Err(ProviderError::transport("no more responses"));
            }
            Ok(RemoteResponse {
                id: run_id.to_string(),
                status: statuses.remove(0),
                ..RemoteResponse::default()
            })
        }

        async fn cancel(&self, _: &str) -> Result<RemoteResponse, ProviderError> {
            unreachable!("not used in this test")
        }
    }

    fn resolver(statuses: Vec<ResponseStatus>) -> (ResultResolver, Arc<ScriptedRetrieve>) {
        let backend = Arc::new(ScriptedRetrieve {
            statuses: Mutex::new(statuses),
            calls: Mutex::new(Vec::new()),
        });
        (ResultResolver::new(backend.clone()), backend)
    }

    #[tokio::test]
    async fn resolve_returns_pending_status_verbatim() {
        let (resolver, backend) = resolver(vec![ResponseStatus::Queued]);
        let response = resolver.resolve("resp_1").await.expect("resolve");
        assert_eq!(response.status, ResponseStatus::Queued);
        assert_eq!(*backend.calls.lock().unwrap(), vec!["resp_1"]);
    }

    #[tokio::test]
    async fn poll_stops_at_first_terminal_status() {
        let (resolver, backend) = resolver(vec![
            ResponseStatus::InProgress,
            ResponseStatus::Completed,
            ResponseStatus::Failed,
        ]);
        let initial = RemoteResponse {
            id: "resp_2".into(),
            status: ResponseStatus::Queued,
            ..RemoteResponse::default()
        };
        let response = resolver
            .poll_until_terminal(initial, Duration::from_millis(1))
            .await
            .expect("poll");
        assert_eq!(response.status, ResponseStatus::Completed);
        assert_eq!(backend.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn poll_skips_retrieval_for_finished_runs() {
        let (resolver, backend) = resolver(Vec::new());
        let initial = RemoteResponse {
            id: "resp_3".into(),
            status: ResponseStatus::Completed,
            ..RemoteResponse::default()
        };
        let response = resolver
            .poll_until_terminal(initial.clone(), Duration::from_millis(1))
            .await
            .expect("poll");
        assert_eq!(response, initial);
        assert!(backend.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn poll_reports_each_pending_status() {
        let (resolver, _) = resolver(vec![ResponseStatus::InProgress, ResponseStatus::Failed]);
        let initial = RemoteResponse {
            id: "resp_4".into(),
            status: ResponseStatus::Queued,
            ..RemoteResponse::default()
        };
        let mut seen = Vec::new();
        let response = resolver
            .poll_until_terminal_with(initial, Duration::from_millis(1), |r| seen.push(r.status))
            .await
            .expect("poll");
        assert_eq!(response.status, ResponseStatus::Failed);
        assert_eq!(seen, vec![ResponseStatus::Queued, ResponseStatus::InProgress]);
    }
}

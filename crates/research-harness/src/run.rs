use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt as _;
use tokio::sync::{oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::backend::{EventStream, ResearchBackend};
use crate::clock::{Clock, SystemClock};
use crate::errors::{ProviderError, ResearchError};
use crate::event::{EventRecord, RemoteResponse, ResponseStatus};
use crate::model::{ResearchRequest, RunOptions};
use crate::progress::{ProgressSnapshot, ProgressTracker};
use crate::reducer::{ReducerState, StreamReducer};
use crate::render::{NullSink, RenderSink, Renderer};
use crate::resolver::ResultResolver;

/// Handle used to interrupt a running stream.
#[derive(Clone)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    /// Requests cancellation.
    ///
    /// The driver stops consuming events, asks the service to cancel the run
    /// and finishes with a `Cancelled` outcome.
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }
}

/// Everything a streamed run produced.
#[derive(Debug)]
pub struct ResearchOutcome {
    /// Final reducer state.
    pub state: ReducerState,
    /// Terminal response from the stream, the fallback retrieval, or the
    /// cancel acknowledgment.
    pub response: Option<RemoteResponse>,
    /// Why no usable response is available, when that is the case.
    pub failure: Option<ResearchError>,
    pub run_id: Option<String>,
    /// Every event received, in arrival order.
    pub events: Vec<EventRecord>,
    /// Tracker state at the end of the run.
    pub progress: ProgressSnapshot,
    /// The response came from retrieval after the stream ended early.
    pub resolved_by_fallback: bool,
}

impl ResearchOutcome {
    /// Collapses the outcome into the final response or the reason there is
    /// none. Only a `completed` response is a success.
    pub fn into_result(self) -> Result<RemoteResponse, ResearchError> {
        if self.state == ReducerState::Cancelled {
            return Err(ResearchError::Cancelled);
        }
        if let Some(failure) = self.failure {
            return Err(failure);
        }
        let response = self.response.ok_or(ResearchError::MissingResponse)?;
        if response.status == ResponseStatus::Completed {
            Ok(response)
        } else {
            Err(ResearchError::RemoteRunFailure {
                run_id: response.id,
                status: response.status,
            })
        }
    }
}

/// Builder for configuring and starting a streamed research run.
pub struct ResearchRunBuilder {
    backend: Arc<dyn ResearchBackend>,
    request: ResearchRequest,
    clock: Arc<dyn Clock>,
    renderer: Renderer,
    sink: Box<dyn RenderSink>,
    options: RunOptions,
    abort_tx: watch::Sender<bool>,
    abort_rx: watch::Receiver<bool>,
}

impl ResearchRunBuilder {
    /// Creates a builder with the system clock, a local-time renderer and no
    /// display.
    pub fn new(backend: Arc<dyn ResearchBackend>, request: ResearchRequest) -> Self {
        let (abort_tx, abort_rx) = watch::channel(false);
        Self {
            backend,
            request,
            clock: Arc::new(SystemClock),
            renderer: Renderer::local(),
            sink: Box::new(NullSink),
            options: RunOptions::default(),
            abort_tx,
            abort_rx,
        }
    }

    /// Time source for elapsed time, action timestamps and the ETA.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Panel formatter. Defaults to [`Renderer::local`].
    pub fn renderer(mut self, renderer: Renderer) -> Self {
        self.renderer = renderer;
        self
    }

    /// Destination for progress frames. Defaults to discarding them.
    pub fn sink(mut self, sink: impl RenderSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Repaint period while no events arrive. Must be non-zero.
    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.options.refresh_interval = interval;
        self
    }

    /// Upper bound on the cancel request sent after an interrupt.
    pub fn cancel_timeout(mut self, timeout: Duration) -> Self {
        self.options.cancel_timeout = timeout;
        self
    }

    /// Returns a handle that can interrupt the run, usable before it starts.
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            tx: self.abort_tx.clone(),
        }
    }

    /// Validates the request and starts the run on a background task.
    pub async fn start_stream(self) -> Result<ResearchStream, ResearchError> {
        self.request.validate()?;
        if self.options.refresh_interval.is_zero() {
            return Err(ResearchError::Validation(
                "refresh_interval must be greater than 0".into(),
            ));
        }
        let mut request = self.request;
        request.background = true;

        let tracker = ProgressTracker::new(request.max_tool_calls, request.model.clone(), self.clock);
        let painter = Painter {
            renderer: self.renderer,
            sink: self.sink,
        };
        let (final_tx, final_rx) = oneshot::channel();
        let abort_handle = AbortHandle { tx: self.abort_tx };

        tokio::spawn(run_task(
            self.backend,
            request,
            StreamReducer::new(tracker),
            painter,
            self.options,
            self.abort_rx,
            final_tx,
        ));

        Ok(ResearchStream {
            final_rx,
            abort_handle,
        })
    }

    /// Runs to completion and returns the outcome.
    pub async fn run(self) -> Result<ResearchOutcome, ResearchError> {
        self.start_stream().await?.finish().await
    }
}

/// Handle to a started run.
pub struct ResearchStream {
    final_rx: oneshot::Receiver<ResearchOutcome>,
    abort_handle: AbortHandle,
}

impl ResearchStream {
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Waits for the run task to finish.
    pub async fn finish(self) -> Result<ResearchOutcome, ResearchError> {
        let Self {
            final_rx,
            abort_handle,
        } = self;
        drop(abort_handle);
        final_rx
            .await
            .map_err(|_| ResearchError::protocol_msg("run task ended without an outcome"))
    }
}

struct Painter {
    renderer: Renderer,
    sink: Box<dyn RenderSink>,
}

impl Painter {
    fn paint(&mut self, snapshot: &ProgressSnapshot) {
        let frame = self.renderer.render(snapshot);
        self.sink.paint(&frame);
    }
}

enum StreamExit {
    Terminal,
    Ended,
    Errored(ProviderError),
    Interrupted,
}

async fn run_task(
    backend: Arc<dyn ResearchBackend>,
    request: ResearchRequest,
    mut reducer: StreamReducer,
    mut painter: Painter,
    options: RunOptions,
    mut abort_rx: watch::Receiver<bool>,
    final_tx: oneshot::Sender<ResearchOutcome>,
) {
    reducer.begin();
    painter.paint(&reducer.snapshot());
    info!(model = %request.model, max_tool_calls = request.max_tool_calls, "starting research stream");

    let opened = tokio::select! {
        biased;
        _ = abort_requested(&mut abort_rx) => None,
        opened = backend.start_stream(&request) => Some(opened),
    };
    let exit = match opened {
        None => StreamExit::Interrupted,
        Some(Err(err)) => StreamExit::Errored(err),
        Some(Ok(stream)) => {
            consume(stream, &mut reducer, &mut painter, &options, &mut abort_rx).await
        }
    };

    match exit {
        StreamExit::Terminal => finish(reducer, painter, None, None, false, final_tx),
        StreamExit::Interrupted => {
            let failure = cancel_run(backend.as_ref(), &mut reducer, options.cancel_timeout).await;
            finish(reducer, painter, None, failure, false, final_tx);
        }
        StreamExit::Ended => {
            let (response, failure) =
                resolve_after_stream(backend, &mut reducer, None, &options, &mut abort_rx).await;
            let fallback = response.is_some();
            finish(reducer, painter, response, failure, fallback, final_tx);
        }
        StreamExit::Errored(err) => {
            warn!(error = %err, "research stream failed");
            let (response, failure) =
                resolve_after_stream(backend, &mut reducer, Some(err), &options, &mut abort_rx)
                    .await;
            let fallback = response.is_some();
            finish(reducer, painter, response, failure, fallback, final_tx);
        }
    }
}

/// Fallback after the stream stopped without a terminal event. A retrieved
/// response wins over the stream error; otherwise the stream error is reported
/// before the retrieval error. An abort during retrieval cancels the run and
/// reports `Cancelled`.
async fn resolve_after_stream(
    backend: Arc<dyn ResearchBackend>,
    reducer: &mut StreamReducer,
    stream_error: Option<ProviderError>,
    options: &RunOptions,
    abort_rx: &mut watch::Receiver<bool>,
) -> (Option<RemoteResponse>, Option<ResearchError>) {
    reducer.stream_ended();
    info!(events = reducer.events().len(), "stream ended without a final response");
    let Some(run_id) = reducer.run_id().map(ToOwned::to_owned) else {
        warn!("no response id captured from stream");
        let failure = stream_error
            .map(ResearchError::Provider)
            .unwrap_or(ResearchError::NoIdentifierCaptured);
        return (None, Some(failure));
    };
    let resolver = ResultResolver::new(backend.clone());
    let retrieved = tokio::select! {
        biased;
        _ = abort_requested(abort_rx) => None,
        retrieved = resolver.resolve(&run_id) => Some(retrieved),
    };
    let Some(retrieved) = retrieved else {
        info!(run_id = %run_id, "interrupted while retrieving final response");
        request_cancel(backend.as_ref(), &run_id, options.cancel_timeout).await;
        return (None, Some(ResearchError::Cancelled));
    };
    match retrieved {
        Ok(response) => (Some(response), None),
        Err(err) => {
            warn!(run_id = %run_id, error = %err, "failed to retrieve final response");
            let failure = ResearchError::Provider(stream_error.unwrap_or(err));
            (None, Some(failure))
        }
    }
}

async fn consume(
    mut stream: EventStream,
    reducer: &mut StreamReducer,
    painter: &mut Painter,
    options: &RunOptions,
    abort_rx: &mut watch::Receiver<bool>,
) -> StreamExit {
    let period = options.refresh_interval;
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = abort_requested(abort_rx) => return StreamExit::Interrupted,
            next = stream.next() => match next {
                Some(Ok(record)) => {
                    debug!(kind = %record.kind, "stream event");
                    let state = reducer.apply(record);
                    painter.paint(&reducer.snapshot());
                    if state.is_terminal() {
                        return StreamExit::Terminal;
                    }
                }
                Some(Err(err)) => return StreamExit::Errored(err),
                None => return StreamExit::Ended,
            },
            _ = ticker.tick() => painter.paint(&reducer.snapshot()),
        }
    }
}

/// Issues a bounded cancel request. Returns the failure to report, if any.
async fn cancel_run(
    backend: &dyn ResearchBackend,
    reducer: &mut StreamReducer,
    timeout: Duration,
) -> Option<ResearchError> {
    let Some(run_id) = reducer.run_id().map(ToOwned::to_owned) else {
        warn!("interrupted before a response id was captured; cannot cancel remote run");
        reducer.mark_failed();
        return Some(ResearchError::NoIdentifierCaptured);
    };
    let ack = request_cancel(backend, &run_id, timeout).await;
    reducer.mark_cancelled(ack);
    None
}

/// Best-effort cancel bounded by `timeout`. Failures are logged, not retried.
async fn request_cancel(
    backend: &dyn ResearchBackend,
    run_id: &str,
    timeout: Duration,
) -> Option<RemoteResponse> {
    info!(run_id = %run_id, "cancelling research");
    match tokio::time::timeout(timeout, backend.cancel(run_id)).await {
        Ok(Ok(response)) => {
            info!(run_id = %run_id, status = %response.status, "research cancelled");
            Some(response)
        }
        Ok(Err(err)) => {
            warn!(run_id = %run_id, error = %err, "cancel request failed");
            None
        }
        Err(_) => {
            warn!(run_id = %run_id, timeout_ms = timeout.as_millis() as u64, "cancel request timed out");
            None
        }
    }
}

/// `retrieved` is the fallback response; otherwise the reducer's terminal
/// response (final event or cancel acknowledgment) is reported.
fn finish(
    reducer: StreamReducer,
    mut painter: Painter,
    retrieved: Option<RemoteResponse>,
    failure: Option<ResearchError>,
    resolved_by_fallback: bool,
    final_tx: oneshot::Sender<ResearchOutcome>,
) {
    painter.paint(&reducer.snapshot());
    painter.sink.finish();
    let parts = reducer.into_parts();
    debug!(state = ?parts.state, events = parts.events.len(), "research stream finished");
    let _ = final_tx.send(ResearchOutcome {
        state: parts.state,
        response: retrieved.or(parts.terminal),
        failure,
        run_id: parts.run_id,
        events: parts.events,
        progress: parts.progress,
        resolved_by_fallback,
    });
}

/// Resolves once an abort was requested. Pends forever when every handle is
/// gone without aborting.
async fn abort_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, OnceLock};

    use futures::StreamExt as _;
    use futures::stream;

    use super::*;
    use crate::clock::ManualClock;
    use crate::model::{DEFAULT_MODEL, ToolKind};
    use crate::render::MemorySink;

    enum Script {
        Events(Vec<Result<serde_json::Value, ProviderError>>),
        /// Yields the events, then aborts the run and hangs.
        InterruptAfter(Vec<serde_json::Value>),
        OpenFails(ProviderError),
        Pending,
    }

    struct FakeBackend {
        script: Script,
        retrieve_result: Option<Result<RemoteResponse, ProviderError>>,
        retrieve_hangs: bool,
        cancel_result: Result<RemoteResponse, ProviderError>,
        cancels: Mutex<Vec<String>>,
        retrieves: Mutex<Vec<String>>,
        trigger: OnceLock<AbortHandle>,
    }

    impl FakeBackend {
        fn new(script: Script) -> Self {
            Self {
                script,
                retrieve_result: None,
                retrieve_hangs: false,
                cancel_result: Err(ProviderError::transport("cancel not scripted")),
                cancels: Mutex::new(Vec::new()),
                retrieves: Mutex::new(Vec::new()),
                trigger: OnceLock::new(),
            }
        }

        fn retrieving(mut self, result: Result<RemoteResponse, ProviderError>) -> Self {
            self.retrieve_result = Some(result);
            self
        }

        fn hanging_retrieve(mut self) -> Self {
            self.retrieve_hangs = true;
            self
        }

        fn cancelling(mut self, result: Result<RemoteResponse, ProviderError>) -> Self {
            self.cancel_result = result;
            self
        }
    }

    #[async_trait::async_trait]
    impl ResearchBackend for FakeBackend {
        async fn start_stream(&self, _: &ResearchRequest) -> Result<EventStream, ProviderError> {
            match &self.script {
                Script::Events(events) => {
                    let events: Vec<_> = events
                        .iter()
                        .cloned()
                        .map(|e| e.map(EventRecord::from_json))
                        .collect();
                    Ok(Box::pin(stream::iter(events)))
                }
                Script::InterruptAfter(events) => {
                    let abort = self.trigger.get().cloned().expect("trigger armed");
                    let events: Vec<_> = events
                        .iter()
                        .cloned()
                        .map(|e| Ok(EventRecord::from_json(e)))
                        .collect();
                    let interrupt = stream::once(async move {
                        abort.abort();
                        std::future::pending::<Result<EventRecord, ProviderError>>().await
                    });
                    Ok(Box::pin(stream::iter(events).chain(interrupt)))
                }
                Script::OpenFails(err) => Err(err.clone()),
                Script::Pending => Ok(Box::pin(stream::pending())),
            }
        }

        async fn create(&self, _: &ResearchRequest) -> Result<RemoteResponse, ProviderError> {
            unreachable!("not used by the stream driver")
        }

        async fn retrieve(&self, run_id: &str) -> Result<RemoteResponse, ProviderError> {
            self.retrieves.lock().unwrap().push(run_id.to_string());
            if self.retrieve_hangs {
                std::future::pending::<()>().await;
            }
            self.retrieve_result
                .clone()
                .unwrap_or_else(|| Err(ProviderError::transport("retrieve not scripted")))
        }

        async fn cancel(&self, run_id: &str) -> Result<RemoteResponse, ProviderError> {
            self.cancels.lock().unwrap().push(run_id.to_string());
            self.cancel_result.clone()
        }
    }

    fn created(id: &str) -> serde_json::Value {
        serde_json::json!({"type": "response.created", "response": {"id": id, "status": "queued"}})
    }

    fn tool_item(kind: &str) -> serde_json::Value {
        serde_json::json!({"type": "response.output_item.added", "item": {"type": kind}})
    }

    fn response(id: &str, status: ResponseStatus) -> RemoteResponse {
        RemoteResponse {
            id: id.into(),
            status,
            ..RemoteResponse::default()
        }
    }

    fn builder(backend: Arc<FakeBackend>) -> (ResearchRunBuilder, MemorySink) {
        let sink = MemorySink::default();
        let clock = ManualClock::new(chrono::DateTime::from_timestamp(1_700_000_000, 0).expect("ts"));
        let builder = ResearchRunBuilder::new(backend, ResearchRequest::new(DEFAULT_MODEL, "cats"))
            .clock(Arc::new(clock))
            .sink(sink.clone())
            .cancel_timeout(Duration::from_millis(200));
        (builder, sink)
    }

    #[tokio::test]
    async fn scripted_stream_completes_from_done_event() {
        let backend = Arc::new(FakeBackend::new(Script::Events(vec![
            Ok(created("r1")),
            Ok(serde_json::json!({
                "type": "response.output_item.added",
                "item": {"type": "web_search_call", "action": {"type": "search", "query": "cats"}}
            })),
            Ok(tool_item("code_interpreter_call")),
            Ok(serde_json::json!({
                "type": "response.done",
                "response": {"id": "r1", "status": "completed"}
            })),
        ])));
        let (builder, sink) = builder(backend.clone());
        let outcome = builder.run().await.expect("outcome");

        assert_eq!(outcome.state, ReducerState::Completed);
        assert_eq!(outcome.progress.tool_calls_observed, 2);
        assert_eq!(outcome.progress.count(ToolKind::WebSearch), 1);
        assert_eq!(outcome.progress.count(ToolKind::CodeExec), 1);
        assert_eq!(outcome.events.len(), 4);
        assert!(!outcome.resolved_by_fallback);
        assert!(backend.retrieves.lock().unwrap().is_empty());
        let actions: Vec<_> = outcome
            .progress
            .recent_actions
            .iter()
            .map(|a| a.description.as_str())
            .collect();
        assert_eq!(&actions[1..3], &["Searching: cats", "Executing code"]);
        // Initial frame, one per event, final frame.
        assert_eq!(sink.frames().len(), 6);
        assert!(sink.last().expect("frame").contains("(2/100 calls)"));

        let response = outcome.into_result().expect("completed");
        assert_eq!(response.status, ResponseStatus::Completed);
    }

    #[tokio::test]
    async fn stream_without_done_falls_back_to_retrieval() {
        let backend = Arc::new(
            FakeBackend::new(Script::Events(vec![Ok(created("r2"))]))
                .retrieving(Ok(response("r2", ResponseStatus::Completed))),
        );
        let (builder, _) = builder(backend.clone());
        let outcome = builder.run().await.expect("outcome");

        assert_eq!(outcome.state, ReducerState::Failed);
        assert!(outcome.resolved_by_fallback);
        assert_eq!(outcome.response, Some(response("r2", ResponseStatus::Completed)));
        assert_eq!(*backend.retrieves.lock().unwrap(), vec!["r2"]);
        assert_eq!(
            outcome.into_result().expect("fallback result"),
            response("r2", ResponseStatus::Completed)
        );
    }

    #[tokio::test]
    async fn interrupt_cancels_captured_run_once() {
        let backend = Arc::new(
            FakeBackend::new(Script::InterruptAfter(vec![
                created("r3"),
                tool_item("web_search_call"),
            ]))
            .cancelling(Ok(response("r3", ResponseStatus::Cancelled))),
        );
        let (builder, _) = builder(backend.clone());
        assert!(backend.trigger.set(builder.abort_handle()).is_ok());
        let outcome = builder.run().await.expect("outcome");

        assert_eq!(outcome.state, ReducerState::Cancelled);
        assert_eq!(*backend.cancels.lock().unwrap(), vec!["r3"]);
        assert_eq!(
            outcome.response.as_ref().map(|r| r.status),
            Some(ResponseStatus::Cancelled)
        );
        assert_eq!(outcome.events.len(), 2);
        assert!(matches!(outcome.into_result(), Err(ResearchError::Cancelled)));
    }

    #[tokio::test]
    async fn interrupt_without_run_id_reports_missing_identifier() {
        let backend = Arc::new(FakeBackend::new(Script::Pending));
        let (builder, _) = builder(backend.clone());
        let stream = builder.start_stream().await.expect("start");
        stream.abort_handle().abort();
        let outcome = stream.finish().await.expect("outcome");

        assert_eq!(outcome.state, ReducerState::Failed);
        assert!(backend.cancels.lock().unwrap().is_empty());
        assert!(matches!(
            outcome.into_result(),
            Err(ResearchError::NoIdentifierCaptured)
        ));
    }

    #[tokio::test]
    async fn failed_cancel_still_reports_cancelled_without_ack() {
        let backend = Arc::new(FakeBackend::new(Script::InterruptAfter(vec![created("r4")])));
        let (builder, _) = builder(backend.clone());
        assert!(backend.trigger.set(builder.abort_handle()).is_ok());
        let outcome = builder.run().await.expect("outcome");

        assert_eq!(outcome.state, ReducerState::Cancelled);
        assert_eq!(outcome.response, None);
        assert_eq!(backend.cancels.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stream_ending_before_created_is_definitive_failure() {
        let backend = Arc::new(FakeBackend::new(Script::Events(vec![Ok(
            serde_json::json!({"type": "response.in_progress"}),
        )])));
        let (builder, _) = builder(backend.clone());
        let outcome = builder.run().await.expect("outcome");

        assert_eq!(outcome.state, ReducerState::Failed);
        assert_eq!(outcome.events.len(), 1);
        assert!(backend.retrieves.lock().unwrap().is_empty());
        assert!(matches!(
            outcome.into_result(),
            Err(ResearchError::NoIdentifierCaptured)
        ));
    }

    #[tokio::test]
    async fn transport_error_mid_stream_recovers_through_fallback() {
        let backend = Arc::new(
            FakeBackend::new(Script::Events(vec![
                Ok(created("r5")),
                Err(ProviderError::transport("connection reset")),
            ]))
            .retrieving(Ok(response("r5", ResponseStatus::Failed))),
        );
        let (builder, _) = builder(backend.clone());
        let outcome = builder.run().await.expect("outcome");

        assert!(outcome.resolved_by_fallback);
        assert!(matches!(
            outcome.into_result(),
            Err(ResearchError::RemoteRunFailure { status: ResponseStatus::Failed, .. })
        ));
    }

    #[tokio::test]
    async fn transport_error_without_fallback_is_propagated() {
        let backend = Arc::new(FakeBackend::new(Script::Events(vec![
            Ok(created("r6")),
            Err(ProviderError::transport("connection reset")),
        ])));
        let (builder, _) = builder(backend.clone());
        let outcome = builder.run().await.expect("outcome");

        assert_eq!(*backend.retrieves.lock().unwrap(), vec!["r6"]);
        assert!(matches!(
            outcome.into_result(),
            Err(ResearchError::Provider(ProviderError::Transport { .. }))
        ));
    }

    #[tokio::test]
    async fn abort_during_fallback_retrieval_cancels_the_run() {
        let backend = Arc::new(
            FakeBackend::new(Script::Events(vec![Ok(created("r7"))]))
                .hanging_retrieve()
                .cancelling(Ok(response("r7", ResponseStatus::Cancelled))),
        );
        let (builder, _) = builder(backend.clone());
        let stream = builder.start_stream().await.expect("start");
        while backend.retrieves.lock().unwrap().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        stream.abort_handle().abort();
        let outcome = tokio::time::timeout(Duration::from_secs(5), stream.finish())
            .await
            .expect("driver returned")
            .expect("outcome");

        assert!(!outcome.resolved_by_fallback);
        assert_eq!(*backend.cancels.lock().unwrap(), vec!["r7"]);
        assert!(matches!(outcome.into_result(), Err(ResearchError::Cancelled)));
    }

    #[tokio::test]
    async fn open_failure_is_reported_as_provider_error() {
        let backend = Arc::new(FakeBackend::new(Script::OpenFails(ProviderError::provider(
            "unauthorized",
            Some(401),
        ))));
        let (builder, _) = builder(backend);
        let outcome = builder.run().await.expect("outcome");

        assert!(outcome.events.is_empty());
        assert!(matches!(
            outcome.into_result(),
            Err(ResearchError::Provider(ProviderError::Provider {
                status_code: Some(401),
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn ticks_repaint_while_stream_is_idle() {
        let backend = Arc::new(FakeBackend::new(Script::Pending));
        let (builder, sink) = builder(backend);
        let stream = builder
            .refresh_interval(Duration::from_millis(10))
            .start_stream()
            .await
            .expect("start");
        tokio::time::sleep(Duration::from_millis(60)).await;
        stream.abort_handle().abort();
        let _ = stream.finish().await.expect("outcome");
        // Initial and final frames plus at least one tick.
        assert!(sink.frames().len() >= 3);
    }

    #[tokio::test]
    async fn validation_rejects_blank_query_before_spawning() {
        let backend = Arc::new(FakeBackend::new(Script::Pending));
        let builder = ResearchRunBuilder::new(backend, ResearchRequest::new(DEFAULT_MODEL, " "));
        assert!(matches!(
            builder.start_stream().await,
            Err(ResearchError::Validation(_))
        ));
    }
}

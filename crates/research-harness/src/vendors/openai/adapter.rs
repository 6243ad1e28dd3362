use std::collections::VecDeque;
use std::pin::Pin;

use futures::StreamExt as _;
use futures::stream;
use tracing::debug;

use crate::backend::{EventStream, ResearchBackend};
use crate::errors::{ProviderError, ResearchError};
use crate::event::{EventRecord, RemoteResponse};
use crate::model::ResearchRequest;

use super::config::OpenAiClientConfig;
use super::transport::{SseDecoder, frame_to_record};

type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static>>;

/// Research backend for OpenAI's Responses API.
pub struct OpenAiBackend {
    client: reqwest::Client,
    config: OpenAiClientConfig,
}

impl OpenAiBackend {
    /// Creates a backend from explicit client configuration.
    pub fn new(config: OpenAiClientConfig) -> Result<Self, ResearchError> {
        if config.api_key.trim().is_empty() {
            return Err(ResearchError::Config(
                "OpenAI client config api_key must not be empty".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ResearchError::Config(format!("failed to build OpenAI client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates a backend using `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self, ResearchError> {
        Self::new(OpenAiClientConfig::from_env()?)
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, ProviderError> {
        let response = req
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::transport(format!("OpenAI request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::provider(
                format!("OpenAI responses request failed with status {status}: {body}"),
                Some(status.as_u16()),
            ));
        }
        Ok(response)
    }

    async fn send_for_response(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<RemoteResponse, ProviderError> {
        self.send(req)
            .await?
            .json::<RemoteResponse>()
            .await
            .map_err(|e| ProviderError::protocol(format!("invalid OpenAI response body: {e}")))
    }
}

#[async_trait::async_trait]
impl ResearchBackend for OpenAiBackend {
    async fn start_stream(&self, request: &ResearchRequest) -> Result<EventStream, ProviderError> {
        let body = build_request_body(request, true)?;
        debug!(model = %request.model, "starting OpenAI responses stream");
        let response = self
            .send(self.client.post(self.config.responses_url()).json(&body))
            .await?;
        let bytes_stream: ByteStream = Box::pin(response.bytes_stream());
        Ok(Box::pin(openai_event_stream(bytes_stream)))
    }

    async fn create(&self, request: &ResearchRequest) -> Result<RemoteResponse, ProviderError> {
        let body = build_request_body(request, false)?;
        debug!(model = %request.model, background = request.background, "creating OpenAI response");
        self.send_for_response(self.client.post(self.config.responses_url()).json(&body))
            .await
    }

    async fn retrieve(&self, run_id: &str) -> Result<RemoteResponse, ProviderError> {
        self.send_for_response(self.client.get(self.config.response_url(run_id)))
            .await
    }

    async fn cancel(&self, run_id: &str) -> Result<RemoteResponse, ProviderError> {
        self.send_for_response(self.client.post(self.config.cancel_url(run_id)))
            .await
    }
}

pub(crate) fn build_request_body(
    request: &ResearchRequest,
    stream: bool,
) -> Result<serde_json::Value, ProviderError> {
    let mut body = serde_json::to_value(request)
        .map_err(|e| ProviderError::protocol(format!("failed to serialize request: {e}")))?;
    body["stream"] = serde_json::Value::Bool(stream);
    Ok(body)
}

fn openai_event_stream(
    bytes_stream: ByteStream,
) -> impl futures::Stream<Item = Result<EventRecord, ProviderError>> + Send {
    struct State {
        bytes_stream: ByteStream,
        decoder: SseDecoder,
        pending: VecDeque<EventRecord>,
        done: bool,
    }

    stream::try_unfold(
        State {
            bytes_stream,
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(record) = state.pending.pop_front() {
                    return Ok(Some((record, state)));
                }
                if state.done {
                    return Ok(None);
                }

                match state.bytes_stream.next().await {
                    Some(Ok(chunk)) => {
                        for frame in state.decoder.push_chunk(&chunk) {
                            if let Some(record) = frame_to_record(&frame)? {
                                state.pending.push_back(record);
                            }
                        }
                    }
                    Some(Err(e)) => {
                        return Err(ProviderError::transport(format!(
                            "OpenAI streaming read failed: {e}"
                        )));
                    }
                    None => {
                        state.done = true;
                        if let Some(frame) = state.decoder.finish()
                            && let Some(record) = frame_to_record(&frame)?
                        {
                            state.pending.push_back(record);
                        }
                    }
                }
            }
        },
    )
}

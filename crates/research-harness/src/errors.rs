use crate::event::ResponseStatus;

/// Errors returned by a research backend before they are normalized for the
/// caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Service returned an application-level failure (HTTP status, auth, etc.).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        status_code: Option<u16>,
    },
    /// Transport or stream I/O failed.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// Response shape or event framing was invalid.
    #[error("protocol error: {message}")]
    Protocol { message: String },
}

impl ProviderError {
    /// Creates a provider-level error.
    pub fn provider(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self::Provider {
            message: message.into(),
            status_code,
        }
    }

    /// Creates a transport-level error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a protocol-level error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Returns the human-readable message for this error.
    pub fn message(&self) -> &str {
        match self {
            Self::Provider { message, .. }
            | Self::Transport { message }
            | Self::Protocol { message } => message,
        }
    }
}

/// Top-level error type for research runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResearchError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid request passed to the run builder.
    #[error("validation error: {0}")]
    Validation(String),
    /// Backend failure that could not be recovered by the fallback retrieval.
    #[error(transparent)]
    Provider(ProviderError),
    /// The stream ended before a `response.created` event carried an id, so the
    /// run can neither be cancelled nor retrieved.
    #[error("no response id captured from stream")]
    NoIdentifierCaptured,
    /// The remote run reached a terminal status other than `completed`.
    #[error("research run {run_id} ended with status {status}")]
    RemoteRunFailure {
        run_id: String,
        status: ResponseStatus,
    },
    /// Neither the stream nor the fallback produced a response.
    #[error("research run ended without a final response")]
    MissingResponse,
    /// The run was interrupted by the caller.
    #[error("research cancelled")]
    Cancelled,
    /// Internal protocol misuse or invariant violation.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ResearchError {
    pub(crate) fn protocol_msg(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}

impl From<ProviderError> for ResearchError {
    fn from(value: ProviderError) -> Self {
        ResearchError::Provider(value)
    }
}

use std::time::Duration;

use crate::errors::ResearchError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Configuration for the OpenAI backend.
#[derive(Clone, Debug)]
pub struct OpenAiClientConfig {
    /// API key used for bearer auth.
    pub api_key: String,
    /// Base URL for the OpenAI-compatible endpoint.
    ///
    /// Useful for proxies or local test servers.
    pub base_url: String,
    /// HTTP timeout. Deep research runs stream for a long time, so this is
    /// generous.
    pub timeout: Duration,
}

impl OpenAiClientConfig {
    /// Creates a config with default endpoint and timeout.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(3600),
        }
    }

    /// Builds a config from `OPENAI_API_KEY` and the optional `OPENAI_BASE_URL`.
    pub fn from_env() -> Result<Self, ResearchError> {
        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(ResearchError::Config(
                "OPENAI_API_KEY environment variable not set".into(),
            ));
        }
        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL")
            && !base_url.trim().is_empty()
        {
            config = config.base_url(base_url);
        }
        Ok(config)
    }

    /// Overrides the API base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the HTTP timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn responses_url(&self) -> String {
        format!("{}/v1/responses", self.base_url.trim_end_matches('/'))
    }

    pub(crate) fn response_url(&self, run_id: &str) -> String {
        format!("{}/{run_id}", self.responses_url())
    }

    pub(crate) fn cancel_url(&self, run_id: &str) -> String {
        format!("{}/cancel", self.response_url(run_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_ignore_trailing_slash() {
        let config = OpenAiClientConfig::new("sk-test").base_url("http://localhost:8080/");
        assert_eq!(config.responses_url(), "http://localhost:8080/v1/responses");
        assert_eq!(
            config.cancel_url("resp_1"),
            "http://localhost:8080/v1/responses/resp_1/cancel"
        );
    }
}

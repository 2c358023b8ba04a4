use std::time::Duration;

use crate::errors::HarnessError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Configuration for an OpenAI-compatible endpoint.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    /// API key used for bearer auth. Local servers often need none.
    pub api_key: Option<String>,
    /// Base URL for the OpenAI-compatible endpoint.
    ///
    /// Useful for proxies, third-party providers or local inference servers.
    pub base_url: String,
    /// Connect timeout for the HTTP client.
    pub connect_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl ProviderConfig {
    /// Creates a config with defaults and the provided API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Builds a config from `OPENAI_API_KEY` and optional `OPENAI_BASE_URL`.
    pub fn from_env() -> Result<Self, HarnessError> {
        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(HarnessError::Config(
                "missing OPENAI_API_KEY for OpenAI-compatible provider".into(),
            ));
        }
        let mut config = Self::new(api_key.trim());
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL")
            && !base_url.trim().is_empty()
        {
            config.base_url = base_url.trim().to_string();
        }
        Ok(config)
    }

    /// Overrides the API base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Returns `{base_url}/v1/chat/completions`.
    pub fn chat_completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Headers required for a streaming chat completion request.
    pub fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![
            ("content-type".to_string(), "application/json".to_string()),
            ("accept".to_string(), "text/event-stream".to_string()),
        ];
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            headers.push(("authorization".to_string(), format!("Bearer {key}")));
        }
        headers
    }
}

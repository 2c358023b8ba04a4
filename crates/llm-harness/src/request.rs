use serde_json::Value;

use crate::config::ProviderConfig;
use crate::errors::HarnessError;

const REDACTED: &str = "<redacted>";

/// One chat message in OpenAI wire format.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

/// Generation settings forwarded to the provider.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChatOptions {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Ask the provider to append a usage chunk before `[DONE]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_usage: Option<bool>,
}

impl ChatOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn include_usage(mut self, include: bool) -> Self {
        self.include_usage = Some(include);
        self
    }
}

/// Builds a streaming chat completion body.
pub fn build_chat_request(
    messages: &[ChatMessage],
    options: &ChatOptions,
) -> Result<Value, HarnessError> {
    if options.model.trim().is_empty() {
        return Err(HarnessError::Validation("model must not be empty".into()));
    }
    if messages.is_empty() {
        return Err(HarnessError::Validation(
            "at least one message is required".into(),
        ));
    }

    let mut body = serde_json::json!({
        "model": options.model,
        "messages": messages,
        "stream": true,
    });
    if let Some(temperature) = options.temperature {
        body["temperature"] = serde_json::json!(temperature);
    }
    if let Some(max_tokens) = options.max_tokens {
        body["max_tokens"] = serde_json::json!(max_tokens);
    }
    if options.include_usage == Some(true) {
        body["stream_options"] = serde_json::json!({ "include_usage": true });
    }
    Ok(body)
}

/// Everything needed to issue one streaming HTTP POST.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamRequest {
    pub url: String,
    pub body: Value,
    pub headers: Vec<(String, String)>,
}

impl StreamRequest {
    pub fn new(url: impl Into<String>, body: Value) -> Self {
        Self {
            url: url.into(),
            body,
            headers: Vec::new(),
        }
    }

    /// Builds a chat completion request against `config`.
    pub fn chat(
        config: &ProviderConfig,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<Self, HarnessError> {
        Ok(Self {
            url: config.chat_completions_url(),
            body: build_chat_request(messages, options)?,
            headers: config.headers(),
        })
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Ensures the body requests streaming. Returns a warning when the flag
    /// had to be set.
    pub(crate) fn normalize_stream_flag(&mut self) -> Result<Option<String>, HarnessError> {
        let Some(object) = self.body.as_object_mut() else {
            return Err(HarnessError::Validation(
                "request body must be a JSON object".into(),
            ));
        };
        if object.get("stream").and_then(Value::as_bool) == Some(true) {
            return Ok(None);
        }
        object.insert("stream".into(), Value::Bool(true));
        Ok(Some("request body did not set stream=true; forcing streaming mode".into()))
    }

    /// Copy suitable for diagnostics, with credentials masked.
    pub(crate) fn redacted(&self) -> Self {
        let headers = self
            .headers
            .iter()
            .map(|(name, value)| {
                let sensitive = name.eq_ignore_ascii_case("authorization")
                    || name.eq_ignore_ascii_case("api-key")
                    || name.eq_ignore_ascii_case("x-api-key");
                let value = if sensitive {
                    REDACTED.to_string()
                } else {
                    value.clone()
                };
                (name.clone(), value)
            })
            .collect();
        Self {
            url: self.url.clone(),
            body: self.body.clone(),
            headers,
        }
    }
}

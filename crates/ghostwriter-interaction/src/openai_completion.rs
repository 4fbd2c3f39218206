//! OpenAI Chat Completions client.
//!
//! Calls the REST API directly. Configuration priority:
//! `~/.config/ghostwriter/secret.json` > environment variables.

use async_trait::async_trait;
use ghostwriter_core::completion::{CompletionError, CompletionService};
use ghostwriter_core::config::{CompletionSettings, OpenAIConfig};
use ghostwriter_infrastructure::ConfigService;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

/// Completion service backed by the OpenAI HTTP API.
#[derive(Clone)]
pub struct OpenAICompletionClient {
    client: Client,
    api_key: Option<String>,
    model: String,
    endpoint: String,
    max_tokens: Option<u32>,
}

impl OpenAICompletionClient {
    /// Creates a client with the provided API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let defaults = CompletionSettings::default();
        Self {
            client: Client::new(),
            api_key: Some(api_key.into()),
            model: model.into(),
            endpoint: defaults.endpoint,
            max_tokens: Some(defaults.max_tokens),
        }
    }

    /// Builds a client from settings and optional credentials.
    ///
    /// Without credentials every request fails with
    /// [`CompletionError::MissingCredential`] and nothing is sent.
    pub fn from_settings(settings: &CompletionSettings, credentials: Option<OpenAIConfig>) -> Self {
        let (api_key, model) = match credentials {
            Some(OpenAIConfig {
                api_key,
                model_name,
            }) => (
                Some(api_key),
                model_name.unwrap_or_else(|| settings.model.clone()),
            ),
            None => (None, settings.model.clone()),
        };
        Self {
            client: Client::new(),
            api_key,
            model,
            endpoint: settings.endpoint.clone(),
            max_tokens: Some(settings.max_tokens),
        }
    }

    /// Loads credentials through the config service (secret file, then environment).
    pub fn from_config(settings: &CompletionSettings, config: &ConfigService) -> Self {
        Self::from_settings(settings, config.openai_credentials())
    }

    /// Overrides the endpoint URL after construction.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the maximum number of tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send_request(
        &self,
        api_key: &str,
        body: &ChatCompletionRequest<'_>,
    ) -> Result<String, CompletionError> {
        tracing::debug!(
            model = %self.model,
            endpoint = %self.endpoint,
            "Sending completion request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(|err| CompletionError::NetworkFailure(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read OpenAI error body".to_string());
            tracing::warn!(status = status.as_u16(), "Completion request failed");
            return Err(map_http_error(status, body_text));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| CompletionError::InvalidResponse(err.to_string()))?;

        extract_text_response(parsed)
    }
}

#[async_trait]
impl CompletionService for OpenAICompletionClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_text: &str,
    ) -> Result<String, CompletionError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(CompletionError::MissingCredential)?;

        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_text,
                },
            ],
            max_tokens: self.max_tokens,
        };

        self.send_request(api_key, &request).await
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn extract_text_response(response: ChatCompletionResponse) -> Result<String, CompletionError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| {
            CompletionError::InvalidResponse(
                "OpenAI API returned no content in the response".into(),
            )
        })
}

fn map_http_error(status: StatusCode, body: String) -> CompletionError {
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or(body);

    CompletionError::RequestFailed {
        status: status.as_u16(),
        message,
    }
}

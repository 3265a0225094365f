use core::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response as HttpResponse, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use vizrag_core::{Error, Generation, GenerationProvider, Prompt, ProviderError, TokenUsage};

/// Groq API endpoint URL.
pub const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
/// Default model for Groq.
pub const DEFAULT_MODEL: &str = "mixtral-8x7b-32768";
/// Models offered for selection.
pub const KNOWN_MODELS: &[&str] = &["mixtral-8x7b-32768", "llama3-70b-8192", "llama3-8b-8192", "gemma-7b-it"];
/// Env var key for Groq API key.
pub const ENV_GROQ_API_KEY: &str = "GROQ_API_KEY";

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.1;
/// Default completion limit.
pub const DEFAULT_MAX_TOKENS: usize = 1024;
/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Groq chat completions provider.
pub struct GroqProvider {
    /// HTTP client for API requests.
    client: Client,
    /// Groq API key.
    api_key: String,
    /// Completions endpoint.
    endpoint: String,
    /// Sampling temperature.
    temperature: f32,
    /// Maximum tokens in the completion.
    max_tokens: usize,
}

impl GroqProvider {
    /// Creates a provider with the default request settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty or the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self, Error> {
        Self::with_timeout(api_key, DEFAULT_TIMEOUT)
    }

    /// Creates a provider whose requests fail with a timeout after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty or the HTTP client cannot be built.
    pub fn with_timeout(api_key: impl Into<String>, timeout: Duration) -> Result<Self, Error> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::MissingApiKey(ENV_GROQ_API_KEY.to_owned()));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| Error::Config(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            api_key,
            endpoint: GROQ_API_URL.to_owned(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the completion token limit.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Points the provider at another OpenAI-compatible endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn build_request(&self, prompt: &Prompt, model: &str) -> GroqRequest {
        let mut messages = Vec::with_capacity(2);
        let instruction = prompt.instruction.trim();
        if !instruction.is_empty() {
            messages.push(GroqMessage {
                role: "system".to_owned(),
                content: instruction.to_owned(),
            });
        }
        messages.push(GroqMessage {
            role: "user".to_owned(),
            content: prompt.user_message(),
        });

        GroqRequest {
            model: model.to_owned(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// Request payload sent to the Groq chat completion API.
#[derive(Debug, Serialize)]
struct GroqRequest {
    /// Model identifier provided by the Groq service.
    model: String,
    /// Messages that form the conversation context for the request.
    messages: Vec<GroqMessage>,
    /// Sampling temperature controlling response randomness.
    temperature: f32,
    /// Maximum number of tokens allowed in the completion.
    max_tokens: usize,
}

/// Message delivered to the Groq API.
#[derive(Debug, Serialize)]
struct GroqMessage {
    /// Role of the message author (`system` or `user`).
    role: String,
    /// Textual content of the message.
    content: String,
}

/// Response payload returned by Groq.
#[derive(Debug, Deserialize)]
struct GroqResponse {
    /// List of candidate completions.
    choices: Vec<GroqChoice>,
    /// Token accounting information for the request.
    #[serde(default)]
    usage: Option<GroqUsage>,
}

#[derive(Debug, Deserialize)]
struct GroqChoice {
    message: GroqResponseMessage,
}

#[derive(Debug, Deserialize)]
struct GroqResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroqUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

/// Map a reqwest transport failure onto a provider error.
fn transport_error(err: &reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else if err.is_connect() {
        ProviderError::Unavailable(err.to_string())
    } else {
        ProviderError::Transport(err.to_string())
    }
}

/// Map a non-success HTTP status onto a provider error.
fn status_error(status: StatusCode, retry_after: Option<Duration>, body: String) -> ProviderError {
    match status.as_u16() {
        401 | 403 => ProviderError::Authentication(body),
        429 => ProviderError::RateLimited { retry_after },
        500..=599 => ProviderError::Unavailable(format!("{status}: {body}")),
        code => ProviderError::Api { status: code, body },
    }
}

fn retry_after(response: &HttpResponse) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn into_generation(groq_response: GroqResponse, model: &str, latency_ms: u64) -> Result<Generation, ProviderError> {
    let text = groq_response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| ProviderError::InvalidResponse("No response from Groq".to_owned()))?;

    let tokens_used = groq_response.usage.map_or_else(TokenUsage::default, |usage| TokenUsage {
        input: usage.prompt_tokens,
        output: usage.completion_tokens,
    });

    Ok(Generation {
        text,
        tokens_used,
        provider: format!("Groq/{model}"),
        latency_ms,
    })
}

#[async_trait]
impl GenerationProvider for GroqProvider {
    fn name(&self) -> &'static str {
        "Groq"
    }

    async fn generate(&self, prompt: &Prompt, model: &str) -> Result<Generation, ProviderError> {
        let start = Instant::now();
        let request = self.build_request(prompt, model);
        debug!("Sending Groq request to {} with model '{model}'", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| transport_error(&err))?;

        let status = response.status();
        if !status.is_success() {
            let wait = retry_after(&response);
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_owned());
            return Err(status_error(status, wait, error_text));
        }

        let groq_response: GroqResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::InvalidResponse(format!("Failed to parse Groq response: {err}")))?;

        let latency_ms = start.elapsed().as_millis() as u64;
        into_generation(groq_response, model, latency_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_api_key_is_rejected() {
        let result = GroqProvider::new("   ");
        assert!(matches!(result, Err(Error::MissingApiKey(_))));
    }

    #[test]
    fn test_request_separates_instruction_and_context() {
        let provider = GroqProvider::new("test_key").unwrap();
        let prompt = Prompt::new("You are a data visualization expert.", vec!["Pie charts.".to_owned()], "Pie?");
        let request = provider.build_request(&prompt, DEFAULT_MODEL);

        assert_eq!(request.model, DEFAULT_MODEL);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(request.messages[0].content, "You are a data visualization expert.");
        assert_eq!(request.messages[1].role, "user");
        assert!(request.messages[1].content.contains("Pie charts."));
        assert!(request.messages[1].content.contains("Query: Pie?"));
    }

    #[test]
    fn test_blank_instruction_sends_only_user_message() {
        let provider = GroqProvider::new("test_key").unwrap().with_temperature(0.5).with_max_tokens(64);
        let request = provider.build_request(&Prompt::new("", Vec::new(), "hello"), "llama3-8b-8192");
        assert_eq!(request.messages.len(), 1);
        assert!((request.temperature - 0.5).abs() < f32::EPSILON);
        assert_eq!(request.max_tokens, 64);
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, None, "bad key".to_owned()),
            ProviderError::Authentication(_)
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, Some(Duration::from_secs(3)), String::new()),
            ProviderError::RateLimited {
                retry_after: Some(_)
            }
        ));
        assert!(matches!(
            status_error(StatusCode::SERVICE_UNAVAILABLE, None, String::new()),
            ProviderError::Unavailable(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST, None, "model".to_owned()),
            ProviderError::Api { status: 400, .. }
        ));
    }

    #[test]
    fn test_response_parsing() {
        let payload = json!({
            "choices": [{"message": {"role": "assistant", "content": "Use a bar chart."}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 5}
        });
        let groq_response: GroqResponse = serde_json::from_value(payload).unwrap();
        let generation = into_generation(groq_response, DEFAULT_MODEL, 42).unwrap();
        assert_eq!(generation.text, "Use a bar chart.");
        assert_eq!(generation.tokens_used.total(), 17);
        assert_eq!(generation.provider, "Groq/mixtral-8x7b-32768");
        assert_eq!(generation.latency_ms, 42);
    }

    #[test]
    fn test_response_without_choices_is_invalid() {
        let groq_response: GroqResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(
            into_generation(groq_response, DEFAULT_MODEL, 0),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_known_models_include_default() {
        assert!(KNOWN_MODELS.contains(&DEFAULT_MODEL));
    }
}

//! Reply generation against the Anthropic messages API.
//!
//! Three [`Generator`] implementations share one contract:
//!
//! - [`AnthropicClient`] calls the provider directly, walking an ordered list
//!   of model candidates.
//! - [`RelayClient`] posts to a relay's `/api/generate-response` route, which
//!   performs the same candidate walk server-side.
//! - [`MockGenerator`] builds a canned reply locally.
//!
//! Every failure comes back as a [`GenerationError`] with exactly one
//! [`ErrorKind`].

use crate::config::Settings;
use crate::error::{ErrorKind, GenerationError};
use crate::http_client::{HttpClient, HttpResponse, ReqwestHttpClient, TransportError};
use crate::request::{GenerationRequest, Tone};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const RELAY_ROUTE: &str = "/api/generate-response";

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

#[async_trait]
impl<T: Generator + ?Sized> Generator for Box<T> {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        (**self).generate(request).await
    }
}

/// Result of trying one model candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateOutcome {
    Success(String),
    /// The model is not available to this key; try the next one.
    ModelUnavailable,
    /// Any other failure; stops the walk.
    Failed(GenerationError),
}

/// Extracts `content[0].text` from a messages API success envelope.
fn extract_text(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("content")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .and_then(|item| item.get("text"))
        .and_then(|text| text.as_str())
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Classifies one provider response. Pure.
pub fn classify_response(response: &HttpResponse) -> CandidateOutcome {
    if response.is_success() {
        return match extract_text(&response.body) {
            Some(text) => CandidateOutcome::Success(text),
            None => CandidateOutcome::Failed(GenerationError::invalid_format()),
        };
    }

    let envelope: Value = serde_json::from_str(&response.body).unwrap_or(Value::Null);
    let error_type = envelope.pointer("/error/type").and_then(|t| t.as_str());
    let detail = envelope.pointer("/error/message").and_then(|m| m.as_str());

    // Only the provider's own envelope marks a model as missing. A bare 404
    // means the endpoint itself is wrong, which no other model will fix.
    if error_type == Some("not_found_error") {
        return CandidateOutcome::ModelUnavailable;
    }

    CandidateOutcome::Failed(GenerationError::from_status(response.status, detail))
}

/// Walks `candidates` in order. The first success wins; an unavailable model
/// advances; any other failure stops immediately.
pub async fn run_candidates<F, Fut>(
    candidates: &[String],
    mut try_candidate: F,
) -> Result<String, GenerationError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = CandidateOutcome>,
{
    for model in candidates {
        match try_candidate(model.clone()).await {
            CandidateOutcome::Success(text) => {
                info!("Successfully used model: {}", model);
                return Ok(text);
            }
            CandidateOutcome::ModelUnavailable => {
                warn!("Model {} not available, trying next...", model);
            }
            CandidateOutcome::Failed(err) => {
                error!("Generation failed with model {} ({}): {}", model, err.kind, err.message);
                return Err(err);
            }
        }
    }

    error!("All {} model candidates were unavailable", candidates.len());
    Err(GenerationError::no_compatible_model())
}

/// Races `call` against `timeout`. The losing future is dropped, which cancels
/// any request it still has in flight.
pub async fn with_timeout<Fut>(timeout: Duration, call: Fut) -> Result<String, GenerationError>
where
    Fut: Future<Output = Result<String, GenerationError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!("Generation timed out after {}ms", timeout.as_millis());
            Err(GenerationError::timeout())
        }
    }
}

fn transport_failure(err: TransportError) -> GenerationError {
    match err {
        TransportError::Connect(reason) => {
            warn!("Connection failed: {}", reason);
            GenerationError::network()
        }
        TransportError::Other(reason) => {
            warn!("Request failed: {}", reason);
            GenerationError::new(ErrorKind::Unknown, reason)
        }
    }
}

/// Direct client holding the credential locally.
pub struct AnthropicClient {
    settings: Settings,
    http: Box<dyn HttpClient>,
}

impl AnthropicClient {
    pub fn new(settings: Settings) -> Self {
        Self::with_http_client(settings, Box::new(ReqwestHttpClient::new()))
    }

    pub fn with_http_client(settings: Settings, http: Box<dyn HttpClient>) -> Self {
        Self { settings, http }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn request_body(&self, model: &str, prompt: &str) -> Value {
        json!({
            "model": model,
            "max_tokens": self.settings.max_tokens,
            "messages": [
                {
                    "role": "user",
                    "content": prompt
                }
            ]
        })
    }

    async fn try_candidate(&self, model: String, prompt: &str) -> CandidateOutcome {
        let body = self.request_body(&model, prompt);
        let headers = [
            ("x-api-key", self.settings.api_key.as_str()),
            ("content-type", "application/json"),
            ("anthropic-version", ANTHROPIC_VERSION),
        ];

        match self.http.post_json(&self.settings.api_url, &headers, &body).await {
            Ok(response) => classify_response(&response),
            Err(err) => CandidateOutcome::Failed(transport_failure(err)),
        }
    }
}

#[async_trait]
impl Generator for AnthropicClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        info!(
            "Generating {} reply to {} via Claude API",
            request.tone, request.sender_name
        );
        let prompt = request.prompt();
        let walk = run_candidates(&self.settings.models, |model| {
            self.try_candidate(model, &prompt)
        });
        with_timeout(self.settings.timeout, walk).await
    }
}

/// Client for a same-origin relay that keeps the credential server-side.
pub struct RelayClient {
    endpoint: String,
    timeout: Duration,
    http: Box<dyn HttpClient>,
}

impl RelayClient {
    /// `base_url` is the relay origin, e.g. `http://localhost:3001`.
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self::with_http_client(base_url, timeout, Box::new(ReqwestHttpClient::new()))
    }

    pub fn with_http_client(base_url: &str, timeout: Duration, http: Box<dyn HttpClient>) -> Self {
        Self {
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), RELAY_ROUTE),
            timeout,
            http,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = serde_json::to_value(request)
            .map_err(|e| GenerationError::new(ErrorKind::Unknown, e.to_string()))?;
        let response = self
            .http
            .post_json(&self.endpoint, &[("content-type", "application/json")], &body)
            .await
            .map_err(transport_failure)?;
        classify_relay_response(&response)
    }
}

/// Maps a relay reply back into the same result the direct client produces.
pub fn classify_relay_response(response: &HttpResponse) -> Result<String, GenerationError> {
    let value: Value = serde_json::from_str(&response.body).unwrap_or(Value::Null);

    if response.is_success() {
        return value
            .get("response")
            .and_then(|r| r.as_str())
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .ok_or_else(GenerationError::invalid_format);
    }

    let message = value.get("error").and_then(|e| e.as_str());
    let kind = value
        .get("kind")
        .and_then(|k| serde_json::from_value::<ErrorKind>(k.clone()).ok());

    let err = match (kind, message) {
        (Some(kind), Some(message)) => {
            GenerationError::new(kind, message).with_status(response.status)
        }
        (None, Some(message)) => {
            GenerationError::new(ErrorKind::from_status(response.status), message)
                .with_status(response.status)
        }
        (_, None) => GenerationError::from_status(response.status, None),
    };
    Err(err)
}

#[async_trait]
impl Generator for RelayClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        info!("Generating {} reply via relay at {}", request.tone, self.endpoint);
        with_timeout(self.timeout, self.call(request)).await
    }
}

/// Offline generator producing a deterministic reply from the request alone.
pub struct MockGenerator;

impl MockGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn mock_reply(&self, request: &GenerationRequest) -> String {
        let sender = &request.sender_name;
        let user = &request.user_name;
        let tone = request.tone;

        let greeting = match tone {
            Tone::Professional | Tone::Formal => format!("Dear {},", sender),
            Tone::Friendly => format!("Hi {}!", sender),
            Tone::Casual => format!("Hey {}!", sender),
        };

        let pick = |formal: &str, casual: &str, other: &str| -> String {
            match tone {
                Tone::Formal => formal.to_string(),
                Tone::Casual => casual.to_string(),
                _ => other.to_string(),
            }
        };

        let email = request.received_email.to_lowercase();
        let body = if email.contains("meeting") || email.contains("meet") || email.contains("schedule") {
            pick(
                "I am available to meet at your convenience. Please advise on a suitable time and date.",
                "I'm free to meet up! Just let me know when works for you.",
                "I would be happy to schedule a meeting. Please let me know your availability.",
            )
        } else if email.contains("question") || email.contains("help") || email.contains('?') {
            pick(
                "I shall endeavour to answer your inquiries in full. Please find my responses below.",
                "Happy to help! Here's what I think about your questions.",
                "I would be glad to help answer your questions. Let me address each point.",
            )
        } else if email.contains("thank") || email.contains("appreciate") {
            pick(
                "Your kind words are most appreciated. It has been my pleasure to assist you.",
                "No problem at all! Always happy to help out.",
                "You are very welcome. I am pleased I could be of assistance.",
            )
        } else if email.contains("project") || email.contains("work") {
            pick(
                "I have reviewed the project details and am prepared to proceed accordingly.",
                "I've checked out the project details and I'm ready to get started!",
                "I have reviewed the project information and am ready to move forward.",
            )
        } else {
            pick(
                "I acknowledge receipt of your correspondence and have considered the matters raised.",
                "Thanks for reaching out! I've looked over what you sent.",
                "Thank you for your email. I have reviewed the information you provided.",
            )
        };

        let closing_line = pick(
            "Should you require any additional information, please do not hesitate to contact me.",
            "Let me know if you need anything else!",
            "Please feel free to reach out if you have any questions.",
        );

        let sign_off = match tone {
            Tone::Professional => "Best regards",
            Tone::Friendly => "Best",
            Tone::Formal => "Yours sincerely",
            Tone::Casual => "Cheers",
        };

        let mut reply = format!("{}\n\n{}\n\n", greeting, body);
        if let Some(context) = &request.additional_context {
            reply.push_str(context);
            reply.push_str("\n\n");
        }
        reply.push_str(&format!("{}\n\n{},\n{}", closing_line, sign_off, user));
        reply
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        info!("Using mock generator (EMAIL_RESPONDER_USE_MOCK)");
        Ok(self.mock_reply(request))
    }
}

/// Picks the generator for the given settings: mock, relay, or direct.
pub fn build_generator(settings: &Settings, relay_url: Option<&str>) -> Box<dyn Generator> {
    if settings.use_mock {
        return Box::new(MockGenerator::new());
    }
    match relay_url {
        Some(url) => Box::new(RelayClient::new(url, settings.timeout)),
        None => Box::new(AnthropicClient::new(settings.clone())),
    }
}

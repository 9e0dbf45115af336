//! Boundary to the hosted text-generation service.
//!
//! Agents never talk to the model directly. They build a [`GenerationRequest`]
//! and hand it to a [`GenerationClient`], which bounds the call with a timeout
//! and turns every failure into the shared fallback text.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{ConfigError, ServiceError};
use crate::telemetry::TelemetrySink;

pub const FALLBACK_TEXT: &str = "I'm having trouble processing that right now.";

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub system_context: String,
    pub prompt: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

/// Per-agent persona and sampling settings.
#[derive(Debug, Clone, Copy)]
pub struct GenerationProfile {
    pub agent: &'static str,
    pub system_prompt: &'static str,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl GenerationProfile {
    pub fn request(&self, prompt: String) -> GenerationRequest {
        GenerationRequest {
            system_context: self.system_prompt.to_string(),
            prompt,
            max_output_tokens: self.max_output_tokens,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError>;
}

#[derive(Clone)]
pub struct GenerationClient {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
    telemetry: TelemetrySink,
}

impl GenerationClient {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self {
            generator,
            timeout,
            telemetry: TelemetrySink::disabled(),
        }
    }

    pub fn with_telemetry(mut self, telemetry: TelemetrySink) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub async fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError> {
        match tokio::time::timeout(self.timeout, self.generator.generate(request)).await {
            Ok(Ok(text)) if text.trim().is_empty() => Err(ServiceError::EmptyResponse),
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout {
                secs: self.timeout.as_secs(),
            }),
        }
    }

    /// Runs one generation step and never fails: any [`ServiceError`] is
    /// logged and replaced by [`FALLBACK_TEXT`].
    pub async fn generate_or_fallback(
        &self,
        profile: &GenerationProfile,
        step: &str,
        prompt: String,
    ) -> String {
        let request = profile.request(prompt);
        match self.generate(&request).await {
            Ok(text) => {
                tracing::debug!(agent = profile.agent, step, chars = text.len(), "generation ok");
                text
            }
            Err(err) => {
                tracing::warn!(agent = profile.agent, step, error = %err, "generation failed; using fallback text");
                self.telemetry.emit(
                    "generation.failed",
                    json!({
                        "agent": profile.agent,
                        "step": step,
                        "error": err.to_string(),
                    }),
                );
                FALLBACK_TEXT.to_string()
            }
        }
    }
}

/// OpenAI Chat Completions client.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for OpenAiGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiGenerator")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl OpenAiGenerator {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ConfigError::ClientBuild(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system_context,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            max_tokens: request.max_output_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed = response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(ServiceError::EmptyResponse)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use wiremock::matchers::{bearer_token, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PROFILE: GenerationProfile = GenerationProfile {
        agent: "test",
        system_prompt: "You are a test agent.",
        max_output_tokens: 100,
        temperature: 0.5,
    };

    struct SlowGenerator;

    #[async_trait]
    impl TextGenerator for SlowGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> Result<String, ServiceError> {
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok("too late".to_string())
        }
    }

    struct BlankGenerator;

    #[async_trait]
    impl TextGenerator for BlankGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> Result<String, ServiceError> {
            Ok("   ".to_string())
        }
    }

    #[tokio::test]
    async fn fallback_replaces_failed_generation() {
        let generator = Arc::new(ScriptedGenerator::new().fail_when("boom"));
        let client = scripted_client(generator.clone());

        let failed = client
            .generate_or_fallback(&PROFILE, "first", "boom please".to_string())
            .await;
        let ok = client
            .generate_or_fallback(&PROFILE, "second", "hello".to_string())
            .await;

        assert_eq!(failed, FALLBACK_TEXT);
        assert_eq!(ok, "reply-2");
        assert_eq!(generator.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_generation_times_out_into_fallback() {
        let client = GenerationClient::new(Arc::new(SlowGenerator), Duration::from_secs(5));

        let err = client
            .generate(&PROFILE.request("hi".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Timeout { secs: 5 }));

        let text = client
            .generate_or_fallback(&PROFILE, "slow", "hi".to_string())
            .await;
        assert_eq!(text, FALLBACK_TEXT);
    }

    #[tokio::test]
    async fn blank_output_counts_as_failure() {
        let client = GenerationClient::new(Arc::new(BlankGenerator), Duration::from_secs(5));
        let err = client
            .generate(&PROFILE.request("hi".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::EmptyResponse));
    }

    #[tokio::test]
    async fn openai_generator_sends_system_and_user_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(bearer_token("sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4o",
                "max_tokens": 100,
                "messages": [
                    {"role": "system", "content": "You are a test agent."},
                    {"role": "user", "content": "Say hello"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Hello!"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let generator = OpenAiGenerator::new("sk-test", "gpt-4o", server.uri()).unwrap();
        let text = generator
            .generate(&PROFILE.request("Say hello".to_string()))
            .await
            .unwrap();
        assert_eq!(text, "Hello!");
    }

    #[tokio::test]
    async fn openai_generator_maps_http_errors_and_null_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"model": "gpt-4o"})))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let generator = OpenAiGenerator::new("sk-test", "gpt-4o", server.uri()).unwrap();
        let err = generator
            .generate(&PROFILE.request("hi".to_string()))
            .await
            .unwrap_err();
        match err {
            ServiceError::Status { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "quota exceeded");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": null}}]
            })))
            .mount(&server)
            .await;
        let generator = OpenAiGenerator::new("sk-test", "gpt-4o", format!("{}/", server.uri()))
            .unwrap();
        let err = generator
            .generate(&PROFILE.request("hi".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::EmptyResponse));
    }
}

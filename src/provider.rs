use std::sync::Arc;

use anyhow::Result;
use serde_json::json;

use crate::config::RuntimeConfig;
use crate::error::ConfigError;
use crate::llm::{GenerationClient, OpenAiGenerator};
use crate::telemetry::TelemetrySink;

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

pub fn validate_model(model_name: &str) -> Result<(), ConfigError> {
    let name = model_name.trim();
    let is_valid = name.starts_with("gpt-")
        || name.starts_with("chatgpt-")
        || name.starts_with("o1")
        || name.starts_with("o3")
        || name.starts_with("o4");

    if is_valid {
        return Ok(());
    }
    Err(ConfigError::InvalidModel(model_name.to_string()))
}

pub fn resolve_api_key() -> Result<String, ConfigError> {
    api_key_from(std::env::var(API_KEY_ENV).ok())
}

fn api_key_from(value: Option<String>) -> Result<String, ConfigError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingCredential)
}

pub fn env_present(key: &str) -> bool {
    std::env::var(key)
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false)
}

/// Resolves the credential and model and builds the shared client every
/// agent generates through.
pub fn build_generation_client(
    cfg: &RuntimeConfig,
    telemetry: &TelemetrySink,
) -> Result<GenerationClient> {
    let api_key = resolve_api_key()?;
    validate_model(&cfg.model)?;
    let generator = OpenAiGenerator::new(api_key, cfg.model.clone(), cfg.api_base_url.clone())?;

    tracing::info!(model = %generator.model(), base_url = %cfg.api_base_url, "generation client ready");
    telemetry.emit(
        "model.resolved",
        json!({ "model": cfg.model, "timeout_secs": cfg.generation_timeout_secs }),
    );

    Ok(
        GenerationClient::new(Arc::new(generator), cfg.generation_timeout())
            .with_telemetry(telemetry.clone()),
    )
}

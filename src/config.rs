use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::agents::memory::DEFAULT_DATA_PATH;
use crate::agents::orchestrator::OrchestratorConfig;
use crate::cli::Cli;
use crate::llm::{DEFAULT_API_BASE_URL, DEFAULT_MODEL};

pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_TELEMETRY_PATH: &str = ".family-connect/telemetry/events.jsonl";

#[derive(Debug, Clone, Serialize)]
pub struct RuntimeConfig {
    pub profile: String,
    pub config_path: String,
    pub model: String,
    pub api_base_url: String,
    pub data_path: String,
    pub generation_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub analyze_matches: bool,
    pub telemetry_enabled: bool,
    pub telemetry_path: String,
}

impl RuntimeConfig {
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            data_path: PathBuf::from(&self.data_path),
            analyze_matches: self.analyze_matches,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilesFile {
    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    pub model: Option<String>,
    pub api_base_url: Option<String>,
    pub data_path: Option<String>,
    pub generation_timeout_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
    pub analyze_matches: Option<bool>,
    pub telemetry_enabled: Option<bool>,
    pub telemetry_path: Option<String>,
}

pub fn load_profiles(config_path: &str) -> Result<ProfilesFile> {
    let path = Path::new(config_path);
    if !path.exists() {
        return Ok(ProfilesFile::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read profile config file at '{}'", path.display()))?;
    toml::from_str::<ProfilesFile>(&content).with_context(|| {
        format!(
            "invalid profile configuration in '{}'. Check field names and value types.",
            path.display()
        )
    })
}

/// Flag or env var, then the selected profile, then the built-in default.
pub fn resolve_runtime_config(cli: &Cli, profiles: &ProfilesFile) -> Result<RuntimeConfig> {
    let selected = cli.profile.trim();
    if selected.is_empty() {
        return Err(anyhow::anyhow!(
            "profile name cannot be empty. Set --profile <name>."
        ));
    }

    let profile = if selected == "default" && !profiles.profiles.contains_key("default") {
        ProfileConfig::default()
    } else {
        profiles.profiles.get(selected).cloned().ok_or_else(|| {
            let mut names = profiles.profiles.keys().cloned().collect::<Vec<String>>();
            names.sort();
            if names.is_empty() {
                anyhow::anyhow!(
                    "profile '{}' not found in '{}'. No profiles are defined yet.",
                    selected,
                    cli.config_path
                )
            } else {
                anyhow::anyhow!(
                    "profile '{}' not found in '{}'. Available profiles: {}",
                    selected,
                    cli.config_path,
                    names.join(", ")
                )
            }
        })?
    };

    Ok(RuntimeConfig {
        profile: selected.to_string(),
        config_path: cli.config_path.clone(),
        model: cli
            .model
            .clone()
            .or(profile.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        api_base_url: cli
            .api_base_url
            .clone()
            .or(profile.api_base_url)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
        data_path: cli
            .data_path
            .clone()
            .or(profile.data_path)
            .unwrap_or_else(|| DEFAULT_DATA_PATH.to_string()),
        generation_timeout_secs: cli
            .generation_timeout_secs
            .or(profile.generation_timeout_secs)
            .unwrap_or(DEFAULT_GENERATION_TIMEOUT_SECS)
            .max(1),
        poll_interval_secs: cli
            .poll_interval_secs
            .or(profile.poll_interval_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS)
            .max(1),
        analyze_matches: cli
            .analyze_matches
            .or(profile.analyze_matches)
            .unwrap_or(true),
        telemetry_enabled: cli
            .telemetry_enabled
            .or(profile.telemetry_enabled)
            .unwrap_or(true),
        telemetry_path: cli
            .telemetry_path
            .clone()
            .or(profile.telemetry_path)
            .unwrap_or_else(|| DEFAULT_TELEMETRY_PATH.to_string()),
    })
}

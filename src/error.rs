use std::path::PathBuf;

/// Failure of a single call to the text-generation service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("generation request failed: {0}")]
    Transport(String),
    #[error("generation service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("generation service returned no text")]
    EmptyResponse,
    #[error("generation call timed out after {secs}s")]
    Timeout { secs: u64 },
    #[error("failed to decode generation response: {0}")]
    Decode(String),
}

/// The birthday data file could not be used. Always recoverable: the caller
/// proceeds with an empty event set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataUnavailable {
    #[error("birthday file not found at '{}'", path.display())]
    Missing { path: PathBuf },
    #[error("failed to read birthday file '{}': {reason}", path.display())]
    Unreadable { path: PathBuf, reason: String },
    #[error("invalid JSON in birthday file '{}': {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    #[error("no agent registered for role '{role}'")]
    UnregisteredRole { role: &'static str },
}

/// Startup problems that stop the process before the pipeline runs.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("OPENAI_API_KEY environment variable not set")]
    MissingCredential,
    #[error("model '{0}' is not a supported chat model")]
    InvalidModel(String),
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Config,
    Provider,
    Data,
    Server,
    Internal,
}

impl ErrorCategory {
    pub fn code(self) -> &'static str {
        match self {
            ErrorCategory::Config => "CONFIG",
            ErrorCategory::Provider => "PROVIDER",
            ErrorCategory::Data => "DATA",
            ErrorCategory::Server => "SERVER",
            ErrorCategory::Internal => "INTERNAL",
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            ErrorCategory::Config => {
                "Check --config-path/--profile and the field names in your profile file."
            }
            ErrorCategory::Provider => {
                "Set your OpenAI API key: export OPENAI_API_KEY='your-key-here'"
            }
            ErrorCategory::Data => {
                "Check --data-path points at a JSON file with 'birthdays' and 'events' arrays."
            }
            ErrorCategory::Server => "Check --host/--port and that the address is not in use.",
            ErrorCategory::Internal => {
                "Retry with RUST_LOG=debug. If it persists, capture logs and open an issue."
            }
        }
    }
}

pub fn categorize_error(err: &anyhow::Error) -> ErrorCategory {
    if let Some(config_err) = err.downcast_ref::<ConfigError>() {
        return match config_err {
            ConfigError::MissingCredential | ConfigError::InvalidModel(_) => {
                ErrorCategory::Provider
            }
            ConfigError::ClientBuild(_) => ErrorCategory::Internal,
        };
    }

    let msg = format!("{err:#}").to_ascii_lowercase();

    if msg.contains("profile") || msg.contains("config") || msg.contains("invalid date") {
        return ErrorCategory::Config;
    }

    if msg.contains("api_key") || msg.contains("model") {
        return ErrorCategory::Provider;
    }

    if msg.contains("birthday file") || msg.contains("data file") {
        return ErrorCategory::Data;
    }

    if msg.contains("bind") || msg.contains("server") {
        return ErrorCategory::Server;
    }

    ErrorCategory::Internal
}

pub fn format_cli_error(err: &anyhow::Error) -> String {
    let category = categorize_error(err);
    format!(
        "[{}] {}\nHint: {}",
        category.code(),
        redact_sensitive_text(&format!("{err:#}")),
        category.hint()
    )
}

/// Masks anything that looks like an OpenAI secret key. The prefix only
/// counts at the start of a token, so words like `risk-notes` pass through.
pub fn redact_sensitive_text(text: &str) -> String {
    const KEY_PREFIX: &str = "sk-";
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0usize;

    while let Some(offset) = text[cursor..].find(KEY_PREFIX) {
        let start = cursor + offset;
        out.push_str(&text[cursor..start]);

        let inside_word = text[..start]
            .chars()
            .next_back()
            .is_some_and(|ch| ch.is_alphanumeric() || ch == '_');
        if inside_word {
            out.push_str(KEY_PREFIX);
            cursor = start + KEY_PREFIX.len();
            continue;
        }

        let remainder = &text[start..];
        let end = remainder
            .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'))
            .unwrap_or(remainder.len());
        if end > KEY_PREFIX.len() {
            out.push_str("sk-[REDACTED]");
        } else {
            out.push_str(&remainder[..end]);
        }
        cursor = start + end;
    }

    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credential_maps_to_provider_category() {
        let err = anyhow::Error::new(ConfigError::MissingCredential);
        assert_eq!(categorize_error(&err), ErrorCategory::Provider);
        let rendered = format_cli_error(&err);
        assert!(rendered.starts_with("[PROVIDER] OPENAI_API_KEY"));
        assert!(rendered.contains("export OPENAI_API_KEY"));
    }

    #[test]
    fn profile_errors_map_to_config_category() {
        let err = anyhow::anyhow!("profile 'dev' not found in '.family-connect/config.toml'");
        assert_eq!(categorize_error(&err), ErrorCategory::Config);
    }

    #[test]
    fn redacts_secret_keys_but_keeps_bare_prefix() {
        let text = "auth failed for sk-abc123_XYZ (see sk-)";
        assert_eq!(
            redact_sensitive_text(text),
            "auth failed for sk-[REDACTED] (see sk-)"
        );
    }

    #[test]
    fn redaction_leaves_words_containing_the_key_prefix() {
        let text = "failed to read '/home/u/risk-notes/birthdays.json': disk-full";
        assert_eq!(redact_sensitive_text(text), text);

        assert_eq!(
            redact_sensitive_text("key=sk-abc123 at /tmp/task-sk-x"),
            "key=sk-[REDACTED] at /tmp/task-sk-[REDACTED]"
        );
    }
}

pub mod error;
pub mod event;
pub mod github;
pub mod notify;
pub mod validate;

use std::collections::HashMap;
use std::fs;

use crate::error::{NotifyError, Result};

/// Read-only view of the invoking GitHub Actions environment: the triggering
/// event, the repository, the action inputs and the GITHUB_TOKEN secret.
///
/// Built once per run from the process environment; tests construct it
/// directly so nothing here needs to mutate real process state.
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub event_name: String,
    pub payload: serde_json::Value,
    /// Repository full name, e.g. "acme/app" (GITHUB_REPOSITORY).
    pub repository: String,
    pub github_token: Option<String>,
    inputs: HashMap<String, String>,
}

impl ActionContext {
    /// Capture the context from the process environment. The event payload is
    /// read from the file GITHUB_EVENT_PATH points at.
    pub fn from_env() -> Result<Self> {
        let event_name = require_var("GITHUB_EVENT_NAME")?;
        let event_path = require_var("GITHUB_EVENT_PATH")?;
        let repository = require_var("GITHUB_REPOSITORY")?;

        let raw_payload = fs::read_to_string(&event_path)?;
        let payload = serde_json::from_str(&raw_payload).map_err(|e| {
            NotifyError::ContextError(format!(
                "failed to parse event payload at '{event_path}': {e}"
            ))
        })?;

        let github_token = std::env::var("GITHUB_TOKEN").ok();

        let mut inputs = HashMap::new();
        for name in [
            validate::INPUT_API_KEY,
            validate::INPUT_BASE_ENVIRONMENTS_MAPPING,
            validate::INPUT_HEAD_ENVIRONMENT_VARIABLES,
            validate::INPUT_CONCURRENCY_LIMIT,
            validate::INPUT_QAWOLF_BASE_URL,
        ] {
            if let Ok(value) = std::env::var(input_env_name(name)) {
                inputs.insert(name.to_string(), value);
            }
        }

        Ok(Self {
            event_name,
            payload,
            repository,
            github_token,
            inputs,
        })
    }

    /// Build a context from explicit values, for tests and local harnesses.
    pub fn new(
        event_name: impl Into<String>,
        payload: serde_json::Value,
        repository: impl Into<String>,
        github_token: Option<String>,
        inputs: HashMap<String, String>,
    ) -> Self {
        Self {
            event_name: event_name.into(),
            payload,
            repository: repository.into(),
            github_token,
            inputs,
        }
    }

    /// Raw value of a named action input; an unset input reads as empty,
    /// matching how the Actions runner surfaces inputs.
    pub fn input(&self, name: &str) -> &str {
        self.inputs.get(name).map(String::as_str).unwrap_or("")
    }
}

/// Environment variable the Actions runner uses for a named input.
fn input_env_name(name: &str) -> String {
    format!("INPUT_{}", name.to_uppercase().replace(' ', "_"))
}

fn require_var(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| NotifyError::ContextError(format!("{name} is not set")))
}

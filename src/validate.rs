//! Pure validators turning raw action inputs and secrets into typed values.
//!
//! Each validator is a plain function from raw string to `Result`; no I/O
//! happens here. The orchestrator wires them to the `ActionContext`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ActionContext;
use crate::error::{NotifyError, Result};

pub const INPUT_API_KEY: &str = "qawolf-api-key";
pub const INPUT_BASE_ENVIRONMENTS_MAPPING: &str = "base-environments-mapping";
pub const INPUT_HEAD_ENVIRONMENT_VARIABLES: &str = "head-environment-variables";
pub const INPUT_CONCURRENCY_LIMIT: &str = "concurrency-limit";
pub const INPUT_QAWOLF_BASE_URL: &str = "qawolf-base-url";

/// One rule mapping a base VCS branch to the environment it aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EnvironmentAliasRule {
    pub vcs_branch: String,
    pub environment_alias: String,
}

/// All action inputs after validation. Constructed once per run and never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct ValidatedInputs {
    pub api_key: String,
    pub base_environments_mapping: Vec<EnvironmentAliasRule>,
    pub head_environment_variables: BTreeMap<String, String>,
    pub concurrency_limit: Option<u32>,
    pub qawolf_base_url: Option<String>,
}

/// Validate every action input, short-circuiting on the first failure.
pub fn validate_inputs(context: &ActionContext) -> Result<ValidatedInputs> {
    let api_key = validate_api_key(context.input(INPUT_API_KEY))?;
    let base_environments_mapping =
        validate_environment_alias_mapping(context.input(INPUT_BASE_ENVIRONMENTS_MAPPING))?;
    let head_environment_variables =
        validate_environment_variables(context.input(INPUT_HEAD_ENVIRONMENT_VARIABLES))?;
    let concurrency_limit = validate_concurrency_limit(context.input(INPUT_CONCURRENCY_LIMIT))?;
    let qawolf_base_url = validate_base_url(context.input(INPUT_QAWOLF_BASE_URL));

    Ok(ValidatedInputs {
        api_key,
        base_environments_mapping,
        head_environment_variables,
        concurrency_limit,
        qawolf_base_url,
    })
}

/// The API key is mandatory and must be non-empty.
pub fn validate_api_key(raw: &str) -> Result<String> {
    let key = raw.trim();
    if key.is_empty() {
        return Err(NotifyError::MissingApiKey);
    }
    Ok(key.to_string())
}

/// An empty-after-trim base URL means "use the default endpoint", represented
/// as `None` rather than an empty string.
pub fn validate_base_url(raw: &str) -> Option<String> {
    let url = raw.trim();
    if url.is_empty() {
        None
    } else {
        Some(url.to_string())
    }
}

/// Mandatory JSON object of string keys to string values.
pub fn validate_environment_variables(raw: &str) -> Result<BTreeMap<String, String>> {
    if raw.is_empty() {
        return Err(NotifyError::InvalidEnvironmentVariables(
            "input is required and must be a JSON object of strings".to_string(),
        ));
    }
    serde_json::from_str(raw)
        .map_err(|e| NotifyError::InvalidEnvironmentVariables(e.to_string()))
}

/// Optional JSON array of alias rules; an empty input is an empty mapping.
pub fn validate_environment_alias_mapping(raw: &str) -> Result<Vec<EnvironmentAliasRule>> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw)
        .map_err(|e| NotifyError::InvalidEnvironmentAliasMapping(e.to_string()))
}

/// Optional concurrency limit. The literal token "Infinity" maps to the
/// numeric sentinel `0` (unlimited); an empty input is absent; anything else
/// must be a non-negative integer.
pub fn validate_concurrency_limit(raw: &str) -> Result<Option<u32>> {
    match raw {
        "" => Ok(None),
        "Infinity" => Ok(Some(0)),
        other => other.parse::<u32>().map(Some).map_err(|_| {
            NotifyError::InvalidConcurrencyLimit("input is not a valid number".to_string())
        }),
    }
}

/// The GITHUB_TOKEN secret is only required when the trigger is a
/// deployment_status event; for every other kind it is simply unused.
pub fn validate_auth_token(raw: Option<&str>, event_name: &str) -> Result<Option<String>> {
    let token = raw.map(str::trim).filter(|t| !t.is_empty());
    if event_name == "deployment_status" && token.is_none() {
        return Err(NotifyError::MissingAuthToken);
    }
    Ok(token.map(str::to_string))
}

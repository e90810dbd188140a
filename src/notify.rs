//! Outbound notification to the QA Wolf test-orchestration service.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::event::BuildNotification;
use crate::validate::{EnvironmentAliasRule, ValidatedInputs};

/// Default service endpoint, overridden by the `qawolf-base-url` input.
pub const DEFAULT_BASE_URL: &str = "https://app.qawolf.com";

const DEPLOY_SUCCESS_PATH: &str = "/api/webhooks/deploy_success";

/// The merged request body: canonical event data plus validated inputs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployNotification {
    #[serde(flatten)]
    pub build: BuildNotification,
    pub api_key: String,
    pub base_environments_mapping: Vec<EnvironmentAliasRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency_limit: Option<u32>,
    pub head_environment_variables: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qawolf_base_url: Option<String>,
}

impl DeployNotification {
    pub fn assemble(inputs: ValidatedInputs, build: BuildNotification) -> Self {
        Self {
            build,
            api_key: inputs.api_key,
            base_environments_mapping: inputs.base_environments_mapping,
            concurrency_limit: inputs.concurrency_limit,
            head_environment_variables: inputs.head_environment_variables,
            qawolf_base_url: inputs.qawolf_base_url,
        }
    }
}

/// Coarse outcome of the delivery call.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum DeployOutcome {
    Delivered,
    Aborted {
        #[serde(rename = "abortReason")]
        abort_reason: String,
    },
}

/// Thin delivery client. Retries, if any, are the service's concern.
pub struct QaWolfClient {
    http: reqwest::Client,
    base_url: String,
}

impl QaWolfClient {
    pub fn new(base_url: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Ok(Self { http, base_url })
    }

    pub async fn notify_build_deployed(
        &self,
        notification: &DeployNotification,
    ) -> Result<DeployOutcome> {
        let url = format!(
            "{}{DEPLOY_SUCCESS_PATH}",
            self.base_url.trim_end_matches('/')
        );
        let outcome = self
            .http
            .post(&url)
            .json(notification)
            .send()
            .await?
            .error_for_status()?
            .json::<DeployOutcome>()
            .await?;
        Ok(outcome)
    }
}

/// Deterministic preview-environment alias for a pull request: the
/// organization, repository and PR number joined and slugified. Pure, so the
/// same PR always keys the same environment.
pub fn environment_alias(
    organization: &str,
    repository_name: &str,
    pull_request_identifier: &str,
) -> String {
    let raw = format!("{organization}-{repository_name}-{pull_request_identifier}");
    let mut slug = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

use std::io;

/// Custom error type for qawolf_deploy_notify operations.
///
/// Every stage of the pipeline returns one of these instead of panicking;
/// `main` prints the message once and sets a non-zero exit code.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error(
        "This action requires to be run in a GitHub Workflow subscribing exclusively to \
         'pull_request', 'pull_request_target' or 'deployment_status' events. \
         For more info on pull_request events, see \
         https://docs.github.com/en/actions/using-workflows/events-that-trigger-workflows#pull_request. \
         For more info on pull_request_target events, see \
         https://docs.github.com/en/actions/using-workflows/events-that-trigger-workflows#pull_request_target. \
         For more info on deployment_status events, see \
         https://docs.github.com/en/actions/using-workflows/events-that-trigger-workflows#deployment_status"
    )]
    UnsupportedEvent,

    #[error(
        "This action should not be run when a pull request is closed. See \
         https://docs.github.com/en/webhooks/webhook-events-and-payloads?actionType=closed#pull_request"
    )]
    ClosedPullRequest,

    #[error("This action should not be run when a pull request is from a forked repository")]
    ForkedPullRequest,

    #[error("This action should only run if deployment_status is \"success\"")]
    NonSuccessDeployment,

    #[error("No pull requests found associated with the commit.")]
    NoAssociatedPullRequest,

    #[error("Input required and not supplied: qawolf-api-key")]
    MissingApiKey,

    #[error("Invalid 'head-environment-variables' input: {0}")]
    InvalidEnvironmentVariables(String),

    #[error("Invalid 'base-environments-mapping' input: {0}")]
    InvalidEnvironmentAliasMapping(String),

    #[error("Invalid 'concurrency-limit' input: {0}")]
    InvalidConcurrencyLimit(String),

    #[error(
        "Invalid 'GITHUB_TOKEN' secret. GITHUB_TOKEN is required if trigger is \"deployment_status\"."
    )]
    MissingAuthToken,

    #[error("Failed to notify QA Wolf of deployment with reason \"{0}\"")]
    DeliveryAborted(String),

    #[error("Malformed '{event_name}' event payload: {source}")]
    MalformedPayload {
        event_name: String,
        source: serde_json::Error,
    },

    #[error("GitHub context error: {0}")]
    ContextError(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

/// Helper type for Results that use NotifyError
pub type Result<T> = std::result::Result<T, NotifyError>;

use qawolf_deploy_notify::ActionContext;
use qawolf_deploy_notify::error::{NotifyError, Result};
use qawolf_deploy_notify::event::{TriggerEvent, extract_relevant_data};
use qawolf_deploy_notify::github::GithubApiClient;
use qawolf_deploy_notify::notify::{
    DeployNotification, DeployOutcome, QaWolfClient, environment_alias,
};
use qawolf_deploy_notify::validate::{validate_auth_token, validate_inputs};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        // Failure annotation the Actions runner picks up, plus a non-zero
        // exit so the workflow step fails.
        println!("::error::{e}. Aborting");
        std::process::exit(1);
    }
}

/// The whole pipeline, short-circuiting on the first failure:
/// secret → inputs → classification → extraction → delivery → outcome.
async fn run() -> Result<()> {
    let context = ActionContext::from_env()?;

    let github_token = validate_auth_token(context.github_token.as_deref(), &context.event_name)?;

    debug!("Validating input.");
    let inputs = validate_inputs(&context)?;

    let event = TriggerEvent::classify(&context.event_name, &context.payload)?;

    let lookup = GithubApiClient::new(github_token, context.repository.clone())?;
    let build = extract_relevant_data(&event, &lookup, environment_alias).await?;

    let client = QaWolfClient::new(inputs.qawolf_base_url.clone())?;
    let notification = DeployNotification::assemble(inputs, build);

    info!("Attempting to notify QA Wolf of deployment.");
    match client.notify_build_deployed(&notification).await? {
        DeployOutcome::Delivered => {
            info!("Successfully notified QA Wolf of deployment.");
            Ok(())
        }
        DeployOutcome::Aborted { abort_reason } => Err(NotifyError::DeliveryAborted(abort_reason)),
    }
}

//! Trigger-event classification and extraction into the canonical
//! build-deployed notification.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{NotifyError, Result};
use crate::github::{AssociatedPullRequest, CommitPullRequestLookup};

/// Repository identity as GitHub delivers it in webhook payloads.
#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    /// Full name of the repository, e.g. "acme/app".
    pub full_name: String,
}

/// Base side of a pull request (the branch the change targets).
#[derive(Debug, Clone, Deserialize)]
pub struct BaseBranch {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub repo: Repository,
}

/// Head side of a pull request (the proposed change).
#[derive(Debug, Clone, Deserialize)]
pub struct HeadBranch {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub base: BaseBranch,
    pub head: HeadBranch,
}

/// Payload of a `pull_request` or `pull_request_target` webhook event.
/// Only the fields this action consumes are modeled; serde ignores the rest.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    pub action: String,
    pub pull_request: PullRequest,
    pub repository: Repository,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Deployment {
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentStatus {
    pub state: String,
}

/// Payload of a `deployment_status` webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentStatusEvent {
    pub deployment: Deployment,
    pub deployment_status: DeploymentStatus,
    pub repository: Repository,
}

/// The supported trigger events, classified by workflow event name.
///
/// Anything outside this set is rejected at classification time, so the
/// per-variant handlers never see an event kind they don't understand.
#[derive(Debug, Clone)]
pub enum TriggerEvent {
    PullRequest(PullRequestEvent),
    PullRequestTarget(PullRequestEvent),
    DeploymentStatus(DeploymentStatusEvent),
}

impl TriggerEvent {
    /// Classify the workflow event name and deserialize its payload.
    pub fn classify(event_name: &str, payload: &serde_json::Value) -> Result<Self> {
        match event_name {
            "pull_request" => Ok(Self::PullRequest(parse_payload(event_name, payload)?)),
            "pull_request_target" => {
                Ok(Self::PullRequestTarget(parse_payload(event_name, payload)?))
            }
            "deployment_status" => {
                Ok(Self::DeploymentStatus(parse_payload(event_name, payload)?))
            }
            other => {
                warn!("Received unsupported event '{other}'");
                Err(NotifyError::UnsupportedEvent)
            }
        }
    }
}

fn parse_payload<T: DeserializeOwned>(event_name: &str, payload: &serde_json::Value) -> Result<T> {
    serde_json::from_value(payload.clone()).map_err(|source| NotifyError::MalformedPayload {
        event_name: event_name.to_string(),
        source,
    })
}

/// The canonical notification record. Either every field is populated or
/// extraction failed; there is no partially-valid state.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildNotification {
    pub base_vcs_branch: String,
    pub head_vcs_branch: String,
    pub head_vcs_commit_id: String,
    pub head_environment_name: String,
    pub head_environment_alias: String,
    pub head_vcs_commit_url: String,
    pub pull_or_merge_request_number: u64,
}

/// The pull-request fields the canonical mapping needs, independent of
/// whether they came from an event payload or the commit lookup.
struct PullRequestDetails<'a> {
    number: u64,
    title: &'a str,
    base_ref: &'a str,
    head_ref: &'a str,
    head_sha: &'a str,
}

/// Produce the canonical notification for a classified trigger event.
///
/// The lookup collaborator is only consulted on the deployment-status path;
/// `alias` derives the head environment alias from repository and PR identity.
pub async fn extract_relevant_data(
    event: &TriggerEvent,
    lookup: &dyn CommitPullRequestLookup,
    alias: impl Fn(&str, &str, &str) -> String,
) -> Result<BuildNotification> {
    match event {
        TriggerEvent::PullRequest(event) | TriggerEvent::PullRequestTarget(event) => {
            extract_from_pull_request(event, alias)
        }
        TriggerEvent::DeploymentStatus(event) => {
            extract_from_deployment(event, lookup, alias).await
        }
    }
}

/// Direct extraction for the pull-request event family.
pub fn extract_from_pull_request(
    event: &PullRequestEvent,
    alias: impl Fn(&str, &str, &str) -> String,
) -> Result<BuildNotification> {
    if event.action == "closed" {
        return Err(NotifyError::ClosedPullRequest);
    }

    // Cross-fork triggering is a security boundary: untrusted fork code must
    // not kick off an authenticated notification.
    if event.pull_request.base.repo.full_name != event.repository.full_name {
        return Err(NotifyError::ForkedPullRequest);
    }

    let pr = &event.pull_request;
    Ok(build_notification(
        &event.repository.full_name,
        PullRequestDetails {
            number: pr.number,
            title: &pr.title,
            base_ref: &pr.base.git_ref,
            head_ref: &pr.head.git_ref,
            head_sha: &pr.head.sha,
        },
        alias,
    ))
}

/// Extraction for the deployment-status event, resolving the deployed commit
/// back to its pull request through the lookup collaborator.
pub async fn extract_from_deployment(
    event: &DeploymentStatusEvent,
    lookup: &dyn CommitPullRequestLookup,
    alias: impl Fn(&str, &str, &str) -> String,
) -> Result<BuildNotification> {
    if event.deployment_status.state != "success" {
        return Err(NotifyError::NonSuccessDeployment);
    }

    let mut pull_requests = lookup
        .pull_requests_for_commit(&event.deployment.sha)
        .await?;

    // Most recently updated first. The sort is stable, so pull requests with
    // identical timestamps keep their lookup order and the first one wins.
    pull_requests.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    let Some(pull_request) = pull_requests.first() else {
        return Err(NotifyError::NoAssociatedPullRequest);
    };

    if pull_requests.len() > 1 {
        debug!(
            "More than one pull request associated with sha = {}. Using pull request with title \"{}\"",
            event.deployment.sha, pull_request.title
        );
    }

    Ok(build_notification(
        &event.repository.full_name,
        PullRequestDetails {
            number: pull_request.number,
            title: &pull_request.title,
            base_ref: &pull_request.base.git_ref,
            head_ref: &pull_request.head.git_ref,
            head_sha: &pull_request.head.sha,
        },
        alias,
    ))
}

/// Shared canonical field mapping for both extraction paths.
fn build_notification(
    repository_full_name: &str,
    pr: PullRequestDetails<'_>,
    alias: impl Fn(&str, &str, &str) -> String,
) -> BuildNotification {
    let (organization, repository_name) = repository_full_name
        .split_once('/')
        .unwrap_or(("", repository_full_name));

    let head_environment_alias = alias(organization, repository_name, &pr.number.to_string());

    BuildNotification {
        base_vcs_branch: pr.base_ref.to_string(),
        head_vcs_branch: pr.head_ref.to_string(),
        head_vcs_commit_id: pr.head_sha.to_string(),
        head_environment_name: format!("PR {} - {}", pr.number, pr.title),
        head_environment_alias,
        head_vcs_commit_url: format!(
            "https://github.com/{}/commit/{}",
            repository_full_name, pr.head_sha
        ),
        pull_or_merge_request_number: pr.number,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::environment_alias;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;

    struct StaticLookup(Vec<AssociatedPullRequest>);

    #[async_trait]
    impl CommitPullRequestLookup for StaticLookup {
        async fn pull_requests_for_commit(&self, _sha: &str) -> Result<Vec<AssociatedPullRequest>> {
            Ok(self.0.clone())
        }
    }

    fn pull_request_payload() -> serde_json::Value {
        json!({
            "action": "opened",
            "pull_request": {
                "number": 42,
                "title": "Add login",
                "base": {
                    "ref": "main",
                    "repo": { "full_name": "acme/app" }
                },
                "head": {
                    "ref": "feature",
                    "sha": "abc123"
                }
            },
            "repository": { "full_name": "acme/app" }
        })
    }

    fn associated_pr(
        number: u64,
        title: &str,
        updated_at: DateTime<Utc>,
    ) -> AssociatedPullRequest {
        serde_json::from_value(json!({
            "number": number,
            "title": title,
            "updated_at": updated_at.to_rfc3339(),
            "base": {
                "ref": "main",
                "repo": { "full_name": "acme/app" }
            },
            "head": {
                "ref": format!("feature-{number}"),
                "sha": format!("sha-{number}")
            }
        }))
        .unwrap()
    }

    fn deployment_payload(state: &str) -> serde_json::Value {
        json!({
            "deployment": { "sha": "abc123" },
            "deployment_status": { "state": state },
            "repository": { "full_name": "acme/app" }
        })
    }

    #[test]
    fn classify_rejects_unsupported_event_names() {
        let err = TriggerEvent::classify("push", &json!({})).unwrap_err();
        assert!(matches!(err, NotifyError::UnsupportedEvent));
    }

    #[test]
    fn classify_rejects_malformed_payload_for_supported_event() {
        let err = TriggerEvent::classify("pull_request", &json!({"action": "opened"})).unwrap_err();
        assert!(matches!(err, NotifyError::MalformedPayload { .. }));
    }

    #[test]
    fn classify_accepts_all_supported_event_names() {
        let pr = pull_request_payload();
        assert!(matches!(
            TriggerEvent::classify("pull_request", &pr).unwrap(),
            TriggerEvent::PullRequest(_)
        ));
        assert!(matches!(
            TriggerEvent::classify("pull_request_target", &pr).unwrap(),
            TriggerEvent::PullRequestTarget(_)
        ));
        assert!(matches!(
            TriggerEvent::classify("deployment_status", &deployment_payload("success")).unwrap(),
            TriggerEvent::DeploymentStatus(_)
        ));
    }

    #[test]
    fn closed_pull_request_is_rejected_regardless_of_other_fields() {
        let mut payload = pull_request_payload();
        payload["action"] = json!("closed");
        let event: PullRequestEvent = serde_json::from_value(payload).unwrap();
        let err = extract_from_pull_request(&event, environment_alias).unwrap_err();
        assert!(matches!(err, NotifyError::ClosedPullRequest));
    }

    #[test]
    fn forked_pull_request_is_rejected() {
        let mut payload = pull_request_payload();
        payload["pull_request"]["base"]["repo"]["full_name"] = json!("fork/app");
        let event: PullRequestEvent = serde_json::from_value(payload).unwrap();
        let err = extract_from_pull_request(&event, environment_alias).unwrap_err();
        assert!(matches!(err, NotifyError::ForkedPullRequest));
    }

    #[test]
    fn pull_request_event_maps_every_canonical_field() {
        let event: PullRequestEvent = serde_json::from_value(pull_request_payload()).unwrap();
        let notification = extract_from_pull_request(&event, environment_alias).unwrap();
        assert_eq!(
            notification,
            BuildNotification {
                base_vcs_branch: "main".to_string(),
                head_vcs_branch: "feature".to_string(),
                head_vcs_commit_id: "abc123".to_string(),
                head_environment_name: "PR 42 - Add login".to_string(),
                head_environment_alias: environment_alias("acme", "app", "42"),
                head_vcs_commit_url: "https://github.com/acme/app/commit/abc123".to_string(),
                pull_or_merge_request_number: 42,
            }
        );
    }

    #[test]
    fn extraction_is_idempotent_on_the_same_payload() {
        let event: PullRequestEvent = serde_json::from_value(pull_request_payload()).unwrap();
        let first = extract_from_pull_request(&event, environment_alias).unwrap();
        let second = extract_from_pull_request(&event, environment_alias).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn non_success_deployment_is_rejected() {
        let event: DeploymentStatusEvent =
            serde_json::from_value(deployment_payload("failure")).unwrap();
        let lookup = StaticLookup(vec![]);
        let err = extract_from_deployment(&event, &lookup, environment_alias)
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::NonSuccessDeployment));
    }

    #[tokio::test]
    async fn deployment_with_no_associated_pull_request_fails() {
        let event: DeploymentStatusEvent =
            serde_json::from_value(deployment_payload("success")).unwrap();
        let lookup = StaticLookup(vec![]);
        let err = extract_from_deployment(&event, &lookup, environment_alias)
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::NoAssociatedPullRequest));
    }

    #[tokio::test]
    async fn deployment_selects_most_recently_updated_pull_request() {
        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let t3 = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
        let lookup = StaticLookup(vec![
            associated_pr(1, "oldest", t1),
            associated_pr(3, "newest", t3),
            associated_pr(2, "middle", t2),
        ]);
        let event: DeploymentStatusEvent =
            serde_json::from_value(deployment_payload("success")).unwrap();
        let notification = extract_from_deployment(&event, &lookup, environment_alias)
            .await
            .unwrap();
        assert_eq!(notification.pull_or_merge_request_number, 3);
        assert_eq!(notification.head_environment_name, "PR 3 - newest");
    }

    #[tokio::test]
    async fn deployment_tie_break_keeps_first_returned_pull_request() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let lookup = StaticLookup(vec![
            associated_pr(7, "first", t),
            associated_pr(8, "second", t),
        ]);
        let event: DeploymentStatusEvent =
            serde_json::from_value(deployment_payload("success")).unwrap();
        let notification = extract_from_deployment(&event, &lookup, environment_alias)
            .await
            .unwrap();
        assert_eq!(notification.pull_or_merge_request_number, 7);
    }

    #[tokio::test]
    async fn deployment_head_fields_come_from_the_selected_pull_request() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let lookup = StaticLookup(vec![associated_pr(5, "deployed", t)]);
        let event: DeploymentStatusEvent =
            serde_json::from_value(deployment_payload("success")).unwrap();
        let notification = extract_from_deployment(&event, &lookup, environment_alias)
            .await
            .unwrap();
        assert_eq!(notification.head_vcs_branch, "feature-5");
        assert_eq!(notification.head_vcs_commit_id, "sha-5");
        assert_eq!(
            notification.head_vcs_commit_url,
            "https://github.com/acme/app/commit/sha-5"
        );
    }
}

//! Inbound pull request notifications
//!
//! Webhook bodies are deserialized into explicit records and validated here,
//! before anything enters the pipeline. Signature verification happens
//! upstream of this module.

use serde::{Deserialize, Serialize};

use super::request::{ContextMetadata, ReviewRequest, TargetId};

/// Pull request actions that warrant a review
const REVIEWABLE_ACTIONS: &[&str] = &["opened", "synchronize", "reopened", "ready_for_review"];

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventUser {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventRef {
    #[serde(rename = "ref")]
    pub ref_field: String,
    #[serde(default)]
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventPullRequest {
    #[serde(default)]
    pub title: String,
    pub user: Option<EventUser>,
    pub head: EventRef,
    pub base: EventRef,
    #[serde(default)]
    pub draft: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventRepository {
    pub full_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventInstallation {
    pub id: u64,
}

/// `pull_request` webhook body, restricted to the fields the pipeline uses
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PullRequestEvent {
    pub action: String,
    pub number: u64,
    pub pull_request: EventPullRequest,
    pub repository: EventRepository,
    pub installation: Option<EventInstallation>,
}

/// A delivered event plus its delivery id
#[derive(Debug, Clone)]
pub struct ReviewNotification {
    pub delivery_id: String,
    pub event: PullRequestEvent,
}

/// Outcome of boundary validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationDecision {
    /// Event should be reviewed
    Accept(ReviewRequest),
    /// Event is valid but needs no review
    Ignore(String),
}

impl ReviewNotification {
    /// Create a notification from a delivery id and a parsed event
    pub fn new(delivery_id: impl Into<String>, event: PullRequestEvent) -> Self {
        Self {
            delivery_id: delivery_id.into(),
            event,
        }
    }

    /// Parse a raw webhook body
    pub fn from_json(delivery_id: impl Into<String>, body: &str) -> crate::Result<Self> {
        let event: PullRequestEvent = serde_json::from_str(body)?;
        Ok(Self::new(delivery_id, event))
    }

    /// Validate the event and turn it into a review request
    pub fn validate(self) -> NotificationDecision {
        let event = self.event;

        if !REVIEWABLE_ACTIONS.contains(&event.action.as_str()) {
            return NotificationDecision::Ignore(format!(
                "action '{}' is not reviewed",
                event.action
            ));
        }

        if event.pull_request.draft {
            return NotificationDecision::Ignore("pull request is a draft".to_string());
        }

        let revision = event.pull_request.head.sha.trim();
        if revision.is_empty() {
            return NotificationDecision::Ignore("event carries no head revision".to_string());
        }

        let Some((owner, repo)) = split_full_name(&event.repository.full_name) else {
            return NotificationDecision::Ignore(format!(
                "malformed repository name '{}'",
                event.repository.full_name
            ));
        };

        let tenant_id = event
            .installation
            .as_ref()
            .map(|i| i.id.to_string())
            .unwrap_or_else(|| owner.to_string());

        let metadata = ContextMetadata {
            title: event.pull_request.title.clone(),
            author: event
                .pull_request
                .user
                .as_ref()
                .map(|u| u.login.clone())
                .unwrap_or_default(),
            base_branch: event.pull_request.base.ref_field.clone(),
            head_branch: event.pull_request.head.ref_field.clone(),
        };

        let request = ReviewRequest::new(
            tenant_id,
            TargetId::new(owner, repo, event.number),
            revision,
            self.delivery_id,
        )
        .with_metadata(metadata);

        NotificationDecision::Accept(request)
    }
}

fn split_full_name(full_name: &str) -> Option<(&str, &str)> {
    let (owner, repo) = full_name.split_once('/')?;
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some((owner, repo))
}

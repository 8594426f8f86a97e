//! Merge-request webhook intake.
//!
//! Each accepted delivery spawns an evaluation task and returns 202
//! immediately; GitLab retries slow webhook endpoints, so the decision is
//! applied asynchronously through the review actions.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};

use mergeguard_core::{Decision, Engine, MergeRequest, ReviewActions, RuleEvaluation};

use crate::error::AppError;
use crate::routes::AppState;

/// Actions that warrant (re-)evaluation. Everything else — close, merge,
/// approval events — is acknowledged and ignored.
const EVALUATED_ACTIONS: &[&str] = &["open", "reopen", "update"];

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub object_kind: String,
    pub project: ProjectInfo,
    pub object_attributes: ObjectAttributes,
    #[serde(default)]
    pub user: Option<UserInfo>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectInfo {
    pub id: u64,
}

#[derive(Debug, Deserialize)]
pub struct ObjectAttributes {
    pub iid: u64,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub source_branch: String,
    #[serde(default)]
    pub target_branch: String,
}

#[derive(Debug, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
}

/// POST /webhook — verify the shared secret, filter the event, spawn the
/// evaluation.
pub async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(event): Json<WebhookEvent>,
) -> Result<(StatusCode, Json<WebhookResponse>), AppError> {
    verify_token(&state, &headers)?;

    if event.object_kind != "merge_request" {
        return Ok((StatusCode::OK, Json(WebhookResponse { status: "ignored" })));
    }
    if !EVALUATED_ACTIONS.contains(&event.object_attributes.action.as_str()) {
        return Ok((StatusCode::OK, Json(WebhookResponse { status: "ignored" })));
    }
    if !state.rules.enabled {
        tracing::info!("rule engine disabled; ignoring webhook");
        return Ok((StatusCode::OK, Json(WebhookResponse { status: "disabled" })));
    }

    let mr = MergeRequest {
        project: event.project.id,
        iid: event.object_attributes.iid,
        title: Some(event.object_attributes.title),
        author: event.user.map(|u| u.username),
        source_branch: Some(event.object_attributes.source_branch),
        target_branch: Some(event.object_attributes.target_branch),
    };

    tokio::spawn(evaluate_and_apply(state, mr));
    Ok((
        StatusCode::ACCEPTED,
        Json(WebhookResponse { status: "accepted" }),
    ))
}

fn verify_token(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    if state.config.webhook_secret.is_empty() {
        return Ok(());
    }
    let provided = headers
        .get("X-Gitlab-Token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if provided == state.config.webhook_secret {
        Ok(())
    } else {
        Err(AppError::Unauthorized("invalid webhook token".into()))
    }
}

async fn evaluate_and_apply(state: Arc<AppState>, mr: MergeRequest) {
    let engine = match Engine::new(&state.rules, &state.registry, &state.client) {
        Ok(engine) => engine,
        Err(err) => {
            tracing::error!(error = %err, "refusing evaluation: configuration invalid");
            return;
        }
    };

    let deadline = tokio::time::Instant::now() + state.config.eval_timeout;
    let evaluation = engine.evaluate(&mr, Some(deadline)).await;

    tracing::info!(
        project = mr.project,
        mr = mr.iid,
        decision = %evaluation.decision,
        approved = evaluation.approved_files,
        reviewed = evaluation.reviewed_files,
        duration_ms = evaluation.duration_ms,
        "merge request evaluated"
    );

    if state.config.dry_run {
        tracing::info!(project = mr.project, mr = mr.iid, "dry run: not applying decision");
        return;
    }

    match evaluation.decision {
        Decision::Approve => {
            if let Err(err) = state.client.approve(mr.project, mr.iid).await {
                tracing::error!(error = %err, "failed to approve merge request");
            }
        }
        Decision::ManualReview => {
            if let Err(err) = state.client.reset_approval(mr.project, mr.iid).await {
                tracing::error!(error = %err, "failed to reset approval");
            }
            let comment = format_review_comment(&evaluation);
            if let Err(err) = state.client.post_comment(mr.project, mr.iid, &comment).await {
                tracing::error!(error = %err, "failed to post review comment");
            }
        }
    }
}

/// Reviewer-facing summary. Per-file reasons only; internals stay in logs.
fn format_review_comment(evaluation: &RuleEvaluation) -> String {
    let mut comment = String::from(
        ":no_entry: This merge request needs manual review before it can be approved.\n",
    );
    if evaluation.files.is_empty() {
        comment.push_str(&format!("\n- {}\n", evaluation.reason));
        return comment;
    }
    for file in &evaluation.files {
        if !file.decision.is_approve() {
            comment.push_str(&format!("\n- `{}`: {}", file.path, file.reason));
        }
    }
    comment.push('\n');
    comment
}

//! Candidate and mentor applications.

use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use mentorlink_postgrest::{rows, SortOrder};

use crate::client::Backend;
use crate::error::{AppError, Result};
use crate::models::{
    OnboardingKind, OnboardingRequest, OnboardingStatus, RoleAssignment, USER_ROLES,
};

fn tagged(mut request: OnboardingRequest, kind: OnboardingKind) -> OnboardingRequest {
    request.kind = Some(kind);
    request
}

/// Files a pending application for the signed-in user.
pub async fn submit(backend: &Backend, kind: OnboardingKind, data: Value) -> Result<OnboardingRequest> {
    let user_id = backend.current_user_id()?;
    let stored = backend
        .from(kind.table())?
        .insert(&json!({
            "user_id": user_id,
            "data": data,
            "status": OnboardingStatus::Pending,
        }))
        .await?;

    let request = rows::<OnboardingRequest>(stored)?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound("inserted onboarding request".to_string()))?;
    info!(%user_id, kind = ?kind, request_id = %request.id, "onboarding request submitted");
    Ok(tagged(request, kind))
}

/// The newest request of `user_id` across both onboarding tables.
pub async fn latest_for_user(backend: &Backend, user_id: Uuid) -> Result<Option<OnboardingRequest>> {
    latest_across(backend, user_id, false).await
}

pub(crate) async fn latest_across(
    backend: &Backend,
    user_id: Uuid,
    privileged: bool,
) -> Result<Option<OnboardingRequest>> {
    let mut latest: Option<OnboardingRequest> = None;
    for kind in OnboardingKind::ALL {
        let table = if privileged {
            backend.privileged_from(kind.table())?
        } else {
            backend.from(kind.table())?
        };
        let row: Option<OnboardingRequest> = table
            .select("*")
            .eq("user_id", &user_id.to_string())
            .order("created_at", SortOrder::Descending)
            .execute_one()
            .await?;
        if let Some(row) = row {
            if latest.as_ref().map_or(true, |l| row.created_at > l.created_at) {
                latest = Some(tagged(row, kind));
            }
        }
    }
    Ok(latest)
}

/// Requests of one kind, newest first, optionally narrowed to one status.
pub async fn list(
    backend: &Backend,
    kind: OnboardingKind,
    status: Option<OnboardingStatus>,
) -> Result<Vec<OnboardingRequest>> {
    let mut query = backend
        .privileged_from(kind.table())?
        .select("*")
        .order("created_at", SortOrder::Descending);
    if let Some(status) = status {
        query = query.eq("status", status.as_str());
    }
    let requests: Vec<OnboardingRequest> = query.execute().await?;
    Ok(requests.into_iter().map(|r| tagged(r, kind)).collect())
}

async fn review(
    backend: &Backend,
    kind: OnboardingKind,
    id: Uuid,
    status: OnboardingStatus,
    notes: Option<&str>,
) -> Result<OnboardingRequest> {
    let table = backend.privileged_from(kind.table())?;
    let current: OnboardingRequest = table
        .clone()
        .select("*")
        .eq("id", &id.to_string())
        .execute_one()
        .await?
        .ok_or_else(|| AppError::NotFound(format!("onboarding request {}", id)))?;

    if current.status != OnboardingStatus::Pending {
        return Err(AppError::InvalidTransition {
            from: current.status.as_str().to_string(),
            to: status.as_str().to_string(),
        });
    }

    let mut changes = json!({ "status": status, "reviewed_at": Utc::now() });
    if let Some(notes) = notes {
        changes["admin_notes"] = json!(notes);
    }
    let updated = table.eq("id", &id.to_string()).update(&changes).await?;

    let request = rows::<OnboardingRequest>(updated)?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound(format!("onboarding request {}", id)))?;
    Ok(tagged(request, kind))
}

/// Approves a pending request and grants the matching role.
pub async fn approve(
    backend: &Backend,
    kind: OnboardingKind,
    id: Uuid,
    notes: Option<&str>,
) -> Result<OnboardingRequest> {
    let request = review(backend, kind, id, OnboardingStatus::Approved, notes).await?;

    let role = kind.role();
    let roles = backend.privileged_from(USER_ROLES)?;
    let held: Option<RoleAssignment> = roles
        .clone()
        .select("*")
        .eq("user_id", &request.user_id.to_string())
        .eq("role", role.as_str())
        .execute_one()
        .await?;
    if held.is_none() {
        roles
            .insert(&json!({ "user_id": request.user_id, "role": role }))
            .await?;
    }

    info!(user_id = %request.user_id, %role, request_id = %id, "onboarding request approved");
    Ok(request)
}

pub async fn reject(
    backend: &Backend,
    kind: OnboardingKind,
    id: Uuid,
    notes: Option<&str>,
) -> Result<OnboardingRequest> {
    let request = review(backend, kind, id, OnboardingStatus::Rejected, notes).await?;
    info!(user_id = %request.user_id, request_id = %id, "onboarding request rejected");
    Ok(request)
}

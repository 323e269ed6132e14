//! Mentorship requests between candidates and mentors.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use mentorlink_postgrest::{rows, SortOrder};

use crate::client::Backend;
use crate::error::{AppError, Result};
use crate::models::{MentorshipRequest, MentorshipStatus, MENTORSHIP_REQUESTS};

/// Status filter of the request tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(MentorshipStatus),
}

impl StatusFilter {
    pub fn matches(&self, status: MentorshipStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => *wanted == status,
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFilter::All => f.write_str("all"),
            StatusFilter::Only(status) => f.write_str(status.as_str()),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(StatusFilter::All);
        }
        s.parse().map(StatusFilter::Only)
    }
}

pub fn filter_requests(requests: Vec<MentorshipRequest>, filter: StatusFilter) -> Vec<MentorshipRequest> {
    requests
        .into_iter()
        .filter(|r| filter.matches(r.status))
        .collect()
}

/// Sends a request from the signed-in candidate to `mentor_id`.
pub async fn send_request(backend: &Backend, mentor_id: Uuid, message: &str) -> Result<MentorshipRequest> {
    let candidate_id = backend.current_user_id()?;
    let message = message.trim();
    if message.is_empty() {
        return Err(AppError::Validation("Message is required".to_string()));
    }
    if candidate_id == mentor_id {
        return Err(AppError::Validation(
            "You cannot send a mentorship request to yourself".to_string(),
        ));
    }

    let stored = backend
        .from(MENTORSHIP_REQUESTS)?
        .insert(&json!({
            "candidate_id": candidate_id,
            "mentor_id": mentor_id,
            "message": message,
            "status": MentorshipStatus::Pending,
        }))
        .await?;

    let request = rows::<MentorshipRequest>(stored)?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound("inserted mentorship request".to_string()))?;
    info!(%candidate_id, %mentor_id, request_id = %request.id, "mentorship request sent");
    Ok(request)
}

async fn list_by(backend: &Backend, column: &str, user_id: Uuid) -> Result<Vec<MentorshipRequest>> {
    Ok(backend
        .from(MENTORSHIP_REQUESTS)?
        .select("*")
        .eq(column, &user_id.to_string())
        .order("created_at", SortOrder::Descending)
        .execute()
        .await?)
}

pub async fn list_for_candidate(backend: &Backend, candidate_id: Uuid) -> Result<Vec<MentorshipRequest>> {
    list_by(backend, "candidate_id", candidate_id).await
}

pub async fn list_for_mentor(backend: &Backend, mentor_id: Uuid) -> Result<Vec<MentorshipRequest>> {
    list_by(backend, "mentor_id", mentor_id).await
}

/// Every request on the platform, for admin dashboards.
pub async fn list_all(backend: &Backend) -> Result<Vec<MentorshipRequest>> {
    Ok(backend
        .privileged_from(MENTORSHIP_REQUESTS)?
        .select("*")
        .order("created_at", SortOrder::Descending)
        .execute()
        .await?)
}

async fn transition(backend: &Backend, id: Uuid, to: MentorshipStatus) -> Result<MentorshipRequest> {
    let table = backend.from(MENTORSHIP_REQUESTS)?;
    let current: MentorshipRequest = table
        .clone()
        .select("*")
        .eq("id", &id.to_string())
        .execute_one()
        .await?
        .ok_or_else(|| AppError::NotFound(format!("mentorship request {}", id)))?;

    if current.status != MentorshipStatus::Pending {
        return Err(AppError::InvalidTransition {
            from: current.status.to_string(),
            to: to.to_string(),
        });
    }

    let updated = table
        .eq("id", &id.to_string())
        .update(&json!({ "status": to, "updated_at": Utc::now() }))
        .await?;

    let request = rows::<MentorshipRequest>(updated)?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound(format!("mentorship request {}", id)))?;
    info!(request_id = %id, status = %to, "mentorship request updated");
    Ok(request)
}

pub async fn accept(backend: &Backend, id: Uuid) -> Result<MentorshipRequest> {
    transition(backend, id, MentorshipStatus::Accepted).await
}

pub async fn reject(backend: &Backend, id: Uuid) -> Result<MentorshipRequest> {
    transition(backend, id, MentorshipStatus::Rejected).await
}

pub async fn cancel(backend: &Backend, id: Uuid) -> Result<MentorshipRequest> {
    transition(backend, id, MentorshipStatus::Cancelled).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(status: MentorshipStatus) -> MentorshipRequest {
        MentorshipRequest {
            id: Uuid::new_v4(),
            candidate_id: Uuid::new_v4(),
            mentor_id: Uuid::new_v4(),
            message: Some("hi".to_string()),
            status,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn sample() -> Vec<MentorshipRequest> {
        vec![
            request(MentorshipStatus::Pending),
            request(MentorshipStatus::Accepted),
            request(MentorshipStatus::Pending),
            request(MentorshipStatus::Rejected),
            request(MentorshipStatus::Cancelled),
        ]
    }

    #[test]
    fn all_is_identity() {
        let rows = sample();
        assert_eq!(filter_requests(rows.clone(), StatusFilter::All), rows);
    }

    #[test]
    fn each_status_keeps_only_its_rows() {
        let rows = sample();
        for status in MentorshipStatus::ALL {
            let kept = filter_requests(rows.clone(), StatusFilter::Only(status));
            assert!(kept.iter().all(|r| r.status == status));
            assert_eq!(kept.len(), rows.iter().filter(|r| r.status == status).count());
        }
    }

    #[test]
    fn filter_parses() {
        assert_eq!("all".parse::<StatusFilter>().unwrap(), StatusFilter::All);
        assert_eq!(
            "Accepted".parse::<StatusFilter>().unwrap(),
            StatusFilter::Only(MentorshipStatus::Accepted)
        );
        assert!("archived".parse::<StatusFilter>().is_err());
        assert_eq!(StatusFilter::Only(MentorshipStatus::Pending).to_string(), "pending");
    }
}

//! Rows of the backend tables the application reads and writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;

pub const PROFILES: &str = "profiles";
pub const USER_ROLES: &str = "user_roles";
pub const MENTORSHIP_REQUESTS: &str = "mentorship_requests";
pub const CANDIDATE_ONBOARDING_REQUESTS: &str = "candidate_onboarding_requests";
pub const MENTOR_ONBOARDING_REQUESTS: &str = "mentor_onboarding_requests";
pub const LEARNING_PROGRESS: &str = "learning_progress";
pub const LEARNING_ROADMAPS: &str = "learning_roadmaps";

/// Role granted through a `user_roles` row.
///
/// Variants are declared in ascending precedence, so `Ord` picks the
/// primary role of a user holding several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Candidate,
    Mentor,
    Admin,
    SuperAdmin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Candidate, Role::Mentor, Role::Admin, Role::SuperAdmin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Candidate => "candidate",
            Role::Mentor => "mentor",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Candidate => "Candidate",
            Role::Mentor => "Mentor",
            Role::Admin => "Admin",
            Role::SuperAdmin => "Super Admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }

    /// Whether holding `self` satisfies a requirement for `required`.
    pub fn satisfies(&self, required: Role) -> bool {
        *self == required || (*self == Role::SuperAdmin && required == Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "candidate" => Ok(Role::Candidate),
            "mentor" => Ok(Role::Mentor),
            "admin" => Ok(Role::Admin),
            "super_admin" | "superadmin" => Ok(Role::SuperAdmin),
            other => Err(AppError::Validation(format!("unknown role: {}", other))),
        }
    }
}

/// `profiles` row, one per account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// `user_roles` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleAssignment {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub user_id: Uuid,
    pub role: Role,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Which onboarding table a request lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingKind {
    Candidate,
    Mentor,
}

impl OnboardingKind {
    pub const ALL: [OnboardingKind; 2] = [OnboardingKind::Candidate, OnboardingKind::Mentor];

    pub fn table(&self) -> &'static str {
        match self {
            OnboardingKind::Candidate => CANDIDATE_ONBOARDING_REQUESTS,
            OnboardingKind::Mentor => MENTOR_ONBOARDING_REQUESTS,
        }
    }

    /// The role granted when a request of this kind is approved.
    pub fn role(&self) -> Role {
        match self {
            OnboardingKind::Candidate => Role::Candidate,
            OnboardingKind::Mentor => Role::Mentor,
        }
    }
}

impl FromStr for OnboardingKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "candidate" => Ok(OnboardingKind::Candidate),
            "mentor" => Ok(OnboardingKind::Mentor),
            other => Err(AppError::Validation(format!("unknown onboarding kind: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStatus {
    Pending,
    Approved,
    Rejected,
}

impl OnboardingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnboardingStatus::Pending => "pending",
            OnboardingStatus::Approved => "approved",
            OnboardingStatus::Rejected => "rejected",
        }
    }
}

/// Row of either onboarding table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnboardingRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub data: Value,
    pub status: OnboardingStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub admin_notes: Option<String>,
    /// Not a column; filled in from the table the row was read from.
    #[serde(skip)]
    pub kind: Option<OnboardingKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentorshipStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

impl MentorshipStatus {
    pub const ALL: [MentorshipStatus; 4] = [
        MentorshipStatus::Pending,
        MentorshipStatus::Accepted,
        MentorshipStatus::Rejected,
        MentorshipStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MentorshipStatus::Pending => "pending",
            MentorshipStatus::Accepted => "accepted",
            MentorshipStatus::Rejected => "rejected",
            MentorshipStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for MentorshipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MentorshipStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MentorshipStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::Validation(format!("unknown status: {}", s)))
    }
}

/// `mentorship_requests` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentorshipRequest {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub mentor_id: Uuid,
    #[serde(default)]
    pub message: Option<String>,
    pub status: MentorshipStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// `learning_progress` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningProgress {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub user_id: Uuid,
    pub skill_name: String,
    pub progress_percentage: u8,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// `learning_roadmaps` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningRoadmap {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_round_trips_through_its_column_value() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
            assert_eq!(serde_json::to_value(role).unwrap(), json!(role.as_str()));
        }
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn super_admin_satisfies_admin_only() {
        assert!(Role::SuperAdmin.satisfies(Role::Admin));
        assert!(!Role::Admin.satisfies(Role::SuperAdmin));
        assert!(!Role::SuperAdmin.satisfies(Role::Mentor));
    }

    #[test]
    fn onboarding_row_deserializes() {
        let row: OnboardingRequest = serde_json::from_value(json!({
            "id": "7f1c8a3e-64d4-4a47-9a0a-9d4b54bb8f01",
            "user_id": "0b1f4c9e-2b7a-4d2f-8f61-3b9f2a1e5c77",
            "data": { "expertise": ["rust"] },
            "status": "pending",
            "created_at": "2024-03-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(row.status, OnboardingStatus::Pending);
        assert!(row.kind.is_none());
        assert_eq!(row.data["expertise"][0], "rust");
    }
}

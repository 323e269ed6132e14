//! Troubleshooting and data repair for operators.
//!
//! These helpers need the service-role key: they read every account and
//! bypass row-level security. Nothing in the application calls them.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use mentorlink_auth::User;
use mentorlink_postgrest::SortOrder;

use crate::client::Backend;
use crate::error::{AppError, Result};
use crate::guard::{self, AccessFacts, Decision, Requirement};
use crate::models::{
    OnboardingKind, OnboardingStatus, Profile, Role, RoleAssignment, PROFILES, USER_ROLES,
};
use crate::onboarding;
use crate::seed::{self, MAX_PAGES, PAGE_SIZE};

/// An account named on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserRef {
    Id(Uuid),
    Email(String),
}

impl FromStr for UserRef {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(id) = Uuid::parse_str(s) {
            return Ok(UserRef::Id(id));
        }
        if s.contains('@') {
            return Ok(UserRef::Email(s.to_string()));
        }
        Err(AppError::Validation(format!("not a user id or email: {}", s)))
    }
}

impl fmt::Display for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRef::Id(id) => write!(f, "{}", id),
            UserRef::Email(email) => f.write_str(email),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardAccess {
    pub dashboard: Role,
    pub decision: Decision,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserDiagnosis {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub profile_present: bool,
    pub roles: Vec<Role>,
    /// Roles granted by more than one row.
    pub duplicate_roles: Vec<Role>,
    /// Candidate and mentor held at once.
    pub conflicting_roles: bool,
    pub latest_onboarding: Option<(OnboardingKind, OnboardingStatus)>,
    pub access: Vec<DashboardAccess>,
}

fn duplicates(assignments: &[RoleAssignment]) -> Vec<Role> {
    let mut counts: HashMap<Role, usize> = HashMap::new();
    for assignment in assignments {
        *counts.entry(assignment.role).or_insert(0) += 1;
    }
    let mut repeated: Vec<Role> = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(role, _)| role)
        .collect();
    repeated.sort();
    repeated
}

async fn role_rows(backend: &Backend, user_id: Uuid) -> Result<Vec<RoleAssignment>> {
    Ok(backend
        .privileged_from(USER_ROLES)?
        .select("*")
        .eq("user_id", &user_id.to_string())
        .order("created_at", SortOrder::Ascending)
        .execute()
        .await?)
}

async fn resolve(backend: &Backend, target: &UserRef) -> Result<(Uuid, Option<String>)> {
    match target {
        UserRef::Id(id) => {
            let user = backend.admin()?.get_user_by_id(&id.to_string()).await?;
            Ok((*id, user.email))
        }
        UserRef::Email(email) => {
            let user = seed::find_user_by_email(backend, email)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("no account for {}", email)))?;
            let id = Uuid::parse_str(&user.id)
                .map_err(|_| AppError::Validation(format!("unexpected user id {}", user.id)))?;
            Ok((id, user.email))
        }
    }
}

/// Gathers everything that decides where a user lands.
pub async fn diagnose_user(backend: &Backend, target: &UserRef) -> Result<UserDiagnosis> {
    let (user_id, email) = resolve(backend, target).await?;

    let profile: Option<Profile> = backend
        .privileged_from(PROFILES)?
        .select("*")
        .eq("id", &user_id.to_string())
        .execute_one()
        .await?;
    let assignments = role_rows(backend, user_id).await?;
    let latest = onboarding::latest_across(backend, user_id, true).await?;

    let mut roles: Vec<Role> = assignments.iter().map(|a| a.role).collect();
    roles.sort();
    roles.dedup();

    let facts = AccessFacts {
        authenticated: true,
        roles: roles.clone(),
        latest_onboarding: latest.as_ref().map(|r| r.status),
    };
    let access = [Role::Candidate, Role::Mentor, Role::Admin]
        .into_iter()
        .map(|dashboard| DashboardAccess {
            dashboard,
            decision: guard::decide(&Requirement::dashboard(dashboard), &facts),
        })
        .collect();

    let diagnosis = UserDiagnosis {
        user_id,
        email,
        profile_present: profile.is_some(),
        duplicate_roles: duplicates(&assignments),
        conflicting_roles: roles.contains(&Role::Candidate) && roles.contains(&Role::Mentor),
        roles,
        latest_onboarding: latest.and_then(|r| r.kind.map(|kind| (kind, r.status))),
        access,
    };

    if !diagnosis.profile_present {
        warn!(%user_id, "profile row missing");
    }
    if !diagnosis.duplicate_roles.is_empty() {
        warn!(%user_id, duplicates = ?diagnosis.duplicate_roles, "duplicate role rows");
    }
    if diagnosis.conflicting_roles {
        warn!(%user_id, "user holds both candidate and mentor");
    }
    Ok(diagnosis)
}

/// Every auth account, page by page.
pub async fn list_all_users(backend: &Backend) -> Result<Vec<User>> {
    let admin = backend.admin()?;
    let mut users = Vec::new();
    let mut previous_first: Option<String> = None;
    for page in 1..=MAX_PAGES {
        let batch = admin.list_users(Some(page), Some(PAGE_SIZE)).await?;
        if seed::repeats_page(&batch, previous_first.as_deref()) {
            return Ok(users);
        }
        let full = batch.len() >= PAGE_SIZE as usize;
        previous_first = batch.first().map(|u| u.id.clone());
        users.extend(batch);
        if !full {
            return Ok(users);
        }
    }
    warn!(max_pages = MAX_PAGES, "gave up paging through accounts");
    Ok(users)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileRepair {
    pub accounts_checked: usize,
    pub missing: Vec<Uuid>,
    pub repaired: usize,
    pub dry_run: bool,
}

/// Gives every auth account lacking a profile row one.
pub async fn repair_missing_profiles(backend: &Backend, dry_run: bool) -> Result<ProfileRepair> {
    let users = list_all_users(backend).await?;
    let profiles: Vec<Profile> = backend
        .privileged_from(PROFILES)?
        .select("id")
        .execute()
        .await?;
    let known: HashSet<Uuid> = profiles.into_iter().map(|p| p.id).collect();

    let mut report = ProfileRepair {
        accounts_checked: users.len(),
        dry_run,
        ..Default::default()
    };

    for user in users {
        let user_id = match Uuid::parse_str(&user.id) {
            Ok(id) => id,
            Err(_) => {
                warn!(id = %user.id, "skipping account with a non-UUID id");
                continue;
            }
        };
        if known.contains(&user_id) {
            continue;
        }
        report.missing.push(user_id);
        if dry_run {
            info!(%user_id, "would create missing profile");
            continue;
        }

        backend
            .privileged_from(PROFILES)?
            .upsert(&json!({
                "id": user_id,
                "email": user.email,
                "full_name": user.metadata_str("full_name"),
            }))
            .await?;
        report.repaired += 1;
        info!(%user_id, "created missing profile");
    }

    Ok(report)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleDedup {
    pub user_id: Uuid,
    pub kept: Vec<Role>,
    pub removed: Vec<Uuid>,
    pub dry_run: bool,
}

/// Deletes repeated role rows of `user_id`, keeping the oldest of each role.
pub async fn dedupe_roles(backend: &Backend, user_id: Uuid, dry_run: bool) -> Result<RoleDedup> {
    let assignments = role_rows(backend, user_id).await?;

    let mut kept: Vec<Role> = Vec::new();
    let mut removed = Vec::new();
    for assignment in assignments {
        if !kept.contains(&assignment.role) {
            kept.push(assignment.role);
            continue;
        }
        let Some(id) = assignment.id else {
            warn!(%user_id, role = %assignment.role, "duplicate role row without id left in place");
            continue;
        };
        if !dry_run {
            backend
                .privileged_from(USER_ROLES)?
                .eq("id", &id.to_string())
                .delete()
                .await?;
        }
        removed.push(id);
    }
    kept.sort();

    info!(%user_id, removed = removed.len(), dry_run, "role rows deduplicated");
    Ok(RoleDedup {
        user_id,
        kept,
        removed,
        dry_run,
    })
}

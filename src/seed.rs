//! Idempotent provisioning of the super-admin account.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use mentorlink_auth::{AdminUserAttributes, User};

use crate::client::Backend;
use crate::config::SuperAdminSeed;
use crate::error::{AppError, Result};
use crate::models::{Role, RoleAssignment, PROFILES, USER_ROLES};

pub(crate) const PAGE_SIZE: u32 = 100;
pub(crate) const MAX_PAGES: u32 = 500;

/// Name of the deployed function that runs [`seed_super_admin`].
pub const SEED_FUNCTION: &str = "seed-super-admin";

/// True when `batch` starts with the same account as the previous page,
/// which happens when the server ignores the page parameter.
pub(crate) fn repeats_page(batch: &[User], previous_first: Option<&str>) -> bool {
    matches!((batch.first(), previous_first), (Some(user), Some(first)) if user.id == first)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedOutcome {
    pub user_id: Uuid,
    /// Whether this call created the auth account.
    pub created: bool,
}

/// Looks an account up by email, paging through the admin user list.
pub async fn find_user_by_email(backend: &Backend, email: &str) -> Result<Option<User>> {
    let admin = backend.admin()?;
    let mut previous_first: Option<String> = None;
    for page in 1..=MAX_PAGES {
        let users = admin.list_users(Some(page), Some(PAGE_SIZE)).await?;
        if repeats_page(&users, previous_first.as_deref()) {
            return Ok(None);
        }
        let full = users.len() >= PAGE_SIZE as usize;
        previous_first = users.first().map(|u| u.id.clone());
        if let Some(user) = users.into_iter().find(|u| {
            u.email
                .as_deref()
                .map_or(false, |e| e.eq_ignore_ascii_case(email))
        }) {
            return Ok(Some(user));
        }
        if !full {
            return Ok(None);
        }
    }
    warn!(max_pages = MAX_PAGES, "gave up paging through accounts");
    Ok(None)
}

pub async fn seed_super_admin(backend: &Backend, seed: &SuperAdminSeed) -> Result<SeedOutcome> {
    if seed.email.trim().is_empty() {
        return Err(AppError::Config("super admin email is not set".to_string()));
    }

    let (user, created) = match find_user_by_email(backend, &seed.email).await? {
        Some(user) => {
            debug!(user_id = %user.id, "super admin account exists");
            (user, false)
        }
        None => {
            if seed.password.is_empty() {
                return Err(AppError::Config(
                    "SUPER_ADMIN_PASSWORD is required to create the account".to_string(),
                ));
            }
            let user = backend
                .admin()?
                .create_user(&AdminUserAttributes {
                    email: Some(seed.email.clone()),
                    password: Some(seed.password.clone()),
                    user_metadata: Some(json!({ "full_name": seed.full_name })),
                    email_confirm: Some(true),
                })
                .await?;
            (user, true)
        }
    };
    let user_id = Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Validation(format!("unexpected user id {}", user.id)))?;

    backend
        .privileged_from(PROFILES)?
        .upsert(&json!({
            "id": user_id,
            "email": seed.email,
            "full_name": seed.full_name,
        }))
        .await?;

    let roles = backend.privileged_from(USER_ROLES)?;
    let existing: Option<RoleAssignment> = roles
        .clone()
        .select("*")
        .eq("user_id", &user_id.to_string())
        .eq("role", Role::SuperAdmin.as_str())
        .execute_one()
        .await?;
    if existing.is_none() {
        roles
            .insert(&json!({ "user_id": user_id, "role": Role::SuperAdmin }))
            .await?;
    }

    info!(%user_id, created, "super admin seeded");
    Ok(SeedOutcome { user_id, created })
}

/// Runs the seeding through the deployed function instead of locally.
pub async fn seed_remote(backend: &Backend) -> Result<SeedOutcome> {
    let outcome: SeedOutcome = backend.invoke::<SeedOutcome, Value>(SEED_FUNCTION, None).await?;
    info!(user_id = %outcome.user_id, created = outcome.created, "super admin seeded remotely");
    Ok(outcome)
}

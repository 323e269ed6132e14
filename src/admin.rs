//! User management for administrators.
//!
//! Account changes go through the auth admin API and are then mirrored into
//! `profiles` and `user_roles`. Mirroring a profile is best-effort: a failure
//! is logged and the account change still counts as done.

use std::borrow::Cow;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use mentorlink_auth::AdminUserAttributes;
use mentorlink_postgrest::SortOrder;

use crate::client::Backend;
use crate::error::{AppError, Result};
use crate::models::{Profile, Role, RoleAssignment, PROFILES, USER_ROLES};

/// Add-user dialog
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUserForm {
    #[validate(email(message = "Valid email is required"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[validate(custom(function = "not_blank"))]
    pub full_name: String,

    pub role: Role,
}

/// Edit-user dialog. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct EditUserForm {
    #[validate(email(message = "Valid email is required"))]
    pub email: Option<String>,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: Option<String>,

    #[validate(custom(function = "not_blank"))]
    pub full_name: Option<String>,

    pub role: Option<Role>,
}

fn not_blank(name: &str) -> std::result::Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message(Cow::Borrowed("Full name is required")));
    }
    Ok(())
}

/// A row of the user table in the admin dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagedUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub roles: Vec<Role>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteOutcome {
    pub user_id: Uuid,
    pub auth_account_removed: bool,
    /// Why the auth account survived, when it did.
    pub auth_error: Option<String>,
}

fn parse_user_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).map_err(|_| AppError::Validation(format!("unexpected user id {}", id)))
}

async fn mirror_profile(backend: &Backend, profile: Value) {
    let user_id = profile["id"].clone();
    let result = match backend.privileged_from(PROFILES) {
        Ok(table) => table.upsert(&profile).await.map(|_| ()).map_err(AppError::from),
        Err(err) => Err(err),
    };
    if let Err(err) = result {
        warn!(user_id = %user_id, error = %err, "profile mirror failed");
    }
}

/// Creates a pre-confirmed account with its profile and role.
pub async fn create_user(backend: &Backend, form: &NewUserForm) -> Result<ManagedUser> {
    form.validate()?;
    let email = form.email.trim();
    let full_name = form.full_name.trim();

    let user = backend
        .admin()?
        .create_user(&AdminUserAttributes {
            email: Some(email.to_string()),
            password: Some(form.password.clone()),
            user_metadata: Some(json!({ "full_name": full_name })),
            email_confirm: Some(true),
        })
        .await?;
    let user_id = parse_user_id(&user.id)?;

    mirror_profile(
        backend,
        json!({ "id": user_id, "email": email, "full_name": full_name }),
    )
    .await;

    backend
        .privileged_from(USER_ROLES)?
        .insert(&json!({ "user_id": user_id, "role": form.role }))
        .await?;

    info!(%user_id, role = %form.role, "user created");
    Ok(ManagedUser {
        id: user_id,
        email: Some(email.to_string()),
        full_name: Some(full_name.to_string()),
        roles: vec![form.role],
        created_at: Some(Utc::now()),
    })
}

/// Applies the edit dialog to an existing account.
pub async fn update_user(backend: &Backend, user_id: Uuid, form: &EditUserForm) -> Result<()> {
    form.validate()?;

    let attributes = AdminUserAttributes {
        email: form.email.clone(),
        password: form.password.clone(),
        user_metadata: form
            .full_name
            .as_deref()
            .map(|name| json!({ "full_name": name.trim() })),
        email_confirm: None,
    };
    backend
        .admin()?
        .update_user_by_id(&user_id.to_string(), &attributes)
        .await?;

    if form.email.is_some() || form.full_name.is_some() {
        let mut profile = json!({ "id": user_id, "updated_at": Utc::now() });
        if let Some(email) = &form.email {
            profile["email"] = json!(email);
        }
        if let Some(name) = &form.full_name {
            profile["full_name"] = json!(name.trim());
        }
        mirror_profile(backend, profile).await;
    }

    if let Some(role) = form.role {
        let roles = backend.privileged_from(USER_ROLES)?;
        roles
            .clone()
            .eq("user_id", &user_id.to_string())
            .delete()
            .await?;
        roles
            .insert(&json!({ "user_id": user_id, "role": role }))
            .await?;
    }

    info!(%user_id, role = ?form.role, "user updated");
    Ok(())
}

/// Removes the user's roles and profile, then asks the backend to drop the
/// auth account. The profile stays deleted even if that last step fails.
pub async fn delete_user(backend: &Backend, user_id: Uuid) -> Result<DeleteOutcome> {
    let id = user_id.to_string();
    backend
        .privileged_from(USER_ROLES)?
        .eq("user_id", &id)
        .delete()
        .await?;
    backend.privileged_from(PROFILES)?.eq("id", &id).delete().await?;
    info!(%user_id, "profile and roles deleted");

    let auth_result = match backend.rpc("delete_user", json!({ "user_id": user_id })) {
        Ok(call) => call.call_rpc::<Value>().await.map(|_| ()).map_err(AppError::from),
        Err(err) => Err(err),
    };

    let auth_error = match auth_result {
        Ok(()) => None,
        Err(err) => {
            warn!(%user_id, error = %err, "auth account deletion failed");
            Some(err.user_message())
        }
    };

    Ok(DeleteOutcome {
        user_id,
        auth_account_removed: auth_error.is_none(),
        auth_error,
    })
}

/// Every profile with its roles, newest first.
pub async fn list_users(backend: &Backend) -> Result<Vec<ManagedUser>> {
    let profiles: Vec<Profile> = backend
        .privileged_from(PROFILES)?
        .select("*")
        .order("created_at", SortOrder::Descending)
        .execute()
        .await?;
    let assignments: Vec<RoleAssignment> = backend
        .privileged_from(USER_ROLES)?
        .select("*")
        .execute()
        .await?;

    let mut roles: HashMap<Uuid, Vec<Role>> = HashMap::new();
    for assignment in assignments {
        roles.entry(assignment.user_id).or_default().push(assignment.role);
    }

    Ok(profiles
        .into_iter()
        .map(|profile| {
            let mut held = roles.remove(&profile.id).unwrap_or_default();
            held.sort();
            held.dedup();
            ManagedUser {
                id: profile.id,
                email: profile.email,
                full_name: profile.full_name,
                roles: held,
                created_at: profile.created_at,
            }
        })
        .collect())
}

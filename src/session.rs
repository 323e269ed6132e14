//! Auth/session accessor used by every gated view.

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use mentorlink_postgrest::SortOrder;

use crate::client::Backend;
use crate::error::{AppError, Result};
use crate::guard::paths;
use crate::models::{RoleAssignment, Role, PROFILES, USER_ROLES};

/// The signed-in user together with the roles read from `user_roles`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub email_confirmed: bool,
    /// Distinct roles, ascending precedence.
    pub roles: Vec<Role>,
}

impl CurrentUser {
    /// The highest-precedence role held, if any.
    pub fn primary_role(&self) -> Option<Role> {
        self.roles.iter().copied().max()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.iter().any(|held| held.satisfies(role))
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(Role::is_admin)
    }

    /// Landing page after sign-in.
    pub fn home_path(&self) -> &'static str {
        match self.primary_role() {
            Some(role) => paths::dashboard(role),
            None => paths::ONBOARDING,
        }
    }
}

/// Reads the roles granted to `user_id`, deduplicated and sorted.
pub async fn fetch_roles(backend: &Backend, user_id: Uuid) -> Result<Vec<Role>> {
    let rows: Vec<RoleAssignment> = backend
        .from(USER_ROLES)?
        .select("*")
        .eq("user_id", &user_id.to_string())
        .order("created_at", SortOrder::Ascending)
        .execute()
        .await?;

    let mut roles: Vec<Role> = rows.into_iter().map(|r| r.role).collect();
    roles.sort();
    roles.dedup();
    Ok(roles)
}

/// The signed-in user, or `None` when there is no session.
pub async fn current_user(backend: &Backend) -> Result<Option<CurrentUser>> {
    let session = match backend.session() {
        Some(session) => session,
        None => return Ok(None),
    };
    let id = backend.current_user_id()?;
    let roles = fetch_roles(backend, id).await?;

    Ok(Some(CurrentUser {
        id,
        email: session.user.email.clone(),
        email_confirmed: session.user.is_confirmed(),
        roles,
    }))
}

/// Signs in and returns the resolved user.
pub async fn sign_in(backend: &Backend, email: &str, password: &str) -> Result<CurrentUser> {
    backend.auth.sign_in_with_password(email, password).await?;
    let user = current_user(backend).await?.ok_or(AppError::MissingSession)?;
    info!(user_id = %user.id, "signed in");
    Ok(user)
}

/// Outcome of a registration
#[derive(Debug, Clone, PartialEq)]
pub struct SignUp {
    pub user_id: Uuid,
    /// False when the account must confirm its email before signing in.
    pub signed_in: bool,
}

/// Registers an account. The profile row is mirrored best-effort: its
/// failure is logged and the registration still succeeds.
pub async fn sign_up(
    backend: &Backend,
    email: &str,
    password: &str,
    full_name: &str,
) -> Result<SignUp> {
    let response = backend
        .auth
        .sign_up(email, password, Some(json!({ "full_name": full_name })))
        .await?;
    let user_id = Uuid::parse_str(&response.user().id)
        .map_err(|_| AppError::Validation(format!("unexpected user id {}", response.user().id)))?;
    let signed_in = response.session().is_some();

    if signed_in {
        let profile = json!({ "id": user_id, "email": email, "full_name": full_name });
        if let Err(err) = backend.from(PROFILES)?.upsert(&profile).await {
            warn!(%user_id, error = %err, "profile mirror after sign-up failed");
        }
    }

    info!(%user_id, signed_in, "account registered");
    Ok(SignUp { user_id, signed_in })
}

pub async fn sign_out(backend: &Backend) -> Result<()> {
    backend.auth.sign_out().await?;
    Ok(())
}

/// Sends a reset email, returning the user to the configured redirect.
pub async fn request_password_reset(backend: &Backend, email: &str) -> Result<()> {
    backend
        .auth
        .reset_password_for_email(email, backend.config().password_reset_redirect.as_deref())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(roles: Vec<Role>) -> CurrentUser {
        CurrentUser {
            id: Uuid::nil(),
            email: Some("a@b.co".to_string()),
            email_confirmed: true,
            roles,
        }
    }

    #[test]
    fn primary_role_follows_precedence() {
        assert_eq!(user(vec![]).primary_role(), None);
        assert_eq!(
            user(vec![Role::Candidate, Role::Mentor]).primary_role(),
            Some(Role::Mentor)
        );
        assert_eq!(
            user(vec![Role::Mentor, Role::SuperAdmin]).primary_role(),
            Some(Role::SuperAdmin)
        );
    }

    #[test]
    fn home_path_per_role() {
        assert_eq!(user(vec![]).home_path(), "/onboarding");
        assert_eq!(user(vec![Role::Candidate]).home_path(), "/candidate/dashboard");
        assert_eq!(user(vec![Role::Mentor]).home_path(), "/mentor/dashboard");
        assert_eq!(user(vec![Role::SuperAdmin]).home_path(), "/admin/dashboard");
    }

    #[test]
    fn super_admin_counts_as_admin() {
        let u = user(vec![Role::SuperAdmin]);
        assert!(u.is_admin());
        assert!(u.has_role(Role::Admin));
        assert!(!u.has_role(Role::Mentor));
    }
}

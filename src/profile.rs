use chrono::Utc;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use mentorlink_postgrest::rows;

use crate::client::Backend;
use crate::error::{AppError, Result};
use crate::models::{Profile, PROFILES};

pub async fn get(backend: &Backend, user_id: Uuid) -> Result<Option<Profile>> {
    Ok(backend
        .from(PROFILES)?
        .select("*")
        .eq("id", &user_id.to_string())
        .execute_one()
        .await?)
}

pub async fn update_full_name(backend: &Backend, user_id: Uuid, full_name: &str) -> Result<Profile> {
    let full_name = full_name.trim();
    if full_name.is_empty() {
        return Err(AppError::Validation("Full name is required".to_string()));
    }

    let updated = backend
        .from(PROFILES)?
        .eq("id", &user_id.to_string())
        .update(&json!({ "full_name": full_name, "updated_at": Utc::now() }))
        .await?;

    rows::<Profile>(updated)?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound(format!("profile {}", user_id)))
}

/// Creates the profile row or refreshes its email and name.
pub async fn ensure(backend: &Backend, user_id: Uuid, email: &str, full_name: &str) -> Result<Profile> {
    debug!(%user_id, "upserting profile");
    let stored = backend
        .privileged_from(PROFILES)?
        .upsert(&json!({
            "id": user_id,
            "email": email,
            "full_name": full_name,
            "updated_at": Utc::now(),
        }))
        .await?;

    rows::<Profile>(stored)?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound(format!("profile {}", user_id)))
}

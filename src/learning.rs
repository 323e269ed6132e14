//! Skill progress and learning roadmaps of the signed-in user.

use chrono::Utc;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use mentorlink_postgrest::{rows, SortOrder};

use crate::client::Backend;
use crate::error::{AppError, Result};
use crate::models::{LearningProgress, LearningRoadmap, LEARNING_PROGRESS, LEARNING_ROADMAPS};

/// Records progress on a skill, replacing the previous value.
pub async fn upsert_progress(backend: &Backend, skill_name: &str, percentage: u8) -> Result<LearningProgress> {
    let skill_name = skill_name.trim();
    if skill_name.is_empty() {
        return Err(AppError::Validation("Skill name is required".to_string()));
    }
    if percentage > 100 {
        return Err(AppError::Validation(
            "Progress must be between 0 and 100".to_string(),
        ));
    }

    let user_id = backend.current_user_id()?;
    let stored = backend
        .from(LEARNING_PROGRESS)?
        .on_conflict("user_id,skill_name")
        .upsert(&json!({
            "user_id": user_id,
            "skill_name": skill_name,
            "progress_percentage": percentage,
            "updated_at": Utc::now(),
        }))
        .await?;

    debug!(%user_id, skill_name, percentage, "learning progress saved");
    rows::<LearningProgress>(stored)?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound(format!("progress for {}", skill_name)))
}

/// Forgets a tracked skill. Errors with `NotFound` when nothing was tracked
/// under that name.
pub async fn delete_progress(backend: &Backend, skill_name: &str) -> Result<()> {
    let skill_name = skill_name.trim();
    if skill_name.is_empty() {
        return Err(AppError::Validation("Skill name is required".to_string()));
    }

    let user_id = backend.current_user_id()?;
    let removed = backend
        .from(LEARNING_PROGRESS)?
        .eq("user_id", &user_id.to_string())
        .eq("skill_name", skill_name)
        .delete()
        .await?;

    if rows::<LearningProgress>(removed)?.is_empty() {
        return Err(AppError::NotFound(format!("progress for {}", skill_name)));
    }
    debug!(%user_id, skill_name, "learning progress deleted");
    Ok(())
}

pub async fn list_progress(backend: &Backend, user_id: Uuid) -> Result<Vec<LearningProgress>> {
    Ok(backend
        .from(LEARNING_PROGRESS)?
        .select("*")
        .eq("user_id", &user_id.to_string())
        .order("skill_name", SortOrder::Ascending)
        .execute()
        .await?)
}

pub async fn list_roadmaps(backend: &Backend, user_id: Uuid) -> Result<Vec<LearningRoadmap>> {
    Ok(backend
        .from(LEARNING_ROADMAPS)?
        .select("*")
        .eq("user_id", &user_id.to_string())
        .order("created_at", SortOrder::Descending)
        .execute()
        .await?)
}

pub async fn create_roadmap(
    backend: &Backend,
    title: &str,
    description: Option<&str>,
) -> Result<LearningRoadmap> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }

    let user_id = backend.current_user_id()?;
    let stored = backend
        .from(LEARNING_ROADMAPS)?
        .insert(&json!({
            "user_id": user_id,
            "title": title,
            "description": description,
        }))
        .await?;

    rows::<LearningRoadmap>(stored)?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound("inserted roadmap".to_string()))
}

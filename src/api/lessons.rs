//! User lesson endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_scenario, validate_skill_level, validate_uuid};
use crate::db::{CreateUserLessonRequest, UpdateUserLessonRequest, User, UserLesson};
use crate::{lessons, AppState};

/// Get-or-create the caller's lesson for a (scenario, skill level) track
pub async fn create_lesson(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(request): Json<CreateUserLessonRequest>,
) -> Result<(StatusCode, Json<UserLesson>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_scenario(&request.scenario) {
        errors.add("scenario", e);
    }
    if let Err(e) = validate_skill_level(&request.skill_level) {
        errors.add("skill_level", e);
    }
    errors.finish()?;

    let lesson = lessons::get_or_create(
        &state.db,
        &state.config.lessons,
        &user.id,
        &request.scenario,
        &request.skill_level,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(lesson)))
}

/// List the caller's lessons, most recently started first
pub async fn list_lessons(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<UserLesson>>, ApiError> {
    let lessons = sqlx::query_as::<_, UserLesson>(
        "SELECT * FROM user_lessons WHERE user_id = ? ORDER BY started_at DESC",
    )
    .bind(&user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(lessons))
}

/// Load a lesson and check the caller owns it
async fn load_owned_lesson(
    state: &AppState,
    user: &User,
    id: &str,
) -> Result<UserLesson, ApiError> {
    if let Err(e) = validate_uuid(id, "lesson_id") {
        return Err(ApiError::validation_field("lesson_id", e));
    }

    let lesson =
        sqlx::query_as::<_, UserLesson>("SELECT * FROM user_lessons WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(&user.id)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| ApiError::not_found("Lesson not found"))?;

    Ok(lesson)
}

/// Manual phase/status override for one of the caller's lessons
pub async fn update_lesson(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(request): Json<UpdateUserLessonRequest>,
) -> Result<Json<UserLesson>, ApiError> {
    if let Some(ref status) = request.status {
        if status != "in_progress" && status != "completed" {
            return Err(ApiError::validation_field(
                "status",
                "Status must be in_progress or completed",
            ));
        }
    }

    load_owned_lesson(&state, &user, &id).await?;

    let lesson = lessons::update(&state.db, &id, &request).await?;
    Ok(Json(lesson))
}

/// Delete one of the caller's lessons
pub async fn delete_lesson(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    load_owned_lesson(&state, &user, &id).await?;

    lessons::remove(&state.db, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

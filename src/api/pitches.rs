//! Pitch generation and history endpoints.
//!
//! `generate_pitch` is the one flow that touches several tables: it checks
//! affordability, calls the generation service, then deducts credits,
//! records the pitch, and advances the linked lesson inside a single
//! database transaction. The external call happens before any write, so a
//! failed generation costs nothing.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_phase, validate_scenario, validate_skill_level, validate_uuid};
use crate::db::{GeneratePitchRequest, GeneratePitchResponse, Pitch, Template, User, UserLesson};
use crate::generation::{compose_prompt, PromptInputs};
use crate::{ledger, lessons, AppState};

fn validate_generate_request(req: &GeneratePitchRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_scenario(&req.scenario) {
        errors.add("scenario", e);
    }
    if let Err(e) = validate_skill_level(&req.skill_level) {
        errors.add("skill_level", e);
    }
    if let Err(e) = validate_phase(req.phase) {
        errors.add("phase", e);
    }
    if let Some(ref template_id) = req.template_id {
        if let Err(e) = validate_uuid(template_id, "template_id") {
            errors.add("template_id", e);
        }
    }
    if let Some(ref lesson_id) = req.lesson_id {
        if let Err(e) = validate_uuid(lesson_id, "lesson_id") {
            errors.add("lesson_id", e);
        }
    }

    errors.finish()
}

/// Generate a pitch for the authenticated user
pub async fn generate_pitch(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(request): Json<GeneratePitchRequest>,
) -> Result<(StatusCode, Json<GeneratePitchResponse>), ApiError> {
    validate_generate_request(&request)?;

    let cost = state.config.credits.cost_for(&request.skill_level);

    // Advisory check; the deduction below re-checks atomically
    if !ledger::affordable(&user, cost) {
        return Err(ApiError::insufficient_credits(
            "Please purchase credits to continue",
        ));
    }

    let template: Option<Template> = match request.template_id {
        Some(ref template_id) => {
            let template = sqlx::query_as::<_, Template>("SELECT * FROM templates WHERE id = ?")
                .bind(template_id)
                .fetch_optional(&state.db)
                .await?
                .ok_or_else(|| ApiError::not_found("Template not found"))?;
            Some(template)
        }
        None => None,
    };

    // Resolve the lesson before the generation call so a bad lesson id
    // fails without spending anything
    let lesson: Option<UserLesson> = match request.lesson_id {
        Some(ref lesson_id) => {
            let lesson =
                sqlx::query_as::<_, UserLesson>("SELECT * FROM user_lessons WHERE id = ? AND user_id = ?")
                    .bind(lesson_id)
                    .bind(&user.id)
                    .fetch_optional(&state.db)
                    .await?
                    .ok_or_else(|| ApiError::not_found("Lesson not found"))?;
            Some(lesson)
        }
        None => None,
    };

    let prompt = compose_prompt(&PromptInputs {
        scenario: &request.scenario,
        skill_level: &request.skill_level,
        phase: request.phase,
        instructions: template.as_ref().map(|t| t.prompt_text.as_str()),
        tone: request.tone.as_deref(),
        length: request.length.as_deref(),
    });

    // Network-bound and slow; bounded by the client timeout
    let result_text = state.generator.generate(&prompt).await?;

    let pitch_id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    let mut tx = state.db.begin().await?;

    if !user.unlimited() {
        ledger::deduct(&mut *tx, &user.id, cost).await?;
    }

    sqlx::query(
        r#"
        INSERT INTO pitches (id, user_id, template_id, lesson_id, scenario, skill_level, phase, prompt_used, result_text, cost_credits, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&pitch_id)
    .bind(&user.id)
    .bind(template.as_ref().map(|t| t.id.as_str()))
    .bind(lesson.as_ref().map(|l| l.id.as_str()))
    .bind(&request.scenario)
    .bind(&request.skill_level)
    .bind(request.phase)
    .bind(&prompt)
    .bind(&result_text)
    .bind(cost)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    let updated_lesson = match lesson {
        Some(ref l) => Some(lessons::advance(&mut *tx, &l.id).await?),
        None => None,
    };

    let pitch = sqlx::query_as::<_, Pitch>("SELECT * FROM pitches WHERE id = ?")
        .bind(&pitch_id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        user_id = %user.id,
        pitch_id = %pitch_id,
        cost,
        "Generated pitch"
    );

    Ok((
        StatusCode::CREATED,
        Json(GeneratePitchResponse {
            pitch,
            lesson: updated_lesson,
        }),
    ))
}

/// List the caller's pitches, newest first
pub async fn list_pitches(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<Pitch>>, ApiError> {
    let pitches = sqlx::query_as::<_, Pitch>(
        "SELECT * FROM pitches WHERE user_id = ? ORDER BY created_at DESC",
    )
    .bind(&user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(pitches))
}

/// Fetch one of the caller's pitches
pub async fn get_pitch(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<Pitch>, ApiError> {
    if let Err(e) = validate_uuid(&id, "pitch_id") {
        return Err(ApiError::validation_field("pitch_id", e));
    }

    let pitch = sqlx::query_as::<_, Pitch>("SELECT * FROM pitches WHERE id = ? AND user_id = ?")
        .bind(&id)
        .bind(&user.id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Pitch not found"))?;

    Ok(Json(pitch))
}

/// List the caller's pitches for one lesson, in phase order
pub async fn list_lesson_pitches(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(lesson_id): Path<String>,
) -> Result<Json<Vec<Pitch>>, ApiError> {
    if let Err(e) = validate_uuid(&lesson_id, "lesson_id") {
        return Err(ApiError::validation_field("lesson_id", e));
    }

    let pitches = sqlx::query_as::<_, Pitch>(
        "SELECT * FROM pitches WHERE lesson_id = ? AND user_id = ? ORDER BY phase ASC, created_at ASC",
    )
    .bind(&lesson_id)
    .bind(&user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(pitches))
}

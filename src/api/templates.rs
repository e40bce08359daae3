//! Prompt template endpoints. Listing is public; mutation is restricted to
//! the creating admin.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::auth::AdminUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_scenario, validate_skill_level, validate_uuid};
use crate::db::{CreateTemplateRequest, Template, TemplateQuery, UpdateTemplateRequest};
use crate::AppState;

fn validate_create_request(req: &CreateTemplateRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if req.title.trim().is_empty() {
        errors.add("title", "Title is required");
    }
    if let Err(e) = validate_scenario(&req.scenario) {
        errors.add("scenario", e);
    }
    if let Err(e) = validate_skill_level(&req.skill_level) {
        errors.add("skill_level", e);
    }
    if req.prompt_text.trim().is_empty() {
        errors.add("prompt_text", "Prompt text is required");
    }

    errors.finish()
}

/// List public templates, optionally filtered by scenario and skill level
pub async fn list_templates(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TemplateQuery>,
) -> Result<Json<Vec<Template>>, ApiError> {
    let templates = sqlx::query_as::<_, Template>(
        r#"
        SELECT * FROM templates
        WHERE is_public = 1
          AND (? IS NULL OR scenario = ?)
          AND (? IS NULL OR skill_level = ?)
        ORDER BY created_at DESC
        "#,
    )
    .bind(&query.scenario)
    .bind(&query.scenario)
    .bind(&query.skill_level)
    .bind(&query.skill_level)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(templates))
}

/// Create a template (admin)
pub async fn create_template(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(request): Json<CreateTemplateRequest>,
) -> Result<(StatusCode, Json<Template>), ApiError> {
    validate_create_request(&request)?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO templates (id, title, scenario, skill_level, prompt_text, is_public, created_by, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&request.title)
    .bind(&request.scenario)
    .bind(&request.skill_level)
    .bind(&request.prompt_text)
    .bind(request.is_public as i64)
    .bind(&admin.id)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let template = sqlx::query_as::<_, Template>("SELECT * FROM templates WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok((StatusCode::CREATED, Json(template)))
}

/// Load a template and check the acting admin created it
async fn load_owned_template(
    state: &AppState,
    admin: &crate::db::User,
    id: &str,
) -> Result<Template, ApiError> {
    if let Err(e) = validate_uuid(id, "template_id") {
        return Err(ApiError::validation_field("template_id", e));
    }

    let template = sqlx::query_as::<_, Template>("SELECT * FROM templates WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Template not found"))?;

    if template.created_by != admin.id {
        return Err(ApiError::forbidden("Not allowed to modify this template"));
    }

    Ok(template)
}

/// Update a template (admin, owner-only)
pub async fn update_template(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateTemplateRequest>,
) -> Result<Json<Template>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Some(ref scenario) = request.scenario {
        if let Err(e) = validate_scenario(scenario) {
            errors.add("scenario", e);
        }
    }
    if let Some(ref skill_level) = request.skill_level {
        if let Err(e) = validate_skill_level(skill_level) {
            errors.add("skill_level", e);
        }
    }
    errors.finish()?;

    load_owned_template(&state, &admin, &id).await?;

    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE templates SET
            title = COALESCE(?, title),
            scenario = COALESCE(?, scenario),
            skill_level = COALESCE(?, skill_level),
            prompt_text = COALESCE(?, prompt_text),
            is_public = COALESCE(?, is_public),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&request.title)
    .bind(&request.scenario)
    .bind(&request.skill_level)
    .bind(&request.prompt_text)
    .bind(request.is_public.map(|p| p as i64))
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await?;

    let template = sqlx::query_as::<_, Template>("SELECT * FROM templates WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(template))
}

/// Delete a template (admin, owner-only)
pub async fn delete_template(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    load_owned_template(&state, &admin, &id).await?;

    sqlx::query("DELETE FROM templates WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

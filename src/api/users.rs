//! Profile and credit balance endpoints.

use axum::{extract::State, Json};
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::validate_email;
use crate::db::{CreditBalanceResponse, UpdateProfileRequest, User, UserResponse};
use crate::AppState;

/// Current user's profile
pub async fn get_me(user: User) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}

/// Update name and/or email
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Some(ref email) = request.email {
        if let Err(e) = validate_email(email) {
            errors.add("email", e);
        }
    }
    errors.finish()?;

    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE users SET
            name = COALESCE(?, name),
            email = COALESCE(?, email),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&request.name)
    .bind(&request.email)
    .bind(&now)
    .bind(&user.id)
    .execute(&state.db)
    .await
    .map_err(|e| {
        if e.to_string().contains("UNIQUE constraint failed") {
            ApiError::conflict("An account with this email already exists")
        } else {
            ApiError::from(e)
        }
    })?;

    let updated: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&user.id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(UserResponse::from(updated)))
}

/// Current credit balances
pub async fn get_credits(user: User) -> Json<CreditBalanceResponse> {
    Json(CreditBalanceResponse {
        credits: user.credits,
        trial_credits: user.trial_credits,
        total_credits: user.credits + user.trial_credits,
        is_unlimited: user.unlimited(),
    })
}

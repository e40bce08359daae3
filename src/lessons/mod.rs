//! Lesson progression tracking.
//!
//! A user has at most one lesson per (scenario, skill level) pair. The
//! phase count is fixed when the row is created and never recomputed;
//! advancement stops silently at the last phase. Completion is a manual
//! status change, not an automatic side effect of reaching the end.

use sqlx::SqliteConnection;
use thiserror::Error;

use crate::config::LessonConfig;
use crate::db::{DbPool, UpdateUserLessonRequest, UserLesson};

#[derive(Debug, Error)]
pub enum LessonError {
    #[error("lesson not found")]
    NotFound,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Fetch the user's lesson for this (scenario, skill level), creating it
/// on first request. Calling twice returns the same row.
pub async fn get_or_create(
    db: &DbPool,
    schedule: &LessonConfig,
    user_id: &str,
    scenario: &str,
    skill_level: &str,
) -> Result<UserLesson, LessonError> {
    let existing: Option<UserLesson> = sqlx::query_as(
        "SELECT * FROM user_lessons WHERE user_id = ? AND scenario = ? AND skill_level = ?",
    )
    .bind(user_id)
    .bind(scenario)
    .bind(skill_level)
    .fetch_optional(db)
    .await?;

    if let Some(lesson) = existing {
        return Ok(lesson);
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let total_phases = schedule.phases_for(skill_level);

    // A concurrent insert for the same triple hits the UNIQUE constraint;
    // fall back to reading the winner's row.
    let inserted = sqlx::query(
        r#"
        INSERT INTO user_lessons (id, user_id, scenario, skill_level, current_phase, total_phases, status, started_at)
        VALUES (?, ?, ?, ?, 1, ?, 'in_progress', ?)
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(scenario)
    .bind(skill_level)
    .bind(total_phases)
    .bind(&now)
    .execute(db)
    .await;

    match inserted {
        Ok(_) => {}
        Err(sqlx::Error::Database(e)) if e.message().contains("UNIQUE constraint failed") => {}
        Err(e) => return Err(e.into()),
    }

    let lesson = sqlx::query_as(
        "SELECT * FROM user_lessons WHERE user_id = ? AND scenario = ? AND skill_level = ?",
    )
    .bind(user_id)
    .bind(scenario)
    .bind(skill_level)
    .fetch_one(db)
    .await?;

    Ok(lesson)
}

/// Advance a lesson one phase, capped at the last. Returns the row as it
/// stands afterwards; advancing a finished lesson is a no-op.
pub async fn advance(
    conn: &mut SqliteConnection,
    lesson_id: &str,
) -> Result<UserLesson, LessonError> {
    sqlx::query(
        "UPDATE user_lessons SET current_phase = current_phase + 1
         WHERE id = ? AND current_phase < total_phases",
    )
    .bind(lesson_id)
    .execute(&mut *conn)
    .await?;

    let lesson: Option<UserLesson> = sqlx::query_as("SELECT * FROM user_lessons WHERE id = ?")
        .bind(lesson_id)
        .fetch_optional(&mut *conn)
        .await?;

    lesson.ok_or(LessonError::NotFound)
}

/// Manual phase/status override from the dashboard.
pub async fn update(
    db: &DbPool,
    lesson_id: &str,
    patch: &UpdateUserLessonRequest,
) -> Result<UserLesson, LessonError> {
    let result = sqlx::query(
        r#"
        UPDATE user_lessons SET
            current_phase = COALESCE(?, current_phase),
            status = COALESCE(?, status)
        WHERE id = ?
        "#,
    )
    .bind(patch.current_phase)
    .bind(&patch.status)
    .bind(lesson_id)
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(LessonError::NotFound);
    }

    let lesson = sqlx::query_as("SELECT * FROM user_lessons WHERE id = ?")
        .bind(lesson_id)
        .fetch_one(db)
        .await?;

    Ok(lesson)
}

pub async fn remove(db: &DbPool, lesson_id: &str) -> Result<(), LessonError> {
    let result = sqlx::query("DELETE FROM user_lessons WHERE id = ?")
        .bind(lesson_id)
        .execute(db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(LessonError::NotFound);
    }

    Ok(())
}

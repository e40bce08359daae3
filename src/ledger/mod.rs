//! Credit accounting for user entitlements.
//!
//! Balances live on the users row as two counters: `credits` (purchased)
//! and `trial_credits` (granted at signup). Deductions drain purchased
//! credits first, then trial credits, as one conditional UPDATE so two
//! concurrent requests can never overdraw the account.

use sqlx::SqliteConnection;
use thiserror::Error;

use crate::db::User;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("insufficient credits")]
    InsufficientCredits,
    #[error("user not found")]
    UserNotFound,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Whether `user` can pay `cost` right now. Advisory only; `deduct`
/// re-checks atomically.
pub fn affordable(user: &User, cost: i64) -> bool {
    user.unlimited() || user.credits + user.trial_credits >= cost
}

/// Deduct `cost` from a user's balances, purchased credits first.
///
/// The WHERE guard makes the check and the decrement a single atomic step;
/// a request that loses the race gets `InsufficientCredits` instead of
/// driving a balance negative. Callers skip this entirely for unlimited
/// accounts.
pub async fn deduct(
    conn: &mut SqliteConnection,
    user_id: &str,
    cost: i64,
) -> Result<(), LedgerError> {
    let now = chrono::Utc::now().to_rfc3339();

    let result = sqlx::query(
        r#"
        UPDATE users
        SET credits = credits - min(credits, ?1),
            trial_credits = trial_credits - max(?1 - credits, 0),
            updated_at = ?2
        WHERE id = ?3 AND credits + trial_credits >= ?1
        "#,
    )
    .bind(cost)
    .bind(&now)
    .bind(user_id)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(LedgerError::InsufficientCredits);
    }

    Ok(())
}

/// Add purchased credits to a user's balance. Trial credits are never
/// touched by purchases.
pub async fn credit(
    conn: &mut SqliteConnection,
    user_id: &str,
    amount: i64,
) -> Result<(), LedgerError> {
    let now = chrono::Utc::now().to_rfc3339();

    let result = sqlx::query("UPDATE users SET credits = credits + ?, updated_at = ? WHERE id = ?")
        .bind(amount)
        .bind(&now)
        .bind(user_id)
        .execute(conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(LedgerError::UserNotFound);
    }

    Ok(())
}

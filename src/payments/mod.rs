//! Payment provider integration for credit purchases.
//!
//! A purchase starts as a `pending` transaction row, gets a hosted
//! checkout session from the provider, and is completed later by a
//! signature-verified webhook. Completion is a guarded status transition,
//! so the provider redelivering the same event cannot credit twice.

mod stripe;

pub use stripe::StripeGateway;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use thiserror::Error;

use crate::db::{DbPool, Transaction};
use crate::ledger;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payments are not configured (missing secret_key)")]
    NotConfigured,
    #[error("checkout request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("payment provider returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("transaction not found")]
    TransactionNotFound,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Ledger(#[from] ledger::LedgerError),
}

/// Parameters for a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutParams {
    pub transaction_id: String,
    pub credits: i64,
    pub amount_cents: i64,
}

#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        params: &CheckoutParams,
    ) -> Result<CheckoutSession, PaymentError>;
}

// Webhook payload, provider-shaped

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEventData {
    pub object: WebhookCheckoutSession,
}

#[derive(Debug, Deserialize)]
pub struct WebhookCheckoutSession {
    pub id: String,
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Verify a `Stripe-Signature` style header: `t=<unix>,v1=<hex hmac>`,
/// where the signed payload is `"{t}.{raw body}"`.
pub fn verify_signature(secret: &str, header: &str, payload: &[u8], tolerance_secs: i64) -> bool {
    verify_signature_at(
        secret,
        header,
        payload,
        tolerance_secs,
        chrono::Utc::now().timestamp(),
    )
}

fn verify_signature_at(
    secret: &str,
    header: &str,
    payload: &[u8],
    tolerance_secs: i64,
    now_unix: i64,
) -> bool {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let Some(timestamp) = timestamp else {
        return false;
    };
    if signatures.is_empty() {
        return false;
    }

    // Reject stale (or far-future) timestamps to limit replay
    if (now_unix - timestamp).abs() > tolerance_secs {
        return false;
    }

    signatures.iter().any(|expected| {
        let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
            Ok(m) => m,
            Err(_) => return false,
        };
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);

        // Constant-time comparison
        mac.verify_slice(expected).is_ok()
    })
}

/// What the completion attempt did.
#[derive(Debug)]
pub enum CompletionOutcome {
    /// Transitioned `pending -> completed` and credited the user.
    Completed(Transaction),
    /// The row was already completed; nothing changed.
    AlreadyCompleted(Transaction),
}

/// Complete a pending credit purchase and credit the buyer, atomically.
///
/// The status transition is guarded on `status = 'pending'`, so a
/// redelivered confirmation finds no pending row and becomes a no-op.
/// `amount_cents` is overwritten with the provider-confirmed total.
pub async fn complete_credit_purchase(
    db: &DbPool,
    transaction_id: &str,
    amount_cents: i64,
) -> Result<CompletionOutcome, PaymentError> {
    let mut tx = db.begin().await?;
    let now = chrono::Utc::now().to_rfc3339();

    let result = sqlx::query(
        r#"
        UPDATE transactions
        SET status = 'completed', amount_cents = ?, completed_at = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(amount_cents)
    .bind(&now)
    .bind(transaction_id)
    .execute(&mut *tx)
    .await?;

    let transaction: Option<Transaction> =
        sqlx::query_as("SELECT * FROM transactions WHERE id = ?")
            .bind(transaction_id)
            .fetch_optional(&mut *tx)
            .await?;

    let Some(transaction) = transaction else {
        return Err(PaymentError::TransactionNotFound);
    };

    if result.rows_affected() == 0 {
        // Redelivery: the row already completed in an earlier delivery
        tx.rollback().await?;
        return Ok(CompletionOutcome::AlreadyCompleted(transaction));
    }

    ledger::credit(&mut *tx, &transaction.user_id, transaction.credits_granted).await?;
    tx.commit().await?;

    tracing::info!(
        transaction_id = %transaction.id,
        credits = transaction.credits_granted,
        "Credit purchase completed"
    );

    Ok(CompletionOutcome::Completed(transaction))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_signature_roundtrip() {
        let secret = "whsec_test";
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let header = format!("t=1000,v1={}", sign(secret, 1000, payload));

        assert!(verify_signature_at(secret, &header, payload, 300, 1100));
    }

    #[test]
    fn test_signature_rejects_wrong_secret() {
        let payload = b"{}";
        let header = format!("t=1000,v1={}", sign("whsec_a", 1000, payload));
        assert!(!verify_signature_at("whsec_b", &header, payload, 300, 1000));
    }

    #[test]
    fn test_signature_rejects_tampered_payload() {
        let secret = "whsec_test";
        let header = format!("t=1000,v1={}", sign(secret, 1000, b"{}"));
        assert!(!verify_signature_at(secret, &header, b"{...}", 300, 1000));
    }

    #[test]
    fn test_signature_rejects_stale_timestamp() {
        let secret = "whsec_test";
        let payload = b"{}";
        let header = format!("t=1000,v1={}", sign(secret, 1000, payload));
        assert!(!verify_signature_at(secret, &header, payload, 300, 2000));
    }

    #[test]
    fn test_signature_rejects_malformed_header() {
        assert!(!verify_signature_at("s", "", b"{}", 300, 0));
        assert!(!verify_signature_at("s", "t=notanumber,v1=00", b"{}", 300, 0));
        assert!(!verify_signature_at("s", "t=1000", b"{}", 300, 1000));
        assert!(!verify_signature_at("s", "v1=00ff", b"{}", 300, 1000));
    }

    #[test]
    fn test_signature_accepts_any_matching_v1() {
        let secret = "whsec_test";
        let payload = b"{}";
        let good = sign(secret, 1000, payload);
        let header = format!("t=1000,v1=deadbeef,v1={}", good);
        assert!(verify_signature_at(secret, &header, payload, 300, 1000));
    }

    #[test]
    fn test_event_parsing() {
        let body = r#"{
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {
                "object": {
                    "id": "cs_test_1",
                    "amount_total": 500,
                    "metadata": {"transaction_id": "tx-1"}
                }
            }
        }"#;

        let event: WebhookEvent = serde_json::from_str(body).unwrap();
        assert_eq!(event.event_type, "checkout.session.completed");
        assert_eq!(event.data.object.amount_total, Some(500));
        assert_eq!(
            event.data.object.metadata.get("transaction_id").unwrap(),
            "tx-1"
        );
    }

    async fn seed_purchase(pool: &DbPool, credits: i64) -> (String, String) {
        let user_id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO users (id, email, password_hash, trial_credits, created_at, updated_at) VALUES (?, ?, '', 0, ?, ?)",
        )
        .bind(&user_id)
        .bind(format!("{}@example.com", user_id))
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await
        .unwrap();

        let tx_id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO transactions (id, user_id, type, credits_granted, amount_cents, status, created_at)
            VALUES (?, ?, 'credit_purchase', ?, ?, 'pending', ?)
            "#,
        )
        .bind(&tx_id)
        .bind(&user_id)
        .bind(credits)
        .bind(credits * 100)
        .bind(&now)
        .execute(pool)
        .await
        .unwrap();

        (user_id, tx_id)
    }

    #[tokio::test]
    async fn test_completion_credits_once() {
        let pool = db::test_pool().await;
        let (user_id, tx_id) = seed_purchase(&pool, 5).await;

        let outcome = complete_credit_purchase(&pool, &tx_id, 500).await.unwrap();
        let CompletionOutcome::Completed(transaction) = outcome else {
            panic!("expected first delivery to complete");
        };
        assert_eq!(transaction.status, "completed");
        assert_eq!(transaction.amount_cents, 500);
        assert!(transaction.completed_at.is_some());

        let (credits,): (i64,) = sqlx::query_as("SELECT credits FROM users WHERE id = ?")
            .bind(&user_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(credits, 5);
    }

    #[tokio::test]
    async fn test_completion_is_idempotent_across_redelivery() {
        let pool = db::test_pool().await;
        let (user_id, tx_id) = seed_purchase(&pool, 5).await;

        complete_credit_purchase(&pool, &tx_id, 500).await.unwrap();
        let outcome = complete_credit_purchase(&pool, &tx_id, 500).await.unwrap();
        assert!(matches!(outcome, CompletionOutcome::AlreadyCompleted(_)));

        let (credits,): (i64,) = sqlx::query_as("SELECT credits FROM users WHERE id = ?")
            .bind(&user_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(credits, 5, "redelivery must not double-credit");
    }

    #[tokio::test]
    async fn test_completion_overwrites_amount_with_confirmed_total() {
        let pool = db::test_pool().await;
        let (_, tx_id) = seed_purchase(&pool, 5).await;

        complete_credit_purchase(&pool, &tx_id, 450).await.unwrap();

        let (amount,): (i64,) = sqlx::query_as("SELECT amount_cents FROM transactions WHERE id = ?")
            .bind(&tx_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(amount, 450);
    }

    #[tokio::test]
    async fn test_completion_unknown_transaction() {
        let pool = db::test_pool().await;
        let err = complete_credit_purchase(&pool, "missing", 100)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::TransactionNotFound));
    }
}

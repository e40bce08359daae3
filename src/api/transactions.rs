//! Credit purchase endpoints and the payment provider webhook.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::error::ApiError;
use super::validation::{validate_credit_amount, validate_uuid};
use crate::db::{
    CheckoutRequest, CheckoutResponse, CreateCreditPurchaseRequest, Transaction, User,
};
use crate::payments::{self, CheckoutParams, WebhookEvent};
use crate::AppState;

/// Create a pending credit purchase
pub async fn create_credit_purchase(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(request): Json<CreateCreditPurchaseRequest>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    if let Err(e) = validate_credit_amount(request.credits) {
        return Err(ApiError::validation_field("credits", e));
    }

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let amount_cents = request.credits * state.config.credits.price_cents;

    sqlx::query(
        r#"
        INSERT INTO transactions (id, user_id, type, credits_granted, amount_cents, status, created_at)
        VALUES (?, ?, 'credit_purchase', ?, ?, 'pending', ?)
        "#,
    )
    .bind(&id)
    .bind(&user.id)
    .bind(request.credits)
    .bind(amount_cents)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let transaction = sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

/// Obtain a hosted checkout URL for one of the caller's pending purchases
pub async fn create_checkout(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    if let Err(e) = validate_uuid(&request.transaction_id, "transaction_id") {
        return Err(ApiError::validation_field("transaction_id", e));
    }

    let transaction =
        sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = ?")
            .bind(&request.transaction_id)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| ApiError::not_found("Transaction not found"))?;

    if transaction.user_id != user.id {
        return Err(ApiError::forbidden("Not allowed to pay this transaction"));
    }
    if transaction.status != "pending" {
        return Err(ApiError::conflict("Transaction is already completed"));
    }

    let session = state
        .payments
        .create_checkout_session(&CheckoutParams {
            transaction_id: transaction.id.clone(),
            credits: transaction.credits_granted,
            amount_cents: transaction.amount_cents,
        })
        .await?;

    tracing::info!(
        transaction_id = %transaction.id,
        session_id = %session.id,
        "Created checkout session"
    );

    Ok(Json(CheckoutResponse { url: session.url }))
}

/// List the caller's transactions, newest first
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let transactions = sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions WHERE user_id = ? ORDER BY created_at DESC",
    )
    .bind(&user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(transactions))
}

#[derive(Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// Payment provider confirmation callback. No bearer auth; trust comes from
/// the signature over the raw body. Completion is idempotent, so provider
/// redelivery is harmless.
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<WebhookAck>), ApiError> {
    let secret = state
        .config
        .payments
        .webhook_secret
        .as_deref()
        .ok_or_else(|| ApiError::internal("Webhook secret is not configured"))?;

    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !payments::verify_signature(
        secret,
        signature,
        &body,
        state.config.payments.signature_tolerance_secs,
    ) {
        tracing::warn!("Webhook signature verification failed");
        return Ok((StatusCode::BAD_REQUEST, Json(WebhookAck { received: false })));
    }

    let event: WebhookEvent = serde_json::from_slice(&body).map_err(|e| {
        tracing::error!("Failed to parse webhook payload: {}", e);
        ApiError::bad_request("Malformed webhook payload")
    })?;

    if event.event_type == "checkout.session.completed" {
        let session = event.data.object;
        let transaction_id = session
            .metadata
            .get("transaction_id")
            .ok_or_else(|| ApiError::bad_request("Webhook metadata is missing transaction_id"))?;
        let amount_cents = session.amount_total.unwrap_or(0);

        payments::complete_credit_purchase(&state.db, transaction_id, amount_cents).await?;
    } else {
        tracing::debug!(event_type = %event.event_type, "Ignoring webhook event");
    }

    Ok((StatusCode::OK, Json(WebhookAck { received: true })))
}

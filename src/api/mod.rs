pub mod auth;
mod error;
mod lessons;
mod pitches;
mod templates;
mod transactions;
mod users;
mod validation;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Auth routes (public)
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout));

    // Handlers enforce auth themselves via the User/AdminUser extractors;
    // the webhook route is authenticated by its signature instead
    Router::new()
        .route("/health", get(health_check))
        .nest("/auth", auth_routes)
        // Users
        .route("/users/me", get(users::get_me).patch(users::update_me))
        .route("/users/credits", get(users::get_credits))
        // Templates
        .route(
            "/templates",
            get(templates::list_templates).post(templates::create_template),
        )
        .route(
            "/templates/:id",
            axum::routing::patch(templates::update_template).delete(templates::delete_template),
        )
        // Pitches
        .route("/pitches/generate", post(pitches::generate_pitch))
        .route("/pitches", get(pitches::list_pitches))
        .route("/pitches/lesson/:lesson_id", get(pitches::list_lesson_pitches))
        .route("/pitches/:id", get(pitches::get_pitch))
        // Lessons
        .route(
            "/user-lessons",
            post(lessons::create_lesson).get(lessons::list_lessons),
        )
        .route(
            "/user-lessons/:id",
            axum::routing::patch(lessons::update_lesson).delete(lessons::delete_lesson),
        )
        // Transactions
        .route(
            "/transactions/credit-purchase",
            post(transactions::create_credit_purchase),
        )
        .route(
            "/transactions/credit-purchase/checkout",
            post(transactions::create_checkout),
        )
        .route("/transactions", get(transactions::list_transactions))
        .route("/transactions/webhook", post(transactions::payment_webhook))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db;
    use crate::generation::{GenerationError, TextGenerator};
    use crate::payments::{CheckoutParams, CheckoutSession, PaymentError, PaymentGateway};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use hmac::{Hmac, Mac};
    use serde_json::{json, Value};
    use sha2::Sha256;
    use tower::ServiceExt;

    const WEBHOOK_SECRET: &str = "whsec_test";

    struct StubGenerator;

    #[async_trait]
    impl TextGenerator for StubGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            Ok("Hi! Quick question before you scroll past me.".to_string())
        }
    }

    struct StubGateway;

    #[async_trait]
    impl PaymentGateway for StubGateway {
        async fn create_checkout_session(
            &self,
            params: &CheckoutParams,
        ) -> Result<CheckoutSession, PaymentError> {
            Ok(CheckoutSession {
                id: "cs_test".to_string(),
                url: format!("https://checkout.test/{}", params.transaction_id),
            })
        }
    }

    async fn test_app() -> (Router, Arc<AppState>) {
        let mut config = Config::default();
        config.payments.webhook_secret = Some(WEBHOOK_SECRET.to_string());

        let pool = db::test_pool().await;
        let state = Arc::new(AppState::new(
            config,
            pool,
            Arc::new(StubGenerator),
            Arc::new(StubGateway),
        ));

        (create_router(state.clone()), state)
    }

    async fn request(
        router: &Router,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, json)
    }

    async fn register(router: &Router, email: &str) -> String {
        let (status, body) = request(
            router,
            Method::POST,
            "/auth/register",
            None,
            Some(json!({"email": email, "password": "hunter2hunter2"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["token"].as_str().unwrap().to_string()
    }

    async fn credit_balances(router: &Router, token: &str) -> (i64, i64) {
        let (status, body) =
            request(router, Method::GET, "/users/credits", Some(token), None).await;
        assert_eq!(status, StatusCode::OK);
        (
            body["credits"].as_i64().unwrap(),
            body["trial_credits"].as_i64().unwrap(),
        )
    }

    fn signed_webhook_header(payload: &str) -> String {
        let timestamp = chrono::Utc::now().timestamp();
        let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    async fn deliver_webhook(router: &Router, payload: &str, header_value: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/transactions/webhook")
            .header("Stripe-Signature", header_value)
            .body(Body::from(payload.to_string()))
            .unwrap();

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_register_grants_trial_credits() {
        let (router, _state) = test_app().await;
        let token = register(&router, "new@example.com").await;

        assert_eq!(credit_balances(&router, &token).await, (0, 5));

        // Same email again conflicts
        let (status, _) = request(
            &router,
            Method::POST,
            "/auth/register",
            None,
            Some(json!({"email": "new@example.com", "password": "hunter2hunter2"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_requests_without_token_are_unauthorized() {
        let (router, _state) = test_app().await;
        let (status, _) = request(&router, Method::GET, "/pitches", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = request(
            &router,
            Method::GET,
            "/pitches",
            Some("not-a-real-token"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_generate_pitch_burns_trial_credits() {
        let (router, _state) = test_app().await;
        let token = register(&router, "gen@example.com").await;

        let (status, body) = request(
            &router,
            Method::POST,
            "/pitches/generate",
            Some(&token),
            Some(json!({"scenario": "dating", "skill_level": "basic", "phase": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["pitch"]["cost_credits"], 1);
        assert!(body["pitch"]["result_text"].as_str().unwrap().contains("Quick question"));
        assert!(body["pitch"]["prompt_used"].as_str().unwrap().contains("Scenario: dating"));
        assert!(body["lesson"].is_null());

        assert_eq!(credit_balances(&router, &token).await, (0, 4));

        let (status, pitches) =
            request(&router, Method::GET, "/pitches", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(pitches.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_generate_with_unknown_template_costs_nothing() {
        let (router, state) = test_app().await;
        let token = register(&router, "tmpl@example.com").await;

        let missing = uuid::Uuid::new_v4().to_string();
        let (status, body) = request(
            &router,
            Method::POST,
            "/pitches/generate",
            Some(&token),
            Some(json!({
                "scenario": "dating",
                "skill_level": "basic",
                "phase": 1,
                "template_id": missing,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "not_found");

        // No charge, no pitch row
        assert_eq!(credit_balances(&router, &token).await, (0, 5));
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pitches")
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_generate_without_credits_is_payment_required() {
        let (router, state) = test_app().await;
        let token = register(&router, "broke@example.com").await;

        sqlx::query("UPDATE users SET trial_credits = 0 WHERE email = ?")
            .bind("broke@example.com")
            .execute(&state.db)
            .await
            .unwrap();

        let (status, body) = request(
            &router,
            Method::POST,
            "/pitches/generate",
            Some(&token),
            Some(json!({"scenario": "dating", "skill_level": "basic", "phase": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["error"]["code"], "insufficient_credits");
    }

    #[tokio::test]
    async fn test_unlimited_account_is_never_charged() {
        let (router, state) = test_app().await;
        let token = register(&router, "vip@example.com").await;

        sqlx::query("UPDATE users SET is_unlimited = 1 WHERE email = ?")
            .bind("vip@example.com")
            .execute(&state.db)
            .await
            .unwrap();

        let (status, _) = request(
            &router,
            Method::POST,
            "/pitches/generate",
            Some(&token),
            Some(json!({"scenario": "negotiation", "skill_level": "advanced", "phase": 2})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        assert_eq!(credit_balances(&router, &token).await, (0, 5));
    }

    #[tokio::test]
    async fn test_lesson_progression_through_generation() {
        let (router, _state) = test_app().await;
        let token = register(&router, "learner@example.com").await;

        let (status, lesson) = request(
            &router,
            Method::POST,
            "/user-lessons",
            Some(&token),
            Some(json!({"scenario": "cold_call", "skill_level": "basic"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(lesson["current_phase"], 1);
        assert_eq!(lesson["total_phases"], 2);
        let lesson_id = lesson["id"].as_str().unwrap().to_string();

        // Creating the same track again returns the same lesson
        let (_, again) = request(
            &router,
            Method::POST,
            "/user-lessons",
            Some(&token),
            Some(json!({"scenario": "cold_call", "skill_level": "basic"})),
        )
        .await;
        assert_eq!(again["id"].as_str().unwrap(), lesson_id);

        let generate = json!({
            "scenario": "cold_call",
            "skill_level": "basic",
            "phase": 1,
            "lesson_id": lesson_id,
        });

        let (status, body) = request(
            &router,
            Method::POST,
            "/pitches/generate",
            Some(&token),
            Some(generate.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["lesson"]["current_phase"], 2);

        // Second generation: phase stays capped at total_phases
        let (status, body) = request(
            &router,
            Method::POST,
            "/pitches/generate",
            Some(&token),
            Some(generate),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["lesson"]["current_phase"], 2);

        // Both pitches listed under the lesson
        let (status, pitches) = request(
            &router,
            Method::GET,
            &format!("/pitches/lesson/{}", lesson_id),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(pitches.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_purchase_checkout_and_webhook_flow() {
        let (router, _state) = test_app().await;
        let token = register(&router, "buyer@example.com").await;

        let (status, transaction) = request(
            &router,
            Method::POST,
            "/transactions/credit-purchase",
            Some(&token),
            Some(json!({"credits": 5})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(transaction["amount_cents"], 500);
        assert_eq!(transaction["status"], "pending");
        let transaction_id = transaction["id"].as_str().unwrap().to_string();

        let (status, checkout) = request(
            &router,
            Method::POST,
            "/transactions/credit-purchase/checkout",
            Some(&token),
            Some(json!({"transaction_id": transaction_id})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(checkout["url"].as_str().unwrap().contains(&transaction_id));

        let payload = json!({
            "type": "checkout.session.completed",
            "data": {"object": {
                "id": "cs_test",
                "amount_total": 500,
                "metadata": {"transaction_id": transaction_id},
            }},
        })
        .to_string();
        let header_value = signed_webhook_header(&payload);

        // Deliver twice; the second must be a no-op
        let (status, ack) = deliver_webhook(&router, &payload, &header_value).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["received"], true);
        let (status, _) = deliver_webhook(&router, &payload, &header_value).await;
        assert_eq!(status, StatusCode::OK);

        assert_eq!(credit_balances(&router, &token).await, (5, 5));

        let (_, transactions) =
            request(&router, Method::GET, "/transactions", Some(&token), None).await;
        let transactions = transactions.as_array().unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0]["status"], "completed");

        // A completed transaction cannot start another checkout
        let (status, _) = request(
            &router,
            Method::POST,
            "/transactions/credit-purchase/checkout",
            Some(&token),
            Some(json!({"transaction_id": transaction_id})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_webhook_rejects_bad_signature() {
        let (router, _state) = test_app().await;
        let token = register(&router, "victim@example.com").await;

        let (_, transaction) = request(
            &router,
            Method::POST,
            "/transactions/credit-purchase",
            Some(&token),
            Some(json!({"credits": 5})),
        )
        .await;
        let transaction_id = transaction["id"].as_str().unwrap().to_string();

        let payload = json!({
            "type": "checkout.session.completed",
            "data": {"object": {
                "id": "cs_forged",
                "amount_total": 500,
                "metadata": {"transaction_id": transaction_id},
            }},
        })
        .to_string();

        let (status, ack) = deliver_webhook(&router, &payload, "t=1,v1=deadbeef").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(ack["received"], false);

        // Nothing credited, transaction still pending
        assert_eq!(credit_balances(&router, &token).await, (0, 5));
        let (_, transactions) =
            request(&router, Method::GET, "/transactions", Some(&token), None).await;
        assert_eq!(transactions.as_array().unwrap()[0]["status"], "pending");
    }

    #[tokio::test]
    async fn test_checkout_requires_ownership() {
        let (router, _state) = test_app().await;
        let owner = register(&router, "owner@example.com").await;
        let other = register(&router, "other@example.com").await;

        let (_, transaction) = request(
            &router,
            Method::POST,
            "/transactions/credit-purchase",
            Some(&owner),
            Some(json!({"credits": 3})),
        )
        .await;
        let transaction_id = transaction["id"].as_str().unwrap().to_string();

        let (status, body) = request(
            &router,
            Method::POST,
            "/transactions/credit-purchase/checkout",
            Some(&other),
            Some(json!({"transaction_id": transaction_id})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "forbidden");
    }

    #[tokio::test]
    async fn test_template_crud_is_admin_and_owner_scoped() {
        let (router, state) = test_app().await;

        auth::ensure_admin_user(&state.db, "admin@example.com", "adminpass123")
            .await
            .unwrap();
        let (status, body) = request(
            &router,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"email": "admin@example.com", "password": "adminpass123"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let admin_token = body["token"].as_str().unwrap().to_string();

        let user_token = register(&router, "pleb@example.com").await;

        // Plain users cannot create templates
        let create_body = json!({
            "title": "Rooftop opener",
            "scenario": "dating",
            "skill_level": "basic",
            "prompt_text": "Open with something about the venue.",
        });
        let (status, _) = request(
            &router,
            Method::POST,
            "/templates",
            Some(&user_token),
            Some(create_body.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, template) = request(
            &router,
            Method::POST,
            "/templates",
            Some(&admin_token),
            Some(create_body),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let template_id = template["id"].as_str().unwrap().to_string();

        // Listing is public and filterable
        let (status, listed) = request(
            &router,
            Method::GET,
            "/templates?scenario=dating&skill_level=basic",
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let (_, filtered_out) =
            request(&router, Method::GET, "/templates?scenario=cold_call", None, None).await;
        assert!(filtered_out.as_array().unwrap().is_empty());

        // Generation embeds the template instructions in the stored prompt
        let (status, generated) = request(
            &router,
            Method::POST,
            "/pitches/generate",
            Some(&user_token),
            Some(json!({
                "scenario": "dating",
                "skill_level": "basic",
                "phase": 1,
                "template_id": template_id,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(generated["pitch"]["prompt_used"]
            .as_str()
            .unwrap()
            .contains("something about the venue"));
    }
}

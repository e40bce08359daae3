//! HTTP client for Stripe's hosted checkout.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{CheckoutParams, CheckoutSession, PaymentError, PaymentGateway};
use crate::config::PaymentConfig;

pub struct StripeGateway {
    api_base: String,
    secret_key: Option<String>,
    success_url: String,
    cancel_url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

impl StripeGateway {
    pub fn new(config: &PaymentConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
            success_url: config.success_url.clone(),
            cancel_url: config.cancel_url.clone(),
            client,
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(
        &self,
        params: &CheckoutParams,
    ) -> Result<CheckoutSession, PaymentError> {
        let secret_key = self.secret_key.as_deref().ok_or(PaymentError::NotConfigured)?;

        let product_name = format!("{} Credits", params.credits);
        let amount = params.amount_cents.to_string();

        // Stripe takes form-encoded bodies with bracketed nesting
        let form: Vec<(&str, &str)> = vec![
            ("mode", "payment"),
            ("payment_method_types[0]", "card"),
            ("line_items[0][price_data][currency]", "usd"),
            (
                "line_items[0][price_data][product_data][name]",
                product_name.as_str(),
            ),
            ("line_items[0][price_data][unit_amount]", amount.as_str()),
            ("line_items[0][quantity]", "1"),
            ("success_url", self.success_url.as_str()),
            ("cancel_url", self.cancel_url.as_str()),
            ("metadata[transaction_id]", params.transaction_id.as_str()),
        ];

        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.api_base))
            .basic_auth(secret_key, None::<&str>)
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Api { status, body });
        }

        let session: SessionResponse = response.json().await?;
        let url = session.url.ok_or_else(|| PaymentError::Api {
            status: 200,
            body: "checkout session has no url".to_string(),
        })?;

        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }
}

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub credits: CreditConfig,
    #[serde(default)]
    pub lessons: LessonConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub payments: PaymentConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            api_port: default_api_port(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Admin account seeded at startup
    #[serde(default = "default_admin_email")]
    pub admin_email: String,
    #[serde(default = "default_admin_password")]
    pub admin_password: String,
    /// Session lifetime in days
    #[serde(default = "default_session_days")]
    pub session_days: i64,
    /// Trial credits granted to every new account
    #[serde(default = "default_trial_credits")]
    pub trial_credits: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_email: default_admin_email(),
            admin_password: default_admin_password(),
            session_days: default_session_days(),
            trial_credits: default_trial_credits(),
        }
    }
}

fn default_admin_email() -> String {
    "admin@pitchrocket.local".to_string()
}

fn default_admin_password() -> String {
    // Random password when not provided; printed once at startup
    uuid::Uuid::new_v4().to_string()
}

fn default_session_days() -> i64 {
    7
}

fn default_trial_credits() -> i64 {
    5
}

/// Credit cost per generation, keyed by skill level.
#[derive(Debug, Clone, Deserialize)]
pub struct CreditConfig {
    #[serde(default = "default_basic_cost")]
    pub basic: i64,
    #[serde(default = "default_intermediate_cost")]
    pub intermediate: i64,
    #[serde(default = "default_advanced_cost")]
    pub advanced: i64,
    /// Cost applied to skill levels outside the schedule
    #[serde(default = "default_fallback_cost")]
    pub fallback: i64,
    /// Price of one credit in cents when purchasing
    #[serde(default = "default_price_cents")]
    pub price_cents: i64,
}

impl CreditConfig {
    pub fn cost_for(&self, skill_level: &str) -> i64 {
        match skill_level {
            "basic" => self.basic,
            "intermediate" => self.intermediate,
            "advanced" => self.advanced,
            _ => self.fallback,
        }
    }
}

impl Default for CreditConfig {
    fn default() -> Self {
        Self {
            basic: default_basic_cost(),
            intermediate: default_intermediate_cost(),
            advanced: default_advanced_cost(),
            fallback: default_fallback_cost(),
            price_cents: default_price_cents(),
        }
    }
}

fn default_basic_cost() -> i64 {
    1
}

fn default_intermediate_cost() -> i64 {
    2
}

fn default_advanced_cost() -> i64 {
    3
}

fn default_fallback_cost() -> i64 {
    1
}

fn default_price_cents() -> i64 {
    100
}

/// Phase counts per learning track, keyed by skill level.
#[derive(Debug, Clone, Deserialize)]
pub struct LessonConfig {
    #[serde(default = "default_basic_phases")]
    pub basic_phases: i64,
    #[serde(default = "default_intermediate_phases")]
    pub intermediate_phases: i64,
    #[serde(default = "default_advanced_phases")]
    pub advanced_phases: i64,
}

impl LessonConfig {
    pub fn phases_for(&self, skill_level: &str) -> i64 {
        match skill_level {
            "intermediate" => self.intermediate_phases,
            "advanced" => self.advanced_phases,
            // Unknown skill levels get the shortest track
            _ => self.basic_phases,
        }
    }
}

impl Default for LessonConfig {
    fn default() -> Self {
        Self {
            basic_phases: default_basic_phases(),
            intermediate_phases: default_intermediate_phases(),
            advanced_phases: default_advanced_phases(),
        }
    }
}

fn default_basic_phases() -> i64 {
    2
}

fn default_intermediate_phases() -> i64 {
    4
}

fn default_advanced_phases() -> i64 {
    6
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// Base URL of the OpenAI-compatible completion API
    #[serde(default = "default_generation_api_base")]
    pub api_base: String,
    pub api_key: Option<String>,
    #[serde(default = "default_generation_model")]
    pub model: String,
    /// Request timeout in seconds for the generation call
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_base: default_generation_api_base(),
            api_key: None,
            model: default_generation_model(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

fn default_generation_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_generation_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_generation_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Secret API key for the payment provider
    pub secret_key: Option<String>,
    /// Secret for verifying webhook signatures
    pub webhook_secret: Option<String>,
    #[serde(default = "default_payment_api_base")]
    pub api_base: String,
    #[serde(default = "default_success_url")]
    pub success_url: String,
    #[serde(default = "default_cancel_url")]
    pub cancel_url: String,
    /// Request timeout in seconds for checkout session creation
    #[serde(default = "default_payment_timeout")]
    pub timeout_secs: u64,
    /// Maximum accepted age of a webhook signature timestamp
    #[serde(default = "default_signature_tolerance")]
    pub signature_tolerance_secs: i64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            webhook_secret: None,
            api_base: default_payment_api_base(),
            success_url: default_success_url(),
            cancel_url: default_cancel_url(),
            timeout_secs: default_payment_timeout(),
            signature_tolerance_secs: default_signature_tolerance(),
        }
    }
}

fn default_payment_api_base() -> String {
    "https://api.stripe.com/v1".to_string()
}

fn default_success_url() -> String {
    "http://localhost:5173/dashboard/billing/success".to_string()
}

fn default_cancel_url() -> String {
    "http://localhost:5173/dashboard/billing/cancel".to_string()
}

fn default_payment_timeout() -> u64 {
    15
}

fn default_signature_tolerance() -> i64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| "Failed to parse configuration file")?;
            Ok(config)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            credits: CreditConfig::default(),
            lessons: LessonConfig::default(),
            generation: GenerationConfig::default(),
            payments: PaymentConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_schedule_defaults() {
        let credits = CreditConfig::default();
        assert_eq!(credits.cost_for("basic"), 1);
        assert_eq!(credits.cost_for("intermediate"), 2);
        assert_eq!(credits.cost_for("advanced"), 3);
        assert_eq!(credits.cost_for("grandmaster"), 1);
    }

    #[test]
    fn test_phase_schedule_defaults() {
        let lessons = LessonConfig::default();
        assert_eq!(lessons.phases_for("basic"), 2);
        assert_eq!(lessons.phases_for("intermediate"), 4);
        assert_eq!(lessons.phases_for("advanced"), 6);
        assert_eq!(lessons.phases_for("unknown"), 2);
    }

    #[test]
    fn test_parse_partial_config() {
        let config: Config = toml::from_str(
            r#"
            [server]
            api_port = 9000

            [credits]
            advanced = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.server.api_port, 9000);
        assert_eq!(config.credits.cost_for("advanced"), 5);
        assert_eq!(config.credits.cost_for("basic"), 1);
        assert_eq!(config.auth.trial_credits, 5);
    }
}

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// User models

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: String,
    pub credits: i64,
    pub trial_credits: i64,
    pub is_unlimited: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }

    pub fn unlimited(&self) -> bool {
        self.is_unlimited != 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub credits: i64,
    pub trial_credits: i64,
    pub is_unlimited: bool,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            credits: user.credits,
            trial_credits: user.trial_credits,
            is_unlimited: user.is_unlimited != 0,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub token_hash: String,
    pub expires_at: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreditBalanceResponse {
    pub credits: i64,
    pub trial_credits: i64,
    pub total_credits: i64,
    pub is_unlimited: bool,
}

// Template models

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Template {
    pub id: String,
    pub title: String,
    pub scenario: String,
    pub skill_level: String,
    pub prompt_text: String,
    pub is_public: i64,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTemplateRequest {
    pub title: String,
    pub scenario: String,
    pub skill_level: String,
    pub prompt_text: String,
    #[serde(default = "default_is_public")]
    pub is_public: bool,
}

fn default_is_public() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct UpdateTemplateRequest {
    pub title: Option<String>,
    pub scenario: Option<String>,
    pub skill_level: Option<String>,
    pub prompt_text: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct TemplateQuery {
    pub scenario: Option<String>,
    pub skill_level: Option<String>,
}

// Pitch models

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Pitch {
    pub id: String,
    pub user_id: String,
    pub template_id: Option<String>,
    pub lesson_id: Option<String>,
    pub scenario: String,
    pub skill_level: String,
    pub phase: i64,
    pub prompt_used: String,
    pub result_text: String,
    pub cost_credits: i64,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct GeneratePitchRequest {
    pub scenario: String,
    pub skill_level: String,
    pub phase: i64,
    pub template_id: Option<String>,
    pub lesson_id: Option<String>,
    pub tone: Option<String>,
    pub length: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GeneratePitchResponse {
    pub pitch: Pitch,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson: Option<UserLesson>,
}

// Lesson models

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserLesson {
    pub id: String,
    pub user_id: String,
    pub scenario: String,
    pub skill_level: String,
    pub current_phase: i64,
    pub total_phases: i64,
    pub status: String,
    pub started_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserLessonRequest {
    pub scenario: String,
    pub skill_level: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserLessonRequest {
    pub current_phase: Option<i64>,
    pub status: Option<String>,
}

// Transaction models

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,
    pub credits_granted: i64,
    pub amount_cents: i64,
    pub status: String,
    pub created_at: String,
    pub completed_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCreditPurchaseRequest {
    pub credits: i64,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub transaction_id: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub url: String,
}

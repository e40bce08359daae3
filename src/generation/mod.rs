//! Pitch text generation.
//!
//! Prompt composition is deterministic so the stored `prompt_used` on a
//! pitch row reproduces exactly what was sent to the model. The network
//! client lives behind the `TextGenerator` trait so handlers and tests
//! never depend on a live endpoint.

mod client;

pub use client::OpenAiGenerator;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("generation service returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("generation service returned an empty completion")]
    EmptyCompletion,
    #[error("generation is not configured (missing api_key)")]
    NotConfigured,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Everything that feeds into one prompt.
#[derive(Debug, Clone)]
pub struct PromptInputs<'a> {
    pub scenario: &'a str,
    pub skill_level: &'a str,
    pub phase: i64,
    pub instructions: Option<&'a str>,
    pub tone: Option<&'a str>,
    pub length: Option<&'a str>,
}

const DEFAULT_INSTRUCTIONS: &str = "Generate a helpful pitch.";
const DEFAULT_TONE: &str = "confident";
const DEFAULT_LENGTH: &str = "medium";

/// Compose the prompt sent to the generation service.
pub fn compose_prompt(inputs: &PromptInputs<'_>) -> String {
    format!(
        "\nScenario: {}\nSkill Level: {}\nPhase: {}\n\nInstructions:\n{}\n\nTone: {}\nLength: {}\n\nGenerate a realistic pitch.\n",
        inputs.scenario,
        inputs.skill_level,
        inputs.phase,
        inputs.instructions.unwrap_or(DEFAULT_INSTRUCTIONS),
        inputs.tone.unwrap_or(DEFAULT_TONE),
        inputs.length.unwrap_or(DEFAULT_LENGTH),
    )
}

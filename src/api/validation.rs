//! Input validation for API requests.
//!
//! For collecting multiple validation errors and returning them as an
//! ApiError, use the `ValidationErrorBuilder` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for a plausible email address
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9][-a-zA-Z0-9]*(\.[a-zA-Z0-9][-a-zA-Z0-9]*)+$"
    ).unwrap();

    /// Regex for validating UUID format
    static ref UUID_REGEX: Regex = Regex::new(
        r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$"
    ).unwrap();
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email address".to_string());
    }

    Ok(())
}

/// Validate a password
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters".to_string());
    }

    if password.len() > 128 {
        return Err("Password is too long (max 128 characters)".to_string());
    }

    Ok(())
}

/// Validate a UUID path or body parameter
pub fn validate_uuid(value: &str, field: &str) -> Result<(), String> {
    if !UUID_REGEX.is_match(value) {
        return Err(format!("{} must be a valid UUID", field));
    }

    Ok(())
}

/// Validate a scenario label (free-form, bounded)
pub fn validate_scenario(scenario: &str) -> Result<(), String> {
    if scenario.trim().is_empty() {
        return Err("Scenario is required".to_string());
    }

    if scenario.len() > 100 {
        return Err("Scenario is too long (max 100 characters)".to_string());
    }

    Ok(())
}

/// Validate a skill level label. Unknown labels are allowed and fall back
/// to the default cost/phase schedule.
pub fn validate_skill_level(skill_level: &str) -> Result<(), String> {
    if skill_level.trim().is_empty() {
        return Err("Skill level is required".to_string());
    }

    if skill_level.len() > 50 {
        return Err("Skill level is too long (max 50 characters)".to_string());
    }

    Ok(())
}

/// Validate a generation phase number
pub fn validate_phase(phase: i64) -> Result<(), String> {
    if phase < 1 {
        return Err("Phase must be at least 1".to_string());
    }

    Ok(())
}

/// Validate a credit purchase amount
pub fn validate_credit_amount(credits: i64) -> Result<(), String> {
    if credits < 1 {
        return Err("Credits must be at least 1".to_string());
    }

    if credits > 1000 {
        return Err("Credits per purchase are capped at 1000".to_string());
    }

    Ok(())
}

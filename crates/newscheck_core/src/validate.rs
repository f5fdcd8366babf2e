//! crates/newscheck_core/src/validate.rs
//!
//! Local input validation. Everything in this module runs before any network
//! call and reports failures as `PortError::Validation`.

use regex::Regex;

use crate::ports::{PortError, PortResult};

/// Minimum number of whitespace-separated words an article must contain.
pub const MIN_ARTICLE_WORDS: usize = 50;

/// Minimum password length accepted at signup and password reset.
pub const MIN_PASSWORD_LEN: usize = 12;

/// Counts words by splitting on runs of whitespace.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Checks that a passage is non-empty and long enough to classify.
pub fn validate_article_text(text: &str) -> PortResult<()> {
    if text.trim().is_empty() {
        return Err(PortError::Validation(
            "Please enter or paste a news article to analyze.".to_string(),
        ));
    }
    let words = word_count(text);
    if words < MIN_ARTICLE_WORDS {
        return Err(PortError::Validation(format!(
            "Please enter at least {MIN_ARTICLE_WORDS} words (you entered {words})."
        )));
    }
    Ok(())
}

/// Enforces the password policy: minimum length, at least one lowercase
/// letter, one uppercase letter, and one digit.
pub fn validate_password(password: &str) -> PortResult<()> {
    let has_lower = Regex::new(r"[a-z]").unwrap();
    let has_upper = Regex::new(r"[A-Z]").unwrap();
    let has_digit = Regex::new(r"[0-9]").unwrap();

    if password.len() < MIN_PASSWORD_LEN {
        return Err(PortError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long."
        )));
    }
    if !has_lower.is_match(password) {
        return Err(PortError::Validation(
            "Password must contain at least one lowercase letter.".to_string(),
        ));
    }
    if !has_upper.is_match(password) {
        return Err(PortError::Validation(
            "Password must contain at least one uppercase letter.".to_string(),
        ));
    }
    if !has_digit.is_match(password) {
        return Err(PortError::Validation(
            "Password must contain at least one number.".to_string(),
        ));
    }
    Ok(())
}

/// Checks a feedback submission's local shape: a non-empty analysis id and a
/// rating between 1 and 5.
pub fn validate_feedback(analysis_id: &str, rating: u8) -> PortResult<()> {
    if analysis_id.trim().is_empty() {
        return Err(PortError::Validation("Invalid prediction ID.".to_string()));
    }
    if !(1..=5).contains(&rating) {
        return Err(PortError::Validation(
            "Please select a rating between 1 and 5.".to_string(),
        ));
    }
    Ok(())
}

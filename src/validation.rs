//! Input validation for announcement text and role names

/// Announcement / role-name validation errors with operator-facing messages
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Message is empty")]
    Empty,

    #[error("Message is too long (maximum {max} characters)")]
    TooLong { max: usize },

    #[error("Role name contains invalid characters")]
    InvalidRoleName,
}

/// Strip control characters other than newline and tab, and trim outer whitespace.
pub fn sanitize_announcement(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Sanitize and check an announcement. Returns the text that should be broadcast.
pub fn validate_announcement(text: &str, max_chars: usize) -> Result<String, ValidationError> {
    let cleaned = sanitize_announcement(text);
    if cleaned.is_empty() {
        return Err(ValidationError::Empty);
    }
    if cleaned.chars().count() > max_chars {
        return Err(ValidationError::TooLong { max: max_chars });
    }
    Ok(cleaned)
}

/// Role names must be non-empty, single-line and free of control characters.
pub fn validate_role_name(name: &str) -> Result<&str, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::InvalidRoleName);
    }
    Ok(trimmed)
}

//! Input validation helpers shared by the model layer and the tool surface.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl ValidationError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ValidationError::Invalid {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Agent names must match `[A-Za-z0-9]+` and be at most 64 characters.
pub fn validate_agent_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() || name.len() > 64 {
        return Err(ValidationError::invalid(
            "agent_name",
            "must be 1-64 characters",
        ));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::invalid(
            "agent_name",
            "must match [A-Za-z0-9]+",
        ));
    }
    Ok(())
}

/// A project key (slug or human_key) must be non-empty and reasonably
/// bounded; the rest of the resolution fuzziness lives in `ProjectBmc`.
pub fn validate_project_key(key: &str) -> Result<(), ValidationError> {
    if key.trim().is_empty() {
        return Err(ValidationError::invalid(
            "project_key",
            "must not be empty",
        ));
    }
    if key.len() > 4096 {
        return Err(ValidationError::invalid("project_key", "too long"));
    }
    Ok(())
}

/// Importance must be one of the four fixed levels.
pub fn validate_importance(value: &str) -> Result<(), ValidationError> {
    match value {
        "low" | "normal" | "high" | "urgent" => Ok(()),
        other => Err(ValidationError::invalid(
            "importance",
            format!("unknown importance level '{other}'"),
        )),
    }
}

/// Contact policy must be one of the four fixed modes.
pub fn validate_contact_policy(value: &str) -> Result<(), ValidationError> {
    match value {
        "open" | "auto" | "contacts_only" | "block_all" => Ok(()),
        other => Err(ValidationError::invalid(
            "contact_policy",
            format!("unknown contact policy '{other}'"),
        )),
    }
}

/// Attachments policy must be one of the three fixed modes.
pub fn validate_attachments_policy(value: &str) -> Result<(), ValidationError> {
    match value {
        "auto" | "file" | "inline" => Ok(()),
        other => Err(ValidationError::invalid(
            "attachments_policy",
            format!("unknown attachments policy '{other}'"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_name_rejects_non_alphanumeric() {
        assert!(validate_agent_name("Green-Castle").is_err());
        assert!(validate_agent_name("GreenCastle").is_ok());
    }

    #[test]
    fn agent_name_rejects_too_long() {
        let long = "a".repeat(65);
        assert!(validate_agent_name(&long).is_err());
    }

    #[test]
    fn project_key_rejects_blank() {
        assert!(validate_project_key("   ").is_err());
    }

    #[test]
    fn importance_accepts_only_fixed_set() {
        assert!(validate_importance("urgent").is_ok());
        assert!(validate_importance("meh").is_err());
    }
}

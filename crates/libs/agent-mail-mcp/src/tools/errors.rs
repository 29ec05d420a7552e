//! Structured error codes for MCP tool responses.
//!
//! Mirrors the stable wire error kinds from [`agent_mail_core::Error::kind`]
//! (`spec.md` §7) one-to-one. Every kind also carries a stable numeric
//! `code` in the 1000s range, so the JSON-RPC `error.code` stays a fixed
//! integer even though the string-valued `kind` (inside `error.data.kind`)
//! is what callers actually key off of.

use rmcp::ErrorData as McpError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    NameExhaustion,
    ContactBlocked,
    ContactConsentRequired,
    FileReservationConflict,
    ArchiveCommitFailed,
    Internal,
}

impl ErrorCode {
    /// Maps an [`agent_mail_core::Error::kind`] string to the matching
    /// `ErrorCode`. Unrecognized kinds (there should be none) fall back to
    /// `Internal`.
    pub fn from_core_kind(kind: &str) -> Self {
        match kind {
            "VALIDATION_ERROR" => Self::ValidationError,
            "NOT_FOUND" => Self::NotFound,
            "NAME_EXHAUSTION" => Self::NameExhaustion,
            "CONTACT_BLOCKED" => Self::ContactBlocked,
            "CONTACT_CONSENT_REQUIRED" => Self::ContactConsentRequired,
            "FILE_RESERVATION_CONFLICT" => Self::FileReservationConflict,
            "ARCHIVE_COMMIT_FAILED" => Self::ArchiveCommitFailed,
            _ => Self::Internal,
        }
    }

    /// The stable numeric code surfaced as the JSON-RPC `error.code`.
    pub fn numeric_code(self) -> i64 {
        match self {
            Self::ValidationError => 1001,
            Self::NotFound => 1002,
            Self::NameExhaustion => 1003,
            Self::ContactBlocked => 1004,
            Self::ContactConsentRequired => 1005,
            Self::FileReservationConflict => 1006,
            Self::ArchiveCommitFailed => 1007,
            Self::Internal => 1099,
        }
    }

    pub fn to_mcp_error(self, message: &str, context: Option<serde_json::Value>) -> McpError {
        let mut data = context.unwrap_or_else(|| serde_json::json!({}));
        if let Some(obj) = data.as_object_mut() {
            obj.insert("kind".to_string(), serde_json::to_value(self).unwrap_or_default());
            obj.insert("code".to_string(), serde_json::json!(self.numeric_code()));
        }

        match self {
            Self::Internal => McpError::internal_error(message.to_string(), Some(data)),
            _ => McpError::invalid_params(message.to_string(), Some(data)),
        }
    }

    pub fn with_suggestions(self, message: &str, suggestions: &[String]) -> McpError {
        self.to_mcp_error(
            message,
            Some(serde_json::json!({ "suggestions": suggestions })),
        )
    }
}

/// Converts any [`agent_mail_core::Error`] into the matching MCP error,
/// carrying its `kind()`, suggestions (if the variant has any), and
/// message.
pub fn from_core_error(err: &agent_mail_core::Error) -> McpError {
    let code = ErrorCode::from_core_kind(err.kind());
    let suggestions = err.suggestions();
    if suggestions.is_empty() {
        code.to_mcp_error(&err.to_string(), None)
    } else {
        code.with_suggestions(&err.to_string(), suggestions)
    }
}

#[macro_export]
macro_rules! mcp_err {
    ($code:expr, $msg:expr) => {
        $code.to_mcp_error($msg, None)
    };
    ($code:expr, $msg:expr, $ctx:tt) => {
        $code.to_mcp_error($msg, Some(serde_json::json!($ctx)))
    };
}

pub use mcp_err;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn error_code_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::ContactBlocked).unwrap();
        assert_eq!(json, "\"CONTACT_BLOCKED\"");
    }

    #[test]
    fn from_core_kind_round_trips_every_wire_kind() {
        assert_eq!(ErrorCode::from_core_kind("VALIDATION_ERROR"), ErrorCode::ValidationError);
        assert_eq!(ErrorCode::from_core_kind("NOT_FOUND"), ErrorCode::NotFound);
        assert_eq!(ErrorCode::from_core_kind("NAME_EXHAUSTION"), ErrorCode::NameExhaustion);
        assert_eq!(ErrorCode::from_core_kind("CONTACT_BLOCKED"), ErrorCode::ContactBlocked);
        assert_eq!(
            ErrorCode::from_core_kind("CONTACT_CONSENT_REQUIRED"),
            ErrorCode::ContactConsentRequired
        );
        assert_eq!(
            ErrorCode::from_core_kind("FILE_RESERVATION_CONFLICT"),
            ErrorCode::FileReservationConflict
        );
        assert_eq!(
            ErrorCode::from_core_kind("ARCHIVE_COMMIT_FAILED"),
            ErrorCode::ArchiveCommitFailed
        );
        assert_eq!(ErrorCode::from_core_kind("INTERNAL"), ErrorCode::Internal);
        assert_eq!(ErrorCode::from_core_kind("anything else"), ErrorCode::Internal);
    }

    #[test]
    fn to_mcp_error_includes_kind_and_numeric_code() {
        let err = ErrorCode::NotFound.to_mcp_error("Agent 'x' not found", None);
        let data = err.data.expect("should have data");
        assert_eq!(data.get("kind").unwrap(), "NOT_FOUND");
        assert_eq!(data.get("code").unwrap(), 1002);
    }

    #[test]
    fn mcp_err_macro_with_context() {
        let err = mcp_err!(
            ErrorCode::ValidationError,
            "bad name",
            { "field": "agent_name" }
        );
        let data = err.data.expect("should have data");
        assert_eq!(data.get("field").unwrap(), "agent_name");
        assert_eq!(data.get("kind").unwrap(), "VALIDATION_ERROR");
    }
}

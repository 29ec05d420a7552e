//! Error types for agent-mail-core operations.
//!
//! Errors are categorized into:
//!
//! - **External errors**: wrapped errors from dependencies (libsql, git2,
//!   serde_json, io)
//! - **Policy/validation errors**: correspond 1:1 to the wire error kinds in
//!   the JSON-RPC surface (`kind()` below)
//! - **Model-specific not-found errors**: entity-specific, carrying fuzzy
//!   "did you mean" suggestions

use strum_macros::AsRefStr;
use thiserror::Error;

/// The error type for agent-mail-core operations.
#[derive(Debug, Error, AsRefStr)]
pub enum Error {
    // -- External errors from dependencies
    #[error("Libsql Error: {0}")]
    Libsql(#[from] libsql::Error),

    #[error("Git Error: {0}")]
    Git2(#[from] git2::Error),

    #[error("Serde JSON Error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    // -- Validation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation error: {0}")]
    Validation(#[from] crate::utils::validation::ValidationError),

    // -- Not found
    #[error("Entity not found")]
    NotFound,

    #[error("Project not found: {identifier}")]
    ProjectNotFound {
        identifier: String,
        suggestions: Vec<String>,
    },

    #[error("Agent not found: {name}")]
    AgentNotFound {
        name: String,
        suggestions: Vec<String>,
    },

    #[error("Message not found: {0}")]
    MessageNotFound(i64),

    #[error("Thread not found: {0}")]
    ThreadNotFound(String),

    #[error("Reservation not found: {0}")]
    ReservationNotFound(String),

    // -- Name generation
    #[error("Unique agent name generation exhausted after {0} attempts")]
    NameExhaustion(u32),

    // -- Contact policy
    #[error("Contact blocked by recipient policy")]
    ContactBlocked,

    #[error("Contact consent required before messaging this recipient")]
    ContactConsentRequired,

    // -- Reservations
    #[error("File reservation conflict: {0}")]
    FileReservationConflict(String),

    // -- Archive
    #[error("Archive commit failed: {0}")]
    ArchiveCommitFailed(String),

    // -- Attachment pipeline
    #[error("Image Error: {0}")]
    Image(#[from] crate::utils::image_processing::ImageError),

    // -- Catch-all
    #[error("Internal error (correlation_id={correlation_id}): {message}")]
    Internal {
        message: String,
        correlation_id: String,
    },
}

impl Error {
    pub fn project_not_found(identifier: impl Into<String>) -> Self {
        Error::ProjectNotFound {
            identifier: identifier.into(),
            suggestions: vec![],
        }
    }

    pub fn project_not_found_with_suggestions(
        identifier: impl Into<String>,
        suggestions: Vec<String>,
    ) -> Self {
        Error::ProjectNotFound {
            identifier: identifier.into(),
            suggestions,
        }
    }

    pub fn agent_not_found(name: impl Into<String>) -> Self {
        Error::AgentNotFound {
            name: name.into(),
            suggestions: vec![],
        }
    }

    pub fn agent_not_found_with_suggestions(
        name: impl Into<String>,
        suggestions: Vec<String>,
    ) -> Self {
        Error::AgentNotFound {
            name: name.into(),
            suggestions,
        }
    }

    pub fn internal(message: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
            correlation_id: correlation_id.into(),
        }
    }

    pub fn suggestions(&self) -> &[String] {
        match self {
            Error::ProjectNotFound { suggestions, .. } => suggestions,
            Error::AgentNotFound { suggestions, .. } => suggestions,
            _ => &[],
        }
    }

    /// The stable wire error kind for this error, per the error-kind table
    /// in the specification's Error Handling Design section.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) | Error::Validation(_) | Error::SerdeJson(_) => {
                "VALIDATION_ERROR"
            }
            Error::NotFound
            | Error::ProjectNotFound { .. }
            | Error::AgentNotFound { .. }
            | Error::MessageNotFound(_)
            | Error::ThreadNotFound(_)
            | Error::ReservationNotFound(_) => "NOT_FOUND",
            Error::NameExhaustion(_) => "NAME_EXHAUSTION",
            Error::ContactBlocked => "CONTACT_BLOCKED",
            Error::ContactConsentRequired => "CONTACT_CONSENT_REQUIRED",
            Error::FileReservationConflict(_) => "FILE_RESERVATION_CONFLICT",
            Error::ArchiveCommitFailed(_) | Error::Git2(_) | Error::Io(_) => {
                "ARCHIVE_COMMIT_FAILED"
            }
            Error::Libsql(_) | Error::Image(_) | Error::Internal { .. } => "INTERNAL",
        }
    }
}

/// A specialized [`Result`] type for agent-mail-core operations.
pub type Result<T> = core::result::Result<T, Error>;

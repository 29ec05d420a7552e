//! Request context.
//!
//! `Ctx` carries the per-request identity and role signalled by the
//! transport layer. The core does not itself authenticate callers or
//! enforce roles beyond the reader/writer distinction (generalized RBAC is
//! explicitly out of scope); `Ctx` exists so that a transport adapter has a
//! single, explicit place to hand that distinction to the core, rather than
//! the core reaching for ambient global state.

/// The access level a caller has been granted by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Reader,
    Writer,
}

#[derive(Debug, Clone)]
pub struct Ctx {
    role: Role,
    /// Correlation id surfaced on `INTERNAL` errors for log correlation.
    correlation_id: String,
}

impl Ctx {
    pub fn new(role: Role, correlation_id: impl Into<String>) -> Self {
        Self {
            role,
            correlation_id: correlation_id.into(),
        }
    }

    /// A context with writer privileges and a fresh correlation id.
    ///
    /// Used by the CLI, background workers, and tests, none of which sit
    /// behind a transport that performs its own authentication.
    pub fn root_ctx() -> Self {
        Self {
            role: Role::Writer,
            correlation_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_writer(&self) -> bool {
        matches!(self.role, Role::Writer)
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

//! Ambient stack shared by every Agent Mail crate: configuration loading,
//! tracing setup, the server-adapter error type, and the CLI "robot help"
//! schema used by `--robot-help` output.

pub mod config;
pub mod error;
pub mod robot;
pub mod tracing;

pub use config::AppConfig;
pub use error::{Result, ServerError};

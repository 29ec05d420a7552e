//! Application configuration.
//!
//! `AppConfig` is loaded once at process start (CLI, HTTP, or stdio entry
//! point) via [`AppConfig::load`], which layers defaults, an optional
//! `agent-mail.toml` file, and environment variables (`AGENT_MAIL_*`) using
//! the `config` crate. Every name from the specification's configuration
//! section is represented here as a typed field; nothing downstream reaches
//! for `std::env::var` directly for a value this struct already owns.

use serde::{Deserialize, Serialize};

/// Root of the on-disk archive and index store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: "./data/agent-mail".to_string(),
        }
    }
}

/// Attachment pipeline switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    pub convert_images: bool,
    pub inline_image_max_bytes: i64,
    pub keep_original_images: bool,
    pub webp_quality: f32,
    pub webp_method: i32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            convert_images: true,
            inline_image_max_bytes: 64 * 1024,
            keep_original_images: false,
            webp_quality: 80.0,
            webp_method: 6,
        }
    }
}

/// File reservation enforcement switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimsConfig {
    pub enforcement_enabled: bool,
}

impl Default for ClaimsConfig {
    fn default() -> Self {
        Self {
            enforcement_enabled: false,
        }
    }
}

/// ACK-TTL escalation worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckConfig {
    pub ttl_enabled: bool,
    pub ttl_seconds: i64,
    pub scan_interval_seconds: u64,
    /// "log" or "claim"
    pub escalation_mode: String,
    pub escalation_claim_ttl_seconds: i64,
    pub escalation_claim_exclusive: bool,
    pub escalation_claim_holder_name: String,
}

impl Default for AckConfig {
    fn default() -> Self {
        Self {
            ttl_enabled: false,
            ttl_seconds: 3600,
            scan_interval_seconds: 60,
            escalation_mode: "log".to_string(),
            escalation_claim_ttl_seconds: 1800,
            escalation_claim_exclusive: true,
            escalation_claim_holder_name: "ops-escalation".to_string(),
        }
    }
}

/// Contact Policy Engine master switch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactConfig {
    pub enforcement_enabled: bool,
    /// Sliding window (seconds) for the "prior direct message" auto-allow rule.
    pub auto_allow_window_seconds: i64,
    /// Default approval TTL (seconds) for `respond_contact`, absent an
    /// explicit `ttl` argument. Defaults to 30 days.
    pub default_approval_ttl_seconds: i64,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            enforcement_enabled: true,
            auto_allow_window_seconds: 7 * 24 * 3600,
            default_approval_ttl_seconds: 30 * 24 * 3600,
        }
    }
}

/// Transport-level settings the distilled spec places out of scope but
/// which a real binary still needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    pub port: u16,
    pub path: String,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            port: 8787,
            path: "/mcp".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub claims: ClaimsConfig,
    #[serde(default)]
    pub ack: AckConfig,
    #[serde(default)]
    pub contact: ContactConfig,
    #[serde(default)]
    pub mcp: McpConfig,
}

impl AppConfig {
    /// Layer defaults -> `agent-mail.toml` (if present) -> `AGENT_MAIL_*`
    /// environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let defaults = AppConfig::default();
        let builder = config::Config::builder()
            .add_source(config::Config::try_from(&defaults)?)
            .add_source(config::File::with_name("agent-mail").required(false))
            .add_source(
                config::Environment::with_prefix("AGENT_MAIL")
                    .separator("__")
                    .try_parsing(true),
            );
        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = AppConfig::default();
        assert!(cfg.images.convert_images);
        assert_eq!(cfg.ack.escalation_mode, "log");
        assert_eq!(cfg.claims.enforcement_enabled, false);
    }
}

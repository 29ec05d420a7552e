//! Parameter structs for every MCP tool, deserialized from the JSON-RPC
//! `arguments` object and validated against the schema `rmcp`'s macros
//! derive from `schemars::JsonSchema`.

use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EnsureProjectParams {
    /// Absolute path or other stable human key identifying the project.
    pub human_key: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetProjectParams {
    pub project_slug: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RegisterAgentParams {
    pub project_slug: String,
    /// Preferred agent name; a memorable name is generated if omitted or taken.
    pub name_hint: Option<String>,
    pub program: Option<String>,
    pub model: Option<String>,
    pub task: Option<String>,
    pub attachments_policy: Option<String>,
    pub contact_policy: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WhoisParams {
    pub project_slug: String,
    pub agent_name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListAgentsParams {
    pub project_slug: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SetContactPolicyParams {
    pub project_slug: String,
    pub agent_name: String,
    /// One of `open`, `auto`, `contacts_only`, `block_all`.
    pub policy: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SendMessageParams {
    pub project_slug: String,
    pub sender_name: String,
    /// Comma-separated agent names.
    pub to: String,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body_md: String,
    pub thread_id: Option<String>,
    #[serde(default = "default_importance")]
    pub importance: String,
    pub ack_required: Option<bool>,
    /// Paths (relative to the project archive root, or absolute) to attach.
    #[serde(default)]
    pub attachment_paths: Vec<String>,
    pub image_embed_policy: Option<String>,
    pub convert_images: Option<bool>,
    /// Auto-request contact with any recipient the Contact Policy Engine blocks.
    #[serde(default)]
    pub auto_contact_if_blocked: bool,
}

fn default_importance() -> String {
    "normal".to_string()
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReplyMessageParams {
    pub message_id: i64,
    pub sender_name: String,
    pub body_md: String,
    pub to: Option<String>,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub subject_prefix: Option<String>,
    pub importance: Option<String>,
    pub ack_required: Option<bool>,
    #[serde(default)]
    pub attachment_paths: Vec<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListInboxParams {
    pub project_slug: String,
    pub agent_name: String,
    pub since_ts: Option<String>,
    #[serde(default)]
    pub urgent_only: bool,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetMessageParams {
    pub message_id: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetThreadParams {
    pub project_slug: String,
    pub thread_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MarkMessageReadParams {
    pub agent_name: String,
    pub message_id: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AcknowledgeMessageParams {
    pub agent_name: String,
    pub message_id: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchMessagesParams {
    pub project_slug: String,
    pub query: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SummarizeThreadParams {
    pub project_slug: String,
    pub thread_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SummarizeThreadsParams {
    pub project_slug: String,
    pub since_ts: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ClaimPathsParams {
    pub project_slug: String,
    pub agent_name: String,
    pub patterns: Vec<String>,
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: i64,
    #[serde(default = "default_true")]
    pub exclusive: bool,
    pub reason: Option<String>,
    #[serde(default)]
    pub all_or_nothing: bool,
}

fn default_ttl_seconds() -> i64 {
    1800
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReleaseClaimsParams {
    pub project_slug: String,
    pub agent_name: String,
    pub patterns: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RenewClaimsParams {
    pub project_slug: String,
    pub agent_name: String,
    pub extend_seconds: i64,
    pub patterns: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListClaimsParams {
    pub project_slug: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ForceReleaseClaimParams {
    pub reservation_id: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RequestContactParams {
    pub project_slug: String,
    pub from_agent: String,
    pub to_agent: String,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RespondContactParams {
    pub project_slug: String,
    pub to_agent: String,
    pub from_agent: String,
    pub accept: bool,
    pub ttl_seconds: Option<i64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListContactsParams {
    pub project_slug: String,
    pub agent_name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct InstallGuardHookParams {
    pub project_slug: String,
    /// Path to the target git repository to install the hook into.
    pub target_repo_path: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UninstallGuardHookParams {
    pub target_repo_path: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListProjectsParams {}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct HealthCheckParams {}

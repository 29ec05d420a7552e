//! Pre-commit Guard Hook tool implementations.
//!
//! Wraps [`agent_mail_core::guard`], which is synchronous file I/O; the
//! only async step here is resolving `project_slug` to the project's
//! archive root the hook script should read `claims/*.json` from.

use agent_mail_core::{ctx::Ctx, model::ModelManager, store::fs_store};
use rmcp::{model::CallToolResult, ErrorData as McpError};
use std::path::Path;
use std::sync::Arc;

use super::errors::ErrorCode;
use super::helpers::{self, json_result};
use super::params::{InstallGuardHookParams, UninstallGuardHookParams};

/// Installs the pre-commit guard script into `target_repo_path`, wired to
/// read claim artifacts from `project_slug`'s archive tree.
pub async fn install_precommit_guard_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: InstallGuardHookParams,
) -> Result<CallToolResult, McpError> {
    let project = helpers::resolve_project(ctx, mm, &params.project_slug).await?;
    let archive_root = fs_store::project_repo_root(&mm.repo_root, &project.slug);
    let target_repo = Path::new(&params.target_repo_path);

    let hook_path = agent_mail_core::guard::install(target_repo, &archive_root).map_err(|e| {
        ErrorCode::Internal.to_mcp_error(&format!("failed to install guard hook: {e}"), None)
    })?;

    json_result(&serde_json::json!({
        "hook_path": hook_path.display().to_string(),
        "project_slug": project.slug,
    }))
}

/// Removes a previously installed guard hook, leaving any foreign hook
/// untouched.
pub async fn uninstall_precommit_guard_impl(
    _ctx: &Ctx,
    _mm: &Arc<ModelManager>,
    params: UninstallGuardHookParams,
) -> Result<CallToolResult, McpError> {
    let target_repo = Path::new(&params.target_repo_path);
    let removed = agent_mail_core::guard::uninstall(target_repo).map_err(|e| {
        ErrorCode::Internal.to_mcp_error(&format!("failed to uninstall guard hook: {e}"), None)
    })?;

    json_result(&serde_json::json!({ "removed": removed }))
}

//! Common helper functions for MCP tools.
//!
//! Resolves the loose string identifiers that arrive over the wire
//! (`project_slug`, `agent_name`) into typed core entities, translating
//! every [`agent_mail_core::Error`] into a structured [`McpError`] via
//! [`crate::tools::errors::from_core_error`] along the way.

use agent_mail_core::{
    ctx::Ctx,
    model::{
        agent::{Agent, AgentBmc},
        project::{Project, ProjectBmc},
        ModelManager,
    },
    types::AgentId,
    utils::validation::{validate_agent_name, validate_project_key},
};
use rmcp::model::{CallToolResult, Content};
use rmcp::ErrorData as McpError;
use serde::Serialize;
use std::sync::Arc;

use crate::tools::errors::{from_core_error, mcp_err, ErrorCode};

/// Serializes `value` to pretty JSON and wraps it as a successful tool
/// result's sole text content block. Every tool in this crate returns its
/// structured result this way rather than hand-formatting prose, so
/// callers can parse the response instead of scraping it.
pub fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| {
        ErrorCode::Internal.to_mcp_error(&format!("failed to serialize result: {e}"), None)
    })?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

/// Resolve a project by slug or human_key.
pub async fn resolve_project(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    slug: &str,
) -> Result<Project, McpError> {
    if let Err(e) = validate_project_key(slug) {
        return Err(mcp_err!(
            ErrorCode::ValidationError,
            &e.to_string(),
            { "project_slug": slug }
        ));
    }

    ProjectBmc::get_by_identifier(ctx, mm, slug)
        .await
        .map_err(|e| from_core_error(&e))
}

/// Resolve an agent by name within a project.
pub async fn resolve_agent(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    project_id: i64,
    agent_name: &str,
) -> Result<Agent, McpError> {
    if let Err(e) = validate_agent_name(agent_name) {
        return Err(mcp_err!(
            ErrorCode::ValidationError,
            &e.to_string(),
            { "agent_name": agent_name }
        ));
    }

    AgentBmc::get_by_name(
        ctx,
        mm,
        agent_mail_core::types::ProjectId::new(project_id),
        agent_name,
    )
    .await
    .map_err(|e| from_core_error(&e))
}

/// Resolve project and agent in one call.
pub async fn resolve_project_and_agent(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    project_slug: &str,
    agent_name: &str,
) -> Result<(Project, Agent), McpError> {
    let project = resolve_project(ctx, mm, project_slug).await?;
    let agent = resolve_agent(ctx, mm, project.id.get(), agent_name).await?;
    Ok((project, agent))
}

/// Parses comma-separated agent names and resolves them to ids.
pub async fn resolve_agent_names(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    project_id: i64,
    names_csv: &str,
) -> Result<Vec<AgentId>, McpError> {
    let mut ids = Vec::new();
    for name in names_csv
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
    {
        let agent = resolve_agent(ctx, mm, project_id, name).await?;
        ids.push(agent.id);
    }
    Ok(ids)
}

/// Parses an optional comma-separated agent-name list into ids, defaulting
/// to an empty `Vec` (never `None`) since
/// [`agent_mail_core::model::message::MessageForSend`] takes plain `Vec`s
/// for `cc`/`bcc`.
pub async fn resolve_optional_agent_names(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    project_id: i64,
    names_csv: Option<&str>,
) -> Result<Vec<AgentId>, McpError> {
    match names_csv {
        Some(names) if !names.trim().is_empty() => resolve_agent_names(ctx, mm, project_id, names).await,
        _ => Ok(Vec::new()),
    }
}

//! Project and agent-registry tool implementations.

use agent_mail_core::{
    ctx::Ctx,
    model::{
        agent::{AgentBmc, AgentForRegister},
        project::ProjectBmc,
        ModelManager,
    },
};
use rmcp::{model::CallToolResult, ErrorData as McpError};
use std::sync::Arc;

use super::errors::from_core_error;
use super::helpers::{self, json_result};
use super::params::{
    EnsureProjectParams, GetProjectParams, ListAgentsParams, ListProjectsParams,
    RegisterAgentParams, SetContactPolicyParams, WhoisParams,
};

/// Creates (or returns the existing) project for a human-readable key.
pub async fn ensure_project_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: EnsureProjectParams,
) -> Result<CallToolResult, McpError> {
    let project = ProjectBmc::ensure_project(ctx, mm, &params.human_key)
        .await
        .map_err(|e| from_core_error(&e))?;
    json_result(&project)
}

/// Fetches a project by slug or human_key.
pub async fn get_project_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: GetProjectParams,
) -> Result<CallToolResult, McpError> {
    let project = helpers::resolve_project(ctx, mm, &params.project_slug).await?;
    json_result(&project)
}

/// Lists every known project.
pub async fn list_projects_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    _params: ListProjectsParams,
) -> Result<CallToolResult, McpError> {
    let projects = ProjectBmc::list_all(ctx, mm).await.map_err(|e| from_core_error(&e))?;
    json_result(&projects)
}

/// Registers an agent, idempotent on `(project, name_hint)`.
pub async fn register_agent_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: RegisterAgentParams,
) -> Result<CallToolResult, McpError> {
    let project = helpers::resolve_project(ctx, mm, &params.project_slug).await?;

    let agent = AgentBmc::register(
        ctx,
        mm,
        AgentForRegister {
            project_id: project.id,
            name_hint: params.name_hint,
            program: params.program,
            model: params.model,
            task: params.task,
            attachments_policy: params.attachments_policy,
            contact_policy: params.contact_policy,
        },
    )
    .await
    .map_err(|e| from_core_error(&e))?;
    json_result(&agent)
}

/// Looks up an agent's registry entry by name.
pub async fn whois_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: WhoisParams,
) -> Result<CallToolResult, McpError> {
    let (_project, agent) =
        helpers::resolve_project_and_agent(ctx, mm, &params.project_slug, &params.agent_name).await?;
    json_result(&agent)
}

/// Lists every agent registered in a project.
pub async fn list_agents_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: ListAgentsParams,
) -> Result<CallToolResult, McpError> {
    let project = helpers::resolve_project(ctx, mm, &params.project_slug).await?;
    let agents = AgentBmc::list_all_for_project(ctx, mm, project.id)
        .await
        .map_err(|e| from_core_error(&e))?;
    json_result(&agents)
}

/// Sets an agent's contact policy (`open`, `auto`, `contacts_only`, `block_all`).
pub async fn set_contact_policy_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: SetContactPolicyParams,
) -> Result<CallToolResult, McpError> {
    let (_project, agent) =
        helpers::resolve_project_and_agent(ctx, mm, &params.project_slug, &params.agent_name).await?;
    AgentBmc::set_contact_policy(ctx, mm, agent.id, &params.policy)
        .await
        .map_err(|e| from_core_error(&e))?;
    json_result(&serde_json::json!({
        "agent_name": params.agent_name,
        "contact_policy": params.policy,
    }))
}

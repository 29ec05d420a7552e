//! Contact Policy Engine tool implementations.

use agent_mail_core::{
    ctx::Ctx,
    model::{contact::ContactLinkBmc, ModelManager},
};
use rmcp::{model::CallToolResult, ErrorData as McpError};
use std::sync::Arc;

use super::errors::from_core_error;
use super::helpers::{self, json_result};
use super::params::{ListContactsParams, RequestContactParams, RespondContactParams};

/// Requests (or re-requests) a contact link between two agents.
pub async fn request_contact_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: RequestContactParams,
) -> Result<CallToolResult, McpError> {
    let project = helpers::resolve_project(ctx, mm, &params.project_slug).await?;
    let from = helpers::resolve_agent(ctx, mm, project.id.get(), &params.from_agent).await?;
    let to = helpers::resolve_agent(ctx, mm, project.id.get(), &params.to_agent).await?;

    let link = ContactLinkBmc::request_contact(ctx, mm, project.id, from.id, to.id, params.reason)
        .await
        .map_err(|e| from_core_error(&e))?;
    json_result(&link)
}

/// Approves or denies a pending contact request.
pub async fn respond_contact_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: RespondContactParams,
) -> Result<CallToolResult, McpError> {
    let project = helpers::resolve_project(ctx, mm, &params.project_slug).await?;
    let to = helpers::resolve_agent(ctx, mm, project.id.get(), &params.to_agent).await?;
    let from = helpers::resolve_agent(ctx, mm, project.id.get(), &params.from_agent).await?;

    let link = ContactLinkBmc::respond_contact(
        ctx,
        mm,
        project.id,
        to.id,
        from.id,
        params.accept,
        params.ttl_seconds,
    )
    .await
    .map_err(|e| from_core_error(&e))?;
    json_result(&link)
}

/// Lists every contact link involving an agent.
pub async fn list_contacts_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: ListContactsParams,
) -> Result<CallToolResult, McpError> {
    let (project, agent) =
        helpers::resolve_project_and_agent(ctx, mm, &params.project_slug, &params.agent_name).await?;
    let links = ContactLinkBmc::list_contacts(ctx, mm, project.id, agent.id)
        .await
        .map_err(|e| from_core_error(&e))?;
    json_result(&links)
}

//! File Reservation ("claim") tool implementations.

use agent_mail_core::{
    ctx::Ctx,
    model::{reservation::ReservationBmc, ModelManager},
    types::ReservationId,
};
use rmcp::{model::CallToolResult, ErrorData as McpError};
use std::sync::Arc;

use super::errors::from_core_error;
use super::helpers::{self, json_result};
use super::params::{
    ClaimPathsParams, ForceReleaseClaimParams, ListClaimsParams, ReleaseClaimsParams,
    RenewClaimsParams,
};

/// Reserves one or more path-glob patterns for an agent.
pub async fn claim_paths_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: ClaimPathsParams,
) -> Result<CallToolResult, McpError> {
    let (project, agent) =
        helpers::resolve_project_and_agent(ctx, mm, &params.project_slug, &params.agent_name).await?;

    let result = ReservationBmc::reserve(
        ctx,
        mm,
        project.id,
        agent.id,
        &params.patterns,
        params.ttl_seconds,
        params.exclusive,
        params.reason,
        params.all_or_nothing,
    )
    .await
    .map_err(|e| from_core_error(&e))?;
    json_result(&result)
}

/// Releases an agent's active leases, optionally restricted to `patterns`.
pub async fn release_claims_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: ReleaseClaimsParams,
) -> Result<CallToolResult, McpError> {
    let (project, agent) =
        helpers::resolve_project_and_agent(ctx, mm, &params.project_slug, &params.agent_name).await?;

    let released = ReservationBmc::release(ctx, mm, project.id, agent.id, params.patterns.as_deref())
        .await
        .map_err(|e| from_core_error(&e))?;
    json_result(&serde_json::json!({ "released_count": released }))
}

/// Extends an agent's active leases by `extend_seconds`.
pub async fn renew_claims_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: RenewClaimsParams,
) -> Result<CallToolResult, McpError> {
    let (project, agent) =
        helpers::resolve_project_and_agent(ctx, mm, &params.project_slug, &params.agent_name).await?;

    let renewed = ReservationBmc::renew(
        ctx,
        mm,
        project.id,
        agent.id,
        params.extend_seconds,
        params.patterns.as_deref(),
    )
    .await
    .map_err(|e| from_core_error(&e))?;
    json_result(&renewed)
}

/// Lists every active reservation in a project.
pub async fn list_claims_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: ListClaimsParams,
) -> Result<CallToolResult, McpError> {
    let project = helpers::resolve_project(ctx, mm, &params.project_slug).await?;
    let reservations = ReservationBmc::list_active_for_project(ctx, mm, project.id)
        .await
        .map_err(|e| from_core_error(&e))?;
    json_result(&reservations)
}

/// Operator-privileged release of a reservation regardless of its holder.
/// Requires a writer-role [`Ctx`].
pub async fn force_release_claim_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: ForceReleaseClaimParams,
) -> Result<CallToolResult, McpError> {
    ReservationBmc::force_release(ctx, mm, ReservationId::new(params.reservation_id))
        .await
        .map_err(|e| from_core_error(&e))?;
    json_result(&serde_json::json!({
        "reservation_id": params.reservation_id,
        "status": "released",
    }))
}

//! Tool/Resource Registry (`spec.md` §4.10).
//!
//! One `#[tool_router]`-annotated [`AgentMailService`] exposes every
//! writer/reader verb from `spec.md` §6.2 as an MCP tool, plus
//! `resources/read` handling for every URI in §6.3. Call counters, error
//! counters, and a recent-usage ring buffer live in
//! [`agent_mail_core::model::ModelManager::tool_metrics`] and back
//! `resource://tooling/metrics` and `resource://tooling/recent`.
//!
//! No verb here is implemented as a composite that calls another verb by
//! name: `spec.md` §4.10 scopes macro/composite verbs out entirely, so the
//! registry below is a flat one tool-name-to-one-`_impl`-function mapping.

pub mod contacts;
pub mod errors;
pub mod guard;
pub mod helpers;
pub mod messaging;
mod params;
pub mod projects;
pub mod reservations;

pub use params::*;

use agent_mail_common::config::AppConfig;
use agent_mail_core::{
    ctx::Ctx,
    model::{
        agent::AgentBmc,
        message::{InboxEntry, Message, MessageBmc},
        project::ProjectBmc,
        reservation::ReservationBmc,
        ModelManager,
    },
    types::MessageId,
};
use anyhow::Result;
use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters, ServerHandler},
    model::{
        CallToolRequestParam, CallToolResult, ListResourcesResult, ListToolsResult,
        PaginatedRequestParam, RawResource, ReadResourceRequestParam, ReadResourceResult, Resource,
        ResourceContents,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router, ErrorData as McpError,
};
use serde::Serialize;
use std::sync::Arc;

use self::errors::ErrorCode;
use self::helpers::json_result;

/// One entry in the schema export surfaced by [`get_tool_schemas`] (used by
/// `resource://tooling/directory`; the wire protocol itself derives its
/// schemas from `schemars` via the `#[tool]` macros below).
#[derive(Debug, Clone, Serialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub writer: bool,
}

/// Every verb in `spec.md` §6.2, in registry order.
fn all_tool_schemas() -> Vec<ToolSchema> {
    macro_rules! s {
        ($name:literal, $desc:literal, writer = $w:literal) => {
            ToolSchema { name: $name.into(), description: $desc.into(), writer: $w }
        };
    }
    vec![
        s!("health_check", "Report server liveness and archive root.", writer = false),
        s!("ensure_project", "Create or fetch a project by human_key, idempotently.", writer = true),
        s!("get_project", "Fetch a project by slug or human_key.", writer = false),
        s!("list_projects", "List every known project.", writer = false),
        s!("register_agent", "Register an agent in a project, idempotent on (project, name_hint).", writer = true),
        s!("whois", "Look up an agent's registry entry by name.", writer = false),
        s!("list_agents", "List every agent registered in a project.", writer = false),
        s!("set_contact_policy", "Set an agent's contact policy.", writer = true),
        s!("send_message", "Compose and fan out a message to one or more recipients.", writer = true),
        s!("reply_message", "Reply to an existing message, inheriting its thread.", writer = true),
        s!("list_inbox", "List an agent's received messages, newest first.", writer = false),
        s!("get_message", "Fetch a single message by id.", writer = false),
        s!("mark_message_read", "Mark a message read by the given agent.", writer = true),
        s!("acknowledge_message", "Acknowledge a message requiring acknowledgment.", writer = true),
        s!("get_thread", "List every message in a thread, oldest first.", writer = false),
        s!("search_messages", "Full-text search subjects/bodies within a project.", writer = false),
        s!("summarize_thread", "Digest a thread into participants, key points, and actions.", writer = false),
        s!("summarize_threads", "Digest every thread with activity since a timestamp.", writer = false),
        s!("claim_paths", "Reserve one or more path-glob patterns for an agent.", writer = true),
        s!("release_claims", "Release an agent's active leases.", writer = true),
        s!("renew_claims", "Extend an agent's active leases.", writer = true),
        s!("list_claims", "List every active reservation in a project.", writer = false),
        s!("force_release_file_reservation", "Operator-privileged release of a reservation.", writer = true),
        s!("request_contact", "Request (or re-request) a contact link between two agents.", writer = true),
        s!("respond_contact", "Approve or deny a pending contact request.", writer = true),
        s!("list_contacts", "List every contact link involving an agent.", writer = false),
        s!("install_precommit_guard", "Install the pre-commit reservation guard into a repo.", writer = true),
        s!("uninstall_precommit_guard", "Remove a previously installed guard hook.", writer = true),
    ]
}

/// Returns the registry's tool directory. `worktrees_enabled` is accepted
/// for symmetry with the teacher's schema-export signature; this spec has
/// no worktree/build-slot tools to filter, so it has no effect.
pub fn get_tool_schemas(_worktrees_enabled: bool) -> Vec<ToolSchema> {
    all_tool_schemas()
}

/// The MCP tool/resource registry: one long-lived handle wrapping a shared
/// [`ModelManager`], dispatching every verb in `spec.md` §6.2 and every
/// resource URI in §6.3.
#[derive(Clone)]
pub struct AgentMailService {
    mm: Arc<ModelManager>,
    tool_router: ToolRouter<Self>,
}

impl AgentMailService {
    pub async fn new() -> Result<Self> {
        let config = AppConfig::load().unwrap_or_default();
        Self::new_with_config(config).await
    }

    pub async fn new_with_config(config: AppConfig) -> Result<Self> {
        let mm = Arc::new(ModelManager::new(Arc::new(config)).await?);
        Ok(Self::new_with_mm(mm))
    }

    /// Builds a service over an already-constructed [`ModelManager`], used
    /// by tests and by any host process that manages the manager's
    /// lifetime itself.
    pub fn new_with_mm(mm: Arc<ModelManager>) -> Self {
        Self { mm, tool_router: Self::tool_router() }
    }

    fn ctx(&self) -> Ctx {
        Ctx::root_ctx()
    }

    async fn record_metric(&self, tool_name: &str, duration: std::time::Duration, ok: bool) {
        if let Ok(mut metrics) = self.mm.tool_metrics.lock() {
            metrics.record(tool_name, ok, duration.as_millis() as u64);
        } else {
            tracing::warn!(tool = %tool_name, "tool metrics mutex poisoned, dropping sample");
        }
    }

    /// Dispatches every `resource://...` URI from `spec.md` §6.3.
    pub async fn read_resource_impl(
        &self,
        request: ReadResourceRequestParam,
    ) -> Result<ReadResourceResult, McpError> {
        let uri_str = request.uri.clone();
        let uri = url::Url::parse(&uri_str)
            .map_err(|e| McpError::invalid_params(format!("invalid resource uri: {e}"), None))?;
        if uri.scheme() != "resource" {
            return Err(McpError::invalid_params(
                "resource uri must use the resource:// scheme".to_string(),
                None,
            ));
        }

        let resource_type = uri
            .host_str()
            .ok_or_else(|| McpError::invalid_params("resource uri missing name".to_string(), None))?
            .to_string();
        let segments: Vec<String> = uri
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();
        let query: std::collections::HashMap<String, String> =
            uri.query_pairs().into_owned().collect();

        let ctx = self.ctx();
        let text = self.resolve_resource(&ctx, &resource_type, &segments, &query).await?;

        Ok(ReadResourceResult {
            contents: vec![ResourceContents::TextResourceContents {
                uri: uri_str,
                mime_type: Some("application/json".to_string()),
                text,
                meta: None,
            }],
        })
    }

    async fn resolve_resource(
        &self,
        ctx: &Ctx,
        resource_type: &str,
        segments: &[String],
        query: &std::collections::HashMap<String, String>,
    ) -> Result<String, McpError> {
        let mm = &self.mm;
        let positional = segments.first().map(String::as_str);
        let limit = query.get("limit").and_then(|v| v.parse::<i64>().ok()).unwrap_or(20);
        let include_bodies = query.get("include_bodies").is_some_and(|v| v == "true" || v == "1");
        let urgent_only = query.get("urgent_only").is_some_and(|v| v == "true" || v == "1");

        match resource_type {
            "projects" => {
                let projects = ProjectBmc::list_all(ctx, mm).await.map_err(|e| errors::from_core_error(&e))?;
                to_json(&projects)
            }
            "project" => {
                let slug = positional
                    .ok_or_else(|| McpError::invalid_params("resource://project/{slug} requires a slug", None))?;
                let project = helpers::resolve_project(ctx, mm, slug).await?;
                let agents = AgentBmc::list_all_for_project(ctx, mm, project.id)
                    .await
                    .map_err(|e| errors::from_core_error(&e))?;
                to_json(&serde_json::json!({ "project": project, "agents": agents }))
            }
            "agents" => {
                let key = positional.ok_or_else(|| {
                    McpError::invalid_params("resource://agents/{slug_or_human_key} requires an identifier", None)
                })?;
                let project = helpers::resolve_project(ctx, mm, key).await?;
                let agents = AgentBmc::list_all_for_project(ctx, mm, project.id)
                    .await
                    .map_err(|e| errors::from_core_error(&e))?;
                let mut out = Vec::with_capacity(agents.len());
                for agent in agents {
                    let inbox = MessageBmc::fetch_inbox(ctx, mm, project.id, agent.id, None, false, i64::MAX)
                        .await
                        .map_err(|e| errors::from_core_error(&e))?;
                    let unread = inbox.iter().filter(|e| e.read_ts.is_none()).count();
                    out.push(serde_json::json!({ "agent": agent, "unread_count": unread }));
                }
                to_json(&out)
            }
            "inbox" | "outbox" => {
                let agent_name = positional.ok_or_else(|| {
                    McpError::invalid_params(format!("resource://{resource_type}/{{agent}} requires an agent name"), None)
                })?;
                let project_slug = query.get("project").ok_or_else(|| {
                    McpError::invalid_params(
                        "resource://inbox|outbox requires ?project= to resolve the agent unambiguously",
                        None,
                    )
                })?;
                let (project, agent) = helpers::resolve_project_and_agent(ctx, mm, project_slug, agent_name).await?;
                let since_ts = parse_since_ts(query.get("since_ts"))?;
                if resource_type == "inbox" {
                    let entries = MessageBmc::fetch_inbox(ctx, mm, project.id, agent.id, since_ts, urgent_only, limit)
                        .await
                        .map_err(|e| errors::from_core_error(&e))?;
                    to_json(&redact_entry_bodies(entries, include_bodies))
                } else {
                    let sent = MessageBmc::list_recent(ctx, mm, project.id, limit.max(200))
                        .await
                        .map_err(|e| errors::from_core_error(&e))?
                        .into_iter()
                        .filter(|m| m.sender_id == agent.id)
                        .take(limit.max(0) as usize)
                        .map(|m| if include_bodies { m } else { without_body(m) })
                        .collect::<Vec<_>>();
                    to_json(&sent)
                }
            }
            "message" => {
                let id = positional
                    .ok_or_else(|| McpError::invalid_params("resource://message/{id} requires an id", None))?
                    .parse::<i64>()
                    .map_err(|_| McpError::invalid_params("message id must be numeric", None))?;
                let message = MessageBmc::get(ctx, mm, MessageId::new(id))
                    .await
                    .map_err(|e| errors::from_core_error(&e))?;
                to_json(&message)
            }
            "thread" => {
                let thread_id = positional
                    .ok_or_else(|| McpError::invalid_params("resource://thread/{thread_id} requires a thread id", None))?;
                let project_slug = query
                    .get("project")
                    .ok_or_else(|| McpError::invalid_params("resource://thread requires ?project=", None))?;
                let project = helpers::resolve_project(ctx, mm, project_slug).await?;
                let messages = MessageBmc::list_by_thread(ctx, mm, project.id, thread_id)
                    .await
                    .map_err(|e| errors::from_core_error(&e))?
                    .into_iter()
                    .map(|m| if include_bodies { m } else { without_body(m) })
                    .collect::<Vec<_>>();
                to_json(&messages)
            }
            "claims" => {
                let slug = positional
                    .ok_or_else(|| McpError::invalid_params("resource://claims/{slug} requires a project slug", None))?;
                let project = helpers::resolve_project(ctx, mm, slug).await?;
                let reservations = ReservationBmc::list_active_for_project(ctx, mm, project.id)
                    .await
                    .map_err(|e| errors::from_core_error(&e))?;
                to_json(&reservations)
            }
            "views" => {
                let view = positional.ok_or_else(|| {
                    McpError::invalid_params("resource://views/{name}/{agent} requires a view name", None)
                })?;
                let agent_name = segments.get(1).map(String::as_str).ok_or_else(|| {
                    McpError::invalid_params("resource://views/{name}/{agent} requires an agent name", None)
                })?;
                let project_slug = query
                    .get("project")
                    .ok_or_else(|| McpError::invalid_params("views require ?project=<slug>", None))?;
                self.resolve_view_resource(ctx, view, project_slug, agent_name, query, limit)
                    .await
            }
            "tooling" => {
                let which = positional
                    .ok_or_else(|| McpError::invalid_params("resource://tooling/{directory|metrics|recent}", None))?;
                match which {
                    "directory" => to_json(&all_tool_schemas()),
                    "metrics" => {
                        let metrics = self
                            .mm
                            .tool_metrics
                            .lock()
                            .map_err(|_| ErrorCode::Internal.to_mcp_error("tool metrics lock poisoned", None))?;
                        to_json(&metrics.counters())
                    }
                    "recent" => {
                        let metrics = self
                            .mm
                            .tool_metrics
                            .lock()
                            .map_err(|_| ErrorCode::Internal.to_mcp_error("tool metrics lock poisoned", None))?;
                        to_json(&metrics.recent(limit.max(0) as usize))
                    }
                    other => Err(McpError::invalid_params(format!("unknown tooling resource: {other}"), None)),
                }
            }
            other => Err(McpError::invalid_params(format!("unknown resource type: {other}"), None)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn resolve_view_resource(
        &self,
        ctx: &Ctx,
        view: &str,
        project_slug: &str,
        agent_name: &str,
        query: &std::collections::HashMap<String, String>,
        limit: i64,
    ) -> Result<String, McpError> {
        let mm = &self.mm;
        let (project, agent) = helpers::resolve_project_and_agent(ctx, mm, project_slug, agent_name).await?;

        match view {
            "urgent-unread" => {
                let entries = MessageBmc::fetch_inbox(ctx, mm, project.id, agent.id, None, true, limit)
                    .await
                    .map_err(|e| errors::from_core_error(&e))?
                    .into_iter()
                    .filter(|e| e.read_ts.is_none())
                    .collect::<Vec<_>>();
                to_json(&entries)
            }
            "ack-required" => {
                let entries = MessageBmc::list_ack_required(ctx, mm, project.id, agent.id)
                    .await
                    .map_err(|e| errors::from_core_error(&e))?;
                to_json(&entries)
            }
            "ack-overdue" => {
                let ttl_minutes = query.get("ttl_minutes").and_then(|v| v.parse::<i64>().ok()).unwrap_or(60);
                let overdue = MessageBmc::list_overdue_acks(mm, ttl_minutes * 60)
                    .await
                    .map_err(|e| errors::from_core_error(&e))?
                    .into_iter()
                    .filter(|o| o.recipient_id == agent.id && o.project_id == project.id)
                    .take(limit.max(0) as usize)
                    .collect::<Vec<_>>();
                to_json(&overdue)
            }
            other => Err(McpError::invalid_params(format!("unknown view: {other}"), None)),
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, McpError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ErrorCode::Internal.to_mcp_error(&format!("failed to serialize resource: {e}"), None))
}

fn parse_since_ts(raw: Option<&String>) -> Result<Option<chrono::NaiveDateTime>, McpError> {
    match raw {
        None => Ok(None),
        Some(s) => chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
            .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
            .map(Some)
            .map_err(|e| McpError::invalid_params(format!("invalid since_ts: {e}"), None)),
    }
}

fn without_body(mut m: Message) -> Message {
    m.body_md.clear();
    m
}

fn redact_entry_bodies(entries: Vec<InboxEntry>, include_bodies: bool) -> Vec<InboxEntry> {
    if include_bodies {
        return entries;
    }
    entries
        .into_iter()
        .map(|mut e| {
            e.message.body_md.clear();
            e
        })
        .collect()
}

fn text_resource(uri: String, name: String, description: String) -> Resource {
    Resource {
        raw: RawResource {
            uri,
            name,
            description: Some(description),
            mime_type: Some("application/json".to_string()),
            size: None,
            icons: None,
            meta: None,
            title: None,
        },
        annotations: None,
    }
}

#[allow(clippy::manual_async_fn)]
impl ServerHandler for AgentMailService {
    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        async move {
            Ok(ListToolsResult { tools: self.tool_router.list_all(), next_cursor: None, meta: None })
        }
    }

    fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            let tool_name = request.name.clone();
            let start = std::time::Instant::now();
            let tool_context = rmcp::handler::server::tool::ToolCallContext::new(self, request, context);
            let result = self.tool_router.call(tool_context).await;
            self.record_metric(&tool_name, start.elapsed(), result.is_ok()).await;
            result
        }
    }

    fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourcesResult, McpError>> + Send + '_ {
        async move {
            let ctx = self.ctx();
            let projects = ProjectBmc::list_all(&ctx, &self.mm).await.unwrap_or_default();
            let mut resources = vec![text_resource(
                "resource://projects".to_string(),
                "All projects".to_string(),
                "Every project known to this archive".to_string(),
            )];
            for project in projects {
                resources.push(text_resource(
                    format!("resource://project/{}", project.slug),
                    format!("Project {}", project.slug),
                    format!("Project record and agent roster for '{}'", project.slug),
                ));
                resources.push(text_resource(
                    format!("resource://claims/{}", project.slug),
                    format!("Active claims in {}", project.slug),
                    format!("Active path reservations in project '{}'", project.slug),
                ));
            }
            resources.push(text_resource(
                "resource://tooling/directory".to_string(),
                "Tool directory".to_string(),
                "Every verb this server exposes".to_string(),
            ));
            resources.push(text_resource(
                "resource://tooling/metrics".to_string(),
                "Tool call metrics".to_string(),
                "Per-verb call/error counters".to_string(),
            ));
            resources.push(text_resource(
                "resource://tooling/recent".to_string(),
                "Recent tool calls".to_string(),
                "The most recent tool invocations across this process".to_string(),
            ));
            Ok(ListResourcesResult { resources, next_cursor: None, meta: None })
        }
    }

    fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ReadResourceResult, McpError>> + Send + '_ {
        self.read_resource_impl(request)
    }
}

#[tool_router]
impl AgentMailService {
    #[tool(description = "Report server liveness and the configured archive root.")]
    async fn health_check(&self, _params: Parameters<HealthCheckParams>) -> Result<CallToolResult, McpError> {
        json_result(&serde_json::json!({
            "status": "ok",
            "storage_root": self.mm.app_config.storage.root,
        }))
    }

    #[tool(description = "Create or fetch a project by human_key, idempotently.")]
    async fn ensure_project(&self, params: Parameters<EnsureProjectParams>) -> Result<CallToolResult, McpError> {
        projects::ensure_project_impl(&self.ctx(), &self.mm, params.0).await
    }

    #[tool(description = "Fetch a project by slug or human_key.")]
    async fn get_project(&self, params: Parameters<GetProjectParams>) -> Result<CallToolResult, McpError> {
        projects::get_project_impl(&self.ctx(), &self.mm, params.0).await
    }

    #[tool(description = "List every known project.")]
    async fn list_projects(&self, params: Parameters<ListProjectsParams>) -> Result<CallToolResult, McpError> {
        projects::list_projects_impl(&self.ctx(), &self.mm, params.0).await
    }

    #[tool(description = "Register an agent in a project, idempotent on (project, name_hint).")]
    async fn register_agent(&self, params: Parameters<RegisterAgentParams>) -> Result<CallToolResult, McpError> {
        projects::register_agent_impl(&self.ctx(), &self.mm, params.0).await
    }

    #[tool(description = "Look up an agent's registry entry by name.")]
    async fn whois(&self, params: Parameters<WhoisParams>) -> Result<CallToolResult, McpError> {
        projects::whois_impl(&self.ctx(), &self.mm, params.0).await
    }

    #[tool(description = "List every agent registered in a project.")]
    async fn list_agents(&self, params: Parameters<ListAgentsParams>) -> Result<CallToolResult, McpError> {
        projects::list_agents_impl(&self.ctx(), &self.mm, params.0).await
    }

    #[tool(description = "Set an agent's contact policy (open, auto, contacts_only, block_all).")]
    async fn set_contact_policy(&self, params: Parameters<SetContactPolicyParams>) -> Result<CallToolResult, McpError> {
        projects::set_contact_policy_impl(&self.ctx(), &self.mm, params.0).await
    }

    #[tool(description = "Compose and fan out a message to one or more recipients.")]
    async fn send_message(&self, params: Parameters<SendMessageParams>) -> Result<CallToolResult, McpError> {
        messaging::send_message_impl(&self.ctx(), &self.mm, params.0).await
    }

    #[tool(description = "Reply to an existing message, inheriting its thread.")]
    async fn reply_message(&self, params: Parameters<ReplyMessageParams>) -> Result<CallToolResult, McpError> {
        messaging::reply_message_impl(&self.ctx(), &self.mm, params.0).await
    }

    #[tool(description = "List an agent's received messages, newest first. Non-mutating.")]
    async fn list_inbox(&self, params: Parameters<ListInboxParams>) -> Result<CallToolResult, McpError> {
        messaging::list_inbox_impl(&self.ctx(), &self.mm, params.0).await
    }

    #[tool(description = "Fetch a single message by id.")]
    async fn get_message(&self, params: Parameters<GetMessageParams>) -> Result<CallToolResult, McpError> {
        messaging::get_message_impl(&self.ctx(), &self.mm, params.0).await
    }

    #[tool(description = "Mark a message read by the given agent. Idempotent.")]
    async fn mark_message_read(&self, params: Parameters<MarkMessageReadParams>) -> Result<CallToolResult, McpError> {
        messaging::mark_message_read_impl(&self.ctx(), &self.mm, params.0).await
    }

    #[tool(description = "Acknowledge a message requiring acknowledgment. Idempotent.")]
    async fn acknowledge_message(&self, params: Parameters<AcknowledgeMessageParams>) -> Result<CallToolResult, McpError> {
        messaging::acknowledge_message_impl(&self.ctx(), &self.mm, params.0).await
    }

    #[tool(description = "List every message in a thread, oldest first.")]
    async fn get_thread(&self, params: Parameters<GetThreadParams>) -> Result<CallToolResult, McpError> {
        messaging::get_thread_impl(&self.ctx(), &self.mm, params.0).await
    }

    #[tool(description = "Full-text search subjects/bodies within a project, with a LIKE fallback.")]
    async fn search_messages(&self, params: Parameters<SearchMessagesParams>) -> Result<CallToolResult, McpError> {
        messaging::search_messages_impl(&self.ctx(), &self.mm, params.0).await
    }

    #[tool(description = "Digest a thread into participants, key points, and action items.")]
    async fn summarize_thread(&self, params: Parameters<SummarizeThreadParams>) -> Result<CallToolResult, McpError> {
        messaging::summarize_thread_impl(&self.ctx(), &self.mm, params.0).await
    }

    #[tool(description = "Digest every thread with activity since a timestamp.")]
    async fn summarize_threads(&self, params: Parameters<SummarizeThreadsParams>) -> Result<CallToolResult, McpError> {
        messaging::summarize_threads_impl(&self.ctx(), &self.mm, params.0).await
    }

    #[tool(description = "Reserve one or more path-glob patterns for an agent.")]
    async fn claim_paths(&self, params: Parameters<ClaimPathsParams>) -> Result<CallToolResult, McpError> {
        reservations::claim_paths_impl(&self.ctx(), &self.mm, params.0).await
    }

    #[tool(description = "Release an agent's active leases, optionally restricted to patterns.")]
    async fn release_claims(&self, params: Parameters<ReleaseClaimsParams>) -> Result<CallToolResult, McpError> {
        reservations::release_claims_impl(&self.ctx(), &self.mm, params.0).await
    }

    #[tool(description = "Extend an agent's active leases by extend_seconds.")]
    async fn renew_claims(&self, params: Parameters<RenewClaimsParams>) -> Result<CallToolResult, McpError> {
        reservations::renew_claims_impl(&self.ctx(), &self.mm, params.0).await
    }

    #[tool(description = "List every active reservation in a project.")]
    async fn list_claims(&self, params: Parameters<ListClaimsParams>) -> Result<CallToolResult, McpError> {
        reservations::list_claims_impl(&self.ctx(), &self.mm, params.0).await
    }

    #[tool(description = "Operator-privileged release of a reservation regardless of its holder.")]
    async fn force_release_file_reservation(
        &self,
        params: Parameters<ForceReleaseClaimParams>,
    ) -> Result<CallToolResult, McpError> {
        if !self.ctx().is_writer() {
            return Err(ErrorCode::ValidationError.to_mcp_error(
                "force_release_file_reservation requires writer role",
                None,
            ));
        }
        reservations::force_release_claim_impl(&self.ctx(), &self.mm, params.0).await
    }

    #[tool(description = "Request (or re-request) a contact link between two agents.")]
    async fn request_contact(&self, params: Parameters<RequestContactParams>) -> Result<CallToolResult, McpError> {
        contacts::request_contact_impl(&self.ctx(), &self.mm, params.0).await
    }

    #[tool(description = "Approve or deny a pending contact request.")]
    async fn respond_contact(&self, params: Parameters<RespondContactParams>) -> Result<CallToolResult, McpError> {
        contacts::respond_contact_impl(&self.ctx(), &self.mm, params.0).await
    }

    #[tool(description = "List every contact link involving an agent.")]
    async fn list_contacts(&self, params: Parameters<ListContactsParams>) -> Result<CallToolResult, McpError> {
        contacts::list_contacts_impl(&self.ctx(), &self.mm, params.0).await
    }

    #[tool(description = "Install the pre-commit reservation guard into a target git repository.")]
    async fn install_precommit_guard(
        &self,
        params: Parameters<InstallGuardHookParams>,
    ) -> Result<CallToolResult, McpError> {
        guard::install_precommit_guard_impl(&self.ctx(), &self.mm, params.0).await
    }

    #[tool(description = "Remove a previously installed guard hook, leaving any foreign hook untouched.")]
    async fn uninstall_precommit_guard(
        &self,
        params: Parameters<UninstallGuardHookParams>,
    ) -> Result<CallToolResult, McpError> {
        guard::uninstall_precommit_guard_impl(&self.ctx(), &self.mm, params.0).await
    }
}

//! Messaging tool implementations.
//!
//! Thin wire-format adapters over [`agent_mail_core::model::message::MessageBmc`]
//! and [`agent_mail_core::model::search::SearchBmc`]: resolve string
//! identifiers to typed entities via `super::helpers`, call straight into
//! the core, and serialize whatever comes back.

use agent_mail_core::{
    ctx::Ctx,
    model::{
        message::MessageBmc,
        search::SearchBmc,
        ModelManager,
    },
    types::MessageId,
};
use rmcp::{model::CallToolResult, ErrorData as McpError};
use std::sync::Arc;

use super::errors::from_core_error;
use super::helpers::{self, json_result};
use super::params::{
    AcknowledgeMessageParams, GetMessageParams, GetThreadParams, ListInboxParams,
    MarkMessageReadParams, ReplyMessageParams, SearchMessagesParams, SendMessageParams,
    SummarizeThreadParams, SummarizeThreadsParams,
};

/// Sends a message from one agent to others, running every recipient
/// through the Contact Policy Engine and the Attachment Pipeline.
pub async fn send_message_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: SendMessageParams,
) -> Result<CallToolResult, McpError> {
    let (project, sender) =
        helpers::resolve_project_and_agent(ctx, mm, &params.project_slug, &params.sender_name)
            .await?;

    let to = helpers::resolve_agent_names(ctx, mm, project.id.get(), &params.to).await?;
    let cc =
        helpers::resolve_optional_agent_names(ctx, mm, project.id.get(), params.cc.as_deref())
            .await?;
    let bcc =
        helpers::resolve_optional_agent_names(ctx, mm, project.id.get(), params.bcc.as_deref())
            .await?;

    let input = agent_mail_core::model::message::MessageForSend {
        project_id: project.id,
        sender_id: sender.id,
        to,
        cc,
        bcc,
        subject: params.subject,
        body_md: params.body_md,
        importance: params.importance,
        ack_required: params.ack_required.unwrap_or(false),
        thread_id: params.thread_id,
        attachment_paths: params.attachment_paths,
        convert_images: params.convert_images,
        image_embed_policy: params.image_embed_policy,
        inline_max_bytes: None,
        auto_contact_if_blocked: params.auto_contact_if_blocked,
    };

    let result = MessageBmc::send(ctx, mm, input)
        .await
        .map_err(|e| from_core_error(&e))?;
    json_result(&result)
}

/// Replies to an existing message, threading by the parent's `thread_id`.
pub async fn reply_message_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: ReplyMessageParams,
) -> Result<CallToolResult, McpError> {
    let project = {
        let parent = MessageBmc::get(ctx, mm, MessageId::new(params.message_id))
            .await
            .map_err(|e| from_core_error(&e))?;
        agent_mail_core::model::project::ProjectBmc::get(ctx, mm, parent.project_id)
            .await
            .map_err(|e| from_core_error(&e))?
    };
    let sender = helpers::resolve_agent(ctx, mm, project.id.get(), &params.sender_name).await?;

    let to = match params.to {
        Some(names) => Some(helpers::resolve_agent_names(ctx, mm, project.id.get(), &names).await?),
        None => None,
    };
    let cc = match params.cc {
        Some(names) => Some(helpers::resolve_agent_names(ctx, mm, project.id.get(), &names).await?),
        None => None,
    };
    let bcc = match params.bcc {
        Some(names) => Some(helpers::resolve_agent_names(ctx, mm, project.id.get(), &names).await?),
        None => None,
    };

    let result = MessageBmc::reply(
        ctx,
        mm,
        MessageId::new(params.message_id),
        sender.id,
        params.body_md,
        to,
        cc,
        bcc,
        params.subject_prefix,
        params.importance,
        params.ack_required,
        params.attachment_paths,
    )
    .await
    .map_err(|e| from_core_error(&e))?;
    json_result(&result)
}

/// Lists an agent's inbox, newest first.
pub async fn list_inbox_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: ListInboxParams,
) -> Result<CallToolResult, McpError> {
    let (project, agent) =
        helpers::resolve_project_and_agent(ctx, mm, &params.project_slug, &params.agent_name)
            .await?;

    let since_ts = match params.since_ts.as_deref() {
        Some(s) => Some(
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
                .map_err(|e| {
                    super::errors::ErrorCode::ValidationError
                        .to_mcp_error(&format!("invalid since_ts: {e}"), None)
                })?,
        ),
        None => None,
    };

    let entries = MessageBmc::fetch_inbox(
        ctx,
        mm,
        project.id,
        agent.id,
        since_ts,
        params.urgent_only,
        params.limit.unwrap_or(50),
    )
    .await
    .map_err(|e| from_core_error(&e))?;
    json_result(&entries)
}

/// Fetches a single message by id.
pub async fn get_message_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: GetMessageParams,
) -> Result<CallToolResult, McpError> {
    let message = MessageBmc::get(ctx, mm, MessageId::new(params.message_id))
        .await
        .map_err(|e| from_core_error(&e))?;
    json_result(&message)
}

/// Marks a message as read by the given agent.
pub async fn mark_message_read_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: MarkMessageReadParams,
) -> Result<CallToolResult, McpError> {
    let message = MessageBmc::get(ctx, mm, MessageId::new(params.message_id))
        .await
        .map_err(|e| from_core_error(&e))?;
    let agent = helpers::resolve_agent(ctx, mm, message.project_id.get(), &params.agent_name).await?;

    MessageBmc::mark_read(ctx, mm, agent.id, MessageId::new(params.message_id))
        .await
        .map_err(|e| from_core_error(&e))?;

    json_result(&serde_json::json!({
        "message_id": params.message_id,
        "agent_name": params.agent_name,
        "status": "read",
    }))
}

/// Acknowledges a message requiring acknowledgment.
pub async fn acknowledge_message_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: AcknowledgeMessageParams,
) -> Result<CallToolResult, McpError> {
    let message = MessageBmc::get(ctx, mm, MessageId::new(params.message_id))
        .await
        .map_err(|e| from_core_error(&e))?;
    let agent = helpers::resolve_agent(ctx, mm, message.project_id.get(), &params.agent_name).await?;

    MessageBmc::acknowledge(ctx, mm, agent.id, MessageId::new(params.message_id))
        .await
        .map_err(|e| from_core_error(&e))?;

    json_result(&serde_json::json!({
        "message_id": params.message_id,
        "agent_name": params.agent_name,
        "status": "acknowledged",
    }))
}

/// Lists every message in a thread, oldest first.
pub async fn get_thread_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: GetThreadParams,
) -> Result<CallToolResult, McpError> {
    let project = helpers::resolve_project(ctx, mm, &params.project_slug).await?;
    let messages = MessageBmc::list_by_thread(ctx, mm, project.id, &params.thread_id)
        .await
        .map_err(|e| from_core_error(&e))?;
    json_result(&messages)
}

/// Full-text searches messages within a project.
pub async fn search_messages_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: SearchMessagesParams,
) -> Result<CallToolResult, McpError> {
    let project = helpers::resolve_project(ctx, mm, &params.project_slug).await?;
    let hits = SearchBmc::search_messages(ctx, mm, project.id, &params.query, params.limit.unwrap_or(20))
        .await
        .map_err(|e| from_core_error(&e))?;
    json_result(&hits)
}

/// Digests a single thread into key points, action items, and participants.
pub async fn summarize_thread_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: SummarizeThreadParams,
) -> Result<CallToolResult, McpError> {
    let project = helpers::resolve_project(ctx, mm, &params.project_slug).await?;
    let digest = SearchBmc::summarize_thread(ctx, mm, project.id, &params.thread_id)
        .await
        .map_err(|e| from_core_error(&e))?;
    json_result(&digest)
}

/// Digests every thread with activity since `since_ts` (or all threads).
pub async fn summarize_threads_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: SummarizeThreadsParams,
) -> Result<CallToolResult, McpError> {
    let project = helpers::resolve_project(ctx, mm, &params.project_slug).await?;
    let since_ts = match params.since_ts.as_deref() {
        Some(s) => Some(
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
                .map_err(|e| {
                    super::errors::ErrorCode::ValidationError
                        .to_mcp_error(&format!("invalid since_ts: {e}"), None)
                })?,
        ),
        None => None,
    };
    let digests = SearchBmc::summarize_threads(ctx, mm, project.id, since_ts, params.limit.unwrap_or(20))
        .await
        .map_err(|e| from_core_error(&e))?;
    json_result(&digests)
}

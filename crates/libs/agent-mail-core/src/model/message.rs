//! Messaging and Threading State Machine.
//!
//! `send_message` dedups recipients across to/cc/bcc (precedence
//! `to > cc > bcc`), runs every distinct recipient through the Contact
//! Policy Engine, pipes the body and any `attachment_paths` through the
//! Attachment Pipeline, then writes the canonical message file, the
//! sender's outbox copy, and each recipient's inbox copy in one commit
//! under the project's write lock. `reply_message` is a thin composer on
//! top of `send_message` that threads by the parent's `thread_id` (or the
//! parent's own id when it started a thread).

use crate::model::agent::AgentBmc;
use crate::model::attachment::{AttachmentBmc, AttachmentDescriptor};
use crate::model::contact::ContactLinkBmc;
use crate::model::project::ProjectBmc;
use crate::model::ModelManager;
use crate::store::{fs_store, git_store};
use crate::types::{AgentId, MessageId, ProjectId};
use crate::utils::validation::{validate_attachments_policy, validate_importance};
use crate::{Ctx, Result};
use chrono::{Datelike, NaiveDateTime};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// A committed message, as stored in the `messages` table.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Message {
    pub id: MessageId,
    pub external_id: String,
    pub project_id: ProjectId,
    pub sender_id: AgentId,
    pub sender_name: String,
    pub thread_id: Option<String>,
    pub subject: String,
    pub body_md: String,
    pub importance: String,
    pub ack_required: bool,
    pub attachments: Vec<AttachmentDescriptor>,
    pub created_ts: NaiveDateTime,
}

/// One recipient's view of a message: the shared `Message` plus the
/// per-recipient receipt state.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InboxEntry {
    #[serde(flatten)]
    pub message: Message,
    pub recipient_kind: String,
    pub read_ts: Option<NaiveDateTime>,
    pub ack_ts: Option<NaiveDateTime>,
}

/// A single recipient's delivery outcome.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Delivery {
    pub agent_id: AgentId,
    pub agent_name: String,
    pub kind: String,
}

/// A recipient that was not delivered to because the Contact Policy
/// Engine refused them.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BlockedRecipient {
    pub agent_id: AgentId,
    pub agent_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SendResult {
    pub message: Message,
    pub deliveries: Vec<Delivery>,
    pub blocked: Vec<BlockedRecipient>,
    pub attachments: Vec<AttachmentDescriptor>,
}

/// Input to [`MessageBmc::send`]. Recipients are already-resolved agent
/// ids; name resolution is the tool layer's responsibility (see
/// `agent-mail-mcp::tools::helpers`).
#[derive(Debug, Clone)]
pub struct MessageForSend {
    pub project_id: ProjectId,
    pub sender_id: AgentId,
    pub to: Vec<AgentId>,
    pub cc: Vec<AgentId>,
    pub bcc: Vec<AgentId>,
    pub subject: String,
    pub body_md: String,
    pub importance: String,
    pub ack_required: bool,
    pub thread_id: Option<String>,
    pub attachment_paths: Vec<String>,
    pub convert_images: Option<bool>,
    pub image_embed_policy: Option<String>,
    pub inline_max_bytes: Option<i64>,
    pub auto_contact_if_blocked: bool,
}

pub struct MessageBmc;

impl MessageBmc {
    /// Generates `msg_<yyyymmdd>_<hex8>`.
    fn generate_external_id() -> String {
        let now = chrono::Utc::now();
        let mut rng = rand::thread_rng();
        let suffix: u32 = rng.gen();
        format!(
            "msg_{:04}{:02}{:02}_{:08x}",
            now.year(),
            now.month(),
            now.day(),
            suffix
        )
    }

    /// Dedups recipients across to/cc/bcc, preferring `to` over `cc` over
    /// `bcc`, preserving first-seen order within each kind.
    fn dedup_recipients(to: &[AgentId], cc: &[AgentId], bcc: &[AgentId]) -> Vec<(AgentId, &'static str)> {
        let mut kinds: BTreeMap<i64, (AgentId, &'static str)> = BTreeMap::new();
        for id in bcc {
            kinds.entry(id.get()).or_insert((*id, "bcc"));
        }
        for id in cc {
            kinds.insert(id.get(), (*id, "cc"));
        }
        for id in to {
            kinds.insert(id.get(), (*id, "to"));
        }
        // Preserve the precedence-ordered insertion: `to` first, then `cc`,
        // then `bcc`, each in its original order, skipping ids already
        // placed by a higher-precedence kind.
        let mut seen = std::collections::HashSet::new();
        let mut ordered = Vec::new();
        for id in to {
            if seen.insert(id.get()) {
                ordered.push(kinds[&id.get()]);
            }
        }
        for id in cc {
            if seen.insert(id.get()) {
                ordered.push(kinds[&id.get()]);
            }
        }
        for id in bcc {
            if seen.insert(id.get()) {
                ordered.push(kinds[&id.get()]);
            }
        }
        ordered
    }

    /// Composes, validates, fans out, and archives a message.
    pub async fn send(ctx: &Ctx, mm: &ModelManager, input: MessageForSend) -> Result<SendResult> {
        validate_importance(&input.importance)?;
        AgentBmc::touch_activity(ctx, mm, input.sender_id).await?;

        let recipients = Self::dedup_recipients(&input.to, &input.cc, &input.bcc);
        if recipients.is_empty() {
            return Err(crate::Error::InvalidInput(
                "at least one recipient is required".into(),
            ));
        }
        if input.subject.trim().is_empty()
            && input.body_md.trim().is_empty()
            && input.attachment_paths.is_empty()
        {
            return Err(crate::Error::InvalidInput(
                "subject and body_md are both empty and no attachment was provided".into(),
            ));
        }

        let project = ProjectBmc::get(ctx, mm, input.project_id).await?;
        let sender = AgentBmc::get(ctx, mm, input.sender_id).await?;

        let mut blocked = Vec::new();
        let mut allowed = Vec::new();
        for (agent_id, kind) in &recipients {
            match ContactLinkBmc::check_allowed(ctx, mm, input.project_id, input.sender_id, *agent_id).await {
                Ok(()) => allowed.push((*agent_id, *kind)),
                Err(e) => {
                    let recipient = AgentBmc::get(ctx, mm, *agent_id).await?;
                    if input.auto_contact_if_blocked {
                        let _ = ContactLinkBmc::request_contact(
                            ctx,
                            mm,
                            input.project_id,
                            input.sender_id,
                            *agent_id,
                            Some(format!("auto-requested after blocked send: {}", input.subject)),
                        )
                        .await;
                    }
                    blocked.push(BlockedRecipient {
                        agent_id: *agent_id,
                        agent_name: recipient.name,
                        reason: e.kind().to_string(),
                    });
                }
            }
        }

        if allowed.is_empty() {
            return Err(crate::Error::ContactBlocked);
        }

        let embed_policy = input
            .image_embed_policy
            .clone()
            .unwrap_or_else(|| sender.attachments_policy.clone());
        validate_attachments_policy(&embed_policy)?;
        let convert_images = input.convert_images.unwrap_or(mm.app_config.images.convert_images);

        let (body_md, attachments) = AttachmentBmc::process_for_message(
            mm,
            &project.slug,
            &input.body_md,
            &input.attachment_paths,
            &embed_policy,
            input.inline_max_bytes,
            None,
            convert_images,
        )?;

        let subject = if input.subject.trim().is_empty() {
            "(no subject)".to_string()
        } else {
            input.subject.clone()
        };

        let external_id = Self::generate_external_id();
        let attachments_json = serde_json::to_string(&attachments)?;
        let db = mm.db();
        let stmt = db
            .prepare(
                "INSERT INTO messages (external_id, project_id, sender_id, thread_id, subject, \
                 body_md, importance, ack_required, attachments_json) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
            )
            .await?;
        let mut rows = stmt
            .query((
                external_id.clone(),
                input.project_id.get(),
                input.sender_id.get(),
                input.thread_id.clone(),
                subject.clone(),
                body_md.clone(),
                input.importance.clone(),
                input.ack_required,
                attachments_json,
            ))
            .await?;
        let message_id: i64 = if let Some(row) = rows.next().await? {
            row.get(0)?
        } else {
            return Err(crate::Error::InvalidInput("failed to create message".into()));
        };
        let message_id = MessageId::new(message_id);

        let mut deliveries = Vec::new();
        for (agent_id, kind) in &allowed {
            let stmt = db
                .prepare(
                    "INSERT INTO message_recipients (message_id, agent_id, recipient_type) VALUES (?, ?, ?)",
                )
                .await?;
            stmt.execute((message_id.get(), agent_id.get(), *kind)).await?;
            let recipient = AgentBmc::get(ctx, mm, *agent_id).await?;
            deliveries.push(Delivery {
                agent_id: *agent_id,
                agent_name: recipient.name,
                kind: kind.to_string(),
            });
        }

        Self::archive_message(
            mm,
            &project.slug,
            &sender.name,
            &deliveries,
            &external_id,
            input.thread_id.as_deref(),
            &subject,
            &body_md,
            &input.importance,
            input.ack_required,
            &attachments,
            "send",
        )
        .await?;

        let message = Self::get(ctx, mm, message_id).await?;
        Ok(SendResult {
            message,
            deliveries,
            blocked,
            attachments,
        })
    }

    /// Replies to `parent_id`: threads by the parent's `thread_id` (or the
    /// parent's own id when it had none), prefixes the subject with
    /// `subject_prefix` unless already present, inherits importance/
    /// ack_required unless overridden, and defaults recipients to the
    /// parent's sender when none are given explicitly.
    #[allow(clippy::too_many_arguments)]
    pub async fn reply(
        ctx: &Ctx,
        mm: &ModelManager,
        parent_id: MessageId,
        sender_id: AgentId,
        body_md: String,
        to: Option<Vec<AgentId>>,
        cc: Option<Vec<AgentId>>,
        bcc: Option<Vec<AgentId>>,
        subject_prefix: Option<String>,
        importance: Option<String>,
        ack_required: Option<bool>,
        attachment_paths: Vec<String>,
    ) -> Result<SendResult> {
        let parent = Self::get(ctx, mm, parent_id).await?;
        let thread_id = parent
            .thread_id
            .clone()
            .unwrap_or_else(|| parent.id.get().to_string());

        let prefix = subject_prefix.unwrap_or_else(|| "Re:".to_string());
        let subject = if parent.subject.starts_with(&prefix) {
            parent.subject.clone()
        } else {
            format!("{prefix} {}", parent.subject)
        };

        let to = to.unwrap_or_else(|| vec![parent.sender_id]);

        let input = MessageForSend {
            project_id: parent.project_id,
            sender_id,
            to,
            cc: cc.unwrap_or_default(),
            bcc: bcc.unwrap_or_default(),
            subject,
            body_md,
            importance: importance.unwrap_or(parent.importance),
            ack_required: ack_required.unwrap_or(parent.ack_required),
            thread_id: Some(thread_id),
            attachment_paths,
            convert_images: None,
            image_embed_policy: None,
            inline_max_bytes: None,
            auto_contact_if_blocked: false,
        };

        Self::send(ctx, mm, input).await
    }

    /// Writes the canonical message file, the sender's outbox copy, and
    /// every recipient's inbox copy, all in one commit under the
    /// project's write lock.
    #[allow(clippy::too_many_arguments)]
    async fn archive_message(
        mm: &ModelManager,
        project_slug: &str,
        sender_name: &str,
        deliveries: &[Delivery],
        external_id: &str,
        thread_id: Option<&str>,
        subject: &str,
        body_md: &str,
        importance: &str,
        ack_required: bool,
        attachments: &[AttachmentDescriptor],
        kind: &str,
    ) -> Result<()> {
        let now = chrono::Utc::now().naive_utc();
        let year = format!("{:04}", now.year());
        let month = format!("{:02}", now.month());

        #[derive(Serialize)]
        struct Frontmatter<'a> {
            id: &'a str,
            thread_id: Option<&'a str>,
            subject: &'a str,
            sender: &'a str,
            recipients: Vec<&'a str>,
            importance: &'a str,
            ack_required: bool,
            created_ts: String,
            attachments: &'a [AttachmentDescriptor],
        }
        let frontmatter = Frontmatter {
            id: external_id,
            thread_id,
            subject,
            sender: sender_name,
            recipients: deliveries.iter().map(|d| d.agent_name.as_str()).collect(),
            importance,
            ack_required,
            created_ts: now.and_utc().to_rfc3339(),
            attachments,
        };
        let frontmatter_json = serde_json::to_string_pretty(&frontmatter)?;
        let rendered = crate::utils::markdown::render_frontmatter(&frontmatter_json, body_md);

        let slug_root = fs_store::project_repo_root(&mm.repo_root, project_slug);
        let mut paths = Vec::new();

        let canonical = fs_store::canonical_message_path(&slug_root, &year, &month, external_id);
        fs_store::atomic_write(&canonical, rendered.as_bytes())?;
        paths.push(canonical);

        let outbox = fs_store::agent_mailbox_path(&slug_root, sender_name, "outbox", &year, &month, external_id);
        fs_store::atomic_write(&outbox, rendered.as_bytes())?;
        paths.push(outbox);

        let mut seen_inboxes = std::collections::HashSet::new();
        for delivery in deliveries {
            if !seen_inboxes.insert(delivery.agent_name.clone()) {
                continue;
            }
            let inbox = fs_store::agent_mailbox_path(&slug_root, &delivery.agent_name, "inbox", &year, &month, external_id);
            fs_store::atomic_write(&inbox, rendered.as_bytes())?;
            paths.push(inbox);
        }

        let relative: Vec<_> = paths
            .iter()
            .map(|p| p.strip_prefix(&mm.repo_root).unwrap_or(p).to_path_buf())
            .collect();

        let _guard = mm.git_lock.lock().await;
        let repo_arc = mm.get_repo().await?;
        let repo = repo_arc.lock().await;
        git_store::commit_paths(
            &repo,
            &relative,
            &format!(
                "{kind}: {sender_name} -> {}\n\nAgent: {sender_name}\nThread: {}\nMessage-Id: {external_id}\nKind: {kind}",
                subject,
                thread_id.unwrap_or("-"),
            ),
            "mcp-agent-mail",
            "bot@local",
        )
        .map_err(|e| crate::Error::ArchiveCommitFailed(e.to_string()))?;
        Ok(())
    }

    pub async fn get(_ctx: &Ctx, mm: &ModelManager, id: MessageId) -> Result<Message> {
        let db = mm.db();
        let stmt = db
            .prepare(
                "SELECT m.id, m.external_id, m.project_id, m.sender_id, a.name, m.thread_id, \
                 m.subject, m.body_md, m.importance, m.ack_required, m.attachments_json, m.created_ts \
                 FROM messages m JOIN agents a ON a.id = m.sender_id WHERE m.id = ?",
            )
            .await?;
        let mut rows = stmt.query([id.get()]).await?;
        if let Some(row) = rows.next().await? {
            Self::from_row(row)
        } else {
            Err(crate::Error::MessageNotFound(id.get()))
        }
    }

    /// Lists messages where `agent_id` is a recipient in `project_id`,
    /// newest first. Non-mutating: does not touch `read_ts`/`ack_ts`.
    pub async fn fetch_inbox(
        _ctx: &Ctx,
        mm: &ModelManager,
        project_id: ProjectId,
        agent_id: AgentId,
        since_ts: Option<NaiveDateTime>,
        urgent_only: bool,
        limit: i64,
    ) -> Result<Vec<InboxEntry>> {
        let db = mm.db();
        let mut sql = String::from(
            "SELECT m.id, m.external_id, m.project_id, m.sender_id, a.name, m.thread_id, \
             m.subject, m.body_md, m.importance, m.ack_required, m.attachments_json, m.created_ts, \
             mr.recipient_type, mr.read_ts, mr.ack_ts \
             FROM messages m \
             JOIN agents a ON a.id = m.sender_id \
             JOIN message_recipients mr ON mr.message_id = m.id \
             WHERE m.project_id = ? AND mr.agent_id = ?",
        );
        if since_ts.is_some() {
            sql.push_str(" AND m.created_ts > ?");
        }
        if urgent_only {
            sql.push_str(" AND m.importance IN ('high', 'urgent')");
        }
        sql.push_str(" ORDER BY m.created_ts DESC LIMIT ?");

        let stmt = db.prepare(&sql).await?;
        let mut rows = if let Some(since) = since_ts {
            stmt.query((
                project_id.get(),
                agent_id.get(),
                since.format("%Y-%m-%d %H:%M:%S").to_string(),
                limit,
            ))
            .await?
        } else {
            stmt.query((project_id.get(), agent_id.get(), limit)).await?
        };

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(Self::inbox_entry_from_row(row)?);
        }
        Ok(out)
    }

    pub async fn mark_read(
        _ctx: &Ctx,
        mm: &ModelManager,
        agent_id: AgentId,
        message_id: MessageId,
    ) -> Result<()> {
        let db = mm.db();
        let now = crate::model::now_ts_string();
        let stmt = db
            .prepare(
                "UPDATE message_recipients SET read_ts = ? \
                 WHERE message_id = ? AND agent_id = ? AND read_ts IS NULL",
            )
            .await?;
        stmt.execute((now, message_id.get(), agent_id.get())).await?;
        Ok(())
    }

    pub async fn acknowledge(
        _ctx: &Ctx,
        mm: &ModelManager,
        agent_id: AgentId,
        message_id: MessageId,
    ) -> Result<()> {
        let db = mm.db();
        let now = crate::model::now_ts_string();
        let stmt = db
            .prepare(
                "UPDATE message_recipients SET ack_ts = ?, read_ts = COALESCE(read_ts, ?) \
                 WHERE message_id = ? AND agent_id = ? AND ack_ts IS NULL",
            )
            .await?;
        stmt.execute((now.clone(), now, message_id.get(), agent_id.get())).await?;
        Ok(())
    }

    /// Lists all messages in a thread (the thread's starter message, plus
    /// every message whose `thread_id` equals it), ordered oldest first.
    pub async fn list_by_thread(
        _ctx: &Ctx,
        mm: &ModelManager,
        project_id: ProjectId,
        thread_id: &str,
    ) -> Result<Vec<Message>> {
        let db = mm.db();
        let stmt = db
            .prepare(
                "SELECT m.id, m.external_id, m.project_id, m.sender_id, a.name, m.thread_id, \
                 m.subject, m.body_md, m.importance, m.ack_required, m.attachments_json, m.created_ts \
                 FROM messages m JOIN agents a ON a.id = m.sender_id \
                 WHERE m.project_id = ? AND (CAST(m.id AS TEXT) = ? OR m.thread_id = ?) \
                 ORDER BY m.created_ts ASC",
            )
            .await?;
        let mut rows = stmt.query((project_id.get(), thread_id, thread_id)).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(Self::from_row(row)?);
        }
        Ok(out)
    }

    /// Lists the most recent messages in a project (used by the archive
    /// export and the search fallback path).
    pub async fn list_recent(
        _ctx: &Ctx,
        mm: &ModelManager,
        project_id: ProjectId,
        limit: i64,
    ) -> Result<Vec<Message>> {
        let db = mm.db();
        let stmt = db
            .prepare(
                "SELECT m.id, m.external_id, m.project_id, m.sender_id, a.name, m.thread_id, \
                 m.subject, m.body_md, m.importance, m.ack_required, m.attachments_json, m.created_ts \
                 FROM messages m JOIN agents a ON a.id = m.sender_id \
                 WHERE m.project_id = ? ORDER BY m.created_ts DESC LIMIT ?",
            )
            .await?;
        let mut rows = stmt.query((project_id.get(), limit)).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(Self::from_row(row)?);
        }
        Ok(out)
    }

    /// Messages where `agent_id` has an outstanding ACK requirement,
    /// newest first (backs `resource://views/ack-required/{agent}`).
    pub async fn list_ack_required(
        _ctx: &Ctx,
        mm: &ModelManager,
        project_id: ProjectId,
        agent_id: AgentId,
    ) -> Result<Vec<InboxEntry>> {
        let db = mm.db();
        let stmt = db
            .prepare(
                "SELECT m.id, m.external_id, m.project_id, m.sender_id, a.name, m.thread_id, \
                 m.subject, m.body_md, m.importance, m.ack_required, m.attachments_json, m.created_ts, \
                 mr.recipient_type, mr.read_ts, mr.ack_ts \
                 FROM messages m \
                 JOIN agents a ON a.id = m.sender_id \
                 JOIN message_recipients mr ON mr.message_id = m.id \
                 WHERE m.project_id = ? AND mr.agent_id = ? AND m.ack_required = 1 AND mr.ack_ts IS NULL \
                 ORDER BY m.created_ts DESC",
            )
            .await?;
        let mut rows = stmt.query((project_id.get(), agent_id.get())).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(Self::inbox_entry_from_row(row)?);
        }
        Ok(out)
    }

    /// Recipients whose ACK is overdue by more than `ttl_seconds`, across
    /// every project. Used by the ACK-TTL escalation worker and
    /// `resource://views/ack-overdue/{agent}`.
    pub async fn list_overdue_acks(
        mm: &ModelManager,
        ttl_seconds: i64,
    ) -> Result<Vec<OverdueAck>> {
        let db = mm.db();
        let cutoff = (chrono::Utc::now().naive_utc() - chrono::Duration::seconds(ttl_seconds))
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        let stmt = db
            .prepare(
                "SELECT m.id, m.external_id, m.project_id, p.slug, m.subject, mr.agent_id, ra.name, m.created_ts \
                 FROM messages m \
                 JOIN message_recipients mr ON mr.message_id = m.id \
                 JOIN agents ra ON ra.id = mr.agent_id \
                 JOIN projects p ON p.id = m.project_id \
                 WHERE m.ack_required = 1 AND mr.ack_ts IS NULL AND m.created_ts < ?",
            )
            .await?;
        let mut rows = stmt.query([cutoff]).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            let created_ts_str: String = row.get(7)?;
            out.push(OverdueAck {
                message_id: MessageId::new(row.get(0)?),
                external_id: row.get(1)?,
                project_id: ProjectId::new(row.get(2)?),
                project_slug: row.get(3)?,
                subject: row.get(4)?,
                recipient_id: AgentId::new(row.get(5)?),
                recipient_name: row.get(6)?,
                created_ts: NaiveDateTime::parse_from_str(&created_ts_str, "%Y-%m-%d %H:%M:%S")
                    .unwrap_or_default(),
            });
        }
        Ok(out)
    }

    fn inbox_entry_from_row(row: libsql::Row) -> Result<InboxEntry> {
        let kind: String = row.get(12)?;
        let read: Option<String> = row.get(13)?;
        let ack: Option<String> = row.get(14)?;
        let parse_ts =
            |s: String| NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S").unwrap_or_default();
        Ok(InboxEntry {
            message: Self::message_fields_from_row(&row)?,
            recipient_kind: kind,
            read_ts: read.map(&parse_ts),
            ack_ts: ack.map(&parse_ts),
        })
    }

    fn from_row(row: libsql::Row) -> Result<Message> {
        Self::message_fields_from_row(&row)
    }

    fn message_fields_from_row(row: &libsql::Row) -> Result<Message> {
        let parse_ts =
            |s: String| NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S").unwrap_or_default();
        let attachments_json: String = row.get(10)?;
        let attachments: Vec<AttachmentDescriptor> =
            serde_json::from_str(&attachments_json).unwrap_or_default();
        Ok(Message {
            id: MessageId::new(row.get(0)?),
            external_id: row.get(1)?,
            project_id: ProjectId::new(row.get(2)?),
            sender_id: AgentId::new(row.get(3)?),
            sender_name: row.get(4)?,
            thread_id: row.get(5)?,
            subject: row.get(6)?,
            body_md: row.get(7)?,
            importance: row.get(8)?,
            ack_required: row.get::<i64>(9)? != 0,
            attachments,
            created_ts: parse_ts(row.get(11)?),
        })
    }
}

/// One recipient's overdue ACK, as surfaced to the escalation worker.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OverdueAck {
    pub message_id: MessageId,
    pub external_id: String,
    pub project_id: ProjectId,
    pub project_slug: String,
    pub subject: String,
    pub recipient_id: AgentId,
    pub recipient_name: String,
    pub created_ts: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedups_recipients_with_to_over_cc_over_bcc_precedence() {
        let to = vec![AgentId::new(1)];
        let cc = vec![AgentId::new(1), AgentId::new(2)];
        let bcc = vec![AgentId::new(1), AgentId::new(2), AgentId::new(3)];
        let ordered = MessageBmc::dedup_recipients(&to, &cc, &bcc);
        assert_eq!(
            ordered,
            vec![
                (AgentId::new(1), "to"),
                (AgentId::new(2), "cc"),
                (AgentId::new(3), "bcc"),
            ]
        );
    }

    #[test]
    fn generates_external_id_in_expected_shape() {
        let id = MessageBmc::generate_external_id();
        assert!(id.starts_with("msg_"));
        let rest = &id["msg_".len()..];
        let (date, hex) = rest.split_once('_').expect("one underscore separator");
        assert_eq!(date.len(), 8);
        assert_eq!(hex.len(), 8);
    }
}

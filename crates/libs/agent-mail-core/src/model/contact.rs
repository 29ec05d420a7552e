//! Contact Policy Engine.
//!
//! Gates cross-agent messaging under a per-recipient `contact_policy`.
//! `open` allows everything; `auto` (the default) allows messaging once
//! sender and recipient share context (a thread, overlapping
//! reservations, a recent direct message, or an approved link);
//! `contacts_only` requires an approved link; `block_all` refuses new
//! contacts outright. When `CONTACT_ENFORCEMENT_ENABLED` is off, every
//! policy collapses to `open`.

use crate::model::ModelManager;
use crate::model::reservation::ReservationBmc;
use crate::types::{AgentId, ContactLinkId, ProjectId};
use crate::{Ctx, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContactLink {
    pub id: ContactLinkId,
    pub project_id: ProjectId,
    pub agent_a_id: AgentId,
    pub agent_b_id: AgentId,
    pub state: String,
    pub requested_by_id: AgentId,
    pub reason: Option<String>,
    pub created_ts: NaiveDateTime,
    pub decided_ts: Option<NaiveDateTime>,
    pub expires_ts: Option<NaiveDateTime>,
}

/// Normalize an unordered pair so `(a, b)` and `(b, a)` hit the same row.
fn ordered_pair(a: AgentId, b: AgentId) -> (AgentId, AgentId) {
    if a.get() <= b.get() { (a, b) } else { (b, a) }
}

pub struct ContactLinkBmc;

impl ContactLinkBmc {
    /// The sliding-window "prior direct message" auto-allow check and the
    /// thread-co-participation check both need the plain fact of "these
    /// two agents have exchanged mail"; this covers both by inspecting
    /// `message_recipients` joined to `messages`.
    async fn have_recent_direct_message(
        mm: &ModelManager,
        project_id: ProjectId,
        a: AgentId,
        b: AgentId,
        window_seconds: i64,
    ) -> Result<bool> {
        let db = mm.db();
        let cutoff = (chrono::Utc::now().naive_utc() - chrono::Duration::seconds(window_seconds))
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        let stmt = db
            .prepare(
                "SELECT COUNT(*) FROM messages m \
                 JOIN message_recipients mr ON mr.message_id = m.id \
                 WHERE m.project_id = ? AND m.created_ts > ? \
                 AND ((m.sender_id = ? AND mr.agent_id = ?) OR (m.sender_id = ? AND mr.agent_id = ?))",
            )
            .await?;
        let mut rows = stmt
            .query((
                project_id.get(),
                cutoff,
                a.get(),
                b.get(),
                b.get(),
                a.get(),
            ))
            .await?;
        let count: i64 = if let Some(row) = rows.next().await? {
            row.get(0)?
        } else {
            0
        };
        Ok(count > 0)
    }

    async fn share_thread(
        mm: &ModelManager,
        project_id: ProjectId,
        a: AgentId,
        b: AgentId,
    ) -> Result<bool> {
        let db = mm.db();
        let stmt = db
            .prepare(
                "SELECT COUNT(*) FROM (\
                   SELECT DISTINCT m.thread_id AS tid FROM messages m \
                   JOIN message_recipients mr ON mr.message_id = m.id \
                   WHERE m.project_id = ? AND m.thread_id IS NOT NULL \
                   AND (m.sender_id = ? OR mr.agent_id = ?) \
                 ) ta JOIN (\
                   SELECT DISTINCT m.thread_id AS tid FROM messages m \
                   JOIN message_recipients mr ON mr.message_id = m.id \
                   WHERE m.project_id = ? AND m.thread_id IS NOT NULL \
                   AND (m.sender_id = ? OR mr.agent_id = ?) \
                 ) tb ON ta.tid = tb.tid",
            )
            .await?;
        let mut rows = stmt
            .query((
                project_id.get(),
                a.get(),
                a.get(),
                project_id.get(),
                b.get(),
                b.get(),
            ))
            .await?;
        let count: i64 = if let Some(row) = rows.next().await? {
            row.get(0)?
        } else {
            0
        };
        Ok(count > 0)
    }

    pub async fn get_link(
        _ctx: &Ctx,
        mm: &ModelManager,
        project_id: ProjectId,
        a: AgentId,
        b: AgentId,
    ) -> Result<Option<ContactLink>> {
        let (lo, hi) = ordered_pair(a, b);
        let db = mm.db();
        let stmt = db
            .prepare(
                "SELECT id, project_id, agent_a_id, agent_b_id, state, requested_by_id, reason, \
                 created_ts, decided_ts, expires_ts FROM contacts \
                 WHERE project_id = ? AND agent_a_id = ? AND agent_b_id = ?",
            )
            .await?;
        let mut rows = stmt.query((project_id.get(), lo.get(), hi.get())).await?;
        if let Some(row) = rows.next().await? {
            Ok(Some(Self::from_row(row)?))
        } else {
            Ok(None)
        }
    }

    async fn is_approved(
        ctx: &Ctx,
        mm: &ModelManager,
        project_id: ProjectId,
        a: AgentId,
        b: AgentId,
    ) -> Result<bool> {
        let now = chrono::Utc::now().naive_utc();
        Ok(Self::get_link(ctx, mm, project_id, a, b)
            .await?
            .is_some_and(|l| {
                l.state == "approved" && l.expires_ts.is_none_or(|exp| exp > now)
            }))
    }

    /// Decides whether `sender` may message `recipient`. `Ok(())` means
    /// allowed; otherwise the returned error is `CONTACT_BLOCKED` or
    /// `CONTACT_CONSENT_REQUIRED`.
    pub async fn check_allowed(
        ctx: &Ctx,
        mm: &ModelManager,
        project_id: ProjectId,
        sender_id: AgentId,
        recipient_id: AgentId,
    ) -> Result<()> {
        if !mm.app_config.contact.enforcement_enabled || sender_id == recipient_id {
            return Ok(());
        }

        let recipient = super::agent::AgentBmc::get(ctx, mm, recipient_id).await?;
        let policy = recipient.contact_policy.as_str();

        if Self::is_approved(ctx, mm, project_id, sender_id, recipient_id).await? {
            return Ok(());
        }

        match policy {
            "open" => Ok(()),
            "block_all" => Err(crate::Error::ContactBlocked),
            "contacts_only" => Err(crate::Error::ContactConsentRequired),
            _ => {
                // "auto" (default)
                if Self::share_thread(mm, project_id, sender_id, recipient_id).await? {
                    return Ok(());
                }
                if ReservationBmc::have_overlapping_active_reservations(
                    ctx,
                    mm,
                    project_id,
                    sender_id,
                    recipient_id,
                )
                .await?
                {
                    return Ok(());
                }
                if Self::have_recent_direct_message(
                    mm,
                    project_id,
                    sender_id,
                    recipient_id,
                    mm.app_config.contact.auto_allow_window_seconds,
                )
                .await?
                {
                    return Ok(());
                }
                Err(crate::Error::ContactConsentRequired)
            }
        }
    }

    /// Creates or refreshes a `pending` link and returns it. The intro
    /// message delivery (always permitted except under `block_all`) is
    /// the caller's responsibility (see `tools::contacts`), since it goes
    /// through the Messaging Engine's policy-bypass path.
    pub async fn request_contact(
        _ctx: &Ctx,
        mm: &ModelManager,
        project_id: ProjectId,
        from: AgentId,
        to: AgentId,
        reason: Option<String>,
    ) -> Result<ContactLink> {
        let (lo, hi) = ordered_pair(from, to);
        let db = mm.db();
        let now = crate::model::now_ts_string();
        db.execute(
            "INSERT INTO contacts (project_id, agent_a_id, agent_b_id, state, requested_by_id, reason, created_ts) \
             VALUES (?, ?, ?, 'pending', ?, ?, ?) \
             ON CONFLICT(project_id, agent_a_id, agent_b_id) DO UPDATE SET \
               state = CASE WHEN contacts.state = 'approved' THEN contacts.state ELSE 'pending' END, \
               requested_by_id = excluded.requested_by_id, reason = excluded.reason",
            (project_id.get(), lo.get(), hi.get(), from.get(), reason, now),
        )
        .await?;

        Self::get_link(_ctx, mm, project_id, from, to)
            .await?
            .ok_or_else(|| crate::Error::InvalidInput("failed to create contact link".into()))
    }

    /// Transitions a `pending` link to `approved` or `denied`. Approval
    /// sets `expires_ts := now + ttl` (default: the configured default
    /// approval TTL, 30 days).
    pub async fn respond_contact(
        ctx: &Ctx,
        mm: &ModelManager,
        project_id: ProjectId,
        to: AgentId,
        from: AgentId,
        accept: bool,
        ttl_seconds: Option<i64>,
    ) -> Result<ContactLink> {
        let link = Self::get_link(ctx, mm, project_id, to, from)
            .await?
            .ok_or_else(|| crate::Error::InvalidInput("no pending contact request".into()))?;

        let state = if accept { "approved" } else { "denied" };
        let now = chrono::Utc::now().naive_utc();
        let expires = if accept {
            Some(
                now + chrono::Duration::seconds(
                    ttl_seconds.unwrap_or(mm.app_config.contact.default_approval_ttl_seconds),
                ),
            )
        } else {
            None
        };

        let db = mm.db();
        let stmt = db
            .prepare(
                "UPDATE contacts SET state = ?, decided_ts = ?, expires_ts = ? WHERE id = ?",
            )
            .await?;
        stmt.execute((
            state,
            now.format("%Y-%m-%d %H:%M:%S").to_string(),
            expires.map(|e| e.format("%Y-%m-%d %H:%M:%S").to_string()),
            link.id.get(),
        ))
        .await?;

        Self::get_link(ctx, mm, project_id, to, from)
            .await?
            .ok_or(crate::Error::NotFound)
    }

    pub async fn list_contacts(
        _ctx: &Ctx,
        mm: &ModelManager,
        project_id: ProjectId,
        agent_id: AgentId,
    ) -> Result<Vec<ContactLink>> {
        let db = mm.db();
        let stmt = db
            .prepare(
                "SELECT id, project_id, agent_a_id, agent_b_id, state, requested_by_id, reason, \
                 created_ts, decided_ts, expires_ts FROM contacts \
                 WHERE project_id = ? AND (agent_a_id = ? OR agent_b_id = ?) ORDER BY created_ts DESC",
            )
            .await?;
        let mut rows = stmt
            .query((project_id.get(), agent_id.get(), agent_id.get()))
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(Self::from_row(row)?);
        }
        Ok(out)
    }

    fn from_row(row: libsql::Row) -> Result<ContactLink> {
        let parse_ts =
            |s: String| NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S").unwrap_or_default();
        let decided: Option<String> = row.get(8)?;
        let expires: Option<String> = row.get(9)?;
        Ok(ContactLink {
            id: ContactLinkId::new(row.get(0)?),
            project_id: ProjectId::new(row.get(1)?),
            agent_a_id: AgentId::new(row.get(2)?),
            agent_b_id: AgentId::new(row.get(3)?),
            state: row.get(4)?,
            requested_by_id: AgentId::new(row.get(5)?),
            reason: row.get(6)?,
            created_ts: parse_ts(row.get(7)?),
            decided_ts: decided.map(&parse_ts),
            expires_ts: expires.map(&parse_ts),
        })
    }
}

//! Search & Summarization.
//!
//! `search_messages` runs an FTS5 `MATCH` query with BM25 ranking over
//! `(subject, body_md)`, falling back to a `LIKE` scan when the query
//! string doesn't parse as FTS5 syntax (bare punctuation, an unbalanced
//! quote). `summarize_thread` is a heuristic digest: no model call, just
//! the line-prefix and action-keyword scans in
//! [`crate::utils::markdown`] run over every message body in the thread.

use crate::model::message::{Message, MessageBmc};
use crate::model::project::ProjectBmc;
use crate::model::ModelManager;
use crate::types::ProjectId;
use crate::utils::markdown;
use crate::{Ctx, Result};
use chrono::NaiveDateTime;
use serde::Serialize;
use utoipa::ToSchema;

/// One search result: the message plus its rank (lower is more relevant
/// for the FTS5 path; `LIKE` fallback results are all rank `0.0`, ordered
/// by recency instead).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SearchHit {
    pub message: Message,
    pub rank: f64,
}

/// A heuristic summary of a thread: no model call, just key points and
/// action items scanned out of every message body.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ThreadDigest {
    pub thread_id: String,
    pub message_count: usize,
    pub participants: Vec<String>,
    pub key_points: Vec<String>,
    pub action_items: Vec<String>,
    pub first_ts: Option<NaiveDateTime>,
    pub last_ts: Option<NaiveDateTime>,
}

pub struct SearchBmc;

impl SearchBmc {
    /// Full-text searches `query` within `project_id`. Tries FTS5 `MATCH`
    /// first; on a syntax error from the query parser, falls back to a
    /// `LIKE '%query%'` scan over subject/body_md ordered by recency.
    pub async fn search_messages(
        ctx: &Ctx,
        mm: &ModelManager,
        project_id: ProjectId,
        query: &str,
        limit: i64,
    ) -> Result<Vec<SearchHit>> {
        match Self::search_fts(mm, project_id, query, limit).await {
            Ok(hits) => Ok(hits),
            Err(crate::Error::Libsql(_)) => Self::search_like(ctx, mm, project_id, query, limit).await,
            Err(e) => Err(e),
        }
    }

    async fn search_fts(
        mm: &ModelManager,
        project_id: ProjectId,
        query: &str,
        limit: i64,
    ) -> Result<Vec<SearchHit>> {
        let db = mm.db();
        let stmt = db
            .prepare(
                "SELECT m.id, m.external_id, m.project_id, m.sender_id, a.name, m.thread_id, \
                 m.subject, m.body_md, m.importance, m.ack_required, m.attachments_json, m.created_ts, \
                 bm25(messages_fts) AS rank \
                 FROM messages_fts \
                 JOIN messages m ON m.id = messages_fts.rowid \
                 JOIN agents a ON a.id = m.sender_id \
                 WHERE messages_fts MATCH ? AND m.project_id = ? \
                 ORDER BY rank LIMIT ?",
            )
            .await?;
        let mut rows = stmt.query((query, project_id.get(), limit)).await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            let rank: f64 = row.get(12)?;
            out.push(SearchHit {
                message: Self::message_from_search_row(&row)?,
                rank,
            });
        }
        Ok(out)
    }

    async fn search_like(
        ctx: &Ctx,
        mm: &ModelManager,
        project_id: ProjectId,
        query: &str,
        limit: i64,
    ) -> Result<Vec<SearchHit>> {
        let db = mm.db();
        let pattern = format!("%{}%", query.replace('%', "\\%").replace('_', "\\_"));
        let stmt = db
            .prepare(
                "SELECT m.id, m.external_id, m.project_id, m.sender_id, a.name, m.thread_id, \
                 m.subject, m.body_md, m.importance, m.ack_required, m.attachments_json, m.created_ts \
                 FROM messages m JOIN agents a ON a.id = m.sender_id \
                 WHERE m.project_id = ? AND (m.subject LIKE ? ESCAPE '\\' OR m.body_md LIKE ? ESCAPE '\\') \
                 ORDER BY m.created_ts DESC LIMIT ?",
            )
            .await?;
        let mut rows = stmt
            .query((project_id.get(), pattern.clone(), pattern, limit))
            .await?;

        let _ = ctx;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(SearchHit {
                message: Self::message_from_search_row(&row)?,
                rank: 0.0,
            });
        }
        Ok(out)
    }

    fn message_from_search_row(row: &libsql::Row) -> Result<Message> {
        let parse_ts =
            |s: String| NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S").unwrap_or_default();
        let attachments_json: String = row.get(10)?;
        Ok(Message {
            id: crate::types::MessageId::new(row.get(0)?),
            external_id: row.get(1)?,
            project_id: ProjectId::new(row.get(2)?),
            sender_id: crate::types::AgentId::new(row.get(3)?),
            sender_name: row.get(4)?,
            thread_id: row.get(5)?,
            subject: row.get(6)?,
            body_md: row.get(7)?,
            importance: row.get(8)?,
            ack_required: row.get::<i64>(9)? != 0,
            attachments: serde_json::from_str(&attachments_json).unwrap_or_default(),
            created_ts: parse_ts(row.get(11)?),
        })
    }

    /// Digests a single thread: key points and action items scanned from
    /// every message body, plus the distinct set of senders as
    /// participants.
    pub async fn summarize_thread(
        ctx: &Ctx,
        mm: &ModelManager,
        project_id: ProjectId,
        thread_id: &str,
    ) -> Result<ThreadDigest> {
        let messages = MessageBmc::list_by_thread(ctx, mm, project_id, thread_id).await?;
        Ok(Self::digest(thread_id, &messages))
    }

    /// Digests every thread in a project that has had activity since
    /// `since_ts` (or all threads, if `since_ts` is `None`), used by the
    /// Overseer Briefing view.
    pub async fn summarize_threads(
        ctx: &Ctx,
        mm: &ModelManager,
        project_id: ProjectId,
        since_ts: Option<NaiveDateTime>,
        limit: i64,
    ) -> Result<Vec<ThreadDigest>> {
        let _ = ProjectBmc::get(ctx, mm, project_id).await?;
        let recent = MessageBmc::list_recent(ctx, mm, project_id, limit.max(200)).await?;

        let mut by_thread: std::collections::BTreeMap<String, Vec<Message>> =
            std::collections::BTreeMap::new();
        for message in recent {
            if let Some(since) = since_ts {
                if message.created_ts < since {
                    continue;
                }
            }
            let key = message
                .thread_id
                .clone()
                .unwrap_or_else(|| message.id.get().to_string());
            by_thread.entry(key).or_default().push(message);
        }

        let mut digests: Vec<ThreadDigest> = by_thread
            .into_iter()
            .map(|(thread_id, messages)| Self::digest(&thread_id, &messages))
            .collect();
        digests.sort_by(|a, b| b.last_ts.cmp(&a.last_ts));
        digests.truncate(limit as usize);
        Ok(digests)
    }

    fn digest(thread_id: &str, messages: &[Message]) -> ThreadDigest {
        let bodies: Vec<&str> = messages.iter().map(|m| m.body_md.as_str()).collect();
        let key_points = markdown::extract_key_points(bodies.iter().copied());
        let action_items = markdown::extract_actions(bodies.iter().copied());

        let mut seen = std::collections::HashSet::new();
        let mut participants = Vec::new();
        for message in messages {
            if seen.insert(message.sender_name.clone()) {
                participants.push(message.sender_name.clone());
            }
        }

        ThreadDigest {
            thread_id: thread_id.to_string(),
            message_count: messages.len(),
            participants,
            key_points,
            action_items,
            first_ts: messages.first().map(|m| m.created_ts),
            last_ts: messages.last().map(|m| m.created_ts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AgentId, MessageId};

    fn msg(id: i64, sender: &str, body: &str, ts: &str) -> Message {
        Message {
            id: MessageId::new(id),
            external_id: format!("msg_{id}"),
            project_id: ProjectId::new(1),
            sender_id: AgentId::new(1),
            sender_name: sender.to_string(),
            thread_id: Some("t1".to_string()),
            subject: "subject".to_string(),
            body_md: body.to_string(),
            importance: "normal".to_string(),
            ack_required: false,
            attachments: vec![],
            created_ts: NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").unwrap(),
        }
    }

    #[test]
    fn digest_collects_points_actions_and_distinct_participants() {
        let messages = vec![
            msg(1, "Alice", "# Kickoff\n- TODO: write tests", "2026-01-01 00:00:00"),
            msg(2, "Bob", "- NEXT: ship it", "2026-01-02 00:00:00"),
            msg(3, "Alice", "just a reply", "2026-01-03 00:00:00"),
        ];
        let digest = SearchBmc::digest("t1", &messages);
        assert_eq!(digest.message_count, 3);
        assert_eq!(digest.participants, vec!["Alice", "Bob"]);
        assert_eq!(digest.key_points, vec!["Kickoff", "write tests", "ship it"]);
        assert_eq!(digest.action_items, vec!["write tests", "ship it"]);
        assert_eq!(digest.first_ts, Some(messages[0].created_ts));
        assert_eq!(digest.last_ts, Some(messages[2].created_ts));
    }
}

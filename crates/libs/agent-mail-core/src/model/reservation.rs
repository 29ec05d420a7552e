//! File Reservation Lease Manager.
//!
//! TTL-bounded advisory locks over repo-relative path globs. Leases are
//! not enforced by the filesystem; they exist so that agents can signal
//! editing intent to each other, and so the Guard Hook Generator and the
//! `CLAIMS_ENFORCEMENT_ENABLED` send-time check have something to consult.

use crate::model::ModelManager;
use crate::store::{fs_store, git_store};
use crate::types::{AgentId, ProjectId, ReservationId};
use crate::utils::pathspec::paths_conflict;
use crate::{Ctx, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Minimum lease lifetime; shorter requests are clamped up to this.
pub const MIN_TTL_SECONDS: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Reservation {
    pub id: ReservationId,
    pub project_id: ProjectId,
    pub agent_id: AgentId,
    pub agent_name: String,
    pub path_pattern: String,
    pub exclusive: bool,
    pub reason: Option<String>,
    pub created_ts: NaiveDateTime,
    pub expires_ts: NaiveDateTime,
    pub released_ts: Option<NaiveDateTime>,
}

impl Reservation {
    pub fn is_active(&self, now: NaiveDateTime) -> bool {
        self.released_ts.is_none() && self.expires_ts > now
    }
}

/// A pattern that could not be granted because it conflicts with an
/// existing active exclusive lease held by a different agent.
#[derive(Debug, Clone, Serialize)]
pub struct ReservationConflict {
    pub path_pattern: String,
    pub holder_agent_id: AgentId,
    pub holder_agent_name: String,
    pub holder_pattern: String,
    pub expires_ts: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReserveResult {
    pub granted: Vec<Reservation>,
    pub conflicts: Vec<ReservationConflict>,
}

pub struct ReservationBmc;

impl ReservationBmc {
    /// Expires stale leases (`released_ts IS NULL AND expires_ts < now`)
    /// for a project. Called at the top of every mutating operation so
    /// that reads and conflict checks never see phantom actives.
    async fn expire_stale(mm: &ModelManager, project_id: ProjectId) -> Result<()> {
        let db = mm.db();
        let now = crate::model::now_ts_string();
        let stmt = db
            .prepare(
                "UPDATE reservations SET released_ts = ? \
                 WHERE project_id = ? AND released_ts IS NULL AND expires_ts < ?",
            )
            .await?;
        stmt.execute((now.clone(), project_id.get(), now)).await?;
        Ok(())
    }

    /// Lists active (non-released, non-expired) reservations for a
    /// project, joined with the holder's name.
    pub async fn list_active_for_project(
        ctx: &Ctx,
        mm: &ModelManager,
        project_id: ProjectId,
    ) -> Result<Vec<Reservation>> {
        Self::expire_stale(mm, project_id).await?;
        let _ = ctx;
        let db = mm.db();
        let stmt = db
            .prepare(
                "SELECT r.id, r.project_id, r.agent_id, a.name, r.path_pattern, r.exclusive, \
                 r.reason, r.created_ts, r.expires_ts, r.released_ts \
                 FROM reservations r JOIN agents a ON a.id = r.agent_id \
                 WHERE r.project_id = ? AND r.released_ts IS NULL AND r.expires_ts > ? \
                 ORDER BY r.created_ts DESC",
            )
            .await?;
        let now = crate::model::now_ts_string();
        let mut rows = stmt.query((project_id.get(), now)).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(Self::from_row(row)?);
        }
        Ok(out)
    }

    /// Whether two distinct agents both hold an active reservation on
    /// overlapping patterns in a project (used by the Contact Policy
    /// Engine's `auto` rule).
    pub async fn have_overlapping_active_reservations(
        ctx: &Ctx,
        mm: &ModelManager,
        project_id: ProjectId,
        agent_a: AgentId,
        agent_b: AgentId,
    ) -> Result<bool> {
        let active = Self::list_active_for_project(ctx, mm, project_id).await?;
        let a_patterns: Vec<&str> = active
            .iter()
            .filter(|r| r.agent_id == agent_a)
            .map(|r| r.path_pattern.as_str())
            .collect();
        let b_patterns: Vec<&str> = active
            .iter()
            .filter(|r| r.agent_id == agent_b)
            .map(|r| r.path_pattern.as_str())
            .collect();
        for a in &a_patterns {
            for b in &b_patterns {
                if paths_conflict(a, b) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Reserves one or more path patterns for `agent_id`. Non-conflicting
    /// patterns are granted; conflicting ones are reported. When
    /// `all_or_nothing` is set and any pattern conflicts, nothing is
    /// granted.
    #[allow(clippy::too_many_arguments)]
    pub async fn reserve(
        ctx: &Ctx,
        mm: &ModelManager,
        project_id: ProjectId,
        agent_id: AgentId,
        patterns: &[String],
        ttl_seconds: i64,
        exclusive: bool,
        reason: Option<String>,
        all_or_nothing: bool,
    ) -> Result<ReserveResult> {
        Self::expire_stale(mm, project_id).await?;
        let active = Self::list_active_for_project(ctx, mm, project_id).await?;

        let mut conflicts = Vec::new();
        let mut grantable = Vec::new();
        for pattern in patterns {
            let conflict = active.iter().find(|r| {
                r.agent_id != agent_id
                    && (r.exclusive || exclusive)
                    && paths_conflict(&r.path_pattern, pattern)
            });
            match conflict {
                Some(holder) => conflicts.push(ReservationConflict {
                    path_pattern: pattern.clone(),
                    holder_agent_id: holder.agent_id,
                    holder_agent_name: holder.agent_name.clone(),
                    holder_pattern: holder.path_pattern.clone(),
                    expires_ts: holder.expires_ts,
                }),
                None => grantable.push(pattern.clone()),
            }
        }

        if all_or_nothing && !conflicts.is_empty() {
            return Ok(ReserveResult {
                granted: vec![],
                conflicts,
            });
        }

        let clamped_ttl = ttl_seconds.max(MIN_TTL_SECONDS);
        let mut granted = Vec::new();
        for pattern in grantable {
            let reservation = Self::insert_and_archive(
                ctx,
                mm,
                project_id,
                agent_id,
                &pattern,
                exclusive,
                reason.as_deref(),
                clamped_ttl,
            )
            .await?;
            granted.push(reservation);
        }

        Ok(ReserveResult { granted, conflicts })
    }

    #[allow(clippy::too_many_arguments)]
    async fn insert_and_archive(
        ctx: &Ctx,
        mm: &ModelManager,
        project_id: ProjectId,
        agent_id: AgentId,
        pattern: &str,
        exclusive: bool,
        reason: Option<&str>,
        ttl_seconds: i64,
    ) -> Result<Reservation> {
        let db = mm.db();
        let now = chrono::Utc::now().naive_utc();
        let expires = now + chrono::Duration::seconds(ttl_seconds);
        let now_s = now.format("%Y-%m-%d %H:%M:%S").to_string();
        let expires_s = expires.format("%Y-%m-%d %H:%M:%S").to_string();

        let stmt = db
            .prepare(
                "INSERT INTO reservations (project_id, agent_id, path_pattern, exclusive, reason, \
                 created_ts, expires_ts) VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
            )
            .await?;
        let mut rows = stmt
            .query((
                project_id.get(),
                agent_id.get(),
                pattern,
                exclusive,
                reason,
                now_s,
                expires_s,
            ))
            .await?;
        let id: i64 = if let Some(row) = rows.next().await? {
            row.get(0)?
        } else {
            return Err(crate::Error::InvalidInput("failed to create reservation".into()));
        };

        let reservation = Self::get(ctx, mm, ReservationId::new(id)).await?;
        Self::write_claim_artifact(mm, &reservation).await?;
        Ok(reservation)
    }

    pub async fn get(_ctx: &Ctx, mm: &ModelManager, id: ReservationId) -> Result<Reservation> {
        let db = mm.db();
        let stmt = db
            .prepare(
                "SELECT r.id, r.project_id, r.agent_id, a.name, r.path_pattern, r.exclusive, \
                 r.reason, r.created_ts, r.expires_ts, r.released_ts \
                 FROM reservations r JOIN agents a ON a.id = r.agent_id WHERE r.id = ?",
            )
            .await?;
        let mut rows = stmt.query([id.get()]).await?;
        if let Some(row) = rows.next().await? {
            Self::from_row(row)
        } else {
            Err(crate::Error::ReservationNotFound(id.get().to_string()))
        }
    }

    /// Releases active leases held by `agent_id` matching `patterns` (or
    /// all of the agent's active leases when `patterns` is `None`).
    pub async fn release(
        ctx: &Ctx,
        mm: &ModelManager,
        project_id: ProjectId,
        agent_id: AgentId,
        patterns: Option<&[String]>,
    ) -> Result<u64> {
        let active = Self::list_active_for_project(ctx, mm, project_id).await?;
        let targets: Vec<&Reservation> = active
            .iter()
            .filter(|r| r.agent_id == agent_id)
            .filter(|r| patterns.is_none_or(|ps| ps.iter().any(|p| p == &r.path_pattern)))
            .collect();

        let db = mm.db();
        let now = crate::model::now_ts_string();
        let mut count = 0u64;
        for r in targets {
            let stmt = db
                .prepare("UPDATE reservations SET released_ts = ? WHERE id = ?")
                .await?;
            stmt.execute((now.clone(), r.id.get())).await?;
            count += 1;
        }
        Ok(count)
    }

    /// Extends active leases held by `agent_id` by `extend_seconds`.
    /// Refuses (silently skips) released/expired leases.
    pub async fn renew(
        ctx: &Ctx,
        mm: &ModelManager,
        project_id: ProjectId,
        agent_id: AgentId,
        extend_seconds: i64,
        patterns: Option<&[String]>,
    ) -> Result<Vec<Reservation>> {
        let active = Self::list_active_for_project(ctx, mm, project_id).await?;
        let targets: Vec<&Reservation> = active
            .iter()
            .filter(|r| r.agent_id == agent_id)
            .filter(|r| patterns.is_none_or(|ps| ps.iter().any(|p| p == &r.path_pattern)))
            .collect();

        let db = mm.db();
        let mut out = Vec::new();
        for r in targets {
            let new_expires = r.expires_ts + chrono::Duration::seconds(extend_seconds);
            let new_expires_s = new_expires.format("%Y-%m-%d %H:%M:%S").to_string();
            let stmt = db
                .prepare("UPDATE reservations SET expires_ts = ? WHERE id = ?")
                .await?;
            stmt.execute((new_expires_s, r.id.get())).await?;
            let updated = Self::get(ctx, mm, r.id).await?;
            Self::write_claim_artifact(mm, &updated).await?;
            out.push(updated);
        }
        Ok(out)
    }

    /// Operator-privileged release regardless of holder. Requires writer
    /// role.
    pub async fn force_release(ctx: &Ctx, mm: &ModelManager, id: ReservationId) -> Result<()> {
        if !ctx.is_writer() {
            return Err(crate::Error::Internal {
                message: "force_release requires writer role".into(),
                correlation_id: ctx.correlation_id().to_string(),
            });
        }
        let db = mm.db();
        let now = crate::model::now_ts_string();
        let stmt = db
            .prepare("UPDATE reservations SET released_ts = ? WHERE id = ?")
            .await?;
        stmt.execute((now, id.get())).await?;
        Ok(())
    }

    /// Writes the `claims/<sha1(path_pattern)>.json` artifact and commits
    /// it under the per-project write lock.
    async fn write_claim_artifact(mm: &ModelManager, reservation: &Reservation) -> Result<()> {
        let project =
            super::project::ProjectBmc::get(&Ctx::root_ctx(), mm, reservation.project_id).await?;
        let slug_root = fs_store::project_repo_root(&mm.repo_root, &project.slug);
        let path = fs_store::claim_artifact_path(&slug_root, &reservation.path_pattern);

        #[derive(Serialize)]
        struct ClaimArtifact<'a> {
            agent_name: &'a str,
            path_pattern: &'a str,
            exclusive: bool,
            reason: &'a Option<String>,
            created_ts: String,
            expires_ts: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            released_ts: Option<String>,
        }
        let artifact = ClaimArtifact {
            agent_name: &reservation.agent_name,
            path_pattern: &reservation.path_pattern,
            exclusive: reservation.exclusive,
            reason: &reservation.reason,
            created_ts: reservation.created_ts.and_utc().to_rfc3339(),
            expires_ts: reservation.expires_ts.and_utc().to_rfc3339(),
            released_ts: reservation.released_ts.map(|ts| ts.and_utc().to_rfc3339()),
        };
        let json = serde_json::to_vec_pretty(&artifact)?;
        fs_store::atomic_write(&path, &json)?;

        let relative = path
            .strip_prefix(&mm.repo_root)
            .unwrap_or(&path)
            .to_path_buf();
        let _guard = mm.git_lock.lock().await;
        let repo_arc = mm.get_repo().await?;
        let repo = repo_arc.lock().await;
        git_store::commit_paths(
            &repo,
            &[relative],
            &format!(
                "reserve: {} claims {}\n\nAgent: {}\nKind: reserve",
                reservation.agent_name, reservation.path_pattern, reservation.agent_name
            ),
            "mcp-agent-mail",
            "bot@local",
        )?;
        Ok(())
    }

    fn from_row(row: libsql::Row) -> Result<Reservation> {
        let parse_ts =
            |s: String| NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S").unwrap_or_default();
        let released: Option<String> = row.get(9)?;
        Ok(Reservation {
            id: ReservationId::new(row.get(0)?),
            project_id: ProjectId::new(row.get(1)?),
            agent_id: AgentId::new(row.get(2)?),
            agent_name: row.get(3)?,
            path_pattern: row.get(4)?,
            exclusive: row.get::<i64>(5)? != 0,
            reason: row.get(6)?,
            created_ts: parse_ts(row.get(7)?),
            expires_ts: parse_ts(row.get(8)?),
            released_ts: released.map(parse_ts),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_is_clamped_to_minimum() {
        assert_eq!(10i64.max(MIN_TTL_SECONDS), 60);
        assert_eq!(600i64.max(MIN_TTL_SECONDS), 600);
    }
}

//! Agent registry.
//!
//! Agents are memorable named identities scoped to a project. `register`
//! is idempotent on `(project, name)`: a second call with the same name
//! returns the existing agent rather than creating a duplicate, updating
//! its descriptive fields and touching `last_active_ts`.

use crate::model::ModelManager;
use crate::store::fs_store;
use crate::types::{AgentId, ProjectId};
use crate::utils::names::unique_agent_name;
use crate::utils::validation::{validate_agent_name, validate_attachments_policy, validate_contact_policy};
use crate::{Ctx, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A memorable named identity scoped to a project.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Agent {
    pub id: AgentId,
    pub project_id: ProjectId,
    pub name: String,
    pub program: Option<String>,
    pub model: Option<String>,
    pub task: Option<String>,
    pub attachments_policy: String,
    pub contact_policy: String,
    pub inception_ts: NaiveDateTime,
    pub last_active_ts: NaiveDateTime,
}

/// Input to `register_agent`. `name` is an optional hint; when absent or
/// taken, [`unique_agent_name`] picks a random `Adjective+Noun`.
#[derive(Debug, Deserialize)]
pub struct AgentForRegister {
    pub project_id: ProjectId,
    pub name_hint: Option<String>,
    pub program: Option<String>,
    pub model: Option<String>,
    pub task: Option<String>,
    pub attachments_policy: Option<String>,
    pub contact_policy: Option<String>,
}

pub struct AgentBmc;

impl AgentBmc {
    /// Registers an agent, idempotent on `(project, name)` when
    /// `name_hint` sanitizes to an existing agent's name.
    pub async fn register(ctx: &Ctx, mm: &ModelManager, input: AgentForRegister) -> Result<Agent> {
        let attachments_policy = input.attachments_policy.unwrap_or_else(|| "auto".to_string());
        let contact_policy = input.contact_policy.unwrap_or_else(|| "auto".to_string());
        validate_attachments_policy(&attachments_policy)?;
        validate_contact_policy(&contact_policy)?;

        // Idempotency: if the hint names an existing agent exactly, return it.
        if let Some(hint) = &input.name_hint {
            if validate_agent_name(hint).is_ok() {
                if let Ok(existing) = Self::get_by_name(ctx, mm, input.project_id, hint).await {
                    Self::touch_activity(ctx, mm, existing.id).await?;
                    return Self::get(ctx, mm, existing.id).await;
                }
            }
        }

        let existing_names = Self::list_all_for_project(ctx, mm, input.project_id)
            .await?
            .into_iter()
            .map(|a| a.name)
            .collect::<std::collections::HashSet<_>>();

        let name = unique_agent_name(input.name_hint.as_deref(), |candidate| {
            existing_names.contains(candidate)
        })
        .map_err(crate::Error::NameExhaustion)?;

        let db = mm.db();
        let stmt = db
            .prepare(
                "INSERT INTO agents (project_id, name, program, model, task, attachments_policy, contact_policy) \
                 VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
            )
            .await?;
        let mut rows = stmt
            .query((
                input.project_id.get(),
                name.clone(),
                input.program.clone(),
                input.model.clone(),
                input.task.clone(),
                attachments_policy.clone(),
                contact_policy.clone(),
            ))
            .await?;

        let id: i64 = if let Some(row) = rows.next().await? {
            row.get(0)?
        } else {
            return Err(crate::Error::InvalidInput("failed to create agent".into()));
        };

        let agent = Self::get(ctx, mm, AgentId::new(id)).await?;
        Self::write_profile(mm, &agent).await?;
        Ok(agent)
    }

    pub async fn get(_ctx: &Ctx, mm: &ModelManager, id: AgentId) -> Result<Agent> {
        let db = mm.db();
        let stmt = db
            .prepare(
                "SELECT id, project_id, name, program, model, task, attachments_policy, \
                 contact_policy, inception_ts, last_active_ts FROM agents WHERE id = ?",
            )
            .await?;
        let mut rows = stmt.query([id.get()]).await?;
        if let Some(row) = rows.next().await? {
            Ok(Self::from_row(row)?)
        } else {
            Err(crate::Error::NotFound)
        }
    }

    pub async fn get_by_name(
        _ctx: &Ctx,
        mm: &ModelManager,
        project_id: ProjectId,
        name: &str,
    ) -> Result<Agent> {
        let db = mm.db();
        let stmt = db
            .prepare(
                "SELECT id, project_id, name, program, model, task, attachments_policy, \
                 contact_policy, inception_ts, last_active_ts FROM agents WHERE project_id = ? AND name = ?",
            )
            .await?;
        let mut rows = stmt.query((project_id.get(), name)).await?;
        if let Some(row) = rows.next().await? {
            Ok(Self::from_row(row)?)
        } else {
            let agents = Self::list_all_for_project(_ctx, mm, project_id).await?;
            let names: Vec<&str> = agents.iter().map(|a| a.name.as_str()).collect();
            let suggestions = crate::utils::mistake_detection::suggest_similar(name, &names, 3)
                .into_iter()
                .map(|s| s.to_string())
                .collect();
            Err(crate::Error::agent_not_found_with_suggestions(name, suggestions))
        }
    }

    pub async fn list_all_for_project(
        _ctx: &Ctx,
        mm: &ModelManager,
        project_id: ProjectId,
    ) -> Result<Vec<Agent>> {
        let db = mm.db();
        let stmt = db
            .prepare(
                "SELECT id, project_id, name, program, model, task, attachments_policy, \
                 contact_policy, inception_ts, last_active_ts FROM agents WHERE project_id = ? ORDER BY name",
            )
            .await?;
        let mut rows = stmt.query([project_id.get()]).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(Self::from_row(row)?);
        }
        Ok(out)
    }

    /// Bumps `last_active_ts` to now. Called on every interaction.
    pub async fn touch_activity(_ctx: &Ctx, mm: &ModelManager, id: AgentId) -> Result<()> {
        let db = mm.db();
        let now = crate::model::now_ts_string();
        let stmt = db
            .prepare("UPDATE agents SET last_active_ts = ? WHERE id = ?")
            .await?;
        stmt.execute((now, id.get())).await?;
        Ok(())
    }

    /// Sets an agent's contact policy.
    pub async fn set_contact_policy(
        _ctx: &Ctx,
        mm: &ModelManager,
        id: AgentId,
        policy: &str,
    ) -> Result<()> {
        validate_contact_policy(policy)?;
        let db = mm.db();
        let stmt = db
            .prepare("UPDATE agents SET contact_policy = ? WHERE id = ?")
            .await?;
        stmt.execute((policy, id.get())).await?;
        Ok(())
    }

    /// An agent is "active" if it has interacted within the last 7 days.
    pub fn is_active(agent: &Agent, now: NaiveDateTime) -> bool {
        now.signed_duration_since(agent.last_active_ts) <= chrono::Duration::days(7)
    }

    /// Writes `agents/<name>/profile.json` under the project's archive
    /// tree, mirroring the Agent entity (excluding surrogate ids).
    async fn write_profile(mm: &ModelManager, agent: &Agent) -> Result<()> {
        let project = super::project::ProjectBmc::get(&Ctx::root_ctx(), mm, agent.project_id).await?;
        let slug_root = fs_store::project_repo_root(&mm.repo_root, &project.slug);
        let path = fs_store::agent_profile_path(&slug_root, &agent.name);

        #[derive(Serialize)]
        struct Profile<'a> {
            name: &'a str,
            program: &'a Option<String>,
            model: &'a Option<String>,
            task: &'a Option<String>,
            attachments_policy: &'a str,
            contact_policy: &'a str,
            inception_ts: String,
            last_active_ts: String,
        }
        let profile = Profile {
            name: &agent.name,
            program: &agent.program,
            model: &agent.model,
            task: &agent.task,
            attachments_policy: &agent.attachments_policy,
            contact_policy: &agent.contact_policy,
            inception_ts: agent.inception_ts.format("%Y-%m-%d %H:%M:%S").to_string(),
            last_active_ts: agent.last_active_ts.format("%Y-%m-%d %H:%M:%S").to_string(),
        };
        let json = serde_json::to_vec_pretty(&profile)?;
        fs_store::atomic_write(&path, &json)?;
        Ok(())
    }

    fn from_row(row: libsql::Row) -> Result<Agent> {
        let parse_ts = |s: String| {
            NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S").unwrap_or_default()
        };
        Ok(Agent {
            id: AgentId::new(row.get(0)?),
            project_id: ProjectId::new(row.get(1)?),
            name: row.get(2)?,
            program: row.get(3)?,
            model: row.get(4)?,
            task: row.get(5)?,
            attachments_policy: row.get(6)?,
            contact_policy: row.get(7)?,
            inception_ts: parse_ts(row.get(8)?),
            last_active_ts: parse_ts(row.get(9)?),
        })
    }
}

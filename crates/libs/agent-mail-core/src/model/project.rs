//! Project management for multi-agent workspaces.
//!
//! Projects are the top-level unit of isolation: each owns its own archive
//! tree, Git repository, agents, messages, reservations, and contact links.
//! `ensure_project` is idempotent on `human_key`, matching the Identifier &
//! Name Generator's resolution rule (`slug(human_key) = slug` for any
//! project created in the default identity mode).
//!
//! # Example
//!
//! ```no_run
//! use agent_mail_core::model::project::ProjectBmc;
//! use agent_mail_core::model::ModelManager;
//! use agent_mail_core::ctx::Ctx;
//!
//! # async fn example() -> agent_mail_core::Result<()> {
//! let mm = ModelManager::new(std::sync::Arc::new(agent_mail_common::config::AppConfig::default())).await?;
//! let ctx = Ctx::root_ctx();
//! let project = ProjectBmc::ensure_project(&ctx, &mm, "/abs/backend").await?;
//! println!("Project: {}", project.slug);
//! # Ok(())
//! # }
//! ```

use crate::model::ModelManager;
use crate::store::git_store;
use crate::types::ProjectId;
use crate::utils::mistake_detection::suggest_similar;
use crate::Result;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::Path;
use utoipa::ToSchema;

/// A project workspace for AI agents.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Project {
    pub id: ProjectId,
    pub slug: String,
    pub human_key: String,
    pub created_at: NaiveDateTime,
}

pub struct ProjectBmc;

impl ProjectBmc {
    /// Creates (or returns the existing) project for `human_key`, deriving
    /// `slug` via [`crate::utils::slugify`]. Idempotent: a second call with
    /// the same `human_key` returns the same project rather than erroring
    /// on the `human_key` uniqueness constraint.
    pub async fn ensure_project(
        ctx: &crate::Ctx,
        mm: &ModelManager,
        human_key: &str,
    ) -> Result<Project> {
        if let Ok(existing) = Self::get_by_human_key(ctx, mm, human_key).await {
            return Ok(existing);
        }

        let slug = crate::utils::slugify(human_key);
        let id = Self::create(ctx, mm, &slug, human_key).await?;
        Self::get(ctx, mm, id).await
    }

    /// Inserts a new project row and initializes its archive directory.
    /// Callers that want idempotency on `human_key` should use
    /// [`Self::ensure_project`] instead.
    pub async fn create(
        _ctx: &crate::Ctx,
        mm: &ModelManager,
        slug: &str,
        human_key: &str,
    ) -> Result<ProjectId> {
        let db = mm.db();
        let stmt = db
            .prepare("INSERT INTO projects (slug, human_key) VALUES (?, ?) RETURNING id")
            .await?;
        let mut rows = stmt.query([slug, human_key]).await?;

        let id: i64 = if let Some(row) = rows.next().await? {
            row.get::<i64>(0)?
        } else {
            return Err(crate::Error::InvalidInput(
                "Failed to create project".into(),
            ));
        };

        Self::ensure_archive(mm, slug).await?;
        Ok(ProjectId::new(id))
    }

    /// Lists all projects ordered by creation time (newest first).
    pub async fn list_all(_ctx: &crate::Ctx, mm: &ModelManager) -> Result<Vec<Project>> {
        let db = mm.db();
        let stmt = db
            .prepare(
                "SELECT id, slug, human_key, created_at FROM projects ORDER BY created_at DESC",
            )
            .await?;
        let mut rows = stmt.query(()).await?;

        let mut projects = Vec::new();
        while let Some(row) = rows.next().await? {
            projects.push(Self::from_row(row)?);
        }
        Ok(projects)
    }

    /// Retrieves a project by its slug (URL-safe identifier).
    pub async fn get_by_slug(_ctx: &crate::Ctx, mm: &ModelManager, slug: &str) -> Result<Project> {
        let db = mm.db();
        let stmt = db
            .prepare("SELECT id, slug, human_key, created_at FROM projects WHERE slug = ?")
            .await?;
        let mut rows = stmt.query([slug]).await?;

        if let Some(row) = rows.next().await? {
            Self::from_row(row)
        } else {
            let stmt = db.prepare("SELECT slug FROM projects").await?;
            let mut rows = stmt.query(()).await?;
            let mut all_slugs: Vec<String> = Vec::new();
            while let Some(row) = rows.next().await? {
                all_slugs.push(row.get(0)?);
            }
            let slug_refs: Vec<&str> = all_slugs.iter().map(|s| s.as_str()).collect();
            let suggestions = suggest_similar(slug, &slug_refs, 3)
                .into_iter()
                .map(|s| s.to_string())
                .collect();

            Err(crate::Error::project_not_found_with_suggestions(
                slug, suggestions,
            ))
        }
    }

    /// Retrieves a project by its human-readable key.
    pub async fn get_by_human_key(
        _ctx: &crate::Ctx,
        mm: &ModelManager,
        human_key: &str,
    ) -> Result<Project> {
        let db = mm.db();
        let stmt = db
            .prepare("SELECT id, slug, human_key, created_at FROM projects WHERE human_key = ?")
            .await?;
        let mut rows = stmt.query([human_key]).await?;

        if let Some(row) = rows.next().await? {
            Self::from_row(row)
        } else {
            let stmt = db.prepare("SELECT human_key FROM projects").await?;
            let mut rows = stmt.query(()).await?;
            let mut all_keys: Vec<String> = Vec::new();
            while let Some(row) = rows.next().await? {
                all_keys.push(row.get(0)?);
            }
            let key_refs: Vec<&str> = all_keys.iter().map(|s| s.as_str()).collect();
            let suggestions = suggest_similar(human_key, &key_refs, 3)
                .into_iter()
                .map(|s| s.to_string())
                .collect();

            Err(crate::Error::project_not_found_with_suggestions(
                human_key, suggestions,
            ))
        }
    }

    /// Resolves either a slug or a human_key (tries slug, then human_key,
    /// then the slugified form of the identifier) to a project.
    pub async fn get_by_identifier(
        ctx: &crate::Ctx,
        mm: &ModelManager,
        identifier: &str,
    ) -> Result<Project> {
        if let Ok(project) = Self::get_by_slug(ctx, mm, identifier).await {
            return Ok(project);
        }
        if let Ok(project) = Self::get_by_human_key(ctx, mm, identifier).await {
            return Ok(project);
        }
        let slugified = crate::utils::slugify(identifier);
        if let Ok(project) = Self::get_by_slug(ctx, mm, &slugified).await {
            return Ok(project);
        }

        let db = mm.db();
        let stmt = db.prepare("SELECT slug, human_key FROM projects").await?;
        let mut rows = stmt.query(()).await?;
        let mut all_identifiers: Vec<String> = Vec::new();
        while let Some(row) = rows.next().await? {
            let slug: String = row.get(0)?;
            let human_key: String = row.get(1)?;
            all_identifiers.push(slug);
            all_identifiers.push(human_key);
        }
        let id_refs: Vec<&str> = all_identifiers.iter().map(|s| s.as_str()).collect();
        let suggestions = suggest_similar(identifier, &id_refs, 3)
            .into_iter()
            .map(|s| s.to_string())
            .collect();

        Err(crate::Error::project_not_found_with_suggestions(
            identifier, suggestions,
        ))
    }

    /// Ensures the project's directory exists under the archive root and
    /// that the single shared Git repository at `<storage.root>` has been
    /// initialized with a baseline `.gitattributes` commit.
    pub async fn ensure_archive(mm: &ModelManager, slug: &str) -> Result<()> {
        let repo_root = &mm.repo_root;
        let project_root = repo_root.join("projects").join(slug);
        if !project_root.exists() {
            std::fs::create_dir_all(&project_root)?;
        }

        let _git_guard = mm.git_lock.lock().await;
        let repo = git_store::init_or_open_repo(repo_root)?;

        let attributes_path = ".gitattributes";
        if git_store::read_file_content(&repo, attributes_path).is_err() {
            git_store::commit_file(
                &repo,
                Path::new(attributes_path),
                "*.json text\n*.md text\n",
                "chore: initialize archive",
                "mcp-agent-mail",
                "bot@local",
            )?;
        }
        Ok(())
    }

    /// Counts total messages in a project.
    pub async fn count_messages(
        _ctx: &crate::Ctx,
        mm: &ModelManager,
        project_id: ProjectId,
    ) -> Result<i64> {
        let db = mm.db();
        let stmt = db
            .prepare("SELECT COUNT(*) FROM messages WHERE project_id = ?")
            .await?;
        let mut rows = stmt.query([project_id.get()]).await?;
        if let Some(row) = rows.next().await? {
            Ok(row.get(0)?)
        } else {
            Ok(0)
        }
    }

    /// Retrieves a project by its database ID.
    pub async fn get(_ctx: &crate::Ctx, mm: &ModelManager, id: ProjectId) -> Result<Project> {
        let db = mm.db();
        let stmt = db
            .prepare("SELECT id, slug, human_key, created_at FROM projects WHERE id = ?")
            .await?;
        let mut rows = stmt.query([id.get()]).await?;

        if let Some(row) = rows.next().await? {
            Self::from_row(row)
        } else {
            Err(crate::Error::project_not_found(id.get().to_string()))
        }
    }

    fn from_row(row: libsql::Row) -> Result<Project> {
        let created_at_str: String = row.get(3)?;
        let created_at = NaiveDateTime::parse_from_str(&created_at_str, "%Y-%m-%d %H:%M:%S")
            .unwrap_or_default();
        Ok(Project {
            id: ProjectId::new(row.get(0)?),
            slug: row.get(1)?,
            human_key: row.get(2)?,
            created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_matches_identifier_expectation() {
        assert_eq!(crate::utils::slugify("/abs/backend"), "abs-backend");
    }
}

//! Backend Model Controllers (BMC) and data models for all entities.
//!
//! [`ModelManager`] is the single handle every BMC takes: a database
//! connection, the archive's repo root, a per-process advisory git lock
//! (serializing write sessions the way the per-project file lock described
//! in the specification does, collapsed to one process-wide lock since
//! this server runs single-writer-per-project), and the loaded
//! [`AppConfig`]. It also caches an open [`git2::Repository`] handle so
//! that repeated archive writes do not each pay repository-open overhead
//! (and, more importantly, do not exhaust file descriptors under load).

pub mod agent;
pub mod attachment;
pub mod contact;
pub mod message;
pub mod message_recipient;
pub mod project;
pub mod reservation;
pub mod search;

use agent_mail_common::config::AppConfig;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Per-verb call/error counters, as required by the Tool/Resource Registry
/// (`spec.md` §4.10: "The registry also maintains call counters (calls,
/// errors) per verb for `metrics`").
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct ToolCallStat {
    pub calls: u64,
    pub errors: u64,
}

/// One entry in the recent-usage ring buffer backing
/// `resource://tooling/recent`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RecentToolCall {
    pub tool: String,
    pub status: String,
    pub duration_ms: u64,
    pub ts: String,
}

/// Call counters and a bounded recent-usage ring buffer for every MCP verb,
/// guarded by a plain [`std::sync::Mutex`] rather than routed through the
/// database: these are process-local, best-effort observability numbers,
/// not durable state (`spec.md` §4.10).
#[derive(Debug, Default)]
pub struct ToolMetrics {
    counters: HashMap<String, ToolCallStat>,
    recent: VecDeque<RecentToolCall>,
}

impl ToolMetrics {
    const RECENT_CAPACITY: usize = 200;

    pub fn record(&mut self, tool: &str, ok: bool, duration_ms: u64) {
        let stat = self.counters.entry(tool.to_string()).or_default();
        stat.calls += 1;
        if !ok {
            stat.errors += 1;
        }
        self.recent.push_front(RecentToolCall {
            tool: tool.to_string(),
            status: if ok { "success" } else { "error" }.to_string(),
            duration_ms,
            ts: now_ts_string(),
        });
        if self.recent.len() > Self::RECENT_CAPACITY {
            self.recent.pop_back();
        }
    }

    pub fn counters(&self) -> &HashMap<String, ToolCallStat> {
        &self.counters
    }

    pub fn recent(&self, limit: usize) -> Vec<RecentToolCall> {
        self.recent.iter().take(limit).cloned().collect()
    }
}

/// Current UTC time formatted the way every `_ts` column is stored:
/// naive (no offset), `%Y-%m-%d %H:%M:%S`.
pub fn now_ts_string() -> String {
    chrono::Utc::now()
        .naive_utc()
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Central handle shared by every BMC: database connection, archive root,
/// write-serialization lock, and configuration.
///
/// Cloning a `ModelManager` is cheap: the database connection and the
/// cached git repository handle are themselves reference-counted, and the
/// lock/config are held behind `Arc`. This lets it sit directly in an axum
/// `State<AppState>`.
#[derive(Clone)]
pub struct ModelManager {
    db: libsql::Connection,
    /// Root directory of the archive: `<storage.root>`. Project trees live
    /// under `repo_root/projects/<slug>`.
    pub repo_root: PathBuf,
    /// Serializes write sessions so that one request maps to one commit,
    /// per the Git Commit Coordinator's write-barrier design.
    pub git_lock: Arc<Mutex<()>>,
    pub app_config: Arc<AppConfig>,
    repo_cache: Arc<Mutex<Option<Arc<Mutex<git2::Repository>>>>>,
    /// Tool Registry call/error counters and recent-usage ring buffer
    /// (`spec.md` §4.10), shared across every request handled by this
    /// process.
    pub tool_metrics: Arc<std::sync::Mutex<ToolMetrics>>,
}

impl ModelManager {
    /// Opens (creating if absent) the index database at
    /// `<storage.root>/index.db`, runs schema migrations, and ensures the
    /// archive root directory exists.
    pub async fn new(app_config: Arc<AppConfig>) -> crate::Result<Self> {
        let repo_root = PathBuf::from(&app_config.storage.root);
        std::fs::create_dir_all(&repo_root)?;

        let db_path = repo_root.join("index.db");
        let database = libsql::Builder::new_local(&db_path).build().await?;
        let db = database.connect()?;

        crate::store::db::init_schema(&db).await?;

        Ok(Self {
            db,
            repo_root,
            git_lock: Arc::new(Mutex::new(())),
            app_config,
            repo_cache: Arc::new(Mutex::new(None)),
            tool_metrics: Arc::new(std::sync::Mutex::new(ToolMetrics::default())),
        })
    }

    /// Constructs a `ModelManager` directly from an already-open connection
    /// and a caller-supplied repo root, skipping schema migration. Intended
    /// for tests that open an in-memory database and run
    /// [`crate::store::db::init_schema`] themselves (or rely on it already
    /// having run against a shared fixture database).
    pub fn new_for_test(conn: libsql::Connection, repo_root: PathBuf, app_config: Arc<AppConfig>) -> Self {
        Self {
            db: conn,
            repo_root,
            git_lock: Arc::new(Mutex::new(())),
            app_config,
            repo_cache: Arc::new(Mutex::new(None)),
            tool_metrics: Arc::new(std::sync::Mutex::new(ToolMetrics::default())),
        }
    }

    /// The database connection. Short-lived per-call `prepare`/`query`
    /// sessions are taken against this handle; no session is shared across
    /// concurrently running tasks.
    pub fn db(&self) -> &libsql::Connection {
        &self.db
    }

    /// Returns the cached `git2::Repository` handle for the archive root,
    /// opening (and caching) it on first use. Callers must still hold
    /// `git_lock` for the duration of any write session.
    pub async fn get_repo(&self) -> crate::Result<Arc<Mutex<git2::Repository>>> {
        let mut cache = self.repo_cache.lock().await;
        if let Some(repo) = cache.as_ref() {
            return Ok(repo.clone());
        }
        let repo = crate::store::git_store::init_or_open_repo(&self.repo_root)?;
        let repo = Arc::new(Mutex::new(repo));
        *cache = Some(repo.clone());
        Ok(repo)
    }
}

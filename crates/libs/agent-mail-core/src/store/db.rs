//! Index Store schema.
//!
//! The relational schema backing the archive: projects, agents, messages,
//! message recipients, reservations, contacts, and an external-content
//! FTS5 table mirroring `(subject, body_md)` kept in sync by triggers.
//! [`init_schema`] is idempotent (`CREATE TABLE IF NOT EXISTS` throughout)
//! and is run once by [`crate::model::ModelManager::new`] against a fresh
//! or pre-existing database file.

use crate::Result;

const SCHEMA_STATEMENTS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS projects (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        slug TEXT NOT NULL UNIQUE,
        human_key TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%S', 'now'))
    )"#,
    r#"CREATE TABLE IF NOT EXISTS agents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL REFERENCES projects(id),
        name TEXT NOT NULL,
        program TEXT,
        model TEXT,
        task TEXT,
        attachments_policy TEXT NOT NULL DEFAULT 'auto',
        contact_policy TEXT NOT NULL DEFAULT 'auto',
        inception_ts TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%S', 'now')),
        last_active_ts TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%S', 'now')),
        UNIQUE(project_id, name)
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_agents_project_active ON agents(project_id, last_active_ts)",
    r#"CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        external_id TEXT NOT NULL UNIQUE,
        project_id INTEGER NOT NULL REFERENCES projects(id),
        sender_id INTEGER NOT NULL REFERENCES agents(id),
        thread_id TEXT,
        subject TEXT NOT NULL,
        body_md TEXT NOT NULL,
        importance TEXT NOT NULL DEFAULT 'normal',
        ack_required INTEGER NOT NULL DEFAULT 0,
        attachments_json TEXT NOT NULL DEFAULT '[]',
        created_ts TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%S', 'now'))
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_messages_created ON messages(created_ts)",
    "CREATE INDEX IF NOT EXISTS idx_messages_thread ON messages(thread_id)",
    "CREATE INDEX IF NOT EXISTS idx_messages_importance ON messages(importance)",
    "CREATE INDEX IF NOT EXISTS idx_messages_project ON messages(project_id)",
    r#"CREATE TABLE IF NOT EXISTS message_recipients (
        message_id INTEGER NOT NULL REFERENCES messages(id),
        agent_id INTEGER NOT NULL REFERENCES agents(id),
        recipient_type TEXT NOT NULL,
        read_ts TEXT,
        ack_ts TEXT,
        PRIMARY KEY (message_id, agent_id)
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_recipients_agent ON message_recipients(agent_id)",
    r#"CREATE TABLE IF NOT EXISTS reservations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL REFERENCES projects(id),
        agent_id INTEGER NOT NULL REFERENCES agents(id),
        path_pattern TEXT NOT NULL,
        exclusive INTEGER NOT NULL DEFAULT 1,
        reason TEXT,
        created_ts TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%S', 'now')),
        expires_ts TEXT NOT NULL,
        released_ts TEXT
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_reservations_active ON reservations(project_id, released_ts, expires_ts, path_pattern)",
    r#"CREATE TABLE IF NOT EXISTS contacts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL REFERENCES projects(id),
        agent_a_id INTEGER NOT NULL REFERENCES agents(id),
        agent_b_id INTEGER NOT NULL REFERENCES agents(id),
        state TEXT NOT NULL DEFAULT 'pending',
        requested_by_id INTEGER NOT NULL REFERENCES agents(id),
        reason TEXT,
        created_ts TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%S', 'now')),
        decided_ts TEXT,
        expires_ts TEXT,
        UNIQUE(project_id, agent_a_id, agent_b_id)
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_contacts_project ON contacts(project_id)",
    r#"CREATE TABLE IF NOT EXISTS attachments (
        sha1 TEXT PRIMARY KEY,
        project_id INTEGER NOT NULL REFERENCES projects(id),
        media_type TEXT NOT NULL,
        bytes INTEGER NOT NULL,
        ext TEXT NOT NULL,
        conversion_failed INTEGER NOT NULL DEFAULT 0,
        original_ext TEXT,
        created_ts TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%S', 'now'))
    )"#,
    // External-content FTS5 index over subject/body_md, synced by triggers.
    r#"CREATE VIRTUAL TABLE IF NOT EXISTS messages_fts USING fts5(
        subject,
        body_md,
        content='messages',
        content_rowid='id'
    )"#,
    r#"CREATE TRIGGER IF NOT EXISTS messages_fts_insert AFTER INSERT ON messages BEGIN
        INSERT INTO messages_fts(rowid, subject, body_md) VALUES (new.id, new.subject, new.body_md);
    END"#,
    r#"CREATE TRIGGER IF NOT EXISTS messages_fts_delete AFTER DELETE ON messages BEGIN
        INSERT INTO messages_fts(messages_fts, rowid, subject, body_md) VALUES ('delete', old.id, old.subject, old.body_md);
    END"#,
    r#"CREATE TRIGGER IF NOT EXISTS messages_fts_update AFTER UPDATE ON messages BEGIN
        INSERT INTO messages_fts(messages_fts, rowid, subject, body_md) VALUES ('delete', old.id, old.subject, old.body_md);
        INSERT INTO messages_fts(rowid, subject, body_md) VALUES (new.id, new.subject, new.body_md);
    END"#,
];

/// Creates every table, index, and FTS trigger if it does not already
/// exist. Safe to call on every process start.
pub async fn init_schema(db: &libsql::Connection) -> Result<()> {
    for stmt in SCHEMA_STATEMENTS {
        db.execute(stmt, ()).await?;
    }
    Ok(())
}

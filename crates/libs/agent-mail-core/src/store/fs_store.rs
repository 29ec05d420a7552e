//! Archive Filesystem Layer.
//!
//! Materializes the canonical per-project tree under
//! `<store>/projects/<slug>/repo/`:
//!
//! ```text
//! agents/<Name>/profile.json
//! agents/<Name>/inbox/YYYY/MM/<msg-id>.md
//! agents/<Name>/outbox/YYYY/MM/<msg-id>.md
//! messages/YYYY/MM/<msg-id>.md
//! claims/<sha1(path_pattern)>.json
//! attachments/<xx>/<sha1>.<ext>
//! ```
//!
//! Every write goes through [`atomic_write`]: content lands in a sibling
//! temp file, is fsync'd, then renamed over the destination. Renames within
//! the same directory are atomic on every platform this runs on, so readers
//! (including a concurrently running git status/diff) never observe a
//! partially written file.

use crate::Result;
use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};

/// Writes `content` to `path` atomically: temp file in the same directory,
/// fsync, rename. Creates parent directories as needed.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        crate::Error::InvalidInput(format!("path has no parent: {}", path.display()))
    })?;
    std::fs::create_dir_all(parent)?;

    let tmp_name = format!(
        ".{}.tmp-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("file"),
        uuid::Uuid::new_v4()
    );
    let tmp_path = parent.join(tmp_name);

    {
        use std::io::Write;
        let mut f = std::fs::File::create(&tmp_path)?;
        f.write_all(content)?;
        f.sync_all()?;
    }

    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Hex-encoded sha1 of `content`.
pub fn sha1_hex(content: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Root of a project's archive tree: `<store>/projects/<slug>/repo`.
pub fn project_repo_root(repo_root: &Path, slug: &str) -> PathBuf {
    repo_root.join("projects").join(slug)
}

/// `agents/<name>/profile.json`, relative to the project repo root.
pub fn agent_profile_path(slug_root: &Path, agent_name: &str) -> PathBuf {
    slug_root
        .join("agents")
        .join(agent_name)
        .join("profile.json")
}

/// `agents/<name>/{inbox,outbox}/YYYY/MM/<msg-id>.md`.
pub fn agent_mailbox_path(
    slug_root: &Path,
    agent_name: &str,
    box_kind: &str,
    year: &str,
    month: &str,
    msg_id: &str,
) -> PathBuf {
    slug_root
        .join("agents")
        .join(agent_name)
        .join(box_kind)
        .join(year)
        .join(month)
        .join(format!("{msg_id}.md"))
}

/// `messages/YYYY/MM/<msg-id>.md`.
pub fn canonical_message_path(slug_root: &Path, year: &str, month: &str, msg_id: &str) -> PathBuf {
    slug_root
        .join("messages")
        .join(year)
        .join(month)
        .join(format!("{msg_id}.md"))
}

/// `claims/<sha1(path_pattern)>.json`.
pub fn claim_artifact_path(slug_root: &Path, path_pattern: &str) -> PathBuf {
    let digest = sha1_hex(path_pattern.as_bytes());
    slug_root.join("claims").join(format!("{digest}.json"))
}

/// `attachments/<sha1[:2]>/<sha1>.<ext>`, relative to the project repo root.
pub fn attachment_path(slug_root: &Path, sha1_digest: &str, ext: &str) -> PathBuf {
    let prefix = &sha1_digest[..2.min(sha1_digest.len())];
    slug_root
        .join("attachments")
        .join(prefix)
        .join(format!("{sha1_digest}.{ext}"))
}

/// `attachments/originals/<sha1>.<orig-ext>`.
pub fn attachment_original_path(slug_root: &Path, sha1_digest: &str, orig_ext: &str) -> PathBuf {
    slug_root
        .join("attachments")
        .join("originals")
        .join(format!("{sha1_digest}.{orig_ext}"))
}

/// Lists every `claims/*.json` artifact under a project tree.
pub fn list_claim_artifacts(slug_root: &Path) -> Result<Vec<PathBuf>> {
    let claims_dir = slug_root.join("claims");
    if !claims_dir.exists() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in std::fs::read_dir(&claims_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            out.push(path);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_creates_parents_and_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a/b/c.txt");
        atomic_write(&path, b"hello").expect("write");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
    }

    #[test]
    fn sha1_hex_matches_known_vector() {
        assert_eq!(
            sha1_hex(b"abc"),
            "a9993e364706816aba3e25717850c26c9cd0d89"
        );
    }

    #[test]
    fn attachment_path_uses_two_char_prefix() {
        let root = Path::new("/tmp/store/projects/demo");
        let p = attachment_path(root, "deadbeef00", "webp");
        assert_eq!(
            p,
            Path::new("/tmp/store/projects/demo/attachments/de/deadbeef00.webp")
        );
    }
}

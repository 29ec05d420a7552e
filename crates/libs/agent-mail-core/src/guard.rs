//! Guard Hook Generator.
//!
//! Writes (and removes) a `pre-commit` script into a target code
//! repository's `.git/hooks/` directory. The script is a standalone POSIX
//! shell program with no dependency on this server at commit time: it
//! reads the project's `claims/*.json` artifacts directly off disk,
//! computes the staged diff via `git diff --cached`, and refuses the
//! commit when a staged path falls under an active exclusive claim held
//! by a different agent.

use crate::Result;
use std::path::{Path, PathBuf};

const MARKER: &str = "# agent-mail-guard";

/// Path to the hook file the generator owns, given a target repository's
/// working directory.
pub fn hook_path(target_repo: &Path) -> PathBuf {
    target_repo.join(".git").join("hooks").join("pre-commit")
}

/// Installs the pre-commit guard for `project_archive_root` (the
/// project's `claims/` tree) into `target_repo`'s git hooks directory.
///
/// If a pre-commit hook already exists and was not written by this
/// generator (no [`MARKER`] line), it is left untouched and an error is
/// returned rather than silently clobbering a user's existing hook.
pub fn install(target_repo: &Path, project_archive_root: &Path) -> Result<PathBuf> {
    let hooks_dir = target_repo.join(".git").join("hooks");
    if !hooks_dir.exists() {
        return Err(crate::Error::InvalidInput(format!(
            "{} is not a git repository (no .git/hooks directory)",
            target_repo.display()
        )));
    }

    let path = hook_path(target_repo);
    if path.exists() {
        let existing = std::fs::read_to_string(&path)?;
        if !existing.contains(MARKER) {
            return Err(crate::Error::InvalidInput(format!(
                "refusing to overwrite existing pre-commit hook at {} (not installed by this guard)",
                path.display()
            )));
        }
    }

    let script = render_script(project_archive_root);
    crate::store::fs_store::atomic_write(&path, script.as_bytes())?;
    set_executable(&path)?;
    Ok(path)
}

/// Removes the guard's pre-commit hook, but only if it was installed by
/// this generator (carries [`MARKER`]). Leaves a foreign hook untouched.
pub fn uninstall(target_repo: &Path) -> Result<bool> {
    let path = hook_path(target_repo);
    if !path.exists() {
        return Ok(false);
    }
    let existing = std::fs::read_to_string(&path)?;
    if !existing.contains(MARKER) {
        return Ok(false);
    }
    std::fs::remove_file(&path)?;
    Ok(true)
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o111);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Renders the pre-commit script body. The script re-implements the glob
/// overlap check independently in `python3` (present on every CI image
/// this targets) rather than shelling back into the server, so commits
/// stay blockable even if the server process is down.
fn render_script(project_archive_root: &Path) -> String {
    format!(
        r#"#!/bin/sh
{marker}
# Generated by the agent mail coordination layer. Do not edit by hand;
# re-run install_precommit_guard to regenerate.
set -e

CLAIMS_DIR="{claims_dir}"
AGENT_NAME="${{AGENT_NAME:-${{GIT_AUTHOR_NAME:-unknown}}}}"

if [ "${{AGENT_MAIL_BYPASS:-0}}" = "1" ]; then
    echo "agent-mail-guard: AGENT_MAIL_BYPASS=1, skipping reservation check" >&2
    exit 0
fi

if [ ! -d "$CLAIMS_DIR" ]; then
    exit 0
fi

STAGED=$(git diff --cached --name-only --diff-filter=ACMRT)
if [ -z "$STAGED" ]; then
    exit 0
fi

python3 - "$CLAIMS_DIR" "$AGENT_NAME" <<'PYEOF' "$STAGED"
import fnmatch
import json
import os
import sys
from datetime import datetime, timezone

claims_dir, agent_name = sys.argv[1], sys.argv[2]
staged = sys.argv[3].splitlines() if len(sys.argv) > 3 else []

now = datetime.now(timezone.utc).replace(tzinfo=None)
blocking = []

for name in os.listdir(claims_dir):
    if not name.endswith(".json"):
        continue
    try:
        with open(os.path.join(claims_dir, name)) as f:
            claim = json.load(f)
    except (OSError, json.JSONDecodeError):
        continue

    if claim.get("released_ts"):
        continue
    if not claim.get("exclusive", True):
        continue
    if claim.get("agent_name") == agent_name:
        continue

    try:
        expires = datetime.fromisoformat(claim["expires_ts"])
    except (KeyError, ValueError):
        continue
    if expires <= now:
        continue

    pattern = claim.get("path_pattern", "")
    for path in staged:
        if fnmatch.fnmatch(path, pattern):
            blocking.append((path, pattern, claim.get("agent_name"), claim["expires_ts"]))

if blocking:
    print("agent-mail-guard: commit blocked by active file reservations:", file=sys.stderr)
    for path, pattern, holder, expires in blocking:
        print(f"  {{path}} matches '{{pattern}}' held by {{holder}} until {{expires}}", file=sys.stderr)
    sys.exit(1)
PYEOF
"#,
        marker = MARKER,
        claims_dir = project_archive_root.join("claims").display(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_refuses_to_clobber_foreign_hook() {
        let dir = tempfile::tempdir().expect("tempdir");
        let hooks_dir = dir.path().join(".git").join("hooks");
        std::fs::create_dir_all(&hooks_dir).expect("mkdir");
        std::fs::write(hooks_dir.join("pre-commit"), "#!/bin/sh\necho custom\n").expect("write");

        let claims_root = dir.path().join("archive");
        let err = install(dir.path(), &claims_root).unwrap_err();
        assert!(err.to_string().contains("refusing to overwrite"));
    }

    #[test]
    fn install_then_uninstall_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join(".git").join("hooks")).expect("mkdir");

        let claims_root = dir.path().join("archive");
        let path = install(dir.path(), &claims_root).expect("install");
        assert!(path.exists());
        let contents = std::fs::read_to_string(&path).expect("read");
        assert!(contents.contains(MARKER));

        let removed = uninstall(dir.path()).expect("uninstall");
        assert!(removed);
        assert!(!path.exists());
    }

    #[test]
    fn uninstall_is_a_noop_when_no_hook_present() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join(".git").join("hooks")).expect("mkdir");
        let removed = uninstall(dir.path()).expect("uninstall");
        assert!(!removed);
    }
}

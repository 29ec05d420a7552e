use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

fn cli() -> Command {
    Command::cargo_bin("agent-mail-cli").expect("binary not found")
}

#[test]
#[allow(clippy::unwrap_used, clippy::expect_used)]
fn guard_install_then_uninstall_round_trips() {
    let storage = TempDir::new().expect("storage dir");
    let target_repo = TempDir::new().expect("target repo dir");
    std::fs::create_dir_all(target_repo.path().join(".git").join("hooks")).expect("hooks dir");

    cli()
        .env("AGENT_MAIL__STORAGE__ROOT", storage.path())
        .arg("ensure-project")
        .arg(storage.path().to_str().unwrap())
        .assert()
        .success();

    cli()
        .env("AGENT_MAIL__STORAGE__ROOT", storage.path())
        .arg("guard")
        .arg("install")
        .arg(storage.path().to_str().unwrap())
        .arg(target_repo.path())
        .assert()
        .success()
        .stdout(contains("installed guard hook"));

    let hook_path = target_repo.path().join(".git").join("hooks").join("pre-commit");
    assert!(hook_path.exists());

    cli()
        .arg("guard")
        .arg("uninstall")
        .arg(target_repo.path())
        .assert()
        .success()
        .stdout(contains("removed guard hook"));

    assert!(!hook_path.exists());
}

#[test]
#[allow(clippy::unwrap_used, clippy::expect_used)]
fn guard_uninstall_is_idempotent_on_missing_hook() {
    let target_repo = TempDir::new().expect("target repo dir");
    std::fs::create_dir_all(target_repo.path().join(".git").join("hooks")).expect("hooks dir");

    cli()
        .arg("guard")
        .arg("uninstall")
        .arg(target_repo.path())
        .assert()
        .success()
        .stdout(contains("no guard hook installed"));
}

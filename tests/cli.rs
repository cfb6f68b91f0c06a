//! CLI integration tests for the stowage admin commands.
//!
//! Each test uses an isolated temp directory as its data dir, so tests can
//! run in parallel safely.

#![allow(deprecated)] // Command::cargo_bin deprecation only affects custom build dirs

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use stowage::store::{SqliteStore, Store};
use tempfile::TempDir;

struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    fn data_dir_str(&self) -> String {
        self.data_dir().to_string_lossy().to_string()
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("stowage").expect("failed to find binary");
        cmd.env("NO_COLOR", "1");
        cmd.env_remove("STOWAGE_JWT_SECRET");
        cmd
    }

    fn init(&self) -> assert_cmd::assert::Assert {
        self.cmd()
            .args([
                "admin",
                "init",
                "--data-dir",
                &self.data_dir_str(),
                "--mail",
                "root@example.com",
                "--password",
                "correct-horse-battery",
                "--non-interactive",
            ])
            .assert()
    }
}

#[test]
fn test_init_creates_admin_and_secret() {
    let ctx = TestContext::new();

    ctx.init()
        .success()
        .stdout(predicate::str::contains("Created admin account 'admin'"));

    let secret_file = ctx.data_dir().join(".jwt_secret");
    let secret = std::fs::read_to_string(&secret_file).expect("secret file written");
    assert!(secret.trim().len() >= 32);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&secret_file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    let store = SqliteStore::new(ctx.data_dir().join("stowage.db")).unwrap();
    assert!(store.has_admin().unwrap());
    let admin = store.get_user_by_login("admin").unwrap().unwrap();
    assert!(admin.is_admin());
    assert_eq!(admin.mail, "root@example.com");
}

#[test]
fn test_init_refuses_to_run_twice() {
    let ctx = TestContext::new();
    ctx.init().success();

    ctx.init()
        .failure()
        .stderr(predicate::str::contains("already initialized"));
}

#[test]
fn test_init_non_interactive_requires_password() {
    let ctx = TestContext::new();

    ctx.cmd()
        .args([
            "admin",
            "init",
            "--data-dir",
            &ctx.data_dir_str(),
            "--mail",
            "root@example.com",
            "--non-interactive",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--password is required"));
}

#[test]
fn test_init_rejects_short_password() {
    let ctx = TestContext::new();

    ctx.cmd()
        .args([
            "admin",
            "init",
            "--data-dir",
            &ctx.data_dir_str(),
            "--mail",
            "root@example.com",
            "--password",
            "short",
            "--non-interactive",
        ])
        .assert()
        .failure();
}

#[test]
fn test_serve_requires_init() {
    let ctx = TestContext::new();

    ctx.cmd()
        .args(["serve", "--data-dir", &ctx.data_dir_str(), "--port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Server not initialized"));
}

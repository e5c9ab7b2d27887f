//! End-to-end tests for the `stencil` binary.

mod support;

use predicates::prelude::*;
use tempfile::TempDir;

use support::{stencil, write_blueprint};

#[test]
fn test_version_flag() {
    let temp = TempDir::new().unwrap();
    stencil(temp.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_new_command_help() {
    let temp = TempDir::new().unwrap();
    stencil(temp.path())
        .args(["new", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--set"))
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--profile"));
}

#[test]
fn test_list_includes_builtin_blueprint() {
    let temp = TempDir::new().unwrap();
    stencil(temp.path())
        .args(["list", "--format", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("go-service@1.0.0"));
}

#[test]
fn test_list_json_is_parseable() {
    let temp = TempDir::new().unwrap();
    let out = stencil(temp.path())
        .args(["list", "--format", "json"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert!(
        parsed
            .as_array()
            .unwrap()
            .iter()
            .any(|b| b["name"] == "go-service")
    );
}

#[test]
fn test_new_generates_go_service() {
    let temp = TempDir::new().unwrap();
    stencil(temp.path())
        .args(["new", "go-service", "orders", "--set", "AuthType=jwt", "--no-hooks"])
        .assert()
        .success();

    let root = temp.path().join("orders");
    assert!(root.join("go.mod").is_file());
    assert!(root.join("cmd/orders/main.go").is_file());
    assert!(root.join("internal/auth/jwt.go").is_file());
    assert!(!root.join("Dockerfile").exists());

    let go_mod = std::fs::read_to_string(root.join("go.mod")).unwrap();
    assert!(go_mod.starts_with("module example.com/service"));
}

#[test]
fn test_env_layer_and_override_precedence() {
    let temp = TempDir::new().unwrap();
    stencil(temp.path())
        .env("STENCIL_VAR_ModulePath", "env.example.com/svc")
        .env("STENCIL_VAR_AuthType", "apikey")
        .args(["new", "go-service", "billing", "--set", "AuthType=none", "--no-hooks"])
        .assert()
        .success();

    let root = temp.path().join("billing");
    let go_mod = std::fs::read_to_string(root.join("go.mod")).unwrap();
    assert!(go_mod.starts_with("module env.example.com/svc"));
    assert!(!root.join("internal").exists());
}

#[test]
fn test_profile_from_local_config() {
    let temp = TempDir::new().unwrap();
    std::fs::write(
        temp.path().join("stencil.toml"),
        "[profiles.work]\nModulePath = \"git.work.example/team\"\n",
    )
    .unwrap();

    stencil(temp.path())
        .args(["new", "go-service", "orders", "--profile", "work", "--no-hooks"])
        .assert()
        .success();

    let go_mod = std::fs::read_to_string(temp.path().join("orders/go.mod")).unwrap();
    assert!(go_mod.starts_with("module git.work.example/team"));
}

#[test]
fn test_dry_run_writes_nothing() {
    let temp = TempDir::new().unwrap();
    stencil(temp.path())
        .args(["new", "go-service", "orders", "--dry-run", "--show-context"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ProjectName"))
        .stdout(predicate::str::contains("Dry run passed"));

    assert!(!temp.path().join("orders").exists());
}

#[test]
fn test_dry_run_json_summary() {
    let temp = TempDir::new().unwrap();
    let out = stencil(temp.path())
        .args([
            "--output-format",
            "json",
            "new",
            "go-service",
            "orders",
            "--dry-run",
            "--set",
            "UseDocker=true",
        ])
        .output()
        .unwrap();
    assert!(out.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(summary["blueprint"], "go-service@1.0.0");
    assert_eq!(summary["mode"], "ValidateOnly");
    let hooks = summary["hooks"].as_array().unwrap();
    assert_eq!(hooks.len(), 2);
    assert_eq!(hooks[1]["command"], "docker build -t \"orders\" .");
    assert!(!temp.path().join("orders").exists());
}

#[test]
fn test_deps_out_writes_json() {
    let temp = TempDir::new().unwrap();
    stencil(temp.path())
        .args([
            "new",
            "go-service",
            "orders",
            "--set",
            "AuthType=jwt",
            "--dry-run",
            "--deps-out",
            "deps.json",
        ])
        .assert()
        .success();

    let raw = std::fs::read_to_string(temp.path().join("deps.json")).unwrap();
    let deps: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(deps[0]["module"], "github.com/golang-jwt/jwt/v5");
    assert_eq!(deps[0]["version"], "v5.2.1");
}

#[test]
fn test_new_from_blueprint_directory() {
    let temp = TempDir::new().unwrap();
    let blueprint = temp.path().join("bp");
    write_blueprint(&blueprint, "# {{ .Title | upper }}\n");

    stencil(temp.path())
        .args(["new", "bp", "out", "--set", "Title=hello"])
        .assert()
        .success();

    let readme = std::fs::read_to_string(temp.path().join("out/README.md")).unwrap();
    assert_eq!(readme, "# HELLO\n");
}

#[test]
fn test_validate_builtin_blueprint() {
    let temp = TempDir::new().unwrap();
    stencil(temp.path())
        .args(["validate", "go-service"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"));
}

#[test]
fn test_config_get_and_path() {
    let temp = TempDir::new().unwrap();
    stencil(temp.path())
        .args(["config", "get", "limits.max_files"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1000"));

    stencil(temp.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_init_local_creates_config() {
    let temp = TempDir::new().unwrap();
    stencil(temp.path())
        .args(["init", "--local"])
        .assert()
        .success();

    let written = std::fs::read_to_string(temp.path().join("stencil.toml")).unwrap();
    assert!(written.contains("[limits]"));
}

#[test]
fn test_completions_use_binary_name() {
    let temp = TempDir::new().unwrap();
    stencil(temp.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("stencil"));
}

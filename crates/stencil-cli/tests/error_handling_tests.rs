//! Exit codes and error messages.

mod support;

use predicates::prelude::*;
use tempfile::TempDir;

use support::{stencil, write_blueprint};

#[test]
fn test_unknown_blueprint_exits_not_found() {
    let temp = TempDir::new().unwrap();
    stencil(temp.path())
        .args(["new", "no-such-blueprint", "out"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("no-such-blueprint"));
}

#[test]
fn test_directory_name_failing_pattern_is_user_error() {
    let temp = TempDir::new().unwrap();
    // The directory name feeds ProjectName, which must be lowercase.
    stencil(temp.path())
        .args(["new", "go-service", "Out_Dir", "--no-hooks"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("ProjectName"));
    assert!(!temp.path().join("Out_Dir").exists());
}

#[test]
fn test_invalid_enum_choice_lists_choices() {
    let temp = TempDir::new().unwrap();
    stencil(temp.path())
        .args(["new", "go-service", "orders", "--set", "AuthType=oauth", "--dry-run"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("oauth"));
}

#[test]
fn test_malformed_set_is_rejected() {
    let temp = TempDir::new().unwrap();
    stencil(temp.path())
        .args(["new", "go-service", "orders", "--set", "AuthType"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("NAME=VALUE"));
}

#[test]
fn test_unsafe_template_exits_security() {
    let temp = TempDir::new().unwrap();
    write_blueprint(&temp.path().join("evil"), "{{ exec \"rm -rf /\" }}\n");

    stencil(temp.path())
        .args(["new", "evil", "out"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("exec"));
    assert!(!temp.path().join("out").exists());
}

#[test]
fn test_validate_reports_unsafe_template() {
    let temp = TempDir::new().unwrap();
    write_blueprint(&temp.path().join("evil"), "{{ env \"HOME\" }}\n");

    stencil(temp.path())
        .args(["validate", "evil"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("env"));
}

#[test]
fn test_existing_file_is_never_overwritten() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("orders");
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(root.join("go.mod"), "keep me\n").unwrap();

    stencil(temp.path())
        .args(["new", "go-service", "orders", "--no-hooks"])
        .assert()
        .failure();

    assert_eq!(std::fs::read_to_string(root.join("go.mod")).unwrap(), "keep me\n");
    assert!(!root.join("cmd").exists());
}

#[test]
fn test_unknown_profile_suggests_config() {
    let temp = TempDir::new().unwrap();
    stencil(temp.path())
        .args(["new", "go-service", "orders", "--profile", "home", "--dry-run"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No profiles are configured"));
}

#[test]
fn test_missing_config_file_exits_configuration() {
    let temp = TempDir::new().unwrap();
    stencil(temp.path())
        .args(["--config", "missing.toml", "list"])
        .assert()
        .code(4);
}

#[test]
fn test_unknown_subcommand_exits_usage() {
    let temp = TempDir::new().unwrap();
    stencil(temp.path()).arg("frobnicate").assert().code(2);
}

#[test]
fn test_two_spellings_of_one_variable_conflict() {
    let temp = TempDir::new().unwrap();
    stencil(temp.path())
        .args([
            "new", "go-service", "orders", "--dry-run",
            "--set", "projectname=a",
            "--set", "ProjectName=b",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("'ProjectName' twice"));
}

#[test]
fn test_runaway_loops_exit_security() {
    let temp = TempDir::new().unwrap();
    write_blueprint(
        &temp.path().join("spin"),
        "{{range 10000}}{{range 10000}}{{range 10000}}{{end}}{{end}}{{end}}",
    );

    stencil(temp.path())
        .args(["new", "spin", "out"])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .code(5)
        .stderr(predicate::str::contains("steps"));
    assert!(!temp.path().join("out").exists());
}

#[test]
fn test_deep_parentheses_are_rejected_not_fatal() {
    let temp = TempDir::new().unwrap();
    let depth = 300_000;
    let body = format!("{{{{{}1{}}}}}", "(".repeat(depth), ")".repeat(depth));
    write_blueprint(&temp.path().join("deep"), &body);

    stencil(temp.path())
        .args(["validate", "deep"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("nested"));
}

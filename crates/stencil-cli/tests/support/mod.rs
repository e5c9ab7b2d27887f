//! Shared helpers for the CLI integration tests.

use std::path::Path;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;

/// A `stencil` command isolated from the user's real config and environment.
pub fn stencil(home: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("stencil");
    cmd.current_dir(home)
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("NO_COLOR", "true")
        .env_remove("RUST_LOG")
        .env_remove("STENCIL_BLUEPRINTS_DIR");
    cmd
}

/// Write a one-file blueprint whose only template is `body`.
pub fn write_blueprint(dir: &Path, body: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(
        dir.join("blueprint.toml"),
        r#"name = "local"
version = "0.1.0"

[[files]]
source = "readme.tmpl"
destination = "README.md"
"#,
    )
    .unwrap();
    std::fs::write(dir.join("readme.tmpl"), body).unwrap();
}

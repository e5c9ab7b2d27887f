//! End-to-end generation against the real filesystem.

use std::fs;
use std::path::Path;

use stencil_adapters::{FailOn, InMemoryRegistry, LocalFilesystem, MemoryFilesystem};
use stencil_core::application::ApplicationError;
use stencil_core::domain::{BlueprintManifest, FileEntry, ViolationKind};
use stencil_core::prelude::*;
use proptest::prelude::*;
use tempfile::TempDir;

fn layers(auth: &str, docker: bool) -> ContextLayers {
    ContextLayers::default()
        .with_override("ProjectName", "orders")
        .with_override("AuthType", auth)
        .with_override("UseDocker", docker)
}

fn local_service() -> GenerationService {
    let registry = InMemoryRegistry::with_builtin().unwrap();
    GenerationService::new(Box::new(registry), Box::new(LocalFilesystem::new()))
}

fn read(root: &Path, rel: &str) -> String {
    fs::read_to_string(root.join(rel)).unwrap()
}

#[test]
fn go_service_with_jwt_on_disk() {
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("orders");
    let request = GenerationRequest::new("go-service", &out).with_layers(layers("jwt", false));

    let report = local_service()
        .generate(&request, &CancellationToken::new())
        .unwrap();

    assert_eq!(report.files.len(), 4);
    assert!(read(&out, "cmd/orders/main.go").contains("auth.JwtMiddleware(mux)"));
    assert!(read(&out, "internal/auth/jwt.go").contains("func JwtMiddleware"));
    assert!(!out.join("Dockerfile").exists());
    assert_eq!(report.dependencies.len(), 1);
    assert_eq!(report.dependencies[0].module, "github.com/golang-jwt/jwt/v5");

    let leftovers: Vec<_> = walk(&out)
        .into_iter()
        .filter(|p| p.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
}

#[test]
fn go_service_without_auth_skips_auth_file() {
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("orders");
    let request = GenerationRequest::new("go-service", &out).with_layers(layers("none", true));

    let report = local_service()
        .generate(&request, &CancellationToken::new())
        .unwrap();

    assert!(!out.join("internal").exists());
    assert!(read(&out, "Dockerfile").contains("./cmd/orders"));
    assert!(report.dependencies.is_empty());
    assert_eq!(report.hooks.len(), 2);
    assert_eq!(report.hooks[1].command, r#"docker build -t "orders" ."#);
}

#[cfg(unix)]
#[test]
fn executable_entries_get_exec_bits() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let out = temp.path().join("orders");
    let request = GenerationRequest::new("go-service", &out).with_layers(layers("none", false));
    local_service()
        .generate(&request, &CancellationToken::new())
        .unwrap();

    let mode = fs::metadata(out.join("scripts/run.sh"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o111, 0o111);
}

#[test]
fn one_malicious_template_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("evil");

    let mut manifest = BlueprintManifest::new("evil", "1.0.0");
    let mut blueprint_sources = Vec::new();
    for i in 0..9 {
        let source = format!("ok{i}.tmpl");
        manifest = manifest.with_file(FileEntry::new(&source, format!("ok{i}.txt")));
        blueprint_sources.push((source, format!("file {i}\n")));
    }
    manifest = manifest.with_file(FileEntry::new("bad.tmpl", "bad.txt"));
    let mut blueprint = Blueprint::new(manifest).with_source("bad.tmpl", r#"{{ exec "rm -rf /" }}"#);
    for (id, body) in blueprint_sources {
        blueprint = blueprint.with_source(id, body);
    }

    let registry = InMemoryRegistry::new();
    registry.insert(blueprint).unwrap();
    let service = GenerationService::new(Box::new(registry), Box::new(LocalFilesystem::new()));

    let failure = service
        .generate(&GenerationRequest::new("evil", &out), &CancellationToken::new())
        .unwrap_err();

    assert_eq!(failure.stage, GenerationStage::Validating);
    assert!(
        failure
            .violations()
            .any(|v| v.kind == ViolationKind::DangerousPattern || v.kind == ViolationKind::UnsafeFunction)
    );
    assert!(!out.exists());
}

#[test]
fn existing_file_blocks_commit_and_is_untouched() {
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("orders");
    fs::create_dir_all(&out).unwrap();
    fs::write(out.join("go.mod"), "keep me").unwrap();

    let request = GenerationRequest::new("go-service", &out).with_layers(layers("none", false));
    let failure = local_service()
        .generate(&request, &CancellationToken::new())
        .unwrap_err();

    assert_eq!(failure.stage, GenerationStage::Committing);
    assert!(matches!(
        failure.primary(),
        Some(StencilError::Application(ApplicationError::DestinationExists { .. }))
    ));
    assert_eq!(read(&out, "go.mod"), "keep me");
    assert_eq!(walk(&out).len(), 1);
}

#[test]
fn rename_failure_rolls_back_in_memory() {
    let fs = MemoryFilesystem::new();
    fs.fail_on(FailOn::Rename, "jwt.go");
    let registry = InMemoryRegistry::with_builtin().unwrap();
    let service = GenerationService::new(Box::new(registry), Box::new(fs.clone()));

    let request = GenerationRequest::new("go-service", "/out").with_layers(layers("jwt", false));
    let failure = service
        .generate(&request, &CancellationToken::new())
        .unwrap_err();

    assert_eq!(failure.stage, GenerationStage::Committing);
    match failure.primary() {
        Some(StencilError::Application(ApplicationError::CommitFailed { cleanup, .. })) => {
            assert!(cleanup.is_clean(), "{cleanup}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(fs.list_files().is_empty());
    assert_eq!(fs.list_dirs(), vec![std::path::PathBuf::from("/")]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Whatever step of the commit fails, the tree is left as it was found.
    #[test]
    fn any_commit_failure_leaves_memory_tree_untouched(
        (op, suffix) in prop::sample::select(vec![
            (FailOn::CreateDir, "/out"),
            (FailOn::CreateDir, "internal"),
            (FailOn::CreateDir, "auth"),
            (FailOn::CreateDir, "scripts"),
            (FailOn::Write, ".tmp"),
            (FailOn::Rename, "go.mod"),
            (FailOn::Rename, "main.go"),
            (FailOn::Rename, "jwt.go"),
            (FailOn::Rename, "run.sh"),
        ]),
        docker in any::<bool>(),
    ) {
        let fs = MemoryFilesystem::new();
        fs.fail_on(op, suffix);
        let registry = InMemoryRegistry::with_builtin().unwrap();
        let service = GenerationService::new(Box::new(registry), Box::new(fs.clone()));

        let request = GenerationRequest::new("go-service", "/out").with_layers(layers("jwt", docker));
        let failure = service
            .generate(&request, &CancellationToken::new())
            .unwrap_err();

        prop_assert_eq!(failure.stage, GenerationStage::Committing);
        prop_assert!(fs.list_files().is_empty(), "{:?}", fs.list_files());
        prop_assert_eq!(fs.list_dirs(), vec![std::path::PathBuf::from("/")]);
    }
}

fn walk(root: &Path) -> Vec<String> {
    walkdir::WalkDir::new(root)
        .into_iter()
        .flatten()
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_string_lossy().into_owned())
        .collect()
}

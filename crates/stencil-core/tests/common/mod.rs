//! Minimal in-process adapters for exercising the services end to end.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use stencil_core::application::ApplicationError;
use stencil_core::domain::{
    Blueprint, BlueprintId, BlueprintManifest, FileEntry, VariableSpec,
};
use stencil_core::prelude::*;

#[derive(Default)]
struct FsState {
    dirs: BTreeSet<PathBuf>,
    files: BTreeMap<PathBuf, Vec<u8>>,
}

/// Shared-state filesystem; clones see the same tree.
#[derive(Clone, Default)]
pub struct TestFs(Arc<Mutex<FsState>>);

impl TestFs {
    pub fn new() -> Self {
        let fs = Self::default();
        fs.0.lock().unwrap().dirs.insert(PathBuf::from("/"));
        fs
    }

    pub fn files(&self) -> BTreeMap<PathBuf, Vec<u8>> {
        self.0.lock().unwrap().files.clone()
    }

    pub fn files_under(&self, root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        self.files()
            .into_iter()
            .filter_map(|(p, c)| p.strip_prefix(root).ok().map(|rel| (rel.to_path_buf(), c)))
            .collect()
    }

    pub fn put(&self, path: &str, content: &str) {
        self.0
            .lock()
            .unwrap()
            .files
            .insert(PathBuf::from(path), content.as_bytes().to_vec());
    }
}

fn err(path: &Path, reason: &str) -> StencilError {
    ApplicationError::FilesystemError {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
    .into()
}

impl Filesystem for TestFs {
    fn create_dir(&self, path: &Path) -> StencilResult<()> {
        self.0.lock().unwrap().dirs.insert(path.to_path_buf());
        Ok(())
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> StencilResult<()> {
        self.0
            .lock()
            .unwrap()
            .files
            .insert(path.to_path_buf(), content.to_vec());
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> StencilResult<()> {
        let mut s = self.0.lock().unwrap();
        let content = s.files.remove(from).ok_or_else(|| err(from, "missing"))?;
        s.files.insert(to.to_path_buf(), content);
        Ok(())
    }

    fn set_permissions(&self, _path: &Path, _executable: bool) -> StencilResult<()> {
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let s = self.0.lock().unwrap();
        s.dirs.contains(path) || s.files.contains_key(path)
    }

    fn remove_file(&self, path: &Path) -> StencilResult<()> {
        self.0.lock().unwrap().files.remove(path);
        Ok(())
    }

    fn remove_dir(&self, path: &Path) -> StencilResult<()> {
        self.0.lock().unwrap().dirs.remove(path);
        Ok(())
    }
}

#[derive(Default)]
pub struct TestRegistry(Mutex<BTreeMap<BlueprintId, Blueprint>>);

impl TestRegistry {
    pub fn with(blueprints: impl IntoIterator<Item = Blueprint>) -> Self {
        let registry = Self::default();
        for bp in blueprints {
            registry.insert(bp).unwrap();
        }
        registry
    }
}

impl BlueprintRegistry for TestRegistry {
    fn get(&self, id: &BlueprintId) -> StencilResult<Blueprint> {
        self.0.lock().unwrap().get(id).cloned().ok_or_else(|| {
            ApplicationError::BlueprintNotFound {
                reference: id.to_string(),
            }
            .into()
        })
    }

    fn find_by_name(&self, name: &str) -> StencilResult<Vec<Blueprint>> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .values()
            .filter(|b| b.manifest.name == name)
            .cloned()
            .collect())
    }

    fn list(&self) -> StencilResult<Vec<Blueprint>> {
        Ok(self.0.lock().unwrap().values().cloned().collect())
    }

    fn insert(&self, blueprint: Blueprint) -> StencilResult<()> {
        let id = blueprint.id()?;
        self.0.lock().unwrap().insert(id, blueprint);
        Ok(())
    }

    fn remove(&self, id: &BlueprintId) -> StencilResult<()> {
        self.0.lock().unwrap().remove(id);
        Ok(())
    }
}

/// The two-file Go service used throughout the tests.
pub fn go_service() -> Blueprint {
    let manifest = BlueprintManifest::new("go-service", "1.0.0")
        .with_variable(VariableSpec::string("ProjectName").required())
        .with_variable(VariableSpec::enumeration("AuthType", ["", "jwt", "oauth"]).with_default(""))
        .with_file(FileEntry::new("A", "main.go"))
        .with_file(FileEntry::new("B", "auth.go").when(r#"ne .AuthType """#));
    Blueprint::new(manifest)
        .with_source("A", "package main\n\n// {{.ProjectName | pascalCase}}\nfunc main() {}\n")
        .with_source("B", "package main\n\nconst authType = {{.AuthType | quote}}\n")
}

pub fn service(blueprints: impl IntoIterator<Item = Blueprint>, fs: &TestFs) -> GenerationService {
    GenerationService::new(Box::new(TestRegistry::with(blueprints)), Box::new(fs.clone()))
}

pub fn layers(pairs: &[(&str, &str)]) -> ContextLayers {
    pairs
        .iter()
        .fold(ContextLayers::default(), |l, (k, v)| l.with_override(*k, *v))
}

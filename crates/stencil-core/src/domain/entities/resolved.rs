use std::collections::{BTreeSet, HashSet};

use serde::Serialize;

use crate::domain::entities::common::RelativePath;
use crate::domain::entities::manifest::DependencySpec;
use crate::domain::error::DomainError;

/// A file entry that survived condition evaluation, with its destination
/// already rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedFile {
    /// Template source id inside the blueprint.
    pub source: String,
    pub destination: RelativePath,
    /// Destination exactly as rendered, before normalization. Path checks
    /// run against this so a leading `/` or `\` is not lost.
    pub raw_destination: String,
    pub executable: bool,
}

/// A post-generation command, rendered against the context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedHook {
    pub command: String,
    pub description: Option<String>,
}

/// Output of the manifest resolver: what to render, what to depend on and
/// what to run afterwards. Everything is in manifest order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub files: Vec<PlannedFile>,
    pub dependencies: Vec<DependencySpec>,
    pub hooks: Vec<ResolvedHook>,
}

impl Resolution {
    pub fn destinations(&self) -> impl Iterator<Item = &RelativePath> {
        self.files.iter().map(|f| &f.destination)
    }
}

/// One rendered file, staged in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub destination: RelativePath,
    pub content: Vec<u8>,
    pub executable: bool,
}

impl ResolvedFile {
    pub fn new(destination: RelativePath, content: impl Into<Vec<u8>>) -> Self {
        Self {
            destination,
            content: content.into(),
            executable: false,
        }
    }

    pub fn executable(mut self) -> Self {
        self.executable = true;
        self
    }

    pub fn len(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Ordered, destination-unique set of rendered files.
///
/// Built in one piece: either every file is present or construction fails.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedFileSet {
    files: Vec<ResolvedFile>,
}

impl ResolvedFileSet {
    pub fn new(files: Vec<ResolvedFile>) -> Result<Self, DomainError> {
        let mut seen = HashSet::with_capacity(files.len());
        for file in &files {
            if !seen.insert(file.destination.as_str()) {
                return Err(DomainError::DuplicateDestination {
                    destination: file.destination.to_string(),
                    first: file.destination.to_string(),
                    second: file.destination.to_string(),
                });
            }
        }
        Ok(Self { files })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedFile> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(ResolvedFile::len).sum()
    }

    /// Every directory implied by the destinations, parents before children.
    pub fn directories(&self) -> Vec<String> {
        let set: BTreeSet<String> = self
            .files
            .iter()
            .flat_map(|f| f.destination.ancestors())
            .collect();
        let mut dirs: Vec<String> = set.into_iter().collect();
        dirs.sort_by_key(|d| d.matches('/').count());
        dirs
    }

    pub fn get(&self, destination: &str) -> Option<&ResolvedFile> {
        self.files
            .iter()
            .find(|f| f.destination.as_str() == destination)
    }
}

impl IntoIterator for ResolvedFileSet {
    type Item = ResolvedFile;
    type IntoIter = std::vec::IntoIter<ResolvedFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_destinations() {
        let files = vec![
            ResolvedFile::new("a/b.txt".into(), "1"),
            ResolvedFile::new("a//b.txt".into(), "2"),
        ];
        assert!(matches!(
            ResolvedFileSet::new(files),
            Err(DomainError::DuplicateDestination { .. })
        ));
    }

    #[test]
    fn directories_are_ordered_parents_first() {
        let set = ResolvedFileSet::new(vec![
            ResolvedFile::new("x/y/z/f.txt".into(), ""),
            ResolvedFile::new("a/g.txt".into(), ""),
            ResolvedFile::new("top.txt".into(), "abc"),
        ])
        .unwrap();
        assert_eq!(set.directories(), vec!["a", "x", "x/y", "x/y/z"]);
        assert_eq!(set.total_bytes(), 3);
        assert!(set.get("top.txt").is_some());
    }
}

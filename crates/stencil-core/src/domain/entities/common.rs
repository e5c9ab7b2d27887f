use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// A destination path inside the output directory.
///
/// Stored with `/` separators, no empty or `.` segments, no leading `./`.
/// Construction only normalizes; whether the path is *safe* is decided by
/// [`crate::domain::SecurityValidator::validate_path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RelativePath(String);

impl RelativePath {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(normalize(raw.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Segments of the path, in order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Parent directories from outermost to innermost, excluding the root.
    ///
    /// `a/b/c.txt` yields `a`, `a/b`.
    pub fn ancestors(&self) -> Vec<String> {
        let segments: Vec<&str> = self.segments().collect();
        (1..segments.len())
            .map(|n| segments[..n].join("/"))
            .collect()
    }

    /// File name component.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Resolve against an output root.
    pub fn under(&self, root: &Path) -> PathBuf {
        self.segments().fold(root.to_path_buf(), |acc, s| acc.join(s))
    }
}

fn normalize(raw: &str) -> String {
    raw.replace('\\', "/")
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}

impl AsRef<str> for RelativePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RelativePath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

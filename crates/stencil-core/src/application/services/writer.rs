//! Atomic commit of a rendered file set.
//!
//! The protocol is:
//! 1. Refuse if any destination already exists (nothing touched yet).
//! 2. Create missing directories, parents first, remembering each one.
//! 3. Write every file to a hidden temp name beside its destination.
//! 4. Rename temps into place, then apply executable bits.
//!
//! A failure in steps 2-4 removes everything this run created, newest
//! first, and reports what could not be removed.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    application::{
        ApplicationError,
        error::CleanupReport,
        ports::Filesystem,
    },
    domain::ResolvedFileSet,
    error::{StencilError, StencilResult},
};

/// Paths a successful commit produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Final file paths, in set order.
    pub written: Vec<PathBuf>,
    /// Directories created by this commit, parents first.
    pub created_dirs: Vec<PathBuf>,
}

/// Everything created so far, for rollback.
#[derive(Default)]
struct Journal {
    dirs: Vec<PathBuf>,
    temps: Vec<PathBuf>,
    files: Vec<PathBuf>,
}

pub struct AtomicWriter<'a> {
    fs: &'a dyn Filesystem,
}

impl<'a> AtomicWriter<'a> {
    pub fn new(fs: &'a dyn Filesystem) -> Self {
        Self { fs }
    }

    #[instrument(skip_all, fields(files = set.len(), output = %output_dir.display()))]
    pub fn commit(&self, set: &ResolvedFileSet, output_dir: &Path) -> StencilResult<CommitReport> {
        for file in set.iter() {
            let target = file.destination.under(output_dir);
            if self.fs.exists(&target) {
                return Err(ApplicationError::DestinationExists { path: target }.into());
            }
        }

        let mut journal = Journal::default();
        match self.apply(set, output_dir, &mut journal) {
            Ok(()) => {
                info!(written = journal.files.len(), "commit complete");
                Ok(CommitReport {
                    written: journal.files,
                    created_dirs: journal.dirs,
                })
            }
            Err((path, reason)) => {
                warn!(path = %path.display(), %reason, "commit failed, rolling back");
                let cleanup = self.rollback(journal);
                Err(ApplicationError::CommitFailed {
                    path,
                    reason,
                    cleanup,
                }
                .into())
            }
        }
    }

    fn apply(
        &self,
        set: &ResolvedFileSet,
        output_dir: &Path,
        journal: &mut Journal,
    ) -> Result<(), (PathBuf, String)> {
        for dir in missing_roots(self.fs, output_dir)
            .into_iter()
            .chain(set.directories().iter().map(|d| output_dir.join(d)))
        {
            if self.fs.exists(&dir) {
                continue;
            }
            self.fs.create_dir(&dir).map_err(|e| failure(&dir, e))?;
            debug!(path = %dir.display(), "created directory");
            journal.dirs.push(dir);
        }

        let mut staged = Vec::with_capacity(set.len());
        for file in set.iter() {
            let target = file.destination.under(output_dir);
            let temp = temp_path(&target);
            self.fs
                .write_file(&temp, &file.content)
                .map_err(|e| failure(&temp, e))?;
            journal.temps.push(temp.clone());
            staged.push((temp, target, file.executable));
        }

        for (temp, target, executable) in staged {
            self.fs.rename(&temp, &target).map_err(|e| failure(&target, e))?;
            journal.temps.retain(|t| t != &temp);
            journal.files.push(target.clone());
            if executable {
                self.fs
                    .set_permissions(&target, true)
                    .map_err(|e| failure(&target, e))?;
            }
        }
        Ok(())
    }

    fn rollback(&self, journal: Journal) -> CleanupReport {
        let mut report = CleanupReport::default();
        let files = journal.temps.into_iter().chain(journal.files.into_iter().rev());
        for path in files {
            match self.fs.remove_file(&path) {
                Ok(()) => report.removed.push(path),
                Err(e) => report.leftover.push((path, e.to_string())),
            }
        }
        for dir in journal.dirs.into_iter().rev() {
            match self.fs.remove_dir(&dir) {
                Ok(()) => report.removed.push(dir),
                Err(e) => report.leftover.push((dir, e.to_string())),
            }
        }
        report
    }
}

/// `output_dir` and any of its missing ancestors, outermost first.
fn missing_roots(fs: &dyn Filesystem, output_dir: &Path) -> Vec<PathBuf> {
    let mut missing: Vec<PathBuf> = output_dir
        .ancestors()
        .filter(|p| !p.as_os_str().is_empty())
        .take_while(|p| !fs.exists(p))
        .map(Path::to_path_buf)
        .collect();
    missing.reverse();
    missing
}

fn temp_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.stencil-{}.tmp", Uuid::new_v4().simple()))
}

fn failure(path: &Path, err: StencilError) -> (PathBuf, String) {
    let reason = match err {
        StencilError::Application(ApplicationError::FilesystemError { reason, .. }) => reason,
        other => other.to_string(),
    };
    (path.to_path_buf(), reason)
}

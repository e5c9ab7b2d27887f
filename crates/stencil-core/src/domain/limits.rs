//! Resource ceilings for a single generation run.
//!
//! [`ResourceLimiter`] is shared by reference across rendering workers.
//! Counters are atomics; the directory set sits behind a mutex because the
//! same parent may be registered from several threads.

use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::domain::entities::common::RelativePath;
use crate::domain::security::{ValidationViolation, ViolationKind};
use crate::domain::template::DEFAULT_MAX_STEPS;

pub const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    pub max_files: usize,
    pub max_directories: usize,
    /// Per-file ceiling in bytes.
    pub max_file_size: u64,
    /// Ceiling on the sum of all rendered files, in bytes.
    pub max_total_size: u64,
    /// Evaluation steps allowed per rendered template.
    pub max_render_steps: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_files: 1000,
            max_directories: 100,
            max_file_size: 10 * MIB,
            max_total_size: 100 * MIB,
            max_render_steps: DEFAULT_MAX_STEPS,
        }
    }
}

/// Snapshot of what a run has produced so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResourceUsage {
    pub files: usize,
    pub directories: usize,
    pub total_bytes: u64,
}

/// Check a usage triple against the ceilings.
///
/// Reports the first counter that is over its limit, in the order files,
/// directories, bytes.
pub fn check_usage(
    limits: &ResourceLimits,
    file_count: usize,
    dir_count: usize,
    total_bytes: u64,
) -> Result<(), ValidationViolation> {
    if file_count > limits.max_files {
        return Err(ValidationViolation::new(
            ViolationKind::CountLimitExceeded,
            format!("{file_count} files exceeds the limit of {}", limits.max_files),
            "files",
        ));
    }
    if dir_count > limits.max_directories {
        return Err(ValidationViolation::new(
            ViolationKind::CountLimitExceeded,
            format!("{dir_count} directories exceeds the limit of {}", limits.max_directories),
            "directories",
        ));
    }
    if total_bytes > limits.max_total_size {
        return Err(ValidationViolation::new(
            ViolationKind::SizeLimitExceeded,
            format!("{total_bytes} bytes in total exceeds the limit of {}", limits.max_total_size),
            "total_bytes",
        ));
    }
    Ok(())
}

/// Incremental, thread-safe usage accounting.
#[derive(Debug, Default)]
pub struct ResourceLimiter {
    limits: ResourceLimits,
    files: AtomicUsize,
    bytes: AtomicU64,
    directories: Mutex<BTreeSet<String>>,
    exceeded: AtomicBool,
}

impl ResourceLimiter {
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Whether any ceiling has been crossed. Workers poll this to stop early.
    pub fn is_exceeded(&self) -> bool {
        self.exceeded.load(Ordering::Acquire)
    }

    fn trip(&self, violation: ValidationViolation) -> Result<(), ValidationViolation> {
        self.exceeded.store(true, Ordering::Release);
        Err(violation)
    }

    /// Count one more file and register its parent directories.
    pub fn record_file(&self, destination: &RelativePath) -> Result<(), ValidationViolation> {
        let files = self.files.fetch_add(1, Ordering::AcqRel) + 1;
        if files > self.limits.max_files {
            return self.trip(ValidationViolation::new(
                ViolationKind::CountLimitExceeded,
                format!("more than {} files", self.limits.max_files),
                destination.as_str(),
            ));
        }

        let dirs = {
            let mut set = self
                .directories
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            set.extend(destination.ancestors());
            set.len()
        };
        if dirs > self.limits.max_directories {
            return self.trip(ValidationViolation::new(
                ViolationKind::CountLimitExceeded,
                format!("more than {} directories", self.limits.max_directories),
                destination.as_str(),
            ));
        }
        Ok(())
    }

    /// Account for one rendered file's size.
    pub fn record_bytes(&self, destination: &RelativePath, len: u64) -> Result<(), ValidationViolation> {
        if len > self.limits.max_file_size {
            return self.trip(ValidationViolation::new(
                ViolationKind::SizeLimitExceeded,
                format!("{len} bytes exceeds the per-file limit of {}", self.limits.max_file_size),
                destination.as_str(),
            ));
        }
        let total = self.bytes.fetch_add(len, Ordering::AcqRel) + len;
        if total > self.limits.max_total_size {
            return self.trip(ValidationViolation::new(
                ViolationKind::SizeLimitExceeded,
                format!("more than {} bytes in total", self.limits.max_total_size),
                destination.as_str(),
            ));
        }
        Ok(())
    }

    pub fn usage(&self) -> ResourceUsage {
        let directories = self
            .directories
            .lock()
            .map(|set| set.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len());
        ResourceUsage {
            files: self.files.load(Ordering::Acquire),
            directories,
            total_bytes: self.bytes.load(Ordering::Acquire),
        }
    }

    /// Final check over the accumulated totals.
    pub fn finish(&self) -> Result<ResourceUsage, ValidationViolation> {
        let usage = self.usage();
        check_usage(&self.limits, usage.files, usage.directories, usage.total_bytes)?;
        Ok(usage)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn check_usage_names_the_counter() {
        let limits = ResourceLimits::default();
        assert!(check_usage(&limits, 1000, 100, 100 * MIB).is_ok());
        assert_eq!(check_usage(&limits, 1001, 0, 0).unwrap_err().location, "files");
        assert_eq!(check_usage(&limits, 0, 101, 0).unwrap_err().location, "directories");
        let v = check_usage(&limits, 0, 0, 100 * MIB + 1).unwrap_err();
        assert_eq!(v.kind, ViolationKind::SizeLimitExceeded);
    }

    #[test]
    fn file_count_trips_on_the_extra_file() {
        let limiter = ResourceLimiter::new(ResourceLimits {
            max_files: 2,
            ..Default::default()
        });
        assert!(limiter.record_file(&"a".into()).is_ok());
        assert!(limiter.record_file(&"b".into()).is_ok());
        let v = limiter.record_file(&"c".into()).unwrap_err();
        assert_eq!(v.kind, ViolationKind::CountLimitExceeded);
        assert!(limiter.is_exceeded());
    }

    #[test]
    fn directories_are_counted_once() {
        let limiter = ResourceLimiter::new(ResourceLimits {
            max_directories: 2,
            ..Default::default()
        });
        limiter.record_file(&"a/b/x".into()).unwrap();
        limiter.record_file(&"a/b/y".into()).unwrap();
        assert_eq!(limiter.usage().directories, 2);
        assert!(limiter.record_file(&"c/z".into()).is_err());
    }

    #[test]
    fn per_file_size() {
        let limiter = ResourceLimiter::default();
        let v = limiter.record_bytes(&"big.bin".into(), 11 * MIB).unwrap_err();
        assert_eq!(v.kind, ViolationKind::SizeLimitExceeded);
        assert_eq!(v.location, "big.bin");
    }

    #[test]
    fn aggregate_size() {
        let limiter = ResourceLimiter::new(ResourceLimits {
            max_total_size: 10,
            ..Default::default()
        });
        limiter.record_bytes(&"a".into(), 6).unwrap();
        assert!(limiter.record_bytes(&"b".into(), 6).is_err());
    }

    #[test]
    fn concurrent_recording_is_exact() {
        let limiter = Arc::new(ResourceLimiter::default());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let limiter = Arc::clone(&limiter);
                thread::spawn(move || {
                    for i in 0..50 {
                        let path = RelativePath::new(format!("d{}/f{t}_{i}", i % 4));
                        limiter.record_file(&path).unwrap();
                        limiter.record_bytes(&path, 10).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let usage = limiter.finish().unwrap();
        assert_eq!(usage.files, 400);
        assert_eq!(usage.directories, 4);
        assert_eq!(usage.total_bytes, 4000);
    }
}

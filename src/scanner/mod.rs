//! Discovery of subject/task units in the preprocessed data tree.
//!
//! The tree is two levels deep: `<root>/<subject_id>/<task_id>/`, with one
//! CSV file per task directory. Entries are visited in file-name order so
//! output tables are reproducible.

use crate::error::AnalysisError;
use crate::models::SkippedUnit;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// One subject/task directory to analyze.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    pub subject_id: String,
    pub task_id: String,
    pub dir: PathBuf,
}

/// Result of scanning the preprocessed tree.
#[derive(Debug, Clone, Default)]
pub struct TreeScan {
    /// Subject directories visited.
    pub subjects: usize,
    /// Task directories found, subject-major.
    pub units: Vec<WorkUnit>,
    /// Subjects whose directory could not be listed.
    pub unreadable: Vec<SkippedUnit>,
}

/// Task id recorded for a subject that was skipped as a whole.
pub const ALL_TASKS: &str = "*";

/// Scan `root` for subject/task directories. Non-directory entries at either
/// level are skipped with a warning. A subject directory that cannot be
/// listed is recorded in [`TreeScan::unreadable`]; only an unreadable root
/// is an error.
pub fn discover_units(root: &Path) -> Result<TreeScan> {
    if !root.is_dir() {
        anyhow::bail!("Preprocessed data directory not found: {}", root.display());
    }

    let mut scan = TreeScan::default();
    for subject_dir in child_dirs(root)? {
        scan.subjects += 1;
        scan_subject(&mut scan, &subject_dir);
    }

    debug!(
        "Found {} task directories across {} subjects",
        scan.units.len(),
        scan.subjects
    );
    Ok(scan)
}

fn scan_subject(scan: &mut TreeScan, subject_dir: &Path) {
    let subject_id = file_name(subject_dir);
    match child_dirs(subject_dir) {
        Ok(task_dirs) => {
            for task_dir in task_dirs {
                scan.units.push(WorkUnit {
                    subject_id: subject_id.clone(),
                    task_id: file_name(&task_dir),
                    dir: task_dir,
                });
            }
        }
        Err(e) => {
            warn!("Skipping subject {}: {:#}", subject_id, e);
            scan.unreadable.push(SkippedUnit {
                subject_id,
                task_id: ALL_TASKS.to_string(),
                reason: format!("{:#}", e),
            });
        }
    }
}

/// The single CSV file in a task directory.
pub fn resolve_source(task_dir: &Path) -> std::result::Result<PathBuf, AnalysisError> {
    let mut found = Vec::new();
    for entry in WalkDir::new(task_dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            AnalysisError::Io(e.into_io_error().unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::Other, "directory walk failed")
            }))
        })?;
        let is_csv = entry.path().extension().and_then(|e| e.to_str()) == Some("csv");
        if entry.file_type().is_file() && is_csv {
            found.push(entry.into_path());
        }
    }

    if found.len() == 1 {
        Ok(found.remove(0))
    } else {
        Err(AnalysisError::MissingOrAmbiguousSource {
            dir: task_dir.to_path_buf(),
            found: found.len(),
        })
    }
}

fn child_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            // Broken entries (dangling links, unreadable children) are skipped.
            Err(e) if e.depth() > 0 => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read directory {}", dir.display()))
            }
        };
        if entry.file_type().is_dir() {
            dirs.push(entry.into_path());
        } else {
            warn!("Skipping non-directory: {}", entry.path().display());
        }
    }
    Ok(dirs)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_discover_units_in_name_order() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("S2/stop_signal")).unwrap();
        fs::create_dir_all(root.path().join("S1/stop_signal")).unwrap();
        fs::create_dir_all(root.path().join("S1/race_ethnicity_RMR_survey_rdoc")).unwrap();
        fs::write(root.path().join("notes.txt"), "not a subject").unwrap();
        fs::write(root.path().join("S1/readme.txt"), "not a task").unwrap();

        let scan = discover_units(root.path()).unwrap();
        assert_eq!(scan.subjects, 2);

        let units: Vec<_> = scan
            .units
            .iter()
            .map(|u| format!("{}/{}", u.subject_id, u.task_id))
            .collect();
        assert_eq!(
            units,
            vec![
                "S1/race_ethnicity_RMR_survey_rdoc",
                "S1/stop_signal",
                "S2/stop_signal"
            ]
        );
    }

    #[test]
    fn test_discover_units_missing_root() {
        let root = TempDir::new().unwrap();
        assert!(discover_units(&root.path().join("absent")).is_err());
    }

    #[test]
    fn test_unreadable_subject_is_recorded_not_fatal() {
        let root = TempDir::new().unwrap();
        let mut scan = TreeScan::default();
        scan_subject(&mut scan, &root.path().join("S9"));

        assert!(scan.units.is_empty());
        assert_eq!(scan.unreadable.len(), 1);
        assert_eq!(scan.unreadable[0].subject_id, "S9");
        assert_eq!(scan.unreadable[0].task_id, ALL_TASKS);
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_subject_link_does_not_stop_scan() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("S1/stop_signal")).unwrap();
        std::os::unix::fs::symlink(root.path().join("gone"), root.path().join("S0")).unwrap();

        let scan = discover_units(root.path()).unwrap();
        assert_eq!(scan.subjects, 1);
        assert_eq!(scan.units[0].subject_id, "S1");
    }

    #[test]
    fn test_resolve_single_source() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("sub-S1_task-stop_signal.csv"), "a\n1\n").unwrap();
        fs::write(dir.path().join("notes.json"), "{}").unwrap();

        let source = resolve_source(dir.path()).unwrap();
        assert_eq!(source.file_name().unwrap(), "sub-S1_task-stop_signal.csv");
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_subject_and_source_are_followed() {
        use std::os::unix::fs::symlink;

        let store = TempDir::new().unwrap();
        fs::create_dir_all(store.path().join("S2/stop_signal")).unwrap();
        fs::write(store.path().join("S2/stop_signal/sub-S2.csv"), "a\n1\n").unwrap();
        fs::write(store.path().join("sub-S1.csv"), "a\n1\n").unwrap();

        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("S1/stop_signal")).unwrap();
        symlink(
            store.path().join("sub-S1.csv"),
            root.path().join("S1/stop_signal/sub-S1.csv"),
        )
        .unwrap();
        symlink(store.path().join("S2"), root.path().join("S2")).unwrap();

        let scan = discover_units(root.path()).unwrap();
        assert_eq!(scan.subjects, 2);
        assert_eq!(scan.units.len(), 2);
        for unit in &scan.units {
            assert!(resolve_source(&unit.dir).is_ok(), "{}", unit.dir.display());
        }
    }

    #[test]
    fn test_resolve_zero_or_many_sources() {
        let dir = TempDir::new().unwrap();
        let err = resolve_source(dir.path()).unwrap_err();
        assert!(matches!(err, AnalysisError::MissingOrAmbiguousSource { found: 0, .. }));

        fs::write(dir.path().join("a.csv"), "a\n").unwrap();
        fs::write(dir.path().join("b.csv"), "a\n").unwrap();
        let err = resolve_source(dir.path()).unwrap_err();
        assert!(matches!(err, AnalysisError::MissingOrAmbiguousSource { found: 2, .. }));
        assert!(err.is_skip());
    }
}

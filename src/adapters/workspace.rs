use crate::domain::model::CleanupReport;
use crate::utils::error::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Temporary file layout: `<root>/<cvm:06>_files/` per company, with a `pdfs/`
/// subdirectory for sections extracted from the FRE XML.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure_root(&self) -> Result<&Path> {
        fs::create_dir_all(&self.root)?;
        Ok(&self.root)
    }

    pub fn company_dir_path(&self, cvm_code: u32) -> PathBuf {
        self.root.join(format!("{:06}_files", cvm_code))
    }

    /// Created on demand.
    pub fn company_dir(&self, cvm_code: u32) -> Result<PathBuf> {
        let dir = self.company_dir_path(cvm_code);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn pdf_dir(&self, cvm_code: u32) -> Result<PathBuf> {
        let dir = self.company_dir_path(cvm_code).join("pdfs");
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn count_pdfs(&self, cvm_code: u32) -> usize {
        let dir = self.company_dir_path(cvm_code).join("pdfs");
        fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| {
                        e.path()
                            .extension()
                            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
                            .unwrap_or(false)
                    })
                    .count()
            })
            .unwrap_or(0)
    }

    /// Deletes files last modified before `now - older_than`, then prunes
    /// directories left empty. The root itself is kept.
    pub fn cleanup(&self, older_than: Duration) -> Result<CleanupReport> {
        let mut report = CleanupReport::default();
        if !self.root.exists() {
            return Ok(report);
        }

        let cutoff = SystemTime::now()
            .checked_sub(older_than)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        sweep(&self.root, cutoff, &mut report)?;

        tracing::info!(
            "Temporary files cleaned up: {} files and {} directories removed",
            report.files_removed,
            report.dirs_removed
        );
        Ok(report)
    }
}

/// Returns whether `dir` is empty after the sweep. Entries that cannot be
/// inspected or removed are logged and left in place.
fn sweep(dir: &Path, cutoff: SystemTime, report: &mut CleanupReport) -> Result<bool> {
    let mut remaining = 0usize;

    for entry in fs::read_dir(dir)? {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                tracing::warn!("Cannot read entry in {}: {}", dir.display(), e);
                remaining += 1;
                continue;
            }
        };
        if !sweep_entry(&path, cutoff, report) {
            remaining += 1;
        }
    }

    Ok(remaining == 0)
}

/// `true` when `path` is gone after the sweep.
fn sweep_entry(path: &Path, cutoff: SystemTime, report: &mut CleanupReport) -> bool {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) => {
            tracing::warn!("Cannot stat {}: {}", path.display(), e);
            return false;
        }
    };

    if metadata.is_dir() {
        return match sweep(path, cutoff, report) {
            Ok(true) => match fs::remove_dir(path) {
                Ok(()) => {
                    report.dirs_removed += 1;
                    true
                }
                Err(e) => {
                    tracing::warn!("Cannot remove directory {}: {}", path.display(), e);
                    false
                }
            },
            Ok(false) => false,
            Err(e) => {
                tracing::warn!("Cannot read directory {}: {}", path.display(), e);
                false
            }
        };
    }

    match metadata.modified() {
        Ok(modified) if modified < cutoff => match fs::remove_file(path) {
            Ok(()) => {
                tracing::debug!("Removed {}", path.display());
                report.files_removed += 1;
                true
            }
            Err(e) => {
                tracing::warn!("Cannot remove {}: {}", path.display(), e);
                false
            }
        },
        Ok(_) => false,
        Err(e) => {
            tracing::warn!("Cannot read modification time of {}: {}", path.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn age_file(path: &Path, age: Duration) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[test]
    fn test_company_dir_is_zero_padded() {
        let temp = TempDir::new().unwrap();
        let workspace = Workspace::new(temp.path());

        let dir = workspace.company_dir(14206).unwrap();
        assert_eq!(dir, temp.path().join("014206_files"));
        assert!(dir.is_dir());
        assert!(workspace.pdf_dir(14206).unwrap().ends_with("014206_files/pdfs"));
    }

    #[test]
    fn test_count_pdfs() {
        let temp = TempDir::new().unwrap();
        let workspace = Workspace::new(temp.path());
        assert_eq!(workspace.count_pdfs(9512), 0);

        let pdfs = workspace.pdf_dir(9512).unwrap();
        fs::write(pdfs.join("info_asg_abc.pdf"), b"%PDF").unwrap();
        fs::write(pdfs.join("historico_def.PDF"), b"%PDF").unwrap();
        fs::write(pdfs.join("notes.txt"), b"x").unwrap();

        assert_eq!(workspace.count_pdfs(9512), 2);
    }

    #[test]
    fn test_cleanup_removes_old_files_and_empty_dirs() {
        let temp = TempDir::new().unwrap();
        let workspace = Workspace::new(temp.path());

        let old_company = workspace.pdf_dir(1).unwrap();
        let old_file = old_company.join("old.pdf");
        fs::write(&old_file, b"old").unwrap();
        age_file(&old_file, Duration::from_secs(10 * 24 * 3600));

        let fresh_company = workspace.company_dir(2).unwrap();
        let fresh_file = fresh_company.join("fresh.zip");
        fs::write(&fresh_file, b"fresh").unwrap();

        let report = workspace.cleanup(Duration::from_secs(7 * 24 * 3600)).unwrap();

        assert_eq!(report.files_removed, 1);
        // pdfs/ and 000001_files/
        assert_eq!(report.dirs_removed, 2);
        assert!(!workspace.company_dir_path(1).exists());
        assert!(fresh_file.exists());
        assert!(temp.path().exists());
    }

    #[test]
    fn test_cleanup_missing_root_is_noop() {
        let temp = TempDir::new().unwrap();
        let workspace = Workspace::new(temp.path().join("never-created"));
        let report = workspace.cleanup(Duration::from_secs(1)).unwrap();
        assert_eq!(report, CleanupReport::default());
    }

    #[test]
    fn test_unremovable_entry_is_skipped() {
        let temp = TempDir::new().unwrap();
        let mut report = CleanupReport::default();

        let gone = temp.path().join("vanished.zip");
        assert!(!sweep_entry(&gone, SystemTime::now(), &mut report));
        assert_eq!(report, CleanupReport::default());
    }

    #[test]
    fn test_cleanup_fails_when_root_is_not_a_directory() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("work");
        fs::write(&root, b"not a dir").unwrap();

        assert!(Workspace::new(root).cleanup(Duration::from_secs(0)).is_err());
    }
}

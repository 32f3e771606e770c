//! On-disk directory provisioning.
//!
//! Each directory is created independently. A failure is logged and recorded
//! in the report but never stops the remaining directories or the boot; the
//! feature that needs a missing directory fails later on its own.

use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use crate::config::{SystemConfig, DATA_DIR_MODE};

/// Outcome of provisioning a single directory
#[derive(Debug)]
pub struct Provisioned {
    pub label: &'static str,
    pub path: PathBuf,
    pub result: std::io::Result<()>,
}

impl Provisioned {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Results for every directory that was attempted, in order.
#[derive(Debug, Default)]
pub struct ProvisionReport {
    pub entries: Vec<Provisioned>,
}

impl ProvisionReport {
    pub fn failures(&self) -> impl Iterator<Item = &Provisioned> {
        self.entries.iter().filter(|e| !e.is_ok())
    }

    pub fn all_ok(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Create `path` and any missing parents with mode 0755. Existing directories are left alone.
pub fn ensure_directory(path: &Path) -> std::io::Result<()> {
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(DATA_DIR_MODE)
        .create(path)
}

/// Provision a list of labelled directories.
pub fn provision<'a, I>(targets: I) -> ProvisionReport
where
    I: IntoIterator<Item = (&'static str, &'a Path)>,
{
    let entries = targets
        .into_iter()
        .map(|(label, path)| {
            let result = ensure_directory(path);
            match &result {
                Ok(()) => {
                    tracing::debug!(directory = label, path = %path.display(), "directory ready");
                }
                Err(e) => {
                    tracing::error!(
                        directory = label,
                        path = %path.display(),
                        error = %e,
                        "failed to create {} directory",
                        label
                    );
                }
            }
            Provisioned {
                label,
                path: path.to_path_buf(),
                result,
            }
        })
        .collect();

    ProvisionReport { entries }
}

/// Ensure the archive and backup directories exist.
pub fn provision_system(system: &SystemConfig) -> ProvisionReport {
    provision([
        ("archive", system.archive_directory.as_path()),
        ("backup", system.backup_directory.as_path()),
    ])
}

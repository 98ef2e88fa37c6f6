use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

const IGNORABLE_FILE: &str = ".DS_Store";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    Removed { removed_packages_root: bool },
    /// An unrecognised file was found; nothing was deleted.
    Aborted { unknown: PathBuf },
    NothingToClean,
}

fn is_known_artifact(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    name == IGNORABLE_FILE || lower.ends_with(".pkg") || lower.ends_with(".ini")
}

/// Removes a version's download directory if it only holds installer
/// artifacts, then the packages root if nothing else is left in it.
pub fn clean_up(download_dir: &Path) -> Result<CleanupOutcome> {
    if !download_dir.is_dir() {
        return Ok(CleanupOutcome::NothingToClean);
    }

    for entry in fs::read_dir(download_dir)
        .with_context(|| format!("failed to read {}", download_dir.display()))?
    {
        let entry =
            entry.with_context(|| format!("failed reading entry in {}", download_dir.display()))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_known_artifact(&name) || entry.path().is_dir() {
            log::warn!(
                "cleanup aborted because of unknown file '{name}' in {}",
                download_dir.display()
            );
            return Ok(CleanupOutcome::Aborted {
                unknown: entry.path(),
            });
        }
    }

    fs::remove_dir_all(download_dir)
        .with_context(|| format!("failed to remove {}", download_dir.display()))?;

    let Some(packages_root) = download_dir.parent() else {
        return Ok(CleanupOutcome::Removed {
            removed_packages_root: false,
        });
    };
    let only_ignorable = fs::read_dir(packages_root)
        .with_context(|| format!("failed to read {}", packages_root.display()))?
        .filter_map(|entry| entry.ok())
        .all(|entry| entry.file_name() == IGNORABLE_FILE);
    if only_ignorable {
        fs::remove_dir_all(packages_root)
            .with_context(|| format!("failed to remove {}", packages_root.display()))?;
    }
    Ok(CleanupOutcome::Removed {
        removed_packages_root: only_ignorable,
    })
}

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use unisetup_core::UnisetupError;

use crate::installs::InstalledVersions;
use crate::layout::{is_canonical_dir, VolumeLayout};

/// Moves installations around so the vendor installer, which always targets the
/// canonical directory, works on the right tree. Moves are undone by
/// [`InstallSwap::release`] or, failing that, on drop.
#[derive(Debug)]
pub struct InstallSwap {
    canonical: PathBuf,
    fresh_install_dir: PathBuf,
    moved_aside_to: Option<PathBuf>,
    moved_in_from: Option<PathBuf>,
    released: bool,
}

impl InstallSwap {
    pub fn acquire(
        volume: &VolumeLayout,
        version: &str,
        installs: &InstalledVersions,
    ) -> Result<Self> {
        let canonical = volume.canonical_install_dir();
        let mut swap = Self {
            canonical: canonical.clone(),
            fresh_install_dir: volume.qualified_install_dir(version),
            moved_aside_to: None,
            moved_in_from: None,
            released: false,
        };

        let target_dir = installs.get(version);
        let target_is_canonical = target_dir.is_some_and(|dir| is_canonical_dir(dir));

        if !target_is_canonical && canonical.is_dir() {
            let occupants: Vec<&String> = installs
                .iter()
                .filter(|(_, dir)| is_canonical_dir(dir))
                .map(|(installed, _)| installed)
                .collect();
            let [occupant] = occupants.as_slice() else {
                return Err(UnisetupError::conflict(format!(
                    "directory '{}' not recognized as a Unity installation",
                    canonical.display()
                ))
                .into());
            };

            let aside = volume.qualified_install_dir(occupant);
            if aside.exists() {
                return Err(UnisetupError::conflict(format!(
                    "duplicate Unity installs in '{}' and '{}'",
                    canonical.display(),
                    aside.display()
                ))
                .into());
            }
            log::info!("moving Unity {occupant} aside to {}", aside.display());
            rename_dir(&canonical, &aside)?;
            swap.moved_aside_to = Some(aside);
        }

        if let Some(dir) = target_dir.filter(|_| !target_is_canonical) {
            log::debug!("moving {} into {}", dir.display(), canonical.display());
            rename_dir(dir, &canonical)?;
            swap.moved_in_from = Some(dir.clone());
        }

        Ok(swap)
    }

    pub fn canonical_dir(&self) -> &Path {
        &self.canonical
    }

    /// Undoes the moves. A fresh install left in the canonical directory while an
    /// older install waits aside is renamed to its version-qualified name first.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.restore()
    }

    fn restore(&mut self) -> Result<()> {
        if let Some(original) = self.moved_in_from.take() {
            rename_dir(&self.canonical, &original)?;
        }

        if let Some(aside) = self.moved_aside_to.take() {
            if self.canonical.is_dir() {
                if self.fresh_install_dir.exists() {
                    return Err(UnisetupError::conflict(format!(
                        "cannot move new install to '{}', the directory already exists; previous install left at '{}'",
                        self.fresh_install_dir.display(),
                        aside.display()
                    ))
                    .into());
                }
                rename_dir(&self.canonical, &self.fresh_install_dir)?;
            }
            rename_dir(&aside, &self.canonical)?;
        }
        Ok(())
    }
}

impl Drop for InstallSwap {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self.restore() {
            log::error!("failed to restore Unity installations: {err:#}");
        }
    }
}

fn rename_dir(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to)
        .with_context(|| format!("failed to move {} to {}", from.display(), to.display()))
}

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use unisetup_core::MAIN_PACKAGE;

pub const STATE_ROOT_ENV: &str = "UNISETUP_HOME";
pub const PACKAGES_DIR_NAME: &str = "Unity Packages";

/// Where unisetup keeps its own state: catalog, manifest cache and config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLayout {
    root: PathBuf,
}

impl StateLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.root.join("unity_versions.json")
    }

    pub fn manifests_dir(&self) -> PathBuf {
        self.root.join("manifests")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in [self.root.clone(), self.manifests_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create dir: {}", dir.display()))?;
        }
        Ok(())
    }
}

pub fn default_state_root() -> Result<PathBuf> {
    if let Some(root) = std::env::var_os(STATE_ROOT_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(root));
    }
    let home = std::env::var("HOME").context("HOME is not set; cannot resolve state root")?;
    Ok(PathBuf::from(home).join(".unisetup"))
}

pub fn default_package_store() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set; cannot resolve package store")?;
    Ok(PathBuf::from(home).join("Downloads"))
}

/// Per-version download directories under the package store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadLayout {
    store: PathBuf,
}

impl DownloadLayout {
    pub fn new(store: impl Into<PathBuf>) -> Self {
        Self {
            store: store.into(),
        }
    }

    pub fn packages_root(&self) -> PathBuf {
        self.store.join(PACKAGES_DIR_NAME)
    }

    pub fn version_dir(&self, version: &str) -> PathBuf {
        self.packages_root().join(version)
    }
}

/// Install locations on a target volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeLayout {
    volume: PathBuf,
}

impl VolumeLayout {
    pub fn new(volume: impl Into<PathBuf>) -> Self {
        Self {
            volume: volume.into(),
        }
    }

    pub fn volume(&self) -> &Path {
        &self.volume
    }

    pub fn applications_dir(&self) -> PathBuf {
        self.volume.join("Applications")
    }

    /// The directory the vendor installer always writes to.
    pub fn canonical_install_dir(&self) -> PathBuf {
        self.applications_dir().join(MAIN_PACKAGE)
    }

    pub fn qualified_install_dir(&self, version: &str) -> PathBuf {
        self.applications_dir()
            .join(format!("{MAIN_PACKAGE} {version}"))
    }
}

pub(crate) fn is_canonical_dir(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name == MAIN_PACKAGE)
}

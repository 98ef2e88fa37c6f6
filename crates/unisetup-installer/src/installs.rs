use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use unisetup_core::MAIN_PACKAGE;

/// Installed version -> install directory, rebuilt on every run.
pub type InstalledVersions = BTreeMap<String, PathBuf>;

pub trait VersionReader {
    fn read_version(&self, install_dir: &Path) -> Result<String>;
}

/// Reads `CFBundleVersion` from the editor bundle's `Info.plist`.
pub struct PlistVersionReader;

impl VersionReader for PlistVersionReader {
    fn read_version(&self, install_dir: &Path) -> Result<String> {
        let plist_path = install_dir
            .join(format!("{MAIN_PACKAGE}.app"))
            .join("Contents")
            .join("Info.plist");
        if !plist_path.is_file() {
            return Err(anyhow!("no Info.plist found at {}", plist_path.display()));
        }
        let value = plist::Value::from_file(&plist_path)
            .with_context(|| format!("failed parsing {}", plist_path.display()))?;
        value
            .into_dictionary()
            .and_then(|mut dict| dict.remove("CFBundleVersion"))
            .and_then(plist::Value::into_string)
            .map(|version| version.trim().to_string())
            .ok_or_else(|| anyhow!("no CFBundleVersion in {}", plist_path.display()))
    }
}

/// Scans `applications_dir` for product directories and reads their versions.
/// Directories without a readable version are skipped with a warning.
pub fn discover_installs(
    applications_dir: &Path,
    reader: &dyn VersionReader,
) -> Result<InstalledVersions> {
    if !applications_dir.is_dir() {
        return Err(anyhow!(
            "applications directory on target volume not found: {}",
            applications_dir.display()
        ));
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(applications_dir)
        .with_context(|| format!("failed to read {}", applications_dir.display()))?
    {
        let entry = entry
            .with_context(|| format!("failed reading entry in {}", applications_dir.display()))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(MAIN_PACKAGE) && entry.path().is_dir() {
            names.push(name);
        }
    }
    names.sort();

    let mut installs = InstalledVersions::new();
    for name in names {
        let install_dir = applications_dir.join(&name);
        match reader.read_version(&install_dir) {
            Ok(version) => {
                log::debug!("found Unity {version} at {}", install_dir.display());
                installs.insert(version, install_dir);
            }
            Err(err) => log::warn!("skipping {}: {err:#}", install_dir.display()),
        }
    }
    Ok(installs)
}

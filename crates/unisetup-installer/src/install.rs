use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use unisetup_core::{PackageDescriptor, UnisetupError, MAIN_PACKAGE};

use crate::installs::InstalledVersions;
use crate::layout::VolumeLayout;
use crate::runner::PackageInstaller;
use crate::swap::InstallSwap;

pub struct InstallRequest<'a> {
    pub version: &'a str,
    pub selection: &'a [PackageDescriptor],
    pub download_dir: &'a Path,
    pub volume: &'a VolumeLayout,
}

/// Every selected package file must already be downloaded.
pub fn missing_package_files(download_dir: &Path, selection: &[PackageDescriptor]) -> Vec<PathBuf> {
    selection
        .iter()
        .map(|package| download_dir.join(package.file_name()))
        .filter(|path| !path.is_file())
        .collect()
}

/// Installs the selected packages of one version with the install swap in place.
///
/// Installer failures stop the loop; the swap is always undone before the
/// failure is reported.
pub fn install_version(
    request: &InstallRequest<'_>,
    installs: &InstalledVersions,
    installer: &mut dyn PackageInstaller,
) -> Result<()> {
    let missing = missing_package_files(request.download_dir, request.selection);
    if !missing.is_empty() {
        for path in &missing {
            log::error!("package {} has not been downloaded", path.display());
        }
        return Err(anyhow!(
            "{} package(s) to be installed have not been downloaded",
            missing.len()
        ));
    }

    let installs_main = request
        .selection
        .iter()
        .any(|package| package.name == MAIN_PACKAGE);
    if !installs.contains_key(request.version) && !installs_main {
        return Err(UnisetupError::MissingInstallation {
            version: request.version.to_string(),
        }
        .into());
    }

    let swap = InstallSwap::acquire(request.volume, request.version, installs)?;

    let mut failure = None;
    for package in request.selection {
        let path = request.download_dir.join(package.file_name());
        log::info!("installing {}...", package.file_name());
        match installer.install_package(&path, request.volume.volume()) {
            Ok(result) if result.success => {
                log::debug!("{}", result.output.trim());
            }
            Ok(result) => {
                failure = Some((package.name.clone(), result.output));
                break;
            }
            Err(err) => {
                failure = Some((package.name.clone(), format!("{err:#}")));
                break;
            }
        }
    }

    let released = swap.release();
    let Some((package, output)) = failure else {
        return released;
    };
    if let Err(err) = released {
        log::error!("{err:#}");
    }
    Err(UnisetupError::Install {
        package,
        output: output.trim().to_string(),
    }
    .into())
}

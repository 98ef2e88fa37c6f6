use anyhow::{anyhow, Result};
use chrono::Utc;
use unisetup_catalog::{clear_cached_manifests, fetch_manifest, load_cached_manifest, Catalog};
use unisetup_core::{
    total_download_size, total_installed_size, PackageManifest, ReleaseStage, UnisetupError,
    MAIN_PACKAGE,
};
use unisetup_fetch::{download_file, DownloadRequest, ProgressSink, Transport};
use unisetup_installer::{
    clean_up, discover_installs, install_version, CleanupOutcome, InstallRequest,
    InstalledVersions, PackageInstaller, VersionReader,
};
use unisetup_resolver::{refresh_strength, resolve_versions};

use crate::context::RunContext;
use crate::dispatch::{Operation, RunRequest};
use crate::render::{
    format_installed_lines, format_package_listing, format_selection_summary,
    format_version_listing, render_section_header, render_status_line,
};

/// Cache and catalog edits requested alongside any operation.
pub fn apply_catalog_maintenance(
    ctx: &RunContext,
    catalog: &mut Catalog,
    transport: &dyn Transport,
    request: &RunRequest,
) -> Result<()> {
    if request.update {
        let removed = clear_cached_manifests(&ctx.state.manifests_dir())?;
        log::debug!("removed {removed} cached manifest(s)");
    }

    for version in &request.forget {
        if catalog.forget(version)? {
            log::info!("forgot discovered version {version}");
        }
    }
    for url in &request.discover {
        if let Some(version) = catalog.discover(transport, url)? {
            log::info!("discovered Unity {version}");
        }
    }

    if request.save {
        catalog.set_default_packages(&request.packages)?;
        if request.packages.is_empty() {
            log::info!("cleared saved default packages");
        } else {
            log::info!("saved default packages: {}", request.packages.join(", "));
        }
    }
    Ok(())
}

pub fn list_versions(
    ctx: &RunContext,
    catalog: &mut Catalog,
    transport: &dyn Transport,
    reader: &dyn VersionReader,
    stage: ReleaseStage,
    force: bool,
) -> Result<Vec<String>> {
    let installs = discover_installs(&ctx.volume.applications_dir(), reader)?;
    catalog.refresh(transport, &ctx.settings.sources, stage, force, Utc::now())?;

    let mut lines = vec![render_section_header(ctx.style, "installed")];
    lines.extend(format_installed_lines(&installs));
    lines.push(String::new());
    lines.extend(format_version_listing(
        ctx.style,
        stage,
        &catalog.grouped_versions(stage),
    ));
    Ok(lines)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionPlan {
    pub versions: Vec<String>,
    pub installs: InstalledVersions,
}

/// Installing packages without the editor itself only makes sense for
/// versions that are already installed.
pub fn is_addon_only(operation: Operation, packages: &[String]) -> bool {
    operation.installs()
        && !packages.is_empty()
        && !packages
            .iter()
            .any(|name| name.eq_ignore_ascii_case(MAIN_PACKAGE))
}

/// Refreshes the catalog as needed and resolves the requested versions.
pub fn plan_versions(
    ctx: &RunContext,
    catalog: &mut Catalog,
    transport: &dyn Transport,
    reader: &dyn VersionReader,
    request: &RunRequest,
    operation: Operation,
) -> Result<VersionPlan> {
    let installs = discover_installs(&ctx.volume.applications_dir(), reader)?;
    for (version, path) in &installs {
        log::debug!("found Unity {version} at {}", path.display());
    }

    let strength = refresh_strength(&request.versions)?;
    if request.update || operation != Operation::Install {
        catalog.refresh(
            transport,
            &ctx.settings.sources,
            strength,
            request.update,
            Utc::now(),
        )?;
    }

    let pool: Vec<String> = if is_addon_only(operation, &request.packages) {
        if installs.is_empty() {
            return Err(UnisetupError::MissingInstallation {
                version: request.versions.join(", "),
            }
            .into());
        }
        installs.keys().cloned().collect()
    } else {
        catalog.sorted_versions()
    };

    let versions = resolve_versions(&request.versions, &pool)?;
    Ok(VersionPlan { versions, installs })
}

/// Requested packages, falling back to the saved defaults.
pub fn effective_packages(request: &RunRequest, saved: &[String]) -> Vec<String> {
    if !request.packages.is_empty() || request.unity_defaults || saved.is_empty() {
        return request.packages.clone();
    }
    log::info!("using saved default packages: {}", saved.join(", "));
    saved.to_vec()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionOutcome {
    Listed,
    NothingSelected,
    AlreadyInstalled,
    Processed,
}

/// Shared inputs for processing each resolved version.
pub struct VersionRun<'a> {
    pub ctx: &'a RunContext,
    pub catalog: &'a Catalog,
    pub transport: &'a dyn Transport,
    pub request: &'a RunRequest,
    pub operation: Operation,
}

pub fn process_version(
    run: &VersionRun<'_>,
    version: &str,
    installs: &InstalledVersions,
    installer: &mut dyn PackageInstaller,
    progress: &mut dyn ProgressSink,
) -> Result<VersionOutcome> {
    let ctx = run.ctx;
    let manifest = load_manifest(run, version)?;

    if run.operation == Operation::ListPackages {
        for line in format_package_listing(version, &manifest) {
            println!("{line}");
        }
        return Ok(VersionOutcome::Listed);
    }

    let requested = effective_packages(run.request, run.catalog.default_packages());
    let selection = manifest.select(&requested, run.request.all_packages);
    if selection.is_empty() {
        log::warn!("no packages selected for Unity {version}");
        return Ok(VersionOutcome::NothingSelected);
    }

    let download_size = run
        .operation
        .downloads()
        .then(|| total_download_size(&selection));
    let install_size = run
        .operation
        .installs()
        .then(|| total_installed_size(&selection));
    for line in format_selection_summary(version, &selection, download_size, install_size) {
        println!("{line}");
    }

    if run.operation == Operation::DownloadAndInstall
        && selection[0].is_main_package()
        && installs.contains_key(version)
    {
        log::warn!("Unity {version} is already installed, skipping");
        return Ok(VersionOutcome::AlreadyInstalled);
    }

    let download_dir = ctx.downloads.version_dir(version);
    if run.operation.downloads() {
        let base_url = run.catalog.base_url(version).ok_or_else(|| missing_location(version))?;
        for package in &selection {
            let url = format!("{base_url}{}", package.remote_path);
            let output = download_dir.join(package.file_name());
            let request = DownloadRequest {
                url: &url,
                output: &output,
                expected_size: package.size_bytes,
                md5: package.md5.as_deref(),
            };
            download_file(run.transport, &request, &ctx.settings.policy, progress)?;
        }
    }

    if run.operation.installs() {
        let request = InstallRequest {
            version,
            selection: &selection,
            download_dir: &download_dir,
            volume: &ctx.volume,
        };
        install_version(&request, installs, installer)?;
        println!(
            "{}",
            render_status_line(ctx.style, "ok", &format!("installed Unity {version}"))
        );

        if run.operation == Operation::DownloadAndInstall && !run.request.keep {
            match clean_up(&download_dir)? {
                CleanupOutcome::Removed { .. } => {
                    log::info!("removed downloaded packages in {}", download_dir.display())
                }
                CleanupOutcome::Aborted { .. } | CleanupOutcome::NothingToClean => {}
            }
        }
    }

    Ok(VersionOutcome::Processed)
}

fn load_manifest(run: &VersionRun<'_>, version: &str) -> Result<PackageManifest> {
    let cache_dir = run.ctx.state.manifests_dir();
    match run.catalog.base_url(version) {
        Some(base_url) => fetch_manifest(run.transport, version, base_url, &cache_dir, false),
        None => load_cached_manifest(version, &cache_dir)?.ok_or_else(|| missing_location(version)),
    }
}

fn missing_location(version: &str) -> anyhow::Error {
    anyhow!("no download location known for Unity {version}; add one with --discover")
}

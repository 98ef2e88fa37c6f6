use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use unisetup_core::{manifest_file_name, PackageManifest};
use unisetup_fetch::Transport;

/// Loads the package manifest for `version`, from `cache_dir` when present and
/// otherwise from `base_url`. Downloaded manifests are cached verbatim.
pub fn fetch_manifest(
    transport: &dyn Transport,
    version: &str,
    base_url: &str,
    cache_dir: &Path,
    force_refresh: bool,
) -> Result<PackageManifest> {
    if !force_refresh {
        if let Some(manifest) = load_cached_manifest(version, cache_dir)? {
            return Ok(manifest);
        }
    }

    let file_name = manifest_file_name(version);
    let cache_path = cache_dir.join(&file_name);
    let url = format!("{base_url}{file_name}");
    log::info!("fetching package manifest for {version}");
    let content = transport.fetch_text(&url)?;
    fs::create_dir_all(cache_dir)
        .with_context(|| format!("failed creating manifest cache dir: {}", cache_dir.display()))?;
    fs::write(&cache_path, &content)
        .with_context(|| format!("failed writing cached manifest: {}", cache_path.display()))?;

    parse_manifest(version, &content)
}

/// The cached manifest for `version`, if one was stored earlier.
pub fn load_cached_manifest(version: &str, cache_dir: &Path) -> Result<Option<PackageManifest>> {
    let cache_path = cache_dir.join(manifest_file_name(version));
    if !cache_path.exists() {
        return Ok(None);
    }
    log::debug!("using cached manifest {}", cache_path.display());
    let content = fs::read_to_string(&cache_path)
        .with_context(|| format!("failed reading cached manifest: {}", cache_path.display()))?;
    parse_manifest(version, &content).map(Some)
}

fn parse_manifest(version: &str, content: &str) -> Result<PackageManifest> {
    PackageManifest::from_ini_str(content)
        .with_context(|| format!("failed parsing manifest for Unity {version}"))
}

/// Deletes every cached `unity-*.ini`; returns how many were removed.
pub fn clear_cached_manifests(cache_dir: &Path) -> Result<usize> {
    if !cache_dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in fs::read_dir(cache_dir)
        .with_context(|| format!("failed reading manifest cache: {}", cache_dir.display()))?
    {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !(name.starts_with("unity") && name.ends_with(".ini")) {
            continue;
        }
        let path = entry.path();
        fs::remove_file(&path)
            .with_context(|| format!("failed removing cached manifest: {}", path.display()))?;
        removed += 1;
    }
    Ok(removed)
}

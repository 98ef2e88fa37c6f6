use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use unisetup_catalog::{CatalogSources, DEFAULT_CACHE_LIFETIME_HOURS};
use unisetup_fetch::{DownloadPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_WAIT};
use unisetup_installer::default_package_store;

pub const DEFAULT_VOLUME: &str = "/";
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 60;

/// Contents of `config.toml`; every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub package_store: Option<PathBuf>,
    pub volume: Option<PathBuf>,
    pub cache_lifetime_hours: Option<u32>,
    pub download_retries: Option<u32>,
    pub retry_wait_secs: Option<u64>,
    pub download_timeout_secs: Option<u64>,
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourcesConfig {
    pub release_url: Option<String>,
    pub patch_url: Option<String>,
    pub beta_index_url: Option<String>,
    pub beta_page_url: Option<String>,
}

pub fn parse_config(content: &str) -> Result<FileConfig> {
    toml::from_str(content).context("failed to parse config")
}

/// Reads `path`, treating a missing file as an empty config.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed reading config: {}", path.display()))?;
    parse_config(&content).with_context(|| format!("invalid config file: {}", path.display()))
}

/// Values given on the command line that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub package_store: Option<PathBuf>,
    pub volume: Option<PathBuf>,
}

/// Effective settings after layering defaults, file and flags.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub package_store: PathBuf,
    pub volume: PathBuf,
    pub cache_lifetime_hours: i64,
    pub policy: DownloadPolicy,
    pub download_timeout: Duration,
    pub sources: CatalogSources,
}

impl Settings {
    pub fn resolve(file: &FileConfig, overrides: &ConfigOverrides) -> Result<Self> {
        let package_store = match overrides
            .package_store
            .as_ref()
            .or(file.package_store.as_ref())
        {
            Some(path) => expand_home(path)?,
            None => default_package_store()?,
        };
        let volume = match overrides.volume.as_ref().or(file.volume.as_ref()) {
            Some(path) => expand_home(path)?,
            None => PathBuf::from(DEFAULT_VOLUME),
        };

        let policy = DownloadPolicy {
            max_retries: file.download_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            retry_wait: file
                .retry_wait_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_RETRY_WAIT),
            ..DownloadPolicy::default()
        };

        let mut sources = CatalogSources::default();
        let configured = &file.sources;
        for (slot, value) in [
            (&mut sources.release_url, &configured.release_url),
            (&mut sources.patch_url, &configured.patch_url),
            (&mut sources.beta_index_url, &configured.beta_index_url),
            (&mut sources.beta_page_url, &configured.beta_page_url),
        ] {
            if let Some(value) = value {
                *slot = value.clone();
            }
        }

        Ok(Self {
            package_store,
            volume,
            cache_lifetime_hours: file
                .cache_lifetime_hours
                .map(i64::from)
                .unwrap_or(DEFAULT_CACHE_LIFETIME_HOURS),
            policy,
            download_timeout: Duration::from_secs(
                file.download_timeout_secs
                    .unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
            ),
            sources,
        })
    }
}

fn expand_home(path: &Path) -> Result<PathBuf> {
    let Ok(rest) = path.strip_prefix("~") else {
        return Ok(path.to_path_buf());
    };
    let home = std::env::var("HOME").context("HOME is not set; cannot expand '~'")?;
    Ok(PathBuf::from(home).join(rest))
}

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use unisetup_core::{
    manifest_file_name, sort_version_strings, ReleaseStage, UnityVersion, WILDCARD,
};
use unisetup_fetch::Transport;

use crate::scrape::{extract_beta_versions, extract_package_urls, parse_discover_url};
use crate::sources::CatalogSources;

pub const CATALOG_FILE_NAME: &str = "unity_versions.json";
pub const DEFAULT_CACHE_LIFETIME_HOURS: i64 = 24;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// The scraped, time-bounded partitions of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CatalogPartition {
    Release,
    Patch,
    Beta,
}

impl CatalogPartition {
    pub const ALL: [CatalogPartition; 3] = [Self::Release, Self::Patch, Self::Beta];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Release => "release",
            Self::Patch => "patch",
            Self::Beta => "beta",
        }
    }

    /// Loosest stage this partition is scraped for.
    pub fn stage(self) -> ReleaseStage {
        match self {
            Self::Release => ReleaseStage::Final,
            Self::Patch => ReleaseStage::Patch,
            Self::Beta => ReleaseStage::Beta,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Partition {
    #[serde(
        rename = "_lastupdate",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    last_update: Option<String>,
    #[serde(flatten)]
    entries: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    release: Option<Partition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    patch: Option<Partition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    beta: Option<Partition>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    discovered: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_packages: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedPartition {
    pub partition: CatalogPartition,
    pub versions: usize,
}

/// File-backed map of known versions to their download base URLs.
#[derive(Debug, Clone)]
pub struct Catalog {
    path: PathBuf,
    lifetime: Duration,
    file: CatalogFile,
}

impl Catalog {
    /// Reads the catalog at `path`; a missing file is an empty catalog.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed reading version catalog: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("failed parsing version catalog: {}", path.display()))?
        } else {
            CatalogFile::default()
        };

        Ok(Self {
            path,
            lifetime: Duration::hours(DEFAULT_CACHE_LIFETIME_HOURS),
            file,
        })
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating catalog directory: {}", parent.display())
            })?;
        }
        let content = serde_json::to_string_pretty(&self.file)
            .context("failed serializing version catalog")?;
        fs::write(&self.path, content)
            .with_context(|| format!("failed writing version catalog: {}", self.path.display()))
    }

    pub fn is_stale(&self, partition: CatalogPartition, now: DateTime<Utc>) -> bool {
        let Some(last_update) = self
            .partition(partition)
            .and_then(|partition| partition.last_update.as_deref())
        else {
            return true;
        };
        match parse_timestamp(last_update) {
            Some(updated_at) => now - updated_at > self.lifetime,
            None => {
                log::debug!(
                    "unreadable {} timestamp '{last_update}', treating as stale",
                    partition.as_str()
                );
                true
            }
        }
    }

    /// Re-scrapes every partition up to `strength` that is stale (or all of them
    /// with `force`). Partitions are replaced wholesale and the catalog is saved.
    /// Nothing is replaced unless every scrape succeeds.
    pub fn refresh(
        &mut self,
        transport: &dyn Transport,
        sources: &CatalogSources,
        strength: ReleaseStage,
        force: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshedPartition>> {
        let mut scraped = Vec::new();
        for partition in CatalogPartition::ALL {
            if partition.stage() > strength || !(force || self.is_stale(partition, now)) {
                continue;
            }
            log::info!("loading Unity {} versions...", partition.as_str());
            let entries = match partition {
                CatalogPartition::Release => scrape_listing(transport, &sources.release_url)?,
                CatalogPartition::Patch => scrape_listing(transport, &sources.patch_url)?,
                CatalogPartition::Beta => scrape_betas(transport, sources)?,
            };
            scraped.push((partition, entries));
        }

        if scraped.is_empty() {
            return Ok(Vec::new());
        }

        let stamp = now.format(TIMESTAMP_FORMAT).to_string();
        let mut report = Vec::with_capacity(scraped.len());
        for (partition, entries) in scraped {
            report.push(RefreshedPartition {
                partition,
                versions: entries.len(),
            });
            *self.partition_slot(partition) = Some(Partition {
                last_update: Some(stamp.clone()),
                entries,
            });
        }
        self.save()?;
        Ok(report)
    }

    /// Adds the version behind a manifest or installer URL to the discovered
    /// partition. Unparseable or unreachable URLs are warned about and skipped.
    pub fn discover(&mut self, transport: &dyn Transport, url: &str) -> Result<Option<String>> {
        let Some((version, base_url)) = parse_discover_url(url) else {
            log::warn!("could not parse Unity packages url: {url}");
            return Ok(None);
        };

        let manifest_url = format!("{base_url}{}", manifest_file_name(&version));
        if let Err(err) = transport.probe(&manifest_url) {
            log::warn!("failed to load url '{manifest_url}': {err:#}");
            return Ok(None);
        }

        self.file.discovered.insert(version.clone(), base_url);
        self.save()?;
        Ok(Some(version))
    }

    pub fn forget(&mut self, version: &str) -> Result<bool> {
        if self.file.discovered.remove(version).is_none() {
            log::warn!("version {version} not found in manually discovered versions");
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    pub fn base_url(&self, version: &str) -> Option<&str> {
        if let Some(url) = self.file.discovered.get(version) {
            return Some(url.as_str());
        }
        CatalogPartition::ALL
            .iter()
            .filter_map(|partition| self.partition(*partition))
            .find_map(|partition| partition.entries.get(version))
            .map(String::as_str)
    }

    /// Every known version, ascending.
    pub fn sorted_versions(&self) -> Vec<String> {
        let keys = self
            .file
            .discovered
            .keys()
            .chain(
                CatalogPartition::ALL
                    .iter()
                    .filter_map(|partition| self.partition(*partition))
                    .flat_map(|partition| partition.entries.keys()),
            )
            .filter(|key| !key.starts_with('_'))
            .cloned();
        sort_version_strings(keys)
    }

    /// Known versions no looser than `ceiling`, newest first, grouped under
    /// their `major.minor` line.
    pub fn grouped_versions(&self, ceiling: ReleaseStage) -> Vec<(String, Vec<String>)> {
        let mut groups: Vec<(String, Vec<String>)> = Vec::new();
        for raw in self.sorted_versions().into_iter().rev() {
            let Ok(version) = UnityVersion::parse(&raw) else {
                continue;
            };
            if version.ordering_stage() > ceiling {
                continue;
            }
            let line = match version.minor {
                Some(minor) => format!("{}.{minor}", version.major),
                None => format!("{}.{WILDCARD}", version.major),
            };
            match groups.last_mut() {
                Some((current, members)) if *current == line => members.push(raw),
                _ => groups.push((line, vec![raw])),
            }
        }
        groups
    }

    pub fn default_packages(&self) -> &[String] {
        self.file.default_packages.as_deref().unwrap_or(&[])
    }

    /// Persists the preferred package list; an empty list clears it.
    pub fn set_default_packages(&mut self, packages: &[String]) -> Result<()> {
        self.file.default_packages = if packages.is_empty() {
            None
        } else {
            Some(packages.to_vec())
        };
        self.save()
    }

    fn partition(&self, partition: CatalogPartition) -> Option<&Partition> {
        match partition {
            CatalogPartition::Release => self.file.release.as_ref(),
            CatalogPartition::Patch => self.file.patch.as_ref(),
            CatalogPartition::Beta => self.file.beta.as_ref(),
        }
    }

    fn partition_slot(&mut self, partition: CatalogPartition) -> &mut Option<Partition> {
        match partition {
            CatalogPartition::Release => &mut self.file.release,
            CatalogPartition::Patch => &mut self.file.patch,
            CatalogPartition::Beta => &mut self.file.beta,
        }
    }
}

fn scrape_listing(transport: &dyn Transport, url: &str) -> Result<BTreeMap<String, String>> {
    let html = transport.fetch_text(url)?;
    let entries = extract_package_urls(&html);
    log::debug!("found {} versions at {url}", entries.len());
    Ok(entries)
}

// The beta index only links to per-beta pages; each page carries the installer links.
fn scrape_betas(
    transport: &dyn Transport,
    sources: &CatalogSources,
) -> Result<BTreeMap<String, String>> {
    let index = transport.fetch_text(&sources.beta_index_url)?;
    let mut entries = BTreeMap::new();
    for beta in extract_beta_versions(&index) {
        entries.extend(scrape_listing(transport, &sources.beta_page(&beta))?);
    }
    Ok(entries)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

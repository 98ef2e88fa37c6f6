mod catalog;
mod manifest_cache;
mod scrape;
mod sources;

pub use catalog::{
    Catalog, CatalogPartition, RefreshedPartition, CATALOG_FILE_NAME,
    DEFAULT_CACHE_LIFETIME_HOURS,
};
pub use manifest_cache::{clear_cached_manifests, fetch_manifest, load_cached_manifest};
pub use scrape::{extract_beta_versions, extract_package_urls, parse_discover_url};
pub use sources::{
    CatalogSources, DEFAULT_BETA_INDEX_URL, DEFAULT_BETA_PAGE_URL, DEFAULT_PATCH_URL,
    DEFAULT_RELEASE_URL,
};

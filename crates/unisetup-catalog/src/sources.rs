pub const DEFAULT_RELEASE_URL: &str = "https://unity3d.com/get-unity/download/archive";
pub const DEFAULT_PATCH_URL: &str = "https://unity3d.com/unity/qa/patch-releases";
pub const DEFAULT_BETA_INDEX_URL: &str = "https://unity3d.com/unity/beta/archive";
pub const DEFAULT_BETA_PAGE_URL: &str = "https://unity3d.com/unity/beta/unity{version}";

/// Pages scraped to build the catalog. `beta_page_url` holds a `{version}`
/// placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSources {
    pub release_url: String,
    pub patch_url: String,
    pub beta_index_url: String,
    pub beta_page_url: String,
}

impl Default for CatalogSources {
    fn default() -> Self {
        Self {
            release_url: DEFAULT_RELEASE_URL.to_string(),
            patch_url: DEFAULT_PATCH_URL.to_string(),
            beta_index_url: DEFAULT_BETA_INDEX_URL.to_string(),
            beta_page_url: DEFAULT_BETA_PAGE_URL.to_string(),
        }
    }
}

impl CatalogSources {
    pub fn beta_page(&self, version: &str) -> String {
        self.beta_page_url.replace("{version}", version)
    }
}

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

static PACKAGE_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#""(https?://[\w/.-]+/[0-9a-f]{12}/)MacEditorInstaller/[\w/.-]+-(\d+\.\d+\.\d+\w\d+)[\w/.-]+""#,
    )
    .expect("package url pattern is valid")
});

static BETA_VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""/unity/beta/unity(\d+\.\d+\.\d+\w\d+)""#).expect("beta version pattern is valid")
});

static DISCOVER_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(https?://[\w/.-]+/[0-9a-f]{12}/)[\w/.-]+-(\d+\.\d+\.\d+\w\d+)[\w/.-]+")
        .expect("discover url pattern is valid")
});

/// Editor installer links on an archive page, as version -> base URL.
pub fn extract_package_urls(html: &str) -> BTreeMap<String, String> {
    PACKAGE_URL_RE
        .captures_iter(html)
        .map(|captures| (captures[2].to_string(), captures[1].to_string()))
        .collect()
}

/// Beta versions linked from the beta archive index, sorted and unique.
pub fn extract_beta_versions(html: &str) -> Vec<String> {
    let mut versions: Vec<String> = BETA_VERSION_RE
        .captures_iter(html)
        .map(|captures| captures[1].to_string())
        .collect();
    versions.sort();
    versions.dedup();
    versions
}

/// Splits a manifest or installer URL into `(version, base_url)`.
pub fn parse_discover_url(url: &str) -> Option<(String, String)> {
    let captures = DISCOVER_URL_RE.captures(url)?;
    Some((captures[2].to_string(), captures[1].to_string()))
}

mod error;
mod manifest;
mod size;
mod version;

pub use error::{classify, UnisetupError};
pub use manifest::{
    manifest_file_name, total_download_size, total_installed_size, PackageDescriptor,
    PackageManifest, MAIN_PACKAGE,
};
pub use size::format_size;
pub use version::{
    sort_version_strings, ReleaseStage, UnityVersion, DEFAULT_MATCH_STAGE, WILDCARD,
};

#[cfg(test)]
mod tests;

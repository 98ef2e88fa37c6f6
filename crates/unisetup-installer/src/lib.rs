mod cleanup;
mod install;
mod installs;
mod layout;
mod runner;
mod swap;

pub use cleanup::{clean_up, CleanupOutcome};
pub use install::{install_version, missing_package_files, InstallRequest};
pub use installs::{discover_installs, InstalledVersions, PlistVersionReader, VersionReader};
pub use layout::{
    default_package_store, default_state_root, DownloadLayout, StateLayout, VolumeLayout,
    PACKAGES_DIR_NAME, STATE_ROOT_ENV,
};
pub use runner::{
    build_installer_command, build_sudo_reset_command, build_sudo_validate_command,
    validate_sudo_password, InstallerOutput, PackageInstaller, Privilege, SystemInstaller,
    INSTALLER_PATH, SUDO_PATH,
};
pub use swap::InstallSwap;

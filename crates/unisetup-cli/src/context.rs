use anyhow::{Context, Result};
use unisetup_catalog::Catalog;
use unisetup_installer::{
    validate_sudo_password, DownloadLayout, Privilege, StateLayout, VolumeLayout,
};

use crate::config::Settings;
use crate::render::OutputStyle;

/// Everything a run needs that does not change between versions.
pub struct RunContext {
    pub state: StateLayout,
    pub downloads: DownloadLayout,
    pub volume: VolumeLayout,
    pub settings: Settings,
    pub style: OutputStyle,
    privilege: Option<Privilege>,
}

impl RunContext {
    pub fn new(state: StateLayout, settings: Settings, style: OutputStyle) -> Self {
        Self {
            state,
            downloads: DownloadLayout::new(&settings.package_store),
            volume: VolumeLayout::new(&settings.volume),
            settings,
            style,
            privilege: None,
        }
    }

    pub fn open_catalog(&self) -> Result<Catalog> {
        let catalog = Catalog::load(self.state.catalog_path())?;
        Ok(catalog.with_lifetime(chrono::Duration::hours(
            self.settings.cache_lifetime_hours,
        )))
    }

    pub fn privilege(&self) -> Option<&Privilege> {
        self.privilege.as_ref()
    }

    /// Prompts for the admin password at most once per run.
    pub fn capture_privilege(&mut self) -> Result<Privilege> {
        self.capture_privilege_with(running_as_root(), prompt_password, validate_sudo_password)
    }

    pub fn capture_privilege_with<P, V>(
        &mut self,
        is_root: bool,
        prompt: P,
        validate: V,
    ) -> Result<Privilege>
    where
        P: FnOnce() -> Result<String>,
        V: FnOnce(&str) -> Result<()>,
    {
        if let Some(privilege) = &self.privilege {
            return Ok(privilege.clone());
        }

        let privilege = if is_root {
            Privilege::Root
        } else {
            let password = prompt()?;
            validate(&password)?;
            Privilege::Sudo { password }
        };
        self.privilege = Some(privilege.clone());
        Ok(privilege)
    }
}

#[cfg(unix)]
pub fn running_as_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
pub fn running_as_root() -> bool {
    false
}

fn prompt_password() -> Result<String> {
    log::info!("root privileges are required to install packages");
    dialoguer::Password::new()
        .with_prompt("Password")
        .interact()
        .context("failed to read password")
}

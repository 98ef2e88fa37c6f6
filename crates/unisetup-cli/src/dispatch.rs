use anyhow::{anyhow, Result};
use unisetup_core::ReleaseStage;
use unisetup_fetch::HttpTransport;
use unisetup_installer::{
    default_state_root, discover_installs, PlistVersionReader, Privilege, StateLayout,
    SystemInstaller,
};

use crate::config::{load_config, ConfigOverrides, Settings};
use crate::context::RunContext;
use crate::flows::{
    apply_catalog_maintenance, list_versions, plan_versions, process_version, VersionOutcome,
    VersionRun,
};
use crate::render::{current_output_style, TerminalProgress};
use crate::Cli;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListVersions { stage: ReleaseStage },
    ListPackages,
    Download,
    Install,
    DownloadAndInstall,
}

impl Operation {
    pub fn downloads(self) -> bool {
        matches!(self, Self::Download | Self::DownloadAndInstall)
    }

    pub fn installs(self) -> bool {
        matches!(self, Self::Install | Self::DownloadAndInstall)
    }
}

pub fn select_operation(
    list: Option<&str>,
    has_versions: bool,
    packages: bool,
    download: bool,
    install: bool,
) -> Result<Operation> {
    if let Some(stage) = list {
        let stage =
            ReleaseStage::parse(stage).ok_or_else(|| anyhow!("unknown release stage '{stage}'"))?;
        return Ok(Operation::ListVersions { stage });
    }
    if !has_versions {
        return Ok(Operation::ListVersions {
            stage: ReleaseStage::Final,
        });
    }

    Ok(match (packages, download, install) {
        (true, _, _) => Operation::ListPackages,
        (false, true, false) => Operation::Download,
        (false, false, true) => Operation::Install,
        _ => Operation::DownloadAndInstall,
    })
}

/// The per-run choices taken from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunRequest {
    pub versions: Vec<String>,
    pub packages: Vec<String>,
    pub all_packages: bool,
    pub unity_defaults: bool,
    pub keep: bool,
    pub update: bool,
    pub save: bool,
    pub discover: Vec<String>,
    pub forget: Vec<String>,
}

impl RunRequest {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            versions: cli.versions.clone(),
            packages: cli.package.clone(),
            all_packages: cli.all_packages,
            unity_defaults: cli.unity_defaults,
            keep: cli.keep,
            update: cli.update,
            save: cli.save,
            discover: cli.discover.clone(),
            forget: cli.forget.clone(),
        }
    }
}

pub fn run_cli(cli: Cli) -> Result<()> {
    let operation = select_operation(
        cli.list.as_deref(),
        !cli.versions.is_empty(),
        cli.packages,
        cli.download,
        cli.install,
    )?;
    let request = RunRequest::from_cli(&cli);

    let state = StateLayout::new(default_state_root()?);
    state.ensure_base_dirs()?;
    let file_config = load_config(&state.config_path())?;
    let overrides = ConfigOverrides {
        package_store: cli.package_store.clone(),
        volume: cli.volume.clone(),
    };
    let settings = Settings::resolve(&file_config, &overrides)?;
    let mut ctx = RunContext::new(state, settings, current_output_style());

    let transport = HttpTransport::new(ctx.settings.download_timeout)?;
    let reader = PlistVersionReader;
    let mut catalog = ctx.open_catalog()?;

    apply_catalog_maintenance(&ctx, &mut catalog, &transport, &request)?;

    if let Operation::ListVersions { stage } = operation {
        for line in list_versions(&ctx, &mut catalog, &transport, &reader, stage, request.update)? {
            println!("{line}");
        }
        return Ok(());
    }

    let mut plan = plan_versions(&ctx, &mut catalog, &transport, &reader, &request, operation)?;

    if operation.installs() {
        ctx.capture_privilege()?;
    }
    let mut installer = SystemInstaller::new(ctx.privilege().cloned().unwrap_or(Privilege::Root));
    let mut progress = TerminalProgress::new(ctx.style);
    let run = VersionRun {
        ctx: &ctx,
        catalog: &catalog,
        transport: &transport,
        request: &request,
        operation,
    };

    for version in &plan.versions {
        let outcome = process_version(
            &run,
            version,
            &plan.installs,
            &mut installer,
            &mut progress,
        )?;
        if outcome == VersionOutcome::Processed && operation.installs() {
            plan.installs = discover_installs(&ctx.volume.applications_dir(), &reader)?;
        }
    }

    Ok(())
}

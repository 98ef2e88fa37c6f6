mod config;
mod context;
mod dispatch;
mod flows;
mod logger;
mod render;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use unisetup_core::{classify, UnisetupError};

use crate::dispatch::run_cli;
use crate::logger::{level_filter, TerminalLogger};
use crate::render::resolve_output_style;

#[derive(Parser, Debug)]
#[command(name = "unisetup", version)]
#[command(about = "Download and install Unity editor versions and components", long_about = None)]
struct Cli {
    /// Versions to process; partial versions such as 5.3 pick the newest match
    #[arg(value_name = "VERSION")]
    versions: Vec<String>,
    /// List the packages available for each version
    #[arg(long, conflicts_with_all = ["download", "install"])]
    packages: bool,
    /// Only download the packages
    #[arg(long, conflicts_with = "install")]
    download: bool,
    /// Only install already downloaded packages
    #[arg(long)]
    install: bool,
    /// Target volume for installation
    #[arg(long, value_name = "PATH")]
    volume: Option<PathBuf>,
    /// Package to process, may be given multiple times
    #[arg(short = 'p', long = "package", value_name = "NAME")]
    package: Vec<String>,
    /// Process every package, not only the default ones
    #[arg(long)]
    all_packages: bool,
    /// Directory that receives the "Unity Packages" download folder
    #[arg(long, value_name = "PATH")]
    package_store: Option<PathBuf>,
    /// Keep downloaded packages after installing
    #[arg(short, long)]
    keep: bool,
    /// Force refreshing the version catalog and package manifests
    #[arg(short, long)]
    update: bool,
    /// List known versions up to the given stage
    #[arg(
        short,
        long,
        value_name = "STAGE",
        value_parser = ["release", "patch", "beta", "alpha", "all"]
    )]
    list: Option<String>,
    /// Add the version behind a package or manifest URL
    #[arg(long, value_name = "URL")]
    discover: Vec<String>,
    /// Remove a version added with --discover
    #[arg(long, value_name = "VERSION")]
    forget: Vec<String>,
    /// Save the given --package list as the default selection
    #[arg(long)]
    save: bool,
    /// Ignore saved default packages
    #[arg(long)]
    unity_defaults: bool,
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    install_interrupt_handler();

    let cli = Cli::parse();
    let verbose = cli.verbose;
    let logger = TerminalLogger::new(
        resolve_output_style(std::io::stderr().is_terminal()),
        level_filter(cli.verbose, cli.quiet),
    );
    if let Err(err) = logger.install() {
        eprintln!("error: {err}");
    }

    match run_cli(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if verbose {
                eprintln!("error: {err:?}");
            } else {
                eprintln!("error: {err:#}");
            }
            ExitCode::from(classify(&err).map(UnisetupError::exit_code).unwrap_or(1))
        }
    }
}

#[cfg(unix)]
fn install_interrupt_handler() {
    extern "C" fn exit_quietly(_signal: libc::c_int) {
        unsafe { libc::_exit(0) }
    }

    let handler = exit_quietly as extern "C" fn(libc::c_int);
    unsafe {
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
fn install_interrupt_handler() {}

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{anyhow, Context, Result};

pub const INSTALLER_PATH: &str = "/usr/sbin/installer";
pub const SUDO_PATH: &str = "/usr/bin/sudo";

/// How the vendor installer gets root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Privilege {
    Root,
    Sudo { password: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerOutput {
    pub success: bool,
    pub output: String,
}

pub trait PackageInstaller {
    fn install_package(&mut self, package: &Path, volume: &Path) -> Result<InstallerOutput>;
}

/// Runs the system `installer`, through `sudo -S` unless already root.
pub struct SystemInstaller {
    privilege: Privilege,
}

impl SystemInstaller {
    pub fn new(privilege: Privilege) -> Self {
        Self { privilege }
    }
}

impl PackageInstaller for SystemInstaller {
    fn install_package(&mut self, package: &Path, volume: &Path) -> Result<InstallerOutput> {
        let mut command = build_installer_command(package, volume, &self.privilege);
        let stdin = match &self.privilege {
            Privilege::Root => None,
            Privilege::Sudo { password } => Some(format!("{password}\n")),
        };
        let (success, output) = run_with_stdin(&mut command, stdin.as_deref())
            .with_context(|| format!("failed to run installer for {}", package.display()))?;
        Ok(InstallerOutput { success, output })
    }
}

pub fn build_installer_command(package: &Path, volume: &Path, privilege: &Privilege) -> Command {
    let mut command = match privilege {
        Privilege::Root => Command::new(INSTALLER_PATH),
        Privilege::Sudo { .. } => {
            let mut command = Command::new(SUDO_PATH);
            command.arg("-S").arg(INSTALLER_PATH);
            command
        }
    };
    command
        .arg("-pkg")
        .arg(package)
        .arg("-target")
        .arg(volume)
        .arg("-verbose");
    command
}

pub fn build_sudo_reset_command() -> Command {
    let mut command = Command::new(SUDO_PATH);
    command.arg("-k");
    command
}

pub fn build_sudo_validate_command() -> Command {
    let mut command = Command::new(SUDO_PATH);
    command.arg("-S").arg("-p").arg("").arg("-v");
    command
}

/// Drops cached sudo credentials, then checks `password` against sudo.
pub fn validate_sudo_password(password: &str) -> Result<()> {
    let (reset, output) = run_with_stdin(&mut build_sudo_reset_command(), None)?;
    if !reset {
        return Err(anyhow!("failed to reset sudo credentials: {}", output.trim()));
    }
    let stdin = format!("{password}\n");
    let (valid, _) = run_with_stdin(&mut build_sudo_validate_command(), Some(&stdin))?;
    if !valid {
        return Err(anyhow!("user password invalid or user not an admin"));
    }
    Ok(())
}

// Runs to completion; stdout and stderr are returned joined.
fn run_with_stdin(command: &mut Command, stdin: Option<&str>) -> Result<(bool, String)> {
    command
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = command
        .spawn()
        .with_context(|| format!("command failed to start: {command:?}"))?;

    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(input.as_bytes())
            .context("failed to write to command stdin")?;
    }

    let output = child
        .wait_with_output()
        .with_context(|| format!("failed waiting for command: {command:?}"))?;
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok((output.status.success(), text))
}

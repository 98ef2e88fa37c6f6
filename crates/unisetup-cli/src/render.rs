use std::io::IsTerminal;
use std::time::{Duration, Instant};

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{ProgressBar, ProgressStyle};
use unisetup_core::{format_size, PackageDescriptor, PackageManifest, ReleaseStage};
use unisetup_fetch::{percent, ProgressSink};
use unisetup_installer::InstalledVersions;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputStyle {
    Plain,
    Rich,
}

pub fn resolve_output_style(stdout_is_tty: bool) -> OutputStyle {
    if stdout_is_tty {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

pub fn current_output_style() -> OutputStyle {
    resolve_output_style(std::io::stdout().is_terminal())
}

pub fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => format!("{} {message}", status_badge(status)),
    }
}

fn status_badge(status: &str) -> &'static str {
    match status {
        "ok" => "[OK]",
        "warn" => "[WARN]",
        "err" => "[ERR]",
        "debug" => "[DBG]",
        _ => "[..]",
    }
}

pub fn render_section_header(style: OutputStyle, title: &str) -> String {
    let line = format!("== {title} ==");
    match style {
        OutputStyle::Plain => line,
        OutputStyle::Rich => colorize(section_style(), &line),
    }
}

pub fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

pub fn badge_style(status: &str) -> Style {
    let color = match status {
        "ok" => AnsiColor::BrightGreen,
        "warn" => AnsiColor::BrightYellow,
        "err" => AnsiColor::BrightRed,
        _ => AnsiColor::BrightBlack,
    };
    Style::new().fg_color(Some(color.into()))
}

/// Catalog versions grouped by `major.minor`, newest group first.
pub fn format_version_listing(
    style: OutputStyle,
    stage: ReleaseStage,
    groups: &[(String, Vec<String>)],
) -> Vec<String> {
    if groups.is_empty() {
        return vec![format!("no known {} versions", stage.as_str())];
    }

    let mut lines = Vec::new();
    for (series, versions) in groups {
        lines.push(render_section_header(style, series));
        lines.push(format!("  {}", versions.join(", ")));
    }
    lines
}

pub fn format_installed_lines(installs: &InstalledVersions) -> Vec<String> {
    if installs.is_empty() {
        return vec!["no Unity installations found".to_string()];
    }

    installs
        .iter()
        .map(|(version, path)| format!("Unity {version} at {}", path.display()))
        .collect()
}

pub fn format_package_listing(version: &str, manifest: &PackageManifest) -> Vec<String> {
    let mut lines = vec![format!("packages available for Unity {version}:")];
    for package in manifest.packages() {
        let default_marker = if package.install_by_default { "*" } else { " " };
        lines.push(format!(
            " {default_marker} {:<28} {:>10} download, {:>10} installed",
            package.name,
            format_size(package.size_bytes),
            format_size(package.installed_size_bytes),
        ));
    }
    lines.push("packages marked with * install by default".to_string());
    lines
}

pub fn format_selection_summary(
    version: &str,
    selection: &[PackageDescriptor],
    download_size: Option<u64>,
    install_size: Option<u64>,
) -> Vec<String> {
    let names: Vec<&str> = selection
        .iter()
        .map(|package| package.name.as_str())
        .collect();
    let mut lines = vec![format!("Unity {version}: {}", names.join(", "))];
    if let Some(size) = download_size {
        lines.push(format!("  download size: {}", format_size(size)));
    }
    if let Some(size) = install_size {
        lines.push(format!("  install size: {}", format_size(size)));
    }
    lines
}

/// One frame of a download bar, e.g. `[=====>----] 54.20% | 1.21 MB/s`.
pub fn render_download_line(done: u64, total: u64, bytes_per_sec: Option<f64>) -> String {
    let width = 20_usize;
    let ratio = percent(done, total) / 100.0;
    let filled = ((ratio * width as f64) as usize).min(width);
    let mut bar = "=".repeat(filled);
    if filled < width {
        bar.push('>');
        bar.push_str(&"-".repeat(width - filled - 1));
    }
    let speed = bytes_per_sec
        .map(|rate| format!("{}/s", format_size(rate as u64)))
        .unwrap_or_else(|| "--".to_string());
    format!("[{bar}] {:>6.2}% | {speed}", percent(done, total))
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    format!("{secs}.{millis:03}s")
}

/// Terminal download progress: an indicatif bar in rich mode, start and
/// finish lines only in plain mode.
pub struct TerminalProgress {
    style: OutputStyle,
    label: String,
    total: u64,
    current: u64,
    progress_bar: Option<ProgressBar>,
    started_at: Instant,
}

impl TerminalProgress {
    pub fn new(style: OutputStyle) -> Self {
        Self {
            style,
            label: String::new(),
            total: 0,
            current: 0,
            progress_bar: None,
            started_at: Instant::now(),
        }
    }

    fn clear_bar(&mut self) {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.finish_and_clear();
        }
    }
}

impl ProgressSink for TerminalProgress {
    fn start(&mut self, file_name: &str, total: u64, resumed_from: u64) {
        self.clear_bar();
        self.label = file_name.to_string();
        self.total = total;
        self.current = resumed_from;
        self.started_at = Instant::now();

        let verb = if resumed_from > 0 { "resuming" } else { "downloading" };
        match self.style {
            OutputStyle::Plain => println!("{verb} {file_name} ({})", format_size(total)),
            OutputStyle::Rich => {
                let progress_bar = ProgressBar::new(total.max(1));
                if let Ok(style) = ProgressStyle::with_template("{prefix:.cyan.bold} {msg}") {
                    progress_bar.set_style(style);
                }
                progress_bar.set_prefix(format!("{verb} {file_name}"));
                progress_bar.set_position(resumed_from.min(total));
                progress_bar.set_message(render_download_line(resumed_from, total, None));
                progress_bar.enable_steady_tick(Duration::from_millis(120));
                self.progress_bar = Some(progress_bar);
            }
        }
    }

    fn advance(&mut self, downloaded: u64, bytes_per_sec: Option<f64>) {
        self.current = downloaded.min(self.total);
        let Some(progress_bar) = &self.progress_bar else {
            return;
        };

        progress_bar.set_position(self.current);
        progress_bar.set_message(render_download_line(
            self.current,
            self.total,
            bytes_per_sec,
        ));
    }

    // Also called after a failed attempt; only a full transfer is reported.
    fn finish(&mut self) {
        self.clear_bar();
        if self.current < self.total {
            return;
        }
        let line = format!(
            "{} ({}) complete in {}",
            self.label,
            format_size(self.total),
            format_elapsed(self.started_at.elapsed())
        );
        println!("{}", render_status_line(self.style, "ok", &line));
    }
}

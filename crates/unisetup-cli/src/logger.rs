use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::render::{badge_style, colorize, render_status_line, OutputStyle};

/// Routes library log records to stderr as status lines.
pub struct TerminalLogger {
    style: OutputStyle,
    level: LevelFilter,
}

impl TerminalLogger {
    pub fn new(style: OutputStyle, level: LevelFilter) -> Self {
        Self { style, level }
    }

    pub fn install(self) -> anyhow::Result<()> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))
            .map_err(|err| anyhow::anyhow!("failed to install logger: {err}"))?;
        log::set_max_level(level);
        Ok(())
    }
}

pub fn level_filter(verbose: bool, quiet: bool) -> LevelFilter {
    match (verbose, quiet) {
        (true, _) => LevelFilter::Debug,
        (false, true) => LevelFilter::Warn,
        (false, false) => LevelFilter::Info,
    }
}

pub fn format_log_line(style: OutputStyle, level: Level, message: &str) -> String {
    let status = match level {
        Level::Error => "err",
        Level::Warn => "warn",
        Level::Info => "info",
        Level::Debug | Level::Trace => "debug",
    };

    match style {
        OutputStyle::Rich => {
            let line = render_status_line(style, status, message);
            match line.split_once(' ') {
                Some((badge, rest)) => format!("{} {rest}", colorize(badge_style(status), badge)),
                None => line,
            }
        }
        OutputStyle::Plain => match level {
            Level::Error => format!("error: {message}"),
            Level::Warn => format!("warning: {message}"),
            Level::Info => message.to_string(),
            Level::Debug | Level::Trace => format!("debug: {message}"),
        },
    }
}

impl Log for TerminalLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        eprintln!(
            "{}",
            format_log_line(self.style, record.level(), &record.args().to_string())
        );
    }

    fn flush(&self) {}
}

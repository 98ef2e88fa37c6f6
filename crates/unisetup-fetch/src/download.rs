use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use unisetup_core::UnisetupError;
use unisetup_security::verify_md5_file;

use crate::progress::{ProgressSink, ThroughputWindow};
use crate::transport::Transport;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_WAIT: Duration = Duration::from_secs(10);
pub const DEFAULT_BLOCK_SIZE: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadPolicy {
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    pub retry_wait: Duration,
    pub block_size: usize,
}

impl Default for DownloadPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_wait: DEFAULT_RETRY_WAIT,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DownloadRequest<'a> {
    pub url: &'a str,
    pub output: &'a Path,
    pub expected_size: u64,
    pub md5: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    AlreadyComplete,
    /// The file on disk is larger than the manifest says; it is left alone.
    Oversized { actual_size: u64 },
    Downloaded { attempts: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingFile {
    Missing,
    Partial(u64),
    Complete,
    Oversized(u64),
}

pub fn inspect_existing(path: &Path, expected_size: u64) -> Result<ExistingFile> {
    let size = match fs::metadata(path) {
        Ok(metadata) => metadata.len(),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(ExistingFile::Missing),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to inspect {}", path.display()))
        }
    };
    Ok(match size {
        0 => ExistingFile::Missing,
        size if size == expected_size => ExistingFile::Complete,
        size if size > expected_size => ExistingFile::Oversized(size),
        size => ExistingFile::Partial(size),
    })
}

pub fn download_file(
    transport: &dyn Transport,
    request: &DownloadRequest<'_>,
    policy: &DownloadPolicy,
    progress: &mut dyn ProgressSink,
) -> Result<DownloadOutcome> {
    download_file_with_sleeper(transport, request, policy, progress, std::thread::sleep)
}

pub fn download_file_with_sleeper(
    transport: &dyn Transport,
    request: &DownloadRequest<'_>,
    policy: &DownloadPolicy,
    progress: &mut dyn ProgressSink,
    mut sleep: impl FnMut(Duration),
) -> Result<DownloadOutcome> {
    let file = display_name(request.output);

    match inspect_existing(request.output, request.expected_size)? {
        ExistingFile::Complete => {
            log::info!("{file} already downloaded");
            verify_download(request)?;
            return Ok(DownloadOutcome::AlreadyComplete);
        }
        ExistingFile::Oversized(actual_size) => {
            log::warn!(
                "{file} is larger than expected ({actual_size} > {} bytes), not downloading again",
                request.expected_size
            );
            verify_download(request)?;
            return Ok(DownloadOutcome::Oversized { actual_size });
        }
        ExistingFile::Partial(size) => {
            log::info!("resuming download of {file} at {size} bytes");
        }
        ExistingFile::Missing => {}
    }

    if let Some(parent) = request.output.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create download dir: {}", parent.display()))?;
    }

    let budget = policy.max_retries + 1;
    let mut attempt = 1;
    loop {
        match fetch_remaining(transport, request, policy, progress) {
            Ok(()) => break,
            Err(err) if attempt < budget => {
                log::warn!(
                    "download of {file} failed ({err:#}), retrying in {}s",
                    policy.retry_wait.as_secs()
                );
                sleep(policy.retry_wait);
                attempt += 1;
            }
            Err(err) => {
                return Err(UnisetupError::Download {
                    file,
                    attempts: attempt,
                    reason: format!("{err:#}"),
                }
                .into());
            }
        }
    }

    verify_download(request)?;
    Ok(DownloadOutcome::Downloaded { attempts: attempt })
}

// One attempt: append from the current on-disk size until the body ends.
fn fetch_remaining(
    transport: &dyn Transport,
    request: &DownloadRequest<'_>,
    policy: &DownloadPolicy,
    progress: &mut dyn ProgressSink,
) -> Result<()> {
    let existing = match inspect_existing(request.output, request.expected_size)? {
        ExistingFile::Missing => 0,
        ExistingFile::Partial(size) => size,
        ExistingFile::Complete => return Ok(()),
        ExistingFile::Oversized(size) => {
            warn_oversized(request, size);
            return Ok(());
        }
    };

    let body = transport.open_range(request.url, existing)?;
    let restart = body.offset == 0;
    let mut reader = body.reader;
    let mut output = OpenOptions::new()
        .create(true)
        .write(true)
        .append(!restart)
        .truncate(restart)
        .open(request.output)
        .with_context(|| format!("failed to open {}", request.output.display()))?;

    let mut downloaded = body.offset;
    let mut window = ThroughputWindow::new(Instant::now());
    let mut speed = None;
    let mut buffer = vec![0_u8; policy.block_size.max(1)];
    progress.start(&display_name(request.output), request.expected_size, downloaded);

    let result = loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break Ok(()),
            Ok(read) => read,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => break Err(anyhow!(err).context("connection dropped")),
        };
        if let Err(err) = output.write_all(&buffer[..read]) {
            break Err(anyhow!(err)
                .context(format!("failed to write {}", request.output.display())));
        }
        downloaded += read as u64;
        if let Some(fresh) = window.record(Instant::now(), read as u64) {
            speed = Some(fresh);
        }
        progress.advance(downloaded, speed);
    };
    progress.finish();
    result?;

    output
        .flush()
        .with_context(|| format!("failed to flush {}", request.output.display()))?;

    if downloaded < request.expected_size {
        return Err(anyhow!(
            "short read: got {downloaded} of {} bytes",
            request.expected_size
        ));
    }
    if downloaded > request.expected_size {
        warn_oversized(request, downloaded);
    }
    Ok(())
}

// More data than the manifest lists is not retried; the hash check decides.
fn warn_oversized(request: &DownloadRequest<'_>, size: u64) {
    log::warn!(
        "received {size} bytes for {}, more than the expected {}",
        display_name(request.output),
        request.expected_size
    );
}

pub fn verify_download(request: &DownloadRequest<'_>) -> Result<()> {
    let file = display_name(request.output);
    let Some(expected) = request.md5 else {
        log::warn!("no md5 hash for {file}, accepting it unverified");
        return Ok(());
    };

    log::debug!("verifying md5 of {file}");
    let (matched, actual) = verify_md5_file(request.output, expected)?;
    if !matched {
        return Err(UnisetupError::Integrity {
            file,
            expected: expected.to_string(),
            actual,
        }
        .into());
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

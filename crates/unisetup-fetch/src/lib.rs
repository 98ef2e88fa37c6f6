mod download;
mod progress;
mod transport;

pub use download::{
    download_file, download_file_with_sleeper, inspect_existing, verify_download,
    DownloadOutcome, DownloadPolicy, DownloadRequest, ExistingFile, DEFAULT_BLOCK_SIZE,
    DEFAULT_MAX_RETRIES, DEFAULT_RETRY_WAIT,
};
pub use progress::{
    percent, NoProgress, ProgressSink, ThroughputWindow, RECOMPUTE_INTERVAL, WINDOW_BLOCKS,
};
pub use transport::{HttpTransport, RangeBody, Transport};

#[cfg(test)]
mod tests;

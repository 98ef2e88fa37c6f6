use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::io::{self, Cursor, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use anyhow::Result;
use unisetup_core::{classify, UnisetupError};
use unisetup_security::md5_hex;

use super::*;

const URL: &str = "https://download.example.test/abcdef012345/MacEditorInstaller/Unity.pkg";

#[derive(Debug, Clone, Copy)]
enum Plan {
    Full,
    // Sends this many bytes, then ends the body cleanly.
    Truncate(usize),
    // Sends this many bytes, then fails the read.
    DropAfter(usize),
    Refuse,
}

struct FakeTransport {
    content: Vec<u8>,
    honour_range: bool,
    plans: RefCell<VecDeque<Plan>>,
    offsets: RefCell<Vec<u64>>,
}

impl FakeTransport {
    fn new(content: Vec<u8>, plans: &[Plan]) -> Self {
        Self {
            content,
            honour_range: true,
            plans: RefCell::new(plans.iter().copied().collect()),
            offsets: RefCell::new(Vec::new()),
        }
    }

    fn offsets(&self) -> Vec<u64> {
        self.offsets.borrow().clone()
    }
}

struct DroppingReader {
    data: Cursor<Vec<u8>>,
}

impl Read for DroppingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.data.read(buf)? {
            0 => Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer")),
            read => Ok(read),
        }
    }
}

impl Transport for FakeTransport {
    fn fetch_text(&self, url: &str) -> Result<String> {
        Err(UnisetupError::fetch(url, "not served").into())
    }

    fn probe(&self, url: &str) -> Result<()> {
        Err(UnisetupError::fetch(url, "not served").into())
    }

    fn open_range(&self, url: &str, offset: u64) -> Result<RangeBody> {
        self.offsets.borrow_mut().push(offset);
        let plan = self.plans.borrow_mut().pop_front().unwrap_or(Plan::Full);
        let start = if self.honour_range { offset } else { 0 };
        let rest = self.content[start as usize..].to_vec();
        let reader: Box<dyn Read> = match plan {
            Plan::Full => Box::new(Cursor::new(rest)),
            Plan::Truncate(len) => Box::new(Cursor::new(rest[..len.min(rest.len())].to_vec())),
            Plan::DropAfter(len) => Box::new(DroppingReader {
                data: Cursor::new(rest[..len.min(rest.len())].to_vec()),
            }),
            Plan::Refuse => return Err(UnisetupError::fetch(url, "connection refused").into()),
        };
        Ok(RangeBody {
            reader,
            offset: start,
        })
    }
}

#[derive(Default)]
struct RecordingProgress {
    starts: Vec<(String, u64, u64)>,
    last_downloaded: u64,
    finishes: usize,
}

impl ProgressSink for RecordingProgress {
    fn start(&mut self, file_name: &str, total_bytes: u64, resumed_from: u64) {
        self.starts
            .push((file_name.to_string(), total_bytes, resumed_from));
    }

    fn advance(&mut self, downloaded_bytes: u64, _bytes_per_sec: Option<f64>) {
        self.last_downloaded = downloaded_bytes;
    }

    fn finish(&mut self) {
        self.finishes += 1;
    }
}

static TEST_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_dir() -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let sequence = TEST_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!(
        "unisetup-fetch-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        sequence
    ));
    fs::create_dir_all(&path).expect("must create test dir");
    path
}

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|index| (index % 251) as u8).collect()
}

fn quick_policy() -> DownloadPolicy {
    DownloadPolicy {
        block_size: 16,
        ..DownloadPolicy::default()
    }
}

#[test]
fn default_policy_matches_vendor_download_behaviour() {
    let policy = DownloadPolicy::default();
    assert_eq!(policy.max_retries, 3);
    assert_eq!(policy.retry_wait, Duration::from_secs(10));
    assert_eq!(policy.block_size, 8192);
}

#[test]
fn inspect_existing_classifies_sizes() {
    let root = test_dir();
    let path = root.join("Unity.pkg");
    assert_eq!(inspect_existing(&path, 10).expect("must inspect"), ExistingFile::Missing);

    fs::write(&path, b"").expect("must write");
    assert_eq!(inspect_existing(&path, 10).expect("must inspect"), ExistingFile::Missing);

    fs::write(&path, b"abc").expect("must write");
    assert_eq!(inspect_existing(&path, 10).expect("must inspect"), ExistingFile::Partial(3));
    assert_eq!(inspect_existing(&path, 3).expect("must inspect"), ExistingFile::Complete);
    assert_eq!(inspect_existing(&path, 2).expect("must inspect"), ExistingFile::Oversized(3));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn resumes_partial_file_with_range_request() {
    let root = test_dir();
    let output = root.join("Unity.pkg");
    let content = payload(100);
    fs::write(&output, &content[..40]).expect("must seed partial file");
    let digest = md5_hex(&content);

    let transport = FakeTransport::new(content.clone(), &[]);
    let mut progress = RecordingProgress::default();
    let request = DownloadRequest {
        url: URL,
        output: &output,
        expected_size: 100,
        md5: Some(&digest),
    };
    let outcome = download_file_with_sleeper(&transport, &request, &quick_policy(), &mut progress, |_| {
        panic!("must not wait between attempts")
    })
    .expect("resume must succeed");

    assert_eq!(outcome, DownloadOutcome::Downloaded { attempts: 1 });
    assert_eq!(transport.offsets(), vec![40]);
    assert_eq!(fs::read(&output).expect("must read output"), content);
    assert_eq!(progress.starts, vec![("Unity.pkg".to_string(), 100, 40)]);
    assert_eq!(progress.last_downloaded, 100);
    assert_eq!(progress.finishes, 1);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn retries_from_on_disk_size_after_connection_drop() {
    let root = test_dir();
    let output = root.join("nested").join("Unity.pkg");
    let content = payload(100);

    let transport = FakeTransport::new(content.clone(), &[Plan::DropAfter(30), Plan::Full]);
    let mut waits = Vec::new();
    let request = DownloadRequest {
        url: URL,
        output: &output,
        expected_size: 100,
        md5: None,
    };
    let outcome = download_file_with_sleeper(
        &transport,
        &request,
        &quick_policy(),
        &mut NoProgress,
        |wait| waits.push(wait),
    )
    .expect("second attempt must succeed");

    assert_eq!(outcome, DownloadOutcome::Downloaded { attempts: 2 });
    assert_eq!(transport.offsets(), vec![0, 30]);
    assert_eq!(waits, vec![Duration::from_secs(10)]);
    assert_eq!(fs::read(&output).expect("must read output"), content);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn exhausting_retry_budget_is_a_download_error() {
    let root = test_dir();
    let output = root.join("Unity.pkg");
    let content = payload(100);

    let transport = FakeTransport::new(
        content,
        &[
            Plan::Truncate(10),
            Plan::Truncate(10),
            Plan::Refuse,
            Plan::Truncate(10),
        ],
    );
    let mut waits = 0;
    let request = DownloadRequest {
        url: URL,
        output: &output,
        expected_size: 100,
        md5: None,
    };
    let err = download_file_with_sleeper(
        &transport,
        &request,
        &quick_policy(),
        &mut NoProgress,
        |_| waits += 1,
    )
    .expect_err("budget must run out");

    match classify(&err) {
        Some(UnisetupError::Download { file, attempts, .. }) => {
            assert_eq!(file, "Unity.pkg");
            assert_eq!(*attempts, 4);
        }
        other => panic!("expected download error, got {other:?}"),
    }
    assert_eq!(waits, 3);
    assert_eq!(transport.offsets(), vec![0, 10, 20, 20]);
    assert_eq!(fs::metadata(&output).expect("partial file stays").len(), 30);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn complete_file_is_verified_without_network() {
    let root = test_dir();
    let output = root.join("Unity.pkg");
    let content = payload(64);
    fs::write(&output, &content).expect("must seed file");
    let digest = md5_hex(&content);

    let transport = FakeTransport::new(content, &[Plan::Refuse]);
    let request = DownloadRequest {
        url: URL,
        output: &output,
        expected_size: 64,
        md5: Some(&digest),
    };
    let outcome = download_file(&transport, &request, &quick_policy(), &mut NoProgress)
        .expect("complete file must be accepted");
    assert_eq!(outcome, DownloadOutcome::AlreadyComplete);
    assert!(transport.offsets().is_empty());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn oversized_file_is_left_alone_but_still_hash_checked() {
    let root = test_dir();
    let output = root.join("Unity.pkg");
    fs::write(&output, payload(80)).expect("must seed file");

    let transport = FakeTransport::new(payload(64), &[]);
    let unverified = DownloadRequest {
        url: URL,
        output: &output,
        expected_size: 64,
        md5: None,
    };
    let outcome = download_file(&transport, &unverified, &quick_policy(), &mut NoProgress)
        .expect("oversized file is not fatal without a hash");
    assert_eq!(outcome, DownloadOutcome::Oversized { actual_size: 80 });
    assert!(transport.offsets().is_empty());

    let expected = md5_hex(&payload(64));
    let verified = DownloadRequest {
        md5: Some(&expected),
        ..unverified
    };
    let err = download_file(&transport, &verified, &quick_policy(), &mut NoProgress)
        .expect_err("oversized file cannot match the manifest hash");
    assert!(matches!(classify(&err), Some(UnisetupError::Integrity { .. })));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn longer_body_than_expected_is_accepted_without_retry() {
    let root = test_dir();
    let output = root.join("Unity.pkg");
    let content = payload(80);

    let transport = FakeTransport::new(content.clone(), &[]);
    let request = DownloadRequest {
        url: URL,
        output: &output,
        expected_size: 64,
        md5: None,
    };
    let outcome = download_file_with_sleeper(
        &transport,
        &request,
        &quick_policy(),
        &mut NoProgress,
        |_| panic!("must not wait between attempts"),
    )
    .expect("extra bytes are left to the hash check");

    assert_eq!(outcome, DownloadOutcome::Downloaded { attempts: 1 });
    assert_eq!(transport.offsets(), vec![0]);
    assert_eq!(fs::read(&output).expect("must read output"), content);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn longer_body_than_expected_still_fails_hash_check() {
    let root = test_dir();
    let output = root.join("Unity.pkg");
    let content = payload(80);
    let digest = md5_hex(&content[..64]);

    let transport = FakeTransport::new(content, &[]);
    let request = DownloadRequest {
        url: URL,
        output: &output,
        expected_size: 64,
        md5: Some(&digest),
    };
    let err = download_file_with_sleeper(
        &transport,
        &request,
        &quick_policy(),
        &mut NoProgress,
        |_| panic!("must not wait between attempts"),
    )
    .expect_err("extra bytes change the hash");

    assert!(matches!(classify(&err), Some(UnisetupError::Integrity { .. })));
    assert_eq!(transport.offsets(), vec![0]);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn hash_mismatch_after_download_is_an_integrity_error() {
    let root = test_dir();
    let output = root.join("Unity.pkg");
    let transport = FakeTransport::new(payload(50), &[]);
    let request = DownloadRequest {
        url: URL,
        output: &output,
        expected_size: 50,
        md5: Some("00000000000000000000000000000000"),
    };
    let err = download_file(&transport, &request, &quick_policy(), &mut NoProgress)
        .expect_err("mismatch must fail");
    match classify(&err) {
        Some(UnisetupError::Integrity { file, expected, actual }) => {
            assert_eq!(file, "Unity.pkg");
            assert_eq!(expected, "00000000000000000000000000000000");
            assert_eq!(actual, &md5_hex(&payload(50)));
        }
        other => panic!("expected integrity error, got {other:?}"),
    }

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn server_ignoring_range_restarts_from_scratch() {
    let root = test_dir();
    let output = root.join("Unity.pkg");
    let content = payload(90);
    fs::write(&output, &content[..25]).expect("must seed partial file");

    let mut transport = FakeTransport::new(content.clone(), &[]);
    transport.honour_range = false;
    let request = DownloadRequest {
        url: URL,
        output: &output,
        expected_size: 90,
        md5: None,
    };
    download_file(&transport, &request, &quick_policy(), &mut NoProgress)
        .expect("restart must succeed");
    assert_eq!(transport.offsets(), vec![25]);
    assert_eq!(fs::read(&output).expect("must read output"), content);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn throughput_window_recomputes_at_interval() {
    let start = Instant::now();
    let mut window = ThroughputWindow::new(start);

    let first = window
        .record(start + Duration::from_millis(100), 1000)
        .expect("first block computes a speed");
    assert!((first - 10_000.0).abs() < 1e-6);

    assert_eq!(window.record(start + Duration::from_millis(200), 1000), None);

    let later = window
        .record(start + Duration::from_millis(700), 1000)
        .expect("interval elapsed");
    assert!((later - 3000.0 / 0.7).abs() < 1e-6);
}

#[test]
fn throughput_window_keeps_only_recent_blocks() {
    let start = Instant::now();
    let mut window = ThroughputWindow::with_limits(start, 2, Duration::ZERO);
    window.record(start + Duration::from_secs(10), 10);
    window.record(start + Duration::from_secs(11), 1000);
    let speed = window
        .record(start + Duration::from_secs(12), 1000)
        .expect("zero interval always recomputes");
    assert!((speed - 1000.0).abs() < 1e-6);
}

#[test]
fn percent_is_bounded() {
    assert_eq!(percent(0, 0), 100.0);
    assert_eq!(percent(50, 200), 25.0);
    assert_eq!(percent(300, 200), 100.0);
}

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use md5::{Digest, Md5};

const READ_CHUNK: usize = 64 * 1024;

pub fn md5_hex(bytes: &[u8]) -> String {
    hex::encode(Md5::digest(bytes))
}

pub fn md5_hex_reader(reader: &mut impl Read) -> Result<String> {
    let mut hasher = Md5::new();
    let mut buffer = vec![0_u8; READ_CHUNK];
    loop {
        let read = reader
            .read(&mut buffer)
            .context("failed to read data for md5 digest")?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn md5_hex_file(path: &Path) -> Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    md5_hex_reader(&mut file).with_context(|| format!("failed to hash {}", path.display()))
}

/// Returns the actual digest alongside whether it matches `expected_hex`.
pub fn verify_md5_file(path: &Path, expected_hex: &str) -> Result<(bool, String)> {
    let actual = md5_hex_file(path)?;
    Ok((actual.eq_ignore_ascii_case(expected_hex.trim()), actual))
}

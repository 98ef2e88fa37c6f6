mod checksum;

pub use checksum::{md5_hex, md5_hex_file, md5_hex_reader, verify_md5_file};

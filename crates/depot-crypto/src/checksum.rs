use std::io::{self, Read, Write};

use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest.
pub const CHECKSUM_HEX_LEN: usize = 64;

/// SHA-256 content hasher producing lowercase hex digests.
///
/// The digest is always computed over raw bytes with no framing or domain
/// prefix, so a checksum recorded by Depot matches `sha256sum` run on the
/// stored file.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContentHasher;

impl ContentHasher {
    /// Hash a byte slice.
    pub fn hash(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    /// Hash everything a reader yields. Returns the digest and the number of
    /// bytes consumed.
    pub fn hash_reader<R: Read + ?Sized>(reader: &mut R) -> Result<(String, u64), ChecksumError> {
        let mut writer = ChecksumWriter::new();
        let read = io::copy(reader, &mut writer)?;
        Ok((writer.finalize(), read))
    }

    /// Verify that data produces the expected digest (case-insensitive).
    pub fn verify(data: &[u8], expected: &str) -> bool {
        Self::hash(data).eq_ignore_ascii_case(expected)
    }

    /// Returns `true` if `s` looks like a hex SHA-256 digest.
    pub fn is_well_formed(s: &str) -> bool {
        s.len() == CHECKSUM_HEX_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
    }
}

/// An [`io::Write`] sink that hashes and counts everything written to it.
#[derive(Clone, Default)]
pub struct ChecksumWriter {
    hasher: Sha256,
    written: u64,
}

impl ChecksumWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes hashed so far.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Consume the writer and return the hex digest.
    pub fn finalize(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

impl Write for ChecksumWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.hasher.update(buf);
        self.written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Errors from checksum operations.
#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
    #[error("I/O error while hashing: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
    const ABC: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    #[test]
    fn known_digests() {
        assert_eq!(ContentHasher::hash(b""), EMPTY);
        assert_eq!(ContentHasher::hash(b"abc"), ABC);
    }

    #[test]
    fn reader_and_slice_agree() {
        let data = b"hello world";
        let (digest, read) = ContentHasher::hash_reader(&mut &data[..]).unwrap();
        assert_eq!(read, 11);
        assert_eq!(digest, ContentHasher::hash(data));
        assert_eq!(
            digest,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn writer_hashes_across_chunks() {
        let mut writer = ChecksumWriter::new();
        writer.write_all(b"APPEND TO ME\n").unwrap();
        writer.write_all(b"THESE THINGS YOU SEE\n").unwrap();
        assert_eq!(writer.bytes_written(), 34);
        assert_eq!(
            writer.finalize(),
            "da711a5fd60b670b8afbdc39b1eec97a9755addfbe6dc736804ab3d8c552c001"
        );
    }

    #[test]
    fn verify_is_case_insensitive() {
        assert!(ContentHasher::verify(b"abc", &ABC.to_uppercase()));
        assert!(!ContentHasher::verify(b"abd", ABC));
    }

    #[test]
    fn well_formed_digests() {
        assert!(ContentHasher::is_well_formed(EMPTY));
        assert!(!ContentHasher::is_well_formed("abc"));
        assert!(!ContentHasher::is_well_formed(&"zz".repeat(32)));
    }
}

//! Tarball entry location.
//!
//! npm tarballs are gzip-compressed POSIX tar archives with a single
//! top-level directory; the manifest lives at `<dir>/package.json`.
//! Re-packed archives can contain several entries matching that pattern, and
//! the last one is authoritative; npm's own tooling behaves this way.
//!
//! Tar streams are forward-only, so a single entry cannot be fetched by
//! scanning backwards. The locator therefore runs two passes: a scan over
//! cheap header info that selects the last matching entry (the reverse-order
//! winner), then a rewind and forward scan that materializes exactly that
//! entry. This two-phase shape is inherent to the format, not an
//! optimization target.

use crate::error::ExtractionError;
use flate2::read::GzDecoder;
use std::io::{Read, Seek, SeekFrom};
use tar::Archive;

/// A located and materialized manifest entry.
#[derive(Clone, Debug)]
pub struct ManifestEntry {
    pub path: String,
    pub contents: Vec<u8>,
}

/// Locate the authoritative `package.json` entry in a gzip tar stream.
///
/// Fails with [`ExtractionError::ManifestNotFound`] when no entry matches
/// and [`ExtractionError::EntryTooLarge`] when the winning entry exceeds
/// `max_size`.
pub fn locate_manifest<R: Read + Seek>(
    reader: &mut R,
    max_size: u64,
) -> Result<ManifestEntry, ExtractionError> {
    // Phase 1: headers only; the last match wins.
    reader.seek(SeekFrom::Start(0))?;
    let mut archive = Archive::new(GzDecoder::new(&mut *reader));
    let mut winner: Option<(usize, u64)> = None;
    for (index, entry) in archive.entries()?.enumerate() {
        let entry = entry?;
        if is_manifest_path(&entry_path(&entry)) {
            winner = Some((index, entry.size()));
        }
    }

    let (winner_index, header_size) = winner.ok_or(ExtractionError::ManifestNotFound)?;
    if header_size > max_size {
        return Err(ExtractionError::EntryTooLarge {
            size: header_size,
            max: max_size,
        });
    }

    // Phase 2: rewind and forward-scan to the winning entry.
    reader.seek(SeekFrom::Start(0))?;
    let mut archive = Archive::new(GzDecoder::new(&mut *reader));
    for (index, entry) in archive.entries()?.enumerate() {
        let mut entry = entry?;
        if index != winner_index {
            continue;
        }
        let path = entry_path(&entry);
        let mut contents = Vec::with_capacity(header_size as usize);
        // The header size is advisory; cap the actual read as well.
        (&mut entry).take(max_size + 1).read_to_end(&mut contents)?;
        if contents.len() as u64 > max_size {
            return Err(ExtractionError::EntryTooLarge {
                size: contents.len() as u64,
                max: max_size,
            });
        }
        return Ok(ManifestEntry { path, contents });
    }

    // The stream shrank between passes; treat it like a missing entry.
    Err(ExtractionError::ManifestNotFound)
}

/// Entry path, falling back to the raw header bytes when the structured
/// accessor rejects a malformed-but-recoverable header.
fn entry_path<R: Read>(entry: &tar::Entry<'_, R>) -> String {
    match entry.path() {
        Ok(path) => path.to_string_lossy().into_owned(),
        Err(_) => String::from_utf8_lossy(&entry.header().path_bytes()).into_owned(),
    }
}

/// `<anything-without-slash>/package.json`, after stripping a leading `./`.
fn is_manifest_path(path: &str) -> bool {
    let path = path.strip_prefix("./").unwrap_or(path);
    match path.split_once('/') {
        Some((dir, rest)) => !dir.is_empty() && rest == "package.json",
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Cursor;

    fn tarball(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (path, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    const MAX: u64 = 4 * 1024 * 1024;

    #[test]
    fn test_single_manifest_found() {
        let data = tarball(&[("package/package.json", br#"{"name":"foo"}"#)]);
        let entry = locate_manifest(&mut Cursor::new(data), MAX).unwrap();
        assert_eq!(entry.path, "package/package.json");
        assert_eq!(entry.contents, br#"{"name":"foo"}"#);
    }

    #[test]
    fn test_last_matching_entry_wins() {
        let data = tarball(&[
            ("a/package.json", br#"{"name":"first"}"#),
            ("a/index.js", b"module.exports = 1;"),
            ("b/package.json", br#"{"name":"second"}"#),
        ]);
        let entry = locate_manifest(&mut Cursor::new(data), MAX).unwrap();
        assert_eq!(entry.path, "b/package.json");
        assert_eq!(entry.contents, br#"{"name":"second"}"#);
    }

    #[test]
    fn test_no_manifest_is_fatal() {
        let data = tarball(&[
            ("package/index.js", b"1"),
            // Nested too deep: does not match the convention.
            ("package/sub/package.json", br#"{}"#),
            // Top level without a directory: does not match either.
            ("package.json", br#"{}"#),
        ]);
        assert!(matches!(
            locate_manifest(&mut Cursor::new(data), MAX),
            Err(ExtractionError::ManifestNotFound)
        ));
    }

    #[test]
    fn test_dot_slash_prefix_tolerated() {
        let data = tarball(&[("./package/package.json", br#"{"name":"foo"}"#)]);
        let entry = locate_manifest(&mut Cursor::new(data), MAX).unwrap();
        assert_eq!(entry.contents, br#"{"name":"foo"}"#);
    }

    #[test]
    fn test_oversized_entry_rejected() {
        let big = vec![b'x'; 64];
        let data = tarball(&[("package/package.json", &big)]);
        assert!(matches!(
            locate_manifest(&mut Cursor::new(data), 16),
            Err(ExtractionError::EntryTooLarge { size: 64, max: 16 })
        ));
    }

    #[test]
    fn test_garbage_stream_is_an_archive_error() {
        let mut cursor = Cursor::new(b"definitely not a gzip stream".to_vec());
        assert!(matches!(
            locate_manifest(&mut cursor, MAX),
            Err(ExtractionError::Archive(_))
        ));
    }
}

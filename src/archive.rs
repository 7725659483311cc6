//! Reads pipe files either directly or out of a zip container.

use std::{
    fs,
    io::{Cursor, Read},
    path::Path,
};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::debug;
use regex::Regex;
use zip::ZipArchive;

use crate::io_utils;

const LOCAL_FILE_MAGIC: &[u8] = b"PK\x03\x04";
const END_OF_CENTRAL_DIRECTORY: &[u8] = b"PK\x05\x06";
// Fixed end record plus the longest possible archive comment.
const END_RECORD_SEARCH: usize = 22 + u16::MAX as usize;

/// Decoded text of one input file (or one archive member).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMember {
    pub name: String,
    pub text: String,
}

/// True for zip containers, including ones with leading data such as
/// self-extracting archives: the end-of-central-directory record is searched
/// for near the end of the file.
pub fn is_zip(bytes: &[u8]) -> bool {
    if bytes.starts_with(LOCAL_FILE_MAGIC) {
        return true;
    }
    let tail = &bytes[bytes.len().saturating_sub(END_RECORD_SEARCH)..];
    tail.windows(END_OF_CENTRAL_DIRECTORY.len())
        .any(|window| window == END_OF_CENTRAL_DIRECTORY)
}

/// Returns every member of the zip at `path` whose name matches `name_filter`,
/// or the whole file as a single member when `path` is not a zip. The filter
/// only applies to zip members.
pub fn read_members(
    path: &Path,
    name_filter: Option<&Regex>,
    encoding: &'static Encoding,
) -> Result<Vec<ArchiveMember>> {
    let bytes = fs::read(path).with_context(|| format!("Opening input file {path:?}"))?;
    if !is_zip(&bytes) {
        let text = io_utils::decode_text(&bytes, encoding)
            .with_context(|| format!("Decoding {path:?}"))?;
        return Ok(vec![ArchiveMember {
            name: path.display().to_string(),
            text,
        }]);
    }
    read_zip_members(&bytes, name_filter, encoding)
        .with_context(|| format!("Reading zip archive {path:?}"))
}

pub fn read_zip_members(
    bytes: &[u8],
    name_filter: Option<&Regex>,
    encoding: &'static Encoding,
) -> Result<Vec<ArchiveMember>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).context("Failed to read ZIP archive")?;
    let mut members = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to access ZIP entry #{i}"))?;
        let name = entry.name().to_string();
        if !entry.is_file() {
            continue;
        }
        if let Some(filter) = name_filter {
            if !filter.is_match(&name) {
                debug!("Skipping archive member {name}");
                continue;
            }
        }
        let mut buf = Vec::new();
        entry
            .read_to_end(&mut buf)
            .with_context(|| format!("Failed to read {name} into memory"))?;
        let text =
            io_utils::decode_text(&buf, encoding).with_context(|| format!("Decoding {name}"))?;
        members.push(ArchiveMember { name, text });
    }
    Ok(members)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use encoding_rs::UTF_8;
    use zip::CompressionMethod;
    use zip::write::FileOptions;

    fn zip_bytes(members: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            let options: FileOptions<'_, ()> =
                FileOptions::default().compression_method(CompressionMethod::Stored);
            for (name, content) in members {
                zip.start_file(*name, options).unwrap();
                zip.write_all(content.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn zip_members_respect_the_name_filter() {
        let bytes = zip_bytes(&[("a_core.txt", "one"), ("b_extra.txt", "two")]);
        assert!(is_zip(&bytes));
        let filter = Regex::new("core").unwrap();
        let members = read_zip_members(&bytes, Some(&filter), UTF_8).unwrap();
        assert_eq!(
            members,
            vec![ArchiveMember {
                name: "a_core.txt".into(),
                text: "one".into()
            }]
        );
        assert_eq!(read_zip_members(&bytes, None, UTF_8).unwrap().len(), 2);
    }

    #[test]
    fn prefixed_archive_is_detected_and_read() {
        let mut bytes = b"#!/bin/sh\nexit 0\n".to_vec();
        bytes.extend(zip_bytes(&[("a.txt", "payload")]));
        assert!(is_zip(&bytes));
        let members = read_zip_members(&bytes, None, UTF_8).unwrap();
        assert_eq!(members[0].text, "payload");
    }

    #[test]
    fn pipe_text_is_not_a_zip() {
        assert!(!is_zip(b"VENDOR FEED\n*\n"));
        assert!(!is_zip(b""));
    }

    #[test]
    fn corrupt_archive_is_a_hard_failure() {
        let mut bytes = zip_bytes(&[("a.txt", "payload")]);
        bytes.truncate(12);
        assert!(is_zip(&bytes));
        assert!(read_zip_members(&bytes, None, UTF_8).is_err());
    }
}

//! Zip container handling for price list payloads.
//!
//! Decoding keeps only members whose name carries the `.csv` extension; an
//! archive without any such member decodes to an empty list rather than an
//! error. Encoding always produces an archive holding exactly one member.

use std::io::{Cursor, Read, Write};
use std::path::Path;

use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::{AppError, AppResult};

pub const CSV_EXTENSION: &str = "csv";

/// A named file entry pulled out of (or destined for) an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMember {
    pub name: String,
    pub data: Vec<u8>,
}

impl ArchiveMember {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

pub fn is_csv_member(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == CSV_EXTENSION)
}

/// Decompress `bytes` and return every CSV member in archive order.
pub fn decode_csv_members(bytes: &[u8]) -> AppResult<Vec<ArchiveMember>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|err| {
        AppError::invalid_archive("Invalid zip file").with_cause(err)
    })?;

    let mut members = Vec::new();
    for index in 0..archive.len() {
        let mut file = archive.by_index(index).map_err(|err| {
            AppError::invalid_archive("Invalid zip file")
                .with_context("member_index", index.to_string())
                .with_cause(err)
        })?;
        if file.is_dir() || !is_csv_member(file.name()) {
            debug!(
                target: "pricebook",
                event = "archive_member_skipped",
                member = file.name()
            );
            continue;
        }

        let name = file.name().to_string();
        // The declared size comes from the archive itself; don't pre-allocate from it.
        let mut data = Vec::new();
        file.read_to_end(&mut data).map_err(|err| {
            AppError::invalid_archive("Failed to read archive member")
                .with_context("member", name.clone())
                .with_cause(err)
        })?;
        members.push(ArchiveMember { name, data });
    }
    Ok(members)
}

/// Compress a single member into a fresh zip archive.
pub fn encode_member(member: &ArchiveMember) -> AppResult<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    writer
        .start_file(member.name.as_str(), options)
        .map_err(|err| AppError::encoding("zip_entry", err))?;
    writer
        .write_all(&member.data)
        .map_err(|err| AppError::encoding("zip_write", err))?;
    let cursor = writer
        .finish()
        .map_err(|err| AppError::encoding("zip_finish", err))?;
    Ok(cursor.into_inner())
}

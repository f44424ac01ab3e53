//! Raw central directory records.
//!
//! `zip::ZipArchive` indexes entries by name, so a name that appears twice
//! collapses into one entry holding the later record. Export archives keep
//! the first record of a repeated name, which means every record has to be
//! listed and read on its own. Locating the directory and decompressing
//! entry data stay with the `zip` crate.

use crate::{ArchiveError, Result};
use std::io::{Cursor, Read, Seek, SeekFrom};

const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4b50;
const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4b50;
const CENTRAL_HEADER_LEN: usize = 46;
const LOCAL_HEADER_LEN: usize = 30;

const ZIP64_EXTRA_ID: u16 = 0x0001;
const ZIP64_THRESHOLD: u32 = u32::MAX;

/// General purpose flag bit: sizes and CRC follow the data.
const DATA_DESCRIPTOR_FLAG: u16 = 0x0008;

/// One central directory file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CentralRecord {
    pub version_made_by: u16,
    pub flags: u16,
    pub method: u16,
    pub dos_time: u16,
    pub dos_date: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub external_attributes: u32,
    /// Absolute position of the local header in the reader.
    pub header_start: u64,
    pub name_raw: Vec<u8>,
    pub extra: Vec<u8>,
    pub comment: Vec<u8>,
}

impl CentralRecord {
    /// Unix mode from the external attributes, when written by a Unix host.
    pub fn unix_mode(&self) -> Option<u32> {
        let mode = self.external_attributes >> 16;
        (self.version_made_by >> 8 == 3 && mode != 0).then_some(mode)
    }
}

fn u16_at(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn u32_at(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn u64_at(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}

fn read_vec<R: Read>(reader: &mut R, len: usize) -> std::io::Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

fn malformed(what: impl std::fmt::Display) -> ArchiveError {
    ArchiveError::ArchiveOpen(format!("invalid central directory: {what}"))
}

/// Read every file header starting at `dir_start`, in directory order.
///
/// `archive_offset` is the length of any data prepended to the zip and is
/// added to each local header offset. The walk stops at the first block
/// that is not a file header (the end-of-directory records).
pub(crate) fn read_central_directory<R: Read + Seek>(
    reader: &mut R,
    dir_start: u64,
    archive_offset: u64,
) -> Result<Vec<CentralRecord>> {
    reader.seek(SeekFrom::Start(dir_start))?;

    let mut records = Vec::new();
    loop {
        let mut fixed = [0u8; CENTRAL_HEADER_LEN];
        let mut signature = [0u8; 4];
        match reader.read_exact(&mut signature) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }
        if u32::from_le_bytes(signature) != CENTRAL_HEADER_SIGNATURE {
            break;
        }
        fixed[..4].copy_from_slice(&signature);
        reader
            .read_exact(&mut fixed[4..])
            .map_err(|e| malformed(format!("record {}: {e}", records.len())))?;

        let name_len = usize::from(u16_at(&fixed, 28));
        let extra_len = usize::from(u16_at(&fixed, 30));
        let comment_len = usize::from(u16_at(&fixed, 32));
        let name_raw = read_vec(reader, name_len).map_err(malformed)?;
        let extra = read_vec(reader, extra_len).map_err(malformed)?;
        let comment = read_vec(reader, comment_len).map_err(malformed)?;

        let mut record = CentralRecord {
            version_made_by: u16_at(&fixed, 4),
            flags: u16_at(&fixed, 8),
            method: u16_at(&fixed, 10),
            dos_time: u16_at(&fixed, 12),
            dos_date: u16_at(&fixed, 14),
            crc32: u32_at(&fixed, 16),
            compressed_size: u64::from(u32_at(&fixed, 20)),
            uncompressed_size: u64::from(u32_at(&fixed, 24)),
            external_attributes: u32_at(&fixed, 38),
            header_start: u64::from(u32_at(&fixed, 42)),
            name_raw,
            extra,
            comment,
        };
        apply_zip64_extra(&mut record)?;
        record.header_start = record
            .header_start
            .checked_add(archive_offset)
            .ok_or_else(|| malformed("local header offset overflows"))?;

        records.push(record);
    }

    Ok(records)
}

/// Replace saturated 32-bit fields with their zip64 extra field values.
fn apply_zip64_extra(record: &mut CentralRecord) -> Result<()> {
    let threshold = u64::from(ZIP64_THRESHOLD);
    let Some(payload) = crate::container::extra_blocks(&record.extra)
        .into_iter()
        .find(|(id, _)| *id == ZIP64_EXTRA_ID)
        .map(|(_, payload)| payload.to_vec())
    else {
        return Ok(());
    };

    let mut at = 0;
    for field in [
        &mut record.uncompressed_size,
        &mut record.compressed_size,
        &mut record.header_start,
    ] {
        if *field != threshold {
            continue;
        }
        if payload.len() < at + 8 {
            return Err(malformed("truncated zip64 extra field"));
        }
        *field = u64_at(&payload, at);
        at += 8;
    }
    Ok(())
}

/// Local header for `record` rebuilt from its directory entry.
///
/// Sizes and CRC come from the central directory, so entries written with
/// a trailing data descriptor can still be read as a stream.
fn synthetic_local_header(record: &CentralRecord) -> Vec<u8> {
    let large = record.compressed_size >= u64::from(ZIP64_THRESHOLD)
        || record.uncompressed_size >= u64::from(ZIP64_THRESHOLD);
    let (compressed, uncompressed) = if large {
        (ZIP64_THRESHOLD, ZIP64_THRESHOLD)
    } else {
        // both checked against the threshold above
        (record.compressed_size as u32, record.uncompressed_size as u32)
    };
    let name_len = u16::try_from(record.name_raw.len()).unwrap_or(u16::MAX);
    let extra_len: u16 = if large { 20 } else { 0 };

    let mut header = Vec::with_capacity(LOCAL_HEADER_LEN + record.name_raw.len() + 20);
    header.extend_from_slice(&LOCAL_HEADER_SIGNATURE.to_le_bytes());
    header.extend_from_slice(&(if large { 45u16 } else { 20u16 }).to_le_bytes());
    header.extend_from_slice(&(record.flags & !DATA_DESCRIPTOR_FLAG).to_le_bytes());
    header.extend_from_slice(&record.method.to_le_bytes());
    header.extend_from_slice(&record.dos_time.to_le_bytes());
    header.extend_from_slice(&record.dos_date.to_le_bytes());
    header.extend_from_slice(&record.crc32.to_le_bytes());
    header.extend_from_slice(&compressed.to_le_bytes());
    header.extend_from_slice(&uncompressed.to_le_bytes());
    header.extend_from_slice(&name_len.to_le_bytes());
    header.extend_from_slice(&extra_len.to_le_bytes());
    header.extend_from_slice(&record.name_raw[..usize::from(name_len)]);
    if large {
        header.extend_from_slice(&ZIP64_EXTRA_ID.to_le_bytes());
        header.extend_from_slice(&16u16.to_le_bytes());
        header.extend_from_slice(&record.uncompressed_size.to_le_bytes());
        header.extend_from_slice(&record.compressed_size.to_le_bytes());
    }
    header
}

/// Position `reader` at the data of `record` and return a stream that
/// `zip::read::read_zipfile_from_stream` can decode.
pub(crate) fn record_stream<'r, R: Read + Seek>(
    reader: &'r mut R,
    record: &CentralRecord,
) -> Result<impl Read + 'r> {
    reader.seek(SeekFrom::Start(record.header_start))?;
    let mut local = [0u8; LOCAL_HEADER_LEN];
    reader.read_exact(&mut local)?;
    if u32_at(&local, 0) != LOCAL_HEADER_SIGNATURE {
        return Err(ArchiveError::MalformedArchive(format!(
            "no local header at offset {} for '{}'",
            record.header_start,
            String::from_utf8_lossy(&record.name_raw)
        )));
    }
    let skip = i64::from(u16_at(&local, 26)) + i64::from(u16_at(&local, 28));
    reader.seek(SeekFrom::Current(skip))?;

    Ok(Cursor::new(synthetic_local_header(record)).chain(reader.take(record.compressed_size)))
}

//! Zip container access for export archives.
//!
//! [`ExportContainer`] lists and streams entries of a source archive;
//! [`ContainerWriter`] builds a destination archive one entry at a time.
//! [`EntryInfo`] carries the per-entry metadata (timestamp, permission bits,
//! compression, extra fields) that is preserved when entries are copied.

use crate::directory::{read_central_directory, record_stream, CentralRecord};
use crate::{ArchiveError, Result};
use chrono::{DateTime, Datelike, Timelike, Utc};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Cursor, Read, Seek, Write};
use std::path::Path;
use tracing::{debug, info};
use zip::read::{read_zipfile_from_stream, ZipFile};
use zip::write::{FileOptions, FullFileOptions, ZipWriter};
use zip::{CompressionMethod, ZipArchive};

/// Default buffer used when streaming entry contents between containers (2 MiB).
pub const DEFAULT_COPY_BUFFER_SIZE: usize = 2 * 1024 * 1024;

/// Header id of the classic extended-timestamp extra field ("UT").
pub const EXTENDED_TIMESTAMP_ID: u16 = 0x5455;

/// General purpose flag bit marking a UTF-8 encoded entry name.
pub const UTF8_NAME_FLAG: u16 = 0x0800;

/// MS-DOS directory attribute in the low byte of the external attributes.
const DOS_DIRECTORY_ATTRIBUTE: u32 = 0x10;

const S_IFMT: u32 = 0o170_000;
const S_IFDIR: u32 = 0o040_000;
const S_IFLNK: u32 = 0o120_000;

/// Upper bound on the read buffer reserved from a declared entry size.
const MAX_READ_RESERVE: usize = 16 * 1024 * 1024;

const DEFAULT_FILE_MODE: u32 = 0o644;
const DEFAULT_DIR_MODE: u32 = 0o755;

/// Metadata describing one container entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryInfo {
    /// Position in the source container; `None` for synthesized entries.
    pub index: Option<usize>,
    /// Entry name, `/`-separated; directories end with `/`.
    pub name: String,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// DOS modification time, if known.
    pub modified: Option<zip::DateTime>,
    /// Unix mode including the file type bits.
    pub unix_mode: u32,
    pub is_dir: bool,
    pub is_symlink: bool,
    pub compression: CompressionMethod,
    /// General purpose flag bits derived from the name.
    pub flag_bits: u16,
    /// External file attributes (unix mode in the high 16 bits, DOS bits low).
    pub external_attributes: u32,
    /// Raw extra field blocks (header id, length, payload) repeated.
    pub extra: Vec<u8>,
    pub comment: String,
}

impl EntryInfo {
    /// Build a descriptor for a new entry.
    ///
    /// `mode_bits` defaults to `0o644` for files and `0o755` for directories.
    /// A supplied `modified` time sets both the DOS timestamp and an
    /// extended-timestamp extra block holding the POSIX seconds. Directories
    /// and symlinks are stored uncompressed, everything else is deflated.
    /// A symlink is never also a directory.
    pub fn new_descriptor(
        name: impl Into<String>,
        modified: Option<DateTime<Utc>>,
        mode_bits: Option<u32>,
        is_dir: bool,
        is_symlink: bool,
        comment: Option<&str>,
    ) -> Self {
        let name = name.into();
        let is_dir = is_dir && !is_symlink;

        let mut extra = Vec::new();
        let dos_time = modified.and_then(|ts| {
            if let Ok(seconds) = i32::try_from(ts.timestamp()) {
                extra.extend_from_slice(&extended_timestamp_block(seconds));
            }
            dos_datetime(&ts)
        });

        let mut unix_mode = mode_bits.unwrap_or(if is_dir {
            DEFAULT_DIR_MODE
        } else {
            DEFAULT_FILE_MODE
        });
        if is_dir {
            unix_mode |= S_IFDIR;
        } else if is_symlink {
            unix_mode |= S_IFLNK;
        }

        let compression = if is_dir || is_symlink {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflated
        };

        Self {
            index: None,
            flag_bits: name_flag_bits(&name),
            external_attributes: external_attributes(unix_mode, is_dir),
            name,
            size: 0,
            modified: dos_time,
            unix_mode,
            is_dir,
            is_symlink,
            compression,
            extra,
            comment: comment.unwrap_or_default().to_string(),
        }
    }

    /// Descriptor for a regular file with default metadata.
    pub fn file(name: impl Into<String>) -> Self {
        Self::new_descriptor(name, None, None, false, false, None)
    }

    /// Descriptor for a directory with default metadata.
    pub fn directory(name: impl Into<String>) -> Self {
        let mut name = name.into();
        if !name.ends_with('/') {
            name.push('/');
        }
        Self::new_descriptor(name, None, None, true, false, None)
    }

    /// Whether the name requires the UTF-8 flag.
    pub fn has_utf8_name(&self) -> bool {
        self.flag_bits & UTF8_NAME_FLAG != 0
    }

    /// Permission bits without the file type.
    pub fn permissions(&self) -> u32 {
        self.unix_mode & 0o7777
    }

    /// Writer options reproducing this entry's metadata.
    ///
    /// Extra blocks the zip writer manages itself are skipped.
    fn file_options(&self) -> FullFileOptions<'static> {
        let mut options: FullFileOptions<'static> = FileOptions::default()
            .compression_method(self.compression)
            .last_modified_time(self.modified.unwrap_or_default())
            .unix_permissions(self.permissions())
            .large_file(self.size >= u64::from(u32::MAX));

        for (header_id, payload) in extra_blocks(&self.extra) {
            if let Err(e) = options.add_extra_data(header_id, payload.to_vec().into_boxed_slice(), false)
            {
                debug!(
                    entry = %self.name,
                    header_id = format_args!("{header_id:#06x}"),
                    error = %e,
                    "Extra field not carried over"
                );
            }
        }

        options
    }
}

/// Encode an extended-timestamp extra block: id, length 5, flag 1 (mtime), seconds.
pub fn extended_timestamp_block(posix_seconds: i32) -> [u8; 9] {
    let mut block = [0u8; 9];
    block[0..2].copy_from_slice(&EXTENDED_TIMESTAMP_ID.to_le_bytes());
    block[2..4].copy_from_slice(&5u16.to_le_bytes());
    block[4] = 1;
    block[5..9].copy_from_slice(&posix_seconds.to_le_bytes());
    block
}

/// Split raw extra field bytes into `(header_id, payload)` pairs.
///
/// A truncated trailing block is dropped.
pub fn extra_blocks(extra: &[u8]) -> Vec<(u16, &[u8])> {
    let mut blocks = Vec::new();
    let mut rest = extra;
    while rest.len() >= 4 {
        let header_id = u16::from_le_bytes([rest[0], rest[1]]);
        let len = usize::from(u16::from_le_bytes([rest[2], rest[3]]));
        if rest.len() < 4 + len {
            break;
        }
        blocks.push((header_id, &rest[4..4 + len]));
        rest = &rest[4 + len..];
    }
    blocks
}

fn name_flag_bits(name: &str) -> u16 {
    if name.is_ascii() {
        0
    } else {
        UTF8_NAME_FLAG
    }
}

fn external_attributes(unix_mode: u32, is_dir: bool) -> u32 {
    let mut attributes = unix_mode << 16;
    if is_dir {
        attributes |= DOS_DIRECTORY_ATTRIBUTE;
    }
    attributes
}

fn dos_datetime(ts: &DateTime<Utc>) -> Option<zip::DateTime> {
    let year = u16::try_from(ts.year()).ok()?;
    // chrono guarantees these fit in a u8
    let [month, day, hour, minute, second] =
        [ts.month(), ts.day(), ts.hour(), ts.minute(), ts.second()].map(|v| v as u8);
    zip::DateTime::from_date_and_time(year, month, day, hour, minute, second).ok()
}

/// Read-only view of a source container.
///
/// Every central directory record is listed, including records whose name
/// repeats an earlier one. Entry data is streamed from each record's own
/// local header. The reader sits in a `RefCell` so entries can be streamed
/// while the parsed export data is borrowed elsewhere.
pub struct ExportContainer<R: Read + Seek> {
    reader: RefCell<R>,
    entries: Vec<EntryInfo>,
    records: Vec<CentralRecord>,
}

impl ExportContainer<File> {
    /// Open a container from a file path.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| ArchiveError::ArchiveOpen(format!("{}: {e}", path.display())))?;
        Self::from_reader(file)
    }
}

impl ExportContainer<Cursor<Vec<u8>>> {
    /// Open a container from bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_reader(Cursor::new(bytes))
    }
}

impl<R: Read + Seek> ExportContainer<R> {
    /// Create a container from any Read + Seek source.
    pub fn from_reader(reader: R) -> Result<Self> {
        let mut archive =
            ZipArchive::new(reader).map_err(|e| ArchiveError::ArchiveOpen(e.to_string()))?;

        // metadata the zip crate decoded, keyed by local header position
        let mut decoded = HashMap::with_capacity(archive.len());
        let mut names = HashMap::with_capacity(archive.len());
        for index in 0..archive.len() {
            let file = archive.by_index_raw(index)?;
            names.insert(file.name_raw().to_vec(), file.name().to_string());
            decoded.insert(file.header_start(), decoded_entry(&file));
        }

        let dir_start = archive.central_directory_start();
        let archive_offset = archive.offset();
        let mut reader = archive.into_inner();
        let records = read_central_directory(&mut reader, dir_start, archive_offset)?;
        if records.len() < decoded.len() {
            return Err(ArchiveError::ArchiveOpen(format!(
                "central directory lists {} records, expected at least {}",
                records.len(),
                decoded.len()
            )));
        }

        let entries: Vec<EntryInfo> = records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let mut entry = match decoded.get(&record.header_start) {
                    Some(entry) => entry.clone(),
                    None => shadowed_entry(record, &names),
                };
                entry.index = Some(index);
                entry
            })
            .collect();

        debug!(
            entries = entries.len(),
            shadowed = entries.len() - decoded.len(),
            "Container opened"
        );

        Ok(Self {
            reader: RefCell::new(reader),
            entries,
            records,
        })
    }

    /// All entries in central directory order. Stable across calls.
    pub fn entries(&self) -> &[EntryInfo] {
        &self.entries
    }

    /// First entry with the given name.
    pub fn entry(&self, name: &str) -> Option<&EntryInfo> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Check if an entry exists.
    pub fn has_entry(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    /// Read an entry's full contents by name.
    pub fn read_entry(&self, name: &str) -> Result<Vec<u8>> {
        let entry = self
            .entry(name)
            .ok_or_else(|| ArchiveError::EntryNotFound(name.to_string()))?;
        self.read_entry_at(entry)
    }

    fn record_for(&self, entry: &EntryInfo) -> Result<&CentralRecord> {
        entry
            .index
            .and_then(|index| self.records.get(index))
            .ok_or_else(|| ArchiveError::EntryNotFound(entry.name.clone()))
    }

    /// Read an entry's full contents.
    pub fn read_entry_at(&self, entry: &EntryInfo) -> Result<Vec<u8>> {
        let record = self.record_for(entry)?;
        let mut reader = self.reader.borrow_mut();
        let mut stream = record_stream(&mut *reader, record)?;
        let mut file = read_zipfile_from_stream(&mut stream)?
            .ok_or_else(|| ArchiveError::EntryNotFound(entry.name.clone()))?;

        let mut data = Vec::with_capacity(
            usize::try_from(entry.size)
                .unwrap_or(0)
                .min(MAX_READ_RESERVE),
        );
        file.read_to_end(&mut data)?;

        debug!(entry = %entry.name, bytes = data.len(), "Read entry");

        Ok(data)
    }

    /// Stream an entry into `dest`, keeping its metadata and compression.
    ///
    /// Returns the number of content bytes copied.
    pub fn copy_entry<W: Write + Seek>(
        &self,
        entry: &EntryInfo,
        dest: &mut ContainerWriter<W>,
        buffer_size: usize,
    ) -> Result<u64> {
        if entry.is_dir {
            dest.add_directory(entry)?;
            return Ok(0);
        }

        let record = self.record_for(entry)?;
        let mut source = self.reader.borrow_mut();
        let mut stream = record_stream(&mut *source, record)?;
        let file = read_zipfile_from_stream(&mut stream)?
            .ok_or_else(|| ArchiveError::EntryNotFound(entry.name.clone()))?;
        let mut reader = BufReader::with_capacity(buffer_size.max(1), file);

        if entry.is_symlink {
            let mut target = String::new();
            reader.read_to_string(&mut target)?;
            dest.add_symlink(entry, &target)?;
            return Ok(target.len() as u64);
        }

        let writer = dest.start_file(entry)?;
        let copied = io::copy(&mut reader, writer)?;

        debug!(entry = %entry.name, bytes = copied, "Copied entry");

        Ok(copied)
    }
}

fn decoded_entry<R: Read>(file: &ZipFile<'_, R>) -> EntryInfo {
    let name = file.name().to_string();
    let is_dir = file.is_dir();
    let unix_mode = file.unix_mode().unwrap_or(if is_dir {
        S_IFDIR | DEFAULT_DIR_MODE
    } else {
        DEFAULT_FILE_MODE
    });
    let is_symlink = !is_dir && unix_mode & S_IFMT == S_IFLNK;

    EntryInfo {
        index: None,
        flag_bits: name_flag_bits(&name),
        external_attributes: external_attributes(unix_mode, is_dir),
        name,
        size: file.size(),
        modified: file.last_modified(),
        unix_mode,
        is_dir,
        is_symlink,
        compression: file.compression(),
        extra: file.extra_data().map(<[u8]>::to_vec).unwrap_or_default(),
        comment: file.comment().to_string(),
    }
}

/// Metadata for a record the zip crate replaced with a later one of the
/// same name.
fn shadowed_entry(record: &CentralRecord, names: &HashMap<Vec<u8>, String>) -> EntryInfo {
    let name = names
        .get(&record.name_raw)
        .cloned()
        .unwrap_or_else(|| String::from_utf8_lossy(&record.name_raw).into_owned());
    let is_dir = name.ends_with('/');
    let unix_mode = record.unix_mode().unwrap_or(if is_dir {
        S_IFDIR | DEFAULT_DIR_MODE
    } else {
        DEFAULT_FILE_MODE
    });
    let is_symlink = !is_dir && unix_mode & S_IFMT == S_IFLNK;
    let compression = if record.method == 0 {
        CompressionMethod::Stored
    } else {
        CompressionMethod::Deflated
    };

    EntryInfo {
        index: None,
        flag_bits: name_flag_bits(&name),
        external_attributes: external_attributes(unix_mode, is_dir),
        name,
        size: record.uncompressed_size,
        modified: zip::DateTime::try_from_msdos(record.dos_date, record.dos_time).ok(),
        unix_mode,
        is_dir,
        is_symlink,
        compression,
        extra: record.extra.clone(),
        comment: String::from_utf8_lossy(&record.comment).into_owned(),
    }
}

/// Destination container writer.
///
/// Each entry name may be written once per writer.
pub struct ContainerWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
    written: HashSet<String>,
}

impl ContainerWriter<File> {
    /// Create a new container file; fails if `path` already exists.
    pub fn create_new(path: &Path) -> Result<Self> {
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let file = options.open(path).map_err(|e| {
            if e.kind() == io::ErrorKind::AlreadyExists {
                ArchiveError::DestinationExists(path.to_path_buf())
            } else {
                ArchiveError::Io(e)
            }
        })?;

        info!(path = %path.display(), "Destination archive created");

        Ok(Self::new(file))
    }
}

impl<W: Write + Seek> ContainerWriter<W> {
    /// Wrap any Write + Seek sink.
    pub fn new(inner: W) -> Self {
        Self {
            zip: ZipWriter::new(inner),
            written: HashSet::new(),
        }
    }

    /// Names written so far.
    pub fn written_count(&self) -> usize {
        self.written.len()
    }

    fn claim(&mut self, name: &str) -> Result<()> {
        if !self.written.insert(name.to_string()) {
            return Err(ArchiveError::DuplicateEntry(name.to_string()));
        }
        Ok(())
    }

    fn start_file(&mut self, entry: &EntryInfo) -> Result<&mut ZipWriter<W>> {
        self.claim(&entry.name)?;
        self.zip
            .start_file(entry.name.as_str(), entry.file_options())?;
        Ok(&mut self.zip)
    }

    /// Write an entry with the given contents.
    pub fn write_entry(&mut self, entry: &EntryInfo, data: &[u8]) -> Result<()> {
        let writer = self.start_file(entry)?;
        writer.write_all(data)?;
        debug!(entry = %entry.name, bytes = data.len(), "Wrote entry");
        Ok(())
    }

    /// Write a JSON value with sorted keys and 2-space indentation.
    pub fn write_json_entry(&mut self, entry: &EntryInfo, value: &serde_json::Value) -> Result<()> {
        let json = to_canonical_json(value)?;
        self.write_entry(entry, json.as_bytes())
    }

    /// Write a directory entry.
    pub fn add_directory(&mut self, entry: &EntryInfo) -> Result<()> {
        self.claim(&entry.name)?;
        self.zip
            .add_directory(entry.name.as_str(), entry.file_options())?;
        debug!(entry = %entry.name, "Wrote directory");
        Ok(())
    }

    /// Write a symlink entry pointing at `target`.
    pub fn add_symlink(&mut self, entry: &EntryInfo, target: &str) -> Result<()> {
        self.claim(&entry.name)?;
        self.zip
            .add_symlink(entry.name.as_str(), target, entry.file_options())?;
        debug!(entry = %entry.name, target, "Wrote symlink");
        Ok(())
    }

    /// Finalize the container and return the sink.
    pub fn finish(self) -> Result<W> {
        Ok(self.zip.finish()?)
    }
}

/// Serialize JSON deterministically: object keys sorted, 2-space indent.
pub fn to_canonical_json(value: &serde_json::Value) -> Result<String> {
    // serde_json's default map is ordered by key
    Ok(serde_json::to_string_pretty(value)?)
}

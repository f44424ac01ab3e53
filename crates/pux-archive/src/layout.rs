//! Partitioning of container entries and archive hygiene diagnostics.
//!
//! An export holds two fixed entries (`export.attributes`, `export.data`),
//! a `files/` directory, and one entry per attachment named
//! `files/<document-id>[_suffix]`.

use crate::container::EntryInfo;
use crate::item::DocumentIds;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use tracing::{info, warn};

/// Opaque export attributes entry, copied unchanged.
pub const EXPORT_ATTRIBUTES: &str = "export.attributes";

/// JSON payload entry.
pub const EXPORT_DATA: &str = "export.data";

/// Attachment directory entry and name prefix.
pub const FILES_DIR: &str = "files/";

/// Document id encoded in an attachment entry name.
///
/// The id runs from after `files/` to the first underscore, or to the end
/// of the name. Names outside `files/` have no id.
pub fn filename_to_document_id(name: &str) -> Option<&str> {
    let rest = name.strip_prefix(FILES_DIR)?;
    Some(rest.split_once('_').map_or(rest, |(id, _)| id))
}

/// An attachment entry with its parsed document id.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentFile {
    pub entry: EntryInfo,
    pub document_id: String,
}

/// Container entries sorted into their roles.
///
/// When a name repeats, the first entry wins and later ones are only
/// reported.
#[derive(Debug, Clone)]
pub struct EntryLayout {
    export_attributes: Option<EntryInfo>,
    export_data: Option<EntryInfo>,
    files_dir: EntryInfo,
    files_dir_synthesized: bool,
    document_files: Vec<DocumentFile>,
    file_document_ids: BTreeSet<String>,
    duplicate_filenames: Vec<String>,
    duplicate_document_ids: Vec<String>,
    unexpected_entries: Vec<String>,
}

impl EntryLayout {
    pub fn from_entries(entries: &[EntryInfo]) -> Self {
        let mut seen = HashSet::new();
        let mut export_attributes = None;
        let mut export_data = None;
        let mut files_dir = None;
        let mut document_files = Vec::new();
        let mut file_document_ids = BTreeSet::new();
        let mut duplicate_filenames = Vec::new();
        let mut duplicate_document_ids = Vec::new();
        let mut unexpected_entries = Vec::new();

        for entry in entries {
            if !seen.insert(entry.name.as_str()) {
                warn!(entry = %entry.name, "Document file appears multiple times in archive");
                duplicate_filenames.push(entry.name.clone());
                continue;
            }

            match entry.name.as_str() {
                EXPORT_ATTRIBUTES => export_attributes = Some(entry.clone()),
                EXPORT_DATA => export_data = Some(entry.clone()),
                FILES_DIR => files_dir = Some(entry.clone()),
                name => match filename_to_document_id(name) {
                    Some(document_id) => {
                        if !file_document_ids.insert(document_id.to_string()) {
                            warn!(
                                document_id,
                                "Document ID associated with multiple files in archive"
                            );
                            duplicate_document_ids.push(document_id.to_string());
                        }
                        document_files.push(DocumentFile {
                            entry: entry.clone(),
                            document_id: document_id.to_string(),
                        });
                    }
                    None => {
                        info!(entry = name, "Archive contains unexpected file; it will be ignored");
                        unexpected_entries.push(name.to_string());
                    }
                },
            }
        }

        let files_dir_synthesized = files_dir.is_none();
        let files_dir = files_dir.unwrap_or_else(|| {
            EntryInfo::new_descriptor(FILES_DIR, None, Some(0o755), true, false, None)
        });

        Self {
            export_attributes,
            export_data,
            files_dir,
            files_dir_synthesized,
            document_files,
            file_document_ids,
            duplicate_filenames,
            duplicate_document_ids,
            unexpected_entries,
        }
    }

    pub fn export_attributes(&self) -> Option<&EntryInfo> {
        self.export_attributes.as_ref()
    }

    pub fn export_data(&self) -> Option<&EntryInfo> {
        self.export_data.as_ref()
    }

    /// The `files/` directory entry, synthesized when the container has none.
    pub fn files_dir(&self) -> &EntryInfo {
        &self.files_dir
    }

    pub fn files_dir_synthesized(&self) -> bool {
        self.files_dir_synthesized
    }

    /// Attachment entries in container order.
    pub fn document_files(&self) -> &[DocumentFile] {
        &self.document_files
    }

    /// Document ids that have at least one attachment entry.
    pub fn file_document_ids(&self) -> &BTreeSet<String> {
        &self.file_document_ids
    }

    pub fn duplicate_filenames(&self) -> &[String] {
        &self.duplicate_filenames
    }

    pub fn duplicate_document_ids(&self) -> &[String] {
        &self.duplicate_document_ids
    }

    pub fn unexpected_entries(&self) -> &[String] {
        &self.unexpected_entries
    }
}

/// Non-fatal findings about the input archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveDiagnostics {
    /// Referenced by items but with no attachment entry.
    pub missing_file_document_ids: BTreeSet<String>,
    /// Attachment entries no item references.
    pub extra_file_document_ids: BTreeSet<String>,
    pub duplicate_filenames: Vec<String>,
    pub duplicate_document_ids: Vec<String>,
    pub unexpected_entries: Vec<String>,
}

impl ArchiveDiagnostics {
    /// Cross-check referenced document ids against the attachment entries.
    pub fn compare(referenced: &DocumentIds<'_>, layout: &EntryLayout) -> Self {
        let files = layout.file_document_ids();
        Self {
            missing_file_document_ids: referenced
                .iter()
                .filter(|id| !files.contains(**id))
                .map(|id| id.to_string())
                .collect(),
            extra_file_document_ids: files
                .iter()
                .filter(|id| !referenced.contains(id.as_str()))
                .cloned()
                .collect(),
            duplicate_filenames: layout.duplicate_filenames().to_vec(),
            duplicate_document_ids: layout.duplicate_document_ids().to_vec(),
            unexpected_entries: layout.unexpected_entries().to_vec(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.missing_file_document_ids.is_empty()
            && self.extra_file_document_ids.is_empty()
            && self.duplicate_filenames.is_empty()
            && self.duplicate_document_ids.is_empty()
            && self.unexpected_entries.is_empty()
    }

    /// Report the document cross-check.
    ///
    /// Entry-level findings are logged when the layout is built.
    pub fn log(&self) {
        if !self.missing_file_document_ids.is_empty() {
            warn!(
                document_ids = ?self.missing_file_document_ids,
                "Document IDs have no corresponding files in archive"
            );
        }
        if !self.extra_file_document_ids.is_empty() {
            info!(
                document_ids = ?self.extra_file_document_ids,
                "Document IDs have files but no item references; they will be ignored"
            );
        }
    }
}

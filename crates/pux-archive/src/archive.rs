//! Export archive orchestration.
//!
//! [`ExportArchive`] owns the source container and the parsed `export.data`
//! payload, loaded once when the archive is opened. [`FilteredArchive`]
//! borrows it, builds the account → vault → item model under a selection,
//! and writes the filtered container.

use crate::account::Account;
use crate::container::{ContainerWriter, EntryInfo, ExportContainer, DEFAULT_COPY_BUFFER_SIZE};
use crate::item::DocumentIds;
use crate::json::{as_object, require_array, require_object, require_str};
use crate::layout::{
    ArchiveDiagnostics, DocumentFile, EntryLayout, EXPORT_ATTRIBUTES, EXPORT_DATA,
};
use crate::selection::{ResolvedSelection, SelectionSpec, VaultSelector};
use crate::view::{FilteredView, ViewIndex};
use crate::{ArchiveError, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// Tunables for writing a filtered archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOptions {
    /// Buffer size for streaming attachment contents.
    pub copy_buffer_size: usize,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            copy_buffer_size: DEFAULT_COPY_BUFFER_SIZE,
        }
    }
}

impl FilterOptions {
    pub fn with_copy_buffer_size(mut self, size: usize) -> Self {
        self.copy_buffer_size = size;
        self
    }
}

/// What a filtered archive write produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub accounts: usize,
    pub vaults: usize,
    pub documents: usize,
    pub files_written: usize,
    pub bytes_copied: u64,
}

/// A source export archive.
///
/// Dropping it releases the container.
pub struct ExportArchive<R: Read + Seek> {
    container: ExportContainer<R>,
    layout: EntryLayout,
    data: Value,
}

impl ExportArchive<File> {
    /// Open an archive from a file path.
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_container(ExportContainer::open(path)?)
    }
}

impl ExportArchive<Cursor<Vec<u8>>> {
    /// Open an archive from bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_container(ExportContainer::from_bytes(bytes)?)
    }
}

impl<R: Read + Seek> ExportArchive<R> {
    /// Create an archive from any Read + Seek source.
    pub fn from_reader(reader: R) -> Result<Self> {
        Self::from_container(ExportContainer::from_reader(reader)?)
    }

    /// Sort the container's entries and load `export.data`.
    pub fn from_container(container: ExportContainer<R>) -> Result<Self> {
        let layout = EntryLayout::from_entries(container.entries());

        let data_entry = layout
            .export_data()
            .ok_or_else(|| ArchiveError::EntryNotFound(EXPORT_DATA.to_string()))?;
        let bytes = container.read_entry_at(data_entry)?;
        let data: Value = serde_json::from_slice(&bytes)?;

        info!(
            entries = container.entries().len(),
            document_files = layout.document_files().len(),
            "Archive opened"
        );

        Ok(Self {
            container,
            layout,
            data,
        })
    }

    pub fn container(&self) -> &ExportContainer<R> {
        &self.container
    }

    pub fn layout(&self) -> &EntryLayout {
        &self.layout
    }

    /// The parsed `export.data` payload.
    pub fn unfiltered_data(&self) -> &Value {
        &self.data
    }

    /// Parse the `export.attributes` entry.
    pub fn export_attributes(&self) -> Result<Value> {
        let entry = self
            .layout
            .export_attributes()
            .ok_or_else(|| ArchiveError::EntryNotFound(EXPORT_ATTRIBUTES.to_string()))?;
        let bytes = self.container.read_entry_at(entry)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Build the model under `selection`; `None` keeps everything.
    pub fn select(&self, selection: Option<&SelectionSpec>) -> Result<FilteredArchive<'_, R>> {
        FilteredArchive::new(self, selection)
    }
}

/// Accounts of an export with unfiltered and filtered views.
pub struct FilteredArchive<'a, R: Read + Seek> {
    source: &'a ExportArchive<R>,
    accounts: Vec<Account<'a>>,
    unfiltered: ViewIndex<'a>,
    filtered: FilteredView<'a, Value>,
    diagnostics: ArchiveDiagnostics,
}

impl<'a, R: Read + Seek> FilteredArchive<'a, R> {
    /// Resolve `selection` and parse every account.
    ///
    /// Account names (`attrs.name`) and uuids must be unique. Accounts that
    /// are not selected are still parsed so the unfiltered view is complete.
    pub fn new(source: &'a ExportArchive<R>, selection: Option<&SelectionSpec>) -> Result<Self> {
        let resolved = ResolvedSelection::from_spec(selection);
        let root = as_object(&source.data, "export data")?;
        let account_nodes = require_array(root, "accounts", "export data")?;

        let excluded = VaultSelector::none();
        let mut accounts = Vec::with_capacity(account_nodes.len());
        let mut unfiltered = ViewIndex::default();
        let mut selected = ViewIndex::default();

        for node in account_nodes {
            let attrs = require_object(as_object(node, "account")?, "attrs", "account")?;
            let name = require_str(attrs, "name", "account attrs")?;
            if unfiltered.contains_name(name) {
                return Err(ArchiveError::duplicate(format!(
                    "Multiple 1Password accounts with name '{name}'"
                )));
            }
            let uuid = require_str(attrs, "uuid", "account attrs")?;
            if unfiltered.contains_uuid(uuid) {
                return Err(ArchiveError::duplicate(format!(
                    "Multiple 1Password accounts with UUID '{uuid}'"
                )));
            }

            let selector = resolved.selector_for(name, uuid);
            let account = Account::parse(node, selector.as_ref().unwrap_or(&excluded))?;

            let position = accounts.len();
            unfiltered.insert(position, uuid, name, account.unfiltered_document_ids());
            if selector.is_some() {
                selected.insert(position, uuid, name, account.filtered_document_ids());
            }
            debug!(
                account = name,
                included = selector.is_some(),
                vaults = account.num_filtered_vaults(),
                "Account selected"
            );
            accounts.push(account);
        }

        let shares_everything = selected.len() == unfiltered.len()
            && accounts.iter().all(Account::keeps_all_vaults);
        let filtered = if shares_everything {
            FilteredView::All
        } else {
            let mut filtered_data: Map<String, Value> = root
                .iter()
                .filter(|(key, _)| key.as_str() != "accounts")
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            let kept: Vec<Value> = selected
                .positions()
                .iter()
                .map(|&i| accounts[i].filtered_raw_data().clone())
                .collect();
            filtered_data.insert("accounts".to_string(), Value::Array(kept));
            FilteredView::Subset {
                index: selected,
                data: Value::Object(filtered_data),
            }
        };

        let diagnostics = ArchiveDiagnostics::compare(unfiltered.document_ids(), &source.layout);
        diagnostics.log();

        let archive = Self {
            source,
            accounts,
            unfiltered,
            filtered,
            diagnostics,
        };

        info!(
            accounts = archive.num_unfiltered_accounts(),
            selected_accounts = archive.num_filtered_accounts(),
            documents = archive.unfiltered_document_ids().len(),
            selected_documents = archive.filtered_document_ids().len(),
            "Selection resolved"
        );

        Ok(archive)
    }

    pub fn source(&self) -> &'a ExportArchive<R> {
        self.source
    }

    pub fn unfiltered_data(&self) -> &'a Value {
        &self.source.data
    }

    /// Export payload with only the selected accounts and vaults.
    ///
    /// Same object as [`FilteredArchive::unfiltered_data`] when nothing is
    /// filtered out.
    pub fn filtered_data(&self) -> &Value {
        match &self.filtered {
            FilteredView::All => &self.source.data,
            FilteredView::Subset { data, .. } => data,
        }
    }

    pub fn unfiltered_accounts(&self) -> impl Iterator<Item = &Account<'a>> {
        self.accounts.iter()
    }

    pub fn filtered_accounts(&self) -> impl Iterator<Item = &Account<'a>> {
        self.filtered_index()
            .positions()
            .iter()
            .map(|&i| &self.accounts[i])
    }

    pub fn unfiltered_account_by_name(&self, name: &str) -> Option<&Account<'a>> {
        self.unfiltered
            .position_by_name(name)
            .map(|i| &self.accounts[i])
    }

    pub fn unfiltered_account_by_uuid(&self, uuid: &str) -> Option<&Account<'a>> {
        self.unfiltered
            .position_by_uuid(uuid)
            .map(|i| &self.accounts[i])
    }

    pub fn filtered_account_by_name(&self, name: &str) -> Option<&Account<'a>> {
        self.filtered_index()
            .position_by_name(name)
            .map(|i| &self.accounts[i])
    }

    pub fn filtered_account_by_uuid(&self, uuid: &str) -> Option<&Account<'a>> {
        self.filtered_index()
            .position_by_uuid(uuid)
            .map(|i| &self.accounts[i])
    }

    /// Whether the selection kept every account and vault.
    pub fn is_unfiltered(&self) -> bool {
        self.filtered.is_shared()
    }

    pub fn num_unfiltered_accounts(&self) -> usize {
        self.unfiltered.len()
    }

    pub fn num_filtered_accounts(&self) -> usize {
        self.filtered_index().len()
    }

    /// Document ids referenced by any item in any vault.
    pub fn unfiltered_document_ids(&self) -> &DocumentIds<'a> {
        self.unfiltered.document_ids()
    }

    /// Document ids referenced by items in selected vaults.
    pub fn filtered_document_ids(&self) -> &DocumentIds<'a> {
        self.filtered_index().document_ids()
    }

    /// Document ids that have attachment entries.
    pub fn file_document_ids(&self) -> &'a BTreeSet<String> {
        self.source.layout.file_document_ids()
    }

    pub fn diagnostics(&self) -> &ArchiveDiagnostics {
        &self.diagnostics
    }

    /// Every attachment entry of the source.
    pub fn unfiltered_entries(&self) -> &'a [DocumentFile] {
        self.source.layout.document_files()
    }

    /// Attachment entries whose document is selected, in container order.
    pub fn filtered_entries(&self) -> impl Iterator<Item = &'a DocumentFile> + '_ {
        let selected = self.filtered_document_ids();
        self.unfiltered_entries()
            .iter()
            .filter(move |file| selected.contains(file.document_id.as_str()))
    }

    /// Write the filtered archive to a new file with default options.
    pub fn write_filtered_archive(&self, dest: &Path) -> Result<WriteSummary> {
        self.write_filtered_archive_with(dest, &FilterOptions::default())
    }

    /// Write the filtered archive to a new file.
    ///
    /// Fails with `DestinationExists` if `dest` exists. A partially written
    /// destination is removed on failure.
    pub fn write_filtered_archive_with(
        &self,
        dest: &Path,
        options: &FilterOptions,
    ) -> Result<WriteSummary> {
        let mut writer = ContainerWriter::create_new(dest)?;
        let result = match self.write_entries(&mut writer, options) {
            Ok(summary) => writer.finish().map(|_| summary),
            Err(e) => {
                drop(writer);
                Err(e)
            }
        };

        match result {
            Ok(summary) => {
                info!(
                    path = %dest.display(),
                    accounts = summary.accounts,
                    vaults = summary.vaults,
                    files = summary.files_written,
                    bytes = summary.bytes_copied,
                    "Filtered archive written"
                );
                Ok(summary)
            }
            Err(e) => {
                if let Err(remove_err) = fs::remove_file(dest) {
                    warn!(
                        path = %dest.display(),
                        error = %remove_err,
                        "Failed to remove partial archive"
                    );
                }
                Err(e)
            }
        }
    }

    /// Write the filtered archive into any Write + Seek sink.
    pub fn write_filtered_to<W: Write + Seek>(
        &self,
        sink: W,
        options: &FilterOptions,
    ) -> Result<(W, WriteSummary)> {
        let mut writer = ContainerWriter::new(sink);
        let summary = self.write_entries(&mut writer, options)?;
        Ok((writer.finish()?, summary))
    }

    fn write_entries<W: Write + Seek>(
        &self,
        writer: &mut ContainerWriter<W>,
        options: &FilterOptions,
    ) -> Result<WriteSummary> {
        let container = &self.source.container;
        let layout = &self.source.layout;

        let attributes = layout
            .export_attributes()
            .ok_or_else(|| ArchiveError::EntryNotFound(EXPORT_ATTRIBUTES.to_string()))?;
        let mut bytes_copied = container.copy_entry(attributes, writer, options.copy_buffer_size)?;

        let data_entry = layout
            .export_data()
            .cloned()
            .unwrap_or_else(|| EntryInfo::file(EXPORT_DATA));
        writer.write_json_entry(&data_entry, self.filtered_data())?;

        writer.add_directory(layout.files_dir())?;

        let mut files_written = 0;
        for file in self.filtered_entries() {
            bytes_copied += container.copy_entry(&file.entry, writer, options.copy_buffer_size)?;
            files_written += 1;
        }

        Ok(WriteSummary {
            accounts: self.num_filtered_accounts(),
            vaults: self
                .filtered_accounts()
                .map(Account::num_filtered_vaults)
                .sum(),
            documents: self.filtered_document_ids().len(),
            files_written,
            bytes_copied,
        })
    }

    fn filtered_index(&self) -> &ViewIndex<'a> {
        self.filtered.index(&self.unfiltered)
    }
}

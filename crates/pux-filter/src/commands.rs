//! Command implementations behind the CLI.
//!
//! Functions here return serializable reports; printing and exit codes are
//! left to the binary.

use crate::config::FilterConfig;
use pux_archive::{
    ArchiveDiagnostics, ArchiveError, ExportArchive, FilteredArchive, SelectionSpec, SelectionToken,
    WriteSummary,
};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write as _;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use tracing::info;

/// Build a selection from `--vault` values and flattened
/// `--account-vault ACCOUNT VAULT` pairs, each tagged with its position on
/// the command line.
///
/// Tokens keep command-line order. No tokens at all means "select
/// everything".
pub fn build_selection(
    vaults: &[(usize, String)],
    account_vault_pairs: &[(usize, String)],
) -> Option<SelectionSpec> {
    if vaults.is_empty() && account_vault_pairs.is_empty() {
        return None;
    }

    let bare = vaults
        .iter()
        .map(|(position, vault)| (*position, SelectionToken::vault(vault)));
    let scoped = account_vault_pairs.chunks_exact(2).map(|pair| {
        (
            pair[0].0,
            SelectionToken::account_vault(&pair[0].1, &pair[1].1),
        )
    });
    let mut tokens: Vec<_> = bare.chain(scoped).collect();
    tokens.sort_by_key(|(position, _)| *position);
    Some(tokens.into_iter().map(|(_, token)| token).collect())
}

/// Result of a `filter` run.
#[derive(Debug, Clone, Serialize)]
pub struct FilterReport {
    pub status: &'static str,
    pub generated_at: String,
    pub input: PathBuf,
    pub output: PathBuf,
    #[serde(flatten)]
    pub summary: WriteSummary,
    pub config: FilterConfig,
    pub diagnostics: ArchiveDiagnostics,
}

/// Filter `input` into a new archive at `output`.
pub fn run_filter(
    input: &Path,
    output: &Path,
    selection: Option<&SelectionSpec>,
    config: &FilterConfig,
) -> Result<FilterReport, ArchiveError> {
    info!(
        input = %input.display(),
        output = %output.display(),
        tokens = selection.map_or(0, |s| s.tokens().len()),
        "Filtering archive"
    );

    let archive = ExportArchive::open(input)?;
    let filtered = archive.select(selection)?;
    let summary = filtered.write_filtered_archive_with(output, &config.filter_options())?;

    Ok(FilterReport {
        status: "ok",
        generated_at: chrono::Utc::now().to_rfc3339(),
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        summary,
        config: config.clone(),
        diagnostics: filtered.diagnostics().clone(),
    })
}

/// One vault in an inspect report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaultReport {
    pub uuid: String,
    pub name: String,
    pub items: usize,
    pub documents: usize,
}

/// One account in an inspect report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountReport {
    pub uuid: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    pub vaults: Vec<VaultReport>,
}

/// Contents of an archive without filtering.
#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub input: PathBuf,
    /// Parsed `export.attributes`; absent when the entry is missing.
    pub attributes: Option<Value>,
    pub accounts: Vec<AccountReport>,
    pub document_files: usize,
    pub diagnostics: ArchiveDiagnostics,
}

impl InspectReport {
    /// Open `input` and describe it.
    pub fn load(input: &Path) -> Result<Self, ArchiveError> {
        let archive = ExportArchive::open(input)?;
        let filtered = archive.select(None)?;
        Self::from_archive(input, &filtered)
    }

    pub fn from_archive<R: Read + Seek>(
        input: &Path,
        archive: &FilteredArchive<'_, R>,
    ) -> Result<Self, ArchiveError> {
        let attributes = match archive.source().export_attributes() {
            Ok(value) => Some(value),
            Err(ArchiveError::EntryNotFound(_)) => None,
            Err(e) => return Err(e),
        };

        let accounts = archive
            .unfiltered_accounts()
            .map(|account| AccountReport {
                uuid: account.uuid().to_string(),
                name: account.owner_name().to_string(),
                account_name: account.account_name().ok().map(str::to_string),
                vaults: account
                    .unfiltered_vaults()
                    .map(|vault| VaultReport {
                        uuid: vault.uuid().to_string(),
                        name: vault.name().to_string(),
                        items: vault.num_items(),
                        documents: vault.document_ids().len(),
                    })
                    .collect(),
            })
            .collect();

        Ok(Self {
            input: input.to_path_buf(),
            attributes,
            accounts,
            document_files: archive.unfiltered_entries().len(),
            diagnostics: archive.diagnostics().clone(),
        })
    }

    /// Plain-text rendering for terminals.
    pub fn render_human(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Archive: {}", self.input.display());
        if let Some(attributes) = &self.attributes {
            let _ = writeln!(out, "Attributes: {attributes}");
        }
        let _ = writeln!(out, "Document files: {}", self.document_files);

        for account in &self.accounts {
            let label = account.account_name.as_deref().unwrap_or(&account.name);
            let _ = writeln!(out, "\nAccount {label} ({}) [{}]", account.name, account.uuid);
            for vault in &account.vaults {
                let _ = writeln!(
                    out,
                    "  Vault {} [{}]: {} items, {} documents",
                    vault.name, vault.uuid, vault.items, vault.documents
                );
            }
        }

        let diagnostics = &self.diagnostics;
        if !diagnostics.is_clean() {
            let _ = writeln!(out, "\nDiagnostics:");
            for id in &diagnostics.missing_file_document_ids {
                let _ = writeln!(out, "  warning: document {id} has no file");
            }
            for id in &diagnostics.extra_file_document_ids {
                let _ = writeln!(out, "  note: document {id} has a file but no item");
            }
            for name in &diagnostics.duplicate_filenames {
                let _ = writeln!(out, "  warning: duplicate entry {name}");
            }
            for id in &diagnostics.duplicate_document_ids {
                let _ = writeln!(out, "  warning: document {id} has several files");
            }
            for name in &diagnostics.unexpected_entries {
                let _ = writeln!(out, "  note: unexpected entry {name}");
            }
        }

        out
    }
}

//! Reader, model, and filter for 1Password `.1pux` export archives.
//!
//! This crate loads an unencrypted 1Password export, models its
//! account → vault → item hierarchy, and writes a new export holding only
//! selected accounts and vaults together with the attachment files their
//! items reference.
//!
//! # Archive Format
//!
//! A `.1pux` export is a ZIP archive containing:
//! - `export.attributes`: Opaque export metadata, copied unchanged
//! - `export.data`: JSON payload with `accounts[].vaults[].items[]`
//! - `files/`: Directory entry
//! - `files/<documentId>[_name]`: One entry per attachment
//!
//! # Selection
//!
//! A [`SelectionSpec`] lists vaults to keep, either in every account or
//! scoped to one account. Accounts and vaults match by name or uuid and `*`
//! matches anything. No selection keeps everything; an empty selection keeps
//! nothing.
//!
//! # Example
//!
//! ```no_run
//! use pux_archive::{ExportArchive, SelectionSpec};
//! use std::path::Path;
//!
//! let archive = ExportArchive::open(Path::new("export.1pux")).unwrap();
//! let spec = SelectionSpec::new()
//!     .with_vault("Personal")
//!     .with_account_vault("Pat at Work", "Shared");
//! let filtered = archive.select(Some(&spec)).unwrap();
//! for account in filtered.filtered_accounts() {
//!     println!("{}: {} vaults", account.owner_name(), account.num_filtered_vaults());
//! }
//! filtered.write_filtered_archive(Path::new("filtered.1pux")).unwrap();
//! ```

pub mod account;
pub mod archive;
pub mod container;
mod directory;
pub mod error;
pub mod item;
mod json;
pub mod layout;
pub mod selection;
pub mod vault;
pub mod view;

pub use account::Account;
pub use archive::{ExportArchive, FilterOptions, FilteredArchive, WriteSummary};
pub use container::{ContainerWriter, EntryInfo, ExportContainer, DEFAULT_COPY_BUFFER_SIZE};
pub use error::{ArchiveError, Result};
pub use item::{DocumentIds, Item};
pub use layout::{filename_to_document_id, ArchiveDiagnostics, DocumentFile, EntryLayout};
pub use selection::{SelectionSpec, SelectionToken, VaultSelector, WILDCARD};
pub use vault::Vault;
pub use view::ViewIndex;

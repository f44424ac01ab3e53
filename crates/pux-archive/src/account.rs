//! Account model: one identity, its vaults, and the filtered subset of them.

use crate::item::DocumentIds;
use crate::json::{as_object, require_array, require_object, require_str};
use crate::selection::VaultSelector;
use crate::vault::Vault;
use crate::view::{FilteredView, ViewIndex};
use crate::{ArchiveError, Result};
use serde_json::{Map, Value};
use tracing::debug;

/// A parsed account with unfiltered and filtered vault views.
#[derive(Debug, Clone)]
pub struct Account<'a> {
    raw: &'a Value,
    attrs: &'a Map<String, Value>,
    uuid: &'a str,
    owner_name: &'a str,
    vaults: Vec<Vault<'a>>,
    unfiltered: ViewIndex<'a>,
    filtered: FilteredView<'a, Value>,
}

impl<'a> Account<'a> {
    /// Parse an account node and apply `selector` to its vaults.
    ///
    /// Vault uuids and names must be unique within the account. The filtered
    /// JSON payload is copied only when a strict subset of vaults is kept.
    pub fn parse(raw: &'a Value, selector: &VaultSelector) -> Result<Self> {
        let data = as_object(raw, "account")?;
        let attrs = require_object(data, "attrs", "account")?;
        let vault_nodes = require_array(data, "vaults", "account")?;
        let uuid = require_str(attrs, "uuid", "account attrs")?;
        let owner_name = require_str(attrs, "name", "account attrs")?;
        let label = attrs
            .get("accountName")
            .and_then(Value::as_str)
            .unwrap_or(uuid);

        let mut vaults = Vec::with_capacity(vault_nodes.len());
        let mut unfiltered = ViewIndex::default();
        let mut selected = ViewIndex::default();

        for node in vault_nodes {
            let vault = Vault::parse(node)?;
            if unfiltered.contains_uuid(vault.uuid()) {
                return Err(ArchiveError::duplicate(format!(
                    "Multiple instances of vault uuid {} in account \"{}\"",
                    vault.uuid(),
                    label
                )));
            }
            if unfiltered.contains_name(vault.name()) {
                return Err(ArchiveError::duplicate(format!(
                    "Multiple instances of vault name \"{}\" in account \"{}\"",
                    vault.name(),
                    label
                )));
            }

            let position = vaults.len();
            unfiltered.insert(position, vault.uuid(), vault.name(), vault.document_ids());
            if selector.matches(vault.uuid(), vault.name()) {
                selected.insert(position, vault.uuid(), vault.name(), vault.document_ids());
            }
            vaults.push(vault);
        }

        let filtered = if selected.len() == unfiltered.len() {
            FilteredView::All
        } else {
            let mut filtered_data: Map<String, Value> = data
                .iter()
                .filter(|(key, _)| key.as_str() != "vaults")
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            let kept: Vec<Value> = selected
                .positions()
                .iter()
                .map(|&i| vaults[i].raw_data().clone())
                .collect();
            filtered_data.insert("vaults".to_string(), Value::Array(kept));
            FilteredView::Subset {
                index: selected,
                data: Value::Object(filtered_data),
            }
        };

        debug!(
            account = %label,
            vaults = unfiltered.len(),
            selected = filtered.index(&unfiltered).len(),
            "Account parsed"
        );

        Ok(Self {
            raw,
            attrs,
            uuid,
            owner_name,
            vaults,
            unfiltered,
            filtered,
        })
    }

    pub fn attrs(&self) -> &'a Map<String, Value> {
        self.attrs
    }

    pub fn uuid(&self) -> &'a str {
        self.uuid
    }

    /// Display name of the account owner (`attrs.name`).
    pub fn owner_name(&self) -> &'a str {
        self.owner_name
    }

    /// Account name (`attrs.accountName`).
    pub fn account_name(&self) -> Result<&'a str> {
        require_str(self.attrs, "accountName", "account attrs")
    }

    pub fn domain(&self) -> Result<&'a str> {
        require_str(self.attrs, "domain", "account attrs")
    }

    pub fn email(&self) -> Result<&'a str> {
        require_str(self.attrs, "email", "account attrs")
    }

    pub fn avatar(&self) -> Result<&'a str> {
        require_str(self.attrs, "avatar", "account attrs")
    }

    /// Account JSON as found in the export.
    pub fn unfiltered_raw_data(&self) -> &'a Value {
        self.raw
    }

    /// Account JSON with only the selected vaults.
    ///
    /// Same object as [`Account::unfiltered_raw_data`] when every vault is kept.
    pub fn filtered_raw_data(&self) -> &Value {
        match &self.filtered {
            FilteredView::All => self.raw,
            FilteredView::Subset { data, .. } => data,
        }
    }

    /// Whether the filtered view shares the unfiltered data.
    pub fn keeps_all_vaults(&self) -> bool {
        self.filtered.is_shared()
    }

    pub fn unfiltered_vaults(&self) -> impl Iterator<Item = &Vault<'a>> {
        self.vaults.iter()
    }

    pub fn filtered_vaults(&self) -> impl Iterator<Item = &Vault<'a>> {
        self.filtered_index()
            .positions()
            .iter()
            .map(|&i| &self.vaults[i])
    }

    pub fn unfiltered_vault_by_uuid(&self, uuid: &str) -> Option<&Vault<'a>> {
        self.unfiltered.position_by_uuid(uuid).map(|i| &self.vaults[i])
    }

    pub fn unfiltered_vault_by_name(&self, name: &str) -> Option<&Vault<'a>> {
        self.unfiltered.position_by_name(name).map(|i| &self.vaults[i])
    }

    pub fn filtered_vault_by_uuid(&self, uuid: &str) -> Option<&Vault<'a>> {
        self.filtered_index()
            .position_by_uuid(uuid)
            .map(|i| &self.vaults[i])
    }

    pub fn filtered_vault_by_name(&self, name: &str) -> Option<&Vault<'a>> {
        self.filtered_index()
            .position_by_name(name)
            .map(|i| &self.vaults[i])
    }

    pub fn num_unfiltered_vaults(&self) -> usize {
        self.unfiltered.len()
    }

    pub fn num_filtered_vaults(&self) -> usize {
        self.filtered_index().len()
    }

    pub fn unfiltered_document_ids(&self) -> &DocumentIds<'a> {
        self.unfiltered.document_ids()
    }

    pub fn filtered_document_ids(&self) -> &DocumentIds<'a> {
        self.filtered_index().document_ids()
    }

    fn filtered_index(&self) -> &ViewIndex<'a> {
        self.filtered.index(&self.unfiltered)
    }
}

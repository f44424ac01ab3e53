//! Vault model: a named collection of items inside one account.

use crate::item::{DocumentIds, Item};
use crate::json::{as_object, require_array, require_object, require_str};
use crate::{ArchiveError, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A parsed vault.
#[derive(Debug, Clone)]
pub struct Vault<'a> {
    raw: &'a Value,
    attrs: &'a Map<String, Value>,
    uuid: &'a str,
    name: &'a str,
    items: Vec<Item<'a>>,
    items_by_uuid: HashMap<&'a str, usize>,
    document_ids: DocumentIds<'a>,
}

impl<'a> Vault<'a> {
    /// Parse a vault node with its `attrs` object and `items` list.
    ///
    /// Item uuids must be unique within the vault.
    pub fn parse(raw: &'a Value) -> Result<Self> {
        let data = as_object(raw, "vault")?;
        let attrs = require_object(data, "attrs", "vault")?;
        let item_nodes = require_array(data, "items", "vault")?;
        let uuid = require_str(attrs, "uuid", "vault attrs")?;
        let name = require_str(attrs, "name", "vault attrs")?;

        let mut items = Vec::with_capacity(item_nodes.len());
        let mut items_by_uuid = HashMap::with_capacity(item_nodes.len());
        let mut document_ids = DocumentIds::new();

        for node in item_nodes {
            let item = Item::parse(node)?;
            if items_by_uuid.insert(item.uuid(), items.len()).is_some() {
                return Err(ArchiveError::duplicate(format!(
                    "Multiple instances of item uuid {} in vault \"{}\"",
                    item.uuid(),
                    name
                )));
            }
            document_ids.extend(item.document_ids().iter().copied());
            items.push(item);
        }

        Ok(Self {
            raw,
            attrs,
            uuid,
            name,
            items,
            items_by_uuid,
            document_ids,
        })
    }

    pub fn raw_data(&self) -> &'a Value {
        self.raw
    }

    pub fn attrs(&self) -> &'a Map<String, Value> {
        self.attrs
    }

    pub fn uuid(&self) -> &'a str {
        self.uuid
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Vault description; empty when absent.
    pub fn description(&self) -> &'a str {
        self.attrs
            .get("desc")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn avatar(&self) -> Result<&'a str> {
        require_str(self.attrs, "avatar", "vault attrs")
    }

    pub fn vault_type(&self) -> Result<&'a str> {
        require_str(self.attrs, "type", "vault attrs")
    }

    pub fn items(&self) -> &[Item<'a>] {
        &self.items
    }

    pub fn item_by_uuid(&self, uuid: &str) -> Option<&Item<'a>> {
        self.items_by_uuid.get(uuid).map(|&i| &self.items[i])
    }

    pub fn num_items(&self) -> usize {
        self.items.len()
    }

    /// Union of document ids over all items.
    pub fn document_ids(&self) -> &DocumentIds<'a> {
        &self.document_ids
    }
}

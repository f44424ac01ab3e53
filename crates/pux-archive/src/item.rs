//! Item model: one stored record and the documents it references.

use crate::json::{as_object, require_str};
use crate::Result;
use serde_json::Value;
use std::collections::BTreeSet;

/// JSON key under which items reference attachment documents.
pub const DOCUMENT_ID_KEY: &str = "documentId";

/// Set of document identifiers borrowed from the export JSON.
pub type DocumentIds<'a> = BTreeSet<&'a str>;

/// A parsed vault item.
///
/// The payload is opaque; only the uuid and document references are extracted.
#[derive(Debug, Clone)]
pub struct Item<'a> {
    raw: &'a Value,
    uuid: &'a str,
    document_ids: DocumentIds<'a>,
}

impl<'a> Item<'a> {
    /// Parse an item node.
    ///
    /// Fails with `MalformedArchive` if the node is not an object or has no
    /// string `uuid`.
    pub fn parse(raw: &'a Value) -> Result<Self> {
        let data = as_object(raw, "item")?;
        let uuid = require_str(data, "uuid", "item")?;

        let mut document_ids = DocumentIds::new();
        collect_document_ids(raw, &mut document_ids);

        Ok(Self {
            raw,
            uuid,
            document_ids,
        })
    }

    pub fn uuid(&self) -> &'a str {
        self.uuid
    }

    pub fn raw_data(&self) -> &'a Value {
        self.raw
    }

    /// Every document id referenced anywhere in the item.
    pub fn document_ids(&self) -> &DocumentIds<'a> {
        &self.document_ids
    }
}

/// Walk objects and arrays, collecting string values stored under `documentId`.
fn collect_document_ids<'a>(node: &'a Value, found: &mut DocumentIds<'a>) {
    match node {
        Value::Object(map) => {
            for (key, value) in map {
                match value {
                    Value::Object(_) | Value::Array(_) => collect_document_ids(value, found),
                    Value::String(id) if key == DOCUMENT_ID_KEY => {
                        found.insert(id.as_str());
                    }
                    _ => {}
                }
            }
        }
        Value::Array(values) => {
            for value in values {
                collect_document_ids(value, found);
            }
        }
        _ => {}
    }
}

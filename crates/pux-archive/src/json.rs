//! Typed lookups into untyped export JSON.
//!
//! Every failure is a [`ArchiveError::MalformedArchive`] naming the
//! property and the kind of node it was expected on.

use crate::{ArchiveError, Result};
use serde_json::{Map, Value};

pub(crate) fn as_object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| ArchiveError::malformed(format!("1Password archive {what} is not an object")))
}

pub(crate) fn require_object<'a>(
    map: &'a Map<String, Value>,
    key: &str,
    what: &str,
) -> Result<&'a Map<String, Value>> {
    require(map, key, what)?.as_object().ok_or_else(|| {
        ArchiveError::malformed(format!(
            "1Password archive {what} \"{key}\" property is not an object"
        ))
    })
}

pub(crate) fn require_array<'a>(
    map: &'a Map<String, Value>,
    key: &str,
    what: &str,
) -> Result<&'a Vec<Value>> {
    require(map, key, what)?.as_array().ok_or_else(|| {
        ArchiveError::malformed(format!(
            "1Password archive {what} \"{key}\" property is not a list"
        ))
    })
}

pub(crate) fn require_str<'a>(map: &'a Map<String, Value>, key: &str, what: &str) -> Result<&'a str> {
    require(map, key, what)?.as_str().ok_or_else(|| {
        ArchiveError::malformed(format!(
            "1Password archive {what} \"{key}\" property is not a string"
        ))
    })
}

fn require<'a>(map: &'a Map<String, Value>, key: &str, what: &str) -> Result<&'a Value> {
    map.get(key).ok_or_else(|| {
        ArchiveError::malformed(format!(
            "1Password archive {what} is missing \"{key}\" property"
        ))
    })
}

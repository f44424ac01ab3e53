//! Indices over the unfiltered and filtered halves of a vault or account list.

use crate::item::DocumentIds;
use std::collections::HashMap;

/// Ordered selection of members (vaults of an account, accounts of an
/// archive) with lookups by uuid and name and the union of their documents.
///
/// Positions refer to the owning list, so one member list can back several
/// indices.
#[derive(Debug, Clone, Default)]
pub struct ViewIndex<'a> {
    positions: Vec<usize>,
    by_uuid: HashMap<&'a str, usize>,
    by_name: HashMap<&'a str, usize>,
    document_ids: DocumentIds<'a>,
}

impl<'a> ViewIndex<'a> {
    pub(crate) fn insert(
        &mut self,
        position: usize,
        uuid: &'a str,
        name: &'a str,
        document_ids: &DocumentIds<'a>,
    ) {
        self.positions.push(position);
        self.by_uuid.insert(uuid, position);
        self.by_name.insert(name, position);
        self.document_ids.extend(document_ids.iter().copied());
    }

    pub(crate) fn contains_uuid(&self, uuid: &str) -> bool {
        self.by_uuid.contains_key(uuid)
    }

    pub(crate) fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Positions of the members in this view, in original order.
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn position_by_uuid(&self, uuid: &str) -> Option<usize> {
        self.by_uuid.get(uuid).copied()
    }

    pub fn position_by_name(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Union of document ids over the members in this view.
    pub fn document_ids(&self) -> &DocumentIds<'a> {
        &self.document_ids
    }
}

/// Filtered half of a view pair.
///
/// When every member is selected the filtered view shares the unfiltered
/// index and JSON payload instead of copying them.
#[derive(Debug, Clone)]
pub(crate) enum FilteredView<'a, T> {
    All,
    Subset { index: ViewIndex<'a>, data: T },
}

impl<'a, T> FilteredView<'a, T> {
    pub(crate) fn index<'s>(&'s self, unfiltered: &'s ViewIndex<'a>) -> &'s ViewIndex<'a> {
        match self {
            FilteredView::All => unfiltered,
            FilteredView::Subset { index, .. } => index,
        }
    }

    pub(crate) fn is_shared(&self) -> bool {
        matches!(self, FilteredView::All)
    }
}

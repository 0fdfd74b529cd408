use crate::types::{Catalog, Record};

/// Upper bound on rows handed to the renderer. It is not the match count.
pub const MAX_RESULTS: usize = 30;

/// Records matching a query, in catalog order, capped at [`MAX_RESULTS`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchResult {
    records: Vec<Record>,
}

impl MatchResult {
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn field_contains(value: &str, needle: &str) -> bool {
    value.to_lowercase().contains(needle)
}

/// Case-insensitive substring match against barcode, item code and item name.
pub fn search(query: &str, catalog: &Catalog) -> MatchResult {
    if query.is_empty() || catalog.is_empty() {
        return MatchResult::default();
    }
    let needle = query.to_lowercase();

    let records = catalog
        .records()
        .iter()
        .filter(|r| {
            field_contains(r.barcode(), &needle)
                || field_contains(r.item_code(), &needle)
                || field_contains(r.item_name(), &needle)
        })
        .take(MAX_RESULTS)
        .cloned()
        .collect();

    MatchResult { records }
}

/// Picks the record to open straight away: only when the query is exactly
/// the barcode of the sole match, and that record has a name to show.
/// A partial query that happens to narrow the list to one row does not count.
pub fn maybe_auto_select<'a>(query: &str, result: &'a MatchResult) -> Option<&'a Record> {
    let [only] = result.records() else {
        return None;
    };
    let barcode = only.barcode.as_deref()?;
    if barcode.is_empty() || barcode.to_lowercase() != query.to_lowercase() {
        return None;
    }
    only.is_displayable().then_some(only)
}

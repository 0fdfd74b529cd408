use chrono::{DateTime, Utc};

/// One row of the price list. Every field is optional because the sheet is
/// edited by hand and nothing about it is trusted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    pub barcode: Option<String>,
    pub item_code: Option<String>,
    pub item_name: Option<String>,
    pub retail_price: Option<String>,
    pub net_price: Option<String>,
    pub discount_percent: Option<String>,
}

impl Record {
    pub fn barcode(&self) -> &str {
        self.barcode.as_deref().unwrap_or("")
    }

    pub fn item_code(&self) -> &str {
        self.item_code.as_deref().unwrap_or("")
    }

    pub fn item_name(&self) -> &str {
        self.item_name.as_deref().unwrap_or("")
    }

    /// A record can only be opened in the detail view when it has a name.
    pub fn is_displayable(&self) -> bool {
        !self.item_name().trim().is_empty()
    }
}

/// A snapshot of the whole price list. Never edited in place; a refresh
/// builds a new one and swaps it in.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    records: Vec<Record>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Catalog {
    pub fn new(records: Vec<Record>, last_updated: Option<DateTime<Utc>>) -> Self {
        Self {
            records,
            last_updated,
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_name_is_not_displayable() {
        let record = Record {
            item_name: Some("   \t".into()),
            ..Default::default()
        };
        assert!(!record.is_displayable());
        assert!(!Record::default().is_displayable());

        let named = Record {
            item_name: Some(" Widget ".into()),
            ..Default::default()
        };
        assert!(named.is_displayable());
    }

    #[test]
    fn missing_fields_read_as_empty() {
        let record = Record::default();
        assert_eq!(record.barcode(), "");
        assert_eq!(record.item_code(), "");
        assert_eq!(record.item_name(), "");
    }
}

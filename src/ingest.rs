use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;

use crate::types::{Catalog, Record};

pub const COLUMNS: [&str; 6] = [
    "Barcode",
    "Item Code",
    "Item Name",
    "Retail Price",
    "Net Price",
    "Discount %",
];

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("network request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("server answered with HTTP {0}")]
    Status(u16),
    #[error("could not parse CSV: {0}")]
    Parse(#[from] csv::Error),
}

/// Messages from a running refresh, in the order they happen.
#[derive(Debug)]
pub enum RefreshProgress {
    Status(String),
    Finished(Result<Catalog, IngestError>),
}

fn http_client() -> Result<Client, IngestError> {
    Ok(Client::builder()
        .user_agent(concat!("pricelist/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .build()?)
}

fn clean_header(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_start_matches('\u{FEFF}')
        .trim()
        .to_string()
}

/// Builds a catalog from the sheet export. Columns are found by header
/// name; a missing column or an empty cell leaves the field empty. Rows are
/// never rejected, so one broken line cannot hide the rest of the list.
pub fn parse_catalog(csv_content: &[u8], fetched_at: DateTime<Utc>) -> Result<Catalog, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(csv_content);

    let headers: Vec<String> = reader.byte_headers()?.iter().map(clean_header).collect();
    // Later duplicates win, the same as keying rows by header name.
    let columns: Vec<Option<usize>> = COLUMNS
        .iter()
        .map(|name| headers.iter().rposition(|h| h == name))
        .collect();
    for (name, col) in COLUMNS.iter().zip(&columns) {
        if col.is_none() {
            log::warn!("Price list has no {:?} column", name);
        }
    }

    let mut records = Vec::new();
    for result in reader.byte_records() {
        let row = result?;
        let cell = |slot: usize| -> Option<String> {
            let raw = row.get(columns[slot]?)?;
            (!raw.is_empty()).then(|| String::from_utf8_lossy(raw).into_owned())
        };
        records.push(Record {
            barcode: cell(0),
            item_code: cell(1),
            item_name: cell(2),
            retail_price: cell(3),
            net_price: cell(4),
            discount_percent: cell(5),
        });
    }

    Ok(Catalog::new(records, Some(fetched_at)))
}

/// Downloads and parses the sheet, reporting each stage through `status`.
pub fn refresh(url: &str, status: impl Fn(&str)) -> Result<Catalog, IngestError> {
    status("Starting data refresh...");
    let response = http_client()?.get(url).send()?;
    let code = response.status();
    if !code.is_success() {
        return Err(IngestError::Status(code.as_u16()));
    }

    status("Downloading CSV from Google Sheets...");
    let body = response.bytes()?;

    status("Parsing CSV...");
    let catalog = parse_catalog(&body, Utc::now())?;
    log::info!("Fetched {} rows from {}", catalog.count(), url);
    Ok(catalog)
}

/// Runs [`refresh`] on its own thread. The last message is always
/// `Finished`, unless the receiver was dropped first.
pub fn spawn_refresh(url: String) -> std::io::Result<Receiver<RefreshProgress>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("refresh".to_string())
        .spawn(move || {
            let result = refresh(&url, |msg| {
                let _ = tx.send(RefreshProgress::Status(msg.to_string()));
            });
            if let Err(e) = &result {
                log::error!("Refresh failed: {}", e);
            }
            let _ = tx.send(RefreshProgress::Finished(result));
        })?;
    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Catalog {
        parse_catalog(text.as_bytes(), Utc::now()).unwrap()
    }

    #[test]
    fn reads_rows_by_header_name() {
        let catalog = parse(
            "Item Name,Barcode,Item Code,Retail Price,Net Price,Discount %\n\
             Widget,111,A1,\"1,000\",900,10\n",
        );
        assert_eq!(catalog.count(), 1);
        let r = &catalog.records()[0];
        assert_eq!(r.barcode(), "111");
        assert_eq!(r.item_code(), "A1");
        assert_eq!(r.item_name(), "Widget");
        assert_eq!(r.retail_price.as_deref(), Some("1,000"));
        assert_eq!(r.net_price.as_deref(), Some("900"));
        assert_eq!(r.discount_percent.as_deref(), Some("10"));
        assert!(catalog.last_updated.is_some());
    }

    #[test]
    fn missing_columns_and_cells_stay_empty() {
        let catalog = parse("\u{FEFF}Barcode , Item Name,Notes\n222,,fragile\n333\n");
        assert_eq!(catalog.count(), 2);
        let first = &catalog.records()[0];
        assert_eq!(first.barcode(), "222");
        assert_eq!(first.item_name, None);
        assert_eq!(first.item_code, None);
        assert_eq!(first.retail_price, None);
        // short row, flexible reader keeps it
        assert_eq!(catalog.records()[1].barcode(), "333");
        assert_eq!(catalog.records()[1].item_name, None);
    }

    #[test]
    fn skips_blank_lines() {
        let catalog = parse("Barcode,Item Name\n\n111,Widget\n\n\n222,Gadget\n");
        let names: Vec<&str> = catalog.records().iter().map(|r| r.item_name()).collect();
        assert_eq!(names, vec!["Widget", "Gadget"]);
    }

    #[test]
    fn invalid_utf8_is_replaced_not_rejected() {
        let catalog = parse_catalog(b"Barcode,Item Name\n444,Caf\xE9\n", Utc::now()).unwrap();
        assert_eq!(catalog.count(), 1);
        assert_eq!(catalog.records()[0].item_name(), "Caf\u{FFFD}");
    }

    #[test]
    fn header_only_sheet_is_empty_catalog() {
        let catalog = parse("Barcode,Item Code,Item Name\n");
        assert!(catalog.is_empty());
        assert!(catalog.last_updated.is_some());
    }
}

use std::sync::Arc;

use chrono_tz::Tz;

use crate::barcode;
use crate::search::{self, MatchResult};
use crate::types::{Catalog, Record};
use crate::utils::format_short_date;

/// Input to the lookup pipeline. Keystrokes, scans and clicks all arrive as
/// one of these.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    QueryEdited(String),
    CodeDetected(String),
    RecordChosen(usize),
    DetailClosed,
}

/// What the screen should show after a message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    pub query: String,
    pub results: MatchResult,
    pub detail: Option<Record>,
}

pub struct AppState {
    catalog: Arc<Catalog>,
    query: String,
    last_result: MatchResult,
}

impl AppState {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
            query: String::new(),
            last_result: MatchResult::default(),
        }
    }

    pub fn catalog(&self) -> Arc<Catalog> {
        self.catalog.clone()
    }

    /// Swaps in a freshly loaded catalog and re-runs the current query
    /// against it, so listed rows always come from the live snapshot. Never
    /// opens a detail panel on its own.
    pub fn replace_catalog(&mut self, catalog: Catalog) -> Outcome {
        self.catalog = Arc::new(catalog);
        self.last_result = search::search(&self.query, &self.catalog);
        self.outcome(None)
    }

    /// Header line, e.g. `Items: 1475. Updated: 3/18/25`.
    pub fn data_info(&self, tz: Tz) -> String {
        let updated = self
            .catalog
            .last_updated
            .map(|at| format_short_date(at, tz))
            .unwrap_or_else(|| "N/A".to_string());
        format!("Items: {}. Updated: {}", self.catalog.count(), updated)
    }

    pub fn handle(&mut self, message: Message) -> Outcome {
        match message {
            Message::QueryEdited(text) => self.run_query(text),
            Message::CodeDetected(raw) => self.run_query(barcode::normalize(&raw)),
            Message::RecordChosen(index) => {
                let detail = self
                    .last_result
                    .get(index)
                    .filter(|r| r.is_displayable())
                    .cloned();
                self.outcome(detail)
            }
            Message::DetailClosed => self.outcome(None),
        }
    }

    fn run_query(&mut self, query: String) -> Outcome {
        let catalog = self.catalog.clone();
        let result = search::search(&query, &catalog);
        let detail = search::maybe_auto_select(&query, &result).cloned();
        self.query = query;
        self.last_result = result;
        self.outcome(detail)
    }

    fn outcome(&self, detail: Option<Record>) -> Outcome {
        Outcome {
            query: self.query.clone(),
            results: self.last_result.clone(),
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn rec(barcode: &str, code: &str, name: &str) -> Record {
        Record {
            barcode: Some(barcode.into()),
            item_code: Some(code.into()),
            item_name: Some(name.into()),
            ..Default::default()
        }
    }

    fn state() -> AppState {
        AppState::new(Catalog::new(
            vec![
                rec("6009880123456", "HW-1", "Hammer"),
                rec("6009880777777", "HW-2", "Mallet"),
                rec("5550001", "NN-1", ""),
            ],
            None,
        ))
    }

    #[test]
    fn scanned_barcode_opens_detail() {
        let mut s = state();
        let out = s.handle(Message::CodeDetected("6009880123456\r\n".into()));
        assert_eq!(out.query, "6009880123456");
        assert_eq!(out.results.len(), 1);
        assert_eq!(out.detail.as_ref().map(|r| r.item_code()), Some("HW-1"));
    }

    #[test]
    fn typing_a_prefix_does_not_open_detail() {
        let mut s = state();
        let out = s.handle(Message::QueryEdited("6009880".into()));
        assert_eq!(out.results.len(), 2);
        assert!(out.detail.is_none());

        let out = s.handle(Message::QueryEdited("60098801".into()));
        assert_eq!(out.results.len(), 1);
        assert!(out.detail.is_none());
    }

    #[test]
    fn clearing_the_query_clears_results() {
        let mut s = state();
        s.handle(Message::QueryEdited("hammer".into()));
        let out = s.handle(Message::QueryEdited(String::new()));
        assert!(out.results.is_empty());
        assert!(out.detail.is_none());
    }

    #[test]
    fn choosing_a_row_respects_displayability() {
        let mut s = state();
        s.handle(Message::QueryEdited("1".into()));

        let out = s.handle(Message::RecordChosen(0));
        assert_eq!(out.detail.as_ref().map(|r| r.item_name()), Some("Hammer"));

        let nameless = s
            .handle(Message::QueryEdited("nn-1".into()))
            .results
            .len();
        assert_eq!(nameless, 1);
        assert!(s.handle(Message::RecordChosen(0)).detail.is_none());
        assert!(s.handle(Message::RecordChosen(7)).detail.is_none());
    }

    #[test]
    fn scanning_a_nameless_record_lists_it_without_detail() {
        let mut s = state();
        let out = s.handle(Message::CodeDetected("5550001".into()));
        assert_eq!(out.results.len(), 1);
        assert!(out.detail.is_none());
    }

    #[test]
    fn replacing_catalog_swaps_snapshot() {
        let mut s = state();
        let before = s.catalog();
        s.handle(Message::QueryEdited("hammer".into()));

        let out = s.replace_catalog(Catalog::new(vec![rec("1", "Z", "Zip tie")], None));
        assert_eq!(out.query, "hammer");
        assert!(out.results.is_empty());
        assert_eq!(before.count(), 3);
        assert_eq!(s.catalog().count(), 1);
        assert!(s.handle(Message::RecordChosen(0)).detail.is_none());
        assert_eq!(s.handle(Message::QueryEdited("zip".into())).results.len(), 1);
    }

    #[test]
    fn refresh_keeps_query_without_popping_detail() {
        let mut s = state();
        s.handle(Message::CodeDetected("6009880123456".into()));
        let out = s.replace_catalog(Catalog::new(
            vec![rec("6009880123456", "HW-1", "Hammer v2")],
            None,
        ));
        assert_eq!(out.results.len(), 1);
        assert!(out.detail.is_none());
        let chosen = s.handle(Message::RecordChosen(0)).detail;
        assert_eq!(chosen.as_ref().map(|r| r.item_name()), Some("Hammer v2"));
    }

    #[test]
    fn data_info_line() {
        let s = state();
        assert_eq!(s.data_info(Tz::UTC), "Items: 3. Updated: N/A");

        let at = Utc.with_ymd_and_hms(2025, 3, 18, 12, 0, 0).unwrap();
        let s = AppState::new(Catalog::new(vec![], Some(at)));
        assert_eq!(s.data_info(Tz::UTC), "Items: 0. Updated: 3/18/25");
    }
}

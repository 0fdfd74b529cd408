use std::rc::Rc;

use slint::SharedString;

use crate::app_state::Outcome;
use crate::types::Record;
use crate::ui::{DetailView, MainWindow, ResultRow};
use crate::utils::format_optional_number;

/// Formatted price fields of one record.
pub struct Pricing {
    pub retail: String,
    pub discount: String,
    pub net: String,
}

impl Pricing {
    pub fn of(record: &Record) -> Self {
        Self {
            retail: format_optional_number(record.retail_price.as_deref()),
            discount: format_optional_number(record.discount_percent.as_deref()),
            net: format_optional_number(record.net_price.as_deref()),
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Retail: {} | Disc : {}% | Net: {}",
            self.retail, self.discount, self.net
        )
    }
}

pub fn result_row(record: &Record) -> ResultRow {
    ResultRow {
        name: SharedString::from(record.item_name()),
        code: SharedString::from(record.item_code()),
        barcode: SharedString::from(record.barcode()),
        pricing: SharedString::from(Pricing::of(record).summary()),
    }
}

pub fn detail_view(record: &Record) -> DetailView {
    let pricing = Pricing::of(record);
    DetailView {
        name: SharedString::from(record.item_name()),
        code: SharedString::from(record.item_code()),
        barcode: SharedString::from(record.barcode()),
        retail: SharedString::from(pricing.retail),
        discount: SharedString::from(pricing.discount),
        net: SharedString::from(pricing.net),
    }
}

/// Pushes an outcome onto the window. Returns the record whose detail panel
/// was opened, so the caller can go and fetch its thumbnail.
pub fn render(ui: &MainWindow, outcome: &Outcome) -> Option<Record> {
    let rows: Vec<ResultRow> = outcome.results.records().iter().map(result_row).collect();
    ui.set_results(Rc::new(slint::VecModel::from(rows)).into());

    match outcome.detail.as_ref().filter(|r| r.is_displayable()) {
        Some(record) => {
            ui.set_detail(detail_view(record));
            ui.set_detail_has_image(false);
            ui.set_show_detail(true);
            Some(record.clone())
        }
        None => {
            ui.set_show_detail(false);
            None
        }
    }
}

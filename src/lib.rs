pub mod app_state;
pub mod barcode;
pub mod config;
pub mod db;
pub mod decoder;
pub mod display;
pub mod event_handlers;
pub mod ingest;
pub mod scan_session;
pub mod search;
pub mod thumbnail;
pub mod timers;
pub mod types;
pub mod ui_setup;
pub mod utils;

pub mod ui {
    slint::include_modules!();
}

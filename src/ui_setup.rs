use std::cell::RefCell;
use std::rc::Rc;

use slint::SharedString;

use crate::app_state::AppState;
use crate::config::AppConfig;
use crate::decoder::{self, DeviceInfo};
use crate::scan_session::ScanSession;
use crate::types::Catalog;

/// Everything the UI callbacks share. Cheap to clone; all fields are `Rc`.
#[derive(Clone)]
pub struct AppContext {
    pub conn: Rc<RefCell<rusqlite::Connection>>,
    pub state: Rc<RefCell<AppState>>,
    pub session: Rc<RefCell<ScanSession>>,
    pub devices: Rc<RefCell<Vec<DeviceInfo>>>,
    pub config: Rc<AppConfig>,
}

impl AppContext {
    pub fn shutdown(&self) {
        self.session.borrow_mut().stop();
    }
}

pub fn initialize_ui_and_data(
    ui: &crate::ui::MainWindow,
    conn: Rc<RefCell<rusqlite::Connection>>,
    config: AppConfig,
) -> Result<AppContext, Box<dyn std::error::Error>> {
    let catalog = match crate::db::load_catalog(&conn.borrow()) {
        Ok(catalog) => catalog,
        Err(e) => {
            log::error!("Could not read cached price list: {}", e);
            ui.set_status_message(format!("Could not read cached price list: {}", e).into());
            Catalog::default()
        }
    };
    log::info!("Loaded {} cached rows", catalog.count());
    if catalog.is_empty() {
        ui.set_status_message("No price list yet. Press Refresh to download it.".into());
    }

    let state = AppState::new(catalog);
    ui.set_data_info(state.data_info(config.timezone()).into());

    let session = ScanSession::new(decoder::from_config(&config.scanner));

    let ctx = AppContext {
        conn,
        state: Rc::new(RefCell::new(state)),
        session: Rc::new(RefCell::new(session)),
        devices: Rc::new(RefCell::new(Vec::new())),
        config: Rc::new(config),
    };
    refresh_devices(ui, &ctx);

    Ok(ctx)
}

/// Re-reads the scanner list and keeps the remembered device selected when it
/// is still plugged in.
pub fn refresh_devices(ui: &crate::ui::MainWindow, ctx: &AppContext) {
    let devices = ctx.session.borrow().devices();
    let preferred = crate::db::get_preferred_device(&ctx.conn.borrow()).unwrap_or_else(|e| {
        log::warn!("Could not read preferred scanner: {}", e);
        None
    });

    let selected = preferred
        .as_deref()
        .and_then(|id| devices.iter().position(|d| d.id == id))
        .map(|i| i as i32)
        .unwrap_or(-1);

    let labels: Vec<SharedString> = devices
        .iter()
        .map(|d| SharedString::from(d.label.as_str()))
        .collect();
    ui.set_devices(Rc::new(slint::VecModel::from(labels)).into());
    ui.set_selected_device(selected);

    log::debug!("{} scanner device(s) found", devices.len());
    *ctx.devices.borrow_mut() = devices;
}

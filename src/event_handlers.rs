use std::rc::Rc;

use slint::ComponentHandle;

use crate::app_state::Message;
use crate::scan_session::ScanError;
use crate::timers::{self, Timers};
use crate::ui::MainWindow;
use crate::ui_setup::{self, AppContext};

/// Runs one message through the lookup pipeline and renders the outcome.
pub fn dispatch(ctx: &AppContext, ui: &MainWindow, message: Message) {
    let outcome = ctx.state.borrow_mut().handle(message);
    if let Some(record) = crate::display::render(ui, &outcome) {
        if let Some(base) = ctx.config.thumbnail_base() {
            crate::thumbnail::spawn_fetch(
                ui.as_weak(),
                base,
                &ctx.config.thumbnail_dir(),
                record.item_code(),
            );
        }
    }
}

pub fn setup_event_handlers(ctx: AppContext, timers: Rc<Timers>, ui: &MainWindow) {
    let ui_handle = ui.as_weak();

    let ctx_search = ctx.clone();
    let timers_search = timers.clone();
    let ui_handle_search = ui_handle.clone();
    ui.on_search_edited(move |text| {
        if let Some(ui) = ui_handle_search.upgrade() {
            dispatch(&ctx_search, &ui, Message::QueryEdited(text.to_string()));
        }
        if let Some(delay) = ctx_search.config.clear_after() {
            timers::restart_clear_timer(&timers_search, delay, ui_handle_search.clone());
        }
    });

    let ctx_click = ctx.clone();
    let ui_handle_click = ui_handle.clone();
    ui.on_result_clicked(move |index| {
        let Ok(index) = usize::try_from(index) else {
            return;
        };
        if let Some(ui) = ui_handle_click.upgrade() {
            dispatch(&ctx_click, &ui, Message::RecordChosen(index));
        }
    });

    let ctx_close_detail = ctx.clone();
    let ui_handle_close_detail = ui_handle.clone();
    ui.on_close_detail(move || {
        if let Some(ui) = ui_handle_close_detail.upgrade() {
            dispatch(&ctx_close_detail, &ui, Message::DetailClosed);
            ui.invoke_focus_search();
        }
    });

    let ctx_refresh = ctx.clone();
    let timers_refresh = timers.clone();
    let ui_handle_refresh = ui_handle.clone();
    ui.on_refresh_clicked(move || {
        let Some(ui) = ui_handle_refresh.upgrade() else {
            return;
        };
        if timers_refresh.refresh_pump.running() {
            ui.set_status_message("A refresh is already running.".into());
            return;
        }
        match crate::ingest::spawn_refresh(ctx_refresh.config.sheet_url.clone()) {
            Ok(progress) => {
                ui.set_refreshing(true);
                ui.set_status_message("Starting data refresh...".into());
                timers::start_refresh_pump(
                    &timers_refresh,
                    ctx_refresh.clone(),
                    progress,
                    ui_handle_refresh.clone(),
                );
            }
            Err(e) => {
                log::error!("Could not start refresh: {}", e);
                ui.set_status_message(format!("Error refreshing data: {}", e).into());
            }
        }
    });

    let ctx_scan = ctx.clone();
    let timers_scan = timers.clone();
    let ui_handle_scan = ui_handle.clone();
    ui.on_scan_clicked(move || {
        let Some(ui) = ui_handle_scan.upgrade() else {
            return;
        };
        if ctx_scan.devices.borrow().is_empty() {
            ui_setup::refresh_devices(&ui, &ctx_scan);
        }

        // The user picks the scanner; nothing is chosen on their behalf.
        let selected = usize::try_from(ui.get_selected_device())
            .ok()
            .and_then(|i| ctx_scan.devices.borrow().get(i).cloned());
        let Some(device) = selected else {
            ui.set_status_message("Choose a scanner first.".into());
            return;
        };

        let started = ctx_scan.session.borrow_mut().start(&device.id);
        match started {
            Ok(()) => {
                ui.set_scanner_status(format!("Waiting for a code from {}", device.label).into());
                ui.set_show_scanner(true);
                timers::start_scan_pump(&timers_scan, ctx_scan.clone(), ui_handle_scan.clone());
            }
            Err(ScanError::AlreadyActive) => {
                ui.set_status_message("The scanner is already running.".into());
            }
            Err(ScanError::Device(e)) => {
                ui.set_status_message(format!("Scanner error: {}", e).into());
                // the device may have been unplugged; offer the current list
                ui_setup::refresh_devices(&ui, &ctx_scan);
            }
        }
    });

    let ctx_close_scanner = ctx.clone();
    let timers_close_scanner = timers.clone();
    let ui_handle_close_scanner = ui_handle.clone();
    ui.on_close_scanner(move || {
        ctx_close_scanner.session.borrow_mut().stop();
        timers_close_scanner.scan_pump.stop();
        if let Some(ui) = ui_handle_close_scanner.upgrade() {
            ui.set_show_scanner(false);
            ui.invoke_focus_search();
        }
    });

    let ctx_device = ctx.clone();
    ui.on_device_selected(move |index| {
        let Ok(index) = usize::try_from(index) else {
            return;
        };
        let Some(device) = ctx_device.devices.borrow().get(index).cloned() else {
            return;
        };
        log::info!("Scanner set to {}", device.id);
        if let Err(e) = crate::db::set_preferred_device(&ctx_device.conn.borrow(), &device.id) {
            log::warn!("Could not remember scanner choice: {}", e);
        }
    });
}

use std::rc::{Rc, Weak};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;

use chrono::Utc;

use crate::app_state::Message;
use crate::ingest::RefreshProgress;
use crate::scan_session::SessionEvent;
use crate::ui::MainWindow;
use crate::ui_setup::AppContext;
use crate::utils::format_timestamp;

const REFRESH_POLL: Duration = Duration::from_millis(100);

/// UI-thread timers. Callbacks hold a `Weak` back to this struct so a timer
/// never keeps itself alive.
#[derive(Default)]
pub struct Timers {
    pub clear_search: slint::Timer,
    pub scan_pump: slint::Timer,
    pub refresh_pump: slint::Timer,
}

impl Timers {
    pub fn stop_all(&self) {
        self.clear_search.stop();
        self.scan_pump.stop();
        self.refresh_pump.stop();
    }
}

/// Empties the search box a while after the last keystroke. Results stay.
pub fn restart_clear_timer(timers: &Timers, delay: Duration, ui_handle: slint::Weak<MainWindow>) {
    timers
        .clear_search
        .start(slint::TimerMode::SingleShot, delay, move || {
            if let Some(ui) = ui_handle.upgrade() {
                ui.set_search_text("".into());
            }
        });
}

/// Drains the scan session while it is active and stops itself as soon as
/// the session goes back to idle.
pub fn start_scan_pump(timers: &Rc<Timers>, ctx: AppContext, ui_handle: slint::Weak<MainWindow>) {
    let weak_timers: Weak<Timers> = Rc::downgrade(timers);
    timers.scan_pump.start(
        slint::TimerMode::Repeated,
        ctx.config.scanner.poll_interval(),
        move || {
            let event = ctx.session.borrow_mut().poll();
            if !ctx.session.borrow().is_active() {
                if let Some(timers) = weak_timers.upgrade() {
                    timers.scan_pump.stop();
                }
            }

            let Some(ui) = ui_handle.upgrade() else {
                return;
            };
            match event {
                Some(SessionEvent::Detected(code)) => {
                    ui.set_show_scanner(false);
                    ui.set_search_text(crate::barcode::normalize(&code).into());
                    crate::event_handlers::dispatch(&ctx, &ui, Message::CodeDetected(code));
                    ui.invoke_focus_search();
                }
                Some(SessionEvent::Ended(err)) => {
                    ui.set_show_scanner(false);
                    ui.set_status_message(format!("Scanner stopped: {}", err).into());
                }
                None => {}
            }
        },
    );
}

/// Follows a background refresh, mirroring its progress on the status line
/// and swapping in the new catalog when it lands.
pub fn start_refresh_pump(
    timers: &Rc<Timers>,
    ctx: AppContext,
    progress: Receiver<RefreshProgress>,
    ui_handle: slint::Weak<MainWindow>,
) {
    let weak_timers: Weak<Timers> = Rc::downgrade(timers);
    let finish = move || {
        if let Some(timers) = weak_timers.upgrade() {
            timers.refresh_pump.stop();
        }
    };

    timers
        .refresh_pump
        .start(slint::TimerMode::Repeated, REFRESH_POLL, move || {
            let Some(ui) = ui_handle.upgrade() else {
                finish();
                return;
            };
            loop {
                match progress.try_recv() {
                    Ok(RefreshProgress::Status(msg)) => ui.set_status_message(msg.into()),
                    Ok(RefreshProgress::Finished(Ok(catalog))) => {
                        let rows = catalog.count();
                        let loaded_at = catalog.last_updated.unwrap_or_else(Utc::now);
                        let tz = ctx.config.timezone();

                        let saved = crate::db::save_catalog(&mut ctx.conn.borrow_mut(), &catalog);
                        let outcome = ctx.state.borrow_mut().replace_catalog(catalog);
                        crate::display::render(&ui, &outcome);
                        ui.set_data_info(ctx.state.borrow().data_info(tz).into());

                        let mut status = format!(
                            "Data refreshed successfully. {} rows loaded on {}.",
                            rows,
                            format_timestamp(loaded_at, tz)
                        );
                        if let Err(e) = saved {
                            log::error!("Could not cache price list: {}", e);
                            status.push_str(&format!(" (not saved offline: {})", e));
                        }
                        ui.set_status_message(status.into());
                        ui.set_refreshing(false);
                        finish();
                        return;
                    }
                    Ok(RefreshProgress::Finished(Err(e))) => {
                        ui.set_status_message(format!("Error refreshing data: {}", e).into());
                        ui.set_refreshing(false);
                        finish();
                        return;
                    }
                    Err(TryRecvError::Empty) => return,
                    Err(TryRecvError::Disconnected) => {
                        ui.set_status_message("Error refreshing data: worker stopped".into());
                        ui.set_refreshing(false);
                        finish();
                        return;
                    }
                }
            }
        });
}

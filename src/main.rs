use slint::ComponentHandle;
use std::cell::RefCell;
use std::rc::Rc;

use pricelist::config::AppConfig;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = AppConfig::default_path();
    let config = AppConfig::load(&config_path).unwrap_or_else(|e| {
        log::warn!("{}; using defaults", e);
        AppConfig::default()
    });

    let cache_path = config.cache_path();
    if let Some(parent) = cache_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    log::info!("Using cache {}", cache_path.display());
    let conn = pricelist::db::init_db(&cache_path)?;
    let conn = Rc::new(RefCell::new(conn));

    let ui = pricelist::ui::MainWindow::new()?;

    let ctx = pricelist::ui_setup::initialize_ui_and_data(&ui, conn, config)?;
    let timers = Rc::new(pricelist::timers::Timers::default());

    pricelist::event_handlers::setup_event_handlers(ctx.clone(), timers.clone(), &ui);

    ui.invoke_focus_search();
    ui.run()?;

    timers.stop_all();
    ctx.shutdown();
    Ok(())
}

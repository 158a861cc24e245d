mod acquisition;
mod app;
mod config;
mod domain;
mod feed;
mod github;
mod logging;
mod metrics;
mod storage;
mod widgets;

use app::{APP_NAME, DashboardApp};
use config::DashboardConfig;
use eframe::NativeOptions;

fn main() -> eframe::Result<()> {
    logging::init_logging("info");

    let config = DashboardConfig::load();
    tracing::info!(username = %config.username, "starting activity dashboard");

    let options = NativeOptions::default();
    eframe::run_native(
        APP_NAME,
        options,
        Box::new(|cc| Ok(Box::new(DashboardApp::new(cc, config)))),
    )
}

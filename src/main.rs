mod app;
mod color;
mod config;
mod data;
mod state;
mod ui;

use anyhow::Context;
use app::HaloViewerApp;
use config::AppConfig;
use eframe::egui;
use state::AppState;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let source = data::source::resolve_source(&config);
    log::info!("data source: {source}");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(ui::panels::PAGE_TITLE)
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([720.0, 480.0]),
        ..Default::default()
    };

    let state = AppState::new(source, config.marker_size);
    eframe::run_native(
        ui::panels::PAGE_TITLE,
        options,
        Box::new(|_cc| Ok(Box::new(HaloViewerApp::new(state)))),
    )
    .map_err(|e| anyhow::anyhow!("viewer exited with an error: {e}"))
}

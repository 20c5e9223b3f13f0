#![windows_subsystem = "windows"]

mod calendar;
mod data_loaders;
mod fonts;
mod layout;
mod lock;
mod logging;
mod paths;
mod renderer;
mod setter;
mod wallpaper_engine;

use std::process::ExitCode;

use crate::wallpaper_engine::WallpaperEngine;

pub const APP_NAME: &str = "lifegrid";
pub const DEBUG_NAME: &str = "LIFEGRID";

fn main() -> ExitCode {
    logging::init();

    std::panic::set_hook(Box::new(|panic_info| {
        error!("[{}] Panic: {}", DEBUG_NAME, panic_info);
    }));

    info!(
        "!---------- [{}] Starting {} wallpaper update ----------!",
        DEBUG_NAME, APP_NAME
    );

    let base_dir = paths::base_dir();
    info!("[{}] Base directory: {}", DEBUG_NAME, base_dir.display());

    let engine = WallpaperEngine::new(&base_dir);
    if engine.run_auto() {
        ExitCode::SUCCESS
    } else {
        error!(
            "[{}] Wallpaper update failed - check {}",
            DEBUG_NAME,
            paths::LOG_FILE
        );
        ExitCode::from(1)
    }
}

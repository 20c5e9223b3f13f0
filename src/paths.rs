// ~/lifegrid/src/paths.rs

use std::path::PathBuf;

pub const CONFIG_FILE: &str = "lifegrid_config.json";
pub const WALLPAPER_FILE: &str = "lifegrid_wallpaper.png";
pub const LOCK_FILE: &str = ".lifegrid.lock";
pub const LOG_FILE: &str = "lifegrid.log";

pub const CONFIG_MISSING_MARKER_FILE: &str = "ERROR_CONFIG_NOT_FOUND.txt";
pub const UPDATE_FAILED_MARKER_FILE: &str = "ERROR_GENERATION_FAILED.txt";

/// Every marker a failed run can leave behind; a successful run sweeps
/// them all.
pub const ERROR_MARKER_FILES: &[&str] =
    &[CONFIG_MISSING_MARKER_FILE, UPDATE_FAILED_MARKER_FILE];

/// All well-known files live next to the executable; when the exe location
/// cannot be resolved the current working directory stands in.
pub fn base_dir() -> PathBuf {
    match std::env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(fallback_dir),
        Err(_) => fallback_dir(),
    }
}

pub fn log_path() -> PathBuf {
    base_dir().join(LOG_FILE)
}

fn fallback_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

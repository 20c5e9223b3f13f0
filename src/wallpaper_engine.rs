use std::{
    fs,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::calendar::{CalendarData, CalendarError};
use crate::data_loaders::config::{CalendarConfig, ConfigError};
use crate::fonts::FontCache;
use crate::layout::GridLayout;
use crate::lock::{LockError, LockGuard};
use crate::renderer::{RenderError, WallpaperRenderer};
use crate::setter::{self, ApplyError};
use crate::{debug, error, info, paths, DEBUG_NAME};

const TITLE_OFFSET: i32 = 110;
const SUBTITLE_OFFSET: i32 = 75;
const STATS_WITH_SUBTITLE_OFFSET: i32 = 45;
const STATS_OFFSET: i32 = 65;
const LEGEND_OFFSET: i32 = 50;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Apply(#[from] ApplyError),
    #[error(transparent)]
    Lock(#[from] LockError),
}

/// Headless generation pipeline: lock, validate, render, apply. One instance
/// per process; the font cache rides along so repeat generations reuse the
/// resolved face.
pub struct WallpaperEngine {
    base_dir: PathBuf,
    config_path: PathBuf,
    wallpaper_path: PathBuf,
    lock_path: PathBuf,
    fonts: FontCache,
}

impl WallpaperEngine {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
            config_path: base_dir.join(paths::CONFIG_FILE),
            wallpaper_path: base_dir.join(paths::WALLPAPER_FILE),
            lock_path: base_dir.join(paths::LOCK_FILE),
            fonts: FontCache::new(),
        }
    }

    /// Full unattended run. Every failure is logged here, leaves a marker
    /// file, and collapses into the returned flag; the caller only maps it
    /// to an exit code. A successful run sweeps markers from earlier
    /// failures.
    pub fn run_auto(&self) -> bool {
        match self.try_run() {
            Ok(()) => {
                self.clear_error_markers();
                info!("[{}] Wallpaper updated successfully", DEBUG_NAME);
                true
            }
            Err(e) => {
                self.report_failure(&e);
                false
            }
        }
    }

    fn try_run(&self) -> Result<(), EngineError> {
        let _lock = LockGuard::acquire(&self.lock_path)?;
        let wallpaper = self.generate()?;
        setter::apply(&wallpaper)?;
        Ok(())
    }

    /// Validate the configuration and render the wallpaper image, returning
    /// the path of the atomically replaced PNG.
    pub fn generate(&self) -> Result<PathBuf, EngineError> {
        debug!("[{}] Validating configuration", DEBUG_NAME);
        let config = CalendarConfig::load(&self.config_path)?;
        config.validate()?;

        debug!("[{}] Generating {:?} wallpaper", DEBUG_NAME, config.mode);
        let data = CalendarData::from_config(&config)?;
        let progress = data.calculate();
        let layout = GridLayout::new(
            data.mode(),
            progress.total_units,
            config.resolution_width,
            config.resolution_height,
        );

        let mut renderer = WallpaperRenderer::new(
            config.resolution_width,
            config.resolution_height,
            self.fonts.get(),
        );

        renderer.draw_title(&data.title(), layout.start_y - TITLE_OFFSET);

        let subtitle = data.subtitle();
        if subtitle.is_empty() {
            renderer.draw_stats(&progress.stats_text, layout.start_y - STATS_OFFSET);
        } else {
            renderer.draw_subtitle(subtitle, layout.start_y - SUBTITLE_OFFSET);
            renderer.draw_stats(
                &progress.stats_text,
                layout.start_y - STATS_WITH_SUBTITLE_OFFSET,
            );
        }

        renderer.draw_grid(&layout, progress.total_units, progress.filled_units);
        renderer.draw_legend(
            &data.legend(),
            layout.start_y + layout.grid_height as i32 + LEGEND_OFFSET,
        );

        renderer.save(&self.wallpaper_path)?;
        info!(
            "[{}] Wallpaper generated: {}",
            DEBUG_NAME,
            self.wallpaper_path.display()
        );

        Ok(self.wallpaper_path.clone())
    }

    /// The unattended path has no console: every failure leaves a visible
    /// note next to the executable on top of the log detail. A missing
    /// config gets its own marker with the remedy; everything else points
    /// at the log.
    fn report_failure(&self, err: &EngineError) {
        match err {
            EngineError::Config(ConfigError::Missing) => {
                error!(
                    "[{}] Config file not found: {}",
                    DEBUG_NAME,
                    self.config_path.display()
                );
            }
            EngineError::Config(e) => {
                error!("[{}] Configuration rejected: {}", DEBUG_NAME, e);
            }
            EngineError::Calendar(e) => {
                error!("[{}] Calendar construction failed: {}", DEBUG_NAME, e);
            }
            EngineError::Render(e) => {
                error!("[{}] Generation failed: {}", DEBUG_NAME, e);
            }
            EngineError::Apply(e) => {
                error!("[{}] Failed to set wallpaper: {}", DEBUG_NAME, e);
            }
            EngineError::Lock(e) => {
                error!("[{}] {}", DEBUG_NAME, e);
            }
        }

        match err {
            EngineError::Config(ConfigError::Missing) => self.write_marker(
                paths::CONFIG_MISSING_MARKER_FILE,
                &format!(
                    "lifegrid error\n\
                     ==============\n\
                     Configuration file not found:\n    {}\n\n\
                     Solution: run the configuration UI once to create it,\n\
                     then re-run the scheduled update.\n",
                    self.config_path.display()
                ),
            ),
            _ => self.write_marker(
                paths::UPDATE_FAILED_MARKER_FILE,
                &format!(
                    "lifegrid error\n\
                     ==============\n\
                     Wallpaper update failed\n\n\
                     Check {} for details\n",
                    paths::LOG_FILE
                ),
            ),
        }
    }

    fn write_marker(&self, name: &str, text: &str) {
        let _ = fs::write(self.base_dir.join(name), text);
    }

    fn clear_error_markers(&self) {
        for name in paths::ERROR_MARKER_FILES {
            let _ = fs::remove_file(self.base_dir.join(name));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::data_loaders::config::{CalendarConfig, Mode};

    use super::*;

    fn write_config(dir: &Path, config: &CalendarConfig) {
        config.save(&dir.join(paths::CONFIG_FILE)).unwrap();
    }

    #[test]
    fn generate_produces_a_real_png() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            &CalendarConfig {
                mode: Mode::Year,
                ..CalendarConfig::default()
            },
        );

        let engine = WallpaperEngine::new(dir.path());
        let wallpaper = engine.generate().unwrap();

        let bytes = fs::read(&wallpaper).unwrap();
        assert_eq!(&bytes[..4], &[0x89, b'P', b'N', b'G']);
        // Comfortably above the applier's corruption threshold.
        assert!(bytes.len() > 1000);
    }

    #[test]
    fn generate_covers_all_three_modes() {
        let dir = tempfile::tempdir().unwrap();
        let engine = WallpaperEngine::new(dir.path());

        let configs = [
            CalendarConfig {
                mode: Mode::Life,
                dob: "1990-05-15".to_string(),
                ..CalendarConfig::default()
            },
            CalendarConfig {
                mode: Mode::Year,
                ..CalendarConfig::default()
            },
            CalendarConfig {
                mode: Mode::Goal,
                goal_start: "2024-01-01".to_string(),
                goal_end: "2026-12-31".to_string(),
                goal_title: "Long Haul".to_string(),
                goal_subtitle: "three years".to_string(),
                ..CalendarConfig::default()
            },
        ];

        for config in &configs {
            write_config(dir.path(), config);
            assert!(engine.generate().is_ok(), "mode {:?}", config.mode);
        }
    }

    #[test]
    fn missing_config_writes_remedy_marker() {
        let dir = tempfile::tempdir().unwrap();
        let engine = WallpaperEngine::new(dir.path());

        assert!(matches!(
            engine.generate(),
            Err(EngineError::Config(ConfigError::Missing))
        ));

        assert!(!engine.run_auto());
        let marker = dir.path().join(paths::CONFIG_MISSING_MARKER_FILE);
        let text = fs::read_to_string(marker).unwrap();
        assert!(text.contains(paths::CONFIG_FILE));
        assert!(!dir.path().join(paths::UPDATE_FAILED_MARKER_FILE).exists());
    }

    #[test]
    fn invalid_config_aborts_before_rendering() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            &CalendarConfig {
                mode: Mode::Year,
                resolution_width: 100,
                resolution_height: 100,
                ..CalendarConfig::default()
            },
        );

        let engine = WallpaperEngine::new(dir.path());
        assert!(matches!(
            engine.generate(),
            Err(EngineError::Config(ConfigError::Invalid(_)))
        ));
        assert!(!dir.path().join(paths::WALLPAPER_FILE).exists());
    }

    #[test]
    fn failed_update_leaves_a_generic_marker() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            &CalendarConfig {
                mode: Mode::Year,
                resolution_width: 100,
                resolution_height: 100,
                ..CalendarConfig::default()
            },
        );

        let engine = WallpaperEngine::new(dir.path());
        assert!(!engine.run_auto());

        let marker = dir.path().join(paths::UPDATE_FAILED_MARKER_FILE);
        let text = fs::read_to_string(marker).unwrap();
        assert!(text.contains(paths::LOG_FILE));
        assert!(!dir.path().join(paths::CONFIG_MISSING_MARKER_FILE).exists());
    }

    #[test]
    fn run_auto_fails_closed_without_config_and_releases_the_lock() {
        let dir = tempfile::tempdir().unwrap();
        let engine = WallpaperEngine::new(dir.path());

        assert!(!engine.run_auto());
        assert!(!dir.path().join(paths::LOCK_FILE).exists());
    }

    #[test]
    fn run_auto_reports_contention_while_lock_is_held() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            &CalendarConfig {
                mode: Mode::Year,
                ..CalendarConfig::default()
            },
        );

        let engine = WallpaperEngine::new(dir.path());
        let held = LockGuard::acquire(&dir.path().join(paths::LOCK_FILE)).unwrap();
        assert!(!engine.run_auto());
        // Contention is still an unattended failure and leaves the marker.
        assert!(dir.path().join(paths::UPDATE_FAILED_MARKER_FILE).exists());
        drop(held);
    }

    #[test]
    fn successful_run_sweeps_stale_markers() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(paths::CONFIG_MISSING_MARKER_FILE), "old").unwrap();
        fs::write(dir.path().join(paths::UPDATE_FAILED_MARKER_FILE), "old").unwrap();

        let engine = WallpaperEngine::new(dir.path());
        engine.clear_error_markers();

        assert!(!dir.path().join(paths::CONFIG_MISSING_MARKER_FILE).exists());
        assert!(!dir.path().join(paths::UPDATE_FAILED_MARKER_FILE).exists());
    }
}

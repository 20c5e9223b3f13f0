use std::{fs, io, path::{Path, PathBuf}};

use image::{ImageFormat, Rgb, RgbImage};
use rusttype::{point, Font, Scale};
use thiserror::Error;

use crate::calendar::LegendEntry;
use crate::fonts::{self, FontSet};
use crate::layout::GridLayout;

const BACKGROUND: Rgb<u8> = Rgb([0x05, 0x05, 0x05]);
const TITLE_COLOR: Rgb<u8> = Rgb([0xf2, 0xf2, 0xf2]);
const STATS_COLOR: Rgb<u8> = Rgb([0x9a, 0x9a, 0x9a]);
const SUBTITLE_COLOR: Rgb<u8> = Rgb([0x8a, 0x8a, 0x8a]);
const LEGEND_TEXT_COLOR: Rgb<u8> = Rgb([0xd6, 0xd6, 0xd6]);

const COMPLETED_CELL: Rgb<u8> = Rgb([0xcf, 0xcf, 0xcf]);
const CURRENT_CELL: Rgb<u8> = Rgb([0xff, 0xff, 0xff]);
const FUTURE_CELL: Rgb<u8> = Rgb([0x3a, 0x3a, 0x3a]);

const TITLE_SIZE: f32 = 40.0;
const STATS_SIZE: f32 = 18.0;
const LEGEND_SIZE: f32 = 16.0;

const LEGEND_SLOT_WIDTH: u32 = 140;
const LEGEND_SWATCH: u32 = 15;
const LEGEND_LABEL_OFFSET: i32 = 25;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("image encode failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Owns the raster canvas for one wallpaper generation.
pub struct WallpaperRenderer<'f> {
    img: RgbImage,
    width: u32,
    height: u32,
    fonts: &'f FontSet,
}

impl<'f> WallpaperRenderer<'f> {
    pub fn new(width: u32, height: u32, fonts: &'f FontSet) -> Self {
        Self {
            img: RgbImage::from_pixel(width, height, BACKGROUND),
            width,
            height,
            fonts,
        }
    }

    pub fn draw_title(&mut self, text: &str, y: i32) {
        self.draw_centered(text, y, TITLE_SIZE, TITLE_COLOR);
    }

    pub fn draw_stats(&mut self, text: &str, y: i32) {
        self.draw_centered(text, y, STATS_SIZE, STATS_COLOR);
    }

    pub fn draw_subtitle(&mut self, text: &str, y: i32) {
        self.draw_centered(text, y, STATS_SIZE, SUBTITLE_COLOR);
    }

    pub fn draw_grid(&mut self, layout: &GridLayout, total_units: u32, filled_units: u32) {
        for index in 0..total_units {
            let color = if index < filled_units {
                COMPLETED_CELL
            } else if filled_units < total_units && index == filled_units {
                CURRENT_CELL
            } else {
                FUTURE_CELL
            };

            let (x, y) = layout.cell_position(index);
            self.fill_rect(x, y, layout.cell_size, layout.cell_size, color);
        }
    }

    pub fn draw_legend(&mut self, entries: &[LegendEntry], y: i32) {
        let total_width = entries.len() as u32 * LEGEND_SLOT_WIDTH;
        let start_x = (self.width as i32 - total_width as i32) / 2;

        for (idx, entry) in entries.iter().enumerate() {
            let x = start_x + (idx as u32 * LEGEND_SLOT_WIDTH) as i32;
            self.fill_rect(x, y, LEGEND_SWATCH, LEGEND_SWATCH, parse_hex(entry.color));
            self.draw_text(
                entry.label,
                x + LEGEND_LABEL_OFFSET,
                y,
                LEGEND_SIZE,
                LEGEND_TEXT_COLOR,
            );
        }
    }

    /// Render to a temporary sibling and rename-replace; a failed write
    /// leaves the destination untouched and removes the temporary.
    pub fn save(&self, path: &Path) -> Result<(), RenderError> {
        let tmp = tmp_sibling(path);
        let result = self
            .img
            .save_with_format(&tmp, ImageFormat::Png)
            .map_err(RenderError::from)
            .and_then(|_| fs::rename(&tmp, path).map_err(RenderError::from));

        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }

    /* ---- text ---- */

    fn draw_centered(&mut self, text: &str, y: i32, size: f32, color: Rgb<u8>) {
        let text_width = self.measure(text, size);
        let x = ((self.width as f32 - text_width) / 2.0) as i32;
        self.draw_text(text, x, y, size, color);
    }

    fn measure(&self, text: &str, size: f32) -> f32 {
        match self.fonts.truetype() {
            Some(font) => measure_truetype(font, text, size),
            None => measure_builtin(text, size),
        }
    }

    fn draw_text(&mut self, text: &str, x: i32, y: i32, size: f32, color: Rgb<u8>) {
        let fonts = self.fonts;
        match fonts.truetype() {
            Some(font) => self.draw_truetype(font, text, x, y, size, color),
            None => self.draw_builtin(text, x, y, size, color),
        }
    }

    fn draw_truetype(
        &mut self,
        font: &Font<'_>,
        text: &str,
        x: i32,
        y: i32,
        size: f32,
        color: Rgb<u8>,
    ) {
        let scale = Scale::uniform(size);
        let ascent = font.v_metrics(scale).ascent;

        for glyph in font.layout(text, scale, point(x as f32, y as f32 + ascent)) {
            if let Some(bb) = glyph.pixel_bounding_box() {
                glyph.draw(|gx, gy, coverage| {
                    let px = gx as i32 + bb.min.x;
                    let py = gy as i32 + bb.min.y;
                    self.blend_pixel(px, py, color, coverage);
                });
            }
        }
    }

    fn draw_builtin(&mut self, text: &str, x: i32, y: i32, size: f32, color: Rgb<u8>) {
        let dot = builtin_dot_size(size);
        let advance = (fonts::GLYPH_COLS as i32 + 1) * dot;

        let mut cursor = x;
        for ch in text.chars() {
            let glyph = fonts::builtin_glyph(ch);
            for (col, bits) in glyph.iter().enumerate() {
                for row in 0..fonts::GLYPH_ROWS {
                    if bits & (1 << row) != 0 {
                        self.fill_rect(
                            cursor + col as i32 * dot,
                            y + row as i32 * dot,
                            dot as u32,
                            dot as u32,
                            color,
                        );
                    }
                }
            }
            cursor += advance;
        }
    }

    /* ---- pixels ---- */

    fn fill_rect(&mut self, x: i32, y: i32, w: u32, h: u32, color: Rgb<u8>) {
        let x0 = x.clamp(0, self.width as i32) as u32;
        let y0 = y.clamp(0, self.height as i32) as u32;
        let x1 = (x + w as i32).clamp(0, self.width as i32) as u32;
        let y1 = (y + h as i32).clamp(0, self.height as i32) as u32;

        for py in y0..y1 {
            for px in x0..x1 {
                self.img.put_pixel(px, py, color);
            }
        }
    }

    fn blend_pixel(&mut self, x: i32, y: i32, color: Rgb<u8>, coverage: f32) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }

        let alpha = coverage.clamp(0.0, 1.0);
        let bg = *self.img.get_pixel(x as u32, y as u32);
        let mix = |b: u8, f: u8| ((1.0 - alpha) * b as f32 + alpha * f as f32) as u8;

        self.img.put_pixel(
            x as u32,
            y as u32,
            Rgb([
                mix(bg[0], color[0]),
                mix(bg[1], color[1]),
                mix(bg[2], color[2]),
            ]),
        );
    }

    #[cfg(test)]
    fn pixel(&self, x: u32, y: u32) -> Rgb<u8> {
        *self.img.get_pixel(x, y)
    }
}

fn measure_truetype(font: &Font<'_>, text: &str, size: f32) -> f32 {
    let scale = Scale::uniform(size);
    font.layout(text, scale, point(0.0, 0.0))
        .last()
        .map(|glyph| glyph.position().x + glyph.unpositioned().h_metrics().advance_width)
        .unwrap_or(0.0)
}

fn measure_builtin(text: &str, size: f32) -> f32 {
    let dot = builtin_dot_size(size);
    text.chars().count() as f32 * ((fonts::GLYPH_COLS as i32 + 1) * dot) as f32
}

fn builtin_dot_size(size: f32) -> i32 {
    ((size / (fonts::GLYPH_ROWS + 1) as f32).round() as i32).max(1)
}

fn parse_hex(hex: &str) -> Rgb<u8> {
    let digits = hex.trim_start_matches('#');
    if digits.len() != 6 {
        return Rgb([0xff, 0xff, 0xff]);
    }

    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16).unwrap_or(0xff)
    };
    Rgb([channel(0..2), channel(2..4), channel(4..6)])
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}.tmp"))
}

#[cfg(test)]
mod tests {
    use crate::data_loaders::config::Mode;
    use crate::fonts::FontCache;

    use super::*;

    const PNG_MAGIC: [u8; 4] = [0x89, b'P', b'N', b'G'];

    #[test]
    fn canvas_starts_near_black() {
        let cache = FontCache::new();
        let renderer = WallpaperRenderer::new(800, 600, cache.get());
        assert_eq!(renderer.pixel(0, 0), Rgb([0x05, 0x05, 0x05]));
        assert_eq!(renderer.pixel(799, 599), Rgb([0x05, 0x05, 0x05]));
    }

    #[test]
    fn grid_colors_split_at_the_fill_boundary() {
        let cache = FontCache::new();
        let mut renderer = WallpaperRenderer::new(800, 600, cache.get());
        let layout = GridLayout::new(Mode::Goal, 10, 800, 600);

        renderer.draw_grid(&layout, 10, 4);

        let probe = |index: u32| {
            let (x, y) = layout.cell_position(index);
            renderer.pixel(x as u32, y as u32)
        };
        assert_eq!(probe(0), COMPLETED_CELL);
        assert_eq!(probe(3), COMPLETED_CELL);
        assert_eq!(probe(4), CURRENT_CELL);
        assert_eq!(probe(5), FUTURE_CELL);
        assert_eq!(probe(9), FUTURE_CELL);
    }

    #[test]
    fn fully_filled_grid_has_no_current_cell() {
        let cache = FontCache::new();
        let mut renderer = WallpaperRenderer::new(800, 600, cache.get());
        let layout = GridLayout::new(Mode::Goal, 10, 800, 600);

        renderer.draw_grid(&layout, 10, 10);

        let (x, y) = layout.cell_position(9);
        assert_eq!(renderer.pixel(x as u32, y as u32), COMPLETED_CELL);
    }

    #[test]
    fn out_of_bounds_drawing_is_clipped() {
        let cache = FontCache::new();
        let mut renderer = WallpaperRenderer::new(800, 600, cache.get());
        renderer.fill_rect(-50, -50, 40, 40, CURRENT_CELL);
        renderer.fill_rect(790, 590, 100, 100, CURRENT_CELL);
        renderer.draw_title("CLIPPED", -500);
        assert_eq!(renderer.pixel(0, 0), BACKGROUND);
        assert_eq!(renderer.pixel(799, 599), CURRENT_CELL);
    }

    #[test]
    fn save_writes_png_and_cleans_temp() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("wall.png");

        let cache = FontCache::new();
        let mut renderer = WallpaperRenderer::new(800, 600, cache.get());
        renderer.draw_title("YEAR PROGRESS 2024", 100);
        renderer.save(&dest).unwrap();

        let bytes = fs::read(&dest).unwrap();
        assert_eq!(&bytes[..4], &PNG_MAGIC);
        assert!(!dir.path().join("wall.png.tmp").exists());
    }

    #[test]
    fn failed_save_leaves_destination_untouched_and_removes_temp() {
        let dir = tempfile::tempdir().unwrap();
        // A directory at the destination makes the rename step fail.
        let dest = dir.path().join("wall.png");
        fs::create_dir(&dest).unwrap();
        fs::write(dest.join("keep.txt"), "existing data").unwrap();

        let cache = FontCache::new();
        let renderer = WallpaperRenderer::new(800, 600, cache.get());
        assert!(renderer.save(&dest).is_err());

        assert!(dest.join("keep.txt").exists());
        assert!(!dir.path().join("wall.png.tmp").exists());
    }

    #[test]
    fn hex_parsing() {
        assert_eq!(parse_hex("#cfcfcf"), Rgb([0xcf, 0xcf, 0xcf]));
        assert_eq!(parse_hex("#3a3a3a"), Rgb([0x3a, 0x3a, 0x3a]));
        assert_eq!(parse_hex("bogus"), Rgb([0xff, 0xff, 0xff]));
    }

    #[test]
    fn measured_text_grows_with_content() {
        let cache = FontCache::new();
        let renderer = WallpaperRenderer::new(800, 600, cache.get());
        let short = renderer.measure("DAY", STATS_SIZE);
        let long = renderer.measure("DAY 61 OF 366", STATS_SIZE);
        assert!(long > short);
        assert!(short > 0.0);
    }
}

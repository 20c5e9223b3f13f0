use std::{fs, path::Path, sync::OnceLock};

use rusttype::Font;

use crate::{debug, warn, DEBUG_NAME};

/// Ranked font candidates; the first loadable file wins.
#[cfg(target_os = "windows")]
const FONT_PATHS: &[&str] = &[
    r"C:\Windows\Fonts\arial.ttf",
    r"C:\Windows\Fonts\segoeui.ttf",
    r"C:\Windows\Fonts\tahoma.ttf",
];

#[cfg(target_os = "macos")]
const FONT_PATHS: &[&str] = &[
    "/System/Library/Fonts/Helvetica.ttc",
    "/Library/Fonts/Arial.ttf",
];

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
];

/// The loaded face, or the built-in glyph set when no system font is usable.
pub struct FontSet {
    truetype: Option<Font<'static>>,
}

impl FontSet {
    pub fn truetype(&self) -> Option<&Font<'static>> {
        self.truetype.as_ref()
    }
}

/// One disk probe per process; the engine owns the cache and hands the
/// resolved set to every renderer it builds.
pub struct FontCache {
    set: OnceLock<FontSet>,
}

impl FontCache {
    pub fn new() -> Self {
        Self {
            set: OnceLock::new(),
        }
    }

    pub fn get(&self) -> &FontSet {
        self.set.get_or_init(load_fonts)
    }
}

fn load_fonts() -> FontSet {
    for candidate in FONT_PATHS {
        let path = Path::new(candidate);
        if !path.exists() {
            continue;
        }

        match fs::read(path) {
            Ok(data) => match Font::try_from_vec(data) {
                Some(font) => {
                    debug!("[{}] Loaded fonts from {}", DEBUG_NAME, candidate);
                    return FontSet {
                        truetype: Some(font),
                    };
                }
                None => {
                    debug!("[{}] Not a usable TrueType face: {}", DEBUG_NAME, candidate);
                }
            },
            Err(e) => {
                debug!("[{}] Could not read font {}: {}", DEBUG_NAME, candidate, e);
            }
        }
    }

    warn!(
        "[{}] No system font available, falling back to built-in glyphs",
        DEBUG_NAME
    );
    FontSet { truetype: None }
}

/* =========================
   BUILT-IN GLYPHS
   ========================= */

// Minimal 5x7 face, column-encoded (bit 0 = top row). Lowercase maps to
// uppercase; anything else renders blank.

pub const GLYPH_COLS: u32 = 5;
pub const GLYPH_ROWS: u32 = 7;

pub fn builtin_glyph(ch: char) -> [u8; 5] {
    match ch.to_ascii_uppercase() {
        'A' => [0x7E, 0x11, 0x11, 0x11, 0x7E],
        'B' => [0x7F, 0x49, 0x49, 0x49, 0x36],
        'C' => [0x3E, 0x41, 0x41, 0x41, 0x22],
        'D' => [0x7F, 0x41, 0x41, 0x22, 0x1C],
        'E' => [0x7F, 0x49, 0x49, 0x49, 0x41],
        'F' => [0x7F, 0x09, 0x09, 0x09, 0x01],
        'G' => [0x3E, 0x41, 0x49, 0x49, 0x7A],
        'H' => [0x7F, 0x08, 0x08, 0x08, 0x7F],
        'I' => [0x00, 0x41, 0x7F, 0x41, 0x00],
        'J' => [0x20, 0x40, 0x41, 0x3F, 0x01],
        'K' => [0x7F, 0x08, 0x14, 0x22, 0x41],
        'L' => [0x7F, 0x40, 0x40, 0x40, 0x40],
        'M' => [0x7F, 0x02, 0x0C, 0x02, 0x7F],
        'N' => [0x7F, 0x04, 0x08, 0x10, 0x7F],
        'O' => [0x3E, 0x41, 0x41, 0x41, 0x3E],
        'P' => [0x7F, 0x09, 0x09, 0x09, 0x06],
        'Q' => [0x3E, 0x41, 0x51, 0x21, 0x5E],
        'R' => [0x7F, 0x09, 0x19, 0x29, 0x46],
        'S' => [0x46, 0x49, 0x49, 0x49, 0x31],
        'T' => [0x01, 0x01, 0x7F, 0x01, 0x01],
        'U' => [0x3F, 0x40, 0x40, 0x40, 0x3F],
        'V' => [0x1F, 0x20, 0x40, 0x20, 0x1F],
        'W' => [0x7F, 0x20, 0x18, 0x20, 0x7F],
        'X' => [0x63, 0x14, 0x08, 0x14, 0x63],
        'Y' => [0x03, 0x04, 0x78, 0x04, 0x03],
        'Z' => [0x61, 0x51, 0x49, 0x45, 0x43],
        '0' => [0x3E, 0x51, 0x49, 0x45, 0x3E],
        '1' => [0x00, 0x42, 0x7F, 0x40, 0x00],
        '2' => [0x42, 0x61, 0x51, 0x49, 0x46],
        '3' => [0x21, 0x41, 0x45, 0x4B, 0x31],
        '4' => [0x18, 0x14, 0x12, 0x7F, 0x10],
        '5' => [0x27, 0x45, 0x45, 0x45, 0x39],
        '6' => [0x3C, 0x4A, 0x49, 0x49, 0x30],
        '7' => [0x01, 0x71, 0x09, 0x05, 0x03],
        '8' => [0x36, 0x49, 0x49, 0x49, 0x36],
        '9' => [0x06, 0x49, 0x49, 0x29, 0x1E],
        ':' => [0x00, 0x36, 0x36, 0x00, 0x00],
        '|' => [0x00, 0x00, 0x7F, 0x00, 0x00],
        '(' => [0x00, 0x1C, 0x22, 0x41, 0x00],
        ')' => [0x00, 0x41, 0x22, 0x1C, 0x00],
        '%' => [0x23, 0x13, 0x08, 0x64, 0x62],
        '-' => [0x08, 0x08, 0x08, 0x08, 0x08],
        '.' => [0x00, 0x60, 0x60, 0x00, 0x00],
        ',' => [0x00, 0x40, 0x30, 0x00, 0x00],
        '/' => [0x20, 0x10, 0x08, 0x04, 0x02],
        _ => [0x00; 5],
    }
}

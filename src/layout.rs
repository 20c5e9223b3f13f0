use crate::data_loaders::config::Mode;

const WIDTH_FRACTION: f64 = 0.9;
const HEIGHT_FRACTION: f64 = 0.75;
const MAX_CELL_SIZE: f64 = 20.0;
const HEADER_BIAS: i32 = 60;

/// Deterministic cell geometry for a unit grid on a fixed canvas.
#[derive(Debug, Clone)]
pub struct GridLayout {
    pub total_units: u32,
    pub columns: u32,
    pub rows: u32,
    pub cell_size: u32,
    pub gap: u32,
    pub grid_width: u32,
    pub grid_height: u32,
    pub start_x: i32,
    pub start_y: i32,
}

impl GridLayout {
    pub fn new(mode: Mode, total_units: u32, canvas_width: u32, canvas_height: u32) -> Self {
        let total_units = total_units.max(1);
        let columns = columns_for(mode, total_units);
        let rows = (total_units + columns - 1) / columns;

        let available_width = canvas_width as f64 * WIDTH_FRACTION;
        let available_height = canvas_height as f64 * HEIGHT_FRACTION;

        let cell_size = (available_width / columns as f64)
            .min(available_height / rows as f64)
            .min(MAX_CELL_SIZE) as u32;
        let cell_size = cell_size.max(1);
        let gap = (cell_size as f64 * 0.15).max(2.0) as u32;

        let grid_width = columns * cell_size + (columns - 1) * gap;
        let grid_height = rows * cell_size + (rows - 1) * gap;

        let start_x = (canvas_width as i32 - grid_width as i32) / 2;
        let start_y = (canvas_height as i32 - grid_height as i32) / 2 + HEADER_BIAS;

        Self {
            total_units,
            columns,
            rows,
            cell_size,
            gap,
            grid_width,
            grid_height,
            start_x,
            start_y,
        }
    }

    pub fn cell_position(&self, index: u32) -> (i32, i32) {
        let row = index / self.columns;
        let col = index % self.columns;

        let x = self.start_x + (col * (self.cell_size + self.gap)) as i32;
        let y = self.start_y + (row * (self.cell_size + self.gap)) as i32;
        (x, y)
    }
}

fn columns_for(mode: Mode, total_units: u32) -> u32 {
    match mode {
        // One row per year of life.
        Mode::Life => 52,
        Mode::Year => 31,
        // Capped so multi-year goals don't stretch into absurdly wide rows.
        Mode::Goal => {
            if total_units <= 365 {
                total_units.min(52)
            } else {
                60
            }
        }
    }
}

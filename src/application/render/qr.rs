use qrcode::{Color, EcLevel, QrCode};

use super::RenderError;

/// Quiet zone in modules on each side.
const QUIET_ZONE: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrMatrix {
    width: usize,
    dark: Vec<bool>,
}

/// A filled rectangle in page coordinates: x, y, width, height.
pub type Rect = [f32; 4];

impl QrMatrix {
    pub fn encode(data: &str) -> Result<Self, RenderError> {
        let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::M)
            .map_err(|err| RenderError::Qr(err.to_string()))?;
        let dark = code
            .to_colors()
            .into_iter()
            .map(|color| color == Color::Dark)
            .collect();
        Ok(Self {
            width: code.width(),
            dark,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.width && self.dark[y * self.width + x]
    }

    /// Dark modules as rectangles inside a `size` square whose bottom-left corner is
    /// at (`x`, `y`). Horizontal neighbours are merged into one rectangle per run.
    pub fn rects(&self, x: f32, y: f32, size: f32) -> Vec<Rect> {
        let modules = self.width + QUIET_ZONE * 2;
        let module = size / modules as f32;
        let mut rects = Vec::new();

        for row in 0..self.width {
            let top = y + size - (row + QUIET_ZONE) as f32 * module;
            let mut column = 0;
            while column < self.width {
                if !self.is_dark(column, row) {
                    column += 1;
                    continue;
                }
                let start = column;
                while column < self.width && self.is_dark(column, row) {
                    column += 1;
                }
                rects.push([
                    x + (start + QUIET_ZONE) as f32 * module,
                    top - module,
                    (column - start) as f32 * module,
                    module,
                ]);
            }
        }
        rects
    }
}

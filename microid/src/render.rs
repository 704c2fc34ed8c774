use crate::codec::{self, Grid};
use crate::error::CodecError;
use crate::extract::GridBounds;
use crate::image::{ImageRgb8, Rgb};
use crate::layout::GRID_SIZE;
use crate::locate::geometry::Point;

const GRIDLINE: Rgb = Rgb([0xCC, 0xCC, 0xCC]);

/// Drawing options for a Micro-ID picture.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Pixels per cell.
    pub cell_size: u32,
    pub dot_color: Rgb,
    pub background: Rgb,
    pub show_gridlines: bool,
    /// Dot radius as a fraction of the cell size.
    pub dot_ratio: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            cell_size: 100,
            dot_color: Rgb([0xCD, 0x7F, 0x32]),
            background: Rgb::WHITE,
            show_gridlines: true,
            dot_ratio: 0.35,
        }
    }
}

impl RenderOptions {
    /// Half-cell border around the grid.
    pub fn padding(&self) -> u32 {
        self.cell_size / 2
    }

    pub fn image_size(&self) -> u32 {
        self.cell_size * GRID_SIZE as u32 + 2 * self.padding()
    }

    pub fn grid_bounds(&self) -> GridBounds {
        GridBounds {
            x: self.padding() as f64,
            y: self.padding() as f64,
            size: (self.cell_size * GRID_SIZE as u32) as f64,
        }
    }
}

/// Draw the grid for `serial`.
pub fn render(serial: u64, opts: &RenderOptions) -> Result<ImageRgb8, CodecError> {
    Ok(render_grid(&codec::encode(serial)?, opts))
}

/// Draw any grid, valid or not.
pub fn render_grid(grid: &Grid, opts: &RenderOptions) -> ImageRgb8 {
    let size = opts.image_size();
    let pad = opts.padding();
    let cell = opts.cell_size;
    let mut img = ImageRgb8::new(size, size, opts.background);

    if opts.show_gridlines && size > 0 {
        let end = size - pad;
        for i in 0..=GRID_SIZE as u32 {
            let at = (pad + i * cell).min(size - 1);
            for t in pad..=end.min(size - 1) {
                img.set(at, t, GRIDLINE);
                img.set(t, at, GRIDLINE);
            }
        }
    }

    let r = opts.dot_ratio * cell as f64;
    for (row, cells) in grid.cells().iter().enumerate() {
        for (col, &marked) in cells.iter().enumerate() {
            if !marked {
                continue;
            }
            let cx = (pad + col as u32 * cell + cell / 2) as f64;
            let cy = (pad + row as u32 * cell + cell / 2) as f64;
            let x0 = (cx - r).floor().max(0.0) as u32;
            let y0 = (cy - r).floor().max(0.0) as u32;
            let x1 = ((cx + r).ceil() as u32).min(size);
            let y1 = ((cy + r).ceil() as u32).min(size);
            for y in y0..y1 {
                for x in x0..x1 {
                    let dx = x as f64 + 0.5 - cx;
                    let dy = y as f64 + 0.5 - cy;
                    if dx * dx + dy * dy <= r * r {
                        img.set(x, y, opts.dot_color);
                    }
                }
            }
        }
    }
    img
}

/// Stroke the closed polygon through `corners` onto `img`, `width` pixels
/// thick. Parts off the image are skipped.
pub fn draw_outline(img: &mut ImageRgb8, corners: &[Point], colour: Rgb, width: u32) {
    let half = width.max(1) as f64 / 2.0;
    for (i, &a) in corners.iter().enumerate() {
        let b = corners[(i + 1) % corners.len()];
        let len = (b[0] - a[0]).hypot(b[1] - a[1]);
        let steps = (len * 2.0).ceil().max(1.0) as usize;
        for k in 0..=steps {
            let t = k as f64 / steps as f64;
            let (px, py) = (a[0] + t * (b[0] - a[0]), a[1] + t * (b[1] - a[1]));
            let y0 = (py - half).round().max(0.0) as u32;
            let x0 = (px - half).round().max(0.0) as u32;
            let y1 = ((py + half).round().max(0.0) as u32).min(img.height);
            let x1 = ((px + half).round().max(0.0) as u32).min(img.width);
            for y in y0..y1 {
                for x in x0..x1 {
                    img.set(x, y, colour);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enhance::{CropEnhancer, CropPixels, NormalizedCrop};
    use crate::extract::{CandidateCrop, Rotation};
    use crate::reader::{GridReader, ThresholdReader};

    #[test]
    fn default_geometry() {
        let opts = RenderOptions::default();
        assert_eq!(opts.image_size(), 600);
        let b = opts.grid_bounds();
        assert_eq!((b.x, b.y, b.size), (50.0, 50.0, 500.0));
    }

    #[test]
    fn dots_and_gridlines_land_where_expected() {
        let opts = RenderOptions::default();
        let img = render(5, &opts).unwrap();
        // anchor at row 0 col 0, empty cell at row 0 col 1
        assert_eq!(img.get(100, 100), opts.dot_color);
        assert_eq!(img.get(200, 100), Rgb::WHITE);
        assert_eq!(img.get(150, 75), GRIDLINE);
        assert_eq!(img.get(10, 10), Rgb::WHITE);
    }

    #[test]
    fn no_gridlines_when_disabled() {
        let opts = RenderOptions {
            show_gridlines: false,
            ..RenderOptions::default()
        };
        let img = render(0, &opts).unwrap();
        assert_eq!(img.get(150, 75), Rgb::WHITE);
    }

    #[test]
    fn out_of_range_serial_fails() {
        assert_eq!(
            render(1 << 20, &RenderOptions::default()),
            Err(CodecError::InvalidSerial(1 << 20))
        );
    }

    #[test]
    fn threshold_reader_reads_a_rendering() {
        let opts = RenderOptions::default();
        for serial in [0u64, 5, 524_288, 1_048_575] {
            let img = render(serial, &opts).unwrap();
            let crop = NormalizedCrop {
                rotation: Rotation::R0,
                pixels: CropPixels::Color(img),
                grid_bounds: opts.grid_bounds(),
            };
            let text = ThresholdReader::default().read_grid(&crop).unwrap();
            assert_eq!(text, codec::encode(serial).unwrap().to_string());
        }
    }

    #[test]
    fn rendering_survives_enhancement() {
        let opts = RenderOptions {
            cell_size: 40,
            ..RenderOptions::default()
        };
        let img = render(314_159, &opts).unwrap();
        let crop = CandidateCrop {
            rotation: Rotation::R0,
            image: img,
            center: [0.0, 0.0],
            angle: 0.0,
            scale: 1.0,
            grid_bounds: opts.grid_bounds(),
        };
        let normalized = CropEnhancer::default().enhance(&crop);
        let text = ThresholdReader::default().read_grid(&normalized).unwrap();
        assert_eq!(text, codec::encode(314_159).unwrap().to_string());
    }

    #[test]
    fn outline_strokes_only_the_border() {
        let mut img = ImageRgb8::new(50, 50, Rgb::BLACK);
        let green = Rgb([0, 255, 0]);
        draw_outline(&mut img, &[[10.0, 10.0], [40.0, 10.0], [40.0, 40.0], [10.0, 40.0]], green, 3);
        assert_eq!(img.get(25, 10), green);
        assert_eq!(img.get(40, 25), green);
        assert_eq!(img.get(10, 39), green);
        assert_eq!(img.get(25, 25), Rgb::BLACK);
        assert_eq!(img.get(2, 2), Rgb::BLACK);
    }

    #[test]
    fn outline_off_the_image_is_clipped() {
        let mut img = ImageRgb8::new(20, 20, Rgb::BLACK);
        draw_outline(&mut img, &[[-30.0, 5.0], [60.0, 5.0], [60.0, 80.0]], Rgb::WHITE, 1);
        assert_eq!(img.get(0, 5), Rgb::WHITE);
        assert_eq!(img.get(19, 5), Rgb::WHITE);
    }
}

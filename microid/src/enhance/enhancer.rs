use std::borrow::Cow;

use tracing::debug;

use super::clahe::clahe;
use super::resize::{fit_longer_side, resize_bicubic};
use crate::extract::{CandidateCrop, GridBounds, Rotation};
use crate::image::{ImageRgb8, ImageU8};

/// Linear intensity boost `alpha * v + beta`, saturated to 0..=255.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boost {
    pub alpha: f64,
    pub beta: f64,
}

#[derive(Debug, Clone)]
pub struct EnhanceConfig {
    /// Longer side of the normalised crop, in pixels.
    pub target_size: u32,
    pub clip_limit: f64,
    pub tiles: u32,
    pub sharpen: bool,
    pub boost: Option<Boost>,
    /// Resize only, keep colour.
    pub raw: bool,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            target_size: 400,
            clip_limit: 2.0,
            tiles: 8,
            sharpen: true,
            boost: None,
            raw: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CropPixels {
    Gray(ImageU8),
    Color(ImageRgb8),
}

impl CropPixels {
    pub fn width(&self) -> u32 {
        match self {
            CropPixels::Gray(img) => img.width,
            CropPixels::Color(img) => img.width,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            CropPixels::Gray(img) => img.height,
            CropPixels::Color(img) => img.height,
        }
    }

    /// Single-channel view, converting colour crops on demand.
    pub fn luma(&self) -> Cow<'_, ImageU8> {
        match self {
            CropPixels::Gray(img) => Cow::Borrowed(img),
            CropPixels::Color(img) => Cow::Owned(img.to_luma()),
        }
    }

    pub fn to_rgb(&self) -> ImageRgb8 {
        match self {
            CropPixels::Gray(img) => ImageRgb8::from_luma(img),
            CropPixels::Color(img) => img.clone(),
        }
    }
}

/// A crop ready for grid reading.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedCrop {
    pub rotation: Rotation,
    pub pixels: CropPixels,
    pub grid_bounds: GridBounds,
}

#[derive(Debug, Clone, Default)]
pub struct CropEnhancer {
    pub config: EnhanceConfig,
}

impl CropEnhancer {
    pub fn new(config: EnhanceConfig) -> Self {
        Self { config }
    }

    pub fn enhance(&self, crop: &CandidateCrop) -> NormalizedCrop {
        let cfg = &self.config;
        let src = &crop.image;
        let (w, h) = fit_longer_side(src.width, src.height, cfg.target_size);
        let resized = resize_bicubic(src, w, h);
        let factor = if src.width > 0 {
            w as f64 / src.width as f64
        } else {
            1.0
        };
        let grid_bounds = crop.grid_bounds.scaled(factor);

        if cfg.raw {
            return NormalizedCrop {
                rotation: crop.rotation,
                pixels: CropPixels::Color(resized),
                grid_bounds,
            };
        }

        let mut gray = clahe(&resized.to_luma(), cfg.clip_limit, cfg.tiles);
        if cfg.sharpen {
            gray = sharpen(&gray);
        }
        if let Some(b) = cfg.boost {
            for v in &mut gray.buf {
                *v = (b.alpha * *v as f64 + b.beta).round().clamp(0.0, 255.0) as u8;
            }
        }
        debug!(rotation = %crop.rotation, width = w, height = h, "crop enhanced");
        NormalizedCrop {
            rotation: crop.rotation,
            pixels: CropPixels::Gray(gray),
            grid_bounds,
        }
    }
}

/// 3×3 sharpening: 9× the centre minus its eight neighbours, borders replicated.
pub fn sharpen(img: &ImageU8) -> ImageU8 {
    let mut out = ImageU8::new(img.width, img.height);
    for y in 0..img.height as i64 {
        for x in 0..img.width as i64 {
            let mut acc = 0i32;
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let v = img.get_clamped(x + dx, y + dy) as i32;
                    acc += if dx == 0 && dy == 0 { 9 * v } else { -v };
                }
            }
            out.set(x as u32, y as u32, acc.clamp(0, 255) as u8);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Rgb;

    fn crop_of(img: ImageRgb8) -> CandidateCrop {
        let side = img.width as f64;
        CandidateCrop {
            rotation: Rotation::R90,
            image: img,
            center: [0.0, 0.0],
            angle: 0.0,
            scale: 1.0,
            grid_bounds: GridBounds {
                x: side * 0.25,
                y: side * 0.25,
                size: side * 0.5,
            },
        }
    }

    #[test]
    fn sharpen_leaves_flat_regions() {
        let img = ImageU8::filled(6, 6, 90);
        assert_eq!(sharpen(&img), img);
    }

    #[test]
    fn sharpen_boosts_a_spot() {
        let mut img = ImageU8::filled(5, 5, 100);
        img.set(2, 2, 120);
        let out = sharpen(&img);
        assert_eq!(out.get(2, 2), 255);
        assert_eq!(out.get(1, 1), 80);
    }

    #[test]
    fn enhance_resizes_and_scales_bounds() {
        let crop = crop_of(ImageRgb8::new(100, 100, Rgb([200, 10, 10])));
        let out = CropEnhancer::default().enhance(&crop);
        assert_eq!(out.rotation, Rotation::R90);
        assert_eq!((out.pixels.width(), out.pixels.height()), (400, 400));
        assert!(matches!(out.pixels, CropPixels::Gray(_)));
        assert!((out.grid_bounds.x - 100.0).abs() < 1e-9);
        assert!((out.grid_bounds.size - 200.0).abs() < 1e-9);
    }

    #[test]
    fn raw_mode_keeps_colour() {
        let crop = crop_of(ImageRgb8::new(50, 50, Rgb([200, 10, 10])));
        let out = CropEnhancer::new(EnhanceConfig {
            raw: true,
            ..EnhanceConfig::default()
        })
        .enhance(&crop);
        match &out.pixels {
            CropPixels::Color(img) => assert_eq!(img.get(200, 200), Rgb([200, 10, 10])),
            CropPixels::Gray(_) => panic!("raw crop lost its colour"),
        }
    }

    #[test]
    fn dark_dots_stay_dark() {
        let mut img = ImageRgb8::new(60, 60, Rgb([210, 210, 210]));
        for y in 20..30 {
            for x in 20..30 {
                img.set(x, y, Rgb([40, 40, 40]));
            }
        }
        let out = CropEnhancer::default().enhance(&crop_of(img));
        let gray = out.pixels.luma();
        assert!(gray.get(166, 166) < gray.get(40, 300));
    }

    #[test]
    fn boost_saturates() {
        let crop = crop_of(ImageRgb8::new(20, 20, Rgb([100, 100, 100])));
        let out = CropEnhancer::new(EnhanceConfig {
            sharpen: false,
            boost: Some(Boost { alpha: 10.0, beta: 0.0 }),
            ..EnhanceConfig::default()
        })
        .enhance(&crop);
        assert!(out.pixels.luma().buf.iter().all(|&v| v == 255));
    }
}

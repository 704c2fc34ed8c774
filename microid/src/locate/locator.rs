use tracing::debug;

use super::blobs::{fill_outlines, label_blobs};
use super::edges::canny;
use super::geometry::{canonical_angle, convex_hull, min_area_rect, Point, RotatedRect};
use super::morph::dilate;
use super::preprocess::{decimate, decimation_for, gaussian_blur};
use crate::error::LocateError;
use crate::image::{ImageRgb8, ImageU8};
use crate::module_spec::ModuleSpec;

/// The module found in a photo, in full-resolution pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedModule {
    /// Corners of the minimum-area rectangle, in no particular order.
    pub corners: [Point; 4],
    pub center: Point,
    /// In-plane rotation in radians, within [-π/4, π/4).
    pub angle: f64,
    pub width_px: f64,
    pub height_px: f64,
    /// Pixel count of the filled region.
    pub area: f64,
    pub score: f64,
}

impl DetectedModule {
    pub fn longest_side_px(&self) -> f64 {
        self.width_px.max(self.height_px)
    }

    /// Pixels per millimetre implied by matching the longest sides.
    pub fn scale_for(&self, spec: &ModuleSpec) -> f64 {
        self.longest_side_px() / spec.longest_side_mm()
    }
}

/// Locator configuration.
#[derive(Debug, Clone)]
pub struct LocatorConfig {
    pub blur_sigma: f32,
    pub blur_ksize: usize,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Dilation passes before filling; the same count of erosions follows.
    pub dilate_iterations: u32,
    pub min_area_fraction: f64,
    pub max_area_fraction: f64,
    pub min_squareness: f64,
    /// Longer image side above which the photo is decimated first. 0 disables.
    pub max_dimension: u32,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 1.1,
            blur_ksize: 5,
            canny_low: 50.0,
            canny_high: 150.0,
            dilate_iterations: 2,
            min_area_fraction: 0.05,
            max_area_fraction: 0.95,
            min_squareness: 0.7,
            max_dimension: 1200,
        }
    }
}

/// Intermediate maps of one locator run, at the decimated resolution.
#[derive(Debug, Clone, Default)]
pub struct LocateStages {
    /// Factor the photo was shrunk by before processing.
    pub decimation: u32,
    pub gray: ImageU8,
    pub blurred: ImageU8,
    pub edges: ImageU8,
    pub dilated: ImageU8,
    /// Closed outlines filled solid, after the shrink that undoes dilation.
    pub filled: ImageU8,
}

/// What `ModuleLocator::locate_traced` saw, plus its answer.
#[derive(Debug, Clone)]
pub struct LocateTrace {
    pub stages: LocateStages,
    pub result: Result<DetectedModule, LocateError>,
}

/// Finds the largest roughly square outline in a photo.
#[derive(Debug, Clone, Default)]
pub struct ModuleLocator {
    pub config: LocatorConfig,
}

impl ModuleLocator {
    pub fn new(config: LocatorConfig) -> Self {
        Self { config }
    }

    pub fn locate(&self, img: &ImageRgb8) -> Result<DetectedModule, LocateError> {
        self.run(img, None)
    }

    /// Like [`locate`](Self::locate), also keeping every intermediate map.
    pub fn locate_traced(&self, img: &ImageRgb8) -> LocateTrace {
        let mut stages = LocateStages::default();
        let result = self.run(img, Some(&mut stages));
        LocateTrace { stages, result }
    }

    fn run(
        &self,
        img: &ImageRgb8,
        trace: Option<&mut LocateStages>,
    ) -> Result<DetectedModule, LocateError> {
        let cfg = &self.config;
        if img.is_empty() {
            return Err(LocateError::ModuleNotDetected);
        }

        // Stage 1: grey, shrink, smooth
        let f = decimation_for(img.width, img.height, cfg.max_dimension);
        let gray = decimate(&img.to_luma(), f);
        let blurred = gaussian_blur(&gray, cfg.blur_sigma, cfg.blur_ksize);

        // Stage 2: edges, bridged and filled into solid regions
        let edges = canny(&blurred, cfg.canny_low, cfg.canny_high);
        let bridged = dilate(&edges, cfg.dilate_iterations);
        let filled = fill_outlines(&bridged, cfg.dilate_iterations);
        let blobs = label_blobs(&filled);

        let image_area = gray.width as f64 * gray.height as f64;
        debug!(decimate = f, blobs = blobs.len(), "edge regions extracted");
        if let Some(t) = trace {
            *t = LocateStages {
                decimation: f,
                gray,
                blurred,
                edges,
                dilated: bridged,
                filled,
            };
        }

        // Stage 3: pick the best square-ish region
        let mut best: Option<(f64, f64, RotatedRect)> = None;
        for blob in &blobs {
            let area = blob.area as f64;
            let fraction = area / image_area;
            if fraction < cfg.min_area_fraction || fraction > cfg.max_area_fraction {
                continue;
            }
            let Some(rect) = min_area_rect(&convex_hull(&blob.outline)) else {
                continue;
            };
            let rect = rect.long_side_first();
            let squareness = rect.squareness();
            if squareness <= cfg.min_squareness {
                continue;
            }
            let score = area * squareness;
            if best.as_ref().map_or(true, |(s, _, _)| score > *s) {
                best = Some((score, area, rect));
            }
        }

        let Some((score, area, rect)) = best else {
            debug!("no candidate region passed the area and squareness filters");
            return Err(LocateError::ModuleNotDetected);
        };

        // Stage 4: back to full resolution
        let s = f as f64;
        let full = RotatedRect {
            center: [rect.center[0] * s, rect.center[1] * s],
            width: rect.width * s,
            height: rect.height * s,
            angle: rect.angle,
        };
        let module = DetectedModule {
            corners: full.corners(),
            center: full.center,
            angle: canonical_angle(full.angle),
            width_px: full.width,
            height_px: full.height,
            area: area * s * s,
            score: score * s * s,
        };
        debug!(
            cx = module.center[0],
            cy = module.center[1],
            angle_deg = module.angle.to_degrees(),
            side_px = module.longest_side_px(),
            "module located"
        );
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Rgb;

    /// Grey background with a filled square of side `side` centred at `c`, turned by `angle`.
    fn square_scene(w: u32, h: u32, c: Point, side: f64, angle: f64) -> ImageRgb8 {
        let mut img = ImageRgb8::new(w, h, Rgb([30, 30, 30]));
        let (s, co) = angle.sin_cos();
        for y in 0..h {
            for x in 0..w {
                let dx = x as f64 + 0.5 - c[0];
                let dy = y as f64 + 0.5 - c[1];
                let u = co * dx + s * dy;
                let v = -s * dx + co * dy;
                if u.abs() <= side / 2.0 && v.abs() <= side / 2.0 {
                    img.set(x, y, Rgb([200, 200, 200]));
                }
            }
        }
        img
    }

    #[test]
    fn default_config() {
        let c = LocatorConfig::default();
        assert_eq!(c.blur_ksize, 5);
        assert_eq!(c.dilate_iterations, 2);
        assert!((c.canny_high - 150.0).abs() < 1e-6);
        assert_eq!(c.max_dimension, 1200);
    }

    #[test]
    fn finds_axis_aligned_square() {
        let img = square_scene(300, 240, [150.0, 120.0], 140.0, 0.0);
        let m = ModuleLocator::default().locate(&img).unwrap();
        assert!((m.center[0] - 150.0).abs() < 1.5, "{:?}", m.center);
        assert!((m.center[1] - 120.0).abs() < 1.5, "{:?}", m.center);
        assert!((m.longest_side_px() - 140.0).abs() < 3.0);
        assert!(m.angle.abs() < 0.02);
    }

    #[test]
    fn finds_rotated_square() {
        let img = square_scene(400, 300, [200.0, 150.0], 160.0, 0.2);
        let m = ModuleLocator::default().locate(&img).unwrap();
        assert!((m.center[0] - 200.0).abs() < 2.0, "{:?}", m.center);
        assert!((m.center[1] - 150.0).abs() < 2.0, "{:?}", m.center);
        assert!((m.angle - 0.2).abs() < 0.03, "angle {}", m.angle);
        assert!((m.longest_side_px() - 160.0).abs() < 4.0);
    }

    #[test]
    fn decimated_result_is_in_full_resolution() {
        let img = square_scene(400, 300, [200.0, 150.0], 160.0, 0.0);
        let locator = ModuleLocator::new(LocatorConfig {
            max_dimension: 200,
            ..LocatorConfig::default()
        });
        let m = locator.locate(&img).unwrap();
        assert!((m.center[0] - 200.0).abs() < 4.0, "{:?}", m.center);
        assert!((m.center[1] - 150.0).abs() < 4.0, "{:?}", m.center);
        assert!((m.longest_side_px() - 160.0).abs() < 8.0);
    }

    #[test]
    fn trace_keeps_every_stage() {
        let img = square_scene(400, 300, [200.0, 150.0], 160.0, 0.0);
        let locator = ModuleLocator::new(LocatorConfig {
            max_dimension: 200,
            ..LocatorConfig::default()
        });
        let trace = locator.locate_traced(&img);
        assert_eq!(trace.result, locator.locate(&img));
        let st = &trace.stages;
        assert_eq!(st.decimation, 2);
        for map in [&st.gray, &st.blurred, &st.edges, &st.dilated, &st.filled] {
            assert_eq!((map.width, map.height), (200, 150));
        }
        assert!(st.edges.buf.iter().filter(|&&v| v != 0).count() > 100);
        // the square's interior is solid, the corner of the frame is not
        assert_eq!(st.filled.get(100, 75), 255);
        assert_eq!(st.filled.get(2, 2), 0);
    }

    #[test]
    fn trace_of_a_blank_photo_still_has_maps() {
        let img = ImageRgb8::new(120, 90, Rgb([90, 90, 90]));
        let trace = ModuleLocator::default().locate_traced(&img);
        assert_eq!(trace.result, Err(LocateError::ModuleNotDetected));
        assert_eq!(trace.stages.decimation, 1);
        assert_eq!(trace.stages.gray.width, 120);
        assert!(trace.stages.filled.buf.iter().all(|&v| v == 0));
    }

    #[test]
    fn blank_image_is_not_detected() {
        let img = ImageRgb8::new(200, 200, Rgb([90, 90, 90]));
        assert_eq!(
            ModuleLocator::default().locate(&img),
            Err(LocateError::ModuleNotDetected)
        );
    }

    #[test]
    fn small_speck_is_ignored() {
        let img = square_scene(300, 300, [150.0, 150.0], 30.0, 0.0);
        assert!(ModuleLocator::default().locate(&img).is_err());
    }

    #[test]
    fn elongated_strip_is_rejected() {
        let mut img = ImageRgb8::new(300, 300, Rgb([30, 30, 30]));
        for y in 100..160 {
            for x in 20..280 {
                img.set(x, y, Rgb([200, 200, 200]));
            }
        }
        assert!(ModuleLocator::default().locate(&img).is_err());
    }

    #[test]
    fn scale_uses_longest_sides() {
        let spec = ModuleSpec {
            name: "T".into(),
            width_mm: 20.0,
            height_mm: 10.0,
            microid_x_mm: 1.0,
            microid_y_mm: 1.0,
            microid_size_mm: 2.0,
            padding_mm: 0.0,
        };
        let m = DetectedModule {
            corners: [[0.0; 2]; 4],
            center: [0.0, 0.0],
            angle: 0.0,
            width_px: 100.0,
            height_px: 400.0,
            area: 0.0,
            score: 0.0,
        };
        assert!((m.scale_for(&spec) - 20.0).abs() < 1e-12);
    }
}

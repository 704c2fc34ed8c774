use std::fmt;

use smallvec::SmallVec;
use tracing::debug;

use crate::image::{ImageRgb8, Rgb};
use crate::locate::geometry::{rotate, Point};
use crate::locate::DetectedModule;
use crate::module_spec::ModuleSpec;

/// Orientation hypothesis: how far the module is turned clockwise on screen
/// from its upright pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rotation {
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [Rotation::R0, Rotation::R90, Rotation::R180, Rotation::R270];

    pub fn quarter_turns(self) -> u32 {
        match self {
            Rotation::R0 => 0,
            Rotation::R90 => 1,
            Rotation::R180 => 2,
            Rotation::R270 => 3,
        }
    }

    pub fn degrees(self) -> u16 {
        self.quarter_turns() as u16 * 90
    }

    pub fn from_degrees(deg: u16) -> Option<Rotation> {
        match deg {
            0 => Some(Rotation::R0),
            90 => Some(Rotation::R90),
            180 => Some(Rotation::R180),
            270 => Some(Rotation::R270),
            _ => None,
        }
    }

    /// Exact quarter-turn rotation of `v` in image coordinates (clockwise on screen).
    fn turn(self, v: Point) -> Point {
        let [x, y] = v;
        match self {
            Rotation::R0 => [x, y],
            Rotation::R90 => [-y, x],
            Rotation::R180 => [-x, -y],
            Rotation::R270 => [y, -x],
        }
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Square region of a crop covered by the 5×5 cells, in crop pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridBounds {
    pub x: f64,
    pub y: f64,
    pub size: f64,
}

impl GridBounds {
    pub fn cell_size(&self) -> f64 {
        self.size / 5.0
    }

    /// Centre of cell (`row`, `col`), row 0 on top.
    pub fn cell_center(&self, row: usize, col: usize) -> Point {
        let c = self.cell_size();
        [
            self.x + (col as f64 + 0.5) * c,
            self.y + (row as f64 + 0.5) * c,
        ]
    }

    pub fn scaled(&self, factor: f64) -> GridBounds {
        GridBounds {
            x: self.x * factor,
            y: self.y * factor,
            size: self.size * factor,
        }
    }
}

/// One upright sub-image cut for one orientation hypothesis.
#[derive(Debug, Clone)]
pub struct CandidateCrop {
    pub rotation: Rotation,
    pub image: ImageRgb8,
    /// Where the crop centre sits in the source photo.
    pub center: Point,
    /// Total rotation applied while sampling, radians.
    pub angle: f64,
    /// Pixels per millimetre in the source photo.
    pub scale: f64,
    pub grid_bounds: GridBounds,
}

#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Extra border around the footprint on each side, as a fraction of the footprint.
    pub margin: f64,
    /// Share of the shorter image side assumed covered by the module when it
    /// could not be located.
    pub fill_ratio: f64,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            margin: 0.3,
            fill_ratio: 0.9,
        }
    }
}

/// Cuts the Micro-ID footprint out of a photo under each rotation hypothesis.
#[derive(Debug, Clone, Default)]
pub struct RegionExtractor {
    pub config: ExtractConfig,
}

/// Placement of one hypothesis before sampling.
struct Placement {
    rotation: Rotation,
    center: Point,
    angle: f64,
    scale: f64,
}

impl RegionExtractor {
    pub fn new(config: ExtractConfig) -> Self {
        Self { config }
    }

    /// One crop per rotation hypothesis, minus those that would be empty.
    pub fn extract(
        &self,
        img: &ImageRgb8,
        module: Option<&DetectedModule>,
        spec: &ModuleSpec,
    ) -> SmallVec<[CandidateCrop; 4]> {
        let placements: Vec<Placement> = match module {
            Some(m) => located_placements(m, spec),
            None => self.frame_placements(img, spec),
        };
        placements
            .into_iter()
            .filter_map(|p| self.cut(img, spec, p))
            .collect()
    }

    /// Module assumed centred, upright up to a quarter turn, and
    /// `fill_ratio` of the shorter side.
    fn frame_placements(&self, img: &ImageRgb8, spec: &ModuleSpec) -> Vec<Placement> {
        let short = img.width.min(img.height) as f64;
        let scale = self.config.fill_ratio * short / spec.longest_side_mm();
        let frame_center = [img.width as f64 / 2.0, img.height as f64 / 2.0];
        debug!(scale, "module not located, assuming it fills the frame");
        Rotation::ALL
            .iter()
            .map(|&rotation| Placement {
                rotation,
                center: offset_from(frame_center, offset_from_center(spec, scale), 0.0, rotation),
                angle: rotation.quarter_turns() as f64 * std::f64::consts::FRAC_PI_2,
                scale,
            })
            .collect()
    }

    fn cut(&self, img: &ImageRgb8, spec: &ModuleSpec, p: Placement) -> Option<CandidateCrop> {
        let side = spec.microid_size_mm * (1.0 + 2.0 * self.config.margin) * p.scale;
        let side_px = if side.is_finite() { side.round() } else { 0.0 };
        if side_px < 1.0 {
            debug!(rotation = %p.rotation, side, "dropping crop with no area");
            return None;
        }
        let n = side_px as u32;
        let half = side_px / 2.0;

        // fine angle first, then the exact quarter turns
        let theta = p.angle - p.rotation.quarter_turns() as f64 * std::f64::consts::FRAC_PI_2;
        let to_image = |d: Point| {
            let r = p.rotation.turn(rotate(d, theta));
            [p.center[0] + r[0], p.center[1] + r[1]]
        };

        let corners = [[-half, -half], [half, -half], [half, half], [-half, half]].map(to_image);
        let (mut x0, mut y0) = (f64::INFINITY, f64::INFINITY);
        let (mut x1, mut y1) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for c in &corners {
            x0 = x0.min(c[0]);
            y0 = y0.min(c[1]);
            x1 = x1.max(c[0]);
            y1 = y1.max(c[1]);
        }
        if x1 <= 0.0 || y1 <= 0.0 || x0 >= img.width as f64 || y0 >= img.height as f64 {
            debug!(rotation = %p.rotation, "dropping crop outside the image");
            return None;
        }

        let mut crop = ImageRgb8::new(n, n, Rgb::BLACK);
        for j in 0..n {
            for i in 0..n {
                let src = to_image([i as f64 + 0.5 - half, j as f64 + 0.5 - half]);
                crop.set(i, j, img.interpolate(src[0], src[1]));
            }
        }

        let grid = spec.grid_size_mm() * p.scale;
        let inset = (side_px - grid) / 2.0;
        debug!(
            rotation = %p.rotation,
            cx = p.center[0],
            cy = p.center[1],
            side = n,
            "cut candidate crop"
        );
        Some(CandidateCrop {
            rotation: p.rotation,
            image: crop,
            center: p.center,
            angle: p.angle,
            scale: p.scale,
            grid_bounds: GridBounds {
                x: inset,
                y: inset,
                size: grid,
            },
        })
    }
}

/// Placements derived from the detected outline.
fn located_placements(m: &DetectedModule, spec: &ModuleSpec) -> Vec<Placement> {
    let scale = m.scale_for(spec);
    let (u, v) = spec.microid_center_mm();

    let centroid = [
        m.corners.iter().map(|c| c[0]).sum::<f64>() / 4.0,
        m.corners.iter().map(|c| c[1]).sum::<f64>() / 4.0,
    ];
    // ascending angle in image coordinates runs TL, TR, BR, BL (clockwise on screen)
    let mut sorted = m.corners;
    sorted.sort_by(|a, b| {
        let ta = (a[1] - centroid[1]).atan2(a[0] - centroid[0]);
        let tb = (b[1] - centroid[1]).atan2(b[0] - centroid[0]);
        ta.total_cmp(&tb)
    });
    let bottom_left: Vec<usize> = (0..4)
        .filter(|&i| sorted[i][0] < centroid[0] && sorted[i][1] > centroid[1])
        .collect();

    let by_corner = bottom_left.len() == 1;
    if !by_corner {
        debug!("corner classification failed, placing relative to the centroid");
    }
    debug!(scale, angle_deg = m.angle.to_degrees(), "placing hypotheses on located module");

    Rotation::ALL
        .iter()
        .map(|&rotation| {
            let k = rotation.quarter_turns() as usize;
            let center = if by_corner {
                let origin = sorted[(bottom_left[0] + k) % 4];
                offset_from(origin, [u * scale, -v * scale], m.angle, rotation)
            } else {
                offset_from(m.center, offset_from_center(spec, scale), m.angle, rotation)
            };
            Placement {
                rotation,
                center,
                angle: m.angle + k as f64 * std::f64::consts::FRAC_PI_2,
                scale,
            }
        })
        .collect()
}

/// Micro-ID centre relative to the module centre, image axes for an upright module.
fn offset_from_center(spec: &ModuleSpec, scale: f64) -> Point {
    let (u, v) = spec.microid_center_mm();
    [
        (u - spec.width_mm / 2.0) * scale,
        -(v - spec.height_mm / 2.0) * scale,
    ]
}

fn offset_from(origin: Point, offset: Point, angle: f64, rotation: Rotation) -> Point {
    let r = rotation.turn(rotate(offset, angle));
    [origin[0] + r[0], origin[1] + r[1]]
}

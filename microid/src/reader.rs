use std::collections::BTreeMap;

use crate::enhance::NormalizedCrop;
use crate::error::ReadError;
use crate::extract::Rotation;
use crate::layout::{CELL_COUNT, GRID_SIZE};

/// Turns a normalised crop into 25 characters of grid text.
///
/// Implementations may be slow or remote; they run once per rotation
/// hypothesis, possibly from several threads.
pub trait GridReader: Send + Sync {
    fn read_grid(&self, crop: &NormalizedCrop) -> Result<String, ReadError>;
}

impl<R: GridReader + ?Sized> GridReader for Box<R> {
    fn read_grid(&self, crop: &NormalizedCrop) -> Result<String, ReadError> {
        (**self).read_grid(crop)
    }
}

impl<R: GridReader + ?Sized> GridReader for &R {
    fn read_grid(&self, crop: &NormalizedCrop) -> Result<String, ReadError> {
        (**self).read_grid(crop)
    }
}

/// Which way a marked cell differs from the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DotPolarity {
    #[default]
    Dark,
    Light,
}

#[derive(Debug, Clone)]
pub struct ThresholdReaderConfig {
    /// Side of the sampling window as a fraction of the cell size.
    pub sample_ratio: f64,
    /// Below this spread of cell means (grey levels) the crop reads as empty.
    pub min_contrast: f64,
    pub polarity: DotPolarity,
}

impl Default for ThresholdReaderConfig {
    fn default() -> Self {
        Self {
            sample_ratio: 0.4,
            min_contrast: 25.0,
            polarity: DotPolarity::Dark,
        }
    }
}

/// Deterministic reader: samples each cell centre and splits the 25 means in two.
#[derive(Debug, Clone, Default)]
pub struct ThresholdReader {
    pub config: ThresholdReaderConfig,
}

impl ThresholdReader {
    pub fn new(config: ThresholdReaderConfig) -> Self {
        Self { config }
    }

    /// Mean intensity around each cell centre, row-major.
    pub fn cell_means(&self, crop: &NormalizedCrop) -> Result<[f64; CELL_COUNT], ReadError> {
        let img = crop.pixels.luma();
        if img.width == 0 || img.height == 0 {
            return Err(ReadError::EmptyCrop);
        }
        let bounds = &crop.grid_bounds;
        let half = (self.config.sample_ratio * bounds.cell_size() / 2.0).max(0.5);

        let mut means = [0.0; CELL_COUNT];
        for row in 0..GRID_SIZE {
            for col in 0..GRID_SIZE {
                let [cx, cy] = bounds.cell_center(row, col);
                let x0 = (cx - half).floor() as i64;
                let y0 = (cy - half).floor() as i64;
                let x1 = ((cx + half).ceil() as i64 - 1).max(x0);
                let y1 = ((cy + half).ceil() as i64 - 1).max(y0);
                means[row * GRID_SIZE + col] = img.mean_in(x0, y0, x1, y1).ok_or_else(|| {
                    ReadError::Failed(format!("cell ({row}, {col}) lies outside the crop"))
                })?;
            }
        }
        Ok(means)
    }
}

impl GridReader for ThresholdReader {
    fn read_grid(&self, crop: &NormalizedCrop) -> Result<String, ReadError> {
        let means = self.cell_means(crop)?;
        let lo = means.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = means.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if hi - lo < self.config.min_contrast {
            return Ok("0".repeat(CELL_COUNT));
        }
        let t = otsu_split(&means);
        Ok(means
            .iter()
            .map(|&m| {
                let marked = match self.config.polarity {
                    DotPolarity::Dark => m < t,
                    DotPolarity::Light => m >= t,
                };
                if marked {
                    '1'
                } else {
                    '0'
                }
            })
            .collect())
    }
}

/// Threshold maximising between-class variance; values below it form the low class.
fn otsu_split(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len() as f64;
    let total: f64 = sorted.iter().sum();

    let mut best = (f64::NEG_INFINITY, sorted[0]);
    let mut low_sum = 0.0;
    for k in 1..sorted.len() {
        low_sum += sorted[k - 1];
        if sorted[k] == sorted[k - 1] {
            continue;
        }
        let w0 = k as f64 / n;
        let w1 = 1.0 - w0;
        let m0 = low_sum / k as f64;
        let m1 = (total - low_sum) / (n - k as f64);
        let between = w0 * w1 * (m0 - m1) * (m0 - m1);
        if between > best.0 {
            best = (between, (sorted[k - 1] + sorted[k]) / 2.0);
        }
    }
    best.1
}

/// Reader with canned answers per rotation, standing in for an external
/// classifier.
#[derive(Debug, Clone, Default)]
pub struct FixedReader {
    answers: BTreeMap<Rotation, String>,
}

impl FixedReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, rotation: Rotation, text: impl Into<String>) -> Self {
        self.insert(rotation, text);
        self
    }

    pub fn insert(&mut self, rotation: Rotation, text: impl Into<String>) {
        self.answers.insert(rotation, text.into());
    }

    /// Rotations that have an answer.
    pub fn rotations(&self) -> impl Iterator<Item = Rotation> + '_ {
        self.answers.keys().copied()
    }
}

impl GridReader for FixedReader {
    fn read_grid(&self, crop: &NormalizedCrop) -> Result<String, ReadError> {
        self.answers
            .get(&crop.rotation)
            .cloned()
            .ok_or(ReadError::NoAnswer(crop.rotation.degrees()))
    }
}

use thiserror::Error;
use tracing::{debug, warn};

#[cfg(feature = "parallel")]
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::codec::{self, Decoded, Serial};
use crate::enhance::{CropEnhancer, EnhanceConfig, NormalizedCrop};
use crate::error::{CodecError, ConfigError, ReadError};
use crate::extract::{CandidateCrop, ExtractConfig, RegionExtractor, Rotation};
use crate::image::ImageRgb8;
use crate::locate::geometry::Point;
use crate::locate::{DetectedModule, LocatorConfig, ModuleLocator};
use crate::module_spec::{ModuleSpec, ModuleTable};
use crate::reader::GridReader;

/// Settings for every stage of the photo decoder.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub locator: LocatorConfig,
    pub extract: ExtractConfig,
    pub enhance: EnhanceConfig,
}

/// One hypothesis that produced decodable grid text.
#[derive(Debug, Clone)]
pub struct CandidateResult {
    pub rotation: Rotation,
    /// Crop centre in the source photo.
    pub center: Point,
    pub scale: f64,
    pub grid_text: String,
    pub decoded: Decoded,
    pub crop: NormalizedCrop,
}

impl CandidateResult {
    pub fn is_valid(&self) -> bool {
        self.decoded.is_valid()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CropFailure {
    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Grid(#[from] CodecError),
}

/// A hypothesis whose crop could not be turned into a grid.
#[derive(Debug, Clone)]
pub struct UnreadableCrop {
    pub rotation: Rotation,
    pub reason: CropFailure,
    pub crop: NormalizedCrop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// Exactly one hypothesis passed both anchor and parity checks.
    Accepted,
    /// More than one did; nothing is picked.
    Ambiguous,
    NoValid,
}

impl DecodeStatus {
    fn from_valid_count(n: usize) -> DecodeStatus {
        match n {
            0 => DecodeStatus::NoValid,
            1 => DecodeStatus::Accepted,
            _ => DecodeStatus::Ambiguous,
        }
    }
}

/// Everything learned from one photo.
#[derive(Debug, Clone)]
pub struct DecodeReport {
    /// `None` when the frame-filling placement was used.
    pub module: Option<DetectedModule>,
    pub candidates: Vec<CandidateResult>,
    pub unreadable: Vec<UnreadableCrop>,
    pub status: DecodeStatus,
}

impl DecodeReport {
    pub fn valid(&self) -> impl Iterator<Item = &CandidateResult> {
        self.candidates.iter().filter(|c| c.is_valid())
    }

    /// The single valid candidate, only when the status is `Accepted`.
    pub fn accepted(&self) -> Option<&CandidateResult> {
        match self.status {
            DecodeStatus::Accepted => self.valid().next(),
            _ => None,
        }
    }

    /// Valid candidates carrying `expected`.
    pub fn matching(&self, expected: Serial) -> Vec<&CandidateResult> {
        self.valid().filter(|c| c.decoded.serial == expected).collect()
    }
}

/// Photo → serial decoder for one module type.
pub struct DecodePipeline<'t, R> {
    spec: &'t ModuleSpec,
    reader: R,
    locator: ModuleLocator,
    extractor: RegionExtractor,
    enhancer: CropEnhancer,
}

impl<'t, R: GridReader> DecodePipeline<'t, R> {
    pub fn new(
        table: &'t ModuleTable,
        module_type: &str,
        reader: R,
        config: PipelineConfig,
    ) -> Result<Self, ConfigError> {
        let spec = table.get(module_type)?;
        Ok(Self {
            spec,
            reader,
            locator: ModuleLocator::new(config.locator),
            extractor: RegionExtractor::new(config.extract),
            enhancer: CropEnhancer::new(config.enhance),
        })
    }

    pub fn spec(&self) -> &ModuleSpec {
        self.spec
    }

    pub fn locator(&self) -> &ModuleLocator {
        &self.locator
    }

    pub fn decode(&self, img: &ImageRgb8) -> DecodeReport {
        // Stage 1: find the module, or fall back to the frame
        let module = match self.locator.locate(img) {
            Ok(m) => Some(m),
            Err(e) => {
                debug!(error = %e, "using frame-filling placement");
                None
            }
        };

        // Stage 2: one crop per rotation hypothesis
        let crops = self.extractor.extract(img, module.as_ref(), self.spec);

        // Stages 3-5: enhance, read, decode
        let attempt = |crop: &CandidateCrop| self.attempt(crop);

        #[cfg(feature = "parallel")]
        let outcomes: Vec<Result<CandidateResult, UnreadableCrop>> =
            crops.par_iter().map(attempt).collect();

        #[cfg(not(feature = "parallel"))]
        let outcomes: Vec<Result<CandidateResult, UnreadableCrop>> =
            crops.iter().map(attempt).collect();

        let mut candidates = Vec::new();
        let mut unreadable = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(c) => candidates.push(c),
                Err(u) => unreadable.push(u),
            }
        }

        // Stage 6: rank without guessing
        let status = DecodeStatus::from_valid_count(candidates.iter().filter(|c| c.is_valid()).count());
        debug!(
            candidates = candidates.len(),
            unreadable = unreadable.len(),
            status = ?status,
            "photo decoded"
        );
        DecodeReport {
            module,
            candidates,
            unreadable,
            status,
        }
    }

    fn attempt(&self, crop: &CandidateCrop) -> Result<CandidateResult, UnreadableCrop> {
        let normalized = self.enhancer.enhance(crop);
        let outcome = self
            .reader
            .read_grid(&normalized)
            .map_err(CropFailure::from)
            .and_then(|text| {
                let decoded = codec::decode(&text)?;
                Ok((text, decoded))
            });
        match outcome {
            Ok((grid_text, decoded)) => {
                debug!(
                    rotation = %crop.rotation,
                    serial = %decoded.serial,
                    anchors_valid = decoded.anchors_valid,
                    parity_valid = decoded.parity_valid,
                    "candidate read"
                );
                Ok(CandidateResult {
                    rotation: crop.rotation,
                    center: crop.center,
                    scale: crop.scale,
                    grid_text,
                    decoded,
                    crop: normalized,
                })
            }
            Err(reason) => {
                warn!(rotation = %crop.rotation, %reason, "crop unreadable");
                Err(UnreadableCrop {
                    rotation: crop.rotation,
                    reason,
                    crop: normalized,
                })
            }
        }
    }
}

#[allow(clippy::needless_range_loop)]
pub mod resize;
#[allow(clippy::needless_range_loop)]
pub mod clahe;
pub mod enhancer;

pub use enhancer::{Boost, CropEnhancer, CropPixels, EnhanceConfig, NormalizedCrop};

#[allow(clippy::needless_range_loop)]
pub mod preprocess;
pub mod edges;
pub mod morph;
pub mod unionfind;
pub mod blobs;
#[allow(clippy::needless_range_loop)]
pub mod geometry;
pub mod locator;

pub use locator::{DetectedModule, LocateStages, LocateTrace, LocatorConfig, ModuleLocator};

//! PNG output for rendered codes and saved crops.

use anyhow::{Context, Result};
use microid::image::ImageRgb8;
use std::path::Path;

pub fn write_rgb_png(path: &Path, img: &ImageRgb8) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let w = std::io::BufWriter::new(file);

    let mut encoder = png::Encoder::new(w, img.width, img.height);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);

    let mut writer = encoder
        .write_header()
        .with_context(|| format!("writing PNG header for {}", path.display()))?;
    writer
        .write_image_data(&img.buf)
        .with_context(|| format!("writing PNG data for {}", path.display()))?;

    Ok(())
}

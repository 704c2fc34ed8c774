use crate::image::ImageU8;

/// Shrink by an integer factor `f`, each output pixel the mean of an f×f block.
/// Trailing rows and columns that do not fill a block are dropped.
pub fn decimate(img: &ImageU8, f: u32) -> ImageU8 {
    if f <= 1 {
        return img.clone();
    }
    let mut out = ImageU8::new(img.width / f, img.height / f);
    let block = f * f;
    for oy in 0..out.height {
        let rows = oy * f..(oy + 1) * f;
        for ox in 0..out.width {
            let total: u32 = rows
                .clone()
                .flat_map(|y| (ox * f..(ox + 1) * f).map(move |x| (x, y)))
                .map(|(x, y)| img.get(x, y) as u32)
                .sum();
            out.set(ox, oy, (total / block) as u8);
        }
    }
    out
}

/// Smallest decimation factor that brings the longer side to `max_dimension` or below.
pub fn decimation_for(width: u32, height: u32, max_dimension: u32) -> u32 {
    if max_dimension == 0 {
        return 1;
    }
    width.max(height).div_ceil(max_dimension).max(1)
}

/// Normalised taps of a sampled Gaussian; `taps` should be odd.
fn gaussian_taps(sigma: f32, taps: usize) -> Vec<f32> {
    let centre = (taps / 2) as f32;
    let weights: Vec<f32> = (0..taps)
        .map(|i| {
            let d = i as f32 - centre;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let norm: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / norm).collect()
}

/// One 1-D pass along x (`horizontal`) or y, edges replicated.
fn smooth_pass(src: &ImageU8, taps: &[f32], horizontal: bool) -> ImageU8 {
    let reach = (taps.len() / 2) as i64;
    let mut out = ImageU8::new(src.width, src.height);
    for y in 0..src.height {
        for x in 0..src.width {
            let acc: f32 = taps
                .iter()
                .enumerate()
                .map(|(i, &w)| {
                    let off = i as i64 - reach;
                    let v = if horizontal {
                        src.get_clamped(x as i64 + off, y as i64)
                    } else {
                        src.get_clamped(x as i64, y as i64 + off)
                    };
                    v as f32 * w
                })
                .sum();
            out.set(x, y, acc.round().clamp(0.0, 255.0) as u8);
        }
    }
    out
}

/// Separable Gaussian smoothing. `sigma <= 0` or fewer than two taps is a no-op.
pub fn gaussian_blur(img: &ImageU8, sigma: f32, taps: usize) -> ImageU8 {
    if taps <= 1 || sigma <= 0.0 {
        return img.clone();
    }
    let kernel = gaussian_taps(sigma, taps);
    let rows = smooth_pass(img, &kernel, true);
    smooth_pass(&rows, &kernel, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimate_factor_2_averages_blocks() {
        let mut img = ImageU8::new(4, 4);
        img.set(0, 0, 100);
        img.set(1, 0, 200);
        img.set(0, 1, 0);
        img.set(1, 1, 100);
        let out = decimate(&img, 2);
        assert_eq!(out.width, 2);
        assert_eq!(out.height, 2);
        assert_eq!(out.get(0, 0), 100);
    }

    #[test]
    fn decimate_truncates_partial_blocks() {
        let img = ImageU8::new(5, 5);
        let out = decimate(&img, 2);
        assert_eq!(out.width, 2);
        assert_eq!(out.height, 2);
    }

    #[test]
    fn decimation_factor_for_large_photos() {
        assert_eq!(decimation_for(500, 400, 1200), 1);
        assert_eq!(decimation_for(4032, 3024, 1200), 4);
        assert_eq!(decimation_for(2400, 100, 1200), 2);
        assert_eq!(decimation_for(2400, 100, 0), 1);
    }

    #[test]
    fn gaussian_taps_sum_to_one() {
        let k = gaussian_taps(1.1, 5);
        assert_eq!(k.len(), 5);
        let sum: f32 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!((k[0] - k[4]).abs() < 1e-6);
    }

    #[test]
    fn blur_spreads_a_peak() {
        let mut img = ImageU8::new(10, 10);
        img.set(5, 5, 255);
        let out = gaussian_blur(&img, 1.1, 5);
        assert!(out.get(5, 5) < 255);
        assert!(out.get(4, 5) > 0);
    }

    #[test]
    fn blur_keeps_uniform_image() {
        let img = ImageU8::filled(8, 8, 77);
        let out = gaussian_blur(&img, 1.1, 5);
        assert!(out.buf.iter().all(|&v| v == 77));
    }
}

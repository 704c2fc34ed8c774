use crate::image::{ImageRgb8, Rgb};

/// Cubic convolution weight (Keys kernel, a = -0.75).
#[inline]
fn cubic(t: f64) -> f64 {
    const A: f64 = -0.75;
    let t = t.abs();
    if t <= 1.0 {
        ((A + 2.0) * t - (A + 3.0)) * t * t + 1.0
    } else if t < 2.0 {
        ((A * t - 5.0 * A) * t + 8.0 * A) * t - 4.0 * A
    } else {
        0.0
    }
}

/// Four source taps and weights for one output coordinate.
fn taps(dst: u32, scale: f64, len: u32) -> ([i64; 4], [f64; 4]) {
    let src = (dst as f64 + 0.5) * scale - 0.5;
    let base = src.floor();
    let frac = src - base;
    let base = base as i64;
    let mut idx = [0i64; 4];
    let mut w = [0.0f64; 4];
    for k in 0..4 {
        idx[k] = (base - 1 + k as i64).clamp(0, len as i64 - 1);
        w[k] = cubic(frac - (k as f64 - 1.0));
    }
    (idx, w)
}

/// Bicubic resize to `width` × `height` with replicated borders.
pub fn resize_bicubic(img: &ImageRgb8, width: u32, height: u32) -> ImageRgb8 {
    if img.is_empty() || width == 0 || height == 0 {
        return ImageRgb8::new(width, height, Rgb::BLACK);
    }
    if (width, height) == (img.width, img.height) {
        return img.clone();
    }
    let sx = img.width as f64 / width as f64;
    let sy = img.height as f64 / height as f64;
    let xtaps: Vec<_> = (0..width).map(|x| taps(x, sx, img.width)).collect();

    // horizontal pass into f64 rows, then vertical
    let mut tmp = vec![[0.0f64; 3]; (width * img.height) as usize];
    for y in 0..img.height {
        for (x, (idx, w)) in xtaps.iter().enumerate() {
            let mut acc = [0.0f64; 3];
            for k in 0..4 {
                let p = img.get(idx[k] as u32, y).0;
                for c in 0..3 {
                    acc[c] += p[c] as f64 * w[k];
                }
            }
            tmp[(y * width) as usize + x] = acc;
        }
    }

    let mut out = ImageRgb8::new(width, height, Rgb::BLACK);
    for y in 0..height {
        let (idx, w) = taps(y, sy, img.height);
        for x in 0..width {
            let mut acc = [0.0f64; 3];
            for k in 0..4 {
                let p = tmp[(idx[k] as u32 * width + x) as usize];
                for c in 0..3 {
                    acc[c] += p[c] * w[k];
                }
            }
            out.set(x, y, Rgb(acc.map(|v| v.round().clamp(0.0, 255.0) as u8)));
        }
    }
    out
}

/// Output size that makes the longer side equal `target`, keeping the aspect ratio.
pub fn fit_longer_side(width: u32, height: u32, target: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }
    if width >= height {
        let h = (height as f64 * target as f64 / width as f64).round().max(1.0) as u32;
        (target, h)
    } else {
        let w = (width as f64 * target as f64 / height as f64).round().max(1.0) as u32;
        (w, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_interpolates() {
        assert_eq!(cubic(0.0), 1.0);
        assert!(cubic(1.0).abs() < 1e-12);
        assert!(cubic(2.0).abs() < 1e-12);
        let sum: f64 = (0..4).map(|k| cubic(0.3 - (k as f64 - 1.0))).sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn uniform_image_stays_uniform() {
        let img = ImageRgb8::new(7, 5, Rgb([12, 130, 250]));
        let out = resize_bicubic(&img, 40, 29);
        assert_eq!((out.width, out.height), (40, 29));
        assert!(out.buf.chunks_exact(3).all(|p| p == [12, 130, 250]));
    }

    #[test]
    fn upscale_keeps_halves_apart() {
        let mut img = ImageRgb8::new(10, 10, Rgb::WHITE);
        for y in 0..10 {
            for x in 0..5 {
                img.set(x, y, Rgb::BLACK);
            }
        }
        let out = resize_bicubic(&img, 40, 40);
        assert_eq!(out.get(5, 20), Rgb::BLACK);
        assert_eq!(out.get(34, 20), Rgb::WHITE);
    }

    #[test]
    fn fit_sizes() {
        assert_eq!(fit_longer_side(292, 292, 400), (400, 400));
        assert_eq!(fit_longer_side(800, 400, 400), (400, 200));
        assert_eq!(fit_longer_side(30, 90, 400), (133, 400));
    }
}

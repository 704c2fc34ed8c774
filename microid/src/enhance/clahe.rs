use crate::image::ImageU8;

/// Contrast-limited adaptive histogram equalisation.
///
/// The image is split into `tiles` × `tiles` regions; each gets an equalising
/// lookup table from its histogram clipped at `clip_limit` times the mean bin
/// height, with the excess spread over all bins. Every pixel blends the
/// tables of its four nearest tile centres bilinearly.
pub fn clahe(img: &ImageU8, clip_limit: f64, tiles: u32) -> ImageU8 {
    let w = img.width as usize;
    let h = img.height as usize;
    let tx = (tiles as usize).min(w);
    let ty = (tiles as usize).min(h);
    if tx == 0 || ty == 0 {
        return img.clone();
    }

    // tile boundaries: tile i spans [edge(i), edge(i + 1))
    let xedge = |i: usize| i * w / tx;
    let yedge = |i: usize| i * h / ty;

    let mut luts = vec![[0u8; 256]; tx * ty];
    for j in 0..ty {
        for i in 0..tx {
            let (x0, x1) = (xedge(i), xedge(i + 1));
            let (y0, y1) = (yedge(j), yedge(j + 1));
            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[img.get(x as u32, y as u32) as usize] += 1;
                }
            }
            let count = ((x1 - x0) * (y1 - y0)) as u32;
            luts[j * tx + i] = tile_lut(&mut hist, count, clip_limit);
        }
    }

    let tile_w = w as f64 / tx as f64;
    let tile_h = h as f64 / ty as f64;
    let mut out = ImageU8::new(img.width, img.height);
    for y in 0..h {
        let fy = (y as f64 + 0.5) / tile_h - 0.5;
        let (j0, j1, ay) = neighbours(fy, ty);
        for x in 0..w {
            let fx = (x as f64 + 0.5) / tile_w - 0.5;
            let (i0, i1, ax) = neighbours(fx, tx);
            let v = img.get(x as u32, y as u32) as usize;
            let top = luts[j0 * tx + i0][v] as f64 * (1.0 - ax) + luts[j0 * tx + i1][v] as f64 * ax;
            let bot = luts[j1 * tx + i0][v] as f64 * (1.0 - ax) + luts[j1 * tx + i1][v] as f64 * ax;
            let blended = top * (1.0 - ay) + bot * ay;
            out.set(x as u32, y as u32, blended.round().clamp(0.0, 255.0) as u8);
        }
    }
    out
}

/// Clip, redistribute, and integrate one tile histogram.
fn tile_lut(hist: &mut [u32; 256], count: u32, clip_limit: f64) -> [u8; 256] {
    let mut lut = [0u8; 256];
    if count == 0 {
        return lut;
    }
    if clip_limit > 0.0 {
        let clip = ((clip_limit * count as f64 / 256.0) as u32).max(1);
        let mut excess = 0u32;
        for bin in hist.iter_mut() {
            if *bin > clip {
                excess += *bin - clip;
                *bin = clip;
            }
        }
        let per_bin = excess / 256;
        let residual = (excess % 256) as usize;
        for bin in hist.iter_mut() {
            *bin += per_bin;
        }
        if residual > 0 {
            let step = (256 / residual).max(1);
            for k in (0..256).step_by(step).take(residual) {
                hist[k] += 1;
            }
        }
    }
    let scale = 255.0 / count as f64;
    let mut sum = 0u32;
    for (v, &bin) in hist.iter().enumerate() {
        sum += bin;
        lut[v] = (sum as f64 * scale).round().min(255.0) as u8;
    }
    lut
}

/// Lower and upper tile index around a fractional tile coordinate, with the blend weight.
#[inline]
fn neighbours(f: f64, n: usize) -> (usize, usize, f64) {
    let base = f.floor();
    let a = f - base;
    let lo = (base as i64).clamp(0, n as i64 - 1) as usize;
    let hi = (base as i64 + 1).clamp(0, n as i64 - 1) as usize;
    (lo, hi, a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_image_stays_flat() {
        let img = ImageU8::filled(64, 48, 77);
        let out = clahe(&img, 2.0, 8);
        let v = out.get(0, 0);
        assert!(out.buf.iter().all(|&p| p == v));
    }

    #[test]
    fn stretches_low_contrast_blob() {
        let mut img = ImageU8::filled(80, 80, 120);
        for y in 30..50 {
            for x in 30..50 {
                img.set(x, y, 100);
            }
        }
        let out = clahe(&img, 2.0, 8);
        let inside = out.get(40, 40) as i32;
        let outside = out.get(5, 5) as i32;
        assert!(outside - inside > 20, "inside {inside} outside {outside}");
    }

    #[test]
    fn clip_redistributes_everything() {
        let mut hist = [0u32; 256];
        hist[10] = 1000;
        let lut = tile_lut(&mut hist, 1000, 2.0);
        assert_eq!(hist.iter().sum::<u32>(), 1000);
        assert_eq!(lut[255], 255);
        // clipped peak no longer jumps straight to white
        assert!(lut[10] < 128);
    }

    #[test]
    fn tiny_image_passes_through_shape() {
        let img = ImageU8::filled(3, 2, 50);
        let out = clahe(&img, 2.0, 8);
        assert_eq!((out.width, out.height), (3, 2));
    }
}

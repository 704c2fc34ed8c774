use crate::image::ImageU8;

pub const EDGE: u8 = 255;

/// Canny edge map: 255 on edge pixels, 0 elsewhere.
///
/// Sobel gradients with L1 magnitude, non-maximum suppression over four
/// quantized directions, then hysteresis: pixels above `high` seed edges that
/// grow through 8-connected pixels above `low`.
pub fn canny(img: &ImageU8, low: f32, high: f32) -> ImageU8 {
    let w = img.width as usize;
    let h = img.height as usize;
    let mut out = ImageU8::new(img.width, img.height);
    if w < 3 || h < 3 {
        return out;
    }

    let (gx, gy) = sobel(img);
    let mag: Vec<f32> = gx.iter().zip(&gy).map(|(a, b)| a.abs() + b.abs()).collect();

    // tan(22.5°) and tan(67.5°)
    const TAN_22: f32 = 0.414_213_57;
    const TAN_67: f32 = 2.414_213_6;

    let mut nms = vec![0.0f32; w * h];
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let i = y * w + x;
            let m = mag[i];
            if m <= low {
                continue;
            }
            let ax = gx[i].abs();
            let ay = gy[i].abs();
            let (a, b) = if ay <= ax * TAN_22 {
                (i - 1, i + 1)
            } else if ay >= ax * TAN_67 {
                (i - w, i + w)
            } else if (gx[i] > 0.0) == (gy[i] > 0.0) {
                (i - w - 1, i + w + 1)
            } else {
                (i - w + 1, i + w - 1)
            };
            if m > mag[a] && m >= mag[b] {
                nms[i] = m;
            }
        }
    }

    let mut stack: Vec<usize> = Vec::new();
    for (i, &m) in nms.iter().enumerate() {
        if m > high {
            out.buf[i] = EDGE;
            stack.push(i);
        }
    }
    while let Some(i) = stack.pop() {
        let x = (i % w) as i64;
        let y = (i / w) as i64;
        for dy in -1..=1i64 {
            for dx in -1..=1i64 {
                let nx = x + dx;
                let ny = y + dy;
                if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                    continue;
                }
                let j = ny as usize * w + nx as usize;
                if out.buf[j] == 0 && nms[j] > low {
                    out.buf[j] = EDGE;
                    stack.push(j);
                }
            }
        }
    }
    out
}

/// 3×3 Sobel derivatives with replicated borders.
fn sobel(img: &ImageU8) -> (Vec<f32>, Vec<f32>) {
    let w = img.width as i64;
    let h = img.height as i64;
    let mut gx = vec![0.0f32; (w * h) as usize];
    let mut gy = vec![0.0f32; (w * h) as usize];
    for y in 0..h {
        for x in 0..w {
            let p = |dx: i64, dy: i64| img.get_clamped(x + dx, y + dy) as f32;
            let i = (y * w + x) as usize;
            gx[i] = (p(1, -1) + 2.0 * p(1, 0) + p(1, 1)) - (p(-1, -1) + 2.0 * p(-1, 0) + p(-1, 1));
            gy[i] = (p(-1, 1) + 2.0 * p(0, 1) + p(1, 1)) - (p(-1, -1) + 2.0 * p(0, -1) + p(1, -1));
        }
    }
    (gx, gy)
}

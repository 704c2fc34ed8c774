use crate::image::ImageU8;

/// Grow bright regions with a 3×3 max filter, `iterations` times.
pub fn dilate(img: &ImageU8, iterations: u32) -> ImageU8 {
    repeat(img, iterations, u8::max)
}

/// Shrink bright regions with a 3×3 min filter, `iterations` times.
pub fn erode(img: &ImageU8, iterations: u32) -> ImageU8 {
    repeat(img, iterations, u8::min)
}

fn repeat(img: &ImageU8, iterations: u32, pick: fn(u8, u8) -> u8) -> ImageU8 {
    (0..iterations).fold(img.clone(), |acc, _| neighbourhood(&acc, pick))
}

/// Fold each 3×3 neighbourhood with `pick`; pixels past the border are skipped.
fn neighbourhood(img: &ImageU8, pick: fn(u8, u8) -> u8) -> ImageU8 {
    let mut out = ImageU8::new(img.width, img.height);
    for y in 0..img.height {
        let ys = y.saturating_sub(1)..=(y + 1).min(img.height - 1);
        for x in 0..img.width {
            let xs = x.saturating_sub(1)..=(x + 1).min(img.width - 1);
            let v = ys
                .clone()
                .flat_map(|ny| xs.clone().map(move |nx| (nx, ny)))
                .fold(img.get(x, y), |acc, (nx, ny)| pick(acc, img.get(nx, ny)));
            out.set(x, y, v);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dilate_expands_bright() {
        let mut img = ImageU8::new(7, 7);
        img.set(3, 3, 255);
        let out = dilate(&img, 1);
        for dy in -1..=1i32 {
            for dx in -1..=1i32 {
                assert_eq!(out.get((3 + dx) as u32, (3 + dy) as u32), 255);
            }
        }
        assert_eq!(out.get(1, 3), 0);
        let twice = dilate(&img, 2);
        assert_eq!(twice.get(1, 1), 255);
        assert_eq!(twice.get(0, 3), 0);
    }

    #[test]
    fn erode_shrinks_bright() {
        let mut img = ImageU8::filled(5, 5, 255);
        img.set(2, 2, 0);
        let out = erode(&img, 1);
        for dy in -1..=1i32 {
            for dx in -1..=1i32 {
                assert_eq!(out.get((2 + dx) as u32, (2 + dy) as u32), 0);
            }
        }
    }

    #[test]
    fn close_restores_a_square() {
        let mut img = ImageU8::new(20, 20);
        for y in 5..15 {
            for x in 5..15 {
                img.set(x, y, 255);
            }
        }
        let closed = erode(&dilate(&img, 2), 2);
        assert_eq!(closed, img);
    }
}

use std::fmt;
use std::str::FromStr;

/// Single-channel intensity image with row-major pixel data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImageU8 {
    pub width: u32,
    pub height: u32,
    pub buf: Vec<u8>,
}

impl ImageU8 {
    /// Create a new image filled with zeros.
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, 0)
    }

    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        let buf = vec![value; (width * height) as usize];
        Self { width, height, buf }
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.buf[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, val: u8) {
        self.buf[(y * self.width + x) as usize] = val;
    }

    /// Pixel lookup with coordinates clamped to the image.
    #[inline]
    pub fn get_clamped(&self, x: i64, y: i64) -> u8 {
        let cx = x.clamp(0, self.width as i64 - 1) as u32;
        let cy = y.clamp(0, self.height as i64 - 1) as u32;
        self.get(cx, cy)
    }

    /// Bilinear interpolation at sub-pixel coordinates, pixel centres at +0.5.
    pub fn interpolate(&self, px: f64, py: f64) -> f64 {
        let (x0, y0, fx, fy) = bilinear_base(px, py);
        let v00 = self.get_clamped(x0, y0) as f64;
        let v10 = self.get_clamped(x0 + 1, y0) as f64;
        let v01 = self.get_clamped(x0, y0 + 1) as f64;
        let v11 = self.get_clamped(x0 + 1, y0 + 1) as f64;
        blend(v00, v10, v01, v11, fx, fy)
    }

    /// Mean intensity over the inclusive pixel rectangle, clipped to the image.
    pub fn mean_in(&self, x0: i64, y0: i64, x1: i64, y1: i64) -> Option<f64> {
        let x0 = x0.max(0);
        let y0 = y0.max(0);
        let x1 = x1.min(self.width as i64 - 1);
        let y1 = y1.min(self.height as i64 - 1);
        if x0 > x1 || y0 > y1 {
            return None;
        }
        let mut sum = 0u64;
        for y in y0..=y1 {
            for x in x0..=x1 {
                sum += self.get(x as u32, y as u32) as u64;
            }
        }
        let n = ((x1 - x0 + 1) * (y1 - y0 + 1)) as f64;
        Some(sum as f64 / n)
    }
}

/// An RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const WHITE: Rgb = Rgb([255, 255, 255]);
    pub const BLACK: Rgb = Rgb([0, 0, 0]);

    /// ITU-R BT.601 luma, rounded.
    #[inline]
    pub fn luma(self) -> u8 {
        let [r, g, b] = self.0;
        (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64).round() as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid colour '{0}', expected #RRGGBB")]
pub struct ParseColorError(String);

impl FromStr for Rgb {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(ParseColorError(s.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ParseColorError(s.to_string()))
        };
        Ok(Rgb([channel(0)?, channel(2)?, channel(4)?]))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{r:02X}{g:02X}{b:02X}")
    }
}

/// Three-channel colour image, packed RGB rows without padding.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRgb8 {
    pub width: u32,
    pub height: u32,
    pub buf: Vec<u8>,
}

impl ImageRgb8 {
    pub fn new(width: u32, height: u32, fill: Rgb) -> Self {
        let buf = fill
            .0
            .iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect();
        Self { width, height, buf }
    }

    /// Wrap packed RGB data; `buf` must hold exactly `width * height * 3` bytes.
    pub fn from_raw(width: u32, height: u32, buf: Vec<u8>) -> Self {
        assert_eq!(buf.len(), (width * height * 3) as usize);
        Self { width, height, buf }
    }

    /// Expand a grey image into three identical channels.
    pub fn from_luma(img: &ImageU8) -> Self {
        let mut out = ImageRgb8::new(img.width, img.height, Rgb::BLACK);
        for y in 0..img.height {
            for x in 0..img.width {
                let v = img.get(x, y);
                out.set(x, y, Rgb([v, v, v]));
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Rgb {
        let i = ((y * self.width + x) * 3) as usize;
        Rgb([self.buf[i], self.buf[i + 1], self.buf[i + 2]])
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, c: Rgb) {
        let i = ((y * self.width + x) * 3) as usize;
        self.buf[i..i + 3].copy_from_slice(&c.0);
    }

    #[inline]
    pub fn get_clamped(&self, x: i64, y: i64) -> Rgb {
        let cx = x.clamp(0, self.width as i64 - 1) as u32;
        let cy = y.clamp(0, self.height as i64 - 1) as u32;
        self.get(cx, cy)
    }

    /// Bilinear sample of all three channels, pixel centres at +0.5.
    pub fn interpolate(&self, px: f64, py: f64) -> Rgb {
        let (x0, y0, fx, fy) = bilinear_base(px, py);
        let p00 = self.get_clamped(x0, y0).0;
        let p10 = self.get_clamped(x0 + 1, y0).0;
        let p01 = self.get_clamped(x0, y0 + 1).0;
        let p11 = self.get_clamped(x0 + 1, y0 + 1).0;
        let mut out = [0u8; 3];
        for c in 0..3 {
            let v = blend(
                p00[c] as f64,
                p10[c] as f64,
                p01[c] as f64,
                p11[c] as f64,
                fx,
                fy,
            );
            out[c] = v.round().clamp(0.0, 255.0) as u8;
        }
        Rgb(out)
    }

    pub fn to_luma(&self) -> ImageU8 {
        let mut out = ImageU8::new(self.width, self.height);
        for (dst, px) in out.buf.iter_mut().zip(self.buf.chunks_exact(3)) {
            *dst = Rgb([px[0], px[1], px[2]]).luma();
        }
        out
    }
}

#[inline]
fn bilinear_base(px: f64, py: f64) -> (i64, i64, f64, f64) {
    let x = px - 0.5;
    let y = py - 0.5;
    let x0 = x.floor();
    let y0 = y.floor();
    (x0 as i64, y0 as i64, x - x0, y - y0)
}

#[inline]
fn blend(v00: f64, v10: f64, v01: f64, v11: f64, fx: f64, fy: f64) -> f64 {
    v00 * (1.0 - fx) * (1.0 - fy) + v10 * fx * (1.0 - fy) + v01 * (1.0 - fx) * fy + v11 * fx * fy
}

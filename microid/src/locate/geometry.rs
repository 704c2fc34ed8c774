use std::cmp::Ordering;

pub type Point = [f64; 2];

/// Convex hull by monotone chain. Output has no repeated points and winds
/// counter-clockwise in a Y-up frame (clockwise on screen).
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut pts: Vec<Point> = points.to_vec();
    pts.sort_by(|a, b| {
        a[0].partial_cmp(&b[0])
            .unwrap_or(Ordering::Equal)
            .then(a[1].partial_cmp(&b[1]).unwrap_or(Ordering::Equal))
    });
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let cross = |o: Point, a: Point, b: Point| (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0]);

    let mut lower: Vec<Point> = Vec::new();
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }
    let mut upper: Vec<Point> = Vec::new();
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// A rectangle of any orientation.
///
/// `angle` is the direction of the `width` side in radians, measured in image
/// coordinates (X right, Y down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    pub center: Point,
    pub width: f64,
    pub height: f64,
    pub angle: f64,
}

impl RotatedRect {
    /// Ratio of the short side to the long side, 1.0 for a square.
    pub fn squareness(&self) -> f64 {
        let long = self.width.max(self.height);
        if long <= 0.0 {
            return 0.0;
        }
        self.width.min(self.height) / long
    }

    /// Swap sides if needed so `width` is the long side.
    pub fn long_side_first(self) -> RotatedRect {
        if self.height > self.width {
            RotatedRect {
                center: self.center,
                width: self.height,
                height: self.width,
                angle: self.angle + std::f64::consts::FRAC_PI_2,
            }
        } else {
            self
        }
    }

    pub fn corners(&self) -> [Point; 4] {
        let (s, c) = self.angle.sin_cos();
        let u = [c * self.width / 2.0, s * self.width / 2.0];
        let v = [-s * self.height / 2.0, c * self.height / 2.0];
        let [cx, cy] = self.center;
        [
            [cx - u[0] - v[0], cy - u[1] - v[1]],
            [cx + u[0] - v[0], cy + u[1] - v[1]],
            [cx + u[0] + v[0], cy + u[1] + v[1]],
            [cx - u[0] + v[0], cy - u[1] + v[1]],
        ]
    }
}

/// Minimum-area enclosing rectangle of a convex hull (rotating calipers:
/// one rectangle side is always collinear with a hull edge).
pub fn min_area_rect(hull: &[Point]) -> Option<RotatedRect> {
    if hull.len() < 3 {
        return None;
    }
    let mut best: Option<(f64, RotatedRect)> = None;
    for i in 0..hull.len() {
        let a = hull[i];
        let b = hull[(i + 1) % hull.len()];
        let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
        let len = (dx * dx + dy * dy).sqrt();
        if len < 1e-12 {
            continue;
        }
        let e = [dx / len, dy / len];
        let n = [-e[1], e[0]];

        let (mut umin, mut umax) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut vmin, mut vmax) = (f64::INFINITY, f64::NEG_INFINITY);
        for p in hull {
            let u = p[0] * e[0] + p[1] * e[1];
            let v = p[0] * n[0] + p[1] * n[1];
            umin = umin.min(u);
            umax = umax.max(u);
            vmin = vmin.min(v);
            vmax = vmax.max(v);
        }
        let area = (umax - umin) * (vmax - vmin);
        if best.as_ref().is_some_and(|(a, _)| *a <= area) {
            continue;
        }
        let cu = (umin + umax) / 2.0;
        let cv = (vmin + vmax) / 2.0;
        let rect = RotatedRect {
            center: [cu * e[0] + cv * n[0], cu * e[1] + cv * n[1]],
            width: umax - umin,
            height: vmax - vmin,
            angle: e[1].atan2(e[0]),
        };
        best = Some((area, rect));
    }
    best.map(|(_, r)| r)
}

/// Reduce an angle to the canonical quarter-turn range [-π/4, π/4).
pub fn canonical_angle(angle: f64) -> f64 {
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};
    (angle + FRAC_PI_4).rem_euclid(FRAC_PI_2) - FRAC_PI_4
}

/// Rotate `v` by `angle` radians in image coordinates.
#[inline]
pub fn rotate(v: Point, angle: f64) -> Point {
    let (s, c) = angle.sin_cos();
    [c * v[0] - s * v[1], s * v[0] + c * v[1]]
}

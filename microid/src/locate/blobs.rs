use std::collections::VecDeque;

use super::geometry::Point;
use super::unionfind::label_mask;
use crate::image::ImageU8;

/// A filled outer region of an edge map.
#[derive(Debug, Clone)]
pub struct Blob {
    /// Pixel count, holes included.
    pub area: usize,
    /// Pixel-corner coordinates of every boundary pixel; enough for a hull.
    pub outline: Vec<Point>,
}

/// Solid mask of every closed outline: pixels the background cannot reach
/// from the image border are set to 255, then the mask is eroded `shrink`
/// times to undo an earlier dilation.
pub fn fill_outlines(edges: &ImageU8, shrink: u32) -> ImageU8 {
    if edges.width == 0 || edges.height == 0 {
        return edges.clone();
    }
    let outside = flood_background(edges);
    let mut filled = ImageU8::new(edges.width, edges.height);
    for (px, &out) in filled.buf.iter_mut().zip(&outside) {
        if !out {
            *px = 255;
        }
    }
    super::morph::erode(&filled, shrink)
}

/// Split a filled mask into 4-connected blobs. Fed with `fill_outlines`,
/// these are the outer regions of the edge map, nested ones merged into
/// their parent.
pub fn label_blobs(filled: &ImageU8) -> Vec<Blob> {
    let w = filled.width as usize;
    let h = filled.height as usize;
    if w == 0 || h == 0 {
        return Vec::new();
    }
    let mask: Vec<bool> = filled.buf.iter().map(|&v| v != 0).collect();

    let (labels, count) = label_mask(&mask, w);
    let mut blobs = vec![
        Blob {
            area: 0,
            outline: Vec::new(),
        };
        count
    ];

    for y in 0..h {
        for x in 0..w {
            let Some(label) = labels[y * w + x] else {
                continue;
            };
            let blob = &mut blobs[label as usize];
            blob.area += 1;

            let inside = |nx: i64, ny: i64| {
                nx >= 0
                    && ny >= 0
                    && (nx as usize) < w
                    && (ny as usize) < h
                    && labels[ny as usize * w + nx as usize] == Some(label)
            };
            let (xi, yi) = (x as i64, y as i64);
            let on_boundary = !inside(xi - 1, yi)
                || !inside(xi + 1, yi)
                || !inside(xi, yi - 1)
                || !inside(xi, yi + 1);
            if on_boundary {
                let (fx, fy) = (x as f64, y as f64);
                blob.outline.extend_from_slice(&[
                    [fx, fy],
                    [fx + 1.0, fy],
                    [fx + 1.0, fy + 1.0],
                    [fx, fy + 1.0],
                ]);
            }
        }
    }
    blobs
}

/// Non-edge pixels 4-connected to the image border.
fn flood_background(edges: &ImageU8) -> Vec<bool> {
    let w = edges.width as usize;
    let h = edges.height as usize;
    let is_edge = |i: usize| edges.get((i % w) as u32, (i / w) as u32) != 0;

    let mut outside = vec![false; w * h];
    let mut queue = VecDeque::new();
    let seed = |i: usize, outside: &mut Vec<bool>, queue: &mut VecDeque<usize>| {
        if !outside[i] && !is_edge(i) {
            outside[i] = true;
            queue.push_back(i);
        }
    };
    for x in 0..w {
        seed(x, &mut outside, &mut queue);
        seed((h - 1) * w + x, &mut outside, &mut queue);
    }
    for y in 0..h {
        seed(y * w, &mut outside, &mut queue);
        seed(y * w + w - 1, &mut outside, &mut queue);
    }

    while let Some(i) = queue.pop_front() {
        let x = i % w;
        let y = i / w;
        if x > 0 {
            seed(i - 1, &mut outside, &mut queue);
        }
        if x + 1 < w {
            seed(i + 1, &mut outside, &mut queue);
        }
        if y > 0 {
            seed(i - w, &mut outside, &mut queue);
        }
        if y + 1 < h {
            seed(i + w, &mut outside, &mut queue);
        }
    }
    outside
}

#[cfg(test)]
mod tests {
    use super::*;

    fn external_blobs(edges: &ImageU8, shrink: u32) -> Vec<Blob> {
        label_blobs(&fill_outlines(edges, shrink))
    }

    fn draw_ring(img: &mut ImageU8, x0: u32, y0: u32, x1: u32, y1: u32) {
        for x in x0..=x1 {
            img.set(x, y0, 255);
            img.set(x, y1, 255);
        }
        for y in y0..=y1 {
            img.set(x0, y, 255);
            img.set(x1, y, 255);
        }
    }

    #[test]
    fn closed_ring_is_filled() {
        let mut img = ImageU8::new(30, 30);
        draw_ring(&mut img, 5, 5, 14, 14);
        let blobs = external_blobs(&img, 0);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].area, 100);
        let xs: Vec<f64> = blobs[0].outline.iter().map(|p| p[0]).collect();
        assert_eq!(xs.iter().cloned().fold(f64::INFINITY, f64::min), 5.0);
        assert_eq!(xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max), 15.0);
    }

    #[test]
    fn filled_mask_covers_ring_and_interior() {
        let mut img = ImageU8::new(30, 30);
        draw_ring(&mut img, 5, 5, 14, 14);
        let filled = fill_outlines(&img, 0);
        assert_eq!(filled.buf.iter().filter(|&&v| v == 255).count(), 100);
        assert_eq!(filled.get(9, 9), 255);
        assert_eq!(filled.get(20, 20), 0);
        assert_eq!(label_blobs(&filled).len(), 1);
    }

    #[test]
    fn nested_ring_merges_into_parent() {
        let mut img = ImageU8::new(40, 40);
        draw_ring(&mut img, 2, 2, 30, 30);
        draw_ring(&mut img, 10, 10, 15, 15);
        let blobs = external_blobs(&img, 0);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].area, 29 * 29);
    }

    #[test]
    fn open_contour_is_not_filled() {
        let mut img = ImageU8::new(30, 30);
        draw_ring(&mut img, 5, 5, 14, 14);
        img.set(9, 5, 0); // gap in the top side
        let blobs = external_blobs(&img, 0);
        let total: usize = blobs.iter().map(|b| b.area).sum();
        assert_eq!(total, 35);
    }

    #[test]
    fn shrink_removes_thin_lines() {
        let mut img = ImageU8::new(30, 30);
        for x in 2..28 {
            img.set(x, 10, 255);
        }
        assert!(external_blobs(&img, 1).is_empty());
        assert_eq!(external_blobs(&img, 0).len(), 1);
    }

    #[test]
    fn empty_map_has_no_blobs() {
        assert!(external_blobs(&ImageU8::new(10, 10), 2).is_empty());
    }
}

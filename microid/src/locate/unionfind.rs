/// Disjoint sets over pixel indices, union by size with path halving.
pub struct UnionFind {
    parent: Vec<u32>,
    size: Vec<u32>,
}

impl UnionFind {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n as u32).collect(),
            size: vec![1; n],
        }
    }

    pub fn find(&mut self, mut id: u32) -> u32 {
        while self.parent[id as usize] != id {
            let grandparent = self.parent[self.parent[id as usize] as usize];
            self.parent[id as usize] = grandparent;
            id = grandparent;
        }
        id
    }

    /// Merge the sets holding `a` and `b`; returns the surviving root.
    pub fn union(&mut self, a: u32, b: u32) -> u32 {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return ra;
        }
        let (big, small) = if self.size[ra as usize] >= self.size[rb as usize] {
            (ra, rb)
        } else {
            (rb, ra)
        };
        self.parent[small as usize] = big;
        self.size[big as usize] += self.size[small as usize];
        big
    }
}

/// Label 4-connected runs of `true` in a row-major mask.
///
/// Returns one label per pixel (`None` for background) and the label count.
/// Labels are dense, numbered in scan order of each component's first pixel.
pub fn label_mask(mask: &[bool], width: usize) -> (Vec<Option<u32>>, usize) {
    let mut uf = UnionFind::new(mask.len());
    for (i, &fg) in mask.iter().enumerate() {
        if !fg {
            continue;
        }
        let x = i % width;
        if x > 0 && mask[i - 1] {
            uf.union(i as u32, (i - 1) as u32);
        }
        if i >= width && mask[i - width] {
            uf.union(i as u32, (i - width) as u32);
        }
    }

    let mut dense = vec![u32::MAX; mask.len()];
    let mut labels = vec![None; mask.len()];
    let mut count = 0u32;
    for (i, &fg) in mask.iter().enumerate() {
        if !fg {
            continue;
        }
        let root = uf.find(i as u32) as usize;
        if dense[root] == u32::MAX {
            dense[root] = count;
            count += 1;
        }
        labels[i] = Some(dense[root]);
    }
    (labels, count as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_merges_sets() {
        let mut uf = UnionFind::new(6);
        assert_eq!(uf.find(4), 4);
        uf.union(0, 1);
        uf.union(1, 2);
        assert_eq!(uf.find(0), uf.find(2));
        assert_ne!(uf.find(0), uf.find(3));
    }

    #[test]
    fn larger_set_keeps_root() {
        let mut uf = UnionFind::new(5);
        uf.union(0, 1);
        uf.union(0, 2);
        let big = uf.find(0);
        assert_eq!(uf.union(4, 0), big);
        assert_eq!(uf.union(0, 4), big);
    }

    #[test]
    fn label_two_blobs() {
        #[rustfmt::skip]
        let mask = [
            true,  true,  false, false,
            false, true,  false, true,
            false, false, false, true,
        ];
        let (labels, count) = label_mask(&mask, 4);
        assert_eq!(count, 2);
        assert_eq!(labels[0], Some(0));
        assert_eq!(labels[5], Some(0));
        assert_eq!(labels[7], Some(1));
        assert_eq!(labels[11], Some(1));
        assert_eq!(labels[2], None);
    }

    #[test]
    fn diagonal_pixels_are_separate() {
        #[rustfmt::skip]
        let mask = [
            true,  false,
            false, true,
        ];
        let (_, count) = label_mask(&mask, 2);
        assert_eq!(count, 2);
    }

    #[test]
    fn u_shape_joins_late() {
        // the two arms only meet on the bottom row
        #[rustfmt::skip]
        let mask = [
            true, false, true,
            true, false, true,
            true, true,  true,
        ];
        let (labels, count) = label_mask(&mask, 3);
        assert_eq!(count, 1);
        assert_eq!(labels[0], labels[2]);
    }
}

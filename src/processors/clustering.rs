//! Pairwise and cluster aggregation.
//!
//! Blobs that look like neighbouring glyphs of the same line are first paired
//! by a cheap shape and distance test. Pairs are then replayed in a fixed order
//! through a union-find structure; each replay merges the two clusters the
//! blobs belong to when the stricter cluster test passes. Merging is
//! transitive, so a chain of pairs ends up in one cluster.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::components::Blob;
use super::geometry::PixelBox;
use crate::core::config::DetectorParameters;

/// Similarity measures of an accepted blob pair. Indices refer to the blob
/// slice passed to [`find_pairs`]; `a < b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pair {
    pub a: usize,
    pub b: usize,
    pub height_ratio: f32,
    pub diagonal_ratio: f32,
    pub h_dist_ratio: f32,
    pub v_dist_ratio: f32,
    pub shared: f32,
    /// Distance between the two blob centers.
    pub distance: f32,
}

/// Thresholds of the quick pair test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairFilter {
    pub h_ratio: f32,
    pub d_ratio: f32,
    pub h_dist_ratio: f32,
    pub v_dist_ratio: f32,
    pub h_shared: f32,
}

impl From<&DetectorParameters> for PairFilter {
    fn from(p: &DetectorParameters) -> Self {
        Self {
            h_ratio: p.pair_h_ratio,
            d_ratio: p.pair_d_ratio,
            h_dist_ratio: p.pair_h_dist_ratio,
            v_dist_ratio: p.pair_v_dist_ratio,
            h_shared: p.pair_h_shared,
        }
    }
}

/// `(max - min) / min`, infinite when `min` is zero.
fn spread(x: f32, y: f32) -> f32 {
    let (lo, hi) = if x < y { (x, y) } else { (y, x) };
    if lo <= 0.0 { f32::INFINITY } else { (hi - lo) / lo }
}

impl PairFilter {
    /// Measures two blobs and returns the pair if every test passes.
    pub fn evaluate(&self, blobs: &[Blob], i: usize, j: usize) -> Option<Pair> {
        let (a, b) = (i.min(j), i.max(j));
        let (ba, bb) = (&blobs[a].bbox, &blobs[b].bbox);
        let (ha, hb) = (ba.height as f32, bb.height as f32);
        let h_max = ha.max(hb);
        let h_min = ha.min(hb);
        if h_min <= 0.0 {
            return None;
        }

        let height_ratio = spread(ha, hb);
        let diagonal_ratio = spread(ba.diagonal(), bb.diagonal());
        let (ca, cb) = (ba.center(), bb.center());
        let h_dist_ratio = (ca.x - cb.x).abs() / h_max;
        let v_dist_ratio = (ca.y - cb.y).abs() / h_max;
        let shared = ba.vertical_overlap(bb) as f32 / h_min;

        let accepted = height_ratio <= self.h_ratio
            && diagonal_ratio <= self.d_ratio
            && h_dist_ratio < self.h_dist_ratio
            && v_dist_ratio < self.v_dist_ratio
            && shared >= self.h_shared;

        accepted.then(|| Pair {
            a,
            b,
            height_ratio,
            diagonal_ratio,
            h_dist_ratio,
            v_dist_ratio,
            shared,
            distance: ca.distance(&cb),
        })
    }
}

/// Finds all accepted pairs, sorted by (lower index, distance, upper index).
///
/// Candidates come from a sweep over blobs ordered by center x: a blob is only
/// compared with blobs whose center lies within `h_dist_ratio` times the
/// tallest blob height to its right, which is a superset of the pairs the
/// horizontal distance test can accept.
pub fn find_pairs(blobs: &[Blob], filter: &PairFilter) -> Vec<Pair> {
    let max_height = blobs.iter().map(|b| b.bbox.height).max().unwrap_or(0) as f32;
    let reach = filter.h_dist_ratio * max_height;

    let mut order: Vec<usize> = (0..blobs.len()).collect();
    order.sort_by(|&i, &j| {
        blobs[i]
            .bbox
            .center()
            .x
            .total_cmp(&blobs[j].bbox.center().x)
            .then(i.cmp(&j))
    });

    let mut pairs = Vec::new();
    let mut candidates = 0usize;
    for (pos, &i) in order.iter().enumerate() {
        let cx = blobs[i].bbox.center().x;
        for &j in &order[pos + 1..] {
            if blobs[j].bbox.center().x - cx >= reach {
                break;
            }
            candidates += 1;
            if let Some(pair) = filter.evaluate(blobs, i, j) {
                pairs.push(pair);
            }
        }
    }

    pairs.sort_by(|p, q| {
        p.a.cmp(&q.a)
            .then(p.distance.total_cmp(&q.distance))
            .then(p.b.cmp(&q.b))
    });
    debug!(candidates, pairs = pairs.len(), "pair filter");
    pairs
}

/// Thresholds of the cluster merge test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterMerger {
    pub width_spacing: u32,
    pub shared_edge: f32,
    pub h_ratio: f32,
    pub min_height: u32,
}

impl From<&DetectorParameters> for ClusterMerger {
    fn from(p: &DetectorParameters) -> Self {
        Self {
            width_spacing: p.cluster_width_spacing.max(0) as u32,
            shared_edge: p.cluster_shared_edge,
            h_ratio: p.cluster_h_ratio,
            min_height: p.cluster_min_height.max(0) as u32,
        }
    }
}

/// A group of blobs believed to form one text line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// Indices of member blobs, ascending.
    pub members: Vec<usize>,
    /// Union of the member boxes.
    pub bbox: PixelBox,
    pub edge_max: u8,
    pub edge_sum: u64,
    pub area: u64,
}

impl Cluster {
    fn singleton(index: usize, blob: &Blob) -> Self {
        Self {
            members: vec![index],
            bbox: blob.bbox,
            edge_max: blob.edge_max,
            edge_sum: blob.edge_sum,
            area: u64::from(blob.area),
        }
    }

    fn absorb(&mut self, other: Cluster) {
        self.members.extend(other.members);
        self.members.sort_unstable();
        self.bbox = self.bbox.union(&other.bbox);
        self.edge_max = self.edge_max.max(other.edge_max);
        self.edge_sum += other.edge_sum;
        self.area += other.area;
    }

    pub fn blob_count(&self) -> usize {
        self.members.len()
    }
}

impl ClusterMerger {
    /// Returns true if the clusters containing the two blobs of a pair may merge.
    pub fn accepts(&self, blob_a: &PixelBox, blob_b: &PixelBox, ca: &PixelBox, cb: &PixelBox) -> bool {
        if blob_a.horizontal_gap(blob_b) > self.width_spacing {
            return false;
        }
        let h_min = ca.height.min(cb.height);
        if h_min == 0 {
            return false;
        }
        let shared = ca.vertical_overlap(cb) as f32 / h_min as f32;
        if shared <= self.shared_edge {
            return false;
        }
        if spread(ca.height as f32, cb.height as f32) > self.h_ratio {
            return false;
        }
        ca.union(cb).height >= self.min_height
    }

    /// Replays `pairs` in order, merging clusters through union-find.
    ///
    /// Every blob starts as its own cluster. The returned clusters are the
    /// multi-member ones plus the untouched singletons, ordered by their lowest
    /// member index.
    pub fn merge(&self, blobs: &[Blob], pairs: &[Pair]) -> Vec<Cluster> {
        let mut sets = DisjointSet::new(blobs.len());
        let mut clusters: Vec<Option<Cluster>> = blobs
            .iter()
            .enumerate()
            .map(|(i, b)| Some(Cluster::singleton(i, b)))
            .collect();

        let mut merges = 0usize;
        for pair in pairs {
            let (ra, rb) = (sets.find(pair.a), sets.find(pair.b));
            if ra == rb {
                continue;
            }
            let (Some(ca), Some(cb)) = (&clusters[ra], &clusters[rb]) else {
                continue;
            };
            if !self.accepts(&blobs[pair.a].bbox, &blobs[pair.b].bbox, &ca.bbox, &cb.bbox) {
                continue;
            }
            let root = sets.union(ra, rb);
            let other = if root == ra { rb } else { ra };
            if let Some(absorbed) = clusters[other].take() {
                if let Some(target) = clusters[root].as_mut() {
                    target.absorb(absorbed);
                    merges += 1;
                }
            }
        }

        let mut out: Vec<Cluster> = clusters.into_iter().flatten().collect();
        out.sort_by(|p, q| match (p.members.first(), q.members.first()) {
            (Some(x), Some(y)) => x.cmp(y),
            _ => Ordering::Equal,
        });
        debug!(merges, clusters = out.len(), "cluster merge");
        out
    }
}

/// Union-find with path halving; the smaller index becomes the root.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) -> usize {
        let (ra, rb) = (self.find(a), self.find(b));
        let (root, child) = if ra <= rb { (ra, rb) } else { (rb, ra) };
        self.parent[child] = root;
        root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glyph(x: u32, y: u32, w: u32, h: u32) -> Blob {
        Blob {
            bbox: PixelBox::new(x, y, w, h),
            area: w * h / 2,
            tile: 0,
            edge_max: 255,
            edge_sum: u64::from(w * h / 2) * 200,
        }
    }

    /// Rings of 8x14 with a one pixel gap, as produced by 6x12 glyphs three pixels apart.
    fn line(x0: u32, y0: u32, count: u32) -> Vec<Blob> {
        (0..count).map(|i| glyph(x0 + i * 9, y0, 8, 14)).collect()
    }

    fn defaults() -> (PairFilter, ClusterMerger) {
        let p = DetectorParameters::default();
        (PairFilter::from(&p), ClusterMerger::from(&p))
    }

    #[test]
    fn test_pair_metrics() {
        let (filter, _) = defaults();
        let blobs = vec![glyph(0, 0, 8, 14), glyph(9, 2, 8, 12)];
        let pair = filter.evaluate(&blobs, 1, 0).unwrap();
        assert_eq!((pair.a, pair.b), (0, 1));
        assert!((pair.height_ratio - 2.0 / 12.0).abs() < 1e-6);
        assert!((pair.h_dist_ratio - 9.0 / 14.0).abs() < 1e-6);
        assert!((pair.v_dist_ratio - 1.0 / 14.0).abs() < 1e-6);
        assert!((pair.shared - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_pair_rejects_vertical_neighbours() {
        let (filter, _) = defaults();
        let blobs = vec![glyph(0, 0, 8, 14), glyph(0, 30, 8, 14)];
        assert!(filter.evaluate(&blobs, 0, 1).is_none());
    }

    #[test]
    fn test_pair_rejects_height_mismatch() {
        let (filter, _) = defaults();
        let blobs = vec![glyph(0, 0, 8, 14), glyph(9, 0, 8, 40)];
        assert!(filter.evaluate(&blobs, 0, 1).is_none());
    }

    #[test]
    fn test_find_pairs_is_bounded_and_sorted() {
        let (filter, _) = defaults();
        let blobs = line(10, 10, 6);
        let pairs = find_pairs(&blobs, &filter);
        // Centers are 9 apart; h_dist_ratio < 2 with height 14 allows up to 3 steps.
        assert!(pairs.iter().all(|p| p.b - p.a <= 3));
        assert_eq!((pairs[0].a, pairs[0].b), (0, 1));
        assert!(pairs.windows(2).all(|w| w[0].a <= w[1].a));
    }

    #[test]
    fn test_line_merges_into_one_cluster() {
        let (filter, merger) = defaults();
        let blobs = line(10, 10, 8);
        let pairs = find_pairs(&blobs, &filter);
        let clusters = merger.merge(&blobs, &pairs);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members, (0..8).collect::<Vec<_>>());
        assert_eq!(clusters[0].bbox, PixelBox::new(10, 10, 7 * 9 + 8, 14));
    }

    #[test]
    fn test_two_lines_stay_apart() {
        let (filter, merger) = defaults();
        let mut blobs = line(10, 10, 6);
        blobs.extend(line(10, 40, 6));
        let pairs = find_pairs(&blobs, &filter);
        let clusters = merger.merge(&blobs, &pairs);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].members, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(clusters[1].members, vec![6, 7, 8, 9, 10, 11]);
    }

    #[test]
    fn test_wide_gap_splits_line() {
        let (filter, merger) = defaults();
        let mut blobs = line(10, 10, 3);
        // 4 pixel gap after the third ring
        blobs.extend(line(10 + 2 * 9 + 8 + 4, 10, 3));
        let pairs = find_pairs(&blobs, &filter);
        let clusters = merger.merge(&blobs, &pairs);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn test_merge_is_deterministic() {
        let (filter, merger) = defaults();
        let mut blobs = line(0, 0, 5);
        blobs.extend(line(0, 50, 5));
        let pairs = find_pairs(&blobs, &filter);
        assert_eq!(merger.merge(&blobs, &pairs), merger.merge(&blobs, &pairs));
    }

    #[test]
    fn test_min_height_blocks_merge() {
        let (filter, mut merger) = defaults();
        merger.min_height = 20;
        let blobs = line(0, 0, 4);
        let pairs = find_pairs(&blobs, &filter);
        let clusters = merger.merge(&blobs, &pairs);
        assert_eq!(clusters.len(), 4);
    }

    #[test]
    fn test_disjoint_set_prefers_low_root() {
        let mut sets = DisjointSet::new(5);
        assert_eq!(sets.union(4, 2), 2);
        assert_eq!(sets.union(2, 0), 0);
        assert_eq!(sets.find(4), 0);
    }
}

//! This module contains the balanced 2D k-d tree and its bounded
//! nearest-neighbor search.

use num_traits::{AsPrimitive, Float};

use super::heap_utils::KBestNeighbors;
use crate::common_types::{LabeledPoint, Point2, manhattan_distance};

/// An immutable k-d tree over labeled 2D points.
///
/// Built once by [`KdTree::build`] and read-only afterwards; there is no
/// insertion or deletion API. The split axis alternates with depth (x at even
/// depths, y at odd) and is derived during traversal rather than stored per
/// node.
#[derive(Debug)]
pub struct KdTree<F, L> {
    root: Option<Box<TreeNode<F, L>>>,
    len: usize,
}

#[derive(Debug)]
struct TreeNode<F, L> {
    key: LabeledPoint<F, L>,
    /// The left child of this node.
    left: Option<Box<TreeNode<F, L>>>,
    /// The right child of this node.
    right: Option<Box<TreeNode<F, L>>>,
}

impl<F, L> KdTree<F, L>
where
    F: Float + AsPrimitive<f64>,
    L: Clone,
{
    /// Builds a balanced tree by recursive median splits.
    ///
    /// At each level the points are stable-sorted along the level's axis and
    /// the point at `len / 2` becomes the node key, so each subtree's size
    /// differs from an even split by at most one. An empty input yields a
    /// rootless tree whose queries return no neighbors.
    pub fn build(mut points: Vec<LabeledPoint<F, L>>) -> Self {
        let len = points.len();
        let root = Self::build_recursive(&mut points, 0);
        KdTree { root, len }
    }

    fn build_recursive(
        points_slice: &mut [LabeledPoint<F, L>],
        depth: usize,
    ) -> Option<Box<TreeNode<F, L>>> {
        if points_slice.is_empty() {
            return None;
        }

        let axis = depth % 2;
        points_slice.sort_by(|a, b| {
            a.point
                .coordinate(axis)
                .partial_cmp(&b.point.coordinate(axis))
                .unwrap_or(std::cmp::Ordering::Equal) // Fallback for NaN
        });

        let median_idx = points_slice.len() / 2;
        let key = points_slice[median_idx].clone();

        let left = Self::build_recursive(&mut points_slice[..median_idx], depth + 1);
        let right = Self::build_recursive(&mut points_slice[median_idx + 1..], depth + 1);

        Some(Box::new(TreeNode { key, left, right }))
    }

    /// Number of points stored in the tree.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns up to `min(k, len)` nearest `(distance, point)` pairs for
    /// `query` under the Manhattan metric, in ascending distance order.
    ///
    /// `k = 0` and the empty tree both yield an empty vector; `k` larger
    /// than the point count yields every point.
    pub fn nearest_neighbors(&self, query: Point2<F>, k: usize) -> Vec<(f64, LabeledPoint<F, L>)> {
        if k == 0 || self.root.is_none() {
            return Vec::new();
        }

        let mut best = KBestNeighbors::new(k);
        Self::search_recursive(&self.root, query, 0, &mut best);
        best.into_sorted_entries()
    }

    fn search_recursive(
        current: &Option<Box<TreeNode<F, L>>>,
        query: Point2<F>,
        depth: usize,
        best: &mut KBestNeighbors<LabeledPoint<F, L>>,
    ) {
        let node = match current {
            Some(node) => node,
            None => return, // Base case: reached a null child
        };

        let axis = depth % 2;
        // Signed distance from the query to this node's splitting plane.
        let signed_gap = node.key.point.coordinate(axis) - query.coordinate(axis);

        let dist = manhattan_distance(node.key.point, query);
        best.add(dist, node.key.clone());

        // The query sits on or left of the plane when the gap is
        // non-negative; that side is searched unconditionally.
        let (near, far) = if signed_gap >= F::zero() {
            (&node.left, &node.right)
        } else {
            (&node.right, &node.left)
        };

        Self::search_recursive(near, query, depth + 1, best);

        // |gap| lower-bounds the Manhattan distance to anything beyond the
        // plane, so the far side only matters while the heap is short of k
        // candidates or the plane is nearer than the worst one kept.
        let gap = signed_gap.abs().as_();
        if best
            .current_farthest_distance()
            .map_or(true, |worst| gap < worst)
        {
            Self::search_recursive(far, query, depth + 1, best);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{KdTree, TreeNode};
    use crate::common_types::{LabeledPoint, Point2, manhattan_distance};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn make_lp<L>(x: f64, y: f64, label: L) -> LabeledPoint<f64, L> {
        LabeledPoint::new(Point2::new(x, y), label)
    }

    fn check_node<L: PartialEq + std::fmt::Debug>(
        node_opt: &Option<Box<TreeNode<f64, L>>>,
        expected_point: Point2<f64>,
        expected_label: L,
    ) {
        let node = node_opt.as_ref().expect("node should exist but was None");
        assert_eq!(node.key.point, expected_point, "node key point mismatch");
        assert_eq!(node.key.label, expected_label, "node key label mismatch");
    }

    /// Counts nodes while asserting the partition invariant at every depth.
    fn check_invariants(node_opt: &Option<Box<TreeNode<f64, i32>>>, depth: usize) -> usize {
        let node = match node_opt {
            Some(node) => node,
            None => return 0,
        };
        let axis = depth % 2;
        let pivot = node.key.point.coordinate(axis);

        let mut descendants = Vec::new();
        collect_points(&node.left, &mut descendants);
        for p in &descendants {
            assert!(
                p.coordinate(axis) <= pivot,
                "left descendant {p:?} exceeds pivot {pivot} on axis {axis}"
            );
        }
        descendants.clear();
        collect_points(&node.right, &mut descendants);
        for p in &descendants {
            assert!(
                p.coordinate(axis) >= pivot,
                "right descendant {p:?} below pivot {pivot} on axis {axis}"
            );
        }

        1 + check_invariants(&node.left, depth + 1) + check_invariants(&node.right, depth + 1)
    }

    fn collect_points(node_opt: &Option<Box<TreeNode<f64, i32>>>, out: &mut Vec<Point2<f64>>) {
        if let Some(node) = node_opt {
            out.push(node.key.point);
            collect_points(&node.left, out);
            collect_points(&node.right, out);
        }
    }

    fn brute_force_distances(
        points: &[LabeledPoint<f64, i32>],
        query: Point2<f64>,
        k: usize,
    ) -> Vec<f64> {
        let mut distances: Vec<f64> = points
            .iter()
            .map(|p| manhattan_distance(query, p.point))
            .collect();
        distances.sort_by(|a, b| a.partial_cmp(b).unwrap());
        distances.truncate(k);
        distances
    }

    #[test]
    fn test_empty_build_yields_rootless_tree() {
        let tree: KdTree<f64, i32> = KdTree::build(vec![]);
        assert!(tree.is_empty());
        assert_eq!(tree.len(), 0);
        assert!(tree.nearest_neighbors(Point2::new(1.0, 2.0), 3).is_empty());
    }

    #[test]
    fn test_single_point_tree() {
        let tree = KdTree::build(vec![make_lp(5.0, 5.0, "X")]);
        assert_eq!(tree.len(), 1);
        check_node(&tree.root, Point2::new(5.0, 5.0), "X");
        let root = tree.root.as_ref().unwrap();
        assert!(root.left.is_none());
        assert!(root.right.is_none());

        let neighbors = tree.nearest_neighbors(Point2::new(100.0, 100.0), 1);
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].0, 190.0);
        assert_eq!(neighbors[0].1.label, "X");
    }

    #[test]
    fn test_median_split_structure() {
        let points = vec![
            make_lp(2.0, 3.0, 1),
            make_lp(5.0, 4.0, 2),
            make_lp(9.0, 6.0, 3),
            make_lp(4.0, 7.0, 4),
            make_lp(8.0, 1.0, 5),
            make_lp(7.0, 2.0, 6),
        ];
        let tree = KdTree::build(points);
        assert_eq!(tree.len(), 6);

        // Depth 0 splits on x: sorted order puts (7,2) at the median.
        check_node(&tree.root, Point2::new(7.0, 2.0), 6);
        let root = tree.root.as_ref().unwrap();

        // Depth 1 splits on y.
        check_node(&root.left, Point2::new(5.0, 4.0), 2);
        check_node(&root.right, Point2::new(9.0, 6.0), 3);

        let left = root.left.as_ref().unwrap();
        check_node(&left.left, Point2::new(2.0, 3.0), 1);
        check_node(&left.right, Point2::new(4.0, 7.0), 4);

        let right = root.right.as_ref().unwrap();
        check_node(&right.left, Point2::new(8.0, 1.0), 5);
        assert!(right.right.is_none());
    }

    #[test]
    fn test_tree_shape_invariants_hold() {
        for n in [1usize, 2, 3, 7, 16, 50] {
            let points: Vec<_> = (0..n)
                .map(|i| make_lp((i * 7 % n) as f64, (i * 13 % n) as f64, i as i32))
                .collect();
            let tree = KdTree::build(points);
            assert_eq!(tree.len(), n);
            assert_eq!(check_invariants(&tree.root, 0), n, "node count for n={n}");
        }
    }

    #[test]
    fn test_nearest_two_of_four() {
        let points = vec![
            make_lp(0.0, 0.0, "A"),
            make_lp(10.0, 10.0, "B"),
            make_lp(1.0, 1.0, "A"),
            make_lp(9.0, 9.0, "B"),
        ];
        let tree = KdTree::build(points);

        let neighbors = tree.nearest_neighbors(Point2::new(0.0, 0.0), 2);
        assert_eq!(neighbors.len(), 2);
        assert_eq!(neighbors[0].0, 0.0);
        assert_eq!(neighbors[1].0, 2.0);
        assert!(neighbors.iter().all(|(_, p)| p.label == "A"));
    }

    #[test]
    fn test_degenerate_k() {
        let points = vec![
            make_lp(0.0, 0.0, 1),
            make_lp(3.0, 1.0, 2),
            make_lp(-2.0, 4.0, 3),
            make_lp(8.0, 8.0, 4),
        ];
        let tree = KdTree::build(points.clone());

        assert!(tree.nearest_neighbors(Point2::new(1.0, 1.0), 0).is_empty());

        // k beyond the point count returns everything, not an error.
        let all = tree.nearest_neighbors(Point2::new(1.0, 1.0), 10);
        assert_eq!(all.len(), points.len());
        for p in &points {
            assert!(all.iter().any(|(_, q)| q == p));
        }
    }

    // The far-subtree bound must be |gap|, not gap squared: with the pivot
    // at distance 3 and an axis gap of 2, the squared form (4 >= 3) would
    // prune the subtree holding the true nearest neighbor at distance 2.5.
    #[test]
    fn test_far_subtree_bound_is_absolute_gap() {
        let points = vec![
            make_lp(-5.0, 5.0, 1),
            make_lp(2.0, 1.0, 2),
            make_lp(2.25, 0.25, 3),
        ];
        let tree = KdTree::build(points);

        let neighbors = tree.nearest_neighbors(Point2::new(0.0, 0.0), 1);
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].0, 2.5);
        assert_eq!(neighbors[0].1.label, 3);
    }

    #[test]
    fn test_repeated_queries_are_idempotent() {
        let points: Vec<_> = (0..30)
            .map(|i| make_lp(i as f64, (30 - i) as f64, i))
            .collect();
        let tree = KdTree::build(points);

        let query = Point2::new(11.5, 17.0);
        let first = tree.nearest_neighbors(query, 5);
        let second = tree.nearest_neighbors(query, 5);
        assert_eq!(first, second);
    }

    #[test]
    fn test_matches_brute_force_on_random_points() {
        let mut rng = StdRng::seed_from_u64(42);
        let points: Vec<_> = (0..200)
            .map(|i| {
                make_lp(
                    rng.gen_range(0.0..100.0),
                    rng.gen_range(0.0..100.0),
                    (i % 4) as i32,
                )
            })
            .collect();
        let tree = KdTree::build(points.clone());

        for _ in 0..25 {
            let query = Point2::new(rng.gen_range(-10.0..110.0), rng.gen_range(-10.0..110.0));
            for k in [1usize, 5, 17] {
                let found: Vec<f64> = tree
                    .nearest_neighbors(query, k)
                    .into_iter()
                    .map(|(d, _)| d)
                    .collect();
                let expected = brute_force_distances(&points, query, k);
                assert_eq!(found, expected, "k={k} query={query:?}");
            }
        }
    }
}

//! # K-d Tree Implementation
//!
//! A static two dimensional k-d tree, as described in [the wikipedia
//! article](https://en.wikipedia.org/wiki/K-d_tree), used for nearest
//! neighbour queries over a fixed set of points.
//!
//! The tree is built once from a slice of points and is read only after that.
//! Each stored point remembers its index in the slice it was built from, so
//! query results can be mapped straight back onto the caller's data.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::{cmp::Ordering, collections::BinaryHeap};

use nalgebra::Vector2;
use ordered_float::NotNan;
use serde::Serialize;

// -----------------------------------------------------------------------------------------------
// STRUCTS
// -----------------------------------------------------------------------------------------------

/// A single result of a nearest neighbour query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbour {
    /// Euclidian distance between the query point and the stored point
    pub dist: f64,

    /// Index of the stored point in the slice the tree was built from
    pub index: usize,
}

/// A static k-d tree over planar points.
#[derive(Clone, Debug)]
pub struct KdTree {
    root: Option<Box<KdNode>>,

    len: usize,
}

/// A node of the tree, splitting space along `axis` at `point`.
#[derive(Clone, Debug)]
struct KdNode {
    point: Vector2<f64>,

    index: usize,

    /// 0 for a split on x, 1 for a split on y
    axis: usize,

    /// Child holding points below the split
    left: Option<Box<KdNode>>,

    /// Child holding points at or above the split
    right: Option<Box<KdNode>>,
}

/// Candidate held in the query heap, ordered by distance then index so that the worst candidate
/// (largest distance, and among equals the largest index) is at the top.
type Candidate = (NotNan<f64>, usize);

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl KdTree {
    /// Build a new tree over the given points.
    ///
    /// An empty slice gives an empty tree, which answers every query with no results.
    pub fn new(points: &[Vector2<f64>]) -> Self {
        let mut entries: Vec<(Vector2<f64>, usize)> = points
            .iter()
            .enumerate()
            .map(|(i, p)| (*p, i))
            .collect();

        Self {
            root: Self::build(&mut entries, 0),
            len: points.len(),
        }
    }

    /// Number of points stored in the tree.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Find up to `k` stored points nearest to `query` that lie within `radius` of it.
    ///
    /// Results are sorted nearest first. The radius is inclusive, so a radius of zero still
    /// returns exact hits. Points at the same distance are ordered by lowest index, which is
    /// also the one kept when only some of a set of equidistant points fit within `k`.
    ///
    /// Fewer than `k` results is a normal outcome, the caller must not assume the result is
    /// full. A `k` of zero, a negative or NaN radius, or a non-finite query return nothing.
    pub fn nearest(&self, query: &Vector2<f64>, k: usize, radius: f64) -> Vec<Neighbour> {
        if k == 0 || radius.is_nan() || radius < 0.0 {
            return Vec::new();
        }
        if !(query[0].is_finite() && query[1].is_finite()) {
            return Vec::new();
        }

        let mut heap: BinaryHeap<Candidate> = BinaryHeap::with_capacity(k + 1);

        if let Some(ref root) = self.root {
            root.search(query, k, radius, &mut heap);
        }

        heap.into_sorted_vec()
            .into_iter()
            .map(|(dist, index)| Neighbour {
                dist: dist.into_inner(),
                index,
            })
            .collect()
    }

    /// Recursively build the subtree over `entries`, splitting at the median of the current axis.
    fn build(entries: &mut [(Vector2<f64>, usize)], depth: usize) -> Option<Box<KdNode>> {
        if entries.is_empty() {
            return None;
        }

        let axis = depth % 2;
        let median = entries.len() / 2;

        entries.select_nth_unstable_by(median, |a, b| {
            a.0[axis]
                .partial_cmp(&b.0[axis])
                .unwrap_or(Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });

        let (lower, upper) = entries.split_at_mut(median);
        let (point, index) = upper[0];

        Some(Box::new(KdNode {
            point,
            index,
            axis,
            left: Self::build(lower, depth + 1),
            right: Self::build(&mut upper[1..], depth + 1),
        }))
    }
}

impl KdNode {
    fn search(
        &self,
        query: &Vector2<f64>,
        k: usize,
        radius: f64,
        heap: &mut BinaryHeap<Candidate>,
    ) {
        // Consider this node's point
        let dist = (self.point - query).norm();
        if dist <= radius {
            if let Ok(dist) = NotNan::new(dist) {
                let candidate = (dist, self.index);

                if heap.len() < k {
                    heap.push(candidate);
                } else if let Some(worst) = heap.peek() {
                    if candidate < *worst {
                        heap.pop();
                        heap.push(candidate);
                    }
                }
            }
        }

        // Descend into the side of the split the query is on first
        let diff = query[self.axis] - self.point[self.axis];
        let (near, far) = if diff < 0.0 {
            (&self.left, &self.right)
        } else {
            (&self.right, &self.left)
        };

        if let Some(ref node) = near {
            node.search(query, k, radius, heap);
        }

        // The far side can only hold a better candidate if the split plane is closer than both the
        // radius and the current worst candidate. Equal distances are still visited so that lower
        // indices on the far side win ties.
        let plane_dist = diff.abs();
        if plane_dist > radius {
            return;
        }
        let worth_visiting = match heap.peek() {
            Some(worst) if heap.len() == k => plane_dist <= worst.0.into_inner(),
            _ => true,
        };

        if worth_visiting {
            if let Some(ref node) = far {
                node.search(query, k, radius, heap);
            }
        }
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

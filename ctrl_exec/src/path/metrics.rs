//! # Path metrics
//!
//! The individual steps used to compute the geometric descriptors of a path.
//!
//! Each step takes the output of the steps it depends on as an argument, so the
//! order in which they must run is enforced by their signatures:
//!
//! ```text
//! distances to goal ─┬─ look ahead curvatures
//! curvatures ────────┘
//! distances to goal ─── headings ─── frame transforms
//! ```
//!
//! [`Path::compute_metrics`](super::Path::compute_metrics) runs the whole
//! pipeline, most users should call that rather than these functions directly.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Matrix3;
use util::maths::norm2;

use super::PathError;
use crate::loc::Pose;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Arc length from each waypoint to the last one, in meters.
#[derive(Debug, Clone, PartialEq)]
pub struct DistancesToGoal(Vec<f64>);

/// Unsigned curvature estimate at each waypoint, in 1/meters.
#[derive(Debug, Clone, PartialEq)]
pub struct Curvatures(Vec<f64>);

/// Accumulated curvature over the look ahead window of each waypoint.
#[derive(Debug, Clone, PartialEq)]
pub struct LookAheadCurvatures {
    /// Sum of the absolute curvatures within the window
    pub curvatures: Vec<f64>,

    /// Path length actually covered by the window, which may exceed the look
    /// ahead distance by up to one step, or fall short of it near the end of
    /// the path.
    pub distances_m: Vec<f64>,
}

/// Local tangent direction at each waypoint, in radians.
#[derive(Debug, Clone, PartialEq)]
pub struct Headings(Vec<f64>);

/// Homogeneous 2D rigid transforms between the world frame and the path frame
/// of each waypoint.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameTransforms {
    /// Transforms a point in the path frame into the world frame
    pub path_to_world: Vec<Matrix3<f64>>,

    /// Transforms a point in the world frame into the path frame, the exact
    /// inverse of `path_to_world`
    pub world_to_path: Vec<Matrix3<f64>>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

macro_rules! impl_descriptor {
    ($name:ident) => {
        impl $name {
            pub fn as_slice(&self) -> &[f64] {
                &self.0
            }

            pub fn into_inner(self) -> Vec<f64> {
                self.0
            }
        }
    };
}

impl_descriptor!(DistancesToGoal);
impl_descriptor!(Curvatures);
impl_descriptor!(Headings);

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Compute the planar length of each step between consecutive poses.
///
/// Fails if there are fewer than two poses or two consecutive poses share the
/// same planar position.
pub fn compute_step_lengths(poses: &[Pose]) -> Result<Vec<f64>, PathError> {
    if poses.len() < 2 {
        return Err(PathError::NotEnoughPoints(poses.len()));
    }

    let steps: Vec<f64> = poses
        .windows(2)
        .map(|w| step_length(&w[0], &w[1]))
        .collect();

    // Reject zero (and NaN) step lengths, they would give a division by zero in the curvature
    match steps.iter().position(|s| !(*s > 0.0)) {
        Some(i) => Err(PathError::CoincidentWaypoints(i + 1)),
        None => Ok(steps),
    }
}

/// Compute the distance to the goal (last pose) of each pose, as a single backward pass.
///
/// The last entry is exactly zero and the values never increase along the path.
pub fn compute_distances_to_goal(poses: &[Pose]) -> DistancesToGoal {
    let mut distances = vec![0f64; poses.len()];

    for i in (0..poses.len().saturating_sub(1)).rev() {
        distances[i] = distances[i + 1] + step_length(&poses[i], &poses[i + 1]);
    }

    DistancesToGoal(distances)
}

/// Compute the curvature at each pose using non-uniform finite differences.
///
/// First derivatives of x and y with respect to arc length are estimated with
/// the three point central formula at interior points and second order one
/// sided formulas at the ends. The same formula applied to the first
/// derivatives gives the second derivatives, and the curvature is the norm of
/// the second derivative. The first and last entries are left at zero.
pub fn compute_curvatures(poses: &[Pose]) -> Result<Curvatures, PathError> {
    let steps = compute_step_lengths(poses)?;
    let n = poses.len();

    let x: Vec<f64> = poses.iter().map(|p| p.position_m[0]).collect();
    let y: Vec<f64> = poses.iter().map(|p| p.position_m[1]).collect();

    let xp = first_derivative(&x, &steps);
    let yp = first_derivative(&y, &steps);
    let xpp = first_derivative(&xp, &steps);
    let ypp = first_derivative(&yp, &steps);

    let mut curvatures = vec![0f64; n];
    for i in 1..n.saturating_sub(1) {
        curvatures[i] = xpp[i].hypot(ypp[i]);
    }

    Ok(Curvatures(curvatures))
}

/// Accumulate the absolute curvature ahead of each pose until the covered path
/// length exceeds `look_ahead_distance_m` or the end of the path is reached.
///
/// The step which crosses the look ahead distance is still included. The last
/// pose has nothing ahead of it and is left at zero.
pub fn compute_look_ahead_curvatures(
    curvatures: &Curvatures,
    distances: &DistancesToGoal,
    look_ahead_distance_m: f64,
) -> LookAheadCurvatures {
    let curvs = curvatures.as_slice();
    let dists = distances.as_slice();
    let n = curvs.len().min(dists.len());

    let mut la_curvatures = vec![0f64; n];
    let mut la_distances_m = vec![0f64; n];

    for i in 0..n.saturating_sub(1) {
        let mut covered_m = 0f64;
        let mut curv_sum = 0f64;
        let mut j = i;

        while covered_m <= look_ahead_distance_m && j + 1 < n {
            curv_sum += curvs[j].abs();
            covered_m += (dists[j] - dists[j + 1]).abs();
            j += 1;
        }

        la_curvatures[i] = curv_sum;
        la_distances_m[i] = covered_m;
    }

    LookAheadCurvatures {
        curvatures: la_curvatures,
        distances_m: la_distances_m,
    }
}

/// Compute the heading of each pose.
///
/// The heading of pose `i` points at the first pose `j` ahead of it whose
/// distance along the path from `i` exceeds `spatial_window_m`, which smooths
/// over closely spaced points. Once no such pose exists the tail of the path
/// reuses the last heading found. If even the first pose has no such pose
/// the whole path takes the direction from its first to its last point.
pub fn compute_headings(
    poses: &[Pose],
    distances: &DistancesToGoal,
    spatial_window_m: f64,
) -> Headings {
    let dists = distances.as_slice();
    let n = poses.len().min(dists.len());
    let mut headings = vec![0f64; n];

    let mut tail_start = None;

    for i in 0..n {
        let mut target = None;
        for j in (i + 1)..n {
            if dists[i] - dists[j] > spatial_window_m {
                target = Some(j);
                break;
            }
        }

        match target {
            Some(j) => headings[i] = heading_between(&poses[i], &poses[j]),
            None => {
                tail_start = Some(i);
                break;
            }
        }
    }

    if let Some(start) = tail_start {
        let fill = if start > 0 {
            headings[start - 1]
        } else if n > 1 {
            heading_between(&poses[0], &poses[n - 1])
        } else {
            0f64
        };

        for heading in headings[start..].iter_mut() {
            *heading = fill;
        }
    }

    Headings(headings)
}

/// Build the path to world transform of each pose from its heading and
/// position, along with its inverse.
///
/// The inverse is built from the transposed rotation rather than by numerical
/// inversion, so `world_to_path[i] * path_to_world[i]` is the identity up to
/// rounding.
pub fn compute_world_to_path_frame_tfs(poses: &[Pose], headings: &Headings) -> FrameTransforms {
    let n = poses.len().min(headings.as_slice().len());
    let mut path_to_world = Vec::with_capacity(n);
    let mut world_to_path = Vec::with_capacity(n);

    for (pose, heading) in poses.iter().zip(headings.as_slice()) {
        let (s, c) = heading.sin_cos();
        let x = pose.position_m[0];
        let y = pose.position_m[1];

        path_to_world.push(Matrix3::new(
            c, -s, x,
            s, c, y,
            0.0, 0.0, 1.0,
        ));
        world_to_path.push(Matrix3::new(
            c, s, -(c * x + s * y),
            -s, c, s * x - c * y,
            0.0, 0.0, 1.0,
        ));
    }

    FrameTransforms {
        path_to_world,
        world_to_path,
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn step_length(from: &Pose, to: &Pose) -> f64 {
    norm2(from.position_m[0], from.position_m[1], to.position_m[0], to.position_m[1])
}

fn heading_between(from: &Pose, to: &Pose) -> f64 {
    (to.position_m[1] - from.position_m[1]).atan2(to.position_m[0] - from.position_m[0])
}

/// Derivative of `values` with respect to arc length, where `steps[i]` is the
/// distance between samples `i` and `i + 1`.
///
/// Requires `values.len() == steps.len() + 1 >= 2` and no zero steps.
fn first_derivative(values: &[f64], steps: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut deriv = vec![0f64; n];

    if n == 2 {
        let d = (values[1] - values[0]) / steps[0];
        deriv[0] = d;
        deriv[1] = d;
        return deriv;
    }

    // Central differences, dpb is the backward step and dpf the forward one
    for i in 1..(n - 1) {
        let dpb = steps[i - 1];
        let dpf = steps[i];
        let denom = dpb * dpf * (dpb + dpf);

        deriv[i] = (dpb.powi(2) * values[i + 1]
            + (dpf.powi(2) - dpb.powi(2)) * values[i]
            - dpf.powi(2) * values[i - 1])
            / denom;
    }

    // One sided differences at the ends
    let (h1, h2) = (steps[0], steps[1]);
    deriv[0] = -(2.0 * h1 + h2) / (h1 * (h1 + h2)) * values[0]
        + (h1 + h2) / (h1 * h2) * values[1]
        - h1 / (h2 * (h1 + h2)) * values[2];

    let (h1, h2) = (steps[n - 2], steps[n - 3]);
    deriv[n - 1] = (2.0 * h1 + h2) / (h1 * (h1 + h2)) * values[n - 1]
        - (h1 + h2) / (h1 * h2) * values[n - 2]
        + h1 / (h2 * (h1 + h2)) * values[n - 3];

    deriv
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    fn planar(points: &[(f64, f64)]) -> Vec<Pose> {
        points
            .iter()
            .map(|(x, y)| Pose::new_planar(*x, *y, 0.0))
            .collect()
    }

    /// Points on a circle of the given radius, at uneven angular spacing
    fn arc(radius: f64, n: usize) -> Vec<Pose> {
        (0..n)
            .map(|i| {
                let t = i as f64 / (n - 1) as f64;
                // Warp the parameter so spacing is non-uniform
                let theta = PI * (t + 0.1 * (2.0 * PI * t).sin() / (2.0 * PI));
                Pose::new_planar(radius * theta.cos(), radius * theta.sin(), 0.0)
            })
            .collect()
    }

    #[test]
    fn test_first_derivative_exact_for_quadratics() {
        // f(s) = s^2 on uneven samples has derivative 2s everywhere, which the
        // three point formulas reproduce exactly
        let s = [0.0, 0.5, 1.25, 1.5, 2.5, 2.75];
        let values: Vec<f64> = s.iter().map(|v| v * v).collect();
        let steps: Vec<f64> = s.windows(2).map(|w| w[1] - w[0]).collect();

        let deriv = first_derivative(&values, &steps);
        for (d, s) in deriv.iter().zip(s.iter()) {
            assert!((d - 2.0 * s).abs() < 1e-9, "got {} expected {}", d, 2.0 * s);
        }
    }

    #[test]
    fn test_step_lengths() {
        assert!(matches!(
            compute_step_lengths(&planar(&[(0.0, 0.0)])),
            Err(PathError::NotEnoughPoints(1))
        ));
        assert!(matches!(
            compute_step_lengths(&planar(&[(0.0, 0.0), (1.0, 0.0), (1.0, 0.0)])),
            Err(PathError::CoincidentWaypoints(2))
        ));
        assert_eq!(
            compute_step_lengths(&planar(&[(0.0, 0.0), (3.0, 4.0)])).unwrap(),
            vec![5.0]
        );
    }

    #[test]
    fn test_distances_to_goal() {
        let poses = planar(&[(0.0, 0.0), (3.0, 4.0), (3.0, 5.0), (4.0, 5.0)]);
        let dists = compute_distances_to_goal(&poses);
        assert_eq!(dists.as_slice(), &[7.0, 2.0, 1.0, 0.0]);

        assert_eq!(compute_distances_to_goal(&planar(&[(1.0, 1.0)])).as_slice(), &[0.0]);
    }

    #[test]
    fn test_curvature_of_line_is_zero() {
        let poses = planar(&[(0.0, 0.0), (0.5, 0.5), (2.0, 2.0), (2.1, 2.1), (3.0, 3.0)]);
        let curvs = compute_curvatures(&poses).unwrap();

        for c in curvs.as_slice() {
            assert!(c.abs() < 1e-9);
        }
    }

    #[test]
    fn test_curvature_of_circle() {
        let radius = 2.0;
        let poses = arc(radius, 201);
        let curvs = compute_curvatures(&poses).unwrap();
        let curvs = curvs.as_slice();

        assert_eq!(curvs[0], 0.0);
        assert_eq!(curvs[200], 0.0);

        // Away from the ends the estimate should match 1/R closely
        for c in curvs[3..198].iter() {
            assert!((c - 1.0 / radius).abs() < 1e-2, "curvature {}", c);
        }
    }

    #[test]
    fn test_curvature_rejects_coincident_points() {
        let poses = planar(&[(0.0, 0.0), (1.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        assert!(matches!(
            compute_curvatures(&poses),
            Err(PathError::CoincidentWaypoints(2))
        ));
    }

    #[test]
    fn test_look_ahead_curvatures() {
        let curvs = Curvatures(vec![0.0, 1.0, 2.0, 3.0, 0.0]);
        let dists = DistancesToGoal(vec![4.0, 3.0, 2.0, 1.0, 0.0]);

        // A window of 1.5 m covers two steps (the second crosses the limit)
        let la = compute_look_ahead_curvatures(&curvs, &dists, 1.5);
        assert_eq!(la.curvatures, vec![1.0, 3.0, 5.0, 3.0, 0.0]);
        assert_eq!(la.distances_m, vec![2.0, 2.0, 2.0, 1.0, 0.0]);

        // A zero window still takes the current point
        let la = compute_look_ahead_curvatures(&curvs, &dists, 0.0);
        assert_eq!(la.curvatures, vec![0.0, 1.0, 2.0, 3.0, 0.0]);

        // A huge window reaches the end of the path
        let la = compute_look_ahead_curvatures(&curvs, &dists, 100.0);
        assert_eq!(la.curvatures, vec![6.0, 6.0, 5.0, 3.0, 0.0]);
        assert_eq!(la.distances_m, vec![4.0, 3.0, 2.0, 1.0, 0.0]);
    }

    #[test]
    fn test_headings_with_tail_fallback() {
        // Go along x, then turn up y with points closer than the window at the end
        let poses = planar(&[
            (0.0, 0.0),
            (1.0, 0.0),
            (2.0, 0.0),
            (2.0, 1.0),
            (2.0, 1.1),
            (2.0, 1.2),
        ]);
        let dists = compute_distances_to_goal(&poses);
        let headings = compute_headings(&poses, &dists, 0.25);
        let h = headings.as_slice();

        assert!((h[0] - 0.0).abs() < 1e-12);
        assert!((h[1] - 0.0).abs() < 1e-12);
        assert!((h[2] - PI / 2.0).abs() < 1e-12);

        // 3 -> 5 covers only 0.2 m, so the tail copies the heading of pose 2
        assert_eq!(h[3], h[2]);
        assert_eq!(h[4], h[2]);
        assert_eq!(h[5], h[2]);
    }

    #[test]
    fn test_headings_skip_close_points() {
        // The second point is within the window so heading 0 points past it
        let poses = planar(&[(0.0, 0.0), (0.1, 0.1), (1.0, 0.0), (2.0, 0.0)]);
        let dists = compute_distances_to_goal(&poses);
        let headings = compute_headings(&poses, &dists, 0.25);

        assert!((headings.as_slice()[0] - 0f64.atan2(1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_headings_short_path() {
        // Whole path is within the window
        let poses = planar(&[(0.0, 0.0), (0.0, 0.1)]);
        let dists = compute_distances_to_goal(&poses);
        let headings = compute_headings(&poses, &dists, 0.25);

        assert_eq!(headings.as_slice(), &[PI / 2.0, PI / 2.0]);
    }

    #[test]
    fn test_frame_transforms_are_inverses() {
        let poses = arc(1.5, 30);
        let dists = compute_distances_to_goal(&poses);
        let headings = compute_headings(&poses, &dists, 0.25);
        let tfs = compute_world_to_path_frame_tfs(&poses, &headings);

        assert_eq!(tfs.path_to_world.len(), poses.len());
        assert_eq!(tfs.world_to_path.len(), poses.len());

        for i in 0..poses.len() {
            let prod = tfs.world_to_path[i] * tfs.path_to_world[i];
            assert!((prod - Matrix3::identity()).amax() < 1e-12);

            // The path frame origin is the waypoint itself
            let origin = tfs.world_to_path[i] * nalgebra::Vector3::new(
                poses[i].position_m[0],
                poses[i].position_m[1],
                1.0,
            );
            assert!(origin[0].abs() < 1e-12 && origin[1].abs() < 1e-12);
        }
    }
}

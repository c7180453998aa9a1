//! # Path
//!
//! This module defines the reference path followed by the control laws, and
//! the geometric descriptors derived from it.
//!
//! A path is built once from an ordered sequence of poses, at which point a
//! k-d tree over the planar positions is built for projection queries. The
//! descriptors (curvatures, distances to goal, headings and frame transforms)
//! are then computed in a single batch by [`Path::compute_metrics`], which must
//! be called before any of them can be read.
//!
//! Paths are not modified after their metrics are computed, so they are
//! usually wrapped in an `Arc` and shared between control laws. Replacing a
//! path means building a new one and handing it to
//! [`ControlLaw::update_path`](crate::ctrl::ControlLaw::update_path).

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod metrics;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::io::Read;

// External
use log::{debug, trace};
use nalgebra::{Matrix3, Vector2, Vector3};
use serde::Serialize;

// Internal
use crate::loc::Pose;
use util::kd_tree::KdTree;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default minimum distance along the path used to estimate headings.
pub const DEFAULT_ANGLES_SPATIAL_WINDOW_M: f64 = 0.25;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A reference path for the robot to track.
#[derive(Debug, Clone)]
pub struct Path {
    /// The waypoints making up the path, never empty
    poses: Vec<Pose>,

    /// Spatial index over the planar positions of `poses`
    kd_tree: KdTree,

    /// Minimum distance along the path between a point and the point used to
    /// estimate its heading
    angles_spatial_window_m: f64,

    /// The descriptors, `None` until `compute_metrics` has succeeded
    metrics: Option<PathMetrics>,
}

/// The geometric descriptors of a path.
///
/// Every vector has one entry per waypoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathMetrics {
    /// Look ahead distance the metrics were computed with
    pub look_ahead_distance_m: f64,

    /// Heading window the metrics were computed with
    pub angles_spatial_window_m: f64,

    /// Unsigned curvature, zero at the first and last waypoint
    pub curvatures: Vec<f64>,

    /// Sum of absolute curvatures within the look ahead window ahead of each
    /// waypoint
    pub look_ahead_curvatures: Vec<f64>,

    /// Path length spanned by each look ahead window
    pub look_ahead_distances_m: Vec<f64>,

    /// Arc length remaining to the last waypoint
    pub distances_to_goal_m: Vec<f64>,

    /// Local tangent direction
    pub headings_rad: Vec<f64>,

    /// Path frame to world frame homogeneous transforms
    pub path_to_world_tfs: Vec<Matrix3<f64>>,

    /// World frame to path frame homogeneous transforms
    pub world_to_path_tfs: Vec<Matrix3<f64>>,
}

/// The result of an orthogonal projection query, nearest waypoint first.
///
/// May hold fewer entries than were asked for, including none at all, if not
/// enough waypoints were within the query radius.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Projection {
    /// Distance to each matched waypoint
    pub dists_m: Vec<f64>,

    /// Index of each matched waypoint
    pub indices: Vec<usize>,
}

/// A row of a path file, `x, y, z, roll, pitch, yaw`.
type PoseRow = (f64, f64, f64, f64, f64, f64);

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("Attempted to create a path from an empty sequence")]
    EmptySequence,

    #[error("Pose {0} of the path contains a non-finite value")]
    NonFinitePose(usize),

    #[error("Waypoint {0} has the same planar position as the waypoint before it")]
    CoincidentWaypoints(usize),

    #[error("At least 2 waypoints are needed to compute path metrics, found {0}")]
    NotEnoughPoints(usize),

    #[error("The look ahead distance must be non-negative and finite, got {0}")]
    InvalidLookAhead(f64),

    #[error("The angles spatial window must be non-negative and finite, got {0}")]
    InvalidSpatialWindow(f64),

    #[error("Path metrics have not been computed, call compute_metrics first")]
    MetricsNotComputed,

    #[error("Cannot read the path file: {0}")]
    Csv(#[from] csv::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Path {
    /// Create a new path from the given poses.
    ///
    /// The poses must be finite, there must be at least one of them, and no two
    /// consecutive poses may share the same planar position. Metrics are not
    /// computed here.
    pub fn new(poses: Vec<Pose>) -> Result<Self, PathError> {
        if poses.is_empty() {
            return Err(PathError::EmptySequence);
        }

        if let Some(i) = poses.iter().position(|p| !p.is_finite()) {
            return Err(PathError::NonFinitePose(i));
        }

        if let Some(i) = poses
            .windows(2)
            .position(|w| w[0].position2() == w[1].position2())
        {
            return Err(PathError::CoincidentWaypoints(i + 1));
        }

        let points: Vec<Vector2<f64>> = poses.iter().map(|p| p.position2()).collect();
        let kd_tree = KdTree::new(&points);

        Ok(Self {
            poses,
            kd_tree,
            angles_spatial_window_m: DEFAULT_ANGLES_SPATIAL_WINDOW_M,
            metrics: None,
        })
    }

    /// Read a path from headerless CSV data with one `x, y, z, roll, pitch, yaw`
    /// row per pose. Lines starting with `#` are ignored.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, PathError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut poses = Vec::new();
        for row in csv_reader.deserialize::<PoseRow>() {
            let (x, y, z, roll, pitch, yaw) = row?;
            poses.push(Pose::from_xyz_rpy([x, y, z, roll, pitch, yaw]));
        }

        Self::new(poses)
    }

    /// Load a path from a CSV file, see [`Path::from_csv_reader`] for the format.
    pub fn load_csv<P: AsRef<std::path::Path>>(path: P) -> Result<Self, PathError> {
        let file = std::fs::File::open(path).map_err(csv::Error::from)?;
        Self::from_csv_reader(file)
    }

    /// Set the heading window used by the next call to `compute_metrics`.
    pub fn with_angles_spatial_window(mut self, window_m: f64) -> Self {
        self.angles_spatial_window_m = window_m;
        self
    }

    /// Compute all the geometric descriptors of the path.
    ///
    /// This runs, in order:
    ///  1. distances to goal
    ///  1. curvatures
    ///  1. look ahead curvatures
    ///  1. headings
    ///  1. frame transforms
    ///
    /// Any previous metrics are replaced, but only if the whole computation
    /// succeeds. Computing twice on the same path gives identical results.
    pub fn compute_metrics(&mut self, look_ahead_distance_m: f64) -> Result<(), PathError> {
        if self.poses.len() < 2 {
            return Err(PathError::NotEnoughPoints(self.poses.len()));
        }
        if !(look_ahead_distance_m >= 0.0 && look_ahead_distance_m.is_finite()) {
            return Err(PathError::InvalidLookAhead(look_ahead_distance_m));
        }
        let window_m = self.angles_spatial_window_m;
        if !(window_m >= 0.0 && window_m.is_finite()) {
            return Err(PathError::InvalidSpatialWindow(window_m));
        }

        let distances = metrics::compute_distances_to_goal(&self.poses);
        let curvatures = metrics::compute_curvatures(&self.poses)?;
        let look_ahead =
            metrics::compute_look_ahead_curvatures(&curvatures, &distances, look_ahead_distance_m);
        let headings = metrics::compute_headings(&self.poses, &distances, window_m);
        let tfs = metrics::compute_world_to_path_frame_tfs(&self.poses, &headings);

        let metrics = PathMetrics {
            look_ahead_distance_m,
            angles_spatial_window_m: window_m,
            curvatures: curvatures.into_inner(),
            look_ahead_curvatures: look_ahead.curvatures,
            look_ahead_distances_m: look_ahead.distances_m,
            distances_to_goal_m: distances.into_inner(),
            headings_rad: headings.into_inner(),
            path_to_world_tfs: tfs.path_to_world,
            world_to_path_tfs: tfs.world_to_path,
        };

        debug!(
            "Computed metrics for {} point path: length {:.3} m, max curvature {:.3} 1/m",
            self.poses.len(),
            metrics.distances_to_goal_m[0],
            metrics.curvatures.iter().cloned().fold(0f64, f64::max)
        );

        self.metrics = Some(metrics);

        Ok(())
    }

    /// Find up to `knn` waypoints nearest to `position`, within `radius_m` of it.
    ///
    /// The result is sorted nearest first, and equidistant waypoints are ordered
    /// by lowest index. Fewer than `knn` matches is not an error. This does not
    /// need the metrics to have been computed.
    pub fn compute_orthogonal_projection(
        &self,
        position: &Vector2<f64>,
        knn: usize,
        radius_m: f64,
    ) -> Projection {
        let neighbours = self.kd_tree.nearest(position, knn, radius_m);

        trace!(
            "Projection of {:?} (k = {}, r = {} m): {} matches",
            position,
            knn,
            radius_m,
            neighbours.len()
        );

        Projection {
            dists_m: neighbours.iter().map(|n| n.dist).collect(),
            indices: neighbours.iter().map(|n| n.index).collect(),
        }
    }

    /// Get the number of points in the path
    pub fn num_points(&self) -> usize {
        self.poses.len()
    }

    pub fn poses(&self) -> &[Pose] {
        &self.poses
    }

    /// The first pose of the path.
    pub fn start(&self) -> &Pose {
        // Paths are never empty, see `Path::new`
        &self.poses[0]
    }

    /// Sum of the planar lengths of every segment of the path.
    pub fn total_length(&self) -> f64 {
        self.poses
            .windows(2)
            .map(|w| (w[1].position2() - w[0].position2()).norm())
            .sum()
    }

    /// `true` once `compute_metrics` has succeeded.
    pub fn has_metrics(&self) -> bool {
        self.metrics.is_some()
    }

    /// All descriptors of the path.
    pub fn metrics(&self) -> Result<&PathMetrics, PathError> {
        self.metrics.as_ref().ok_or(PathError::MetricsNotComputed)
    }

    pub fn curvatures(&self) -> Result<&[f64], PathError> {
        Ok(&self.metrics()?.curvatures)
    }

    pub fn look_ahead_curvatures(&self) -> Result<&[f64], PathError> {
        Ok(&self.metrics()?.look_ahead_curvatures)
    }

    pub fn look_ahead_distances(&self) -> Result<&[f64], PathError> {
        Ok(&self.metrics()?.look_ahead_distances_m)
    }

    pub fn distances_to_goal(&self) -> Result<&[f64], PathError> {
        Ok(&self.metrics()?.distances_to_goal_m)
    }

    pub fn headings(&self) -> Result<&[f64], PathError> {
        Ok(&self.metrics()?.headings_rad)
    }

    pub fn path_to_world_tfs(&self) -> Result<&[Matrix3<f64>], PathError> {
        Ok(&self.metrics()?.path_to_world_tfs)
    }

    pub fn world_to_path_tfs(&self) -> Result<&[Matrix3<f64>], PathError> {
        Ok(&self.metrics()?.world_to_path_tfs)
    }

    /// The planar pose (x, y, heading) of each waypoint, using the computed
    /// heading rather than the attitude of the input poses.
    pub fn planar_poses(&self) -> Result<Vec<Vector3<f64>>, PathError> {
        Ok(self
            .poses
            .iter()
            .zip(self.headings()?)
            .map(|(p, h)| Vector3::new(p.position_m[0], p.position_m[1], *h))
            .collect())
    }
}

impl Projection {
    /// Distance to and index of the nearest matched waypoint, if any.
    pub fn nearest(&self) -> Option<(f64, usize)> {
        Some((*self.dists_m.first()?, *self.indices.first()?))
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

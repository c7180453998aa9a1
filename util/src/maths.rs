//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Wrap an angle into the range [-pi, pi].
///
/// This works for any finite input, no matter how many turns away from zero
/// it is.
pub fn wrap_to_pi<T>(angle: T) -> T
where
    T: Float
{
    angle.sin().atan2(angle.cos())
}

/// Wrap an angle into the range [-pi, pi] by applying at most one 2pi
/// correction.
///
/// Only valid for inputs in (-3pi, 3pi), which covers the difference of two
/// angles that are themselves already in [-pi, pi]. Values inside the range
/// are returned untouched, so unlike [`wrap_to_pi`] no rounding is introduced
/// by a trigonometric round trip.
pub fn wrap_pi_once<T>(angle: T) -> T
where
    T: Float
{
    let pi_t: T = T::from(std::f64::consts::PI).unwrap();
    let tau_t: T = T::from(std::f64::consts::TAU).unwrap();

    if angle > pi_t {
        angle - tau_t
    }
    else if angle < -pi_t {
        angle + tau_t
    }
    else {
        angle
    }
}

/// Return the euclidian norm (distance between) of two planar points.
pub fn norm2<T>(x_0: T, y_0: T, x_1: T, y_1: T) -> T
where
    T: Float
{
    (x_1 - x_0).hypot(y_1 - y_0)
}

use crate::GfError;

/// Floating point type for every parameter and state value.
pub type Real = f64;

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, GfError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(GfError::NonFinite { what, value: v })
    }
}

/// Wrap an angle in degrees into the principal range (-180, 180].
pub fn wrap_degrees(angle: Real) -> Real {
    180.0 - (180.0 - angle).rem_euclid(360.0)
}

/// Wrap an angle in radians into the principal range (-pi, pi].
pub fn wrap_radians(angle: Real) -> Real {
    use core::f64::consts::{PI, TAU};
    PI - (PI - angle).rem_euclid(TAU)
}

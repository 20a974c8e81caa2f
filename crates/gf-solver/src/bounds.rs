//! Bounds-aware step application.

use nalgebra::DVector;

/// Applies a Newton correction without leaving any variable bound.
pub trait BoundsEnforcer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Update `x` with (a scaled) `dx` and return the step scale used.
    ///
    /// `bounds[i]` is `None` for free variables.
    fn apply(&self, x: &mut DVector<f64>, dx: &DVector<f64>, bounds: &[Option<(f64, f64)>]) -> f64;
}

/// Scales the whole step by the largest factor that keeps every bounded
/// variable inside its interval.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarBounds;

impl ScalarBounds {
    /// Largest `alpha` in `[0, 1]` with `x + alpha dx` inside every bound.
    pub fn step_scale(x: &DVector<f64>, dx: &DVector<f64>, bounds: &[Option<(f64, f64)>]) -> f64 {
        let mut alpha: f64 = 1.0;
        for (i, b) in bounds.iter().enumerate() {
            let Some((lo, hi)) = *b else { continue };
            if dx[i] == 0.0 {
                continue;
            }
            let next = x[i] + dx[i];
            if next > hi {
                alpha = alpha.min((hi - x[i]) / dx[i]);
            }
            if next < lo {
                alpha = alpha.min((lo - x[i]) / dx[i]);
            }
        }
        alpha.max(0.0)
    }
}

impl BoundsEnforcer for ScalarBounds {
    fn name(&self) -> &'static str {
        "scalar"
    }

    fn apply(&self, x: &mut DVector<f64>, dx: &DVector<f64>, bounds: &[Option<(f64, f64)>]) -> f64 {
        let alpha = Self::step_scale(x, dx, bounds);
        x.axpy(alpha, dx, 1.0);
        clamp_into(x, bounds);
        alpha
    }
}

/// Takes the full step and clips each bounded variable on its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct VectorBounds;

impl BoundsEnforcer for VectorBounds {
    fn name(&self) -> &'static str {
        "vector"
    }

    fn apply(&self, x: &mut DVector<f64>, dx: &DVector<f64>, bounds: &[Option<(f64, f64)>]) -> f64 {
        *x += dx;
        clamp_into(x, bounds);
        1.0
    }
}

// rounding in the update can leave a variable a few ulps outside its bound
fn clamp_into(x: &mut DVector<f64>, bounds: &[Option<(f64, f64)>]) {
    for (v, b) in x.iter_mut().zip(bounds) {
        if let Some((lo, hi)) = *b {
            *v = v.clamp(lo, hi);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> Vec<Option<(f64, f64)>> {
        vec![None, Some((-1.0, 1.0))]
    }

    #[test]
    fn scalar_bounds_shrink_the_whole_step() {
        let mut x = DVector::from_vec(vec![0.0, 0.0]);
        let dx = DVector::from_vec(vec![4.0, 2.0]);
        let alpha = ScalarBounds.apply(&mut x, &dx, &bounds());
        assert_eq!(alpha, 0.5);
        assert_eq!(x.as_slice(), &[2.0, 1.0]);
    }

    #[test]
    fn vector_bounds_clip_each_variable() {
        let mut x = DVector::from_vec(vec![0.0, 0.0]);
        let dx = DVector::from_vec(vec![4.0, 2.0]);
        let alpha = VectorBounds.apply(&mut x, &dx, &bounds());
        assert_eq!(alpha, 1.0);
        assert_eq!(x.as_slice(), &[4.0, 1.0]);
    }

    #[test]
    fn variable_on_its_bound_blocks_outward_steps() {
        let x = DVector::from_vec(vec![0.0, 1.0]);
        let dx = DVector::from_vec(vec![1.0, 0.5]);
        assert_eq!(ScalarBounds::step_scale(&x, &dx, &bounds()), 0.0);
        let inward = DVector::from_vec(vec![1.0, -0.5]);
        assert_eq!(ScalarBounds::step_scale(&x, &inward, &bounds()), 1.0);
    }

    #[test]
    fn free_problems_take_full_steps() {
        let x = DVector::from_vec(vec![0.0, 0.0]);
        let dx = DVector::from_vec(vec![1e9, -1e9]);
        assert_eq!(ScalarBounds::step_scale(&x, &dx, &[None, None]), 1.0);
    }
}

//! Per-operating-point parameter arrays.
//!
//! A network is solved at N independent operating points that share one
//! topology. Every device parameter is a [`PointArray`]: either a single value
//! broadcast to all points or exactly one value per point.

use crate::error::{GfError, GfResult};
use crate::numeric::Real;

/// Parameter values across operating points.
///
/// Never empty. A length-1 array broadcasts to every point.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PointArray {
    values: Vec<Real>,
}

impl PointArray {
    /// A single value shared by all points.
    pub fn scalar(value: Real) -> Self {
        Self {
            values: vec![value],
        }
    }

    /// One value per point. Rejects empty input and non-finite values.
    pub fn new(values: Vec<Real>) -> GfResult<Self> {
        if values.is_empty() {
            return Err(GfError::InvalidArg {
                what: "point array must hold at least one value",
            });
        }
        if let Some(&bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(GfError::NonFinite {
                what: "point array value",
                value: bad,
            });
        }
        Ok(Self { values })
    }

    /// Number of stored values (1 when broadcasting).
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_broadcast(&self) -> bool {
        self.values.len() == 1
    }

    /// Value at an operating point.
    ///
    /// # Panics
    /// If the array is per-point and `point` is out of range. Problems check
    /// lengths with [`PointArray::check_len`] before solving.
    pub fn at(&self, point: usize) -> Real {
        if self.is_broadcast() {
            self.values[0]
        } else {
            self.values[point]
        }
    }

    pub fn values(&self) -> &[Real] {
        &self.values
    }

    /// Apply `f` to every stored value.
    pub fn map(&self, f: impl Fn(Real) -> Real) -> Self {
        Self {
            values: self.values.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Verify the array is usable with `num_points` operating points.
    pub fn check_len(&self, num_points: usize, what: &'static str) -> GfResult<()> {
        if self.is_broadcast() || self.values.len() == num_points {
            Ok(())
        } else {
            Err(GfError::PointCount {
                what,
                expected: num_points,
                actual: self.values.len(),
            })
        }
    }

    /// Reject NaN or infinite values. [`PointArray::scalar`] does not check.
    pub fn check_finite(&self, what: &'static str) -> GfResult<()> {
        match self.values.iter().find(|v| !v.is_finite()) {
            Some(&value) => Err(GfError::NonFinite { what, value }),
            None => Ok(()),
        }
    }

    /// True when every value satisfies `pred`.
    pub fn all(&self, pred: impl Fn(Real) -> bool) -> bool {
        self.values.iter().all(|&v| pred(v))
    }
}

impl From<Real> for PointArray {
    fn from(value: Real) -> Self {
        Self::scalar(value)
    }
}

/// Closed interval `[lower, upper]` on an unknown, per operating point.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    lower: PointArray,
    upper: PointArray,
}

impl Bounds {
    /// Build bounds, rejecting NaN and any point where `lower > upper`.
    /// Infinite limits leave that side open.
    pub fn new(lower: impl Into<PointArray>, upper: impl Into<PointArray>) -> GfResult<Self> {
        let lower = lower.into();
        let upper = upper.into();
        let n = lower.len().max(upper.len());
        if !lower.is_broadcast() && !upper.is_broadcast() && lower.len() != upper.len() {
            return Err(GfError::PointCount {
                what: "bounds",
                expected: lower.len(),
                actual: upper.len(),
            });
        }
        for (what, side) in [("lower bound", &lower), ("upper bound", &upper)] {
            if let Some(&value) = side.values.iter().find(|v| v.is_nan()) {
                return Err(GfError::NonFinite { what, value });
            }
        }
        for p in 0..n {
            if lower.at(p) > upper.at(p) {
                return Err(GfError::InvalidArg {
                    what: "lower bound exceeds upper bound",
                });
            }
        }
        Ok(Self { lower, upper })
    }

    pub fn lower(&self) -> &PointArray {
        &self.lower
    }

    pub fn upper(&self) -> &PointArray {
        &self.upper
    }

    /// `(lower, upper)` at one operating point.
    pub fn at(&self, point: usize) -> (Real, Real) {
        (self.lower.at(point), self.upper.at(point))
    }

    pub fn contains(&self, point: usize, value: Real) -> bool {
        let (lo, hi) = self.at(point);
        value >= lo && value <= hi
    }

    /// Clamp a value into the interval at `point`.
    pub fn clamp(&self, point: usize, value: Real) -> Real {
        let (lo, hi) = self.at(point);
        value.clamp(lo, hi)
    }

    pub fn check_len(&self, num_points: usize) -> GfResult<()> {
        self.lower.check_len(num_points, "lower bound")?;
        self.upper.check_len(num_points, "upper bound")
    }
}

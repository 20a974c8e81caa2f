//! Bus current balance.
//!
//! A bus owns no device model; its equations are Kirchhoff's current law over
//! the currents its devices draw. With every device current defined as drawn
//! from the bus, the balance is `sum(I) = 0` per component and its partial
//! with respect to each incident current is one.

use gf_graph::{BusBase, BusKind};

/// Partial of a bus balance component with respect to an incident current.
pub const INCIDENT_CURRENT_PARTIAL: f64 = 1.0;

/// Running current sum at one bus for one operating point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BusBalance {
    kind: BusKind,
    sums: [f64; 2],
}

impl BusBalance {
    pub fn new(kind: BusKind) -> Self {
        Self {
            kind,
            sums: [0.0; 2],
        }
    }

    /// Add one incident current (`[re, im]` for AC, `[i]` for DC).
    pub fn draw(&mut self, current: &[f64]) {
        for (sum, i) in self.sums.iter_mut().zip(current) {
            *sum += *i;
        }
    }

    /// Add a single component of an incident current.
    pub fn draw_component(&mut self, component: usize, current: f64) {
        self.sums[component] += current;
    }

    /// Unscaled balance residual, one entry per voltage component.
    pub fn residual(&self) -> &[f64] {
        &self.sums[..self.kind.width()]
    }

    /// Balance residual divided by the bus base current.
    pub fn scaled(&self, base: &BusBase) -> impl Iterator<Item = f64> + '_ {
        let i_base = base.i();
        self.residual().iter().map(move |r| r / i_base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gf_core::units::{megawatts, volts};

    #[test]
    fn ac_balance_sums_components() {
        let mut bal = BusBalance::new(BusKind::Ac);
        bal.draw(&[10.0, -2.0]);
        bal.draw(&[-10.0, 2.5]);
        assert_eq!(bal.residual(), &[0.0, 0.5]);
    }

    #[test]
    fn dc_balance_is_scalar() {
        let mut bal = BusBalance::new(BusKind::Dc);
        bal.draw(&[3.0]);
        bal.draw_component(0, -1.0);
        assert_eq!(bal.residual(), &[2.0]);

        let base = BusBase::new(volts(5000.0), megawatts(10.0)).unwrap();
        let scaled: Vec<f64> = bal.scaled(&base).collect();
        assert_eq!(scaled, vec![2.0 / 2000.0]);
    }
}

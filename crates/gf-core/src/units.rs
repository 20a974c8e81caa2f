// gf-core/src/units.rs

use uom::si::f64::{
    Angle as UomAngle, ElectricPotential as UomElectricPotential, Power as UomPower,
};

// Public canonical unit types (SI, f64)
pub type Angle = UomAngle;
pub type Power = UomPower;
pub type Voltage = UomElectricPotential;

#[inline]
pub fn volts(v: f64) -> Voltage {
    use uom::si::electric_potential::volt;
    Voltage::new::<volt>(v)
}

#[inline]
pub fn watts(v: f64) -> Power {
    use uom::si::power::watt;
    Power::new::<watt>(v)
}

#[inline]
pub fn megawatts(v: f64) -> Power {
    use uom::si::power::megawatt;
    Power::new::<megawatt>(v)
}

#[inline]
pub fn degrees(v: f64) -> Angle {
    use uom::si::angle::degree;
    Angle::new::<degree>(v)
}

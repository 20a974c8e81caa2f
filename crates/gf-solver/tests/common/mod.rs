//! Shared fixtures for solver integration tests.

#![allow(dead_code)]

use gf_core::units::{megawatts, volts, watts};
use gf_graph::BusBase;
use num_complex::Complex64;

/// Route solver logs to the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// 1 V / 1 W base, for per-unit textbook networks.
pub fn per_unit() -> BusBase {
    BusBase::new(volts(1.0), watts(1.0)).unwrap()
}

pub fn base(v: f64) -> BusBase {
    BusBase::new(volts(v), megawatts(10.0)).unwrap()
}

pub fn assert_close(actual: f64, expected: f64, tol: f64, what: &str) {
    assert!(
        (actual - expected).abs() <= tol,
        "{what}: got {actual}, expected {expected} (tol {tol})"
    );
}

pub fn assert_rel(actual: f64, expected: f64, rel: f64, what: &str) {
    assert!(
        (actual - expected).abs() <= rel * expected.abs(),
        "{what}: got {actual}, expected {expected} (rel {rel})"
    );
}

pub fn assert_phasor(actual: Complex64, expected: (f64, f64), tol: f64, what: &str) {
    assert!(
        (actual - Complex64::new(expected.0, expected.1)).norm() <= tol,
        "{what}: got {actual}, expected {expected:?} (tol {tol})"
    );
}

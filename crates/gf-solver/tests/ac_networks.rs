//! AC-only networks: textbook three-bus cases, slack and P-V behavior.

mod common;

use common::{assert_close, assert_phasor, base, init_tracing, per_unit};
use gf_core::{Bounds, PointArray};
use gf_devices::{AcGenerator, AcLine, AcLoad};
use gf_graph::{BusBase, BusKind, Graph, GraphBuilder};
use gf_solver::{LoadFlowProblem, SolverError, solve};
use proptest::prelude::*;
use uom::si::angle::degree;
use uom::si::electric_potential::volt;

fn points(values: &[f64]) -> PointArray {
    PointArray::new(values.to_vec()).unwrap()
}

/// Slack at bus 1, lines 1-2, 1-3, 2-3 and a device slot at buses 2 and 3.
fn three_bus(third: &str) -> Graph {
    let mut b = GraphBuilder::new();
    let b1 = b.add_bus("1", BusKind::Ac, per_unit());
    let b2 = b.add_bus("2", BusKind::Ac, per_unit());
    let b3 = b.add_bus("3", BusKind::Ac, per_unit());
    b.add_element("L12", &[b1, b2]);
    b.add_element("L13", &[b1, b3]);
    b.add_element("L23", &[b2, b3]);
    b.add_element("G1", &[b1]);
    b.add_element("D2", &[b2]);
    b.add_element(third, &[b3]);
    b.build().unwrap()
}

#[test]
fn hambley_three_bus_at_three_operating_points() {
    init_tracing();
    let graph = three_bus("D3");
    let mut problem = LoadFlowProblem::new(&graph, 3);
    let lines = [
        ("L12", [0.02, 0.01, 0.015], [0.04, 0.05, 0.03]),
        ("L13", [0.01, 0.02, 0.025], [0.03, 0.02, 0.015]),
        ("L23", [0.0125, 0.015, 0.02], [0.025, 0.03, 0.015]),
    ];
    for (name, r, x) in lines {
        let line = AcLine::new(name, points(&r), points(&x)).unwrap();
        problem.add_device_by_name(name, Box::new(line)).unwrap();
    }
    problem
        .add_device_by_name(
            "G1",
            Box::new(AcGenerator::slack("G1", 1.05, 0.0).unwrap().with_power_guess(-0.1)),
        )
        .unwrap();
    problem
        .add_device_by_name(
            "D2",
            Box::new(AcLoad::new(
                "D2",
                points(&[2.566, 2.45, 2.6]),
                points(&[1.102, 1.2, 1.05]),
            )),
        )
        .unwrap();
    problem
        .add_device_by_name(
            "D3",
            Box::new(AcLoad::new(
                "D3",
                points(&[1.386, 1.55, 1.2]),
                points(&[0.452, 0.6, 0.5]),
            )),
        )
        .unwrap();

    let sol = solve(&problem, None, None).unwrap();
    assert!(sol.iterations <= 6, "took {} iterations", sol.iterations);

    assert_phasor(sol.bus_voltage("1", 0).unwrap(), (1.05, 0.0), 1e-8, "V1");
    assert_phasor(sol.bus_voltage("2", 0).unwrap(), (0.98, -0.06), 1e-4, "V2");
    assert_phasor(sol.bus_voltage("3", 0).unwrap(), (1.0, -0.05), 1e-4, "V3");
    assert_phasor(sol.bus_voltage("2", 1).unwrap(), (0.969104, -0.061906), 1e-5, "V2 point 1");
    assert_phasor(sol.bus_voltage("3", 1).unwrap(), (0.985460, -0.034930), 1e-5, "V3 point 1");
    assert_phasor(sol.bus_voltage("2", 2).unwrap(), (0.982644, -0.035201), 1e-5, "V2 point 2");
    assert_phasor(sol.bus_voltage("3", 2).unwrap(), (0.995520, -0.020389), 1e-5, "V3 point 2");

    // generator draws negative power: it supplies the network
    assert_close(sol.device_value("G1", "Ir", 0).unwrap(), -3.9, 1e-4, "slack Ir");
    assert_close(sol.device_value("G1", "Ii", 0).unwrap(), 1.8, 1e-4, "slack Ii");
    assert_close(sol.device_value("G1", "P", 0).unwrap(), -4.095, 1e-4, "slack P");
    assert_close(sol.device_value("G1", "Q", 0).unwrap(), -1.89, 1e-4, "slack Q");
}

#[test]
fn generated_power_covers_loads_and_line_losses() {
    init_tracing();
    let graph = three_bus("D3");
    let mut problem = LoadFlowProblem::new(&graph, 1);
    for (name, r, x) in [("L12", 0.02, 0.04), ("L13", 0.01, 0.03), ("L23", 0.0125, 0.025)] {
        problem
            .add_device_by_name(name, Box::new(AcLine::new(name, r, x).unwrap()))
            .unwrap();
    }
    problem
        .add_device_by_name("G1", Box::new(AcGenerator::slack("G1", 1.05, 0.0).unwrap()))
        .unwrap();
    problem
        .add_device_by_name("D2", Box::new(AcLoad::new("D2", 2.566, 1.102)))
        .unwrap();
    problem
        .add_device_by_name("D3", Box::new(AcLoad::new("D3", 1.386, 0.452)))
        .unwrap();

    let sol = solve(&problem, None, None).unwrap();
    let losses: f64 = ["L12", "L13", "L23"]
        .iter()
        .map(|l| sol.device_value(l, "P_loss", 0).unwrap())
        .sum();
    assert!(losses > 0.0);
    let generated = -sol.device_value("G1", "P", 0).unwrap();
    assert_close(generated, 2.566 + 1.386 + losses, 1e-6, "real power balance");

    let l12 = sol.device("L12").unwrap();
    let (p_in, p_out) = (l12.value("P_in", 0).unwrap(), l12.value("P_out", 0).unwrap());
    assert_close(p_in + p_out, l12.value("P_loss", 0).unwrap(), 1e-12, "line loss");
}

#[test]
fn pv_generator_holds_voltage_and_real_power() {
    init_tracing();
    let graph = three_bus("G3");
    let mut problem = LoadFlowProblem::new(&graph, 1);
    for (name, r, x) in [("L12", 0.02, 0.04), ("L13", 0.01, 0.03), ("L23", 0.0125, 0.025)] {
        problem
            .add_device_by_name(name, Box::new(AcLine::new(name, r, x).unwrap()))
            .unwrap();
    }
    problem
        .add_device_by_name("G1", Box::new(AcGenerator::slack("G1", 1.05, 0.0).unwrap()))
        .unwrap();
    problem
        .add_device_by_name("G3", Box::new(AcGenerator::pv("G3", 1.04, -2.0).unwrap()))
        .unwrap();
    problem
        .add_device_by_name("D2", Box::new(AcLoad::new("D2", 4.0, 2.5)))
        .unwrap();

    let sol = solve(&problem, None, None).unwrap();
    assert_phasor(sol.bus_voltage("2", 0).unwrap(), (0.970604, -0.045712), 1e-5, "V2");
    assert_phasor(sol.bus_voltage("3", 0).unwrap(), (1.039961, -0.009054), 1e-5, "V3");
    assert_close(sol.bus_voltage("3", 0).unwrap().norm(), 1.04, 1e-8, "|V3|");

    assert_close(sol.device_value("G1", "P", 0).unwrap(), -2.18423, 1e-5, "slack P");
    assert_close(sol.device_value("G1", "Q", 0).unwrap(), -1.40852, 1e-5, "slack Q");
    assert_close(sol.device_value("G3", "P", 0).unwrap(), -2.0, 1e-7, "P-V P");
    assert_close(sol.device_value("G3", "Q", 0).unwrap(), -1.46177, 1e-5, "P-V Q");
}

/// Slack and line to a P-V bus with a bounded reactive power and a load.
fn pv_with_q_limits(q_load: f64) -> (Graph, Vec<(&'static str, Box<dyn gf_devices::Device>)>) {
    let mut b = GraphBuilder::new();
    let b1 = b.add_bus("1", BusKind::Ac, base(5000.0));
    let b2 = b.add_bus("2", BusKind::Ac, base(5000.0));
    b.add_element("line", &[b1, b2]);
    b.add_element("slack", &[b1]);
    b.add_element("PV", &[b2]);
    b.add_element("load", &[b2]);
    let graph = b.build().unwrap();

    let q_bounds = Bounds::new(-0.75e6, -0.1e6).unwrap();
    let devices: Vec<(&'static str, Box<dyn gf_devices::Device>)> = vec![
        ("line", Box::new(AcLine::new("line", 0.05, 0.25).unwrap())),
        (
            "slack",
            Box::new(AcGenerator::slack("slack", 5000.0, 0.0).unwrap().with_power_guess(-1.0e6)),
        ),
        (
            "PV",
            Box::new(AcGenerator::pv("PV", 4950.0, -2.0e6).unwrap().with_q_bounds(q_bounds)),
        ),
        ("load", Box::new(AcLoad::new("load", 2.5e6, q_load))),
    ];
    (graph, devices)
}

fn solve_pv(q_load: f64) -> gf_solver::SolverResult<gf_solver::LoadFlowSolution> {
    let (graph, devices) = pv_with_q_limits(q_load);
    let mut problem = LoadFlowProblem::new(&graph, 1);
    for (name, device) in devices {
        problem.add_device_by_name(name, device).unwrap();
    }
    solve(&problem, None, None)
}

#[test]
fn pv_reactive_power_inside_limits_converges() {
    init_tracing();
    for (q_load, expected) in [(1.0e6, -110_524.0), (1.5e6, -610_524.0)] {
        let sol = solve_pv(q_load).unwrap();
        assert!(sol.iterations <= 3, "took {} iterations", sol.iterations);
        assert_close(sol.device_value("PV", "Q", 0).unwrap(), expected, 1.0, "P-V Q");
        assert_close(
            sol.voltage_magnitude("2", 0).unwrap().get::<volt>(),
            4950.0,
            1e-3,
            "P-V |V|",
        );
    }
}

#[test]
fn pv_needing_reactive_power_outside_limits_does_not_converge() {
    init_tracing();
    match solve_pv(0.4e6) {
        Err(e @ SolverError::NonConvergence { .. }) => assert!(!e.is_evaluation_failure()),
        other => panic!("expected non-convergence, got {:?}", other.map(|s| s.iterations)),
    }
}

#[test]
fn pv_never_reports_reactive_power_outside_limits() {
    init_tracing();
    let mut converged = 0;
    for q_load in [0.4e6, 0.8e6, 1.0e6, 1.2e6, 1.5e6] {
        match solve_pv(q_load) {
            Ok(sol) => {
                let q = sol.device_value("PV", "Q", 0).unwrap();
                assert!((-0.75e6..=-0.1e6).contains(&q), "Q = {q} at load Q {q_load}");
                converged += 1;
            }
            Err(SolverError::NonConvergence { .. }) => {}
            Err(e) => panic!("load Q {q_load}: unexpected error {e}"),
        }
    }
    assert!(converged >= 2, "only {converged} cases converged");
}

fn two_bus_slack(vm: f64, theta: f64) -> gf_solver::LoadFlowSolution {
    let ac: BusBase = base(4160.0);
    let mut b = GraphBuilder::new();
    let a = b.add_bus("A", BusKind::Ac, ac);
    let c = b.add_bus("B", BusKind::Ac, ac);
    let slack = b.add_element("slack", &[a]);
    let line = b.add_element("line", &[a, c]);
    let load = b.add_element("load", &[c]);
    let graph = b.build().unwrap();

    let mut problem = LoadFlowProblem::new(&graph, 1);
    problem
        .add_device(slack, Box::new(AcGenerator::slack("slack", vm, theta).unwrap()))
        .unwrap();
    problem
        .add_device(line, Box::new(AcLine::new("line", 0.1, 0.5).unwrap()))
        .unwrap();
    problem
        .add_device(load, Box::new(AcLoad::new("load", 0.5e6, 0.2e6)))
        .unwrap();
    solve(&problem, None, None).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn slack_bus_sits_at_its_setpoint(vm in 3900.0f64..4400.0, theta in -30.0f64..30.0) {
        let sol = two_bus_slack(vm, theta);
        let magnitude = sol.voltage_magnitude("A", 0).unwrap().get::<volt>();
        let angle = sol.voltage_angle("A", 0).unwrap().get::<degree>();
        prop_assert!((magnitude - vm).abs() < 1e-6 * vm);
        prop_assert!((angle - theta).abs() < 1e-6);
    }
}

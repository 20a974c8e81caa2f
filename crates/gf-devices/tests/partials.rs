//! Central-difference checks of every device's declared analytic partials.

use gf_core::units::{megawatts, volts};
use gf_devices::{
    AcCurrentInjection, AcGenerator, AcLine, AcLoad, Col, Converter, DcGenerator, DcLine, DcLoad,
    Device, Evaluation, Inverter, InverterControl, PhaseMode, Rectifier, Row, Terminals,
    voltage_slots,
};
use gf_graph::{BusBase, BusKind};

fn base_for(kind: BusKind) -> BusBase {
    match kind {
        BusKind::Ac => BusBase::new(volts(4160.0), megawatts(10.0)).unwrap(),
        BusKind::Dc => BusBase::new(volts(6800.0), megawatts(10.0)).unwrap(),
    }
}

fn evaluate(device: &dyn Device, bases: &[BusBase], v: &[f64], x: &[f64]) -> Evaluation {
    let mut out = Evaluation::for_device(device);
    device
        .evaluate(
            0,
            Terminals {
                voltages: v,
                bases,
            },
            x,
            &mut out,
        )
        .unwrap();
    out
}

/// Compare every declared and undeclared partial against central differences.
fn check_partials(device: &dyn Device, v: &[f64], x: &[f64]) {
    let kinds = device.terminal_kinds();
    assert_eq!(v.len(), voltage_slots(kinds), "{}: slot count", device.name());
    assert_eq!(x.len(), device.unknowns().len(), "{}: unknown count", device.name());
    let bases: Vec<BusBase> = kinds.iter().map(|&k| base_for(k)).collect();

    let analytic = evaluate(device, &bases, v, x);
    assert!(
        analytic.jacobian.undeclared().is_empty(),
        "{}: undeclared writes {:?}",
        device.name(),
        analytic.jacobian.undeclared()
    );

    let rows: Vec<Row> = (0..v.len())
        .map(Row::Current)
        .chain((0..x.len()).map(Row::Residual))
        .collect();
    let cols: Vec<Col> = (0..v.len())
        .map(Col::Voltage)
        .chain((0..x.len()).map(Col::Unknown))
        .collect();

    let value = |e: &Evaluation, row: Row| match row {
        Row::Current(k) => e.currents[k],
        Row::Residual(k) => e.residuals[k],
    };

    for &col in &cols {
        let (mut vp, mut vm, mut xp, mut xm) = (v.to_vec(), v.to_vec(), x.to_vec(), x.to_vec());
        let h = match col {
            Col::Voltage(k) => {
                let h = 1e-6 * v[k].abs().max(1.0);
                vp[k] += h;
                vm[k] -= h;
                h
            }
            Col::Unknown(k) => {
                let h = 1e-6 * x[k].abs().max(1.0);
                xp[k] += h;
                xm[k] -= h;
                h
            }
        };
        let plus = evaluate(device, &bases, &vp, &xp);
        let minus = evaluate(device, &bases, &vm, &xm);

        for &row in &rows {
            let fd = (value(&plus, row) - value(&minus, row)) / (2.0 * h);
            let an = analytic.jacobian.get(row, col).unwrap_or(0.0);
            let scale = 1.0_f64.max(fd.abs()).max(an.abs());
            assert!(
                (fd - an).abs() <= 1e-5 * scale,
                "{}: d{:?}/d{:?} analytic {} vs finite difference {}",
                device.name(),
                row,
                col,
                an,
                fd
            );
        }
    }
}

const AC: [f64; 2] = [4100.0, -290.0];

#[test]
fn line_partials() {
    check_partials(
        &AcLine::new("ac line", 0.3, 0.7).unwrap(),
        &[4100.0, -290.0, 3980.0, -310.0],
        &[],
    );
    check_partials(&DcLine::new("dc line", 0.5).unwrap(), &[6800.0, 6790.0], &[]);
}

#[test]
fn load_and_injection_partials() {
    check_partials(&AcLoad::new("ac load", 1.0e6, 0.3e6), &AC, &[]);
    check_partials(&DcLoad::new("dc load", 0.8e6), &[6790.0], &[]);
    check_partials(&AcCurrentInjection::new("inj", 150.0, -60.0), &AC, &[]);
}

#[test]
fn generator_partials() {
    let x = [-150.0, 60.0, -0.6e6, -0.2e6];
    check_partials(&AcGenerator::slack("slack", 4160.0, 0.0).unwrap(), &AC, &x);
    check_partials(&AcGenerator::pv("pv", 4160.0, -0.6e6).unwrap(), &AC, &x);
    check_partials(
        &DcGenerator::new("dc gen", 6800.0).unwrap(),
        &[6790.0],
        &[-100.0, -0.7e6],
    );
}

#[test]
fn converter_partials_on_both_branches() {
    let v = [4100.0, -290.0, 6790.0];
    let lead = Converter::new("conv lead", 0.99, 0.98, 0.95, PhaseMode::Lead).unwrap();
    // |P_ac| > |P_dc|: AC to DC branch
    check_partials(&lead, &v, &[-94.5, 155.1, -63.5, -0.64e6, 0.65e6, 0.21e6]);
    // |P_ac| < |P_dc|: DC to AC branch
    check_partials(&lead, &v, &[-94.5, 15.1, -6.5, -0.64e6, 0.65e6, 0.21e6]);

    // Lag with a negative power factor puts S_ac in the third quadrant
    let lag = Converter::new("conv lag", 0.97, 0.98, -0.95, PhaseMode::Lag).unwrap();
    check_partials(&lag, &v, &[94.5, -155.1, 63.5, 0.64e6, -0.65e6, -0.21e6]);
    check_partials(&lag, &v, &[94.5, -15.1, 6.5, 0.64e6, -0.65e6, -0.21e6]);
}

#[test]
fn inverter_partials_in_every_mode() {
    let v = [6790.0, 4100.0, -290.0];
    let x = [-150.0, 60.0, -0.6e6, -0.2e6, 0.62e6, 4080.0, 2.0, 0.02e6];
    let phase = Inverter::new(
        "inv phase",
        0.6,
        0.97,
        InverterControl::Phase {
            theta_deg: 0.0.into(),
        },
    )
    .unwrap();
    check_partials(&phase, &v, &x);

    let pf = Inverter::new(
        "inv pf",
        0.62,
        0.97,
        InverterControl::PowerFactor { pf: (-0.95).into() },
    )
    .unwrap();
    check_partials(&pf, &v, &x);

    for mode in [PhaseMode::Lead, PhaseMode::Lag] {
        let fixed = Inverter::new(
            "inv fixed",
            0.615,
            0.97,
            InverterControl::FixedPowerFactor {
                pf: 0.95.into(),
                mode,
            },
        )
        .unwrap();
        check_partials(&fixed, &v, &[0.6e6, -0.58e6, -0.19e6, 0.02e6]);
    }
}

#[test]
fn rectifier_partials() {
    let rect = Rectifier::new("rect", 1.6, 0.97, 0.95).unwrap();
    check_partials(
        &rect,
        &[4100.0, -290.0, 6650.0],
        &[-60.0, -0.4e6, 0.41e6, 6650.0, 0.13e6, 0.01e6],
    );
}

#[test]
fn per_point_parameters_select_their_point() {
    let p = gf_core::PointArray::new(vec![1.0e6, 2.0e6]).unwrap();
    let load = DcLoad::new("dc load", p);
    let bases = [base_for(BusKind::Dc)];
    let v = [5000.0];
    let mut out = Evaluation::for_device(&load);
    load.evaluate(
        1,
        Terminals {
            voltages: &v,
            bases: &bases,
        },
        &[],
        &mut out,
    )
    .unwrap();
    assert_eq!(out.currents[0], 400.0);
}

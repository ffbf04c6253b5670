//! Integration tests for procedure wiring, evaluation and persistence.
//!
//! These tests verify:
//!   1. Adding then deleting a link restores the destination input and the
//!      link count
//!   2. Memoized module outputs are bit-identical across repeated reads, and a
//!      module shared by several consumers is computed once per point
//!   3. A copy evaluates identically to its source at every point
//!   4. Streams with a foreign format version are rejected without touching
//!      the target procedure
//!   5. Unconnected inputs give the same documented default at every point
//!   6. Mixed NUMBER / COLOR graphs survive a stream round trip

use procgraph::math::{RGBColor, Vec3};
use procgraph::procedural::modules::{
    BlendModule, CoordinateAxis, CoordinateModule, ExprModule, NoiseModule, NumberModule, ProductModule, RGBModule,
    SineModule, SumModule,
};
use procgraph::procedural::noise::Mulberry32;
use procgraph::procedural::{ImageLibrary, Module, OutputModule, PointInfo, Procedure, WorkerProcedures};
use procgraph::ProcError;

// ── Helpers ────────────────────────────────────────────────────────

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn outputs() -> Vec<OutputModule> {
    vec![
        OutputModule::number("Value", 0.5),
        OutputModule::color("Color", RGBColor::BLACK),
        OutputModule::number("Spare", -1.0),
    ]
}

/// sin(noise(x, y, z) * 4) -> Value
/// blend(rgb(x, y, 0), white, expr) -> Color
fn textured() -> Procedure {
    let mut p = Procedure::new(outputs());
    let x = p.add_module(Module::new(CoordinateModule::new(CoordinateAxis::X)));
    let y = p.add_module(Module::new(CoordinateModule::new(CoordinateAxis::Y)));
    let noise = p.add_module(Module::new(NoiseModule::default()));
    let four = p.add_module(Module::new(NumberModule { value: 4.0 }));
    let product = p.add_module(Module::new(ProductModule));
    let sine = p.add_module(Module::new(SineModule));
    p.connect(noise, 0, product, 0).unwrap();
    p.connect(four, 0, product, 1).unwrap();
    p.connect(product, 0, sine, 0).unwrap();
    p.connect_output(sine, 0, 0).unwrap();

    let rgb = p.add_module(Module::new(RGBModule));
    let expr = p.add_module(Module::new(ExprModule::new("0.5 + 0.5*sin(input1*pi) * z").unwrap()));
    let blend = p.add_module(Module::new(BlendModule));
    p.connect(x, 0, rgb, 0).unwrap();
    p.connect(y, 0, rgb, 1).unwrap();
    p.connect(x, 0, expr, 0).unwrap();
    p.connect(rgb, 0, blend, 0).unwrap();
    p.connect(expr, 0, blend, 2).unwrap();
    p.connect_output(blend, 0, 1).unwrap();
    p
}

fn random_points(seed: i32, n: usize) -> Vec<PointInfo> {
    let mut rng = Mulberry32::new(seed);
    (0..n)
        .map(|_| {
            PointInfo::at(rng.range(-3.0, 3.0), rng.range(-3.0, 3.0), rng.range(-3.0, 3.0))
                .with_size(rng.range(0.0, 0.05))
        })
        .collect()
}

fn evaluate_all(p: &mut Procedure, point: &PointInfo) -> (f64, f64, Vec3, RGBColor, f64) {
    p.init_for_point(point.clone());
    (
        p.output_value(0),
        p.output_error(0),
        p.output_gradient(0),
        p.output_color(1),
        p.output_value(2),
    )
}

// ── Link / delete inverse ──────────────────────────────────────────

#[test]
fn add_then_delete_link_is_an_inverse() {
    init_logging();
    let mut p = textured();
    let before = p.links().len();
    let spare = p.add_module(Module::new(SumModule));
    assert!(p.input_source(spare, 1).is_none());

    p.connect(0, 0, spare, 1).unwrap();
    assert!(p.input_source(spare, 1).is_some());
    let index = p.links().len() - 1;
    p.delete_link(index).unwrap();

    assert!(p.input_source(spare, 1).is_none());
    assert_eq!(p.links().len(), before);
}

#[test]
fn deleting_a_linked_module_severs_both_directions() {
    let mut p = textured();
    // Module 4 is the product: fed by noise and four, feeding sine.
    p.delete_module(4).unwrap();
    assert!(p.links().iter().all(|l| l.from.module < p.modules().len()));
    p.init_for_point(PointInfo::at(1.0, 1.0, 1.0));
    // sin(0) with the product gone.
    assert_eq!(p.output_value(0), 0.0);
}

// ── Memoization ────────────────────────────────────────────────────

#[test]
fn repeated_reads_are_bit_identical() {
    let mut p = textured();
    for point in random_points(7, 50) {
        p.init_for_point(point);
        for module in 0..p.modules().len() {
            let outputs = p.modules()[module].output_ports().len();
            for output in 0..outputs {
                let first = p.module_value(module, output, 0.0);
                let second = p.module_value(module, output, 0.0);
                assert_eq!(first.to_bits(), second.to_bits());
            }
        }
    }
}

/// x fans out into a sum and a product which meet again in a final sum.
#[test]
fn shared_upstream_is_computed_once_per_point() {
    let mut p = Procedure::new(outputs());
    let x = p.add_module(Module::new(CoordinateModule::new(CoordinateAxis::X)));
    let doubled = p.add_module(Module::new(SumModule));
    let squared = p.add_module(Module::new(ProductModule));
    let total = p.add_module(Module::new(SumModule));
    p.connect(x, 0, doubled, 0).unwrap();
    p.connect(x, 0, doubled, 1).unwrap();
    p.connect(x, 0, squared, 0).unwrap();
    p.connect(x, 0, squared, 1).unwrap();
    p.connect(doubled, 0, total, 0).unwrap();
    p.connect(squared, 0, total, 1).unwrap();
    p.connect_output(total, 0, 0).unwrap();

    p.init_for_point(PointInfo::at(3.0, 0.0, 0.0));
    assert!((0..4).all(|m| p.computations(m) == 0));
    assert_eq!(p.output_value(0), 15.0);
    for module in [x, doubled, squared, total] {
        assert_eq!(p.computations(module), 1, "module {module}");
    }
    // Reading again is served entirely from the memo.
    assert_eq!(p.output_value(0), 15.0);
    assert_eq!(p.computations(x), 1);

    p.init_for_point(PointInfo::at(-1.0, 0.0, 0.0));
    assert_eq!(p.computations(x), 0);
    assert_eq!(p.output_value(0), -1.0);
    assert_eq!(p.computations(x), 1);
    assert_eq!(p.computations(total), 1);
}

// ── Copy fidelity ──────────────────────────────────────────────────

#[test]
fn copies_evaluate_identically() {
    let mut src = textured();
    let mut copy = Procedure::new(outputs());
    copy.copy_from(&src).unwrap();
    assert_eq!(copy.modules().len(), src.modules().len());
    assert_eq!(copy.links().len(), src.links().len());

    let mut worker = src.worker_copy();
    for point in random_points(11, 100) {
        let expected = evaluate_all(&mut src, &point);
        assert_eq!(evaluate_all(&mut copy, &point), expected);
        assert_eq!(evaluate_all(&mut worker, &point), expected);
    }
}

#[test]
fn worker_slots_follow_template_edits() {
    let mut template = textured();
    let mut workers = WorkerProcedures::new();
    let point = PointInfo::at(0.3, 0.2, 0.1);

    let before = evaluate_all(workers.get(0usize, &template), &point);
    template.edit_module(3, |m| m.kind = NumberModule { value: 0.0 }.into()).unwrap();
    let after = evaluate_all(workers.get(0usize, &template), &point);

    assert_ne!(before.0, after.0);
    assert_eq!(after.0, 0.0);
    assert_eq!(before.3, after.3);
}

// ── Stream format ──────────────────────────────────────────────────

#[test]
fn foreign_version_is_rejected_without_mutation() {
    let images = ImageLibrary::new();
    let mut buf = Vec::new();
    textured().write_to(&mut buf, &images).unwrap();

    for version in [1i16, -1, 7] {
        let mut bad = buf.clone();
        bad[..2].copy_from_slice(&version.to_be_bytes());
        let mut target = textured();
        let revision = target.revision();
        let links = target.links().to_vec();
        let err = target.read_from(bad.as_slice(), &images).unwrap_err();
        assert!(matches!(err, ProcError::UnsupportedVersion(v) if v == version));
        assert_eq!(target.revision(), revision);
        assert_eq!(target.links(), links.as_slice());
    }
}

#[test]
fn unknown_module_name_fails_the_read() {
    let images = ImageLibrary::new();
    let mut buf = Vec::new();
    let mut p = Procedure::new(outputs());
    p.add_module(Module::new(SumModule));
    p.write_to(&mut buf, &images).unwrap();
    let name = b"SumModule";
    let at = buf.windows(name.len()).position(|w| w == name).unwrap();
    buf[at..at + 3].copy_from_slice(b"Xyz");

    let mut target = Procedure::new(outputs());
    let err = target.read_from(buf.as_slice(), &images).unwrap_err();
    assert!(matches!(err, ProcError::UnknownModule(_)));
    assert!(target.modules().is_empty());
}

#[test]
fn mixed_graph_round_trips() {
    let images = ImageLibrary::new();
    let mut src = textured();
    let mut buf = Vec::new();
    src.write_to(&mut buf, &images).unwrap();

    let mut dst = Procedure::new(outputs());
    dst.read_from(buf.as_slice(), &images).unwrap();
    assert_eq!(dst.links(), src.links());
    for (a, b) in dst.modules().iter().zip(src.modules()) {
        assert_eq!(a.name(), b.name());
        assert_eq!(a.position, b.position);
    }
    for point in random_points(3, 20) {
        assert_eq!(evaluate_all(&mut dst, &point), evaluate_all(&mut src, &point));
    }
}

// ── Defaults ───────────────────────────────────────────────────────

#[test]
fn unconnected_inputs_use_constant_defaults() {
    let mut p = Procedure::new(outputs());
    let sum = p.add_module(Module::new(SumModule));
    p.connect_output(sum, 0, 0).unwrap();
    for point in random_points(5, 30) {
        let (value, error, gradient, color, spare) = evaluate_all(&mut p, &point);
        assert_eq!(value, 0.0);
        assert_eq!(error, 0.0);
        assert_eq!(gradient, Vec3::ZERO);
        // Unwired outputs report their own defaults.
        assert_eq!(color, RGBColor::BLACK);
        assert_eq!(spare, -1.0);
    }
}

#[test]
fn chained_defaults_stay_constant() {
    let mut p = Procedure::new(outputs());
    let sine = p.add_module(Module::new(SineModule));
    let sum = p.add_module(Module::new(SumModule));
    p.connect(sine, 0, sum, 0).unwrap();
    p.connect_output(sum, 0, 0).unwrap();
    // Sine's input defaults to 0, so the sum is constant.
    for point in random_points(9, 10) {
        assert_eq!(evaluate_all(&mut p, &point).0, 0.0);
    }
    // The RGB module's channels default to 0 as well.
    let rgb = p.add_module(Module::new(RGBModule));
    p.connect_output(rgb, 0, 1).unwrap();
    for point in random_points(10, 10) {
        assert_eq!(evaluate_all(&mut p, &point).3, RGBColor::BLACK);
    }
}

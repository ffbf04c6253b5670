//! Integration tests for JSON graph descriptions, previews and configuration.
//!
//! These tests verify:
//!   1. A `{ nodes, edges }` document loads into a procedure that evaluates
//!      like the same graph built by hand
//!   2. Handles resolve by port name or index, and output modules by name
//!   3. Unknown types, duplicate ids, doubly wired inputs and cycles are
//!      rejected
//!   4. Preview grids are cached by content, not by procedure identity
//!   5. Render configuration parses from partial JSON

use procgraph::math::RGBColor;
use procgraph::procedural::modules::{CoordinateAxis, CoordinateModule, NumberModule, ProductModule, SumModule};
use procgraph::procedural::{
    evaluate_preview, hash_preview_request, ImageLibrary, Module, OutputModule, PointInfo, PreviewCache,
    PreviewRequest, Procedure,
};
use procgraph::{ProcError, RenderConfig};

// ── Helpers ────────────────────────────────────────────────────────

fn outputs() -> Vec<OutputModule> {
    vec![
        OutputModule::number("Height", 0.0),
        OutputModule::color("Tint", RGBColor::WHITE),
    ]
}

/// (x + 0.25) * 2 -> Height, constant color -> Tint.
const SCALED_X: &str = r#"{
    "nodes": [
        { "id": "x", "type": "Coordinate", "position": { "x": 10, "y": 20 }, "fields": { "Axis": "X" } },
        { "id": "shift", "type": "Number", "fields": { "Value": 0.25 } },
        { "id": "two", "type": "NumberModule", "fields": { "Value": 2 } },
        { "id": "sum", "type": "Sum" },
        { "id": "product", "type": "procedural.Product" },
        { "id": "paint", "type": "Color", "fields": { "Color": [0.25, 0.5, 1.0] } }
    ],
    "edges": [
        { "source": "x", "target": "sum", "targetHandle": "Value 1" },
        { "source": "shift", "target": "sum", "targetHandle": 1 },
        { "source": "sum", "sourceHandle": "Sum", "target": "product" },
        { "source": "two", "target": "product", "targetHandle": "Value 2" },
        { "source": "product", "target": "Height" },
        { "source": "paint", "target": "Tint" }
    ]
}"#;

fn by_hand() -> Procedure {
    let mut p = Procedure::new(outputs());
    let x = p.add_module(Module::new(CoordinateModule::new(CoordinateAxis::X)));
    let shift = p.add_module(Module::new(NumberModule { value: 0.25 }));
    let two = p.add_module(Module::new(NumberModule { value: 2.0 }));
    let sum = p.add_module(Module::new(SumModule));
    let product = p.add_module(Module::new(ProductModule));
    p.connect(x, 0, sum, 0).unwrap();
    p.connect(shift, 0, sum, 1).unwrap();
    p.connect(sum, 0, product, 0).unwrap();
    p.connect(two, 0, product, 1).unwrap();
    p.connect_output(product, 0, 0).unwrap();
    p
}

// ── Loading ────────────────────────────────────────────────────────

#[test]
fn loaded_graph_matches_hand_built() {
    let images = ImageLibrary::new();
    let mut loaded = Procedure::from_json(outputs(), SCALED_X, &images).unwrap();
    let mut manual = by_hand();
    assert_eq!(loaded.modules().len(), 6);
    assert_eq!(loaded.links().len(), 6);
    assert_eq!(loaded.modules()[0].position, (10, 20));

    for i in -4..=4 {
        let point = PointInfo::at(i as f64 * 0.5, 1.0, -1.0);
        loaded.init_for_point(point.clone());
        manual.init_for_point(point);
        let expected = (i as f64 * 0.5 + 0.25) * 2.0;
        assert!((loaded.output_value(0) - expected).abs() < 1e-12);
        assert_eq!(loaded.output_value(0), manual.output_value(0));
        assert_eq!(loaded.output_gradient(0), manual.output_gradient(0));
        assert_eq!(loaded.output_color(1), RGBColor::new(0.25, 0.5, 1.0));
    }
}

#[test]
fn unknown_type_is_rejected() {
    let text = r#"{ "nodes": [ { "id": "a", "type": "Teleport" } ] }"#;
    let err = Procedure::from_json(outputs(), text, &ImageLibrary::new()).unwrap_err();
    assert!(matches!(err, ProcError::UnknownModule(name) if name == "Teleport"));
}

#[test]
fn duplicate_ids_are_rejected() {
    let text = r#"{ "nodes": [
        { "id": "a", "type": "Sum" },
        { "id": "a", "type": "Product" }
    ] }"#;
    let err = Procedure::from_json(outputs(), text, &ImageLibrary::new()).unwrap_err();
    assert!(matches!(err, ProcError::Graph(_)));
}

#[test]
fn unknown_edge_endpoints_are_rejected() {
    let text = r#"{ "nodes": [ { "id": "a", "type": "Sum" } ],
        "edges": [ { "source": "a", "target": "Nowhere" } ] }"#;
    let err = Procedure::from_json(outputs(), text, &ImageLibrary::new()).unwrap_err();
    assert!(matches!(err, ProcError::Graph(_)));

    let text = r#"{ "nodes": [ { "id": "a", "type": "Sum" } ],
        "edges": [ { "source": "a", "target": "a", "targetHandle": "No Such Port" } ] }"#;
    let err = Procedure::from_json(outputs(), text, &ImageLibrary::new()).unwrap_err();
    assert!(matches!(err, ProcError::Graph(_)));
}

#[test]
fn cycles_are_rejected() {
    let text = r#"{
        "nodes": [ { "id": "a", "type": "Sum" }, { "id": "b", "type": "Sum" } ],
        "edges": [
            { "source": "a", "target": "b" },
            { "source": "b", "target": "a", "targetHandle": 1 }
        ]
    }"#;
    let err = Procedure::from_json(outputs(), text, &ImageLibrary::new()).unwrap_err();
    assert!(matches!(err, ProcError::CycleDetected { .. }));
}

#[test]
fn doubly_wired_inputs_are_rejected() {
    let text = r#"{
        "nodes": [
            { "id": "a", "type": "Number", "fields": { "Value": 1 } },
            { "id": "b", "type": "Number", "fields": { "Value": 2 } },
            { "id": "s", "type": "Sum" }
        ],
        "edges": [
            { "source": "a", "target": "s", "targetHandle": "Value 1" },
            { "source": "b", "target": "s", "targetHandle": 0 }
        ]
    }"#;
    let err = Procedure::from_json(outputs(), text, &ImageLibrary::new()).unwrap_err();
    assert!(matches!(&err, ProcError::Graph(msg) if msg.contains("'a'") && msg.contains("'b'")), "{err}");

    let text = r#"{
        "nodes": [
            { "id": "a", "type": "Number", "fields": { "Value": 1 } },
            { "id": "b", "type": "Number", "fields": { "Value": 2 } }
        ],
        "edges": [
            { "source": "a", "target": "Height" },
            { "source": "b", "target": "Height" }
        ]
    }"#;
    let err = Procedure::from_json(outputs(), text, &ImageLibrary::new()).unwrap_err();
    assert!(matches!(err, ProcError::Graph(_)));

    // One source feeding both inputs is fine.
    let text = r#"{
        "nodes": [ { "id": "a", "type": "Number", "fields": { "Value": 1 } }, { "id": "s", "type": "Sum" } ],
        "edges": [
            { "source": "a", "target": "s" },
            { "source": "a", "target": "s", "targetHandle": 1 },
            { "source": "s", "target": "Height" }
        ]
    }"#;
    let mut p = Procedure::from_json(outputs(), text, &ImageLibrary::new()).unwrap();
    p.init_for_point(PointInfo::at(0.0, 0.0, 0.0));
    assert_eq!(p.output_value(0), 2.0);
}

#[test]
fn malformed_json_is_a_graph_error() {
    let err = Procedure::from_json(outputs(), "{ \"nodes\": [", &ImageLibrary::new()).unwrap_err();
    assert!(matches!(err, ProcError::Graph(_)));
}

// ── Preview ────────────────────────────────────────────────────────

#[test]
fn preview_samples_cell_centers() {
    let p = by_hand();
    let request = PreviewRequest {
        resolution: 4,
        ..PreviewRequest::default()
    };
    let result = evaluate_preview(&p, &request);
    assert_eq!(result.values.len(), 16);
    assert!(result.colors.is_none());
    // Column 0 sits at x = -0.75.
    assert!((result.values[0] - (-0.75 + 0.25) * 2.0).abs() < 1e-6);
    assert!((result.values[3] - (0.75 + 0.25) * 2.0).abs() < 1e-6);
    assert_eq!(result.values[0], result.values[4]);
    assert!(result.min_value <= result.max_value);
}

#[test]
fn color_preview_carries_rgb() {
    let p = Procedure::from_json(outputs(), SCALED_X, &ImageLibrary::new()).unwrap();
    let request = PreviewRequest {
        output: 1,
        resolution: 3,
        ..PreviewRequest::default()
    };
    let result = evaluate_preview(&p, &request);
    let colors = result.colors.unwrap();
    assert_eq!(colors.len(), 9);
    assert!(colors.iter().all(|c| *c == [0.25, 0.5, 1.0]));
}

#[test]
fn cache_keys_follow_content() {
    let images = ImageLibrary::new();
    let request = PreviewRequest {
        resolution: 8,
        ..PreviewRequest::default()
    };
    let loaded = Procedure::from_json(outputs(), SCALED_X, &images).unwrap();
    let same = Procedure::from_json(outputs(), SCALED_X, &images).unwrap();
    assert_eq!(
        hash_preview_request(&loaded, &images, &request).unwrap(),
        hash_preview_request(&same, &images, &request).unwrap()
    );

    let cache = PreviewCache::new(4);
    let first = cache.get_or_evaluate(&loaded, &images, &request).unwrap();
    let second = cache.get_or_evaluate(&same, &images, &request).unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(cache.len(), 1);

    let finer = PreviewRequest {
        resolution: 16,
        ..request.clone()
    };
    let third = cache.get_or_evaluate(&loaded, &images, &finer).unwrap();
    assert_eq!(third.values.len(), 256);
    assert_eq!(cache.len(), 2);
}

// ── Configuration ──────────────────────────────────────────────────

#[test]
fn render_config_from_partial_json() {
    let cfg = RenderConfig::from_json(r#"{ "antialiasing": 2.0, "threads": 3 }"#).unwrap();
    assert_eq!(cfg.antialiasing, 2.0);
    assert_eq!(cfg.threads, Some(3));
    assert_eq!(cfg.max_ray_depth, 8);
    assert!(matches!(RenderConfig::from_json("42"), Err(ProcError::Graph(_))));
}

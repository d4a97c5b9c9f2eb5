//! End-to-end exercise of the 2D fallback path: mount, solve, draw, pan,
//! zoom, export.

use physviz_gpu::{Canvas2dRenderer, CanvasStyle};

fn renderer() -> Canvas2dRenderer {
    Canvas2dRenderer::new(320, 240, &CanvasStyle::default()).expect("canvas mount")
}

#[test]
fn mount_solve_and_draw() {
    let mut canvas = renderer();
    canvas.set_equation("x**2").unwrap();

    let curve = canvas.curve().expect("curve after solve");
    assert_eq!(curve.x_values.len(), 200);
    assert_eq!(curve.y_values.len(), 200);
    assert!((curve.x_values[0] - canvas.viewport().x_min).abs() < 1e-12);
    assert!((curve.x_values[199] - canvas.viewport().x_max).abs() < 1e-12);

    // Something curve-colored must have been drawn.
    let curve_color = image::Rgba([0x2a, 0x6f, 0xef, 255]);
    let painted = canvas
        .frame()
        .pixels()
        .filter(|pixel| **pixel == curve_color)
        .count();
    assert!(painted > 50, "expected a drawn polyline, found {painted} pixels");
}

#[test]
fn bad_equation_keeps_previous_curve() {
    let mut canvas = renderer();
    canvas.set_equation("sin(x)").unwrap();
    let before = canvas.curve().unwrap().clone();

    assert!(canvas.set_equation("frobnicate(x)").is_err());
    assert_eq!(canvas.curve().unwrap(), &before);
    assert_eq!(canvas.equation(), Some("sin(x)"));
}

#[test]
fn pan_translates_bounds_and_resolves() {
    let mut canvas = renderer();
    canvas.set_equation("x").unwrap();
    let x_min_before = canvas.viewport().x_min;

    canvas.on_pointer_down(100.0, 100.0);
    let change = canvas.on_pointer_move(60.0, 100.0);
    canvas.on_pointer_up();

    assert!(change.x_changed);
    assert!(!change.y_changed);
    let x_min_after = canvas.viewport().x_min;
    assert!(x_min_after > x_min_before, "drag left pans the window right");

    // The curve was re-solved against the new bounds.
    let curve = canvas.curve().unwrap();
    assert!((curve.x_values[0] - x_min_after).abs() < 1e-9);
}

#[test]
fn vertical_pan_redraws_without_resolving() {
    let mut canvas = renderer();
    canvas.set_equation("x").unwrap();
    let xs_before = canvas.curve().unwrap().x_values.clone();

    canvas.on_pointer_down(100.0, 100.0);
    let change = canvas.on_pointer_move(100.0, 160.0);
    canvas.on_pointer_up();

    assert!(!change.x_changed);
    assert!(change.y_changed);
    // Same x samples: the y-window does not affect the sampled function.
    assert_eq!(canvas.curve().unwrap().x_values, xs_before);
}

#[test]
fn wheel_zoom_round_trip() {
    let mut canvas = renderer();
    canvas.set_equation("x**2").unwrap();

    assert!(canvas.on_wheel(-1.0));
    assert!(canvas.viewport().x_range() < 20.0);
    assert!(canvas.on_wheel(1.0));
    assert!((canvas.viewport().x_range() - 20.0).abs() < 1e-9);
    assert!((canvas.viewport().y_range() - 20.0).abs() < 1e-9);
}

#[test]
fn export_writes_png() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plot.png");

    let mut canvas = renderer();
    canvas.set_equation("sin(x)").unwrap();
    canvas.export_png(&path).unwrap();

    let written = image::open(&path).unwrap().to_rgba8();
    assert_eq!(written.dimensions(), (320, 240));
    canvas.shutdown();
}

//! End-to-end scenarios: sketch solving through feature regeneration,
//! cuts, undo, and export.

use caliper_types::{ConstraintKind, Sketch, SketchPlane};
use feature_engine::Command;
use modeling_ops::ExtrudeDirection;
use sketch_solver::{detect_profiles, solve, SolveStatus};
use test_harness::{init_test_logging, ModelBuilder};

// ── Scenario 1: rectangle solve ─────────────────────────────────────────

#[test]
fn test_rectangle_solves_to_dimensions() {
    init_test_logging();
    let mut sketch = Sketch::new("rect", SketchPlane::xy());
    let p0 = sketch.add_point(0.0, 0.0, true);
    let p1 = sketch.add_point(3.2, 0.1, false);
    let p2 = sketch.add_point(3.1, 2.1, false);
    let p3 = sketch.add_point(0.1, 1.9, false);
    let bottom = sketch.add_line(p0, p1).unwrap();
    let right = sketch.add_line(p1, p2).unwrap();
    let top = sketch.add_line(p2, p3).unwrap();
    let left = sketch.add_line(p3, p0).unwrap();

    // The scenario pins its constraint set explicitly; drop whatever the
    // near-aligned edges picked up automatically.
    let auto: Vec<u32> = sketch.constraints.iter().map(|c| c.id).collect();
    for id in auto {
        sketch.remove_constraint(id);
    }

    sketch
        .add_constraint(ConstraintKind::Horizontal { line: bottom })
        .unwrap();
    sketch
        .add_constraint(ConstraintKind::Vertical { line: left })
        .unwrap();
    sketch
        .add_constraint(ConstraintKind::Perpendicular {
            line_a: bottom,
            line_b: right,
        })
        .unwrap();
    sketch
        .add_constraint(ConstraintKind::Parallel {
            line_a: bottom,
            line_b: top,
        })
        .unwrap();
    sketch
        .add_constraint(ConstraintKind::DistanceX {
            a: p0,
            b: p1,
            value: 3.0,
        })
        .unwrap();
    sketch
        .add_constraint(ConstraintKind::DistanceY {
            a: p0,
            b: p3,
            value: 2.0,
        })
        .unwrap();

    let result = solve(&mut sketch);
    assert_eq!(result.status, SolveStatus::Success, "{}", result.message);

    let expect = [(p0, 0.0, 0.0), (p1, 3.0, 0.0), (p2, 3.0, 2.0), (p3, 0.0, 2.0)];
    for (id, x, y) in expect {
        let p = sketch.point(id).unwrap();
        assert!(
            (p.x - x).abs() < 1e-6 && (p.y - y).abs() < 1e-6,
            "point {id} at ({}, {}), expected ({x}, {y})",
            p.x,
            p.y
        );
    }
}

// ── Scenario 2: stepped profile with full dimensions ────────────────────

#[test]
fn test_stepped_profile_full_dimensions() {
    init_test_logging();
    let mut sketch = Sketch::new("step", SketchPlane::xy());
    // Slightly off the intended shape; every edge close enough to an axis
    // that construction auto-attaches Horizontal/Vertical.
    let p0 = sketch.add_point(0.0, 0.0, false);
    let p1 = sketch.add_point(60.0, 0.5, false);
    let p2 = sketch.add_point(59.8, 16.0, false);
    let p3 = sketch.add_point(22.2, 15.8, false);
    let p4 = sketch.add_point(22.0, 22.3, false);
    let p5 = sketch.add_point(0.1, 21.9, false);
    let edges = [
        sketch.add_line(p0, p1).unwrap(),
        sketch.add_line(p1, p2).unwrap(),
        sketch.add_line(p2, p3).unwrap(),
        sketch.add_line(p3, p4).unwrap(),
        sketch.add_line(p4, p5).unwrap(),
        sketch.add_line(p5, p0).unwrap(),
    ];
    let auto_count = sketch.constraints.len();
    assert_eq!(auto_count, 6, "every edge picked up an auto H/V constraint");

    sketch
        .add_constraint(ConstraintKind::FixedPoint {
            point: p0,
            x: 0.0,
            y: 0.0,
        })
        .unwrap();
    sketch
        .add_constraint(ConstraintKind::DistanceX {
            a: p0,
            b: p1,
            value: 60.0,
        })
        .unwrap();
    sketch
        .add_constraint(ConstraintKind::DistanceY {
            a: p1,
            b: p2,
            value: 16.0,
        })
        .unwrap();
    sketch
        .add_constraint(ConstraintKind::DistanceX {
            a: p2,
            b: p3,
            value: -38.0,
        })
        .unwrap();
    sketch
        .add_constraint(ConstraintKind::DistanceY {
            a: p3,
            b: p4,
            value: 6.0,
        })
        .unwrap();
    sketch
        .add_constraint(ConstraintKind::DistanceY {
            a: p5,
            b: p0,
            value: -22.0,
        })
        .unwrap();

    let result = solve(&mut sketch);
    assert!(result.converged(), "{}", result.message);

    let expected_lengths = [60.0, 16.0, 38.0, 6.0, 22.0, 22.0];
    for (line, expected) in edges.iter().zip(expected_lengths) {
        let len = sketch.entity_length(*line).unwrap();
        assert!(
            (len - expected).abs() < 1e-3,
            "edge {line}: length {len}, expected {expected}"
        );
    }
    // The sixth dimension is implied; the loop closure makes one equation
    // redundant and the solver reports it.
    assert_eq!(result.status, SolveStatus::Overconstrained);
}

// ── Scenario 3: closed profile detection ────────────────────────────────

#[test]
fn test_profile_detection_square_and_stray_line() {
    let mut sketch = Sketch::new("sq", SketchPlane::xy());
    let p0 = sketch.add_point(0.0, 0.0, false);
    let p1 = sketch.add_point(10.0, 0.0, false);
    let p2 = sketch.add_point(10.0, 10.0, false);
    let p3 = sketch.add_point(0.0, 10.0, false);
    sketch.add_line(p0, p1).unwrap();
    sketch.add_line(p1, p2).unwrap();
    sketch.add_line(p2, p3).unwrap();
    sketch.add_line(p3, p0).unwrap();

    let profiles = detect_profiles(&sketch);
    assert_eq!(profiles.len(), 1);
    assert!(profiles[0].is_closed());
    assert_eq!(profiles[0].entity_ids.len(), 4);

    // A stray line away from the square adds one open profile.
    let a = sketch.add_point(20.0, 20.0, false);
    let b = sketch.add_point(30.0, 27.0, false);
    sketch.add_line(a, b).unwrap();

    let profiles = detect_profiles(&sketch);
    let closed = profiles.iter().filter(|p| p.is_closed()).count();
    let open = profiles.iter().filter(|p| !p.is_closed()).count();
    assert_eq!((closed, open), (1, 1));
}

// ── Scenario 4: extrude regenerate and parameter edit ───────────────────

#[test]
fn test_extrude_regenerate_and_depth_edit() {
    init_test_logging();
    let mut m = ModelBuilder::new();
    m.add_rect_sketch("sk", 0.0, 0.0, 4.0, 3.0).unwrap();
    let pad = m.extrude("pad", "sk", 1.0).unwrap();
    assert!(m.regenerate());

    {
        let solid = m.solid("pad").unwrap();
        assert_eq!(solid.vertices.len(), 8);
        assert_eq!(solid.triangles.len(), 12);
        assert!((solid.signed_volume() - 12.0).abs() < 1e-6);
    }

    m.doc.set_feature_depth(pad, 2.5).unwrap();
    assert!(m.regenerate());
    let solid = m.solid("pad").unwrap();
    assert_eq!(solid.vertices.len(), 8, "same topology after the edit");
    assert_eq!(solid.triangles.len(), 12);
    assert!((solid.signed_volume() - 30.0).abs() < 1e-6);
}

// ── Scenario 5: cut supersession ────────────────────────────────────────

#[test]
fn test_cut_supersedes_base_in_export_set() {
    init_test_logging();
    let mut m = ModelBuilder::new();
    m.add_rect_sketch("base_sk", 0.0, 0.0, 4.0, 4.0).unwrap();
    m.extrude("pad", "base_sk", 2.0).unwrap();
    m.add_rect_sketch("tool_sk", 1.0, 1.0, 2.0, 2.0).unwrap();
    m.cut("pocket", "tool_sk", "pad", 0.5, ExtrudeDirection::Forward)
        .unwrap();
    assert!(m.regenerate());

    assert_eq!(m.display_names(), vec!["pocket".to_string()]);

    // The exported STL carries exactly the pocket result's triangles.
    let solids: Vec<_> = m
        .doc
        .tree
        .display_features()
        .iter()
        .filter_map(|f| f.solid.as_ref())
        .collect();
    let buf = file_format::write_binary_stl(&solids, "pocket").unwrap();
    let pocket_triangles = m.solid("pocket").unwrap().triangles.len();
    assert_eq!(buf.len(), 84 + 50 * pocket_triangles);
}

// ── Scenario 6: undo/redo round trip ────────────────────────────────────

#[test]
fn test_undo_redo_round_trip_through_solve() {
    init_test_logging();
    let mut m = ModelBuilder::new();
    let mut sketch = Sketch::new("sk", SketchPlane::xy());
    let a = sketch.add_point(0.0, 0.0, true);
    let b = sketch.add_point(3.0, 0.4, false);
    let sk = m.add_sketch("sk", sketch).unwrap();

    m.doc.execute(Command::add_line(sk, a, b)).unwrap();
    m.doc
        .execute(Command::add_constraint(
            sk,
            ConstraintKind::Distance { a, b, value: 5.0 },
        ))
        .unwrap();
    let solve_result = m.solve("sk").unwrap();
    assert!(solve_result.converged(), "{}", solve_result.message);
    let solved = {
        let p = m.sketch("sk").unwrap().point(b).unwrap();
        (p.x, p.y)
    };
    assert!((m.sketch("sk").unwrap().measured_distance(a, b).unwrap() - 5.0).abs() < 1e-6);

    // Undo both commands: geometry and constraints are gone, points are
    // back at their pre-command coordinates.
    assert!(m.doc.undo());
    assert!(m.doc.undo());
    {
        let sketch = m.sketch("sk").unwrap();
        assert!(sketch.entities.is_empty());
        assert!(sketch.constraints.is_empty());
        let p = sketch.point(b).unwrap();
        assert!((p.x - 3.0).abs() < 1e-12 && (p.y - 0.4).abs() < 1e-12);
    }

    // Redo both: identical final state, including the solved coordinates.
    assert!(m.doc.redo());
    assert!(m.doc.redo());
    let sketch = m.sketch("sk").unwrap();
    assert_eq!(sketch.entities.len(), 1);
    assert_eq!(sketch.constraints.len(), 1);
    let p = sketch.point(b).unwrap();
    assert!(
        (p.x - solved.0).abs() < 1e-12 && (p.y - solved.1).abs() < 1e-12,
        "redo restored ({}, {}), solved was {:?}",
        p.x,
        p.y,
        solved
    );
    assert!(!m.doc.redo(), "nothing left to redo");
}

// ── Revolve through the document layer ──────────────────────────────────

#[test]
fn test_revolve_feature_end_to_end() {
    init_test_logging();
    let mut m = ModelBuilder::new();
    m.add_rect_sketch("sk", 1.0, 0.0, 1.0, 1.0).unwrap();
    m.revolve("ring", "sk", 360.0, 64, modeling_ops::RevolveAxis::SketchY)
        .unwrap();
    assert!(m.regenerate());
    let v = m.solid("ring").unwrap().signed_volume();
    let exact = std::f64::consts::PI * 3.0;
    assert!(v > 0.97 * exact && v < exact, "washer volume {v}");
}

//! Linear extrusion of closed profiles into capped prismatic solids.

use caliper_types::{math, Profile, Sketch, SketchPlane, Solid, EPS_ZERO_LENGTH};

use crate::polygon::{polygon_area, profile_polygon};
use crate::types::{ExtrudeDirection, OpError};

/// Extrude a closed profile along the sketch plane normal.
///
/// Caps are triangulated with ear clipping; each profile edge contributes
/// one quad side split into two triangles. Normals face outward and each
/// logical face carries its picking polygon.
pub fn extrude_profile(
    sketch: &Sketch,
    profile: &Profile,
    depth: f64,
    direction: ExtrudeDirection,
) -> Result<Solid, OpError> {
    if depth <= EPS_ZERO_LENGTH {
        return Err(OpError::InvalidGeometry {
            reason: format!("non-positive extrusion depth {depth}"),
        });
    }
    let polygon = profile_polygon(sketch, profile)?;
    let (w0, w1) = offsets(depth, direction);
    extrude_polygon(&sketch.plane, &polygon, w0, w1)
}

/// Normal offsets of the bottom and top caps for a given direction.
pub(crate) fn offsets(depth: f64, direction: ExtrudeDirection) -> (f64, f64) {
    match direction {
        ExtrudeDirection::Forward => (0.0, depth),
        ExtrudeDirection::Backward => (-depth, 0.0),
        ExtrudeDirection::Symmetric => (-depth / 2.0, depth / 2.0),
    }
}

/// Push a cap triangle wound so its normal agrees with `want`.
fn push_cap_triangle(
    solid: &mut Solid,
    a: [f64; 3],
    b: [f64; 3],
    c: [f64; 3],
    want: [f64; 3],
    face_id: i32,
) {
    let n = math::cross(math::sub(b, a), math::sub(c, a));
    if math::dot(n, want) >= 0.0 {
        solid.push_triangle(a, b, c, face_id);
    } else {
        solid.push_triangle(a, c, b, face_id);
    }
}

/// Build the prism between two offsets along the plane normal.
pub(crate) fn extrude_polygon(
    plane: &SketchPlane,
    polygon: &[[f64; 2]],
    w0: f64,
    w1: f64,
) -> Result<Solid, OpError> {
    let area = polygon_area(polygon);
    if area.abs() < 1e-9 {
        return Err(OpError::InvalidGeometry {
            reason: "zero-area profile".into(),
        });
    }
    // The detector emits counterclockwise loops; re-orient defensively in
    // case a sampled polygon came in mirrored.
    let ccw: Vec<[f64; 2]> = if area > 0.0 {
        polygon.to_vec()
    } else {
        polygon.iter().rev().copied().collect()
    };
    let n = ccw.len();

    let flat: Vec<f64> = ccw.iter().flat_map(|p| [p[0], p[1]]).collect();
    let cap_indices = earcutr::earcut(&flat, &Vec::new(), 2).map_err(|e| {
        OpError::InvalidGeometry {
            reason: format!("cap triangulation failed: {e:?}"),
        }
    })?;

    let normal = plane.normal;
    let at = |p: [f64; 2], w: f64| math::add(plane.to_world(p[0], p[1]), math::scale(normal, w));
    let bottom: Vec<[f64; 3]> = ccw.iter().map(|p| at(*p, w0)).collect();
    let top: Vec<[f64; 3]> = ccw.iter().map(|p| at(*p, w1)).collect();

    let mut solid = Solid::new();

    let centroid = |pts: &[[f64; 3]]| {
        let mut c = [0.0; 3];
        for p in pts {
            c = math::add(c, *p);
        }
        math::scale(c, 1.0 / pts.len() as f64)
    };

    let bottom_face = solid.add_face(
        "bottom",
        centroid(&bottom),
        math::scale(normal, -1.0),
        bottom.iter().rev().copied().collect(),
    );
    let top_face = solid.add_face("top", centroid(&top), normal, top.clone());

    for tri in cap_indices.chunks(3) {
        let (a, b, c) = (tri[0], tri[1], tri[2]);
        push_cap_triangle(
            &mut solid,
            bottom[a],
            bottom[b],
            bottom[c],
            math::scale(normal, -1.0),
            bottom_face,
        );
        push_cap_triangle(&mut solid, top[a], top[b], top[c], normal, top_face);
    }

    for i in 0..n {
        let j = (i + 1) % n;
        let edge = [ccw[j][0] - ccw[i][0], ccw[j][1] - ccw[i][1]];
        let len = (edge[0] * edge[0] + edge[1] * edge[1]).sqrt();
        if len < EPS_ZERO_LENGTH {
            continue;
        }
        // Outward in-plane normal of a counterclockwise edge.
        let out2 = [edge[1] / len, -edge[0] / len];
        let out3 = math::add(
            math::scale(plane.x_axis, out2[0]),
            math::scale(plane.y_axis, out2[1]),
        );
        let quad = [bottom[i], bottom[j], top[j], top[i]];
        let face = solid.add_face(
            format!("side_{i}"),
            centroid(&quad),
            out3,
            quad.to_vec(),
        );
        solid.push_triangle(quad[0], quad[1], quad[2], face);
        solid.push_triangle(quad[0], quad[2], quad[3], face);
    }

    Ok(solid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use caliper_types::SketchPlane;
    use sketch_solver::first_closed_profile;

    fn rect_sketch(w: f64, h: f64) -> (Sketch, Profile) {
        let mut s = Sketch::new("t", SketchPlane::xy());
        let p0 = s.add_point(0.0, 0.0, false);
        let p1 = s.add_point(w, 0.0, false);
        let p2 = s.add_point(w, h, false);
        let p3 = s.add_point(0.0, h, false);
        s.add_line(p0, p1).unwrap();
        s.add_line(p1, p2).unwrap();
        s.add_line(p2, p3).unwrap();
        s.add_line(p3, p0).unwrap();
        let profile = first_closed_profile(&s).unwrap();
        (s, profile)
    }

    #[test]
    fn test_rectangle_extrude_box_topology() {
        let (s, profile) = rect_sketch(4.0, 3.0);
        let solid = extrude_profile(&s, &profile, 1.0, ExtrudeDirection::Forward).unwrap();
        assert_eq!(solid.vertices.len(), 8);
        assert_eq!(solid.triangles.len(), 12);
        assert_eq!(solid.faces.len(), 6);
        assert!((solid.signed_volume() - 12.0).abs() < 1e-6);
    }

    #[test]
    fn test_deeper_extrude_same_topology_more_volume() {
        let (s, profile) = rect_sketch(4.0, 3.0);
        let solid = extrude_profile(&s, &profile, 2.5, ExtrudeDirection::Forward).unwrap();
        assert_eq!(solid.vertices.len(), 8);
        assert_eq!(solid.triangles.len(), 12);
        assert!((solid.signed_volume() - 30.0).abs() < 1e-6);
    }

    #[test]
    fn test_backward_extrude_grows_against_normal() {
        let (s, profile) = rect_sketch(2.0, 2.0);
        let solid = extrude_profile(&s, &profile, 1.0, ExtrudeDirection::Backward).unwrap();
        let (min, max) = solid.bounding_box().unwrap();
        assert!((min[2] + 1.0).abs() < 1e-12);
        assert!(max[2].abs() < 1e-12);
        assert!(solid.signed_volume() > 0.0);
    }

    #[test]
    fn test_symmetric_extrude_straddles_plane() {
        let (s, profile) = rect_sketch(2.0, 2.0);
        let solid = extrude_profile(&s, &profile, 1.0, ExtrudeDirection::Symmetric).unwrap();
        let (min, max) = solid.bounding_box().unwrap();
        assert!((min[2] + 0.5).abs() < 1e-12);
        assert!((max[2] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_circle_extrude_cylinder_volume() {
        let mut s = Sketch::new("t", SketchPlane::xy());
        let c = s.add_point(0.0, 0.0, false);
        s.add_circle(c, 2.0).unwrap();
        let profile = first_closed_profile(&s).unwrap();
        let solid = extrude_profile(&s, &profile, 3.0, ExtrudeDirection::Forward).unwrap();
        let exact = std::f64::consts::PI * 4.0 * 3.0;
        let v = solid.signed_volume();
        assert!(v > 0.95 * exact && v < exact, "volume {v} vs {exact}");
    }

    #[test]
    fn test_extrude_on_tilted_plane() {
        let plane =
            SketchPlane::from_frame([1.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, -1.0, 0.0]).unwrap();
        let mut s = Sketch::new("t", plane);
        let p0 = s.add_point(0.0, 0.0, false);
        let p1 = s.add_point(2.0, 0.0, false);
        let p2 = s.add_point(2.0, 2.0, false);
        let p3 = s.add_point(0.0, 2.0, false);
        s.add_line(p0, p1).unwrap();
        s.add_line(p1, p2).unwrap();
        s.add_line(p2, p3).unwrap();
        s.add_line(p3, p0).unwrap();
        let profile = first_closed_profile(&s).unwrap();
        let solid = extrude_profile(&s, &profile, 1.5, ExtrudeDirection::Forward).unwrap();
        assert!((solid.signed_volume() - 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_depth_rejected() {
        let (s, profile) = rect_sketch(1.0, 1.0);
        assert!(matches!(
            extrude_profile(&s, &profile, 0.0, ExtrudeDirection::Forward),
            Err(OpError::InvalidGeometry { .. })
        ));
    }
}

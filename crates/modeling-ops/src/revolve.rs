//! Revolution of closed profiles around an axis in the sketch plane.

use caliper_types::{math, Profile, Sketch, Solid};

use crate::polygon::{polygon_area, profile_polygon};
use crate::types::{OpError, RevolveAxis};

/// Revolve a closed profile around the given axis.
///
/// The profile is sampled ring by ring; each segment contributes two
/// triangles per profile edge. A full 360-degree revolution merges the
/// last ring into the first; partial revolutions get planar end caps.
/// The profile must lie entirely on one side of the axis.
pub fn revolve_profile(
    sketch: &Sketch,
    profile: &Profile,
    angle_degrees: f64,
    segments: usize,
    axis: RevolveAxis,
) -> Result<Solid, OpError> {
    if !(angle_degrees > 1e-9 && angle_degrees <= 360.0 + 1e-9) {
        return Err(OpError::InvalidGeometry {
            reason: format!("revolve angle {angle_degrees} outside (0, 360]"),
        });
    }
    if segments < 2 {
        return Err(OpError::InvalidGeometry {
            reason: "revolve needs at least two segments".into(),
        });
    }
    let (axis_origin, axis_dir) = axis.line().ok_or_else(|| OpError::InvalidGeometry {
        reason: "degenerate revolve axis".into(),
    })?;

    let polygon = profile_polygon(sketch, profile)?;
    let area = polygon_area(&polygon);
    if area.abs() < 1e-9 {
        return Err(OpError::InvalidGeometry {
            reason: "zero-area profile".into(),
        });
    }
    let ccw: Vec<[f64; 2]> = if area > 0.0 {
        polygon.clone()
    } else {
        polygon.iter().rev().copied().collect()
    };

    // Signed perpendicular offset from the axis. The profile may touch the
    // axis but must not cross it.
    let side = |p: &[f64; 2]| {
        axis_dir[0] * (p[1] - axis_origin[1]) - axis_dir[1] * (p[0] - axis_origin[0])
    };
    let has_positive = ccw.iter().any(|p| side(p) > 1e-9);
    let has_negative = ccw.iter().any(|p| side(p) < -1e-9);
    if has_positive && has_negative {
        return Err(OpError::InvalidGeometry {
            reason: "profile crosses the revolve axis".into(),
        });
    }
    if !has_positive && !has_negative {
        return Err(OpError::InvalidGeometry {
            reason: "profile lies on the revolve axis".into(),
        });
    }

    let plane = &sketch.plane;
    let origin3 = plane.to_world(axis_origin[0], axis_origin[1]);
    let mut axis3 = math::add(
        math::scale(plane.x_axis, axis_dir[0]),
        math::scale(plane.y_axis, axis_dir[1]),
    );
    // Orient the axis so the profile sits where the sweep starts off along
    // the plane normal; the winding below assumes that side.
    if has_negative {
        axis3 = math::scale(axis3, -1.0);
    }

    let full = (angle_degrees - 360.0).abs() < 1e-9;
    let angle = angle_degrees.to_radians();
    let ring_count = if full { segments } else { segments + 1 };

    let base: Vec<[f64; 3]> = ccw.iter().map(|p| plane.to_world(p[0], p[1])).collect();
    let rings: Vec<Vec<[f64; 3]>> = (0..ring_count)
        .map(|s| {
            let theta = angle * s as f64 / segments as f64;
            base.iter()
                .map(|p| rotate_about_axis(*p, origin3, axis3, theta))
                .collect()
        })
        .collect();

    let mut solid = Solid::new();
    let n = ccw.len();

    // One logical face per profile edge covering the whole sweep. Lateral
    // faces are curved, so they carry no picking polygon.
    let mut edge_faces = Vec::with_capacity(n);
    for i in 0..n {
        let j = (i + 1) % n;
        let mid = math::scale(math::add(base[i], base[j]), 0.5);
        let face = solid.add_face(format!("surface_{i}"), mid, [0.0, 0.0, 0.0], Vec::new());
        edge_faces.push(face);
    }

    for s in 0..segments {
        let r0 = &rings[s];
        let r1 = &rings[(s + 1) % ring_count];
        for i in 0..n {
            let j = (i + 1) % n;
            push_if_nondegenerate(&mut solid, r0[i], r0[j], r1[j], edge_faces[i]);
            push_if_nondegenerate(&mut solid, r0[i], r1[j], r1[i], edge_faces[i]);
        }
    }

    if !full {
        // Start cap faces against the sweep, end cap along it.
        let start_normal = math::scale(plane.normal, -1.0);
        let end_ring = &rings[ring_count - 1];
        let end_normal = {
            // Rotate the plane normal with the final ring.
            let tip = math::add(origin3, plane.normal);
            let rotated = rotate_about_axis(tip, origin3, axis3, angle);
            math::sub(rotated, origin3)
        };

        let flat: Vec<f64> = ccw.iter().flat_map(|p| [p[0], p[1]]).collect();
        let cap_indices = earcutr::earcut(&flat, &Vec::new(), 2).map_err(|e| {
            OpError::InvalidGeometry {
                reason: format!("cap triangulation failed: {e:?}"),
            }
        })?;

        let centroid = |pts: &[[f64; 3]]| {
            let mut c = [0.0; 3];
            for p in pts {
                c = math::add(c, *p);
            }
            math::scale(c, 1.0 / pts.len() as f64)
        };
        let start_face = solid.add_face(
            "start",
            centroid(&rings[0]),
            start_normal,
            rings[0].iter().rev().copied().collect(),
        );
        let end_face = solid.add_face("end", centroid(end_ring), end_normal, end_ring.clone());

        for tri in cap_indices.chunks(3) {
            let (a, b, c) = (tri[0], tri[1], tri[2]);
            push_oriented(
                &mut solid,
                rings[0][a],
                rings[0][b],
                rings[0][c],
                start_normal,
                start_face,
            );
            push_oriented(
                &mut solid,
                end_ring[a],
                end_ring[b],
                end_ring[c],
                end_normal,
                end_face,
            );
        }
    }

    Ok(solid)
}

fn push_if_nondegenerate(solid: &mut Solid, a: [f64; 3], b: [f64; 3], c: [f64; 3], face: i32) {
    let n = math::cross(math::sub(b, a), math::sub(c, a));
    if math::length(n) > 1e-14 {
        solid.push_triangle(a, b, c, face);
    }
}

fn push_oriented(
    solid: &mut Solid,
    a: [f64; 3],
    b: [f64; 3],
    c: [f64; 3],
    want: [f64; 3],
    face: i32,
) {
    let n = math::cross(math::sub(b, a), math::sub(c, a));
    if math::length(n) <= 1e-14 {
        return;
    }
    if math::dot(n, want) >= 0.0 {
        solid.push_triangle(a, b, c, face);
    } else {
        solid.push_triangle(a, c, b, face);
    }
}

fn rotate_about_axis(p: [f64; 3], origin: [f64; 3], u: [f64; 3], theta: f64) -> [f64; 3] {
    let v = math::sub(p, origin);
    let (s, c) = theta.sin_cos();
    let rotated = math::add(
        math::add(math::scale(v, c), math::scale(math::cross(u, v), s)),
        math::scale(u, math::dot(u, v) * (1.0 - c)),
    );
    math::add(origin, rotated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use caliper_types::SketchPlane;
    use sketch_solver::first_closed_profile;

    fn rect_sketch(x0: f64, y0: f64, w: f64, h: f64) -> (Sketch, Profile) {
        let mut s = Sketch::new("t", SketchPlane::xy());
        let p0 = s.add_point(x0, y0, false);
        let p1 = s.add_point(x0 + w, y0, false);
        let p2 = s.add_point(x0 + w, y0 + h, false);
        let p3 = s.add_point(x0, y0 + h, false);
        s.add_line(p0, p1).unwrap();
        s.add_line(p1, p2).unwrap();
        s.add_line(p2, p3).unwrap();
        s.add_line(p3, p0).unwrap();
        let profile = first_closed_profile(&s).unwrap();
        (s, profile)
    }

    #[test]
    fn test_full_revolve_washer_volume() {
        let (s, profile) = rect_sketch(1.0, 0.0, 1.0, 1.0);
        let solid = revolve_profile(&s, &profile, 360.0, 64, RevolveAxis::SketchY).unwrap();
        // pi (R^2 - r^2) h, slightly under for the inscribed sampling.
        let exact = std::f64::consts::PI * 3.0;
        let v = solid.signed_volume();
        assert!(v > 0.97 * exact && v < exact + 1e-9, "volume {v} vs {exact}");
    }

    #[test]
    fn test_half_revolve_is_half_volume_and_capped() {
        let (s, profile) = rect_sketch(1.0, 0.0, 1.0, 1.0);
        let full = revolve_profile(&s, &profile, 360.0, 64, RevolveAxis::SketchY).unwrap();
        let half = revolve_profile(&s, &profile, 180.0, 32, RevolveAxis::SketchY).unwrap();
        let ratio = half.signed_volume() / full.signed_volume();
        assert!((ratio - 0.5).abs() < 1e-2, "ratio {ratio}");
        assert!(half.faces.iter().any(|f| f.name == "start"));
        assert!(half.faces.iter().any(|f| f.name == "end"));
    }

    #[test]
    fn test_revolve_positive_orientation() {
        let (s, profile) = rect_sketch(2.0, -1.0, 1.0, 2.0);
        let solid = revolve_profile(&s, &profile, 360.0, 48, RevolveAxis::SketchY).unwrap();
        assert!(solid.signed_volume() > 0.0);
    }

    #[test]
    fn test_profile_touching_axis_is_allowed() {
        // Rectangle with its left edge on the axis: revolves to a cylinder.
        let (s, profile) = rect_sketch(0.0, 0.0, 1.0, 2.0);
        let solid = revolve_profile(&s, &profile, 360.0, 64, RevolveAxis::SketchY).unwrap();
        let exact = std::f64::consts::PI * 2.0;
        let v = solid.signed_volume();
        assert!(v > 0.97 * exact && v < exact + 1e-9, "volume {v}");
    }

    #[test]
    fn test_profile_crossing_axis_rejected() {
        let (s, profile) = rect_sketch(-0.5, 0.0, 1.0, 1.0);
        assert!(matches!(
            revolve_profile(&s, &profile, 360.0, 32, RevolveAxis::SketchY),
            Err(OpError::InvalidGeometry { .. })
        ));
    }

    #[test]
    fn test_bad_angle_rejected() {
        let (s, profile) = rect_sketch(1.0, 0.0, 1.0, 1.0);
        assert!(revolve_profile(&s, &profile, 0.0, 32, RevolveAxis::SketchY).is_err());
        assert!(revolve_profile(&s, &profile, 400.0, 32, RevolveAxis::SketchY).is_err());
    }
}

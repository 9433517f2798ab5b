//! Conversion between triangle-soup solids and the kernel's indexed-mesh
//! form.
//!
//! Going out welds coincident vertices, drops degenerate triangles, and
//! fixes the global winding so the signed volume is positive. Coming back
//! materializes triangles with an unknown face id and freshly computed
//! normals.

use std::collections::HashMap;

use caliper_types::{Solid, EPS_COINCIDENT, UNKNOWN_FACE};
use mesh_kernel::IndexedMesh;

use crate::types::OpError;

/// Flatten a solid to a unique-vertex indexed mesh suitable for the
/// boolean kernel.
pub fn solid_to_mesh(solid: &Solid) -> Result<IndexedMesh, OpError> {
    let quantize = |p: [f64; 3]| {
        (
            (p[0] / EPS_COINCIDENT).round() as i64,
            (p[1] / EPS_COINCIDENT).round() as i64,
            (p[2] / EPS_COINCIDENT).round() as i64,
        )
    };
    let mut index: HashMap<(i64, i64, i64), u32> = HashMap::new();
    let mut mesh = IndexedMesh::default();

    for t in &solid.triangles {
        let mut idx = [0u32; 3];
        for (k, p) in [t.a, t.b, t.c].into_iter().enumerate() {
            let key = quantize(p);
            idx[k] = *index.entry(key).or_insert_with(|| {
                mesh.positions.push(p);
                (mesh.positions.len() - 1) as u32
            });
        }
        if idx[0] != idx[1] && idx[1] != idx[2] && idx[0] != idx[2] {
            mesh.indices.push(idx);
        }
    }

    if mesh.indices.is_empty() {
        return Err(OpError::InvalidGeometry {
            reason: "solid has no usable triangles".into(),
        });
    }
    if mesh.signed_volume() < 0.0 {
        mesh.reverse_winding();
    }
    Ok(mesh)
}

/// Re-import a kernel mesh as a solid. Face grouping is lost across a
/// boolean, so triangles come back with the unknown face id.
pub fn mesh_to_solid(mesh: &IndexedMesh) -> Solid {
    let mut solid = Solid::new();
    for t in &mesh.indices {
        solid.push_triangle(
            mesh.positions[t[0] as usize],
            mesh.positions[t[1] as usize],
            mesh.positions[t[2] as usize],
            UNKNOWN_FACE,
        );
    }
    solid
}

#[cfg(test)]
mod tests {
    use super::*;
    use caliper_types::SketchPlane;
    use sketch_solver::first_closed_profile;

    use crate::extrude::extrude_profile;
    use crate::types::ExtrudeDirection;

    fn box_solid() -> Solid {
        let mut s = caliper_types::Sketch::new("t", SketchPlane::xy());
        let p0 = s.add_point(0.0, 0.0, false);
        let p1 = s.add_point(2.0, 0.0, false);
        let p2 = s.add_point(2.0, 1.0, false);
        let p3 = s.add_point(0.0, 1.0, false);
        s.add_line(p0, p1).unwrap();
        s.add_line(p1, p2).unwrap();
        s.add_line(p2, p3).unwrap();
        s.add_line(p3, p0).unwrap();
        let profile = first_closed_profile(&s).unwrap();
        extrude_profile(&s, &profile, 1.0, ExtrudeDirection::Forward).unwrap()
    }

    #[test]
    fn test_round_trip_preserves_volume() {
        let solid = box_solid();
        let mesh = solid_to_mesh(&solid).unwrap();
        assert!(mesh.is_watertight());
        assert_eq!(mesh.positions.len(), 8);
        assert_eq!(mesh.indices.len(), 12);
        let back = mesh_to_solid(&mesh);
        assert!((back.signed_volume() - solid.signed_volume()).abs() < 1e-9);
        assert!(back.triangles.iter().all(|t| t.face_id == UNKNOWN_FACE));
    }

    #[test]
    fn test_winding_fixed_on_export() {
        let mut solid = box_solid();
        solid.reverse_winding();
        assert!(solid.signed_volume() < 0.0);
        let mesh = solid_to_mesh(&solid).unwrap();
        assert!(mesh.signed_volume() > 0.0, "negative winding corrected");
    }

    #[test]
    fn test_reimported_normals_match_winding() {
        let solid = box_solid();
        let mesh = solid_to_mesh(&solid).unwrap();
        let back = mesh_to_solid(&mesh);
        for t in &back.triangles {
            let n = caliper_types::math::cross(
                caliper_types::math::sub(t.b, t.a),
                caliper_types::math::sub(t.c, t.a),
            );
            let n = caliper_types::math::normalize(n).unwrap();
            assert!(caliper_types::math::dot(n, t.normal) > 0.999);
        }
    }
}

//! Ray construction and face picking.

use caliper_types::{math, Solid};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: [f64; 3],
    pub direction: [f64; 3],
}

/// Build a world-space ray from normalized device coordinates and the
/// inverse of the combined view-projection matrix (row-major).
///
/// Unprojects the near- and far-plane points and aims from one to the
/// other. Returns None for a degenerate matrix.
pub fn ray_through_ndc(inv_view_proj: &[[f64; 4]; 4], ndc_x: f64, ndc_y: f64) -> Option<Ray> {
    let near = unproject(inv_view_proj, [ndc_x, ndc_y, -1.0, 1.0])?;
    let far = unproject(inv_view_proj, [ndc_x, ndc_y, 1.0, 1.0])?;
    let direction = math::normalize(math::sub(far, near))?;
    Some(Ray {
        origin: near,
        direction,
    })
}

fn unproject(m: &[[f64; 4]; 4], v: [f64; 4]) -> Option<[f64; 3]> {
    let mut out = [0.0; 4];
    for (i, row) in m.iter().enumerate() {
        out[i] = row[0] * v[0] + row[1] * v[1] + row[2] * v[2] + row[3] * v[3];
    }
    if out[3].abs() < 1e-12 {
        return None;
    }
    Some([out[0] / out[3], out[1] / out[3], out[2] / out[3]])
}

/// Parameter t where the ray meets the plane, or None when parallel or
/// behind the origin.
pub fn ray_plane(ray: &Ray, plane_origin: [f64; 3], plane_normal: [f64; 3]) -> Option<f64> {
    let denom = math::dot(ray.direction, plane_normal);
    if denom.abs() < 1e-12 {
        return None;
    }
    let t = math::dot(math::sub(plane_origin, ray.origin), plane_normal) / denom;
    (t > 1e-9).then_some(t)
}

/// Point-in-polygon for a planar 3D polygon: project onto the two axes
/// that exclude the normal's dominant component, then run the standard
/// crossing test.
pub fn point_in_polygon(point: [f64; 3], polygon: &[[f64; 3]], normal: [f64; 3]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let drop = if normal[0].abs() >= normal[1].abs() && normal[0].abs() >= normal[2].abs() {
        0
    } else if normal[1].abs() >= normal[2].abs() {
        1
    } else {
        2
    };
    let (u, v) = match drop {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    };

    let px = point[u];
    let py = point[v];
    let mut inside = false;
    let n = polygon.len();
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (polygon[i][u], polygon[i][v]);
        let (xj, yj) = (polygon[j][u], polygon[j][v]);
        if ((yi > py) != (yj > py)) && (px < (xj - xi) * (py - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Pick the nearest face of a solid hit by the ray: intersect each face's
/// carrier plane, test the hit against the face polygon, keep the
/// smallest t. Returns the face index and the hit parameter.
pub fn pick_face(solid: &Solid, ray: &Ray) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (index, face) in solid.faces.iter().enumerate() {
        if face.polygon.len() < 3 {
            continue;
        }
        let Some(t) = ray_plane(ray, face.center, face.normal) else {
            continue;
        };
        let hit = math::add(ray.origin, math::scale(ray.direction, t));
        if !point_in_polygon(hit, &face.polygon, face.normal) {
            continue;
        }
        if best.map(|(_, bt)| t < bt).unwrap_or(true) {
            best = Some((index, t));
        }
    }
    best
}

//! Triangle-soup solids with per-face grouping.
//!
//! Triangles carry their own positions and normal plus a `face_id`
//! (-1 when unknown, e.g. after a mesh boolean). Faces carry a name, a
//! center, an outward normal, and the ordered polygon used for picking and
//! sketch-on-face.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::math;
use crate::EPS_COINCIDENT;

/// Face id for triangles whose logical face is unknown.
pub const UNKNOWN_FACE: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    pub a: [f64; 3],
    pub b: [f64; 3],
    pub c: [f64; 3],
    pub normal: [f64; 3],
    pub face_id: i32,
}

/// A logical planar face of a solid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolidFace {
    pub name: String,
    pub center: [f64; 3],
    pub normal: [f64; 3],
    /// Ordered polygon outline, counterclockwise around `normal`.
    pub polygon: Vec<[f64; 3]>,
}

/// Flat render buffers for the UI collaborator. Rebuilt per frame from a
/// solid; never stored across frames.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderMesh {
    /// Flat vertex positions [x0, y0, z0, x1, ...].
    pub vertices: Vec<f32>,
    /// Flat per-vertex normals, parallel to `vertices`.
    pub normals: Vec<f32>,
    /// Triangle indices into the vertex array.
    pub indices: Vec<u32>,
    /// Contiguous triangle ranges per logical face.
    pub face_ranges: Vec<FaceRange>,
}

/// Maps a contiguous range of triangle indices to a logical face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRange {
    pub face_id: i32,
    pub start_index: u32,
    pub end_index: u32,
}

/// A triangle-soup solid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Solid {
    /// Unique vertex positions, deduplicated to the coincidence epsilon.
    pub vertices: Vec<[f64; 3]>,
    pub triangles: Vec<Triangle>,
    pub faces: Vec<SolidFace>,
}

fn quantize(p: [f64; 3]) -> (i64, i64, i64) {
    let q = |v: f64| (v / EPS_COINCIDENT).round() as i64;
    (q(p[0]), q(p[1]), q(p[2]))
}

impl Solid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a triangle, computing its normal from the winding and
    /// registering any new unique vertices.
    pub fn push_triangle(&mut self, a: [f64; 3], b: [f64; 3], c: [f64; 3], face_id: i32) {
        let n = math::normalize(math::cross(math::sub(b, a), math::sub(c, a)))
            .unwrap_or([0.0, 0.0, 1.0]);
        self.push_triangle_with_normal(a, b, c, n, face_id);
    }

    pub fn push_triangle_with_normal(
        &mut self,
        a: [f64; 3],
        b: [f64; 3],
        c: [f64; 3],
        normal: [f64; 3],
        face_id: i32,
    ) {
        for p in [a, b, c] {
            if !self
                .vertices
                .iter()
                .any(|v| math::distance(*v, p) < EPS_COINCIDENT)
            {
                self.vertices.push(p);
            }
        }
        self.triangles.push(Triangle {
            a,
            b,
            c,
            normal,
            face_id,
        });
    }

    pub fn add_face(
        &mut self,
        name: impl Into<String>,
        center: [f64; 3],
        normal: [f64; 3],
        polygon: Vec<[f64; 3]>,
    ) -> i32 {
        self.faces.push(SolidFace {
            name: name.into(),
            center,
            normal,
            polygon,
        });
        self.faces.len() as i32 - 1
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Signed volume via the divergence theorem: Σ a · (b × c) / 6.
    /// Positive for outward-oriented closed meshes.
    pub fn signed_volume(&self) -> f64 {
        self.triangles
            .iter()
            .map(|t| math::dot(t.a, math::cross(t.b, t.c)) / 6.0)
            .sum()
    }

    /// Flip every triangle's winding and normal.
    pub fn reverse_winding(&mut self) {
        for t in &mut self.triangles {
            std::mem::swap(&mut t.b, &mut t.c);
            t.normal = math::scale(t.normal, -1.0);
        }
        for f in &mut self.faces {
            f.normal = math::scale(f.normal, -1.0);
            f.polygon.reverse();
        }
    }

    /// Recompute each triangle's normal from its winding.
    pub fn recompute_normals(&mut self) {
        for t in &mut self.triangles {
            t.normal = math::normalize(math::cross(math::sub(t.b, t.a), math::sub(t.c, t.a)))
                .unwrap_or([0.0, 0.0, 1.0]);
        }
    }

    pub fn bounding_box(&self) -> Option<([f64; 3], [f64; 3])> {
        if self.vertices.is_empty() {
            return None;
        }
        let mut min = [f64::INFINITY; 3];
        let mut max = [f64::NEG_INFINITY; 3];
        for v in &self.vertices {
            for k in 0..3 {
                min[k] = min[k].min(v[k]);
                max[k] = max[k].max(v[k]);
            }
        }
        Some((min, max))
    }

    /// Extract wireframe segments: edges whose adjacent triangles belong to
    /// differing faces, deduplicated.
    pub fn to_wireframe(&self) -> Vec<[[f64; 3]; 2]> {
        // Undirected edge key -> (one representative segment, face ids seen)
        let mut edges: HashMap<((i64, i64, i64), (i64, i64, i64)), ([[f64; 3]; 2], Vec<i32>)> =
            HashMap::new();
        for t in &self.triangles {
            for (p, q) in [(t.a, t.b), (t.b, t.c), (t.c, t.a)] {
                let (kp, kq) = (quantize(p), quantize(q));
                let key = if kp <= kq { (kp, kq) } else { (kq, kp) };
                let entry = edges.entry(key).or_insert(([p, q], Vec::new()));
                if !entry.1.contains(&t.face_id) {
                    entry.1.push(t.face_id);
                }
            }
        }
        edges
            .into_values()
            .filter(|(_, faces)| faces.len() > 1)
            .map(|(seg, _)| seg)
            .collect()
    }

    /// Build flat render buffers, one face range per face id in order of
    /// first appearance.
    pub fn render_mesh(&self) -> RenderMesh {
        let mut order: Vec<i32> = Vec::new();
        for t in &self.triangles {
            if !order.contains(&t.face_id) {
                order.push(t.face_id);
            }
        }

        let mut mesh = RenderMesh::default();
        for face_id in order {
            let start_index = mesh.indices.len() as u32;
            for t in self.triangles.iter().filter(|t| t.face_id == face_id) {
                let base = (mesh.vertices.len() / 3) as u32;
                for p in [t.a, t.b, t.c] {
                    mesh.vertices
                        .extend_from_slice(&[p[0] as f32, p[1] as f32, p[2] as f32]);
                    mesh.normals.extend_from_slice(&[
                        t.normal[0] as f32,
                        t.normal[1] as f32,
                        t.normal[2] as f32,
                    ]);
                }
                mesh.indices.extend_from_slice(&[base, base + 1, base + 2]);
            }
            mesh.face_ranges.push(FaceRange {
                face_id,
                start_index,
                end_index: mesh.indices.len() as u32,
            });
        }
        mesh
    }
}

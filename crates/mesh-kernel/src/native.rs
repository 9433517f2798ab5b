//! NativeBoolean: the in-process boolean backend.
//!
//! Three tiers, cheapest first:
//! 1. Disjoint bounding boxes: difference returns the base, union
//!    concatenates, intersection is degenerate.
//! 2. Two axis-aligned boxes: exact rectilinear grid decomposition. The
//!    grid is built from the unique face coordinates of both boxes, cells
//!    are classified by their centers, and boundary quads are emitted
//!    wherever an in-cell meets an out-cell.
//! 3. General meshes: whole-triangle classification by centroid parity
//!    voting. Exact when no triangle straddles the other solid's boundary;
//!    triangles that do straddle are kept or dropped whole, which leaves a
//!    seam the external kernel would resolve by splitting.

use std::collections::HashMap;

use caliper_types::{math, EPS_COINCIDENT, EPS_VOLUME};

use crate::traits::MeshBoolean;
use crate::types::{IndexedMesh, KernelError, MeshHandle, MeshStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoolOp {
    Union,
    Intersection,
    Difference,
}

/// In-process implementation of [`MeshBoolean`].
#[derive(Debug, Default)]
pub struct NativeBoolean {
    next_handle: u64,
    meshes: HashMap<u64, IndexedMesh>,
}

impl NativeBoolean {
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            meshes: HashMap::new(),
        }
    }

    fn get(&self, handle: &MeshHandle) -> Result<&IndexedMesh, KernelError> {
        self.meshes
            .get(&handle.id())
            .ok_or(KernelError::HandleNotFound { id: handle.id() })
    }

    fn store(&mut self, mesh: IndexedMesh) -> MeshHandle {
        let handle = MeshHandle(self.next_handle);
        self.next_handle += 1;
        self.meshes.insert(handle.id(), mesh);
        handle
    }

    fn boolean(
        &mut self,
        a: &MeshHandle,
        b: &MeshHandle,
        op: BoolOp,
    ) -> Result<MeshHandle, KernelError> {
        let ma = self.get(a)?.clone();
        let mb = self.get(b)?.clone();
        let bb_a = ma.bounding_box().ok_or(KernelError::InvalidMesh {
            reason: "empty mesh".into(),
        })?;
        let bb_b = mb.bounding_box().ok_or(KernelError::InvalidMesh {
            reason: "empty mesh".into(),
        })?;

        if !boxes_overlap(bb_a, bb_b) {
            return match op {
                BoolOp::Difference => Ok(self.store(ma)),
                BoolOp::Union => Ok(self.store(concatenate(&ma, &mb))),
                BoolOp::Intersection => Err(KernelError::DegenerateResult),
            };
        }

        let result = if is_axis_aligned_box(&ma, bb_a) && is_axis_aligned_box(&mb, bb_b) {
            mesh_from_triangles(&aabb_grid_boolean(bb_a, bb_b, op))
        } else {
            tracing::debug!(?op, "general boolean path: whole-triangle classification");
            let mut tris: Vec<[[f64; 3]; 3]> = Vec::new();
            match op {
                BoolOp::Difference => {
                    collect_classified(&ma, &mb, false, false, &mut tris);
                    collect_classified(&mb, &ma, true, true, &mut tris);
                }
                BoolOp::Union => {
                    collect_classified(&ma, &mb, false, false, &mut tris);
                    collect_classified(&mb, &ma, false, false, &mut tris);
                }
                BoolOp::Intersection => {
                    collect_classified(&ma, &mb, true, false, &mut tris);
                    collect_classified(&mb, &ma, true, false, &mut tris);
                }
            }
            mesh_from_triangles(&tris)
        };

        if result.indices.is_empty() || result.signed_volume().abs() < EPS_VOLUME {
            return Err(KernelError::DegenerateResult);
        }
        Ok(self.store(result))
    }
}

impl MeshBoolean for NativeBoolean {
    fn wrap(&mut self, mesh: &IndexedMesh) -> Result<MeshHandle, KernelError> {
        if mesh.indices.is_empty() {
            return Err(KernelError::InvalidMesh {
                reason: "mesh has no triangles".into(),
            });
        }
        if !mesh.indices_in_range() {
            return Err(KernelError::InvalidMesh {
                reason: "triangle index out of range".into(),
            });
        }
        if !mesh.is_watertight() {
            return Err(KernelError::InvalidMesh {
                reason: "mesh is not watertight".into(),
            });
        }
        let volume = mesh.signed_volume();
        if volume < -EPS_VOLUME {
            return Err(KernelError::NegativeVolume { volume });
        }
        if volume < EPS_VOLUME {
            return Err(KernelError::InvalidMesh {
                reason: format!("degenerate volume {volume}"),
            });
        }
        Ok(self.store(mesh.clone()))
    }

    fn status(&self, handle: &MeshHandle) -> Result<MeshStatus, KernelError> {
        let mesh = self.get(handle)?;
        Ok(MeshStatus {
            watertight: mesh.is_watertight(),
            volume: mesh.signed_volume(),
            vertex_count: mesh.positions.len(),
            triangle_count: mesh.indices.len(),
        })
    }

    fn difference(
        &mut self,
        a: &MeshHandle,
        b: &MeshHandle,
    ) -> Result<MeshHandle, KernelError> {
        self.boolean(a, b, BoolOp::Difference)
    }

    fn union(&mut self, a: &MeshHandle, b: &MeshHandle) -> Result<MeshHandle, KernelError> {
        self.boolean(a, b, BoolOp::Union)
    }

    fn intersection(
        &mut self,
        a: &MeshHandle,
        b: &MeshHandle,
    ) -> Result<MeshHandle, KernelError> {
        self.boolean(a, b, BoolOp::Intersection)
    }

    fn extract(&self, handle: &MeshHandle) -> Result<IndexedMesh, KernelError> {
        self.get(handle).cloned()
    }

    fn release(&mut self, handle: MeshHandle) {
        self.meshes.remove(&handle.id());
    }
}

type Box3 = ([f64; 3], [f64; 3]);

fn boxes_overlap(a: Box3, b: Box3) -> bool {
    (0..3).all(|k| a.0[k] <= b.1[k] && b.0[k] <= a.1[k])
}

/// True when every vertex sits on a corner of the bounding box and all
/// eight corners are present.
fn is_axis_aligned_box(mesh: &IndexedMesh, (min, max): Box3) -> bool {
    let tol = 1e-9;
    let on_corner = |p: &[f64; 3]| {
        (0..3).all(|k| (p[k] - min[k]).abs() < tol || (p[k] - max[k]).abs() < tol)
    };
    if !mesh.positions.iter().all(on_corner) {
        return false;
    }
    for corner in 0..8u32 {
        let c = [
            if corner & 1 == 0 { min[0] } else { max[0] },
            if corner & 2 == 0 { min[1] } else { max[1] },
            if corner & 4 == 0 { min[2] } else { max[2] },
        ];
        if !mesh
            .positions
            .iter()
            .any(|p| math::distance(*p, c) < tol)
        {
            return false;
        }
    }
    true
}

fn concatenate(a: &IndexedMesh, b: &IndexedMesh) -> IndexedMesh {
    let mut out = a.clone();
    let base = out.positions.len() as u32;
    out.positions.extend_from_slice(&b.positions);
    out.indices
        .extend(b.indices.iter().map(|t| [t[0] + base, t[1] + base, t[2] + base]));
    out
}

fn sorted_unique(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    v.dedup_by(|a, b| (*a - *b).abs() < 1e-12);
    v
}

fn point_strictly_in_box(p: [f64; 3], (min, max): Box3) -> bool {
    (0..3).all(|k| p[k] > min[k] + 1e-9 && p[k] < max[k] - 1e-9)
}

/// Exact boolean of two axis-aligned boxes via grid decomposition.
fn aabb_grid_boolean(bb_a: Box3, bb_b: Box3, op: BoolOp) -> Vec<[[f64; 3]; 3]> {
    let coords: [Vec<f64>; 3] = [
        sorted_unique(&[bb_a.0[0], bb_a.1[0], bb_b.0[0], bb_b.1[0]]),
        sorted_unique(&[bb_a.0[1], bb_a.1[1], bb_b.0[1], bb_b.1[1]]),
        sorted_unique(&[bb_a.0[2], bb_a.1[2], bb_b.0[2], bb_b.1[2]]),
    ];

    let cell_in = |ci: [usize; 3]| -> bool {
        let center = [
            (coords[0][ci[0]] + coords[0][ci[0] + 1]) / 2.0,
            (coords[1][ci[1]] + coords[1][ci[1] + 1]) / 2.0,
            (coords[2][ci[2]] + coords[2][ci[2] + 1]) / 2.0,
        ];
        let in_a = point_strictly_in_box(center, bb_a);
        let in_b = point_strictly_in_box(center, bb_b);
        match op {
            BoolOp::Union => in_a || in_b,
            BoolOp::Intersection => in_a && in_b,
            BoolOp::Difference => in_a && !in_b,
        }
    };

    let mut tris = Vec::new();

    // For each axis, walk every grid plane and emit a boundary quad where
    // an in-cell meets an out-cell. With u = axis+1 and v = axis+2
    // (cyclic), CCW corners in the (u, v) plane give a +axis normal.
    for axis in 0..3 {
        let u = (axis + 1) % 3;
        let v = (axis + 2) % 3;
        let planes = coords[axis].len();
        let nu = coords[u].len() - 1;
        let nv = coords[v].len() - 1;

        for pi in 0..planes {
            for ui in 0..nu {
                for vi in 0..nv {
                    let mut cell = [0usize; 3];
                    cell[u] = ui;
                    cell[v] = vi;

                    let below = if pi > 0 {
                        cell[axis] = pi - 1;
                        cell_in(cell)
                    } else {
                        false
                    };
                    let above = if pi + 1 < planes {
                        cell[axis] = pi;
                        cell_in(cell)
                    } else {
                        false
                    };
                    if below == above {
                        continue;
                    }

                    let w = coords[axis][pi];
                    let (u0, u1) = (coords[u][ui], coords[u][ui + 1]);
                    let (v0, v1) = (coords[v][vi], coords[v][vi + 1]);
                    let corner = |cu: f64, cv: f64| {
                        let mut p = [0.0; 3];
                        p[axis] = w;
                        p[u] = cu;
                        p[v] = cv;
                        p
                    };
                    let quad = [
                        corner(u0, v0),
                        corner(u1, v0),
                        corner(u1, v1),
                        corner(u0, v1),
                    ];
                    if below {
                        // Solid below the plane: outward normal is +axis.
                        tris.push([quad[0], quad[1], quad[2]]);
                        tris.push([quad[0], quad[2], quad[3]]);
                    } else {
                        tris.push([quad[0], quad[2], quad[1]]);
                        tris.push([quad[0], quad[3], quad[2]]);
                    }
                }
            }
        }
    }
    tris
}

/// Append `source` triangles whose centroids classify as inside (or
/// outside) `against`, optionally reversed.
fn collect_classified(
    source: &IndexedMesh,
    against: &IndexedMesh,
    keep_inside: bool,
    reverse: bool,
    out: &mut Vec<[[f64; 3]; 3]>,
) {
    for t in &source.indices {
        let a = source.positions[t[0] as usize];
        let b = source.positions[t[1] as usize];
        let c = source.positions[t[2] as usize];
        let centroid = [
            (a[0] + b[0] + c[0]) / 3.0,
            (a[1] + b[1] + c[1]) / 3.0,
            (a[2] + b[2] + c[2]) / 3.0,
        ];
        if point_inside_mesh(against, centroid) == keep_inside {
            if reverse {
                out.push([a, c, b]);
            } else {
                out.push([a, b, c]);
            }
        }
    }
}

/// Parity-vote point-in-mesh test: casts several rays and takes the
/// majority of odd-crossing verdicts.
fn point_inside_mesh(mesh: &IndexedMesh, point: [f64; 3]) -> bool {
    let dirs: [[f64; 3]; 5] = [
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        math::normalize([1.0, 1.0, 1.0]).unwrap_or([1.0, 0.0, 0.0]),
        math::normalize([-1.0, 0.5, 0.3]).unwrap_or([0.0, 1.0, 0.0]),
    ];
    let mut inside_votes = 0;
    for dir in dirs {
        let mut crossings = 0;
        for t in &mesh.indices {
            let a = mesh.positions[t[0] as usize];
            let b = mesh.positions[t[1] as usize];
            let c = mesh.positions[t[2] as usize];
            if ray_triangle(point, dir, a, b, c).is_some() {
                crossings += 1;
            }
        }
        if crossings % 2 == 1 {
            inside_votes += 1;
        }
    }
    inside_votes > dirs.len() / 2
}

/// Möller-Trumbore ray/triangle intersection; returns t for hits strictly
/// in front of the origin.
fn ray_triangle(
    orig: [f64; 3],
    dir: [f64; 3],
    a: [f64; 3],
    b: [f64; 3],
    c: [f64; 3],
) -> Option<f64> {
    let edge1 = math::sub(b, a);
    let edge2 = math::sub(c, a);
    let h = math::cross(dir, edge2);
    let det = math::dot(edge1, h);
    if det.abs() < 1e-12 {
        return None;
    }
    let inv = 1.0 / det;
    let s = math::sub(orig, a);
    let u = math::dot(s, h) * inv;
    if !(-1e-9..=1.0 + 1e-9).contains(&u) {
        return None;
    }
    let q = math::cross(s, edge1);
    let v = math::dot(dir, q) * inv;
    if v < -1e-9 || u + v > 1.0 + 1e-9 {
        return None;
    }
    let t = math::dot(edge2, q) * inv;
    (t > 1e-9).then_some(t)
}

/// Build an indexed mesh from loose triangles, welding vertices to the
/// coincidence epsilon and dropping degenerate triangles.
fn mesh_from_triangles(tris: &[[[f64; 3]; 3]]) -> IndexedMesh {
    let quantize = |p: [f64; 3]| {
        (
            (p[0] / EPS_COINCIDENT).round() as i64,
            (p[1] / EPS_COINCIDENT).round() as i64,
            (p[2] / EPS_COINCIDENT).round() as i64,
        )
    };
    let mut index: HashMap<(i64, i64, i64), u32> = HashMap::new();
    let mut mesh = IndexedMesh::default();
    for t in tris {
        let mut idx = [0u32; 3];
        for (k, p) in t.iter().enumerate() {
            let key = quantize(*p);
            idx[k] = *index.entry(key).or_insert_with(|| {
                mesh.positions.push(*p);
                (mesh.positions.len() - 1) as u32
            });
        }
        if idx[0] != idx[1] && idx[1] != idx[2] && idx[0] != idx[2] {
            mesh.indices.push(idx);
        }
    }
    mesh
}

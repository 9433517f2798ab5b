//! Kernel-facing mesh types: indexed meshes, opaque handles, and errors.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use caliper_types::math;

/// Opaque handle to a mesh held by a kernel. Handles are exclusive owners:
/// not cloneable, never persisted, and must be released explicitly.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub(crate) u64);

impl MeshHandle {
    pub(crate) fn id(&self) -> u64 {
        self.0
    }
}

/// Health report for a wrapped mesh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshStatus {
    pub watertight: bool,
    pub volume: f64,
    pub vertex_count: usize,
    pub triangle_count: usize,
}

/// Errors from mesh-kernel operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum KernelError {
    #[error("invalid mesh: {reason}")]
    InvalidMesh { reason: String },

    #[error("mesh has negative volume ({volume}); fix the winding before wrapping")]
    NegativeVolume { volume: f64 },

    #[error("boolean operation failed: {reason}")]
    BooleanFailed { reason: String },

    #[error("boolean result is degenerate (zero volume)")]
    DegenerateResult,

    #[error("handle {id} not found in this kernel session")]
    HandleNotFound { id: u64 },
}

/// A unique-vertex triangle mesh, the wire format between the core and the
/// boolean kernel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexedMesh {
    pub positions: Vec<[f64; 3]>,
    pub indices: Vec<[u32; 3]>,
}

impl IndexedMesh {
    /// Signed volume via the divergence theorem; positive for outward
    /// orientation.
    pub fn signed_volume(&self) -> f64 {
        self.indices
            .iter()
            .map(|t| {
                let a = self.positions[t[0] as usize];
                let b = self.positions[t[1] as usize];
                let c = self.positions[t[2] as usize];
                math::dot(a, math::cross(b, c)) / 6.0
            })
            .sum()
    }

    /// Watertight and consistently oriented: every directed edge appears
    /// exactly once and its reverse exists.
    pub fn is_watertight(&self) -> bool {
        let mut directed: HashMap<(u32, u32), usize> = HashMap::new();
        for t in &self.indices {
            for (a, b) in [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])] {
                *directed.entry((a, b)).or_default() += 1;
            }
        }
        directed
            .iter()
            .all(|(&(a, b), &n)| n == 1 && directed.get(&(b, a)) == Some(&1))
    }

    /// All triangle indices resolve in the position table.
    pub fn indices_in_range(&self) -> bool {
        let n = self.positions.len() as u32;
        self.indices.iter().all(|t| t.iter().all(|&i| i < n))
    }

    pub fn bounding_box(&self) -> Option<([f64; 3], [f64; 3])> {
        if self.positions.is_empty() {
            return None;
        }
        let mut min = [f64::INFINITY; 3];
        let mut max = [f64::NEG_INFINITY; 3];
        for p in &self.positions {
            for k in 0..3 {
                min[k] = min[k].min(p[k]);
                max[k] = max[k].max(p[k]);
            }
        }
        Some((min, max))
    }

    /// Reverse every triangle's winding in place.
    pub fn reverse_winding(&mut self) {
        for t in &mut self.indices {
            t.swap(1, 2);
        }
    }

    /// An axis-aligned unit-interval box mesh from `min` to `max`.
    pub fn axis_aligned_box(min: [f64; 3], max: [f64; 3]) -> Self {
        let [x0, y0, z0] = min;
        let [x1, y1, z1] = max;
        let positions = vec![
            [x0, y0, z0],
            [x1, y0, z0],
            [x1, y1, z0],
            [x0, y1, z0],
            [x0, y0, z1],
            [x1, y0, z1],
            [x1, y1, z1],
            [x0, y1, z1],
        ];
        // Outward winding per face.
        let indices = vec![
            [0, 3, 2],
            [0, 2, 1], // bottom, -Z
            [4, 5, 6],
            [4, 6, 7], // top, +Z
            [0, 1, 5],
            [0, 5, 4], // front, -Y
            [2, 3, 7],
            [2, 7, 6], // back, +Y
            [0, 4, 7],
            [0, 7, 3], // left, -X
            [1, 2, 6],
            [1, 6, 5], // right, +X
        ];
        Self { positions, indices }
    }
}

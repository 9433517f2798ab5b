//! Sketch planes: an origin plus an orthonormal frame, with the bijective
//! map between 2D sketch coordinates and 3D world coordinates.

use serde::{Deserialize, Serialize};

use crate::math;

/// The plane a sketch lives on.
///
/// `x_axis` and `y_axis` span the plane; `normal` is their cross product.
/// The frame is kept orthonormal by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SketchPlane {
    pub origin: [f64; 3],
    pub normal: [f64; 3],
    pub x_axis: [f64; 3],
    pub y_axis: [f64; 3],
}

impl SketchPlane {
    /// The world XY plane (normal +Z).
    pub fn xy() -> Self {
        Self {
            origin: [0.0, 0.0, 0.0],
            normal: [0.0, 0.0, 1.0],
            x_axis: [1.0, 0.0, 0.0],
            y_axis: [0.0, 1.0, 0.0],
        }
    }

    /// The world XZ plane (normal -Y, so sketch +x maps to world +x).
    pub fn xz() -> Self {
        Self {
            origin: [0.0, 0.0, 0.0],
            normal: [0.0, -1.0, 0.0],
            x_axis: [1.0, 0.0, 0.0],
            y_axis: [0.0, 0.0, 1.0],
        }
    }

    /// The world YZ plane (normal +X).
    pub fn yz() -> Self {
        Self {
            origin: [0.0, 0.0, 0.0],
            normal: [1.0, 0.0, 0.0],
            x_axis: [0.0, 1.0, 0.0],
            y_axis: [0.0, 0.0, 1.0],
        }
    }

    /// Build a plane from an origin, a normal, and a preferred x direction.
    ///
    /// The x direction is re-orthogonalized against the normal; returns
    /// `None` when the normal is degenerate or parallel to the x hint.
    pub fn from_frame(origin: [f64; 3], normal: [f64; 3], x_hint: [f64; 3]) -> Option<Self> {
        let n = math::normalize(normal)?;
        let x_proj = math::sub(x_hint, math::scale(n, math::dot(x_hint, n)));
        let x = math::normalize(x_proj)?;
        let y = math::cross(n, x);
        Some(Self {
            origin,
            normal: n,
            x_axis: x,
            y_axis: y,
        })
    }

    /// Build a plane sitting on a face: origin at the face center, normal
    /// along the face normal, x axis chosen automatically.
    pub fn on_face(center: [f64; 3], normal: [f64; 3]) -> Option<Self> {
        let n = math::normalize(normal)?;
        let (x, y) = math::tangent_vectors(n);
        Some(Self {
            origin: center,
            normal: n,
            x_axis: x,
            y_axis: y,
        })
    }

    /// Map 2D sketch coordinates to a 3D world point.
    pub fn to_world(&self, u: f64, v: f64) -> [f64; 3] {
        [
            self.origin[0] + u * self.x_axis[0] + v * self.y_axis[0],
            self.origin[1] + u * self.x_axis[1] + v * self.y_axis[1],
            self.origin[2] + u * self.x_axis[2] + v * self.y_axis[2],
        ]
    }

    /// Map a 3D world point to 2D sketch coordinates (projection onto the plane).
    pub fn to_plane(&self, p: [f64; 3]) -> (f64, f64) {
        let d = math::sub(p, self.origin);
        (math::dot(d, self.x_axis), math::dot(d, self.y_axis))
    }

    /// Check the frame invariant: unit axes, mutually orthogonal, normal = x × y.
    pub fn is_orthonormal(&self) -> bool {
        let tol = 1e-9;
        (math::length(self.x_axis) - 1.0).abs() < tol
            && (math::length(self.y_axis) - 1.0).abs() < tol
            && (math::length(self.normal) - 1.0).abs() < tol
            && math::dot(self.x_axis, self.y_axis).abs() < tol
            && math::dot(self.x_axis, self.normal).abs() < tol
            && math::dot(self.y_axis, self.normal).abs() < tol
    }
}

impl Default for SketchPlane {
    fn default() -> Self {
        Self::xy()
    }
}

//! Shared parameter types and the modeling-operation error.

use serde::{Deserialize, Serialize};

/// Which way an extrusion (or cut tool) grows from its sketch plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExtrudeDirection {
    /// Along the plane normal.
    #[default]
    Forward,
    /// Against the plane normal.
    Backward,
    /// Half the depth to each side of the plane.
    Symmetric,
}

/// The revolution axis, expressed in sketch coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RevolveAxis {
    /// The sketch's local x axis.
    SketchX,
    /// The sketch's local y axis.
    SketchY,
    /// An arbitrary axis line in the sketch plane.
    Custom {
        origin: [f64; 2],
        direction: [f64; 2],
    },
}

impl RevolveAxis {
    /// Axis origin and unit direction in sketch coordinates, or None for a
    /// degenerate custom direction.
    pub fn line(&self) -> Option<([f64; 2], [f64; 2])> {
        match *self {
            RevolveAxis::SketchX => Some(([0.0, 0.0], [1.0, 0.0])),
            RevolveAxis::SketchY => Some(([0.0, 0.0], [0.0, 1.0])),
            RevolveAxis::Custom { origin, direction } => {
                let len = (direction[0] * direction[0] + direction[1] * direction[1]).sqrt();
                if len < 1e-12 {
                    None
                } else {
                    Some((origin, [direction[0] / len, direction[1] / len]))
                }
            }
        }
    }
}

/// Errors from modeling operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OpError {
    #[error("no closed profile available")]
    ProfileNotClosed,

    #[error("invalid geometry: {reason}")]
    InvalidGeometry { reason: String },

    #[error("id {id} does not resolve in the sketch")]
    InvalidReference { id: u32 },

    #[error("kernel failure: {0}")]
    Kernel(#[from] mesh_kernel::KernelError),
}

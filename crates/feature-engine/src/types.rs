//! Feature nodes and the engine error type.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use caliper_types::{Sketch, Solid};
use modeling_ops::{ExtrudeDirection, OpError, RevolveAxis};

/// Parameters for an extrude feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtrudeParams {
    pub depth: f64,
    pub direction: ExtrudeDirection,
}

/// Parameters for a revolve feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RevolveParams {
    pub angle_degrees: f64,
    pub segments: usize,
    pub axis: RevolveAxis,
}

/// Parameters for a cut feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CutParams {
    pub depth: f64,
    pub direction: ExtrudeDirection,
}

/// The modeling operation a feature performs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Operation {
    /// Owns its sketch; produces no solid.
    Sketch { sketch: Sketch },
    Extrude {
        sketch_id: Uuid,
        params: ExtrudeParams,
    },
    Revolve {
        sketch_id: Uuid,
        params: RevolveParams,
    },
    /// Subtracts an extruded tool profile from a base feature's solid.
    Cut {
        tool_sketch_id: Uuid,
        base_feature_id: Uuid,
        params: CutParams,
    },
}

/// Discriminant for counting and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureKind {
    Sketch,
    Extrude,
    Revolve,
    Cut,
}

impl Operation {
    pub fn kind(&self) -> FeatureKind {
        match self {
            Operation::Sketch { .. } => FeatureKind::Sketch,
            Operation::Extrude { .. } => FeatureKind::Extrude,
            Operation::Revolve { .. } => FeatureKind::Revolve,
            Operation::Cut { .. } => FeatureKind::Cut,
        }
    }

    /// Feature ids this operation consumes, in order.
    pub fn inputs(&self) -> Vec<Uuid> {
        match self {
            Operation::Sketch { .. } => Vec::new(),
            Operation::Extrude { sketch_id, .. } | Operation::Revolve { sketch_id, .. } => {
                vec![*sketch_id]
            }
            Operation::Cut {
                tool_sketch_id,
                base_feature_id,
                ..
            } => vec![*tool_sketch_id, *base_feature_id],
        }
    }
}

/// A node in the feature history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    pub id: Uuid,
    pub name: String,
    pub operation: Operation,
    pub enabled: bool,
    pub visible: bool,
    /// Set when an input (or a parameter) changed since the last rebuild.
    pub dirty: bool,
    /// Cached regeneration result for solid-producing kinds. Runtime-only.
    #[serde(skip)]
    pub solid: Option<Solid>,
}

impl Feature {
    pub fn new(name: impl Into<String>, operation: Operation) -> Self {
        let dirty = !matches!(operation, Operation::Sketch { .. });
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            operation,
            enabled: true,
            visible: true,
            dirty,
            solid: None,
        }
    }

    pub fn kind(&self) -> FeatureKind {
        self.operation.kind()
    }

    pub fn inputs(&self) -> Vec<Uuid> {
        self.operation.inputs()
    }

    pub fn produces_solid(&self) -> bool {
        !matches!(self.operation, Operation::Sketch { .. })
    }
}

/// Errors from the feature engine.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("feature not found: {id}")]
    FeatureNotFound { id: Uuid },

    #[error("feature {id} does not resolve to an earlier feature of the required kind")]
    InvalidReference { id: Uuid },

    #[error("feature {id} is not a sketch")]
    NotASketch { id: Uuid },

    #[error("cannot remove {id}: other features depend on it")]
    HasDependents { id: Uuid },

    #[error("regeneration of '{name}' failed: {reason}")]
    RegenerationFailed { name: String, reason: String },

    #[error("sketch error: {0}")]
    Sketch(#[from] caliper_types::SketchError),

    #[error("operation error: {0}")]
    Op(#[from] OpError),
}

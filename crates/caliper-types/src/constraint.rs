//! Sketch constraints: stable-id entries wrapping a kind payload.
//!
//! All payloads reference points and entities by id; no payload stores
//! geometry of its own except the fixed targets captured at creation time.

use serde::{Deserialize, Serialize};

/// Constraint payload. Point references are point ids, `line`/`circle`/
/// `entity` references are entity ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConstraintKind {
    /// Euclidean distance between two points.
    Distance { a: u32, b: u32, value: f64 },
    /// Signed X distance from `a` to `b`.
    DistanceX { a: u32, b: u32, value: f64 },
    /// Signed Y distance from `a` to `b`.
    DistanceY { a: u32, b: u32, value: f64 },
    Horizontal { line: u32 },
    Vertical { line: u32 },
    /// Angle between two lines, in degrees.
    Angle { line_a: u32, line_b: u32, degrees: f64 },
    Perpendicular { line_a: u32, line_b: u32 },
    Parallel { line_a: u32, line_b: u32 },
    Coincident { a: u32, b: u32 },
    /// Equal characteristic length: line lengths or circle/arc radii.
    Equal { entity_a: u32, entity_b: u32 },
    Tangent { line: u32, circle: u32 },
    PointOnLine { point: u32, line: u32 },
    PointOnCircle { point: u32, circle: u32 },
    /// Pins a point to the coordinates it had when the constraint was added.
    FixedPoint { point: u32, x: f64, y: f64 },
    /// Distance with a target frozen at creation time.
    FixedDistance { a: u32, b: u32, value: f64 },
    /// Angle with a target frozen at creation time, in degrees.
    FixedAngle { line_a: u32, line_b: u32, degrees: f64 },
    Radius { entity: u32, value: f64 },
    Diameter { entity: u32, value: f64 },
}

impl ConstraintKind {
    /// Point ids this payload references.
    pub fn referenced_points(&self) -> Vec<u32> {
        match *self {
            ConstraintKind::Distance { a, b, .. }
            | ConstraintKind::DistanceX { a, b, .. }
            | ConstraintKind::DistanceY { a, b, .. }
            | ConstraintKind::FixedDistance { a, b, .. }
            | ConstraintKind::Coincident { a, b } => vec![a, b],
            ConstraintKind::PointOnLine { point, .. }
            | ConstraintKind::PointOnCircle { point, .. }
            | ConstraintKind::FixedPoint { point, .. } => vec![point],
            _ => Vec::new(),
        }
    }

    /// Entity ids this payload references.
    pub fn referenced_entities(&self) -> Vec<u32> {
        match *self {
            ConstraintKind::Horizontal { line } | ConstraintKind::Vertical { line } => vec![line],
            ConstraintKind::Angle { line_a, line_b, .. }
            | ConstraintKind::FixedAngle { line_a, line_b, .. }
            | ConstraintKind::Perpendicular { line_a, line_b }
            | ConstraintKind::Parallel { line_a, line_b } => vec![line_a, line_b],
            ConstraintKind::Equal { entity_a, entity_b } => vec![entity_a, entity_b],
            ConstraintKind::Tangent { line, circle } => vec![line, circle],
            ConstraintKind::PointOnLine { line, .. } => vec![line],
            ConstraintKind::PointOnCircle { circle, .. } => vec![circle],
            ConstraintKind::Radius { entity, .. } | ConstraintKind::Diameter { entity, .. } => {
                vec![entity]
            }
            _ => Vec::new(),
        }
    }

    /// The dimension value, for kinds that carry one.
    pub fn value(&self) -> Option<f64> {
        match *self {
            ConstraintKind::Distance { value, .. }
            | ConstraintKind::DistanceX { value, .. }
            | ConstraintKind::DistanceY { value, .. }
            | ConstraintKind::FixedDistance { value, .. }
            | ConstraintKind::Radius { value, .. }
            | ConstraintKind::Diameter { value, .. } => Some(value),
            ConstraintKind::Angle { degrees, .. } | ConstraintKind::FixedAngle { degrees, .. } => {
                Some(degrees)
            }
            _ => None,
        }
    }

    /// Overwrite the dimension value. Returns false for non-dimensional kinds.
    pub fn set_value(&mut self, new_value: f64) -> bool {
        match self {
            ConstraintKind::Distance { value, .. }
            | ConstraintKind::DistanceX { value, .. }
            | ConstraintKind::DistanceY { value, .. }
            | ConstraintKind::FixedDistance { value, .. }
            | ConstraintKind::Radius { value, .. }
            | ConstraintKind::Diameter { value, .. } => {
                *value = new_value;
                true
            }
            ConstraintKind::Angle { degrees, .. } | ConstraintKind::FixedAngle { degrees, .. } => {
                *degrees = new_value;
                true
            }
            _ => false,
        }
    }

    /// Whether this kind renders as a dimension with a draggable label.
    pub fn is_dimensional(&self) -> bool {
        self.value().is_some()
    }

    /// Whether this payload references the given entity in a role that
    /// couples the entity's radius into the solve.
    pub fn couples_radius_of(&self, entity_id: u32) -> bool {
        match *self {
            ConstraintKind::Equal { entity_a, entity_b } => {
                entity_a == entity_id || entity_b == entity_id
            }
            ConstraintKind::Radius { entity, .. } | ConstraintKind::Diameter { entity, .. } => {
                entity == entity_id
            }
            ConstraintKind::Tangent { circle, .. }
            | ConstraintKind::PointOnCircle { circle, .. } => circle == entity_id,
            _ => false,
        }
    }
}

/// A constraint entry in a sketch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    /// Stable id, unique within the sketch.
    pub id: u32,
    /// Disabled constraints contribute nothing to the solve.
    pub enabled: bool,
    /// Reference dimensions (driving = false) are read-only measurements.
    pub driving: bool,
    /// Offset of the dimension label from its anchor, in sketch units.
    pub label_offset: [f64; 2],
    pub kind: ConstraintKind,
}

impl Constraint {
    pub fn new(id: u32, kind: ConstraintKind) -> Self {
        Self {
            id,
            enabled: true,
            driving: true,
            label_offset: [0.0, 0.5],
            kind,
        }
    }

    /// A reference (non-driving) dimension.
    pub fn reference(id: u32, kind: ConstraintKind) -> Self {
        Self {
            driving: false,
            ..Self::new(id, kind)
        }
    }
}

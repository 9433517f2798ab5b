//! The sketch data model: points, entities, constraints, and the
//! transient tool state driven by the interaction layer.
//!
//! All mutable geometry lives on points; entities reference points by id so
//! constraints can be expressed uniformly on point coordinates. Ids are
//! monotonically increasing `u32`s and are never reused within a sketch.

use serde::{Deserialize, Serialize};

use crate::constraint::{Constraint, ConstraintKind};
use crate::plane::SketchPlane;
use crate::EPS_ZERO_LENGTH;

/// Ratio of cross-axis delta to length below which a freshly drawn line is
/// automatically constrained Horizontal or Vertical.
pub const AXIS_ALIGN_RATIO: f64 = 0.05;

/// Default pick radius for hover tests, in sketch units.
pub const DEFAULT_PICK_RADIUS: f64 = 0.1;

/// Default radius for snapping clicks onto existing points, in sketch units.
pub const DEFAULT_SNAP_RADIUS: f64 = 0.15;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SketchError {
    #[error("id {id} does not resolve in this sketch")]
    InvalidReference { id: u32 },
}

/// A sketch point with a stable id. `fixed` points are excluded from the
/// solver's free variables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SketchPoint {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub fixed: bool,
}

impl SketchPoint {
    pub fn pos(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

/// A geometric entity. Entities never store point coordinates directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SketchEntity {
    Line { id: u32, start: u32, end: u32 },
    Circle { id: u32, center: u32, radius: f64 },
    Arc { id: u32, center: u32, start: u32, end: u32 },
}

impl SketchEntity {
    pub fn id(&self) -> u32 {
        match *self {
            SketchEntity::Line { id, .. }
            | SketchEntity::Circle { id, .. }
            | SketchEntity::Arc { id, .. } => id,
        }
    }

    /// Point ids this entity references.
    pub fn referenced_points(&self) -> Vec<u32> {
        match *self {
            SketchEntity::Line { start, end, .. } => vec![start, end],
            SketchEntity::Circle { center, .. } => vec![center],
            SketchEntity::Arc {
                center, start, end, ..
            } => vec![center, start, end],
        }
    }
}

/// The active sketch tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ToolKind {
    #[default]
    Select,
    Line,
    Circle,
    Arc,
    Dimension,
}

/// What the cursor is currently over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HoverTarget {
    #[default]
    None,
    Point(u32),
    Line(u32),
    Circle(u32),
    Arc(u32),
    Constraint(u32),
    RadiusHandle(u32),
    LineEndpointHandle(u32),
}

/// Current selection. Independent of hover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    None,
    Point(u32),
    Entity(u32),
    Constraint(u32),
}

/// First pick of the smart dimension tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionTarget {
    Point(u32),
    Line(u32),
    Circle(u32),
    Arc(u32),
}

/// In-flight dimension label drag.
#[derive(Debug, Clone, Copy)]
struct DimensionDrag {
    constraint: u32,
    grab: [f64; 2],
    base_offset: [f64; 2],
}

fn default_pick_radius() -> f64 {
    DEFAULT_PICK_RADIUS
}

fn default_snap_radius() -> f64 {
    DEFAULT_SNAP_RADIUS
}

/// A 2D sketch on a plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sketch {
    pub name: String,
    pub plane: SketchPlane,
    pub points: Vec<SketchPoint>,
    pub entities: Vec<SketchEntity>,
    pub constraints: Vec<Constraint>,
    next_point_id: u32,
    next_entity_id: u32,
    next_constraint_id: u32,
    /// Hover pick radius in sketch units.
    #[serde(default = "default_pick_radius")]
    pub pick_radius: f64,
    /// Endpoint snap radius in sketch units.
    #[serde(default = "default_snap_radius")]
    pub snap_radius: f64,

    // Transient interaction state; never persisted.
    #[serde(skip)]
    pub tool: ToolKind,
    #[serde(skip)]
    pub first_point: Option<u32>,
    #[serde(skip)]
    pub second_point: Option<u32>,
    #[serde(skip)]
    pub pending_dimension: Option<DimensionTarget>,
    #[serde(skip)]
    pub selection: Selection,
    #[serde(skip)]
    pub hover: HoverTarget,
    #[serde(skip)]
    pub cursor: [f64; 2],
    /// Constraint just created by the dimension tool, open for inline edit.
    #[serde(skip)]
    pub editing_constraint: Option<u32>,
    #[serde(skip)]
    drag: Option<DimensionDrag>,
}

impl Sketch {
    pub fn new(name: impl Into<String>, plane: SketchPlane) -> Self {
        Self {
            name: name.into(),
            plane,
            points: Vec::new(),
            entities: Vec::new(),
            constraints: Vec::new(),
            next_point_id: 1,
            next_entity_id: 1,
            next_constraint_id: 1,
            pick_radius: DEFAULT_PICK_RADIUS,
            snap_radius: DEFAULT_SNAP_RADIUS,
            tool: ToolKind::Select,
            first_point: None,
            second_point: None,
            pending_dimension: None,
            selection: Selection::None,
            hover: HoverTarget::None,
            cursor: [0.0, 0.0],
            editing_constraint: None,
            drag: None,
        }
    }

    // ── Construction ────────────────────────────────────────────────────

    pub fn add_point(&mut self, x: f64, y: f64, fixed: bool) -> u32 {
        let id = self.next_point_id;
        self.next_point_id += 1;
        self.points.push(SketchPoint { id, x, y, fixed });
        id
    }

    /// Add a line between two existing points.
    ///
    /// A near-axis-aligned line picks up an automatic Horizontal or
    /// Vertical constraint (whichever cross-axis delta is smaller), so a
    /// single dimension added later removes exactly one degree of freedom.
    pub fn add_line(&mut self, p1: u32, p2: u32) -> Result<u32, SketchError> {
        let a = self.point(p1)?.pos();
        let b = self.point(p2)?.pos();
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        self.entities.push(SketchEntity::Line {
            id,
            start: p1,
            end: p2,
        });

        let dx = (b[0] - a[0]).abs();
        let dy = (b[1] - a[1]).abs();
        let len = (dx * dx + dy * dy).sqrt();
        if len > EPS_ZERO_LENGTH {
            if dy <= AXIS_ALIGN_RATIO * len && dy <= dx {
                self.push_constraint(ConstraintKind::Horizontal { line: id }, true);
            } else if dx <= AXIS_ALIGN_RATIO * len {
                self.push_constraint(ConstraintKind::Vertical { line: id }, true);
            }
        }
        Ok(id)
    }

    pub fn add_circle(&mut self, center: u32, radius: f64) -> Result<u32, SketchError> {
        self.point(center)?;
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        self.entities.push(SketchEntity::Circle { id, center, radius });
        Ok(id)
    }

    pub fn add_arc(&mut self, center: u32, start: u32, end: u32) -> Result<u32, SketchError> {
        self.point(center)?;
        self.point(start)?;
        self.point(end)?;
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        self.entities.push(SketchEntity::Arc {
            id,
            center,
            start,
            end,
        });
        Ok(id)
    }

    // ── Lookups ─────────────────────────────────────────────────────────

    pub fn point(&self, id: u32) -> Result<&SketchPoint, SketchError> {
        self.points
            .iter()
            .find(|p| p.id == id)
            .ok_or(SketchError::InvalidReference { id })
    }

    pub fn point_mut(&mut self, id: u32) -> Result<&mut SketchPoint, SketchError> {
        self.points
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(SketchError::InvalidReference { id })
    }

    pub fn entity(&self, id: u32) -> Result<&SketchEntity, SketchError> {
        self.entities
            .iter()
            .find(|e| e.id() == id)
            .ok_or(SketchError::InvalidReference { id })
    }

    pub fn constraint(&self, id: u32) -> Result<&Constraint, SketchError> {
        self.constraints
            .iter()
            .find(|c| c.id == id)
            .ok_or(SketchError::InvalidReference { id })
    }

    pub fn constraint_mut(&mut self, id: u32) -> Result<&mut Constraint, SketchError> {
        self.constraints
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(SketchError::InvalidReference { id })
    }

    /// Endpoints of a line entity.
    pub fn line_endpoints(&self, id: u32) -> Result<(u32, u32), SketchError> {
        match self.entity(id)? {
            SketchEntity::Line { start, end, .. } => Ok((*start, *end)),
            _ => Err(SketchError::InvalidReference { id }),
        }
    }

    fn is_round(&self, id: u32) -> bool {
        matches!(
            self.entity(id),
            Ok(SketchEntity::Circle { .. }) | Ok(SketchEntity::Arc { .. })
        )
    }

    // ── Constraints ─────────────────────────────────────────────────────

    /// Add a driving constraint, validating every referenced id.
    pub fn add_constraint(&mut self, kind: ConstraintKind) -> Result<u32, SketchError> {
        self.validate_kind(&kind)?;
        Ok(self.push_constraint(kind, true))
    }

    /// Add a reference (non-driving) dimension.
    pub fn add_reference_dimension(&mut self, kind: ConstraintKind) -> Result<u32, SketchError> {
        self.validate_kind(&kind)?;
        Ok(self.push_constraint(kind, false))
    }

    fn push_constraint(&mut self, kind: ConstraintKind, driving: bool) -> u32 {
        let id = self.next_constraint_id;
        self.next_constraint_id += 1;
        let mut c = Constraint::new(id, kind);
        c.driving = driving;
        self.constraints.push(c);
        id
    }

    fn validate_kind(&self, kind: &ConstraintKind) -> Result<(), SketchError> {
        for pid in kind.referenced_points() {
            self.point(pid)?;
        }
        for eid in kind.referenced_entities() {
            self.entity(eid)?;
        }
        // Kind-specific shape checks: line slots need lines, round slots
        // need circles or arcs.
        let line_ok = |id: u32| matches!(self.entity(id), Ok(SketchEntity::Line { .. }));
        let bad = |id: u32| Err(SketchError::InvalidReference { id });
        match *kind {
            ConstraintKind::Horizontal { line } | ConstraintKind::Vertical { line } => {
                if !line_ok(line) {
                    return bad(line);
                }
            }
            ConstraintKind::Angle { line_a, line_b, .. }
            | ConstraintKind::FixedAngle { line_a, line_b, .. }
            | ConstraintKind::Perpendicular { line_a, line_b }
            | ConstraintKind::Parallel { line_a, line_b } => {
                if !line_ok(line_a) {
                    return bad(line_a);
                }
                if !line_ok(line_b) {
                    return bad(line_b);
                }
            }
            ConstraintKind::PointOnLine { line, .. } => {
                if !line_ok(line) {
                    return bad(line);
                }
            }
            ConstraintKind::Tangent { line, circle } => {
                if !line_ok(line) {
                    return bad(line);
                }
                if !self.is_round(circle) {
                    return bad(circle);
                }
            }
            ConstraintKind::PointOnCircle { circle, .. } => {
                if !self.is_round(circle) {
                    return bad(circle);
                }
            }
            ConstraintKind::Radius { entity, .. } | ConstraintKind::Diameter { entity, .. } => {
                if !self.is_round(entity) {
                    return bad(entity);
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Reinsert a previously removed constraint with its original id.
    /// Used by command replay; ids come from an earlier allocation.
    pub fn insert_constraint(&mut self, constraint: Constraint) {
        self.next_constraint_id = self.next_constraint_id.max(constraint.id + 1);
        self.constraints.push(constraint);
    }

    /// Reinsert a previously removed entity with its original id.
    pub fn insert_entity(&mut self, entity: SketchEntity) {
        self.next_entity_id = self.next_entity_id.max(entity.id() + 1);
        self.entities.push(entity);
    }

    pub fn remove_constraint(&mut self, id: u32) -> bool {
        let before = self.constraints.len();
        self.constraints.retain(|c| c.id != id);
        if self.editing_constraint == Some(id) {
            self.editing_constraint = None;
        }
        self.constraints.len() != before
    }

    pub fn modify_constraint_value(&mut self, id: u32, value: f64) -> bool {
        match self.constraint_mut(id) {
            Ok(c) => c.kind.set_value(value),
            Err(_) => false,
        }
    }

    /// Current dimension value and driving flag, for kinds that carry one.
    pub fn get_constraint_value(&self, id: u32) -> Option<(f64, bool)> {
        let c = self.constraint(id).ok()?;
        c.kind.value().map(|v| (v, c.driving))
    }

    pub fn constraints_referencing_entity(&self, entity_id: u32) -> Vec<u32> {
        self.constraints
            .iter()
            .filter(|c| c.kind.referenced_entities().contains(&entity_id))
            .map(|c| c.id)
            .collect()
    }

    pub fn constraints_referencing_point(&self, point_id: u32) -> Vec<u32> {
        self.constraints
            .iter()
            .filter(|c| c.kind.referenced_points().contains(&point_id))
            .map(|c| c.id)
            .collect()
    }

    // ── Deletion with cascade ───────────────────────────────────────────

    /// Remove an entity plus every constraint that referenced it.
    pub fn delete_entity(&mut self, id: u32) -> bool {
        let before = self.entities.len();
        self.entities.retain(|e| e.id() != id);
        if self.entities.len() == before {
            return false;
        }
        self.constraints
            .retain(|c| !c.kind.referenced_entities().contains(&id));
        true
    }

    /// Remove a point, every entity that referenced it, and every constraint
    /// left dangling by either removal.
    pub fn delete_point(&mut self, id: u32) -> bool {
        let before = self.points.len();
        self.points.retain(|p| p.id != id);
        if self.points.len() == before {
            return false;
        }
        let dead_entities: Vec<u32> = self
            .entities
            .iter()
            .filter(|e| e.referenced_points().contains(&id))
            .map(|e| e.id())
            .collect();
        self.entities.retain(|e| !dead_entities.contains(&e.id()));
        self.constraints.retain(|c| {
            !c.kind.referenced_points().contains(&id)
                && !c
                    .kind
                    .referenced_entities()
                    .iter()
                    .any(|e| dead_entities.contains(e))
        });
        true
    }

    /// Delete whatever is selected, cascading to dependent constraints.
    pub fn delete_selected(&mut self) -> bool {
        let deleted = match self.selection {
            Selection::Entity(id) => self.delete_entity(id),
            Selection::Point(id) => self.delete_point(id),
            Selection::Constraint(id) => self.remove_constraint(id),
            Selection::None => false,
        };
        if deleted {
            self.selection = Selection::None;
        }
        deleted
    }

    // ── Tool state machine ──────────────────────────────────────────────

    pub fn set_tool(&mut self, tool: ToolKind) {
        self.tool = tool;
        self.clear_tool_state();
    }

    /// Cancel the in-flight tool action (keeps the tool active).
    pub fn cancel_tool(&mut self) {
        self.clear_tool_state();
    }

    fn clear_tool_state(&mut self) {
        self.first_point = None;
        self.second_point = None;
        self.pending_dimension = None;
        self.editing_constraint = None;
    }

    /// Dispatch a click to the active tool.
    pub fn handle_click(&mut self, pos: [f64; 2]) {
        match self.tool {
            ToolKind::Select => {
                let hover = self.update_hover(pos);
                self.selection = match hover {
                    HoverTarget::Point(id) | HoverTarget::LineEndpointHandle(id) => {
                        Selection::Point(id)
                    }
                    HoverTarget::Line(id)
                    | HoverTarget::Circle(id)
                    | HoverTarget::Arc(id)
                    | HoverTarget::RadiusHandle(id) => Selection::Entity(id),
                    HoverTarget::Constraint(id) => Selection::Constraint(id),
                    HoverTarget::None => Selection::None,
                };
            }
            ToolKind::Line => {
                let p = self.snap_or_add_point(pos);
                match self.first_point {
                    None => self.first_point = Some(p),
                    Some(first) => {
                        if first != p {
                            // Chaining: the new endpoint becomes the next start.
                            let _ = self.add_line(first, p);
                        }
                        self.first_point = Some(p);
                    }
                }
            }
            ToolKind::Circle => match self.first_point {
                None => self.first_point = Some(self.snap_or_add_point(pos)),
                Some(center) => {
                    let c = self.point(center).map(|p| p.pos()).unwrap_or(pos);
                    let radius = ((pos[0] - c[0]).powi(2) + (pos[1] - c[1]).powi(2)).sqrt();
                    let _ = self.add_circle(center, radius);
                    self.first_point = None;
                }
            },
            ToolKind::Arc => match (self.first_point, self.second_point) {
                (None, _) => self.first_point = Some(self.snap_or_add_point(pos)),
                (Some(_), None) => self.second_point = Some(self.snap_or_add_point(pos)),
                (Some(center), Some(start)) => {
                    let end = self.snap_or_add_point(pos);
                    let _ = self.add_arc(center, start, end);
                    self.first_point = None;
                    self.second_point = None;
                }
            },
            ToolKind::Dimension => self.handle_dimension_click(pos),
        }
    }

    /// Reuse an existing point within the snap radius, or create one.
    fn snap_or_add_point(&mut self, pos: [f64; 2]) -> u32 {
        let mut best: Option<(u32, f64)> = None;
        for p in &self.points {
            let d = ((p.x - pos[0]).powi(2) + (p.y - pos[1]).powi(2)).sqrt();
            if d <= self.snap_radius && best.map(|(_, bd)| d < bd).unwrap_or(true) {
                best = Some((p.id, d));
            }
        }
        match best {
            Some((id, _)) => id,
            None => self.add_point(pos[0], pos[1], false),
        }
    }

    fn dimension_target_at(&mut self, pos: [f64; 2]) -> Option<DimensionTarget> {
        match self.update_hover(pos) {
            HoverTarget::Point(id) | HoverTarget::LineEndpointHandle(id) => {
                Some(DimensionTarget::Point(id))
            }
            HoverTarget::Line(id) => Some(DimensionTarget::Line(id)),
            HoverTarget::Circle(id) | HoverTarget::RadiusHandle(id) => {
                Some(DimensionTarget::Circle(id))
            }
            HoverTarget::Arc(id) => Some(DimensionTarget::Arc(id)),
            _ => None,
        }
    }

    fn handle_dimension_click(&mut self, pos: [f64; 2]) {
        let pick = self.dimension_target_at(pos);
        let Some(first) = self.pending_dimension else {
            self.pending_dimension = pick;
            return;
        };

        let created = match (first, pick) {
            (DimensionTarget::Point(a), Some(DimensionTarget::Point(b))) if a != b => self
                .measured_distance(a, b)
                .ok()
                .map(|d| ConstraintKind::Distance { a, b, value: d }),
            (DimensionTarget::Line(a), Some(DimensionTarget::Line(b))) if a != b => self
                .measured_angle(a, b)
                .ok()
                .map(|deg| ConstraintKind::Angle {
                    line_a: a,
                    line_b: b,
                    degrees: deg,
                }),
            // Second click on the same line (or on empty space) dimensions
            // the line itself.
            (DimensionTarget::Line(line), _) => self.dimension_kind_for_line(line).ok(),
            (DimensionTarget::Circle(entity), _) => self
                .circle_radius(entity)
                .ok()
                .map(|r| ConstraintKind::Diameter {
                    entity,
                    value: 2.0 * r,
                }),
            (DimensionTarget::Arc(entity), _) => self
                .circle_radius(entity)
                .ok()
                .map(|r| ConstraintKind::Radius { entity, value: r }),
            _ => None,
        };

        self.pending_dimension = None;
        if let Some(kind) = created {
            if let Ok(id) = self.add_constraint(kind) {
                // Park the label near the placement click.
                if let Some(anchor) = self
                    .constraint(id)
                    .ok()
                    .and_then(|c| self.constraint_anchor(c))
                {
                    if let Ok(c) = self.constraint_mut(id) {
                        c.label_offset = [pos[0] - anchor[0], pos[1] - anchor[1]];
                    }
                }
                self.editing_constraint = Some(id);
            }
        }
    }

    /// Pick the dimension kind for a single line: Horizontal lines take
    /// DistanceX, Vertical lines DistanceY, anything else plain Distance.
    pub fn dimension_kind_for_line(&self, line: u32) -> Result<ConstraintKind, SketchError> {
        let (s, e) = self.line_endpoints(line)?;
        if self.line_has_horizontal(line) {
            Ok(ConstraintKind::DistanceX {
                a: s,
                b: e,
                value: self.measured_dx(s, e)?,
            })
        } else if self.line_has_vertical(line) {
            Ok(ConstraintKind::DistanceY {
                a: s,
                b: e,
                value: self.measured_dy(s, e)?,
            })
        } else {
            Ok(ConstraintKind::Distance {
                a: s,
                b: e,
                value: self.measured_distance(s, e)?,
            })
        }
    }

    pub fn line_has_horizontal(&self, line: u32) -> bool {
        self.constraints
            .iter()
            .any(|c| matches!(c.kind, ConstraintKind::Horizontal { line: l } if l == line))
    }

    pub fn line_has_vertical(&self, line: u32) -> bool {
        self.constraints
            .iter()
            .any(|c| matches!(c.kind, ConstraintKind::Vertical { line: l } if l == line))
    }

    // ── Measurements ────────────────────────────────────────────────────

    pub fn point_pos(&self, id: u32) -> Result<[f64; 2], SketchError> {
        Ok(self.point(id)?.pos())
    }

    pub fn measured_distance(&self, a: u32, b: u32) -> Result<f64, SketchError> {
        let pa = self.point_pos(a)?;
        let pb = self.point_pos(b)?;
        Ok(((pb[0] - pa[0]).powi(2) + (pb[1] - pa[1]).powi(2)).sqrt())
    }

    /// Signed X distance from `a` to `b`.
    pub fn measured_dx(&self, a: u32, b: u32) -> Result<f64, SketchError> {
        Ok(self.point_pos(b)?[0] - self.point_pos(a)?[0])
    }

    /// Signed Y distance from `a` to `b`.
    pub fn measured_dy(&self, a: u32, b: u32) -> Result<f64, SketchError> {
        Ok(self.point_pos(b)?[1] - self.point_pos(a)?[1])
    }

    pub fn line_direction(&self, line: u32) -> Result<[f64; 2], SketchError> {
        let (s, e) = self.line_endpoints(line)?;
        let ps = self.point_pos(s)?;
        let pe = self.point_pos(e)?;
        Ok([pe[0] - ps[0], pe[1] - ps[1]])
    }

    /// Angle between two lines in degrees, wrapped to (-180, 180].
    pub fn measured_angle(&self, line_a: u32, line_b: u32) -> Result<f64, SketchError> {
        let da = self.line_direction(line_a)?;
        let db = self.line_direction(line_b)?;
        let cross = da[0] * db[1] - da[1] * db[0];
        let dot = da[0] * db[0] + da[1] * db[1];
        Ok(cross.atan2(dot).to_degrees())
    }

    /// Radius of a circle, or the implied radius of an arc.
    pub fn circle_radius(&self, id: u32) -> Result<f64, SketchError> {
        match self.entity(id)? {
            SketchEntity::Circle { radius, .. } => Ok(*radius),
            SketchEntity::Arc { center, start, .. } => self.measured_distance(*center, *start),
            _ => Err(SketchError::InvalidReference { id }),
        }
    }

    /// Characteristic length: line length, or circle/arc radius.
    pub fn entity_length(&self, id: u32) -> Result<f64, SketchError> {
        match self.entity(id)? {
            SketchEntity::Line { start, end, .. } => self.measured_distance(*start, *end),
            _ => self.circle_radius(id),
        }
    }

    // ── Hover ───────────────────────────────────────────────────────────

    /// Recompute the hover target at a position.
    ///
    /// Precedence: Point, then LineEndpointHandle, then RadiusHandle, then
    /// constraint labels, then entity bodies. Within a tier the smallest
    /// distance wins.
    pub fn update_hover(&mut self, pos: [f64; 2]) -> HoverTarget {
        let target = self.hover_at(pos);
        self.hover = target;
        target
    }

    fn hover_at(&self, pos: [f64; 2]) -> HoverTarget {
        let dist_to = |p: [f64; 2]| ((p[0] - pos[0]).powi(2) + (p[1] - pos[1]).powi(2)).sqrt();

        // Tier 1: points, with a tighter radius than the endpoint handles.
        let mut best: Option<(u32, f64)> = None;
        for p in &self.points {
            let d = dist_to(p.pos());
            if d <= self.pick_radius * 0.6 && best.map(|(_, bd)| d < bd).unwrap_or(true) {
                best = Some((p.id, d));
            }
        }
        if let Some((id, _)) = best {
            return HoverTarget::Point(id);
        }

        // Tier 2: line endpoint handles.
        let mut best: Option<(u32, f64)> = None;
        for e in &self.entities {
            if let SketchEntity::Line { start, end, .. } = e {
                for &pid in &[*start, *end] {
                    if let Ok(p) = self.point(pid) {
                        let d = dist_to(p.pos());
                        if d <= self.pick_radius && best.map(|(_, bd)| d < bd).unwrap_or(true) {
                            best = Some((pid, d));
                        }
                    }
                }
            }
        }
        if let Some((id, _)) = best {
            return HoverTarget::LineEndpointHandle(id);
        }

        // Tier 3: radius handles on circles and arcs.
        let mut best: Option<(u32, f64)> = None;
        for e in &self.entities {
            if let Some(h) = self.radius_handle_pos(e) {
                let d = dist_to(h);
                if d <= self.pick_radius && best.map(|(_, bd)| d < bd).unwrap_or(true) {
                    best = Some((e.id(), d));
                }
            }
        }
        if let Some((id, _)) = best {
            return HoverTarget::RadiusHandle(id);
        }

        // Tier 4: dimension labels.
        let mut best: Option<(u32, f64)> = None;
        for c in &self.constraints {
            if !c.kind.is_dimensional() {
                continue;
            }
            if let Some(anchor) = self.constraint_anchor(c) {
                let label = [anchor[0] + c.label_offset[0], anchor[1] + c.label_offset[1]];
                let d = dist_to(label);
                if d <= self.pick_radius && best.map(|(_, bd)| d < bd).unwrap_or(true) {
                    best = Some((c.id, d));
                }
            }
        }
        if let Some((id, _)) = best {
            return HoverTarget::Constraint(id);
        }

        // Tier 5: entity bodies.
        let mut best: Option<(HoverTarget, f64)> = None;
        for e in &self.entities {
            let hit = match e {
                SketchEntity::Line { id, start, end } => {
                    match (self.point_pos(*start), self.point_pos(*end)) {
                        (Ok(a), Ok(b)) => Some((
                            HoverTarget::Line(*id),
                            segment_distance(pos, a, b),
                        )),
                        _ => None,
                    }
                }
                SketchEntity::Circle { id, center, radius } => self
                    .point_pos(*center)
                    .ok()
                    .map(|c| (HoverTarget::Circle(*id), (dist_to(c) - radius).abs())),
                SketchEntity::Arc {
                    id,
                    center,
                    start,
                    end,
                } => self.arc_rim_distance(pos, *center, *start, *end).map(|d| {
                    (HoverTarget::Arc(*id), d)
                }),
            };
            if let Some((target, d)) = hit {
                if d <= self.pick_radius && best.map(|(_, bd)| d < bd).unwrap_or(true) {
                    best = Some((target, d));
                }
            }
        }
        best.map(|(t, _)| t).unwrap_or(HoverTarget::None)
    }

    fn radius_handle_pos(&self, e: &SketchEntity) -> Option<[f64; 2]> {
        match e {
            SketchEntity::Circle { center, radius, .. } => {
                let c = self.point_pos(*center).ok()?;
                let k = std::f64::consts::FRAC_1_SQRT_2;
                Some([c[0] + radius * k, c[1] + radius * k])
            }
            SketchEntity::Arc { start, .. } => {
                // Handle sits on the arc's start point.
                self.point_pos(*start).ok()
            }
            _ => None,
        }
    }

    /// Distance from a position to an arc's rim, or None when the position
    /// falls outside the arc's angular span.
    fn arc_rim_distance(&self, pos: [f64; 2], center: u32, start: u32, end: u32) -> Option<f64> {
        let c = self.point_pos(center).ok()?;
        let s = self.point_pos(start).ok()?;
        let e = self.point_pos(end).ok()?;
        let r = ((s[0] - c[0]).powi(2) + (s[1] - c[1]).powi(2)).sqrt();
        let a0 = (s[1] - c[1]).atan2(s[0] - c[0]);
        let a1 = (e[1] - c[1]).atan2(e[0] - c[0]);
        let ap = (pos[1] - c[1]).atan2(pos[0] - c[0]);
        let tau = std::f64::consts::TAU;
        let span = ((a1 - a0) % tau + tau) % tau;
        let off = ((ap - a0) % tau + tau) % tau;
        if off <= span {
            let d = ((pos[0] - c[0]).powi(2) + (pos[1] - c[1]).powi(2)).sqrt();
            Some((d - r).abs())
        } else {
            None
        }
    }

    /// Anchor position for a constraint glyph or dimension label.
    pub fn constraint_anchor(&self, c: &Constraint) -> Option<[f64; 2]> {
        let midpoint = |a: u32, b: u32| -> Option<[f64; 2]> {
            let pa = self.point_pos(a).ok()?;
            let pb = self.point_pos(b).ok()?;
            Some([(pa[0] + pb[0]) * 0.5, (pa[1] + pb[1]) * 0.5])
        };
        let line_mid = |l: u32| -> Option<[f64; 2]> {
            let (s, e) = self.line_endpoints(l).ok()?;
            midpoint(s, e)
        };
        match c.kind {
            ConstraintKind::Distance { a, b, .. }
            | ConstraintKind::DistanceX { a, b, .. }
            | ConstraintKind::DistanceY { a, b, .. }
            | ConstraintKind::FixedDistance { a, b, .. }
            | ConstraintKind::Coincident { a, b } => midpoint(a, b),
            ConstraintKind::Horizontal { line } | ConstraintKind::Vertical { line } => {
                line_mid(line)
            }
            ConstraintKind::Angle { line_a, line_b, .. }
            | ConstraintKind::FixedAngle { line_a, line_b, .. }
            | ConstraintKind::Perpendicular { line_a, line_b }
            | ConstraintKind::Parallel { line_a, line_b } => {
                let ma = line_mid(line_a)?;
                let mb = line_mid(line_b)?;
                Some([(ma[0] + mb[0]) * 0.5, (ma[1] + mb[1]) * 0.5])
            }
            ConstraintKind::Equal { entity_a, entity_b } => {
                let pa = self.entity_anchor(entity_a)?;
                let pb = self.entity_anchor(entity_b)?;
                Some([(pa[0] + pb[0]) * 0.5, (pa[1] + pb[1]) * 0.5])
            }
            ConstraintKind::Tangent { circle, .. }
            | ConstraintKind::Radius { entity: circle, .. }
            | ConstraintKind::Diameter { entity: circle, .. } => self.entity_anchor(circle),
            ConstraintKind::PointOnLine { point, .. }
            | ConstraintKind::PointOnCircle { point, .. }
            | ConstraintKind::FixedPoint { point, .. } => self.point_pos(point).ok(),
        }
    }

    fn entity_anchor(&self, id: u32) -> Option<[f64; 2]> {
        match self.entity(id).ok()? {
            SketchEntity::Line { start, end, .. } => {
                let a = self.point_pos(*start).ok()?;
                let b = self.point_pos(*end).ok()?;
                Some([(a[0] + b[0]) * 0.5, (a[1] + b[1]) * 0.5])
            }
            SketchEntity::Circle { center, .. } | SketchEntity::Arc { center, .. } => {
                self.point_pos(*center).ok()
            }
        }
    }

    // ── Cursor and label dragging ───────────────────────────────────────

    pub fn update_cursor(&mut self, pos: [f64; 2]) {
        self.cursor = pos;
    }

    /// Begin dragging a dimension label. Returns false for unknown or
    /// non-dimensional constraints.
    pub fn start_drag_dimension(&mut self, id: u32, pos: [f64; 2]) -> bool {
        match self.constraint(id) {
            Ok(c) if c.kind.is_dimensional() => {
                self.drag = Some(DimensionDrag {
                    constraint: id,
                    grab: pos,
                    base_offset: c.label_offset,
                });
                true
            }
            _ => false,
        }
    }

    pub fn update_drag_dimension(&mut self, pos: [f64; 2]) {
        if let Some(drag) = self.drag {
            if let Ok(c) = self.constraint_mut(drag.constraint) {
                c.label_offset = [
                    drag.base_offset[0] + pos[0] - drag.grab[0],
                    drag.base_offset[1] + pos[1] - drag.grab[1],
                ];
            }
        }
    }

    pub fn stop_drag_dimension(&mut self) {
        self.drag = None;
    }
}

/// Distance from a point to a line segment.
fn segment_distance(p: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    let ab = [b[0] - a[0], b[1] - a[1]];
    let len2 = ab[0] * ab[0] + ab[1] * ab[1];
    let t = if len2 < 1e-18 {
        0.0
    } else {
        (((p[0] - a[0]) * ab[0] + (p[1] - a[1]) * ab[1]) / len2).clamp(0.0, 1.0)
    };
    let q = [a[0] + ab[0] * t, a[1] + ab[1] * t];
    ((p[0] - q[0]).powi(2) + (p[1] - q[1]).powi(2)).sqrt()
}

//! Command history: an ordered list with a cursor, bounded by a capacity.
//!
//! Commands are self-contained: they hold ids and captured state, never
//! references into the tree. Sketch commands snapshot point coordinates at
//! execute time; undo restores that snapshot (stashing the current one so
//! redo can put it back), which makes undo/redo round trips bit-exact even
//! when a solve moved geometry in between.

use uuid::Uuid;

use caliper_types::{Constraint, ConstraintKind, Sketch, SketchEntity};

use crate::tree::FeatureTree;
use crate::types::{EngineError, Feature};

pub const DEFAULT_CAPACITY: usize = 50;

type PointSnapshot = Vec<(u32, f64, f64)>;

fn snapshot_points(sketch: &Sketch) -> PointSnapshot {
    sketch.points.iter().map(|p| (p.id, p.x, p.y)).collect()
}

fn restore_points(sketch: &mut Sketch, snapshot: &PointSnapshot) {
    for &(id, x, y) in snapshot {
        if let Ok(p) = sketch.point_mut(id) {
            p.x = x;
            p.y = y;
        }
    }
}

/// A reversible operation on the document.
#[derive(Debug, Clone)]
pub enum Command {
    /// Add a line between two existing points of a sketch feature.
    AddLine {
        sketch_feature: Uuid,
        start: u32,
        end: u32,
        /// Captured at execute: the created entity and any constraints that
        /// were auto-attached to it.
        created: Option<SketchEntity>,
        auto_constraints: Vec<Constraint>,
        before: PointSnapshot,
        after: Option<PointSnapshot>,
    },
    /// Add a constraint to a sketch feature.
    AddConstraint {
        sketch_feature: Uuid,
        kind: ConstraintKind,
        driving: bool,
        created: Option<Constraint>,
        before: PointSnapshot,
        after: Option<PointSnapshot>,
    },
    /// Remove a constraint from a sketch feature.
    RemoveConstraint {
        sketch_feature: Uuid,
        constraint_id: u32,
        removed: Option<Constraint>,
        before: PointSnapshot,
        after: Option<PointSnapshot>,
    },
    /// Change a dimension's value.
    SetConstraintValue {
        sketch_feature: Uuid,
        constraint_id: u32,
        value: f64,
        previous: Option<f64>,
        before: PointSnapshot,
        after: Option<PointSnapshot>,
    },
    /// Append a pre-built feature to the tree.
    AddFeature { feature: Box<Feature> },
    /// Remove a feature nothing depends on.
    RemoveFeature {
        feature_id: Uuid,
        removed: Option<Box<Feature>>,
        position: usize,
    },
}

impl Command {
    pub fn add_line(sketch_feature: Uuid, start: u32, end: u32) -> Self {
        Command::AddLine {
            sketch_feature,
            start,
            end,
            created: None,
            auto_constraints: Vec::new(),
            before: Vec::new(),
            after: None,
        }
    }

    pub fn add_constraint(sketch_feature: Uuid, kind: ConstraintKind) -> Self {
        Command::AddConstraint {
            sketch_feature,
            kind,
            driving: true,
            created: None,
            before: Vec::new(),
            after: None,
        }
    }

    pub fn remove_constraint(sketch_feature: Uuid, constraint_id: u32) -> Self {
        Command::RemoveConstraint {
            sketch_feature,
            constraint_id,
            removed: None,
            before: Vec::new(),
            after: None,
        }
    }

    pub fn set_constraint_value(sketch_feature: Uuid, constraint_id: u32, value: f64) -> Self {
        Command::SetConstraintValue {
            sketch_feature,
            constraint_id,
            value,
            previous: None,
            before: Vec::new(),
            after: None,
        }
    }

    pub fn add_feature(feature: Feature) -> Self {
        Command::AddFeature {
            feature: Box::new(feature),
        }
    }

    pub fn remove_feature(feature_id: Uuid) -> Self {
        Command::RemoveFeature {
            feature_id,
            removed: None,
            position: 0,
        }
    }

    fn execute(&mut self, tree: &mut FeatureTree) -> Result<(), EngineError> {
        match self {
            Command::AddLine {
                sketch_feature,
                start,
                end,
                created,
                auto_constraints,
                before,
                ..
            } => {
                let feature_id = *sketch_feature;
                let sketch = tree.sketch_mut(feature_id)?;
                *before = snapshot_points(sketch);
                let known: Vec<u32> = sketch.constraints.iter().map(|c| c.id).collect();
                let line = sketch.add_line(*start, *end)?;
                *created = sketch.entity(line).ok().cloned();
                *auto_constraints = sketch
                    .constraints
                    .iter()
                    .filter(|c| !known.contains(&c.id))
                    .cloned()
                    .collect();
                tree.mark_dirty(feature_id);
                Ok(())
            }
            Command::AddConstraint {
                sketch_feature,
                kind,
                driving,
                created,
                before,
                ..
            } => {
                let feature_id = *sketch_feature;
                let sketch = tree.sketch_mut(feature_id)?;
                *before = snapshot_points(sketch);
                let id = if *driving {
                    sketch.add_constraint(kind.clone())
                } else {
                    sketch.add_reference_dimension(kind.clone())
                }?;
                *created = sketch.constraint(id).ok().cloned();
                tree.mark_dirty(feature_id);
                Ok(())
            }
            Command::RemoveConstraint {
                sketch_feature,
                constraint_id,
                removed,
                before,
                ..
            } => {
                let feature_id = *sketch_feature;
                let sketch = tree.sketch_mut(feature_id)?;
                *before = snapshot_points(sketch);
                *removed = sketch.constraint(*constraint_id).ok().cloned();
                sketch.remove_constraint(*constraint_id);
                tree.mark_dirty(feature_id);
                Ok(())
            }
            Command::SetConstraintValue {
                sketch_feature,
                constraint_id,
                value,
                previous,
                before,
                ..
            } => {
                let feature_id = *sketch_feature;
                let sketch = tree.sketch_mut(feature_id)?;
                *before = snapshot_points(sketch);
                *previous = sketch.get_constraint_value(*constraint_id).map(|(v, _)| v);
                sketch.modify_constraint_value(*constraint_id, *value);
                tree.mark_dirty(feature_id);
                Ok(())
            }
            Command::AddFeature { feature } => {
                let id = feature.id;
                tree.push_validated(feature.as_ref().clone())?;
                tree.mark_dirty(id);
                Ok(())
            }
            Command::RemoveFeature {
                feature_id,
                removed,
                position,
            } => {
                let (feature, pos) = tree.remove(*feature_id)?;
                *removed = Some(Box::new(feature));
                *position = pos;
                Ok(())
            }
        }
    }

    fn undo(&mut self, tree: &mut FeatureTree) {
        match self {
            Command::AddLine {
                sketch_feature,
                created,
                before,
                after,
                ..
            } => {
                let feature_id = *sketch_feature;
                if let Ok(sketch) = tree.sketch_mut(feature_id) {
                    *after = Some(snapshot_points(sketch));
                    if let Some(entity) = created {
                        // Cascades to the auto-attached constraints too.
                        sketch.delete_entity(entity.id());
                    }
                    restore_points(sketch, before);
                }
                tree.mark_dirty(feature_id);
            }
            Command::AddConstraint {
                sketch_feature,
                created,
                before,
                after,
                ..
            } => {
                let feature_id = *sketch_feature;
                if let Ok(sketch) = tree.sketch_mut(feature_id) {
                    *after = Some(snapshot_points(sketch));
                    if let Some(c) = created {
                        sketch.remove_constraint(c.id);
                    }
                    restore_points(sketch, before);
                }
                tree.mark_dirty(feature_id);
            }
            Command::RemoveConstraint {
                sketch_feature,
                removed,
                before,
                after,
                ..
            } => {
                let feature_id = *sketch_feature;
                if let Ok(sketch) = tree.sketch_mut(feature_id) {
                    *after = Some(snapshot_points(sketch));
                    if let Some(c) = removed.clone() {
                        sketch.insert_constraint(c);
                    }
                    restore_points(sketch, before);
                }
                tree.mark_dirty(feature_id);
            }
            Command::SetConstraintValue {
                sketch_feature,
                constraint_id,
                previous,
                before,
                after,
                ..
            } => {
                let feature_id = *sketch_feature;
                if let Ok(sketch) = tree.sketch_mut(feature_id) {
                    *after = Some(snapshot_points(sketch));
                    if let Some(v) = previous {
                        sketch.modify_constraint_value(*constraint_id, *v);
                    }
                    restore_points(sketch, before);
                }
                tree.mark_dirty(feature_id);
            }
            Command::AddFeature { feature } => {
                let _ = tree.remove(feature.id);
            }
            Command::RemoveFeature {
                removed, position, ..
            } => {
                if let Some(feature) = removed.clone() {
                    tree.insert_at(*feature, *position);
                }
            }
        }
    }

    fn redo(&mut self, tree: &mut FeatureTree) {
        match self {
            Command::AddLine {
                sketch_feature,
                created,
                auto_constraints,
                after,
                ..
            } => {
                let feature_id = *sketch_feature;
                if let Ok(sketch) = tree.sketch_mut(feature_id) {
                    if let Some(entity) = created.clone() {
                        sketch.insert_entity(entity);
                    }
                    for c in auto_constraints.clone() {
                        sketch.insert_constraint(c);
                    }
                    if let Some(snap) = after {
                        restore_points(sketch, snap);
                    }
                }
                tree.mark_dirty(feature_id);
            }
            Command::AddConstraint {
                sketch_feature,
                created,
                after,
                ..
            } => {
                let feature_id = *sketch_feature;
                if let Ok(sketch) = tree.sketch_mut(feature_id) {
                    if let Some(c) = created.clone() {
                        sketch.insert_constraint(c);
                    }
                    if let Some(snap) = after {
                        restore_points(sketch, snap);
                    }
                }
                tree.mark_dirty(feature_id);
            }
            Command::RemoveConstraint {
                sketch_feature,
                constraint_id,
                after,
                ..
            } => {
                let feature_id = *sketch_feature;
                if let Ok(sketch) = tree.sketch_mut(feature_id) {
                    sketch.remove_constraint(*constraint_id);
                    if let Some(snap) = after {
                        restore_points(sketch, snap);
                    }
                }
                tree.mark_dirty(feature_id);
            }
            Command::SetConstraintValue {
                sketch_feature,
                constraint_id,
                value,
                after,
                ..
            } => {
                let feature_id = *sketch_feature;
                if let Ok(sketch) = tree.sketch_mut(feature_id) {
                    sketch.modify_constraint_value(*constraint_id, *value);
                    if let Some(snap) = after {
                        restore_points(sketch, snap);
                    }
                }
                tree.mark_dirty(feature_id);
            }
            Command::AddFeature { feature } => {
                let id = feature.id;
                let _ = tree.push_validated(feature.as_ref().clone());
                tree.mark_dirty(id);
            }
            Command::RemoveFeature { feature_id, .. } => {
                let _ = tree.remove(*feature_id);
            }
        }
    }
}

/// Bounded undo/redo history: an ordered command list plus a cursor
/// pointing at the next command to redo.
#[derive(Debug)]
pub struct CommandHistory {
    commands: Vec<Command>,
    cursor: usize,
    capacity: usize,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Vec::new(),
            cursor: 0,
            capacity: capacity.max(1),
        }
    }

    /// Run a command and push it, truncating any redoable tail. Beyond
    /// capacity the oldest command is discarded.
    pub fn execute(&mut self, mut cmd: Command, tree: &mut FeatureTree) -> Result<(), EngineError> {
        cmd.execute(tree)?;
        self.commands.truncate(self.cursor);
        self.commands.push(cmd);
        if self.commands.len() > self.capacity {
            self.commands.remove(0);
        }
        self.cursor = self.commands.len();
        Ok(())
    }

    pub fn undo(&mut self, tree: &mut FeatureTree) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        self.commands[self.cursor].undo(tree);
        true
    }

    pub fn redo(&mut self, tree: &mut FeatureTree) -> bool {
        if self.cursor >= self.commands.len() {
            return false;
        }
        self.commands[self.cursor].redo(tree);
        self.cursor += 1;
        true
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.commands.len()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caliper_types::{Sketch, SketchPlane};

    fn tree_with_sketch() -> (FeatureTree, Uuid, u32, u32) {
        let mut sketch = Sketch::new("sk", SketchPlane::xy());
        let a = sketch.add_point(0.0, 0.0, true);
        let b = sketch.add_point(3.0, 0.4, false);
        let mut tree = FeatureTree::new();
        let id = tree.add_sketch(sketch, "sk");
        (tree, id, a, b)
    }

    #[test]
    fn test_add_line_undo_removes_line_and_auto_constraints() {
        let (mut tree, sk, a, b) = tree_with_sketch();
        let mut history = CommandHistory::new();
        history
            .execute(Command::add_line(sk, a, b), &mut tree)
            .unwrap();
        {
            let sketch = tree.sketch(sk).unwrap();
            assert_eq!(sketch.entities.len(), 1);
            assert_eq!(sketch.constraints.len(), 1, "auto horizontal attached");
        }
        assert!(history.undo(&mut tree));
        let sketch = tree.sketch(sk).unwrap();
        assert!(sketch.entities.is_empty());
        assert!(sketch.constraints.is_empty(), "auto constraint cascaded");
    }

    #[test]
    fn test_redo_restores_identical_ids() {
        let (mut tree, sk, a, b) = tree_with_sketch();
        let mut history = CommandHistory::new();
        history
            .execute(Command::add_line(sk, a, b), &mut tree)
            .unwrap();
        let line_id = tree.sketch(sk).unwrap().entities[0].id();
        history.undo(&mut tree);
        assert!(history.redo(&mut tree));
        assert_eq!(tree.sketch(sk).unwrap().entities[0].id(), line_id);
    }

    #[test]
    fn test_undo_restores_points_after_external_mutation() {
        let (mut tree, sk, a, b) = tree_with_sketch();
        let mut history = CommandHistory::new();
        history
            .execute(
                Command::add_constraint(sk, ConstraintKind::Distance { a, b, value: 5.0 }),
                &mut tree,
            )
            .unwrap();
        // Simulate a solve moving the free point.
        {
            let sketch = tree.sketch_mut(sk).unwrap();
            let p = sketch.point_mut(b).unwrap();
            p.x = 4.96;
            p.y = 0.66;
        }
        history.undo(&mut tree);
        let sketch = tree.sketch(sk).unwrap();
        assert!(sketch.constraints.is_empty());
        let p = sketch.point(b).unwrap();
        assert_eq!((p.x, p.y), (3.0, 0.4), "pre-execute coordinates restored");

        // Redo puts the solved coordinates back.
        history.redo(&mut tree);
        let sketch = tree.sketch(sk).unwrap();
        assert_eq!(sketch.constraints.len(), 1);
        let p = sketch.point(b).unwrap();
        assert_eq!((p.x, p.y), (4.96, 0.66));
    }

    #[test]
    fn test_execute_truncates_redo_tail() {
        let (mut tree, sk, a, b) = tree_with_sketch();
        let mut history = CommandHistory::new();
        history
            .execute(Command::add_line(sk, a, b), &mut tree)
            .unwrap();
        history.undo(&mut tree);
        assert!(history.can_redo());
        history
            .execute(
                Command::add_constraint(sk, ConstraintKind::Coincident { a, b }),
                &mut tree,
            )
            .unwrap();
        assert!(!history.can_redo(), "redo tail discarded");
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let (mut tree, sk, a, b) = tree_with_sketch();
        let mut history = CommandHistory::with_capacity(3);
        for i in 0..5 {
            history
                .execute(
                    Command::set_constraint_value(sk, 999, i as f64),
                    &mut tree,
                )
                .unwrap();
        }
        assert_eq!(history.len(), 3, "bounded by capacity");
        // a/b silence unused warnings in this minimal scenario.
        let _ = (a, b);
    }

    #[test]
    fn test_remove_constraint_round_trip() {
        let (mut tree, sk, a, b) = tree_with_sketch();
        let mut history = CommandHistory::new();
        let constraint_id = {
            let sketch = tree.sketch_mut(sk).unwrap();
            sketch
                .add_constraint(ConstraintKind::Distance { a, b, value: 2.0 })
                .unwrap()
        };
        history
            .execute(Command::remove_constraint(sk, constraint_id), &mut tree)
            .unwrap();
        assert!(tree.sketch(sk).unwrap().constraints.is_empty());
        history.undo(&mut tree);
        let sketch = tree.sketch(sk).unwrap();
        assert_eq!(sketch.constraints.len(), 1);
        assert_eq!(sketch.constraints[0].id, constraint_id);
        history.redo(&mut tree);
        assert!(tree.sketch(sk).unwrap().constraints.is_empty());
    }
}

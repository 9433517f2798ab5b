//! The parametric feature engine: an ordered feature history with dirty
//! propagation and regeneration, plus the bounded command history.
//!
//! [`Document`] bundles the tree, the undo history, display settings, and
//! the status line the UI shows; it is the single entry point an
//! application drives.

pub mod rebuild;
pub mod tree;
pub mod types;
pub mod undo;

use uuid::Uuid;

use caliper_types::{DocumentSettings, Sketch, Solid};
use mesh_kernel::MeshBoolean;
use modeling_ops::{ExtrudeDirection, RevolveAxis};

pub use rebuild::{regenerate, regenerate_all};
pub use tree::FeatureTree;
pub use types::{
    CutParams, EngineError, ExtrudeParams, Feature, FeatureKind, Operation, RevolveParams,
};
pub use undo::{Command, CommandHistory};

/// A modeling document: the feature tree, its undo history, and display
/// state. The tree owns every sketch and solid; callers hold only ids.
pub struct Document {
    pub tree: FeatureTree,
    pub history: CommandHistory,
    pub settings: DocumentSettings,
    status: String,
}

impl Document {
    pub fn new() -> Self {
        Self {
            tree: FeatureTree::new(),
            history: CommandHistory::new(),
            settings: DocumentSettings::default(),
            status: String::new(),
        }
    }

    // ── Feature construction ────────────────────────────────────────────

    pub fn add_sketch(&mut self, sketch: Sketch, name: &str) -> Uuid {
        let id = self.tree.add_sketch(sketch, name);
        self.status = format!("added sketch '{name}'");
        id
    }

    pub fn add_extrude(
        &mut self,
        sketch_id: Uuid,
        depth: f64,
        direction: ExtrudeDirection,
        name: &str,
    ) -> Result<Uuid, EngineError> {
        let id = self.tree.add_extrude(sketch_id, depth, direction, name)?;
        self.status = format!("added extrude '{name}'");
        Ok(id)
    }

    pub fn add_revolve(
        &mut self,
        sketch_id: Uuid,
        angle_degrees: f64,
        segments: usize,
        axis: RevolveAxis,
        name: &str,
    ) -> Result<Uuid, EngineError> {
        let id = self
            .tree
            .add_revolve(sketch_id, angle_degrees, segments, axis, name)?;
        self.status = format!("added revolve '{name}'");
        Ok(id)
    }

    pub fn add_cut(
        &mut self,
        tool_sketch_id: Uuid,
        base_feature_id: Uuid,
        depth: f64,
        direction: ExtrudeDirection,
        name: &str,
    ) -> Result<Uuid, EngineError> {
        let id = self
            .tree
            .add_cut(tool_sketch_id, base_feature_id, depth, direction, name)?;
        self.status = format!("added cut '{name}'");
        Ok(id)
    }

    // ── Parameter edits ─────────────────────────────────────────────────

    /// Change an extrude or cut depth, marking dependents dirty.
    pub fn set_feature_depth(&mut self, id: Uuid, depth: f64) -> Result<(), EngineError> {
        let feature = self
            .tree
            .get_mut(id)
            .ok_or(EngineError::FeatureNotFound { id })?;
        match &mut feature.operation {
            Operation::Extrude { params, .. } => params.depth = depth,
            Operation::Cut { params, .. } => params.depth = depth,
            _ => return Err(EngineError::InvalidReference { id }),
        }
        self.tree.mark_dirty(id);
        self.status = format!("depth set to {depth}");
        Ok(())
    }

    /// Change a revolve angle, marking dependents dirty.
    pub fn set_revolve_angle(&mut self, id: Uuid, angle_degrees: f64) -> Result<(), EngineError> {
        let feature = self
            .tree
            .get_mut(id)
            .ok_or(EngineError::FeatureNotFound { id })?;
        match &mut feature.operation {
            Operation::Revolve { params, .. } => params.angle_degrees = angle_degrees,
            _ => return Err(EngineError::InvalidReference { id }),
        }
        self.tree.mark_dirty(id);
        self.status = format!("angle set to {angle_degrees}");
        Ok(())
    }

    // ── Commands ────────────────────────────────────────────────────────

    pub fn execute(&mut self, cmd: Command) -> Result<(), EngineError> {
        self.history.execute(cmd, &mut self.tree)
    }

    pub fn undo(&mut self) -> bool {
        let done = self.history.undo(&mut self.tree);
        if done {
            self.status = "undo".into();
        }
        done
    }

    pub fn redo(&mut self) -> bool {
        let done = self.history.redo(&mut self.tree);
        if done {
            self.status = "redo".into();
        }
        done
    }

    // ── Regeneration ────────────────────────────────────────────────────

    pub fn regenerate_all(&mut self, kernel: &mut dyn MeshBoolean) -> bool {
        let ok = rebuild::regenerate_all(&mut self.tree, kernel);
        self.status = if ok {
            "regenerated".into()
        } else {
            "regeneration failed; see dirty features".into()
        };
        ok
    }

    /// Solids in the default render/export set.
    pub fn display_solids(&self) -> Vec<&Solid> {
        self.tree
            .display_features()
            .iter()
            .filter_map(|f| f.solid.as_ref())
            .collect()
    }

    /// The last user-actionable message, for the status bar.
    pub fn status_line(&self) -> &str {
        &self.status
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

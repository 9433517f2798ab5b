//! The fluent model builder used by scenario tests.

use std::collections::HashMap;

use uuid::Uuid;

use caliper_types::{Sketch, SketchPlane, Solid};
use feature_engine::{Document, EngineError};
use mesh_kernel::NativeBoolean;
use modeling_ops::{ExtrudeDirection, RevolveAxis};
use sketch_solver::SolverResult;

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("no feature named '{name}'")]
    UnknownName { name: String },

    #[error("duplicate feature name '{name}'")]
    DuplicateName { name: String },

    #[error("feature '{name}' has no solid")]
    NoSolid { name: String },

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Drives a document by feature name instead of id, mirroring how a user
/// works through the feature tree panel.
pub struct ModelBuilder {
    pub doc: Document,
    pub kernel: NativeBoolean,
    names: HashMap<String, Uuid>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self {
            doc: Document::new(),
            kernel: NativeBoolean::new(),
            names: HashMap::new(),
        }
    }

    fn register(&mut self, name: &str, id: Uuid) -> Result<Uuid, HarnessError> {
        if self.names.contains_key(name) {
            return Err(HarnessError::DuplicateName { name: name.into() });
        }
        self.names.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn id(&self, name: &str) -> Result<Uuid, HarnessError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| HarnessError::UnknownName { name: name.into() })
    }

    /// Add an arbitrary sketch feature.
    pub fn add_sketch(&mut self, name: &str, sketch: Sketch) -> Result<Uuid, HarnessError> {
        let id = self.doc.add_sketch(sketch, name);
        self.register(name, id)
    }

    /// Add an axis-aligned rectangle sketch on the XY plane.
    pub fn add_rect_sketch(
        &mut self,
        name: &str,
        x0: f64,
        y0: f64,
        width: f64,
        height: f64,
    ) -> Result<Uuid, HarnessError> {
        let sketch = rect_sketch_on(SketchPlane::xy(), x0, y0, width, height);
        self.add_sketch(name, sketch)
    }

    pub fn extrude(&mut self, name: &str, sketch: &str, depth: f64) -> Result<Uuid, HarnessError> {
        let sketch_id = self.id(sketch)?;
        let id = self
            .doc
            .add_extrude(sketch_id, depth, ExtrudeDirection::Forward, name)?;
        self.register(name, id)
    }

    pub fn revolve(
        &mut self,
        name: &str,
        sketch: &str,
        angle_degrees: f64,
        segments: usize,
        axis: RevolveAxis,
    ) -> Result<Uuid, HarnessError> {
        let sketch_id = self.id(sketch)?;
        let id = self
            .doc
            .add_revolve(sketch_id, angle_degrees, segments, axis, name)?;
        self.register(name, id)
    }

    pub fn cut(
        &mut self,
        name: &str,
        tool_sketch: &str,
        base: &str,
        depth: f64,
        direction: ExtrudeDirection,
    ) -> Result<Uuid, HarnessError> {
        let tool_id = self.id(tool_sketch)?;
        let base_id = self.id(base)?;
        let id = self
            .doc
            .add_cut(tool_id, base_id, depth, direction, name)?;
        self.register(name, id)
    }

    pub fn regenerate(&mut self) -> bool {
        self.doc.regenerate_all(&mut self.kernel)
    }

    /// Solve a sketch feature's constraints in place.
    pub fn solve(&mut self, sketch: &str) -> Result<SolverResult, HarnessError> {
        let id = self.id(sketch)?;
        let sk = self.doc.tree.sketch_mut(id)?;
        let result = sketch_solver::solve(sk);
        self.doc.tree.mark_dirty(id);
        Ok(result)
    }

    pub fn sketch(&self, name: &str) -> Result<&Sketch, HarnessError> {
        Ok(self.doc.tree.sketch(self.id(name)?)?)
    }

    pub fn sketch_mut(&mut self, name: &str) -> Result<&mut Sketch, HarnessError> {
        let id = self.id(name)?;
        Ok(self.doc.tree.sketch_mut(id)?)
    }

    pub fn solid(&self, name: &str) -> Result<&Solid, HarnessError> {
        let id = self.id(name)?;
        self.doc
            .tree
            .get(id)
            .and_then(|f| f.solid.as_ref())
            .ok_or_else(|| HarnessError::NoSolid { name: name.into() })
    }

    /// Names of the features in the default render/export set.
    pub fn display_names(&self) -> Vec<String> {
        self.doc
            .tree
            .display_features()
            .iter()
            .map(|f| f.name.clone())
            .collect()
    }
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An axis-aligned rectangle sketch on an arbitrary plane.
pub fn rect_sketch_on(plane: SketchPlane, x0: f64, y0: f64, width: f64, height: f64) -> Sketch {
    let mut s = Sketch::new("rect", plane);
    let p0 = s.add_point(x0, y0, false);
    let p1 = s.add_point(x0 + width, y0, false);
    let p2 = s.add_point(x0 + width, y0 + height, false);
    let p3 = s.add_point(x0, y0 + height, false);
    s.add_line(p0, p1).unwrap();
    s.add_line(p1, p2).unwrap();
    s.add_line(p2, p3).unwrap();
    s.add_line(p3, p0).unwrap();
    s
}

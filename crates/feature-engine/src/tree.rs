//! The feature tree: an ordered list of features where add order is
//! topological order by construction, since a feature can only reference
//! features that already exist.

use std::collections::HashSet;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use caliper_types::Sketch;
use modeling_ops::{ExtrudeDirection, RevolveAxis};

use crate::types::{
    CutParams, EngineError, ExtrudeParams, Feature, FeatureKind, Operation, RevolveParams,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureTree {
    pub features: Vec<Feature>,
}

impl FeatureTree {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Construction ────────────────────────────────────────────────────

    pub fn add_sketch(&mut self, sketch: Sketch, name: impl Into<String>) -> Uuid {
        let feature = Feature::new(name, Operation::Sketch { sketch });
        let id = feature.id;
        self.features.push(feature);
        id
    }

    pub fn add_extrude(
        &mut self,
        sketch_id: Uuid,
        depth: f64,
        direction: ExtrudeDirection,
        name: impl Into<String>,
    ) -> Result<Uuid, EngineError> {
        self.expect_sketch(sketch_id)?;
        let feature = Feature::new(
            name,
            Operation::Extrude {
                sketch_id,
                params: ExtrudeParams { depth, direction },
            },
        );
        let id = feature.id;
        self.features.push(feature);
        Ok(id)
    }

    pub fn add_revolve(
        &mut self,
        sketch_id: Uuid,
        angle_degrees: f64,
        segments: usize,
        axis: RevolveAxis,
        name: impl Into<String>,
    ) -> Result<Uuid, EngineError> {
        self.expect_sketch(sketch_id)?;
        let feature = Feature::new(
            name,
            Operation::Revolve {
                sketch_id,
                params: RevolveParams {
                    angle_degrees,
                    segments,
                    axis,
                },
            },
        );
        let id = feature.id;
        self.features.push(feature);
        Ok(id)
    }

    pub fn add_cut(
        &mut self,
        tool_sketch_id: Uuid,
        base_feature_id: Uuid,
        depth: f64,
        direction: ExtrudeDirection,
        name: impl Into<String>,
    ) -> Result<Uuid, EngineError> {
        self.expect_sketch(tool_sketch_id)?;
        let base = self
            .get(base_feature_id)
            .ok_or(EngineError::InvalidReference {
                id: base_feature_id,
            })?;
        if !base.produces_solid() {
            return Err(EngineError::InvalidReference {
                id: base_feature_id,
            });
        }
        let feature = Feature::new(
            name,
            Operation::Cut {
                tool_sketch_id,
                base_feature_id,
                params: CutParams { depth, direction },
            },
        );
        let id = feature.id;
        self.features.push(feature);
        Ok(id)
    }

    /// Validate an externally built feature and append it.
    pub(crate) fn push_validated(&mut self, feature: Feature) -> Result<(), EngineError> {
        for input in feature.inputs() {
            if self.get(input).is_none() {
                return Err(EngineError::InvalidReference { id: input });
            }
        }
        self.features.push(feature);
        Ok(())
    }

    pub(crate) fn insert_at(&mut self, feature: Feature, position: usize) {
        let position = position.min(self.features.len());
        self.features.insert(position, feature);
    }

    /// Remove a feature nothing depends on. Returns it with its position.
    pub fn remove(&mut self, id: Uuid) -> Result<(Feature, usize), EngineError> {
        let position = self
            .index_of(id)
            .ok_or(EngineError::FeatureNotFound { id })?;
        if !self.dependents_of(id).is_empty() {
            return Err(EngineError::HasDependents { id });
        }
        Ok((self.features.remove(position), position))
    }

    // ── Lookup ──────────────────────────────────────────────────────────

    pub fn get(&self, id: Uuid) -> Option<&Feature> {
        self.features.iter().find(|f| f.id == id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut Feature> {
        self.features.iter_mut().find(|f| f.id == id)
    }

    pub fn index_of(&self, id: Uuid) -> Option<usize> {
        self.features.iter().position(|f| f.id == id)
    }

    fn expect_sketch(&self, id: Uuid) -> Result<(), EngineError> {
        match self.get(id) {
            Some(f) if matches!(f.operation, Operation::Sketch { .. }) => Ok(()),
            Some(_) => Err(EngineError::NotASketch { id }),
            None => Err(EngineError::InvalidReference { id }),
        }
    }

    /// The sketch owned by a sketch feature.
    pub fn sketch(&self, id: Uuid) -> Result<&Sketch, EngineError> {
        match self.get(id) {
            Some(Feature {
                operation: Operation::Sketch { sketch },
                ..
            }) => Ok(sketch),
            Some(_) => Err(EngineError::NotASketch { id }),
            None => Err(EngineError::FeatureNotFound { id }),
        }
    }

    pub fn sketch_mut(&mut self, id: Uuid) -> Result<&mut Sketch, EngineError> {
        match self.get_mut(id) {
            Some(Feature {
                operation: Operation::Sketch { sketch },
                ..
            }) => Ok(sketch),
            Some(_) => Err(EngineError::NotASketch { id }),
            None => Err(EngineError::FeatureNotFound { id }),
        }
    }

    pub fn count_type(&self, kind: FeatureKind) -> usize {
        self.features.iter().filter(|f| f.kind() == kind).count()
    }

    // ── Dirty propagation ───────────────────────────────────────────────

    /// Features that list `id` among their inputs.
    pub fn dependents_of(&self, id: Uuid) -> Vec<Uuid> {
        self.features
            .iter()
            .filter(|f| f.inputs().contains(&id))
            .map(|f| f.id)
            .collect()
    }

    /// Mark a feature and everything transitively depending on it dirty.
    pub fn mark_dirty(&mut self, id: Uuid) {
        let mut frontier = vec![id];
        let mut seen: HashSet<Uuid> = HashSet::new();
        while let Some(current) = frontier.pop() {
            if !seen.insert(current) {
                continue;
            }
            if let Some(f) = self.get_mut(current) {
                f.dirty = true;
            }
            frontier.extend(self.dependents_of(current));
        }
    }

    // ── Output sets ─────────────────────────────────────────────────────

    /// Features consumed as the base of an enabled cut; their solids are
    /// superseded by the cut result.
    pub fn consumed_ids(&self) -> HashSet<Uuid> {
        self.features
            .iter()
            .filter(|f| f.enabled)
            .filter_map(|f| match f.operation {
                Operation::Cut {
                    base_feature_id, ..
                } => Some(base_feature_id),
                _ => None,
            })
            .collect()
    }

    /// The default render/export set: enabled, visible, un-consumed
    /// features holding a solid.
    pub fn display_features(&self) -> Vec<&Feature> {
        let consumed = self.consumed_ids();
        self.features
            .iter()
            .filter(|f| f.enabled && f.visible && !consumed.contains(&f.id))
            .filter(|f| f.solid.is_some())
            .collect()
    }

    // ── Diagnostics ─────────────────────────────────────────────────────

    /// One line per feature: kind, name, flags.
    pub fn describe(&self) -> String {
        let consumed = self.consumed_ids();
        let mut out = String::new();
        for (i, f) in self.features.iter().enumerate() {
            let mut flags = String::new();
            if !f.enabled {
                flags.push_str(" disabled");
            }
            if f.dirty {
                flags.push_str(" dirty");
            }
            if consumed.contains(&f.id) {
                flags.push_str(" consumed");
            }
            if f.solid.is_some() {
                flags.push_str(" solid");
            }
            let _ = writeln!(out, "[{i}] {:?} '{}'{}", f.kind(), f.name, flags);
        }
        out
    }

    pub fn print(&self) {
        for line in self.describe().lines() {
            tracing::info!("{line}");
        }
    }
}

//! Regeneration: rebuilds dirty features in dependency order.
//!
//! `regenerate` ensures a feature's predecessors are current (recursive
//! pre-order), then rebuilds the feature itself if dirty. Failure clears
//! the cached result and leaves the feature dirty so a later retry can
//! succeed; no partial result is ever published.

use uuid::Uuid;

use caliper_types::Solid;
use mesh_kernel::MeshBoolean;
use modeling_ops::{cut_with_tool, extrude_profile, revolve_profile};
use sketch_solver::first_closed_profile;

use crate::tree::FeatureTree;
use crate::types::{CutParams, ExtrudeParams, Operation, RevolveParams};

enum Plan {
    Sketch,
    Extrude(Uuid, ExtrudeParams),
    Revolve(Uuid, RevolveParams),
    Cut(Uuid, Uuid, CutParams),
}

/// Regenerate one feature (and, first, everything it depends on).
/// Returns false when any step fails.
pub fn regenerate(tree: &mut FeatureTree, id: Uuid, kernel: &mut dyn MeshBoolean) -> bool {
    let Some(feature) = tree.get(id) else {
        return false;
    };
    if !feature.enabled {
        return true;
    }

    for input in feature.inputs() {
        if !regenerate(tree, input, kernel) {
            fail(tree, id, "an input failed to regenerate");
            return false;
        }
    }

    let feature = match tree.get(id) {
        Some(f) if f.dirty => f,
        Some(_) => return true,
        None => return false,
    };

    let plan = match &feature.operation {
        Operation::Sketch { .. } => Plan::Sketch,
        Operation::Extrude { sketch_id, params } => Plan::Extrude(*sketch_id, *params),
        Operation::Revolve { sketch_id, params } => Plan::Revolve(*sketch_id, *params),
        Operation::Cut {
            tool_sketch_id,
            base_feature_id,
            params,
        } => Plan::Cut(*tool_sketch_id, *base_feature_id, *params),
    };

    let outcome: Result<Option<Solid>, String> = match plan {
        Plan::Sketch => Ok(None),
        Plan::Extrude(sketch_id, params) => build_extrude(tree, sketch_id, params).map(Some),
        Plan::Revolve(sketch_id, params) => build_revolve(tree, sketch_id, params).map(Some),
        Plan::Cut(tool_id, base_id, params) => {
            build_cut(tree, tool_id, base_id, params, kernel).map(Some)
        }
    };

    match outcome {
        Ok(solid) => {
            let Some(f) = tree.get_mut(id) else {
                return false;
            };
            if f.produces_solid() {
                f.solid = solid;
            }
            f.dirty = false;
            true
        }
        Err(reason) => {
            fail(tree, id, &reason);
            false
        }
    }
}

/// Walk the whole tree in topological (add) order, regenerating each dirty
/// feature once. Returns true when everything succeeded.
pub fn regenerate_all(tree: &mut FeatureTree, kernel: &mut dyn MeshBoolean) -> bool {
    let ids: Vec<Uuid> = tree.features.iter().map(|f| f.id).collect();
    let mut ok = true;
    for id in ids {
        let dirty = tree.get(id).map(|f| f.dirty && f.enabled).unwrap_or(false);
        if dirty {
            ok &= regenerate(tree, id, kernel);
        }
    }
    ok
}

fn fail(tree: &mut FeatureTree, id: Uuid, reason: &str) {
    if let Some(f) = tree.get_mut(id) {
        tracing::warn!(feature = %f.name, reason, "regeneration failed");
        f.solid = None;
        // Stays dirty for a later retry.
    }
}

fn build_extrude(
    tree: &FeatureTree,
    sketch_id: Uuid,
    params: ExtrudeParams,
) -> Result<Solid, String> {
    let sketch = tree.sketch(sketch_id).map_err(|e| e.to_string())?;
    let profile = first_closed_profile(sketch).ok_or("no closed profile available")?;
    extrude_profile(sketch, &profile, params.depth, params.direction).map_err(|e| e.to_string())
}

fn build_revolve(
    tree: &FeatureTree,
    sketch_id: Uuid,
    params: RevolveParams,
) -> Result<Solid, String> {
    let sketch = tree.sketch(sketch_id).map_err(|e| e.to_string())?;
    let profile = first_closed_profile(sketch).ok_or("no closed profile available")?;
    revolve_profile(
        sketch,
        &profile,
        params.angle_degrees,
        params.segments,
        params.axis,
    )
    .map_err(|e| e.to_string())
}

fn build_cut(
    tree: &FeatureTree,
    tool_sketch_id: Uuid,
    base_feature_id: Uuid,
    params: CutParams,
    kernel: &mut dyn MeshBoolean,
) -> Result<Solid, String> {
    let base = tree
        .get(base_feature_id)
        .and_then(|f| f.solid.as_ref())
        .ok_or("cut base has no solid result")?;
    let sketch = tree.sketch(tool_sketch_id).map_err(|e| e.to_string())?;
    let profile = first_closed_profile(sketch).ok_or("no closed profile available")?;
    cut_with_tool(base, sketch, &profile, params.depth, params.direction, kernel)
        .map_err(|e| e.to_string())
}

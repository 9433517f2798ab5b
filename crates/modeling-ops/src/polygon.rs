//! Flattens a closed profile into a 2D polygon, sampling arcs and circles
//! into line segments.

use caliper_types::{Profile, Sketch, SketchEntity};

use crate::types::OpError;

/// Segments used for a full circle; arcs get a proportional share.
pub const CIRCLE_SEGMENTS: usize = 32;

/// Sample a closed profile into an ordered 2D polygon (counterclockwise,
/// no repeated closing point).
pub fn profile_polygon(sketch: &Sketch, profile: &Profile) -> Result<Vec<[f64; 2]>, OpError> {
    if !profile.is_closed() {
        return Err(OpError::ProfileNotClosed);
    }

    // A lone circle samples into a full polygon.
    if profile.entity_ids.len() == 1 {
        if let Ok(SketchEntity::Circle { center, radius, .. }) =
            sketch.entity(profile.entity_ids[0])
        {
            let c = sketch
                .point_pos(*center)
                .map_err(|_| OpError::InvalidReference { id: *center })?;
            let mut polygon = Vec::with_capacity(CIRCLE_SEGMENTS);
            for i in 0..CIRCLE_SEGMENTS {
                let theta = std::f64::consts::TAU * i as f64 / CIRCLE_SEGMENTS as f64;
                polygon.push([c[0] + radius * theta.cos(), c[1] + radius * theta.sin()]);
            }
            return Ok(polygon);
        }
    }

    let n = profile.entity_ids.len();
    if n != profile.point_ids.len() || n < 3 {
        return Err(OpError::InvalidGeometry {
            reason: "malformed profile".into(),
        });
    }

    let mut polygon = Vec::new();
    for i in 0..n {
        let entity_id = profile.entity_ids[i];
        let origin_id = profile.point_ids[i];
        let target_id = profile.point_ids[(i + 1) % n];
        let origin = sketch
            .point_pos(origin_id)
            .map_err(|_| OpError::InvalidReference { id: origin_id })?;

        match sketch.entity(entity_id) {
            Ok(SketchEntity::Line { .. }) => polygon.push(origin),
            Ok(SketchEntity::Arc { center, start, .. }) => {
                let c = sketch
                    .point_pos(*center)
                    .map_err(|_| OpError::InvalidReference { id: *center })?;
                let target = sketch
                    .point_pos(target_id)
                    .map_err(|_| OpError::InvalidReference { id: target_id })?;
                let radius = ((origin[0] - c[0]).powi(2) + (origin[1] - c[1]).powi(2)).sqrt();
                let a0 = (origin[1] - c[1]).atan2(origin[0] - c[0]);
                let a1 = (target[1] - c[1]).atan2(target[0] - c[0]);
                // The arc is counterclockwise from its own start point; a
                // profile traversing it backwards sweeps clockwise.
                let forward = origin_id == *start;
                let tau = std::f64::consts::TAU;
                let span = if forward {
                    ((a1 - a0) % tau + tau) % tau
                } else {
                    -(((a0 - a1) % tau + tau) % tau)
                };
                let steps = ((span.abs() / tau * CIRCLE_SEGMENTS as f64).ceil() as usize).max(2);
                polygon.push(origin);
                for k in 1..steps {
                    let theta = a0 + span * k as f64 / steps as f64;
                    polygon.push([c[0] + radius * theta.cos(), c[1] + radius * theta.sin()]);
                }
            }
            Ok(SketchEntity::Circle { .. }) => {
                return Err(OpError::InvalidGeometry {
                    reason: "circle inside a multi-entity profile".into(),
                })
            }
            Err(_) => return Err(OpError::InvalidReference { id: entity_id }),
        }
    }

    if polygon.len() < 3 {
        return Err(OpError::InvalidGeometry {
            reason: "profile collapses to fewer than three points".into(),
        });
    }
    Ok(polygon)
}

/// Signed area of a 2D polygon (positive = counterclockwise).
pub fn polygon_area(polygon: &[[f64; 2]]) -> f64 {
    let n = polygon.len();
    let mut area = 0.0;
    for i in 0..n {
        let p = polygon[i];
        let q = polygon[(i + 1) % n];
        area += p[0] * q[1] - q[0] * p[1];
    }
    area / 2.0
}

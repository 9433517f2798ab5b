//! Cursor snapping rules.

use caliper_types::Sketch;

/// Grid pitch used while the snap modifier is held.
pub const GRID_STEP: f64 = 0.1;

/// Snap a sketch-space position to the grid, but only while the modifier
/// key is held; otherwise coordinates pass through untouched.
pub fn snap_to_grid(pos: [f64; 2], modifier_held: bool) -> [f64; 2] {
    if !modifier_held {
        return pos;
    }
    [
        (pos[0] / GRID_STEP).round() * GRID_STEP,
        (pos[1] / GRID_STEP).round() * GRID_STEP,
    ]
}

/// Nearest sketch point within `radius` of the position, if any.
pub fn nearest_point(sketch: &Sketch, pos: [f64; 2], radius: f64) -> Option<u32> {
    let mut best: Option<(u32, f64)> = None;
    for p in &sketch.points {
        let d = ((p.x - pos[0]).powi(2) + (p.y - pos[1]).powi(2)).sqrt();
        if d <= radius && best.map(|(_, bd)| d < bd).unwrap_or(true) {
            best = Some((p.id, d));
        }
    }
    best.map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use caliper_types::SketchPlane;

    #[test]
    fn test_grid_snap_only_with_modifier() {
        let raw = [0.13, 0.27];
        assert_eq!(snap_to_grid(raw, false), raw);
        let snapped = snap_to_grid(raw, true);
        assert!((snapped[0] - 0.1).abs() < 1e-12);
        assert!((snapped[1] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_nearest_point_respects_radius() {
        let mut s = Sketch::new("t", SketchPlane::xy());
        let a = s.add_point(0.0, 0.0, false);
        let _b = s.add_point(1.0, 0.0, false);
        assert_eq!(nearest_point(&s, [0.05, 0.05], 0.15), Some(a));
        assert_eq!(nearest_point(&s, [0.5, 0.5], 0.15), None);
    }
}

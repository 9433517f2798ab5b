//! Drag-threshold and double-click policies.
//!
//! Timestamps arrive from the event loop as seconds; nothing here reads a
//! clock.

/// Cursor travel (in sketch units) before a pending press becomes a drag.
pub const DRAG_THRESHOLD: f64 = 0.05;

/// Maximum gap in seconds between two clicks of a double click.
pub const DOUBLE_CLICK_THRESHOLD: f64 = 0.5;

/// What a mouse-up on a dimension resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Nothing was pending.
    None,
    /// The press never travelled past the threshold: treat as a click
    /// (this is what makes double-click editing possible).
    Click(u32),
    /// An actual drag just finished.
    DragEnd(u32),
}

/// Tracks a press on a dimension label that may turn into a drag.
#[derive(Debug, Default)]
pub struct DragTracker {
    pending: Option<(u32, [f64; 2])>,
    active: Option<u32>,
}

impl DragTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A press landed on a constraint's label.
    pub fn mouse_down(&mut self, constraint: u32, pos: [f64; 2]) {
        self.pending = Some((constraint, pos));
        self.active = None;
    }

    /// Cursor moved. Returns the constraint id while a drag is active so
    /// the caller can forward the position to the sketch.
    pub fn mouse_move(&mut self, pos: [f64; 2]) -> Option<u32> {
        if let Some(id) = self.active {
            return Some(id);
        }
        if let Some((id, start)) = self.pending {
            let travel = ((pos[0] - start[0]).powi(2) + (pos[1] - start[1]).powi(2)).sqrt();
            if travel > DRAG_THRESHOLD {
                self.active = Some(id);
                return Some(id);
            }
        }
        None
    }

    pub fn mouse_up(&mut self) -> ClickOutcome {
        let outcome = match (self.active, self.pending) {
            (Some(id), _) => ClickOutcome::DragEnd(id),
            (None, Some((id, _))) => ClickOutcome::Click(id),
            (None, None) => ClickOutcome::None,
        };
        self.pending = None;
        self.active = None;
        outcome
    }

    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }
}

/// Detects double clicks on ids (constraints, features) from event
/// timestamps.
#[derive(Debug, Default)]
pub struct DoubleClickTracker {
    last: Option<(u32, f64)>,
}

impl DoubleClickTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a click; returns true when it completes a double click on
    /// the same id.
    pub fn click(&mut self, id: u32, now_seconds: f64) -> bool {
        let double = matches!(
            self.last,
            Some((last_id, at)) if last_id == id && now_seconds - at <= DOUBLE_CLICK_THRESHOLD
        );
        // A completed double click resets so a triple click does not count
        // as two doubles.
        self.last = if double { None } else { Some((id, now_seconds)) };
        double
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_without_travel_is_click() {
        let mut drag = DragTracker::new();
        drag.mouse_down(7, [1.0, 1.0]);
        assert_eq!(drag.mouse_move([1.01, 1.01]), None, "below threshold");
        assert_eq!(drag.mouse_up(), ClickOutcome::Click(7));
    }

    #[test]
    fn test_press_with_travel_becomes_drag() {
        let mut drag = DragTracker::new();
        drag.mouse_down(7, [1.0, 1.0]);
        assert_eq!(drag.mouse_move([1.1, 1.0]), Some(7));
        assert!(drag.is_dragging());
        assert_eq!(drag.mouse_up(), ClickOutcome::DragEnd(7));
        assert!(!drag.is_dragging());
    }

    #[test]
    fn test_double_click_same_id_within_window() {
        let mut dc = DoubleClickTracker::new();
        assert!(!dc.click(3, 10.0));
        assert!(dc.click(3, 10.3));
    }

    #[test]
    fn test_double_click_expires() {
        let mut dc = DoubleClickTracker::new();
        assert!(!dc.click(3, 10.0));
        assert!(!dc.click(3, 10.6), "past the threshold");
    }

    #[test]
    fn test_double_click_different_id_resets() {
        let mut dc = DoubleClickTracker::new();
        assert!(!dc.click(3, 10.0));
        assert!(!dc.click(4, 10.2));
        assert!(dc.click(4, 10.3));
    }

    #[test]
    fn test_triple_click_is_one_double() {
        let mut dc = DoubleClickTracker::new();
        assert!(!dc.click(3, 10.0));
        assert!(dc.click(3, 10.2));
        assert!(!dc.click(3, 10.4), "third click starts a new sequence");
    }
}

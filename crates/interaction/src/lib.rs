//! Interaction policy: face picking, snapping, and the drag/double-click
//! gesture rules.
//!
//! Everything here is pure with respect to time and input: timestamps and
//! modifier state are passed in by the windowing collaborator, so the
//! policies are deterministic and directly testable.

pub mod gesture;
pub mod picking;
pub mod snap;

pub use gesture::{ClickOutcome, DoubleClickTracker, DragTracker, DOUBLE_CLICK_THRESHOLD, DRAG_THRESHOLD};
pub use picking::{pick_face, point_in_polygon, ray_plane, ray_through_ndc, Ray};
pub use snap::{nearest_point, snap_to_grid, GRID_STEP};

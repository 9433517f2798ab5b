//! Modeling operations: profile tessellation into solids (extrude,
//! revolve), solid/indexed-mesh conversion, and cut execution through the
//! mesh-boolean kernel.

pub mod convert;
pub mod cut;
pub mod extrude;
pub mod polygon;
pub mod revolve;
pub mod types;

pub use convert::{mesh_to_solid, solid_to_mesh};
pub use cut::cut_with_tool;
pub use extrude::extrude_profile;
pub use polygon::profile_polygon;
pub use revolve::revolve_profile;
pub use types::{ExtrudeDirection, OpError, RevolveAxis};

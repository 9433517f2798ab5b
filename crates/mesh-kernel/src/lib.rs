//! The mesh-boolean kernel seam.
//!
//! Modeling code consumes boolean operations only through the
//! [`MeshBoolean`] trait: wrap an indexed mesh into an opaque handle, run
//! difference/union/intersection, extract the result, release every handle.
//! [`NativeBoolean`] is the in-process backend; an external kernel can be
//! dropped in behind the same trait.

pub mod native;
pub mod traits;
pub mod types;

pub use native::NativeBoolean;
pub use traits::{validate_orientation_convention, MeshBoolean};
pub use types::{IndexedMesh, KernelError, MeshHandle, MeshStatus};

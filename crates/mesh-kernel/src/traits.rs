//! The contract the core uses to talk to a mesh-boolean kernel.

use crate::types::{IndexedMesh, KernelError, MeshHandle, MeshStatus};

/// Handle-based boolean kernel over watertight triangle meshes.
///
/// Input meshes must be orientable and watertight with positive signed
/// volume; `wrap` rejects anything else. Handles are exclusive: pass them
/// back to `release` when done.
pub trait MeshBoolean {
    /// Validate a mesh and take ownership of a copy, returning a handle.
    fn wrap(&mut self, mesh: &IndexedMesh) -> Result<MeshHandle, KernelError>;

    /// Query volume and counts for a wrapped mesh.
    fn status(&self, handle: &MeshHandle) -> Result<MeshStatus, KernelError>;

    /// `a` minus `b`.
    fn difference(
        &mut self,
        a: &MeshHandle,
        b: &MeshHandle,
    ) -> Result<MeshHandle, KernelError>;

    fn union(&mut self, a: &MeshHandle, b: &MeshHandle) -> Result<MeshHandle, KernelError>;

    fn intersection(
        &mut self,
        a: &MeshHandle,
        b: &MeshHandle,
    ) -> Result<MeshHandle, KernelError>;

    /// Copy a wrapped mesh back out.
    fn extract(&self, handle: &MeshHandle) -> Result<IndexedMesh, KernelError>;

    /// Free a handle. Dropping a handle without releasing leaks it for the
    /// kernel session.
    fn release(&mut self, handle: MeshHandle);
}

/// Startup check of the kernel's sign convention: a known outward-wound
/// cube must report positive volume.
pub fn validate_orientation_convention(
    kernel: &mut dyn MeshBoolean,
) -> Result<(), KernelError> {
    let cube = IndexedMesh::axis_aligned_box([0.0; 3], [1.0; 3]);
    let handle = kernel.wrap(&cube)?;
    let status = kernel.status(&handle);
    kernel.release(handle);
    let status = status?;
    if status.volume > 0.0 {
        Ok(())
    } else {
        Err(KernelError::InvalidMesh {
            reason: format!(
                "kernel reports volume {} for a unit cube; sign convention mismatch",
                status.volume
            ),
        })
    }
}

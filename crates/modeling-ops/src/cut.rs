//! Cut execution: extrude the tool profile, subtract it from the base
//! through the mesh-boolean kernel, and re-import the result.

use caliper_types::{Profile, Sketch, Solid, EPS_COINCIDENT, EPS_ZERO_LENGTH};
use mesh_kernel::MeshBoolean;

use crate::convert::{mesh_to_solid, solid_to_mesh};
use crate::extrude::{extrude_polygon, offsets};
use crate::polygon::profile_polygon;
use crate::types::{ExtrudeDirection, OpError};

/// Subtract an extruded tool profile from a base solid.
///
/// The tool prism is inflated along the extrusion axis by the coincidence
/// epsilon so coplanar tool and base caps cannot leave a zero-thickness
/// film in the difference.
pub fn cut_with_tool(
    base: &Solid,
    sketch: &Sketch,
    profile: &Profile,
    depth: f64,
    direction: ExtrudeDirection,
    kernel: &mut dyn MeshBoolean,
) -> Result<Solid, OpError> {
    if depth <= EPS_ZERO_LENGTH {
        return Err(OpError::InvalidGeometry {
            reason: format!("non-positive cut depth {depth}"),
        });
    }
    let polygon = profile_polygon(sketch, profile)?;
    let (w0, w1) = offsets(depth, direction);
    let tool = extrude_polygon(
        &sketch.plane,
        &polygon,
        w0 - EPS_COINCIDENT,
        w1 + EPS_COINCIDENT,
    )?;

    let base_mesh = solid_to_mesh(base)?;
    let tool_mesh = solid_to_mesh(&tool)?;

    let base_handle = kernel.wrap(&base_mesh)?;
    let tool_handle = match kernel.wrap(&tool_mesh) {
        Ok(h) => h,
        Err(e) => {
            kernel.release(base_handle);
            return Err(e.into());
        }
    };

    let result = kernel.difference(&base_handle, &tool_handle);
    kernel.release(base_handle);
    kernel.release(tool_handle);

    let result_handle = result?;
    let out = kernel.extract(&result_handle);
    kernel.release(result_handle);

    let solid = mesh_to_solid(&out?);
    tracing::debug!(
        volume = solid.signed_volume(),
        triangles = solid.triangles.len(),
        "cut complete"
    );
    Ok(solid)
}

//! Binary STL writer.
//!
//! Layout: 80-byte header, little-endian u32 triangle count, then 50 bytes
//! per triangle (normal + three vertices as f32 triples, u16 attribute
//! count of zero). File size is always 84 + 50 * N.

use std::path::Path;

use serde::{Deserialize, Serialize};

use caliper_types::Solid;
use feature_engine::FeatureTree;

use crate::errors::ExportError;

/// Outcome of an export, surfaced to the status bar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportReport {
    pub success: bool,
    pub message: String,
    pub triangle_count: usize,
    pub bytes_written: usize,
}

/// Serialize solids into one binary STL buffer.
pub fn write_binary_stl(solids: &[&Solid], name: &str) -> Result<Vec<u8>, ExportError> {
    let triangle_count: usize = solids.iter().map(|s| s.triangles.len()).sum();
    if triangle_count == 0 {
        return Err(ExportError::EmptyExport);
    }

    let mut buf = Vec::with_capacity(84 + triangle_count * 50);

    // 80-byte header, zero padded.
    let header = format!("binary STL: {name}");
    let header_bytes = header.as_bytes();
    buf.extend_from_slice(&header_bytes[..header_bytes.len().min(80)]);
    buf.resize(80, 0u8);

    buf.extend_from_slice(&(triangle_count as u32).to_le_bytes());

    for solid in solids {
        for t in &solid.triangles {
            for component in t.normal {
                buf.extend_from_slice(&(component as f32).to_le_bytes());
            }
            for vertex in [t.a, t.b, t.c] {
                for component in vertex {
                    buf.extend_from_slice(&(component as f32).to_le_bytes());
                }
            }
            buf.extend_from_slice(&0u16.to_le_bytes());
        }
    }

    Ok(buf)
}

/// Export the tree's display set (enabled, visible, not consumed by a cut)
/// to a binary STL file.
pub fn export_tree_to_file(
    tree: &FeatureTree,
    path: impl AsRef<Path>,
) -> Result<ExportReport, ExportError> {
    let solids: Vec<&Solid> = tree
        .display_features()
        .iter()
        .filter_map(|f| f.solid.as_ref())
        .collect();
    let name = path
        .as_ref()
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("model");
    let buf = write_binary_stl(&solids, name)?;
    std::fs::write(path.as_ref(), &buf)?;

    let triangle_count: usize = solids.iter().map(|s| s.triangles.len()).sum();
    tracing::info!(
        path = %path.as_ref().display(),
        triangles = triangle_count,
        bytes = buf.len(),
        "exported STL"
    );
    Ok(ExportReport {
        success: true,
        message: format!("wrote {} triangles", triangle_count),
        triangle_count,
        bytes_written: buf.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use caliper_types::{Sketch, SketchPlane};
    use feature_engine::FeatureTree;
    use mesh_kernel::NativeBoolean;
    use modeling_ops::ExtrudeDirection;

    fn rect_sketch(x0: f64, y0: f64, w: f64, h: f64) -> Sketch {
        let mut s = Sketch::new("profile", SketchPlane::xy());
        let p0 = s.add_point(x0, y0, false);
        let p1 = s.add_point(x0 + w, y0, false);
        let p2 = s.add_point(x0 + w, y0 + h, false);
        let p3 = s.add_point(x0, y0 + h, false);
        s.add_line(p0, p1).unwrap();
        s.add_line(p1, p2).unwrap();
        s.add_line(p2, p3).unwrap();
        s.add_line(p3, p0).unwrap();
        s
    }

    fn built_tree() -> FeatureTree {
        let mut tree = FeatureTree::new();
        let mut kernel = NativeBoolean::new();
        let sk = tree.add_sketch(rect_sketch(0.0, 0.0, 2.0, 2.0), "sk");
        tree.add_extrude(sk, 1.0, ExtrudeDirection::Forward, "pad")
            .unwrap();
        assert!(feature_engine::regenerate_all(&mut tree, &mut kernel));
        tree
    }

    #[test]
    fn test_stl_layout_and_size() {
        let tree = built_tree();
        let solids: Vec<_> = tree
            .display_features()
            .iter()
            .filter_map(|f| f.solid.as_ref())
            .collect();
        let buf = write_binary_stl(&solids, "pad").unwrap();

        let n = solids.iter().map(|s| s.triangles.len()).sum::<usize>();
        assert_eq!(n, 12);
        assert_eq!(buf.len(), 84 + 50 * n);
        let count = u32::from_le_bytes(buf[80..84].try_into().unwrap());
        assert_eq!(count as usize, n);
        // Attribute byte count of the first triangle is zero.
        let attr = u16::from_le_bytes(buf[84 + 48..84 + 50].try_into().unwrap());
        assert_eq!(attr, 0);
    }

    #[test]
    fn test_empty_export_is_error() {
        let tree = FeatureTree::new();
        let solids: Vec<&caliper_types::Solid> = Vec::new();
        assert!(matches!(
            write_binary_stl(&solids, "empty"),
            Err(ExportError::EmptyExport)
        ));
        let _ = tree;
    }

    #[test]
    fn test_cut_base_omitted_from_export() {
        let mut tree = FeatureTree::new();
        let mut kernel = NativeBoolean::new();
        let sk = tree.add_sketch(rect_sketch(0.0, 0.0, 4.0, 4.0), "sk");
        let base = tree
            .add_extrude(sk, 2.0, ExtrudeDirection::Forward, "pad")
            .unwrap();
        let tool = tree.add_sketch(rect_sketch(1.0, 1.0, 2.0, 2.0), "tool");
        tree.add_cut(tool, base, 3.0, ExtrudeDirection::Forward, "pocket")
            .unwrap();
        assert!(feature_engine::regenerate_all(&mut tree, &mut kernel));

        let solids: Vec<_> = tree
            .display_features()
            .iter()
            .filter_map(|f| f.solid.as_ref())
            .collect();
        assert_eq!(solids.len(), 1, "only the cut result is exported");

        // The exported triangle count matches the cut result, not the base.
        let base_triangles = tree.get(base).unwrap().solid.as_ref().unwrap().triangles.len();
        let buf = write_binary_stl(&solids, "pocket").unwrap();
        let count = u32::from_le_bytes(buf[80..84].try_into().unwrap()) as usize;
        assert_eq!(count, solids[0].triangles.len());
        assert_ne!(count, base_triangles);
    }

    #[test]
    fn test_export_to_file_reports() {
        let tree = built_tree();
        let dir = std::env::temp_dir().join("caliper_stl_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("pad.stl");
        let report = export_tree_to_file(&tree, &path).unwrap();
        assert!(report.success);
        assert_eq!(report.triangle_count, 12);
        let on_disk = std::fs::metadata(&path).unwrap().len() as usize;
        assert_eq!(on_disk, report.bytes_written);
        std::fs::remove_file(&path).ok();
    }
}

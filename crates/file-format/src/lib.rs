//! On-disk output: binary STL export of the feature tree's display set.

pub mod errors;
pub mod stl;

pub use errors::ExportError;
pub use stl::{export_tree_to_file, write_binary_stl, ExportReport};

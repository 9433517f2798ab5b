//! Export error type.

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("nothing to export: no visible solids")]
    EmptyExport,

    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
}

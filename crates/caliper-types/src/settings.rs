//! Document settings: display units and dimension formatting.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Unit {
    #[default]
    Millimeters,
    Inches,
}

impl Unit {
    pub fn suffix(&self) -> &'static str {
        match self {
            Unit::Millimeters => "mm",
            Unit::Inches => "in",
        }
    }
}

/// Per-document display settings. The core is unit-agnostic; these only
/// affect how dimensions are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DocumentSettings {
    pub unit: Unit,
    pub show_unit_suffix: bool,
    /// Decimal places shown on dimension labels.
    pub precision: usize,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            unit: Unit::Millimeters,
            show_unit_suffix: true,
            precision: 2,
        }
    }
}

impl DocumentSettings {
    pub fn format_dimension(&self, value: f64) -> String {
        if self.show_unit_suffix {
            format!("{:.*} {}", self.precision, value, self.unit.suffix())
        } else {
            format!("{:.*}", self.precision, value)
        }
    }
}

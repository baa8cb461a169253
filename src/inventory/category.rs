//! Inventory categories (profiler data types).
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const DATA_TYPE_PREFIX: &str = "SP";
const DATA_TYPE_SUFFIX: &str = "DataType";

/// A named domain of host metadata, e.g. `Hardware` or `Applications`.
///
/// Construction does not validate the name; the inventory cache checks it
/// against the profiler's live list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InventoryCategory(String);

impl InventoryCategory {
    /// Create a category from its short name (`Hardware`).
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The `Hardware` category.
    #[must_use]
    pub fn hardware() -> Self {
        Self::new("Hardware")
    }

    /// Short name, e.g. `Hardware`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Profiler data type, e.g. `SPHardwareDataType`.
    #[must_use]
    pub fn data_type(&self) -> String {
        format!("{DATA_TYPE_PREFIX}{}{DATA_TYPE_SUFFIX}", self.0)
    }

    /// Parse a profiler data type name (`SPHardwareDataType`).
    #[must_use]
    pub fn from_data_type(data_type: &str) -> Option<Self> {
        data_type
            .strip_prefix(DATA_TYPE_PREFIX)?
            .strip_suffix(DATA_TYPE_SUFFIX)
            .filter(|name| !name.is_empty())
            .map(Self::new)
    }
}

impl fmt::Display for InventoryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for InventoryCategory {
    type Err = std::convert::Infallible;

    /// Accepts either the short name or the full data type name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(Self::from_data_type(s).unwrap_or_else(|| Self::new(s)))
    }
}

/// Parse `system_profiler -listDataTypes` output into a sorted category list.
///
/// The first line is a header ("Available Datatypes:"); only `SP...DataType`
/// lines are kept.
#[must_use]
pub fn parse_data_type_list(output: &str) -> Vec<InventoryCategory> {
    let mut categories: Vec<InventoryCategory> = output
        .lines()
        .filter_map(|line| InventoryCategory::from_data_type(line.trim()))
        .collect();
    categories.sort();
    categories.dedup();
    categories
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn data_type_roundtrip() {
        let c = InventoryCategory::hardware();
        assert_eq!(c.data_type(), "SPHardwareDataType");
        assert_eq!(InventoryCategory::from_data_type("SPHardwareDataType"), Some(c));
    }

    #[test]
    fn from_data_type_rejects_other_text() {
        assert_eq!(InventoryCategory::from_data_type("Available Datatypes:"), None);
        assert_eq!(InventoryCategory::from_data_type("SPDataType"), None);
    }

    #[test]
    fn from_str_accepts_both_forms() {
        let short: InventoryCategory = "Network".parse().unwrap();
        let long: InventoryCategory = "SPNetworkDataType".parse().unwrap();
        assert_eq!(short, long);
        assert_eq!(short.to_string(), "Network");
    }

    #[test]
    fn parses_list_data_types_output() {
        let output = "Available Datatypes:\nSPSoftwareDataType\nSPHardwareDataType\nSPApplicationsDataType\n\nSPHardwareDataType\n";
        let names: Vec<String> = parse_data_type_list(output)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(names, vec!["Applications", "Hardware", "Software"]);
    }
}

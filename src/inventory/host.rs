//! Laptop/desktop detection from the Hardware inventory.
use std::fmt;

use super::cache::InventoryCache;
use super::category::InventoryCategory;
use crate::error::Result;

const MODEL_FIELD: &str = "machine_model";
const PORTABLE_MARKER: &str = "Book";

/// Form factor of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKind {
    /// A portable (`MacBook*`) model.
    Laptop,
    /// Everything else.
    Desktop,
}

impl HostKind {
    /// Classify a hardware model identifier such as `MacBookPro18,1`.
    #[must_use]
    pub fn from_model(model: &str) -> Self {
        if model.contains(PORTABLE_MARKER) {
            Self::Laptop
        } else {
            Self::Desktop
        }
    }

    /// Classify the running host.
    ///
    /// # Errors
    ///
    /// Returns an error if the Hardware inventory cannot be read or lacks a
    /// model identifier.
    pub fn detect(cache: &InventoryCache) -> Result<Self> {
        let model = cache.field(&InventoryCategory::hardware(), MODEL_FIELD)?;
        Ok(Self::from_model(&model.to_string()))
    }
}

impl fmt::Display for HostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Laptop => "laptop",
            Self::Desktop => "desktop",
        })
    }
}

/// Whether the host is a laptop.
///
/// # Errors
///
/// See [`HostKind::detect`].
pub fn is_laptop(cache: &InventoryCache) -> Result<bool> {
    Ok(HostKind::detect(cache)? == HostKind::Laptop)
}

/// Whether the host is a desktop.
///
/// # Errors
///
/// See [`HostKind::detect`].
pub fn is_desktop(cache: &InventoryCache) -> Result<bool> {
    Ok(HostKind::detect(cache)? == HostKind::Desktop)
}

//! Navigator configuration
//!
//! Loaded from TOML or JSON; every field has a default, so an empty
//! document yields [`NavigatorConfig::default`].

use serde::{Deserialize, Serialize};

use crate::errors::{GraphError, Result};

/// Behavior of a leaf write `list[n] = v`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListIndexWrite {
    /// Append `v`, ignoring `n` (legacy behavior, existing callers depend on it)
    #[default]
    Append,
    /// Replace the element at `n`; out-of-range `n` is `IndexOutOfRange`
    Replace,
}

/// Path resolver settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigatorConfig {
    pub list_index_write: ListIndexWrite,

    /// Whether null LIST/MAP attributes on the write path are replaced by empty containers
    pub auto_vivify_containers: bool,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            list_index_write: ListIndexWrite::Append,
            auto_vivify_containers: true,
        }
    }
}

impl NavigatorConfig {
    /// Parse from a TOML document
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the document does not parse.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| GraphError::InvalidConfig {
            reason: e.to_string(),
        })
    }

    /// Parse from a JSON document
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the document does not parse.
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| GraphError::InvalidConfig {
            reason: e.to_string(),
        })
    }
}

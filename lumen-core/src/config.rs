//! Runtime configuration.
//!
//! Configuration is plain data with serde support so hosts can ship it as
//! JSON next to the rest of their settings:
//!
//! ```rust
//! use lumen_core::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_json_str(r#"{ "max_flush_depth": 20 }"#).unwrap();
//! assert_eq!(config.max_flush_depth, Some(20));
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default bound on consecutive flush passes before reporting an effect loop.
pub const DEFAULT_MAX_FLUSH_DEPTH: usize = 100;

/// Settings for a [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum number of consecutive flush passes. A pass that still leaves
    /// dirty keys behind after this many rounds fails with
    /// [`Error::EffectLoop`](crate::Error::EffectLoop). `None` removes the
    /// guard entirely, in which case a cyclic effect chain never terminates.
    pub max_flush_depth: Option<usize>,

    /// Re-check the dependency graph invariant after every tracked
    /// execution. Only honored in debug builds.
    pub verify_graph: bool,
}

impl RuntimeConfig {
    /// Parse a configuration from JSON text. Missing fields take defaults.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Builder-style setter for [`max_flush_depth`](Self::max_flush_depth).
    pub fn with_max_flush_depth(mut self, depth: Option<usize>) -> Self {
        self.max_flush_depth = depth;
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_flush_depth: Some(DEFAULT_MAX_FLUSH_DEPTH),
            verify_graph: cfg!(debug_assertions),
        }
    }
}

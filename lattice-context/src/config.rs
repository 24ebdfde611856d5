//! Context configuration.
//!
//! Configuration is per context and fixed at creation time. It can be
//! built in code or loaded from a JSON document:
//!
//! ```rust
//! use lattice_context::ContextConfig;
//!
//! let config = ContextConfig::from_json(r#"{ "display_name": "Theme" }"#).unwrap();
//! assert_eq!(config.display_name.as_deref(), Some("Theme"));
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Per-context settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Emit advisory warnings, such as a comparator returning a mask that
    /// does not fit in 30 bits. Defaults to on in debug builds.
    pub diagnostics: bool,

    /// Human-readable name attached to log events.
    pub display_name: Option<String>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            diagnostics: cfg!(debug_assertions),
            display_name: None,
        }
    }
}

impl ContextConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Turn advisory diagnostics on or off.
    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }

    /// The name used in log events.
    pub(crate) fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or("Context")
    }
}

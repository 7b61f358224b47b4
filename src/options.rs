//! Session configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Which saved curve lends its x values to a derived curve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XAxisPolicy {
    /// The curve at position 0 of the registry, whatever the formula uses.
    #[default]
    FirstRegistered,
    /// The curve named by the first identifier in the formula.
    FirstReferenced,
}

/// Knobs of a [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    pub x_axis: XAxisPolicy,
    /// Key used for the provenance column in record output.
    pub provenance_column: String,
    /// Multiplier applied to an `arc_length` CSV column (cm → µm).
    pub arc_length_scale: f64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            x_axis: XAxisPolicy::FirstRegistered,
            provenance_column: "file".to_string(),
            arc_length_scale: 1.0e4,
        }
    }
}

impl SessionOptions {
    /// Read options from a JSON document; absent keys keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        let options: SessionOptions =
            serde_json::from_str(&text).map_err(|e| CoreError::Config(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn with_x_axis(mut self, policy: XAxisPolicy) -> Self {
        self.x_axis = policy;
        self
    }

    pub fn with_provenance_column(mut self, name: impl Into<String>) -> Self {
        self.provenance_column = name.into();
        self
    }

    fn validate(&self) -> Result<()> {
        if self.provenance_column.trim().is_empty() {
            return Err(CoreError::Config(
                "provenance_column must not be empty".to_string(),
            ));
        }
        if !self.arc_length_scale.is_finite() {
            return Err(CoreError::Config(format!(
                "arc_length_scale must be finite, got {}",
                self.arc_length_scale
            )));
        }
        Ok(())
    }
}

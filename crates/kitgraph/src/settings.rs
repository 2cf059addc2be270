//! Engine configuration.

use crate::error::{EngineError, Result};
use kitgraph_math::Tolerance;
use serde::{Deserialize, Serialize};

/// Tunables shared by the resolver, diff and cluster engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Linear tolerance for placement comparisons.
    pub tolerance: f64,
    /// Decimal places resolved planes are rounded to.
    pub rounding_decimals: u32,
    /// Separator between a design-piece id and an exploded piece id.
    pub namespace_separator: String,
    /// Name of the quality carrying the diff status in in-place diffs.
    pub diff_status_quality: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-5,
            rounding_decimals: 5,
            namespace_separator: "/".to_string(),
            diff_status_quality: "diff.status".to_string(),
        }
    }
}

impl EngineSettings {
    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance > 0.0 && self.tolerance < 1.0) {
            return Err(EngineError::Settings(format!(
                "tolerance must be in (0, 1), got {}",
                self.tolerance
            )));
        }
        if self.rounding_decimals > 15 {
            return Err(EngineError::Settings(format!(
                "rounding_decimals must be at most 15, got {}",
                self.rounding_decimals
            )));
        }
        if self.namespace_separator.is_empty() {
            return Err(EngineError::Settings(
                "namespace_separator must not be empty".to_string(),
            ));
        }
        if self.diff_status_quality.is_empty() {
            return Err(EngineError::Settings(
                "diff_status_quality must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse settings from TOML; missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let settings: EngineSettings =
            toml::from_str(source).map_err(|e| EngineError::Settings(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Geometric tolerance derived from these settings.
    pub fn tol(&self) -> Tolerance {
        Tolerance::linear(self.tolerance)
    }
}

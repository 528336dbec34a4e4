use crate::constants::DEFAULT_EXPORT_SCALE;
use crate::types::*;
use serde::{Deserialize, Serialize};

/// What to do when a single page fails to render during export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Abandon the whole export; no partial document is produced
    #[default]
    Abort,
    /// Substitute a blank page and keep going
    Continue,
}

/// Export configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Multiplier on top of the display scale, independent of on-screen zoom
    pub export_scale: f64,
    pub failure_policy: FailurePolicy,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            export_scale: DEFAULT_EXPORT_SCALE,
            failure_policy: FailurePolicy::Abort,
        }
    }
}

impl ExportOptions {
    /// Load options from JSON file
    pub async fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let options: Self = serde_json::from_slice(&bytes)
            .map_err(|e| AnnotateError::Config(format!("Failed to parse config: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    /// Save options to JSON file
    pub async fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| AnnotateError::Config(format!("Failed to serialize config: {}", e)))?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Validate the options
    pub fn validate(&self) -> Result<()> {
        if !self.export_scale.is_finite() || self.export_scale <= 0.0 {
            return Err(AnnotateError::Config(format!(
                "Export scale must be a positive number, got {}",
                self.export_scale
            )));
        }
        Ok(())
    }
}

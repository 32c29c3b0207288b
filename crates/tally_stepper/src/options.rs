//! Stepper options files
//!
//! `StepperOptions` is the serializable form of a [`StepperConfig`]. Hosts
//! load it from TOML and convert it once options are final:
//!
//! ```toml
//! step_count = 45
//! interval_ms = 14.0
//! pacing = "easeOut"
//!
//! [format]
//! precision = 0
//! separator = ","
//! suffix = " pts"
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StepperError};
use crate::format::NumberFormat;
use crate::pacing::PacingKind;
use crate::stepper::StepperConfig;

/// Serializable stepper options
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct StepperOptions {
    #[serde(default = "default_step_count")]
    pub step_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_size: Option<f64>,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: f64,
    #[serde(default)]
    pub pacing: PacingKind,
    #[serde(default)]
    pub initial_value: f64,
    #[serde(default)]
    pub notify_start_on_retarget: bool,
    #[serde(default)]
    pub format: NumberFormat,
}

fn default_step_count() -> u32 {
    StepperConfig::DEFAULT_STEP_COUNT
}

fn default_interval_ms() -> f64 {
    StepperConfig::DEFAULT_INTERVAL_MS
}

impl Default for StepperOptions {
    fn default() -> Self {
        Self {
            step_count: default_step_count(),
            step_size: None,
            interval_ms: default_interval_ms(),
            pacing: PacingKind::default(),
            initial_value: 0.0,
            notify_start_on_retarget: false,
            format: NumberFormat::default(),
        }
    }
}

impl StepperOptions {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load options from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let options = Self::from_toml_str(&content)?;
        tracing::debug!("Loaded stepper options from {}", path.display());
        Ok(options)
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Build and validate the runtime configuration
    pub fn into_config(self) -> Result<StepperConfig> {
        if let Some(precision) = self.format.precision {
            if precision > NumberFormat::MAX_PRECISION {
                return Err(StepperError::invalid(format!(
                    "format.precision must be at most {}, got {precision}",
                    NumberFormat::MAX_PRECISION
                )));
            }
        }

        let mut config = StepperConfig::new()
            .step_count(self.step_count)
            .interval_ms(self.interval_ms)
            .pacing(self.pacing)
            .formatter(self.format)
            .initial_value(self.initial_value)
            .notify_start_on_retarget(self.notify_start_on_retarget);
        config.step_size = self.step_size;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StepperError;
    use crate::pacing::Pacing;

    #[test]
    fn test_empty_file_uses_defaults() {
        let options = StepperOptions::from_toml_str("").unwrap();
        assert_eq!(options, StepperOptions::default());
        assert_eq!(options.step_count, 45);
        assert_eq!(options.interval_ms, 14.0);
        assert_eq!(options.pacing, PacingKind::Linear);
    }

    #[test]
    fn test_parse_full_options() {
        let options = StepperOptions::from_toml_str(
            r#"
            step_count = 10
            step_size = 2.5
            interval_ms = 30
            pacing = "easeOut"
            initial_value = -4.0
            notify_start_on_retarget = true

            [format]
            precision = 1
            prefix = "~"
            separator = ","
            "#,
        )
        .unwrap();
        assert_eq!(options.step_size, Some(2.5));
        assert_eq!(options.interval_ms, 30.0);
        assert_eq!(options.pacing, PacingKind::EaseOut);
        assert_eq!(options.format.separator, Some(','));

        let config = options.into_config().unwrap();
        assert_eq!(config.step_count, 10);
        assert_eq!(config.initial_value, -4.0);
        assert!(config.notify_start_on_retarget);
        assert!(matches!(config.pacing, Pacing::EaseOut));
        assert_eq!(config.formatter.format(1234.0), "~1,234.0");
    }

    #[test]
    fn test_unknown_pacing_rejected() {
        let result = StepperOptions::from_toml_str(r#"pacing = "bounce""#);
        assert!(matches!(result, Err(StepperError::Parse(_))));
    }

    #[test]
    fn test_invalid_values_rejected_on_conversion() {
        let options = StepperOptions {
            step_count: 0,
            ..Default::default()
        };
        assert!(matches!(
            options.into_config(),
            Err(StepperError::InvalidConfiguration(_))
        ));

        let options = StepperOptions::from_toml_str("[format]\nprecision = 1000000000\n").unwrap();
        assert!(matches!(
            options.into_config(),
            Err(StepperError::InvalidConfiguration(_))
        ));

        let options = StepperOptions::from_toml_str("[format]\nprecision = 32\n").unwrap();
        assert!(options.into_config().is_ok());
    }

    #[test]
    fn test_written_options_load_back() {
        let options = StepperOptions {
            step_size: Some(3.0),
            pacing: PacingKind::EaseIn,
            format: NumberFormat {
                suffix: "%".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        let path = std::env::temp_dir().join(format!("tally-options-{}.toml", std::process::id()));
        fs::write(&path, options.to_toml().unwrap()).unwrap();

        let loaded = StepperOptions::load(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(loaded, options);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = StepperOptions::load(Path::new("/nonexistent/tally.toml"));
        assert!(matches!(result, Err(StepperError::Io(_))));
    }
}

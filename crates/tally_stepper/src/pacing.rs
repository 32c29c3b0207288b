//! Tick pacing
//!
//! A pacing function maps the base interval and the run's progress to the
//! delay before the next tick. Pacing never changes the size of a value
//! step, only how long the stepper waits between steps.

use std::f64::consts::FRAC_PI_2;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::StepperError;

/// Multiplier applied to the sine curves of the eased pacings
const EASE_SCALE: f64 = 5.0;

/// Signature of a host-supplied pacing function: `(interval_ms, progress) -> delay_ms`
pub type PacingFn = Arc<dyn Fn(f64, f64) -> f64 + Send + Sync>;

/// Delay curve between ticks
#[derive(Clone, Default)]
pub enum Pacing {
    /// Constant tick rate
    #[default]
    Linear,
    /// Delay shrinks as the run progresses
    EaseIn,
    /// Delay grows as the run progresses
    EaseOut,
    /// Host-supplied curve
    Custom(PacingFn),
}

impl Pacing {
    /// Wrap a closure as a custom pacing
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(f64, f64) -> f64 + Send + Sync + 'static,
    {
        Pacing::Custom(Arc::new(f))
    }

    /// Delay in milliseconds before the next tick
    pub fn delay_ms(&self, interval_ms: f64, progress: f64) -> f64 {
        match self {
            Pacing::Linear => interval_ms,
            Pacing::EaseOut => interval_ms * (FRAC_PI_2 * progress).sin() * EASE_SCALE,
            Pacing::EaseIn => interval_ms * (FRAC_PI_2 * (1.0 - progress)).sin() * EASE_SCALE,
            Pacing::Custom(f) => f(interval_ms, progress),
        }
    }

    /// Name of the built-in curve, `None` for custom pacings
    pub fn kind(&self) -> Option<PacingKind> {
        match self {
            Pacing::Linear => Some(PacingKind::Linear),
            Pacing::EaseIn => Some(PacingKind::EaseIn),
            Pacing::EaseOut => Some(PacingKind::EaseOut),
            Pacing::Custom(_) => None,
        }
    }
}

impl fmt::Debug for Pacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(kind) => write!(f, "Pacing::{kind:?}"),
            None => f.write_str("Pacing::Custom(..)"),
        }
    }
}

/// Serializable name of a built-in pacing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PacingKind {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
}

impl PacingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PacingKind::Linear => "linear",
            PacingKind::EaseIn => "easeIn",
            PacingKind::EaseOut => "easeOut",
        }
    }
}

impl From<PacingKind> for Pacing {
    fn from(kind: PacingKind) -> Self {
        match kind {
            PacingKind::Linear => Pacing::Linear,
            PacingKind::EaseIn => Pacing::EaseIn,
            PacingKind::EaseOut => Pacing::EaseOut,
        }
    }
}

impl fmt::Display for PacingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PacingKind {
    type Err = StepperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(PacingKind::Linear),
            "easeIn" | "ease_in" | "ease-in" => Ok(PacingKind::EaseIn),
            "easeOut" | "ease_out" | "ease-out" => Ok(PacingKind::EaseOut),
            other => Err(StepperError::invalid(format!(
                "unknown pacing '{other}', expected one of linear, easeIn, easeOut"
            ))),
        }
    }
}

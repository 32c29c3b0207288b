//! Tally Stepper
//!
//! Counting-up (and down) number animations driven by discrete, paced ticks.
//!
//! # Features
//!
//! - **Stepper**: State machine moving a value toward a target in fixed steps,
//!   clamping exactly onto the target when a step reaches or passes it
//! - **Pacing**: Linear, ease-in, ease-out or custom delays between ticks
//! - **Re-anchoring**: A new target mid-run continues from the current value
//! - **Injected scheduling**: Manual clock for tests, a timer thread, or tokio
//! - **Formatting**: Host-facing text through closures or declarative formats
//! - **Options files**: TOML-loadable stepper options
//!
//! # Example
//!
//! ```rust
//! use tally_stepper::{Stepper, StepperConfig, StepperHooks, TickOutcome};
//!
//! let mut stepper = Stepper::new(StepperConfig::new().step_size(3.0), StepperHooks::new())?;
//! let _first_delay = stepper.activate(0.0, 10.0)?;
//!
//! while let TickOutcome::Continue { .. } = stepper.tick()? {}
//! assert_eq!(stepper.value(), 10.0);
//! # Ok::<(), tally_stepper::StepperError>(())
//! ```

pub mod animated;
#[cfg(feature = "tokio")]
pub mod async_scheduler;
pub mod error;
pub mod format;
pub mod options;
pub mod pacing;
pub mod scheduler;
pub mod stepper;

pub use animated::AnimatedNumber;
#[cfg(feature = "tokio")]
pub use async_scheduler::TokioScheduler;
pub use error::{Result, StepperError};
pub use format::{Formatter, NumberFormat};
pub use options::StepperOptions;
pub use pacing::{Pacing, PacingFn, PacingKind};
pub use scheduler::{ManualScheduler, ScheduledTask, TickScheduler, TimerHandle, TimerThread};
pub use stepper::{
    Phase, Retarget, RunState, Stepper, StepperConfig, StepperHooks, TickOutcome,
};

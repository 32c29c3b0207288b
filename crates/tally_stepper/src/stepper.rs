//! Numeric stepper
//!
//! Drives a displayed value from a start value to a target value through
//! discrete ticks. Each tick moves the value by a fixed delta, checks whether
//! the run has reached or passed its target, and reports the delay the
//! scheduler should wait before the next tick.
//!
//! The stepper owns no clock. Callers schedule the [`Duration`] returned by
//! [`Stepper::activate`], [`Stepper::retarget`] and [`Stepper::tick`], and
//! call [`Stepper::tick`] when it elapses. [`AnimatedNumber`] does this
//! against any [`TickScheduler`].
//!
//! [`AnimatedNumber`]: crate::AnimatedNumber
//! [`TickScheduler`]: crate::TickScheduler

use std::fmt;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::error::{Result, StepperError};
use crate::format::Formatter;
use crate::pacing::Pacing;

/// Progress values a pacing is sampled at when a configuration is validated
const PACING_SAMPLES: [f64; 3] = [0.0, 0.5, 1.0];

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for a stepper run
#[derive(Clone, Debug)]
pub struct StepperConfig {
    /// Number of steps covering the distance when no step size is set
    pub step_count: u32,
    /// Fixed step magnitude; the sign is ignored
    pub step_size: Option<f64>,
    /// Base delay between ticks in milliseconds
    pub interval_ms: f64,
    pub pacing: Pacing,
    pub formatter: Formatter,
    /// Start value of the first run
    pub initial_value: f64,
    /// Fire `on_start` again when a new target re-anchors the run
    pub notify_start_on_retarget: bool,
}

impl StepperConfig {
    pub const DEFAULT_STEP_COUNT: u32 = 45;
    pub const DEFAULT_INTERVAL_MS: f64 = 14.0;

    pub fn new() -> Self {
        Self {
            step_count: Self::DEFAULT_STEP_COUNT,
            step_size: None,
            interval_ms: Self::DEFAULT_INTERVAL_MS,
            pacing: Pacing::Linear,
            formatter: Formatter::plain(),
            initial_value: 0.0,
            notify_start_on_retarget: false,
        }
    }

    pub fn step_count(mut self, count: u32) -> Self {
        self.step_count = count;
        self
    }

    pub fn step_size(mut self, size: f64) -> Self {
        self.step_size = Some(size);
        self
    }

    pub fn interval_ms(mut self, interval_ms: f64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    pub fn pacing(mut self, pacing: impl Into<Pacing>) -> Self {
        self.pacing = pacing.into();
        self
    }

    pub fn formatter(mut self, formatter: impl Into<Formatter>) -> Self {
        self.formatter = formatter.into();
        self
    }

    pub fn initial_value(mut self, value: f64) -> Self {
        self.initial_value = value;
        self
    }

    pub fn notify_start_on_retarget(mut self, enabled: bool) -> Self {
        self.notify_start_on_retarget = enabled;
        self
    }

    /// Check every field, sampling the pacing at the start, middle and end of a run
    pub fn validate(&self) -> Result<()> {
        if self.step_count == 0 {
            return Err(StepperError::invalid("step_count must be greater than zero"));
        }
        if let Some(size) = self.step_size {
            if !size.is_finite() || size == 0.0 {
                return Err(StepperError::invalid(format!(
                    "step_size must be finite and non-zero, got {size}"
                )));
            }
        }
        if !self.interval_ms.is_finite() || self.interval_ms < 0.0 {
            return Err(StepperError::invalid(format!(
                "interval_ms must be finite and non-negative, got {}",
                self.interval_ms
            )));
        }
        check_endpoint("initial_value", self.initial_value)?;
        for progress in PACING_SAMPLES {
            delay_from_ms(self.pacing.delay_ms(self.interval_ms, progress), progress)?;
        }
        Ok(())
    }
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Host callbacks, all no-ops unless set
pub struct StepperHooks {
    on_start: Box<dyn FnMut() + Send>,
    on_progress: Box<dyn FnMut(f64, f64) + Send>,
    on_finish: Box<dyn FnMut(f64, &str) + Send>,
    on_display: Box<dyn FnMut(&str) + Send>,
}

impl StepperHooks {
    pub fn new() -> Self {
        Self {
            on_start: Box::new(|| {}),
            on_progress: Box::new(|_, _| {}),
            on_finish: Box::new(|_, _| {}),
            on_display: Box::new(|_| {}),
        }
    }

    /// Called when a fresh run begins
    pub fn on_start<F>(mut self, f: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.on_start = Box::new(f);
        self
    }

    /// Called on every non-terminal tick with the values before and after the step
    pub fn on_progress<F>(mut self, f: F) -> Self
    where
        F: FnMut(f64, f64) + Send + 'static,
    {
        self.on_progress = Box::new(f);
        self
    }

    /// Called once per run segment with the final value and its formatted text
    pub fn on_finish<F>(mut self, f: F) -> Self
    where
        F: FnMut(f64, &str) + Send + 'static,
    {
        self.on_finish = Box::new(f);
        self
    }

    /// Called on every tick with the text the host should display
    pub fn on_display<F>(mut self, f: F) -> Self
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.on_display = Box::new(f);
        self
    }
}

impl Default for StepperHooks {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StepperHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StepperHooks { .. }")
    }
}

// ============================================================================
// Run state
// ============================================================================

/// Lifecycle of a stepper
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    /// Never activated
    #[default]
    Idle,
    /// A run segment is in progress and a tick is pending
    Running,
    /// The current target has been reached exactly
    Settled,
    /// A tick was refused because the pacing produced an unusable delay
    Halted,
}

/// Snapshot of a stepper's mutable state
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RunState {
    /// Latest committed value
    pub current_value: f64,
    /// Value at the start of the current run segment
    pub start_value: f64,
    /// Value the current run segment converges toward
    pub target_value: f64,
    /// `Some(true)` when moving up; `None` until the segment's first tick
    pub direction: Option<bool>,
    pub phase: Phase,
    /// Ticks executed in the current run segment
    pub ticks: u64,
}

impl RunState {
    pub fn is_active(&self) -> bool {
        self.phase == Phase::Running
    }

    /// Fractional position of the current value between start and target
    ///
    /// Zero-distance segments report `0.0`.
    pub fn progress(&self) -> f64 {
        let distance = self.target_value - self.start_value;
        if distance == 0.0 {
            return 0.0;
        }
        (self.current_value - self.start_value) / distance
    }
}

/// What a call to [`Stepper::retarget`] did
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Retarget {
    /// The stepper was already driving toward (or resting at) this target
    Unchanged,
    /// The pending tick now converges on the new target
    Redirected,
    /// No tick was pending; schedule one after `delay`
    Restarted { delay: Duration },
}

/// What a call to [`Stepper::tick`] did
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TickOutcome {
    /// Value moved; schedule the next tick after `delay`
    Continue { delay: Duration },
    /// Value clamped onto the target; nothing left to schedule
    Finished { value: f64 },
    /// The stepper was not running; nothing changed
    Idle,
}

// ============================================================================
// Stepper
// ============================================================================

/// Discrete, paced animation of a single number
pub struct Stepper {
    config: StepperConfig,
    hooks: StepperHooks,
    state: RunState,
    display: String,
    activated: bool,
}

impl Stepper {
    pub fn new(config: StepperConfig, hooks: StepperHooks) -> Result<Self> {
        config.validate()?;
        let display = config.formatter.format(config.initial_value);
        Ok(Self {
            state: RunState {
                current_value: config.initial_value,
                start_value: config.initial_value,
                target_value: config.initial_value,
                ..RunState::default()
            },
            config,
            hooks,
            display,
            activated: false,
        })
    }

    /// Replace the configuration used by subsequent ticks
    pub fn configure(&mut self, config: StepperConfig) -> Result<()> {
        config.validate()?;
        debug!(
            "Stepper: reconfigured (steps={}, step_size={:?}, interval={}ms, pacing={:?})",
            config.step_count, config.step_size, config.interval_ms, config.pacing
        );
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &StepperConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn value(&self) -> f64 {
        self.state.current_value
    }

    pub fn target(&self) -> f64 {
        self.state.target_value
    }

    /// Formatted text of the latest committed value
    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn is_activated(&self) -> bool {
        self.activated
    }

    /// Begin the first run and return the delay before its first tick
    pub fn activate(&mut self, initial_value: f64, first_target: f64) -> Result<Duration> {
        if self.activated {
            return Err(StepperError::AlreadyActivated);
        }
        check_endpoint("initial value", initial_value)?;
        check_endpoint("target", first_target)?;

        self.state = RunState {
            current_value: initial_value,
            start_value: initial_value,
            target_value: first_target,
            direction: None,
            phase: Phase::Running,
            ticks: 0,
        };
        self.display = self.config.formatter.format(initial_value);

        let delay = match self.next_delay(0.0) {
            Ok(delay) => delay,
            Err(err) => {
                self.state.phase = Phase::Halted;
                return Err(err);
            }
        };

        self.activated = true;
        if initial_value == first_target {
            debug!("Stepper: zero-distance run at {}", first_target);
        }
        debug!(
            "Stepper: activated {} -> {} (first tick in {:?})",
            initial_value, first_target, delay
        );
        (self.hooks.on_start)();
        Ok(delay)
    }

    /// Point the stepper at a new target, re-anchoring from the current value
    pub fn retarget(&mut self, new_target: f64) -> Result<Retarget> {
        if !self.activated {
            return Err(StepperError::NotActivated);
        }
        check_endpoint("target", new_target)?;

        let phase = self.state.phase;
        if new_target == self.state.target_value && phase != Phase::Halted {
            return Ok(Retarget::Unchanged);
        }

        self.state.start_value = self.state.current_value;
        self.state.target_value = new_target;
        self.state.direction = None;
        self.state.ticks = 0;
        self.state.phase = Phase::Running;

        let outcome = if phase == Phase::Running {
            Retarget::Redirected
        } else {
            match self.next_delay(0.0) {
                Ok(delay) => Retarget::Restarted { delay },
                Err(err) => {
                    self.state.phase = Phase::Halted;
                    return Err(err);
                }
            }
        };

        debug!(
            "Stepper: re-anchored {} -> {} ({:?})",
            self.state.start_value, new_target, outcome
        );
        if self.config.notify_start_on_retarget {
            (self.hooks.on_start)();
        }
        Ok(outcome)
    }

    /// Advance the run by one step
    pub fn tick(&mut self) -> Result<TickOutcome> {
        if self.state.phase != Phase::Running {
            trace!("Stepper: tick ignored in {:?}", self.state.phase);
            return Ok(TickOutcome::Idle);
        }

        let previous = self.state.current_value;
        let target = self.state.target_value;
        let delta = self.step_delta();
        let upward = delta > 0.0;
        let mut candidate = previous + delta;

        self.state.direction = Some(upward);
        self.state.ticks += 1;

        // Upward runs stop once they pass the target, downward runs once they reach it.
        // A step below the float resolution at `previous` can never get there.
        let stalled = candidate == previous;
        let finished = stalled
            || if upward {
                candidate > target
            } else {
                candidate <= target
            };
        if stalled && previous != target {
            debug!(
                "Stepper: step {} too small to move {}, clamping to {}",
                delta, previous, target
            );
        }

        let outcome = if finished {
            candidate = target;
            self.state.phase = Phase::Settled;
            let formatted = self.config.formatter.format(candidate);
            debug!(
                "Stepper: settled at {} after {} ticks",
                candidate, self.state.ticks
            );
            (self.hooks.on_finish)(candidate, &formatted);
            TickOutcome::Finished { value: candidate }
        } else {
            let delay = match self.next_delay(self.state.progress()) {
                Ok(delay) => delay,
                Err(err) => {
                    warn!("Stepper: halted at {}: {}", previous, err);
                    self.state.phase = Phase::Halted;
                    return Err(err);
                }
            };
            (self.hooks.on_progress)(previous, candidate);
            TickOutcome::Continue { delay }
        };

        self.state.current_value = candidate;
        self.display = self.config.formatter.format(candidate);
        trace!(
            "Stepper: tick {} {} -> {} ({:?})",
            self.state.ticks,
            previous,
            candidate,
            outcome
        );
        (self.hooks.on_display)(&self.display);

        Ok(outcome)
    }

    fn step_delta(&self) -> f64 {
        let distance = self.state.target_value - self.state.start_value;
        match self.config.step_size {
            Some(size) => {
                let sign = if distance >= 0.0 { 1.0 } else { -1.0 };
                sign * size.abs()
            }
            None => distance / self.config.step_count as f64,
        }
    }

    fn next_delay(&self, progress: f64) -> Result<Duration> {
        let delay_ms = self.config.pacing.delay_ms(self.config.interval_ms, progress);
        delay_from_ms(delay_ms, progress)
    }
}

impl fmt::Debug for Stepper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stepper")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("display", &self.display)
            .field("activated", &self.activated)
            .finish()
    }
}

fn check_endpoint(name: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(StepperError::invalid(format!(
            "{name} must be finite, got {value}"
        )))
    }
}

/// Convert a pacing delay to a [`Duration`], rejecting negative or non-finite values
pub(crate) fn delay_from_ms(delay_ms: f64, progress: f64) -> Result<Duration> {
    let nanos = delay_ms * 1_000_000.0;
    if !nanos.is_finite() || nanos < 0.0 || nanos >= u64::MAX as f64 {
        return Err(StepperError::invalid(format!(
            "pacing returned unusable delay {delay_ms}ms at progress {progress}"
        )));
    }
    Ok(Duration::from_nanos(nanos.round() as u64))
}

//! Scheduler-bound stepper
//!
//! [`AnimatedNumber`] wires a [`Stepper`] to a [`TickScheduler`] so the host
//! only sets targets. The first `set_target` activates the stepper; later
//! calls re-anchor it. Every tick the scheduler fires schedules the next one
//! until the run settles, so at most one tick is ever pending.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tracing::{trace, warn};

use crate::error::Result;
use crate::scheduler::TickScheduler;
use crate::stepper::{Retarget, RunState, Stepper, StepperConfig, StepperHooks, TickOutcome};

/// A number that steps toward whatever target the host last set
///
/// Hooks run while the stepper is locked and must not call back into the
/// same `AnimatedNumber`.
///
/// # Example
///
/// ```
/// use tally_stepper::{AnimatedNumber, ManualScheduler, StepperConfig, StepperHooks};
///
/// let clock = ManualScheduler::new();
/// let number = AnimatedNumber::new(clock.clone(), StepperConfig::default(), StepperHooks::new())?;
///
/// number.set_target(90.0)?;
/// clock.run_until_idle();
/// assert_eq!(number.display(), "90");
/// # Ok::<(), tally_stepper::StepperError>(())
/// ```
pub struct AnimatedNumber<S: TickScheduler + Clone> {
    stepper: Arc<Mutex<Stepper>>,
    scheduler: S,
}

impl<S: TickScheduler + Clone> AnimatedNumber<S> {
    pub fn new(scheduler: S, config: StepperConfig, hooks: StepperHooks) -> Result<Self> {
        Ok(Self {
            stepper: Arc::new(Mutex::new(Stepper::new(config, hooks)?)),
            scheduler,
        })
    }

    /// Animate toward `target`, starting the first run or re-anchoring the current one
    pub fn set_target(&self, target: f64) -> Result<()> {
        let delay = {
            let mut stepper = lock(&self.stepper);
            if stepper.is_activated() {
                match stepper.retarget(target)? {
                    Retarget::Restarted { delay } => Some(delay),
                    Retarget::Redirected | Retarget::Unchanged => None,
                }
            } else {
                let initial = stepper.config().initial_value;
                Some(stepper.activate(initial, target)?)
            }
        };

        if let Some(delay) = delay {
            schedule_tick(Arc::downgrade(&self.stepper), self.scheduler.clone(), delay);
        }
        Ok(())
    }

    /// Replace the configuration used by subsequent ticks
    pub fn configure(&self, config: StepperConfig) -> Result<()> {
        lock(&self.stepper).configure(config)
    }

    pub fn snapshot(&self) -> RunState {
        lock(&self.stepper).state()
    }

    pub fn value(&self) -> f64 {
        lock(&self.stepper).value()
    }

    pub fn target(&self) -> f64 {
        lock(&self.stepper).target()
    }

    /// Formatted text of the latest value
    pub fn display(&self) -> String {
        lock(&self.stepper).display().to_string()
    }

    pub fn is_active(&self) -> bool {
        lock(&self.stepper).is_active()
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }
}

fn lock(stepper: &Mutex<Stepper>) -> MutexGuard<'_, Stepper> {
    stepper.lock().unwrap_or_else(PoisonError::into_inner)
}

fn schedule_tick<S: TickScheduler + Clone>(
    stepper: Weak<Mutex<Stepper>>,
    scheduler: S,
    delay: Duration,
) {
    let next = scheduler.clone();
    scheduler.schedule_after(
        delay,
        Box::new(move || {
            let Some(stepper) = stepper.upgrade() else {
                trace!("AnimatedNumber: dropped before its tick fired");
                return;
            };
            let outcome = lock(&stepper).tick();
            match outcome {
                Ok(TickOutcome::Continue { delay }) => {
                    schedule_tick(Arc::downgrade(&stepper), next, delay)
                }
                Ok(TickOutcome::Finished { .. } | TickOutcome::Idle) => {}
                Err(err) => warn!("AnimatedNumber: tick failed: {}", err),
            }
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{ManualScheduler, TimerThread};
    use crate::stepper::Phase;
    use std::sync::mpsc;

    fn manual(config: StepperConfig) -> (ManualScheduler, AnimatedNumber<ManualScheduler>) {
        let clock = ManualScheduler::new();
        let number = AnimatedNumber::new(clock.clone(), config, StepperHooks::new()).unwrap();
        (clock, number)
    }

    #[test]
    fn test_runs_on_manual_clock() {
        let (clock, number) = manual(StepperConfig::default());
        number.set_target(90.0).unwrap();
        assert_eq!(clock.pending(), 1);
        assert!(number.is_active());

        assert_eq!(clock.advance(Duration::from_millis(14)), 1);
        assert_eq!(number.value(), 2.0);

        assert_eq!(clock.run_until_idle(), 45);
        assert_eq!(clock.now(), Duration::from_millis(14 * 46));
        assert_eq!(number.value(), 90.0);
        assert_eq!(number.display(), "90");
        assert_eq!(number.snapshot().phase, Phase::Settled);
    }

    #[test]
    fn test_initial_value_from_config() {
        let (clock, number) = manual(StepperConfig::new().initial_value(100.0).step_size(25.0));
        number.set_target(0.0).unwrap();
        assert_eq!(number.value(), 100.0);
        clock.advance(Duration::from_millis(14));
        assert_eq!(number.value(), 75.0);
        clock.run_until_idle();
        assert_eq!(number.value(), 0.0);
    }

    #[test]
    fn test_retarget_keeps_single_pending_tick() {
        let (clock, number) = manual(StepperConfig::new().step_size(1.0).interval_ms(10.0));
        number.set_target(10.0).unwrap();
        clock.advance(Duration::from_millis(50));
        assert_eq!(number.value(), 5.0);

        number.set_target(20.0).unwrap();
        assert_eq!(clock.pending(), 1);
        let state = number.snapshot();
        assert_eq!((state.start_value, state.target_value), (5.0, 20.0));

        while clock.run_next() {
            assert!(clock.pending() <= 1);
        }
        assert_eq!(number.value(), 20.0);
    }

    #[test]
    fn test_retarget_after_settle_schedules_again() {
        let (clock, number) = manual(StepperConfig::new().step_count(4));
        number.set_target(8.0).unwrap();
        clock.run_until_idle();
        assert_eq!(clock.pending(), 0);

        number.set_target(8.0).unwrap();
        assert_eq!(clock.pending(), 0);

        number.set_target(0.0).unwrap();
        assert_eq!(clock.pending(), 1);
        clock.run_until_idle();
        assert_eq!(number.value(), 0.0);
        assert!(!number.is_active());
    }

    #[test]
    fn test_invalid_target_schedules_nothing() {
        let (clock, number) = manual(StepperConfig::default());
        assert!(number.set_target(f64::NAN).is_err());
        assert_eq!(clock.pending(), 0);
        assert_eq!(number.snapshot().phase, Phase::Idle);

        number.set_target(1.0).unwrap();
        assert_eq!(clock.pending(), 1);
    }

    #[test]
    fn test_dropped_number_stops_ticking() {
        let clock = ManualScheduler::new();
        let (tx, rx) = mpsc::channel();
        let hooks = StepperHooks::new().on_display(move |text| {
            let _ = tx.send(text.to_string());
        });
        let number = AnimatedNumber::new(clock.clone(), StepperConfig::default(), hooks).unwrap();

        number.set_target(10.0).unwrap();
        drop(number);

        assert_eq!(clock.run_until_idle(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_runs_on_timer_thread() {
        let timer = TimerThread::start().unwrap();
        let (tx, rx) = mpsc::channel();
        let hooks = StepperHooks::new().on_finish(move |value, text| {
            let _ = tx.send((value, text.to_string()));
        });
        let config = StepperConfig::new().step_count(5).interval_ms(1.0);
        let number = AnimatedNumber::new(timer.handle(), config, hooks).unwrap();

        number.set_target(5.0).unwrap();
        let finished = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(finished, (5.0, "5".to_string()));
        assert_eq!(number.value(), 5.0);
    }
}

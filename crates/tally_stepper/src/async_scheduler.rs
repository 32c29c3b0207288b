//! Tokio-backed tick scheduling

use std::time::Duration;

use tokio::runtime::Handle;

use crate::scheduler::{ScheduledTask, TickScheduler};

/// Runs each task on a tokio runtime after sleeping for its delay
#[derive(Clone, Debug)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Scheduler for the runtime the caller is running on
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Like [`current`](Self::current), returning `None` outside a runtime
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl TickScheduler for TokioScheduler {
    fn schedule_after(&self, delay: Duration, task: ScheduledTask) {
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AnimatedNumber, Pacing, StepperConfig, StepperHooks};

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_drives_stepper() {
        let config = StepperConfig::default();
        let number =
            AnimatedNumber::new(TokioScheduler::current(), config, StepperHooks::new()).unwrap();

        number.set_target(90.0).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(number.is_active());
        assert!(number.value() > 0.0);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!number.is_active());
        assert_eq!(number.value(), 90.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_eased_retarget() {
        let config = StepperConfig::new().step_count(10).pacing(Pacing::EaseIn);
        let number =
            AnimatedNumber::new(TokioScheduler::current(), config, StepperHooks::new()).unwrap();

        number.set_target(100.0).unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        number.set_target(-50.0).unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(number.value(), -50.0);
        assert_eq!(number.snapshot().direction, Some(false));
    }

    #[test]
    fn test_try_current_outside_runtime() {
        assert!(TokioScheduler::try_current().is_none());
    }
}

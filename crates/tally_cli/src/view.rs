//! Terminal host view
//!
//! Stepper hooks fire on whichever thread runs the scheduler, so they only
//! forward [`ViewEvent`]s over a channel. The main thread renders them.

use std::io::{self, Write};
use std::sync::mpsc::Sender;
use std::time::Duration;

use serde::Serialize;
use tally_stepper::StepperHooks;

/// Something the stepper reported, as seen by the view
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ViewEvent {
    Start,
    Progress { previous: f64, next: f64 },
    Display { text: String },
    Finish { value: f64, text: String },
}

/// An event stamped with the scheduler time it happened at
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Stamped {
    pub time_ms: f64,
    #[serde(flatten)]
    pub event: ViewEvent,
}

/// Build hooks that forward every callback to `tx`, stamped by `clock`
pub fn channel_hooks<C>(tx: Sender<Stamped>, clock: C) -> StepperHooks
where
    C: Fn() -> Duration + Clone + Send + 'static,
{
    let emit = move |event: ViewEvent| {
        let _ = tx.send(Stamped {
            time_ms: clock().as_secs_f64() * 1000.0,
            event,
        });
    };
    let (start, progress, finish, display) = (emit.clone(), emit.clone(), emit.clone(), emit);

    StepperHooks::new()
        .on_start(move || start(ViewEvent::Start))
        .on_progress(move |previous, next| progress(ViewEvent::Progress { previous, next }))
        .on_finish(move |value, text| {
            finish(ViewEvent::Finish {
                value,
                text: text.to_string(),
            })
        })
        .on_display(move |text| {
            display(ViewEvent::Display {
                text: text.to_string(),
            })
        })
}

/// Writes events to stdout, either as text lines or JSON lines
pub struct TerminalView {
    json: bool,
    out: io::Stdout,
}

impl TerminalView {
    pub fn new(json: bool) -> Self {
        Self {
            json,
            out: io::stdout(),
        }
    }

    pub fn render(&mut self, stamped: &Stamped) -> anyhow::Result<()> {
        let mut out = self.out.lock();
        if self.json {
            serde_json::to_writer(&mut out, stamped)?;
            writeln!(out)?;
            return Ok(());
        }

        match &stamped.event {
            ViewEvent::Display { text } => writeln!(out, "{:>9.1}ms  {}", stamped.time_ms, text)?,
            ViewEvent::Start => tracing::info!("Run started at {:.1}ms", stamped.time_ms),
            ViewEvent::Finish { text, .. } => {
                tracing::info!("Settled on {} at {:.1}ms", text, stamped.time_ms)
            }
            ViewEvent::Progress { previous, next } => {
                tracing::debug!("{} -> {}", previous, next)
            }
        }
        Ok(())
    }
}

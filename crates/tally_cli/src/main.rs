//! Tally CLI
//!
//! Drive an animated number from the terminal, either in real time or on a
//! simulated clock.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tally_stepper::{
    AnimatedNumber, ManualScheduler, PacingKind, StepperConfig, StepperOptions, TimerThread,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod view;

use view::{channel_hooks, TerminalView};

/// How long the real-time loop waits for events before re-checking the stepper
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(name = "tally")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Animated number stepper", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Animate toward a target in real time
    Run(RunArgs),

    /// Animate toward a target on a simulated clock and print the timeline
    Simulate(RunArgs),

    /// Write a default options file
    Init {
        /// Output path
        #[arg(short, long, default_value = "tally.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Value to animate toward
    #[arg(allow_hyphen_values = true)]
    target: f64,

    /// Later targets as VALUE@MS, applied MS milliseconds after the start
    #[arg(long = "then", value_name = "VALUE@MS", allow_hyphen_values = true)]
    retargets: Vec<TimedTarget>,

    /// Emit one JSON object per event
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    stepper: StepperArgs,
}

#[derive(Args)]
struct StepperArgs {
    /// Options file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Start value
    #[arg(long, allow_hyphen_values = true)]
    from: Option<f64>,

    /// Number of steps covering the distance
    #[arg(long)]
    steps: Option<u32>,

    /// Fixed step size (overrides --steps)
    #[arg(long, allow_hyphen_values = true)]
    step_size: Option<f64>,

    /// Base delay between ticks in milliseconds
    #[arg(long, allow_hyphen_values = true)]
    interval: Option<f64>,

    /// Pacing curve (linear, easeIn, easeOut)
    #[arg(long)]
    pacing: Option<PacingKind>,

    /// Fraction digits to display
    #[arg(long)]
    precision: Option<usize>,

    /// Thousands separator
    #[arg(long)]
    separator: Option<char>,

    /// Text shown before the value
    #[arg(long)]
    prefix: Option<String>,

    /// Text shown after the value
    #[arg(long)]
    suffix: Option<String>,

    /// Report a fresh start whenever the target changes
    #[arg(long)]
    notify_start: bool,
}

impl StepperArgs {
    fn into_options(self) -> Result<StepperOptions> {
        let mut options = match &self.config {
            Some(path) => StepperOptions::load(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => StepperOptions::default(),
        };

        if let Some(from) = self.from {
            options.initial_value = from;
        }
        if let Some(steps) = self.steps {
            options.step_count = steps;
        }
        if self.step_size.is_some() {
            options.step_size = self.step_size;
        }
        if let Some(interval) = self.interval {
            options.interval_ms = interval;
        }
        if let Some(pacing) = self.pacing {
            options.pacing = pacing;
        }
        if self.precision.is_some() {
            options.format.precision = self.precision;
        }
        if self.separator.is_some() {
            options.format.separator = self.separator;
        }
        if let Some(prefix) = self.prefix {
            options.format.prefix = prefix;
        }
        if let Some(suffix) = self.suffix {
            options.format.suffix = suffix;
        }
        options.notify_start_on_retarget |= self.notify_start;

        Ok(options)
    }
}

/// A target applied some time after the run starts
#[derive(Clone, Copy, Debug, PartialEq)]
struct TimedTarget {
    value: f64,
    at: Duration,
}

impl FromStr for TimedTarget {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (value, at) = s
            .split_once('@')
            .ok_or_else(|| format!("expected VALUE@MS, got '{s}'"))?;
        let value: f64 = value
            .parse()
            .map_err(|_| format!("invalid target value '{value}'"))?;
        let at: u64 = at
            .parse()
            .map_err(|_| format!("invalid delay '{at}', expected whole milliseconds"))?;
        Ok(Self {
            value,
            at: Duration::from_millis(at),
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Run(args) => cmd_run(args),
        Commands::Simulate(args) => cmd_simulate(args),
        Commands::Init { output, force } => cmd_init(&output, force),
    }
}

fn prepare(args: RunArgs) -> Result<(StepperConfig, VecDeque<TimedTarget>, f64, bool)> {
    let options = args.stepper.into_options()?;
    info!(
        "Animating {} -> {} ({} pacing)",
        options.initial_value, args.target, options.pacing
    );
    let config = options.into_config().context("Invalid stepper options")?;

    let mut retargets = args.retargets;
    retargets.sort_by_key(|t| t.at);
    Ok((config, retargets.into(), args.target, args.json))
}

fn cmd_run(args: RunArgs) -> Result<()> {
    let (config, mut retargets, target, json) = prepare(args)?;

    let timer = TimerThread::start().context("Failed to start timer thread")?;
    let started = Instant::now();
    let (tx, rx) = mpsc::channel();
    let hooks = channel_hooks(tx, move || started.elapsed());
    let number = AnimatedNumber::new(timer.handle(), config, hooks)?;
    let mut view = TerminalView::new(json);

    number.set_target(target)?;

    loop {
        let wait = retargets
            .front()
            .map(|next| next.at.saturating_sub(started.elapsed()).min(POLL_INTERVAL))
            .unwrap_or(POLL_INTERVAL);

        match rx.recv_timeout(wait) {
            Ok(event) => view.render(&event)?,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        while let Some(next) = retargets.front().copied() {
            if next.at > started.elapsed() {
                break;
            }
            retargets.pop_front();
            info!("Retargeting to {} at {:?}", next.value, started.elapsed());
            number.set_target(next.value)?;
        }

        if retargets.is_empty() && !number.is_active() {
            break;
        }
    }

    // The last tick's events are already queued once the stepper is settled
    for event in rx.try_iter() {
        view.render(&event)?;
    }
    Ok(())
}

fn cmd_simulate(args: RunArgs) -> Result<()> {
    let (config, retargets, target, json) = prepare(args)?;

    let clock = ManualScheduler::new();
    let (tx, rx) = mpsc::channel();
    let hooks = channel_hooks(tx, {
        let clock = clock.clone();
        move || clock.now()
    });
    let number = AnimatedNumber::new(clock.clone(), config, hooks)?;

    number.set_target(target)?;
    for next in retargets {
        clock.advance(next.at.saturating_sub(clock.now()));
        info!("Retargeting to {} at {:?}", next.value, clock.now());
        number.set_target(next.value)?;
    }
    let ticks = clock.run_until_idle();
    tracing::debug!("Simulation finished after {} trailing ticks", ticks);

    let mut view = TerminalView::new(json);
    for event in rx.try_iter() {
        view.render(&event)?;
    }
    Ok(())
}

fn cmd_init(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite it.",
            output.display()
        );
    }

    let content = StepperOptions::default().to_toml()?;
    fs::write(output, content)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!("Wrote default options to {}", output.display());
    Ok(())
}

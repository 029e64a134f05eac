//! Multi-platform simulation management.
//!
//! This module contains most notably the [`Simulation`] environment and the
//! [`SimInit`] simulation builder.
//!
//! # Simulation lifecycle
//!
//! The lifecycle of a simulation bench typically comprises the following
//! stages:
//!
//! 1. assembly of each [`Platform`] with a
//!    [`PlatformBuilder`](crate::platform::PlatformBuilder),
//! 2. instantiation of a [`SimInit`] simulation builder and migration of all
//!    platforms to the builder with [`SimInit::add_platform()`],
//! 3. declaration of the network links between platform outputs and inputs
//!    with [`SimInit::link()`],
//! 4. initialization of a [`Simulation`] instance with [`SimInit::init()`],
//! 5. scheduling of sensor and network stimuli and incrementing oracle time
//!    while observing the platform outputs.
//!
//! The [`Simulation`] is the oracle: it owns the only notion of true time and
//! grants the wake-up requests of the platforms. All platforms run on the same
//! thread and are stepped in a deterministic order: actions scheduled for the
//! same oracle time are processed in the order in which they were scheduled.

mod sim_init;

pub use sim_init::SimInit;

use std::collections::HashSet;
use std::error::Error;
use std::fmt;
use std::time::Duration;

use tracing::{info, trace};

use crate::boundary::BoundaryOutput;
use crate::causality::{BoundaryKind, PortDirection};
use crate::logging::OracleTimeGuard;
use crate::platform::{ExecutionError, Platform, PlatformId, TimeSource};
use crate::time::{self, ClockError, ClockKind, MonotonicTime, Tag};
use crate::token::Token;
use crate::util::priority_queue::PriorityQueue;

/// Simulation environment.
///
/// A `Simulation` is created by calling
/// [`SimInit::init()`](crate::simulation::SimInit::init) on a simulation
/// initializer. It owns all platforms added beforehand to
/// [`SimInit`](crate::simulation::SimInit) and a queue of timed actions:
/// boundary tokens, clock drift updates and the wake-ups requested by the
/// platforms.
///
/// A call to [`step()`](Simulation::step) will:
///
/// 1. increment oracle time until that of the next scheduled action, then
/// 2. process all actions scheduled for the new oracle time, including those
///    scheduled while processing, and
/// 3. forward the tokens emitted by platform outputs to the linked platform
///    inputs, or collect them if the output is not linked.
///
/// The [`step_by()`](Simulation::step_by) and
/// [`step_until()`](Simulation::step_until) methods operate similarly but
/// iterate until the target oracle time has been reached.
///
/// Any [`ExecutionError`] is fatal: it is returned by the step that caused
/// it and the simulation is halted.
pub struct Simulation {
    platforms: Vec<Platform>,
    links: Vec<Link>,
    outputs: Vec<Vec<BoundaryOutput>>,
    wakes: WakeQueue,
    halted: bool,
}

impl Simulation {
    /// Creates a new `Simulation`.
    pub(crate) fn new(platforms: Vec<Platform>, links: Vec<Link>, start_time: MonotonicTime) -> Self {
        let outputs = platforms.iter().map(|_| Vec::new()).collect();

        Self {
            platforms,
            links,
            outputs,
            wakes: WakeQueue::new(start_time),
            halted: false,
        }
    }

    /// Returns the current oracle time.
    pub fn time(&self) -> MonotonicTime {
        self.wakes.time
    }

    /// Returns a platform by name.
    pub fn platform(&self, name: &str) -> Option<&Platform> {
        self.platforms.iter().find(|p| p.name() == name)
    }

    /// Iterates over all platforms.
    pub fn platforms(&self) -> impl Iterator<Item = &Platform> + '_ {
        self.platforms.iter()
    }

    /// Checks whether the simulation was halted by a fatal error or a call
    /// to [`Simulation::wrapup()`].
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Advances oracle time to that of the next scheduled action, processing
    /// that action as well as all other actions scheduled for the same time.
    ///
    /// Nothing happens if no action is scheduled.
    pub fn step(&mut self) -> Result<(), SimulationError> {
        self.check_running()?;
        self.step_to_next_bounded(MonotonicTime::MAX)?;

        Ok(())
    }

    /// Iteratively advances oracle time by the specified duration, as if by
    /// calling [`Simulation::step()`] repeatedly.
    ///
    /// The oracle time upon completion is equal to the initial oracle time
    /// incremented by the specified duration, whether or not an action was
    /// scheduled for that time.
    pub fn step_by(&mut self, duration: Duration) -> Result<(), SimulationError> {
        self.check_running()?;
        let target_time = time::add_duration(self.time(), duration);

        self.step_until_unchecked(target_time)
    }

    /// Iteratively advances oracle time until the specified deadline, as if
    /// by calling [`Simulation::step()`] repeatedly.
    ///
    /// An error is returned if the target time is not in the future of the
    /// current oracle time.
    pub fn step_until(&mut self, target_time: MonotonicTime) -> Result<(), SimulationError> {
        self.check_running()?;
        if self.time() >= target_time {
            return Err(SimulationError::InvalidScheduledTime);
        }

        self.step_until_unchecked(target_time)
    }

    /// Schedules the delivery of a token to a platform input at the
    /// specified oracle time.
    ///
    /// For a sensor, the token is considered sensed at the timestamp of
    /// `tag`, which is usually the delivery time. For a network input, the
    /// tag is the model tag carried by the token.
    ///
    /// An error is returned if the delivery time lies in the past of the
    /// current oracle time or if no such platform input exists.
    pub fn schedule_input(
        &mut self,
        platform: &str,
        port: &str,
        channel: usize,
        token: Token,
        tag: Tag,
        time: MonotonicTime,
    ) -> Result<(), SimulationError> {
        self.check_running()?;
        if time < self.time() {
            return Err(SimulationError::InvalidScheduledTime);
        }
        let id = self.resolve_input(platform, port)?;

        self.wakes.schedule(
            time,
            Action::Input {
                platform: id,
                port: port.to_owned(),
                channel,
                token,
                tag,
            },
        );

        Ok(())
    }

    /// Schedules a sensor reading at the specified oracle time.
    ///
    /// This is a shorthand for [`Simulation::schedule_input()`] with a tag
    /// matching the sensing time on channel 0.
    pub fn schedule_sensor_reading(
        &mut self,
        platform: &str,
        sensor: &str,
        token: Token,
        time: MonotonicTime,
    ) -> Result<(), SimulationError> {
        self.schedule_input(platform, sensor, 0, token, Tag::at(time), time)
    }

    /// Changes the drift of a platform clock at the current oracle time.
    pub fn update_drift(&mut self, platform: &str, kind: ClockKind, drift: f64) -> Result<(), SimulationError> {
        self.check_running()?;
        let id = self.resolve(platform)?;
        let _guard = OracleTimeGuard::enter(self.time());

        self.dispatch(Action::Drift {
            platform: id,
            kind,
            drift,
        })
    }

    /// Schedules a change of the drift of a platform clock.
    pub fn schedule_drift(
        &mut self,
        platform: &str,
        kind: ClockKind,
        drift: f64,
        time: MonotonicTime,
    ) -> Result<(), SimulationError> {
        self.check_running()?;
        if time < self.time() {
            return Err(SimulationError::InvalidScheduledTime);
        }
        let id = self.resolve(platform)?;

        self.wakes.schedule(
            time,
            Action::Drift {
                platform: id,
                kind,
                drift,
            },
        );

        Ok(())
    }

    /// Returns and forgets the tokens emitted by the unlinked outputs of a
    /// platform.
    pub fn drain_outputs(&mut self, platform: &str) -> Result<Vec<BoundaryOutput>, SimulationError> {
        let id = self.resolve(platform)?;

        Ok(std::mem::take(&mut self.outputs[id.index()]))
    }

    /// Stops a platform: no new firing is started on this platform, while
    /// the firings it already started run to completion.
    pub fn stop_platform(&mut self, platform: &str) -> Result<(), SimulationError> {
        let id = self.resolve(platform)?;
        self.platforms[id.index()].stop();

        Ok(())
    }

    /// Discards all pending actions, wraps up all platforms and halts the
    /// simulation.
    pub fn wrapup(&mut self) {
        let _guard = OracleTimeGuard::enter(self.time());

        for platform in &mut self.platforms {
            platform.wrapup();
        }
        self.wakes.clear();
        self.halted = true;
        info!(time = %format_args!("{:.9}", self.time()), "simulation wrapped up");
    }

    pub(crate) fn initialize(&mut self) -> Result<(), SimulationError> {
        let _guard = OracleTimeGuard::enter(self.time());

        for idx in 0..self.platforms.len() {
            let result = self.platforms[idx].initialize(&mut self.wakes);
            self.complete(PlatformId(idx), result)?;
        }

        Ok(())
    }

    fn check_running(&self) -> Result<(), SimulationError> {
        if self.halted {
            return Err(SimulationError::Halted);
        }

        Ok(())
    }

    fn resolve(&self, platform: &str) -> Result<PlatformId, SimulationError> {
        self.platforms
            .iter()
            .position(|p| p.name() == platform)
            .map(PlatformId)
            .ok_or_else(|| SimulationError::UnknownPlatform {
                name: platform.to_owned(),
            })
    }

    fn resolve_input(&self, platform: &str, port: &str) -> Result<PlatformId, SimulationError> {
        let id = self.resolve(platform)?;
        let graph = self.platforms[id.index()].graph();
        let is_input = graph
            .find_boundary_port(port)
            .and_then(|port| graph.port(port).boundary())
            .is_some_and(|kind: BoundaryKind| kind.direction() == PortDirection::Input);
        if !is_input {
            return Err(SimulationError::UnknownPort {
                platform: platform.to_owned(),
                port: port.to_owned(),
            });
        }

        Ok(id)
    }

    /// Advances oracle time to that of the next scheduled action if it does
    /// not exceed the specified bound, processing all actions scheduled for
    /// that time.
    ///
    /// If an action was found that satisfied the time bound, the
    /// corresponding new oracle time is returned.
    fn step_to_next_bounded(
        &mut self,
        upper_time_bound: MonotonicTime,
    ) -> Result<Option<MonotonicTime>, SimulationError> {
        let current_time = match self.wakes.peek_time() {
            Some(t) if t <= upper_time_bound => t,
            _ => return Ok(None),
        };
        self.wakes.time = current_time;
        let _guard = OracleTimeGuard::enter(current_time);

        // Actions scheduled for the current time while processing are
        // processed in the same step.
        while let Some(action) = self.wakes.pull_due() {
            self.dispatch(action)?;
        }

        Ok(Some(current_time))
    }

    /// Iteratively advances oracle time and processes all actions scheduled
    /// up to the specified target time.
    fn step_until_unchecked(&mut self, target_time: MonotonicTime) -> Result<(), SimulationError> {
        loop {
            match self.step_to_next_bounded(target_time)? {
                // The target time was reached exactly.
                Some(t) if t == target_time => return Ok(()),
                // No actions are scheduled before or at the target time.
                None => {
                    self.wakes.time = target_time;
                    return Ok(());
                }
                // The target time was not reached yet.
                _ => {}
            }
        }
    }

    fn dispatch(&mut self, action: Action) -> Result<(), SimulationError> {
        let now = self.time();
        let (id, result) = match action {
            Action::Wake(id) => {
                self.wakes.pending.remove(&(now, id));
                trace!(platform = %id, "wake-up");
                let result = self.platforms[id.index()].notify_physical_time_advanced(now, &mut self.wakes);

                (id, result)
            }
            Action::Input {
                platform,
                port,
                channel,
                token,
                tag,
            } => {
                let result = self.platforms[platform.index()].deliver_boundary_token(
                    &port,
                    channel,
                    token,
                    tag,
                    &mut self.wakes,
                );

                (platform, result)
            }
            Action::Drift {
                platform,
                kind,
                drift,
            } => {
                let result = self.platforms[platform.index()].update_clock_drift(kind, drift, &mut self.wakes);

                (platform, result)
            }
        };

        self.complete(id, result)
    }

    /// Halts the simulation on error and forwards the emitted tokens
    /// otherwise.
    ///
    /// Rejected clock updates leave the platform unchanged and do not halt
    /// the simulation.
    fn complete(&mut self, id: PlatformId, result: Result<(), ExecutionError>) -> Result<(), SimulationError> {
        if let Err(error) = result {
            let platform = self.platforms[id.index()].name().to_owned();
            let error = match error {
                ExecutionError::Clock(error) => {
                    return Err(SimulationError::ClockRejected { platform, error });
                }
                error => error,
            };
            self.halted = true;
            info!(%platform, "simulation halted");

            return Err(SimulationError::Execution { platform, error });
        }

        let now = self.time();
        for output in self.platforms[id.index()].drain_boundary_outputs() {
            let mut linked = false;
            for link in self
                .links
                .iter()
                .filter(|l| l.from == id && l.output == output.port)
            {
                linked = true;
                self.wakes.schedule(
                    time::add_duration(now, link.latency),
                    Action::Input {
                        platform: link.to,
                        port: link.input.clone(),
                        channel: output.channel,
                        token: output.token.clone(),
                        tag: output.tag,
                    },
                );
            }
            if !linked {
                self.outputs[id.index()].push(output);
            }
        }

        Ok(())
    }
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("time", &self.time())
            .field("platforms", &self.platforms.len())
            .field("halted", &self.halted)
            .finish_non_exhaustive()
    }
}

/// A network link from a platform output to a platform input.
#[derive(Clone, Debug)]
pub(crate) struct Link {
    pub(crate) from: PlatformId,
    pub(crate) output: String,
    pub(crate) to: PlatformId,
    pub(crate) input: String,
    pub(crate) latency: Duration,
}

/// A timed action.
enum Action {
    Wake(PlatformId),
    Input {
        platform: PlatformId,
        port: String,
        channel: usize,
        token: Token,
        tag: Tag,
    },
    Drift {
        platform: PlatformId,
        kind: ClockKind,
        drift: f64,
    },
}

/// The action queue, which also acts as the time source of the platforms.
struct WakeQueue {
    time: MonotonicTime,
    actions: PriorityQueue<MonotonicTime, Action>,
    // Wake-ups already queued, to coalesce duplicate requests.
    pending: HashSet<(MonotonicTime, PlatformId)>,
}

impl WakeQueue {
    fn new(time: MonotonicTime) -> Self {
        Self {
            time,
            actions: PriorityQueue::new(),
            pending: HashSet::new(),
        }
    }

    fn schedule(&mut self, time: MonotonicTime, action: Action) {
        self.actions.insert(time, action);
    }

    fn peek_time(&self) -> Option<MonotonicTime> {
        self.actions.peek_key().copied()
    }

    /// Pulls the next action if it is due at the current time.
    fn pull_due(&mut self) -> Option<Action> {
        if self.peek_time()? > self.time {
            return None;
        }

        self.actions.pull().map(|(_, action)| action)
    }

    fn clear(&mut self) {
        self.actions.clear();
        self.pending.clear();
    }
}

impl TimeSource for WakeQueue {
    fn now(&self) -> MonotonicTime {
        self.time
    }

    fn request_wake_at(&mut self, platform: PlatformId, time: MonotonicTime) -> MonotonicTime {
        let time = time.max(self.time);
        if self.pending.insert((time, platform)) {
            self.actions.insert(time, Action::Wake(platform));
        }

        time
    }
}

/// Error returned when a simulation operation fails.
#[derive(Debug)]
pub enum SimulationError {
    /// The scheduled time does not lie in the future of the current oracle
    /// time.
    InvalidScheduledTime,
    /// No platform with this name exists.
    UnknownPlatform {
        /// Requested platform name.
        name: String,
    },
    /// Two platforms share the same name.
    DuplicatePlatform {
        /// Duplicate platform name.
        name: String,
    },
    /// The platform has no boundary port with this name and direction.
    UnknownPort {
        /// Platform name.
        platform: String,
        /// Requested port name.
        port: String,
    },
    /// A clock drift update was rejected; the platform and the simulation
    /// are left unchanged.
    ClockRejected {
        /// Name of the platform owning the clock.
        platform: String,
        /// Reason of the rejection.
        error: ClockError,
    },
    /// A platform failed; the simulation is halted.
    Execution {
        /// Name of the failing platform.
        platform: String,
        /// Error reported by the platform.
        error: ExecutionError,
    },
    /// The simulation was halted by an earlier error or by a wrap-up.
    Halted,
}

impl fmt::Display for SimulationError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidScheduledTime => {
                write!(fmt, "the scheduled time does not lie in the future of the current oracle time")
            }
            Self::UnknownPlatform { name } => write!(fmt, "no platform named '{}'", name),
            Self::DuplicatePlatform { name } => {
                write!(fmt, "a platform named '{}' was already added", name)
            }
            Self::UnknownPort { platform, port } => {
                write!(fmt, "platform '{}' has no suitable port named '{}'", platform, port)
            }
            Self::ClockRejected { platform, error } => {
                write!(fmt, "clock update rejected on platform '{}': {}", platform, error)
            }
            Self::Execution { platform, error } => {
                write!(fmt, "platform '{}' failed: {}", platform, error)
            }
            Self::Halted => write!(fmt, "the simulation is halted"),
        }
    }
}

impl Error for SimulationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ClockRejected { error, .. } => Some(error),
            Self::Execution { error, .. } => Some(error),
            _ => None,
        }
    }
}

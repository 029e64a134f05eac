//! Execution platforms.
//!
//! A [`Platform`] is one instance of the Ptides scheduler. It owns a set of
//! actors, the static analysis of their causality graph, an event queue, an
//! execution stack, a platform clock and an execution clock. It is built with
//! a [`PlatformBuilder`] and then driven by an enclosing [`TimeSource`],
//! typically a [`Simulation`](crate::simulation::Simulation), through three
//! kinds of stimuli:
//!
//! * a token delivered to a platform input with
//!   [`Platform::deliver_boundary_token`],
//! * a previously requested wake-up, signaled with
//!   [`Platform::notify_physical_time_advanced`],
//! * a change of the drift of one of its clocks, with
//!   [`Platform::update_clock_drift`].
//!
//! Each stimulus triggers an evaluation of the scheduler: events that are
//! safe to process are started according to the configured
//! [`PriorityPolicy`], firings whose execution time has elapsed are
//! completed, and wake-ups are requested from the time source for the next
//! instants at which the outcome of an evaluation may change.
//!
//! The platform never blocks: whenever nothing can be done until physical
//! time advances, control returns to the time source.

mod builder;

use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt;
use std::time::Duration;

use tracing::{debug, error, info, trace, warn, Span};

use crate::actor::{Actor, ActorError, FiringContext, FiringEffects};
use crate::boundary::{self, BoundaryOutput, BoundaryQueues, HeldToken, Transfer};
use crate::causality::{
    ActorId, BoundaryKind, CausalityError, CausalityGraph, CausalityGraphResult, PortDirection,
    PortId, PortOwner, SuperdenseDependency,
};
use crate::event::{Deadline, Event, EventId, EventQueue};
use crate::receiver::{Receiver, ReceiverError};
use crate::scheduler::{
    Candidate, CandidateScope, ExecutionStack, ExecutionStackEntry, FiringRecord,
    PreemptionPolicy, PriorityPolicy, Safety, SchedulerState, SelectionContext,
};
use crate::time::{self, ClockError, ClockKind, MonotonicTime, RealTimeClock, Tag, WakeupStatus};
use crate::token::Token;

pub use builder::PlatformBuilder;

/// Lateness tolerated when a completion is observed after its due time.
const COMPLETION_TOLERANCE: Duration = Duration::from_micros(1);

/// Identifier of a platform within its time source.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlatformId(pub(crate) usize);

impl PlatformId {
    /// Creates an identifier from an index.
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the index of the platform.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "platform #{}", self.0)
    }
}

/// Read-only environment of a platform.
///
/// These bounds are shared by all platforms of a distributed system and
/// enter the delay offsets of the platform inputs.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PlatformContext {
    clock_sync_error: Duration,
    network_delay: Duration,
}

impl PlatformContext {
    /// Creates a context with null bounds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bound of the synchronization error between platform clocks.
    pub fn with_clock_sync_error(mut self, error: Duration) -> Self {
        self.clock_sync_error = error;
        self
    }

    /// Sets the network delay assumed for network inputs without an
    /// explicit bound.
    pub fn with_network_delay(mut self, delay: Duration) -> Self {
        self.network_delay = delay;
        self
    }

    /// Returns the bound of the synchronization error between platform
    /// clocks.
    pub fn clock_sync_error(&self) -> Duration {
        self.clock_sync_error
    }

    /// Returns the default network delay bound.
    pub fn network_delay(&self) -> Duration {
        self.network_delay
    }
}

/// Counters maintained by a platform.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PlatformStats {
    /// Number of scheduler evaluations.
    pub evaluations: u64,
    /// Number of actor firings, including refirings.
    pub firings: u64,
    /// Number of preemptions of an executing firing.
    pub preemptions: u64,
    /// Number of wake-up callbacks dropped because they were made stale by
    /// a drift update.
    pub ignored_wakeups: u64,
    /// Number of actuation deadline misses degraded to a warning.
    pub deadline_misses_ignored: u64,
}

/// The enclosing source of oracle time.
pub trait TimeSource {
    /// Returns the current oracle time.
    fn now(&self) -> MonotonicTime;

    /// Requests a call to [`Platform::notify_physical_time_advanced`] at the
    /// specified oracle time and returns the time at which the call will
    /// actually take place.
    fn request_wake_at(&mut self, platform: PlatformId, time: MonotonicTime) -> MonotonicTime;
}

/// One instance of the Ptides scheduler.
pub struct Platform {
    id: PlatformId,
    name: String,
    graph: CausalityGraph,
    analysis: CausalityGraphResult,
    actors: Vec<ActorSlot>,
    receivers: Vec<Vec<Receiver>>,
    queue: EventQueue,
    stack: ExecutionStack,
    platform_clock: RealTimeClock,
    execution_clock: RealTimeClock,
    boundary: BoundaryQueues,
    priority: Box<dyn PriorityPolicy>,
    preemption: Box<dyn PreemptionPolicy>,
    scheduler_overhead: Duration,
    upstream_evidence: bool,
    state: SchedulerState,
    start_time: MonotonicTime,
    oracle_now: MonotonicTime,
    physical: Tag,
    current_tag: Tag,
    last_consumed: HashMap<PortId, Tag>,
    armed: HashSet<(EventId, MonotonicTime)>,
    wake_requests: Vec<MonotonicTime>,
    frozen_wakeups: bool,
    initializing: bool,
    stopped: bool,
    stats: PlatformStats,
    span: Span,
}

struct ActorSlot {
    actor: Box<dyn Actor>,
    enabled: bool,
}

/// Outcome of one scheduling decision.
enum Step {
    /// The firing must take place now.
    Fire(ExecutionStackEntry),
    /// The scheduler state changed and another decision may be taken.
    Continue,
    /// Nothing more can be done until the next stimulus.
    Wait,
}

impl Platform {
    /// Returns the identifier of the platform within its time source.
    pub fn id(&self) -> PlatformId {
        self.id
    }

    /// Returns the name of the platform.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the scheduler state.
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Returns the platform counters.
    pub fn stats(&self) -> PlatformStats {
        self.stats
    }

    /// Returns the model tag of the last firing.
    pub fn current_tag(&self) -> Tag {
        self.current_tag
    }

    /// Returns the physical tag as of the last evaluation.
    pub fn physical_tag(&self) -> Tag {
        self.physical
    }

    /// Returns the causality graph of the platform.
    pub fn graph(&self) -> &CausalityGraph {
        &self.graph
    }

    /// Returns the delay offset analysis of the platform.
    pub fn analysis(&self) -> &CausalityGraphResult {
        &self.analysis
    }

    /// Returns the number of queued events.
    pub fn queued_events(&self) -> usize {
        self.queue.len()
    }

    /// Returns the in-flight firings.
    pub fn execution_stack(&self) -> &ExecutionStack {
        &self.stack
    }

    /// Returns the number of tokens held at the platform boundary.
    pub fn held_boundary_tokens(&self) -> usize {
        self.boundary.held()
    }

    /// Returns the platform clock.
    pub fn platform_clock(&self) -> &RealTimeClock {
        &self.platform_clock
    }

    /// Returns the execution clock.
    pub fn execution_clock(&self) -> &RealTimeClock {
        &self.execution_clock
    }

    /// Checks whether the platform was stopped.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Checks whether an actor is still enabled.
    ///
    /// An actor is disabled once its `postfire` method returned `false`.
    pub fn is_enabled(&self, actor: &str) -> bool {
        self.graph
            .actors()
            .zip(&self.actors)
            .any(|((_, info), slot)| info.name == actor && slot.enabled)
    }

    /// Initializes the platform at the current oracle time.
    ///
    /// All clocks are re-anchored so that local time equals oracle time, all
    /// queues are cleared and the `initialize` method of each actor is
    /// called. Firings requested during initialization at the start time
    /// keep the initial microstep.
    pub fn initialize(&mut self, source: &mut dyn TimeSource) -> Result<(), ExecutionError> {
        let span = self.span.clone();
        let _enter = span.enter();

        let start_time = source.now();
        self.start_time = start_time;
        self.reset(start_time);
        self.stopped = false;
        for slot in &mut self.actors {
            slot.enabled = true;
        }
        info!(start = %format_args!("{:.9}", start_time), "initializing platform");

        self.run(source, |this| {
            this.initializing = true;
            let result = (0..this.actors.len()).try_for_each(|idx| this.initialize_actor(ActorId(idx)));
            this.initializing = false;
            result?;

            this.stimulus()
        })
    }

    /// Signals that oracle time has advanced, typically in response to a
    /// wake-up requested from the time source.
    ///
    /// Callbacks that only correspond to wake-ups made stale by a drift
    /// update are dropped without evaluating the scheduler.
    pub fn notify_physical_time_advanced(
        &mut self,
        new_time: MonotonicTime,
        source: &mut dyn TimeSource,
    ) -> Result<(), ExecutionError> {
        let span = self.span.clone();
        let _enter = span.enter();

        self.oracle_now = self.oracle_now.max(new_time);
        let platform = self.platform_clock.take_wakeups(self.oracle_now);
        let execution = self.execution_clock.take_wakeups(self.oracle_now);

        let is_due = |status: WakeupStatus| matches!(status, WakeupStatus::Due(_));
        let is_stale = |status: WakeupStatus| matches!(status, WakeupStatus::Stale(_));
        if !is_due(platform) && !is_due(execution) && (is_stale(platform) || is_stale(execution)) {
            self.stats.ignored_wakeups += 1;
            warn!(
                oracle = %format_args!("{:.9}", self.oracle_now),
                "stale wake-up dropped"
            );

            return Ok(());
        }

        self.run(source, Self::stimulus)
    }

    /// Delivers a token to a platform input.
    ///
    /// A token delivered to a sensor is considered sensed at the timestamp of
    /// `tag` and is held until its device delay has elapsed. A token
    /// delivered to a network input enters the platform immediately with the
    /// tag it carries.
    ///
    /// Tokens delivered to a stopped platform are dropped.
    pub fn deliver_boundary_token(
        &mut self,
        port: &str,
        channel: usize,
        token: Token,
        tag: Tag,
        source: &mut dyn TimeSource,
    ) -> Result<(), ExecutionError> {
        let span = self.span.clone();
        let _enter = span.enter();

        self.oracle_now = self.oracle_now.max(source.now());
        if self.stopped {
            debug!(port, %tag, "boundary token dropped by a stopped platform");
            return Ok(());
        }

        self.run(source, |this| this.deliver(port, channel, token, tag))
    }

    /// Returns and forgets all tokens emitted by the platform outputs.
    pub fn drain_boundary_outputs(&mut self) -> Vec<BoundaryOutput> {
        self.boundary.drain()
    }

    /// Changes the drift of one of the platform clocks at the current oracle
    /// time.
    ///
    /// Pending wake-ups of this clock are requested again at their new
    /// oracle time. A drift that is not strictly positive is rejected with
    /// [`ExecutionError::Clock`] and the platform is left unchanged.
    pub fn update_clock_drift(
        &mut self,
        kind: ClockKind,
        drift: f64,
        source: &mut dyn TimeSource,
    ) -> Result<(), ExecutionError> {
        let span = self.span.clone();
        let _enter = span.enter();

        self.oracle_now = self.oracle_now.max(source.now());

        let oracle_now = self.oracle_now;
        let clock = match kind {
            ClockKind::Platform => &mut self.platform_clock,
            ClockKind::Execution => &mut self.execution_clock,
        };
        let moved = match clock.update_drift(oracle_now, drift) {
            Ok(moved) => moved,
            Err(e) => {
                warn!(clock = %kind, drift, "clock drift update rejected");
                return Err(e.into());
            }
        };

        self.run(source, |this| {
            info!(clock = %kind, drift, reprojected = moved.len(), "clock drift updated");
            this.wake_requests
                .extend(moved.iter().map(|reprojection| reprojection.new_oracle));

            // Wake-ups dropped while a clock was frozen must be requested
            // again.
            if std::mem::take(&mut this.frozen_wakeups) {
                this.armed.clear();
                if let Some(top) = this.stack.top_mut() {
                    top.armed = None;
                }
                return this.stimulus();
            }

            Ok(())
        })
    }

    /// Stops the platform.
    ///
    /// No new firing is started after this call and tokens delivered to the
    /// platform are dropped. Firings already on the execution stack,
    /// including preempted ones, still run to completion.
    pub fn stop(&mut self) {
        let _enter = self.span.enter();

        self.stopped = true;
        info!("platform stopped");
    }

    /// Discards all pending work without firing any remaining event and
    /// resets the platform clocks.
    ///
    /// The platform must be initialized again before it can be used.
    pub fn wrapup(&mut self) {
        let span = self.span.clone();
        let _enter = span.enter();

        self.reset(self.start_time);
        self.stopped = true;
        info!("platform wrapped up");
    }

    pub(crate) fn set_id(&mut self, id: PlatformId) {
        self.id = id;
    }

    /// Runs an operation and forwards the wake-up requests it produced to the
    /// time source.
    fn run<F>(&mut self, source: &mut dyn TimeSource, op: F) -> Result<(), ExecutionError>
    where
        F: FnOnce(&mut Self) -> Result<(), ExecutionError>,
    {
        let result = op(self).and_then(|()| self.flush_wake_requests(source));
        if let Err(e) = &result {
            self.wake_requests.clear();
            error!(error = %e, "platform execution failed");
        }

        result
    }

    fn flush_wake_requests(&mut self, source: &mut dyn TimeSource) -> Result<(), ExecutionError> {
        let mut requests = std::mem::take(&mut self.wake_requests);
        requests.sort();
        requests.dedup();

        for requested in requests {
            let granted = source.request_wake_at(self.id, requested);
            if granted != requested {
                return Err(ExecutionError::RefireRejected { requested, granted });
            }
        }

        Ok(())
    }

    /// Registers a wake-up at a local time of one of the clocks.
    fn schedule_wake(&mut self, kind: ClockKind, local: MonotonicTime) -> Result<(), ExecutionError> {
        let clock = match kind {
            ClockKind::Platform => &mut self.platform_clock,
            ClockKind::Execution => &mut self.execution_clock,
        };
        match clock.register_wakeup(local) {
            Ok(oracle) => {
                trace!(
                    clock = %kind,
                    local = %format_args!("{:.9}", local),
                    oracle = %format_args!("{:.9}", oracle),
                    "wake-up requested"
                );
                self.wake_requests.push(oracle);

                Ok(())
            }
            Err(ClockError::DriftZero { .. }) => {
                debug!(
                    clock = %kind,
                    local = %format_args!("{:.9}", local),
                    "clock frozen, wake-up deferred to the next drift update"
                );
                self.frozen_wakeups = true;

                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn platform_now(&self) -> MonotonicTime {
        self.platform_clock.current_local_time(self.oracle_now)
    }

    fn execution_now(&self) -> MonotonicTime {
        self.execution_clock.current_local_time(self.oracle_now)
    }

    fn actor_name(&self, actor: ActorId) -> &str {
        &self.graph.actor(actor).name
    }

    fn reset(&mut self, time: MonotonicTime) {
        self.queue.clear();
        self.stack.clear();
        self.boundary.clear();
        for receiver in self.receivers.iter_mut().flatten() {
            receiver.clear();
        }
        self.last_consumed.clear();
        self.armed.clear();
        self.wake_requests.clear();
        self.frozen_wakeups = false;
        self.platform_clock.reset(time, time);
        self.execution_clock.reset(time, time);
        self.oracle_now = time;
        self.physical = Tag::at(time);
        self.current_tag = Tag::at(time);
        self.state = SchedulerState::Idle;
    }

    fn initialize_actor(&mut self, actor: ActorId) -> Result<(), ExecutionError> {
        let tag = self.current_tag;
        let physical_time = self.platform_now();

        let mut ctx = FiringContext::new(actor, tag, physical_time, &self.graph, &mut self.receivers);
        let result = self.actors[actor.0].actor.initialize(&mut ctx);
        let effects = ctx.into_effects();
        result.map_err(|e| self.actor_error(actor, e))?;

        self.apply_effects(actor, &FiringRecord::default(), effects)
    }

    fn deliver(&mut self, port_name: &str, channel: usize, token: Token, tag: Tag) -> Result<(), ExecutionError> {
        let (port, kind) = self
            .graph
            .find_boundary_port(port_name)
            .and_then(|id| {
                let info = self.graph.port(id);
                let kind = info.boundary()?;
                (kind.direction() == PortDirection::Input && channel < info.width)
                    .then_some((id, kind))
            })
            .ok_or_else(|| ExecutionError::UnknownPort {
                name: format!("{}[{}]", port_name, channel),
            })?;

        // Sensed values always enter with a null microstep.
        let tag = match kind {
            BoundaryKind::Sensor => Tag::at(tag.timestamp),
            _ => tag,
        };
        let now = self.platform_now();

        match boundary::input_transfer(kind, &self.graph.port(port).timing, tag, now) {
            Transfer::Now => {
                debug!(port = port_name, channel, %tag, "boundary token entered");
                self.enter_token(port, channel, token, tag, Some(now))?;

                self.stimulus()
            }
            Transfer::At(release) => {
                debug!(
                    port = port_name,
                    channel,
                    %tag,
                    release = %format_args!("{:.9}", release),
                    "sensor token held"
                );
                self.boundary.hold_input(
                    release,
                    HeldToken {
                        port,
                        channel,
                        token,
                        tag,
                        source_timestamp: Some(now),
                    },
                );

                self.schedule_wake(ClockKind::Platform, release)
            }
            Transfer::Late { required } => Err(ExecutionError::DeadlineMiss {
                actor: port_name.to_owned(),
                required,
                actual: now,
            }),
        }
    }

    /// Routes a token from a platform input to the connected actor inputs.
    fn enter_token(
        &mut self,
        port: PortId,
        channel: usize,
        token: Token,
        tag: Tag,
        source: Option<MonotonicTime>,
    ) -> Result<(), ExecutionError> {
        let sinks: Vec<_> = self
            .graph
            .connections_from(port)
            .filter(|c| c.from_channel == channel)
            .map(|c| (c.to, c.to_channel))
            .collect();

        for (sink, sink_channel) in sinks {
            self.route(sink, sink_channel, token.clone(), tag, source)?;
        }

        Ok(())
    }

    /// Delivers a token to a sink: an event is queued for actor inputs while
    /// platform outputs go through the boundary.
    ///
    /// The source timestamp is that of the platform input the token
    /// originates from.
    fn route(
        &mut self,
        sink: PortId,
        channel: usize,
        token: Token,
        tag: Tag,
        source: Option<MonotonicTime>,
    ) -> Result<(), ExecutionError> {
        let info = self.graph.port(sink);
        match info.owner {
            PortOwner::Actor(actor) => {
                if !self.actors[actor.0].enabled {
                    trace!(port = %self.graph.port_path(sink), "token for a disabled actor dropped");
                    return Ok(());
                }
                let deadline = Deadline::relative_to(tag.timestamp, info.timing.relative_deadline);
                let event = Event::triggered(
                    tag,
                    actor,
                    sink,
                    channel,
                    token,
                    deadline,
                    self.analysis.port_depth(sink),
                )
                .with_source_timestamp(source);
                let id = self.queue.insert(event);
                trace!(event = %id, port = %self.graph.port_path(sink), %tag, "event queued");

                Ok(())
            }
            PortOwner::Boundary(kind) => self.transfer_output(sink, channel, token, tag, source, kind),
        }
    }

    fn transfer_output(
        &mut self,
        port: PortId,
        channel: usize,
        token: Token,
        tag: Tag,
        source: Option<MonotonicTime>,
        kind: BoundaryKind,
    ) -> Result<(), ExecutionError> {
        let now = self.platform_now();
        let timing = &self.graph.port(port).timing;
        let ignore_deadline = timing.ignore_deadline;

        match boundary::output_transfer(kind, timing, tag, now) {
            Transfer::Now => {
                self.emit(port, channel, token, tag, source, now);

                Ok(())
            }
            Transfer::At(due) => {
                debug!(
                    port = %self.graph.port_path(port),
                    %tag,
                    due = %format_args!("{:.9}", due),
                    "output token held"
                );
                self.boundary.hold_output(
                    due,
                    HeldToken {
                        port,
                        channel,
                        token,
                        tag,
                        source_timestamp: source,
                    },
                );

                self.schedule_wake(ClockKind::Platform, due)
            }
            Transfer::Late { required } if ignore_deadline => {
                warn!(
                    port = %self.graph.port_path(port),
                    required = %format_args!("{:.9}", required),
                    actual = %format_args!("{:.9}", now),
                    "actuation deadline missed, token emitted anyway"
                );
                self.stats.deadline_misses_ignored += 1;
                self.emit(port, channel, token, tag, source, now);

                Ok(())
            }
            Transfer::Late { required } => Err(ExecutionError::DeadlineMiss {
                actor: self.graph.port_path(port),
                required,
                actual: now,
            }),
        }
    }

    fn emit(
        &mut self,
        port: PortId,
        channel: usize,
        token: Token,
        tag: Tag,
        source: Option<MonotonicTime>,
        now: MonotonicTime,
    ) {
        let name = self.graph.port(port).name.clone();
        debug!(port = %name, channel, %tag, "token emitted");

        self.boundary.emit(BoundaryOutput {
            port: name,
            channel,
            token,
            tag,
            emitted_at: now,
            source_timestamp: source,
        });
    }

    /// Moves the boundary tokens whose transfer time has come.
    fn release_boundary(&mut self) -> Result<(), ExecutionError> {
        let now = self.platform_now();

        for (_, held) in self.boundary.take_due_inputs(now) {
            debug!(port = %self.graph.port_path(held.port), tag = %held.tag, "sensor token released");
            self.enter_token(held.port, held.channel, held.token, held.tag, held.source_timestamp)?;
        }
        for (_, held) in self.boundary.take_due_outputs(now) {
            self.emit(held.port, held.channel, held.token, held.tag, held.source_timestamp, now);
        }

        Ok(())
    }

    /// Reacts to a stimulus, accounting for the scheduler overhead.
    fn stimulus(&mut self) -> Result<(), ExecutionError> {
        if !self.stopped {
            self.release_boundary()?;
        }

        if let SchedulerState::SchedulerRunning { until } = self.state {
            if self.platform_now() < until {
                trace!("stimulus absorbed by the running scheduler");
                return Ok(());
            }
            let now = self.execution_now();
            self.stack.resume(now);
            self.state = SchedulerState::Idle;

            return self.evaluate();
        }

        if self.stopped || self.scheduler_overhead.is_zero() {
            return self.evaluate();
        }

        let until = time::add_duration(self.platform_now(), self.scheduler_overhead);
        let now = self.execution_now();
        self.stack.pause(now);
        self.state = SchedulerState::SchedulerRunning { until };
        debug!(until = %format_args!("{:.9}", until), "scheduler running");

        self.schedule_wake(ClockKind::Platform, until)
    }

    /// Starts and completes firings until nothing more can be done at the
    /// current instant.
    fn evaluate(&mut self) -> Result<(), ExecutionError> {
        self.stats.evaluations += 1;

        let now = self.platform_now();
        if now > self.physical.timestamp {
            self.physical = Tag::at(now);
        }

        loop {
            match self.next_step()? {
                Step::Fire(entry) => self.fire(entry)?,
                Step::Continue => {}
                Step::Wait => break,
            }
        }

        self.state = match self.stack.top() {
            Some(top) => SchedulerState::Executing {
                actor: top.actor,
                until: top.finish_time(),
            },
            None if self.queue.is_empty() && self.boundary.held() == 0 => SchedulerState::Idle,
            None => SchedulerState::WaitingForPhysicalTime,
        };
        trace!(state = %self.state, "evaluation complete");

        Ok(())
    }

    fn next_step(&mut self) -> Result<Step, ExecutionError> {
        let exec_now = self.execution_now();

        let Some(top) = self.stack.top() else {
            if self.stopped {
                return Ok(Step::Wait);
            }
            let candidates = self.candidates()?;

            return match candidates.first() {
                Some(candidate) => self.start(candidate.id),
                None => Ok(Step::Wait),
            };
        };

        let (actor, finish, armed) = (top.actor, top.finish_time(), top.armed);
        if finish <= exec_now {
            let late = time::checked_duration_between(exec_now, finish).unwrap_or_default();
            if late > COMPLETION_TOLERANCE {
                return Err(ExecutionError::MissedCompletion {
                    actor: self.actor_name(actor).to_owned(),
                    due: finish,
                    actual: exec_now,
                });
            }

            return Ok(self.stack.pop(exec_now).map_or(Step::Continue, |entry| {
                debug!(actor = self.actor_name(entry.actor), tag = %entry.tag, "execution completed");
                Step::Fire(entry)
            }));
        }
        if armed != Some(finish) {
            self.schedule_wake(ClockKind::Execution, finish)?;
            if let Some(top) = self.stack.top_mut() {
                top.armed = Some(finish);
            }
        }
        if self.stopped {
            return Ok(Step::Wait);
        }

        let candidates = self.candidates()?;
        if candidates.is_empty() {
            return Ok(Step::Wait);
        }
        match self.preemption.decide_preempt(&self.stack, &candidates) {
            Some(id) => {
                self.stats.preemptions += 1;
                debug!(actor = self.actor_name(actor), by = %id, "execution preempted");

                self.start(id)
            }
            None => Ok(Step::Wait),
        }
    }

    /// Returns the events that may be started now, by decreasing priority.
    ///
    /// Wake-ups are requested for the events that are not yet safe or not
    /// yet released.
    fn candidates(&mut self) -> Result<Vec<Candidate>, ExecutionError> {
        let now = self.platform_now();
        let head_only = self.priority.scope() == CandidateScope::QueueHead;

        let mut eligible = Vec::new();
        let mut next_release: Option<MonotonicTime> = None;
        let mut wakes = Vec::new();
        let mut seen = HashSet::new();
        let mut microstep = self.physical.microstep;

        for (id, event) in self.queue.iter() {
            if self.stack.contains_actor(event.actor) || !seen.insert(event.actor) {
                if head_only {
                    break;
                }
                continue;
            }

            let offset = event
                .port
                .map(|(port, channel)| self.analysis.event_delay_offset(port, channel, event.is_pure()));
            let safe = match Safety::evaluate(self.physical, event.tag, offset) {
                Safety::Safe => true,
                Safety::NotBefore(threshold) if threshold <= now => {
                    microstep = microstep.max(event.tag.microstep);
                    true
                }
                Safety::NotBefore(threshold) => {
                    if self.upstream_evidence && self.has_upstream_evidence(event) {
                        debug!(event = %id, "event safe on upstream evidence");
                        true
                    } else {
                        trace!(
                            event = %id,
                            not_before = %format_args!("{:.9}", threshold),
                            "event not yet safe"
                        );
                        wakes.push((id, threshold));
                        false
                    }
                }
            };

            if safe {
                let candidate = self.candidate(id, event);
                match self.priority.release_time(&candidate) {
                    Some(release) if release > now => {
                        next_release = Some(next_release.map_or(release, |t| t.min(release)));
                        wakes.push((id, release));
                    }
                    _ => eligible.push(candidate),
                }
            }
            if head_only {
                break;
            }
        }

        self.physical.microstep = microstep;
        for (id, time) in wakes {
            if self.armed.insert((id, time)) {
                self.schedule_wake(ClockKind::Platform, time)?;
            }
        }

        let ctx = SelectionContext {
            physical_time: now,
            next_release,
        };

        Ok(self.priority.order(eligible, &ctx))
    }

    fn candidate(&self, id: EventId, event: &Event) -> Candidate {
        Candidate {
            id,
            actor: event.actor,
            tag: event.tag,
            depth: event.depth,
            deadline: event.absolute_deadline,
            execution_time: self.execution_time(event),
            real_time: self.graph.actor(event.actor).timing.must_fire_at_real_time(),
        }
    }

    /// Resolves the execution time of the firing processing an event.
    fn execution_time(&self, event: &Event) -> Duration {
        let actor = self.graph.actor(event.actor);
        let port = event.port_id().or_else(|| actor.inputs.first().copied());

        port.and_then(|port| self.graph.port(port).timing.execution_time)
            .or(actor.timing.execution_time)
            .unwrap_or(actor.timing.wcet)
    }

    /// Provisional relaxation of the safe-to-process test.
    ///
    /// An event is considered safe when every actor directly upstream of its
    /// equivalence class is idle and only has queued events which, once
    /// delayed through the actor, lie strictly after the event.
    fn has_upstream_evidence(&self, event: &Event) -> bool {
        let Some(port) = event.port_id() else {
            return true;
        };
        let timestamp = event.tag.timestamp;

        for &input in self.analysis.finite_equivalent_ports(port) {
            for channel in 0..self.graph.port(input).width {
                let Some(connection) = self.graph.connection_to(input, channel) else {
                    continue;
                };
                let PortOwner::Actor(upstream) = self.graph.port(connection.from).owner else {
                    return false;
                };
                if self.graph.actor(upstream).timing.must_fire_at_real_time()
                    || self.stack.contains_actor(upstream)
                {
                    return false;
                }
                let has_early_pure_event = self
                    .queue
                    .iter()
                    .any(|(_, e)| e.actor == upstream && e.is_pure() && e.tag.timestamp <= timestamp);
                if has_early_pure_event {
                    return false;
                }

                let mut inputs = self.graph.finite_dependent_inputs(connection.from).peekable();
                if inputs.peek().is_none() {
                    return false;
                }
                for upstream_input in inputs {
                    let delay = self.graph.dependency(upstream_input, connection.from).time();
                    let earliest = self
                        .queue
                        .iter()
                        .filter(|(_, e)| e.port_id() == Some(upstream_input))
                        .map(|(_, e)| e.tag.timestamp)
                        .min();
                    match earliest {
                        Some(t) if time::offset_secs(t, delay) > timestamp => {}
                        _ => return false,
                    }
                }
            }
        }

        true
    }

    /// Extracts an event together with the events it must be processed with
    /// and either returns the firing or pushes it on the stack.
    fn start(&mut self, id: EventId) -> Result<Step, ExecutionError> {
        let Some(event) = self.queue.get(id) else {
            return Ok(Step::Continue);
        };
        let execution_time = self.execution_time(event);

        // Pure events join the firing of same-tag events of their actor, and
        // conversely, provided the joining event is already safe.
        let (physical, now) = (self.physical, self.platform_now());
        let analysis = &self.analysis;
        let mut group = self.queue.take_same_tag_group(id, |reference, other| {
            if other.actor != reference.actor {
                return false;
            }
            if reference.is_pure() || other.is_pure() {
                let offset = other
                    .port
                    .map(|(port, channel)| analysis.event_delay_offset(port, channel, other.is_pure()));
                return match Safety::evaluate(physical, other.tag, offset) {
                    Safety::Safe => true,
                    Safety::NotBefore(threshold) => threshold <= now,
                };
            }
            match (reference.port_id(), other.port_id()) {
                (Some(r), Some(o)) => analysis.same_equivalence_class(r, o),
                _ => false,
            }
        });
        let consumed = group
            .iter()
            .find(|e| !e.is_pure())
            .and_then(|e| e.port_id().map(|port| (port, e.tag)));
        if let Some((port, tag)) = consumed {
            self.track_last_consumed(port, tag)?;
        }
        let queue = &self.queue;
        self.armed.retain(|(armed, _)| queue.get(*armed).is_some());

        let record = self.firing_record(&group);
        for event in &mut group {
            let (Some(token), Some((port, channel))) = (event.payload.take(), event.port) else {
                continue;
            };
            let Some(receiver) = self.receivers[port.0].get_mut(channel) else {
                continue;
            };
            receiver.put(token, event.tag).map_err(|e| match e {
                ReceiverError::OutOfOrder { tag, last } => ExecutionError::OutOfOrderViolation {
                    port: self.graph.port_path(port),
                    tag,
                    last,
                },
            })?;
        }

        let now = self.execution_now();
        let Some(entry) = ExecutionStackEntry::new(group, record, execution_time, now) else {
            return Ok(Step::Continue);
        };
        if execution_time.is_zero() {
            return Ok(Step::Fire(entry));
        }

        debug!(
            actor = self.actor_name(entry.actor),
            tag = %entry.tag,
            execution_time = ?execution_time,
            "execution started"
        );
        self.stack.push(entry, now);

        Ok(Step::Continue)
    }

    /// Checks that an input port consumes events in tag order.
    fn track_last_consumed(&mut self, port: PortId, tag: Tag) -> Result<(), ExecutionError> {
        if let Some(&last) = self.last_consumed.get(&port) {
            if tag <= last {
                return Err(ExecutionError::OutOfOrderViolation {
                    port: self.graph.port_path(port),
                    tag,
                    last,
                });
            }
        }
        self.last_consumed.insert(port, tag);

        Ok(())
    }

    fn firing_record(&self, group: &[Event]) -> FiringRecord {
        let Some(first) = group.first() else {
            return FiringRecord::default();
        };

        let deadline = group
            .iter()
            .map(|e| e.absolute_deadline)
            .min()
            .unwrap_or(Deadline::Earliest);
        let dependency = group
            .iter()
            .map(|e| match e.port_id() {
                Some(port) if !e.is_pure() => self.analysis.min_output_dependency(port),
                _ => SuperdenseDependency::OTIMES_IDENTITY,
            })
            .fold(SuperdenseDependency::OPLUS_IDENTITY, SuperdenseDependency::oplus);

        FiringRecord {
            timestamp: Some(first.tag.timestamp),
            deadline,
            dependency,
            source_port: first.port,
            source_timestamp: group.iter().filter_map(|e| e.source_timestamp).min(),
        }
    }

    /// Fires an actor at the tag of a firing, refiring it while tokens
    /// remain available at that tag.
    fn fire(&mut self, entry: ExecutionStackEntry) -> Result<(), ExecutionError> {
        let actor = entry.actor;
        if !self.actors[actor.0].enabled {
            return Ok(());
        }
        let tag = entry.tag;
        self.current_tag = tag;
        self.discard_stale_tokens(actor, tag);
        let physical_time = self.platform_now();

        loop {
            let mut ctx = FiringContext::new(actor, tag, physical_time, &self.graph, &mut self.receivers);
            let slot = &mut self.actors[actor.0];
            if !slot.actor.prefire(&ctx) {
                trace!(actor = self.graph.actor(actor).name.as_str(), %tag, "prefire declined");
                break;
            }
            let result = slot.actor.fire(&mut ctx);
            let keep = result.is_ok() && slot.actor.postfire(&ctx);
            let effects = ctx.into_effects();
            result.map_err(|e| self.actor_error(actor, e))?;

            self.stats.firings += 1;
            debug!(actor = self.actor_name(actor), %tag, "actor fired");

            let consumed = effects.consumed;
            self.apply_effects(actor, &entry.record, effects)?;

            if !keep {
                self.disable_actor(actor);
                break;
            }
            if !self.has_tokens_at(actor, tag) {
                break;
            }
            if consumed == 0 {
                warn!(actor = self.actor_name(actor), %tag, "tokens left unconsumed at the current tag");
                break;
            }
        }

        Ok(())
    }

    fn apply_effects(
        &mut self,
        actor: ActorId,
        record: &FiringRecord,
        effects: FiringEffects,
    ) -> Result<(), ExecutionError> {
        let tag = self.current_tag;
        for (port, channel, token) in effects.sent {
            let sinks: Vec<_> = self
                .graph
                .connections_from(port)
                .filter(|c| c.from_channel == channel)
                .map(|c| (c.to, c.to_channel))
                .collect();
            for (sink, sink_channel) in sinks {
                self.route(sink, sink_channel, token.clone(), tag, record.source_timestamp)?;
            }
        }

        for timestamp in effects.fire_requests {
            self.request_firing(actor, record, timestamp)?;
        }

        Ok(())
    }

    /// Queues a pure event requested by an actor.
    fn request_firing(
        &mut self,
        actor: ActorId,
        record: &FiringRecord,
        timestamp: MonotonicTime,
    ) -> Result<(), ExecutionError> {
        let current = self.current_tag;
        let tag = if timestamp < current.timestamp {
            return Err(ExecutionError::PastTimeViolation {
                actor: self.actor_name(actor).to_owned(),
                requested: timestamp,
                current,
            });
        } else if timestamp > current.timestamp {
            Tag::at(timestamp)
        } else if self.initializing {
            current
        } else {
            current.next_microstep()
        };

        let info = self.graph.actor(actor);
        let causal_port = record
            .source_port
            .filter(|&(port, _)| info.timing.is_causal_input(&self.graph.port(port).name));
        let event = Event::pure(
            tag,
            actor,
            causal_port,
            record.pure_event_deadline(timestamp),
            self.analysis.actor_depth(actor),
        )
        .with_source_timestamp(record.source_timestamp);
        let id = self.queue.insert(event);
        trace!(event = %id, actor = self.actor_name(actor), %tag, "firing requested");

        Ok(())
    }

    fn discard_stale_tokens(&mut self, actor: ActorId, tag: Tag) {
        for &port in &self.graph.actor(actor).inputs {
            for receiver in &mut self.receivers[port.0] {
                let dropped = receiver.discard_before(tag);
                if dropped != 0 {
                    warn!(port = %self.graph.port_path(port), dropped, %tag, "stale tokens discarded");
                }
            }
        }
    }

    fn has_tokens_at(&self, actor: ActorId, tag: Tag) -> bool {
        self.graph
            .actor(actor)
            .inputs
            .iter()
            .flat_map(|port| &self.receivers[port.0])
            .any(|receiver| receiver.has_token(tag))
    }

    fn disable_actor(&mut self, actor: ActorId) {
        self.actors[actor.0].enabled = false;
        let dropped = self.queue.remove_where(|e| e.actor == actor);
        let queue = &self.queue;
        self.armed.retain(|(armed, _)| queue.get(*armed).is_some());

        debug!(actor = self.actor_name(actor), dropped = dropped.len(), "actor disabled");
    }

    fn actor_error(&self, actor: ActorId, source: ActorError) -> ExecutionError {
        ExecutionError::Actor {
            actor: self.actor_name(actor).to_owned(),
            source,
        }
    }
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("queued_events", &self.queue.len())
            .field("stack_depth", &self.stack.len())
            .finish_non_exhaustive()
    }
}

/// Error returned when the execution of a platform cannot proceed.
#[derive(Debug)]
pub enum ExecutionError {
    /// A firing was requested at a time earlier than the current model time.
    PastTimeViolation {
        /// Requesting actor.
        actor: String,
        /// Requested timestamp.
        requested: MonotonicTime,
        /// Current model tag.
        current: Tag,
    },
    /// An input port was about to consume an event with a tag that is not
    /// later than the last consumed tag.
    OutOfOrderViolation {
        /// Input port path.
        port: String,
        /// Tag of the offending event.
        tag: Tag,
        /// Last consumed tag.
        last: Tag,
    },
    /// A real-time transfer happened after its required platform time.
    DeadlineMiss {
        /// Name of the sensor, actuator or actor that missed its deadline.
        actor: String,
        /// Platform time by which the transfer was required.
        required: MonotonicTime,
        /// Platform time at which the transfer could take place.
        actual: MonotonicTime,
    },
    /// The completion of a firing was observed after its due time.
    MissedCompletion {
        /// Executing actor.
        actor: String,
        /// Execution clock time at which the firing was due to complete.
        due: MonotonicTime,
        /// Execution clock time at which the completion was observed.
        actual: MonotonicTime,
    },
    /// The time source did not grant a wake-up at the requested time.
    RefireRejected {
        /// Requested oracle time.
        requested: MonotonicTime,
        /// Oracle time granted by the time source.
        granted: MonotonicTime,
    },
    /// No platform port with this name and channel exists.
    UnknownPort {
        /// Requested port and channel.
        name: String,
    },
    /// An actor callback returned an error.
    Actor {
        /// Name of the actor.
        actor: String,
        /// Error returned by the actor.
        source: ActorError,
    },
    /// The platform model is invalid.
    Causality(CausalityError),
    /// A clock operation was rejected.
    Clock(ClockError),
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PastTimeViolation {
                actor,
                requested,
                current,
            } => write!(
                fmt,
                "actor '{}' requested a firing at {:.9} while the current tag is {}",
                actor, requested, current
            ),
            Self::OutOfOrderViolation { port, tag, last } => write!(
                fmt,
                "event with tag {} processed on '{}' after an event with tag {}",
                tag, port, last
            ),
            Self::DeadlineMiss {
                actor,
                required,
                actual,
            } => write!(
                fmt,
                "deadline missed by '{}': required at {:.9}, happened at {:.9}",
                actor, required, actual
            ),
            Self::MissedCompletion { actor, due, actual } => write!(
                fmt,
                "the firing of '{}' was due to complete at {:.9} but completion was observed at {:.9}",
                actor, due, actual
            ),
            Self::RefireRejected { requested, granted } => write!(
                fmt,
                "a wake-up was requested at {:.9} but the time source granted {:.9}",
                requested, granted
            ),
            Self::UnknownPort { name } => write!(fmt, "no platform port named '{}'", name),
            Self::Actor { actor, source } => write!(fmt, "actor '{}' failed: {}", actor, source),
            Self::Causality(e) => e.fmt(fmt),
            Self::Clock(e) => e.fmt(fmt),
        }
    }
}

impl Error for ExecutionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Actor { source, .. } => Some(source),
            Self::Causality(e) => Some(e),
            Self::Clock(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CausalityError> for ExecutionError {
    fn from(e: CausalityError) -> Self {
        Self::Causality(e)
    }
}

impl From<ClockError> for ExecutionError {
    fn from(e: ClockError) -> Self {
        Self::Clock(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::actor::{ActorTimingProfile, PortSpec, PortTimingProfile};
    use crate::time::from_secs_f64;

    /// Time source recording wake-up requests.
    #[derive(Default)]
    struct ManualSource {
        now: MonotonicTime,
        requests: Vec<MonotonicTime>,
    }

    impl ManualSource {
        fn at(secs: f64) -> Self {
            Self {
                now: from_secs_f64(secs),
                requests: Vec::new(),
            }
        }

        fn advance(&mut self, platform: &mut Platform, secs: f64) -> Result<(), ExecutionError> {
            self.now = from_secs_f64(secs);
            platform.notify_physical_time_advanced(self.now, self)
        }
    }

    impl TimeSource for ManualSource {
        fn now(&self) -> MonotonicTime {
            self.now
        }

        fn request_wake_at(&mut self, _platform: PlatformId, time: MonotonicTime) -> MonotonicTime {
            self.requests.push(time);
            time.max(self.now)
        }
    }

    /// Forwards its input and counts firings.
    struct Relay {
        execution_time: Duration,
        fired: usize,
    }

    impl Relay {
        fn new(secs: f64) -> Self {
            Self {
                execution_time: Duration::from_secs_f64(secs),
                fired: 0,
            }
        }
    }

    impl Actor for Relay {
        fn input_ports(&self) -> Vec<PortSpec> {
            vec![PortSpec::new("in")]
        }
        fn output_ports(&self) -> Vec<PortSpec> {
            vec![PortSpec::new("out")]
        }
        fn timing(&self) -> ActorTimingProfile {
            ActorTimingProfile::default().with_execution_time(self.execution_time)
        }
        fn fire(&mut self, ctx: &mut FiringContext<'_>) -> Result<(), ActorError> {
            self.fired += 1;
            while let Ok(token) = ctx.get("in", 0) {
                ctx.send("out", 0, token)?;
            }
            Ok(())
        }
    }

    /// Requests a firing in the past.
    struct TimeTraveler;

    impl Actor for TimeTraveler {
        fn initialize(&mut self, ctx: &mut FiringContext<'_>) -> Result<(), ActorError> {
            ctx.fire_at(ctx.time());
            Ok(())
        }
        fn fire(&mut self, ctx: &mut FiringContext<'_>) -> Result<(), ActorError> {
            ctx.fire_at(time::offset_secs(ctx.time(), -1.0));
            Ok(())
        }
    }

    fn relay_platform(execution_time: f64) -> Platform {
        PlatformBuilder::new("p")
            .add_network_input("net_in", PortTimingProfile::default())
            .add_actor("relay", Relay::new(execution_time))
            .add_network_output("net_out", PortTimingProfile::default())
            .connect("net_in", "relay.in")
            .connect("relay.out", "net_out")
            .build()
            .unwrap()
    }

    #[test]
    fn platform_relays_network_tokens() {
        let mut platform = relay_platform(0.0);
        let mut source = ManualSource::at(1.0);
        platform.initialize(&mut source).unwrap();
        assert_eq!(platform.state(), SchedulerState::Idle);

        let tag = Tag::at(from_secs_f64(1.0));
        platform
            .deliver_boundary_token("net_in", 0, Token::new(5u32), tag, &mut source)
            .unwrap();

        let outputs = platform.drain_boundary_outputs();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].port, "net_out");
        assert_eq!(outputs[0].tag, tag);
        assert_eq!(outputs[0].token.downcast_ref::<u32>(), Some(&5));
        assert_eq!(platform.stats().firings, 1);
        assert_eq!(platform.state(), SchedulerState::Idle);
    }

    #[test]
    fn platform_execution_time_delays_completion() {
        let mut platform = relay_platform(0.5);
        let mut source = ManualSource::at(1.0);
        platform.initialize(&mut source).unwrap();

        platform
            .deliver_boundary_token("net_in", 0, Token::new(1u32), Tag::at(from_secs_f64(1.0)), &mut source)
            .unwrap();
        assert!(matches!(platform.state(), SchedulerState::Executing { .. }));
        assert_eq!(source.requests, vec![from_secs_f64(1.5)]);
        assert!(platform.drain_boundary_outputs().is_empty());

        source.advance(&mut platform, 1.5).unwrap();
        let outputs = platform.drain_boundary_outputs();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].emitted_at, from_secs_f64(1.5));
        assert_eq!(platform.state(), SchedulerState::Idle);
    }

    #[test]
    fn platform_rejects_unknown_ports() {
        let mut platform = relay_platform(0.0);
        let mut source = ManualSource::at(0.0);
        platform.initialize(&mut source).unwrap();

        let tag = Tag::at(from_secs_f64(0.0));
        let err = platform
            .deliver_boundary_token("nope", 0, Token::new(1u32), tag, &mut source)
            .unwrap_err();
        assert!(matches!(err, ExecutionError::UnknownPort { .. }));
        let err = platform
            .deliver_boundary_token("net_in", 3, Token::new(1u32), tag, &mut source)
            .unwrap_err();
        assert!(matches!(err, ExecutionError::UnknownPort { .. }));
    }

    #[test]
    fn platform_past_firing_request_is_fatal() {
        let mut platform = PlatformBuilder::new("p")
            .add_actor("traveler", TimeTraveler)
            .build()
            .unwrap();
        let mut source = ManualSource::at(2.0);

        let err = platform.initialize(&mut source).unwrap_err();
        assert!(matches!(err, ExecutionError::PastTimeViolation { .. }));
    }

    #[test]
    fn platform_stop_and_wrapup() {
        let mut platform = relay_platform(0.5);
        let mut source = ManualSource::at(0.0);
        platform.initialize(&mut source).unwrap();

        let tag = Tag::at(from_secs_f64(0.0));
        platform
            .deliver_boundary_token("net_in", 0, Token::new(1u32), tag, &mut source)
            .unwrap();
        platform
            .deliver_boundary_token("net_in", 0, Token::new(2u32), Tag::at(from_secs_f64(0.1)), &mut source)
            .unwrap();
        platform.stop();

        // The in-flight firing completes but nothing new starts.
        source.advance(&mut platform, 0.5).unwrap();
        assert_eq!(platform.drain_boundary_outputs().len(), 1);
        assert_eq!(platform.queued_events(), 1);
        assert!(platform.execution_stack().is_empty());

        platform.wrapup();
        assert_eq!(platform.queued_events(), 0);
        assert_eq!(platform.state(), SchedulerState::Idle);
        assert_eq!(platform.platform_clock().pending_wakeups(), 0);
    }

    #[test]
    fn platform_context_accessors() {
        let context = PlatformContext::new()
            .with_clock_sync_error(Duration::from_millis(1))
            .with_network_delay(Duration::from_millis(20));

        assert_eq!(context.clock_sync_error(), Duration::from_millis(1));
        assert_eq!(context.network_delay(), Duration::from_millis(20));
        assert_eq!(PlatformId::new(3).to_string(), "platform #3");
    }
}

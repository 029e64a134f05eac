//! Actor interface.
//!
//! An [`Actor`] is the unit of computation scheduled by a platform. It
//! declares its ports and the model-time dependencies between them, and is
//! fired with a [`FiringContext`] giving access to the tokens available at
//! the current tag.
//!
//! Timing annotations are strongly typed: [`ActorTimingProfile`] describes
//! the execution times of an actor and [`PortTimingProfile`] those of a port.
//! Both are resolved once when the platform is built.
//!
//! # Examples
//!
//! An actor that forwards its input tokens after one second of model time:
//!
//! ```
//! use ptides::actor::{Actor, ActorError, FiringContext, PortSpec};
//! use ptides::causality::SuperdenseDependency;
//! use ptides::time;
//! use ptides::token::Token;
//!
//! #[derive(Default)]
//! struct TimeDelay {
//!     pending: Vec<(ptides::time::MonotonicTime, Token)>,
//! }
//!
//! impl Actor for TimeDelay {
//!     fn input_ports(&self) -> Vec<PortSpec> {
//!         vec![PortSpec::new("in")]
//!     }
//!     fn output_ports(&self) -> Vec<PortSpec> {
//!         vec![PortSpec::new("out")]
//!     }
//!     fn dependency(&self, _input: &str, _output: &str) -> SuperdenseDependency {
//!         SuperdenseDependency::from_secs(1.0)
//!     }
//!     fn fire(&mut self, ctx: &mut FiringContext<'_>) -> Result<(), ActorError> {
//!         while let Ok(token) = ctx.get("in", 0) {
//!             let due = time::offset_secs(ctx.time(), 1.0);
//!             self.pending.push((due, token));
//!             ctx.fire_at(due);
//!         }
//!         let now = ctx.time();
//!         for (_, token) in self.pending.iter().filter(|(due, _)| *due == now) {
//!             ctx.send("out", 0, token.clone())?;
//!         }
//!         self.pending.retain(|(due, _)| *due != now);
//!
//!         Ok(())
//!     }
//! }
//! ```

use std::error::Error;
use std::fmt;
use std::time::Duration;

use crate::causality::{ActorId, CausalityGraph, PortDirection, PortId, SuperdenseDependency};
use crate::receiver::{NoTokenAvailable, Receiver};
use crate::time::{MonotonicTime, Tag};
use crate::token::Token;

/// Trait to be implemented by actors.
pub trait Actor: Send + 'static {
    /// Returns the input ports of the actor.
    fn input_ports(&self) -> Vec<PortSpec> {
        Vec::new()
    }

    /// Returns the output ports of the actor.
    fn output_ports(&self) -> Vec<PortSpec> {
        Vec::new()
    }

    /// Returns the model-time dependency between an input and an output
    /// port.
    ///
    /// By default, outputs depend on all inputs without delay. Return
    /// [`SuperdenseDependency::OPLUS_IDENTITY`] for independent ports.
    fn dependency(&self, input: &str, output: &str) -> SuperdenseDependency {
        let _ = (input, output);

        SuperdenseDependency::OTIMES_IDENTITY
    }

    /// Returns the timing annotations of the actor.
    fn timing(&self) -> ActorTimingProfile {
        ActorTimingProfile::default()
    }

    /// Initializes the actor.
    ///
    /// This method is called once when the platform is initialized, before
    /// any event is processed. Initial firings may be requested with
    /// [`FiringContext::fire_at`].
    fn initialize(&mut self, ctx: &mut FiringContext<'_>) -> Result<(), ActorError> {
        let _ = ctx;

        Ok(())
    }

    /// Checks whether the actor is ready to fire at the current tag.
    ///
    /// Returning `false` skips the firing.
    fn prefire(&mut self, ctx: &FiringContext<'_>) -> bool {
        let _ = ctx;

        true
    }

    /// Reacts to the tokens available at the current tag.
    fn fire(&mut self, ctx: &mut FiringContext<'_>) -> Result<(), ActorError>;

    /// Commits the firing.
    ///
    /// Returning `false` disables the actor permanently: its pending events
    /// are discarded and it is never fired again.
    fn postfire(&mut self, ctx: &FiringContext<'_>) -> bool {
        let _ = ctx;

        true
    }
}

/// Declaration of an actor port.
#[derive(Clone, Debug, PartialEq)]
pub struct PortSpec {
    /// Port name, unique among the inputs or the outputs of the actor.
    pub name: String,
    /// Number of channels.
    pub width: usize,
    /// Timing annotations.
    pub timing: PortTimingProfile,
}

impl PortSpec {
    /// Declares a single-channel port without timing annotations.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            width: 1,
            timing: PortTimingProfile::default(),
        }
    }

    /// Sets the number of channels.
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    /// Sets the timing annotations.
    pub fn with_timing(mut self, timing: PortTimingProfile) -> Self {
        self.timing = timing;
        self
    }
}

/// Timing annotations of an actor.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActorTimingProfile {
    /// Worst-case execution time, used when no execution time is specified.
    pub wcet: Duration,
    /// Simulated execution time.
    pub execution_time: Option<Duration>,
    /// The actor samples the physical world and must fire at real time.
    pub is_sensor: bool,
    /// The actor acts on the physical world and must fire at real time.
    pub is_actuator: bool,
    /// Names of the input ports that may causally affect the pure events
    /// requested by the actor, or `None` if all inputs may.
    pub causality_marker: Option<Vec<String>>,
}

impl ActorTimingProfile {
    /// Sets the worst-case execution time.
    pub fn with_wcet(mut self, wcet: Duration) -> Self {
        self.wcet = wcet;
        self
    }

    /// Sets the simulated execution time.
    pub fn with_execution_time(mut self, execution_time: Duration) -> Self {
        self.execution_time = Some(execution_time);
        self
    }

    /// Marks the actor as a sensor.
    pub fn with_sensor(mut self, is_sensor: bool) -> Self {
        self.is_sensor = is_sensor;
        self
    }

    /// Marks the actor as an actuator.
    pub fn with_actuator(mut self, is_actuator: bool) -> Self {
        self.is_actuator = is_actuator;
        self
    }

    /// Restricts the inputs that may causally affect pure events.
    pub fn with_causality_marker<I, S>(mut self, ports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.causality_marker = Some(ports.into_iter().map(Into::into).collect());
        self
    }

    /// Checks whether the actor must fire at the physical time matching the
    /// timestamp of its events.
    pub fn must_fire_at_real_time(&self) -> bool {
        self.is_sensor || self.is_actuator
    }

    /// Checks whether pure events of the actor may be caused by the
    /// specified input port.
    pub fn is_causal_input(&self, port: &str) -> bool {
        match &self.causality_marker {
            Some(ports) => ports.iter().any(|p| p == port),
            None => true,
        }
    }
}

/// Timing annotations of a port.
///
/// Annotations that are meaningless for a given kind of port are ignored,
/// except on platform ports where contradictory annotations are rejected
/// when the platform is built.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PortTimingProfile {
    /// Execution time of the owning actor when fired by this port; takes
    /// precedence over the actor annotations.
    pub execution_time: Option<Duration>,
    /// Delay between sensing and delivery (sensors) or between delivery
    /// and actuation (actuators).
    pub device_delay: Option<Duration>,
    /// Upper bound of the device delay, used by the delay offset analysis.
    pub device_delay_bound: Option<Duration>,
    /// Upper bound of the network delay of a network input.
    pub network_delay_bound: Option<Duration>,
    /// Upper bound of the processing delay on the sending platform of a
    /// network input.
    pub source_platform_delay_bound: Option<Duration>,
    /// Explicit delay offset in seconds, overriding the analysis.
    pub min_delay: Option<f64>,
    /// Deadline of triggered events relative to their timestamp; `None`
    /// means the earliest possible deadline.
    pub relative_deadline: Option<Duration>,
    /// Degrade actuation deadline misses to a warning.
    pub ignore_deadline: bool,
    /// Emit output tokens as soon as they are produced.
    pub transfer_immediately: bool,
}

impl PortTimingProfile {
    /// Sets the execution time.
    pub fn with_execution_time(mut self, execution_time: Duration) -> Self {
        self.execution_time = Some(execution_time);
        self
    }

    /// Sets the device delay.
    pub fn with_device_delay(mut self, device_delay: Duration) -> Self {
        self.device_delay = Some(device_delay);
        self
    }

    /// Sets the device delay bound.
    pub fn with_device_delay_bound(mut self, bound: Duration) -> Self {
        self.device_delay_bound = Some(bound);
        self
    }

    /// Sets the network delay bound.
    pub fn with_network_delay_bound(mut self, bound: Duration) -> Self {
        self.network_delay_bound = Some(bound);
        self
    }

    /// Sets the source platform delay bound.
    pub fn with_source_platform_delay_bound(mut self, bound: Duration) -> Self {
        self.source_platform_delay_bound = Some(bound);
        self
    }

    /// Sets an explicit delay offset in seconds.
    pub fn with_min_delay(mut self, secs: f64) -> Self {
        self.min_delay = Some(secs);
        self
    }

    /// Sets the relative deadline.
    pub fn with_relative_deadline(mut self, deadline: Duration) -> Self {
        self.relative_deadline = Some(deadline);
        self
    }

    /// Sets whether actuation deadline misses are ignored.
    pub fn with_ignore_deadline(mut self, ignore: bool) -> Self {
        self.ignore_deadline = ignore;
        self
    }

    /// Sets whether output tokens bypass the deadline check.
    pub fn with_transfer_immediately(mut self, immediately: bool) -> Self {
        self.transfer_immediately = immediately;
        self
    }
}

/// Effects of a firing collected by a [`FiringContext`].
#[derive(Debug, Default)]
pub(crate) struct FiringEffects {
    pub(crate) sent: Vec<(PortId, usize, Token)>,
    pub(crate) fire_requests: Vec<MonotonicTime>,
    pub(crate) consumed: usize,
}

/// The view of the platform given to an actor while it is fired.
///
/// Tokens sent and firing requests are buffered and processed by the
/// platform once the callback returns.
pub struct FiringContext<'a> {
    actor: ActorId,
    tag: Tag,
    physical_time: MonotonicTime,
    graph: &'a CausalityGraph,
    receivers: &'a mut [Vec<Receiver>],
    effects: FiringEffects,
}

impl<'a> FiringContext<'a> {
    pub(crate) fn new(
        actor: ActorId,
        tag: Tag,
        physical_time: MonotonicTime,
        graph: &'a CausalityGraph,
        receivers: &'a mut [Vec<Receiver>],
    ) -> Self {
        Self {
            actor,
            tag,
            physical_time,
            graph,
            receivers,
            effects: FiringEffects::default(),
        }
    }

    /// Returns the name of the fired actor.
    pub fn actor_name(&self) -> &str {
        &self.graph.actor(self.actor).name
    }

    /// Returns the current tag.
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Returns the current model time.
    pub fn time(&self) -> MonotonicTime {
        self.tag.timestamp
    }

    /// Returns the platform time at which the firing takes place.
    pub fn physical_time(&self) -> MonotonicTime {
        self.physical_time
    }

    /// Returns the number of channels of an input port, or 0 if no such
    /// port exists.
    pub fn input_width(&self, port: &str) -> usize {
        self.input(port)
            .map(|id| self.graph.port(id).width)
            .unwrap_or(0)
    }

    /// Checks whether a token is available at the current tag.
    pub fn has_token(&self, port: &str, channel: usize) -> bool {
        self.input(port)
            .and_then(|id| self.receivers[id.0].get(channel))
            .is_some_and(|receiver| receiver.has_token(self.tag))
    }

    /// Retrieves a token available at the current tag.
    pub fn get(&mut self, port: &str, channel: usize) -> Result<Token, NoTokenAvailable> {
        let tag = self.tag;
        let receiver = self
            .input(port)
            .and_then(|id| self.receivers[id.0].get_mut(channel))
            .ok_or(NoTokenAvailable {
                current: tag,
                front: None,
            })?;
        let token = receiver.get(tag)?;
        self.effects.consumed += 1;

        Ok(token)
    }

    /// Sends a token on an output port channel at the current tag.
    ///
    /// An error is returned if the port or channel does not exist.
    pub fn send(&mut self, port: &str, channel: usize, token: Token) -> Result<(), ActorError> {
        let id = self
            .graph
            .find_actor_port(self.actor, port, PortDirection::Output)
            .filter(|&id| channel < self.graph.port(id).width)
            .ok_or_else(|| {
                ActorError::new(format!(
                    "actor '{}' has no output channel {}[{}]",
                    self.actor_name(),
                    port,
                    channel
                ))
            })?;
        self.effects.sent.push((id, channel, token));

        Ok(())
    }

    /// Requests a firing of the actor at the specified model time.
    ///
    /// Requesting a firing in the past is a fatal error reported once the
    /// callback returns.
    pub fn fire_at(&mut self, time: MonotonicTime) {
        self.effects.fire_requests.push(time);
    }

    pub(crate) fn into_effects(self) -> FiringEffects {
        self.effects
    }

    fn input(&self, port: &str) -> Option<PortId> {
        self.graph
            .find_actor_port(self.actor, port, PortDirection::Input)
    }
}

impl fmt::Debug for FiringContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FiringContext")
            .field("actor", &self.actor_name())
            .field("tag", &self.tag)
            .field("physical_time", &self.physical_time)
            .finish_non_exhaustive()
    }
}

/// Error returned by an actor callback.
#[derive(Debug)]
pub struct ActorError {
    message: String,
    source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl ActorError {
    /// Creates an error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error with a message and an underlying cause.
    pub fn with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ActorError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(&self.message)
    }
}

impl Error for ActorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn Error + 'static))
    }
}

impl From<NoTokenAvailable> for ActorError {
    fn from(e: NoTokenAvailable) -> Self {
        Self::with_source("token retrieval failed", e)
    }
}

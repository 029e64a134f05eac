use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

use tracing::{info, info_span};

use crate::actor::{Actor, PortTimingProfile};
use crate::boundary::BoundaryQueues;
use crate::causality::{
    self, AnalysisOptions, BoundaryKind, CausalityError, CausalityGraph, PortDirection, PortId,
};
use crate::event::EventQueue;
use crate::platform::{ActorSlot, Platform, PlatformContext, PlatformId, PlatformStats};
use crate::receiver::{Receiver, ReceiverMode};
use crate::scheduler::{
    ExecutionStack, NeverPreempt, PreemptionPolicy, PriorityPolicy, SchedulerState, TagOrder,
};
use crate::time::{ClockKind, MonotonicTime, RealTimeClock, Tag};

/// Builder for a [`Platform`].
///
/// Actors and platform ports are declared first, then connected with
/// `owner.port` paths where the owner is an actor name; platform ports are
/// referred to by their bare name. Configuration errors are reported by
/// [`PlatformBuilder::build`].
///
/// # Examples
///
/// ```
/// use ptides::actor::{Actor, ActorError, FiringContext, PortSpec, PortTimingProfile};
/// use ptides::platform::PlatformBuilder;
///
/// struct Forward;
///
/// impl Actor for Forward {
///     fn input_ports(&self) -> Vec<PortSpec> {
///         vec![PortSpec::new("in")]
///     }
///     fn output_ports(&self) -> Vec<PortSpec> {
///         vec![PortSpec::new("out")]
///     }
///     fn fire(&mut self, ctx: &mut FiringContext<'_>) -> Result<(), ActorError> {
///         let token = ctx.get("in", 0)?;
///         ctx.send("out", 0, token)
///     }
/// }
///
/// let platform = PlatformBuilder::new("node")
///     .add_network_input("rx", PortTimingProfile::default())
///     .add_actor("forward", Forward)
///     .add_network_output("tx", PortTimingProfile::default())
///     .connect("rx", "forward.in")
///     .connect("forward.out", "tx")
///     .build()
///     .unwrap();
///
/// assert_eq!(platform.name(), "node");
/// ```
pub struct PlatformBuilder {
    name: String,
    graph: CausalityGraph,
    actors: Vec<ActorSlot>,
    actor_names: HashSet<String>,
    context: PlatformContext,
    platform_drift: f64,
    execution_drift: f64,
    scheduler_overhead: Duration,
    priority: Box<dyn PriorityPolicy>,
    preemption: Box<dyn PreemptionPolicy>,
    receiver_mode: ReceiverMode,
    options: AnalysisOptions,
    upstream_evidence: bool,
    error: Option<CausalityError>,
}

impl PlatformBuilder {
    /// Creates a builder for an empty platform with ideal clocks, tag-order
    /// scheduling and no preemption.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            graph: CausalityGraph::new(),
            actors: Vec::new(),
            actor_names: HashSet::new(),
            context: PlatformContext::default(),
            platform_drift: 1.0,
            execution_drift: 1.0,
            scheduler_overhead: Duration::ZERO,
            priority: Box::new(TagOrder),
            preemption: Box::new(NeverPreempt),
            receiver_mode: ReceiverMode::Strict,
            options: AnalysisOptions::default(),
            upstream_evidence: false,
            error: None,
        }
    }

    /// Adds an actor with a name unique within the platform.
    pub fn add_actor(mut self, name: impl Into<String>, actor: impl Actor) -> Self {
        let name = name.into();
        if self.error.is_some() {
            return self;
        }
        if !self.actor_names.insert(name.clone()) {
            self.error = Some(CausalityError::InvalidConnection {
                from: name.clone(),
                to: name,
                reason: "duplicate actor name",
            });
            return self;
        }

        if let Err(e) = self.declare_actor(name, &actor) {
            self.error = Some(e);
            return self;
        }
        self.actors.push(ActorSlot {
            actor: Box::new(actor),
            enabled: true,
        });

        self
    }

    /// Adds a sensor input.
    pub fn add_sensor(self, name: impl Into<String>, timing: PortTimingProfile) -> Self {
        self.add_boundary_port(name, BoundaryKind::Sensor, timing)
    }

    /// Adds an actuator output.
    pub fn add_actuator(self, name: impl Into<String>, timing: PortTimingProfile) -> Self {
        self.add_boundary_port(name, BoundaryKind::Actuator, timing)
    }

    /// Adds a network input.
    pub fn add_network_input(self, name: impl Into<String>, timing: PortTimingProfile) -> Self {
        self.add_boundary_port(name, BoundaryKind::NetworkInput, timing)
    }

    /// Adds a network output.
    pub fn add_network_output(self, name: impl Into<String>, timing: PortTimingProfile) -> Self {
        self.add_boundary_port(name, BoundaryKind::NetworkOutput, timing)
    }

    /// Connects channel 0 of a source port to channel 0 of a sink port.
    pub fn connect(self, from: &str, to: &str) -> Self {
        self.connect_channel(from, 0, to, 0)
    }

    /// Connects a source port channel to a sink port channel.
    pub fn connect_channel(mut self, from: &str, from_channel: usize, to: &str, to_channel: usize) -> Self {
        if self.error.is_some() {
            return self;
        }

        let result = self
            .resolve(from, PortDirection::Output)
            .and_then(|from| Ok((from, self.resolve(to, PortDirection::Input)?)))
            .and_then(|(from, to)| self.graph.connect(from, from_channel, to, to_channel));
        if let Err(e) = result {
            self.error = Some(e);
        }

        self
    }

    /// Sets the shared bounds of the distributed system.
    pub fn set_context(mut self, context: PlatformContext) -> Self {
        self.context = context;
        self
    }

    /// Sets the initial drift of the platform clock.
    pub fn set_platform_clock(mut self, drift: f64) -> Self {
        self.platform_drift = drift;
        self
    }

    /// Sets the initial drift of the execution clock.
    pub fn set_execution_clock(mut self, drift: f64) -> Self {
        self.execution_drift = drift;
        self
    }

    /// Sets the platform time spent by the scheduler on each stimulus.
    pub fn set_scheduler_overhead(mut self, overhead: Duration) -> Self {
        self.scheduler_overhead = overhead;
        self
    }

    /// Sets the policy ranking safe events.
    pub fn set_priority_policy(mut self, policy: impl PriorityPolicy) -> Self {
        self.priority = Box::new(policy);
        self
    }

    /// Sets the policy deciding preemptions.
    pub fn set_preemption_policy(mut self, policy: impl PreemptionPolicy) -> Self {
        self.preemption = Box::new(policy);
        self
    }

    /// Sets the out-of-order policy of actor input receivers.
    pub fn set_receiver_mode(mut self, mode: ReceiverMode) -> Self {
        self.receiver_mode = mode;
        self
    }

    /// Assumes that events reach each input channel in timestamp order,
    /// which relaxes the delay offsets.
    pub fn set_timestamp_order(mut self, enabled: bool) -> Self {
        self.options.timestamp_order = enabled;
        self
    }

    /// Also considers an event safe when the queued events of the actors
    /// directly upstream prove that no earlier event can reach it.
    ///
    /// This relaxation is provisional and disabled by default.
    pub fn set_upstream_evidence(mut self, enabled: bool) -> Self {
        self.upstream_evidence = enabled;
        self
    }

    /// Analyzes the model and builds the platform.
    pub fn build(self) -> Result<Platform, CausalityError> {
        if let Some(e) = self.error {
            return Err(e);
        }

        let span = info_span!("platform", name = %self.name);
        let analysis = span.in_scope(|| causality::recompute(&self.graph, &self.options, &self.context))?;

        let clock = |kind, drift: f64| {
            RealTimeClock::new(kind, MonotonicTime::EPOCH, MonotonicTime::EPOCH, drift).map_err(|_| {
                CausalityError::InconsistentBoundary {
                    port: kind.to_string(),
                    reason: "the clock drift must be finite and non-negative",
                }
            })
        };
        let platform_clock = clock(ClockKind::Platform, self.platform_drift)?;
        let execution_clock = clock(ClockKind::Execution, self.execution_drift)?;

        let receivers = self
            .graph
            .ports()
            .map(|(_, port)| {
                if port.is_actor_input() {
                    vec![Receiver::new(self.receiver_mode); port.width]
                } else {
                    Vec::new()
                }
            })
            .collect();

        info!(
            parent: &span,
            actors = self.graph.actor_count(),
            ports = self.graph.port_count(),
            "platform built"
        );

        Ok(Platform {
            id: PlatformId::default(),
            name: self.name,
            graph: self.graph,
            analysis,
            actors: self.actors,
            receivers,
            queue: EventQueue::new(),
            stack: ExecutionStack::new(),
            platform_clock,
            execution_clock,
            boundary: BoundaryQueues::default(),
            priority: self.priority,
            preemption: self.preemption,
            scheduler_overhead: self.scheduler_overhead,
            upstream_evidence: self.upstream_evidence,
            state: SchedulerState::Idle,
            start_time: MonotonicTime::EPOCH,
            oracle_now: MonotonicTime::EPOCH,
            physical: Tag::at(MonotonicTime::EPOCH),
            current_tag: Tag::at(MonotonicTime::EPOCH),
            last_consumed: HashMap::new(),
            armed: HashSet::new(),
            wake_requests: Vec::new(),
            frozen_wakeups: false,
            initializing: false,
            stopped: false,
            stats: PlatformStats::default(),
            span,
        })
    }

    fn add_boundary_port(mut self, name: impl Into<String>, kind: BoundaryKind, timing: PortTimingProfile) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.graph.add_boundary_port(name, kind, 1, timing) {
                self.error = Some(e);
            }
        }

        self
    }

    /// Registers the ports and dependencies of an actor in the graph.
    fn declare_actor(&mut self, name: String, actor: &dyn Actor) -> Result<(), CausalityError> {
        let id = self.graph.add_actor(name, actor.timing());

        let inputs = actor.input_ports();
        let outputs = actor.output_ports();
        for spec in &inputs {
            self.graph
                .add_actor_port(id, spec.name.clone(), PortDirection::Input, spec.width, spec.timing.clone())?;
        }
        for spec in &outputs {
            self.graph
                .add_actor_port(id, spec.name.clone(), PortDirection::Output, spec.width, spec.timing.clone())?;
        }

        for input in &inputs {
            for output in &outputs {
                let dependency = actor.dependency(&input.name, &output.name);
                let (Some(i), Some(o)) = (
                    self.graph.find_actor_port(id, &input.name, PortDirection::Input),
                    self.graph.find_actor_port(id, &output.name, PortDirection::Output),
                ) else {
                    continue;
                };
                self.graph.set_dependency(i, o, dependency)?;
            }
        }

        Ok(())
    }

    /// Resolves an `actor.port` path, or a bare platform port name.
    fn resolve(&self, path: &str, direction: PortDirection) -> Result<PortId, CausalityError> {
        let port = match path.split_once('.') {
            Some((actor, port)) => self
                .graph
                .actors()
                .find(|(_, info)| info.name == actor)
                .and_then(|(id, _)| self.graph.find_actor_port(id, port, direction)),
            None => self.graph.find_boundary_port(path),
        };

        port.ok_or_else(|| CausalityError::UnknownPort {
            name: path.to_owned(),
        })
    }
}

impl fmt::Debug for PlatformBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformBuilder")
            .field("name", &self.name)
            .field("actors", &self.graph.actor_count())
            .field("ports", &self.graph.port_count())
            .field("priority", &self.priority)
            .field("preemption", &self.preemption)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::actor::{ActorError, FiringContext, PortSpec};
    use crate::causality::SuperdenseDependency;

    struct Delay;

    impl Actor for Delay {
        fn input_ports(&self) -> Vec<PortSpec> {
            vec![PortSpec::new("in")]
        }
        fn output_ports(&self) -> Vec<PortSpec> {
            vec![PortSpec::new("out")]
        }
        fn dependency(&self, _input: &str, _output: &str) -> SuperdenseDependency {
            SuperdenseDependency::from_secs(0.5)
        }
        fn fire(&mut self, _ctx: &mut FiringContext<'_>) -> Result<(), ActorError> {
            Ok(())
        }
    }

    #[test]
    fn builder_declares_ports_and_dependencies() {
        let platform = PlatformBuilder::new("p")
            .add_sensor("s", PortTimingProfile::default())
            .add_actor("d", Delay)
            .connect("s", "d.in")
            .build()
            .unwrap();

        let graph = platform.graph();
        assert_eq!(graph.actor_count(), 1);
        assert_eq!(graph.port_count(), 3);

        let (actor, _) = graph.actors().next().unwrap();
        let input = graph.find_actor_port(actor, "in", PortDirection::Input).unwrap();
        let output = graph.find_actor_port(actor, "out", PortDirection::Output).unwrap();
        assert_eq!(graph.dependency(input, output), SuperdenseDependency::from_secs(0.5));
        assert_eq!(graph.connections().count(), 1);
    }

    #[test]
    fn builder_reports_first_error() {
        let err = PlatformBuilder::new("p")
            .add_actor("d", Delay)
            .add_actor("d", Delay)
            .connect("d.out", "nowhere")
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            CausalityError::InvalidConnection {
                reason: "duplicate actor name",
                ..
            }
        ));

        let err = PlatformBuilder::new("p")
            .add_actor("d", Delay)
            .connect("d.in", "d.out")
            .build()
            .unwrap_err();
        assert!(matches!(err, CausalityError::UnknownPort { .. }));
    }

    #[test]
    fn builder_rejects_invalid_drift() {
        let err = PlatformBuilder::new("p")
            .set_execution_clock(-1.0)
            .build()
            .unwrap_err();

        assert!(matches!(err, CausalityError::InconsistentBoundary { .. }));
    }
}

use std::collections::HashMap;
use std::fmt;

use crate::actor::{ActorTimingProfile, PortTimingProfile};
use crate::causality::{CausalityError, SuperdenseDependency};

/// A unique identifier for an actor within a platform.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub(crate) usize);

impl ActorId {
    /// Returns the index of the actor in insertion order.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor #{}", self.0)
    }
}

/// A unique identifier for a port within a platform.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(pub(crate) usize);

impl PortId {
    /// Returns the index of the port in insertion order.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port #{}", self.0)
    }
}

/// Direction of a port as seen from its owner.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PortDirection {
    /// Tokens flow into the owner.
    Input,
    /// Tokens flow out of the owner.
    Output,
}

/// Role of a port located at the platform boundary.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BoundaryKind {
    /// An input sampling the physical world, subject to a device delay.
    Sensor,
    /// An input receiving timestamped tokens from another platform.
    NetworkInput,
    /// An output acting on the physical world at a deadline.
    Actuator,
    /// An output sending timestamped tokens to another platform.
    NetworkOutput,
}

impl BoundaryKind {
    /// Returns the direction of the port as seen from the platform.
    pub fn direction(&self) -> PortDirection {
        match self {
            Self::Sensor | Self::NetworkInput => PortDirection::Input,
            Self::Actuator | Self::NetworkOutput => PortDirection::Output,
        }
    }
}

impl fmt::Display for BoundaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sensor => "sensor",
            Self::NetworkInput => "network input",
            Self::Actuator => "actuator",
            Self::NetworkOutput => "network output",
        })
    }
}

/// Owner of a port.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PortOwner {
    /// A port of an actor contained in the platform.
    Actor(ActorId),
    /// A port of the platform itself.
    Boundary(BoundaryKind),
}

/// Static description of a port.
#[derive(Clone, Debug)]
pub struct PortInfo {
    /// Port name, unique among the ports of its owner.
    pub name: String,
    /// Owner of the port.
    pub owner: PortOwner,
    /// Direction as seen from the owner.
    pub direction: PortDirection,
    /// Number of channels.
    pub width: usize,
    /// Timing annotations.
    pub timing: PortTimingProfile,
}

impl PortInfo {
    /// Returns the owning actor, if any.
    pub fn actor(&self) -> Option<ActorId> {
        match self.owner {
            PortOwner::Actor(actor) => Some(actor),
            PortOwner::Boundary(_) => None,
        }
    }

    /// Returns the boundary role, if any.
    pub fn boundary(&self) -> Option<BoundaryKind> {
        match self.owner {
            PortOwner::Actor(_) => None,
            PortOwner::Boundary(kind) => Some(kind),
        }
    }

    /// Checks whether this is an input port of an actor.
    pub fn is_actor_input(&self) -> bool {
        self.actor().is_some() && self.direction == PortDirection::Input
    }

    /// Checks whether tokens may leave this port toward other ports, i.e.
    /// whether it is an actor output or a platform input.
    pub fn is_source(&self) -> bool {
        match self.owner {
            PortOwner::Actor(_) => self.direction == PortDirection::Output,
            PortOwner::Boundary(kind) => kind.direction() == PortDirection::Input,
        }
    }
}

/// Static description of an actor.
#[derive(Clone, Debug)]
pub struct ActorInfo {
    /// Actor name.
    pub name: String,
    /// Input ports in declaration order.
    pub inputs: Vec<PortId>,
    /// Output ports in declaration order.
    pub outputs: Vec<PortId>,
    /// Timing annotations.
    pub timing: ActorTimingProfile,
}

/// A channel-to-channel connection.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Connection {
    /// Source port: an actor output or a platform input.
    pub from: PortId,
    /// Source channel.
    pub from_channel: usize,
    /// Sink port: an actor input or a platform output.
    pub to: PortId,
    /// Sink channel.
    pub to_channel: usize,
}

/// The static port-to-port dependency graph of a platform.
///
/// The graph records all ports with their timing annotations, the model-time
/// dependencies between the input and output ports of each actor, and the
/// connections between ports. It is the input of the delay offset analysis
/// performed by [`recompute`](crate::causality::recompute).
#[derive(Clone, Debug, Default)]
pub struct CausalityGraph {
    actors: Vec<ActorInfo>,
    ports: Vec<PortInfo>,
    dependencies: HashMap<(PortId, PortId), SuperdenseDependency>,
    connections: Vec<Connection>,
    outgoing: HashMap<PortId, Vec<usize>>,
    incoming: HashMap<(PortId, usize), usize>,
}

impl CausalityGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an actor without ports.
    pub fn add_actor(&mut self, name: impl Into<String>, timing: ActorTimingProfile) -> ActorId {
        let id = ActorId(self.actors.len());
        self.actors.push(ActorInfo {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            timing,
        });

        id
    }

    /// Adds a port to an actor.
    ///
    /// An error is returned if the actor already has a port with this name
    /// in the same direction.
    pub fn add_actor_port(
        &mut self,
        actor: ActorId,
        name: impl Into<String>,
        direction: PortDirection,
        width: usize,
        timing: PortTimingProfile,
    ) -> Result<PortId, CausalityError> {
        let name = name.into();
        if self.find_actor_port(actor, &name, direction).is_some() {
            return Err(CausalityError::InvalidConnection {
                from: self.actor(actor).name.clone(),
                to: name,
                reason: "duplicate port name",
            });
        }

        let id = PortId(self.ports.len());
        self.ports.push(PortInfo {
            name,
            owner: PortOwner::Actor(actor),
            direction,
            width,
            timing,
        });
        let info = &mut self.actors[actor.0];
        match direction {
            PortDirection::Input => info.inputs.push(id),
            PortDirection::Output => info.outputs.push(id),
        }

        Ok(id)
    }

    /// Adds a port to the platform boundary.
    ///
    /// An error is returned if a boundary port with the same name exists.
    pub fn add_boundary_port(
        &mut self,
        name: impl Into<String>,
        kind: BoundaryKind,
        width: usize,
        timing: PortTimingProfile,
    ) -> Result<PortId, CausalityError> {
        let name = name.into();
        if self.find_boundary_port(&name).is_some() {
            return Err(CausalityError::InconsistentBoundary {
                port: name,
                reason: "duplicate boundary port name",
            });
        }

        let id = PortId(self.ports.len());
        self.ports.push(PortInfo {
            name,
            owner: PortOwner::Boundary(kind),
            direction: kind.direction(),
            width,
            timing,
        });

        Ok(id)
    }

    /// Sets the dependency between an input and an output port of the same
    /// actor.
    ///
    /// Pairs without an explicit dependency have no dependency at all. The
    /// dependency must have a non-negative delay.
    pub fn set_dependency(
        &mut self,
        input: PortId,
        output: PortId,
        dependency: SuperdenseDependency,
    ) -> Result<(), CausalityError> {
        let (i, o) = (self.port(input), self.port(output));
        let reason = if !i.is_actor_input() || o.direction != PortDirection::Output {
            Some("a dependency must go from an input to an output")
        } else if i.actor() != o.actor() {
            Some("a dependency must stay within one actor")
        } else if dependency.time() < 0.0 {
            Some("a dependency cannot have a negative delay")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(CausalityError::InvalidConnection {
                from: self.port_path(input),
                to: self.port_path(output),
                reason,
            });
        }

        if dependency.is_finite() {
            self.dependencies.insert((input, output), dependency);
        } else {
            self.dependencies.remove(&(input, output));
        }

        Ok(())
    }

    /// Connects a source channel to a sink channel.
    ///
    /// The source must be an actor output or a platform input, and the sink
    /// an actor input or a platform output. A sink channel accepts a single
    /// connection while a source channel may fan out.
    pub fn connect(
        &mut self,
        from: PortId,
        from_channel: usize,
        to: PortId,
        to_channel: usize,
    ) -> Result<(), CausalityError> {
        let (source, sink) = (self.port(from), self.port(to));
        let reason = if !source.is_source() {
            Some("the source is not an actor output or a platform input")
        } else if sink.is_source() {
            Some("the sink is not an actor input or a platform output")
        } else if source.boundary().is_some() && sink.boundary().is_some() {
            Some("platform ports cannot be connected to each other")
        } else if from_channel >= source.width || to_channel >= sink.width {
            Some("channel out of range")
        } else if self.incoming.contains_key(&(to, to_channel)) {
            Some("the sink channel is already connected")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(CausalityError::InvalidConnection {
                from: self.port_path(from),
                to: self.port_path(to),
                reason,
            });
        }

        let idx = self.connections.len();
        self.connections.push(Connection {
            from,
            from_channel,
            to,
            to_channel,
        });
        self.outgoing.entry(from).or_default().push(idx);
        self.incoming.insert((to, to_channel), idx);

        Ok(())
    }

    /// Returns the description of an actor.
    pub fn actor(&self, id: ActorId) -> &ActorInfo {
        &self.actors[id.0]
    }

    /// Returns the description of a port.
    pub fn port(&self, id: PortId) -> &PortInfo {
        &self.ports[id.0]
    }

    /// Returns the number of actors.
    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    /// Returns the number of ports.
    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// Iterates over all actors.
    pub fn actors(&self) -> impl Iterator<Item = (ActorId, &ActorInfo)> + '_ {
        self.actors.iter().enumerate().map(|(i, a)| (ActorId(i), a))
    }

    /// Iterates over all ports.
    pub fn ports(&self) -> impl Iterator<Item = (PortId, &PortInfo)> + '_ {
        self.ports.iter().enumerate().map(|(i, p)| (PortId(i), p))
    }

    /// Iterates over all platform boundary ports.
    pub fn boundary_ports(&self) -> impl Iterator<Item = (PortId, BoundaryKind)> + '_ {
        self.ports()
            .filter_map(|(id, p)| p.boundary().map(|kind| (id, kind)))
    }

    /// Finds an actor port by name and direction.
    pub fn find_actor_port(&self, actor: ActorId, name: &str, direction: PortDirection) -> Option<PortId> {
        let info = self.actors.get(actor.0)?;
        let ports = match direction {
            PortDirection::Input => &info.inputs,
            PortDirection::Output => &info.outputs,
        };

        ports.iter().copied().find(|&p| self.port(p).name == name)
    }

    /// Finds a platform boundary port by name.
    pub fn find_boundary_port(&self, name: &str) -> Option<PortId> {
        self.ports()
            .find(|(_, p)| p.boundary().is_some() && p.name == name)
            .map(|(id, _)| id)
    }

    /// Returns the dependency between an input and an output port.
    pub fn dependency(&self, input: PortId, output: PortId) -> SuperdenseDependency {
        self.dependencies
            .get(&(input, output))
            .copied()
            .unwrap_or(SuperdenseDependency::OPLUS_IDENTITY)
    }

    /// Iterates over the outputs of the owning actor that finitely depend on
    /// an input port, together with the dependency.
    pub fn finite_dependent_outputs(
        &self,
        input: PortId,
    ) -> impl Iterator<Item = (PortId, SuperdenseDependency)> + '_ {
        let outputs = match self.port(input).actor() {
            Some(actor) if self.port(input).direction == PortDirection::Input => {
                self.actor(actor).outputs.as_slice()
            }
            _ => &[][..],
        };

        outputs.iter().filter_map(move |&output| {
            let dependency = self.dependency(input, output);
            dependency.is_finite().then_some((output, dependency))
        })
    }

    /// Iterates over the inputs of the owning actor on which an output port
    /// finitely depends.
    pub fn finite_dependent_inputs(&self, output: PortId) -> impl Iterator<Item = PortId> + '_ {
        let inputs = match self.port(output).actor() {
            Some(actor) if self.port(output).direction == PortDirection::Output => {
                self.actor(actor).inputs.as_slice()
            }
            _ => &[][..],
        };

        inputs
            .iter()
            .copied()
            .filter(move |&input| self.dependency(input, output).is_finite())
    }

    /// Iterates over all connections leaving a port.
    pub fn connections_from(&self, port: PortId) -> impl Iterator<Item = &Connection> + '_ {
        self.outgoing
            .get(&port)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .map(|&idx| &self.connections[idx])
    }

    /// Returns the connection reaching a sink channel, if any.
    pub fn connection_to(&self, port: PortId, channel: usize) -> Option<&Connection> {
        self.incoming
            .get(&(port, channel))
            .map(|&idx| &self.connections[idx])
    }

    /// Iterates over all connections.
    pub fn connections(&self) -> impl Iterator<Item = &Connection> + '_ {
        self.connections.iter()
    }

    /// Returns a human-readable `owner.port` path.
    pub fn port_path(&self, id: PortId) -> String {
        let port = self.port(id);
        match port.owner {
            PortOwner::Actor(actor) => format!("{}.{}", self.actor(actor).name, port.name),
            PortOwner::Boundary(_) => port.name.clone(),
        }
    }

    /// Checks the consistency of the boundary port annotations.
    pub fn check_boundaries(&self) -> Result<(), CausalityError> {
        for (id, kind) in self.boundary_ports() {
            let timing = &self.port(id).timing;
            let has_device_delay = timing.device_delay.is_some() || timing.device_delay_bound.is_some();
            let has_network_delay =
                timing.network_delay_bound.is_some() || timing.source_platform_delay_bound.is_some();

            let reason = match kind {
                BoundaryKind::Sensor if has_network_delay => {
                    Some("a sensor cannot declare network delay bounds")
                }
                BoundaryKind::NetworkInput if has_device_delay => {
                    Some("a network input cannot declare a device delay")
                }
                BoundaryKind::Actuator if has_network_delay => {
                    Some("an actuator cannot declare network delay bounds")
                }
                BoundaryKind::NetworkOutput if has_device_delay => {
                    Some("a network output cannot declare a device delay")
                }
                _ => match (timing.device_delay_bound, timing.device_delay) {
                    (Some(bound), Some(delay)) if bound < delay => {
                        Some("the device delay bound is lower than the device delay")
                    }
                    _ => None,
                },
            };
            if let Some(reason) = reason {
                return Err(CausalityError::InconsistentBoundary {
                    port: self.port_path(id),
                    reason,
                });
            }
        }

        Ok(())
    }
}

use std::time::Duration;

use tracing::debug;

use crate::causality::graph::{BoundaryKind, CausalityGraph, PortDirection};
use crate::causality::{ActorId, CausalityError, PortId, SuperdenseDependency};
use crate::platform::PlatformContext;
use crate::util::priority_queue::{InsertKey, PriorityQueue};

/// Options of the delay offset analysis.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// Assume that events reach each input channel in timestamp order.
    ///
    /// When set, the offset of a channel is not constrained by the channel
    /// itself but only by the other channels of its equivalence class.
    pub timestamp_order: bool,
}

/// The immutable outcome of a delay offset analysis.
///
/// A new result must be computed with [`recompute`] whenever the topology
/// of the graph changes.
#[derive(Clone, Debug)]
pub struct CausalityGraphResult {
    options: AnalysisOptions,
    // Per port and channel: best composed dependency from a platform input.
    source_dependencies: Vec<Vec<SuperdenseDependency>>,
    // Per actor input port and channel.
    offsets: Vec<Vec<f64>>,
    // Per actor input port: smallest offset in its equivalence class.
    class_offsets: Vec<f64>,
    // Per actor input port: inputs sharing a finitely dependent output.
    equivalents: Vec<Vec<PortId>>,
    // Per actor input port.
    min_output_dependencies: Vec<SuperdenseDependency>,
    port_depths: Vec<usize>,
    actor_depths: Vec<usize>,
}

impl CausalityGraphResult {
    /// Returns the delay offset of an input port channel in seconds.
    ///
    /// An event arriving on this channel with timestamp `τ` is safe to
    /// process once platform time reaches `τ - offset`. An infinite offset
    /// means that events on this channel are always safe.
    pub fn delay_offset(&self, port: PortId, channel: usize) -> f64 {
        self.offsets
            .get(port.0)
            .and_then(|channels| channels.get(channel))
            .copied()
            .unwrap_or(f64::INFINITY)
    }

    /// Returns the smallest delay offset among all channels of the
    /// equivalence class of an input port.
    pub fn class_delay_offset(&self, port: PortId) -> f64 {
        self.class_offsets
            .get(port.0)
            .copied()
            .unwrap_or(f64::INFINITY)
    }

    /// Returns the delay offset applicable to an event.
    ///
    /// Pure events are checked against the whole equivalence class of their
    /// causal port when events are assumed to arrive in timestamp order,
    /// since the channel-level relaxation does not apply to them.
    pub fn event_delay_offset(&self, port: PortId, channel: usize, pure: bool) -> f64 {
        if pure && self.options.timestamp_order {
            self.class_delay_offset(port)
        } else {
            self.delay_offset(port, channel)
        }
    }

    /// Returns the best composed dependency from any platform input to an
    /// input port channel.
    pub fn source_dependency(&self, port: PortId, channel: usize) -> SuperdenseDependency {
        self.source_dependencies
            .get(port.0)
            .and_then(|channels| channels.get(channel))
            .copied()
            .unwrap_or(SuperdenseDependency::OPLUS_IDENTITY)
    }

    /// Returns the input ports sharing a finitely dependent output with an
    /// input port, including the port itself.
    pub fn finite_equivalent_ports(&self, port: PortId) -> &[PortId] {
        self.equivalents
            .get(port.0)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Checks whether `other` belongs to the equivalence class of
    /// `reference`.
    pub fn same_equivalence_class(&self, reference: PortId, other: PortId) -> bool {
        reference == other || self.finite_equivalent_ports(reference).contains(&other)
    }

    /// Returns the smallest dependency from an input port to the outputs of
    /// its actor.
    pub fn min_output_dependency(&self, port: PortId) -> SuperdenseDependency {
        self.min_output_dependencies
            .get(port.0)
            .copied()
            .unwrap_or(SuperdenseDependency::OPLUS_IDENTITY)
    }

    /// Returns the topological depth of a port.
    pub fn port_depth(&self, port: PortId) -> usize {
        self.port_depths.get(port.0).copied().unwrap_or(0)
    }

    /// Returns the topological depth of an actor, i.e. the smallest depth of
    /// its ports.
    pub fn actor_depth(&self, actor: ActorId) -> usize {
        self.actor_depths.get(actor.0).copied().unwrap_or(0)
    }

    /// Returns the options the analysis was computed with.
    pub fn options(&self) -> AnalysisOptions {
        self.options
    }
}

/// Computes the delay offsets, equivalence classes and topological depths of
/// a graph.
///
/// Each platform input is seeded with the negated real-time delay an event
/// may experience before entering the platform. The composed dependency to
/// every reachable actor input is then obtained with a shortest path search
/// that crosses actor dependencies and connections. The offset of a channel
/// is the smallest dependency within the equivalence class of its port.
///
/// An error is returned if the boundary annotations are inconsistent or if
/// the graph contains a cycle without delay.
pub fn recompute(
    graph: &CausalityGraph,
    options: &AnalysisOptions,
    context: &PlatformContext,
) -> Result<CausalityGraphResult, CausalityError> {
    graph.check_boundaries()?;

    let (port_depths, actor_depths) = topological_depths(graph)?;
    let source_dependencies = source_dependencies(graph, context);

    let port_count = graph.port_count();
    let mut equivalents = vec![Vec::new(); port_count];
    let mut min_output_dependencies = vec![SuperdenseDependency::OPLUS_IDENTITY; port_count];
    for (id, port) in graph.ports() {
        if !port.is_actor_input() {
            continue;
        }
        let mut class = vec![id];
        for (output, dependency) in graph.finite_dependent_outputs(id) {
            min_output_dependencies[id.0] = min_output_dependencies[id.0].oplus(dependency);
            for input in graph.finite_dependent_inputs(output) {
                if !class.contains(&input) {
                    class.push(input);
                }
            }
        }
        class.sort();
        equivalents[id.0] = class;
    }

    let mut offsets = vec![Vec::new(); port_count];
    let mut class_offsets = vec![f64::INFINITY; port_count];
    for (id, port) in graph.ports() {
        if !port.is_actor_input() {
            continue;
        }
        offsets[id.0] = (0..port.width)
            .map(|channel| {
                if let Some(min_delay) = port.timing.min_delay {
                    return min_delay;
                }
                let mut smallest = SuperdenseDependency::OPLUS_IDENTITY;
                for &other in &equivalents[id.0] {
                    for (other_channel, &dependency) in
                        source_dependencies[other.0].iter().enumerate()
                    {
                        if options.timestamp_order && other == id && other_channel == channel {
                            continue;
                        }
                        smallest = smallest.oplus(dependency);
                    }
                }
                smallest.time()
            })
            .collect();
    }
    for (id, port) in graph.ports() {
        if port.is_actor_input() {
            class_offsets[id.0] = equivalents[id.0]
                .iter()
                .flat_map(|other| offsets[other.0].iter().copied())
                .fold(f64::INFINITY, f64::min);
        }
    }

    for (id, port) in graph.ports() {
        if port.is_actor_input() {
            debug!(
                port = %graph.port_path(id),
                offsets = ?offsets[id.0],
                depth = port_depths[id.0],
                "delay offsets computed"
            );
        }
    }

    Ok(CausalityGraphResult {
        options: *options,
        source_dependencies,
        offsets,
        class_offsets,
        equivalents,
        min_output_dependencies,
        port_depths,
        actor_depths,
    })
}

/// Returns the dependency a platform input starts from.
fn seed(graph: &CausalityGraph, port: PortId, kind: BoundaryKind, context: &PlatformContext) -> f64 {
    let timing = &graph.port(port).timing;
    let secs = |d: Option<Duration>| d.map(|d| d.as_secs_f64()).unwrap_or(0.0);

    let delay = match kind {
        BoundaryKind::Sensor => secs(timing.device_delay_bound.or(timing.device_delay)),
        BoundaryKind::NetworkInput => {
            timing
                .network_delay_bound
                .unwrap_or(context.network_delay())
                .as_secs_f64()
                + secs(timing.source_platform_delay_bound)
        }
        BoundaryKind::Actuator | BoundaryKind::NetworkOutput => 0.0,
    };

    -(delay + context.clock_sync_error().as_secs_f64())
}

/// Records an improved dependency for `port` and (re)queues it.
fn relax(
    queue: &mut PriorityQueue<SuperdenseDependency, PortId>,
    queued: &mut [Option<InsertKey>],
    best: &mut [SuperdenseDependency],
    port: PortId,
    dependency: SuperdenseDependency,
) {
    if let Some(key) = queued[port.0].take() {
        queue.delete(key);
    }
    best[port.0] = dependency;
    queued[port.0] = Some(queue.insert(dependency, port));
}

/// Runs a shortest path search from all platform inputs and records, for
/// each actor input channel, the best dependency of the connection reaching
/// it.
fn source_dependencies(
    graph: &CausalityGraph,
    context: &PlatformContext,
) -> Vec<Vec<SuperdenseDependency>> {
    let port_count = graph.port_count();
    let mut best = vec![SuperdenseDependency::OPLUS_IDENTITY; port_count];
    let mut channels: Vec<Vec<SuperdenseDependency>> = graph
        .ports()
        .map(|(_, p)| {
            let width = if p.is_actor_input() { p.width } else { 0 };
            vec![SuperdenseDependency::OPLUS_IDENTITY; width]
        })
        .collect();

    // Ports are queued at most once: an improved dependency replaces the
    // queued entry.
    let mut queue = PriorityQueue::new();
    let mut queued = vec![None; port_count];
    for (id, kind) in graph.boundary_ports() {
        if kind.direction() == PortDirection::Input {
            let start = SuperdenseDependency::from_secs(seed(graph, id, kind, context));
            relax(&mut queue, &mut queued, &mut best, id, start);
        }
    }

    while let Some((dependency, port)) = queue.pull() {
        queued[port.0] = None;
        let info = graph.port(port);
        let mut improved = Vec::new();
        if info.is_source() {
            for connection in graph.connections_from(port) {
                let sink = connection.to;
                if let Some(slot) = channels[sink.0].get_mut(connection.to_channel) {
                    *slot = slot.oplus(dependency);
                }
                improved.push((sink, dependency));
            }
        } else if info.is_actor_input() {
            for (output, edge) in graph.finite_dependent_outputs(port) {
                improved.push((output, dependency.otimes(edge)));
            }
        }

        for (next, dependency) in improved {
            if dependency < best[next.0] {
                relax(&mut queue, &mut queued, &mut best, next, dependency);
            }
        }
    }

    channels
}

/// Sorts ports topologically along connections and zero-delay actor
/// dependencies, returning the depth of each port and of each actor.
fn topological_depths(graph: &CausalityGraph) -> Result<(Vec<usize>, Vec<usize>), CausalityError> {
    let port_count = graph.port_count();
    let mut successors = vec![Vec::new(); port_count];
    let mut predecessors = vec![Vec::new(); port_count];
    for connection in graph.connections() {
        successors[connection.from.0].push(connection.to);
        predecessors[connection.to.0].push(connection.from);
    }
    for (id, port) in graph.ports() {
        if port.is_actor_input() {
            for (output, dependency) in graph.finite_dependent_outputs(id) {
                if dependency == SuperdenseDependency::OTIMES_IDENTITY {
                    successors[id.0].push(output);
                    predecessors[output.0].push(id);
                }
            }
        }
    }

    let mut in_degree: Vec<usize> = predecessors.iter().map(Vec::len).collect();
    let mut ready = PriorityQueue::new();
    for (idx, &degree) in in_degree.iter().enumerate() {
        if degree == 0 {
            ready.insert(idx, ());
        }
    }

    let mut port_depths = vec![usize::MAX; port_count];
    let mut depth = 0;
    while let Some((idx, ())) = ready.pull() {
        port_depths[idx] = depth;
        depth += 1;
        for next in &successors[idx] {
            in_degree[next.0] -= 1;
            if in_degree[next.0] == 0 {
                ready.insert(next.0, ());
            }
        }
    }

    if let Some(start) = port_depths.iter().position(|&d| d == usize::MAX) {
        return Err(CausalityError::CyclicZeroDelay {
            chain: cycle_chain(graph, &predecessors, &port_depths, start),
        });
    }

    let actor_depths = graph
        .actors()
        .map(|(_, actor)| {
            actor
                .inputs
                .iter()
                .chain(&actor.outputs)
                .map(|p| port_depths[p.0])
                .min()
                .unwrap_or(0)
        })
        .collect();

    Ok((port_depths, actor_depths))
}

/// Walks backward from an unsorted port until a port repeats and returns
/// the names of the actors along the cycle, in causal order.
fn cycle_chain(
    graph: &CausalityGraph,
    predecessors: &[Vec<PortId>],
    port_depths: &[usize],
    start: usize,
) -> Vec<String> {
    let mut path = vec![PortId(start)];
    loop {
        let current = path[path.len() - 1];
        // Every unsorted port has at least one unsorted predecessor.
        let Some(&previous) = predecessors[current.0]
            .iter()
            .find(|p| port_depths[p.0] == usize::MAX)
        else {
            break;
        };
        if let Some(pos) = path.iter().position(|&p| p == previous) {
            path.drain(..pos);
            break;
        }
        path.push(previous);
    }
    path.reverse();

    let mut chain: Vec<String> = Vec::new();
    for port in path {
        if let Some(actor) = graph.port(port).actor() {
            let name = &graph.actor(actor).name;
            if chain.last() != Some(name) {
                chain.push(name.clone());
            }
        }
    }
    // The walk may close the cycle on the actor it started from.
    if chain.len() > 1 && chain.first() == chain.last() {
        chain.pop();
    }

    chain
}

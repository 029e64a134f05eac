use std::fmt;
use std::time::Duration;

use crate::causality::PortDirection;
use crate::platform::{Platform, PlatformId};
use crate::time::MonotonicTime;

use super::{Link, Simulation, SimulationError};

/// Builder for a multi-platform simulation.
pub struct SimInit {
    platforms: Vec<Platform>,
    links: Vec<LinkSpec>,
    error: Option<SimulationError>,
}

struct LinkSpec {
    from: String,
    output: String,
    to: String,
    input: String,
    latency: Duration,
}

impl SimInit {
    /// Creates a builder for a simulation without platforms.
    pub fn new() -> Self {
        Self {
            platforms: Vec::new(),
            links: Vec::new(),
            error: None,
        }
    }

    /// Adds a platform to the simulation bench.
    ///
    /// Platform names must be unique within a simulation.
    pub fn add_platform(mut self, mut platform: Platform) -> Self {
        if self.error.is_some() {
            return self;
        }
        if self.platforms.iter().any(|p| p.name() == platform.name()) {
            self.error = Some(SimulationError::DuplicatePlatform {
                name: platform.name().to_owned(),
            });
            return self;
        }

        platform.set_id(PlatformId(self.platforms.len()));
        self.platforms.push(platform);

        self
    }

    /// Links a platform output to a platform input without latency.
    ///
    /// Tokens emitted by the output are delivered to the input, with the tag
    /// they carry, at the oracle time at which they were emitted.
    pub fn link(self, from_platform: &str, output: &str, to_platform: &str, input: &str) -> Self {
        self.link_with_latency(from_platform, output, to_platform, input, Duration::ZERO)
    }

    /// Links a platform output to a platform input with a transmission
    /// latency.
    pub fn link_with_latency(
        mut self,
        from_platform: &str,
        output: &str,
        to_platform: &str,
        input: &str,
        latency: Duration,
    ) -> Self {
        self.links.push(LinkSpec {
            from: from_platform.to_owned(),
            output: output.to_owned(),
            to: to_platform.to_owned(),
            input: input.to_owned(),
            latency,
        });

        self
    }

    /// Builds a simulation initialized at the specified oracle time.
    ///
    /// All platforms are initialized; an error is returned if a link refers
    /// to an unknown platform or port, or if a platform fails to initialize.
    pub fn init(self, start_time: MonotonicTime) -> Result<Simulation, SimulationError> {
        if let Some(e) = self.error {
            return Err(e);
        }

        let links = self
            .links
            .iter()
            .map(|spec| {
                Ok(Link {
                    from: resolve(&self.platforms, &spec.from, &spec.output, PortDirection::Output)?,
                    output: spec.output.clone(),
                    to: resolve(&self.platforms, &spec.to, &spec.input, PortDirection::Input)?,
                    input: spec.input.clone(),
                    latency: spec.latency,
                })
            })
            .collect::<Result<Vec<_>, SimulationError>>()?;

        let mut simulation = Simulation::new(self.platforms, links, start_time);
        simulation.initialize()?;

        Ok(simulation)
    }
}

impl Default for SimInit {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SimInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimInit")
            .field("platforms", &self.platforms.len())
            .field("links", &self.links.len())
            .finish_non_exhaustive()
    }
}

/// Resolves a platform boundary port with the specified direction.
fn resolve(
    platforms: &[Platform],
    platform: &str,
    port: &str,
    direction: PortDirection,
) -> Result<PlatformId, SimulationError> {
    let (idx, target) = platforms
        .iter()
        .enumerate()
        .find(|(_, p)| p.name() == platform)
        .ok_or_else(|| SimulationError::UnknownPlatform {
            name: platform.to_owned(),
        })?;

    let graph = target.graph();
    let found = graph
        .find_boundary_port(port)
        .and_then(|id| graph.port(id).boundary())
        .is_some_and(|kind| kind.direction() == direction);
    if !found {
        return Err(SimulationError::UnknownPort {
            platform: platform.to_owned(),
            port: port.to_owned(),
        });
    }

    Ok(PlatformId(idx))
}

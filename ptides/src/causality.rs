//! Causality analysis.
//!
//! This module computes, from the static dependency graph of a platform, the
//! *delay offset* of every actor input channel: the amount by which platform
//! time must lag behind the timestamp of an event arriving on that channel
//! before no earlier-timestamped event can still reach the same equivalence
//! class of input ports.
//!
//! The analysis is performed by [`recompute`], which returns an immutable
//! [`CausalityGraphResult`]. It runs once when a platform is built and must
//! be re-run whenever the topology changes.

mod analysis;
mod dependency;
mod graph;

use std::error::Error;
use std::fmt;

pub use analysis::{recompute, AnalysisOptions, CausalityGraphResult};
pub use dependency::SuperdenseDependency;
pub use graph::{
    ActorId, ActorInfo, BoundaryKind, CausalityGraph, Connection, PortDirection, PortId, PortInfo,
    PortOwner,
};

/// Error returned when the structure of a platform model is invalid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CausalityError {
    /// The graph contains a cycle along which no model time elapses.
    CyclicZeroDelay {
        /// Names of the actors along the cycle, in causal order.
        chain: Vec<String>,
    },
    /// The annotations of a boundary port contradict its role.
    InconsistentBoundary {
        /// Name of the offending port.
        port: String,
        /// Description of the inconsistency.
        reason: &'static str,
    },
    /// No port with this name exists.
    UnknownPort {
        /// Requested port path.
        name: String,
    },
    /// A connection or dependency between two ports is not allowed.
    InvalidConnection {
        /// Source port path.
        from: String,
        /// Sink port path.
        to: String,
        /// Description of the problem.
        reason: &'static str,
    },
}

impl fmt::Display for CausalityError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CyclicZeroDelay { chain } => write!(
                fmt,
                "the dependency cycle through {} has no model-time delay",
                chain.join(" -> ")
            ),
            Self::InconsistentBoundary { port, reason } => {
                write!(fmt, "inconsistent boundary port '{}': {}", port, reason)
            }
            Self::UnknownPort { name } => write!(fmt, "no port named '{}'", name),
            Self::InvalidConnection { from, to, reason } => write!(
                fmt,
                "invalid connection from '{}' to '{}': {}",
                from, to, reason
            ),
        }
    }
}

impl Error for CausalityError {}

//! Scheduled units of work.
//!
//! An [`Event`] is either *triggered*, in which case it carries a token for
//! a specific input port channel, or *pure*, in which case it only requests a
//! firing of an actor at a given tag.
//!
//! Events are owned by the [`EventQueue`] from insertion until they are
//! extracted for firing, and are referred to elsewhere by their [`EventId`].

pub mod queue;

use std::fmt;
use std::time::Duration;

use crate::causality::{ActorId, PortId};
use crate::time::{self, MonotonicTime, Tag};
use crate::token::Token;

pub use queue::EventQueue;

/// A unique handle to an event held by an [`EventQueue`].
///
/// Handles are never reused by a queue, even after the event was extracted.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId {
    pub(crate) key: usize,
    pub(crate) seq: u64,
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event #{}", self.seq)
    }
}

/// The kind of an event.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A firing request that carries no token.
    Pure,
    /// A token delivery to an input port channel.
    Triggered,
}

/// An absolute deadline.
///
/// Deadlines are totally ordered, with `Earliest` sorting before any finite
/// deadline and `Latest` after any finite deadline.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Deadline {
    /// A deadline that lies before all others.
    Earliest,
    /// A deadline at the specified physical time.
    At(MonotonicTime),
    /// A deadline that lies after all others.
    Latest,
}

impl Deadline {
    /// Shifts a deadline by a signed number of seconds; unbounded deadlines
    /// are unaffected.
    pub fn offset_secs(self, secs: f64) -> Self {
        match self {
            Self::At(t) if secs.is_finite() => Self::At(time::offset_secs(t, secs)),
            Self::At(_) if secs > 0.0 => Self::Latest,
            Self::At(_) => Self::Earliest,
            other => other,
        }
    }

    /// Returns the deadline lying `relative` after a timestamp, or `Earliest`
    /// if no relative deadline is specified.
    pub fn relative_to(timestamp: MonotonicTime, relative: Option<Duration>) -> Self {
        match relative {
            Some(relative) => Self::At(time::add_duration(timestamp, relative)),
            None => Self::Earliest,
        }
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Earliest => f.write_str("-inf"),
            Self::At(t) => write!(f, "{:.9}", t),
            Self::Latest => f.write_str("+inf"),
        }
    }
}

/// A scheduled unit of work.
#[derive(Clone, Debug)]
pub struct Event {
    /// Tag at which the event is processed.
    pub tag: Tag,
    /// Destination actor.
    pub actor: ActorId,
    /// Destination input port and channel of a triggered event, or causally
    /// related input port and channel of a pure event.
    pub port: Option<(PortId, usize)>,
    /// Token delivered by a triggered event.
    pub payload: Option<Token>,
    /// Pure or triggered.
    pub kind: EventKind,
    /// Absolute deadline used by deadline-driven scheduling policies.
    pub absolute_deadline: Deadline,
    /// Platform time at which the platform input that ultimately produced
    /// this event was received, if any.
    pub source_timestamp: Option<MonotonicTime>,
    /// Topological depth of the destination, used as a final tie-break.
    pub depth: usize,
}

impl Event {
    /// Creates a triggered event carrying a token to an input port channel.
    pub fn triggered(
        tag: Tag,
        actor: ActorId,
        port: PortId,
        channel: usize,
        token: Token,
        absolute_deadline: Deadline,
        depth: usize,
    ) -> Self {
        Self {
            tag,
            actor,
            port: Some((port, channel)),
            payload: Some(token),
            kind: EventKind::Triggered,
            absolute_deadline,
            source_timestamp: None,
            depth,
        }
    }

    /// Creates a pure event, optionally tied to a causally related input
    /// port channel.
    pub fn pure(
        tag: Tag,
        actor: ActorId,
        causal_port: Option<(PortId, usize)>,
        absolute_deadline: Deadline,
        depth: usize,
    ) -> Self {
        Self {
            tag,
            actor,
            port: causal_port,
            payload: None,
            kind: EventKind::Pure,
            absolute_deadline,
            source_timestamp: None,
            depth,
        }
    }

    /// Sets the platform time at which the platform input this event
    /// originates from was received.
    pub fn with_source_timestamp(mut self, timestamp: Option<MonotonicTime>) -> Self {
        self.source_timestamp = timestamp;
        self
    }

    /// Checks whether this is a pure event.
    pub fn is_pure(&self) -> bool {
        self.kind == EventKind::Pure
    }

    /// Returns the destination or causal port, if any.
    pub fn port_id(&self) -> Option<PortId> {
        self.port.map(|(port, _)| port)
    }
}

//! Safe-to-process scheduling.
//!
//! This module contains the building blocks of the platform state machine:
//!
//! * [`Safety`]: the verdict of the safe-to-process test for one event,
//! * [`ExecutionStack`]: the nested in-flight firings with their remaining
//!   execution time,
//! * [`PriorityPolicy`] and [`PreemptionPolicy`]: pluggable rules deciding
//!   which safe event is started and whether it preempts the executing
//!   firing.
//!
//! The state machine itself is driven by [`Platform`](crate::platform::Platform).

mod policy;
mod stack;

use std::fmt;

use crate::causality::{ActorId, PortId, SuperdenseDependency};
use crate::event::Deadline;
use crate::time::{self, MonotonicTime, Tag};

pub use policy::{
    Candidate, CandidateScope, DeadlinePreemption, EdfPriority, NeverPreempt, PreemptionPolicy,
    PriorityPolicy, SelectionContext, TagOrder, WcetPriority,
};
pub use stack::{ExecutionStack, ExecutionStackEntry};

/// State of a platform scheduler.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    /// Nothing is queued or executing.
    Idle,
    /// The scheduler itself is running until the specified platform time;
    /// this cannot be preempted.
    SchedulerRunning {
        /// Platform time at which scheduling completes.
        until: MonotonicTime,
    },
    /// An actor is executing until the specified execution clock time,
    /// unless it is preempted.
    Executing {
        /// Executing actor.
        actor: ActorId,
        /// Execution clock time at which the firing completes.
        until: MonotonicTime,
    },
    /// Events are pending but none can be processed before physical time
    /// advances.
    WaitingForPhysicalTime,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::SchedulerRunning { until } => write!(f, "scheduling until {:.9}", until),
            Self::Executing { actor, until } => write!(f, "executing {} until {:.9}", actor, until),
            Self::WaitingForPhysicalTime => f.write_str("waiting for physical time"),
        }
    }
}

/// Verdict of the safe-to-process test.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Safety {
    /// No event with an earlier tag can still reach the destination.
    Safe,
    /// The event may only be processed once the physical tag reaches the
    /// specified platform time and the event microstep.
    NotBefore(MonotonicTime),
}

impl Safety {
    /// Tests whether an event is safe to process.
    ///
    /// An event without a causal port is always safe. Otherwise the event is
    /// safe once the physical tag `(time, microstep)` is at least
    /// `(timestamp - delay_offset, event microstep)`.
    ///
    /// The verdict is monotonic: once safe at some physical tag, an event is
    /// safe at all later physical tags.
    pub fn evaluate(physical: Tag, event: Tag, delay_offset: Option<f64>) -> Self {
        let Some(offset) = delay_offset else {
            return Self::Safe;
        };
        let threshold = time::offset_secs(event.timestamp, -offset);

        if physical >= Tag::new(threshold, event.microstep) {
            Self::Safe
        } else {
            Self::NotBefore(threshold)
        }
    }

    /// Checks whether the verdict is `Safe`.
    pub fn is_safe(&self) -> bool {
        matches!(self, Self::Safe)
    }
}

/// Information retained about a firing to derive the deadline and the
/// causal port of the pure events it requests.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct FiringRecord {
    /// Timestamp of the processed events.
    pub(crate) timestamp: Option<MonotonicTime>,
    /// Smallest deadline of the processed events.
    pub(crate) deadline: Deadline,
    /// Smallest dependency from the ports of the processed events to the
    /// outputs of the actor, or zero if a pure event was processed.
    pub(crate) dependency: SuperdenseDependency,
    /// Port and channel of the first processed event.
    pub(crate) source_port: Option<(PortId, usize)>,
    /// Earliest source timestamp of the processed events.
    pub(crate) source_timestamp: Option<MonotonicTime>,
}

impl FiringRecord {
    /// Returns the deadline of a pure event requested at `timestamp`.
    ///
    /// The deadline is that of the processed events shifted by the model
    /// time separating the request from the processed events, net of the
    /// minimum delay through the actor. Requests closer than that minimum
    /// delay inherit the deadline of the processed events.
    pub(crate) fn pure_event_deadline(&self, timestamp: MonotonicTime) -> Deadline {
        let Some(last) = self.timestamp else {
            return Deadline::Earliest;
        };
        let diff = time::secs_between(timestamp, last) - self.dependency.time();
        if !(diff >= 0.0) {
            return self.deadline;
        }

        self.deadline.offset_secs(diff)
    }
}

impl Default for FiringRecord {
    fn default() -> Self {
        Self {
            timestamp: None,
            deadline: Deadline::Earliest,
            dependency: SuperdenseDependency::OTIMES_IDENTITY,
            source_port: None,
            source_timestamp: None,
        }
    }
}

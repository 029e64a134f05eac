//! Token transfer across the platform boundary.
//!
//! Tokens entering the platform through a sensor are held until the device
//! delay has elapsed, while tokens entering through a network input enter
//! immediately with the tag they carry. Tokens leaving the platform through
//! an actuator are held until the platform time at which the actuation
//! must start, and tokens leaving through a network output leave
//! immediately.

use std::collections::BTreeMap;
use std::fmt;

use crate::actor::PortTimingProfile;
use crate::causality::{BoundaryKind, PortId};
use crate::time::{self, MonotonicTime, Tag};
use crate::token::Token;

/// A token emitted by a platform output.
#[derive(Clone, Debug)]
pub struct BoundaryOutput {
    /// Name of the platform output.
    pub port: String,
    /// Output channel.
    pub channel: usize,
    /// Emitted token.
    pub token: Token,
    /// Model tag of the token.
    pub tag: Tag,
    /// Platform time at which the token was emitted.
    pub emitted_at: MonotonicTime,
    /// Platform time at which the platform input this token originates from
    /// was received, if any.
    pub source_timestamp: Option<MonotonicTime>,
}

/// Timing of a boundary transfer relative to the current platform time.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Transfer {
    /// The token is transferred now.
    Now,
    /// The token must be held until the specified platform time.
    At(MonotonicTime),
    /// The platform time at which the token had to be transferred has
    /// passed.
    Late {
        /// Platform time at which the transfer was due.
        required: MonotonicTime,
    },
}

impl Transfer {
    fn due_at(due: MonotonicTime, now: MonotonicTime) -> Self {
        if now == due {
            Self::Now
        } else if now < due {
            Self::At(due)
        } else {
            Self::Late { required: due }
        }
    }
}

/// Decides when a token delivered to a platform input enters the
/// platform.
///
/// A sensor token sensed at `tag` enters after its device delay.
pub(crate) fn input_transfer(
    kind: BoundaryKind,
    timing: &PortTimingProfile,
    tag: Tag,
    now: MonotonicTime,
) -> Transfer {
    match kind {
        BoundaryKind::Sensor => {
            let delay = timing.device_delay.unwrap_or_default();
            Transfer::due_at(time::add_duration(tag.timestamp, delay), now)
        }
        _ => Transfer::Now,
    }
}

/// Decides when a token produced for a platform output leaves the
/// platform.
///
/// An actuator token with tag `tag` must leave at `tag - device delay`.
pub(crate) fn output_transfer(
    kind: BoundaryKind,
    timing: &PortTimingProfile,
    tag: Tag,
    now: MonotonicTime,
) -> Transfer {
    match kind {
        BoundaryKind::Actuator if !timing.transfer_immediately => {
            let delay = timing.device_delay.unwrap_or_default();
            Transfer::due_at(time::sub_duration(tag.timestamp, delay), now)
        }
        _ => Transfer::Now,
    }
}

/// A token held at the boundary.
#[derive(Clone, Debug)]
pub(crate) struct HeldToken {
    pub(crate) port: PortId,
    pub(crate) channel: usize,
    pub(crate) token: Token,
    pub(crate) tag: Tag,
    pub(crate) source_timestamp: Option<MonotonicTime>,
}

/// Real-time queues of a platform boundary.
#[derive(Default)]
pub(crate) struct BoundaryQueues {
    inputs: BTreeMap<(MonotonicTime, u64), HeldToken>,
    outputs: BTreeMap<(MonotonicTime, u64), HeldToken>,
    emitted: Vec<BoundaryOutput>,
    next_seq: u64,
}

impl BoundaryQueues {
    /// Holds an incoming token until the specified platform time.
    pub(crate) fn hold_input(&mut self, release: MonotonicTime, held: HeldToken) {
        let seq = self.next_seq();
        self.inputs.insert((release, seq), held);
    }

    /// Holds an outgoing token until the specified platform time.
    pub(crate) fn hold_output(&mut self, due: MonotonicTime, held: HeldToken) {
        let seq = self.next_seq();
        self.outputs.insert((due, seq), held);
    }

    /// Removes all incoming tokens released at or before `now`, in release
    /// order.
    pub(crate) fn take_due_inputs(&mut self, now: MonotonicTime) -> Vec<(MonotonicTime, HeldToken)> {
        take_due(&mut self.inputs, now)
    }

    /// Removes all outgoing tokens due at or before `now`, in due order.
    pub(crate) fn take_due_outputs(&mut self, now: MonotonicTime) -> Vec<(MonotonicTime, HeldToken)> {
        take_due(&mut self.outputs, now)
    }

    /// Records an emitted token.
    pub(crate) fn emit(&mut self, output: BoundaryOutput) {
        self.emitted.push(output);
    }

    /// Returns and forgets all emitted tokens.
    pub(crate) fn drain(&mut self) -> Vec<BoundaryOutput> {
        std::mem::take(&mut self.emitted)
    }

    /// Returns the number of held tokens.
    pub(crate) fn held(&self) -> usize {
        self.inputs.len() + self.outputs.len()
    }

    /// Drops all held and emitted tokens.
    pub(crate) fn clear(&mut self) {
        self.inputs.clear();
        self.outputs.clear();
        self.emitted.clear();
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;

        seq
    }
}

impl fmt::Debug for BoundaryQueues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundaryQueues")
            .field("held_inputs", &self.inputs.len())
            .field("held_outputs", &self.outputs.len())
            .field("emitted", &self.emitted.len())
            .finish_non_exhaustive()
    }
}

fn take_due(
    queue: &mut BTreeMap<(MonotonicTime, u64), HeldToken>,
    now: MonotonicTime,
) -> Vec<(MonotonicTime, HeldToken)> {
    let later = queue.split_off(&(time::from_nanos(time::to_nanos(now) + 1), 0));
    let due = std::mem::replace(queue, later);

    due.into_iter().map(|((t, _), held)| (t, held)).collect()
}

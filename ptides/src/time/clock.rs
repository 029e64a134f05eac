use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

use crate::time::{self, MonotonicTime};

/// The role of a [`RealTimeClock`] within a platform.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ClockKind {
    /// Clock against which safe-to-process decisions, sensor delivery and
    /// actuation deadlines are evaluated.
    Platform,
    /// Clock measuring how much of an actor's execution time has elapsed.
    Execution,
}

impl fmt::Display for ClockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Platform => f.write_str("platform clock"),
            Self::Execution => f.write_str("execution clock"),
        }
    }
}

/// Outcome of a wake-up callback as seen by a clock.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WakeupStatus {
    /// The callback corresponds to the specified number of live wake-up
    /// requests.
    Due(usize),
    /// The callback only corresponds to wake-up requests that were
    /// re-projected by a drift update and must be dropped.
    Stale(usize),
    /// The clock did not request this callback.
    Unknown,
}

/// A pending wake-up moved to a new oracle time by a drift update.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Reprojection {
    /// Local time at which the wake-up is expected.
    pub local: MonotonicTime,
    /// Oracle time requested before the drift update.
    pub old_oracle: MonotonicTime,
    /// Oracle time corresponding to the local target after the update.
    pub new_oracle: MonotonicTime,
}

/// A drifting local clock.
///
/// The clock is an affine map from oracle time (the time of the enclosing
/// time source) to local physical time:
///
/// `local = last_local + (oracle - last_oracle) * drift`.
///
/// Each drift update re-anchors the map at the time of the update so that
/// local time remains continuous. Earlier segments are retained, which makes
/// the mapping piecewise affine and allows past oracle times to be projected
/// consistently.
///
/// The clock also keeps track of the wake-up requests issued against it in
/// local time. When the drift changes, these requests are moved to their new
/// oracle time and the old oracle times are remembered so that stray
/// callbacks can be recognized with [`RealTimeClock::take_wakeups`].
#[derive(Clone, Debug)]
pub struct RealTimeClock {
    kind: ClockKind,
    initial_drift: f64,
    // Never empty; sorted by oracle time.
    anchors: Vec<Anchor>,
    // Live wake-up requests: oracle time -> local targets.
    pending: BTreeMap<MonotonicTime, Vec<MonotonicTime>>,
    // Oracle times of re-projected requests: oracle time -> count.
    stale: BTreeMap<MonotonicTime, usize>,
}

impl RealTimeClock {
    /// Creates a clock anchored at the specified oracle and local times.
    ///
    /// A null drift is accepted and yields a frozen clock. An error is
    /// returned if the drift is negative or not a number.
    pub fn new(
        kind: ClockKind,
        oracle_time: MonotonicTime,
        local_time: MonotonicTime,
        drift: f64,
    ) -> Result<Self, ClockError> {
        if !(drift >= 0.0) || drift.is_infinite() {
            return Err(ClockError::DriftNegative { drift });
        }

        Ok(Self {
            kind,
            initial_drift: drift,
            anchors: vec![Anchor {
                oracle: oracle_time,
                local: local_time,
                drift,
            }],
            pending: BTreeMap::new(),
            stale: BTreeMap::new(),
        })
    }

    /// Returns the role of this clock.
    pub fn kind(&self) -> ClockKind {
        self.kind
    }

    /// Returns the current drift.
    pub fn drift(&self) -> f64 {
        self.current().drift
    }

    /// Returns the oracle time of the last anchor.
    pub fn last_oracle_time(&self) -> MonotonicTime {
        self.current().oracle
    }

    /// Returns the local time of the last anchor.
    pub fn last_local_time(&self) -> MonotonicTime {
        self.current().local
    }

    /// Returns the number of live wake-up requests.
    pub fn pending_wakeups(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    /// Projects an oracle time to local time.
    pub fn current_local_time(&self, oracle_now: MonotonicTime) -> MonotonicTime {
        let idx = self.anchors.partition_point(|a| a.oracle <= oracle_now);

        self.anchors[idx.saturating_sub(1)].local_at(oracle_now)
    }

    /// Returns the earliest oracle time at which local time reaches the
    /// target.
    ///
    /// An error is returned if the clock is frozen and the target differs
    /// from the frozen local time.
    pub fn oracle_for_local(&self, target_local: MonotonicTime) -> Result<MonotonicTime, ClockError> {
        let idx = self.anchors.partition_point(|a| a.local <= target_local);

        self.anchors[idx.saturating_sub(1)]
            .oracle_at(target_local)
            .ok_or(ClockError::DriftZero {
                target: target_local,
            })
    }

    /// Changes the drift at the specified oracle time.
    ///
    /// The clock is re-anchored at `oracle_now` before the drift changes so
    /// that local time does not jump. Live wake-up requests are moved to the
    /// oracle time at which their local target is now expected; the moves
    /// are returned so the caller can request new callbacks, and the old
    /// oracle times are recorded as stale.
    ///
    /// An error is returned and the clock left untouched if the drift is not
    /// strictly positive.
    pub fn update_drift(
        &mut self,
        oracle_now: MonotonicTime,
        new_drift: f64,
    ) -> Result<Vec<Reprojection>, ClockError> {
        if !(new_drift > 0.0) || new_drift.is_infinite() {
            return Err(ClockError::DriftNegative { drift: new_drift });
        }

        // Anchors never move backward in oracle time.
        let oracle_now = oracle_now.max(self.current().oracle);
        let local_now = self.current_local_time(oracle_now);
        let anchor = Anchor {
            oracle: oracle_now,
            local: local_now,
            drift: new_drift,
        };
        if self.current().oracle == oracle_now {
            *self.current_mut() = anchor;
        } else {
            self.anchors.push(anchor);
        }

        let mut reprojections = Vec::new();
        let pending = std::mem::take(&mut self.pending);
        for (old_oracle, locals) in pending {
            for local in locals {
                // Targets already reached keep their oracle time.
                let new_oracle = if local < local_now {
                    old_oracle
                } else {
                    self.oracle_for_local(local)?
                };
                if new_oracle != old_oracle {
                    *self.stale.entry(old_oracle).or_insert(0) += 1;
                    reprojections.push(Reprojection {
                        local,
                        old_oracle,
                        new_oracle,
                    });
                }
                self.pending.entry(new_oracle).or_default().push(local);
            }
        }

        Ok(reprojections)
    }

    /// Registers a wake-up request for the specified local time and returns
    /// the oracle time at which the callback should be requested.
    pub fn register_wakeup(&mut self, target_local: MonotonicTime) -> Result<MonotonicTime, ClockError> {
        let oracle = self.oracle_for_local(target_local)?;
        self.pending.entry(oracle).or_default().push(target_local);

        Ok(oracle)
    }

    /// Consumes all wake-up requests due at or before the specified oracle
    /// time and reports whether the callback should be honored.
    pub fn take_wakeups(&mut self, oracle_now: MonotonicTime) -> WakeupStatus {
        let bound = time::from_nanos(time::to_nanos(oracle_now) + 1);

        let later = self.pending.split_off(&bound);
        let due = std::mem::replace(&mut self.pending, later);
        let due: usize = due.values().map(Vec::len).sum();

        let later = self.stale.split_off(&bound);
        let stale = std::mem::replace(&mut self.stale, later);
        let stale: usize = stale.values().sum();

        if due != 0 {
            WakeupStatus::Due(due)
        } else if stale != 0 {
            WakeupStatus::Stale(stale)
        } else {
            WakeupStatus::Unknown
        }
    }

    /// Re-anchors the clock with its initial drift and forgets all wake-up
    /// requests.
    pub fn reset(&mut self, oracle_time: MonotonicTime, local_time: MonotonicTime) {
        self.anchors.clear();
        self.anchors.push(Anchor {
            oracle: oracle_time,
            local: local_time,
            drift: self.initial_drift,
        });
        self.pending.clear();
        self.stale.clear();
    }

    fn current(&self) -> &Anchor {
        // The anchor list is never empty.
        &self.anchors[self.anchors.len() - 1]
    }

    fn current_mut(&mut self) -> &mut Anchor {
        let last = self.anchors.len() - 1;
        &mut self.anchors[last]
    }
}

/// Origin of one affine segment.
#[derive(Copy, Clone, Debug, PartialEq)]
struct Anchor {
    oracle: MonotonicTime,
    local: MonotonicTime,
    drift: f64,
}

impl Anchor {
    fn local_at(&self, oracle: MonotonicTime) -> MonotonicTime {
        let delta = time::to_nanos(oracle) - time::to_nanos(self.oracle);
        let scaled = (delta as f64 * self.drift).round() as i128;

        time::from_nanos(time::to_nanos(self.local) + scaled)
    }

    // Rounds up so that local time at the returned oracle time is never short
    // of the target.
    fn oracle_at(&self, local: MonotonicTime) -> Option<MonotonicTime> {
        let delta = time::to_nanos(local) - time::to_nanos(self.local);
        if delta == 0 {
            return Some(self.oracle);
        }
        if self.drift == 0.0 {
            return None;
        }
        let scaled = (delta as f64 / self.drift).ceil() as i128;

        Some(time::from_nanos(time::to_nanos(self.oracle) + scaled))
    }
}

/// Error returned when a clock operation is rejected.
///
/// The clock is left unchanged when an error is returned.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ClockError {
    /// The clock is frozen and the requested local time is never reached.
    DriftZero {
        /// Requested local time.
        target: MonotonicTime,
    },
    /// The requested drift is not strictly positive.
    DriftNegative {
        /// Requested drift.
        drift: f64,
    },
}

impl fmt::Display for ClockError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DriftZero { target } => write!(
                fmt,
                "the clock is frozen and never reaches local time {:.9}",
                target
            ),
            Self::DriftNegative { drift } => {
                write!(fmt, "clock drift must be strictly positive, got {}", drift)
            }
        }
    }
}

impl Error for ClockError {}

use std::time::Duration;

use crate::causality::ActorId;
use crate::event::{Deadline, Event};
use crate::scheduler::FiringRecord;
use crate::time::{self, MonotonicTime, Tag};

/// An in-flight firing.
#[derive(Debug)]
pub struct ExecutionStackEntry {
    /// Tag of the events being processed.
    pub tag: Tag,
    /// Destination actor of the events.
    pub actor: ActorId,
    /// Events processed by the firing, all sharing the same tag and actor.
    pub events: Vec<Event>,
    /// Smallest absolute deadline of the events.
    pub deadline: Deadline,
    /// Execution time still required, as of `started`.
    pub remaining: Duration,
    /// Execution clock time at which the entry last started or resumed.
    pub(crate) started: MonotonicTime,
    pub(crate) record: FiringRecord,
    // Completion time for which a wake-up was last requested.
    pub(crate) armed: Option<MonotonicTime>,
}

impl ExecutionStackEntry {
    pub(crate) fn new(
        events: Vec<Event>,
        record: FiringRecord,
        execution_time: Duration,
        started: MonotonicTime,
    ) -> Option<Self> {
        let first = events.first()?;
        let (tag, actor) = (first.tag, first.actor);

        Some(Self {
            tag,
            actor,
            deadline: record.deadline,
            events,
            remaining: execution_time,
            started,
            record,
            armed: None,
        })
    }

    /// Returns the execution clock time at which the firing completes if it
    /// is not preempted.
    pub fn finish_time(&self) -> MonotonicTime {
        time::add_duration(self.started, self.remaining)
    }

    /// Charges the time elapsed since the last start and restarts the
    /// accounting at `now`.
    fn charge(&mut self, now: MonotonicTime) {
        let elapsed = time::checked_duration_between(now, self.started).unwrap_or_default();
        self.remaining = self.remaining.saturating_sub(elapsed);
        self.started = now;
    }
}

/// The stack of in-flight firings.
///
/// The top entry is the one currently executing; entries below it were
/// preempted and resume in last-in first-out order. All times are execution
/// clock times.
#[derive(Debug, Default)]
pub struct ExecutionStack {
    entries: Vec<ExecutionStackEntry>,
}

impl ExecutionStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a new firing, preempting the current top entry if any.
    ///
    /// The preempted entry is charged with the time it executed since it
    /// last started.
    pub(crate) fn push(&mut self, mut entry: ExecutionStackEntry, now: MonotonicTime) {
        if let Some(top) = self.entries.last_mut() {
            top.charge(now);
        }
        entry.started = now;
        self.entries.push(entry);
    }

    /// Pops the top firing and resumes the entry below it at `now`.
    pub(crate) fn pop(&mut self, now: MonotonicTime) -> Option<ExecutionStackEntry> {
        let entry = self.entries.pop()?;
        if let Some(top) = self.entries.last_mut() {
            top.started = now;
            top.armed = None;
        }

        Some(entry)
    }

    /// Suspends the accounting of the top entry at `now`.
    pub(crate) fn pause(&mut self, now: MonotonicTime) {
        if let Some(top) = self.entries.last_mut() {
            top.charge(now);
        }
    }

    /// Resumes the accounting of the top entry at `now`.
    pub(crate) fn resume(&mut self, now: MonotonicTime) {
        if let Some(top) = self.entries.last_mut() {
            top.started = now;
            top.armed = None;
        }
    }

    /// Returns the executing entry.
    pub fn top(&self) -> Option<&ExecutionStackEntry> {
        self.entries.last()
    }

    pub(crate) fn top_mut(&mut self) -> Option<&mut ExecutionStackEntry> {
        self.entries.last_mut()
    }

    /// Checks whether an actor has an in-flight firing.
    pub fn contains_actor(&self, actor: ActorId) -> bool {
        self.entries.iter().any(|e| e.actor == actor)
    }

    /// Iterates over the entries from bottom to top.
    pub fn iter(&self) -> impl Iterator<Item = &ExecutionStackEntry> + '_ {
        self.entries.iter()
    }

    /// Returns the number of in-flight firings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks whether the stack is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops all in-flight firings.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

use std::cmp::Ordering;
use std::fmt;
use std::time::Duration;

use crate::causality::ActorId;
use crate::event::{Deadline, EventId};
use crate::scheduler::ExecutionStack;
use crate::time::{self, MonotonicTime, Tag};

/// A safe event that may be started.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    /// Handle of the event in the queue.
    pub id: EventId,
    /// Destination actor.
    pub actor: ActorId,
    /// Tag of the event.
    pub tag: Tag,
    /// Topological depth of the destination.
    pub depth: usize,
    /// Absolute deadline of the event.
    pub deadline: Deadline,
    /// Execution time the firing would take.
    pub execution_time: Duration,
    /// The destination actor must fire at the physical time matching the
    /// timestamp.
    pub real_time: bool,
}

/// Which queued events are considered for processing.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CandidateScope {
    /// Only the event with the lowest tag.
    QueueHead,
    /// The event with the lowest tag of each actor.
    EarliestPerActor,
}

/// Information available to a policy when ordering candidates.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SelectionContext {
    /// Current platform time.
    pub physical_time: MonotonicTime,
    /// Earliest platform time at which a candidate that is not yet released
    /// becomes eligible, if any.
    pub next_release: Option<MonotonicTime>,
}

/// A policy ranking simultaneously safe events.
pub trait PriorityPolicy: fmt::Debug + Send + 'static {
    /// Returns the set of queued events to consider.
    fn scope(&self) -> CandidateScope {
        CandidateScope::EarliestPerActor
    }

    /// Compares two candidates, the lowest ranking first.
    fn compare(&self, a: &Candidate, b: &Candidate) -> Ordering;

    /// Returns the platform time before which a candidate is not eligible
    /// even if it is safe.
    fn release_time(&self, candidate: &Candidate) -> Option<MonotonicTime> {
        let _ = candidate;

        None
    }

    /// Orders the eligible candidates by decreasing priority, possibly
    /// leaving some out.
    fn order(&self, mut candidates: Vec<Candidate>, ctx: &SelectionContext) -> Vec<Candidate> {
        let _ = ctx;
        candidates.sort_by(|a, b| self.compare(a, b));

        candidates
    }
}

/// Tag order: only the event with the lowest tag may be processed.
#[derive(Copy, Clone, Debug, Default)]
pub struct TagOrder;

impl PriorityPolicy for TagOrder {
    fn scope(&self) -> CandidateScope {
        CandidateScope::QueueHead
    }

    fn compare(&self, a: &Candidate, b: &Candidate) -> Ordering {
        a.tag.cmp(&b.tag).then_with(|| a.depth.cmp(&b.depth))
    }
}

/// Execution-time-driven priorities.
///
/// Candidates are ranked by:
///
/// 1. zero execution time first,
/// 2. actors that must fire at real time first,
/// 3. earlier timestamp first,
/// 4. lower topological depth first.
///
/// Real-time candidates are only released once platform time reaches their
/// timestamp, and other candidates are deferred if their execution would
/// not complete before the next real-time candidate is released.
#[derive(Copy, Clone, Debug, Default)]
pub struct WcetPriority;

impl PriorityPolicy for WcetPriority {
    fn compare(&self, a: &Candidate, b: &Candidate) -> Ordering {
        let a_zero = a.execution_time.is_zero();
        let b_zero = b.execution_time.is_zero();

        b_zero
            .cmp(&a_zero)
            .then_with(|| b.real_time.cmp(&a.real_time))
            .then_with(|| a.tag.timestamp.cmp(&b.tag.timestamp))
            .then_with(|| a.depth.cmp(&b.depth))
            .then_with(|| a.tag.microstep.cmp(&b.tag.microstep))
    }

    fn release_time(&self, candidate: &Candidate) -> Option<MonotonicTime> {
        candidate.real_time.then_some(candidate.tag.timestamp)
    }

    fn order(&self, mut candidates: Vec<Candidate>, ctx: &SelectionContext) -> Vec<Candidate> {
        candidates.sort_by(|a, b| self.compare(a, b));
        candidates.retain(|c| {
            if c.real_time || c.execution_time.is_zero() {
                return true;
            }
            match ctx.next_release {
                Some(release) => time::add_duration(ctx.physical_time, c.execution_time) <= release,
                None => true,
            }
        });

        candidates
    }
}

/// Earliest-deadline-first priorities.
///
/// Candidates are ranked by absolute deadline, then by tag, then by
/// topological depth.
#[derive(Copy, Clone, Debug, Default)]
pub struct EdfPriority;

impl PriorityPolicy for EdfPriority {
    fn compare(&self, a: &Candidate, b: &Candidate) -> Ordering {
        a.deadline
            .cmp(&b.deadline)
            .then_with(|| a.tag.cmp(&b.tag))
            .then_with(|| a.depth.cmp(&b.depth))
    }
}

/// A policy deciding whether an executing firing is preempted.
pub trait PreemptionPolicy: fmt::Debug + Send + 'static {
    /// Returns the candidate that should preempt the executing firing, if
    /// any.
    ///
    /// Candidates are sorted by decreasing priority and never include events
    /// for actors already on the stack.
    fn decide_preempt(&self, stack: &ExecutionStack, candidates: &[Candidate]) -> Option<EventId>;
}

/// Firings always run to completion.
#[derive(Copy, Clone, Debug, Default)]
pub struct NeverPreempt;

impl PreemptionPolicy for NeverPreempt {
    fn decide_preempt(&self, _stack: &ExecutionStack, _candidates: &[Candidate]) -> Option<EventId> {
        None
    }
}

/// The executing firing is preempted by the best candidate if its deadline
/// is strictly earlier.
#[derive(Copy, Clone, Debug, Default)]
pub struct DeadlinePreemption;

impl PreemptionPolicy for DeadlinePreemption {
    fn decide_preempt(&self, stack: &ExecutionStack, candidates: &[Candidate]) -> Option<EventId> {
        let top = stack.top()?;

        candidates
            .first()
            .filter(|c| c.deadline < top.deadline)
            .map(|c| c.id)
    }
}

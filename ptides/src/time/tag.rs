use std::fmt;

use crate::time::MonotonicTime;

/// A superdense time tag.
///
/// Tags are totally ordered lexicographically: by timestamp first, then by
/// microstep. Several events may share a timestamp while still being causally
/// ordered through their microsteps.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tag {
    /// Model timestamp.
    pub timestamp: MonotonicTime,
    /// Index distinguishing causally ordered events sharing a timestamp.
    pub microstep: u32,
}

impl Tag {
    /// Creates a new tag.
    pub const fn new(timestamp: MonotonicTime, microstep: u32) -> Self {
        Self {
            timestamp,
            microstep,
        }
    }

    /// Creates a tag with a null microstep.
    pub const fn at(timestamp: MonotonicTime) -> Self {
        Self::new(timestamp, 0)
    }

    /// Returns the tag with the same timestamp and the next microstep.
    pub fn next_microstep(self) -> Self {
        Self::new(self.timestamp, self.microstep.saturating_add(1))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.9}, {})", self.timestamp, self.microstep)
    }
}

use std::cmp::Ordering;
use std::fmt;

/// A superdense model-time dependency between two ports.
///
/// A dependency `(t, n)` states that an event at tag `(τ, m)` on the source
/// port may cause an event at `(τ + t, n)` or later on the destination port
/// (or `(τ, m + n)` if `t` is zero).
///
/// Dependencies form a semiring where [`oplus`](Self::oplus) combines
/// alternative paths by taking the minimum and [`otimes`](Self::otimes)
/// composes successive edges of a path.
#[derive(Copy, Clone, Debug)]
pub struct SuperdenseDependency {
    time: f64,
    index: u32,
}

impl SuperdenseDependency {
    /// The absence of a dependency, which is also the identity of `⊕`.
    pub const OPLUS_IDENTITY: Self = Self {
        time: f64::INFINITY,
        index: 0,
    };

    /// A same-instant dependency, which is also the identity of `⊗`.
    pub const OTIMES_IDENTITY: Self = Self {
        time: 0.0,
        index: 0,
    };

    /// Creates a dependency.
    ///
    /// A NaN delay is interpreted as the absence of a dependency.
    pub fn new(time: f64, index: u32) -> Self {
        if time.is_nan() {
            Self::OPLUS_IDENTITY
        } else {
            Self { time, index }
        }
    }

    /// Creates a dependency with a null index.
    pub fn from_secs(time: f64) -> Self {
        Self::new(time, 0)
    }

    /// Returns the model-time delay in seconds.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Returns the microstep index.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Checks whether the delay is finite, i.e. whether a dependency exists.
    pub fn is_finite(&self) -> bool {
        self.time.is_finite()
    }

    /// Combines two alternative paths.
    pub fn oplus(self, other: Self) -> Self {
        if other < self {
            other
        } else {
            self
        }
    }

    /// Composes two successive edges of a path.
    pub fn otimes(self, other: Self) -> Self {
        if self.time == f64::INFINITY || other.time == f64::INFINITY {
            return Self::OPLUS_IDENTITY;
        }
        let time = self.time + other.time;
        let index = if other.time > 0.0 {
            other.index
        } else {
            self.index.saturating_add(other.index)
        };

        Self::new(time, index)
    }
}

impl PartialEq for SuperdenseDependency {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SuperdenseDependency {}

impl PartialOrd for SuperdenseDependency {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SuperdenseDependency {
    fn cmp(&self, other: &Self) -> Ordering {
        // Zero must compare equal regardless of its sign.
        let time = if self.time == other.time {
            Ordering::Equal
        } else {
            self.time.total_cmp(&other.time)
        };

        time.then_with(|| self.index.cmp(&other.index))
    }
}

impl fmt::Display for SuperdenseDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.time, self.index)
    }
}

//! Model time, oracle time and drifting local clocks.
//!
//! This module provides most notably:
//!
//! * [`MonotonicTime`]: a monotonic timestamp based on the [TAI] time standard,
//!   used for model time, oracle time and local physical time alike,
//! * [`Tag`]: a superdense `(timestamp, microstep)` pair totally ordering
//!   events,
//! * [`RealTimeClock`]: a drifting local clock mapping oracle time to local
//!   physical time.
//!
//! Durations annotated on actors and ports (execution times, device delays)
//! use [`std::time::Duration`] while delay offsets, which may be negative or
//! infinite, are plain `f64` seconds. The free functions of this module
//! perform the required saturating conversions.
//!
//! [TAI]: https://en.wikipedia.org/wiki/International_Atomic_Time
//!
//!
//! # Examples
//!
//! A platform clock running 1% fast from an oracle time of 10s:
//!
//! ```
//! use ptides::time::{self, ClockKind, RealTimeClock};
//!
//! let t0 = time::from_secs_f64(10.0);
//! let clock = RealTimeClock::new(ClockKind::Platform, t0, t0, 1.01).unwrap();
//!
//! let local = clock.current_local_time(time::from_secs_f64(20.0));
//! assert_eq!(local, time::from_secs_f64(20.1));
//! ```

mod clock;
mod tag;

use std::time::Duration;

pub use tai_time::MonotonicTime;

pub use clock::{ClockError, ClockKind, RealTimeClock, Reprojection, WakeupStatus};
pub use tag::Tag;

pub(crate) const NANOS_PER_SEC: i128 = 1_000_000_000;

/// Converts a timestamp to a signed nanosecond count since the epoch.
pub(crate) fn to_nanos(time: MonotonicTime) -> i128 {
    time.as_secs() as i128 * NANOS_PER_SEC + time.subsec_nanos() as i128
}

/// Converts a signed nanosecond count since the epoch to a timestamp,
/// saturating at the representable bounds.
pub(crate) fn from_nanos(nanos: i128) -> MonotonicTime {
    let secs = nanos
        .div_euclid(NANOS_PER_SEC)
        .clamp(i64::MIN as i128, i64::MAX as i128) as i64;
    let subsec_nanos = nanos.rem_euclid(NANOS_PER_SEC) as u32;

    // The sub-second part is always in range.
    MonotonicTime::new(secs, subsec_nanos).unwrap_or(MonotonicTime::EPOCH)
}

/// Converts a floating-point second count to nanoseconds, rounding to the
/// nearest nanosecond and saturating infinities.
pub(crate) fn secs_to_nanos(secs: f64) -> i128 {
    if secs.is_nan() {
        0
    } else if secs >= i64::MAX as f64 {
        i64::MAX as i128 * NANOS_PER_SEC
    } else if secs <= i64::MIN as f64 {
        i64::MIN as i128 * NANOS_PER_SEC
    } else {
        (secs * 1e9).round() as i128
    }
}

/// Returns the timestamp lying the specified number of seconds after the
/// epoch.
///
/// Infinite values saturate at the representable bounds.
pub fn from_secs_f64(secs: f64) -> MonotonicTime {
    from_nanos(secs_to_nanos(secs))
}

/// Returns the number of seconds elapsed since the epoch.
pub fn as_secs_f64(time: MonotonicTime) -> f64 {
    to_nanos(time) as f64 / 1e9
}

/// Shifts a timestamp by a signed number of seconds, saturating at the
/// representable bounds.
pub fn offset_secs(time: MonotonicTime, secs: f64) -> MonotonicTime {
    from_nanos(to_nanos(time).saturating_add(secs_to_nanos(secs)))
}

/// Returns `later - earlier` in seconds, which may be negative.
pub fn secs_between(later: MonotonicTime, earlier: MonotonicTime) -> f64 {
    (to_nanos(later) - to_nanos(earlier)) as f64 / 1e9
}

/// Adds a duration to a timestamp, saturating at the upper bound.
pub(crate) fn add_duration(time: MonotonicTime, duration: Duration) -> MonotonicTime {
    from_nanos(to_nanos(time).saturating_add(duration.as_nanos() as i128))
}

/// Subtracts a duration from a timestamp, saturating at the lower bound.
pub(crate) fn sub_duration(time: MonotonicTime, duration: Duration) -> MonotonicTime {
    from_nanos(to_nanos(time).saturating_sub(duration.as_nanos() as i128))
}

/// Returns the duration from `earlier` to `later`, or `None` if `later` lies
/// before `earlier`.
pub(crate) fn checked_duration_between(
    later: MonotonicTime,
    earlier: MonotonicTime,
) -> Option<Duration> {
    let nanos = to_nanos(later) - to_nanos(earlier);
    if nanos < 0 {
        return None;
    }
    let nanos = u64::try_from(nanos).unwrap_or(u64::MAX);

    Some(Duration::from_nanos(nanos))
}

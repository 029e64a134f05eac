//! Support for structured logging.
//!
//! # Overview
//!
//! Platforms emit their diagnostics with the `tracing` macros. All events
//! emitted while a platform reacts to a stimulus are wrapped in a
//! [`tracing::Span`] with the following metadata:
//!
//! - name: `platform`,
//! - target: `ptides`,
//! - verbosity level: [`Level::INFO`](tracing::Level::INFO),
//! - a unique field called `name`, associated to the platform name provided
//!   in [`PlatformBuilder::new`](crate::platform::PlatformBuilder::new).
//!
//! Fatal execution errors are logged at the `error` level, recoverable
//! anomalies such as ignored deadline misses or discarded stale tokens at the
//! `warn` level, and scheduling decisions at the `debug` and `trace` levels.
//!
//!
//! # Oracle time stamping
//!
//! While a [`Simulation`](crate::simulation::Simulation) is stepping, the
//! current oracle time can be read with [`current_oracle_time`]. With the
//! `tracing-timer` feature, the [`OracleTime`] timer uses it to stamp events
//! with oracle time rather than wall clock time:
//!
//! ```ignore
//! use ptides::logging::OracleTime;
//!
//! tracing_subscriber::fmt()
//!     .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
//!     .with_timer(OracleTime::with_system_timer())
//!     .init();
//! ```
//!
//! Events emitted outside a simulation step fall back to the system timer:
//!
//! ```text
//! [1970-01-01 00:00:10.600000000] ERROR platform{name="controller"}: ptides::platform: platform execution failed error=deadline missed by 'actuator': required at 1970-01-01 00:00:09.950000000, happened at 1970-01-01 00:00:10.600000000
//! 2026-10-17T09:12:45.130912Z  INFO my_simulation: simulation halted
//! ```
//!
//! The following `RUST_LOG` directive only lets warnings and errors through
//! for a platform named `controller`:
//!
//! ```text
//! $ RUST_LOG="[platform{name=controller}]=warn" cargo run --release my_simulation
//! ```

use std::cell::Cell;

use crate::time::MonotonicTime;

thread_local! {
    static ORACLE_TIME: Cell<Option<MonotonicTime>> = const { Cell::new(None) };
}

/// Returns the oracle time of the simulation step in progress on this
/// thread, if any.
pub fn current_oracle_time() -> Option<MonotonicTime> {
    ORACLE_TIME.with(Cell::get)
}

/// Publishes the oracle time for the lifetime of the guard.
///
/// The previous value is restored when the guard is dropped so that nested
/// simulations stamp their events consistently.
#[derive(Debug)]
pub(crate) struct OracleTimeGuard {
    previous: Option<MonotonicTime>,
}

impl OracleTimeGuard {
    pub(crate) fn enter(time: MonotonicTime) -> Self {
        Self {
            previous: ORACLE_TIME.with(|t| t.replace(Some(time))),
        }
    }

    pub(crate) fn set(&self, time: MonotonicTime) {
        ORACLE_TIME.with(|t| t.set(Some(time)));
    }
}

impl Drop for OracleTimeGuard {
    fn drop(&mut self) {
        ORACLE_TIME.with(|t| t.set(self.previous));
    }
}

#[cfg(feature = "tracing-timer")]
pub use timer::OracleTime;

#[cfg(feature = "tracing-timer")]
mod timer {
    use std::fmt;

    use tracing_subscriber::fmt::format::Writer;
    use tracing_subscriber::fmt::time::{FormatTime, SystemTime};

    use super::current_oracle_time;

    /// A timer that can be used in conjunction with the
    /// [`tracing-subscriber`][tracing_subscriber] crate to log events using
    /// oracle time instead of (or on top of) the wall clock time.
    ///
    /// See the [module-level documentation][crate::logging] for more
    /// details.
    #[derive(Default, Debug)]
    pub struct OracleTime<const VERBOSE: bool, T> {
        sys_timer: T,
    }

    impl OracleTime<false, SystemTime> {
        /// Constructs a new oracle timer which falls back to the
        /// [`SystemTime`] timer outside simulation steps.
        pub fn with_system_timer() -> Self {
            Self::default()
        }
    }

    impl OracleTime<true, SystemTime> {
        /// Constructs a new oracle timer which prepends a [`SystemTime`]
        /// timestamp to all events, as well as an oracle timestamp within
        /// simulation steps.
        pub fn with_system_timer_always() -> Self {
            Self::default()
        }
    }

    impl<T: FormatTime> OracleTime<false, T> {
        /// Constructs a new oracle timer which falls back to the provided
        /// timer outside simulation steps.
        pub fn with_custom_timer(sys_timer: T) -> Self {
            Self { sys_timer }
        }
    }

    impl<const VERBOSE: bool, T: FormatTime> FormatTime for OracleTime<VERBOSE, T> {
        fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
            match current_oracle_time() {
                Some(time) => {
                    if VERBOSE {
                        self.sys_timer.format_time(w)?;
                        w.write_char(' ')?;
                    }
                    write!(w, "[{:.9}]", time)
                }
                None => self.sys_timer.format_time(w),
            }
        }
    }
}

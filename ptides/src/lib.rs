//! A deterministic Ptides execution kernel for the simulation of distributed
//! real-time systems.
//!
//! Ptides (Programming Temporally Integrated Distributed Embedded Systems)
//! decouples the *model time* carried by events from the *physical time* of
//! the platforms that process them. Each platform processes events in
//! timestamp order without waiting on a global clock: an event is only
//! processed once it is *safe to process*, i.e. once the platform clock has
//! advanced far enough that no event with an earlier timestamp can still
//! arrive from a sensor, from the network or from an upstream actor.
//!
//! This crate simulates such platforms: their actors, their drifting platform
//! and execution clocks, their scheduling policies with the execution time
//! of each firing, and the real-time constraints at their sensors and
//! actuators.
//!
//!
//! # A practical overview
//!
//! Simulating a Ptides system typically involves three distinct activities:
//!
//! 1. the design of actors, which implement the [`Actor`](actor::Actor)
//!    trait and react to the tokens available on their input ports at the
//!    current tag,
//! 2. the assembly of each platform with a
//!    [`PlatformBuilder`](platform::PlatformBuilder), which connects actors to
//!    each other and to the platform sensors, actuators and network ports,
//! 3. the execution of the simulation with a
//!    [`Simulation`](simulation::Simulation), which plays the role of the
//!    oracle: it owns true time, delivers sensor readings and network tokens,
//!    and wakes platforms up when they requested it.
//!
//! ## Static analysis
//!
//! When a platform is built, the delay offset of every actor input is
//! computed from the model-time dependencies declared by the actors and the
//! real-time bounds of the platform inputs (see [`causality`]). A cycle
//! along which no model time elapses is rejected at this stage.
//!
//! ## Scheduling
//!
//! Safe events are started according to a
//! [`PriorityPolicy`](scheduler::PriorityPolicy): tag order, execution-time
//! driven priorities or earliest deadline first. A firing with a non-zero
//! execution time occupies the platform until its completion, unless a
//! [`PreemptionPolicy`](scheduler::PreemptionPolicy) lets a more urgent event
//! preempt it.
//!
//! ## Errors
//!
//! Timing violations are fatal: a missed actuation deadline, an event
//! processed after a later event on the same port or a firing requested in
//! the past all halt the simulation with an
//! [`ExecutionError`](platform::ExecutionError).
//!
//!
//! # Example
//!
//! A platform doubling sensor readings and sending them to an actuator:
//!
//! ```
//! use ptides::actor::{Actor, ActorError, FiringContext, PortSpec, PortTimingProfile};
//! use ptides::platform::PlatformBuilder;
//! use ptides::simulation::SimInit;
//! use ptides::time::{self, MonotonicTime};
//! use ptides::token::Token;
//!
//! struct Doubler;
//!
//! impl Actor for Doubler {
//!     fn input_ports(&self) -> Vec<PortSpec> {
//!         vec![PortSpec::new("in")]
//!     }
//!     fn output_ports(&self) -> Vec<PortSpec> {
//!         vec![PortSpec::new("out")]
//!     }
//!     fn fire(&mut self, ctx: &mut FiringContext<'_>) -> Result<(), ActorError> {
//!         let value = ctx
//!             .get("in", 0)?
//!             .downcast::<u32>()
//!             .map_err(|_| ActorError::new("expected an integer"))?;
//!
//!         ctx.send("out", 0, Token::new(2 * value))
//!     }
//! }
//!
//! let platform = PlatformBuilder::new("node")
//!     .add_sensor("sensor", PortTimingProfile::default())
//!     .add_actor("doubler", Doubler)
//!     .add_actuator("actuator", PortTimingProfile::default())
//!     .connect("sensor", "doubler.in")
//!     .connect("doubler.out", "actuator")
//!     .build()?;
//!
//! let mut simu = SimInit::new()
//!     .add_platform(platform)
//!     .init(MonotonicTime::EPOCH)?;
//!
//! let t = time::from_secs_f64(1.0);
//! simu.schedule_sensor_reading("node", "sensor", Token::new(21u32), t)?;
//! simu.step()?;
//!
//! let outputs = simu.drain_outputs("node")?;
//! assert_eq!(outputs.len(), 1);
//! assert_eq!(outputs[0].token.downcast_ref::<u32>(), Some(&42));
//! assert_eq!(outputs[0].emitted_at, t);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//!
//! # Feature flags
//!
//! * `tracing-timer`: provides the `OracleTime` timer of [`logging`] which stamps
//!   `tracing` events with oracle time. This feature pulls the
//!   `tracing-subscriber` crate.
#![warn(missing_docs, missing_debug_implementations, unreachable_pub)]

pub mod actor;
pub mod boundary;
pub mod causality;
pub mod event;
pub mod logging;
pub mod platform;
pub mod receiver;
pub mod scheduler;
pub mod simulation;
pub mod time;
pub mod token;
pub(crate) mod util;

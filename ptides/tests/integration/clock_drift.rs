//! Drifting platform and execution clocks.

use std::time::Duration;

use ptides::actor::{Actor, ActorError, ActorTimingProfile, FiringContext, PortSpec, PortTimingProfile};
use ptides::platform::PlatformBuilder;
use ptides::simulation::{SimInit, Simulation, SimulationError};
use ptides::time::{from_secs_f64, ClockError, ClockKind, MonotonicTime, Tag};
use ptides::token::Token;

struct Relay {
    execution_time: Duration,
}

impl Actor for Relay {
    fn input_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new("in")]
    }
    fn output_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new("out")]
    }
    fn timing(&self) -> ActorTimingProfile {
        ActorTimingProfile::default().with_execution_time(self.execution_time)
    }
    fn fire(&mut self, ctx: &mut FiringContext<'_>) -> Result<(), ActorError> {
        let token = ctx.get("in", 0)?;
        ctx.send("out", 0, token)
    }
}

/// A sensor with a 1s device delay relayed to a network output.
fn sensor_bench(builder: impl FnOnce(PlatformBuilder) -> PlatformBuilder, execution_time: f64) -> Simulation {
    let platform = builder(PlatformBuilder::new("node"))
        .add_sensor(
            "sensor",
            PortTimingProfile::default().with_device_delay(Duration::from_secs(1)),
        )
        .add_actor(
            "relay",
            Relay {
                execution_time: Duration::from_secs_f64(execution_time),
            },
        )
        .add_network_output("tx", PortTimingProfile::default())
        .connect("sensor", "relay.in")
        .connect("relay.out", "tx")
        .build()
        .unwrap();

    SimInit::new()
        .add_platform(platform)
        .init(MonotonicTime::EPOCH)
        .unwrap()
}

#[test]
fn drift_update_reprojects_held_sensor_token() {
    let mut simu = sensor_bench(|b| b, 0.0);

    simu.schedule_sensor_reading("node", "sensor", Token::new(7u32), from_secs_f64(1.0))
        .unwrap();
    simu.schedule_drift("node", ClockKind::Platform, 2.0, from_secs_f64(1.5))
        .unwrap();
    simu.step_until(from_secs_f64(3.0)).unwrap();

    // Local time reaches the 2.0 release time at oracle time 1.75.
    let outputs = simu.drain_outputs("node").unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].tag, Tag::at(from_secs_f64(1.0)));
    assert_eq!(outputs[0].emitted_at, from_secs_f64(2.0));
    assert_eq!(outputs[0].source_timestamp, Some(from_secs_f64(1.0)));

    // The wake-up originally requested at oracle time 2.0 was dropped.
    let stats = simu.platform("node").unwrap().stats();
    assert_eq!(stats.firings, 1);
    assert_eq!(stats.ignored_wakeups, 1);
}

#[test]
fn frozen_execution_clock_defers_completion() {
    let mut simu = sensor_bench(|b| b.set_execution_clock(0.0), 0.5);

    simu.schedule_sensor_reading("node", "sensor", Token::new(7u32), from_secs_f64(0.0))
        .unwrap();
    simu.step_until(from_secs_f64(2.0)).unwrap();

    // The firing started at 1.0 but cannot complete while the execution
    // clock is frozen.
    let platform = simu.platform("node").unwrap();
    assert_eq!(platform.execution_stack().len(), 1);
    assert!(simu.drain_outputs("node").unwrap().is_empty());

    simu.update_drift("node", ClockKind::Execution, 1.0).unwrap();
    simu.step_until(from_secs_f64(3.0)).unwrap();

    let outputs = simu.drain_outputs("node").unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].emitted_at, from_secs_f64(2.5));
    assert!(simu.platform("node").unwrap().execution_stack().is_empty());
}

#[test]
fn fast_platform_clock_releases_early() {
    let mut simu = sensor_bench(|b| b.set_platform_clock(2.0), 0.0);

    simu.schedule_sensor_reading("node", "sensor", Token::new(7u32), from_secs_f64(1.0))
        .unwrap();
    simu.step_until(from_secs_f64(2.0)).unwrap();

    // Sensing and release times are local times: the reading is stamped 1.0
    // but delivered at oracle time 1.0 where the local time is already 2.0.
    let outputs = simu.drain_outputs("node").unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].emitted_at, from_secs_f64(2.0));
    assert_eq!(simu.time(), from_secs_f64(2.0));
}

#[test]
fn rejected_drift_update_keeps_simulation_running() {
    let mut simu = sensor_bench(|b| b, 0.0);

    simu.schedule_sensor_reading("node", "sensor", Token::new(7u32), from_secs_f64(1.0))
        .unwrap();

    let err = simu
        .update_drift("node", ClockKind::Platform, -1.0)
        .unwrap_err();
    assert!(matches!(
        err,
        SimulationError::ClockRejected {
            ref platform,
            error: ClockError::DriftNegative { .. },
        } if platform == "node"
    ));
    assert!(!simu.is_halted());
    assert_eq!(simu.platform("node").unwrap().platform_clock().drift(), 1.0);

    // A rejected scheduled update interrupts the step but not the run.
    simu.schedule_drift("node", ClockKind::Execution, 0.0, from_secs_f64(1.5))
        .unwrap();
    assert!(matches!(
        simu.step_until(from_secs_f64(3.0)),
        Err(SimulationError::ClockRejected { .. })
    ));
    assert_eq!(simu.time(), from_secs_f64(1.5));
    assert!(!simu.is_halted());

    simu.step_until(from_secs_f64(3.0)).unwrap();
    let outputs = simu.drain_outputs("node").unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].emitted_at, from_secs_f64(2.0));
    assert_eq!(simu.platform("node").unwrap().execution_clock().drift(), 1.0);
}

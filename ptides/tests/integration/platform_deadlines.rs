//! Real-time constraints at sensors and actuators.

use std::time::Duration;

use ptides::actor::{Actor, ActorError, ActorTimingProfile, FiringContext, PortSpec, PortTimingProfile};
use ptides::platform::{ExecutionError, PlatformBuilder};
use ptides::simulation::{SimInit, Simulation, SimulationError};
use ptides::time::{from_secs_f64, MonotonicTime, Tag};
use ptides::token::Token;

// Forwards all tokens available at the current tag.
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
        while let Ok(token) = ctx.get("in", 0) {
            ctx.send("out", 0, token)?;
        }
        Ok(())
    }
}

// Emits a counter at each full second until it reaches its limit.
struct Ticker {
    count: u32,
    limit: u32,
}

impl Actor for Ticker {
    fn output_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new("out")]
    }
    fn initialize(&mut self, ctx: &mut FiringContext<'_>) -> Result<(), ActorError> {
        ctx.fire_at(from_secs_f64(1.0));
        Ok(())
    }
    fn fire(&mut self, ctx: &mut FiringContext<'_>) -> Result<(), ActorError> {
        self.count += 1;
        ctx.send("out", 0, Token::new(self.count))?;
        if self.count < self.limit {
            ctx.fire_at(from_secs_f64(f64::from(self.count + 1)));
        }
        Ok(())
    }
}

/// A sensor feeding an actuator through a relay with a 500ms execution
/// time.
fn control_loop_bench(actuator: PortTimingProfile) -> Simulation {
    let platform = PlatformBuilder::new("controller")
        .add_sensor(
            "sensor",
            PortTimingProfile::default().with_device_delay(Duration::from_millis(100)),
        )
        .add_actor(
            "control",
            Relay {
                execution_time: Duration::from_millis(500),
            },
        )
        .add_actuator("actuator", actuator)
        .connect("sensor", "control.in")
        .connect("control.out", "actuator")
        .build()
        .unwrap();

    SimInit::new()
        .add_platform(platform)
        .init(MonotonicTime::EPOCH)
        .unwrap()
}

#[test]
fn actuation_after_deadline_halts_simulation() {
    let actuator = PortTimingProfile::default().with_device_delay(Duration::from_millis(50));
    let mut simu = control_loop_bench(actuator);

    simu.schedule_sensor_reading("controller", "sensor", Token::new(1.5f64), from_secs_f64(10.0))
        .unwrap();

    // The reading is released at 10.1, the firing completes at 10.6 while the
    // actuation had to start at 10.0 - 0.05.
    let err = simu.step_until(from_secs_f64(11.0)).unwrap_err();
    match err {
        SimulationError::Execution {
            platform,
            error:
                ExecutionError::DeadlineMiss {
                    actor,
                    required,
                    actual,
                },
        } => {
            assert_eq!(platform, "controller");
            assert_eq!(actor, "actuator");
            assert_eq!(required, from_secs_f64(9.95));
            assert_eq!(actual, from_secs_f64(10.6));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(simu.time(), from_secs_f64(10.6));
    assert!(simu.is_halted());
    assert!(matches!(simu.step(), Err(SimulationError::Halted)));
}

#[test]
fn ignored_actuation_deadline_emits_late() {
    let actuator = PortTimingProfile::default()
        .with_device_delay(Duration::from_millis(50))
        .with_ignore_deadline(true);
    let mut simu = control_loop_bench(actuator);

    simu.schedule_sensor_reading("controller", "sensor", Token::new(1.5f64), from_secs_f64(10.0))
        .unwrap();
    simu.step_until(from_secs_f64(11.0)).unwrap();

    let outputs = simu.drain_outputs("controller").unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].port, "actuator");
    assert_eq!(outputs[0].tag, Tag::at(from_secs_f64(10.0)));
    assert_eq!(outputs[0].emitted_at, from_secs_f64(10.6));
    assert_eq!(outputs[0].token.downcast_ref::<f64>(), Some(&1.5));
    // The reading entered the boundary at 10.0, before its device delay.
    assert_eq!(outputs[0].source_timestamp, Some(from_secs_f64(10.0)));

    let stats = simu.platform("controller").unwrap().stats();
    assert_eq!(stats.deadline_misses_ignored, 1);
    assert_eq!(stats.firings, 1);
}

#[test]
fn actuator_holds_early_outputs() {
    let platform = PlatformBuilder::new("clock")
        .add_actor("ticker", Ticker { count: 0, limit: 3 })
        .add_actuator("display", PortTimingProfile::default())
        .connect("ticker.out", "display")
        .build()
        .unwrap();
    let mut simu = SimInit::new()
        .add_platform(platform)
        .init(MonotonicTime::EPOCH)
        .unwrap();

    // Pure events are processed ahead of physical time.
    let platform = simu.platform("clock").unwrap();
    assert_eq!(platform.stats().firings, 3);
    assert_eq!(platform.held_boundary_tokens(), 3);

    simu.step_until(from_secs_f64(5.0)).unwrap();

    let outputs = simu.drain_outputs("clock").unwrap();
    let emitted: Vec<_> = outputs
        .iter()
        .map(|o| (*o.token.downcast_ref::<u32>().unwrap(), o.emitted_at))
        .collect();
    assert_eq!(
        emitted,
        vec![
            (1, from_secs_f64(1.0)),
            (2, from_secs_f64(2.0)),
            (3, from_secs_f64(3.0)),
        ]
    );
    // Outputs of pure events do not originate from a platform input.
    assert!(outputs.iter().all(|o| o.source_timestamp.is_none()));
    assert_eq!(simu.platform("clock").unwrap().held_boundary_tokens(), 0);
}

#[test]
fn late_sensor_reading_is_a_deadline_miss() {
    let platform = PlatformBuilder::new("node")
        .add_sensor(
            "sensor",
            PortTimingProfile::default().with_device_delay(Duration::from_millis(100)),
        )
        .add_actor("relay", Relay { execution_time: Duration::ZERO })
        .add_network_output("tx", PortTimingProfile::default())
        .connect("sensor", "relay.in")
        .connect("relay.out", "tx")
        .build()
        .unwrap();
    let mut simu = SimInit::new()
        .add_platform(platform)
        .init(from_secs_f64(2.0))
        .unwrap();

    // A reading sensed at 1.0 had to enter the platform by 1.1.
    simu.schedule_input("node", "sensor", 0, Token::new(0u8), Tag::at(from_secs_f64(1.0)), from_secs_f64(2.0))
        .unwrap();
    let err = simu.step().unwrap_err();

    assert!(matches!(
        err,
        SimulationError::Execution {
            error: ExecutionError::DeadlineMiss { ref actor, .. },
            ..
        } if actor == "sensor"
    ));
}

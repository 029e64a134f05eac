//! Network links between platforms.

use std::time::Duration;

use ptides::actor::{Actor, ActorError, FiringContext, PortSpec, PortTimingProfile};
use ptides::platform::{ExecutionError, Platform, PlatformBuilder};
use ptides::simulation::{SimInit, SimulationError};
use ptides::time::{from_secs_f64, MonotonicTime, Tag};
use ptides::token::Token;

struct Relay;

impl Actor for Relay {
    fn input_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new("in")]
    }
    fn output_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new("out")]
    }
    fn fire(&mut self, ctx: &mut FiringContext<'_>) -> Result<(), ActorError> {
        let token = ctx.get("in", 0)?;
        ctx.send("out", 0, token)
    }
}

fn relay_platform(name: &str, input: (&str, PortTimingProfile), sensor: bool) -> Platform {
    let builder = PlatformBuilder::new(name);
    let builder = if sensor {
        builder.add_sensor(input.0, input.1)
    } else {
        builder.add_network_input(input.0, input.1)
    };

    builder
        .add_actor("relay", Relay)
        .add_network_output("tx", PortTimingProfile::default())
        .connect(input.0, "relay.in")
        .connect("relay.out", "tx")
        .build()
        .unwrap()
}

#[test]
fn linked_platforms_forward_tokens() {
    let a = relay_platform("a", ("sensor", PortTimingProfile::default()), true);
    let b = relay_platform(
        "b",
        (
            "rx",
            PortTimingProfile::default().with_network_delay_bound(Duration::from_millis(200)),
        ),
        false,
    );

    let mut simu = SimInit::new()
        .add_platform(a)
        .add_platform(b)
        .link_with_latency("a", "tx", "b", "rx", Duration::from_millis(100))
        .init(MonotonicTime::EPOCH)
        .unwrap();

    simu.schedule_sensor_reading("a", "sensor", Token::new("ping"), from_secs_f64(1.0))
        .unwrap();

    // The token reaches `b` at 1.1 but is only safe at 1.0 + 0.2.
    simu.step_until(from_secs_f64(1.1)).unwrap();
    let b = simu.platform("b").unwrap();
    assert_eq!(b.queued_events(), 1);
    assert_eq!(b.stats().firings, 0);

    simu.step_until(from_secs_f64(2.0)).unwrap();
    assert!(simu.drain_outputs("a").unwrap().is_empty());

    let outputs = simu.drain_outputs("b").unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].port, "tx");
    assert_eq!(outputs[0].tag, Tag::at(from_secs_f64(1.0)));
    assert_eq!(outputs[0].emitted_at, from_secs_f64(1.2));
    assert_eq!(outputs[0].token.downcast_ref::<&str>(), Some(&"ping"));

    // The source timestamp is the reception time on `b`, not the sensing
    // time on `a`.
    assert_eq!(outputs[0].source_timestamp, Some(from_secs_f64(1.1)));
}

#[test]
fn late_network_token_is_out_of_order() {
    let platform = relay_platform("node", ("rx", PortTimingProfile::default()), false);
    let mut simu = SimInit::new()
        .add_platform(platform)
        .init(MonotonicTime::EPOCH)
        .unwrap();

    simu.schedule_input("node", "rx", 0, Token::new(1u32), Tag::at(from_secs_f64(2.0)), from_secs_f64(2.0))
        .unwrap();
    simu.schedule_input("node", "rx", 0, Token::new(2u32), Tag::at(from_secs_f64(1.5)), from_secs_f64(2.5))
        .unwrap();

    simu.step().unwrap();
    assert_eq!(simu.drain_outputs("node").unwrap().len(), 1);

    let err = simu.step().unwrap_err();
    match err {
        SimulationError::Execution {
            error: ExecutionError::OutOfOrderViolation { port, tag, last },
            ..
        } => {
            assert_eq!(port, "relay.in");
            assert_eq!(tag, Tag::at(from_secs_f64(1.5)));
            assert_eq!(last, Tag::at(from_secs_f64(2.0)));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn simulation_rejects_invalid_links() {
    let err = SimInit::new()
        .add_platform(relay_platform("a", ("rx", PortTimingProfile::default()), false))
        .link("a", "tx", "b", "rx")
        .init(MonotonicTime::EPOCH)
        .unwrap_err();
    assert!(matches!(err, SimulationError::UnknownPlatform { ref name } if name == "b"));

    // Links go from outputs to inputs.
    let err = SimInit::new()
        .add_platform(relay_platform("a", ("rx", PortTimingProfile::default()), false))
        .add_platform(relay_platform("b", ("rx", PortTimingProfile::default()), false))
        .link("a", "rx", "b", "rx")
        .init(MonotonicTime::EPOCH)
        .unwrap_err();
    assert!(matches!(err, SimulationError::UnknownPort { ref port, .. } if port == "rx"));

    let err = SimInit::new()
        .add_platform(relay_platform("a", ("rx", PortTimingProfile::default()), false))
        .add_platform(relay_platform("a", ("rx", PortTimingProfile::default()), false))
        .init(MonotonicTime::EPOCH)
        .unwrap_err();
    assert!(matches!(err, SimulationError::DuplicatePlatform { .. }));
}

#[test]
fn simulation_validates_scheduled_inputs() {
    let platform = relay_platform("node", ("rx", PortTimingProfile::default()), false);
    let mut simu = SimInit::new()
        .add_platform(platform)
        .init(from_secs_f64(1.0))
        .unwrap();
    let tag = Tag::at(from_secs_f64(1.0));

    assert!(matches!(
        simu.schedule_input("node", "tx", 0, Token::new(()), tag, from_secs_f64(1.0)),
        Err(SimulationError::UnknownPort { .. })
    ));
    assert!(matches!(
        simu.schedule_input("node", "rx", 0, Token::new(()), tag, from_secs_f64(0.5)),
        Err(SimulationError::InvalidScheduledTime)
    ));
    assert!(matches!(
        simu.step_until(from_secs_f64(1.0)),
        Err(SimulationError::InvalidScheduledTime)
    ));

    // An unknown channel is only detected on delivery.
    simu.schedule_input("node", "rx", 1, Token::new(()), tag, from_secs_f64(1.0))
        .unwrap();
    assert!(matches!(
        simu.step(),
        Err(SimulationError::Execution {
            error: ExecutionError::UnknownPort { .. },
            ..
        })
    ));
}

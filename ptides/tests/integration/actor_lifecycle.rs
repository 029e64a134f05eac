//! Actor firing, refiring and termination.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ptides::actor::{Actor, ActorError, ActorTimingProfile, FiringContext, PortSpec, PortTimingProfile};
use ptides::causality::CausalityError;
use ptides::platform::{ExecutionError, PlatformBuilder};
use ptides::scheduler::WcetPriority;
use ptides::simulation::{SimInit, Simulation, SimulationError};
use ptides::time::{from_secs_f64, MonotonicTime, Tag};
use ptides::token::Token;

// Consumes a single token per firing and forwards it.
struct OneAtATime;

impl Actor for OneAtATime {
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

// Forwards a limited number of firings, then asks to be disabled.
struct Limited {
    remaining: usize,
}

impl Actor for Limited {
    fn input_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new("in")]
    }
    fn output_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new("out")]
    }
    fn fire(&mut self, ctx: &mut FiringContext<'_>) -> Result<(), ActorError> {
        let token = ctx.get("in", 0)?;
        self.remaining -= 1;
        ctx.send("out", 0, token)
    }
    fn postfire(&mut self, _ctx: &FiringContext<'_>) -> bool {
        self.remaining > 0
    }
}

// Rejects odd values.
struct Picky;

impl Actor for Picky {
    fn input_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new("in")]
    }
    fn fire(&mut self, ctx: &mut FiringContext<'_>) -> Result<(), ActorError> {
        let value = ctx
            .get("in", 0)?
            .downcast::<u32>()
            .map_err(|_| ActorError::new("not an integer"))?;
        if value % 2 == 1 {
            return Err(ActorError::new(format!("odd value {}", value)));
        }
        Ok(())
    }
}

// Skips firings when its input is missing and counts the skipped ones.
struct Guarded {
    skipped: Arc<AtomicUsize>,
}

impl Actor for Guarded {
    fn input_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new("in")]
    }
    fn initialize(&mut self, ctx: &mut FiringContext<'_>) -> Result<(), ActorError> {
        ctx.fire_at(ctx.time());
        Ok(())
    }
    fn prefire(&mut self, ctx: &FiringContext<'_>) -> bool {
        let ready = ctx.has_token("in", 0);
        if !ready {
            self.skipped.fetch_add(1, Ordering::Relaxed);
        }
        ready
    }
    fn fire(&mut self, ctx: &mut FiringContext<'_>) -> Result<(), ActorError> {
        ctx.get("in", 0)?;
        Ok(())
    }
}

// Real-time actor requesting a firing at 1s and forwarding any token
// available when it fires.
struct Pulse {
    firings: Arc<AtomicUsize>,
}

impl Actor for Pulse {
    fn input_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new("in")]
    }
    fn output_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new("out")]
    }
    fn timing(&self) -> ActorTimingProfile {
        ActorTimingProfile::default().with_sensor(true)
    }
    fn initialize(&mut self, ctx: &mut FiringContext<'_>) -> Result<(), ActorError> {
        ctx.fire_at(from_secs_f64(1.0));
        Ok(())
    }
    fn fire(&mut self, ctx: &mut FiringContext<'_>) -> Result<(), ActorError> {
        self.firings.fetch_add(1, Ordering::Relaxed);
        if ctx.has_token("in", 0) {
            let token = ctx.get("in", 0)?;
            ctx.send("out", 0, token)?;
        }
        Ok(())
    }
}

fn network_bench(name: &str, actor: impl Actor, overhead: Duration) -> Simulation {
    let platform = PlatformBuilder::new("node")
        .set_scheduler_overhead(overhead)
        .add_network_input("rx", PortTimingProfile::default())
        .add_actor(name, actor)
        .add_network_output("tx", PortTimingProfile::default())
        .connect("rx", &format!("{}.in", name))
        .connect(&format!("{}.out", name), "tx")
        .build()
        .unwrap();

    SimInit::new()
        .add_platform(platform)
        .init(MonotonicTime::EPOCH)
        .unwrap()
}

#[test]
fn same_tag_tokens_trigger_refiring() {
    let mut simu = network_bench("relay", OneAtATime, Duration::from_millis(10));

    // Both tokens are queued while the scheduler runs and processed together.
    let (t, tag) = (from_secs_f64(1.0), Tag::at(from_secs_f64(1.0)));
    simu.schedule_input("node", "rx", 0, Token::new(1u32), tag, t).unwrap();
    simu.schedule_input("node", "rx", 0, Token::new(2u32), tag, t).unwrap();
    simu.step_until(from_secs_f64(2.0)).unwrap();

    let outputs = simu.drain_outputs("node").unwrap();
    let values: Vec<_> = outputs
        .iter()
        .map(|o| *o.token.downcast_ref::<u32>().unwrap())
        .collect();
    assert_eq!(values, vec![1, 2]);
    assert!(outputs.iter().all(|o| o.emitted_at == from_secs_f64(1.01)));
    assert_eq!(simu.platform("node").unwrap().stats().firings, 2);
}

#[test]
fn pure_and_triggered_events_share_one_firing() {
    let firings = Arc::new(AtomicUsize::new(0));
    let platform = PlatformBuilder::new("node")
        .set_priority_policy(WcetPriority)
        .add_network_input("rx", PortTimingProfile::default())
        .add_actor(
            "pulse",
            Pulse {
                firings: firings.clone(),
            },
        )
        .add_network_output("tx", PortTimingProfile::default())
        .connect("rx", "pulse.in")
        .connect("pulse.out", "tx")
        .build()
        .unwrap();
    let mut simu = SimInit::new()
        .add_platform(platform)
        .init(MonotonicTime::EPOCH)
        .unwrap();

    // The token tagged 1.0 arrives early and waits with the requested
    // firing until both are released at 1.0.
    let tag = Tag::at(from_secs_f64(1.0));
    simu.schedule_input("node", "rx", 0, Token::new(5u32), tag, from_secs_f64(0.5))
        .unwrap();
    simu.step_until(from_secs_f64(0.5)).unwrap();
    assert_eq!(simu.platform("node").unwrap().queued_events(), 2);

    simu.step_until(from_secs_f64(2.0)).unwrap();

    assert_eq!(firings.load(Ordering::Relaxed), 1);
    let platform = simu.platform("node").unwrap();
    assert_eq!(platform.stats().firings, 1);
    assert_eq!(platform.queued_events(), 0);

    let outputs = simu.drain_outputs("node").unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].tag, tag);
    assert_eq!(outputs[0].emitted_at, from_secs_f64(1.0));
    assert_eq!(outputs[0].token.downcast_ref::<u32>(), Some(&5));
}

#[test]
fn postfire_false_disables_actor() {
    let mut simu = network_bench("limited", Limited { remaining: 1 }, Duration::ZERO);

    for (value, secs) in [(1u32, 1.0), (2, 2.0)] {
        let t = from_secs_f64(secs);
        simu.schedule_input("node", "rx", 0, Token::new(value), Tag::at(t), t)
            .unwrap();
    }
    simu.step_until(from_secs_f64(3.0)).unwrap();

    let outputs = simu.drain_outputs("node").unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].token.downcast_ref::<u32>(), Some(&1));

    let platform = simu.platform("node").unwrap();
    assert!(!platform.is_enabled("limited"));
    assert_eq!(platform.stats().firings, 1);
    assert_eq!(platform.queued_events(), 0);
}

#[test]
fn prefire_can_decline_firing() {
    let skipped = Arc::new(AtomicUsize::new(0));
    let platform = PlatformBuilder::new("node")
        .add_network_input("rx", PortTimingProfile::default())
        .add_actor(
            "guarded",
            Guarded {
                skipped: skipped.clone(),
            },
        )
        .connect("rx", "guarded.in")
        .build()
        .unwrap();
    let mut simu = SimInit::new()
        .add_platform(platform)
        .init(MonotonicTime::EPOCH)
        .unwrap();

    // The initial pure event found no token.
    assert_eq!(skipped.load(Ordering::Relaxed), 1);
    assert_eq!(simu.platform("node").unwrap().stats().firings, 0);

    let t = from_secs_f64(1.0);
    simu.schedule_input("node", "rx", 0, Token::new(()), Tag::at(t), t)
        .unwrap();
    simu.step().unwrap();

    assert_eq!(skipped.load(Ordering::Relaxed), 1);
    assert_eq!(simu.platform("node").unwrap().stats().firings, 1);
}

#[test]
fn actor_error_halts_simulation() {
    let platform = PlatformBuilder::new("node")
        .add_network_input("rx", PortTimingProfile::default())
        .add_actor("picky", Picky)
        .connect("rx", "picky.in")
        .build()
        .unwrap();
    let mut simu = SimInit::new()
        .add_platform(platform)
        .init(MonotonicTime::EPOCH)
        .unwrap();

    for (value, secs) in [(2u32, 1.0), (3, 2.0)] {
        let t = from_secs_f64(secs);
        simu.schedule_input("node", "rx", 0, Token::new(value), Tag::at(t), t)
            .unwrap();
    }
    simu.step().unwrap();

    let err = simu.step().unwrap_err();
    match &err {
        SimulationError::Execution {
            error: ExecutionError::Actor { actor, source },
            ..
        } => {
            assert_eq!(actor, "picky");
            assert_eq!(source.message(), "odd value 3");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(std::error::Error::source(&err).is_some());
    assert!(matches!(simu.step(), Err(SimulationError::Halted)));
}

#[test]
fn stopped_platform_drops_new_tokens() {
    let platform = PlatformBuilder::new("node")
        .add_network_input("rx", PortTimingProfile::default())
        .add_actor("relay", OneAtATime)
        .add_network_output("tx", PortTimingProfile::default())
        .connect("rx", "relay.in")
        .connect("relay.out", "tx")
        .build()
        .unwrap();
    let mut simu = SimInit::new()
        .add_platform(platform)
        .init(MonotonicTime::EPOCH)
        .unwrap();

    for (value, secs) in [(1u32, 1.0), (2, 2.0)] {
        let t = from_secs_f64(secs);
        simu.schedule_input("node", "rx", 0, Token::new(value), Tag::at(t), t)
            .unwrap();
    }
    simu.step().unwrap();
    simu.stop_platform("node").unwrap();
    simu.step_until(from_secs_f64(3.0)).unwrap();

    assert_eq!(simu.drain_outputs("node").unwrap().len(), 1);
    assert!(simu.platform("node").unwrap().is_stopped());

    simu.wrapup();
    assert!(simu.is_halted());
    assert!(matches!(simu.step(), Err(SimulationError::Halted)));
    assert_eq!(simu.platform("node").unwrap().queued_events(), 0);
}

#[test]
fn zero_delay_cycle_is_rejected() {
    let err = PlatformBuilder::new("node")
        .add_actor("ping", OneAtATime)
        .add_actor("pong", OneAtATime)
        .connect("ping.out", "pong.in")
        .connect("pong.out", "ping.in")
        .build()
        .unwrap_err();

    match err {
        CausalityError::CyclicZeroDelay { chain } => {
            assert!(chain.contains(&"ping".to_owned()));
            assert!(chain.contains(&"pong".to_owned()));
        }
        other => panic!("unexpected error: {}", other),
    }
}

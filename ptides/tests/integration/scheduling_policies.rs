//! Priority and preemption policies.

use std::time::Duration;

use ptides::actor::{Actor, ActorError, ActorTimingProfile, FiringContext, PortSpec, PortTimingProfile};
use ptides::boundary::BoundaryOutput;
use ptides::platform::PlatformBuilder;
use ptides::scheduler::{DeadlinePreemption, EdfPriority, PriorityPolicy, TagOrder, WcetPriority};
use ptides::simulation::{SimInit, Simulation};
use ptides::time::{from_secs_f64, MonotonicTime, Tag};
use ptides::token::Token;

// Forwards its input with a fixed execution time and an optional relative
// deadline on its input.
struct Worker {
    execution_time: Duration,
    relative_deadline: Option<Duration>,
}

impl Worker {
    fn new(execution_time: f64) -> Self {
        Self {
            execution_time: Duration::from_secs_f64(execution_time),
            relative_deadline: None,
        }
    }

    fn with_deadline(mut self, deadline: f64) -> Self {
        self.relative_deadline = Some(Duration::from_secs_f64(deadline));
        self
    }
}

impl Actor for Worker {
    fn input_ports(&self) -> Vec<PortSpec> {
        let mut timing = PortTimingProfile::default();
        if let Some(deadline) = self.relative_deadline {
            timing = timing.with_relative_deadline(deadline);
        }

        vec![PortSpec::new("in").with_timing(timing)]
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

/// Two independent workers, each between a network input and a network
/// output named after it.
fn two_worker_bench(
    policy: impl PriorityPolicy,
    overhead: Duration,
    first: (&str, Worker),
    second: (&str, Worker),
    preemptive: bool,
) -> Simulation {
    let mut builder = PlatformBuilder::new("node")
        .set_priority_policy(policy)
        .set_scheduler_overhead(overhead);
    if preemptive {
        builder = builder.set_preemption_policy(DeadlinePreemption);
    }
    for (name, worker) in [first, second] {
        builder = builder
            .add_network_input(format!("rx_{}", name), PortTimingProfile::default())
            .add_actor(name, worker)
            .add_network_output(format!("tx_{}", name), PortTimingProfile::default())
            .connect(&format!("rx_{}", name), &format!("{}.in", name))
            .connect(&format!("{}.out", name), &format!("tx_{}", name));
    }

    SimInit::new()
        .add_platform(builder.build().unwrap())
        .init(MonotonicTime::EPOCH)
        .unwrap()
}

fn emissions(outputs: &[BoundaryOutput]) -> Vec<(&str, MonotonicTime)> {
    outputs.iter().map(|o| (o.port.as_str(), o.emitted_at)).collect()
}

#[test]
fn wcet_priority_runs_zero_execution_time_first() {
    let mut simu = two_worker_bench(
        WcetPriority,
        Duration::from_millis(100),
        ("long", Worker::new(2.0)),
        ("instant", Worker::new(0.0)),
        false,
    );

    let t = from_secs_f64(3.0);
    simu.schedule_input("node", "rx_long", 0, Token::new(1u32), Tag::at(from_secs_f64(1.0)), t)
        .unwrap();
    simu.schedule_input("node", "rx_instant", 0, Token::new(2u32), Tag::at(from_secs_f64(2.0)), t)
        .unwrap();
    simu.step_until(from_secs_f64(10.0)).unwrap();

    // The scheduler overhead is paid on the arrival of the tokens and again
    // on the completion of the long firing.
    let outputs = simu.drain_outputs("node").unwrap();
    assert_eq!(
        emissions(&outputs),
        vec![("tx_instant", from_secs_f64(3.1)), ("tx_long", from_secs_f64(5.2))]
    );
    assert_eq!(simu.platform("node").unwrap().stats().firings, 2);
}

#[test]
fn tag_order_runs_earliest_tag_first() {
    let mut simu = two_worker_bench(
        TagOrder,
        Duration::from_millis(100),
        ("long", Worker::new(2.0)),
        ("instant", Worker::new(0.0)),
        false,
    );

    let t = from_secs_f64(3.0);
    simu.schedule_input("node", "rx_long", 0, Token::new(1u32), Tag::at(from_secs_f64(1.0)), t)
        .unwrap();
    simu.schedule_input("node", "rx_instant", 0, Token::new(2u32), Tag::at(from_secs_f64(2.0)), t)
        .unwrap();
    simu.step_until(from_secs_f64(10.0)).unwrap();

    let outputs = simu.drain_outputs("node").unwrap();
    assert_eq!(
        emissions(&outputs),
        vec![("tx_long", from_secs_f64(5.2)), ("tx_instant", from_secs_f64(5.2))]
    );
    assert_eq!(outputs[0].tag, Tag::at(from_secs_f64(1.0)));
    assert_eq!(outputs[1].tag, Tag::at(from_secs_f64(2.0)));
}

#[test]
fn edf_preempts_on_earlier_deadline() {
    let mut simu = two_worker_bench(
        EdfPriority,
        Duration::ZERO,
        ("slow", Worker::new(2.0).with_deadline(10.0)),
        ("fast", Worker::new(0.5).with_deadline(1.0)),
        true,
    );

    simu.schedule_input("node", "rx_slow", 0, Token::new(1u32), Tag::at(from_secs_f64(1.0)), from_secs_f64(1.0))
        .unwrap();
    simu.schedule_input("node", "rx_fast", 0, Token::new(2u32), Tag::at(from_secs_f64(1.5)), from_secs_f64(1.5))
        .unwrap();

    simu.step_until(from_secs_f64(1.5)).unwrap();
    let platform = simu.platform("node").unwrap();
    assert_eq!(platform.execution_stack().len(), 2);
    assert_eq!(platform.stats().preemptions, 1);

    simu.step_until(from_secs_f64(10.0)).unwrap();

    // The slow firing executed 0.5s before being preempted, then resumed at
    // 2.0 for the remaining 1.5s.
    let outputs = simu.drain_outputs("node").unwrap();
    assert_eq!(
        emissions(&outputs),
        vec![("tx_fast", from_secs_f64(2.0)), ("tx_slow", from_secs_f64(3.5))]
    );
    let platform = simu.platform("node").unwrap();
    assert_eq!(platform.stats().preemptions, 1);
    assert!(platform.execution_stack().is_empty());
}

#[test]
fn stopped_platform_completes_preempted_firing() {
    let mut simu = two_worker_bench(
        EdfPriority,
        Duration::ZERO,
        ("slow", Worker::new(2.0).with_deadline(10.0)),
        ("fast", Worker::new(0.5).with_deadline(1.0)),
        true,
    );

    simu.schedule_input("node", "rx_slow", 0, Token::new(1u32), Tag::at(from_secs_f64(1.0)), from_secs_f64(1.0))
        .unwrap();
    simu.schedule_input("node", "rx_fast", 0, Token::new(2u32), Tag::at(from_secs_f64(1.5)), from_secs_f64(1.5))
        .unwrap();
    simu.step_until(from_secs_f64(1.5)).unwrap();
    simu.stop_platform("node").unwrap();

    // A token arriving after the stop is dropped, but both firings on the
    // stack complete.
    simu.schedule_input("node", "rx_fast", 0, Token::new(3u32), Tag::at(from_secs_f64(2.5)), from_secs_f64(2.5))
        .unwrap();
    simu.step_until(from_secs_f64(10.0)).unwrap();

    let outputs = simu.drain_outputs("node").unwrap();
    assert_eq!(
        emissions(&outputs),
        vec![("tx_fast", from_secs_f64(2.0)), ("tx_slow", from_secs_f64(3.5))]
    );
    let platform = simu.platform("node").unwrap();
    assert!(platform.execution_stack().is_empty());
    assert_eq!(platform.stats().firings, 2);
}

#[test]
fn firings_run_to_completion_without_preemption() {
    let mut simu = two_worker_bench(
        EdfPriority,
        Duration::ZERO,
        ("slow", Worker::new(2.0).with_deadline(10.0)),
        ("fast", Worker::new(0.5).with_deadline(1.0)),
        false,
    );

    simu.schedule_input("node", "rx_slow", 0, Token::new(1u32), Tag::at(from_secs_f64(1.0)), from_secs_f64(1.0))
        .unwrap();
    simu.schedule_input("node", "rx_fast", 0, Token::new(2u32), Tag::at(from_secs_f64(1.5)), from_secs_f64(1.5))
        .unwrap();
    simu.step_until(from_secs_f64(10.0)).unwrap();

    let outputs = simu.drain_outputs("node").unwrap();
    assert_eq!(
        emissions(&outputs),
        vec![("tx_slow", from_secs_f64(3.0)), ("tx_fast", from_secs_f64(3.5))]
    );
    assert_eq!(simu.platform("node").unwrap().stats().preemptions, 0);
}

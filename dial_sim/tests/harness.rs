//! Runs the scenario catalogue end to end.

use dial_sim::algorithms::{ECHO, ELECTION};
use dial_sim::{ScenarioId, ScenarioRunner};
use dial_core::Color;
use proptest::prelude::*;

#[test]
fn test_all_scenarios_pass() {
    let runner = ScenarioRunner::new(42);
    for scenario in ScenarioId::all() {
        let result = runner.run(scenario);
        assert!(
            result.passed,
            "{} failed: {}",
            scenario,
            result.failure_reason.unwrap_or_default()
        );
        assert_eq!(result.seed, 42);
    }
}

#[test]
fn test_terminating_scenarios_exhaust_their_queue() {
    let runner = ScenarioRunner::new(11).with_steps(500);
    for scenario in ScenarioId::all().into_iter().filter(|s| !s.is_unbounded()) {
        let result = runner.run(scenario);
        assert!(result.passed, "{}: {:?}", scenario, result.failure_reason);
        assert!(result.metrics.exhausted, "{} still running after {} steps", scenario, result.total_steps);
    }
}

#[test]
fn test_lossy_echo_loses_messages_for_some_seed() {
    let lost: usize = (0..10)
        .map(|seed| ScenarioRunner::new(seed).run(ScenarioId::LossyEcho))
        .inspect(|result| assert!(result.passed, "{:?}", result.failure_reason))
        .map(|result| result.metrics.lost_messages)
        .sum();
    assert!(lost > 0);
}

#[test]
fn test_echo_then_flood_announces_completion() {
    let mut sim = ScenarioId::EchoThenFlood.build(5).unwrap();
    sim.step_forward_n(500).unwrap();

    let echo: Vec<Color> = sim.instances(ECHO).iter().map(|a| sim.state(a).unwrap().color).collect();
    assert_eq!(echo, vec![Color::GREEN; 8]);

    let announced = sim.instances("flooding");
    assert_eq!(announced.len(), 8);
    assert!(announced.iter().all(|a| a.instance() == "announce"));
    // The announcement starts with a self-message on the initiator
    assert_eq!(sim.messages().filter(|m| m.is_self_message()).count(), 1);
}

#[test]
fn test_election_survives_step_back_to_midpoint() {
    let mut sim = ScenarioId::Election.build(8).unwrap();
    let full = sim.step_forward_n(500).unwrap();
    let end = sim.snapshot();

    sim.step_backward_n(full.steps / 2);
    let rest = sim.step_forward_n(500).unwrap();
    assert_eq!(rest.steps, full.steps - full.steps / 2);
    assert_eq!(sim.snapshot(), end);

    let leaders = sim
        .instances(ELECTION)
        .into_iter()
        .filter(|a| sim.state(a).is_some_and(|s| s.color == Color::GREEN))
        .count();
    assert_eq!(leaders, 1);
}

#[test]
fn test_scenario_parsing() {
    assert_eq!("echo".parse::<ScenarioId>(), Ok(ScenarioId::Echo));
    assert_eq!("Lossy_Echo".parse::<ScenarioId>(), Ok(ScenarioId::LossyEcho));
    assert_eq!("dial-008".parse::<ScenarioId>(), Ok(ScenarioId::RandomFlooding));
    assert_eq!(
        "warp".parse::<ScenarioId>(),
        Err("Unknown scenario: warp".to_string())
    );
}

#[test]
fn prop_scenarios_pass_for_any_seed() {
    proptest!(|(
        seed in any::<u64>(),
        index in 0usize..8,
        steps in 0usize..80,
    )| {
        let scenario = ScenarioId::all()[index];
        let result = ScenarioRunner::new(seed).with_steps(steps).run(scenario);
        prop_assert!(result.passed, "{} seed={}: {:?}", scenario, seed, result.failure_reason);
        prop_assert!(result.total_steps <= steps);
    });
}

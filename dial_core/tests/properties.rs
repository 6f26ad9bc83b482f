//! Property-based tests for reversibility and determinism of the simulator.

use dial_core::{
    Action, Address, Color, Context, EdgeConfig, EdgeDirection, Message, Scheduler, SimConfig,
    Simulator, Topology,
};
use proptest::prelude::*;

/// Complete graph over `nodes` nodes, mixing the built-in schedulers and
/// losing some messages.
fn gossip(seed: u64, nodes: usize, reliability: f64) -> Simulator {
    let names: Vec<String> = (0..nodes).map(|i| format!("N{i}")).collect();
    let mut topology = Topology::new();
    for name in &names {
        topology.add_node(name.as_str()).unwrap();
    }
    for (i, from) in names.iter().enumerate() {
        for (j, to) in names.iter().enumerate().skip(i + 1) {
            let scheduler = match (i + j) % 3 {
                0 => Scheduler::LocalFifo,
                1 => Scheduler::GlobalFifo,
                _ => Scheduler::Random,
            };
            topology
                .add_edge(from.as_str(), to.as_str(), EdgeConfig::new(scheduler, EdgeDirection::Bidirectional, reliability))
                .unwrap();
        }
    }

    let start = Address::new("N0", "gossip", "main");
    Simulator::builder(topology)
        .with_config(SimConfig::default().with_seed(seed))
        .algorithm("gossip", |ctx: &mut Context<'_>, message: &Message| {
            let hops = message.field("hops").and_then(|v| v.as_u64()).unwrap_or(0);
            let seen = ctx.state().data.get("seen").and_then(|v| v.as_u64()).unwrap_or(0);
            ctx.state_mut().data.insert("seen".to_string(), (seen + 1).into());
            ctx.state_mut().update_color(if seen == 0 { Color::GREEN } else { Color::ORANGE });

            if hops < 3 {
                let peers: Vec<String> = ctx.state().peers().map(str::to_string).collect();
                for peer in peers {
                    let next = message
                        .copy_with(ctx.address().clone(), ctx.address().with_node(peer))
                        .with_field("hops", hops + 1);
                    ctx.send(next);
                }
            }
            Ok(())
        })
        .initial_message(0, Message::new(start.clone(), start.clone()))
        .initial_message(0, Message::new(start.clone(), start.with_node("N1")))
        .build()
        .unwrap()
}

fn run(sim: &mut Simulator, steps: usize) -> Vec<Action> {
    sim.step_forward_n(steps).unwrap().actions
}

#[test]
fn prop_step_back_then_forward_is_identity() {
    proptest!(|(
        seed in any::<u64>(),
        nodes in 2usize..6,
        steps in 1usize..40,
    )| {
        let mut sim = gossip(seed, nodes, 0.8);
        for _ in 0..steps {
            let before = sim.snapshot();
            let Some(action) = sim.step_forward().unwrap() else { break };
            let after = sim.snapshot();

            let undone = sim.step_backward().unwrap();
            prop_assert_eq!(&sim.snapshot(), &before);
            prop_assert_eq!(undone.position, action.position);

            let replayed = sim.step_forward().unwrap().unwrap();
            prop_assert_eq!(&replayed, &action);
            prop_assert_eq!(&sim.snapshot(), &after);
        }
    });
}

#[test]
fn prop_same_seed_same_run() {
    proptest!(|(
        seed in any::<u64>(),
        nodes in 2usize..6,
        steps in 1usize..60,
    )| {
        let first = run(&mut gossip(seed, nodes, 0.7), steps);
        let second = run(&mut gossip(seed, nodes, 0.7), steps);
        prop_assert_eq!(first, second);
    });
}

#[test]
fn prop_queue_stays_dense_and_causal() {
    proptest!(|(
        seed in any::<u64>(),
        nodes in 2usize..6,
        steps in 1usize..60,
        back in 0usize..30,
    )| {
        let mut sim = gossip(seed, nodes, 0.9);
        for _ in 0..steps {
            if sim.step_forward().unwrap().is_none() {
                break;
            }
            prop_assert!(sim.queue().is_dense());
            prop_assert!(sim.causality_violations().is_empty());
        }
        for _ in 0..back {
            sim.step_backward();
            prop_assert!(sim.queue().is_dense());
            prop_assert!(sim.causality_violations().is_empty());
        }
    });
}

#[test]
fn prop_full_unwind_restores_construction() {
    proptest!(|(
        seed in any::<u64>(),
        steps in 1usize..50,
    )| {
        let mut sim = gossip(seed, 4, 0.6);
        let initial = sim.snapshot();
        let taken = sim.step_forward_n(steps).unwrap().steps;

        let report = sim.step_backward_n(taken + 5);
        prop_assert_eq!(report.steps, taken);
        prop_assert_eq!(&sim.snapshot(), &initial);
    });
}

#[test]
fn prop_lost_messages_have_no_effect() {
    proptest!(|(
        seed in any::<u64>(),
        steps in 1usize..50,
    )| {
        let mut sim = gossip(seed, 4, 0.5);
        for action in run(&mut sim, steps) {
            if action.message.is_lost {
                prop_assert!(action.produced.is_empty());
                prop_assert!(action.state.is_none());
            }
        }
        for message in sim.messages().filter(|m| m.is_lost()) {
            prop_assert!(message.children().is_empty());
        }
    });
}

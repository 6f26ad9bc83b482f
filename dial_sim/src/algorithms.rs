//! Built-in distributed algorithms.
//!
//! Every function here has the shape of an [`Algorithm`](dial_core::Algorithm)
//! handler and can be registered with
//! [`SimulatorBuilder::algorithm`](dial_core::SimulatorBuilder::algorithm).

use dial_core::{Address, AlgorithmError, Color, Context, HookContext, Message};
use rand::Rng;
use serde_json::Value;

/// Registered name of [`flooding`].
pub const FLOODING: &str = "flooding";

/// Registered name of [`echo`].
pub const ECHO: &str = "echo";

/// Registered name of [`pulse`].
pub const PULSE: &str = "pulse";

/// Registered name of [`ring_election`].
pub const ELECTION: &str = "election";

/// Instance used by [`announce_echo_completion`] for its flood.
pub const ANNOUNCE_INSTANCE: &str = "announce";

fn peers(ctx: &Context<'_>) -> Vec<String> {
    ctx.state().peers().map(str::to_string).collect()
}

fn counter(ctx: &Context<'_>, key: &str) -> u64 {
    ctx.state().data.get(key).and_then(Value::as_u64).unwrap_or(0)
}

/// Colored flooding: a node adopts the color of the first message that
/// differs from its own and forwards it to all peers.
pub fn flooding(ctx: &mut Context<'_>, message: &Message) -> Result<(), AlgorithmError> {
    if ctx.state().color == message.color() {
        return Ok(());
    }
    ctx.state_mut().update_color(message.color());

    let own = ctx.address().clone();
    for peer in peers(ctx) {
        ctx.send(message.copy_with(own.clone(), own.with_node(peer)));
    }
    Ok(())
}

/// Echo wave.
///
/// The first message a node sees makes its sender the node's parent;
/// the node then explores all other peers. Once a message has arrived over
/// every edge the node turns green and echoes to its parent. The initiator
/// is the node whose first message came from itself.
pub fn echo(ctx: &mut Context<'_>, message: &Message) -> Result<(), AlgorithmError> {
    let own = ctx.address().clone();
    let peers = peers(ctx);

    if ctx.state().color == Color::WHITE {
        let parent = message.source().clone();
        ctx.state_mut().update_color(Color::RED);
        ctx.state_mut()
            .data
            .insert("parent".to_string(), parent.to_string().into());
        for peer in peers.iter().filter(|peer| peer.as_str() != parent.node()) {
            let explore = message
                .copy_with(own.clone(), own.with_node(peer.as_str()))
                .with_color(Color::RED);
            ctx.send(explore);
        }
    }

    let received = counter(ctx, "received") + 1;
    ctx.state_mut()
        .data
        .insert("received".to_string(), received.into());

    let parent: Address = ctx
        .state()
        .data
        .get("parent")
        .and_then(Value::as_str)
        .ok_or_else(|| AlgorithmError::new("Echo state has no parent"))?
        .parse()?;
    let initiator = parent.node() == own.node();
    let expected = peers.len() as u64 + u64::from(initiator);

    if received == expected {
        ctx.state_mut().update_color(Color::GREEN);
        if !initiator {
            ctx.send(message.copy_with(own, parent).with_color(Color::GREEN));
        }
    }
    Ok(())
}

/// Endless heartbeat: alternates the node color and schedules the next
/// beat one time unit later.
pub fn pulse(ctx: &mut Context<'_>, message: &Message) -> Result<(), AlgorithmError> {
    let beats = counter(ctx, "beats") + 1;
    let color = if beats % 2 == 0 { Color::PINK } else { Color::YELLOW };

    let state = ctx.state_mut();
    state.data.insert("beats".to_string(), beats.into());
    state.update_color(color);

    ctx.send_to_self(message.copy().with_field("beat", beats).with_color(color), 1);
    Ok(())
}

/// Leader election on a unidirectional ring.
///
/// A single token travels around the ring. Each node draws a value from
/// its own generator on first contact (blue), adopts any larger
/// `(value, leader)` pair it sees (red), and the node whose own name comes
/// back turns green and sends a yellow round that stops when it returns.
pub fn ring_election(ctx: &mut Context<'_>, message: &Message) -> Result<(), AlgorithmError> {
    let own = ctx.address().clone();

    if ctx.state().color == Color::WHITE {
        let successor = ctx
            .state()
            .peers()
            .find(|peer| *peer != message.source().node())
            .or_else(|| ctx.state().peers().next())
            .ok_or_else(|| AlgorithmError::new("Ring node has no successor"))?
            .to_string();
        let value: u64 = ctx.state_mut().rng().gen_range(0..10_000);

        let state = ctx.state_mut();
        state.data.insert("successor".to_string(), successor.into());
        state.data.insert("value".to_string(), value.into());
        state.data.insert("leader".to_string(), own.node().into());
        state.update_color(Color::BLUE);
    }

    let successor = ctx
        .state()
        .data
        .get("successor")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let mut value = counter(ctx, "value");
    let mut leader = ctx
        .state()
        .data
        .get("leader")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let mut token_color = Color::WHITE;

    let incoming_value = message.field("value").and_then(Value::as_u64);
    let incoming_leader = message.field("leader").and_then(Value::as_str);
    if let (Some(incoming_value), Some(incoming_leader)) = (incoming_value, incoming_leader) {
        if incoming_leader == own.node() {
            ctx.state_mut().update_color(Color::GREEN);
            token_color = Color::YELLOW;
            if message.color() == Color::YELLOW {
                return Ok(());
            }
        } else if (incoming_value, incoming_leader) > (value, leader.as_str()) {
            value = incoming_value;
            leader = incoming_leader.to_string();
            let state = ctx.state_mut();
            state.update_color(Color::RED);
            state.data.insert("value".to_string(), value.into());
            state.data.insert("leader".to_string(), leader.clone().into());
        }
    }

    if message.color() == Color::YELLOW && ctx.state().color != Color::GREEN {
        ctx.state_mut().update_color(Color::YELLOW);
        token_color = Color::YELLOW;
    }

    let token = Message::new(own.clone(), own.with_node(successor))
        .with_title("election")
        .with_color(token_color)
        .with_field("value", value)
        .with_field("leader", leader);
    ctx.send(token);
    Ok(())
}

/// Condition hook: when an echo initiator turns green, start a blue flood
/// from the same node to announce it.
pub fn announce_echo_completion(ctx: &mut HookContext<'_>) -> Result<(), AlgorithmError> {
    let state = ctx.state();
    if state.address().algorithm() != ECHO
        || state.color != Color::GREEN
        || ctx.message().color() != Color::GREEN
    {
        return Ok(());
    }

    let initiator = state
        .data
        .get("parent")
        .and_then(Value::as_str)
        .and_then(|parent| parent.parse::<Address>().ok())
        .is_some_and(|parent| parent.node() == state.address().node());
    if !initiator {
        return Ok(());
    }

    let source = state.address().clone();
    let target = source.with_algorithm(FLOODING).with_instance(ANNOUNCE_INSTANCE);
    let announcement = Message::new(source, target)
        .with_title("echo complete")
        .with_color(Color::BLUE);
    ctx.send_to_self(announcement, 1);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topologies;
    use dial_core::Simulator;

    #[test]
    fn test_flooding_reaches_connected_nodes() {
        let start = Address::new("A", FLOODING, "red");
        let mut sim = Simulator::builder(topologies::line(4))
            .algorithm(FLOODING, flooding)
            .initial_message(0, Message::new(start.clone(), start).with_color(Color::RED))
            .build()
            .unwrap();

        sim.step_forward_n(100).unwrap();
        assert_eq!(sim.instances(FLOODING).len(), 4);
        assert!(sim.states().iter_current().all(|s| s.color == Color::RED));
    }

    #[test]
    fn test_echo_completes_on_tree() {
        let start = Address::new("A", ECHO, "main");
        let mut sim = Simulator::builder(topologies::example_network())
            .algorithm(ECHO, echo)
            .initial_message(1, Message::new(start.clone(), start.clone()).with_color(Color::RED))
            .build()
            .unwrap();

        sim.step_forward_n(1_000).unwrap();
        assert!(sim.step_forward().unwrap().is_none());
        assert!(sim.states().iter_current().all(|s| s.color == Color::GREEN));
        assert_eq!(sim.instances(ECHO).len(), 8);
    }

    #[test]
    fn test_pulse_alternates() {
        let start = Address::new("A", PULSE, "main");
        let mut sim = Simulator::builder(topologies::line(1))
            .algorithm(PULSE, pulse)
            .initial_message(0, Message::new(start.clone(), start.clone()))
            .build()
            .unwrap();

        sim.step_forward_n(4).unwrap();
        let state = sim.state(&start).unwrap();
        assert_eq!(state.data["beats"], 4);
        assert_eq!(state.color, Color::PINK);
        assert_eq!(sim.time(), 3);
    }

    #[test]
    fn test_ring_election_agrees_on_one_leader() {
        let mut sim = Simulator::builder(topologies::ring(5))
            .with_seed(9)
            .algorithm(ELECTION, ring_election)
            .initial_message(
                0,
                Message::new(Address::new("A", "initiator", "main"), Address::new("B", ELECTION, "main")),
            )
            .build()
            .unwrap();

        sim.step_forward_n(1_000).unwrap();
        assert!(sim.step_forward().unwrap().is_none());

        let states: Vec<_> = sim.states().iter_current().collect();
        assert_eq!(states.len(), 5);
        let winners: Vec<_> = states.iter().filter(|s| s.color == Color::GREEN).collect();
        assert_eq!(winners.len(), 1);

        let leader = winners[0].address().node();
        let max_value = states.iter().map(|s| s.data["value"].as_u64().unwrap()).max().unwrap();
        for state in &states {
            assert_eq!(state.data["leader"], leader);
            assert_eq!(state.data["value"], max_value);
        }
    }
}

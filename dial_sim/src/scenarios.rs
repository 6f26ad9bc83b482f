//! Scenario catalogue.

use crate::algorithms::{self, ECHO, ELECTION, FLOODING, PULSE};
use crate::topologies;
use dial_core::{
    Address, Color, EdgeConfig, EdgeDirection, Message, Scheduler, SimConfig, SimError, Simulator,
};

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// DIAL-001: self-message heartbeat on a single node
    Pulse,

    /// DIAL-002: two colored floods plus a lost message on the example network
    Flooding,

    /// DIAL-003: echo wave on the example network
    Echo,

    /// DIAL-004: echo wave over lossy random-delay edges
    LossyEcho,

    /// DIAL-005: leader election on a unidirectional ring
    Election,

    /// DIAL-006: echo whose completion hook starts a flood
    EchoThenFlood,

    /// DIAL-007: flooding a complete graph over Global-FIFO edges
    GlobalFifoFlooding,

    /// DIAL-008: flooding a line over lossy random-delay edges
    RandomFlooding,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Pulse,
            ScenarioId::Flooding,
            ScenarioId::Echo,
            ScenarioId::LossyEcho,
            ScenarioId::Election,
            ScenarioId::EchoThenFlood,
            ScenarioId::GlobalFifoFlooding,
            ScenarioId::RandomFlooding,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Pulse => "pulse",
            ScenarioId::Flooding => "flooding",
            ScenarioId::Echo => "echo",
            ScenarioId::LossyEcho => "lossy_echo",
            ScenarioId::Election => "election",
            ScenarioId::EchoThenFlood => "echo_then_flood",
            ScenarioId::GlobalFifoFlooding => "global_fifo_flooding",
            ScenarioId::RandomFlooding => "random_flooding",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Pulse => "Single node beating itself every time unit, never terminates",
            ScenarioId::Flooding => "Red and blue floods on the 8-node example network, one lost message",
            ScenarioId::Echo => "Echo wave from A on the 8-node example network",
            ScenarioId::LossyEcho => "Echo wave on a 5-node complete graph, 30% loss, random delays",
            ScenarioId::Election => "Ring election on 6 nodes, values from per-node generators",
            ScenarioId::EchoThenFlood => "Echo from A, completion hook floods an announcement",
            ScenarioId::GlobalFifoFlooding => "Flooding a 6-node complete graph over Global-FIFO edges",
            ScenarioId::RandomFlooding => "Flooding an 8-node line, 10% loss, random delays",
        }
    }

    /// Returns true if the scenario keeps producing messages forever.
    pub fn is_unbounded(&self) -> bool {
        matches!(self, ScenarioId::Pulse)
    }

    /// Builds a fresh simulator for this scenario.
    pub fn build(&self, seed: u64) -> Result<Simulator, SimError> {
        let config = SimConfig::default().with_seed(seed);
        match self {
            ScenarioId::Pulse => {
                let a = Address::new("A", PULSE, "main");
                Simulator::builder(topologies::line(1))
                    .with_config(config)
                    .algorithm(PULSE, algorithms::pulse)
                    .initial_message(0, Message::new(a.clone(), a).with_title("beat"))
                    .build()
            }
            ScenarioId::Flooding => {
                let conflicting = Message::new(
                    Address::new("A", FLOODING, "red"),
                    Address::new("C", FLOODING, "red"),
                )
                .with_title("Conflicting Message")
                .with_color(Color::PINK)
                .with_lost(true);

                Simulator::builder(topologies::example_network())
                    .with_config(config)
                    .algorithm(FLOODING, algorithms::flooding)
                    .initial_message(
                        0,
                        Message::new("E/initiator/main".parse()?, Address::new("B", FLOODING, "red"))
                            .with_title("First Flooding Instance")
                            .with_color(Color::RED),
                    )
                    .initial_message(
                        0,
                        Message::new("G/initiator/main".parse()?, Address::new("F", FLOODING, "blue"))
                            .with_title("Second Flooding Instance")
                            .with_color(Color::BLUE),
                    )
                    .initial_message(1, conflicting)
                    .build()
            }
            ScenarioId::Echo => echo_builder(topologies::example_network(), config).build(),
            ScenarioId::LossyEcho => {
                let lossy = EdgeConfig::new(Scheduler::Random, EdgeDirection::Bidirectional, 0.7);
                echo_builder(topologies::complete_with(5, lossy)?, config).build()
            }
            ScenarioId::Election => Simulator::builder(topologies::ring(6))
                .with_config(config)
                .algorithm(ELECTION, algorithms::ring_election)
                .initial_message(
                    0,
                    Message::new(Address::new("A", "initiator", "main"), Address::new("B", ELECTION, "main")),
                )
                .build(),
            ScenarioId::EchoThenFlood => echo_builder(topologies::example_network(), config)
                .algorithm(FLOODING, algorithms::flooding)
                .hook(algorithms::announce_echo_completion)
                .build(),
            ScenarioId::GlobalFifoFlooding => {
                let fifo = EdgeConfig::reliable(Scheduler::GlobalFifo, EdgeDirection::Bidirectional);
                flooding_builder(topologies::complete_with(6, fifo)?, config).build()
            }
            ScenarioId::RandomFlooding => {
                let lossy = EdgeConfig::new(Scheduler::Random, EdgeDirection::Bidirectional, 0.9);
                flooding_builder(topologies::line_with(8, lossy)?, config).build()
            }
        }
    }
}

fn echo_builder(topology: dial_core::Topology, config: SimConfig) -> dial_core::SimulatorBuilder {
    let a = Address::new("A", ECHO, "main");
    Simulator::builder(topology)
        .with_config(config)
        .algorithm(ECHO, algorithms::echo)
        .initial_message(1, Message::new(a.clone(), a).with_color(Color::RED))
}

fn flooding_builder(topology: dial_core::Topology, config: SimConfig) -> dial_core::SimulatorBuilder {
    let a = Address::new("A", FLOODING, "main");
    Simulator::builder(topology)
        .with_config(config)
        .algorithm(FLOODING, algorithms::flooding)
        .initial_message(0, Message::new(a.clone(), a).with_color(Color::GREEN))
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pulse" | "dial-001" => Ok(ScenarioId::Pulse),
            "flooding" | "dial-002" => Ok(ScenarioId::Flooding),
            "echo" | "dial-003" => Ok(ScenarioId::Echo),
            "lossy_echo" | "lossyecho" | "dial-004" => Ok(ScenarioId::LossyEcho),
            "election" | "dial-005" => Ok(ScenarioId::Election),
            "echo_then_flood" | "echothenflood" | "dial-006" => Ok(ScenarioId::EchoThenFlood),
            "global_fifo_flooding" | "globalfifoflooding" | "dial-007" => Ok(ScenarioId::GlobalFifoFlooding),
            "random_flooding" | "randomflooding" | "dial-008" => Ok(ScenarioId::RandomFlooding),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
            assert_eq!(scenario.to_string(), scenario.name());
        }
        assert_eq!("DIAL-005".parse::<ScenarioId>(), Ok(ScenarioId::Election));
        assert!("nope".parse::<ScenarioId>().is_err());
    }

    #[test]
    fn test_every_scenario_builds() {
        for scenario in ScenarioId::all() {
            let sim = scenario.build(42).unwrap();
            assert!(!sim.queue().is_empty(), "{} has no initial messages", scenario);
        }
    }

    #[test]
    fn test_flooding_scenario_has_lost_initial_message() {
        let sim = ScenarioId::Flooding.build(1).unwrap();
        let lost: Vec<_> = sim.messages().filter(|m| m.is_lost()).collect();
        assert_eq!(lost.len(), 1);
        assert_eq!(lost[0].title(), "Conflicting Message");
    }
}

//! JSON exporter for replaying runs outside the simulator.
//!
//! Exports the topology, every step taken and the final states.

use dial_core::{Action, MessageSummary, Position, Simulator, StateSummary, TopologySummary};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;

/// Complete run export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    pub topology: TopologySummary,

    /// All steps, in the order they were taken
    pub actions: Vec<Action>,

    /// Every message in the queue at the end, in delivery order
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub messages: Vec<MessageSummary>,

    /// Current state of every touched address at the end
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub final_states: Vec<StateSummary>,

    /// Last delivered position
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_position: Option<Position>,

    /// Final results
    pub passed: bool,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64, topology: TopologySummary) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            topology,
            actions: Vec::new(),
            messages: Vec::new(),
            final_states: Vec::new(),
            final_position: None,
            passed: false,
        }
    }

    /// Adds a step.
    pub fn add_action(&mut self, action: Action) {
        self.final_position = Some(action.position);
        self.actions.push(action);
    }

    /// Finalizes the export from the simulator's current state.
    pub fn finalize(&mut self, sim: &Simulator, passed: bool) {
        self.passed = passed;
        self.final_position = sim.position();
        self.messages = sim.messages().map(|m| m.summary()).collect();
        self.final_states = sim.states().iter_current().map(|s| s.summary()).collect();
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

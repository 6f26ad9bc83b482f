//! Scenario runner - executes a scenario and checks the simulator invariants
//! along the way.
//!
//! Every forward step is undone and replayed, the whole run is repeated
//! from a fresh build with the same seed, and finally the run is unwound
//! back to construction.

use crate::algorithms::{ECHO, ELECTION, FLOODING, PULSE};
use crate::scenarios::ScenarioId;
use dial_core::{Action, Address, Color, Phase, Simulator, Time};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all checks
    pub passed: bool,

    /// Forward steps taken
    pub total_steps: usize,

    /// Simulation time after the last step
    pub final_time: Time,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScenarioMetrics {
    /// Messages in the queue at the end
    pub messages: usize,

    /// Messages flagged as lost
    pub lost_messages: usize,

    /// Self-messages
    pub self_messages: usize,

    /// Addresses with a state
    pub states: usize,

    /// Largest number of messages sharing one arrival time
    pub max_slot_len: usize,

    /// Whether the queue ran dry within the step budget
    pub exhausted: bool,
}

/// Runs scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Maximum number of forward steps
    steps: usize,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self { seed, steps: 200 }
    }

    /// Sets the step budget.
    pub fn with_steps(mut self, steps: usize) -> Self {
        self.steps = steps;
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let mut result = ScenarioResult {
            scenario,
            seed: self.seed,
            passed: false,
            total_steps: 0,
            final_time: 0,
            failure_reason: None,
            metrics: ScenarioMetrics::default(),
        };

        match self.execute(scenario, &mut result) {
            Ok(()) => result.passed = true,
            Err(reason) => {
                warn!("Scenario {} failed: {}", scenario.name(), reason);
                result.failure_reason = Some(reason);
            }
        }
        result
    }

    fn execute(&self, scenario: ScenarioId, result: &mut ScenarioResult) -> Result<(), String> {
        let mut sim = scenario
            .build(self.seed)
            .map_err(|e| format!("Build failed: {}", e))?;
        let initial = sim.snapshot();

        // Phase 1: step forward, undoing and replaying every step
        let mut actions: Vec<Action> = Vec::new();
        for _ in 0..self.steps {
            let before = sim.snapshot();
            let Some(action) = sim.step_forward().map_err(|e| format!("Step failed: {}", e))? else {
                break;
            };
            let after = sim.snapshot();

            sim.step_backward()
                .ok_or_else(|| format!("Nothing to undo at {}", action.position))?;
            if sim.snapshot() != before {
                return Err(format!("Stepping back from {} did not restore the state", action.position));
            }

            let replay = sim
                .step_forward()
                .map_err(|e| format!("Replay failed: {}", e))?;
            if replay.as_ref() != Some(&action) || sim.snapshot() != after {
                return Err(format!("Replay of {} diverged", action.position));
            }

            if !sim.queue().is_dense() {
                return Err(format!("Queue has gaps after {}", action.position));
            }
            let violations = sim.causality_violations();
            if !violations.is_empty() {
                return Err(format!("{} causality violations after {}", violations.len(), action.position));
            }

            result.metrics.max_slot_len = result
                .metrics
                .max_slot_len
                .max(sim.queue().slot_len(action.position.time));
            actions.push(action);
        }

        result.total_steps = actions.len();
        result.final_time = sim.time();
        result.metrics.messages = sim.queue().len();
        result.metrics.lost_messages = sim.messages().filter(|m| m.is_lost()).count();
        result.metrics.self_messages = sim.messages().filter(|m| m.is_self_message()).count();
        result.metrics.states = sim.states().len();
        result.metrics.exhausted = sim.phase() == Phase::Exhausted;

        debug!(
            "  {} steps | t={} | messages={} | lost={} | states={}",
            result.total_steps,
            result.final_time,
            result.metrics.messages,
            result.metrics.lost_messages,
            result.metrics.states
        );

        check_outcome(scenario, &sim, result)?;

        // Phase 2: a fresh build with the same seed replays the same run
        let mut twin = scenario
            .build(self.seed)
            .map_err(|e| format!("Rebuild failed: {}", e))?;
        let replayed = twin
            .step_forward_n(actions.len())
            .map_err(|e| format!("Rebuilt run failed: {}", e))?;
        if replayed.actions != actions || twin.snapshot() != sim.snapshot() {
            return Err("Same seed produced a different run".to_string());
        }

        // Phase 3: unwinding everything returns to construction
        let unwound = sim.step_backward_n(actions.len() + 1);
        if unwound.steps != actions.len() || sim.snapshot() != initial {
            return Err(format!(
                "Unwinding {} steps did not return to construction ({} undone)",
                actions.len(),
                unwound.steps
            ));
        }

        // Phase 4: reset from the end of the run
        twin.reset();
        if twin.snapshot() != initial {
            return Err("Reset did not return to construction".to_string());
        }

        Ok(())
    }
}

/// Scenario-specific expectations on the final state.
fn check_outcome(scenario: ScenarioId, sim: &Simulator, result: &ScenarioResult) -> Result<(), String> {
    let colors = |algorithm: &str, instance: Option<&str>| -> Vec<Color> {
        sim.states()
            .iter_current()
            .filter(|s| s.address().algorithm() == algorithm)
            .filter(|s| instance.map_or(true, |i| s.address().instance() == i))
            .map(|s| s.color)
            .collect()
    };
    let all = |colors: &[Color], expected: Color, count: usize, what: &str| {
        if colors.len() != count || colors.iter().any(|c| *c != expected) {
            return Err(format!(
                "Expected {} {} states colored {}, found {:?}",
                count, what, expected, colors
            ));
        }
        Ok(())
    };

    match scenario {
        ScenarioId::Pulse => {
            let beats = sim
                .state(&Address::new("A", PULSE, "main"))
                .and_then(|s| s.data.get("beats"))
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            if beats != result.total_steps as u64 {
                return Err(format!("Pulse beat {} times in {} steps", beats, result.total_steps));
            }
            if result.metrics.exhausted && result.total_steps > 0 {
                return Err("Pulse stopped beating".to_string());
            }
        }
        ScenarioId::Flooding => {
            if result.metrics.lost_messages == 0 {
                return Err("Conflicting message was not lost".to_string());
            }
            if result.metrics.exhausted {
                all(&colors(FLOODING, Some("red")), Color::RED, 8, "red flooding")?;
                all(&colors(FLOODING, Some("blue")), Color::BLUE, 8, "blue flooding")?;
            }
        }
        ScenarioId::Echo => {
            if result.metrics.exhausted {
                all(&colors(ECHO, None), Color::GREEN, 8, "echo")?;
            }
        }
        ScenarioId::EchoThenFlood => {
            if result.metrics.exhausted {
                all(&colors(ECHO, None), Color::GREEN, 8, "echo")?;
                all(&colors(FLOODING, None), Color::BLUE, 8, "announcement")?;
            }
        }
        ScenarioId::Election => {
            if result.metrics.exhausted {
                let colors = colors(ELECTION, None);
                let leaders = colors.iter().filter(|c| **c == Color::GREEN).count();
                if leaders != 1 {
                    return Err(format!("Election ended with {} leaders", leaders));
                }
            }
        }
        ScenarioId::GlobalFifoFlooding => {
            if result.metrics.exhausted {
                all(&colors(FLOODING, None), Color::GREEN, 6, "flooding")?;
            }
        }
        // Lossy runs only have to keep the invariants
        ScenarioId::LossyEcho | ScenarioId::RandomFlooding => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_passes() {
        let result = ScenarioRunner::new(42).run(ScenarioId::Echo);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.exhausted);
        assert_eq!(result.metrics.states, 8);
        // Initial message plus two per tree edge
        assert_eq!(result.total_steps, 15);
    }

    #[test]
    fn test_pulse_uses_whole_budget() {
        let result = ScenarioRunner::new(7).with_steps(25).run(ScenarioId::Pulse);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.total_steps, 25);
        assert_eq!(result.final_time, 24);
        assert!(!result.metrics.exhausted);
        assert_eq!(result.metrics.self_messages, 25);
    }

    #[test]
    fn test_flooding_counts_lost_message() {
        let result = ScenarioRunner::new(3).run(ScenarioId::Flooding);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.lost_messages, 1);
    }

    #[test]
    fn test_zero_budget_still_checks_construction() {
        let result = ScenarioRunner::new(1).with_steps(0).run(ScenarioId::Election);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.total_steps, 0);
    }
}

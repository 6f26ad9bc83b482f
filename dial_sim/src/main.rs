//! DIAL Simulator CLI
//!
//! Run scenarios through the time-reversible simulator and check that every
//! run replays exactly.

use clap::Parser;
use dial_sim::{ScenarioId, ScenarioResult, ScenarioRunner, SimExport};
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Run a scenario and export every step for inspection.
fn run_with_export(seed: u64, steps: usize, scenario: ScenarioId, export_path: &str) -> ScenarioResult {
    // Checked run first, the export run below only records
    let result = ScenarioRunner::new(seed).with_steps(steps).run(scenario);

    let mut sim = match scenario.build(seed) {
        Ok(sim) => sim,
        Err(e) => {
            error!("Failed to build {}: {}", scenario.name(), e);
            return result;
        }
    };
    let mut export = SimExport::new(scenario.name(), seed, sim.topology().summary());

    for _ in 0..steps {
        match sim.step_forward() {
            Ok(Some(action)) => {
                debug!("  {} -> {}", action.position, action.message.target);
                export.add_action(action);
            }
            Ok(None) => break,
            Err(e) => {
                error!("Step failed: {}", e);
                break;
            }
        }
    }

    export.finalize(&sim, result.passed);

    if let Err(e) = export.write_to_file(export_path) {
        error!("Failed to write export: {:?}", e);
    } else {
        info!("Exported {} steps to {}", export.actions.len(), export_path);
    }

    result
}

/// `RUST_LOG` directives when they parse, otherwise `debug`/`info` by verbosity.
fn log_filter(verbose: bool, env: Option<&str>) -> EnvFilter {
    let level = if verbose { "debug" } else { "info" };
    env.and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(level))
}

/// DIAL Deterministic Simulation CLI
#[derive(Parser, Debug)]
#[command(name = "dial-sim")]
#[command(about = "Run deterministic, time-reversible distributed algorithm scenarios", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (pulse, flooding, echo, lossy_echo, election, echo_then_flood,
    /// global_fifo_flooding, random_flooding, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Maximum number of forward steps per run
    #[arg(long, default_value = "200")]
    steps: usize,

    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Verbose output (RUST_LOG takes precedence when set)
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export the run to a JSON file
    #[arg(long)]
    export: Option<String>,
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(log_filter(args.verbose, env.as_deref()))
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        std::process::exit(1);
    }

    if !args.json {
        info!("DIAL Simulator v{}", dial_core::VERSION);
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            let names: Vec<&str> = ScenarioId::all().iter().map(|s| s.name()).collect();
            eprintln!("Available scenarios: {}, all", names.join(", "));
            std::process::exit(1);
        })]
    };

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64
    } else {
        args.seed
    };

    // Handle --export mode
    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 {
            eprintln!("Error: --export only supports a single scenario, not 'all'");
            std::process::exit(1);
        }

        info!("Running with export to: {}", export_path);
        let result = run_with_export(base_seed, args.steps, scenarios[0], export_path);

        if result.passed {
            info!("✓ {} (seed={}) PASSED - exported to {}", scenarios[0].name(), base_seed, export_path);
        } else {
            error!(
                "✗ {} FAILED: {}",
                scenarios[0].name(),
                result.failure_reason.as_deref().unwrap_or("unknown")
            );
            std::process::exit(1);
        }
        return;
    }

    // Track results
    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = ScenarioRunner::new(seed).with_steps(args.steps);

        for scenario in &scenarios {
            let result = runner.run(*scenario);

            if !args.json {
                if result.passed {
                    info!(
                        "✓ {} (seed={}) PASSED in {} steps, t={}",
                        scenario.name(),
                        seed,
                        result.total_steps,
                        result.final_time
                    );
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }

            if !result.passed {
                failed_count += 1;
            }
            all_results.push(result);
        }
    }

    // Summary
    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "steps": r.total_steps,
                    "time": r.final_time,
                    "metrics": r.metrics,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to encode summary: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);
            for result in all_results.iter().filter(|r| !r.passed) {
                error!(
                    "  - {} seed={}: {}",
                    result.scenario.name(),
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}

//! FleetSim CLI — simulate request-serving fleets and size them.

use clap::{Parser, Subcommand};
use fleetsim_core::config::SimConfig;
use fleetsim_core::metrics;
use fleetsim_core::optimize::{self, SearchSpace};
use fleetsim_policies::RewardWeights;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "fleetsim",
    about = "Simulate request-serving fleets with pluggable routing and learned autoscaling",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation with a single routing policy.
    Run {
        /// Path to TOML configuration file.
        #[arg(short, long)]
        config: PathBuf,
        /// Routing policy name (overrides the config).
        #[arg(short, long)]
        policy: Option<String>,
        /// Output results to JSON file.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compare multiple routing policies on the same config.
    Compare {
        /// Path to TOML configuration file.
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated list of policy names.
        #[arg(short = 'P', long, value_delimiter = ',')]
        policies: Vec<String>,
        /// Output results to JSON file.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Search for the most profitable fixed fleet size.
    Search {
        /// Path to TOML configuration file.
        #[arg(short, long)]
        config: PathBuf,
        /// Smallest fleet size to consider.
        #[arg(long, default_value = "1")]
        min: u32,
        /// Largest fleet size to consider.
        #[arg(long, default_value = "40")]
        max: u32,
    },
    /// List available routing policies.
    ListPolicies,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            policy,
            output,
        } => {
            let sim_config = load_config(&config);
            let policy_name = policy.unwrap_or_else(|| sim_config.policy.name.clone());

            let result =
                fleetsim_core::run_with_policy(&sim_config, &policy_name).unwrap_or_else(|e| {
                    eprintln!("Simulation failed: {}", e);
                    std::process::exit(1);
                });
            println!("{}", metrics::format_table(&result));

            if let Some(output_path) = output {
                write_json(&output_path, &result);
            }
        }
        Commands::Compare {
            config,
            policies,
            output,
        } => {
            let sim_config = load_config(&config);
            let policy_names: Vec<&str> = if policies.is_empty() {
                fleetsim_policies::available_policies()
            } else {
                policies.iter().map(|s| s.as_str()).collect()
            };

            let results = fleetsim_core::compare_policies(&sim_config, &policy_names)
                .unwrap_or_else(|e| {
                    eprintln!("Simulation failed: {}", e);
                    std::process::exit(1);
                });
            println!("{}", metrics::format_comparison_table(&results));

            for result in &results {
                println!("{}", metrics::format_table(result));
            }

            if let Some(output_path) = output {
                write_json(&output_path, &results);
            }
        }
        Commands::Search { config, min, max } => {
            let sim_config = load_config(&config);
            let weights = RewardWeights {
                process: sim_config.controller.process_reward,
                cancel: sim_config.controller.cancel_reward,
                server: sim_config.controller.server_reward,
            };

            let best = optimize::binary_fleet_search(
                |n| {
                    let mut candidate = sim_config.clone();
                    candidate.fleet.num_servers = n;
                    candidate.controller.enabled = false;
                    let report = fleetsim_core::run_simulation(&candidate)?;
                    let profit = optimize::run_profit(
                        &weights,
                        report.processed,
                        report.cancelled,
                        n,
                        report.duration,
                    );
                    println!("  n={:>3}  profit={:.1}", n, profit);
                    Ok(profit)
                },
                SearchSpace { min, max },
            )
            .unwrap_or_else(|e| {
                eprintln!("Search failed: {}", e);
                std::process::exit(1);
            });

            println!("Most profitable fleet size: {}", best);
        }
        Commands::ListPolicies => {
            println!("Available routing policies:");
            for name in fleetsim_policies::available_policies() {
                println!("  - {}", name);
            }
        }
    }
}

fn load_config(path: &PathBuf) -> SimConfig {
    SimConfig::from_file(path).unwrap_or_else(|e| {
        eprintln!("Error loading config: {}", e);
        std::process::exit(1);
    })
}

fn write_json<T: serde::Serialize>(path: &PathBuf, value: &T) {
    let json = serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        eprintln!("Error serializing results: {}", e);
        std::process::exit(1);
    });
    std::fs::write(path, json).unwrap_or_else(|e| {
        eprintln!("Error writing output: {}", e);
        std::process::exit(1);
    });
    println!("Results written to {}", path.display());
}

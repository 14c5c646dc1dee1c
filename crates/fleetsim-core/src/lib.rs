//! FleetSim — Discrete-event simulator for request-serving fleets.
//!
//! This crate provides the core simulation engine that models a pool of
//! single-slot servers with bounded queues, clients with finite patience,
//! and the clock-driven event loop tying them together. Routing policies
//! and autoscaling controllers from `fleetsim-policies` are plugged in to
//! decide where each request goes and how big the fleet should be.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐     ┌───────────┐     ┌──────────────┐
//! │  Source  │────▶│  Engine   │────▶│   Metrics    │
//! │(Arrivals)│     │ (Events)  │     │    Sink      │
//! └──────────┘     └─────┬─────┘     └──────────────┘
//!                        │
//!                ┌───────┴───────┐
//!                │ LoadBalancer  │◀── RoutingPolicy
//!                │               │◀── ScalingController
//!                └───────┬───────┘
//!                        │
//!          ┌─────────────┼─────────────┐
//!          ▼             ▼             ▼
//!    ┌──────────┐  ┌──────────┐  ┌──────────┐
//!    │ Server 0 │  │ Server 1 │  │ Server N │
//!    │  Queue   │  │  Queue   │  │  Queue   │
//!    └──────────┘  └──────────┘  └──────────┘
//! ```

pub mod balancer;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod metrics;
pub mod optimize;
pub mod request;
pub mod server;
pub mod source;

// Re-export key types for convenience.
pub use balancer::LoadBalancer;
pub use clock::SimClock;
pub use config::SimConfig;
pub use engine::SimulationEngine;
pub use error::SimError;
pub use event::{ScheduledEvent, SimEvent, PRIORITY_COMPLETION, PRIORITY_DEFAULT};
pub use metrics::{MetricsSink, SimulationReport, Stat};
pub use request::{Request, RequestState};
pub use server::{RequestQueue, Server, ServerState};
pub use source::{ArrivalProcess, RateSchedule, RequestTypeSpec};

/// Run a complete simulation from a config, using its configured policy.
pub fn run_simulation(config: &SimConfig) -> Result<SimulationReport, SimError> {
    run_with_policy(config, &config.policy.name)
}

/// Run a complete simulation from a config with a specific routing policy.
pub fn run_with_policy(config: &SimConfig, policy_name: &str) -> Result<SimulationReport, SimError> {
    let policy = fleetsim_policies::policy_by_name(policy_name, config.simulation.seed)
        .ok_or_else(|| SimError::UnknownPolicy(policy_name.to_string()))?;
    let controller = config.build_controller()?;
    let balancer = LoadBalancer::new(
        config.fleet.num_servers,
        config.fleet.queue_capacity,
        policy,
        controller,
    );
    let mut engine = SimulationEngine::new(config.simulation.stop_time, balancer)
        .with_source(config.build_source()?)
        .with_periods(config.simulation.period_length);
    if let Some(schedule) = config.build_schedule() {
        engine = engine.with_rate_schedule(schedule);
    }
    engine.run()
}

/// Run the same config under several routing policies.
pub fn compare_policies(
    config: &SimConfig,
    policy_names: &[&str],
) -> Result<Vec<SimulationReport>, SimError> {
    policy_names
        .iter()
        .map(|name| run_with_policy(config, name))
        .collect()
}

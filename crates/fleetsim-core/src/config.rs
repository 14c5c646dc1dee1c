//! TOML configuration parsing for FleetSim.
//!
//! Defines the complete configuration schema for simulation runs: run
//! parameters, fleet shape, workload mix, routing policy, autoscaling
//! controller, and the optional arrival-rate schedule.

use crate::source::{
    ArrivalProcess, BatchedSource, BernoulliSource, ExponentialSource, RateSchedule,
    RequestTypeSpec, SourceError,
};
use fleetsim_policies::{
    EpsilonGreedyController, ExplorationSchedule, LinearModel, RewardWeights, ScalingController,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Validation(String),
    #[error("Invalid workload: {0}")]
    Source(#[from] SourceError),
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub simulation: SimulationSection,
    pub fleet: FleetSection,
    pub workload: WorkloadSection,
    #[serde(default)]
    pub policy: PolicySection,
    #[serde(default)]
    pub controller: ControllerSection,
    #[serde(default)]
    pub schedule: ScheduleSection,
}

/// General simulation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSection {
    /// Human-readable name for this simulation.
    #[serde(default = "default_sim_name")]
    pub name: String,
    /// Random seed for reproducibility.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Simulated time horizon in seconds.
    #[serde(default = "default_stop_time")]
    pub stop_time: f64,
    /// Control/reporting period length in seconds.
    #[serde(default = "default_period_length")]
    pub period_length: f64,
}

fn default_sim_name() -> String {
    "simulation".to_string()
}

fn default_seed() -> u64 {
    42
}

fn default_stop_time() -> f64 {
    3600.0
}

fn default_period_length() -> f64 {
    60.0
}

/// Fleet shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetSection {
    /// Initial number of servers.
    pub num_servers: u32,
    /// Per-server queue bound; unset means unbounded.
    pub queue_capacity: Option<usize>,
}

/// Workload mix and arrival process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadSection {
    /// Arrival process: "bernoulli", "exponential", or "batched".
    #[serde(default = "default_source_kind")]
    pub source: String,
    /// Arrival rate in requests per second.
    #[serde(default = "default_rate")]
    pub arrivals_per_sec: f64,
    /// Per-tick arrival probability for the bernoulli source.
    #[serde(default = "default_request_prob")]
    pub request_prob: f64,
    pub request_types: Vec<RequestTypeSpec>,
}

fn default_source_kind() -> String {
    "exponential".to_string()
}

fn default_rate() -> f64 {
    1.0
}

fn default_request_prob() -> f64 {
    0.5
}

/// Routing policy selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySection {
    #[serde(default = "default_policy")]
    pub name: String,
}

fn default_policy() -> String {
    "round_robin".to_string()
}

impl Default for PolicySection {
    fn default() -> Self {
        Self {
            name: default_policy(),
        }
    }
}

/// Autoscaling controller parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_min_servers")]
    pub min_servers: u32,
    #[serde(default = "default_max_servers")]
    pub max_servers: u32,
    #[serde(default = "default_process_reward")]
    pub process_reward: f64,
    #[serde(default = "default_cancel_reward")]
    pub cancel_reward: f64,
    #[serde(default = "default_server_reward")]
    pub server_reward: f64,
    /// Probability of an exploratory (random) fleet size per period.
    #[serde(default = "default_exploration_rate")]
    pub exploration_rate: f64,
    /// Incremental model updates instead of a full refit per period.
    #[serde(default)]
    pub use_partial_fit: bool,
}

fn default_min_servers() -> u32 {
    1
}
fn default_max_servers() -> u32 {
    40
}
fn default_process_reward() -> f64 {
    1.0
}
fn default_cancel_reward() -> f64 {
    -10.0
}
fn default_server_reward() -> f64 {
    -300.0
}
fn default_exploration_rate() -> f64 {
    0.1
}

impl Default for ControllerSection {
    fn default() -> Self {
        Self {
            enabled: false,
            min_servers: default_min_servers(),
            max_servers: default_max_servers(),
            process_reward: default_process_reward(),
            cancel_reward: default_cancel_reward(),
            server_reward: default_server_reward(),
            exploration_rate: default_exploration_rate(),
            use_partial_fit: false,
        }
    }
}

/// Per-period arrival rates; cycles when the run outlasts the list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleSection {
    #[serde(default)]
    pub rates: Vec<f64>,
}

impl SimConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration consistency.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.fleet.num_servers == 0 {
            return Err(ConfigError::Validation(
                "num_servers must be > 0".to_string(),
            ));
        }
        if self.simulation.stop_time <= 0.0 {
            return Err(ConfigError::Validation("stop_time must be > 0".to_string()));
        }
        if self.simulation.period_length <= 0.0 {
            return Err(ConfigError::Validation(
                "period_length must be > 0".to_string(),
            ));
        }
        if self.workload.request_types.is_empty() {
            return Err(ConfigError::Validation(
                "at least one [[workload.request_types]] entry is required".to_string(),
            ));
        }
        let total: f64 = self
            .workload
            .request_types
            .iter()
            .map(|t| t.probability)
            .sum();
        if (total - 1.0).abs() > 1e-9 {
            return Err(ConfigError::Validation(format!(
                "request type probabilities sum to {total}, expected 1"
            )));
        }
        if self.workload.arrivals_per_sec <= 0.0 {
            return Err(ConfigError::Validation(
                "arrivals_per_sec must be > 0".to_string(),
            ));
        }
        match self.workload.source.as_str() {
            "bernoulli" | "exponential" | "batched" => {}
            other => {
                return Err(ConfigError::Validation(format!(
                    "unknown workload source '{other}' (expected bernoulli, exponential, or batched)"
                )));
            }
        }
        if self.controller.enabled {
            if self.controller.min_servers == 0
                || self.controller.min_servers > self.controller.max_servers
            {
                return Err(ConfigError::Validation(format!(
                    "controller server range ({}, {}) is empty",
                    self.controller.min_servers, self.controller.max_servers,
                )));
            }
            if !(0.0..=1.0).contains(&self.controller.exploration_rate) {
                return Err(ConfigError::Validation(format!(
                    "exploration_rate {} is outside [0, 1]",
                    self.controller.exploration_rate,
                )));
            }
        }
        for rate in &self.schedule.rates {
            if *rate <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "scheduled rate {rate} must be > 0"
                )));
            }
        }
        Ok(())
    }

    /// Construct the configured arrival process.
    pub fn build_source(&self) -> Result<Box<dyn ArrivalProcess>, ConfigError> {
        let types = &self.workload.request_types;
        let rate = self.workload.arrivals_per_sec;
        // Offset keeps the workload stream independent of policy RNG use.
        let seed = self.simulation.seed.wrapping_add(1);
        let source: Box<dyn ArrivalProcess> = match self.workload.source.as_str() {
            "bernoulli" => Box::new(BernoulliSource::new(
                types,
                rate,
                self.workload.request_prob,
                seed,
            )?),
            "batched" => Box::new(BatchedSource::new(
                types,
                rate,
                self.simulation.period_length,
                seed,
            )?),
            _ => Box::new(ExponentialSource::new(types, rate, seed)?),
        };
        Ok(source)
    }

    /// Construct the scaling controller, if enabled.
    pub fn build_controller(&self) -> Result<Option<Box<dyn ScalingController>>, ConfigError> {
        if !self.controller.enabled {
            return Ok(None);
        }
        let controller = EpsilonGreedyController::new(
            Box::new(LinearModel::new()),
            self.controller.min_servers,
            self.controller.max_servers,
            self.simulation.period_length,
        )
        .map_err(|e| ConfigError::Validation(e.to_string()))?
        .with_weights(RewardWeights {
            process: self.controller.process_reward,
            cancel: self.controller.cancel_reward,
            server: self.controller.server_reward,
        })
        .with_exploration(ExplorationSchedule::Constant(
            self.controller.exploration_rate,
        ))
        .with_partial_fit(self.controller.use_partial_fit)
        .with_seed(self.simulation.seed.wrapping_add(2));
        Ok(Some(Box::new(controller)))
    }

    /// Construct the rate schedule, if one is configured.
    pub fn build_schedule(&self) -> Option<RateSchedule> {
        RateSchedule::new(self.schedule.rates.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CONFIG: &str = r#"
[simulation]
name = "test-sim"
seed = 123
stop_time = 600.0
period_length = 60.0

[fleet]
num_servers = 4
queue_capacity = 100

[workload]
source = "exponential"
arrivals_per_sec = 3.0

[[workload.request_types]]
probability = 0.7
mean_duration = 1.0
std_duration = 0.2
tolerance_window = 10.0

[[workload.request_types]]
probability = 0.3
mean_duration = 4.0
tolerance_window = 30.0

[policy]
name = "shortest_queue"

[controller]
enabled = true
min_servers = 1
max_servers = 20
exploration_rate = 0.2
"#;

    #[test]
    fn test_parse_config() {
        let config = SimConfig::from_str(SAMPLE_CONFIG).unwrap();
        assert_eq!(config.simulation.name, "test-sim");
        assert_eq!(config.simulation.seed, 123);
        assert_eq!(config.fleet.num_servers, 4);
        assert_eq!(config.fleet.queue_capacity, Some(100));
        assert_eq!(config.workload.request_types.len(), 2);
        assert_eq!(config.policy.name, "shortest_queue");
        assert!(config.controller.enabled);
    }

    #[test]
    fn test_defaults() {
        let toml = r#"
[simulation]

[fleet]
num_servers = 2

[workload]
[[workload.request_types]]
probability = 1.0
mean_duration = 1.0
tolerance_window = 10.0
"#;
        let config = SimConfig::from_str(toml).unwrap();
        assert_eq!(config.simulation.seed, 42);
        assert_eq!(config.simulation.period_length, 60.0);
        assert_eq!(config.policy.name, "round_robin");
        assert!(!config.controller.enabled);
        assert_eq!(config.controller.server_reward, -300.0);
        assert_eq!(config.fleet.queue_capacity, None);
    }

    #[test]
    fn test_validation_zero_servers() {
        let toml = r#"
[simulation]

[fleet]
num_servers = 0

[workload]
[[workload.request_types]]
probability = 1.0
mean_duration = 1.0
tolerance_window = 10.0
"#;
        assert!(SimConfig::from_str(toml).is_err());
    }

    #[test]
    fn test_validation_probabilities_sum() {
        let toml = r#"
[simulation]

[fleet]
num_servers = 2

[workload]
[[workload.request_types]]
probability = 0.5
mean_duration = 1.0
tolerance_window = 10.0
"#;
        assert!(SimConfig::from_str(toml).is_err());
    }

    #[test]
    fn test_validation_unknown_source() {
        let toml = r#"
[simulation]

[fleet]
num_servers = 2

[workload]
source = "lunar"
[[workload.request_types]]
probability = 1.0
mean_duration = 1.0
tolerance_window = 10.0
"#;
        assert!(SimConfig::from_str(toml).is_err());
    }

    #[test]
    fn test_validation_exploration_rate_bounds() {
        let mut bad = SAMPLE_CONFIG.replace("exploration_rate = 0.2", "exploration_rate = 1.5");
        assert!(SimConfig::from_str(&bad).is_err());
        bad = SAMPLE_CONFIG.replace("exploration_rate = 0.2", "exploration_rate = -0.1");
        assert!(SimConfig::from_str(&bad).is_err());
    }

    #[test]
    fn test_validation_empty_controller_range() {
        let bad = SAMPLE_CONFIG.replace("min_servers = 1", "min_servers = 30");
        assert!(SimConfig::from_str(&bad).is_err());
    }

    #[test]
    fn test_build_source_and_controller() {
        let config = SimConfig::from_str(SAMPLE_CONFIG).unwrap();
        let source = config.build_source().unwrap();
        assert_eq!(source.rate(), 3.0);
        assert!(config.build_controller().unwrap().is_some());
        assert!(config.build_schedule().is_none());
    }

    #[test]
    fn test_schedule_rates_validated() {
        let toml = r#"
[simulation]

[fleet]
num_servers = 2

[workload]
[[workload.request_types]]
probability = 1.0
mean_duration = 1.0
tolerance_window = 10.0

[schedule]
rates = [2.0, 0.0]
"#;
        assert!(SimConfig::from_str(toml).is_err());
    }
}

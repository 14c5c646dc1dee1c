//! Routing and autoscaling policies for FleetSim.
//!
//! This crate provides the two capability traits the simulator plugs
//! policies into, plus the built-in implementations:
//!
//! | Policy | Kind | Strategy |
//! |--------|------|----------|
//! | [`RoundRobin`] | routing | Cycle through active servers |
//! | [`Random`] | routing | Uniform pick from active servers |
//! | [`ShortestQueue`] | routing | Fewest requests waiting |
//! | [`EpsilonGreedyController`] | scaling | Learned reward, epsilon-greedy sizing |
//!
//! Routing policies see per-request [`RequestInfo`] and a slice of
//! [`ServerSnapshot`]s; scaling controllers see one [`PeriodContext`] of
//! traffic aggregates per control period.

pub mod controller;
pub mod error;
pub mod model;
pub mod random;
pub mod round_robin;
pub mod shortest_queue;
pub mod traits;

pub use controller::{EpsilonGreedyController, ExplorationSchedule, RewardWeights};
pub use error::ControlError;
pub use model::{LinearModel, RewardModel};
pub use random::Random;
pub use round_robin::RoundRobin;
pub use shortest_queue::ShortestQueue;
pub use traits::*;

/// Create a routing policy by name. Policies that draw randomness are
/// seeded from `seed` so runs stay reproducible.
pub fn policy_by_name(name: &str, seed: u64) -> Option<Box<dyn RoutingPolicy>> {
    match name {
        "round_robin" => Some(Box::new(RoundRobin::new())),
        "random" => Some(Box::new(Random::seeded(seed))),
        "shortest_queue" => Some(Box::new(ShortestQueue::new())),
        _ => None,
    }
}

/// List all available built-in routing policy names.
pub fn available_policies() -> Vec<&'static str> {
    vec!["round_robin", "random", "shortest_queue"]
}

#[cfg(test)]
pub mod tests {
    use super::*;

    /// Helper to create N idle test server snapshots.
    pub fn make_servers(n: u32) -> Vec<ServerSnapshot> {
        (0..n)
            .map(|i| ServerSnapshot {
                id: i,
                queue_len: 0,
                busy: false,
            })
            .collect()
    }

    /// A request with unremarkable timings, for policies that ignore it.
    pub fn dummy_request() -> RequestInfo {
        RequestInfo {
            id: 1,
            type_index: 0,
            service_duration: 1.0,
            tolerance_window: 10.0,
        }
    }

    #[test]
    fn test_policy_by_name() {
        for name in available_policies() {
            assert!(policy_by_name(name, 7).is_some(), "Missing: {}", name);
        }
        assert!(policy_by_name("nonexistent", 7).is_none());
    }

    #[test]
    fn test_available_policies_not_empty() {
        assert!(!available_policies().is_empty());
    }
}
